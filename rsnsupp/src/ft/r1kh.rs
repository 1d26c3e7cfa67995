// R1KH-ID table.
//
// Remembers which R1 key holder served each AP of the mobility domain, so a
// later transition back to that AP can rebuild its PMK-R1 from the PMK-R0.

use std::collections::HashMap;

use rsnkey::derive::{derive_pmk_r1, PmkR0, PmkR1};
use rsnkey::MacAddr;

use crate::error::Result;

#[derive(Debug, Default, Clone)]
pub struct R1khTable {
    by_ap: HashMap<MacAddr, MacAddr>,
}

impl R1khTable {
    pub fn record(&mut self, ap: MacAddr, r1kh_id: MacAddr) {
        if self.by_ap.insert(ap, r1kh_id) != Some(r1kh_id) {
            tracing::debug!(ap = %ap, r1kh_id = %r1kh_id, "FT: R1KH-ID recorded");
        }
    }

    pub fn get(&self, ap: MacAddr) -> Option<MacAddr> {
        self.by_ap.get(&ap).copied()
    }

    pub fn len(&self) -> usize {
        self.by_ap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ap.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_ap.clear();
    }

    /// PMK-R1 for `ap`, if its R1KH is known.
    pub fn pmk_r1_for(&self, ap: MacAddr, r0: &PmkR0, s1kh_id: MacAddr) -> Result<Option<PmkR1>> {
        match self.get(ap) {
            Some(r1kh) => Ok(Some(derive_pmk_r1(r0, r1kh, s1kh_id)?)),
            None => Ok(None),
        }
    }
}
