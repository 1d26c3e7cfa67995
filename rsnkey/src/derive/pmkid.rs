// PMKID = Truncate-128(HMAC-Hash(PMK, "PMK Name" || AA || SPA))

use crate::addr::MacAddr;
use crate::crypto::prf::hmac;
use crate::error::{Result, RsnKeyError};
use crate::suite::{Akm, KdfHash};
use crate::{Pmkid, PMKID_LEN};

const PMKID_LABEL: &[u8] = b"PMK Name";

fn truncate(full: &[u8]) -> Pmkid {
    let mut out = [0u8; PMKID_LEN];
    out.copy_from_slice(&full[..PMKID_LEN]);
    out
}

/// PMKID for a cached PMKSA. Legacy AKMs use HMAC-SHA1, the SHA-256/384
/// AKMs use the matching HMAC.
pub fn pmkid(akm: Akm, pmk: &[u8], aa: MacAddr, spa: MacAddr) -> Result<Pmkid> {
    if pmk.is_empty() {
        return Err(RsnKeyError::InvalidKeyLength { what: "PMK", len: 0 });
    }
    let full = hmac(
        akm.kdf_hash(pmk.len()),
        pmk,
        &[PMKID_LABEL, aa.as_bytes(), spa.as_bytes()],
    )?;
    Ok(truncate(&full))
}

/// Suite B PMKID, keyed with the KCK derived from the MSK instead of the PMK.
pub fn pmkid_suite_b(akm: Akm, kck: &[u8], aa: MacAddr, spa: MacAddr) -> Result<Pmkid> {
    let hash = match akm {
        Akm::SuiteB => KdfHash::Sha256,
        Akm::SuiteB192 => KdfHash::Sha384,
        other => return Err(RsnKeyError::UnsupportedAkm(format!("{other:?} is not Suite B"))),
    };
    let full = hmac(hash, kck, &[PMKID_LABEL, aa.as_bytes(), spa.as_bytes()])?;
    Ok(truncate(&full))
}
