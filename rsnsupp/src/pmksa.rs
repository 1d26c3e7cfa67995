//! PMKSA cache.
//!
//! Entries live in a slab addressed by generational [`EntryHandle`]s; a
//! separate index keeps them in ascending expiration order. The cache does
//! not call back into the supplicant: every operation that drops entries
//! returns them as [`Removal`]s and the caller decides what follows
//! (driver notification, deauthentication).

use std::fmt;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use rsnkey::derive::{pmkid, pmkid_suite_b, PMK_LEN_MAX, PMK_LEN_MIN};
use rsnkey::{Akm, MacAddr, Pmkid};

use crate::error::{Result, SupplicantError};

/// Opaque identifier of the network profile an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct NetworkCtx(pub u64);

/// A cached PMK security association.
pub struct PmksaEntry {
    pub pmk: Zeroizing<Vec<u8>>,
    pub pmkid: Pmkid,
    /// Suite B: the KCK the PMKID was computed from.
    pub kck: Option<Zeroizing<Vec<u8>>>,
    pub aa: MacAddr,
    pub spa: MacAddr,
    pub akm: Akm,
    pub network_ctx: NetworkCtx,
    pub expiration: Instant,
    pub reauth_time: Instant,
    /// Created by OKC and not yet accepted by the authenticator.
    pub opportunistic: bool,
    /// Added by an external component rather than by this supplicant.
    pub external: bool,
    pub fils_cache_id: Option<[u8; 2]>,
}

impl fmt::Debug for PmksaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmksaEntry")
            .field("aa", &self.aa)
            .field("pmkid", &rsnkey::hex(&self.pmkid))
            .field("akm", &self.akm)
            .field("network_ctx", &self.network_ctx)
            .field("pmk_len", &self.pmk.len())
            .field("opportunistic", &self.opportunistic)
            .field("external", &self.external)
            .finish()
    }
}

/// Handle to a live cache entry. A handle to a removed entry never
/// resolves again, even if its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeReason {
    /// Flushed, evicted or explicitly removed.
    Free,
    /// Superseded by a new entry for the same peer.
    Replace,
    /// Lifetime ran out.
    Expire,
}

/// An entry that left the cache.
#[derive(Debug)]
pub struct Removal {
    pub entry: PmksaEntry,
    pub reason: FreeReason,
    pub was_current: bool,
}

/// Inputs of [`PmksaCache::add`].
pub struct NewEntry<'a> {
    pub pmk: &'a [u8],
    /// Computed from the PMK (or KCK for Suite B) when absent.
    pub pmkid: Option<Pmkid>,
    pub kck: Option<&'a [u8]>,
    pub aa: MacAddr,
    pub spa: MacAddr,
    pub network_ctx: NetworkCtx,
    pub akm: Akm,
    pub fils_cache_id: Option<[u8; 2]>,
    pub external: bool,
}

/// Lookup filter; `None` fields match anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lookup<'a> {
    pub aa: Option<MacAddr>,
    pub spa: Option<MacAddr>,
    pub pmkid: Option<&'a Pmkid>,
    pub network_ctx: Option<NetworkCtx>,
    pub akm: Option<Akm>,
}

/// How [`PmksaCache::select_current`] looks for the entry to use.
#[derive(Debug, Clone, Copy)]
pub struct CurrentSelector {
    pub pmkid: Option<Pmkid>,
    pub bssid: Option<MacAddr>,
    pub network_ctx: NetworkCtx,
    pub try_opportunistic: bool,
    pub fils_cache_id: Option<[u8; 2]>,
    pub akm: Option<Akm>,
}

#[derive(Debug, Clone, Copy)]
pub struct PmksaConfig {
    pub capacity: usize,
    pub lifetime: Duration,
    /// Percent of the lifetime after which re-authentication is requested.
    pub reauth_threshold: u8,
}

impl Default for PmksaConfig {
    fn default() -> Self {
        Self {
            capacity: crate::config::DEFAULT_PMKSA_CAPACITY,
            lifetime: Duration::from_secs(crate::config::DEFAULT_PMK_LIFETIME as u64),
            reauth_threshold: crate::config::DEFAULT_PMK_REAUTH_THRESHOLD,
        }
    }
}

enum Slot {
    Vacant { generation: u32 },
    Occupied { generation: u32, entry: PmksaEntry },
}

pub struct PmksaCache {
    slots: Vec<Slot>,
    free: Vec<u32>,
    /// Live handles, ascending by expiration.
    order: Vec<EntryHandle>,
    current: Option<EntryHandle>,
    config: PmksaConfig,
}

impl PmksaCache {
    pub fn new(config: PmksaConfig) -> Self {
        Self {
            slots: Vec::with_capacity(config.capacity),
            free: Vec::new(),
            order: Vec::with_capacity(config.capacity),
            current: None,
            config,
        }
    }

    pub fn config(&self) -> &PmksaConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, handle: EntryHandle) -> Option<&PmksaEntry> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, entry } if *generation == handle.generation => Some(entry),
            _ => None,
        }
    }

    fn get_mut(&mut self, handle: EntryHandle) -> Option<&mut PmksaEntry> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, entry } if *generation == handle.generation => Some(entry),
            _ => None,
        }
    }

    /// Entries in expiration order.
    pub fn iter(&self) -> impl Iterator<Item = (EntryHandle, &PmksaEntry)> + '_ {
        self.order
            .iter()
            .filter_map(move |&h| self.get(h).map(|e| (h, e)))
    }

    pub fn current_handle(&self) -> Option<EntryHandle> {
        self.current
    }

    pub fn current(&self) -> Option<&PmksaEntry> {
        self.current.and_then(|h| self.get(h))
    }

    pub fn set_current(&mut self, handle: Option<EntryHandle>) {
        self.current = handle.filter(|&h| self.get(h).is_some());
    }

    pub fn clear_current(&mut self) {
        self.current = None;
    }

    /// The authenticator accepted the current entry; an opportunistic entry
    /// becomes a regular one. Returns `true` if the flag was cleared.
    pub fn confirm_current(&mut self) -> bool {
        let Some(h) = self.current else { return false };
        match self.get_mut(h) {
            Some(entry) if entry.opportunistic => {
                entry.opportunistic = false;
                true
            }
            _ => false,
        }
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// First entry, in expiration order, matching every set field.
    pub fn lookup(&self, q: &Lookup<'_>) -> Option<EntryHandle> {
        self.iter()
            .find(|(_, e)| {
                q.aa.map_or(true, |aa| e.aa == aa)
                    && q.spa.map_or(true, |spa| e.spa == spa)
                    && q.pmkid.map_or(true, |id| &e.pmkid == id)
                    && q.network_ctx.map_or(true, |ctx| e.network_ctx == ctx)
                    && q.akm.map_or(true, |akm| e.akm == akm)
            })
            .map(|(h, _)| h)
    }

    fn lookup_fils_cache_id(&self, network_ctx: NetworkCtx, id: [u8; 2]) -> Option<EntryHandle> {
        self.iter()
            .find(|(_, e)| e.network_ctx == network_ctx && e.fils_cache_id == Some(id))
            .map(|(h, _)| h)
    }

    // ── Insertion ───────────────────────────────────────────────────────

    /// Add an entry for a freshly obtained PMK.
    ///
    /// An entry for the same peer with the same PMK and PMKID is reused.
    /// Any other entry for the same peer is replaced; if it was not
    /// opportunistic, entries derived from its PMK go too. A full cache
    /// evicts its soonest-to-expire entry other than the current one.
    pub fn add(&mut self, new: NewEntry<'_>, now: Instant) -> Result<(EntryHandle, Vec<Removal>)> {
        if new.pmk.len() < PMK_LEN_MIN || new.pmk.len() > PMK_LEN_MAX {
            return Err(SupplicantError::Pmksa(format!("PMK of {} bytes", new.pmk.len())));
        }
        let id = match (new.pmkid, new.kck) {
            (Some(id), _) => id,
            (None, Some(kck)) if new.akm.is_suite_b() => pmkid_suite_b(new.akm, kck, new.aa, new.spa)?,
            (None, _) if new.akm.is_suite_b() => {
                return Err(SupplicantError::Pmksa("Suite B entry without KCK".into()));
            }
            (None, _) => pmkid(new.akm, new.pmk, new.aa, new.spa)?,
        };
        let lifetime = self.config.lifetime;
        let reauth = lifetime * u32::from(self.config.reauth_threshold) / 100;
        let entry = PmksaEntry {
            pmk: Zeroizing::new(new.pmk.to_vec()),
            pmkid: id,
            kck: new.kck.map(|k| Zeroizing::new(k.to_vec())),
            aa: new.aa,
            spa: new.spa,
            akm: new.akm,
            network_ctx: new.network_ctx,
            expiration: now + lifetime,
            reauth_time: now + reauth,
            opportunistic: false,
            external: new.external,
            fils_cache_id: new.fils_cache_id,
        };
        self.insert(entry)
    }

    fn insert(&mut self, entry: PmksaEntry) -> Result<(EntryHandle, Vec<Removal>)> {
        let mut removals = Vec::new();

        let same_peer = self
            .iter()
            .find(|(_, e)| e.aa == entry.aa && e.spa == entry.spa)
            .map(|(h, e)| {
                let identical = e.pmk.as_slice() == entry.pmk.as_slice() && e.pmkid == entry.pmkid;
                (h, identical, e.opportunistic)
            });
        if let Some((old, identical, opportunistic)) = same_peer {
            if identical {
                tracing::debug!(aa = %entry.aa, "reusing previous PMKSA entry");
                return Ok((old, removals));
            }
            let old_pmk = self.get(old).map(|e| e.pmk.clone());
            self.unlink(old);
            if !opportunistic {
                // OKC clones of the old PMK cannot survive the new one.
                if let Some(pmk) = old_pmk {
                    removals.extend(self.flush(Some(entry.network_ctx), Some(&pmk), false));
                }
            }
            removals.extend(self.free_slot(old, FreeReason::Replace));
        }

        if self.order.len() >= self.config.capacity {
            let victim = self
                .order
                .iter()
                .copied()
                .find(|&h| Some(h) != self.current);
            if let Some(victim) = victim {
                if let Some(e) = self.get(victim) {
                    tracing::debug!(
                        aa = %e.aa,
                        "removed the oldest idle PMKSA cache entry to make room for a new one"
                    );
                }
                self.unlink(victim);
                removals.extend(self.free_slot(victim, FreeReason::Free));
            }
        }

        tracing::debug!(
            aa = %entry.aa,
            akm = ?entry.akm,
            network_ctx = entry.network_ctx.0,
            "added PMKSA cache entry"
        );
        let handle = self.alloc(entry);
        self.link_sorted(handle);
        Ok((handle, removals))
    }

    fn alloc(&mut self, entry: PmksaEntry) -> EntryHandle {
        if let Some(index) = self.free.pop() {
            let generation = match self.slots[index as usize] {
                Slot::Vacant { generation } => generation,
                Slot::Occupied { generation, .. } => generation.wrapping_add(1),
            };
            self.slots[index as usize] = Slot::Occupied { generation, entry };
            return EntryHandle { index, generation };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot::Occupied { generation: 0, entry });
        EntryHandle { index, generation: 0 }
    }

    fn link_sorted(&mut self, handle: EntryHandle) {
        let Some(expiration) = self.get(handle).map(|e| e.expiration) else {
            return;
        };
        let pos = self
            .order
            .iter()
            .position(|&h| self.get(h).is_some_and(|e| e.expiration > expiration))
            .unwrap_or(self.order.len());
        self.order.insert(pos, handle);
    }

    fn unlink(&mut self, handle: EntryHandle) {
        self.order.retain(|&h| h != handle);
    }

    /// Vacate the slot of an already unlinked entry.
    fn free_slot(&mut self, handle: EntryHandle, reason: FreeReason) -> Option<Removal> {
        self.get(handle)?;
        let slot = self.slots.get_mut(handle.index as usize)?;
        let next = Slot::Vacant {
            generation: handle.generation.wrapping_add(1),
        };
        let Slot::Occupied { entry, .. } = std::mem::replace(slot, next) else {
            return None;
        };
        self.free.push(handle.index);
        let was_current = self.current == Some(handle);
        if was_current {
            tracing::debug!(
                reason = ?reason,
                "{} current PMKSA entry",
                if reason == FreeReason::Replace { "replaced" } else { "removed" }
            );
            self.current = None;
        }
        Some(Removal {
            entry,
            reason,
            was_current,
        })
    }

    // ── Removal ─────────────────────────────────────────────────────────

    pub fn remove(&mut self, handle: EntryHandle, reason: FreeReason) -> Option<Removal> {
        self.get(handle)?;
        self.unlink(handle);
        self.free_slot(handle, reason)
    }

    /// Remove entries of `network_ctx` (any if `None`) whose PMK equals
    /// `pmk` (any if `None`); with `external_only`, only externally added
    /// entries.
    pub fn flush(
        &mut self,
        network_ctx: Option<NetworkCtx>,
        pmk: Option<&[u8]>,
        external_only: bool,
    ) -> Vec<Removal> {
        let doomed: Vec<EntryHandle> = self
            .iter()
            .filter(|(_, e)| {
                network_ctx.map_or(true, |ctx| e.network_ctx == ctx)
                    && pmk.map_or(true, |pmk| e.pmk.as_slice() == pmk)
                    && (!external_only || e.external)
            })
            .map(|(h, _)| h)
            .collect();
        doomed
            .into_iter()
            .filter_map(|h| {
                if let Some(e) = self.get(h) {
                    tracing::debug!(aa = %e.aa, "flush PMKSA cache entry");
                }
                self.remove(h, FreeReason::Free)
            })
            .collect()
    }

    /// Remove every expired entry, except that the current entry of an AKM
    /// that cannot re-authenticate inside an association is kept until the
    /// association ends.
    pub fn expire(&mut self, now: Instant) -> Vec<Removal> {
        let doomed: Vec<EntryHandle> = self
            .iter()
            .take_while(|(_, e)| e.expiration <= now)
            .filter(|&(h, e)| {
                let postpone = Some(h) == self.current && !e.akm.can_reauth_in_association();
                if postpone {
                    tracing::debug!(aa = %e.aa, "postpone PMKSA cache entry expiration");
                }
                !postpone
            })
            .map(|(h, _)| h)
            .collect();
        doomed
            .into_iter()
            .filter_map(|h| {
                if let Some(e) = self.get(h) {
                    tracing::debug!(aa = %e.aa, "expired PMKSA cache entry");
                }
                self.remove(h, FreeReason::Expire)
            })
            .collect()
    }

    /// When the expiry timer should next fire.
    pub fn next_expiry(&self) -> Option<Instant> {
        self.iter()
            .find(|&(h, e)| Some(h) != self.current || e.akm.can_reauth_in_association())
            .map(|(_, e)| e.expiration)
    }

    /// When the current entry wants re-authentication, if it can have one.
    pub fn reauth_deadline(&self) -> Option<Instant> {
        self.current()
            .filter(|e| e.akm.can_reauth_in_association())
            .map(|e| e.reauth_time)
    }

    // ── Current entry selection ─────────────────────────────────────────

    /// Pick the entry for a new association: by PMKID, then by BSSID, then
    /// (OKC) a clone of any entry of the same network, then by FILS cache
    /// identifier. The result becomes current.
    pub fn select_current(
        &mut self,
        sel: &CurrentSelector,
        own_addr: MacAddr,
        now: Instant,
    ) -> Result<(Option<EntryHandle>, Vec<Removal>)> {
        self.current = None;
        let mut removals = Vec::new();

        let mut found = sel.pmkid.as_ref().and_then(|id| {
            self.lookup(&Lookup {
                pmkid: Some(id),
                network_ctx: Some(sel.network_ctx),
                akm: sel.akm,
                ..Default::default()
            })
        });
        if found.is_none() {
            found = sel.bssid.and_then(|bssid| {
                self.lookup(&Lookup {
                    aa: Some(bssid),
                    network_ctx: Some(sel.network_ctx),
                    akm: sel.akm,
                    ..Default::default()
                })
            });
        }
        if found.is_none() && sel.try_opportunistic {
            if let Some(bssid) = sel.bssid {
                let source = self.lookup(&Lookup {
                    network_ctx: Some(sel.network_ctx),
                    akm: sel.akm,
                    ..Default::default()
                });
                if let Some(source) = source {
                    let (clone, evicted) = self.clone_opportunistic(source, bssid, own_addr, now)?;
                    removals.extend(evicted);
                    found = clone;
                }
            }
        }
        if found.is_none() {
            found = sel
                .fils_cache_id
                .and_then(|id| self.lookup_fils_cache_id(sel.network_ctx, id));
        }

        match found.and_then(|h| self.get(h)) {
            Some(e) => tracing::debug!(pmkid = %rsnkey::hex(&e.pmkid), "PMKSA cache entry found"),
            None => tracing::debug!("no PMKSA cache entry found"),
        }
        self.current = found;
        Ok((found, removals))
    }

    /// Copy `source`'s PMK to a new entry for `aa`. The clone inherits the
    /// source's expiration and re-auth time and is flagged opportunistic.
    pub fn clone_opportunistic(
        &mut self,
        source: EntryHandle,
        aa: MacAddr,
        spa: MacAddr,
        now: Instant,
    ) -> Result<(Option<EntryHandle>, Vec<Removal>)> {
        let Some(src) = self.get(source) else {
            return Ok((None, Vec::new()));
        };
        let pmk = src.pmk.clone();
        let kck = src.kck.clone();
        let (akm, network_ctx, fils_cache_id) = (src.akm, src.network_ctx, src.fils_cache_id);
        let (expiration, reauth_time) = (src.expiration, src.reauth_time);
        // SAE and FILS PMKIDs are not bound to the AP address.
        let keep_pmkid = (akm.is_sae() || akm.is_fils()).then_some(src.pmkid);

        let (handle, removals) = self.add(
            NewEntry {
                pmk: &pmk,
                pmkid: keep_pmkid,
                kck: kck.as_deref().map(|k| k.as_slice()),
                aa,
                spa,
                network_ctx,
                akm,
                fils_cache_id,
                external: false,
            },
            now,
        )?;
        if let Some(entry) = self.get_mut(handle) {
            entry.expiration = expiration;
            entry.reauth_time = reauth_time;
            entry.opportunistic = true;
        }
        self.unlink(handle);
        self.link_sorted(handle);
        tracing::debug!(aa = %aa, "added opportunistic PMKSA cache entry");
        Ok((Some(handle), removals))
    }

    // ── Diagnostics ─────────────────────────────────────────────────────

    /// Text dump, one line per entry in expiration order.
    pub fn list(&self, now: Instant) -> String {
        let mut out = String::from("Index / AA / PMKID / expiration (in seconds) / opportunistic\n");
        for (i, (_, e)) in self.iter().enumerate() {
            let remaining = match e.expiration.checked_duration_since(now) {
                Some(d) => d.as_secs() as i64,
                None => -(now.duration_since(e.expiration).as_secs() as i64),
            };
            let _ = write!(
                out,
                "{} {} {} {} {}",
                i + 1,
                e.aa,
                rsnkey::hex(&e.pmkid),
                remaining,
                u8::from(e.opportunistic)
            );
            if let Some(id) = e.fils_cache_id {
                let _ = write!(out, " {}", rsnkey::hex(&id));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Debug for PmksaCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmksaCache")
            .field("len", &self.len())
            .field("current", &self.current)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPA: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x01]);
    const NET: NetworkCtx = NetworkCtx(7);

    fn ap(n: u8) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 1, n])
    }

    fn entry(pmk: &[u8], aa: MacAddr) -> NewEntry<'_> {
        NewEntry {
            pmk,
            pmkid: None,
            kck: None,
            aa,
            spa: SPA,
            network_ctx: NET,
            akm: Akm::Ieee8021x,
            fils_cache_id: None,
            external: false,
        }
    }

    #[test]
    fn add_computes_pmkid() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let now = Instant::now();
        let (h, removed) = c.add(entry(&[1; 32], ap(1)), now).unwrap();
        assert!(removed.is_empty());
        let e = c.get(h).unwrap();
        assert_eq!(e.pmkid, pmkid(Akm::Ieee8021x, &[1; 32], ap(1), SPA).unwrap());
        assert_eq!(e.expiration, now + Duration::from_secs(43200));
        assert_eq!(e.reauth_time, now + Duration::from_secs(43200 * 70 / 100));
    }

    #[test]
    fn identical_entry_reused() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let now = Instant::now();
        let (a, _) = c.add(entry(&[1; 32], ap(1)), now).unwrap();
        let (b, removed) = c.add(entry(&[1; 32], ap(1)), now).unwrap();
        assert_eq!(a, b);
        assert!(removed.is_empty());
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn new_pmk_replaces_entry() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let now = Instant::now();
        let (a, _) = c.add(entry(&[1; 32], ap(1)), now).unwrap();
        let (b, removed) = c.add(entry(&[2; 32], ap(1)), now).unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].reason, FreeReason::Replace);
        assert!(c.get(a).is_none());
        assert_eq!(c.get(b).unwrap().pmk.as_slice(), &[2; 32]);
    }

    #[test]
    fn stale_handle_after_slot_reuse() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let now = Instant::now();
        let (a, _) = c.add(entry(&[1; 32], ap(1)), now).unwrap();
        c.remove(a, FreeReason::Free).unwrap();
        let (b, _) = c.add(entry(&[2; 32], ap(2)), now).unwrap();
        assert!(c.get(a).is_none());
        assert!(c.get(b).is_some());
    }

    #[test]
    fn suite_b_requires_kck() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let mut e = entry(&[1; 32], ap(1));
        e.akm = Akm::SuiteB;
        assert!(c.add(e, Instant::now()).is_err());
    }

    #[test]
    fn flush_by_pmk() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let now = Instant::now();
        c.add(entry(&[1; 32], ap(1)), now).unwrap();
        c.add(entry(&[1; 32], ap(2)), now).unwrap();
        c.add(entry(&[3; 32], ap(3)), now).unwrap();
        let removed = c.flush(None, Some(&[1; 32]), false);
        assert_eq!(removed.len(), 2);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn list_format() {
        let mut c = PmksaCache::new(PmksaConfig::default());
        let now = Instant::now();
        let (h, _) = c.add(entry(&[1; 32], ap(1)), now).unwrap();
        let id = rsnkey::hex(&c.get(h).unwrap().pmkid);
        let text = c.list(now);
        assert_eq!(
            text,
            format!(
                "Index / AA / PMKID / expiration (in seconds) / opportunistic\n1 02:00:00:00:01:01 {id} 43200 0\n"
            )
        );
    }
}
