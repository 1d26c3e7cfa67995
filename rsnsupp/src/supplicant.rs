//! The supplicant.
//!
//! Owns the configuration, the collaborators, the PMKSA cache, the FT key
//! hierarchy, timers and the context of the current association. This file
//! covers the association lifecycle and PMK bookkeeping; EAPOL-Key
//! processing lives in [`crate::handshake`] and FT in [`crate::ft`].

use std::time::{Duration, Instant};

use bytes::Bytes;
use zeroize::Zeroizing;

use rsnkey::derive::psk::PSK_LEN;
use rsnkey::derive::{PMK_LEN_MAX, PMK_LEN_MIN};
use rsnkey::ie::rsne::{caps, with_pmkid};
use rsnkey::ie::Rsne;
use rsnkey::kde::KeyData;
use rsnkey::{Akm, MacAddr, Pmkid, Proto, RsnKeyError};

use crate::config::{PmfMode, SupplicantConfig};
use crate::driver::{Driver, Eapol, PmkidReport, ReasonCode, WpaState};
use crate::error::{Result, SupplicantError};
use crate::ft::FtState;
use crate::handshake::{HandshakeContext, HandshakeExtension};
use crate::pmksa::{
    CurrentSelector, EntryHandle, FreeReason, Lookup, NetworkCtx, NewEntry, PmksaCache,
    PmksaConfig, Removal,
};
use crate::timer::{Scheduler, TimerKind};

/// One affiliated link of a multi-link association.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MldLink {
    pub link_id: u8,
    pub own_addr: MacAddr,
    pub bssid: MacAddr,
    /// RSNE and RSNXE the AP advertises on this link.
    pub ap_rsne: Option<Bytes>,
    pub ap_rsnxe: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MldParams {
    pub own_mld_addr: MacAddr,
    pub ap_mld_addr: MacAddr,
    /// Link the association exchange ran on.
    pub assoc_link_id: u8,
    pub links: Vec<MldLink>,
}

/// What the driver reports about a new (re)association.
#[derive(Debug, Clone, Default)]
pub struct AssocParams {
    pub bssid: MacAddr,
    pub network_ctx: NetworkCtx,
    /// RSNE or WPA IE sent in the (Re)Association Request; the configured
    /// suites without a PMKID when absent.
    pub own_ie: Option<Bytes>,
    pub own_rsnxe: Option<Bytes>,
    /// RSNE, RSNXE and WPA IE from the AP's Beacon or Probe Response.
    pub ap_ies: Option<Bytes>,
    /// Elements of the (Re)Association Response (MDE and FTE under FT).
    pub assoc_resp_ies: Option<Bytes>,
    pub mld: Option<MldParams>,
}

pub struct Supplicant<D: Driver, E: Eapol> {
    pub(crate) config: SupplicantConfig,
    pub(crate) driver: D,
    pub(crate) eapol: E,
    pub(crate) pmksa: PmksaCache,
    pub(crate) timers: Scheduler,
    pub(crate) ctx: Option<HandshakeContext>,
    pub(crate) ft: FtState,
    pub(crate) psk: Option<Zeroizing<[u8; PSK_LEN]>>,
    /// PMK supplied before the association it belongs to.
    pub(crate) pending_pmk: Option<Zeroizing<Vec<u8>>>,
    pub(crate) pfs_z: Option<Zeroizing<Vec<u8>>>,
    pub(crate) four_way_failures: u32,
    pub(crate) last_michael_failure: Option<Instant>,
}

impl<D: Driver, E: Eapol> Supplicant<D, E> {
    pub fn new(config: SupplicantConfig, driver: D, eapol: E) -> Result<Self> {
        config.validate()?;
        let psk = config.resolve_psk()?;
        let pmksa = PmksaCache::new(PmksaConfig {
            capacity: config.pmksa_capacity,
            lifetime: Duration::from_secs(u64::from(config.pmk_lifetime_secs)),
            reauth_threshold: config.pmk_reauth_threshold,
        });
        tracing::info!(
            proto = ?config.proto,
            akm = ?config.akm,
            pairwise = ?config.pairwise_cipher,
            group = ?config.group_cipher,
            "supplicant initialized"
        );
        Ok(Self {
            config,
            driver,
            eapol,
            pmksa,
            timers: Scheduler::new(),
            ctx: None,
            ft: FtState::default(),
            psk,
            pending_pmk: None,
            pfs_z: None,
            four_way_failures: 0,
            last_michael_failure: None,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &SupplicantConfig {
        &self.config
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn eapol(&self) -> &E {
        &self.eapol
    }

    pub fn eapol_mut(&mut self) -> &mut E {
        &mut self.eapol
    }

    pub fn state(&self) -> WpaState {
        self.ctx.as_ref().map_or(WpaState::Disconnected, |ctx| ctx.state)
    }

    pub fn context(&self) -> Option<&HandshakeContext> {
        self.ctx.as_ref()
    }

    pub fn pmksa(&self) -> &PmksaCache {
        &self.pmksa
    }

    pub fn four_way_failures(&self) -> u32 {
        self.four_way_failures
    }

    pub fn timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    /// When [`poll_timers`](Self::poll_timers) next has work.
    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub(crate) fn set_state(&mut self, state: WpaState) {
        if let Some(ctx) = self.ctx.as_mut() {
            if ctx.state != state {
                tracing::debug!(from = %ctx.state, to = %state, "key management state");
                ctx.state = state;
                self.driver.set_state(state);
            }
        }
    }

    // ── Association lifecycle ───────────────────────────────────────────

    /// RSNE/WPA IE for an association with `bssid`, carrying the PMKID of a
    /// cached PMKSA for it when one exists.
    pub fn assoc_ie(&self, bssid: MacAddr, network_ctx: NetworkCtx) -> Result<Bytes> {
        let ie = self.config.own_ie()?;
        let akm = self.config.akm;
        if self.config.proto != Proto::Rsn || !akm.uses_pmksa_cache() || akm.is_ft() {
            return Ok(Bytes::from(ie));
        }
        let cached = self
            .pmksa
            .lookup(&Lookup {
                aa: Some(bssid),
                network_ctx: Some(network_ctx),
                akm: Some(akm),
                ..Default::default()
            })
            .and_then(|h| self.pmksa.get(h));
        match cached {
            Some(entry) => Ok(Bytes::from(with_pmkid(&ie, &entry.pmkid)?)),
            None => Ok(Bytes::from(ie)),
        }
    }

    pub fn notify_assoc(&mut self, params: AssocParams) -> Result<()> {
        let now = self.driver.now();
        let akm = self.config.akm;
        let own_addr = params
            .mld
            .as_ref()
            .map_or_else(|| self.driver.own_addr(), |m| m.own_mld_addr);
        let aa = params.mld.as_ref().map_or(params.bssid, |m| m.ap_mld_addr);
        let ft_reassoc = akm.is_ft() && self.ft.completed && self.ft.target_ap == Some(params.bssid);
        tracing::info!(bssid = %aa, ft_reassoc, "association");

        // Delete the PTK SA of the previous association.
        if let Some(old) = self.ctx.take() {
            tracing::debug!(bssid = %old.bssid, "dropping previous security association");
        }
        self.timers.cancel(TimerKind::PtkRekey);
        if !ft_reassoc {
            self.driver.clear_keys();
        }

        let own_ie = match &params.own_ie {
            Some(ie) => ie.clone(),
            None => Bytes::from(self.config.own_ie()?),
        };
        let mut ctx = HandshakeContext::new(
            aa,
            own_addr,
            self.config.proto,
            akm,
            self.config.pairwise_cipher,
            self.config.group_cipher,
            self.config.group_mgmt_cipher.filter(|_| self.config.pmf != PmfMode::Disabled),
            params.network_ctx,
            self.config.ssid.as_bytes(),
            own_ie.clone(),
        );
        ctx.own_rsnxe = params.own_rsnxe.clone();
        ctx.pfs_z = self.pfs_z.clone();
        if let Some(ap_ies) = &params.ap_ies {
            let kd = KeyData::parse(ap_ies)?;
            ctx.ap_rsne = kd.rsne;
            ctx.ap_wpa_ie = kd.wpa_ie;
            ctx.ap_rsnxe = kd.rsnxe;
        }

        if ft_reassoc {
            return self.finish_ft_reassoc(ctx, &params);
        }
        self.ft.completed = false;

        if akm.is_psk() {
            if let Some(psk) = &self.psk {
                ctx.pmk = Zeroizing::new(psk.to_vec());
                if akm.is_ft() {
                    ctx.xxkey = Zeroizing::new(psk.to_vec());
                }
            }
        } else if let Some(pmk) = self.pending_pmk.take() {
            ctx.pmk = pmk;
        }

        let mut removals = Vec::new();
        if self.config.proto == Proto::Rsn && akm.uses_pmksa_cache() {
            let pmkid = Rsne::parse(&own_ie)
                .ok()
                .and_then(|ie| ie.pmkids.first().copied());
            let (found, evicted) = self.pmksa.select_current(
                &CurrentSelector {
                    pmkid,
                    bssid: Some(aa),
                    network_ctx: params.network_ctx,
                    try_opportunistic: self.config.okc,
                    fils_cache_id: None,
                    akm: Some(akm),
                },
                own_addr,
                now,
            )?;
            removals = evicted;
            if let Some(entry) = found.and_then(|h| self.pmksa.get(h)) {
                ctx.pmk = entry.pmk.clone();
                if akm.is_ft() && akm.is_sae() {
                    ctx.xxkey = entry.pmk.clone();
                }
            }
        }

        if akm.is_ft() {
            self.ft.reset();
            let ies = params.assoc_resp_ies.as_deref().unwrap_or_default();
            if let Err(err) = self.ft.set_assoc_resp(akm, ies) {
                tracing::warn!(error = %err, "FT: invalid Association Response elements");
                self.driver.deauthenticate(err.reason());
                return Err(err.into());
            }
            ctx.extensions.push(HandshakeExtension::Ft);
        }
        if let Some(mld) = params.mld.clone() {
            ctx.extensions.push(HandshakeExtension::Mlo(mld));
        }
        let ap_ocvc = ctx
            .ap_rsne
            .as_deref()
            .and_then(|ie| Rsne::parse(ie).ok())
            .is_some_and(|ie| ie.has_capability(caps::OCVC));
        if self.config.ocv && self.config.pmf != PmfMode::Disabled && ap_ocvc {
            ctx.extensions.push(HandshakeExtension::Oci);
        }
        if akm == Akm::Dpp {
            ctx.extensions.push(HandshakeExtension::Dpp);
        }
        if self.config.p2p_ip_addr_req {
            ctx.extensions.push(HandshakeExtension::P2pIpAddrReq);
        }

        self.ctx = Some(ctx);
        self.driver.set_state(WpaState::Associated);
        self.handle_removals(removals);
        self.rearm_pmksa_timers();
        Ok(())
    }

    /// Reassociation after FT authentication: no 4-Way Handshake, the keys
    /// come from FT authentication and the Reassociation Response.
    fn finish_ft_reassoc(&mut self, mut ctx: HandshakeContext, params: &AssocParams) -> Result<()> {
        ctx.msg3_ok = true;
        ctx.extensions.push(HandshakeExtension::Ft);
        self.ctx = Some(ctx);
        self.driver.set_state(WpaState::Associated);

        let ies = params.assoc_resp_ies.clone().unwrap_or_default();
        if let Err(err) = self.ft_validate_reassoc_resp(&ies, params.bssid) {
            tracing::warn!(error = %err, "FT: Reassociation Response rejected");
            self.deauthenticate(err.reason());
            return Err(err.into());
        }
        let installed = !self.ft.set_ptk_after_assoc;
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.ptk = self.ft.ptk.take();
            ctx.ptk_installed = installed;
        }
        self.key_neg_complete(true);
        self.rearm_pmksa_timers();
        Ok(())
    }

    pub fn notify_disassoc(&mut self) {
        let now = self.driver.now();
        self.timers.cancel(TimerKind::PtkRekey);
        if let Some(ctx) = self.ctx.take() {
            if ctx.state == WpaState::FourWayHandshake {
                self.four_way_failures += 1;
            }
            tracing::info!(bssid = %ctx.bssid, state = %ctx.state, "disassociated");
        }
        self.ft.reset();
        self.pmksa.clear_current();
        // Entries whose expiration was postponed for this association go now.
        let removals = self.pmksa.expire(now);
        self.handle_removals(removals);
        self.rearm_pmksa_timers();
        self.driver.set_state(WpaState::Disconnected);
    }

    /// Deauthenticate locally and tear the association down.
    pub fn deauthenticate(&mut self, reason: ReasonCode) {
        tracing::warn!(reason = reason.code(), "deauthenticating");
        self.driver.deauthenticate(reason);
        self.notify_disassoc();
    }

    // ── PMK sources ─────────────────────────────────────────────────────

    /// Use `pmk` for the current association (or the next one when not
    /// associated). RSN associations also get a PMKSA cache entry.
    pub fn set_pmk(&mut self, pmk: &[u8]) -> Result<()> {
        if !(PMK_LEN_MIN..=PMK_LEN_MAX).contains(&pmk.len()) {
            return Err(RsnKeyError::InvalidKeyLength {
                what: "PMK",
                len: pmk.len(),
            }
            .into());
        }
        let Some(ctx) = self.ctx.as_mut() else {
            self.pending_pmk = Some(Zeroizing::new(pmk.to_vec()));
            return Ok(());
        };
        ctx.pmk = Zeroizing::new(pmk.to_vec());
        let (aa, spa, network_ctx, akm) = (ctx.bssid, ctx.own_addr, ctx.network_ctx, ctx.akm);
        if self.config.proto == Proto::Rsn && akm.uses_pmksa_cache() && !akm.is_ft() {
            let h = self.add_pmksa_entry(NewEntry {
                pmk,
                pmkid: None,
                kck: None,
                aa,
                spa,
                network_ctx,
                akm,
                fils_cache_id: None,
                external: false,
            })?;
            self.pmksa.set_current(Some(h));
            self.rearm_pmksa_timers();
        }
        Ok(())
    }

    /// Shared secret from a PFS exchange, mixed into the next PTK.
    pub fn set_pfs_secret(&mut self, z: &[u8]) {
        self.pfs_z = Some(Zeroizing::new(z.to_vec()));
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.pfs_z = Some(Zeroizing::new(z.to_vec()));
        }
    }

    // ── PMKSA cache ─────────────────────────────────────────────────────

    /// Add a PMKSA produced outside the 4-Way Handshake (SAE, OWE, DPP,
    /// FILS).
    pub fn pmksa_add(
        &mut self,
        pmk: &[u8],
        pmkid: Option<Pmkid>,
        aa: MacAddr,
        network_ctx: NetworkCtx,
        akm: Akm,
        fils_cache_id: Option<[u8; 2]>,
    ) -> Result<EntryHandle> {
        let spa = self
            .ctx
            .as_ref()
            .map_or_else(|| self.driver.own_addr(), |ctx| ctx.own_addr);
        self.add_pmksa_entry(NewEntry {
            pmk,
            pmkid,
            kck: None,
            aa,
            spa,
            network_ctx,
            akm,
            fils_cache_id,
            external: true,
        })
    }

    pub(crate) fn add_pmksa_entry(&mut self, new: NewEntry<'_>) -> Result<EntryHandle> {
        let now = self.driver.now();
        let (handle, removals) = self.pmksa.add(new, now)?;
        if let Some(entry) = self.pmksa.get(handle) {
            self.driver.add_pmkid(&PmkidReport {
                network_ctx: entry.network_ctx,
                aa: entry.aa,
                pmkid: &entry.pmkid,
                akm: entry.akm,
                lifetime_secs: self.config.pmk_lifetime_secs,
                reauth_threshold: self.config.pmk_reauth_threshold,
                fils_cache_id: entry.fils_cache_id,
            });
        }
        self.handle_removals(removals);
        self.rearm_pmksa_timers();
        Ok(handle)
    }

    /// Remove entries matching the filters; returns how many went.
    pub fn pmksa_flush(
        &mut self,
        network_ctx: Option<NetworkCtx>,
        pmk: Option<&[u8]>,
        external_only: bool,
    ) -> usize {
        let removals = self.pmksa.flush(network_ctx, pmk, external_only);
        let count = removals.len();
        self.handle_removals(removals);
        self.rearm_pmksa_timers();
        count
    }

    pub fn pmksa_list(&self) -> String {
        self.pmksa.list(self.driver.now())
    }

    /// React to entries leaving the cache: withdraw them from the driver,
    /// and drop the association when the PMK in use is gone.
    pub(crate) fn handle_removals(&mut self, removals: Vec<Removal>) {
        let mut deauth = false;
        for r in removals {
            self.driver
                .remove_pmkid(r.entry.network_ctx, r.entry.aa, &r.entry.pmkid);
            if r.was_current && r.reason != FreeReason::Replace {
                deauth = true;
            }
            if r.reason == FreeReason::Expire {
                let in_use = self.ctx.as_ref().is_some_and(|ctx| {
                    !ctx.pmk.is_empty() && ctx.pmk.as_slice() == r.entry.pmk.as_slice()
                });
                if in_use {
                    tracing::debug!(aa = %r.entry.aa, "deauthenticating due to expired PMK");
                    self.pmksa.clear_current();
                    deauth = true;
                }
            }
        }
        if deauth {
            if let Some(ctx) = self.ctx.as_mut() {
                ctx.pmk = Zeroizing::new(Vec::new());
                self.deauthenticate(ReasonCode::Unspecified);
            }
        }
    }

    pub(crate) fn rearm_pmksa_timers(&mut self) {
        match self.pmksa.next_expiry() {
            Some(at) => {
                self.timers.schedule(TimerKind::PmksaExpire, at);
            }
            None => {
                self.timers.cancel(TimerKind::PmksaExpire);
            }
        }
        match self.pmksa.reauth_deadline() {
            Some(at) => {
                self.timers.schedule(TimerKind::PmksaReauth, at);
            }
            None => {
                self.timers.cancel(TimerKind::PmksaReauth);
            }
        }
    }

    // ── Timers ──────────────────────────────────────────────────────────

    /// Run every timer due at the driver's current time.
    pub fn poll_timers(&mut self) {
        let now = self.driver.now();
        for kind in self.timers.poll_expired(now) {
            tracing::trace!(?kind, "timer fired");
            match kind {
                TimerKind::PmksaExpire => {
                    let removals = self.pmksa.expire(now);
                    self.handle_removals(removals);
                    self.rearm_pmksa_timers();
                }
                TimerKind::PmksaReauth => self.pmksa_reauth(),
                TimerKind::PtkRekey => self.rekey_ptk(),
            }
        }
    }

    fn pmksa_reauth(&mut self) {
        if let Some(entry) = self.pmksa.current() {
            tracing::debug!(aa = %entry.aa, "PMKSA cache entry reached re-authentication time");
            if self.config.driver_roaming {
                self.driver
                    .remove_pmkid(entry.network_ctx, entry.aa, &entry.pmkid);
            } else {
                self.eapol.request_reauth();
            }
        }
        self.pmksa.clear_current();
        self.rearm_pmksa_timers();
    }

    pub(crate) fn require_ctx(&self) -> Result<&HandshakeContext> {
        self.ctx.as_ref().ok_or(SupplicantError::NotAssociated)
    }
}
