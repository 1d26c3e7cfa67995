//! Fast BSS Transition (802.11r).
//!
//! The initial mobility domain association runs a normal 4-Way Handshake
//! with the FT key hierarchy (XXKey → PMK-R0 → PMK-R1 → PTK). Later
//! transitions within the mobility domain derive a fresh PMK-R1 and PTK
//! from the stored PMK-R0 during FT authentication, either over the air
//! (Authentication frames) or over the DS (FT Action frames through the
//! current AP), and verify the target's Reassociation Response.
//!
//! FT element MICs use sequence number 5 for the Reassociation Request and
//! 6 for the Reassociation Response, over
//! `STA ‖ AP ‖ seq ‖ RSNE ‖ MDE ‖ FTE(MIC zeroed) [‖ RSNXE]`.

pub mod action;
pub mod r1kh;

use std::fmt;

use bytes::Bytes;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

use rsnkey::crypto::{aes_unwrap, ft_mic};
use rsnkey::derive::{derive_pmk_r1, pmk_r1_to_ptk, PmkR0, PmkR1};
use rsnkey::ie::rsne::caps;
use rsnkey::ie::{self, Fte, Mde, Rsne, EID_FAST_BSS_TRANSITION, EID_MOBILITY_DOMAIN, EID_RSN, EID_RSNX};
use rsnkey::kde::IPN_LEN;
use rsnkey::{Akm, MacAddr, Nonce, Pmkid, Ptk};

use crate::config::PmfMode;
use crate::driver::{Driver, Eapol, KeyInstall, KeyKind, ReasonCode};
use crate::error::Result;
use crate::keys::{self, GroupKey, MgmtGroupKey};
use crate::supplicant::Supplicant;

pub use r1kh::R1khTable;

/// FT MIC transaction sequence numbers.
const MIC_SEQ_REASSOC_REQ: u8 = 5;
const MIC_SEQ_REASSOC_RESP: u8 = 6;

/// GTK subelement: Key Info(2) | Key Length(1) | RSC(8) | Wrapped Key.
const GTK_SUBELEM_FIXED: usize = 2 + 1 + 8;
/// IGTK/BIGTK subelement: Key ID(2) | IPN(6) | Key Length(1) | Wrapped Key.
const IGTK_SUBELEM_FIXED: usize = 2 + IPN_LEN + 1;
const KEY_WRAP_OVERHEAD: usize = 8;

#[derive(Debug, Error)]
pub enum FtError {
    #[error("MDE: {0}")]
    Mde(String),

    #[error("FTE: {0}")]
    Fte(String),

    #[error("RSNE: {0}")]
    Pmkid(String),

    #[error("{0}")]
    State(String),

    #[error("key installation failed: {0}")]
    KeyInstall(String),
}

impl FtError {
    /// Reason code used when a Reassociation Response fails validation.
    pub fn reason(&self) -> ReasonCode {
        match self {
            FtError::Mde(_) => ReasonCode::InvalidMde,
            FtError::Fte(_) => ReasonCode::InvalidFte,
            FtError::Pmkid(_) => ReasonCode::InvalidPmkid,
            FtError::State(_) | FtError::KeyInstall(_) => ReasonCode::Unspecified,
        }
    }
}

/// FT key hierarchy and transition progress. Survives reassociations inside
/// the mobility domain; reset when the station leaves it.
#[derive(Default)]
pub struct FtState {
    pub(crate) mdid: Option<[u8; 2]>,
    pub(crate) ft_capab: u8,
    pub(crate) r0kh_id: Vec<u8>,
    pub(crate) r1kh_id: Option<MacAddr>,
    pub(crate) pmk_r0: Option<PmkR0>,
    pub(crate) pmk_r1: Option<PmkR1>,
    /// MDE ‖ FTE from the latest (Re)Association Response.
    pub(crate) assoc_resp_ies: Option<Bytes>,
    pub(crate) snonce: Nonce,
    pub(crate) anonce: Nonce,
    pub(crate) target_ap: Option<MacAddr>,
    pub(crate) over_ds_in_progress: bool,
    /// FT authentication finished; the reassociation will not run a 4-Way
    /// Handshake.
    pub(crate) completed: bool,
    pub(crate) ptk: Option<Ptk>,
    /// The driver refused the PTK before reassociation; install it after.
    pub(crate) set_ptk_after_assoc: bool,
    pub(crate) r1kh: R1khTable,
}

impl fmt::Debug for FtState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtState")
            .field("mdid", &self.mdid.map(|m| rsnkey::hex(&m)))
            .field("r1kh_id", &self.r1kh_id)
            .field("pmk_r0", &self.pmk_r0.as_ref().map(|r0| rsnkey::hex(&r0.name)))
            .field("pmk_r1", &self.pmk_r1)
            .field("target_ap", &self.target_ap)
            .field("over_ds_in_progress", &self.over_ds_in_progress)
            .field("completed", &self.completed)
            .finish()
    }
}

impl FtState {
    pub fn mdid(&self) -> Option<[u8; 2]> {
        self.mdid
    }

    pub fn pmk_r0_name(&self) -> Option<Pmkid> {
        self.pmk_r0.as_ref().map(|r0| r0.name)
    }

    pub fn pmk_r1_name(&self) -> Option<Pmkid> {
        self.pmk_r1.as_ref().map(|r1| r1.name)
    }

    pub fn snonce(&self) -> &Nonce {
        &self.snonce
    }

    pub fn target_ap(&self) -> Option<MacAddr> {
        self.target_ap
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn r1kh(&self) -> &R1khTable {
        &self.r1kh
    }

    /// Drop the key hierarchy and any transition in progress.
    pub(crate) fn reset(&mut self) {
        *self = FtState::default();
    }

    /// Record MDE and FTE of an initial mobility domain association.
    pub(crate) fn set_assoc_resp(&mut self, akm: Akm, ies: &[u8]) -> std::result::Result<(), FtError> {
        let mde_raw = ie::find(ies, EID_MOBILITY_DOMAIN)
            .ok_or_else(|| FtError::Mde("no MDE in Association Response".into()))?;
        let mde = Mde::parse(mde_raw).map_err(|e| FtError::Mde(e.to_string()))?;
        let mut stored = mde_raw.to_vec();
        if let Some(fte_raw) = ie::find(ies, EID_FAST_BSS_TRANSITION) {
            let fte = Fte::parse(fte_raw, fte_mic_len(akm, None))
                .map_err(|e| FtError::Fte(e.to_string()))?;
            if let Some(r0kh) = fte.r0kh_id {
                self.r0kh_id = r0kh;
            }
            if fte.r1kh_id.is_some() {
                self.r1kh_id = fte.r1kh_id;
            }
            stored.extend_from_slice(fte_raw);
        }
        self.mdid = Some(mde.mdid);
        self.ft_capab = mde.ft_capab;
        self.assoc_resp_ies = Some(Bytes::from(stored));
        Ok(())
    }
}

/// FTE MIC length. FT-SAE-EXT-KEY signals it in MIC Control.
fn fte_mic_len(akm: Akm, key_len: Option<usize>) -> Option<usize> {
    match (akm, key_len) {
        (Akm::FtSaeExtKey, None) => None,
        (_, Some(len)) => Some(akm.mic_len(len)),
        (_, None) => Some(akm.mic_len(32)),
    }
}

fn state_err(msg: &str) -> FtError {
    FtError::State(msg.to_string())
}

impl<D: Driver, E: Eapol> Supplicant<D, E> {
    pub fn ft_state(&self) -> &FtState {
        &self.ft
    }

    /// Draw a fresh SNonce and build the FT elements for the next
    /// Authentication Request. The driver gets a copy.
    pub fn ft_prepare_auth_request(&mut self) -> Result<Bytes> {
        let r0_name = self
            .ft
            .pmk_r0
            .as_ref()
            .map(|r0| r0.name)
            .ok_or_else(|| state_err("no PMK-R0"))?;
        let mdid = self.ft.mdid.ok_or_else(|| state_err("no mobility domain"))?;
        self.ft.snonce = rsnkey::random_nonce();
        self.ft.completed = false;
        let ies = self.ft_gen_req_ies(None, &r0_name, None, MacAddr::ZERO)?;
        self.driver.update_ft_ies(mdid, &ies);
        Ok(Bytes::from(ies))
    }

    /// Begin an over-the-air transition to `target_ap`: returns the FT
    /// elements for the Authentication frame.
    pub fn ft_start_over_air(&mut self, target_ap: MacAddr) -> Result<Bytes> {
        let ies = self.ft_prepare_auth_request()?;
        self.ft.target_ap = Some(target_ap);
        self.ft.over_ds_in_progress = false;
        tracing::info!(target = %target_ap, "FT: starting over-the-air transition");
        Ok(ies)
    }

    /// Begin an over-the-DS transition: send an FT Request through the
    /// current AP.
    pub fn ft_start_over_ds(&mut self, target_ap: MacAddr) -> Result<()> {
        let current = self
            .ctx
            .as_ref()
            .map(|ctx| ctx.bssid)
            .ok_or(crate::error::SupplicantError::NotAssociated)?;
        let ies = self.ft_prepare_auth_request()?;
        let frame = action::encode_request(self.driver.own_addr(), target_ap, &ies);
        self.driver.send_ft_action(current, frame)?;
        self.ft.target_ap = Some(target_ap);
        self.ft.over_ds_in_progress = true;
        tracing::info!(target = %target_ap, via = %current, "FT: sent FT Request over the DS");
        Ok(())
    }

    /// Handle an FT Action frame (FT Response) received over the DS.
    pub fn ft_rx_action(&mut self, frame: &[u8]) -> Result<Bytes> {
        let resp = action::decode_response(frame)?;
        if resp.sta != self.driver.own_addr() {
            return Err(state_err("FT Response for another station").into());
        }
        if resp.status != 0 {
            self.ft.over_ds_in_progress = false;
            return Err(FtError::State(format!("FT Response status {}", resp.status)).into());
        }
        self.ft_process_response(&resp.ies, true, resp.target_ap)
    }

    /// Process FT elements from an Authentication Response (or an FT Action
    /// response). On success the PTK for `target_ap` is derived and the
    /// Reassociation Request elements are returned (and given to the driver).
    pub fn ft_process_response(&mut self, ies: &[u8], ft_action: bool, target_ap: MacAddr) -> Result<Bytes> {
        let akm = self.config.akm;
        if !akm.is_ft() {
            return Err(state_err("FT not in use").into());
        }
        if ft_action {
            if !self.ft.over_ds_in_progress || self.ft.target_ap != Some(target_ap) {
                return Err(state_err("no over-the-DS transition in progress for this target").into());
            }
            self.ft.over_ds_in_progress = false;
        }

        let mdid = self.ft.mdid.ok_or_else(|| state_err("no mobility domain"))?;
        let mde_raw = ie::find(ies, EID_MOBILITY_DOMAIN).ok_or_else(|| FtError::Mde("missing".into()))?;
        let mde = Mde::parse(mde_raw).map_err(|e| FtError::Mde(e.to_string()))?;
        if mde.mdid != mdid {
            return Err(FtError::Mde("MDID does not match the current mobility domain".into()).into());
        }

        let r0 = self.ft.pmk_r0.clone().ok_or_else(|| state_err("no PMK-R0"))?;
        let fte_raw = ie::find(ies, EID_FAST_BSS_TRANSITION).ok_or_else(|| FtError::Fte("missing".into()))?;
        let fte = Fte::parse(fte_raw, fte_mic_len(akm, Some(r0.key().len())))
            .map_err(|e| FtError::Fte(e.to_string()))?;
        if fte.snonce != self.ft.snonce {
            return Err(FtError::Fte("SNonce mismatch".into()).into());
        }
        if fte.r0kh_id.as_deref() != Some(self.ft.r0kh_id.as_slice()) {
            return Err(FtError::Fte("R0KH-ID mismatch".into()).into());
        }
        let r1kh_id = fte.r1kh_id.ok_or_else(|| FtError::Fte("no R1KH-ID".into()))?;

        let rsne_raw = ie::find(ies, EID_RSN).ok_or_else(|| FtError::Pmkid("missing".into()))?;
        let rsne = Rsne::parse(rsne_raw).map_err(|e| FtError::Pmkid(e.to_string()))?;
        if rsne.pmkids.first() != Some(&r0.name) {
            return Err(FtError::Pmkid("PMKR0Name mismatch".into()).into());
        }
        if self.config.pmf == PmfMode::Required && !rsne.has_capability(caps::MFPC) {
            return Err(state_err("target AP does not support PMF").into());
        }

        let own = self.driver.own_addr();
        let r1 = derive_pmk_r1(&r0, r1kh_id, own)?;
        self.ft.r1kh.record(target_ap, r1kh_id);
        let (ptk, _ptk_name) = pmk_r1_to_ptk(
            &r1,
            akm,
            self.config.pairwise_cipher,
            &self.ft.snonce,
            &fte.anonce,
            target_ap,
            own,
            self.config.kdk_len,
        )?;
        self.ft.anonce = fte.anonce;
        self.ft.r1kh_id = Some(r1kh_id);
        let r1_name = r1.name;
        self.ft.pmk_r1 = Some(r1);

        let anonce = fte.anonce;
        let ies = self.ft_gen_req_ies(Some(&anonce), &r1_name, Some(ptk.kck()), target_ap)?;
        self.driver.update_ft_ies(mdid, &ies);

        self.ft.ptk = Some(ptk);
        match self.ft_install_ptk(target_ap) {
            Ok(()) => self.ft.set_ptk_after_assoc = false,
            Err(err) => {
                tracing::debug!(error = %err, "FT: PTK not accepted yet, installing after reassociation");
                self.ft.set_ptk_after_assoc = true;
            }
        }
        self.ft.target_ap = Some(target_ap);
        self.ft.completed = true;
        tracing::info!(target = %target_ap, "FT: authentication completed");
        Ok(Bytes::from(ies))
    }

    /// Build RSNE ‖ MDE ‖ FTE [‖ RSNXE]. With a KCK the FTE carries the
    /// Reassociation Request MIC.
    fn ft_gen_req_ies(
        &mut self,
        anonce: Option<&Nonce>,
        pmk_name: &Pmkid,
        kck: Option<&[u8]>,
        target_ap: MacAddr,
    ) -> Result<Vec<u8>> {
        let akm = self.config.akm;
        let r0_len = self
            .ft
            .pmk_r0
            .as_ref()
            .map(|r0| r0.key().len())
            .ok_or_else(|| state_err("no PMK-R0"))?;
        let mdid = self.ft.mdid.ok_or_else(|| state_err("no mobility domain"))?;

        let mut rsne = Rsne::parse(&self.config.own_ie()?)?;
        rsne.pmkids = vec![*pmk_name];
        let rsne = rsne.encode()?;
        let mde = Mde {
            mdid,
            ft_capab: self.ft.ft_capab,
        }
        .encode();
        let rsnxe = self.ctx.as_ref().and_then(|ctx| ctx.own_rsnxe.clone());

        let mut fte = Fte {
            element_count: 0,
            rsnxe_used: rsnxe.is_some(),
            mic: vec![0; akm.mic_len(r0_len)],
            anonce: anonce.copied().unwrap_or_default(),
            snonce: self.ft.snonce,
            r1kh_id: anonce.and(self.ft.r1kh_id),
            r0kh_id: Some(self.ft.r0kh_id.clone()),
            ..Default::default()
        };
        if kck.is_some() && self.config.ocv {
            if let Some(oci) = self.driver.channel_info() {
                fte.oci = Some(oci.body().to_vec());
            }
        }
        if let Some(kck) = kck {
            fte.element_count = 3 + u8::from(rsnxe.is_some());
            let zeroed = fte.encode_mic_zeroed()?;
            let own = self.driver.own_addr();
            fte.mic = ft_mic(
                kck,
                &[
                    own.as_bytes(),
                    target_ap.as_bytes(),
                    &[MIC_SEQ_REASSOC_REQ],
                    &rsne,
                    &mde,
                    &zeroed,
                    rsnxe.as_deref().unwrap_or_default(),
                ],
            )?;
        }

        let mut out = rsne;
        out.extend_from_slice(&mde);
        out.extend_from_slice(&fte.encode()?);
        if let Some(rsnxe) = rsnxe {
            out.extend_from_slice(&rsnxe);
        }
        Ok(out)
    }

    fn ft_install_ptk(&mut self, peer: MacAddr) -> std::result::Result<(), FtError> {
        let cipher = self.config.pairwise_cipher;
        let ptk = self.ft.ptk.as_ref().ok_or_else(|| state_err("no PTK"))?;
        let tk = ptk.tk_for_install(cipher);
        let rsc = [0u8; 6];
        self.driver
            .install_key(&KeyInstall {
                kind: KeyKind::Pairwise,
                cipher,
                key_idx: 0,
                addr: peer,
                set_tx: true,
                rsc: &rsc[..cipher.rsc_len()],
                key: &tk,
                link_id: None,
            })
            .map_err(|e| FtError::KeyInstall(e.to_string()))?;
        if let Some(ptk) = self.ft.ptk.as_mut() {
            ptk.clear_tk();
        }
        Ok(())
    }

    /// Verify the Reassociation Response of a completed FT transition and
    /// install the group keys it carries.
    pub(crate) fn ft_validate_reassoc_resp(&mut self, ies: &[u8], src: MacAddr) -> std::result::Result<(), FtError> {
        let akm = self.config.akm;
        if !self.ft.completed {
            return Err(state_err("no FT authentication completed"));
        }
        let mdid = self.ft.mdid.ok_or_else(|| state_err("no mobility domain"))?;

        let mde_raw = ie::find(ies, EID_MOBILITY_DOMAIN).ok_or_else(|| FtError::Mde("missing".into()))?;
        let mde = Mde::parse(mde_raw).map_err(|e| FtError::Mde(e.to_string()))?;
        if mde.mdid != mdid {
            return Err(FtError::Mde("MDID mismatch".into()));
        }

        let r1 = self.ft.pmk_r1.as_ref().ok_or_else(|| state_err("no PMK-R1"))?;
        let key_len = self.ft.pmk_r0.as_ref().map(|r0| r0.key().len());
        let fte_raw = ie::find(ies, EID_FAST_BSS_TRANSITION).ok_or_else(|| FtError::Fte("missing".into()))?;
        let fte = Fte::parse(fte_raw, fte_mic_len(akm, key_len)).map_err(|e| FtError::Fte(e.to_string()))?;
        if fte.snonce != self.ft.snonce {
            return Err(FtError::Fte("SNonce mismatch".into()));
        }
        if fte.anonce != self.ft.anonce {
            return Err(FtError::Fte("ANonce mismatch".into()));
        }
        if fte.r0kh_id.as_deref() != Some(self.ft.r0kh_id.as_slice()) {
            return Err(FtError::Fte("R0KH-ID mismatch".into()));
        }
        if fte.r1kh_id.is_none() || fte.r1kh_id != self.ft.r1kh_id {
            return Err(FtError::Fte("R1KH-ID mismatch".into()));
        }

        let rsne_raw = ie::find(ies, EID_RSN).ok_or_else(|| FtError::Pmkid("missing".into()))?;
        let rsne = Rsne::parse(rsne_raw).map_err(|e| FtError::Pmkid(e.to_string()))?;
        if rsne.pmkids.len() != 1 || rsne.pmkids[0] != r1.name {
            return Err(FtError::Pmkid("PMKR1Name mismatch".into()));
        }

        let rsnxe_raw = ie::find(ies, EID_RSNX);
        let expected_count = 3 + u8::from(rsnxe_raw.is_some());
        if fte.element_count != expected_count {
            return Err(FtError::Fte(format!(
                "element count {} (expected {expected_count})",
                fte.element_count
            )));
        }

        let ptk = self.ft.ptk.as_ref().ok_or_else(|| state_err("no PTK"))?;
        let mic_len = fte.mic.len();
        let mut zeroed = fte_raw.to_vec();
        zeroed[4..4 + mic_len].fill(0);
        let own = self.driver.own_addr();
        let mic = ft_mic(
            ptk.kck(),
            &[
                own.as_bytes(),
                src.as_bytes(),
                &[MIC_SEQ_REASSOC_RESP],
                rsne_raw,
                mde_raw,
                &zeroed,
                rsnxe_raw.unwrap_or_default(),
            ],
        )
        .map_err(|e| FtError::Fte(e.to_string()))?;
        if !bool::from(mic.as_slice().ct_eq(fte.mic.as_slice())) {
            return Err(FtError::Fte("invalid MIC in Reassociation Response".into()));
        }

        let kek = Zeroizing::new(ptk.kek().to_vec());
        if let Some(gtk) = &fte.gtk {
            self.ft_install_gtk_subelem(&kek, gtk)?;
        }
        if let (Some(igtk), Some(cipher)) = (&fte.igtk, self.config.group_mgmt_cipher) {
            self.ft_install_igtk_subelem(&kek, igtk, KeyKind::Igtk, cipher)?;
        }
        if self.config.beacon_protection {
            if let (Some(bigtk), Some(cipher)) = (&fte.bigtk, self.config.group_mgmt_cipher) {
                self.ft_install_igtk_subelem(&kek, bigtk, KeyKind::Bigtk, cipher)?;
            }
        }

        if self.ft.set_ptk_after_assoc {
            self.ft_install_ptk(src)?;
            self.ft.set_ptk_after_assoc = false;
        }
        tracing::debug!(bssid = %src, "FT: Reassociation Response validated");
        Ok(())
    }

    fn ft_install_gtk_subelem(&mut self, kek: &[u8], body: &[u8]) -> std::result::Result<(), FtError> {
        if body.len() < GTK_SUBELEM_FIXED + 24 || (body.len() - GTK_SUBELEM_FIXED) % 8 != 0 {
            return Err(FtError::Fte(format!("GTK subelement of {} bytes", body.len())));
        }
        let cipher = self.config.group_cipher;
        let key_info = u16::from_le_bytes([body[0], body[1]]);
        let key_len = usize::from(body[2]);
        if key_len != cipher.key_len() {
            return Err(FtError::Fte(format!("GTK length {key_len}")));
        }
        let rsc = &body[3..GTK_SUBELEM_FIXED];
        let plain = Zeroizing::new(
            aes_unwrap(kek, &body[GTK_SUBELEM_FIXED..]).map_err(|e| FtError::Fte(e.to_string()))?,
        );
        if plain.len() < key_len {
            return Err(FtError::Fte("GTK shorter than its key length".into()));
        }
        let ctx = self.ctx.as_mut().ok_or_else(|| state_err("not associated"))?;
        keys::install_gtk(
            &mut self.driver,
            &mut ctx.keys,
            cipher,
            &GroupKey {
                key_idx: (key_info & 0x03) as u8,
                tx: false,
                rsc,
                key: &plain[..key_len],
                link_id: None,
            },
        )
        .map_err(|e| FtError::KeyInstall(e.to_string()))?;
        Ok(())
    }

    fn ft_install_igtk_subelem(
        &mut self,
        kek: &[u8],
        body: &[u8],
        kind: KeyKind,
        cipher: rsnkey::Cipher,
    ) -> std::result::Result<(), FtError> {
        let key_len = cipher.key_len();
        if body.len() != IGTK_SUBELEM_FIXED + key_len + KEY_WRAP_OVERHEAD {
            return Err(FtError::Fte(format!("{kind:?} subelement of {} bytes", body.len())));
        }
        if usize::from(body[2 + IPN_LEN]) != key_len {
            return Err(FtError::Fte(format!("{kind:?} key length {}", body[2 + IPN_LEN])));
        }
        let key_id = u16::from_le_bytes([body[0], body[1]]);
        let mut ipn = [0u8; IPN_LEN];
        ipn.copy_from_slice(&body[2..2 + IPN_LEN]);
        let plain = Zeroizing::new(
            aes_unwrap(kek, &body[IGTK_SUBELEM_FIXED..]).map_err(|e| FtError::Fte(e.to_string()))?,
        );
        let compat = self.config.igtk_keyid_byte_swap_compat;
        let ctx = self.ctx.as_mut().ok_or_else(|| state_err("not associated"))?;
        keys::install_mgmt_group_key(
            &mut self.driver,
            &mut ctx.keys,
            kind,
            cipher,
            &MgmtGroupKey {
                key_id,
                ipn: &ipn,
                key: &plain,
                link_id: None,
            },
            compat,
        )
        .map_err(|e| FtError::KeyInstall(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reassoc_failures_map_to_element_reasons() {
        assert_eq!(FtError::Mde("x".into()).reason(), ReasonCode::InvalidMde);
        assert_eq!(FtError::Fte("x".into()).reason(), ReasonCode::InvalidFte);
        assert_eq!(FtError::Pmkid("x".into()).reason(), ReasonCode::InvalidPmkid);
        assert_eq!(ReasonCode::InvalidFte.code(), 51);
    }

    #[test]
    fn assoc_resp_elements_recorded() {
        let mut ft = FtState::default();
        let mde = Mde {
            mdid: [0x12, 0x34],
            ft_capab: 1,
        }
        .encode();
        let fte = Fte {
            mic: vec![0; 16],
            r1kh_id: Some(MacAddr([2, 0, 0, 0, 0, 9])),
            r0kh_id: Some(b"r0kh.example".to_vec()),
            ..Default::default()
        }
        .encode()
        .unwrap();
        let mut ies = mde.clone();
        ies.extend_from_slice(&fte);

        ft.set_assoc_resp(Akm::FtPsk, &ies).unwrap();
        assert_eq!(ft.mdid(), Some([0x12, 0x34]));
        assert_eq!(ft.r0kh_id, b"r0kh.example");
        assert_eq!(ft.r1kh_id, Some(MacAddr([2, 0, 0, 0, 0, 9])));
        assert_eq!(ft.assoc_resp_ies.as_deref(), Some(ies.as_slice()));
    }

    #[test]
    fn assoc_resp_without_mde_rejected() {
        let mut ft = FtState::default();
        let err = ft.set_assoc_resp(Akm::FtPsk, &[]).unwrap_err();
        assert_eq!(err.reason(), ReasonCode::InvalidMde);
    }
}
