//! EAPOL-Key handshake engine.
//!
//! `rx_eapol` runs the checks every EAPOL-Key frame goes through (packet
//! and descriptor type, descriptor version, replay counter, flag sanity,
//! MIC, key data decryption) and dispatches to the 4-Way Handshake
//! ([`fourway`]) or Group Key Handshake ([`group`]) handlers. Every failure
//! is a [`HandshakeError`] whose [`Disposition`] decides what happens to
//! the association.

pub mod context;
pub mod extension;
pub mod fourway;
pub mod group;
pub mod request;

use thiserror::Error;
use zeroize::Zeroizing;

use rsnkey::eapol::{
    packet_type, PacketType, DESC_TYPE_RSN, DESC_TYPE_WPA, KEY_DESC_VER_AES_128_CMAC,
    KEY_DESC_VER_AKM_DEFINED, KEY_DESC_VER_HMAC_SHA1_AES,
};
use rsnkey::{Cipher, EapolKeyFrame, KeyInfo, MacAddr, Proto, RsnKeyError};

use crate::driver::{Driver, Eapol, ReasonCode};
use crate::supplicant::Supplicant;

pub use context::HandshakeContext;
pub use extension::HandshakeExtension;

/// What the supplicant does about a failed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Discard the frame; the association is unaffected.
    Drop,
    /// Tear the association down locally.
    Deauth(ReasonCode),
    /// Send an EAPOL-Start to restart EAP authentication.
    Fallback,
    /// Disconnect and associate again.
    Reconnect,
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    // ── Malformed or unauthenticated: dropped ──────────────────────────
    #[error("malformed EAPOL-Key frame: {0}")]
    Malformed(#[source] RsnKeyError),

    #[error("EAPOL packet type {0} is not EAPOL-Key")]
    NotKeyFrame(u8),

    #[error("unexpected key descriptor type {0}")]
    DescriptorType(u8),

    #[error("unsupported key descriptor version {got} (expected {expected})")]
    DescriptorVersion { got: u8, expected: u8 },

    #[error("replay counter {received} did not increase over {last}")]
    Replay { received: u64, last: u64 },

    #[error("SMK bit set")]
    SmkMessage,

    #[error("Ack bit not set")]
    NoAck,

    #[error("Request bit set")]
    RequestBit,

    #[error("pairwise EAPOL-Key with non-zero key index {0}")]
    PairwiseKeyIndex(u8),

    #[error("group EAPOL-Key without MIC or encrypted key data")]
    GroupWithoutMic,

    #[error("encrypted key data without MIC")]
    UnauthenticatedKeyData,

    #[error("invalid EAPOL-Key MIC")]
    MicFailure,

    #[error("no PTK available")]
    NoPtk,

    #[error("key data decryption failed: {0}")]
    KeyDataDecrypt(#[source] RsnKeyError),

    #[error("not associated")]
    NotAssociated,

    #[error("no PMK available for {0}")]
    NoPmk(MacAddr),

    // ── Recoverable by re-authentication ───────────────────────────────
    #[error("no PMKSA entry; full EAP authentication requested")]
    NeedFullAuth,

    #[error("PTK0 rekey not allowed")]
    Ptk0RekeyDenied,

    // ── Protocol inconsistencies: deauthenticate ───────────────────────
    #[error("ANonce from Message 1 differs from Message 3")]
    AnonceMismatch,

    #[error("{0}")]
    IeMismatch(String),

    #[error("RSNXE mismatch between Beacon/ProbeResp and EAPOL-Key Message 3")]
    RsnxeMismatch,

    #[error("no RSNE/WPA IE known for the AP")]
    ApIesUnavailable,

    #[error("invalid {what} length {got} (expected {expected})")]
    KeyLength {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("{0} in unencrypted key data")]
    UnencryptedKey(&'static str),

    #[error("no GTK KDE in {0}")]
    MissingGtk(&'static str),

    #[error("invalid key data: {0}")]
    KeyData(#[source] RsnKeyError),

    #[error("invalid {kind} key ID {id}")]
    KeyId { kind: &'static str, id: u16 },

    #[error("FT: {0}")]
    Ft(String),

    #[error("OCV: {0}")]
    Ocv(String),

    #[error("MLO: {0}")]
    Mlo(String),

    #[error("DPP: {0}")]
    Dpp(String),

    #[error("Group Key Handshake started before 4-Way Handshake completion")]
    GroupBeforePairwise,

    #[error("PMKID mismatch: authentication server may have derived a different MSK")]
    PmkidMismatch,

    #[error("EAPOL-Start fallback limit ({0}) reached")]
    FallbackExhausted(u32),

    #[error("key derivation failed: {0}")]
    Derivation(#[source] RsnKeyError),

    #[error("key installation failed: {0}")]
    KeyInstall(String),

    #[error("transmit failed: {0}")]
    Transmit(String),
}

impl HandshakeError {
    pub fn disposition(&self) -> Disposition {
        use HandshakeError::*;
        match self {
            Malformed(_) | NotKeyFrame(_) | DescriptorType(_) | DescriptorVersion { .. }
            | Replay { .. } | SmkMessage | NoAck | RequestBit | PairwiseKeyIndex(_)
            | GroupWithoutMic | UnauthenticatedKeyData | MicFailure | NoPtk
            | KeyDataDecrypt(_) | NotAssociated | NoPmk(_) => Disposition::Drop,
            NeedFullAuth => Disposition::Fallback,
            Ptk0RekeyDenied => Disposition::Reconnect,
            IeMismatch(_) | RsnxeMismatch => Disposition::Deauth(ReasonCode::IeIn4WayDiffers),
            FallbackExhausted(_) => Disposition::Deauth(ReasonCode::Ieee8021xAuthFailed),
            AnonceMismatch | ApIesUnavailable | KeyLength { .. } | UnencryptedKey(_)
            | MissingGtk(_) | KeyData(_) | KeyId { .. } | Ft(_) | Ocv(_) | Mlo(_) | Dpp(_)
            | GroupBeforePairwise | PmkidMismatch | Derivation(_) | KeyInstall(_)
            | Transmit(_) => Disposition::Deauth(ReasonCode::Unspecified),
        }
    }
}

pub type Result<T> = std::result::Result<T, HandshakeError>;

/// Which handler a validated frame goes to.
enum Message {
    Pairwise1,
    Pairwise3,
    Group1,
}

impl<D: Driver, E: Eapol> Supplicant<D, E> {
    /// Process an EAPOL frame received from `src`.
    ///
    /// The disposition of a failure has already been carried out when this
    /// returns; the error is handed back for the caller's information.
    pub fn rx_eapol(&mut self, src: MacAddr, frame: &[u8]) -> Result<()> {
        let result = self.process_eapol(src, frame);
        if let Err(err) = &result {
            self.apply_disposition(err);
        }
        result
    }

    pub(crate) fn apply_disposition(&mut self, err: &HandshakeError) {
        match err.disposition() {
            Disposition::Drop => {
                tracing::debug!(error = %err, "EAPOL-Key frame dropped");
            }
            Disposition::Deauth(reason) => {
                tracing::warn!(error = %err, reason = reason.code(), "handshake failed");
                self.deauthenticate(reason);
            }
            Disposition::Fallback => self.send_eapol_start(),
            Disposition::Reconnect => {
                tracing::info!("PTK0 rekey not allowed, reconnecting");
                self.driver.reconnect();
            }
        }
    }

    fn send_eapol_start(&mut self) {
        let Some(ctx) = self.ctx.as_mut() else { return };
        ctx.eapol_start_count += 1;
        let bssid = ctx.bssid;
        tracing::info!(
            bssid = %bssid,
            attempt = ctx.eapol_start_count,
            "no PMKSA entry found, triggering full EAP authentication"
        );
        let frame = rsnkey::eapol::eapol_start(self.config.eapol_version);
        self.eapol.start_full_auth();
        if let Err(err) = self.driver.send_eapol(bssid, frame) {
            tracing::warn!(error = %err, "failed to send EAPOL-Start");
        }
    }

    fn process_eapol(&mut self, src: MacAddr, frame: &[u8]) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let ptype = packet_type(frame).map_err(HandshakeError::Malformed)?;
        if ptype != PacketType::Key as u8 {
            return Err(HandshakeError::NotKeyFrame(ptype));
        }
        let mic_len = ctx.mic_len();
        let key = EapolKeyFrame::decode(frame, mic_len).map_err(HandshakeError::Malformed)?;
        let info = key.key_info;

        let expected_desc = match ctx.proto {
            Proto::Rsn => DESC_TYPE_RSN,
            Proto::Wpa => DESC_TYPE_WPA,
        };
        if key.descriptor != expected_desc {
            return Err(HandshakeError::DescriptorType(key.descriptor));
        }
        check_descriptor_version(ctx, info)?;

        if let Some(last) = ctx.rx_replay_counter {
            if key.replay_counter <= last {
                return Err(HandshakeError::Replay {
                    received: key.replay_counter,
                    last,
                });
            }
        }
        if info.has(KeyInfo::SMK_MESSAGE) {
            return Err(HandshakeError::SmkMessage);
        }
        if !info.has(KeyInfo::ACK) {
            return Err(HandshakeError::NoAck);
        }
        if info.has(KeyInfo::REQUEST) {
            return Err(HandshakeError::RequestBit);
        }

        if info.has(KeyInfo::MIC) {
            self.verify_mic(&key)?;
        }

        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let encrypted = info.has(KeyInfo::ENCR_KEY_DATA);
        let key_data: Zeroizing<Vec<u8>> = if mic_len == 0 && encrypted {
            self.aead_decrypt(&key)?
        } else if ctx.proto == Proto::Rsn && encrypted {
            // Key data is only decrypted once the frame is authentic.
            if !info.has(KeyInfo::MIC) {
                return Err(HandshakeError::UnauthenticatedKeyData);
            }
            let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::NoPtk)?;
            key.decrypt_key_data(ctx.akm, ptk.kek())
                .map_err(HandshakeError::KeyDataDecrypt)?
        } else {
            Zeroizing::new(key.key_data.to_vec())
        };

        let message = if info.is_pairwise() {
            if info.key_index() != 0 {
                return Err(HandshakeError::PairwiseKeyIndex(info.key_index()));
            }
            if info.has(KeyInfo::MIC) || encrypted {
                Message::Pairwise3
            } else {
                Message::Pairwise1
            }
        } else if (mic_len > 0 && info.has(KeyInfo::MIC)) || (mic_len == 0 && encrypted) {
            Message::Group1
        } else {
            return Err(HandshakeError::GroupWithoutMic);
        };

        match message {
            Message::Pairwise1 => self.process_msg1(src, &key, &key_data),
            Message::Pairwise3 => self.process_msg3(&key, &key_data),
            Message::Group1 => self.process_group1(&key, &key_data),
        }
    }

    /// Verify the MIC with the TPTK first; a match promotes it to PTK.
    /// Otherwise fall back to the PTK already in use. The receive replay
    /// counter moves only after a successful check.
    fn verify_mic(&mut self, key: &EapolKeyFrame) -> Result<()> {
        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        let mut ok = false;
        if let Some(tptk) = &ctx.tptk {
            if key.verify(ctx.akm, tptk.kck()) {
                ctx.ptk = ctx.tptk.take();
                ctx.ptk_installed = false;
                ctx.renew_snonce = true;
                ok = true;
            } else {
                tracing::debug!("invalid EAPOL-Key MIC with TPTK, ignoring TPTK");
            }
        }
        if !ok {
            let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::MicFailure)?;
            if !key.verify(ctx.akm, ptk.kck()) {
                return Err(HandshakeError::MicFailure);
            }
        }
        ctx.rx_replay_counter = Some(key.replay_counter);
        Ok(())
    }

    /// FILS: key data is an AES-SIV blob keyed with the KEK; a successful
    /// open authenticates the frame.
    fn aead_decrypt(&mut self, key: &EapolKeyFrame) -> Result<Zeroizing<Vec<u8>>> {
        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::NoPtk)?;
        let plain = key
            .decrypt_key_data(ctx.akm, ptk.kek())
            .map_err(HandshakeError::KeyDataDecrypt)?;
        ctx.rx_replay_counter = Some(key.replay_counter);
        Ok(plain)
    }
}

fn check_descriptor_version(ctx: &HandshakeContext, info: KeyInfo) -> Result<()> {
    let ver = info.version();
    let expected = ctx.akm.descriptor_version(ctx.pairwise, ctx.group);
    let mismatch = HandshakeError::DescriptorVersion { got: ver, expected };
    if ctx.akm.uses_akm_defined_mic() {
        return if ver == KEY_DESC_VER_AKM_DEFINED { Ok(()) } else { Err(mismatch) };
    }
    if ver == KEY_DESC_VER_AKM_DEFINED || ver > KEY_DESC_VER_AES_128_CMAC {
        return Err(mismatch);
    }
    if expected == KEY_DESC_VER_AES_128_CMAC {
        return if ver == expected { Ok(()) } else { Err(mismatch) };
    }
    if ctx.pairwise != Cipher::Tkip && ver != KEY_DESC_VER_HMAC_SHA1_AES {
        if matches!(ctx.pairwise, Cipher::Gcmp128 | Cipher::Gcmp256) {
            return Err(mismatch);
        }
        if ctx.group != Cipher::Ccmp128 && !info.is_pairwise() {
            tracing::debug!(ver, "allowing older descriptor version for a non-CCMP group key");
        } else if ver == KEY_DESC_VER_AES_128_CMAC {
            tracing::debug!("allowing AES-128-CMAC descriptor version where HMAC-SHA1 was expected");
        } else {
            return Err(mismatch);
        }
    }
    Ok(())
}
