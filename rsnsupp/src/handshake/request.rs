// EAPOL-Key Request frames and the events that send them.
//
// Requests are protected with the PTK in use and numbered from the
// supplicant's own request counter, independent of the authenticator's
// replay counter.

use std::time::Duration;

use rsnkey::eapol::{DESC_TYPE_RSN, DESC_TYPE_WPA};
use rsnkey::{EapolKeyFrame, KeyInfo, Proto, Ptk};

use crate::driver::{Driver, Eapol, ReasonCode, WpaState};
use crate::error::{Result, SupplicantError};
use crate::supplicant::Supplicant;

/// Two Michael MIC failures within this window trigger TKIP countermeasures.
const MICHAEL_FAILURE_WINDOW: Duration = Duration::from_secs(60);

impl<D: Driver, E: Eapol> Supplicant<D, E> {
    /// Send an EAPOL-Key Request. `error` marks a Michael MIC failure
    /// report, `pairwise` asks for a new PTK rather than a new GTK.
    pub fn key_request(&mut self, error: bool, pairwise: bool) -> Result<()> {
        if pairwise && self.config.deny_ptk0_rekey && self.ctx.as_ref().is_some_and(|c| c.ptk_installed) {
            tracing::info!("PTK0 rekey not allowed, reconnecting");
            self.driver.reconnect();
            return Ok(());
        }
        let version = self.config.eapol_version;
        let ctx = self.ctx.as_mut().ok_or(SupplicantError::NotAssociated)?;
        let ptk = ctx.ptk.as_ref().ok_or(SupplicantError::NoPtk)?;

        let mic_len = ctx.mic_len();
        let mut info = KeyInfo(0)
            .with_version(ctx.akm.descriptor_version(ctx.pairwise, ctx.group))
            .with(KeyInfo::REQUEST)
            .with(KeyInfo::SECURE);
        if mic_len > 0 {
            info = info.with(KeyInfo::MIC);
        }
        if error {
            info = info.with(KeyInfo::ERROR);
        }
        if pairwise {
            info = info.with(KeyInfo::KEY_TYPE);
        }
        let descriptor = match ctx.proto {
            Proto::Rsn => DESC_TYPE_RSN,
            Proto::Wpa => DESC_TYPE_WPA,
        };
        let mut frame = EapolKeyFrame::new(version, descriptor, info, mic_len);
        frame.replay_counter = ctx.request_counter;
        if mic_len == 0 {
            frame.encrypt_key_data(ctx.akm, ptk.kek(), &[])?;
        } else {
            frame.sign(ctx.akm, ptk.kck())?;
        }
        ctx.request_counter += 1;

        let bssid = ctx.bssid;
        tracing::debug!(
            bssid = %bssid,
            error,
            pairwise,
            replay_counter = frame.replay_counter,
            "TX EAPOL-Key Request"
        );
        self.driver.send_eapol(bssid, frame.encode())
    }

    /// Report a TKIP Michael MIC failure. A second failure inside 60 s ends
    /// the association.
    pub fn michael_mic_failure(&mut self, unicast: bool) -> Result<()> {
        let now = self.driver.now();
        let repeated = self
            .last_michael_failure
            .is_some_and(|last| now.saturating_duration_since(last) < MICHAEL_FAILURE_WINDOW);
        self.last_michael_failure = Some(now);
        tracing::warn!(unicast, repeated, "Michael MIC failure detected");
        // Countermeasures still need the report to reach the AP first.
        let sent = self.key_request(true, unicast);
        if repeated {
            tracing::warn!("TKIP countermeasures started");
            self.deauthenticate(ReasonCode::MichaelMicFailure);
        }
        sent
    }

    /// The PTK rekey timer fired.
    pub(crate) fn rekey_ptk(&mut self) {
        if self.state() != WpaState::Completed {
            return;
        }
        tracing::info!("PTK lifetime reached, requesting a new PTK");
        if let Err(err) = self.key_request(false, true) {
            tracing::warn!(error = %err, "failed to request PTK rekey");
        }
    }

    /// Finish key negotiation with a PTK derived outside the 4-Way
    /// Handshake (FILS, FT protocols run by another component).
    pub fn complete_external_ptk(&mut self, ptk: Ptk) -> Result<()> {
        let ctx = self.ctx.as_mut().ok_or(SupplicantError::NotAssociated)?;
        ctx.ptk = Some(ptk);
        ctx.tptk = None;
        ctx.ptk_installed = false;
        ctx.msg3_ok = true;
        self.install_ptk(None)?;
        self.key_neg_complete(true);
        Ok(())
    }
}
