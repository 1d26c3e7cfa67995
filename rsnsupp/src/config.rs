//! Supplicant configuration.
//!
//! Every field has a default, so a JSON document only needs to name what it
//! changes:
//!
//! ```json
//! { "akm": "psk", "ssid": "home", "passphrase": "correct horse" }
//! ```

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use rsnkey::derive::passphrase_to_psk;
use rsnkey::derive::psk::PSK_LEN;
use rsnkey::ie::rsne::{caps, Rsne};
use rsnkey::{Akm, Cipher, Proto};

use crate::error::{Result, SupplicantError};

/// dot11RSNAConfigPMKLifetime default, seconds.
pub const DEFAULT_PMK_LIFETIME: u32 = 43200;
/// dot11RSNAConfigPMKReauthThreshold default, percent of the lifetime.
pub const DEFAULT_PMK_REAUTH_THRESHOLD: u8 = 70;
/// dot11RSNAConfigSATimeout default, seconds.
pub const DEFAULT_SA_TIMEOUT: u32 = 60;
pub const DEFAULT_PMKSA_CAPACITY: usize = 32;
pub const DEFAULT_MAX_EAPOL_START_FALLBACKS: u32 = 3;

/// Management frame protection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PmfMode {
    #[default]
    Disabled,
    Optional,
    Required,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupplicantConfig {
    pub proto: Proto,
    pub akm: Akm,
    pub pairwise_cipher: Cipher,
    pub group_cipher: Cipher,
    /// BIP cipher when PMF is negotiated.
    pub group_mgmt_cipher: Option<Cipher>,
    pub ssid: String,
    /// 256-bit PSK as 64 hex digits. Takes precedence over `passphrase`.
    pub psk: Option<String>,
    pub passphrase: Option<String>,
    pub pmk_lifetime_secs: u32,
    pub pmk_reauth_threshold: u8,
    pub sa_timeout_secs: u32,
    pub pmksa_capacity: usize,
    /// Opportunistic key caching.
    pub okc: bool,
    /// Operating channel validation.
    pub ocv: bool,
    pub pmf: PmfMode,
    /// Request a new PTK this many seconds after each installation.
    pub ptk_rekey_secs: Option<u32>,
    /// Reconnect instead of rekeying PTK with key ID 0 in place.
    pub deny_ptk0_rekey: bool,
    /// The driver selects BSSs and roams on its own; PMKSA re-auth then
    /// only withdraws the PMKID from the driver.
    pub driver_roaming: bool,
    pub eapol_version: u8,
    /// EAPOL-Starts sent for a missing PMK before giving up on the AP.
    pub max_eapol_start_fallbacks: u32,
    /// Accept IGTK Key IDs 0x0400/0x0500, as sent by authenticators that
    /// encode the field big-endian, as 4/5.
    pub igtk_keyid_byte_swap_compat: bool,
    pub beacon_protection: bool,
    /// RSN is enabled on this network; an RSNE in a WPA1 Message 3 is then
    /// treated as a downgrade.
    pub rsn_enabled: bool,
    /// Ask a P2P GO for an IP address during the 4-Way Handshake.
    pub p2p_ip_addr_req: bool,
    /// Length of the key derivation key appended to the PTK, 0 if unused.
    pub kdk_len: usize,
}

impl Default for SupplicantConfig {
    fn default() -> Self {
        Self {
            proto: Proto::Rsn,
            akm: Akm::Psk,
            pairwise_cipher: Cipher::Ccmp128,
            group_cipher: Cipher::Ccmp128,
            group_mgmt_cipher: None,
            ssid: String::new(),
            psk: None,
            passphrase: None,
            pmk_lifetime_secs: DEFAULT_PMK_LIFETIME,
            pmk_reauth_threshold: DEFAULT_PMK_REAUTH_THRESHOLD,
            sa_timeout_secs: DEFAULT_SA_TIMEOUT,
            pmksa_capacity: DEFAULT_PMKSA_CAPACITY,
            okc: false,
            ocv: false,
            pmf: PmfMode::Disabled,
            ptk_rekey_secs: None,
            deny_ptk0_rekey: false,
            driver_roaming: false,
            eapol_version: rsnkey::eapol::EAPOL_VERSION_2001,
            max_eapol_start_fallbacks: DEFAULT_MAX_EAPOL_START_FALLBACKS,
            igtk_keyid_byte_swap_compat: false,
            beacon_protection: false,
            rsn_enabled: true,
            p2p_ip_addr_req: false,
            kdk_len: 0,
        }
    }
}

impl SupplicantConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SupplicantConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(SupplicantError::Config(msg));
        if !self.pairwise_cipher.is_pairwise_capable() {
            return bad(format!("{:?} is not a pairwise cipher", self.pairwise_cipher));
        }
        if self.group_cipher.is_group_mgmt() {
            return bad(format!("{:?} is not a group data cipher", self.group_cipher));
        }
        if let Some(mgmt) = self.group_mgmt_cipher {
            if !mgmt.is_group_mgmt() {
                return bad(format!("{mgmt:?} is not a group management cipher"));
            }
        }
        if self.proto == Proto::Wpa && self.akm.selector(Proto::Wpa).is_err() {
            return bad(format!("{:?} cannot be used with WPA", self.akm));
        }
        if self.pmk_reauth_threshold == 0 || self.pmk_reauth_threshold > 100 {
            return bad(format!(
                "pmk_reauth_threshold {} outside 1..=100",
                self.pmk_reauth_threshold
            ));
        }
        if self.pmk_lifetime_secs == 0 {
            return bad("pmk_lifetime_secs must be non-zero".into());
        }
        if self.pmksa_capacity == 0 {
            return bad("pmksa_capacity must be non-zero".into());
        }
        if !(1..=3).contains(&self.eapol_version) {
            return bad(format!("eapol_version {}", self.eapol_version));
        }
        if self.ssid.len() > rsnkey::derive::ft::SSID_MAX_LEN {
            return bad(format!("SSID of {} bytes", self.ssid.len()));
        }
        if let Some(pass) = &self.passphrase {
            if !(8..=63).contains(&pass.len()) {
                return bad(format!("passphrase of {} characters, need 8..=63", pass.len()));
            }
        }
        if let Some(psk) = &self.psk {
            decode_psk(psk)?;
        }
        if self.akm.is_psk() && self.psk.is_none() && self.passphrase.is_none() {
            return bad(format!("{:?} needs psk or passphrase", self.akm));
        }
        Ok(())
    }

    /// The PSK for PSK AKMs: the configured hex key, or the passphrase run
    /// through PBKDF2 with the SSID.
    pub fn resolve_psk(&self) -> Result<Option<Zeroizing<[u8; PSK_LEN]>>> {
        if let Some(hex) = &self.psk {
            return decode_psk(hex).map(Some);
        }
        match &self.passphrase {
            Some(pass) => Ok(Some(passphrase_to_psk(pass, self.ssid.as_bytes())?)),
            None => Ok(None),
        }
    }

    /// RSN capabilities the station advertises.
    pub fn rsn_capabilities(&self) -> u16 {
        let mut c = 0;
        if self.pmf != PmfMode::Disabled {
            c |= caps::MFPC;
        }
        if self.pmf == PmfMode::Required {
            c |= caps::MFPR;
        }
        if self.ocv && self.pmf != PmfMode::Disabled {
            c |= caps::OCVC;
        }
        c
    }

    /// The station's RSNE (or WPA IE) for the configured suites, without a
    /// PMKID list.
    pub fn own_ie(&self) -> Result<Vec<u8>> {
        let mgmt = if self.pmf == PmfMode::Disabled {
            None
        } else {
            self.group_mgmt_cipher
        };
        let ie = Rsne::for_station(
            self.proto,
            self.akm,
            self.pairwise_cipher,
            self.group_cipher,
            mgmt,
            self.rsn_capabilities(),
        );
        Ok(ie.encode()?)
    }
}

fn decode_psk(hex: &str) -> Result<Zeroizing<[u8; PSK_LEN]>> {
    let hex = hex.as_bytes();
    if hex.len() != PSK_LEN * 2 {
        return Err(SupplicantError::Config(format!(
            "psk must be {} hex digits, got {}",
            PSK_LEN * 2,
            hex.len()
        )));
    }
    let mut out = Zeroizing::new([0u8; PSK_LEN]);
    for (i, pair) in hex.chunks(2).enumerate() {
        let digits = std::str::from_utf8(pair).ok();
        out[i] = digits
            .and_then(|d| u8::from_str_radix(d, 16).ok())
            .ok_or_else(|| SupplicantError::Config("psk is not hex".into()))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mib_defaults() {
        let c = SupplicantConfig::default();
        assert_eq!(c.pmk_lifetime_secs, 43200);
        assert_eq!(c.pmk_reauth_threshold, 70);
        assert_eq!(c.sa_timeout_secs, 60);
        assert_eq!(c.pmksa_capacity, 32);
        assert_eq!(c.max_eapol_start_fallbacks, 3);
        assert!(!c.igtk_keyid_byte_swap_compat);
    }

    #[test]
    fn json_overrides_only_named_fields() {
        let c = SupplicantConfig::from_json(
            r#"{ "akm": "ft-psk", "ssid": "lab", "passphrase": "password", "okc": true }"#,
        )
        .unwrap();
        assert_eq!(c.akm, Akm::FtPsk);
        assert!(c.okc);
        assert_eq!(c.pairwise_cipher, Cipher::Ccmp128);
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(SupplicantConfig::from_json(r#"{ "bogus": 1 }"#).is_err());
    }

    #[test]
    fn psk_akm_needs_secret() {
        let err = SupplicantConfig::from_json(r#"{ "akm": "psk" }"#).unwrap_err();
        assert!(matches!(err, SupplicantError::Config(_)));
    }

    #[test]
    fn hex_psk_wins_over_passphrase() {
        let c = SupplicantConfig {
            psk: Some("11".repeat(32)),
            passphrase: Some("password".into()),
            ..Default::default()
        };
        assert_eq!(*c.resolve_psk().unwrap().unwrap(), [0x11; 32]);
    }

    #[test]
    fn bad_psk_hex() {
        let c = SupplicantConfig {
            psk: Some("zz".repeat(32)),
            ..Default::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn own_ie_carries_pmf_bits() {
        let c = SupplicantConfig {
            pmf: PmfMode::Required,
            group_mgmt_cipher: Some(Cipher::BipCmac128),
            passphrase: Some("password".into()),
            ..Default::default()
        };
        let ie = Rsne::parse(&c.own_ie().unwrap()).unwrap();
        assert!(ie.has_capability(caps::MFPC));
        assert!(ie.has_capability(caps::MFPR));
        assert_eq!(ie.group_mgmt_cipher, Some(Cipher::BipCmac128));
    }
}
