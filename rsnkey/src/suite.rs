// AKM and cipher suite selectors and their per-suite key-hierarchy properties.
//
// Suite selectors are a 3-octet OUI followed by a suite type. RSN uses the
// IEEE 802.11 OUI (00-0F-AC); the legacy WPA IE uses the Microsoft OUI
// (00-50-F2); DPP uses the Wi-Fi Alliance OUI (50-6F-9A).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RsnKeyError};

pub const OUI_RSN: [u8; 3] = [0x00, 0x0f, 0xac];
pub const OUI_WPA: [u8; 3] = [0x00, 0x50, 0xf2];
pub const OUI_WFA: [u8; 3] = [0x50, 0x6f, 0x9a];

/// A 4-octet suite selector (OUI + type) as carried in RSNE / WPA IE.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    pub const fn new(oui: [u8; 3], suite_type: u8) -> Self {
        Selector([oui[0], oui[1], oui[2], suite_type])
    }

    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn suite_type(&self) -> u8 {
        self.0[3]
    }
}

/// MIB notation: `00-0f-ac-4`.
impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}-{:02x}-{:02x}-{}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

// ── Protocol ─────────────────────────────────────────────────────────────

/// Security protocol negotiated for the association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Proto {
    /// Legacy WPA (vendor IE, descriptor type 254).
    Wpa,
    /// IEEE 802.11 RSN (RSNE, descriptor type 2).
    Rsn,
}

// ── KDF selection ────────────────────────────────────────────────────────

/// Hash behind the PTK derivation and PMKID computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KdfHash {
    /// IEEE 802.11i PRF built on HMAC-SHA1.
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

// ── AKM ──────────────────────────────────────────────────────────────────

/// Authentication and key management suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Akm {
    Ieee8021x,
    Psk,
    FtIeee8021x,
    FtPsk,
    Ieee8021xSha256,
    PskSha256,
    Sae,
    FtSae,
    SuiteB,
    SuiteB192,
    FtIeee8021xSha384,
    FilsSha256,
    FilsSha384,
    FtFilsSha256,
    FtFilsSha384,
    Owe,
    FtPskSha384,
    PskSha384,
    SaeExtKey,
    FtSaeExtKey,
    Dpp,
}

impl Akm {
    /// RSN suite type (IEEE Std 802.11-2020, Table 9-151).
    fn rsn_type(self) -> Option<u8> {
        Some(match self {
            Akm::Ieee8021x => 1,
            Akm::Psk => 2,
            Akm::FtIeee8021x => 3,
            Akm::FtPsk => 4,
            Akm::Ieee8021xSha256 => 5,
            Akm::PskSha256 => 6,
            Akm::Sae => 8,
            Akm::FtSae => 9,
            Akm::SuiteB => 11,
            Akm::SuiteB192 => 12,
            Akm::FtIeee8021xSha384 => 13,
            Akm::FilsSha256 => 14,
            Akm::FilsSha384 => 15,
            Akm::FtFilsSha256 => 16,
            Akm::FtFilsSha384 => 17,
            Akm::Owe => 18,
            Akm::FtPskSha384 => 19,
            Akm::PskSha384 => 20,
            Akm::SaeExtKey => 24,
            Akm::FtSaeExtKey => 25,
            Akm::Dpp => return None,
        })
    }

    /// Selector for the given protocol. WPA only knows 802.1X and PSK.
    pub fn selector(self, proto: Proto) -> Result<Selector> {
        match (proto, self) {
            (Proto::Wpa, Akm::Ieee8021x) => Ok(Selector::new(OUI_WPA, 1)),
            (Proto::Wpa, Akm::Psk) => Ok(Selector::new(OUI_WPA, 2)),
            (Proto::Wpa, other) => Err(RsnKeyError::UnsupportedAkm(format!("{other:?} over WPA"))),
            (Proto::Rsn, Akm::Dpp) => Ok(Selector::new(OUI_WFA, 2)),
            (Proto::Rsn, akm) => akm
                .rsn_type()
                .map(|t| Selector::new(OUI_RSN, t))
                .ok_or_else(|| RsnKeyError::UnsupportedAkm(format!("{akm:?}"))),
        }
    }

    /// Resolve a selector. Unknown selectors yield `None` so that IE parsing
    /// can skip suites it does not implement.
    pub fn from_selector(proto: Proto, sel: Selector) -> Option<Akm> {
        match proto {
            Proto::Wpa => match (sel.oui(), sel.suite_type()) {
                (OUI_WPA, 1) => Some(Akm::Ieee8021x),
                (OUI_WPA, 2) => Some(Akm::Psk),
                _ => None,
            },
            Proto::Rsn => {
                if sel == Selector::new(OUI_WFA, 2) {
                    return Some(Akm::Dpp);
                }
                if sel.oui() != OUI_RSN {
                    return None;
                }
                ALL_AKMS
                    .iter()
                    .copied()
                    .find(|akm| akm.rsn_type() == Some(sel.suite_type()))
            }
        }
    }

    pub fn is_ft(self) -> bool {
        matches!(
            self,
            Akm::FtIeee8021x
                | Akm::FtPsk
                | Akm::FtSae
                | Akm::FtIeee8021xSha384
                | Akm::FtFilsSha256
                | Akm::FtFilsSha384
                | Akm::FtPskSha384
                | Akm::FtSaeExtKey
        )
    }

    pub fn is_fils(self) -> bool {
        matches!(
            self,
            Akm::FilsSha256 | Akm::FilsSha384 | Akm::FtFilsSha256 | Akm::FtFilsSha384
        )
    }

    pub fn is_sae(self) -> bool {
        matches!(
            self,
            Akm::Sae | Akm::FtSae | Akm::SaeExtKey | Akm::FtSaeExtKey
        )
    }

    pub fn is_suite_b(self) -> bool {
        matches!(self, Akm::SuiteB | Akm::SuiteB192)
    }

    pub fn is_psk(self) -> bool {
        matches!(
            self,
            Akm::Psk | Akm::FtPsk | Akm::PskSha256 | Akm::PskSha384 | Akm::FtPskSha384
        )
    }

    /// AKMs whose PMK comes from an 802.1X/EAP exchange.
    pub fn is_ieee8021x(self) -> bool {
        matches!(
            self,
            Akm::Ieee8021x
                | Akm::FtIeee8021x
                | Akm::Ieee8021xSha256
                | Akm::SuiteB
                | Akm::SuiteB192
                | Akm::FtIeee8021xSha384
        )
    }

    /// Whether a missing PMK at Message 1 may be answered by restarting EAP
    /// with an EAPOL-Start instead of dropping the handshake.
    pub fn allows_eap_fallback(self) -> bool {
        matches!(self, Akm::Ieee8021x | Akm::Ieee8021xSha256)
    }

    /// Whether a fresh PMK can be obtained without leaving the association.
    /// SAE, OWE and DPP only authenticate at association time.
    pub fn can_reauth_in_association(self) -> bool {
        !(self.is_sae() || matches!(self, Akm::Owe | Akm::Dpp))
    }

    /// PMKSA caching applies to everything except plain PSK AKMs.
    pub fn uses_pmksa_cache(self) -> bool {
        !self.is_psk()
    }

    fn pmk_len_scaled(self) -> bool {
        matches!(self, Akm::SaeExtKey | Akm::FtSaeExtKey | Akm::Owe | Akm::Dpp)
    }

    fn is_sha384(self) -> bool {
        matches!(
            self,
            Akm::SuiteB192
                | Akm::FtIeee8021xSha384
                | Akm::FilsSha384
                | Akm::FtFilsSha384
                | Akm::FtPskSha384
                | Akm::PskSha384
        )
    }

    /// Hash used for the PTK KDF and PMKID, given the PMK length.
    pub fn kdf_hash(self, pmk_len: usize) -> KdfHash {
        if self.pmk_len_scaled() {
            return match pmk_len {
                64 => KdfHash::Sha512,
                48 => KdfHash::Sha384,
                _ => KdfHash::Sha256,
            };
        }
        if self.is_sha384() {
            return KdfHash::Sha384;
        }
        match self {
            Akm::Ieee8021x | Akm::Psk => KdfHash::Sha1,
            _ => KdfHash::Sha256,
        }
    }

    /// EAPOL-Key MIC length in octets. Zero for AEAD (FILS) AKMs.
    pub fn mic_len(self, pmk_len: usize) -> usize {
        if self.is_fils() {
            return 0;
        }
        if self.pmk_len_scaled() {
            return match pmk_len {
                64 => 32,
                48 => 24,
                _ => 16,
            };
        }
        match self {
            Akm::SuiteB192 | Akm::FtIeee8021xSha384 | Akm::FtPskSha384 | Akm::PskSha384 => 24,
            _ => 16,
        }
    }

    /// KCK length in octets.
    pub fn kck_len(self, pmk_len: usize) -> usize {
        if self.is_fils() {
            return 0;
        }
        if self.pmk_len_scaled() {
            return pmk_len / 2;
        }
        match self {
            Akm::SuiteB192 | Akm::FtIeee8021xSha384 | Akm::FtPskSha384 | Akm::PskSha384 => 24,
            _ => 16,
        }
    }

    /// KEK length in octets.
    pub fn kek_len(self, pmk_len: usize) -> usize {
        if self.pmk_len_scaled() {
            return if pmk_len <= 32 { 16 } else { 32 };
        }
        match self {
            Akm::FilsSha384 | Akm::FtFilsSha384 => 64,
            Akm::SuiteB192
            | Akm::FilsSha256
            | Akm::FtFilsSha256
            | Akm::FtIeee8021xSha384
            | Akm::FtPskSha384
            | Akm::PskSha384 => 32,
            _ => 16,
        }
    }

    /// Whether the EAPOL-Key MIC algorithm is defined by the AKM rather than
    /// by the Key Descriptor Version bits.
    pub fn uses_akm_defined_mic(self) -> bool {
        self.is_sae()
            || self.is_suite_b()
            || self.is_fils()
            || self.is_sha384()
            || matches!(self, Akm::Owe | Akm::Dpp)
    }

    /// AKMs that use AES-128-CMAC (descriptor version 3).
    fn uses_cmac(self) -> bool {
        matches!(
            self,
            Akm::FtIeee8021x | Akm::FtPsk | Akm::Ieee8021xSha256 | Akm::PskSha256
        )
    }

    /// Key Descriptor Version expected in every EAPOL-Key frame.
    pub fn descriptor_version(self, pairwise: Cipher, group: Cipher) -> u8 {
        if self.uses_akm_defined_mic() {
            crate::eapol::KEY_DESC_VER_AKM_DEFINED
        } else if self.uses_cmac() {
            crate::eapol::KEY_DESC_VER_AES_128_CMAC
        } else if pairwise != Cipher::Tkip || group != Cipher::Tkip {
            crate::eapol::KEY_DESC_VER_HMAC_SHA1_AES
        } else {
            crate::eapol::KEY_DESC_VER_HMAC_MD5_RC4
        }
    }
}

const ALL_AKMS: [Akm; 21] = [
    Akm::Ieee8021x,
    Akm::Psk,
    Akm::FtIeee8021x,
    Akm::FtPsk,
    Akm::Ieee8021xSha256,
    Akm::PskSha256,
    Akm::Sae,
    Akm::FtSae,
    Akm::SuiteB,
    Akm::SuiteB192,
    Akm::FtIeee8021xSha384,
    Akm::FilsSha256,
    Akm::FilsSha384,
    Akm::FtFilsSha256,
    Akm::FtFilsSha384,
    Akm::Owe,
    Akm::FtPskSha384,
    Akm::PskSha384,
    Akm::SaeExtKey,
    Akm::FtSaeExtKey,
    Akm::Dpp,
];

// ── Cipher ───────────────────────────────────────────────────────────────

/// Pairwise, group, and group-management cipher suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cipher {
    Wep40,
    Tkip,
    Ccmp128,
    Wep104,
    BipCmac128,
    GroupNotAllowed,
    Gcmp128,
    Gcmp256,
    Ccmp256,
    BipGmac128,
    BipGmac256,
    BipCmac256,
}

impl Cipher {
    fn rsn_type(self) -> u8 {
        match self {
            Cipher::Wep40 => 1,
            Cipher::Tkip => 2,
            Cipher::Ccmp128 => 4,
            Cipher::Wep104 => 5,
            Cipher::BipCmac128 => 6,
            Cipher::GroupNotAllowed => 7,
            Cipher::Gcmp128 => 8,
            Cipher::Gcmp256 => 9,
            Cipher::Ccmp256 => 10,
            Cipher::BipGmac128 => 11,
            Cipher::BipGmac256 => 12,
            Cipher::BipCmac256 => 13,
        }
    }

    pub fn selector(self, proto: Proto) -> Result<Selector> {
        match proto {
            Proto::Rsn => Ok(Selector::new(OUI_RSN, self.rsn_type())),
            Proto::Wpa => match self {
                Cipher::Wep40 | Cipher::Tkip | Cipher::Ccmp128 | Cipher::Wep104 => {
                    Ok(Selector::new(OUI_WPA, self.rsn_type()))
                }
                other => Err(RsnKeyError::UnsupportedCipher(format!("{other:?} over WPA"))),
            },
        }
    }

    pub fn from_selector(proto: Proto, sel: Selector) -> Option<Cipher> {
        let expected_oui = match proto {
            Proto::Rsn => OUI_RSN,
            Proto::Wpa => OUI_WPA,
        };
        if sel.oui() != expected_oui {
            return None;
        }
        let cipher = ALL_CIPHERS
            .iter()
            .copied()
            .find(|c| c.rsn_type() == sel.suite_type())?;
        match (proto, cipher) {
            (Proto::Wpa, Cipher::Wep40 | Cipher::Tkip | Cipher::Ccmp128 | Cipher::Wep104) => {
                Some(cipher)
            }
            (Proto::Wpa, _) => None,
            (Proto::Rsn, c) => Some(c),
        }
    }

    /// Temporal key length in octets.
    pub fn key_len(self) -> usize {
        match self {
            Cipher::Wep40 => 5,
            Cipher::Wep104 => 13,
            Cipher::Tkip => 32,
            Cipher::Ccmp128 | Cipher::Gcmp128 | Cipher::BipCmac128 | Cipher::BipGmac128 => 16,
            Cipher::Ccmp256 | Cipher::Gcmp256 | Cipher::BipGmac256 | Cipher::BipCmac256 => 32,
            Cipher::GroupNotAllowed => 0,
        }
    }

    /// Length of the receive sequence counter carried in Key RSC.
    pub fn rsc_len(self) -> usize {
        match self {
            Cipher::Wep40 | Cipher::Wep104 | Cipher::GroupNotAllowed => 0,
            _ => 6,
        }
    }

    pub fn is_group_mgmt(self) -> bool {
        matches!(
            self,
            Cipher::BipCmac128 | Cipher::BipGmac128 | Cipher::BipGmac256 | Cipher::BipCmac256
        )
    }

    pub fn is_pairwise_capable(self) -> bool {
        matches!(
            self,
            Cipher::Tkip | Cipher::Ccmp128 | Cipher::Gcmp128 | Cipher::Gcmp256 | Cipher::Ccmp256
        )
    }
}

const ALL_CIPHERS: [Cipher; 12] = [
    Cipher::Wep40,
    Cipher::Tkip,
    Cipher::Ccmp128,
    Cipher::Wep104,
    Cipher::BipCmac128,
    Cipher::GroupNotAllowed,
    Cipher::Gcmp128,
    Cipher::Gcmp256,
    Cipher::Ccmp256,
    Cipher::BipGmac128,
    Cipher::BipGmac256,
    Cipher::BipCmac256,
];
