// AES-SIV (RFC 5297) key data protection for FILS AKMs.
//
// FILS EAPOL-Key frames carry no MIC; the key data field is sealed with
// AES-SIV under the KEK, authenticating every frame octet that precedes the
// key data as associated data. Output layout: 16-byte SIV || ciphertext.
//
// The KEK length selects the variant:
//   32 bytes -> AES-SIV-CMAC-256 (FILS-SHA256)
//   64 bytes -> AES-SIV-CMAC-512 (FILS-SHA384)

use aes_siv::siv::{Aes128Siv, Aes256Siv};
use aes_siv::KeyInit;
use zeroize::Zeroizing;

use crate::error::{Result, RsnKeyError};

/// Length of the synthetic IV prepended to SIV ciphertext.
pub const SIV_TAG_LEN: usize = 16;

/// AES-SIV key that dispatches on KEK length.
pub struct SivKey {
    key: Zeroizing<Vec<u8>>,
}

impl SivKey {
    pub fn new(kek: &[u8]) -> Result<Self> {
        match kek.len() {
            32 | 64 => Ok(Self {
                key: Zeroizing::new(kek.to_vec()),
            }),
            len => Err(RsnKeyError::InvalidKeyLength { what: "SIV KEK", len }),
        }
    }

    /// Seal `plaintext` with a single associated-data element `aad`.
    pub fn seal(&self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let out = match self.key.len() {
            32 => Aes128Siv::new_from_slice(&self.key)
                .map_err(|e| RsnKeyError::AeadSeal(format!("siv init: {e}")))?
                .encrypt([aad], plaintext),
            _ => Aes256Siv::new_from_slice(&self.key)
                .map_err(|e| RsnKeyError::AeadSeal(format!("siv init: {e}")))?
                .encrypt([aad], plaintext),
        };
        out.map_err(|e| RsnKeyError::AeadSeal(format!("{e}")))
    }

    /// Open SIV || ciphertext produced by `seal` with the same `aad`.
    pub fn open(&self, aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < SIV_TAG_LEN {
            return Err(RsnKeyError::AeadOpen);
        }
        let out = match self.key.len() {
            32 => Aes128Siv::new_from_slice(&self.key)
                .map_err(|_| RsnKeyError::AeadOpen)?
                .decrypt([aad], sealed),
            _ => Aes256Siv::new_from_slice(&self.key)
                .map_err(|_| RsnKeyError::AeadOpen)?
                .decrypt([aad], sealed),
        };
        out.map_err(|_| RsnKeyError::AeadOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siv_roundtrip_with_aad() {
        let key = SivKey::new(&[0x42u8; 32]).unwrap();
        let sealed = key.seal(b"eapol header", b"gtk kde bytes").unwrap();
        assert_eq!(sealed.len(), SIV_TAG_LEN + 13);
        assert_eq!(key.open(b"eapol header", &sealed).unwrap(), b"gtk kde bytes");
    }

    #[test]
    fn siv_wrong_aad_fails() {
        let key = SivKey::new(&[0x99u8; 64]).unwrap();
        let sealed = key.seal(b"good aad", b"data").unwrap();
        assert_eq!(key.open(b"bad aad", &sealed), Err(RsnKeyError::AeadOpen));
    }

    #[test]
    fn siv_tampered_ciphertext_fails() {
        let key = SivKey::new(&[0xBBu8; 32]).unwrap();
        let mut sealed = key.seal(b"", b"data").unwrap();
        sealed[SIV_TAG_LEN] ^= 0xFF;
        assert!(key.open(b"", &sealed).is_err());
    }

    #[test]
    fn siv_rejects_short_kek() {
        assert!(SivKey::new(&[0u8; 16]).is_err());
    }
}
