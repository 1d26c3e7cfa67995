// PSK = PBKDF2-HMAC-SHA1(passphrase, SSID, 4096, 256 bits)

use hmac::Hmac;
use sha1::Sha1;
use zeroize::Zeroizing;

use crate::error::{Result, RsnKeyError};

pub const PSK_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 4096;
const SSID_MAX_LEN: usize = 32;

/// Derive the PSK from an 8..=63 character ASCII passphrase.
pub fn passphrase_to_psk(passphrase: &str, ssid: &[u8]) -> Result<Zeroizing<[u8; PSK_LEN]>> {
    let len = passphrase.len();
    if !(8..=63).contains(&len) || !passphrase.bytes().all(|b| (0x20..=0x7e).contains(&b)) {
        return Err(RsnKeyError::InvalidKeyLength {
            what: "passphrase",
            len,
        });
    }
    if ssid.is_empty() || ssid.len() > SSID_MAX_LEN {
        return Err(RsnKeyError::InvalidKeyLength {
            what: "SSID",
            len: ssid.len(),
        });
    }
    let mut psk = Zeroizing::new([0u8; PSK_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha1>>(passphrase.as_bytes(), ssid, PBKDF2_ROUNDS, &mut psk[..])
        .map_err(|e| RsnKeyError::Derivation(format!("pbkdf2: {e}")))?;
    Ok(psk)
}

#[cfg(test)]
mod tests {
    use super::*;

    // IEEE Std 802.11-2020, J.4.2 test vector.
    #[test]
    fn ieee_vector() {
        let psk = passphrase_to_psk("password", b"IEEE").unwrap();
        assert_eq!(
            crate::hex(&psk[..]),
            "f42c6fc52df0ebef9ebb4b90b38a5f902e83fe1b135a70e23aed762e9710a12e"
        );
    }

    #[test]
    fn rejects_short_passphrase() {
        assert!(passphrase_to_psk("short", b"ssid").is_err());
        assert!(passphrase_to_psk("long enough", b"").is_err());
    }
}
