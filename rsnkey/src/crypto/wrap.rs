// Key data confidentiality.
//
// Descriptor versions 2 and 3 (and AKM-defined non-FILS suites) wrap the key
// data with AES Key Wrap (RFC 3394) under the KEK. Descriptor version 1 (TKIP)
// obfuscates it with RC4 keyed by EAPOL-Key IV || KEK after discarding the
// first 256 octets of keystream.

use aes::cipher::generic_array::GenericArray;
use aes_kw::{KekAes128, KekAes256};
use rc4::consts::U32;
use rc4::{KeyInit, Rc4, StreamCipher};

use crate::error::{Result, RsnKeyError};

/// AES Key Wrap block / integrity check value size.
pub const KW_SEMIBLOCK: usize = 8;

/// Wrap `plain` under a 16- or 32-byte KEK. `plain` must be a multiple of 8
/// octets and at least 16 octets long.
pub fn aes_wrap(kek: &[u8], plain: &[u8]) -> Result<Vec<u8>> {
    if plain.len() < 16 || plain.len() % KW_SEMIBLOCK != 0 {
        return Err(RsnKeyError::KeyWrap(format!(
            "plaintext length {} not a multiple of 8 >= 16",
            plain.len()
        )));
    }
    let mut out = vec![0u8; plain.len() + KW_SEMIBLOCK];
    let res = match kek.len() {
        16 => KekAes128::new(GenericArray::from_slice(kek)).wrap(plain, &mut out),
        32 => KekAes256::new(GenericArray::from_slice(kek)).wrap(plain, &mut out),
        len => return Err(RsnKeyError::InvalidKeyLength { what: "KEK", len }),
    };
    res.map_err(|e| RsnKeyError::KeyWrap(e.to_string()))?;
    Ok(out)
}

/// Unwrap AES-key-wrapped data. Fails on integrity check mismatch.
pub fn aes_unwrap(kek: &[u8], wrapped: &[u8]) -> Result<Vec<u8>> {
    if wrapped.len() < 24 || wrapped.len() % KW_SEMIBLOCK != 0 {
        return Err(RsnKeyError::KeyUnwrap);
    }
    let mut out = vec![0u8; wrapped.len() - KW_SEMIBLOCK];
    let res = match kek.len() {
        16 => KekAes128::new(GenericArray::from_slice(kek)).unwrap(wrapped, &mut out),
        32 => KekAes256::new(GenericArray::from_slice(kek)).unwrap(wrapped, &mut out),
        len => return Err(RsnKeyError::InvalidKeyLength { what: "KEK", len }),
    };
    res.map_err(|_| RsnKeyError::KeyUnwrap)?;
    Ok(out)
}

/// RC4 with 256 octets of keystream skipped, applied in place. The RC4 key
/// is `iv || kek` (32 octets).
pub fn rc4_skip_xor(iv: &[u8; 16], kek: &[u8], data: &mut [u8]) -> Result<()> {
    if kek.len() != 16 {
        return Err(RsnKeyError::InvalidKeyLength {
            what: "KEK",
            len: kek.len(),
        });
    }
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(iv);
    key[16..].copy_from_slice(kek);
    let mut rc4 = Rc4::<U32>::new_from_slice(&key).map_err(|_| RsnKeyError::InvalidKeyLength {
        what: "RC4 key",
        len: key.len(),
    })?;
    let mut skip = [0u8; 256];
    rc4.apply_keystream(&mut skip);
    rc4.apply_keystream(data);
    Ok(())
}
