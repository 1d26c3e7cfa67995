// IEEE 802.11 pseudo-random functions.
//
// Two constructions are in use:
//   PRF-n (802.11i, SHA-1):  HMAC(K, label || 0x00 || data || i) for i = 0, 1, ...
//   KDF-Hash-n (802.11r+):   HMAC(K, i || label || context || L) for i = 1, 2, ...
// where i and L (output length in bits) are 16-bit little-endian.

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Result, RsnKeyError};
use crate::suite::KdfHash;

fn mac_parts<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
    let mut mac = <M as KeyInit>::new_from_slice(key).map_err(|_| RsnKeyError::InvalidKeyLength {
        what: "HMAC key",
        len: key.len(),
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC over the concatenation of `parts` with the selected hash.
pub fn hmac(hash: KdfHash, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
    match hash {
        KdfHash::Sha1 => mac_parts::<Hmac<Sha1>>(key, parts),
        KdfHash::Sha256 => mac_parts::<Hmac<Sha256>>(key, parts),
        KdfHash::Sha384 => mac_parts::<Hmac<Sha384>>(key, parts),
        KdfHash::Sha512 => mac_parts::<Hmac<Sha512>>(key, parts),
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

/// Plain hash over the concatenation of `parts`.
pub fn digest(hash: KdfHash, parts: &[&[u8]]) -> Vec<u8> {
    match hash {
        KdfHash::Sha1 => digest_parts::<Sha1>(parts),
        KdfHash::Sha256 => digest_parts::<Sha256>(parts),
        KdfHash::Sha384 => digest_parts::<Sha384>(parts),
        KdfHash::Sha512 => digest_parts::<Sha512>(parts),
    }
}

/// 802.11i PRF based on HMAC-SHA1. Fills `out` completely.
pub fn sha1_prf(key: &[u8], label: &str, data: &[u8], out: &mut [u8]) -> Result<()> {
    let mut pos = 0;
    let mut counter: u8 = 0;
    while pos < out.len() {
        let block = hmac(
            KdfHash::Sha1,
            key,
            &[label.as_bytes(), &[0u8], data, &[counter]],
        )?;
        let take = (out.len() - pos).min(block.len());
        out[pos..pos + take].copy_from_slice(&block[..take]);
        pos += take;
        counter = counter
            .checked_add(1)
            .ok_or_else(|| RsnKeyError::Derivation("PRF output too long".into()))?;
    }
    Ok(())
}

/// IEEE 802.11 KDF (12.7.1.7.2) with the given hash. Fills `out` completely.
pub fn kdf(hash: KdfHash, key: &[u8], label: &str, context: &[u8], out: &mut [u8]) -> Result<()> {
    let bits = u16::try_from(out.len() * 8)
        .map_err(|_| RsnKeyError::Derivation(format!("KDF output of {} bytes", out.len())))?;
    let mut pos = 0;
    let mut counter: u16 = 1;
    while pos < out.len() {
        let block = hmac(
            hash,
            key,
            &[
                &counter.to_le_bytes(),
                label.as_bytes(),
                context,
                &bits.to_le_bytes(),
            ],
        )?;
        let take = (out.len() - pos).min(block.len());
        out[pos..pos + take].copy_from_slice(&block[..take]);
        pos += take;
        counter += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    // IEEE Std 802.11-2020, J.3.2 (PRF test vector 1).
    #[test]
    fn sha1_prf_reference_vector() {
        let key = [0x0bu8; 20];
        let mut out = [0u8; 64];
        sha1_prf(&key, "prefix", b"Hi There", &mut out).unwrap();
        let expected = unhex(
            "bcd4c650b30b9684951829e0d75f9d54\
             b862175ed9f00606e17d8da35402ffee\
             75df78c3d31e0f889f012120c0862beb\
             67753e7439ae242edb8373698356cf5a",
        );
        assert_eq!(out.to_vec(), expected);
    }

    #[test]
    fn kdf_is_deterministic_and_length_bound() {
        let key = [0x42u8; 32];
        let mut a = [0u8; 48];
        let mut b = [0u8; 48];
        kdf(KdfHash::Sha256, &key, "label", b"ctx", &mut a).unwrap();
        kdf(KdfHash::Sha256, &key, "label", b"ctx", &mut b).unwrap();
        assert_eq!(a, b);

        // L is part of the input, so a shorter request is not a prefix.
        let mut short = [0u8; 32];
        kdf(KdfHash::Sha256, &key, "label", b"ctx", &mut short).unwrap();
        assert_ne!(&a[..32], &short[..]);
    }

    #[test]
    fn digest_matches_hash_sizes() {
        assert_eq!(digest(KdfHash::Sha256, &[b"x"]).len(), 32);
        assert_eq!(digest(KdfHash::Sha384, &[b"x"]).len(), 48);
        assert_eq!(digest(KdfHash::Sha512, &[b"x"]).len(), 64);
    }
}
