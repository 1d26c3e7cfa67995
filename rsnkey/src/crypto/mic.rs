// EAPOL-Key MIC computation.
//
// The algorithm is chosen by the Key Descriptor Version bits, or by the AKM
// when the version is 0 ("AKM-defined"). Verification goes through the
// `Mac::verify_truncated_left` path so the comparison is constant time.

use aes::Aes128;
use cmac::Cmac;
use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};

use crate::eapol::{
    KEY_DESC_VER_AES_128_CMAC, KEY_DESC_VER_AKM_DEFINED, KEY_DESC_VER_HMAC_MD5_RC4,
    KEY_DESC_VER_HMAC_SHA1_AES,
};
use crate::error::{Result, RsnKeyError};
use crate::suite::Akm;

/// Concrete MIC algorithm after resolving version and AKM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicAlgorithm {
    HmacMd5,
    HmacSha1_128,
    AesCmac128,
    HmacSha256_128,
    HmacSha384_192,
    HmacSha512_256,
}

impl MicAlgorithm {
    pub fn resolve(version: u8, akm: Akm, mic_len: usize) -> Result<Self> {
        match version {
            KEY_DESC_VER_HMAC_MD5_RC4 => Ok(MicAlgorithm::HmacMd5),
            KEY_DESC_VER_HMAC_SHA1_AES => Ok(MicAlgorithm::HmacSha1_128),
            KEY_DESC_VER_AES_128_CMAC => Ok(MicAlgorithm::AesCmac128),
            KEY_DESC_VER_AKM_DEFINED => Self::akm_defined(akm, mic_len),
            other => Err(RsnKeyError::UnsupportedDescriptorVersion(other)),
        }
    }

    fn akm_defined(akm: Akm, mic_len: usize) -> Result<Self> {
        match akm {
            Akm::Sae | Akm::FtSae => Ok(MicAlgorithm::AesCmac128),
            Akm::SaeExtKey | Akm::FtSaeExtKey | Akm::Owe | Akm::Dpp => match mic_len {
                16 => Ok(MicAlgorithm::HmacSha256_128),
                24 => Ok(MicAlgorithm::HmacSha384_192),
                32 => Ok(MicAlgorithm::HmacSha512_256),
                len => Err(RsnKeyError::InvalidKeyLength { what: "MIC", len }),
            },
            Akm::SuiteB => Ok(MicAlgorithm::HmacSha256_128),
            Akm::SuiteB192 | Akm::FtIeee8021xSha384 | Akm::FtPskSha384 | Akm::PskSha384 => {
                Ok(MicAlgorithm::HmacSha384_192)
            }
            other => Err(RsnKeyError::UnsupportedAkm(format!(
                "{other:?} has no AKM-defined MIC"
            ))),
        }
    }

    pub fn output_len(self) -> usize {
        match self {
            MicAlgorithm::HmacSha384_192 => 24,
            MicAlgorithm::HmacSha512_256 => 32,
            _ => 16,
        }
    }
}

fn new_mac<M: Mac + KeyInit>(key: &[u8]) -> Result<M> {
    <M as KeyInit>::new_from_slice(key).map_err(|_| RsnKeyError::InvalidKeyLength {
        what: "KCK",
        len: key.len(),
    })
}

fn tag<M: Mac + KeyInit>(key: &[u8], data: &[u8], len: usize) -> Result<Vec<u8>> {
    let mut mac = new_mac::<M>(key)?;
    mac.update(data);
    let full = mac.finalize().into_bytes();
    Ok(full[..len].to_vec())
}

fn check<M: Mac + KeyInit>(key: &[u8], data: &[u8], expected: &[u8]) -> bool {
    match new_mac::<M>(key) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_truncated_left(expected).is_ok()
        }
        Err(_) => false,
    }
}

/// Compute the MIC of `data` (the EAPOL frame with its MIC field zeroed).
pub fn compute_mic(version: u8, akm: Akm, kck: &[u8], data: &[u8], mic_len: usize) -> Result<Vec<u8>> {
    let alg = MicAlgorithm::resolve(version, akm, mic_len)?;
    let len = alg.output_len();
    match alg {
        MicAlgorithm::HmacMd5 => tag::<Hmac<Md5>>(kck, data, len),
        MicAlgorithm::HmacSha1_128 => tag::<Hmac<Sha1>>(kck, data, len),
        MicAlgorithm::AesCmac128 => tag::<Cmac<Aes128>>(kck, data, len),
        MicAlgorithm::HmacSha256_128 => tag::<Hmac<Sha256>>(kck, data, len),
        MicAlgorithm::HmacSha384_192 => tag::<Hmac<Sha384>>(kck, data, len),
        MicAlgorithm::HmacSha512_256 => tag::<Hmac<Sha512>>(kck, data, len),
    }
}

/// Verify `expected` against the MIC of `data`. Never errors: any failure to
/// set up the MAC counts as a mismatch.
pub fn verify_mic(version: u8, akm: Akm, kck: &[u8], data: &[u8], expected: &[u8]) -> bool {
    let Ok(alg) = MicAlgorithm::resolve(version, akm, expected.len()) else {
        return false;
    };
    if expected.len() != alg.output_len() {
        return false;
    }
    match alg {
        MicAlgorithm::HmacMd5 => check::<Hmac<Md5>>(kck, data, expected),
        MicAlgorithm::HmacSha1_128 => check::<Hmac<Sha1>>(kck, data, expected),
        MicAlgorithm::AesCmac128 => check::<Cmac<Aes128>>(kck, data, expected),
        MicAlgorithm::HmacSha256_128 => check::<Hmac<Sha256>>(kck, data, expected),
        MicAlgorithm::HmacSha384_192 => check::<Hmac<Sha384>>(kck, data, expected),
        MicAlgorithm::HmacSha512_256 => check::<Hmac<Sha512>>(kck, data, expected),
    }
}

fn tag_parts<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]], len: usize) -> Result<Vec<u8>> {
    let mut mac = new_mac::<M>(key)?;
    for part in parts {
        mac.update(part);
    }
    let full = mac.finalize().into_bytes();
    Ok(full[..len].to_vec())
}

/// FTE MIC over the concatenation of `parts`. The KCK length selects the
/// algorithm: AES-128-CMAC (16), HMAC-SHA384-192 (24), HMAC-SHA512-256 (32).
pub fn ft_mic(kck: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
    match kck.len() {
        16 => tag_parts::<Cmac<Aes128>>(kck, parts, 16),
        24 => tag_parts::<Hmac<Sha384>>(kck, parts, 24),
        32 => tag_parts::<Hmac<Sha512>>(kck, parts, 32),
        len => Err(RsnKeyError::InvalidKeyLength { what: "FT KCK", len }),
    }
}
