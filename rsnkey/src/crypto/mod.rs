// Cryptographic primitives behind the RSN key hierarchy.
//
// - `prf`: IEEE 802.11 PRF (HMAC-SHA1) and KDF (HMAC-SHA256/384/512)
// - `mic`: EAPOL-Key MIC selection by descriptor version / AKM
// - `wrap`: key data confidentiality: AES key wrap and RC4
// - `aead`: AES-SIV sealing of FILS key data

pub mod aead;
pub mod mic;
pub mod prf;
pub mod wrap;

pub use aead::SivKey;
pub use mic::{compute_mic, ft_mic, verify_mic};
pub use prf::{digest, hmac, kdf, sha1_prf};
pub use wrap::{aes_unwrap, aes_wrap, rc4_skip_xor};
