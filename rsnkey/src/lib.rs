// rsnkey -- RSN key hierarchy, EAPOL-Key codec and handshake crypto.
//
// Crate root: module declarations and public re-exports. Everything in this
// crate is a pure, synchronous computation; the stateful supplicant lives in
// the `rsnsupp` crate.

pub mod addr;
pub mod crypto;
pub mod derive;
pub mod eapol;
pub mod error;
pub mod ie;
pub mod kde;
pub mod suite;

// Re-export key types at crate root for convenience.
pub use addr::MacAddr;
pub use derive::ptk::Ptk;
pub use eapol::{EapolKeyFrame, KeyInfo};
pub use error::{Result, RsnKeyError};
pub use suite::{Akm, Cipher, Proto};

/// Length of the ANonce / SNonce carried in EAPOL-Key frames.
pub const NONCE_LEN: usize = 32;

/// Length of a PMKID, PMKR0Name, PMKR1Name and PTKName.
pub const PMKID_LEN: usize = 16;

/// A 32-byte handshake nonce.
pub type Nonce = [u8; NONCE_LEN];

/// A 16-byte PMK identifier.
pub type Pmkid = [u8; PMKID_LEN];

/// Draw a fresh nonce from the operating system RNG.
pub fn random_nonce() -> Nonce {
    use rand::RngCore;
    let mut nonce = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Lower-case hex encoding used by diagnostics and log fields.
pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
