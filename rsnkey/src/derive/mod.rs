//! Key hierarchy derivation.
//!
//! Everything here is a deterministic function of its inputs. Failures are
//! limited to invalid input lengths; callers treat them as fatal for the
//! association.

pub mod ft;
pub mod owe;
pub mod pmkid;
pub mod psk;
pub mod ptk;

pub use ft::{derive_pmk_r0, derive_pmk_r1, pmk_r1_to_ptk, PmkR0, PmkR1};
pub use pmkid::{pmkid, pmkid_suite_b};
pub use psk::passphrase_to_psk;
pub use ptk::{pmk_to_ptk, Ptk, PtkParams};

/// Shortest PMK accepted by any AKM.
pub const PMK_LEN_MIN: usize = 16;
/// Longest PMK (SHA-512 based OWE/DPP/SAE-EXT).
pub const PMK_LEN_MAX: usize = 64;
