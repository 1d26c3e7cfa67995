//! rsnsupp -- station-side RSN key management.
//!
//! Drives the key-management half of a WPA2/WPA3 association:
//! - **4-Way Handshake**: PMK resolution, TPTK/PTK handling, key installation
//! - **Group Key Handshake**: GTK/IGTK/BIGTK rekeying
//! - **PMKSA cache**: bounded, expiration-ordered master key store with
//!   opportunistic key caching
//! - **Fast BSS Transition**: over-the-air and over-the-DS
//!
//! All processing is single-threaded. The embedding application supplies a
//! [`Driver`] and an [`Eapol`] implementation and feeds events either by
//! calling [`Supplicant`] methods directly or through [`event_loop::run`].

pub mod config;
pub mod driver;
pub mod error;
pub mod event_loop;
pub mod ft;
pub mod handshake;
pub mod keys;
pub mod mib;
pub mod pmksa;
pub mod supplicant;
pub mod timer;

// Re-export key public types at crate root.
pub use config::SupplicantConfig;
pub use driver::{Driver, Eapol, KeyInstall, KeyKind, ReasonCode, WpaState};
pub use error::{Result, SupplicantError};
pub use handshake::{Disposition, HandshakeError};
pub use pmksa::{NetworkCtx, PmksaCache, PmksaEntry};
pub use supplicant::{AssocParams, MldLink, MldParams, Supplicant};
