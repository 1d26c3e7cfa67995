// rsnkey error types

use thiserror::Error;

/// Top-level error type for the rsnkey crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RsnKeyError {
    // ── Suite errors ────────────────────────────────────────────────────
    #[error("unsupported AKM suite: {0}")]
    UnsupportedAkm(String),

    #[error("unsupported cipher suite: {0}")]
    UnsupportedCipher(String),

    #[error("unsupported key descriptor version: {0}")]
    UnsupportedDescriptorVersion(u8),

    // ── Crypto errors ───────────────────────────────────────────────────
    #[error("invalid key length for {what}: {len}")]
    InvalidKeyLength { what: &'static str, len: usize },

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("AES key wrap failed: {0}")]
    KeyWrap(String),

    #[error("AES key unwrap failed")]
    KeyUnwrap,

    #[error("AEAD seal failed: {0}")]
    AeadSeal(String),

    #[error("AEAD open failed")]
    AeadOpen,

    // ── Codec errors ────────────────────────────────────────────────────
    #[error("frame too short: need {need}, have {have}")]
    FrameTooShort { need: usize, have: usize },

    #[error("length field mismatch in {what}: declared {declared}, available {available}")]
    LengthMismatch {
        what: &'static str,
        declared: usize,
        available: usize,
    },

    #[error("not an EAPOL-Key frame (packet type {0})")]
    NotKeyFrame(u8),

    #[error("unknown key descriptor type: {0}")]
    UnknownDescriptor(u8),

    #[error("invalid {element} element: {reason}")]
    InvalidElement {
        element: &'static str,
        reason: String,
    },

    #[error("invalid {kde} KDE: {reason}")]
    InvalidKde { kde: &'static str, reason: String },

    #[error("buffer too small: need {need}, have {have}")]
    BufferTooSmall { need: usize, have: usize },
}

impl RsnKeyError {
    pub fn element(element: &'static str, reason: impl Into<String>) -> Self {
        RsnKeyError::InvalidElement {
            element,
            reason: reason.into(),
        }
    }

    pub fn kde(kde: &'static str, reason: impl Into<String>) -> Self {
        RsnKeyError::InvalidKde {
            kde,
            reason: reason.into(),
        }
    }
}

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, RsnKeyError>;
