use thiserror::Error;

use rsnkey::RsnKeyError;

use crate::ft::FtError;
use crate::handshake::HandshakeError;

/// All errors produced by the supplicant outside of frame processing.
///
/// Frame handlers report [`HandshakeError`]s, which carry their own
/// disposition; this type covers configuration, collaborator failures and
/// calls made in the wrong association state.
#[derive(Debug, Error)]
pub enum SupplicantError {
    #[error(transparent)]
    Key(#[from] RsnKeyError),

    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error("driver error: {0}")]
    Driver(String),

    #[error("not associated")]
    NotAssociated,

    #[error("no PTK available")]
    NoPtk,

    #[error("FT: {0}")]
    Ft(#[from] FtError),

    #[error("PMKSA: {0}")]
    Pmksa(String),

    #[error("event channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, SupplicantError>;
