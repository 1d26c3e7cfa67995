//! Collaborator interfaces.
//!
//! The supplicant never touches a socket or a key table itself. The link
//! layer is reached through [`Driver`], the 802.1X/EAP state machine
//! through [`Eapol`]. Optional capabilities have no-op defaults.

use std::fmt;
use std::time::Instant;

use bytes::Bytes;
use zeroize::Zeroizing;

use rsnkey::ie::Oci;
use rsnkey::kde::IpAddrAlloc;
use rsnkey::{Akm, Cipher, MacAddr, Pmkid};

use crate::error::{Result, SupplicantError};
use crate::pmksa::NetworkCtx;

/// IEEE 802.11 reason codes the supplicant sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ReasonCode {
    Unspecified = 1,
    PrevAuthNotValid = 2,
    DeauthLeaving = 3,
    MichaelMicFailure = 14,
    FourWayHandshakeTimeout = 15,
    GroupKeyUpdateTimeout = 16,
    IeIn4WayDiffers = 17,
    Ieee8021xAuthFailed = 23,
    InvalidPmkid = 49,
    InvalidMde = 50,
    InvalidFte = 51,
}

impl ReasonCode {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Key-management state reported to the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WpaState {
    Disconnected,
    Associated,
    FourWayHandshake,
    GroupHandshake,
    Completed,
}

impl fmt::Display for WpaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WpaState::Disconnected => write!(f, "DISCONNECTED"),
            WpaState::Associated => write!(f, "ASSOCIATED"),
            WpaState::FourWayHandshake => write!(f, "4WAY_HANDSHAKE"),
            WpaState::GroupHandshake => write!(f, "GROUP_HANDSHAKE"),
            WpaState::Completed => write!(f, "COMPLETED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Pairwise,
    Group,
    Igtk,
    Bigtk,
}

/// One key handed to the driver.
pub struct KeyInstall<'a> {
    pub kind: KeyKind,
    pub cipher: Cipher,
    pub key_idx: u16,
    /// Peer address for pairwise keys, broadcast for group keys.
    pub addr: MacAddr,
    pub set_tx: bool,
    /// Receive sequence counter, little-endian.
    pub rsc: &'a [u8],
    pub key: &'a [u8],
    /// MLO link the key belongs to.
    pub link_id: Option<u8>,
}

impl fmt::Debug for KeyInstall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInstall")
            .field("kind", &self.kind)
            .field("cipher", &self.cipher)
            .field("key_idx", &self.key_idx)
            .field("addr", &self.addr)
            .field("set_tx", &self.set_tx)
            .field("key_len", &self.key.len())
            .field("link_id", &self.link_id)
            .finish()
    }
}

/// A PMKSA entry as reported to drivers that do their own PMKSA caching.
#[derive(Debug, Clone, Copy)]
pub struct PmkidReport<'a> {
    pub network_ctx: NetworkCtx,
    pub aa: MacAddr,
    pub pmkid: &'a Pmkid,
    pub akm: Akm,
    pub lifetime_secs: u32,
    pub reauth_threshold: u8,
    pub fils_cache_id: Option<[u8; 2]>,
}

/// The link layer.
pub trait Driver {
    fn own_addr(&self) -> MacAddr;

    /// Monotonic clock used for PMKSA lifetimes and timers.
    fn now(&self) -> Instant;

    /// Transmit an EAPOL frame (ethertype 0x888e).
    fn send_eapol(&mut self, dest: MacAddr, frame: Bytes) -> Result<()>;

    fn install_key(&mut self, key: &KeyInstall<'_>) -> Result<()>;

    /// Drop every key installed for the current association.
    fn clear_keys(&mut self) {}

    fn deauthenticate(&mut self, reason: ReasonCode);

    /// Disconnect and associate again with the same network.
    fn reconnect(&mut self);

    fn set_state(&mut self, _state: WpaState) {}

    /// Security elements (RSNE, RSNXE, WPA IE) from the latest Beacon or
    /// Probe Response of `bssid`.
    fn beacon_ies(&mut self, _bssid: MacAddr) -> Option<Bytes> {
        None
    }

    /// Current operating channel, for OCV.
    fn channel_info(&mut self) -> Option<Oci> {
        None
    }

    fn add_pmkid(&mut self, _entry: &PmkidReport<'_>) {}

    fn remove_pmkid(&mut self, _network_ctx: NetworkCtx, _aa: MacAddr, _pmkid: &Pmkid) {}

    fn transition_disable(&mut self, _bitmap: u8) {}

    /// Send an FT Action frame to the current AP.
    fn send_ft_action(&mut self, _dest: MacAddr, _frame: Bytes) -> Result<()> {
        Err(SupplicantError::Driver("FT Action frames not supported".into()))
    }

    /// FT elements to place in the next Authentication or Reassociation
    /// Request.
    fn update_ft_ies(&mut self, _mdid: [u8; 2], _ies: &[u8]) {}

    fn ip_addr_allocated(&mut self, _alloc: &IpAddrAlloc) {}
}

/// The 802.1X/EAP state machine.
pub trait Eapol {
    /// MSK of the last successful EAP authentication.
    fn master_key(&mut self) -> Option<Zeroizing<Vec<u8>>>;

    /// Restart EAP from scratch; called after an EAPOL-Start was sent.
    fn start_full_auth(&mut self);

    fn request_reauth(&mut self);

    fn notify_cached_pmk(&mut self) {}

    fn notify_port_valid(&mut self, _valid: bool) {}

    /// The handshake finished with a PSK-like AKM; EAP is not involved.
    fn notify_key_done(&mut self) {}
}

/// `Eapol` for deployments without 802.1X.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEapol;

impl Eapol for NoEapol {
    fn master_key(&mut self) -> Option<Zeroizing<Vec<u8>>> {
        None
    }

    fn start_full_auth(&mut self) {}

    fn request_reauth(&mut self) {}
}
