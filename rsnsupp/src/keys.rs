//! Group key installation.
//!
//! Tracks the last GTK, IGTK and BIGTK handed to the driver per MLO link so
//! that a retransmitted or replayed frame carrying the same key does not
//! reinstall it and reset its receive sequence counter.

use std::collections::HashMap;

use zeroize::Zeroizing;

use rsnkey::kde::IPN_LEN;
use rsnkey::{Cipher, MacAddr};

use crate::driver::{Driver, KeyInstall, KeyKind};
use crate::handshake::{HandshakeError, Result};

/// Highest key ID an IGTK or BIGTK KDE may carry before the range check.
const MGMT_KEY_ID_MAX: u16 = 4095;

#[derive(Default)]
pub struct InstalledKeys {
    last: HashMap<(KeyKind, Option<u8>), (u16, Zeroizing<Vec<u8>>)>,
}

impl InstalledKeys {
    /// Whether `key` with `key_idx` is what the driver already holds.
    pub fn is_installed(&self, kind: KeyKind, link: Option<u8>, key_idx: u16, key: &[u8]) -> bool {
        self.last
            .get(&(kind, link))
            .is_some_and(|(idx, k)| *idx == key_idx && k.as_slice() == key)
    }

    pub fn record(&mut self, kind: KeyKind, link: Option<u8>, key_idx: u16, key: &[u8]) {
        self.last
            .insert((kind, link), (key_idx, Zeroizing::new(key.to_vec())));
    }

    pub fn clear(&mut self) {
        self.last.clear();
    }
}

/// A GTK as received from a GTK KDE, MLO GTK KDE, FT GTK subelement or WPA
/// Group Message 1.
pub struct GroupKey<'a> {
    pub key_idx: u8,
    pub tx: bool,
    pub rsc: &'a [u8],
    pub key: &'a [u8],
    pub link_id: Option<u8>,
}

/// An IGTK or BIGTK.
pub struct MgmtGroupKey<'a> {
    pub key_id: u16,
    pub ipn: &'a [u8; IPN_LEN],
    pub key: &'a [u8],
    pub link_id: Option<u8>,
}

/// Install a GTK unless the same key is already in place. Returns `true`
/// when the driver was called.
pub fn install_gtk<D: Driver + ?Sized>(
    driver: &mut D,
    keys: &mut InstalledKeys,
    cipher: Cipher,
    gtk: &GroupKey<'_>,
) -> Result<bool> {
    let key_len = cipher.key_len();
    if gtk.key.len() < key_len {
        return Err(HandshakeError::KeyLength {
            what: "GTK",
            got: gtk.key.len(),
            expected: key_len,
        });
    }
    let mut key = Zeroizing::new(gtk.key[..key_len].to_vec());
    if cipher == Cipher::Tkip {
        // Authenticator Tx/Rx Michael keys are station Rx/Tx.
        let (head, tail) = key.split_at_mut(24);
        head[16..24].swap_with_slice(&mut tail[..8]);
    }
    let idx = u16::from(gtk.key_idx);
    if keys.is_installed(KeyKind::Group, gtk.link_id, idx, &key) {
        tracing::debug!(key_idx = gtk.key_idx, link = ?gtk.link_id, "not reinstalling already in-use GTK");
        return Ok(false);
    }
    let rsc_len = cipher.rsc_len().min(gtk.rsc.len());
    driver
        .install_key(&KeyInstall {
            kind: KeyKind::Group,
            cipher,
            key_idx: idx,
            addr: MacAddr::BROADCAST,
            set_tx: gtk.tx,
            rsc: &gtk.rsc[..rsc_len],
            key: &key,
            link_id: gtk.link_id,
        })
        .map_err(|e| HandshakeError::KeyInstall(e.to_string()))?;
    keys.record(KeyKind::Group, gtk.link_id, idx, &key);
    tracing::debug!(key_idx = gtk.key_idx, tx = gtk.tx, link = ?gtk.link_id, "GTK installed");
    Ok(true)
}

/// Install an IGTK (key ID 4 or 5) or BIGTK (6 or 7).
///
/// With `byte_swap_compat`, IGTK key IDs 0x0400 and 0x0500 are read as 4
/// and 5.
pub fn install_mgmt_group_key<D: Driver + ?Sized>(
    driver: &mut D,
    keys: &mut InstalledKeys,
    kind: KeyKind,
    cipher: Cipher,
    mgmt: &MgmtGroupKey<'_>,
    byte_swap_compat: bool,
) -> Result<bool> {
    let (name, ids) = match kind {
        KeyKind::Igtk => ("IGTK", 4..=5u16),
        KeyKind::Bigtk => ("BIGTK", 6..=7u16),
        _ => return Err(HandshakeError::KeyInstall(format!("{kind:?} is not a management group key"))),
    };
    let mut key_id = mgmt.key_id;
    if kind == KeyKind::Igtk && byte_swap_compat && matches!(key_id, 0x0400 | 0x0500) {
        key_id = key_id.swap_bytes();
    }
    if key_id > MGMT_KEY_ID_MAX || !ids.contains(&key_id) {
        return Err(HandshakeError::KeyId { kind: name, id: key_id });
    }
    if mgmt.key.len() != cipher.key_len() {
        return Err(HandshakeError::KeyLength {
            what: name,
            got: mgmt.key.len(),
            expected: cipher.key_len(),
        });
    }
    if keys.is_installed(kind, mgmt.link_id, key_id, mgmt.key) {
        tracing::debug!(key_id, "not reinstalling already in-use {name}");
        return Ok(false);
    }
    driver
        .install_key(&KeyInstall {
            kind,
            cipher,
            key_idx: key_id,
            addr: MacAddr::BROADCAST,
            set_tx: false,
            rsc: mgmt.ipn,
            key: mgmt.key,
            link_id: mgmt.link_id,
        })
        .map_err(|e| HandshakeError::KeyInstall(e.to_string()))?;
    keys.record(kind, mgmt.link_id, key_id, mgmt.key);
    tracing::debug!(key_id, link = ?mgmt.link_id, "{name} installed");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_compare() {
        let mut keys = InstalledKeys::default();
        keys.record(KeyKind::Group, None, 1, &[1; 16]);
        assert!(keys.is_installed(KeyKind::Group, None, 1, &[1; 16]));
        assert!(!keys.is_installed(KeyKind::Group, None, 2, &[1; 16]));
        assert!(!keys.is_installed(KeyKind::Group, Some(0), 1, &[1; 16]));
        assert!(!keys.is_installed(KeyKind::Igtk, None, 1, &[1; 16]));
        keys.clear();
        assert!(!keys.is_installed(KeyKind::Group, None, 1, &[1; 16]));
    }
}
