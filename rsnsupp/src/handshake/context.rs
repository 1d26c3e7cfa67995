// Per-association handshake state.
//
// Created on association, dropped (and its key material wiped) on
// disassociation. Everything a single EAPOL-Key exchange reads or updates
// lives here; state that outlives an association (PMKSA cache, FT key
// hierarchy, timers) stays on the supplicant.

use bytes::Bytes;
use zeroize::Zeroizing;

use rsnkey::{Akm, Cipher, MacAddr, Nonce, Proto, Ptk};

use crate::driver::WpaState;
use crate::handshake::extension::HandshakeExtension;
use crate::keys::InstalledKeys;
use crate::pmksa::NetworkCtx;

pub struct HandshakeContext {
    /// Authenticator address: the BSSID, or the AP MLD address for MLO.
    pub(crate) bssid: MacAddr,
    /// Supplicant address: own MAC, or own MLD address for MLO.
    pub(crate) own_addr: MacAddr,
    pub(crate) proto: Proto,
    pub(crate) akm: Akm,
    pub(crate) pairwise: Cipher,
    pub(crate) group: Cipher,
    pub(crate) group_mgmt: Option<Cipher>,
    pub(crate) network_ctx: NetworkCtx,
    pub(crate) ssid: Vec<u8>,

    pub(crate) pmk: Zeroizing<Vec<u8>>,
    /// FT XXKey (first-level key for PMK-R0).
    pub(crate) xxkey: Zeroizing<Vec<u8>>,
    /// Optional PFS shared secret mixed into the PTK (DPP).
    pub(crate) pfs_z: Option<Zeroizing<Vec<u8>>>,

    /// Derived at Message 1, promoted to `ptk` once a MIC verifies with it.
    pub(crate) tptk: Option<Ptk>,
    pub(crate) ptk: Option<Ptk>,
    pub(crate) ptk_installed: bool,

    pub(crate) snonce: Nonce,
    pub(crate) renew_snonce: bool,
    pub(crate) anonce: Nonce,
    pub(crate) rx_replay_counter: Option<u64>,
    pub(crate) request_counter: u64,
    pub(crate) state: WpaState,

    pub(crate) own_ie: Bytes,
    pub(crate) own_rsnxe: Option<Bytes>,
    pub(crate) ap_rsne: Option<Bytes>,
    pub(crate) ap_wpa_ie: Option<Bytes>,
    pub(crate) ap_rsnxe: Option<Bytes>,

    /// Message 3 was processed; Group Key Handshakes may follow.
    pub(crate) msg3_ok: bool,
    pub(crate) keys: InstalledKeys,
    pub(crate) eapol_start_count: u32,
    pub(crate) extensions: Vec<HandshakeExtension>,
}

impl HandshakeContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        bssid: MacAddr,
        own_addr: MacAddr,
        proto: Proto,
        akm: Akm,
        pairwise: Cipher,
        group: Cipher,
        group_mgmt: Option<Cipher>,
        network_ctx: NetworkCtx,
        ssid: &[u8],
        own_ie: Bytes,
    ) -> Self {
        Self {
            bssid,
            own_addr,
            proto,
            akm,
            pairwise,
            group,
            group_mgmt,
            network_ctx,
            ssid: ssid.to_vec(),
            pmk: Zeroizing::new(Vec::new()),
            xxkey: Zeroizing::new(Vec::new()),
            pfs_z: None,
            tptk: None,
            ptk: None,
            ptk_installed: false,
            snonce: [0u8; rsnkey::NONCE_LEN],
            renew_snonce: true,
            anonce: [0u8; rsnkey::NONCE_LEN],
            rx_replay_counter: None,
            request_counter: 0,
            state: WpaState::Associated,
            own_ie,
            own_rsnxe: None,
            ap_rsne: None,
            ap_wpa_ie: None,
            ap_rsnxe: None,
            msg3_ok: false,
            keys: InstalledKeys::default(),
            eapol_start_count: 0,
            extensions: Vec::new(),
        }
    }

    /// PMK length used to size MIC, KCK and KEK. Before a PMK is known the
    /// 256-bit default applies.
    pub(crate) fn pmk_len(&self) -> usize {
        if !self.pmk.is_empty() {
            self.pmk.len()
        } else if !self.xxkey.is_empty() {
            self.xxkey.len()
        } else {
            32
        }
    }

    pub(crate) fn mic_len(&self) -> usize {
        self.akm.mic_len(self.pmk_len())
    }

    pub(crate) fn has_extension(&self, f: impl Fn(&HandshakeExtension) -> bool) -> bool {
        self.extensions.iter().any(f)
    }

    pub fn bssid(&self) -> MacAddr {
        self.bssid
    }

    pub fn own_addr(&self) -> MacAddr {
        self.own_addr
    }

    pub fn akm(&self) -> Akm {
        self.akm
    }

    pub fn state(&self) -> WpaState {
        self.state
    }

    pub fn snonce(&self) -> &Nonce {
        &self.snonce
    }

    pub fn anonce(&self) -> &Nonce {
        &self.anonce
    }

    pub fn has_ptk(&self) -> bool {
        self.ptk.is_some()
    }

    pub fn has_tptk(&self) -> bool {
        self.tptk.is_some()
    }

    pub fn ptk_installed(&self) -> bool {
        self.ptk_installed
    }

    pub fn rx_replay_counter(&self) -> Option<u64> {
        self.rx_replay_counter
    }

    pub fn request_counter(&self) -> u64 {
        self.request_counter
    }

    pub fn extensions(&self) -> &[HandshakeExtension] {
        &self.extensions
    }
}

impl std::fmt::Debug for HandshakeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeContext")
            .field("bssid", &self.bssid)
            .field("own_addr", &self.own_addr)
            .field("akm", &self.akm)
            .field("state", &self.state)
            .field("has_pmk", &!self.pmk.is_empty())
            .field("has_ptk", &self.ptk.is_some())
            .field("ptk_installed", &self.ptk_installed)
            .field("rx_replay_counter", &self.rx_replay_counter)
            .finish()
    }
}
