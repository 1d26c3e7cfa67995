//! Shared fixtures: a recording driver, a scripted EAPOL state machine and
//! an authenticator that builds the AP side of each handshake.

#![allow(dead_code)]

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use zeroize::Zeroizing;

use rsnkey::crypto::{aes_wrap, ft_mic};
use rsnkey::derive::{derive_pmk_r0, derive_pmk_r1, pmk_r1_to_ptk, pmk_to_ptk, PmkR0, PmkR1, PtkParams};
use rsnkey::eapol::{DESC_TYPE_RSN, DESC_TYPE_WPA, EAPOL_VERSION_2004};
use rsnkey::ie::{self, Fte, Mde, Oci, Rsne, EID_FAST_BSS_TRANSITION, EID_MOBILITY_DOMAIN, EID_RSN};
use rsnkey::kde;
use rsnkey::kde::IpAddrAlloc;
use rsnkey::{Akm, Cipher, EapolKeyFrame, KeyInfo, MacAddr, Nonce, Pmkid, Proto, Ptk};

use rsnsupp::config::PmfMode;
use rsnsupp::driver::PmkidReport;
use rsnsupp::{
    AssocParams, Driver, Eapol, KeyInstall, KeyKind, NetworkCtx, ReasonCode, Supplicant,
    SupplicantConfig, SupplicantError, WpaState,
};

pub const AP: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
pub const AP2: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x02]);
pub const STA: MacAddr = MacAddr([0x02, 0x00, 0x00, 0x00, 0x00, 0x99]);
pub const NET: NetworkCtx = NetworkCtx(1);
pub const SSID: &str = "rsn-test";
pub const PSK_HEX: &str = "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f20";

pub fn psk_bytes() -> Vec<u8> {
    (1..=32u8).collect()
}

pub type TestSupplicant = Supplicant<MockDriver, MockEapol>;

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledKey {
    pub kind: KeyKind,
    pub cipher: Cipher,
    pub key_idx: u16,
    pub addr: MacAddr,
    pub set_tx: bool,
    pub rsc: Vec<u8>,
    pub key: Vec<u8>,
    pub link_id: Option<u8>,
}

pub struct MockDriver {
    pub addr: MacAddr,
    pub clock: Instant,
    /// Read tokio's (possibly paused) clock instead of `clock`.
    pub tokio_clock: bool,
    pub sent: Vec<(MacAddr, Bytes)>,
    pub outbox: Option<mpsc::UnboundedSender<(MacAddr, Bytes)>>,
    pub keys: Vec<InstalledKey>,
    pub cleared: u32,
    pub deauths: Vec<ReasonCode>,
    pub reconnects: u32,
    pub states: Vec<WpaState>,
    pub beacon: Option<Bytes>,
    pub channel: Option<Oci>,
    pub refuse_key_install: bool,
    pub pmkids_added: Vec<(MacAddr, Pmkid)>,
    pub pmkids_removed: Vec<(MacAddr, Pmkid)>,
    pub transition_disable: Vec<u8>,
    pub ft_actions: Vec<(MacAddr, Bytes)>,
    pub ft_ies: Vec<([u8; 2], Vec<u8>)>,
    pub ip_allocs: Vec<IpAddrAlloc>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self {
            addr: STA,
            clock: Instant::now(),
            tokio_clock: false,
            sent: Vec::new(),
            outbox: None,
            keys: Vec::new(),
            cleared: 0,
            deauths: Vec::new(),
            reconnects: 0,
            states: Vec::new(),
            beacon: None,
            channel: None,
            refuse_key_install: false,
            pmkids_added: Vec::new(),
            pmkids_removed: Vec::new(),
            transition_disable: Vec::new(),
            ft_actions: Vec::new(),
            ft_ies: Vec::new(),
            ip_allocs: Vec::new(),
        }
    }
}

impl MockDriver {
    pub fn advance(&mut self, by: Duration) {
        self.clock += by;
    }

    /// Most recent EAPOL frame, removed from the log.
    pub fn take_last(&mut self) -> Bytes {
        self.sent.pop().map(|(_, f)| f).expect("no EAPOL frame sent")
    }

    pub fn keys_of(&self, kind: KeyKind) -> Vec<&InstalledKey> {
        self.keys.iter().filter(|k| k.kind == kind).collect()
    }
}

impl Driver for MockDriver {
    fn own_addr(&self) -> MacAddr {
        self.addr
    }

    fn now(&self) -> Instant {
        if self.tokio_clock {
            tokio::time::Instant::now().into_std()
        } else {
            self.clock
        }
    }

    fn send_eapol(&mut self, dest: MacAddr, frame: Bytes) -> rsnsupp::Result<()> {
        if let Some(outbox) = &self.outbox {
            let _ = outbox.send((dest, frame.clone()));
        }
        self.sent.push((dest, frame));
        Ok(())
    }

    fn install_key(&mut self, key: &KeyInstall<'_>) -> rsnsupp::Result<()> {
        if self.refuse_key_install {
            return Err(SupplicantError::Driver("key table full".into()));
        }
        self.keys.push(InstalledKey {
            kind: key.kind,
            cipher: key.cipher,
            key_idx: key.key_idx,
            addr: key.addr,
            set_tx: key.set_tx,
            rsc: key.rsc.to_vec(),
            key: key.key.to_vec(),
            link_id: key.link_id,
        });
        Ok(())
    }

    fn clear_keys(&mut self) {
        self.cleared += 1;
    }

    fn deauthenticate(&mut self, reason: ReasonCode) {
        self.deauths.push(reason);
    }

    fn reconnect(&mut self) {
        self.reconnects += 1;
    }

    fn set_state(&mut self, state: WpaState) {
        self.states.push(state);
    }

    fn beacon_ies(&mut self, _bssid: MacAddr) -> Option<Bytes> {
        self.beacon.clone()
    }

    fn channel_info(&mut self) -> Option<Oci> {
        self.channel
    }

    fn add_pmkid(&mut self, entry: &PmkidReport<'_>) {
        self.pmkids_added.push((entry.aa, *entry.pmkid));
    }

    fn remove_pmkid(&mut self, _network_ctx: NetworkCtx, aa: MacAddr, pmkid: &Pmkid) {
        self.pmkids_removed.push((aa, *pmkid));
    }

    fn transition_disable(&mut self, bitmap: u8) {
        self.transition_disable.push(bitmap);
    }

    fn send_ft_action(&mut self, dest: MacAddr, frame: Bytes) -> rsnsupp::Result<()> {
        self.ft_actions.push((dest, frame));
        Ok(())
    }

    fn update_ft_ies(&mut self, mdid: [u8; 2], ies: &[u8]) {
        self.ft_ies.push((mdid, ies.to_vec()));
    }

    fn ip_addr_allocated(&mut self, alloc: &IpAddrAlloc) {
        self.ip_allocs.push(*alloc);
    }
}

// ---------------------------------------------------------------------------
// EAPOL
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockEapol {
    pub msk: Option<Vec<u8>>,
    pub starts: u32,
    pub reauth_requests: u32,
    pub cached_pmk: u32,
    pub port_valid: bool,
    pub key_done: u32,
}

impl Eapol for MockEapol {
    fn master_key(&mut self) -> Option<Zeroizing<Vec<u8>>> {
        self.msk.clone().map(Zeroizing::new)
    }

    fn start_full_auth(&mut self) {
        self.starts += 1;
    }

    fn request_reauth(&mut self) {
        self.reauth_requests += 1;
    }

    fn notify_cached_pmk(&mut self) {
        self.cached_pmk += 1;
    }

    fn notify_port_valid(&mut self, valid: bool) {
        self.port_valid = valid;
    }

    fn notify_key_done(&mut self) {
        self.key_done += 1;
    }
}

// ---------------------------------------------------------------------------
// Configurations
// ---------------------------------------------------------------------------

pub fn psk_config() -> SupplicantConfig {
    SupplicantConfig {
        ssid: SSID.into(),
        psk: Some(PSK_HEX.into()),
        ..Default::default()
    }
}

pub fn eap_config() -> SupplicantConfig {
    SupplicantConfig {
        akm: Akm::Ieee8021x,
        ssid: SSID.into(),
        ..Default::default()
    }
}

pub fn pmf_config() -> SupplicantConfig {
    SupplicantConfig {
        pmf: PmfMode::Optional,
        group_mgmt_cipher: Some(Cipher::BipCmac128),
        ..psk_config()
    }
}

pub fn ft_config() -> SupplicantConfig {
    SupplicantConfig {
        akm: Akm::FtPsk,
        ..psk_config()
    }
}

pub fn supplicant(config: SupplicantConfig) -> TestSupplicant {
    Supplicant::new(config, MockDriver::default(), MockEapol::default()).unwrap()
}

/// A 64-byte MSK whose first half becomes the PMK.
pub fn msk() -> Vec<u8> {
    (0..64u8).map(|b| b ^ 0x5a).collect()
}

// ---------------------------------------------------------------------------
// Authenticator
// ---------------------------------------------------------------------------

/// FT parameters of the mobility domain the test AP belongs to.
pub struct ApFt {
    pub mdid: [u8; 2],
    pub r0kh_id: Vec<u8>,
    pub r1kh_id: MacAddr,
    pub r0: Option<PmkR0>,
    pub r1: Option<PmkR1>,
}

pub struct TestAp {
    pub addr: MacAddr,
    pub sta: MacAddr,
    pub proto: Proto,
    pub akm: Akm,
    pub pairwise: Cipher,
    pub group: Cipher,
    pub group_mgmt: Option<Cipher>,
    pub capabilities: u16,
    pub pmk: Vec<u8>,
    pub anonce: Nonce,
    pub snonce: Nonce,
    pub replay: u64,
    pub ptk: Option<Ptk>,
    pub gtk: Vec<u8>,
    pub gtk_idx: u8,
    pub igtk: Option<(u16, Vec<u8>)>,
    pub ft: Option<ApFt>,
}

impl TestAp {
    pub fn new(akm: Akm, pmk: &[u8]) -> Self {
        Self {
            addr: AP,
            sta: STA,
            proto: Proto::Rsn,
            akm,
            pairwise: Cipher::Ccmp128,
            group: Cipher::Ccmp128,
            group_mgmt: None,
            capabilities: 0,
            pmk: pmk.to_vec(),
            anonce: [0xa1; 32],
            snonce: [0; 32],
            replay: 0,
            ptk: None,
            gtk: vec![0x47; 16],
            gtk_idx: 1,
            igtk: None,
            ft: None,
        }
    }

    pub fn psk() -> Self {
        Self::new(Akm::Psk, &psk_bytes())
    }

    pub fn wpa() -> Self {
        Self {
            proto: Proto::Wpa,
            ..Self::psk()
        }
    }

    pub fn ft_psk() -> Self {
        Self {
            ft: Some(ApFt {
                mdid: [0x12, 0x34],
                r0kh_id: b"r0kh.example.net".to_vec(),
                r1kh_id: MacAddr([0x02, 0, 0, 0, 0x01, 0x01]),
                r0: None,
                r1: None,
            }),
            ..Self::new(Akm::FtPsk, &psk_bytes())
        }
    }

    pub fn mic_len(&self) -> usize {
        self.akm.mic_len(32)
    }

    fn version(&self) -> u8 {
        self.akm.descriptor_version(self.pairwise, self.group)
    }

    fn descriptor(&self) -> u8 {
        match self.proto {
            Proto::Rsn => DESC_TYPE_RSN,
            Proto::Wpa => DESC_TYPE_WPA,
        }
    }

    pub fn ptk(&self) -> &Ptk {
        self.ptk.as_ref().expect("AP has no PTK yet")
    }

    /// RSNE (or WPA IE) advertised in Beacons.
    pub fn rsne(&self) -> Vec<u8> {
        Rsne::for_station(
            self.proto,
            self.akm,
            self.pairwise,
            self.group,
            self.group_mgmt,
            self.capabilities,
        )
        .encode()
        .unwrap()
    }

    pub fn ap_ies(&self) -> Bytes {
        let mut ies = self.rsne();
        if let Some(ft) = &self.ft {
            ies.extend_from_slice(&self.mde(ft));
        }
        Bytes::from(ies)
    }

    fn mde(&self, ft: &ApFt) -> Vec<u8> {
        Mde {
            mdid: ft.mdid,
            ft_capab: ie::ft::FT_CAPAB_FT_OVER_DS,
        }
        .encode()
    }

    /// MDE ‖ FTE of the Association Response of an initial mobility domain
    /// association.
    pub fn ft_assoc_resp_ies(&self) -> Bytes {
        let ft = self.ft.as_ref().expect("not an FT AP");
        let mut ies = self.mde(ft);
        let fte = Fte {
            mic: vec![0; 16],
            r1kh_id: Some(ft.r1kh_id),
            r0kh_id: Some(ft.r0kh_id.clone()),
            ..Default::default()
        };
        ies.extend_from_slice(&fte.encode().unwrap());
        Bytes::from(ies)
    }

    pub fn assoc_params(&self) -> AssocParams {
        AssocParams {
            bssid: self.addr,
            network_ctx: NET,
            ap_ies: Some(self.ap_ies()),
            assoc_resp_ies: self.ft.as_ref().map(|_| self.ft_assoc_resp_ies()),
            ..Default::default()
        }
    }

    // ---- 4-Way Handshake ----

    pub fn msg1(&mut self, pmkid: Option<&Pmkid>) -> Bytes {
        let info = KeyInfo(0)
            .with_version(self.version())
            .with(KeyInfo::KEY_TYPE)
            .with(KeyInfo::ACK);
        let mut f = EapolKeyFrame::new(EAPOL_VERSION_2004, self.descriptor(), info, self.mic_len());
        f.key_len = self.pairwise.key_len() as u16;
        self.replay += 1;
        f.replay_counter = self.replay;
        f.nonce = self.anonce;
        if let Some(pmkid) = pmkid {
            let mut kd = BytesMut::new();
            kde::put_pmkid(&mut kd, pmkid).unwrap();
            f.key_data = kd.freeze();
        }
        f.encode()
    }

    /// Parse Message 2, derive the PTK and check the MIC.
    pub fn rx_msg2(&mut self, frame: &[u8]) -> EapolKeyFrame {
        let msg2 = EapolKeyFrame::decode(frame, self.mic_len()).unwrap();
        assert_eq!(msg2.replay_counter, self.replay);
        self.snonce = msg2.nonce;
        let ptk = match self.ft.as_mut() {
            None => pmk_to_ptk(&PtkParams {
                pmk: &self.pmk,
                aa: self.addr,
                spa: self.sta,
                anonce: &self.anonce,
                snonce: &msg2.nonce,
                akm: self.akm,
                cipher: self.pairwise,
                z: None,
                kdk_len: 0,
            })
            .unwrap(),
            Some(ft) => {
                let r0 = derive_pmk_r0(
                    self.akm,
                    &self.pmk,
                    SSID.as_bytes(),
                    ft.mdid,
                    &ft.r0kh_id,
                    self.sta,
                )
                .unwrap();
                let r1 = derive_pmk_r1(&r0, ft.r1kh_id, self.sta).unwrap();
                let (ptk, _) = pmk_r1_to_ptk(
                    &r1,
                    self.akm,
                    self.pairwise,
                    &msg2.nonce,
                    &self.anonce,
                    self.addr,
                    self.sta,
                    0,
                )
                .unwrap();
                ft.r0 = Some(r0);
                ft.r1 = Some(r1);
                ptk
            }
        };
        assert!(msg2.verify(self.akm, ptk.kck()), "Message 2 MIC");
        self.ptk = Some(ptk);
        msg2
    }

    /// Plaintext key data of Message 3: RSNE (FT: with PMKR1Name, MDE and
    /// FTE), GTK and IGTK KDEs.
    pub fn msg3_key_data(&self) -> Vec<u8> {
        let mut kd = BytesMut::new();
        match &self.ft {
            Some(ft) => {
                let mut rsne = Rsne::parse(&self.rsne()).unwrap();
                rsne.pmkids = vec![ft.r1.as_ref().unwrap().name];
                kd.extend_from_slice(&rsne.encode().unwrap());
                kd.extend_from_slice(&self.ft_assoc_resp_ies());
            }
            None => kd.extend_from_slice(&self.rsne()),
        }
        if self.proto == Proto::Rsn {
            kde::put_gtk(&mut kd, self.gtk_idx, false, &self.gtk).unwrap();
            if let Some((id, igtk)) = &self.igtk {
                kde::put_igtk(&mut kd, *id, &[0; 6], igtk).unwrap();
            }
        }
        kd.to_vec()
    }

    pub fn msg3(&mut self) -> Bytes {
        let (anonce, plain) = (self.anonce, self.msg3_key_data());
        self.msg3_with(anonce, &plain, true)
    }

    /// Message 3 with explicit ANonce and key data. RSN key data is wrapped
    /// with the KEK when `encrypt` is set.
    pub fn msg3_with(&mut self, anonce: Nonce, plain: &[u8], encrypt: bool) -> Bytes {
        let mut info = KeyInfo(0)
            .with_version(self.version())
            .with(KeyInfo::KEY_TYPE)
            .with(KeyInfo::INSTALL)
            .with(KeyInfo::ACK)
            .with(KeyInfo::MIC);
        if self.proto == Proto::Rsn {
            info = info.with(KeyInfo::SECURE);
        }
        let mut f = EapolKeyFrame::new(EAPOL_VERSION_2004, self.descriptor(), info, self.mic_len());
        f.key_len = self.pairwise.key_len() as u16;
        self.replay += 1;
        f.replay_counter = self.replay;
        f.nonce = anonce;
        let ptk = self.ptk.as_ref().expect("Message 3 before Message 2");
        if self.proto == Proto::Rsn && encrypt {
            f.encrypt_key_data(self.akm, ptk.kek(), plain).unwrap();
        } else {
            f.key_data = Bytes::copy_from_slice(plain);
        }
        f.sign(self.akm, ptk.kck()).unwrap();
        f.encode()
    }

    /// Re-sign `frame` under a fresh replay counter.
    pub fn replay_as_new(&mut self, frame: &[u8]) -> Bytes {
        let mut f = EapolKeyFrame::decode(frame, self.mic_len()).unwrap();
        self.replay += 1;
        f.replay_counter = self.replay;
        f.sign(self.akm, self.ptk().kck()).unwrap();
        f.encode()
    }

    pub fn rx_msg4(&self, frame: &[u8]) -> EapolKeyFrame {
        let msg4 = EapolKeyFrame::decode(frame, self.mic_len()).unwrap();
        assert_eq!(msg4.replay_counter, self.replay);
        assert!(msg4.verify(self.akm, self.ptk().kck()), "Message 4 MIC");
        msg4
    }

    // ---- Group Key Handshake ----

    pub fn group1(&mut self, idx: u8, gtk: &[u8]) -> Bytes {
        let mut info = KeyInfo(0)
            .with_version(self.version())
            .with(KeyInfo::SECURE)
            .with(KeyInfo::MIC)
            .with(KeyInfo::ACK);
        let mut f;
        let ptk = self.ptk.as_ref().expect("Group Message 1 before PTK");
        match self.proto {
            Proto::Rsn => {
                f = EapolKeyFrame::new(EAPOL_VERSION_2004, DESC_TYPE_RSN, info, self.mic_len());
                let mut kd = BytesMut::new();
                kde::put_gtk(&mut kd, idx, false, gtk).unwrap();
                if let Some((id, igtk)) = &self.igtk {
                    kde::put_igtk(&mut kd, *id, &[0; 6], igtk).unwrap();
                }
                f.encrypt_key_data(self.akm, ptk.kek(), &kd).unwrap();
            }
            Proto::Wpa => {
                info = info.with_key_index(idx).with(KeyInfo::INSTALL);
                f = EapolKeyFrame::new(EAPOL_VERSION_2004, DESC_TYPE_WPA, info, self.mic_len());
                f.key_len = gtk.len() as u16;
                f.iv = [0x17; 16];
                f.encrypt_key_data(self.akm, ptk.kek(), gtk).unwrap();
            }
        }
        self.replay += 1;
        f.replay_counter = self.replay;
        f.rsc = [5, 0, 0, 0, 0, 0, 0, 0];
        f.sign(self.akm, ptk.kck()).unwrap();
        f.encode()
    }

    pub fn rx_group2(&self, frame: &[u8]) -> EapolKeyFrame {
        let reply = EapolKeyFrame::decode(frame, self.mic_len()).unwrap();
        assert_eq!(reply.replay_counter, self.replay);
        assert!(reply.verify(self.akm, self.ptk().kck()), "Group Message 2 MIC");
        reply
    }

    // ---- FT ----

    /// Elements of an FT Authentication (or FT Action) Response from
    /// `target` answering the request elements `req`.
    pub fn ft_auth_response(&self, target: &TestAp, req: &[u8]) -> Bytes {
        let ft = target.ft.as_ref().expect("not an FT AP");
        let req_fte = Fte::parse(ie::find(req, EID_FAST_BSS_TRANSITION).unwrap(), Some(16)).unwrap();
        let req_rsne = Rsne::parse(ie::find(req, EID_RSN).unwrap()).unwrap();

        let mut rsne = Rsne::parse(&target.rsne()).unwrap();
        rsne.pmkids = req_rsne.pmkids.clone();
        let mut out = rsne.encode().unwrap();
        out.extend_from_slice(&target.mde(ft));
        let fte = Fte {
            mic: vec![0; 16],
            anonce: target.anonce,
            snonce: req_fte.snonce,
            r1kh_id: Some(ft.r1kh_id),
            r0kh_id: req_fte.r0kh_id.clone(),
            ..Default::default()
        };
        out.extend_from_slice(&fte.encode().unwrap());
        Bytes::from(out)
    }

    /// Derive the target's PMK-R1 and PTK from the PMK-R0 of the initial
    /// association, given the station's SNonce.
    pub fn ft_target_derive(&mut self, r0: &PmkR0, snonce: &Nonce) {
        let ft = self.ft.as_mut().expect("not an FT AP");
        let r1 = derive_pmk_r1(r0, ft.r1kh_id, self.sta).unwrap();
        let (ptk, _) = pmk_r1_to_ptk(
            &r1,
            self.akm,
            self.pairwise,
            snonce,
            &self.anonce,
            self.addr,
            self.sta,
            0,
        )
        .unwrap();
        ft.r1 = Some(r1);
        self.snonce = *snonce;
        self.ptk = Some(ptk);
    }

    /// Reassociation Response elements: RSNE(PMKR1Name) ‖ MDE ‖ FTE with
    /// MIC and a wrapped GTK.
    pub fn ft_reassoc_resp(&self, r0kh_id: &[u8]) -> Bytes {
        let ft = self.ft.as_ref().expect("not an FT AP");
        let ptk = self.ptk();
        let mut rsne = Rsne::parse(&self.rsne()).unwrap();
        rsne.pmkids = vec![ft.r1.as_ref().unwrap().name];
        let rsne = rsne.encode().unwrap();
        let mde = self.mde(ft);

        let mut gtk_sub = Vec::new();
        gtk_sub.extend_from_slice(&u16::from(self.gtk_idx).to_le_bytes());
        gtk_sub.push(self.gtk.len() as u8);
        gtk_sub.extend_from_slice(&[0; 8]);
        gtk_sub.extend_from_slice(&aes_wrap(ptk.kek(), &self.gtk).unwrap());

        let mut fte = Fte {
            element_count: 3,
            mic: vec![0; 16],
            anonce: self.anonce,
            snonce: self.snonce,
            r1kh_id: Some(ft.r1kh_id),
            r0kh_id: Some(r0kh_id.to_vec()),
            gtk: Some(Zeroizing::new(gtk_sub)),
            ..Default::default()
        };
        let zeroed = fte.encode_mic_zeroed().unwrap();
        fte.mic = ft_mic(
            ptk.kck(),
            &[self.sta.as_bytes(), self.addr.as_bytes(), &[6], &rsne, &mde, &zeroed, &[]],
        )
        .unwrap();

        let mut out = rsne;
        out.extend_from_slice(&mde);
        out.extend_from_slice(&fte.encode().unwrap());
        Bytes::from(out)
    }

    /// Check the FT MIC of a Reassociation Request.
    pub fn verify_reassoc_req(&self, req: &[u8]) -> bool {
        let rsne = ie::find(req, EID_RSN).unwrap();
        let mde = ie::find(req, EID_MOBILITY_DOMAIN).unwrap();
        let fte = Fte::parse(ie::find(req, EID_FAST_BSS_TRANSITION).unwrap(), Some(16)).unwrap();
        let zeroed = fte.encode_mic_zeroed().unwrap();
        let mic = ft_mic(
            self.ptk().kck(),
            &[self.sta.as_bytes(), self.addr.as_bytes(), &[5], rsne, mde, &zeroed, &[]],
        )
        .unwrap();
        mic == fte.mic
    }
}

// ---------------------------------------------------------------------------
// Scripted exchanges
// ---------------------------------------------------------------------------

pub fn associate(sup: &mut TestSupplicant, ap: &TestAp) {
    sup.notify_assoc(ap.assoc_params()).unwrap();
    assert_eq!(sup.state(), WpaState::Associated);
}

/// Message 1 → Message 2.
pub fn run_msg1(sup: &mut TestSupplicant, ap: &mut TestAp, pmkid: Option<&Pmkid>) -> EapolKeyFrame {
    let msg1 = ap.msg1(pmkid);
    sup.rx_eapol(ap.addr, &msg1).unwrap();
    assert_eq!(sup.state(), WpaState::FourWayHandshake);
    let msg2 = sup.driver_mut().take_last();
    ap.rx_msg2(&msg2)
}

/// A full 4-Way Handshake, ending in COMPLETED.
pub fn run_4way(sup: &mut TestSupplicant, ap: &mut TestAp, pmkid: Option<&Pmkid>) {
    run_msg1(sup, ap, pmkid);
    let msg3 = ap.msg3();
    sup.rx_eapol(ap.addr, &msg3).unwrap();
    let msg4 = sup.driver_mut().take_last();
    ap.rx_msg4(&msg4);
    assert_eq!(sup.state(), WpaState::Completed);
}

pub fn connected_psk() -> (TestSupplicant, TestAp) {
    let mut sup = supplicant(psk_config());
    let mut ap = TestAp::psk();
    associate(&mut sup, &ap);
    run_4way(&mut sup, &mut ap, None);
    (sup, ap)
}
