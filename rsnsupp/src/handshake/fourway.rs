//! 4-Way Handshake: Messages 1/4 and 3/4, replies 2/4 and 4/4.

use bytes::{Bytes, BytesMut};
use zeroize::Zeroizing;

use rsnkey::derive::{derive_pmk_r0, derive_pmk_r1, ft, pmk_r1_to_ptk, pmk_to_ptk, pmkid_suite_b, PtkParams};
use rsnkey::eapol::{DESC_TYPE_RSN, DESC_TYPE_WPA};
use rsnkey::ie::rsne::ie_matches;
use rsnkey::kde::KeyData;
use rsnkey::{Akm, Cipher, EapolKeyFrame, KeyInfo, MacAddr, Proto, Ptk};

use crate::driver::{Driver, Eapol, KeyInstall, KeyKind, WpaState};
use crate::handshake::extension::{ExtEnv, HandshakeExtension};
use crate::handshake::{HandshakeError, Result};
use crate::keys::{self, GroupKey, MgmtGroupKey};
use crate::pmksa::{Lookup, NewEntry};
use crate::supplicant::Supplicant;
use crate::timer::TimerKind;

impl<D: Driver, E: Eapol> Supplicant<D, E> {
    // ── Message 1/4 ─────────────────────────────────────────────────────

    pub(crate) fn process_msg1(&mut self, src: MacAddr, key: &EapolKeyFrame, data: &[u8]) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        if ctx.state == WpaState::Completed && ctx.ptk_installed && self.config.deny_ptk0_rekey {
            return Err(HandshakeError::Ptk0RekeyDenied);
        }
        tracing::debug!(
            src = %src,
            replay_counter = key.replay_counter,
            "RX message 1 of 4-Way Handshake"
        );
        self.set_state(WpaState::FourWayHandshake);

        let kd = if self.config.proto == Proto::Rsn {
            KeyData::parse(data).map_err(HandshakeError::Malformed)?
        } else {
            KeyData::default()
        };
        self.resolve_pmk(src, &kd)?;

        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        if ctx.renew_snonce {
            ctx.snonce = rsnkey::random_nonce();
            ctx.renew_snonce = false;
            tracing::trace!(snonce = %rsnkey::hex(&ctx.snonce), "renewed SNonce");
        }
        let ptk = self.derive_ptk(&key.nonce)?;

        let kck = Zeroizing::new(ptk.kck().to_vec());
        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        ctx.tptk = Some(ptk);
        ctx.anonce = key.nonce;

        self.send_msg2(key, &kck)
    }

    /// Find the PMK for this handshake: PMKSA entry named by the PMKID KDE,
    /// then the current entry, then the EAP master key. PSK and externally
    /// set PMKs are already on the context.
    fn resolve_pmk(&mut self, src: MacAddr, kd: &KeyData) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let (akm, aa, spa, network_ctx) = (ctx.akm, ctx.bssid, ctx.own_addr, ctx.network_ctx);
        if ctx.proto != Proto::Rsn || !akm.uses_pmksa_cache() {
            return if ctx.pmk.is_empty() { Err(HandshakeError::NoPmk(src)) } else { Ok(()) };
        }

        if let Some(pmkid) = kd.pmkid.as_ref().filter(|_| !akm.is_ft()) {
            let by_current = self
                .pmksa
                .current_handle()
                .filter(|&h| self.pmksa.get(h).is_some_and(|e| &e.pmkid == pmkid));
            let sa = by_current.or_else(|| {
                self.pmksa.lookup(&Lookup {
                    aa: Some(aa),
                    spa: Some(spa),
                    pmkid: Some(pmkid),
                    network_ctx: Some(network_ctx),
                    akm: Some(akm),
                })
            });
            if let Some(entry) = sa.and_then(|h| self.pmksa.get(h)) {
                tracing::debug!(pmkid = %rsnkey::hex(pmkid), "PMKID found from PMKSA cache");
                let pmk = entry.pmk.clone();
                self.pmksa.set_current(sa);
                self.eapol.notify_cached_pmk();
                if let Some(ctx) = self.ctx.as_mut() {
                    if akm.is_sae() && akm.is_ft() {
                        ctx.xxkey = pmk.clone();
                    }
                    ctx.pmk = pmk;
                }
                return Ok(());
            }
        }

        let have_pmk = self.ctx.as_ref().is_some_and(|ctx| {
            if akm.is_ft() { !ctx.xxkey.is_empty() } else { !ctx.pmk.is_empty() }
        });
        // A PMKID that matched nothing above means the AP no longer holds
        // the cached PMKSA; a full EAP run supersedes it.
        let cached_rejected = akm.is_ieee8021x() && !akm.is_ft() && kd.pmkid.is_some();
        if have_pmk && (kd.pmkid.is_none() || (self.pmksa.current().is_some() && !cached_rejected)) {
            return Ok(());
        }

        if akm.is_ieee8021x() {
            if let Some(msk) = self.eapol.master_key() {
                if cached_rejected && self.pmksa.current().is_some() {
                    tracing::debug!(bssid = %aa, "cached PMKSA not used by the AP, taking the new EAP master key");
                    self.pmksa.clear_current();
                }
                return self.pmk_from_msk(&msk, kd);
            }
        }
        if have_pmk {
            return Ok(());
        }

        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        if akm.allows_eap_fallback() {
            if ctx.eapol_start_count >= self.config.max_eapol_start_fallbacks {
                return Err(HandshakeError::FallbackExhausted(ctx.eapol_start_count));
            }
            return Err(HandshakeError::NeedFullAuth);
        }
        tracing::debug!(akm = ?akm, "no PMK and the AKM does not allow EAP fallback");
        Err(HandshakeError::NoPmk(src))
    }

    fn pmk_from_msk(&mut self, msk: &[u8], kd: &KeyData) -> Result<()> {
        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        let akm = ctx.akm;
        if akm.is_ft() {
            let xxkey = ft::xxkey(akm, msk).map_err(HandshakeError::Derivation)?;
            ctx.xxkey = Zeroizing::new(xxkey.to_vec());
            ctx.pmk = Zeroizing::new(xxkey.to_vec());
            tracing::debug!("FT: XXKey taken from the EAP master key");
            return Ok(());
        }
        let pmk_len = if akm == Akm::SuiteB192 { 48 } else { 32 };
        let pmk = msk.get(..pmk_len).ok_or(HandshakeError::KeyLength {
            what: "MSK",
            got: msk.len(),
            expected: pmk_len,
        })?;
        ctx.pmk = Zeroizing::new(pmk.to_vec());
        tracing::debug!("PMK taken from the EAP master key");
        let (aa, spa, network_ctx) = (ctx.bssid, ctx.own_addr, ctx.network_ctx);
        if akm.is_suite_b() {
            // Suite B PMKIDs need the KCK; the entry is added after Message 3.
            return Ok(());
        }
        let pmk = pmk.to_vec();
        let handle = self
            .add_pmksa_entry(NewEntry {
                pmk: &pmk,
                pmkid: None,
                kck: None,
                aa,
                spa,
                network_ctx,
                akm,
                fils_cache_id: None,
                external: false,
            })
            .map_err(|e| HandshakeError::KeyInstall(e.to_string()))?;
        if let (Some(expected), Some(entry)) = (kd.pmkid.as_ref(), self.pmksa.get(handle)) {
            if &entry.pmkid != expected {
                tracing::warn!(
                    ours = %rsnkey::hex(&entry.pmkid),
                    theirs = %rsnkey::hex(expected),
                    "PMKID mismatch"
                );
                return Err(HandshakeError::PmkidMismatch);
            }
        }
        self.pmksa.set_current(Some(handle));
        Ok(())
    }

    fn derive_ptk(&mut self, anonce: &rsnkey::Nonce) -> Result<Ptk> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let kdk_len = self.config.kdk_len;
        if !ctx.akm.is_ft() {
            return pmk_to_ptk(&PtkParams {
                pmk: &ctx.pmk,
                aa: ctx.bssid,
                spa: ctx.own_addr,
                anonce,
                snonce: &ctx.snonce,
                akm: ctx.akm,
                cipher: ctx.pairwise,
                z: ctx.pfs_z.as_deref().map(|z| z.as_slice()),
                kdk_len,
            })
            .map_err(HandshakeError::Derivation);
        }

        let mdid = self
            .ft
            .mdid
            .ok_or_else(|| HandshakeError::Ft("no mobility domain".into()))?;
        let r1kh_id = self
            .ft
            .r1kh_id
            .ok_or_else(|| HandshakeError::Ft("no R1KH-ID from the Association Response".into()))?;
        let r0 = derive_pmk_r0(ctx.akm, &ctx.xxkey, &ctx.ssid, mdid, &self.ft.r0kh_id, ctx.own_addr)
            .map_err(HandshakeError::Derivation)?;
        let r1 = derive_pmk_r1(&r0, r1kh_id, ctx.own_addr).map_err(HandshakeError::Derivation)?;
        let (ptk, _name) = pmk_r1_to_ptk(
            &r1,
            ctx.akm,
            ctx.pairwise,
            &ctx.snonce,
            anonce,
            ctx.bssid,
            ctx.own_addr,
            kdk_len,
        )
        .map_err(HandshakeError::Derivation)?;
        tracing::debug!(
            pmk_r0_name = %rsnkey::hex(&r0.name),
            pmk_r1_name = %rsnkey::hex(&r1.name),
            "FT: derived initial mobility domain key hierarchy"
        );
        self.ft.r1kh.record(ctx.bssid, r1kh_id);
        self.ft.pmk_r0 = Some(r0);
        self.ft.pmk_r1 = Some(r1);
        Ok(ptk)
    }

    /// Environment the extensions see; the channel is queried only when OCV
    /// is part of this association.
    pub(crate) fn ext_env(&mut self, extensions: &[HandshakeExtension]) -> (Option<rsnkey::ie::Oci>, bool) {
        let channel = if extensions.contains(&HandshakeExtension::Oci) {
            self.driver.channel_info()
        } else {
            None
        };
        let pfs = self.ctx.as_ref().is_some_and(|ctx| ctx.pfs_z.is_some());
        (channel, pfs)
    }

    fn send_msg2(&mut self, msg1: &EapolKeyFrame, kck: &[u8]) -> Result<()> {
        let extensions = self
            .ctx
            .as_ref()
            .map(|ctx| ctx.extensions.clone())
            .unwrap_or_default();
        let (channel, pfs) = self.ext_env(&extensions);
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let env = ExtEnv {
            ft: &self.ft,
            channel,
            pfs,
        };

        let mut own_ie = ctx.own_ie.to_vec();
        for ext in &extensions {
            own_ie = ext.own_ie(&env, own_ie)?;
        }
        let mut key_data = BytesMut::from(own_ie.as_slice());
        if let Some(rsnxe) = &ctx.own_rsnxe {
            key_data.extend_from_slice(rsnxe);
        }
        for ext in &extensions {
            ext.append_msg2(&env, &mut key_data)?;
        }

        let mic_len = ctx.mic_len();
        let mut info = KeyInfo(0)
            .with_version(ctx.akm.descriptor_version(ctx.pairwise, ctx.group))
            .with(KeyInfo::KEY_TYPE);
        if mic_len > 0 {
            info = info.with(KeyInfo::MIC);
        }
        let mut reply = EapolKeyFrame::new(self.config.eapol_version, descriptor(ctx.proto), info, mic_len);
        reply.key_len = if ctx.proto == Proto::Wpa { msg1.key_len } else { 0 };
        reply.replay_counter = msg1.replay_counter;
        reply.nonce = ctx.snonce;
        reply.key_data = key_data.freeze();
        if mic_len > 0 {
            reply.sign(ctx.akm, kck).map_err(HandshakeError::Derivation)?;
        }
        let bssid = ctx.bssid;
        tracing::debug!(bssid = %bssid, replay_counter = reply.replay_counter, "TX message 2 of 4-Way Handshake");
        self.transmit(bssid, reply.encode())
    }

    pub(crate) fn transmit(&mut self, dest: MacAddr, frame: Bytes) -> Result<()> {
        self.driver
            .send_eapol(dest, frame)
            .map_err(|e| HandshakeError::Transmit(e.to_string()))
    }

    // ── Message 3/4 ─────────────────────────────────────────────────────

    pub(crate) fn process_msg3(&mut self, key: &EapolKeyFrame, data: &[u8]) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        tracing::debug!(
            bssid = %ctx.bssid,
            replay_counter = key.replay_counter,
            "RX message 3 of 4-Way Handshake"
        );
        let info = key.key_info;
        let kd = KeyData::parse(data).map_err(HandshakeError::KeyData)?;
        if ctx.proto == Proto::Rsn && !info.has(KeyInfo::ENCR_KEY_DATA) {
            if kd.gtk.is_some() || !kd.mlo_gtks.is_empty() {
                return Err(HandshakeError::UnencryptedKey("GTK"));
            }
            if kd.igtk.is_some() || !kd.mlo_igtks.is_empty() {
                return Err(HandshakeError::UnencryptedKey("IGTK"));
            }
            if kd.bigtk.is_some() || !kd.mlo_bigtks.is_empty() {
                return Err(HandshakeError::UnencryptedKey("BIGTK"));
            }
        }
        if ctx.group == Cipher::GroupNotAllowed && kd.gtk.is_some() {
            return Err(HandshakeError::KeyData(rsnkey::RsnKeyError::kde(
                "GTK",
                "GTK KDE while group traffic is not allowed",
            )));
        }

        self.validate_ies(&kd)?;
        let extensions = self
            .ctx
            .as_ref()
            .map(|ctx| ctx.extensions.clone())
            .unwrap_or_default();
        let (channel, pfs) = self.ext_env(&extensions);
        let env = ExtEnv {
            ft: &self.ft,
            channel,
            pfs,
        };
        for ext in &extensions {
            ext.validate_msg3(&env, &kd)?;
        }

        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        if key.nonce != ctx.anonce {
            tracing::warn!(
                msg1 = %rsnkey::hex(&ctx.anonce),
                msg3 = %rsnkey::hex(&key.nonce),
                "ANonce from message 1 of 4-Way Handshake differs from message 3"
            );
            return Err(HandshakeError::AnonceMismatch);
        }
        let expected = ctx.pairwise.key_len();
        if usize::from(key.key_len) != expected {
            return Err(HandshakeError::KeyLength {
                what: "pairwise key",
                got: usize::from(key.key_len),
                expected,
            });
        }

        self.send_msg4(key)?;
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.msg3_ok = true;
        }

        if info.has(KeyInfo::INSTALL) {
            let rsc = if self.config.proto == Proto::Wpa { Some(key.rsc) } else { None };
            self.install_ptk(rsc.as_ref().map(|r| &r[..]))?;
        }
        let secure = info.has(KeyInfo::SECURE);
        if secure {
            self.eapol.notify_port_valid(true);
        }

        self.set_state(WpaState::GroupHandshake);
        let mut have_gtk = false;
        if self.config.proto == Proto::Rsn {
            have_gtk = self.install_msg3_group_keys(key, &kd)?;
        }
        // Otherwise the group keys arrive in a Group Key Handshake.
        if secure && (have_gtk || self.config.group_cipher == Cipher::GroupNotAllowed) {
            self.key_neg_complete(true);
        }

        if self.config.akm.is_suite_b() {
            self.add_suite_b_pmksa()?;
        }
        if let Some(bitmap) = kd.transition_disable {
            tracing::info!(bitmap, "Transition Disable KDE");
            self.driver.transition_disable(bitmap);
        }
        if let Some(alloc) = &kd.ip_addr_alloc {
            self.driver.ip_addr_allocated(alloc);
        }
        Ok(())
    }

    /// Compare the RSNE/WPA IE and RSNXE of Message 3 with the ones the AP
    /// advertised.
    fn validate_ies(&mut self, kd: &KeyData) -> Result<()> {
        let needs_beacon = self
            .ctx
            .as_ref()
            .is_some_and(|ctx| ctx.ap_rsne.is_none() && ctx.ap_wpa_ie.is_none());
        if needs_beacon {
            let bssid = self.ctx.as_ref().map(|ctx| ctx.bssid).unwrap_or_default();
            if let Some(ies) = self.driver.beacon_ies(bssid) {
                let beacon = KeyData::parse(&ies).map_err(HandshakeError::KeyData)?;
                if let Some(ctx) = self.ctx.as_mut() {
                    ctx.ap_rsne = beacon.rsne;
                    ctx.ap_wpa_ie = beacon.wpa_ie;
                    ctx.ap_rsnxe = beacon.rsnxe;
                }
            }
        }
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        if ctx.ap_rsne.is_none() && ctx.ap_wpa_ie.is_none() {
            return Err(HandshakeError::ApIesUnavailable);
        }

        if ctx.proto == Proto::Wpa {
            if let (Some(adv), Some(recv)) = (&ctx.ap_wpa_ie, &kd.wpa_ie) {
                if adv != recv {
                    return Err(ie_mismatch("WPA IE", Some(adv), Some(recv)));
                }
            } else if kd.wpa_ie.is_some() || ctx.ap_wpa_ie.is_some() {
                return Err(ie_mismatch("WPA IE", ctx.ap_wpa_ie.as_ref(), kd.wpa_ie.as_ref()));
            }
            if kd.rsne.is_some() && self.config.rsn_enabled {
                tracing::warn!("possible downgrade attack: RSNE in WPA message 3 on an RSN network");
                return Err(ie_mismatch("RSNE", ctx.ap_rsne.as_ref(), kd.rsne.as_ref()));
            }
            return Ok(());
        }

        let ft_initial = ctx.has_extension(|e| *e == HandshakeExtension::Ft);
        match (&ctx.ap_rsne, &kd.rsne) {
            (Some(adv), Some(recv)) if ie_matches(adv, recv, ft_initial) => {}
            (adv, recv) => return Err(ie_mismatch("RSNE", adv.as_ref(), recv.as_ref())),
        }
        let rsnxe_differs = match (&ctx.ap_rsnxe, &kd.rsnxe) {
            (None, None) => false,
            (Some(a), Some(b)) => a != b,
            (Some(a), None) | (None, Some(a)) => a.len() > 2,
        };
        if rsnxe_differs {
            tracing::warn!(
                beacon = %ctx.ap_rsnxe.as_deref().map(rsnkey::hex).unwrap_or_default(),
                msg3 = %kd.rsnxe.as_deref().map(rsnkey::hex).unwrap_or_default(),
                "RSNXE mismatch between Beacon/ProbeResp and EAPOL-Key msg 3/4"
            );
            return Err(HandshakeError::RsnxeMismatch);
        }
        Ok(())
    }

    fn send_msg4(&mut self, msg3: &EapolKeyFrame) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::NoPtk)?;
        let mic_len = ctx.mic_len();
        let mut info = KeyInfo(0)
            .with_version(ctx.akm.descriptor_version(ctx.pairwise, ctx.group))
            .with(KeyInfo::KEY_TYPE);
        if mic_len > 0 {
            info = info.with(KeyInfo::MIC);
        }
        if msg3.key_info.has(KeyInfo::SECURE) {
            info = info.with(KeyInfo::SECURE);
        }
        let mut reply = EapolKeyFrame::new(self.config.eapol_version, descriptor(ctx.proto), info, mic_len);
        reply.key_len = if ctx.proto == Proto::Wpa { msg3.key_len } else { 0 };
        reply.replay_counter = msg3.replay_counter;
        if mic_len > 0 {
            reply.sign(ctx.akm, ptk.kck()).map_err(HandshakeError::Derivation)?;
        }
        let bssid = ctx.bssid;
        tracing::debug!(bssid = %bssid, replay_counter = reply.replay_counter, "TX message 4 of 4-Way Handshake");
        self.transmit(bssid, reply.encode())
    }

    /// Install the PTK unless this handshake already did.
    pub(crate) fn install_ptk(&mut self, rsc: Option<&[u8]>) -> Result<()> {
        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        if ctx.ptk_installed {
            tracing::debug!("not reinstalling already in-use PTK");
            return Ok(());
        }
        let ptk = ctx.ptk.as_mut().ok_or(HandshakeError::NoPtk)?;
        let cipher = ctx.pairwise;
        let tk = ptk.tk_for_install(cipher);
        let zero = [0u8; 8];
        let rsc = rsc.unwrap_or(&zero);
        let rsc_len = cipher.rsc_len().min(rsc.len());
        self.driver
            .install_key(&KeyInstall {
                kind: KeyKind::Pairwise,
                cipher,
                key_idx: 0,
                addr: ctx.bssid,
                set_tx: true,
                rsc: &rsc[..rsc_len],
                key: &tk,
                link_id: None,
            })
            .map_err(|e| HandshakeError::KeyInstall(e.to_string()))?;
        ptk.clear_tk();
        ctx.ptk_installed = true;
        tracing::debug!(bssid = %ctx.bssid, cipher = ?cipher, "PTK installed");

        if let Some(secs) = self.config.ptk_rekey_secs.filter(|&s| s > 0) {
            let at = self.driver.now() + std::time::Duration::from_secs(u64::from(secs));
            self.timers.schedule(TimerKind::PtkRekey, at);
        }
        Ok(())
    }

    /// GTK, IGTK and BIGTK (and their per-link MLO forms) from Message 3.
    /// Returns whether a GTK was present.
    fn install_msg3_group_keys(&mut self, key: &EapolKeyFrame, kd: &KeyData) -> Result<bool> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(HandshakeError::NotAssociated);
        };
        let group = ctx.group;
        let mut have_gtk = false;
        if let Some(gtk) = &kd.gtk {
            keys::install_gtk(
                &mut self.driver,
                &mut ctx.keys,
                group,
                &GroupKey {
                    key_idx: gtk.key_id,
                    tx: gtk_tx(gtk.tx),
                    rsc: &key.rsc,
                    key: &gtk.key,
                    link_id: None,
                },
            )?;
            have_gtk = true;
        }
        for gtk in &kd.mlo_gtks {
            keys::install_gtk(
                &mut self.driver,
                &mut ctx.keys,
                group,
                &GroupKey {
                    key_idx: gtk.key_id,
                    tx: gtk_tx(gtk.tx),
                    rsc: &gtk.pn,
                    key: &gtk.key,
                    link_id: Some(gtk.link_id),
                },
            )?;
            have_gtk = true;
        }
        self.install_mgmt_keys(kd)?;
        Ok(have_gtk)
    }

    /// IGTK/BIGTK KDEs (plain and MLO) shared by Message 3 and Group
    /// Message 1.
    pub(crate) fn install_mgmt_keys(&mut self, kd: &KeyData) -> Result<()> {
        let compat = self.config.igtk_keyid_byte_swap_compat;
        let bigtk_enabled = self.config.beacon_protection;
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(HandshakeError::NotAssociated);
        };
        let Some(cipher) = ctx.group_mgmt else {
            return Ok(());
        };
        let mut mgmt = Vec::new();
        if let Some(igtk) = &kd.igtk {
            mgmt.push((KeyKind::Igtk, igtk.key_id, &igtk.ipn, &igtk.key, None));
        }
        for igtk in &kd.mlo_igtks {
            mgmt.push((KeyKind::Igtk, igtk.key_id, &igtk.ipn, &igtk.key, Some(igtk.link_id)));
        }
        if bigtk_enabled {
            if let Some(bigtk) = &kd.bigtk {
                mgmt.push((KeyKind::Bigtk, bigtk.key_id, &bigtk.ipn, &bigtk.key, None));
            }
            for bigtk in &kd.mlo_bigtks {
                mgmt.push((KeyKind::Bigtk, bigtk.key_id, &bigtk.ipn, &bigtk.key, Some(bigtk.link_id)));
            }
        }
        for (kind, key_id, ipn, key, link_id) in mgmt {
            keys::install_mgmt_group_key(
                &mut self.driver,
                &mut ctx.keys,
                kind,
                cipher,
                &MgmtGroupKey {
                    key_id,
                    ipn,
                    key,
                    link_id,
                },
                compat,
            )?;
        }
        Ok(())
    }

    fn add_suite_b_pmksa(&mut self) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::NoPtk)?;
        if ctx.pmk.is_empty() {
            return Ok(());
        }
        let pmkid = pmkid_suite_b(ctx.akm, ptk.kck(), ctx.bssid, ctx.own_addr)
            .map_err(HandshakeError::Derivation)?;
        let pmk = ctx.pmk.clone();
        let kck = Zeroizing::new(ptk.kck().to_vec());
        let new = NewEntry {
            pmk: &pmk,
            pmkid: Some(pmkid),
            kck: Some(&kck),
            aa: ctx.bssid,
            spa: ctx.own_addr,
            network_ctx: ctx.network_ctx,
            akm: ctx.akm,
            fils_cache_id: None,
            external: false,
        };
        let handle = self
            .add_pmksa_entry(new)
            .map_err(|e| HandshakeError::KeyInstall(e.to_string()))?;
        self.pmksa.set_current(Some(handle));
        Ok(())
    }

    /// Key negotiation finished: the association is usable.
    pub(crate) fn key_neg_complete(&mut self, secure: bool) {
        let Some(ctx) = self.ctx.as_mut() else { return };
        ctx.eapol_start_count = 0;
        let (bssid, akm) = (ctx.bssid, ctx.akm);
        self.set_state(WpaState::Completed);
        tracing::info!(bssid = %bssid, akm = ?akm, "key negotiation completed");
        if secure {
            self.eapol.notify_port_valid(true);
            if !akm.is_ieee8021x() {
                self.eapol.notify_key_done();
            }
        }
        if self.pmksa.confirm_current() {
            tracing::debug!("opportunistic PMKSA entry confirmed");
        }
        self.rearm_pmksa_timers();
    }
}

fn descriptor(proto: Proto) -> u8 {
    match proto {
        Proto::Rsn => DESC_TYPE_RSN,
        Proto::Wpa => DESC_TYPE_WPA,
    }
}

/// A GTK is never used for transmission while a pairwise key is in use.
pub(crate) fn gtk_tx(tx: bool) -> bool {
    if tx {
        tracing::debug!("Tx bit set for GTK, but pairwise keys are used; ignoring");
    }
    false
}

fn ie_mismatch(what: &str, adv: Option<&Bytes>, recv: Option<&Bytes>) -> HandshakeError {
    let adv = adv.map(|ie| rsnkey::hex(ie)).unwrap_or_default();
    let recv = recv.map(|ie| rsnkey::hex(ie)).unwrap_or_default();
    tracing::warn!(beacon = %adv, msg3 = %recv, "{what} in 4-Way Handshake differs from Beacon/ProbeResp");
    HandshakeError::IeMismatch(format!("{what} in 4-Way Handshake differs from Beacon/ProbeResp"))
}
