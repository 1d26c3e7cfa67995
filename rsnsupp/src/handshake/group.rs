//! Group Key Handshake: Group Message 1/2 and reply 2/2.
//!
//! RSN carries the GTK (and IGTK/BIGTK) as KDEs in encrypted key data. WPA
//! carries the bare GTK, RC4-obfuscated or AES-wrapped according to the
//! descriptor version, with its index and Tx bit in Key Information.

use bytes::BytesMut;

use rsnkey::eapol::{DESC_TYPE_RSN, DESC_TYPE_WPA};
use rsnkey::kde::KeyData;
use rsnkey::{EapolKeyFrame, KeyInfo, Proto};

use crate::driver::{Driver, Eapol, WpaState};
use crate::handshake::extension::ExtEnv;
use crate::handshake::fourway::gtk_tx;
use crate::handshake::{HandshakeError, Result};
use crate::keys::{self, GroupKey};
use crate::supplicant::Supplicant;

impl<D: Driver, E: Eapol> Supplicant<D, E> {
    pub(crate) fn process_group1(&mut self, key: &EapolKeyFrame, data: &[u8]) -> Result<()> {
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        if !ctx.msg3_ok {
            return Err(HandshakeError::GroupBeforePairwise);
        }
        tracing::debug!(
            bssid = %ctx.bssid,
            replay_counter = key.replay_counter,
            "RX message 1 of Group Key Handshake"
        );
        let proto = ctx.proto;
        match proto {
            Proto::Rsn => self.process_group1_rsn(key, data)?,
            Proto::Wpa => self.process_group1_wpa(key)?,
        }
        self.send_group2(key)?;

        let state = self.state();
        if state == WpaState::Completed {
            tracing::info!("group rekeying completed");
        } else {
            self.key_neg_complete(key.key_info.has(KeyInfo::SECURE));
        }
        Ok(())
    }

    fn process_group1_rsn(&mut self, key: &EapolKeyFrame, data: &[u8]) -> Result<()> {
        let kd = KeyData::parse(data).map_err(HandshakeError::KeyData)?;
        if !key.key_info.has(KeyInfo::ENCR_KEY_DATA) && kd.gtk.is_some() {
            return Err(HandshakeError::UnencryptedKey("GTK"));
        }
        if kd.gtk.is_none() && kd.mlo_gtks.is_empty() {
            return Err(HandshakeError::MissingGtk("Group Message 1"));
        }

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
            ext.validate_group1(&env, &kd)?;
        }

        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        let group = ctx.group;
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
        }
        self.install_mgmt_keys(&kd)
    }

    fn process_group1_wpa(&mut self, key: &EapolKeyFrame) -> Result<()> {
        let ctx = self.ctx.as_mut().ok_or(HandshakeError::NotAssociated)?;
        let group = ctx.group;
        let key_len = usize::from(key.key_len);
        if key_len != group.key_len() {
            return Err(HandshakeError::KeyLength {
                what: "group key",
                got: key_len,
                expected: group.key_len(),
            });
        }
        let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::NoPtk)?;
        let plain = key
            .decrypt_key_data(ctx.akm, ptk.kek())
            .map_err(HandshakeError::KeyDataDecrypt)?;
        if plain.len() < key_len {
            return Err(HandshakeError::KeyLength {
                what: "GTK",
                got: plain.len(),
                expected: key_len,
            });
        }
        let info = key.key_info;
        keys::install_gtk(
            &mut self.driver,
            &mut ctx.keys,
            group,
            &GroupKey {
                key_idx: info.key_index(),
                tx: gtk_tx(info.has(KeyInfo::INSTALL)),
                rsc: &key.rsc,
                key: &plain[..key_len],
                link_id: None,
            },
        )?;
        Ok(())
    }

    fn send_group2(&mut self, msg1: &EapolKeyFrame) -> Result<()> {
        let extensions = self
            .ctx
            .as_ref()
            .map(|ctx| ctx.extensions.clone())
            .unwrap_or_default();
        let (channel, pfs) = self.ext_env(&extensions);
        let ctx = self.ctx.as_ref().ok_or(HandshakeError::NotAssociated)?;
        let ptk = ctx.ptk.as_ref().ok_or(HandshakeError::NoPtk)?;
        let env = ExtEnv {
            ft: &self.ft,
            channel,
            pfs,
        };

        let mic_len = ctx.mic_len();
        let mut info = KeyInfo(0)
            .with_version(ctx.akm.descriptor_version(ctx.pairwise, ctx.group))
            .with(KeyInfo::SECURE);
        if mic_len > 0 {
            info = info.with(KeyInfo::MIC);
        }
        let descriptor = match ctx.proto {
            Proto::Rsn => DESC_TYPE_RSN,
            Proto::Wpa => {
                info = info.with_key_index(msg1.key_info.key_index());
                DESC_TYPE_WPA
            }
        };
        let mut key_data = BytesMut::new();
        if ctx.proto == Proto::Rsn {
            for ext in &extensions {
                ext.append_group2(&env, &mut key_data)?;
            }
        }

        let mut reply = EapolKeyFrame::new(self.config.eapol_version, descriptor, info, mic_len);
        reply.key_len = if ctx.proto == Proto::Wpa { msg1.key_len } else { 0 };
        reply.replay_counter = msg1.replay_counter;
        if mic_len == 0 {
            reply
                .encrypt_key_data(ctx.akm, ptk.kek(), &key_data)
                .map_err(HandshakeError::Derivation)?;
        } else {
            reply.key_data = key_data.freeze();
            reply.sign(ctx.akm, ptk.kck()).map_err(HandshakeError::Derivation)?;
        }
        let bssid = ctx.bssid;
        tracing::debug!(bssid = %bssid, replay_counter = reply.replay_counter, "TX message 2 of Group Key Handshake");
        self.transmit(bssid, reply.encode())
    }
}
