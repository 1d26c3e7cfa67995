// Handshake extensions.
//
// Optional features that add KDEs to outgoing messages and checks to
// incoming ones. The set is fixed per association from the negotiated AKM,
// MLO parameters and configuration.

use bytes::BytesMut;

use rsnkey::ie::rsne::ie_matches;
use rsnkey::ie::{self, Mde, Oci, Rsne, EID_FAST_BSS_TRANSITION, EID_MOBILITY_DOMAIN};
use rsnkey::kde::{self, KeyData};

use crate::ft::FtState;
use crate::handshake::{HandshakeError, Result};
use crate::supplicant::MldParams;

/// DPP KDE: protocol version and flags.
const DPP_VERSION: u8 = 2;
const DPP_FLAG_PFS_ALLOWED: u8 = 0x01;
const DPP_FLAG_PFS_REQUIRED: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeExtension {
    /// FT initial mobility domain association.
    Ft,
    /// Multi-link operation.
    Mlo(MldParams),
    /// Operating channel validation.
    Oci,
    Dpp,
    /// P2P client asking the GO for an IP address.
    P2pIpAddrReq,
}

/// State the extensions read while building or checking a message.
pub(crate) struct ExtEnv<'a> {
    pub ft: &'a FtState,
    /// Own operating channel, fetched when OCV is active.
    pub channel: Option<Oci>,
    /// A PFS secret is configured.
    pub pfs: bool,
}

impl ExtEnv<'_> {
    fn own_channel(&self) -> Result<&Oci> {
        self.channel
            .as_ref()
            .ok_or_else(|| HandshakeError::Ocv("failed to get channel info".into()))
    }
}

impl HandshakeExtension {
    /// Rewrite the station RSNE placed in Message 2.
    pub(crate) fn own_ie(&self, env: &ExtEnv<'_>, ie: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            HandshakeExtension::Ft => {
                let r1 = env
                    .ft
                    .pmk_r1
                    .as_ref()
                    .ok_or_else(|| HandshakeError::Ft("no PMK-R1 for Message 2".into()))?;
                ie::rsne::with_pmkid(&ie, &r1.name).map_err(HandshakeError::KeyData)
            }
            _ => Ok(ie),
        }
    }

    /// Append this extension's elements and KDEs to Message 2 key data.
    pub(crate) fn append_msg2(&self, env: &ExtEnv<'_>, out: &mut BytesMut) -> Result<()> {
        match self {
            HandshakeExtension::Ft => {
                let ies = env.ft.assoc_resp_ies.as_ref().ok_or_else(|| {
                    HandshakeError::Ft("no MDE/FTE from the Association Response".into())
                })?;
                out.extend_from_slice(ies);
            }
            HandshakeExtension::Mlo(mld) => {
                kde::put_mac_addr(out, mld.own_mld_addr).map_err(HandshakeError::KeyData)?;
                for link in mld.links.iter().filter(|l| l.link_id != mld.assoc_link_id) {
                    kde::put_mlo_link(out, link.link_id, link.own_addr, None, None)
                        .map_err(HandshakeError::KeyData)?;
                }
            }
            HandshakeExtension::Oci => {
                kde::put_oci(out, env.own_channel()?).map_err(HandshakeError::KeyData)?;
            }
            HandshakeExtension::Dpp => {
                let flags = if env.pfs { DPP_FLAG_PFS_ALLOWED } else { 0 };
                kde::put_dpp(out, &[DPP_VERSION, flags]).map_err(HandshakeError::KeyData)?;
            }
            HandshakeExtension::P2pIpAddrReq => {
                kde::put_ip_addr_req(out).map_err(HandshakeError::KeyData)?;
            }
        }
        Ok(())
    }

    /// Checks on Message 3 key data, run after the RSNE comparison.
    pub(crate) fn validate_msg3(&self, env: &ExtEnv<'_>, kd: &KeyData) -> Result<()> {
        match self {
            HandshakeExtension::Ft => validate_ft_msg3(env.ft, kd),
            HandshakeExtension::Mlo(mld) => validate_mlo_msg3(mld, kd),
            HandshakeExtension::Oci => verify_oci(env, kd, "Message 3"),
            HandshakeExtension::Dpp => {
                let required = kd
                    .dpp
                    .as_ref()
                    .and_then(|d| d.get(1))
                    .is_some_and(|flags| flags & DPP_FLAG_PFS_REQUIRED != 0);
                if required && !env.pfs {
                    return Err(HandshakeError::Dpp(
                        "authenticator requires PFS but none was negotiated".into(),
                    ));
                }
                Ok(())
            }
            HandshakeExtension::P2pIpAddrReq => Ok(()),
        }
    }

    pub(crate) fn validate_group1(&self, env: &ExtEnv<'_>, kd: &KeyData) -> Result<()> {
        match self {
            HandshakeExtension::Oci => verify_oci(env, kd, "Group Message 1"),
            _ => Ok(()),
        }
    }

    pub(crate) fn append_group2(&self, env: &ExtEnv<'_>, out: &mut BytesMut) -> Result<()> {
        match self {
            HandshakeExtension::Oci => {
                kde::put_oci(out, env.own_channel()?).map_err(HandshakeError::KeyData)
            }
            _ => Ok(()),
        }
    }
}

fn verify_oci(env: &ExtEnv<'_>, kd: &KeyData, msg: &str) -> Result<()> {
    let own = env.own_channel()?;
    let oci = kd
        .oci
        .as_ref()
        .ok_or_else(|| HandshakeError::Ocv(format!("no OCI KDE in {msg}")))?;
    oci.verify(own).map_err(HandshakeError::Ocv)
}

fn validate_ft_msg3(ft: &FtState, kd: &KeyData) -> Result<()> {
    let assoc_resp = ft
        .assoc_resp_ies
        .as_deref()
        .ok_or_else(|| HandshakeError::Ft("no FT elements from the Association Response".into()))?;

    let mde_raw = kd
        .mde
        .as_ref()
        .ok_or_else(|| HandshakeError::Ft("no MDE in Message 3".into()))?;
    let mde = Mde::parse(mde_raw).map_err(HandshakeError::KeyData)?;
    if Some(mde.mdid) != ft.mdid {
        return Err(HandshakeError::Ft("MDID in Message 3 does not match".into()));
    }
    if let Some(assoc_mde) = ie::find(assoc_resp, EID_MOBILITY_DOMAIN) {
        if assoc_mde != mde_raw.as_ref() {
            return Err(HandshakeError::Ft(
                "MDE in Message 3 differs from the Association Response".into(),
            ));
        }
    }

    let fte = kd
        .fte
        .as_ref()
        .ok_or_else(|| HandshakeError::Ft("no FTE in Message 3".into()))?;
    if let Some(assoc_fte) = ie::find(assoc_resp, EID_FAST_BSS_TRANSITION) {
        if assoc_fte != fte.as_ref() {
            tracing::debug!(
                msg3 = %rsnkey::hex(fte),
                assoc_resp = %rsnkey::hex(assoc_fte),
                "FTE mismatch"
            );
            return Err(HandshakeError::Ft(
                "FTE in Message 3 differs from the Association Response".into(),
            ));
        }
    }

    if let Some(rsne) = &kd.rsne {
        let rsne = Rsne::parse(rsne).map_err(HandshakeError::KeyData)?;
        let r1_name = ft.pmk_r1.as_ref().map(|r1| r1.name);
        if rsne.pmkids.len() != 1 || Some(rsne.pmkids[0]) != r1_name {
            return Err(HandshakeError::Ft(
                "PMKR1Name in Message 3 does not match".into(),
            ));
        }
    }
    Ok(())
}

fn validate_mlo_msg3(mld: &MldParams, kd: &KeyData) -> Result<()> {
    if kd.mac_addr != Some(mld.ap_mld_addr) {
        return Err(HandshakeError::Mlo(format!(
            "MAC Address KDE {:?} does not match AP MLD address {}",
            kd.mac_addr, mld.ap_mld_addr
        )));
    }
    for link in mld.links.iter().filter(|l| l.link_id != mld.assoc_link_id) {
        let link_kde = kd
            .mlo_links
            .iter()
            .find(|k| k.link_id == link.link_id)
            .ok_or_else(|| HandshakeError::Mlo(format!("no MLO Link KDE for link {}", link.link_id)))?;
        if link_kde.addr != link.bssid {
            return Err(HandshakeError::Mlo(format!(
                "link {} address {} does not match {}",
                link.link_id, link_kde.addr, link.bssid
            )));
        }
        match (&link.ap_rsne, &link_kde.rsne) {
            (Some(adv), Some(recv)) if ie_matches(adv, recv, false) => {}
            (None, None) => {}
            _ => {
                return Err(HandshakeError::IeMismatch(format!(
                    "RSNE mismatch for MLO link {}",
                    link.link_id
                )))
            }
        }
        if link.ap_rsnxe.as_deref() != link_kde.rsnxe.as_deref() {
            return Err(HandshakeError::RsnxeMismatch);
        }
    }
    Ok(())
}
