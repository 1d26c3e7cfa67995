// EAPOL-Key key data: elements and Key Data Encapsulations (KDEs).
//
// A KDE is a vendor element: 0xdd | len | OUI(3) | data type(1) | data.
// Key data may also carry plain elements (RSNE, RSNXE, MDE, FTE, Timeout
// Interval, WPA IE). A lone 0xdd, or 0xdd followed by a zero length, marks
// the start of padding.

use bytes::{BufMut, Bytes, BytesMut};
use zeroize::Zeroizing;

use crate::addr::MacAddr;
use crate::error::{Result, RsnKeyError};
use crate::ie::{self, Oci, EID_VENDOR_SPECIFIC};
use crate::suite::{OUI_RSN, OUI_WFA, OUI_WPA};
use crate::{Nonce, Pmkid, NONCE_LEN, PMKID_LEN};

pub const KDE_HDR_LEN: usize = 6;

/// KDE data types under 00-0F-AC.
pub mod kind {
    pub const GTK: u8 = 1;
    pub const MAC_ADDR: u8 = 3;
    pub const PMKID: u8 = 4;
    pub const NONCE: u8 = 6;
    pub const LIFETIME: u8 = 7;
    pub const ERROR: u8 = 8;
    pub const IGTK: u8 = 9;
    pub const KEY_ID: u8 = 10;
    pub const OCI: u8 = 13;
    pub const BIGTK: u8 = 14;
    pub const MLO_GTK: u8 = 16;
    pub const MLO_IGTK: u8 = 17;
    pub const MLO_BIGTK: u8 = 18;
    pub const MLO_LINK: u8 = 19;
}

/// KDE data types under the Wi-Fi Alliance OUI.
pub mod wfa_kind {
    pub const IP_ADDR_REQ: u8 = 4;
    pub const IP_ADDR_ALLOC: u8 = 5;
    pub const TRANSITION_DISABLE: u8 = 0x20;
    pub const DPP: u8 = 0x21;
}

/// Transition Disable bitmap bits.
pub mod transition_disable {
    pub const WPA3_PERSONAL: u8 = 1 << 0;
    pub const SAE_PK: u8 = 1 << 1;
    pub const WPA3_ENTERPRISE: u8 = 1 << 2;
    pub const ENHANCED_OPEN: u8 = 1 << 3;
}

pub const IPN_LEN: usize = 6;
pub const MAX_MLD_LINKS: usize = 15;

const GTK_MIN_LEN: usize = 5;
const GTK_MAX_LEN: usize = 32;

// ── Parsed KDEs ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
pub struct GtkKde {
    pub key_id: u8,
    pub tx: bool,
    pub key: Zeroizing<Vec<u8>>,
}

/// IGTK and BIGTK share a layout: Key ID(2, LE) | IPN/BIPN(6) | key.
#[derive(Clone, PartialEq, Eq)]
pub struct IgtkKde {
    pub key_id: u16,
    pub ipn: [u8; IPN_LEN],
    pub key: Zeroizing<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorKde {
    pub mui: u16,
    pub error_type: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MloLinkKde {
    pub link_id: u8,
    pub addr: MacAddr,
    pub rsne: Option<Bytes>,
    pub rsnxe: Option<Bytes>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct MloGtkKde {
    pub link_id: u8,
    pub key_id: u8,
    pub tx: bool,
    pub pn: [u8; IPN_LEN],
    pub key: Zeroizing<Vec<u8>>,
}

/// MLO IGTK/BIGTK: Key ID(2) | IPN(6) | link info(1, link ID in bits 4-7) | key.
#[derive(Clone, PartialEq, Eq)]
pub struct MloIgtkKde {
    pub link_id: u8,
    pub key_id: u16,
    pub ipn: [u8; IPN_LEN],
    pub key: Zeroizing<Vec<u8>>,
}

/// P2P IP address allocation: client IP | netmask | GO IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpAddrAlloc {
    pub client: [u8; 4],
    pub netmask: [u8; 4],
    pub go: [u8; 4],
}

macro_rules! redacted_debug {
    ($ty:ty, $($field:ident),*) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))*
                    .field("key_len", &self.key.len())
                    .finish()
            }
        }
    };
}

redacted_debug!(GtkKde, key_id, tx);
redacted_debug!(IgtkKde, key_id);
redacted_debug!(MloGtkKde, link_id, key_id, tx);
redacted_debug!(MloIgtkKde, link_id, key_id);

/// Everything the handshake looks for in key data (or in an IE buffer).
#[derive(Debug, Default, Clone)]
pub struct KeyData {
    pub rsne: Option<Bytes>,
    pub wpa_ie: Option<Bytes>,
    pub rsnxe: Option<Bytes>,
    pub mde: Option<Bytes>,
    pub fte: Option<Bytes>,
    pub timeout_interval: Option<Bytes>,
    pub oci_element: Option<Oci>,
    pub gtk: Option<GtkKde>,
    pub mac_addr: Option<MacAddr>,
    pub pmkid: Option<Pmkid>,
    pub nonce: Option<Nonce>,
    pub lifetime: Option<u32>,
    pub error: Option<ErrorKde>,
    pub igtk: Option<IgtkKde>,
    pub key_id: Option<u8>,
    pub oci: Option<Oci>,
    pub bigtk: Option<IgtkKde>,
    pub mlo_links: Vec<MloLinkKde>,
    pub mlo_gtks: Vec<MloGtkKde>,
    pub mlo_igtks: Vec<MloIgtkKde>,
    pub mlo_bigtks: Vec<MloIgtkKde>,
    pub ip_addr_req: bool,
    pub ip_addr_alloc: Option<IpAddrAlloc>,
    pub transition_disable: Option<u8>,
    pub dpp: Option<Bytes>,
}

fn fixed<const N: usize>(data: &[u8], kde: &'static str) -> Result<[u8; N]> {
    data.get(..N)
        .and_then(|s| <[u8; N]>::try_from(s).ok())
        .ok_or_else(|| RsnKeyError::kde(kde, format!("{} < {N} bytes", data.len())))
}

fn parse_gtk(data: &[u8]) -> Result<GtkKde> {
    let key = data.get(2..).unwrap_or_default();
    if data.len() < 2 || key.len() < GTK_MIN_LEN || key.len() > GTK_MAX_LEN {
        return Err(RsnKeyError::kde("GTK", format!("{} bytes", data.len())));
    }
    Ok(GtkKde {
        key_id: data[0] & 0x03,
        tx: data[0] & 0x04 != 0,
        key: Zeroizing::new(key.to_vec()),
    })
}

fn parse_igtk(data: &[u8], kde: &'static str) -> Result<IgtkKde> {
    if data.len() < 2 + IPN_LEN + 16 || data.len() > 2 + IPN_LEN + 32 {
        return Err(RsnKeyError::kde(kde, format!("{} bytes", data.len())));
    }
    Ok(IgtkKde {
        key_id: u16::from_le_bytes([data[0], data[1]]),
        ipn: fixed::<IPN_LEN>(&data[2..], kde)?,
        key: Zeroizing::new(data[2 + IPN_LEN..].to_vec()),
    })
}

fn parse_mlo_link(data: &[u8]) -> Result<MloLinkKde> {
    if data.len() < 1 + MacAddr::LEN {
        return Err(RsnKeyError::kde("MLO Link", format!("{} bytes", data.len())));
    }
    let info = data[0];
    let mut link = MloLinkKde {
        link_id: info & 0x0f,
        addr: MacAddr::from_slice(&data[1..7])?,
        rsne: None,
        rsnxe: None,
    };
    let mut rest = ie::Elements::new(&data[7..]);
    if info & 0x10 != 0 {
        let el = rest
            .next()
            .ok_or_else(|| RsnKeyError::kde("MLO Link", "RSNE flagged but missing"))??;
        link.rsne = Some(Bytes::copy_from_slice(el.raw));
    }
    if info & 0x20 != 0 {
        let el = rest
            .next()
            .ok_or_else(|| RsnKeyError::kde("MLO Link", "RSNXE flagged but missing"))??;
        link.rsnxe = Some(Bytes::copy_from_slice(el.raw));
    }
    Ok(link)
}

fn parse_mlo_gtk(data: &[u8]) -> Result<MloGtkKde> {
    let key = data.get(1 + IPN_LEN..).unwrap_or_default();
    if key.len() < GTK_MIN_LEN || key.len() > GTK_MAX_LEN {
        return Err(RsnKeyError::kde("MLO GTK", format!("{} bytes", data.len())));
    }
    Ok(MloGtkKde {
        key_id: data[0] & 0x03,
        tx: data[0] & 0x04 != 0,
        link_id: data[0] >> 4,
        pn: fixed::<IPN_LEN>(&data[1..], "MLO GTK")?,
        key: Zeroizing::new(key.to_vec()),
    })
}

fn parse_mlo_igtk(data: &[u8], kde: &'static str) -> Result<MloIgtkKde> {
    let key = data.get(2 + IPN_LEN + 1..).unwrap_or_default();
    if key.len() < 16 || key.len() > 32 {
        return Err(RsnKeyError::kde(kde, format!("{} bytes", data.len())));
    }
    Ok(MloIgtkKde {
        key_id: u16::from_le_bytes([data[0], data[1]]),
        ipn: fixed::<IPN_LEN>(&data[2..], kde)?,
        link_id: data[2 + IPN_LEN] >> 4,
        key: Zeroizing::new(key.to_vec()),
    })
}

impl KeyData {
    /// Parse key data or an IE buffer. Unknown elements and KDEs are skipped;
    /// a truncated element or a malformed known KDE is an error.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let mut kd = KeyData::default();
        let mut pos = 0;
        while pos < buf.len() {
            if buf[pos] == EID_VENDOR_SPECIFIC && (pos + 1 == buf.len() || buf[pos + 1] == 0) {
                break;
            }
            let Some(item) = ie::Elements::new(&buf[pos..]).next() else {
                break;
            };
            let el = item?;
            pos += el.raw.len();
            kd.absorb(el)?;
        }
        Ok(kd)
    }

    fn absorb(&mut self, el: ie::Element<'_>) -> Result<()> {
        match el.id {
            ie::EID_RSN => self.rsne = Some(Bytes::copy_from_slice(el.raw)),
            ie::EID_RSNX => self.rsnxe = Some(Bytes::copy_from_slice(el.raw)),
            ie::EID_MOBILITY_DOMAIN => self.mde = Some(Bytes::copy_from_slice(el.raw)),
            ie::EID_FAST_BSS_TRANSITION => self.fte = Some(Bytes::copy_from_slice(el.raw)),
            ie::EID_TIMEOUT_INTERVAL => {
                self.timeout_interval = Some(Bytes::copy_from_slice(el.raw))
            }
            ie::EID_EXTENSION if el.body.first() == Some(&ie::EID_EXT_OCI) => {
                self.oci_element = Some(Oci::parse_body(&el.body[1..])?);
            }
            EID_VENDOR_SPECIFIC if el.body.len() >= 4 => {
                let oui = [el.body[0], el.body[1], el.body[2]];
                let data_type = el.body[3];
                let data = &el.body[4..];
                match oui {
                    OUI_RSN => self.absorb_rsn_kde(data_type, data)?,
                    OUI_WFA => self.absorb_wfa_kde(data_type, data)?,
                    OUI_WPA if data_type == 1 => {
                        self.wpa_ie = Some(Bytes::copy_from_slice(el.raw))
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn absorb_rsn_kde(&mut self, data_type: u8, data: &[u8]) -> Result<()> {
        match data_type {
            kind::GTK => self.gtk = Some(parse_gtk(data)?),
            kind::MAC_ADDR => {
                if data.len() != MacAddr::LEN {
                    return Err(RsnKeyError::kde("MAC address", format!("{} bytes", data.len())));
                }
                self.mac_addr = Some(MacAddr::from_slice(data)?);
            }
            kind::PMKID => {
                if data.len() != PMKID_LEN {
                    return Err(RsnKeyError::kde("PMKID", format!("{} bytes", data.len())));
                }
                self.pmkid = Some(fixed::<PMKID_LEN>(data, "PMKID")?);
            }
            kind::NONCE => self.nonce = Some(fixed::<NONCE_LEN>(data, "Nonce")?),
            kind::LIFETIME => self.lifetime = Some(u32::from_be_bytes(fixed::<4>(data, "Lifetime")?)),
            kind::ERROR => {
                let b = fixed::<4>(data, "Error")?;
                self.error = Some(ErrorKde {
                    mui: u16::from_be_bytes([b[0], b[1]]),
                    error_type: u16::from_be_bytes([b[2], b[3]]),
                });
            }
            kind::IGTK => self.igtk = Some(parse_igtk(data, "IGTK")?),
            kind::KEY_ID => self.key_id = Some(fixed::<2>(data, "Key ID")?[0] & 0x03),
            kind::OCI => self.oci = Some(Oci::parse_body(data)?),
            kind::BIGTK => self.bigtk = Some(parse_igtk(data, "BIGTK")?),
            kind::MLO_GTK => self.mlo_gtks.push(parse_mlo_gtk(data)?),
            kind::MLO_IGTK => self.mlo_igtks.push(parse_mlo_igtk(data, "MLO IGTK")?),
            kind::MLO_BIGTK => self.mlo_bigtks.push(parse_mlo_igtk(data, "MLO BIGTK")?),
            kind::MLO_LINK => {
                if self.mlo_links.len() >= MAX_MLD_LINKS {
                    return Err(RsnKeyError::kde("MLO Link", "too many links"));
                }
                self.mlo_links.push(parse_mlo_link(data)?);
            }
            _ => {}
        }
        Ok(())
    }

    fn absorb_wfa_kde(&mut self, data_type: u8, data: &[u8]) -> Result<()> {
        match data_type {
            wfa_kind::IP_ADDR_REQ => self.ip_addr_req = true,
            wfa_kind::IP_ADDR_ALLOC => {
                let b = fixed::<12>(data, "IP Address Allocation")?;
                self.ip_addr_alloc = Some(IpAddrAlloc {
                    client: [b[0], b[1], b[2], b[3]],
                    netmask: [b[4], b[5], b[6], b[7]],
                    go: [b[8], b[9], b[10], b[11]],
                });
            }
            wfa_kind::TRANSITION_DISABLE => {
                self.transition_disable = Some(fixed::<1>(data, "Transition Disable")?[0]);
            }
            wfa_kind::DPP => self.dpp = Some(Bytes::copy_from_slice(data)),
            _ => {}
        }
        Ok(())
    }
}

// ── Builders ─────────────────────────────────────────────────────────────

/// Append one KDE.
pub fn put_kde(buf: &mut BytesMut, oui: [u8; 3], data_type: u8, data: &[u8]) -> Result<()> {
    let len = u8::try_from(4 + data.len())
        .map_err(|_| RsnKeyError::kde("generic", format!("{} data bytes", data.len())))?;
    buf.put_u8(EID_VENDOR_SPECIFIC);
    buf.put_u8(len);
    buf.put_slice(&oui);
    buf.put_u8(data_type);
    buf.put_slice(data);
    Ok(())
}

pub fn put_gtk(buf: &mut BytesMut, key_id: u8, tx: bool, key: &[u8]) -> Result<()> {
    let mut data = Zeroizing::new(Vec::with_capacity(2 + key.len()));
    data.push((key_id & 0x03) | if tx { 0x04 } else { 0 });
    data.push(0);
    data.extend_from_slice(key);
    put_kde(buf, OUI_RSN, kind::GTK, &data)
}

fn igtk_data(key_id: u16, ipn: &[u8; IPN_LEN], key: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut data = Zeroizing::new(Vec::with_capacity(2 + IPN_LEN + key.len()));
    data.extend_from_slice(&key_id.to_le_bytes());
    data.extend_from_slice(ipn);
    data.extend_from_slice(key);
    data
}

pub fn put_igtk(buf: &mut BytesMut, key_id: u16, ipn: &[u8; IPN_LEN], key: &[u8]) -> Result<()> {
    put_kde(buf, OUI_RSN, kind::IGTK, &igtk_data(key_id, ipn, key))
}

pub fn put_bigtk(buf: &mut BytesMut, key_id: u16, bipn: &[u8; IPN_LEN], key: &[u8]) -> Result<()> {
    put_kde(buf, OUI_RSN, kind::BIGTK, &igtk_data(key_id, bipn, key))
}

pub fn put_mac_addr(buf: &mut BytesMut, addr: MacAddr) -> Result<()> {
    put_kde(buf, OUI_RSN, kind::MAC_ADDR, addr.as_bytes())
}

pub fn put_pmkid(buf: &mut BytesMut, pmkid: &Pmkid) -> Result<()> {
    put_kde(buf, OUI_RSN, kind::PMKID, pmkid)
}

pub fn put_oci(buf: &mut BytesMut, oci: &Oci) -> Result<()> {
    put_kde(buf, OUI_RSN, kind::OCI, &oci.body())
}

pub fn put_transition_disable(buf: &mut BytesMut, bitmap: u8) -> Result<()> {
    put_kde(buf, OUI_WFA, wfa_kind::TRANSITION_DISABLE, &[bitmap])
}

pub fn put_ip_addr_req(buf: &mut BytesMut) -> Result<()> {
    put_kde(buf, OUI_WFA, wfa_kind::IP_ADDR_REQ, &[0x01])
}

pub fn put_dpp(buf: &mut BytesMut, data: &[u8]) -> Result<()> {
    put_kde(buf, OUI_WFA, wfa_kind::DPP, data)
}

pub fn put_mlo_link(
    buf: &mut BytesMut,
    link_id: u8,
    addr: MacAddr,
    rsne: Option<&[u8]>,
    rsnxe: Option<&[u8]>,
) -> Result<()> {
    let mut info = link_id & 0x0f;
    if rsne.is_some() {
        info |= 0x10;
    }
    if rsnxe.is_some() {
        info |= 0x20;
    }
    let mut data = Vec::with_capacity(64);
    data.push(info);
    data.extend_from_slice(addr.as_bytes());
    data.extend_from_slice(rsne.unwrap_or_default());
    data.extend_from_slice(rsnxe.unwrap_or_default());
    put_kde(buf, OUI_RSN, kind::MLO_LINK, &data)
}

pub fn put_mlo_gtk(
    buf: &mut BytesMut,
    link_id: u8,
    key_id: u8,
    tx: bool,
    pn: &[u8; IPN_LEN],
    key: &[u8],
) -> Result<()> {
    let mut data = Zeroizing::new(Vec::with_capacity(1 + IPN_LEN + key.len()));
    data.push((key_id & 0x03) | if tx { 0x04 } else { 0 } | (link_id << 4));
    data.extend_from_slice(pn);
    data.extend_from_slice(key);
    put_kde(buf, OUI_RSN, kind::MLO_GTK, &data)
}

/// Pad key data for AES key wrap: at least 16 octets, a multiple of 8, with
/// padding starting 0xdd followed by zeros.
pub fn pad_for_wrap(data: &mut Vec<u8>) {
    if data.len() >= 16 && data.len() % 8 == 0 {
        return;
    }
    data.push(EID_VENDOR_SPECIFIC);
    while data.len() < 16 || data.len() % 8 != 0 {
        data.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gtk_kde_fields() {
        let mut buf = BytesMut::new();
        put_gtk(&mut buf, 2, true, &[0x77; 16]).unwrap();
        let kd = KeyData::parse(&buf).unwrap();
        let gtk = kd.gtk.unwrap();
        assert_eq!(gtk.key_id, 2);
        assert!(gtk.tx);
        assert_eq!(&gtk.key[..], &[0x77; 16]);
    }

    #[test]
    fn padding_terminates_parsing() {
        let mut buf = BytesMut::new();
        put_mac_addr(&mut buf, MacAddr([1, 2, 3, 4, 5, 6])).unwrap();
        let mut data = buf.to_vec();
        pad_for_wrap(&mut data);
        assert_eq!(data.len(), 16);
        assert_eq!(data[12], 0xdd);
        let kd = KeyData::parse(&data).unwrap();
        assert_eq!(kd.mac_addr, Some(MacAddr([1, 2, 3, 4, 5, 6])));
    }

    #[test]
    fn short_gtk_is_rejected() {
        let mut buf = BytesMut::new();
        put_kde(&mut buf, OUI_RSN, kind::GTK, &[0x01, 0x00, 0xaa]).unwrap();
        assert!(matches!(
            KeyData::parse(&buf),
            Err(RsnKeyError::InvalidKde { kde: "GTK", .. })
        ));
    }

    #[test]
    fn truncated_element_is_rejected() {
        assert!(KeyData::parse(&[0x30, 0x10, 0x01]).is_err());
    }

    #[test]
    fn igtk_and_bigtk() {
        let mut buf = BytesMut::new();
        put_igtk(&mut buf, 4, &[1, 0, 0, 0, 0, 0], &[0x10; 16]).unwrap();
        put_bigtk(&mut buf, 6, &[2, 0, 0, 0, 0, 0], &[0x20; 16]).unwrap();
        let kd = KeyData::parse(&buf).unwrap();
        assert_eq!(kd.igtk.as_ref().unwrap().key_id, 4);
        assert_eq!(kd.bigtk.as_ref().unwrap().key_id, 6);
        assert_eq!(kd.bigtk.unwrap().ipn[0], 2);
    }

    #[test]
    fn mlo_link_with_rsne() {
        let rsne = [0x30, 0x02, 0x01, 0x00];
        let mut buf = BytesMut::new();
        put_mlo_link(&mut buf, 3, MacAddr([9; 6]), Some(&rsne), None).unwrap();
        let kd = KeyData::parse(&buf).unwrap();
        assert_eq!(kd.mlo_links.len(), 1);
        assert_eq!(kd.mlo_links[0].link_id, 3);
        assert_eq!(kd.mlo_links[0].rsne.as_deref(), Some(&rsne[..]));
        assert!(kd.mlo_links[0].rsnxe.is_none());
    }

    #[test]
    fn wfa_kdes() {
        let mut buf = BytesMut::new();
        put_transition_disable(&mut buf, transition_disable::WPA3_PERSONAL).unwrap();
        put_ip_addr_req(&mut buf).unwrap();
        let kd = KeyData::parse(&buf).unwrap();
        assert_eq!(kd.transition_disable, Some(1));
        assert!(kd.ip_addr_req);
    }

    #[test]
    fn elements_alongside_kdes() {
        let mut buf = BytesMut::new();
        buf.put_slice(&[0x30, 0x02, 0x01, 0x00]);
        put_pmkid(&mut buf, &[0x42; 16]).unwrap();
        let kd = KeyData::parse(&buf).unwrap();
        assert_eq!(kd.rsne.as_deref(), Some(&[0x30, 0x02, 0x01, 0x00][..]));
        assert_eq!(kd.pmkid, Some([0x42; 16]));
    }
}
