// RSN element and the legacy WPA vendor element.
//
// RSNE body (all counts little-endian, every field after Version optional):
//   version(2) | group(4) | n(2) pairwise(4*n) | m(2) akm(4*m) | caps(2)
//   | k(2) pmkid(16*k) | group mgmt(4)
// WPA IE body: 00-50-F2-01 followed by the same layout up to the AKM list.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RsnKeyError};
use crate::suite::{Akm, Cipher, Proto, Selector, OUI_WPA};
use crate::{Pmkid, PMKID_LEN};

use super::{EID_RSN, EID_VENDOR_SPECIFIC};

const WPA_IE_TYPE: u8 = 1;
const RSN_VERSION: u16 = 1;

/// RSN Capabilities bits.
pub mod caps {
    pub const PREAUTH: u16 = 1 << 0;
    pub const NO_PAIRWISE: u16 = 1 << 1;
    pub const MFPR: u16 = 1 << 6;
    pub const MFPC: u16 = 1 << 7;
    pub const SPP_AMSDU_CAPABLE: u16 = 1 << 10;
    pub const EXTENDED_KEY_ID: u16 = 1 << 13;
    pub const OCVC: u16 = 1 << 14;
}

/// Parsed RSNE or WPA IE. Suites the crate does not know are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsne {
    pub proto: Proto,
    pub group_cipher: Option<Cipher>,
    pub pairwise: Vec<Cipher>,
    pub akms: Vec<Akm>,
    pub capabilities: Option<u16>,
    pub pmkids: Vec<Pmkid>,
    pub group_mgmt_cipher: Option<Cipher>,
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn done(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(RsnKeyError::element("RSN", format!("truncated {what}")));
        }
        let (head, rest) = self.buf.split_at(n);
        self.buf = rest;
        Ok(head)
    }

    fn u16_le(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn selector(&mut self, what: &str) -> Result<Selector> {
        let b = self.take(4, what)?;
        Ok(Selector([b[0], b[1], b[2], b[3]]))
    }
}

impl Rsne {
    /// Parse a full element (header included): RSNE or WPA IE.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() < 2 || raw.len() != 2 + raw[1] as usize {
            return Err(RsnKeyError::element("RSN", "bad element length"));
        }
        match raw[0] {
            EID_RSN => Self::parse_body(Proto::Rsn, &raw[2..]),
            EID_VENDOR_SPECIFIC => {
                let body = &raw[2..];
                if body.len() < 4 || body[..3] != OUI_WPA || body[3] != WPA_IE_TYPE {
                    return Err(RsnKeyError::element("WPA", "not a WPA IE"));
                }
                Self::parse_body(Proto::Wpa, &body[4..])
            }
            other => Err(RsnKeyError::element("RSN", format!("element id {other}"))),
        }
    }

    fn parse_body(proto: Proto, body: &[u8]) -> Result<Self> {
        let mut r = Reader { buf: body };
        let version = r.u16_le("version")?;
        if version != RSN_VERSION {
            return Err(RsnKeyError::element("RSN", format!("version {version}")));
        }
        let mut ie = Rsne {
            proto,
            group_cipher: None,
            pairwise: Vec::new(),
            akms: Vec::new(),
            capabilities: None,
            pmkids: Vec::new(),
            group_mgmt_cipher: None,
        };
        if r.done() {
            return Ok(ie);
        }
        ie.group_cipher = Cipher::from_selector(proto, r.selector("group cipher")?);
        if r.done() {
            return Ok(ie);
        }
        let n = r.u16_le("pairwise count")?;
        for _ in 0..n {
            if let Some(c) = Cipher::from_selector(proto, r.selector("pairwise cipher")?) {
                ie.pairwise.push(c);
            }
        }
        if r.done() {
            return Ok(ie);
        }
        let m = r.u16_le("AKM count")?;
        for _ in 0..m {
            if let Some(a) = Akm::from_selector(proto, r.selector("AKM")?) {
                ie.akms.push(a);
            }
        }
        if r.done() {
            return Ok(ie);
        }
        ie.capabilities = Some(r.u16_le("capabilities")?);
        if proto == Proto::Wpa || r.done() {
            return Ok(ie);
        }
        let k = r.u16_le("PMKID count")?;
        for _ in 0..k {
            let b = r.take(PMKID_LEN, "PMKID")?;
            let mut id = [0u8; PMKID_LEN];
            id.copy_from_slice(b);
            ie.pmkids.push(id);
        }
        if r.done() {
            return Ok(ie);
        }
        ie.group_mgmt_cipher = Cipher::from_selector(proto, r.selector("group mgmt cipher")?);
        Ok(ie)
    }

    /// Station's own element for a single negotiated suite set.
    pub fn for_station(
        proto: Proto,
        akm: Akm,
        pairwise: Cipher,
        group: Cipher,
        group_mgmt: Option<Cipher>,
        capabilities: u16,
    ) -> Self {
        Rsne {
            proto,
            group_cipher: Some(group),
            pairwise: vec![pairwise],
            akms: vec![akm],
            capabilities: (proto == Proto::Rsn).then_some(capabilities),
            pmkids: Vec::new(),
            group_mgmt_cipher: group_mgmt,
        }
    }

    /// Full element encoding. Trailing optional fields are emitted only when
    /// a later field needs them.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(64);
        if self.proto == Proto::Wpa {
            body.extend_from_slice(&OUI_WPA);
            body.push(WPA_IE_TYPE);
        }
        body.extend_from_slice(&RSN_VERSION.to_le_bytes());
        let group = self
            .group_cipher
            .ok_or_else(|| RsnKeyError::element("RSN", "missing group cipher"))?;
        body.extend_from_slice(&group.selector(self.proto)?.0);
        body.extend_from_slice(&(self.pairwise.len() as u16).to_le_bytes());
        for c in &self.pairwise {
            body.extend_from_slice(&c.selector(self.proto)?.0);
        }
        body.extend_from_slice(&(self.akms.len() as u16).to_le_bytes());
        for a in &self.akms {
            body.extend_from_slice(&a.selector(self.proto)?.0);
        }
        if self.proto == Proto::Rsn {
            let need_pmkids = !self.pmkids.is_empty() || self.group_mgmt_cipher.is_some();
            if self.capabilities.is_some() || need_pmkids {
                body.extend_from_slice(&self.capabilities.unwrap_or(0).to_le_bytes());
            }
            if need_pmkids {
                body.extend_from_slice(&(self.pmkids.len() as u16).to_le_bytes());
                for id in &self.pmkids {
                    body.extend_from_slice(id);
                }
            }
            if let Some(mgmt) = self.group_mgmt_cipher {
                body.extend_from_slice(&mgmt.selector(self.proto)?.0);
            }
        }
        let id = match self.proto {
            Proto::Rsn => EID_RSN,
            Proto::Wpa => EID_VENDOR_SPECIFIC,
        };
        let mut out = Vec::with_capacity(2 + body.len());
        super::put_element(&mut out, id, &body)?;
        Ok(out)
    }

    pub fn has_capability(&self, bit: u16) -> bool {
        self.capabilities.is_some_and(|c| c & bit != 0)
    }

    fn same_suites(&self, other: &Rsne) -> bool {
        fn same_set<T: PartialEq>(a: &[T], b: &[T]) -> bool {
            a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
        }
        self.proto == other.proto
            && self.group_cipher == other.group_cipher
            && same_set(&self.pairwise, &other.pairwise)
            && same_set(&self.akms, &other.akms)
            && self.capabilities.unwrap_or(0) == other.capabilities.unwrap_or(0)
            && self.group_mgmt_cipher == other.group_mgmt_cipher
    }
}

/// Compare the RSNE/WPA IE from Message 3 against the one advertised in the
/// Beacon/Probe Response. Byte-identical elements always match; during an FT
/// initial mobility domain association the PMKID list may differ, so the
/// parsed suites are compared instead.
pub fn ie_matches(advertised: &[u8], received: &[u8], ft_initial: bool) -> bool {
    if advertised == received {
        return true;
    }
    if !ft_initial {
        return false;
    }
    match (Rsne::parse(advertised), Rsne::parse(received)) {
        (Ok(a), Ok(b)) => a.same_suites(&b),
        _ => false,
    }
}

/// Re-encode `own_ie` with a single PMKID (FT: PMKR1Name) in its PMKID list.
pub fn with_pmkid(own_ie: &[u8], pmkid: &Pmkid) -> Result<Vec<u8>> {
    let mut ie = Rsne::parse(own_ie)?;
    if ie.proto != Proto::Rsn {
        return Err(RsnKeyError::element("WPA", "no PMKID list in WPA IE"));
    }
    ie.pmkids = vec![*pmkid];
    ie.encode()
}
