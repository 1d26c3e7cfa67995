// Mobility Domain, Fast BSS Transition and Timeout Interval elements.

use zeroize::Zeroizing;

use crate::addr::MacAddr;
use crate::error::{Result, RsnKeyError};
use crate::{Nonce, NONCE_LEN};

use super::{put_element, EID_FAST_BSS_TRANSITION, EID_MOBILITY_DOMAIN, EID_TIMEOUT_INTERVAL};

/// FT Capability and Policy bits of the MDE.
pub const FT_CAPAB_FT_OVER_DS: u8 = 0x01;
pub const FT_CAPAB_RESOURCE_REQ: u8 = 0x02;

/// FTE subelement IDs.
pub mod subelem {
    pub const R1KH_ID: u8 = 1;
    pub const GTK: u8 = 2;
    pub const R0KH_ID: u8 = 3;
    pub const IGTK: u8 = 4;
    pub const OCI: u8 = 5;
    pub const BIGTK: u8 = 6;
}

/// Timeout Interval types.
pub const TIMEOUT_REASSOC_DEADLINE: u8 = 1;
pub const TIMEOUT_KEY_LIFETIME: u8 = 2;
pub const TIMEOUT_ASSOC_COMEBACK: u8 = 3;

// ── MDE ──────────────────────────────────────────────────────────────────

/// Mobility Domain element: MDID(2) + FT capability and policy(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mde {
    pub mdid: [u8; 2],
    pub ft_capab: u8,
}

impl Mde {
    pub const BODY_LEN: usize = 3;

    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() != 2 + Self::BODY_LEN || raw[0] != EID_MOBILITY_DOMAIN || raw[1] as usize != Self::BODY_LEN {
            return Err(RsnKeyError::element("MDE", format!("{} bytes", raw.len())));
        }
        Ok(Mde {
            mdid: [raw[2], raw[3]],
            ft_capab: raw[4],
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            EID_MOBILITY_DOMAIN,
            Self::BODY_LEN as u8,
            self.mdid[0],
            self.mdid[1],
            self.ft_capab,
        ]
    }
}

// ── FTE ──────────────────────────────────────────────────────────────────

/// Fast BSS Transition element.
///
/// ```text
/// MIC control(2) | MIC(16/24/32) | ANonce(32) | SNonce(32) | subelements
/// ```
/// MIC control octet 0 carries the MIC length code in bits 1-3; octet 1 is
/// the number of elements covered by the MIC.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Fte {
    pub element_count: u8,
    pub rsnxe_used: bool,
    pub mic: Vec<u8>,
    pub anonce: Nonce,
    pub snonce: Nonce,
    pub r1kh_id: Option<MacAddr>,
    pub r0kh_id: Option<Vec<u8>>,
    /// Raw subelement bodies; key material stays wrapped until the caller
    /// unwraps it with the KEK.
    pub gtk: Option<Zeroizing<Vec<u8>>>,
    pub igtk: Option<Zeroizing<Vec<u8>>>,
    pub bigtk: Option<Zeroizing<Vec<u8>>>,
    pub oci: Option<Vec<u8>>,
}

impl std::fmt::Debug for Fte {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fte")
            .field("element_count", &self.element_count)
            .field("mic_len", &self.mic.len())
            .field("r1kh_id", &self.r1kh_id)
            .field("r0kh_id", &self.r0kh_id.as_deref().map(crate::hex))
            .field("gtk", &self.gtk.is_some())
            .field("igtk", &self.igtk.is_some())
            .field("bigtk", &self.bigtk.is_some())
            .finish()
    }
}

fn mic_len_code(len: usize) -> Result<u8> {
    match len {
        16 => Ok(0),
        24 => Ok(1),
        32 => Ok(2),
        other => Err(RsnKeyError::element("FTE", format!("MIC length {other}"))),
    }
}

impl Fte {
    /// Parse a full FTE. `mic_len` is fixed by the AKM except for
    /// FT-SAE-EXT-KEY, where `None` reads it from MIC control.
    pub fn parse(raw: &[u8], mic_len: Option<usize>) -> Result<Self> {
        if raw.len() < 2 || raw[0] != EID_FAST_BSS_TRANSITION || raw.len() != 2 + raw[1] as usize {
            return Err(RsnKeyError::element("FTE", "bad header"));
        }
        let body = &raw[2..];
        if body.len() < 2 {
            return Err(RsnKeyError::element("FTE", "missing MIC control"));
        }
        let rsnxe_used = body[0] & 0x01 != 0;
        let mic_len = match mic_len {
            Some(len) => len,
            None => match (body[0] >> 1) & 0x07 {
                0 => 16,
                1 => 24,
                2 => 32,
                code => return Err(RsnKeyError::element("FTE", format!("MIC length code {code}"))),
            },
        };
        let fixed = 2 + mic_len + 2 * NONCE_LEN;
        if body.len() < fixed {
            return Err(RsnKeyError::element("FTE", format!("{} < {fixed} bytes", body.len())));
        }
        let mut fte = Fte {
            element_count: body[1],
            rsnxe_used,
            mic: body[2..2 + mic_len].to_vec(),
            ..Default::default()
        };
        let mut pos = 2 + mic_len;
        fte.anonce.copy_from_slice(&body[pos..pos + NONCE_LEN]);
        pos += NONCE_LEN;
        fte.snonce.copy_from_slice(&body[pos..pos + NONCE_LEN]);
        pos += NONCE_LEN;

        for sub in super::Elements::new(&body[pos..]) {
            let sub = sub.map_err(|e| RsnKeyError::element("FTE", format!("subelement: {e}")))?;
            match sub.id {
                subelem::R1KH_ID => {
                    fte.r1kh_id = Some(
                        MacAddr::from_slice(sub.body)
                            .map_err(|_| RsnKeyError::element("FTE", "R1KH-ID length"))?,
                    );
                }
                subelem::R0KH_ID => {
                    if sub.body.is_empty() || sub.body.len() > crate::derive::ft::R0KH_ID_MAX_LEN {
                        return Err(RsnKeyError::element("FTE", "R0KH-ID length"));
                    }
                    fte.r0kh_id = Some(sub.body.to_vec());
                }
                subelem::GTK => fte.gtk = Some(Zeroizing::new(sub.body.to_vec())),
                subelem::IGTK => fte.igtk = Some(Zeroizing::new(sub.body.to_vec())),
                subelem::BIGTK => fte.bigtk = Some(Zeroizing::new(sub.body.to_vec())),
                subelem::OCI => fte.oci = Some(sub.body.to_vec()),
                _ => {}
            }
        }
        Ok(fte)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut body = Vec::with_capacity(2 + self.mic.len() + 2 * NONCE_LEN + 64);
        body.push((mic_len_code(self.mic.len())? << 1) | u8::from(self.rsnxe_used));
        body.push(self.element_count);
        body.extend_from_slice(&self.mic);
        body.extend_from_slice(&self.anonce);
        body.extend_from_slice(&self.snonce);
        if let Some(r1kh) = self.r1kh_id {
            put_element(&mut body, subelem::R1KH_ID, r1kh.as_bytes())?;
        }
        if let Some(gtk) = &self.gtk {
            put_element(&mut body, subelem::GTK, gtk)?;
        }
        if let Some(r0kh) = &self.r0kh_id {
            put_element(&mut body, subelem::R0KH_ID, r0kh)?;
        }
        if let Some(igtk) = &self.igtk {
            put_element(&mut body, subelem::IGTK, igtk)?;
        }
        if let Some(oci) = &self.oci {
            put_element(&mut body, subelem::OCI, oci)?;
        }
        if let Some(bigtk) = &self.bigtk {
            put_element(&mut body, subelem::BIGTK, bigtk)?;
        }
        let mut out = Vec::with_capacity(2 + body.len());
        put_element(&mut out, EID_FAST_BSS_TRANSITION, &body)?;
        Ok(out)
    }

    /// Encoding with the MIC field zeroed, as covered by the FT MIC.
    pub fn encode_mic_zeroed(&self) -> Result<Vec<u8>> {
        let mut copy = self.clone();
        copy.mic.iter_mut().for_each(|b| *b = 0);
        copy.encode()
    }
}

// ── Timeout Interval ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutInterval {
    pub kind: u8,
    pub value: u32,
}

impl TimeoutInterval {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() != 7 || raw[0] != EID_TIMEOUT_INTERVAL || raw[1] != 5 {
            return Err(RsnKeyError::element("Timeout Interval", "bad length"));
        }
        Ok(TimeoutInterval {
            kind: raw[2],
            value: u32::from_le_bytes([raw[3], raw[4], raw[5], raw[6]]),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![EID_TIMEOUT_INTERVAL, 5, self.kind];
        out.extend_from_slice(&self.value.to_le_bytes());
        out
    }
}
