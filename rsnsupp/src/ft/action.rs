//! FT Action frames for over-the-DS transitions.
//!
//! ```text
//! Request:  Category(1)=6 | Action(1)=1 | STA(6) | Target AP(6) | IEs
//! Response: Category(1)=6 | Action(1)=2 | STA(6) | Target AP(6) | Status(2, LE) | IEs
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use rsnkey::MacAddr;

use crate::error::Result;
use crate::ft::FtError;

pub const CATEGORY_FT: u8 = 6;
pub const ACTION_REQUEST: u8 = 1;
pub const ACTION_RESPONSE: u8 = 2;

const REQUEST_FIXED_LEN: usize = 2 + 2 * MacAddr::LEN;
const RESPONSE_FIXED_LEN: usize = REQUEST_FIXED_LEN + 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtResponse {
    pub sta: MacAddr,
    pub target_ap: MacAddr,
    pub status: u16,
    pub ies: Bytes,
}

pub fn encode_request(sta: MacAddr, target_ap: MacAddr, ies: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(REQUEST_FIXED_LEN + ies.len());
    buf.put_u8(CATEGORY_FT);
    buf.put_u8(ACTION_REQUEST);
    buf.put_slice(sta.as_bytes());
    buf.put_slice(target_ap.as_bytes());
    buf.put_slice(ies);
    buf.freeze()
}

pub fn encode_response(sta: MacAddr, target_ap: MacAddr, status: u16, ies: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(RESPONSE_FIXED_LEN + ies.len());
    buf.put_u8(CATEGORY_FT);
    buf.put_u8(ACTION_RESPONSE);
    buf.put_slice(sta.as_bytes());
    buf.put_slice(target_ap.as_bytes());
    buf.put_u16_le(status);
    buf.put_slice(ies);
    buf.freeze()
}

pub fn decode_response(frame: &[u8]) -> Result<FtResponse> {
    if frame.len() < RESPONSE_FIXED_LEN {
        return Err(FtError::State(format!("FT Action frame of {} bytes", frame.len())).into());
    }
    let mut buf = frame;
    let category = buf.get_u8();
    let action = buf.get_u8();
    if category != CATEGORY_FT || action != ACTION_RESPONSE {
        return Err(FtError::State(format!(
            "not an FT Response (category {category} action {action})"
        ))
        .into());
    }
    let sta = MacAddr::from_slice(&buf[..MacAddr::LEN])?;
    buf.advance(MacAddr::LEN);
    let target_ap = MacAddr::from_slice(&buf[..MacAddr::LEN])?;
    buf.advance(MacAddr::LEN);
    let status = buf.get_u16_le();
    Ok(FtResponse {
        sta,
        target_ap,
        status,
        ies: Bytes::copy_from_slice(buf),
    })
}
