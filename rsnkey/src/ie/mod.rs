//! Information elements the key-management core reads and writes.
//!
//! Only the handful of elements the handshake validates are modeled:
//! RSNE / WPA IE, RSNXE, MDE, FTE, Timeout Interval and OCI. Everything else
//! is skipped by the element walker.

pub mod ft;
pub mod oci;
pub mod rsne;

pub use ft::{Fte, Mde, TimeoutInterval};
pub use oci::Oci;
pub use rsne::Rsne;

use crate::error::{Result, RsnKeyError};

pub const EID_RSN: u8 = 48;
pub const EID_MOBILITY_DOMAIN: u8 = 54;
pub const EID_FAST_BSS_TRANSITION: u8 = 55;
pub const EID_TIMEOUT_INTERVAL: u8 = 56;
pub const EID_VENDOR_SPECIFIC: u8 = 221;
pub const EID_RSNX: u8 = 244;
pub const EID_EXTENSION: u8 = 255;

/// Element ID Extension of the Operating Channel Information element.
pub const EID_EXT_OCI: u8 = 54;

/// One element: `id`, the body, and the full encoding including the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub id: u8,
    pub body: &'a [u8],
    pub raw: &'a [u8],
}

/// Walks a TLV element buffer. Yields an error and stops when an element
/// runs past the end of the buffer.
pub struct Elements<'a> {
    buf: &'a [u8],
    failed: bool,
}

impl<'a> Elements<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, failed: false }
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = Result<Element<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }
        if self.buf.len() < 2 {
            self.failed = true;
            return Some(Err(RsnKeyError::FrameTooShort {
                need: 2,
                have: self.buf.len(),
            }));
        }
        let len = self.buf[1] as usize;
        if 2 + len > self.buf.len() {
            self.failed = true;
            return Some(Err(RsnKeyError::LengthMismatch {
                what: "element",
                declared: len,
                available: self.buf.len() - 2,
            }));
        }
        let (raw, rest) = self.buf.split_at(2 + len);
        self.buf = rest;
        Some(Ok(Element {
            id: raw[0],
            body: &raw[2..],
            raw,
        }))
    }
}

/// First element with the given ID, full encoding.
pub fn find(buf: &[u8], id: u8) -> Option<&[u8]> {
    Elements::new(buf)
        .map_while(|e| e.ok())
        .find(|e| e.id == id)
        .map(|e| e.raw)
}

/// Append an element header and body.
pub fn put_element(out: &mut Vec<u8>, id: u8, body: &[u8]) -> Result<()> {
    let len = u8::try_from(body.len())
        .map_err(|_| RsnKeyError::element("generic", format!("body of {} bytes", body.len())))?;
    out.push(id);
    out.push(len);
    out.extend_from_slice(body);
    Ok(())
}
