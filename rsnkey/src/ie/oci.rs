// Operating Channel Information (OCV, IEEE Std 802.11-2020, 9.4.2.245).
//
// Body: operating class(1) | primary channel(1) | frequency segment 1
// channel index(1). Carried as an extension element (255/54), as an OCI KDE
// in EAPOL-Key data, or as an FTE subelement.

use crate::error::{Result, RsnKeyError};

use super::{EID_EXTENSION, EID_EXT_OCI};

pub const OCI_BODY_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Oci {
    pub op_class: u8,
    pub primary_channel: u8,
    pub seg1_idx: u8,
}

impl Oci {
    /// Parse the OCI body; any octets past the fixed fields are optional
    /// extensions and ignored.
    pub fn parse_body(body: &[u8]) -> Result<Self> {
        if body.len() < OCI_BODY_LEN {
            return Err(RsnKeyError::element("OCI", format!("{} bytes", body.len())));
        }
        Ok(Oci {
            op_class: body[0],
            primary_channel: body[1],
            seg1_idx: body[2],
        })
    }

    pub fn body(&self) -> [u8; OCI_BODY_LEN] {
        [self.op_class, self.primary_channel, self.seg1_idx]
    }

    /// Extension element form.
    pub fn encode_element(&self) -> Vec<u8> {
        let mut out = vec![EID_EXTENSION, 1 + OCI_BODY_LEN as u8, EID_EXT_OCI];
        out.extend_from_slice(&self.body());
        out
    }

    /// Check a peer-reported OCI against the station's own channel. Returns
    /// a description of the first differing field.
    pub fn verify(&self, own: &Oci) -> std::result::Result<(), String> {
        if self.op_class != own.op_class {
            return Err(format!(
                "operating class mismatch: peer {} own {}",
                self.op_class, own.op_class
            ));
        }
        if self.primary_channel != own.primary_channel {
            return Err(format!(
                "primary channel mismatch: peer {} own {}",
                self.primary_channel, own.primary_channel
            ));
        }
        if self.seg1_idx != own.seg1_idx {
            return Err(format!(
                "segment 1 index mismatch: peer {} own {}",
                self.seg1_idx, own.seg1_idx
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_reports_first_difference() {
        let own = Oci { op_class: 81, primary_channel: 6, seg1_idx: 0 };
        assert!(own.verify(&own).is_ok());
        let moved = Oci { primary_channel: 11, ..own };
        let err = moved.verify(&own).unwrap_err();
        assert!(err.contains("primary channel"));
    }

    #[test]
    fn element_form() {
        let oci = Oci { op_class: 115, primary_channel: 36, seg1_idx: 0 };
        assert_eq!(oci.encode_element(), vec![255, 4, 54, 115, 36, 0]);
        assert_eq!(Oci::parse_body(&oci.body()).unwrap(), oci);
        assert!(Oci::parse_body(&[1, 2]).is_err());
    }
}
