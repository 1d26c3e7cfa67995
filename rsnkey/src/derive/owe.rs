// Opportunistic Wireless Encryption PMK derivation (RFC 8110, 4.4).
//
//   prk  = HKDF-Extract(C || A || group, z)
//   PMK  = HKDF-Expand(prk, "OWE Key Generation", n)
//   PMKID = Truncate-128(Hash(C || A))
//
// C and A are the station's and AP's public keys; z is the DH shared secret.

use hkdf::Hkdf;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::crypto::prf::digest;
use crate::error::{Result, RsnKeyError};
use crate::suite::KdfHash;
use crate::{Pmkid, PMKID_LEN};

const OWE_INFO: &[u8] = b"OWE Key Generation";

/// Hash and PMK length for a finite cyclic group.
pub fn group_params(group: u16) -> Result<(KdfHash, usize)> {
    match group {
        19 => Ok((KdfHash::Sha256, 32)),
        20 => Ok((KdfHash::Sha384, 48)),
        21 => Ok((KdfHash::Sha512, 64)),
        other => Err(RsnKeyError::Derivation(format!("unsupported OWE group {other}"))),
    }
}

fn expand(hash: KdfHash, salt: &[u8], z: &[u8], out: &mut [u8]) -> Result<()> {
    let res = match hash {
        KdfHash::Sha256 => Hkdf::<Sha256>::new(Some(salt), z).expand(OWE_INFO, out),
        KdfHash::Sha384 => Hkdf::<Sha384>::new(Some(salt), z).expand(OWE_INFO, out),
        KdfHash::Sha512 => Hkdf::<Sha512>::new(Some(salt), z).expand(OWE_INFO, out),
        KdfHash::Sha1 => return Err(RsnKeyError::Derivation("OWE over SHA-1".into())),
    };
    res.map_err(|e| RsnKeyError::Derivation(format!("hkdf: {e}")))
}

/// Derive the OWE PMK and PMKID.
pub fn owe_pmk(group: u16, own_pub: &[u8], peer_pub: &[u8], z: &[u8]) -> Result<(Zeroizing<Vec<u8>>, Pmkid)> {
    let (hash, pmk_len) = group_params(group)?;

    let mut salt = Vec::with_capacity(own_pub.len() + peer_pub.len() + 2);
    salt.extend_from_slice(own_pub);
    salt.extend_from_slice(peer_pub);
    salt.extend_from_slice(&group.to_le_bytes());

    let mut pmk = Zeroizing::new(vec![0u8; pmk_len]);
    expand(hash, &salt, z, &mut pmk)?;

    let full = digest(hash, &[own_pub, peer_pub]);
    let mut pmkid = [0u8; PMKID_LEN];
    pmkid.copy_from_slice(&full[..PMKID_LEN]);
    Ok((pmk, pmkid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmk_length_follows_group() {
        for (group, len) in [(19u16, 32usize), (20, 48), (21, 64)] {
            let (pmk, _) = owe_pmk(group, &[1; 32], &[2; 32], &[3; 32]).unwrap();
            assert_eq!(pmk.len(), len);
        }
        assert!(owe_pmk(18, &[1; 32], &[2; 32], &[3; 32]).is_err());
    }

    #[test]
    fn pmkid_ignores_shared_secret() {
        let (_, a) = owe_pmk(19, &[1; 32], &[2; 32], &[3; 32]).unwrap();
        let (_, b) = owe_pmk(19, &[1; 32], &[2; 32], &[4; 32]).unwrap();
        assert_eq!(a, b);
    }
}
