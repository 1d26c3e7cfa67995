// Fast BSS Transition key hierarchy (IEEE Std 802.11-2020, 12.7.1.7).
//
//   PMK-R0 || salt = KDF(XXKey, "FT-R0", SSIDlen || SSID || MDID || R0KHlen || R0KH-ID || S0KH-ID)
//   PMKR0Name      = Truncate-128(H("FT-R0N" || salt))
//   PMK-R1         = KDF(PMK-R0, "FT-R1", R1KH-ID || S1KH-ID)
//   PMKR1Name      = Truncate-128(H("FT-R1N" || PMKR0Name || R1KH-ID || S1KH-ID))
//   PTK            = KDF(PMK-R1, "FT-PTK", SNonce || ANonce || BSSID || STA-ADDR)
//   PTKName        = Truncate-128(H(PMKR1Name || "FT-PTKN" || SNonce || ANonce || BSSID || STA-ADDR))
//
// H is SHA-256 for the 802.11r FT AKMs and SHA-384 for the SHA-384 ones;
// FT-SAE-EXT-KEY picks the hash from the XXKey length.

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::addr::MacAddr;
use crate::crypto::prf::{digest, kdf};
use crate::error::{Result, RsnKeyError};
use crate::suite::{Akm, Cipher, KdfHash};
use crate::{Nonce, Pmkid, PMKID_LEN};

use super::ptk::Ptk;

pub const SSID_MAX_LEN: usize = 32;
pub const R0KH_ID_MAX_LEN: usize = 48;
pub const MDID_LEN: usize = 2;

fn trunc128(full: &[u8]) -> Pmkid {
    let mut out = [0u8; PMKID_LEN];
    out.copy_from_slice(&full[..PMKID_LEN]);
    out
}

fn ft_hash(akm: Akm, xxkey_len: usize) -> Result<KdfHash> {
    if !akm.is_ft() {
        return Err(RsnKeyError::UnsupportedAkm(format!("{akm:?} is not an FT AKM")));
    }
    Ok(akm.kdf_hash(xxkey_len))
}

fn key_len(hash: KdfHash) -> usize {
    match hash {
        KdfHash::Sha384 => 48,
        KdfHash::Sha512 => 64,
        _ => 32,
    }
}

/// Select the XXKey from the PMK source: the MSK's second 256 bits for
/// FT-802.1X, its first 384 bits for FT-802.1X-SHA384, the PSK or SAE PMK
/// otherwise.
pub fn xxkey(akm: Akm, source: &[u8]) -> Result<&[u8]> {
    let short = || RsnKeyError::InvalidKeyLength {
        what: "XXKey source",
        len: source.len(),
    };
    match akm {
        Akm::FtIeee8021x => source.get(32..64).ok_or_else(short),
        Akm::FtIeee8021xSha384 => source.get(..48).ok_or_else(short),
        _ if akm.is_ft() => Ok(source),
        other => Err(RsnKeyError::UnsupportedAkm(format!("{other:?} is not an FT AKM"))),
    }
}

/// PMK-R0 and its name. Held by the station between transitions.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PmkR0 {
    key: Vec<u8>,
    #[zeroize(skip)]
    pub name: Pmkid,
    #[zeroize(skip)]
    hash: KdfHash,
}

impl PmkR0 {
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

/// PMK-R1 and its name, bound to one R1KH.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PmkR1 {
    key: Vec<u8>,
    #[zeroize(skip)]
    pub name: Pmkid,
    #[zeroize(skip)]
    pub r1kh_id: MacAddr,
}

impl PmkR1 {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    fn hash(&self) -> KdfHash {
        match self.key.len() {
            48 => KdfHash::Sha384,
            64 => KdfHash::Sha512,
            _ => KdfHash::Sha256,
        }
    }
}

impl std::fmt::Debug for PmkR1 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PmkR1")
            .field("name", &crate::hex(&self.name))
            .field("r1kh_id", &self.r1kh_id)
            .finish()
    }
}

/// Derive PMK-R0 and PMKR0Name from the XXKey.
pub fn derive_pmk_r0(
    akm: Akm,
    xxkey: &[u8],
    ssid: &[u8],
    mdid: [u8; MDID_LEN],
    r0kh_id: &[u8],
    s0kh_id: MacAddr,
) -> Result<PmkR0> {
    if ssid.len() > SSID_MAX_LEN {
        return Err(RsnKeyError::InvalidKeyLength { what: "SSID", len: ssid.len() });
    }
    if r0kh_id.is_empty() || r0kh_id.len() > R0KH_ID_MAX_LEN {
        return Err(RsnKeyError::InvalidKeyLength { what: "R0KH-ID", len: r0kh_id.len() });
    }
    let hash = ft_hash(akm, xxkey.len())?;
    let r0_len = key_len(hash);

    let mut ctx = Vec::with_capacity(1 + ssid.len() + MDID_LEN + 1 + r0kh_id.len() + MacAddr::LEN);
    ctx.push(ssid.len() as u8);
    ctx.extend_from_slice(ssid);
    ctx.extend_from_slice(&mdid);
    ctx.push(r0kh_id.len() as u8);
    ctx.extend_from_slice(r0kh_id);
    ctx.extend_from_slice(s0kh_id.as_bytes());

    let mut out = Zeroizing::new(vec![0u8; r0_len + PMKID_LEN]);
    kdf(hash, xxkey, "FT-R0", &ctx, &mut out)?;
    let (key, salt) = out.split_at(r0_len);
    let name = trunc128(&digest(hash, &[b"FT-R0N", salt]));

    Ok(PmkR0 {
        key: key.to_vec(),
        name,
        hash,
    })
}

/// Derive PMK-R1 and PMKR1Name for the given R1KH.
pub fn derive_pmk_r1(r0: &PmkR0, r1kh_id: MacAddr, s1kh_id: MacAddr) -> Result<PmkR1> {
    let mut ctx = [0u8; 2 * MacAddr::LEN];
    ctx[..6].copy_from_slice(r1kh_id.as_bytes());
    ctx[6..].copy_from_slice(s1kh_id.as_bytes());

    let mut key = vec![0u8; r0.key.len()];
    kdf(r0.hash, &r0.key, "FT-R1", &ctx, &mut key)?;
    let name = pmk_r1_name(r0.hash, &r0.name, r1kh_id, s1kh_id);
    Ok(PmkR1 { key, name, r1kh_id })
}

/// PMKR1Name from PMKR0Name; lets the station match a name without the key.
pub fn pmk_r1_name(hash: KdfHash, r0_name: &Pmkid, r1kh_id: MacAddr, s1kh_id: MacAddr) -> Pmkid {
    trunc128(&digest(
        hash,
        &[b"FT-R1N", r0_name, r1kh_id.as_bytes(), s1kh_id.as_bytes()],
    ))
}

/// Derive the FT PTK and PTKName from PMK-R1.
#[allow(clippy::too_many_arguments)]
pub fn pmk_r1_to_ptk(
    r1: &PmkR1,
    akm: Akm,
    cipher: Cipher,
    snonce: &Nonce,
    anonce: &Nonce,
    bssid: MacAddr,
    sta: MacAddr,
    kdk_len: usize,
) -> Result<(Ptk, Pmkid)> {
    let hash = r1.hash();
    let kck_len = akm.kck_len(r1.key.len());
    let kek_len = akm.kek_len(r1.key.len());
    let tk_len = cipher.key_len();

    let mut ctx = Vec::with_capacity(64 + 2 * MacAddr::LEN);
    ctx.extend_from_slice(snonce);
    ctx.extend_from_slice(anonce);
    ctx.extend_from_slice(bssid.as_bytes());
    ctx.extend_from_slice(sta.as_bytes());

    let mut buf = Zeroizing::new(vec![0u8; kck_len + kek_len + tk_len + kdk_len]);
    kdf(hash, &r1.key, "FT-PTK", &ctx, &mut buf)?;

    let name = trunc128(&digest(
        hash,
        &[
            &r1.name,
            b"FT-PTKN",
            snonce,
            anonce,
            bssid.as_bytes(),
            sta.as_bytes(),
        ],
    ));
    Ok((Ptk::split(&buf, kck_len, kek_len, tk_len), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const STA: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x10]);
    const AP: MacAddr = MacAddr([0x02, 0, 0, 0, 0, 0x20]);

    fn r0() -> PmkR0 {
        derive_pmk_r0(Akm::FtPsk, &[0x33; 32], b"ssid", [0xaa, 0xbb], b"r0kh.example", STA).unwrap()
    }

    #[test]
    fn r1_deterministic_and_name_matches() {
        let a = derive_pmk_r1(&r0(), AP, STA).unwrap();
        let b = derive_pmk_r1(&r0(), AP, STA).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, pmk_r1_name(KdfHash::Sha256, &r0().name, AP, STA));
    }

    #[test]
    fn r1_bound_to_r1kh() {
        let other = MacAddr([0x02, 0, 0, 0, 0, 0x30]);
        let a = derive_pmk_r1(&r0(), AP, STA).unwrap();
        let b = derive_pmk_r1(&r0(), other, STA).unwrap();
        assert_ne!(a.key(), b.key());
        assert_ne!(a.name, b.name);
    }

    #[test]
    fn sha384_hierarchy_uses_48_byte_keys() {
        let r0 = derive_pmk_r0(Akm::FtIeee8021xSha384, &[1; 48], b"s", [0, 1], b"r0", STA).unwrap();
        assert_eq!(r0.key().len(), 48);
        let r1 = derive_pmk_r1(&r0, AP, STA).unwrap();
        let (ptk, _) = pmk_r1_to_ptk(
            &r1,
            Akm::FtIeee8021xSha384,
            Cipher::Gcmp256,
            &[1; 32],
            &[2; 32],
            AP,
            STA,
            0,
        )
        .unwrap();
        assert_eq!(ptk.kck().len(), 24);
        assert_eq!(ptk.kek().len(), 32);
        assert_eq!(ptk.tk().len(), 32);
    }

    #[test]
    fn xxkey_selection() {
        let msk: Vec<u8> = (0u8..64).collect();
        assert_eq!(xxkey(Akm::FtIeee8021x, &msk).unwrap(), &msk[32..64]);
        assert_eq!(xxkey(Akm::FtIeee8021xSha384, &msk).unwrap(), &msk[..48]);
        assert!(xxkey(Akm::FtIeee8021x, &msk[..32]).is_err());
        assert!(xxkey(Akm::Psk, &msk).is_err());
    }

    #[test]
    fn rejects_oversized_ids() {
        assert!(derive_pmk_r0(Akm::FtPsk, &[0; 32], &[0; 33], [0, 0], b"r0", STA).is_err());
        assert!(derive_pmk_r0(Akm::FtPsk, &[0; 32], b"s", [0, 0], &[0; 49], STA).is_err());
        assert!(derive_pmk_r0(Akm::Psk, &[0; 32], b"s", [0, 0], b"r0", STA).is_err());
    }
}
