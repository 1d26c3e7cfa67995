// Pairwise Transient Key derivation (IEEE Std 802.11-2020, 12.7.1.3).
//
//   PTK = PRF(PMK, "Pairwise key expansion",
//             Min(AA,SPA) || Max(AA,SPA) || Min(ANonce,SNonce) || Max(ANonce,SNonce) [|| z])
//
// and is split as KCK || KEK || TK [|| KDK].

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::addr::MacAddr;
use crate::crypto::prf::{kdf, sha1_prf};
use crate::error::{Result, RsnKeyError};
use crate::suite::{Akm, Cipher, KdfHash};
use crate::Nonce;

use super::{PMK_LEN_MAX, PMK_LEN_MIN};

const PTK_LABEL: &str = "Pairwise key expansion";

/// A derived PTK. Key bytes are wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Ptk {
    kck: Vec<u8>,
    kek: Vec<u8>,
    tk: Vec<u8>,
    kdk: Vec<u8>,
}

impl Ptk {
    pub fn from_parts(kck: &[u8], kek: &[u8], tk: &[u8], kdk: &[u8]) -> Self {
        Self {
            kck: kck.to_vec(),
            kek: kek.to_vec(),
            tk: tk.to_vec(),
            kdk: kdk.to_vec(),
        }
    }

    /// Split a PRF output as KCK || KEK || TK || KDK.
    pub(crate) fn split(buf: &[u8], kck_len: usize, kek_len: usize, tk_len: usize) -> Self {
        let (kck, rest) = buf.split_at(kck_len);
        let (kek, rest) = rest.split_at(kek_len);
        let (tk, kdk) = rest.split_at(tk_len);
        Self::from_parts(kck, kek, tk, kdk)
    }

    pub fn kck(&self) -> &[u8] {
        &self.kck
    }

    pub fn kek(&self) -> &[u8] {
        &self.kek
    }

    pub fn tk(&self) -> &[u8] {
        &self.tk
    }

    pub fn kdk(&self) -> &[u8] {
        &self.kdk
    }

    /// TK in the layout the driver expects. TKIP carries Tx and Rx Michael
    /// keys at 16..24 and 24..32 from the authenticator's point of view; the
    /// station installs them swapped.
    pub fn tk_for_install(&self, cipher: Cipher) -> Zeroizing<Vec<u8>> {
        let mut tk = Zeroizing::new(self.tk.clone());
        if cipher == Cipher::Tkip && tk.len() == 32 {
            let (head, tail) = tk.split_at_mut(24);
            head[16..24].swap_with_slice(&mut tail[..8]);
        }
        tk
    }

    /// Wipe the temporal key after installation; KCK and KEK stay for
    /// later Group Key and Key Request frames.
    pub fn clear_tk(&mut self) {
        self.tk.zeroize();
        self.tk.clear();
    }
}

impl fmt::Debug for Ptk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ptk")
            .field("kck_len", &self.kck.len())
            .field("kek_len", &self.kek.len())
            .field("tk_len", &self.tk.len())
            .field("kdk_len", &self.kdk.len())
            .finish()
    }
}

/// Inputs of a 4-Way Handshake PTK derivation.
pub struct PtkParams<'a> {
    pub pmk: &'a [u8],
    pub aa: MacAddr,
    pub spa: MacAddr,
    pub anonce: &'a Nonce,
    pub snonce: &'a Nonce,
    pub akm: Akm,
    pub cipher: Cipher,
    /// Extra entropy mixed into the context (DPP PFS shared secret).
    pub z: Option<&'a [u8]>,
    /// Length of the key derivation key for secure ranging, 0 if unused.
    pub kdk_len: usize,
}

/// Derive the PTK for the given PMK, addresses, nonces and suites.
pub fn pmk_to_ptk(p: &PtkParams<'_>) -> Result<Ptk> {
    if p.pmk.len() < PMK_LEN_MIN || p.pmk.len() > PMK_LEN_MAX {
        return Err(RsnKeyError::InvalidKeyLength {
            what: "PMK",
            len: p.pmk.len(),
        });
    }
    if p.akm.is_fils() {
        return Err(RsnKeyError::UnsupportedAkm(format!(
            "{:?} derives its PTK during FILS authentication",
            p.akm
        )));
    }

    let (lo_addr, hi_addr) = if p.aa <= p.spa { (p.aa, p.spa) } else { (p.spa, p.aa) };
    let (lo_nonce, hi_nonce) = if p.anonce <= p.snonce {
        (p.anonce, p.snonce)
    } else {
        (p.snonce, p.anonce)
    };

    let z = p.z.unwrap_or_default();
    let mut data = Zeroizing::new(Vec::with_capacity(2 * MacAddr::LEN + 64 + z.len()));
    data.extend_from_slice(lo_addr.as_bytes());
    data.extend_from_slice(hi_addr.as_bytes());
    data.extend_from_slice(lo_nonce);
    data.extend_from_slice(hi_nonce);
    data.extend_from_slice(z);

    let kck_len = p.akm.kck_len(p.pmk.len());
    let kek_len = p.akm.kek_len(p.pmk.len());
    let tk_len = p.cipher.key_len();
    if tk_len == 0 {
        return Err(RsnKeyError::UnsupportedCipher(format!(
            "{:?} as pairwise cipher",
            p.cipher
        )));
    }
    let mut buf = Zeroizing::new(vec![0u8; kck_len + kek_len + tk_len + p.kdk_len]);

    match p.akm.kdf_hash(p.pmk.len()) {
        KdfHash::Sha1 => sha1_prf(p.pmk, PTK_LABEL, &data, &mut buf)?,
        hash => kdf(hash, p.pmk, PTK_LABEL, &data, &mut buf)?,
    }

    Ok(Ptk::split(&buf, kck_len, kek_len, tk_len))
}
