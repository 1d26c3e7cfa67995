use bytes::{Buf, BufMut, Bytes, BytesMut};
use zeroize::Zeroizing;

use crate::crypto::aead::SivKey;
use crate::crypto::mic::{compute_mic, verify_mic};
use crate::crypto::wrap::{aes_unwrap, aes_wrap, rc4_skip_xor};
use crate::error::{Result, RsnKeyError};
use crate::suite::Akm;
use crate::{Nonce, NONCE_LEN};

/// EAPOL header: version(1) + packet type(1) + body length(2, big-endian).
pub const EAPOL_HDR_LEN: usize = 4;

pub const EAPOL_VERSION_2001: u8 = 1;
pub const EAPOL_VERSION_2004: u8 = 2;

/// Descriptor type for IEEE 802.11 RSN key descriptors.
pub const DESC_TYPE_RSN: u8 = 2;
/// Descriptor type used by the pre-RSN WPA key descriptor.
pub const DESC_TYPE_WPA: u8 = 254;

pub const KEY_DESC_VER_AKM_DEFINED: u8 = 0;
pub const KEY_DESC_VER_HMAC_MD5_RC4: u8 = 1;
pub const KEY_DESC_VER_HMAC_SHA1_AES: u8 = 2;
pub const KEY_DESC_VER_AES_128_CMAC: u8 = 3;

/// Fixed part of the EAPOL-Key body without MIC and key data:
/// type(1) + info(2) + key_len(2) + replay(8) + nonce(32) + iv(16) + rsc(8) + reserved(8) + kd_len(2)
pub const KEY_BODY_FIXED_LEN: usize = 1 + 2 + 2 + 8 + NONCE_LEN + 16 + 8 + 8 + 2;

/// EAPOL packet types that matter to the supplicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    EapPacket = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
}

/// Key Information field of an EAPOL-Key frame.
///
/// ```text
///  bit  0-2  descriptor version
///  bit  3    key type (1 = pairwise)
///  bit  4-5  key index (WPA only)
///  bit  6    install
///  bit  7    ack
///  bit  8    MIC
///  bit  9    secure
///  bit 10    error
///  bit 11    request
///  bit 12    encrypted key data
///  bit 13    SMK message
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct KeyInfo(pub u16);

impl KeyInfo {
    pub const VERSION_MASK: u16 = 0x0007;
    pub const KEY_TYPE: u16 = 1 << 3;
    pub const INDEX_MASK: u16 = 0x0030;
    pub const INSTALL: u16 = 1 << 6;
    pub const ACK: u16 = 1 << 7;
    pub const MIC: u16 = 1 << 8;
    pub const SECURE: u16 = 1 << 9;
    pub const ERROR: u16 = 1 << 10;
    pub const REQUEST: u16 = 1 << 11;
    pub const ENCR_KEY_DATA: u16 = 1 << 12;
    pub const SMK_MESSAGE: u16 = 1 << 13;

    pub fn version(self) -> u8 {
        (self.0 & Self::VERSION_MASK) as u8
    }

    pub fn with_version(self, version: u8) -> Self {
        Self((self.0 & !Self::VERSION_MASK) | (u16::from(version) & Self::VERSION_MASK))
    }

    pub fn key_index(self) -> u8 {
        ((self.0 & Self::INDEX_MASK) >> 4) as u8
    }

    pub fn with_key_index(self, idx: u8) -> Self {
        Self((self.0 & !Self::INDEX_MASK) | ((u16::from(idx) << 4) & Self::INDEX_MASK))
    }

    pub fn has(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn with(self, flag: u16) -> Self {
        Self(self.0 | flag)
    }

    pub fn is_pairwise(self) -> bool {
        self.has(Self::KEY_TYPE)
    }
}

impl std::fmt::Debug for KeyInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const NAMES: [(u16, &str); 10] = [
            (KeyInfo::KEY_TYPE, "pairwise"),
            (KeyInfo::INSTALL, "install"),
            (KeyInfo::ACK, "ack"),
            (KeyInfo::MIC, "mic"),
            (KeyInfo::SECURE, "secure"),
            (KeyInfo::ERROR, "error"),
            (KeyInfo::REQUEST, "request"),
            (KeyInfo::ENCR_KEY_DATA, "encr"),
            (KeyInfo::SMK_MESSAGE, "smk"),
            (KeyInfo::INDEX_MASK, "idx"),
        ];
        write!(f, "KeyInfo(0x{:04x} ver={}", self.0, self.version())?;
        for (bit, name) in NAMES {
            if bit == KeyInfo::INDEX_MASK {
                if self.key_index() != 0 {
                    write!(f, " {name}={}", self.key_index())?;
                }
            } else if self.has(bit) {
                write!(f, " {name}")?;
            }
        }
        write!(f, ")")
    }
}

/// An EAPOL frame carrying an EAPOL-Key body.
///
/// Binary layout (multi-octet fields big-endian):
///
/// ```text
/// +---------+------+---------+------+------+---------+--------+-------+----+-----+----------+-----+--------+----------+
/// | version | type | bodylen | desc | info | key_len | replay | nonce | iv | rsc | reserved | mic | kd_len | key data |
/// |   (1)   | (1)  |   (2)   | (1)  | (2)  |   (2)   |  (8)   | (32)  |(16)| (8) |   (8)    | (M) |  (2)   |   (N)    |
/// +---------+------+---------+------+------+---------+--------+-------+----+-----+----------+-----+--------+----------+
/// ```
///
/// M depends on the negotiated AKM and is supplied by the caller on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EapolKeyFrame {
    pub version: u8,
    pub descriptor: u8,
    pub key_info: KeyInfo,
    pub key_len: u16,
    pub replay_counter: u64,
    pub nonce: Nonce,
    pub iv: [u8; 16],
    pub rsc: [u8; 8],
    pub reserved: [u8; 8],
    pub mic: Vec<u8>,
    pub key_data: Bytes,
}

impl EapolKeyFrame {
    /// A zeroed frame with the given descriptor, ready for the caller to fill.
    pub fn new(version: u8, descriptor: u8, key_info: KeyInfo, mic_len: usize) -> Self {
        Self {
            version,
            descriptor,
            key_info,
            key_len: 0,
            replay_counter: 0,
            nonce: [0u8; NONCE_LEN],
            iv: [0u8; 16],
            rsc: [0u8; 8],
            reserved: [0u8; 8],
            mic: vec![0u8; mic_len],
            key_data: Bytes::new(),
        }
    }

    pub fn body_len(&self) -> usize {
        KEY_BODY_FIXED_LEN + self.mic.len() + self.key_data.len()
    }

    pub fn encoded_len(&self) -> usize {
        EAPOL_HDR_LEN + self.body_len()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf, false);
        buf.freeze()
    }

    /// Encode with the MIC field replaced by zeros (the MIC input).
    pub fn encode_mic_zeroed(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf, true);
        buf.freeze()
    }

    fn encode_into(&self, buf: &mut BytesMut, zero_mic: bool) {
        buf.put_u8(self.version);
        buf.put_u8(PacketType::Key as u8);
        buf.put_u16(self.body_len() as u16);
        buf.put_u8(self.descriptor);
        buf.put_u16(self.key_info.0);
        buf.put_u16(self.key_len);
        buf.put_u64(self.replay_counter);
        buf.put_slice(&self.nonce);
        buf.put_slice(&self.iv);
        buf.put_slice(&self.rsc);
        buf.put_slice(&self.reserved);
        if zero_mic {
            buf.put_bytes(0, self.mic.len());
        } else {
            buf.put_slice(&self.mic);
        }
        buf.put_u16(self.key_data.len() as u16);
        buf.put_slice(&self.key_data);
    }

    /// Octets preceding the key data field; the AEAD associated data for
    /// FILS frames.
    pub fn aad(&self) -> Bytes {
        let full = self.encode_mic_zeroed();
        full.slice(..full.len() - self.key_data.len())
    }

    /// Decode an EAPOL-Key frame. Octets beyond the EAPOL body length
    /// (link-layer padding) are ignored.
    pub fn decode(data: &[u8], mic_len: usize) -> Result<Self> {
        ensure_len(data, EAPOL_HDR_LEN)?;
        let version = data[0];
        if data[1] != PacketType::Key as u8 {
            return Err(RsnKeyError::NotKeyFrame(data[1]));
        }
        let body_len = (&data[2..4]).get_u16() as usize;
        let body = &data[EAPOL_HDR_LEN..];
        if body_len > body.len() {
            return Err(RsnKeyError::LengthMismatch {
                what: "EAPOL body",
                declared: body_len,
                available: body.len(),
            });
        }
        let mut body = &body[..body_len];
        ensure_len(body, KEY_BODY_FIXED_LEN + mic_len)?;

        let descriptor = body.get_u8();
        if descriptor != DESC_TYPE_RSN && descriptor != DESC_TYPE_WPA {
            return Err(RsnKeyError::UnknownDescriptor(descriptor));
        }
        let key_info = KeyInfo(body.get_u16());
        let key_len = body.get_u16();
        let replay_counter = body.get_u64();
        let mut nonce = [0u8; NONCE_LEN];
        body.copy_to_slice(&mut nonce);
        let mut iv = [0u8; 16];
        body.copy_to_slice(&mut iv);
        let mut rsc = [0u8; 8];
        body.copy_to_slice(&mut rsc);
        let mut reserved = [0u8; 8];
        body.copy_to_slice(&mut reserved);
        let mut mic = vec![0u8; mic_len];
        body.copy_to_slice(&mut mic);
        let kd_len = body.get_u16() as usize;
        if kd_len > body.remaining() {
            return Err(RsnKeyError::LengthMismatch {
                what: "key data",
                declared: kd_len,
                available: body.remaining(),
            });
        }
        let key_data = Bytes::copy_from_slice(&body[..kd_len]);

        Ok(Self {
            version,
            descriptor,
            key_info,
            key_len,
            replay_counter,
            nonce,
            iv,
            rsc,
            reserved,
            mic,
            key_data,
        })
    }

    /// Compute and store the MIC under `kck`.
    pub fn sign(&mut self, akm: Akm, kck: &[u8]) -> Result<()> {
        let input = self.encode_mic_zeroed();
        let mic = compute_mic(self.key_info.version(), akm, kck, &input, self.mic.len())?;
        if mic.len() != self.mic.len() {
            return Err(RsnKeyError::InvalidKeyLength {
                what: "MIC",
                len: mic.len(),
            });
        }
        self.mic = mic;
        Ok(())
    }

    /// Check the MIC field against `kck`.
    pub fn verify(&self, akm: Akm, kck: &[u8]) -> bool {
        let input = self.encode_mic_zeroed();
        verify_mic(self.key_info.version(), akm, kck, &input, &self.mic)
    }

    /// Recover plaintext key data. AES-SIV for FILS, RC4 for descriptor
    /// version 1, AES key unwrap otherwise.
    pub fn decrypt_key_data(&self, akm: Akm, kek: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if akm.is_fils() {
            let siv = SivKey::new(kek)?;
            return siv.open(&self.aad(), &self.key_data).map(Zeroizing::new);
        }
        if self.key_info.version() == KEY_DESC_VER_HMAC_MD5_RC4 {
            let mut plain = Zeroizing::new(self.key_data.to_vec());
            rc4_skip_xor(&self.iv, kek, &mut plain)?;
            return Ok(plain);
        }
        aes_unwrap(kek, &self.key_data).map(Zeroizing::new)
    }

    /// Protect `plain` as this frame's key data and set the encrypted flag.
    /// AES key wrap input is padded with 0xdd 0x00.. to the wrap granularity.
    pub fn encrypt_key_data(&mut self, akm: Akm, kek: &[u8], plain: &[u8]) -> Result<()> {
        self.key_info = self.key_info.with(KeyInfo::ENCR_KEY_DATA);
        if akm.is_fils() {
            let siv = SivKey::new(kek)?;
            // The AAD covers the key data length field, so size it first.
            self.key_data = Bytes::from(vec![0u8; plain.len() + crate::crypto::aead::SIV_TAG_LEN]);
            let sealed = siv.seal(&self.aad(), plain)?;
            self.key_data = Bytes::from(sealed);
            return Ok(());
        }
        if self.key_info.version() == KEY_DESC_VER_HMAC_MD5_RC4 {
            let mut data = plain.to_vec();
            rc4_skip_xor(&self.iv, kek, &mut data)?;
            self.key_data = Bytes::from(data);
            return Ok(());
        }
        let mut padded = Zeroizing::new(plain.to_vec());
        crate::kde::pad_for_wrap(&mut padded);
        self.key_data = Bytes::from(aes_wrap(kek, &padded)?);
        Ok(())
    }
}

fn ensure_len(data: &[u8], need: usize) -> Result<()> {
    if data.len() < need {
        return Err(RsnKeyError::FrameTooShort {
            need,
            have: data.len(),
        });
    }
    Ok(())
}

/// Peek at the EAPOL packet type without decoding.
pub fn packet_type(data: &[u8]) -> Result<u8> {
    ensure_len(data, EAPOL_HDR_LEN)?;
    Ok(data[1])
}

/// EAPOL-Start, used to fall back to full 802.1X authentication.
pub fn eapol_start(version: u8) -> Bytes {
    let mut buf = BytesMut::with_capacity(EAPOL_HDR_LEN);
    buf.put_u8(version);
    buf.put_u8(PacketType::Start as u8);
    buf.put_u16(0);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EapolKeyFrame {
        let info = KeyInfo(0)
            .with_version(KEY_DESC_VER_HMAC_SHA1_AES)
            .with(KeyInfo::KEY_TYPE)
            .with(KeyInfo::MIC);
        let mut f = EapolKeyFrame::new(EAPOL_VERSION_2004, DESC_TYPE_RSN, info, 16);
        f.replay_counter = 7;
        f.nonce = [0xab; 32];
        f.key_data = Bytes::from_static(&[0x30, 0x02, 0x01, 0x00]);
        f
    }

    #[test]
    fn decode_ignores_trailing_padding() {
        let f = sample();
        let mut wire = f.encode().to_vec();
        wire.extend_from_slice(&[0u8; 10]);
        assert_eq!(EapolKeyFrame::decode(&wire, 16).unwrap(), f);
    }

    #[test]
    fn decode_rejects_oversized_key_data_length() {
        let mut wire = sample().encode().to_vec();
        let kd_len_off = EAPOL_HDR_LEN + KEY_BODY_FIXED_LEN + 16 - 2;
        wire[kd_len_off] = 0x01;
        assert!(matches!(
            EapolKeyFrame::decode(&wire, 16),
            Err(RsnKeyError::LengthMismatch { what: "key data", .. })
        ));
    }

    #[test]
    fn decode_rejects_non_key_packets() {
        assert_eq!(
            EapolKeyFrame::decode(&eapol_start(2), 16),
            Err(RsnKeyError::NotKeyFrame(1))
        );
    }

    #[test]
    fn decode_rejects_unknown_descriptor() {
        let mut wire = sample().encode().to_vec();
        wire[EAPOL_HDR_LEN] = 0xfe - 1;
        assert_eq!(
            EapolKeyFrame::decode(&wire, 16),
            Err(RsnKeyError::UnknownDescriptor(0xfd))
        );
    }

    #[test]
    fn sign_then_verify() {
        let mut f = sample();
        let kck = [0x44u8; 16];
        f.sign(Akm::Psk, &kck).unwrap();
        assert!(f.verify(Akm::Psk, &kck));
        assert!(!f.verify(Akm::Psk, &[0x45u8; 16]));
        f.replay_counter += 1;
        assert!(!f.verify(Akm::Psk, &kck));
    }

    #[test]
    fn key_info_bits() {
        let info = KeyInfo(0x13ca);
        assert_eq!(info.version(), 2);
        assert!(info.is_pairwise());
        assert!(info.has(KeyInfo::INSTALL));
        assert!(info.has(KeyInfo::ACK));
        assert!(info.has(KeyInfo::MIC));
        assert!(info.has(KeyInfo::SECURE));
        assert!(info.has(KeyInfo::ENCR_KEY_DATA));
        assert!(!info.has(KeyInfo::REQUEST));
        assert_eq!(KeyInfo(0).with_key_index(2).key_index(), 2);
    }

    #[test]
    fn key_data_encryption_roundtrips_per_version() {
        let plain = [0xdd, 0x06, 0x00, 0x0f, 0xac, 0x01, 0x01, 0x00];
        for (version, kek_len) in [(1u8, 16usize), (2, 16), (3, 16)] {
            let mut f = sample();
            f.key_info = f.key_info.with_version(version);
            f.iv = [9u8; 16];
            let kek = vec![0x17u8; kek_len];
            f.encrypt_key_data(Akm::Psk, &kek, &plain).unwrap();
            let out = f.decrypt_key_data(Akm::Psk, &kek).unwrap();
            assert_eq!(&out[..plain.len()], &plain[..]);
        }
    }

    #[test]
    fn fils_key_data_is_bound_to_header() {
        let mut f = sample();
        f.key_info = f.key_info.with_version(KEY_DESC_VER_AKM_DEFINED);
        f.mic.clear();
        let kek = [0x21u8; 32];
        f.encrypt_key_data(Akm::FilsSha256, &kek, b"gtk-kde").unwrap();
        assert_eq!(&f.decrypt_key_data(Akm::FilsSha256, &kek).unwrap()[..], b"gtk-kde");
        f.replay_counter += 1;
        assert!(f.decrypt_key_data(Akm::FilsSha256, &kek).is_err());
    }
}
