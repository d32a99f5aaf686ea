//! The crypto primitive interface: opaque cipher and MAC objects, identified
//! by algorithm id, that the stream/pipeline layers drive without knowing
//! their internals (RFC 3711 §4.1, RFC 7714 §8-9).
//!
//! Ciphers and MACs here are stateless per call: all per-packet state (IV,
//! AAD, replay index) is threaded through the call rather than held across
//! calls, since a stream may interleave encrypt/decrypt of many SSRCs'
//! packets. The mode (AEAD vs legacy CTR+HMAC) is resolved once, at stream
//! construction, into the [`Cipher`] variant rather than re-checked on every
//! packet.

pub(crate) mod mac;

use aes_gcm::aead::consts::{U12, U8};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit as AeadKeyInit};
use aes_gcm::{AesGcm, Aes128Gcm, Aes256Gcm};
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::error::{Error, Result};

pub(crate) use mac::{HmacSha1Mac, Mac, NullMac};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;
type Aes192Ctr = ctr::Ctr128BE<aes::Aes192>;
type Aes256Ctr = ctr::Ctr128BE<aes::Aes256>;

// RFC 3711 compliance requires a full 16-byte GCM tag; the crate also
// accepts the truncated-tag canned policies (spec.md §6's `_8_auth`
// variants) via the `aes-gcm` crate's generic tag-size parameter, which
// computes/verifies only the configured number of leftmost tag bits
// rather than truncating after the fact (NIST SP 800-38D §5.2.1.2).
type Aes128Gcm8 = AesGcm<aes::Aes128, U12, U8>;
type Aes256Gcm8 = AesGcm<aes::Aes256, U12, U8>;

/// Algorithm identifiers from spec.md §4.1: `{NULL, AES-ICM-128, AES-ICM-192,
/// AES-ICM-256, AES-GCM-128, AES-GCM-256}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AlgorithmId {
    Null,
    AesIcm128,
    AesIcm192,
    AesIcm256,
    AesGcm128,
    AesGcm256,
}

/// A session cipher, keyed and bound to its algorithm at construction.
///
/// AES-ICM (CTR) keys are held as raw bytes and re-keyed with a fresh IV on
/// every call — RFC 3711's counter mode has no persistent stream state
/// across packets, each packet's keystream starts at counter value `IV`.
/// AES-GCM instances are reused across calls (the `aead` crate takes the
/// nonce per call, not at construction).
pub(crate) enum Cipher {
    Null,
    AesIcm(Vec<u8>),
    AesGcm128(Box<Aes128Gcm>),
    AesGcm128Tag8(Box<Aes128Gcm8>),
    AesGcm256(Box<Aes256Gcm>),
    AesGcm256Tag8(Box<Aes256Gcm8>),
}

impl Cipher {
    pub fn new_aes_icm(session_key: Vec<u8>) -> Result<Self> {
        match session_key.len() {
            16 | 24 | 32 => Ok(Cipher::AesIcm(session_key)),
            _ => Err(Error::InitFail("AES-ICM key must be 16, 24 or 32 bytes")),
        }
    }

    /// `tag_len` must be 16 (the RFC 7714 default) or 8 (spec.md §6's
    /// `_8_auth` canned policies).
    pub fn new_aes_gcm(session_key: &[u8], tag_len: usize) -> Result<Self> {
        match (session_key.len(), tag_len) {
            (16, 16) => Ok(Cipher::AesGcm128(Box::new(Aes128Gcm::new(
                GenericArray::from_slice(session_key),
            )))),
            (16, 8) => Ok(Cipher::AesGcm128Tag8(Box::new(Aes128Gcm8::new(
                GenericArray::from_slice(session_key),
            )))),
            (32, 16) => Ok(Cipher::AesGcm256(Box::new(Aes256Gcm::new(
                GenericArray::from_slice(session_key),
            )))),
            (32, 8) => Ok(Cipher::AesGcm256Tag8(Box::new(Aes256Gcm8::new(
                GenericArray::from_slice(session_key),
            )))),
            (16 | 32, _) => Err(Error::InitFail("AES-GCM tag length must be 8 or 16 bytes")),
            _ => Err(Error::InitFail("AES-GCM key must be 16 or 32 bytes")),
        }
    }

    pub fn algorithm(&self) -> AlgorithmId {
        match self {
            Cipher::Null => AlgorithmId::Null,
            Cipher::AesIcm(k) => match k.len() {
                16 => AlgorithmId::AesIcm128,
                24 => AlgorithmId::AesIcm192,
                _ => AlgorithmId::AesIcm256,
            },
            Cipher::AesGcm128(_) | Cipher::AesGcm128Tag8(_) => AlgorithmId::AesGcm128,
            Cipher::AesGcm256(_) | Cipher::AesGcm256Tag8(_) => AlgorithmId::AesGcm256,
        }
    }

    pub fn is_aead(&self) -> bool {
        matches!(
            self,
            Cipher::AesGcm128(_) | Cipher::AesGcm128Tag8(_) | Cipher::AesGcm256(_) | Cipher::AesGcm256Tag8(_)
        )
    }

    /// XOR `buf` in place with the keystream generated from `iv`, starting at
    /// counter 0. A no-op for the NULL cipher. Used both for the RTP/RTCP
    /// payload and, when a MAC needs it, for a keystream prefix.
    pub fn apply_keystream(&self, iv: &[u8; 16], buf: &mut [u8]) -> Result<()> {
        match self {
            Cipher::Null => Ok(()),
            Cipher::AesIcm(key) => {
                match key.len() {
                    16 => Aes128Ctr::new(GenericArray::from_slice(key), iv.into())
                        .apply_keystream(buf),
                    24 => Aes192Ctr::new(GenericArray::from_slice(key), iv.into())
                        .apply_keystream(buf),
                    _ => Aes256Ctr::new(GenericArray::from_slice(key), iv.into())
                        .apply_keystream(buf),
                }
                Ok(())
            }
            _ => Err(Error::CipherFail(
                "apply_keystream called on an AEAD cipher".into(),
            )),
        }
    }

    /// AEAD seal: encrypts `buf` in place and appends the authentication tag.
    pub fn seal_in_place(&self, iv: &[u8; 12], aad: &[u8], buf: &mut Vec<u8>) -> Result<()> {
        let nonce = GenericArray::from_slice(iv);
        match self {
            Cipher::AesGcm128(c) => c.encrypt_in_place(nonce, aad, buf)?,
            Cipher::AesGcm128Tag8(c) => c.encrypt_in_place(nonce, aad, buf)?,
            Cipher::AesGcm256(c) => c.encrypt_in_place(nonce, aad, buf)?,
            Cipher::AesGcm256Tag8(c) => c.encrypt_in_place(nonce, aad, buf)?,
            _ => return Err(Error::CipherFail("seal_in_place on a non-AEAD cipher".into())),
        }
        Ok(())
    }

    /// AEAD open: verifies and strips the trailing tag from `buf`, decrypting
    /// the remainder in place. Fails closed (`AuthFail`) on any mismatch.
    pub fn open_in_place(&self, iv: &[u8; 12], aad: &[u8], buf: &mut Vec<u8>) -> Result<()> {
        let nonce = GenericArray::from_slice(iv);
        let result = match self {
            Cipher::AesGcm128(c) => c.decrypt_in_place(nonce, aad, buf),
            Cipher::AesGcm128Tag8(c) => c.decrypt_in_place(nonce, aad, buf),
            Cipher::AesGcm256(c) => c.decrypt_in_place(nonce, aad, buf),
            Cipher::AesGcm256Tag8(c) => c.decrypt_in_place(nonce, aad, buf),
            _ => return Err(Error::CipherFail("open_in_place on a non-AEAD cipher".into())),
        };
        result.map_err(|_| Error::AuthFail)
    }

    pub fn aead_tag_len(&self) -> usize {
        match self {
            Cipher::AesGcm128Tag8(_) | Cipher::AesGcm256Tag8(_) => 8,
            _ => 16,
        }
    }
}
