//! MAC half of the crypto primitive interface (spec.md §4.1): `init(key)`,
//! `start()`, `update(bytes)`, `compute(extra_bytes, out)`,
//! `get_tag_length()`, `get_prefix_length()`, `get_key_length()`.
//!
//! HMAC's incremental API (`start`/`update`/`compute`) collapses naturally
//! into a single stateless `compute(data, extra)` call per packet: we clone
//! the keyed HMAC instance (cheap — it is just two half-finalized SHA1
//! states) rather than carry `start`/`update` as separate trait methods that
//! would force interior mutability for no benefit, since every caller in
//! this crate always does start-update-update-compute in one breath.

use hmac::{Hmac, Mac as HmacMac};
use sha1::Sha1;

use crate::error::{Error, Result};

type HmacSha1 = Hmac<Sha1>;

pub(crate) trait Mac: Send {
    /// Full authentication tag length in bytes (before any truncation the
    /// caller applies via a policy's configured `auth_tag_len`).
    fn tag_length(&self) -> usize;

    /// Non-zero for universal-hash MACs that need a keystream prefix XORed
    /// into their output before use. HMAC-SHA1 is not one; always 0 here.
    fn prefix_length(&self) -> usize {
        0
    }

    fn key_length(&self) -> usize;

    /// HMAC(k_a, data || extra), RFC 3711 §4.2. `extra` is the 4-byte
    /// big-endian ROC for SRTP, or empty for SRTCP (the SRTCP index is
    /// already part of `data` via the trailer).
    fn compute(&self, data: &[u8], extra: &[u8]) -> Vec<u8>;
}

pub(crate) struct HmacSha1Mac {
    key: Vec<u8>,
    signer: HmacSha1,
}

impl HmacSha1Mac {
    pub fn new(key: Vec<u8>) -> Result<Self> {
        let signer = HmacSha1::new_from_slice(&key)
            .map_err(|_| Error::InitFail("invalid HMAC-SHA1 key length"))?;
        Ok(Self { key, signer })
    }
}

impl Mac for HmacSha1Mac {
    fn tag_length(&self) -> usize {
        20
    }

    fn key_length(&self) -> usize {
        self.key.len()
    }

    fn compute(&self, data: &[u8], extra: &[u8]) -> Vec<u8> {
        let mut signer = self.signer.clone();
        signer.update(data);
        if !extra.is_empty() {
            signer.update(extra);
        }
        signer.finalize().into_bytes().to_vec()
    }
}

/// Used when a policy's service flags omit authentication entirely.
pub(crate) struct NullMac;

impl Mac for NullMac {
    fn tag_length(&self) -> usize {
        0
    }

    fn key_length(&self) -> usize {
        0
    }

    fn compute(&self, _data: &[u8], _extra: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}
