//! The policy descriptor and canned-policy constructors of spec.md §6, plus
//! the DTLS-SRTP protection profile table. This is the crate's only
//! "configuration" surface — policy is supplied programmatically by the
//! caller, there is no file/env-based config layer.

use std::cell::RefCell;

use crate::crypto::AlgorithmId;
use crate::ekt::Ekt;
use crate::error::{Error, Result};

/// Which role a policy entry plays when added to a [`crate::session::Session`]
/// (spec.md §4.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SsrcType {
    Specific(u32),
    AnyOutbound,
    AnyInbound,
}

/// Confidentiality/authentication service flags, independently configurable
/// for RTP and RTCP (spec.md §3).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SecurityServices {
    None,
    ConfidentialityOnly,
    AuthenticationOnly,
    ConfidentialityAndAuthentication,
}

impl SecurityServices {
    pub(crate) fn confidentiality(self) -> bool {
        matches!(
            self,
            SecurityServices::ConfidentialityOnly
                | SecurityServices::ConfidentialityAndAuthentication
        )
    }

    pub(crate) fn authentication(self) -> bool {
        matches!(
            self,
            SecurityServices::AuthenticationOnly
                | SecurityServices::ConfidentialityAndAuthentication
        )
    }
}

/// Which MAC a [`CryptoPolicy`] selects. AEAD ciphers carry their own
/// authentication and always pair with `None` here (spec.md §6: "GCM
/// provides auth").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AuthKind {
    HmacSha1,
    Null,
}

/// One direction's (RTP or RTCP's) cipher/MAC selection, per spec.md §6
/// `crypto_policy = {cipher_type_id, cipher_key_len, auth_type_id,
/// auth_key_len, auth_tag_len, sec_serv}`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CryptoPolicy {
    pub cipher: AlgorithmId,
    pub cipher_key_len: usize,
    pub auth: AuthKind,
    pub auth_key_len: usize,
    pub auth_tag_len: usize,
    pub services: SecurityServices,
}

impl CryptoPolicy {
    pub const fn aes_cm_128_hmac_sha1_80() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::AesIcm128,
            cipher_key_len: 30,
            auth: AuthKind::HmacSha1,
            auth_key_len: 20,
            auth_tag_len: 10,
            services: SecurityServices::ConfidentialityAndAuthentication,
        }
    }

    pub const fn aes_cm_128_hmac_sha1_32() -> Self {
        CryptoPolicy {
            auth_tag_len: 4,
            ..Self::aes_cm_128_hmac_sha1_80()
        }
    }

    pub const fn aes_cm_256_hmac_sha1_80() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::AesIcm256,
            cipher_key_len: 46,
            auth: AuthKind::HmacSha1,
            auth_key_len: 20,
            auth_tag_len: 10,
            services: SecurityServices::ConfidentialityAndAuthentication,
        }
    }

    pub const fn aes_cm_256_hmac_sha1_32() -> Self {
        CryptoPolicy {
            auth_tag_len: 4,
            ..Self::aes_cm_256_hmac_sha1_80()
        }
    }

    pub const fn null_cipher_hmac_sha1_80() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::Null,
            cipher_key_len: 16,
            auth: AuthKind::HmacSha1,
            auth_key_len: 20,
            auth_tag_len: 10,
            services: SecurityServices::AuthenticationOnly,
        }
    }

    pub const fn aes_cm_128_null_auth() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::AesIcm128,
            cipher_key_len: 30,
            auth: AuthKind::Null,
            auth_key_len: 0,
            auth_tag_len: 0,
            services: SecurityServices::ConfidentialityOnly,
        }
    }

    pub const fn aes_cm_256_null_auth() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::AesIcm256,
            cipher_key_len: 46,
            auth: AuthKind::Null,
            auth_key_len: 0,
            auth_tag_len: 0,
            services: SecurityServices::ConfidentialityOnly,
        }
    }

    pub const fn aes_gcm_128_16_auth() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::AesGcm128,
            cipher_key_len: 16 + 12,
            auth: AuthKind::Null,
            auth_key_len: 0,
            auth_tag_len: 16,
            services: SecurityServices::ConfidentialityAndAuthentication,
        }
    }

    pub const fn aes_gcm_128_8_auth() -> Self {
        CryptoPolicy {
            auth_tag_len: 8,
            ..Self::aes_gcm_128_16_auth()
        }
    }

    pub const fn aes_gcm_256_16_auth() -> Self {
        CryptoPolicy {
            cipher: AlgorithmId::AesGcm256,
            cipher_key_len: 32 + 12,
            auth: AuthKind::Null,
            auth_key_len: 0,
            auth_tag_len: 16,
            services: SecurityServices::ConfidentialityAndAuthentication,
        }
    }

    pub const fn aes_gcm_256_8_auth() -> Self {
        CryptoPolicy {
            auth_tag_len: 8,
            ..Self::aes_gcm_256_16_auth()
        }
    }

    /// `_only_auth` variant: GCM itself already authenticates; this marks
    /// the stream as authentication-only at the policy level without
    /// changing what GCM actually does on the wire.
    pub const fn aes_gcm_128_16_only_auth() -> Self {
        CryptoPolicy {
            services: SecurityServices::AuthenticationOnly,
            ..Self::aes_gcm_128_16_auth()
        }
    }

    pub(crate) fn is_aead(&self) -> bool {
        matches!(self.cipher, AlgorithmId::AesGcm128 | AlgorithmId::AesGcm256)
    }

    /// Master salt length implied by the cipher family: AEAD uses a 12-byte
    /// wire salt (spec.md §4.3), the legacy CTR family a 14-byte salt
    /// (spec.md §6: "master-salt length = 14").
    pub(crate) fn master_salt_len(&self) -> usize {
        if self.is_aead() {
            12
        } else {
            14
        }
    }

    /// "base_len" of spec.md §4.3: cipher key length minus salt for
    /// AES-ICM, a fixed 16/32 for GCM, and the key length as-is for NULL.
    pub(crate) fn master_key_len(&self) -> usize {
        match self.cipher {
            AlgorithmId::AesIcm128 | AlgorithmId::AesIcm192 | AlgorithmId::AesIcm256 => {
                self.cipher_key_len - self.master_salt_len()
            }
            AlgorithmId::AesGcm128 => 16,
            AlgorithmId::AesGcm256 => 32,
            AlgorithmId::Null => self.cipher_key_len,
        }
    }
}

/// Policy descriptor for one SSRC (or wildcard) passed to
/// [`crate::session::Session::add_stream`] (spec.md §6).
pub struct StreamPolicy {
    pub ssrc: SsrcType,
    pub rtp: CryptoPolicy,
    pub rtcp: CryptoPolicy,
    pub master_key: Vec<u8>,
    pub master_salt: Vec<u8>,
    /// 0 means "use the default window size" (spec.md §4.2).
    pub window_size: usize,
    /// Only `0` or `1` are valid (spec.md §9 Open Question — the source
    /// guards this against uninitialized memory; we preserve the
    /// validation even though Rust's `bool` cannot itself be malformed, in
    /// case this policy is built from an untrusted wire/FFI representation
    /// upstream of this type).
    pub allow_repeat_tx: bool,
    /// EKT handle to install on the stream at construction time (spec.md
    /// §6 `policy.ekt`; `init(policy)` "initialize EKT if present"). Taken
    /// out of the `RefCell` by `Stream::new`, so a policy only ever installs
    /// its EKT handle once, even when passed by shared reference; attach or
    /// replace one on an already-added stream with
    /// [`crate::session::Session::set_ekt`] instead.
    pub ekt: RefCell<Option<Box<dyn Ekt>>>,
}

impl Clone for StreamPolicy {
    /// EKT handles are not cloned — `ekt` is construction-time-only state
    /// (see the field's doc comment), so a clone always starts empty.
    fn clone(&self) -> Self {
        StreamPolicy {
            ssrc: self.ssrc,
            rtp: self.rtp,
            rtcp: self.rtcp,
            master_key: self.master_key.clone(),
            master_salt: self.master_salt.clone(),
            window_size: self.window_size,
            allow_repeat_tx: self.allow_repeat_tx,
            ekt: RefCell::new(None),
        }
    }
}

impl StreamPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.master_key.len() != self.rtp.master_key_len()
            || self.master_key.len() != self.rtcp.master_key_len()
        {
            return Err(Error::BadParam(
                "master key length does not match crypto policy",
            ));
        }
        if self.master_salt.len() != self.rtp.master_salt_len()
            || self.master_salt.len() != self.rtcp.master_salt_len()
        {
            return Err(Error::BadParam(
                "master salt length does not match crypto policy",
            ));
        }
        Ok(())
    }
}

/// DTLS-SRTP protection profiles (RFC 5764), mapped to the canned policies
/// above. `null_sha1_32` has no assigned IANA profile and is unsupported.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DtlsSrtpProtectionProfile {
    Aes128CmSha1_80,
    Aes128CmSha1_32,
    NullSha1_80,
    Aes256CmSha1_80,
    Aes256CmSha1_32,
}

impl DtlsSrtpProtectionProfile {
    /// RTP-side crypto policy for this profile.
    pub fn rtp_crypto_policy(&self) -> CryptoPolicy {
        match self {
            DtlsSrtpProtectionProfile::Aes128CmSha1_80 => CryptoPolicy::aes_cm_128_hmac_sha1_80(),
            DtlsSrtpProtectionProfile::Aes128CmSha1_32 => CryptoPolicy::aes_cm_128_hmac_sha1_32(),
            DtlsSrtpProtectionProfile::NullSha1_80 => CryptoPolicy::null_cipher_hmac_sha1_80(),
            DtlsSrtpProtectionProfile::Aes256CmSha1_80 => CryptoPolicy::aes_cm_256_hmac_sha1_80(),
            DtlsSrtpProtectionProfile::Aes256CmSha1_32 => CryptoPolicy::aes_cm_256_hmac_sha1_32(),
        }
    }

    /// RTCP-side crypto policy. RFC 3711 compliance requires RTCP to always
    /// use a full-length (80-bit) auth tag, so any `sha1_32` profile is
    /// coerced back to `sha1_80` on the RTCP side (spec.md §6).
    pub fn rtcp_crypto_policy(&self) -> CryptoPolicy {
        match self {
            DtlsSrtpProtectionProfile::Aes128CmSha1_80
            | DtlsSrtpProtectionProfile::Aes128CmSha1_32 => CryptoPolicy::aes_cm_128_hmac_sha1_80(),
            DtlsSrtpProtectionProfile::NullSha1_80 => CryptoPolicy::null_cipher_hmac_sha1_80(),
            DtlsSrtpProtectionProfile::Aes256CmSha1_80
            | DtlsSrtpProtectionProfile::Aes256CmSha1_32 => {
                CryptoPolicy::aes_cm_256_hmac_sha1_80()
            }
        }
    }

    pub fn master_key_len(&self) -> usize {
        match self {
            DtlsSrtpProtectionProfile::Aes256CmSha1_80
            | DtlsSrtpProtectionProfile::Aes256CmSha1_32 => 32,
            _ => 16,
        }
    }

    pub const fn master_salt_len(&self) -> usize {
        14
    }
}

#[cfg(test)]
mod policy_test {
    use super::*;

    #[test]
    fn test_canned_policy_lengths() {
        let p = CryptoPolicy::aes_cm_128_hmac_sha1_80();
        assert_eq!(p.master_key_len(), 16);
        assert_eq!(p.master_salt_len(), 14);
        assert_eq!(p.auth_key_len, 20);

        let g = CryptoPolicy::aes_gcm_128_16_auth();
        assert_eq!(g.master_key_len(), 16);
        assert_eq!(g.master_salt_len(), 12);
    }

    #[test]
    fn test_rtcp_sha1_32_coerced_to_80() {
        let profile = DtlsSrtpProtectionProfile::Aes128CmSha1_32;
        assert_eq!(profile.rtp_crypto_policy().auth_tag_len, 4);
        assert_eq!(profile.rtcp_crypto_policy().auth_tag_len, 10);
    }

    #[test]
    fn test_validate_rejects_wrong_key_length() {
        let policy = StreamPolicy {
            ssrc: SsrcType::Specific(1),
            rtp: CryptoPolicy::aes_cm_128_hmac_sha1_80(),
            rtcp: CryptoPolicy::aes_cm_128_hmac_sha1_80(),
            master_key: vec![0u8; 8],
            master_salt: vec![0u8; 14],
            window_size: 0,
            allow_repeat_tx: false,
            ekt: RefCell::new(None),
        };
        assert!(policy.validate().is_err());
    }
}
