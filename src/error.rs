use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced at the protect/unprotect boundary.
///
/// These map one-for-one onto the error codes a caller must distinguish:
/// `bad_param, alloc_fail, init_fail, cipher_fail, auth_fail, replay_fail,
/// replay_old, key_expired, parse_err, no_ctx, cant_check`. The packet
/// buffer is undefined on any of these after the call returns.
#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("bad parameter: {0}")]
    BadParam(&'static str),

    #[error("allocation failed: {0}")]
    AllocFail(&'static str),

    #[error("key/context initialization failed: {0}")]
    InitFail(&'static str),

    #[error("cipher operation failed: {0}")]
    CipherFail(String),

    #[error("failed to verify auth tag")]
    AuthFail,

    #[error("replayed packet rejected")]
    ReplayFail,

    #[error("packet index too old for the replay window")]
    ReplayOld,

    #[error("key usage limit exceeded, stream must be rekeyed")]
    KeyExpired,

    #[error("failed to parse packet: {0}")]
    ParseErr(String),

    #[error("no stream context for this SSRC and no template to clone")]
    NoCtx,

    #[error("cannot check SRTCP packet: E-bit disagrees with configured policy")]
    CantCheck,

    #[error("SRTCP index space exhausted")]
    IndexLimit,

    #[error("aes gcm: {0}")]
    AesGcm(#[from] aes_gcm::Error),
}
