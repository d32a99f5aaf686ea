//! Per-SSRC stream context (spec.md §4.4).
//!
//! Grounded in original_source/srtp.c's `srtp_stream_ctx_t` and
//! `srtp_stream_init_keys`/`srtp_stream_clone`, expressed over the
//! teacher's `Rc`/`RefCell` idiom for the clone-on-authenticate sharing
//! (spec.md §5: no internal locking, single-threaded per session, so `Rc`
//! over `Arc` and `RefCell` over `Mutex` are the right fit — nothing here
//! is required to be `Send`).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::crypto::{Cipher, HmacSha1Mac, Mac, NullMac};
use crate::ekt::Ekt;
use crate::error::Result;
use crate::key_derivation::{self, Label};
use crate::policy::{AuthKind, CryptoPolicy, SecurityServices, StreamPolicy};
use crate::replay::{RtcpReplayWindow, RtpReplayWindow};
use crate::usage_limit::{KeyUsageLimit, LimitEvent};

/// A stream's inferred traffic direction (spec.md §3/§4.6). Monotone once
/// set: a later operation implying the other direction is reported to the
/// caller as a collision, never failed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Unknown,
    Sender,
    Receiver,
}

/// The cipher, MAC and derived salt for one direction (RTP or RTCP) of a
/// stream, produced by [`derive_direction_keys`].
struct DirectionKeys {
    cipher: Rc<Cipher>,
    mac: Rc<dyn Mac>,
    salt: Vec<u8>,
    auth_tag_len: usize,
}

/// RFC 3711 §4.3 key installation for one direction: derive the cipher key,
/// session salt and MAC key from the master key/salt and install them into
/// fresh cipher/MAC objects.
fn derive_direction_keys(
    policy: &CryptoPolicy,
    master_key: &[u8],
    master_salt: &[u8],
    enc_label: Label,
    auth_label: Label,
    salt_label: Label,
) -> Result<DirectionKeys> {
    let salt = key_derivation::derive(master_key, master_salt, salt_label, policy.master_salt_len())?;

    let cipher = if policy.is_aead() {
        let key = key_derivation::derive(master_key, master_salt, enc_label, policy.master_key_len())?;
        Cipher::new_aes_gcm(&key, policy.auth_tag_len)?
    } else if matches!(policy.cipher, crate::crypto::AlgorithmId::Null) {
        Cipher::Null
    } else {
        let key = key_derivation::derive(master_key, master_salt, enc_label, policy.master_key_len())?;
        Cipher::new_aes_icm(key)?
    };

    let mac: Rc<dyn Mac> = match policy.auth {
        AuthKind::HmacSha1 => {
            let key = key_derivation::derive(master_key, master_salt, auth_label, policy.auth_key_len)?;
            Rc::new(HmacSha1Mac::new(key)?)
        }
        AuthKind::Null => Rc::new(NullMac),
    };

    Ok(DirectionKeys {
        cipher: Rc::new(cipher),
        mac,
        salt,
        auth_tag_len: policy.auth_tag_len,
    })
}

/// A stream holds, or shares with its template, everything needed to
/// protect/unprotect packets for one SSRC. The five objects shared on
/// clone are the RTP/RTCP ciphers, the RTP/RTCP MACs and the usage-limit
/// counter (spec.md §3's "five pointer-owned crypto objects"); replay
/// state is always fresh per stream, and salts are plain data copied by
/// value (identical content, independently owned — see DESIGN.md).
pub struct Stream {
    pub(crate) ssrc: u32,
    pub(crate) direction: Cell<Direction>,
    pub(crate) rtp_services: SecurityServices,
    pub(crate) rtcp_services: SecurityServices,
    pub(crate) allow_repeat_tx: bool,

    pub(crate) rtp_cipher: Rc<Cipher>,
    pub(crate) rtp_mac: Rc<dyn Mac>,
    pub(crate) rtp_auth_tag_len: usize,
    pub(crate) rtp_session_salt: Vec<u8>,
    pub(crate) rtp_replay: RefCell<RtpReplayWindow>,

    pub(crate) rtcp_cipher: Rc<Cipher>,
    pub(crate) rtcp_mac: Rc<dyn Mac>,
    pub(crate) rtcp_auth_tag_len: usize,
    pub(crate) rtcp_session_salt: Vec<u8>,
    pub(crate) rtcp_replay: RefCell<RtcpReplayWindow>,

    pub(crate) limit: Rc<RefCell<KeyUsageLimit>>,
    pub(crate) ekt: Option<Box<dyn Ekt>>,
    pub(crate) window_size: usize,
}

impl Stream {
    /// `alloc` + `init` collapsed into one constructor (spec.md §4.4):
    /// derives both directions' keys from `policy.master_key`/`master_salt`,
    /// sets up fresh replay state and usage-limit counter, and installs
    /// `policy.ekt` if present.
    pub(crate) fn new(policy: &StreamPolicy, ssrc: u32, direction: Direction) -> Result<Self> {
        policy.validate()?;

        let window_size = if policy.window_size == 0 {
            crate::replay::DEFAULT_WINDOW_SIZE
        } else {
            policy.window_size
        };

        let rtp = derive_direction_keys(
            &policy.rtp,
            &policy.master_key,
            &policy.master_salt,
            Label::RtpEncryption,
            Label::RtpAuthentication,
            Label::RtpSalt,
        )?;
        let rtcp = derive_direction_keys(
            &policy.rtcp,
            &policy.master_key,
            &policy.master_salt,
            Label::RtcpEncryption,
            Label::RtcpAuthentication,
            Label::RtcpSalt,
        )?;

        Ok(Stream {
            ssrc,
            direction: Cell::new(direction),
            rtp_services: policy.rtp.services,
            rtcp_services: policy.rtcp.services,
            allow_repeat_tx: policy.allow_repeat_tx,
            rtp_cipher: rtp.cipher,
            rtp_mac: rtp.mac,
            rtp_auth_tag_len: rtp.auth_tag_len,
            rtp_session_salt: rtp.salt,
            rtp_replay: RefCell::new(RtpReplayWindow::new(window_size)?),
            rtcp_cipher: rtcp.cipher,
            rtcp_mac: rtcp.mac,
            rtcp_auth_tag_len: rtcp.auth_tag_len,
            rtcp_session_salt: rtcp.salt,
            rtcp_replay: RefCell::new(RtcpReplayWindow::new(window_size)?),
            limit: Rc::new(RefCell::new(KeyUsageLimit::new())),
            ekt: policy.ekt.borrow_mut().take(),
            window_size,
        })
    }

    /// Clones `self` (the template) for a newly-observed `ssrc`: shares the
    /// ciphers, MACs and usage-limit counter, but gets fresh replay state
    /// (spec.md §4.4 `clone`). Direction starts `Unknown` — the caller sets
    /// it to match whichever operation (protect or unprotect) triggered the
    /// clone.
    pub(crate) fn clone_for_ssrc(&self, ssrc: u32) -> Result<Self> {
        Ok(Stream {
            ssrc,
            direction: Cell::new(Direction::Unknown),
            rtp_services: self.rtp_services,
            rtcp_services: self.rtcp_services,
            allow_repeat_tx: self.allow_repeat_tx,
            rtp_cipher: Rc::clone(&self.rtp_cipher),
            rtp_mac: Rc::clone(&self.rtp_mac),
            rtp_auth_tag_len: self.rtp_auth_tag_len,
            rtp_session_salt: self.rtp_session_salt.clone(),
            rtp_replay: RefCell::new(RtpReplayWindow::new(self.window_size)?),
            rtcp_cipher: Rc::clone(&self.rtcp_cipher),
            rtcp_mac: Rc::clone(&self.rtcp_mac),
            rtcp_auth_tag_len: self.rtcp_auth_tag_len,
            rtcp_session_salt: self.rtcp_session_salt.clone(),
            rtcp_replay: RefCell::new(RtcpReplayWindow::new(self.window_size)?),
            limit: Rc::clone(&self.limit),
            ekt: None,
            window_size: self.window_size,
        })
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn direction(&self) -> Direction {
        self.direction.get()
    }

    /// Sets direction on first use; reports a collision (without failing
    /// the packet) if a later call implies the opposite direction, per
    /// spec.md §4.6's state machine.
    pub(crate) fn observe_direction(&self, implied: Direction) -> bool {
        match self.direction.get() {
            Direction::Unknown => {
                self.direction.set(implied);
                false
            }
            current if current == implied => false,
            _ => true,
        }
    }

    /// Advances the shared usage-limit counter, returning whether the soft
    /// or hard threshold was just crossed (spec.md §4.4).
    pub(crate) fn update_usage_limit(&self) -> LimitEvent {
        self.limit.borrow_mut().update()
    }
}
