//! Key-usage limit counter (spec.md §3, §4.4): a 48-bit monotonic per-packet
//! counter with soft/hard thresholds, each crossed exactly once.
//!
//! Grounded in original_source/srtp.c's `srtp_key_limit_t`
//! (`srtp_key_limit_set`/`srtp_key_limit_update`): soft limit defaults to
//! `0xFFFFFFFFFFFF - 0x10000` (hard limit minus 2^16) when unset, hard limit
//! to `2^48 - 1`.

pub(crate) const HARD_LIMIT: u64 = 0x0000_FFFF_FFFF_FFFF;
const DEFAULT_SOFT_MARGIN: u64 = 0x1_0000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LimitEvent {
    Normal,
    SoftLimitCrossed,
    HardLimitCrossed,
}

#[derive(Debug, Clone)]
pub(crate) struct KeyUsageLimit {
    count: u64,
    soft_limit: u64,
    hard_limit: u64,
    soft_fired: bool,
}

impl KeyUsageLimit {
    pub fn new() -> Self {
        KeyUsageLimit {
            count: 0,
            soft_limit: HARD_LIMIT.saturating_sub(DEFAULT_SOFT_MARGIN),
            hard_limit: HARD_LIMIT,
            soft_fired: false,
        }
    }

    /// Advance the counter for one more packet, returning which threshold
    /// (if any) was just crossed. The hard limit is fatal for the packet
    /// that crosses it (spec.md §4.4); the caller must check for
    /// `HardLimitCrossed` and fail the transform before using the stream
    /// further.
    pub fn update(&mut self) -> LimitEvent {
        if self.count >= self.hard_limit {
            return LimitEvent::HardLimitCrossed;
        }
        self.count += 1;
        if !self.soft_fired && self.count >= self.soft_limit {
            self.soft_fired = true;
            return LimitEvent::SoftLimitCrossed;
        }
        LimitEvent::Normal
    }
}

impl Default for KeyUsageLimit {
    fn default() -> Self {
        Self::new()
    }
}
