use super::{Bitmap, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};
use crate::error::{Error, Result};

/// 48-bit extended-index sliding window replay database for RTP, per
/// spec.md §4.2 and §3 ("Replay window (RTP)"). The extended index is
/// `(ROC << 16) | seq`; `estimate_index` picks the ROC value nearest the
/// last-seen index so that sequence-number wraparound is transparent to
/// the caller.
#[derive(Debug, Clone)]
pub(crate) struct RtpReplayWindow {
    highest: u64,
    initialized: bool,
    bitmap: Bitmap,
    window_size: usize,
}

impl RtpReplayWindow {
    pub fn new(window_size: usize) -> Result<Self> {
        let window_size = if window_size == 0 {
            DEFAULT_WINDOW_SIZE
        } else {
            window_size
        };
        if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&window_size) {
            return Err(Error::BadParam("RTP replay window size out of range"));
        }
        Ok(RtpReplayWindow {
            highest: 0,
            initialized: false,
            bitmap: Bitmap::new(window_size),
            window_size,
        })
    }

    /// Choose the ROC' that minimizes |E - H| mod 2^48, and return the
    /// resulting 48-bit extended index along with the signed delta E - H.
    pub fn estimate_index(&self, seq: u16) -> (u64, i64) {
        if !self.initialized {
            return (seq as u64, seq as u64 as i64);
        }

        let roc = (self.highest >> 16) as u32;
        let local_seq = self.highest as u16;

        // Candidates: same ROC, ROC - 1, ROC + 1; pick whichever puts seq
        // closest to local_seq (mod 2^16), matching libsrtp's rdbx_estimate.
        let candidates = [roc.wrapping_sub(1), roc, roc.wrapping_add(1)];
        let mut best_est = ((roc as u64) << 16) | seq as u64;
        let mut best_delta = best_est as i64 - self.highest as i64;

        for &cand_roc in &candidates {
            let est = ((cand_roc as u64) << 16) | seq as u64;
            let delta = est as i64 - self.highest as i64;
            if delta.abs() < best_delta.abs() {
                best_est = est;
                best_delta = delta;
            }
        }
        let _ = local_seq;

        (best_est & 0xFFFF_FFFF_FFFF, best_delta)
    }

    /// Returns `Ok(())` if the packet at `delta` is acceptable, or the
    /// appropriate replay error otherwise. Does not mutate state — callers
    /// must call [`Self::add_index`] only after authentication succeeds (or
    /// unconditionally for outbound).
    pub fn check(&self, delta: i64) -> Result<()> {
        if delta > 0 {
            return Ok(());
        }
        if delta <= -(self.window_size as i64) {
            return Err(Error::ReplayOld);
        }
        let pos = (-delta) as usize;
        if self.initialized && self.bitmap.get(pos) {
            return Err(Error::ReplayFail);
        }
        Ok(())
    }

    pub fn add_index(&mut self, est: u64, delta: i64) {
        if delta > 0 {
            self.bitmap.advance(delta as u64);
            self.highest = est;
        } else {
            self.bitmap.set((-delta) as usize);
        }
        self.initialized = true;
    }

    pub fn highest_index(&self) -> u64 {
        self.highest
    }
}
