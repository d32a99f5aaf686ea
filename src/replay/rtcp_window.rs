use super::{Bitmap, DEFAULT_WINDOW_SIZE, MAX_WINDOW_SIZE, MIN_WINDOW_SIZE};
use crate::error::{Error, Result};

pub(crate) const MAX_SRTCP_INDEX: u32 = (1 << 31) - 1;

/// Sender-side 31-bit monotonic SRTCP index counter, plus receiver-side
/// bitmap-window replay check over that same 31-bit field (spec.md §4.2,
/// "Replay counter (RTCP)"). A single stream uses the sender half if its
/// direction is outbound and the receiver half if inbound; both halves
/// exist on every stream since direction may only be inferred later.
#[derive(Debug, Clone)]
pub(crate) struct RtcpReplayWindow {
    next_index: u32,
    highest: u32,
    initialized: bool,
    bitmap: Bitmap,
    window_size: usize,
}

impl RtcpReplayWindow {
    pub fn new(window_size: usize) -> Result<Self> {
        let window_size = if window_size == 0 {
            DEFAULT_WINDOW_SIZE
        } else {
            window_size
        };
        if !(MIN_WINDOW_SIZE..=MAX_WINDOW_SIZE).contains(&window_size) {
            return Err(Error::BadParam("RTCP replay window size out of range"));
        }
        Ok(RtcpReplayWindow {
            next_index: 0,
            highest: 0,
            initialized: false,
            bitmap: Bitmap::new(window_size),
            window_size,
        })
    }

    /// Sender side: advance the 31-bit index, failing once it would wrap.
    pub fn increment(&mut self) -> Result<u32> {
        if self.next_index > MAX_SRTCP_INDEX {
            return Err(Error::IndexLimit);
        }
        let idx = self.next_index;
        self.next_index += 1;
        Ok(idx)
    }

    /// Receiver side: check `idx` against the window without recording it.
    pub fn check(&self, idx: u32) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let delta = idx as i64 - self.highest as i64;
        if delta > 0 {
            return Ok(());
        }
        if delta <= -(self.window_size as i64) {
            return Err(Error::ReplayOld);
        }
        if self.bitmap.get((-delta) as usize) {
            return Err(Error::ReplayFail);
        }
        Ok(())
    }

    /// Test-only hook to reach the 2^31 - 1 boundary without looping that
    /// many times (spec.md §8 scenario 6).
    #[cfg(test)]
    pub(crate) fn set_next_index_for_test(&mut self, idx: u32) {
        self.next_index = idx;
    }

    /// Receiver side: record `idx` as seen, after authentication succeeds.
    pub fn add_index(&mut self, idx: u32) {
        let delta = idx as i64 - self.highest as i64;
        if delta > 0 {
            self.bitmap.advance(delta as u64);
            self.highest = idx;
        } else {
            self.bitmap.set((-delta) as usize);
        }
        self.initialized = true;
    }
}
