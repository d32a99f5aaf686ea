//! Events emitted synchronously from `protect`/`unprotect` (spec.md §6, §9).
//!
//! The original (libsrtp) design uses a process-wide event handler pointer;
//! per spec.md §9's REDESIGN FLAGS this is instead a per-[`crate::session::Session`]
//! setting, which composes better with multiple independent sessions in one
//! process and needs no global mutable state or init/shutdown lifecycle.

/// Reported out-of-band; never fails the packet that triggered them.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    SsrcCollision { ssrc: u32 },
    KeySoftLimit { ssrc: u32 },
    KeyHardLimit { ssrc: u32 },
    PacketIndexLimit { ssrc: u32 },
}

/// Implement to observe events. The default no-op handler is used when a
/// session is created without one. Handlers must not re-enter the session
/// that invoked them (spec.md §5).
pub trait EventHandler: Send {
    fn handle(&mut self, event: Event);
}

pub(crate) struct NoopEventHandler;

impl EventHandler for NoopEventHandler {
    fn handle(&mut self, _event: Event) {}
}
