//! Encrypted Key Transport (spec.md §1, glossary "EKT") is an external
//! collaborator: its wire format and key-wrapping internals are out of
//! scope here. A [`Stream`](crate::stream::Stream) may hold an optional
//! handle implementing this trait; the SRTCP pipeline calls it (spec.md
//! §4.6, "Run EKT hook over auth_tag area") but never interprets its
//! output.

/// Hook invoked by the SRTCP pipeline around the trailer/auth-tag area.
/// A real EKT implementation lives outside this crate and is injected via
/// [`crate::session::Session::set_ekt`].
pub trait Ekt: Send {
    /// Called before computing the SRTCP auth tag on protect. May append
    /// EKT-specific bytes into the base-tag region; returning the number of
    /// bytes appended.
    fn on_protect(&mut self, _packet: &mut Vec<u8>) -> usize {
        0
    }

    /// Called before verifying the SRTCP auth tag on unprotect, so the EKT
    /// field can be stripped before MAC verification. Returns the number of
    /// trailing bytes to remove first.
    fn on_unprotect(&mut self, _packet: &[u8]) -> usize {
        0
    }
}
