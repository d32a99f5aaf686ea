//! End-to-end tests driving the public `Session` API, covering the RFC 3711
//! testable properties of spec.md §8 that span more than one module: replay
//! ordering and sequence-number rollover. Per-module vectors (KDF
//! determinism, bitmap shape) live next to the code that implements them.

use srtp::policy::{CryptoPolicy, SsrcType, StreamPolicy};
use srtp::session::Session;

const SSRC: u32 = 0xCAFE_BABE;

fn policy() -> StreamPolicy {
    StreamPolicy {
        ssrc: SsrcType::Specific(SSRC),
        rtp: CryptoPolicy::aes_cm_128_hmac_sha1_80(),
        rtcp: CryptoPolicy::aes_cm_128_hmac_sha1_80(),
        master_key: vec![0u8; 16],
        master_salt: vec![0u8; 14],
        window_size: 0,
        allow_repeat_tx: false,
        ekt: std::cell::RefCell::new(None),
    }
}

fn rtp_packet(seq: u16) -> Vec<u8> {
    let mut buf = vec![0x80, 0x60, (seq >> 8) as u8, seq as u8, 0, 0, 0, 1];
    buf.extend_from_slice(&SSRC.to_be_bytes());
    buf.extend_from_slice(b"some constant payload..");
    buf
}

/// spec.md §8 scenario 2: protect seq 0..3, feed 1,3,2,0 into unprotect (all
/// succeed out of order within the window), then replaying 2 fails.
#[test]
fn out_of_order_delivery_then_replay_rejected() {
    let mut tx = Session::create(&[policy()]).unwrap();
    let mut rx = Session::create(&[policy()]).unwrap();

    let protected: Vec<Vec<u8>> = (0..4u16)
        .map(|seq| {
            let mut pkt = rtp_packet(seq);
            tx.protect_rtp(&mut pkt).unwrap();
            pkt
        })
        .collect();

    for &seq in &[1usize, 3, 2, 0] {
        let mut pkt = protected[seq].clone();
        rx.unprotect_rtp(&mut pkt).expect("in-window delivery must succeed");
    }

    let mut replay = protected[2].clone();
    assert_eq!(
        rx.unprotect_rtp(&mut replay),
        Err(srtp::error::Error::ReplayFail)
    );
}

/// spec.md §8: "protecting 2^16 + k packets then unprotecting them out of
/// order within the window succeeds; outside the window fails with
/// replay_fail (old)." Exercises the ROC rollover through the 16-bit
/// sequence-number wraparound, delivered mostly in order with small jitter
/// (the replay window's ROC estimate assumes packets arrive close together —
/// an arbitrary reshuffling across the whole span is not a scenario the
/// protocol itself tolerates).
#[test]
fn sequence_number_rollover_across_roc_boundary() {
    let mut tx = Session::create(&[policy()]).unwrap();
    let mut rx = Session::create(&[policy()]).unwrap();

    // Drive seq from 65500 up through the 16-bit wraparound to 100 (ROC 0 -> 1).
    let seqs: Vec<u16> = (65500..=65535u32).chain(0..=100u32).map(|s| s as u16).collect();
    let mut protected = Vec::with_capacity(seqs.len());
    for &seq in &seqs {
        let mut pkt = rtp_packet(seq);
        tx.protect_rtp(&mut pkt).unwrap();
        protected.push(pkt);
    }

    // Deliver in order, except swap each adjacent pair (classic jitter/reorder)
    // — every packet stays within the replay window of whichever arrived just
    // before it.
    let mut i = 0;
    while i + 1 < protected.len() {
        rx.unprotect_rtp(&mut protected[i + 1].clone())
            .expect("reordered delivery within window must succeed");
        rx.unprotect_rtp(&mut protected[i].clone())
            .expect("reordered delivery within window must succeed");
        i += 2;
    }

    // A packet far behind the now-advanced highest index (still ROC 0, deep
    // in the past) must be rejected as too old.
    let mut stale_tx = Session::create(&[policy()]).unwrap();
    let mut stale = rtp_packet(1);
    stale_tx.protect_rtp(&mut stale).unwrap();
    assert_eq!(
        rx.unprotect_rtp(&mut stale),
        Err(srtp::error::Error::ReplayOld)
    );
}
