//! Header validation shared by the RTP and RTCP pipelines (spec.md §4.6).
//!
//! This crate does not own a packet codec: it operates on an already-framed
//! buffer and only needs to know where the encrypted region starts and
//! where the authenticated region ends. Grounded in original_source's
//! `srtp_validate_rtp_header` / `srtp_validate_rtcp_header` (`srtp.c`),
//! expressed over length-checked slices instead of raw pointer arithmetic.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};

pub(crate) const RTP_HEADER_LEN: usize = 12;
pub(crate) const RTCP_HEADER_LEN: usize = 8;

/// Fixed RTP header fields this crate reads directly off the wire; the
/// remainder of the packet (CSRCs, extensions, payload) stays opaque bytes.
pub(crate) struct RtpHeaderView {
    pub cc: usize,
    pub extension: bool,
    pub sequence_number: u16,
    pub ssrc: u32,
    /// Offset of the first encrypted byte: header + CSRCs + extension.
    pub enc_start: usize,
}

/// Computes `hdr_len = 12 + 4*cc`, and when the extension bit is set,
/// reads the 16-bit profile-length word and folds it in — bounds-checking
/// the buffer at each step (spec.md §4.6).
pub(crate) fn parse_rtp_header(buf: &[u8]) -> Result<RtpHeaderView> {
    if buf.len() < RTP_HEADER_LEN {
        return Err(Error::ParseErr("RTP packet shorter than fixed header".into()));
    }
    let b0 = buf[0];
    let cc = (b0 & 0x0F) as usize;
    let extension = (b0 >> 4) & 0x1 == 1;

    let mut hdr_len = RTP_HEADER_LEN + 4 * cc;
    if buf.len() < hdr_len {
        return Err(Error::BadParam("RTP header shorter than CSRC list implies"));
    }
    if extension {
        if buf.len() < hdr_len + 4 {
            return Err(Error::BadParam("RTP header too short for extension header"));
        }
        let profile_len = BigEndian::read_u16(&buf[hdr_len + 2..hdr_len + 4]) as usize;
        hdr_len += 4 + 4 * profile_len;
        if buf.len() < hdr_len {
            return Err(Error::BadParam(
                "RTP extension profile length exceeds packet bounds",
            ));
        }
    }

    let sequence_number = BigEndian::read_u16(&buf[2..4]);
    let ssrc = BigEndian::read_u32(&buf[8..12]);

    Ok(RtpHeaderView {
        cc,
        extension,
        sequence_number,
        ssrc,
        enc_start: hdr_len,
    })
}

/// RTCP's first compound sub-packet header is validated the same way as
/// RTP's fixed fields, minus CSRCs/extensions: version/packet-type and an
/// 8-byte fixed header are the only invariants this crate depends on. The
/// SSRC field lives at the same offset for every first-subpacket type this
/// crate handles (SR/RR carry sender/receiver SSRC at bytes 4..8).
pub(crate) fn rtcp_ssrc(buf: &[u8]) -> Result<u32> {
    if buf.len() < RTCP_HEADER_LEN {
        return Err(Error::ParseErr("RTCP packet shorter than fixed header".into()));
    }
    Ok(BigEndian::read_u32(&buf[4..8]))
}

#[cfg(test)]
mod header_test {
    use super::*;

    #[test]
    fn test_parse_simple_header() {
        let mut buf = vec![0x80, 0x00, 0x00, 0x01, 0, 0, 0, 2, 0xCA, 0xFE, 0xBA, 0xBE];
        buf.extend_from_slice(&[0u8; 20]);
        let hdr = parse_rtp_header(&buf).unwrap();
        assert_eq!(hdr.cc, 0);
        assert!(!hdr.extension);
        assert_eq!(hdr.sequence_number, 1);
        assert_eq!(hdr.ssrc, 0xCAFE_BABE);
        assert_eq!(hdr.enc_start, 12);
    }

    #[test]
    fn test_parse_with_csrc_and_extension() {
        let mut buf = vec![0x91, 0x00, 0x00, 0x01, 0, 0, 0, 2, 0xCA, 0xFE, 0xBA, 0xBE];
        buf.extend_from_slice(&[1, 2, 3, 4]); // one CSRC
        buf.extend_from_slice(&[0xBE, 0xDE, 0x00, 0x01]); // profile + 1-word extension
        buf.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        buf.extend_from_slice(&[0u8; 8]);
        let hdr = parse_rtp_header(&buf).unwrap();
        assert_eq!(hdr.cc, 1);
        assert!(hdr.extension);
        assert_eq!(hdr.enc_start, 12 + 4 + 4 + 4);
    }

    #[test]
    fn test_extension_length_bound_rejected() {
        let buf = vec![0x90, 0x00, 0x00, 0x01, 0, 0, 0, 2, 0xCA, 0xFE, 0xBA, 0xBE, 0xBE, 0xDE, 0xFF, 0xFF];
        assert!(parse_rtp_header(&buf).is_err());
    }
}
