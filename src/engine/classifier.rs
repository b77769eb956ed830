// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pure classification of a parsed common header into a routing direction.
//! No I/O, no locking; a straight function of the header and the
//! transport's own source port.

use crate::core::header::CommonHeader;

/// Direction a frame should be routed in, decided purely from
/// `(packet_type, dest_port)` against the transport's own source port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frame {
    /// ODATA/RDATA/NCF/SPM/POLL: receiver-facing, handled by `DownstreamHandler`.
    Downstream,
    /// NAK/NNAK/SPMR/POLR addressed to us as the session's source.
    Upstream,
    /// NAK/SPMR observed on another receiver's session, not addressed to us.
    Peer,
    /// No handler claims this combination of type and destination port.
    Discard,
}

/// Classify `header` for a transport whose own session source port is
/// `our_sport`.
pub fn classify(header: &CommonHeader, our_sport: u16) -> Frame {
    if header.packet_type.is_downstream() {
        return Frame::Downstream;
    }
    if header.packet_type.is_upstream_or_peer() {
        if header.dest_port == our_sport {
            return Frame::Upstream;
        }
        if header.packet_type.is_peer_only() {
            return Frame::Peer;
        }
    }
    Frame::Discard
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gsi::Gsi;
    use crate::core::header::PacketType;

    fn header(packet_type: PacketType, dest_port: u16) -> CommonHeader {
        CommonHeader {
            source_port: 9000,
            dest_port,
            packet_type,
            options_present: false,
            checksum: 0,
            gsi: Gsi::new([1, 2, 3, 4, 5, 6]),
            tsdu_length: 0,
        }
    }

    #[test]
    fn odata_is_always_downstream() {
        assert_eq!(classify(&header(PacketType::Odata, 1234), 7000), Frame::Downstream);
        assert_eq!(classify(&header(PacketType::Odata, 7000), 7000), Frame::Downstream);
    }

    #[test]
    fn nak_to_our_sport_is_upstream() {
        assert_eq!(classify(&header(PacketType::Nak, 7000), 7000), Frame::Upstream);
    }

    #[test]
    fn nak_to_another_sport_is_peer() {
        assert_eq!(classify(&header(PacketType::Nak, 4242), 7000), Frame::Peer);
    }

    #[test]
    fn nnak_to_another_sport_is_discarded() {
        // NNAK has no peer variant: not addressed to us, and not peer-capable.
        assert_eq!(classify(&header(PacketType::Nnak, 4242), 7000), Frame::Discard);
    }

    #[test]
    fn polr_to_another_sport_is_discarded() {
        assert_eq!(classify(&header(PacketType::Polr, 4242), 7000), Frame::Discard);
    }

    #[test]
    fn unknown_type_is_discarded() {
        assert_eq!(classify(&header(PacketType::Unknown(0x7f), 7000), 7000), Frame::Discard);
    }
}
