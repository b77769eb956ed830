// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handles receiver-facing frames: ODATA, RDATA, NCF, SPM, and POLL. Only
//! runs when the transport was configured to receive data; lazily creates
//! a [`Peer`](crate::core::peer::Peer) for a TSI not seen before, since this
//! is the only path allowed to do so.

use crate::core::header::{CommonHeader, PacketType};
use crate::core::skb::Skb;
use crate::core::tsi::Tsi;
use crate::transport::Transport;
use std::net::IpAddr;

/// Dispatch a downstream-classified frame. Returns `true` if the peer's
/// window accepted it. POLL has no handler in this path and is discarded
/// like any other unrecognized type, matching the dispatch table's
/// `ODATA/RDATA`, `NCF`, `SPM`, `other` rows.
pub fn handle(transport: &Transport, skb: &Skb, header: &CommonHeader) -> bool {
    if !transport.can_recv_data {
        log::debug!("downstream: dropping, transport cannot receive data");
        transport.stats().inc_receiver_discarded();
        return false;
    }
    if header.dest_port != transport.dport {
        log::debug!(
            "downstream: wrong dport, got {} want {}",
            header.dest_port,
            transport.dport
        );
        transport.stats().inc_receiver_discarded();
        return false;
    }

    let tsi = Tsi::new(header.gsi, header.source_port);
    let peer = transport.peers().get_or_create(
        tsi,
        skb.peer_addr,
        &transport.window_factory,
        skb.tstamp,
    );
    peer.touch(skb.tstamp);
    peer.add_bytes_received(skb.len() as u64);
    transport.stats().add_bytes_received(skb.len() as u64);

    let accepted = match header.packet_type {
        PacketType::Odata | PacketType::Rdata => peer.window.on_data(skb),
        PacketType::Ncf => peer.window.on_ncf(skb),
        PacketType::Spm => {
            let advanced = peer.window.on_spm(skb);
            if let Some(dst) = skb.dst_addr {
                if is_multicast(dst.ip()) {
                    peer.set_group_nla(dst.ip());
                }
            }
            advanced
        }
        // POLL and anything else this path doesn't recognize.
        _ => {
            log::debug!("downstream: unhandled type {} for tsi={tsi}", header.packet_type);
            transport.stats().inc_receiver_discarded();
            return false;
        }
    };

    if peer.window.has_pending() {
        peer.mark_pending();
    }

    accepted
}

fn is_multicast(addr: IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_multicast(),
        IpAddr::V6(v6) => v6.is_multicast(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{IntervalTimer, RawWireParser, SlidingReceiveWindow};
    use crate::core::gsi::Gsi;
    use crate::transport::TransportConfig;
    use socket2::{Domain, Socket, Type};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    fn bound_socket() -> Socket {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("socket");
        socket
            .bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).into())
            .expect("bind");
        socket
    }

    fn make_transport() -> Transport {
        let tsi = Tsi::new(Gsi::new([1, 2, 3, 4, 5, 6]), 7000);
        let config = TransportConfig {
            tsi,
            dport: 7000,
            can_send_data: true,
            can_recv_data: true,
            max_tpdu: 1500,
            nak_bo_ivl: 50,
            udp_encap_port: 3055,
            is_edge_triggered_recv: false,
            is_abort_on_reset: false,
        };
        Transport::new(
            bound_socket(),
            config,
            Arc::new(RawWireParser::new(false)),
            Box::new(|| Arc::new(SlidingReceiveWindow::new()) as Arc<_>),
            Arc::new(IntervalTimer::new(Duration::from_millis(50))),
        )
        .expect("transport")
    }

    fn header(packet_type: PacketType, gsi: Gsi, source_port: u16) -> CommonHeader {
        CommonHeader {
            source_port,
            dest_port: 7000,
            packet_type,
            options_present: false,
            checksum: 0,
            gsi,
            tsdu_length: 0,
        }
    }

    fn odata_skb(sqn: u32, payload: &[u8]) -> Skb {
        let mut buf = Vec::new();
        buf.extend_from_slice(&sqn.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(payload);
        Skb::new(buf, "127.0.0.1:9000".parse().unwrap(), Instant::now())
    }

    #[test]
    fn rejects_wrong_dport() {
        let transport = make_transport();
        let gsi = Gsi::new([2, 2, 2, 2, 2, 2]);
        let mut header = header(PacketType::Odata, gsi, 9000);
        header.dest_port = 1111;
        assert!(!handle(&transport, &odata_skb(0, b"x"), &header));
        assert!(transport.peers().is_empty());
        assert_eq!(transport.stats().snapshot().receiver_packets_discarded, 1);
    }

    #[test]
    fn creates_peer_lazily_on_first_odata() {
        let transport = make_transport();
        let gsi = Gsi::new([2, 2, 2, 2, 2, 2]);
        let header = header(PacketType::Odata, gsi, 9000);
        assert!(handle(&transport, &odata_skb(0, b"hello"), &header));
        assert_eq!(transport.peers().len(), 1);

        let tsi = Tsi::new(gsi, 9000);
        let peer = transport.peers().get(&tsi).expect("peer created");
        assert!(peer.window.has_pending());
    }

    #[test]
    fn spm_sets_group_nla_for_multicast_destination() {
        let transport = make_transport();
        let gsi = Gsi::new([3, 3, 3, 3, 3, 3]);
        let header = header(PacketType::Spm, gsi, 9001);
        let mut skb = Skb::new(Vec::new(), "127.0.0.1:9001".parse().unwrap(), Instant::now());
        skb.dst_addr = Some("239.1.1.1:7000".parse().unwrap());

        assert!(handle(&transport, &skb, &header));
        let tsi = Tsi::new(gsi, 9001);
        let peer = transport.peers().get(&tsi).expect("peer created");
        assert_eq!(peer.group_nla(), Some(IpAddr::V4(Ipv4Addr::new(239, 1, 1, 1))));
    }
}
