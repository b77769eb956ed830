// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handles frames addressed to us as a session's source: NAK, NNAK, SPMR,
//! and POLR. Only runs when the transport was configured to send data;
//! a pure receiver has nothing for this path to do.

use crate::core::header::{CommonHeader, PacketType};
use crate::core::skb::Skb;
use crate::transport::Transport;

/// Dispatch an upstream-classified frame. Returns `true` if a collaborator
/// accepted it, `false` on any rejection (each rejection path increments
/// the source discard counter before returning).
pub fn handle(transport: &Transport, skb: &Skb, header: &CommonHeader) -> bool {
    if !transport.can_send_data {
        log::debug!("upstream: dropping, transport cannot send data");
        transport.stats().inc_source_discarded();
        return false;
    }
    if header.source_port != transport.dport {
        log::debug!(
            "upstream: session mismatch, got sport={} want dport={}",
            header.source_port,
            transport.dport
        );
        transport.stats().inc_source_discarded();
        return false;
    }
    if header.gsi != transport.tsi.gsi {
        log::debug!("upstream: gsi mismatch for sport={}", header.source_port);
        transport.stats().inc_source_discarded();
        return false;
    }

    let accepted = match header.packet_type {
        PacketType::Nak => transport.self_window.on_nak(skb),
        PacketType::Nnak => transport.self_window.on_nnak(skb),
        PacketType::Spmr => transport.self_window.on_spmr(skb, None),
        PacketType::Polr => {
            log::debug!("upstream: discarding POLR (unhandled by this path)");
            false
        }
        _ => {
            log::debug!("upstream: unhandled type {}", header.packet_type);
            false
        }
    };

    if !accepted {
        transport.stats().inc_source_discarded();
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::SlidingReceiveWindow;
    use crate::collab::{IntervalTimer, RawWireParser};
    use crate::core::gsi::Gsi;
    use crate::core::tsi::Tsi;
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

    fn make_transport(can_send_data: bool) -> Transport {
        let tsi = Tsi::new(Gsi::new([1, 2, 3, 4, 5, 6]), 7000);
        let config = TransportConfig {
            tsi,
            dport: 7000,
            can_send_data,
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

    fn header(packet_type: PacketType, source_port: u16, gsi: Gsi) -> CommonHeader {
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

    fn skb() -> Skb {
        Skb::new(Vec::new(), "127.0.0.1:1000".parse().unwrap(), Instant::now())
    }

    #[test]
    fn refuses_when_transport_cannot_send_data() {
        let transport = make_transport(false);
        let gsi = transport.tsi.gsi;
        let header = header(PacketType::Nak, 7000, gsi);
        assert!(!handle(&transport, &skb(), &header));
        assert_eq!(transport.stats().snapshot().source_packets_discarded, 1);
    }

    #[test]
    fn rejects_wrong_source_port() {
        let transport = make_transport(true);
        let gsi = transport.tsi.gsi;
        let header = header(PacketType::Nak, 9999, gsi);
        assert!(!handle(&transport, &skb(), &header));
        assert_eq!(transport.stats().snapshot().source_packets_discarded, 1);
    }

    #[test]
    fn accepts_nak_for_matching_session() {
        let transport = make_transport(true);
        let gsi = transport.tsi.gsi;
        let header = header(PacketType::Nak, 7000, gsi);
        assert!(handle(&transport, &skb(), &header));
        assert_eq!(transport.stats().snapshot().source_packets_discarded, 0);
    }
}
