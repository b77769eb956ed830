// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handles frames relayed among receivers: a NAK or SPMR this receiver
//! overheard on another receiver's session, used purely for duplicate
//! suppression. Only runs when the transport was configured to receive
//! data; never creates a peer (an unknown TSI here is just discarded).

use crate::core::header::{CommonHeader, PacketType};
use crate::core::skb::Skb;
use crate::core::tsi::Tsi;
use crate::transport::Transport;

/// Dispatch a peer-classified frame. Returns `true` if the addressed
/// peer's window accepted it.
pub fn handle(transport: &Transport, skb: &Skb, header: &CommonHeader) -> bool {
    if !transport.can_recv_data {
        log::debug!("peer: dropping, transport cannot receive data");
        transport.stats().inc_receiver_discarded();
        return false;
    }
    if header.dest_port == transport.tsi.source_port {
        // Classifier never produces Peer for this case, but guard anyway.
        log::debug!("peer: frame addressed to our own sport, not a peer relay");
        transport.stats().inc_receiver_discarded();
        return false;
    }
    if header.source_port != transport.dport {
        log::debug!(
            "peer: wrong session, got sport={} want dport={}",
            header.source_port,
            transport.dport
        );
        transport.stats().inc_receiver_discarded();
        return false;
    }

    // NAK/SPMR carry sport/dport reversed relative to downstream framing:
    // dest_port here holds the referenced source's TSI sport, the same
    // field that is `source_port` on that source's own ODATA/SPM traffic.
    let tsi = Tsi::new(header.gsi, header.dest_port);
    let Some(peer) = transport.peers().get(&tsi) else {
        log::debug!("peer: no known peer for tsi={tsi}");
        transport.stats().inc_receiver_discarded();
        return false;
    };

    let accepted = match header.packet_type {
        PacketType::Nak => peer.window.on_peer_nak(skb),
        PacketType::Spmr => peer.window.on_spmr(skb, Some(&peer.tsi)),
        _ => {
            log::debug!("peer: unhandled type {} for tsi={tsi}", header.packet_type);
            false
        }
    };

    if !accepted {
        transport.stats().inc_receiver_discarded();
    }
    accepted
}
