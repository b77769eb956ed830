// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Composes [`classifier::classify`] with the three direction handlers.

use crate::core::header::CommonHeader;
use crate::core::skb::Skb;
use crate::core::tsi::Tsi;
use crate::engine::classifier::{self, Frame};
use crate::engine::{downstream, peer_handler, upstream};
use crate::transport::Transport;

/// Result of routing one parsed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A handler accepted the frame. `Some(tsi)` names the peer whose
    /// window may now have contiguous data ready (downstream/peer paths
    /// only; the upstream path never delivers APDUs).
    Accepted(Option<Tsi>),
    Discarded,
}

/// Classify `header` and hand `skb` to the matching handler.
pub fn on_pgm(transport: &Transport, skb: &Skb, header: &CommonHeader) -> Outcome {
    match classifier::classify(header, transport.tsi.source_port) {
        Frame::Downstream => {
            let tsi = Tsi::new(header.gsi, header.source_port);
            if downstream::handle(transport, skb, header) {
                Outcome::Accepted(Some(tsi))
            } else {
                Outcome::Discarded
            }
        }
        Frame::Peer => {
            if peer_handler::handle(transport, skb, header) {
                Outcome::Accepted(None)
            } else {
                Outcome::Discarded
            }
        }
        Frame::Upstream => {
            if upstream::handle(transport, skb, header) {
                Outcome::Accepted(None)
            } else {
                Outcome::Discarded
            }
        }
        Frame::Discard => {
            log::debug!(
                "dispatcher: discarding type={} dport={}",
                header.packet_type,
                header.dest_port
            );
            transport.stats().inc_discarded(transport.can_send_data);
            Outcome::Discarded
        }
    }
}
