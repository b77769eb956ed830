// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # pgm-recv - PGM receive-path dispatcher
//!
//! Receive side of a Pragmatic General Multicast (PGM, RFC 3208) transport:
//! reading datagrams off a bound socket, classifying and routing them to the
//! downstream/upstream/peer handlers, reassembling contiguous application
//! data, and delivering it to callers through a blocking or non-blocking
//! `recvmsgv`/`recvmsg`/`recvfrom`/`recv` API.
//!
//! This crate owns only the receive path. Session setup (socket creation,
//! binding, join), NAK scheduling, FEC, and anything transmit-side are out
//! of scope; see [`collab`] for the seams ([`collab::WireParser`],
//! [`collab::ReceiveWindow`], [`collab::TransportTimer`]) a caller can
//! replace to plug those in.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pgm_recv::{recvmsgv, DeliveredMessage, RecvFlags, Transport, TransportConfig};
//! use pgm_recv::collab::{IntervalTimer, RawWireParser, SlidingReceiveWindow};
//! use pgm_recv::core::{Gsi, Tsi};
//! use socket2::{Domain, Socket, Type};
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn main() -> std::io::Result<()> {
//! let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
//! socket.bind(&"0.0.0.0:3055".parse::<SocketAddr>().unwrap().into())?;
//!
//! let transport = Transport::new(
//!     socket,
//!     TransportConfig {
//!         tsi: Tsi::new(Gsi::new([1, 2, 3, 4, 5, 6]), 7000),
//!         dport: 7000,
//!         can_send_data: false,
//!         can_recv_data: true,
//!         max_tpdu: 1500,
//!         nak_bo_ivl: 50,
//!         udp_encap_port: 3055,
//!         is_edge_triggered_recv: false,
//!         is_abort_on_reset: false,
//!     },
//!     Arc::new(RawWireParser::new(true)),
//!     Box::new(|| Arc::new(SlidingReceiveWindow::new()) as Arc<_>),
//!     Arc::new(IntervalTimer::new(Duration::from_millis(50))),
//! )?;
//!
//! let mut out: Vec<DeliveredMessage> = Vec::new();
//! recvmsgv(&transport, &mut out, 16, RecvFlags { dontwait: true, errqueue: false })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`transport`] - the [`Transport`] endpoint: socket reading, ancillary
//!   control-data recovery, the peer table, `mio`-based event waiting.
//! - [`engine`] - frame classification, the downstream/upstream/peer
//!   handlers, and the delivery API.
//! - [`core`] - the protocol data model: [`core::Gsi`], [`core::Tsi`],
//!   [`core::CommonHeader`], [`core::Skb`], [`core::Peer`], [`core::RecvStats`].
//! - [`collab`] - traits the engine calls through instead of against
//!   concrete types, plus one minimal real implementation of each.
//! - [`error`] - [`error::RecvError`] and [`error::ParseError`].
//! - [`config`] - shared constants (buffer sizing, counter layout, timer
//!   defaults).

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Seams the engine calls through: wire parsing, the per-peer receive
/// window, and the timer wheel, each with one real default implementation.
pub mod collab;
/// Shared constants: buffer sizing, the NAK back-off floor, counter layout.
pub mod config;
/// Protocol data model: identifiers, common header, receive buffer, peer
/// table, receive-path counters.
pub mod core;
/// Receive-path dispatch: classification, the direction handlers, and the
/// delivery API.
pub mod engine;
/// Error types for the receive path.
pub mod error;
/// The process-wide PGM receive endpoint and its socket/ancillary-data
/// plumbing.
pub mod transport;

pub use engine::{
    classify, on_pgm, recv, recvfrom, recvmsg, recvmsgv, DeliveredMessage, Frame, Outcome,
    RecvFlags, RecvResult, RecvStatus,
};
pub use error::{ParseError, RecvError};
pub use transport::{Transport, TransportConfig};

/// Crate version string.
pub const VERSION: &str = "0.1.0";
