// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive-path dispatch: classify an incoming frame, hand it to the
//! handler for its direction, and drain reassembled APDUs to callers.
//!
//! # Flow
//!
//! ```text
//! SocketReader::read_one -> WireParser::parse_* -> Frame classification
//!       v
//! UpstreamHandler | PeerHandler | DownstreamHandler
//!       v
//! ReceiveWindow::drain_contiguous -> DeliveryEngine::recvmsgv
//! ```
//!
//! Each handler is a plain function over `(&Transport, &mut Skb,
//! &CommonHeader)` rather than an object implementing a shared trait; there
//! is exactly one of each per transport and nothing polymorphic to gain by
//! boxing them.

/// Classifies a parsed common header into a routing direction.
pub mod classifier;
/// Composes the classifier and the three direction handlers.
pub mod dispatcher;
/// `recvmsgv`/`recvmsg`/`recvfrom`/`recv`: the blocking/non-blocking
/// delivery state machine.
pub mod delivery;
/// Handles frames addressed downstream (receiver-facing: ODATA/RDATA/NCF/SPM).
pub mod downstream;
/// Handles frames relayed among peers (NAK/SPMR observed off another
/// receiver's wire, not addressed to us as source).
pub mod peer_handler;
/// Handles frames addressed upstream (receiver-to-source: NAK/NNAK/SPMR/POLR).
pub mod upstream;

pub use classifier::{classify, Frame};
pub use delivery::{recv, recvfrom, recvmsg, recvmsgv, DeliveredMessage, RecvFlags, RecvResult, RecvStatus};
pub use dispatcher::{on_pgm, Outcome};
