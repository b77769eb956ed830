// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The process-wide PGM receive endpoint and the socket/ancillary-data
//! plumbing its `SocketReader` depends on.

/// Ancillary control-data recovery for the true destination address.
pub mod mobility;
/// Pending-read notification (`is_pending_read` / `pending_notify`).
pub mod notify;
/// `read_one`: single-datagram read with control-message inspection.
pub mod socket_reader;

pub use notify::PendingNotify;
pub use socket_reader::{ReadOutcome, SocketReader};

use crate::collab::{ReceiveWindow, TransportTimer, WireParser};
use crate::core::peer::PeerTable;
use crate::core::stats::RecvStats;
use crate::core::tsi::Tsi;
use parking_lot::Mutex;
use socket2::Socket;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) const SOCKET_TOKEN: mio::Token = mio::Token(0);
pub(crate) const NOTIFY_TOKEN: mio::Token = mio::Token(1);

/// FIFO set of peers with contiguous deliverable data, enumerated in a
/// fair (first-marked-first-served) order by the delivery engine.
#[derive(Default)]
pub(crate) struct PendingPeers {
    order: VecDeque<Tsi>,
    member: HashSet<Tsi>,
}

impl PendingPeers {
    pub(crate) fn mark(&mut self, tsi: Tsi) {
        if self.member.insert(tsi) {
            self.order.push_back(tsi);
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<Tsi> {
        let tsi = self.order.pop_front()?;
        self.member.remove(&tsi);
        Some(tsi)
    }

    pub(crate) fn peek_front(&self) -> Option<Tsi> {
        self.order.front().copied()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// State protected by `pending_mutex` for the full duration of a delivery
/// call, except across the blocking syscall inside `wait_for_event`.
pub(crate) struct PendingState {
    pub(crate) pending: PendingPeers,
    pub(crate) rx_buffer: Vec<u8>,
    pub(crate) is_reset: bool,
    pub(crate) reset_tsi: Option<Tsi>,
}

/// Constructor parameters for [`Transport::new`]. Grouped into one struct
/// rather than a long positional argument list, the way a `ParticipantBuilder`
/// collects construction-time choices.
pub struct TransportConfig {
    pub tsi: Tsi,
    pub dport: u16,
    pub can_send_data: bool,
    pub can_recv_data: bool,
    pub max_tpdu: usize,
    pub nak_bo_ivl: u32,
    /// UDP-encapsulation destination port, or 0 for a raw-IP socket.
    pub udp_encap_port: u16,
    pub is_edge_triggered_recv: bool,
    pub is_abort_on_reset: bool,
}

/// The process-wide PGM receive endpoint.
pub struct Transport {
    pub max_tpdu: usize,
    pub tsi: Tsi,
    pub dport: u16,
    pub can_send_data: bool,
    pub can_recv_data: bool,
    pub nak_bo_ivl: u32,
    pub udp_encap_port: u16,
    pub is_edge_triggered_recv: bool,
    pub is_abort_on_reset: bool,

    pub(crate) reader: SocketReader,
    pub(crate) poll: Mutex<mio::Poll>,
    pub(crate) peers: PeerTable,
    pub(crate) pending: Mutex<PendingState>,
    pub(crate) notify: Arc<PendingNotify>,
    pub(crate) timer: Arc<dyn TransportTimer>,
    pub(crate) wire_parser: Arc<dyn WireParser>,
    pub(crate) window_factory: Box<dyn Fn() -> Arc<dyn ReceiveWindow> + Send + Sync>,
    /// Transmit-side collaborator for NAK/NNAK/SPMR frames addressed to us
    /// as the session's own source; distinct from any peer's receive
    /// window, which tracks data flowing the other direction.
    pub(crate) self_window: Arc<dyn ReceiveWindow>,
    pub(crate) stats: RecvStats,

    is_bound: AtomicBool,
    is_destroyed: AtomicBool,
}

impl Transport {
    /// Assemble the dispatcher state around `socket`, which the caller has
    /// already bound to the receive address/port; socket creation and
    /// binding are outside this crate's scope.
    pub fn new(
        socket: Socket,
        config: TransportConfig,
        wire_parser: Arc<dyn WireParser>,
        window_factory: Box<dyn Fn() -> Arc<dyn ReceiveWindow> + Send + Sync>,
        timer: Arc<dyn TransportTimer>,
    ) -> io::Result<Self> {
        assert!(config.max_tpdu > 0, "max_tpdu must be positive");
        assert!(
            config.nak_bo_ivl > crate::config::MIN_NAK_BO_IVL - 1,
            "nak_bo_ivl must exceed 1"
        );

        let local_port = socket
            .local_addr()?
            .as_socket()
            .map(|a| a.port())
            .unwrap_or(config.dport);
        socket.set_nonblocking(true)?;

        let poll = mio::Poll::new()?;
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            poll.registry().register(
                &mut mio::unix::SourceFd(&socket.as_raw_fd()),
                SOCKET_TOKEN,
                mio::Interest::READABLE,
            )?;
        }
        let notify = notify::notify_with_registered_waker(&poll, NOTIFY_TOKEN)?;

        let reader = SocketReader::new(socket, local_port, config.udp_encap_port != 0)?;
        let self_window = window_factory();

        Ok(Self {
            max_tpdu: config.max_tpdu,
            tsi: config.tsi,
            dport: config.dport,
            can_send_data: config.can_send_data,
            can_recv_data: config.can_recv_data,
            nak_bo_ivl: config.nak_bo_ivl,
            udp_encap_port: config.udp_encap_port,
            is_edge_triggered_recv: config.is_edge_triggered_recv,
            is_abort_on_reset: config.is_abort_on_reset,
            reader,
            poll: Mutex::new(poll),
            peers: PeerTable::new(),
            pending: Mutex::new(PendingState {
                pending: PendingPeers::default(),
                rx_buffer: Vec::with_capacity(config.max_tpdu),
                is_reset: false,
                reset_tsi: None,
            }),
            notify,
            timer,
            wire_parser,
            window_factory,
            self_window,
            stats: RecvStats::new(),
            is_bound: AtomicBool::new(true),
            is_destroyed: AtomicBool::new(false),
        })
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    pub fn stats(&self) -> &RecvStats {
        &self.stats
    }

    pub fn is_bound(&self) -> bool {
        self.is_bound.load(Ordering::Acquire)
    }

    pub fn is_destroyed(&self) -> bool {
        self.is_destroyed.load(Ordering::Acquire)
    }

    /// Tear down the transport. Idempotent; subsequent delivery calls must
    /// observe `is_destroyed()` and refuse to proceed.
    pub fn destroy(&self) {
        self.is_destroyed.store(true, Ordering::Release);
        self.notify.notify();
    }
}
