// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Seams the engine calls through rather than against concrete types:
//! wire parsing, the per-peer receive window, and the timer wheel.
//!
//! Each trait ships one real, minimal default implementation. None of them
//! attempt NAK back-off scheduling, FEC recovery, or congestion control;
//! those stay out of scope (see the crate's Non-goals).

use crate::core::header::CommonHeader;
use crate::core::skb::Skb;
use crate::core::tsi::Tsi;
use crate::error::ParseError;
use parking_lot::Mutex;
use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A contiguous, reassembled application protocol data unit ready for
/// delivery to the caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Apdu {
    pub sqn: u32,
    pub data: Vec<u8>,
}

/// Strips the common header (and, for the raw-IP path, the IP header
/// beneath it) from a datagram so the engine can dispatch on
/// [`CommonHeader::packet_type`].
pub trait WireParser: Send + Sync {
    /// Parse a datagram received on a raw IP-protocol socket: an IP header
    /// (v4 or v6) precedes the PGM common header.
    fn parse_raw(&self, skb: &mut Skb) -> Result<CommonHeader, ParseError>;
    /// Parse a datagram received on a UDP-encapsulated PGM socket: the PGM
    /// common header is the first byte of the UDP payload.
    fn parse_udp_encap(&self, skb: &mut Skb) -> Result<CommonHeader, ParseError>;
}

/// Default [`WireParser`]: validates the common header checksum (when
/// present) and advances the buffer past it.
pub struct RawWireParser {
    checksum_enabled: bool,
}

impl RawWireParser {
    pub fn new(checksum_enabled: bool) -> Self {
        Self { checksum_enabled }
    }

    fn strip_ip_header(skb: &mut Skb) -> Result<(), ParseError> {
        let first = *skb.payload().first().ok_or(ParseError::Malformed)?;
        let version = first >> 4;
        let ip_header_len = match version {
            4 => ((first & 0x0f) as usize) * 4,
            6 => 40,
            _ => return Err(ParseError::Malformed),
        };
        skb.pull(ip_header_len).ok_or(ParseError::Malformed)?;
        Ok(())
    }

    fn parse_common_header(&self, skb: &mut Skb) -> Result<CommonHeader, ParseError> {
        let header = CommonHeader::parse(skb.payload(), self.checksum_enabled)?;
        skb.pull(crate::core::header::COMMON_HEADER_LEN)
            .ok_or(ParseError::Malformed)?;
        Ok(header)
    }
}

impl WireParser for RawWireParser {
    fn parse_raw(&self, skb: &mut Skb) -> Result<CommonHeader, ParseError> {
        Self::strip_ip_header(skb)?;
        self.parse_common_header(skb)
    }

    fn parse_udp_encap(&self, skb: &mut Skb) -> Result<CommonHeader, ParseError> {
        self.parse_common_header(skb)
    }
}

/// Per-source reassembly and acknowledgement bookkeeping.
///
/// Implementations are expected to be cheap to call from the hot receive
/// path; the engine calls one of these methods per packet, holding no lock
/// of its own across the call.
pub trait ReceiveWindow: Send + Sync {
    /// ODATA/RDATA arrived. Returns `true` if this advanced the window
    /// (i.e. it was not a pure duplicate).
    fn on_data(&self, skb: &Skb) -> bool;
    /// NCF (NAK confirmation) arrived.
    fn on_ncf(&self, skb: &Skb) -> bool;
    /// SPM (source path message / heartbeat) arrived.
    fn on_spm(&self, skb: &Skb) -> bool;
    /// NAK arrived on the upstream path (receiver addressing the source).
    fn on_nak(&self, skb: &Skb) -> bool;
    /// NAK arrived on the peer path (one receiver's repair request,
    /// observed by another receiver for duplicate suppression).
    fn on_peer_nak(&self, skb: &Skb) -> bool;
    /// NNAK (null NAK, "I already have this") arrived.
    fn on_nnak(&self, skb: &Skb) -> bool;
    /// SPMR (SPM request) arrived. `source` is `Some` when the request was
    /// relayed via a known peer rather than addressed directly upstream.
    fn on_spmr(&self, skb: &Skb, source: Option<&Tsi>) -> bool;
    /// True if [`Self::drain_contiguous`] would yield at least one APDU.
    fn has_pending(&self) -> bool;
    /// Move every contiguously-available APDU into `out`, oldest first.
    fn drain_contiguous(&self, out: &mut Vec<Apdu>);
}

#[derive(Default)]
struct SlidingWindowState {
    next_expected: Option<u32>,
    buffered: BTreeMap<u32, Vec<u8>>,
    ready: VecDeque<Apdu>,
}

/// Minimal contiguous sliding-window reassembler keyed on the ODATA/RDATA
/// sequence number. Out-of-order packets are buffered; once the next
/// expected sequence number's data arrives, every contiguous run starting
/// there is promoted to `ready`.
///
/// This does not retransmit on gaps (no NAK scheduling) and never evicts
/// stale out-of-order entries; those behaviors belong to the production
/// NAK back-off state machine this crate does not implement.
pub struct SlidingReceiveWindow {
    state: Mutex<SlidingWindowState>,
}

impl Default for SlidingReceiveWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SlidingReceiveWindow {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlidingWindowState::default()),
        }
    }

    fn odata_header(payload: &[u8]) -> Option<(u32, &[u8])> {
        if payload.len() < 8 {
            return None;
        }
        let sqn = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        Some((sqn, &payload[8..]))
    }
}

impl ReceiveWindow for SlidingReceiveWindow {
    fn on_data(&self, skb: &Skb) -> bool {
        let Some((sqn, data)) = Self::odata_header(skb.payload()) else {
            return false;
        };
        let mut state = self.state.lock();
        let next_expected = *state.next_expected.get_or_insert(sqn);
        if sqn < next_expected || state.buffered.contains_key(&sqn) {
            return false;
        }
        state.buffered.insert(sqn, data.to_vec());

        let mut cursor = next_expected;
        while let Some(data) = state.buffered.remove(&cursor) {
            state.ready.push_back(Apdu { sqn: cursor, data });
            cursor = cursor.wrapping_add(1);
        }
        state.next_expected = Some(cursor);
        true
    }

    fn on_ncf(&self, _skb: &Skb) -> bool {
        true
    }

    fn on_spm(&self, _skb: &Skb) -> bool {
        true
    }

    fn on_nak(&self, _skb: &Skb) -> bool {
        true
    }

    fn on_peer_nak(&self, _skb: &Skb) -> bool {
        true
    }

    fn on_nnak(&self, _skb: &Skb) -> bool {
        true
    }

    fn on_spmr(&self, _skb: &Skb, _source: Option<&Tsi>) -> bool {
        true
    }

    fn has_pending(&self) -> bool {
        !self.state.lock().ready.is_empty()
    }

    fn drain_contiguous(&self, out: &mut Vec<Apdu>) {
        let mut state = self.state.lock();
        out.extend(state.ready.drain(..));
    }
}

/// Periodic timer driving reset notification and ambient bookkeeping.
///
/// `dispatch` is called once the engine observes [`Self::check`] return
/// true; implementations use it to fire any due callbacks (here, queued
/// source resets) and are expected to reschedule via [`Self::prepare`].
pub trait TransportTimer: Send + Sync {
    /// True once the timer has reached its next expiration.
    fn check(&self) -> bool;
    /// Run due work, invoking `on_reset` for each source that must be
    /// treated as reset.
    fn dispatch(&self, on_reset: &dyn Fn(&Tsi));
    /// Recompute the next expiration from now.
    fn prepare(&self);
    /// Microseconds until the next expiration, for the event-wait timeout.
    fn expiration_us(&self) -> u64;
}

struct IntervalTimerState {
    next_expiration: Instant,
    pending_resets: VecDeque<Tsi>,
}

/// Fixed-interval timer; `queue_reset` lets the engine register a source
/// whose reset notification should fire on the next `dispatch`.
pub struct IntervalTimer {
    interval: Duration,
    state: Mutex<IntervalTimerState>,
}

impl IntervalTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(IntervalTimerState {
                next_expiration: Instant::now() + interval,
                pending_resets: VecDeque::new(),
            }),
        }
    }

    pub fn queue_reset(&self, tsi: Tsi) {
        self.state.lock().pending_resets.push_back(tsi);
    }
}

impl TransportTimer for IntervalTimer {
    fn check(&self) -> bool {
        Instant::now() >= self.state.lock().next_expiration
    }

    fn dispatch(&self, on_reset: &dyn Fn(&Tsi)) {
        let resets: Vec<Tsi> = {
            let mut state = self.state.lock();
            state.pending_resets.drain(..).collect()
        };
        for tsi in resets {
            on_reset(&tsi);
        }
    }

    fn prepare(&self) {
        self.state.lock().next_expiration = Instant::now() + self.interval;
    }

    fn expiration_us(&self) -> u64 {
        let next = self.state.lock().next_expiration;
        let now = Instant::now();
        if next <= now {
            0
        } else {
            (next - now).as_micros() as u64
        }
    }
}

/// Socket address pair recovered via ancillary control data; re-exported
/// here since both the wire parser and the socket reader need it.
pub type RecoveredDest = Option<SocketAddr>;
