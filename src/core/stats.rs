// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Receive-path counters.
//!
//! Mirrors the subset of `PGM_PC_*` receiver statistics this dispatcher is
//! in a position to maintain; congestion/FEC-only counters are not modeled.

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free receive-path counters, safe to share across the socket reader
/// thread and any metrics scraper.
#[derive(Default)]
pub struct RecvStats {
    source_packets_discarded: AtomicU64,
    source_cksum_errors: AtomicU64,
    receiver_packets_discarded: AtomicU64,
    receiver_bytes_received: AtomicU64,
}

/// Point-in-time copy of [`RecvStats`] for reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecvStatsSnapshot {
    pub source_packets_discarded: u64,
    pub source_cksum_errors: u64,
    pub receiver_packets_discarded: u64,
    pub receiver_bytes_received: u64,
}

impl RecvStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_source_discarded(&self) {
        self.source_packets_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cksum_error(&self) {
        self.source_cksum_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_receiver_discarded(&self) {
        self.receiver_packets_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Charges a discard that happened before any direction handler ran
    /// (destination recovery, parse, classification) to the source counter
    /// when this transport can send data, and to the receiver counter
    /// otherwise — a pure receiver has no source session to charge it to.
    pub fn inc_discarded(&self, can_send_data: bool) {
        if can_send_data {
            self.inc_source_discarded();
        } else {
            self.inc_receiver_discarded();
        }
    }

    pub fn add_bytes_received(&self, n: u64) {
        self.receiver_bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RecvStatsSnapshot {
        RecvStatsSnapshot {
            source_packets_discarded: self.source_packets_discarded.load(Ordering::Relaxed),
            source_cksum_errors: self.source_cksum_errors.load(Ordering::Relaxed),
            receiver_packets_discarded: self.receiver_packets_discarded.load(Ordering::Relaxed),
            receiver_bytes_received: self.receiver_bytes_received.load(Ordering::Relaxed),
        }
    }
}
