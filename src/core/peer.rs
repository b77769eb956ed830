// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Peer table: one entry per remote PGM source this receiver has observed.
//!
//! Modeled on the reliable-reader proxy registry's sharded-map-plus-lazy-insert
//! shape, swapped to a [`Tsi`] key since a PGM peer is identified by its
//! transport session, not an RTPS GUID.

use crate::collab::{Apdu, ReceiveWindow};
use crate::core::tsi::Tsi;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// State tracked for a single remote PGM source.
pub struct Peer {
    pub tsi: Tsi,
    /// Source network-layer address (NLA), the address packets actually
    /// arrive from; used to validate/refresh routing, not as the map key.
    nla: Mutex<SocketAddr>,
    /// Multicast group this source's SPMs were received on, when known.
    group_nla: Mutex<Option<IpAddr>>,
    last_packet: Mutex<Instant>,
    bytes_received: AtomicU64,
    /// Edge-triggered flag: true once the receive window has contiguous
    /// data ready and the engine has not yet drained it.
    pending: AtomicBool,
    /// APDUs already pulled out of `window` by a flush that ran out of
    /// caller-vector capacity before delivering all of them. Drained ahead
    /// of the window on the next flush so delivery order within a peer
    /// stays FIFO.
    overflow: Mutex<VecDeque<Apdu>>,
    pub window: Arc<dyn ReceiveWindow>,
}

impl Peer {
    pub fn new(tsi: Tsi, nla: SocketAddr, window: Arc<dyn ReceiveWindow>, now: Instant) -> Self {
        Self {
            tsi,
            nla: Mutex::new(nla),
            group_nla: Mutex::new(None),
            last_packet: Mutex::new(now),
            bytes_received: AtomicU64::new(0),
            pending: AtomicBool::new(false),
            overflow: Mutex::new(VecDeque::new()),
            window,
        }
    }

    /// Pull every contiguously-available APDU out of `window` into the
    /// overflow queue, if the overflow queue is currently empty and the
    /// window reports data ready.
    pub fn refill_overflow(&self) {
        let mut overflow = self.overflow.lock();
        if !overflow.is_empty() || !self.window.has_pending() {
            return;
        }
        let mut drained = Vec::new();
        self.window.drain_contiguous(&mut drained);
        overflow.extend(drained);
    }

    /// Pop up to `n` APDUs already sitting in the overflow queue.
    pub fn take_overflow(&self, n: usize) -> Vec<Apdu> {
        let mut overflow = self.overflow.lock();
        let n = n.min(overflow.len());
        overflow.drain(..n).collect()
    }

    /// True once overflow is drained and the window has nothing further.
    pub fn is_drained(&self) -> bool {
        self.overflow.lock().is_empty() && !self.window.has_pending()
    }

    pub fn nla(&self) -> SocketAddr {
        *self.nla.lock()
    }

    pub fn set_nla(&self, addr: SocketAddr) {
        *self.nla.lock() = addr;
    }

    pub fn group_nla(&self) -> Option<IpAddr> {
        *self.group_nla.lock()
    }

    pub fn set_group_nla(&self, addr: IpAddr) {
        *self.group_nla.lock() = Some(addr);
    }

    pub fn touch(&self, now: Instant) {
        *self.last_packet.lock() = now;
    }

    pub fn last_packet(&self) -> Instant {
        *self.last_packet.lock()
    }

    pub fn add_bytes_received(&self, n: u64) {
        self.bytes_received.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    pub fn mark_pending(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Clears and returns the previous value, implementing edge-triggered
    /// consumption: only the first caller after a `mark_pending` sees `true`.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }
}

/// Sharded concurrent map from TSI to peer state.
///
/// Lookups never create an entry; only [`PeerTable::get_or_create`] does,
/// matching the original's distinction between the downstream path (which
/// may instantiate a peer) and the upstream/peer paths (which only look up).
#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<Tsi, Arc<Peer>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tsi: &Tsi) -> Option<Arc<Peer>> {
        self.peers.get(tsi).map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_or_create(
        &self,
        tsi: Tsi,
        nla: SocketAddr,
        window: impl FnOnce() -> Arc<dyn ReceiveWindow>,
        now: Instant,
    ) -> Arc<Peer> {
        Arc::clone(
            self.peers
                .entry(tsi)
                .or_insert_with(|| Arc::new(Peer::new(tsi, nla, window(), now)))
                .value(),
        )
    }

    pub fn remove(&self, tsi: &Tsi) -> Option<Arc<Peer>> {
        self.peers.remove(tsi).map(|(_, peer)| peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
