// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PGM Receive Path Configuration - Single Source of Truth
//!
//! Centralizes the constants the receive dispatcher needs: default buffer
//! sizing, the NAK back-off floor the data model's invariants reference,
//! the fixed counter-array layout, and the UDP-encapsulation port
//! convention. **Never hardcode these elsewhere.**

use std::time::Duration;

/// Default maximum transport protocol data unit, in bytes. Bounds the size
/// of [`crate::core::Skb::new`]'s backing buffer when a caller does not
/// override it. RFC 3208 places no hard ceiling; 1500 matches the common
/// untagged-Ethernet MTU minus IP/UDP/PGM headers rounded down.
pub const DEFAULT_MAX_TPDU: usize = 1500;

/// Floor for `nak_bo_ivl` (NAK back-off interval). A delivery call requires
/// `nak_bo_ivl > 1`; this is the smallest value a [`crate::transport::Transport`]
/// will accept.
pub const MIN_NAK_BO_IVL: u32 = 2;

/// Default fixed-interval timer period driving [`crate::collab::IntervalTimer`].
pub const DEFAULT_TIMER_INTERVAL: Duration = Duration::from_millis(50);

/// Well-known UDP port PGM-over-UDP-encapsulation traffic arrives on when a
/// transport does not override it (RFC 3208 does not reserve one; this
/// mirrors the de facto convention used by implementations that tunnel PGM
/// over UDP rather than raw IP protocol 113).
pub const DEFAULT_UDP_ENCAP_PORT: u16 = 3055;

/// Index into the fixed, wire-compatible statistics array for
/// `PC_SOURCE_PACKETS_DISCARDED`. Kept as named constants rather than a
/// bare enum so the layout is explicit ABI.
pub const PC_SOURCE_PACKETS_DISCARDED: usize = 0;
/// Index for `PC_SOURCE_CKSUM_ERRORS`.
pub const PC_SOURCE_CKSUM_ERRORS: usize = 1;
/// Index for `PC_RECEIVER_PACKETS_DISCARDED`.
pub const PC_RECEIVER_PACKETS_DISCARDED: usize = 2;
/// Index for `PC_RECEIVER_BYTES_RECEIVED`.
pub const PC_RECEIVER_BYTES_RECEIVED: usize = 3;

/// Total number of counters in the fixed array, for callers that want to
/// allocate or iterate the whole set.
pub const COUNTER_COUNT: usize = 4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nak_bo_ivl_floor_is_above_one() {
        assert!(MIN_NAK_BO_IVL > 1);
    }

    #[test]
    fn counter_indices_are_distinct_and_in_range() {
        let indices = [
            PC_SOURCE_PACKETS_DISCARDED,
            PC_SOURCE_CKSUM_ERRORS,
            PC_RECEIVER_PACKETS_DISCARDED,
            PC_RECEIVER_BYTES_RECEIVED,
        ];
        for &i in &indices {
            assert!(i < COUNTER_COUNT);
        }
        let mut sorted = indices;
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), indices.len());
    }
}
