// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The blocking/non-blocking delivery API: `recvmsgv`, `recvmsg`,
//! `recvfrom`, `recv`.
//!
//! `recvmsgv` runs an explicit `Flush -> Recv -> Wait` loop under
//! `transport.pending`, held for the whole call except across the
//! blocking syscall inside [`wait_for_event`]:
//!
//! - **Flush**: drain every peer with contiguous data ready, up to the
//!   caller's vector capacity.
//! - **Recv**: read one datagram non-blocking, parse and dispatch it, and
//!   loop back to Flush. `WouldBlock` falls through to the timer tick and
//!   the wait decision.
//! - **Wait**: if nothing has been delivered yet and the caller did not
//!   ask for a non-blocking call, block in `mio::Poll` on socket-readable
//!   or pending-notify, then loop back to Flush.

use crate::collab::Apdu;
use crate::core::skb::Skb;
use crate::core::tsi::Tsi;
use crate::engine::dispatcher::{self, Outcome};
use crate::error::{ParseError, RecvError};
use crate::transport::{PendingState, ReadOutcome, Transport};
use parking_lot::MutexGuard;
use std::time::{Duration, Instant};

/// Outcome status of a delivery call, independent of how many messages
/// were delivered (see [`RecvResult::bytes_read`] / the returned vector
/// length for that).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecvStatus {
    /// At least one message was delivered.
    Normal,
    /// Non-blocking call with nothing ready, or a blocking call whose
    /// wait was interrupted before anything became available.
    Again,
    /// The socket has been closed; no further data will arrive.
    Eof,
}

/// Flags controlling one delivery call.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecvFlags {
    /// Never block, even if nothing is ready.
    pub dontwait: bool,
    /// Deliver source-reset notifications in-band as a [`DeliveredMessage`]
    /// with empty `apdu.data`, instead of as an [`RecvError::ConnReset`].
    pub errqueue: bool,
}

/// One reassembled application protocol data unit, tagged with the source
/// it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub from: Tsi,
    pub apdu: Apdu,
}

impl DeliveredMessage {
    fn reset_descriptor(tsi: Tsi) -> Self {
        Self {
            from: tsi,
            apdu: Apdu {
                sqn: 0,
                data: Vec::new(),
            },
        }
    }
}

/// Outcome of a successful `recvmsgv` call.
#[derive(Debug)]
pub struct RecvResult {
    pub status: RecvStatus,
    /// Sum of `apdu.data.len()` across every message pushed to `out` this call.
    pub bytes_read: usize,
}

/// Deliver up to `max_msgs` reassembled APDUs into `out`.
///
/// `out` is not cleared first; messages are appended.
pub fn recvmsgv(
    transport: &Transport,
    out: &mut Vec<DeliveredMessage>,
    max_msgs: usize,
    flags: RecvFlags,
) -> Result<RecvResult, RecvError> {
    if transport.is_destroyed() || !transport.is_bound() {
        return Err(RecvError::BadFileDescriptor);
    }
    if max_msgs == 0 {
        return Err(RecvError::Invalid);
    }

    let mut guard = transport.pending.lock();
    let mut bytes_read = 0usize;

    loop {
        // Only honor a reset as this call's outcome if nothing has been
        // delivered yet; a reset observed after data was already placed in
        // `out` (e.g. a timer tick firing after a successful flush) must
        // not discard that success, so it's left for the next call to see.
        if guard.is_reset && bytes_read == 0 && out.is_empty() {
            let tsi = guard.reset_tsi.take().unwrap_or(transport.tsi);
            if !transport.is_abort_on_reset {
                guard.is_reset = false;
            }
            if flags.errqueue {
                out.push(DeliveredMessage::reset_descriptor(tsi));
                return Ok(RecvResult {
                    status: RecvStatus::Eof,
                    bytes_read,
                });
            }
            return Err(RecvError::ConnReset { tsi });
        }

        flush_pending(transport, &mut guard, out, max_msgs, &mut bytes_read);
        if out.len() >= max_msgs {
            return Ok(RecvResult {
                status: RecvStatus::Normal,
                bytes_read,
            });
        }

        match transport.reader.read_one(&mut guard.rx_buffer, transport.max_tpdu) {
            Ok(ReadOutcome::Data { src, dst, .. }) => {
                let raw = std::mem::replace(&mut guard.rx_buffer, Vec::with_capacity(transport.max_tpdu));
                let mut skb = Skb::new(raw, src, Instant::now());
                skb.dst_addr = dst;

                let parsed = if transport.udp_encap_port != 0 {
                    transport.wire_parser.parse_udp_encap(&mut skb)
                } else {
                    transport.wire_parser.parse_raw(&mut skb)
                };

                match parsed {
                    Ok(header) => {
                        if let Outcome::Accepted(Some(tsi)) = dispatcher::on_pgm(transport, &skb, &header) {
                            guard.pending.mark(tsi);
                            if transport.is_edge_triggered_recv {
                                transport.notify.notify();
                            } else {
                                transport.notify.set();
                            }
                        }
                    }
                    Err(ParseError::ChecksumMismatch) => {
                        transport.stats().inc_cksum_error();
                        transport.stats().inc_discarded(transport.can_send_data);
                    }
                    Err(ParseError::Malformed) => {
                        transport.stats().inc_discarded(transport.can_send_data);
                    }
                }
                continue;
            }
            Ok(ReadOutcome::Invalid) => {
                transport.stats().inc_receiver_discarded();
                continue;
            }
            Ok(ReadOutcome::Closed) => {
                return Ok(RecvResult {
                    status: RecvStatus::Eof,
                    bytes_read,
                });
            }
            Ok(ReadOutcome::WouldBlock) => {}
            Err(err) => return Err(RecvError::from_io_error(err)),
        }

        if transport.timer.check() {
            apply_timer(transport, &mut guard);
            transport.timer.prepare();
            continue;
        }

        if flags.dontwait || bytes_read != 0 || !out.is_empty() {
            let status = if out.is_empty() { RecvStatus::Again } else { RecvStatus::Normal };
            return Ok(RecvResult { status, bytes_read });
        }

        wait_for_event(transport, &mut guard)?;
    }
}

/// Single-message convenience wrapper over [`recvmsgv`].
pub fn recvmsg(
    transport: &Transport,
    flags: RecvFlags,
) -> Result<(RecvStatus, Option<DeliveredMessage>), RecvError> {
    let mut out = Vec::with_capacity(1);
    let result = recvmsgv(transport, &mut out, 1, flags)?;
    Ok((result.status, out.into_iter().next()))
}

/// Copies the next APDU's payload into `buf`, truncating silently (no
/// `MSG_TRUNC`-equivalent signal) if it does not fit, matching the
/// datagram-socket convention of discarding what doesn't fit rather than
/// erroring.
pub fn recvfrom(
    transport: &Transport,
    buf: &mut [u8],
    flags: RecvFlags,
) -> Result<(RecvStatus, usize, Option<Tsi>), RecvError> {
    let (status, msg) = recvmsg(transport, flags)?;
    match msg {
        Some(DeliveredMessage { from, apdu }) => {
            let n = apdu.data.len().min(buf.len());
            buf[..n].copy_from_slice(&apdu.data[..n]);
            Ok((status, n, Some(from)))
        }
        None => Ok((status, 0, None)),
    }
}

/// Like [`recvfrom`] but discards the source TSI.
pub fn recv(transport: &Transport, buf: &mut [u8], flags: RecvFlags) -> Result<(RecvStatus, usize), RecvError> {
    let (status, n, _) = recvfrom(transport, buf, flags)?;
    Ok((status, n))
}

/// Drain every ready peer, front to back, into `out` up to `max_msgs`.
///
/// A peer that had more contiguous data than the remaining vector capacity
/// keeps its leftover in its overflow queue and stays at the front of
/// `pending`, so the next call resumes it before any other peer.
fn flush_pending(
    transport: &Transport,
    guard: &mut PendingState,
    out: &mut Vec<DeliveredMessage>,
    max_msgs: usize,
    bytes_read: &mut usize,
) {
    while out.len() < max_msgs {
        let Some(tsi) = guard.pending.peek_front() else {
            break;
        };
        let Some(peer) = transport.peers().get(&tsi) else {
            guard.pending.pop_front();
            continue;
        };

        peer.refill_overflow();
        let capacity = max_msgs - out.len();
        let batch = peer.take_overflow(capacity);
        for apdu in batch {
            *bytes_read += apdu.data.len();
            out.push(DeliveredMessage { from: tsi, apdu });
        }

        if peer.is_drained() {
            guard.pending.pop_front();
            peer.take_pending();
        }
    }

    if guard.pending.is_empty() {
        transport.notify.check_and_clear();
    } else if !transport.is_edge_triggered_recv {
        transport.notify.set();
    }
}

/// Run the timer's due work, turning each reported reset into pending
/// state mutations. `TransportTimer::dispatch` takes a plain `Fn`, so
/// resets are collected through a `RefCell` and applied once dispatch
/// returns rather than mutated from inside the callback.
fn apply_timer(transport: &Transport, guard: &mut PendingState) {
    let resets = std::cell::RefCell::new(Vec::new());
    transport.timer.dispatch(&|tsi| resets.borrow_mut().push(*tsi));
    for tsi in resets.into_inner() {
        guard.is_reset = true;
        guard.reset_tsi = Some(tsi);
        guard.pending.mark(tsi);
    }
}

/// Block until the socket is readable or a pending-notify fires, releasing
/// `pending_mutex` for the duration of the syscall and reacquiring it
/// before returning.
fn wait_for_event(transport: &Transport, guard: &mut MutexGuard<'_, PendingState>) -> Result<(), RecvError> {
    transport.notify.check_and_clear();
    let timeout = Duration::from_micros(transport.timer.expiration_us().max(1));

    let poll_result = MutexGuard::unlocked(guard, || -> std::io::Result<()> {
        let mut poll = transport.poll.lock();
        let mut events = mio::Events::with_capacity(4);
        poll.poll(&mut events, Some(timeout))?;
        Ok(())
    });

    poll_result.map_err(RecvError::from_io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{IntervalTimer, RawWireParser, SlidingReceiveWindow};
    use crate::core::gsi::Gsi;
    use crate::core::header::COMMON_HEADER_LEN;
    use crate::transport::TransportConfig;
    use socket2::{Domain, Socket, Type};
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::time::Duration;

    fn bound_socket() -> (Socket, u16) {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("socket");
        socket
            .bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).into())
            .expect("bind");
        let port = socket
            .local_addr()
            .expect("local addr")
            .as_socket()
            .expect("socket addr")
            .port();
        (socket, port)
    }

    fn make_transport(dport: u16, socket: Socket) -> Transport {
        let tsi = Tsi::new(Gsi::new([1, 2, 3, 4, 5, 6]), 9000);
        let config = TransportConfig {
            tsi,
            dport,
            can_send_data: true,
            can_recv_data: true,
            max_tpdu: 1500,
            nak_bo_ivl: 50,
            udp_encap_port: 3055,
            is_edge_triggered_recv: false,
            is_abort_on_reset: false,
        };
        Transport::new(
            socket,
            config,
            Arc::new(RawWireParser::new(false)),
            Box::new(|| Arc::new(SlidingReceiveWindow::new()) as Arc<_>),
            Arc::new(IntervalTimer::new(Duration::from_secs(60))),
        )
        .expect("transport")
    }

    fn odata_packet(dport: u16, sport: u16, gsi: [u8; 6], sqn: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = vec![0u8; COMMON_HEADER_LEN];
        buf[0..2].copy_from_slice(&sport.to_be_bytes());
        buf[2..4].copy_from_slice(&dport.to_be_bytes());
        buf[4] = 0x04; // ODATA
        buf[8..14].copy_from_slice(&gsi);
        buf.extend_from_slice(&sqn.to_be_bytes());
        buf.extend_from_slice(&0u32.to_be_bytes());
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn nonblocking_recv_with_empty_socket_is_again() {
        let (socket, port) = bound_socket();
        let transport = make_transport(port, socket);
        let mut out = Vec::new();
        let result = recvmsgv(&transport, &mut out, 4, RecvFlags { dontwait: true, errqueue: false })
            .expect("call succeeds");
        assert_eq!(result.status, RecvStatus::Again);
        assert!(out.is_empty());
    }

    #[test]
    fn delivers_new_source_odata_and_reports_bytes_read() {
        let (socket, port) = bound_socket();
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        let transport = make_transport(port, socket);

        let sender = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("sender");
        let gsi = [7, 7, 7, 7, 7, 7];
        let packet = odata_packet(port, 5000, gsi, 0, b"hello");
        sender.send_to(&packet, &local.into()).expect("send");
        std::thread::sleep(Duration::from_millis(20));

        let mut out = Vec::new();
        let result = recvmsgv(&transport, &mut out, 4, RecvFlags { dontwait: true, errqueue: false })
            .expect("call succeeds");
        assert_eq!(result.status, RecvStatus::Normal);
        assert_eq!(result.bytes_read, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].from, Tsi::new(Gsi::new(gsi), 5000));
        assert_eq!(out[0].apdu.data, b"hello");
    }

    #[test]
    fn vector_capacity_splits_delivery_across_calls() {
        let (socket, port) = bound_socket();
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        let transport = make_transport(port, socket);

        let sender = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("sender");
        let gsi = [8, 8, 8, 8, 8, 8];
        for sqn in 0..3u32 {
            let packet = odata_packet(port, 5050, gsi, sqn, format!("p{sqn}").as_bytes());
            sender.send_to(&packet, &local.into()).expect("send");
        }
        std::thread::sleep(Duration::from_millis(20));

        let mut out = Vec::new();
        let result = recvmsgv(&transport, &mut out, 2, RecvFlags { dontwait: true, errqueue: false })
            .expect("first call");
        assert_eq!(result.status, RecvStatus::Normal);
        assert_eq!(out.len(), 2);

        let mut out2 = Vec::new();
        let result2 = recvmsgv(&transport, &mut out2, 2, RecvFlags { dontwait: true, errqueue: false })
            .expect("second call");
        assert_eq!(result2.status, RecvStatus::Normal);
        assert_eq!(out2.len(), 1);
        assert_eq!(out2[0].apdu.sqn, 2);
    }

    #[test]
    fn errqueue_flag_delivers_reset_descriptor_instead_of_error() {
        let (socket, port) = bound_socket();
        let transport = make_transport(port, socket);
        let tsi = Tsi::new(Gsi::new([4, 4, 4, 4, 4, 4]), 6000);
        {
            let mut guard = transport.pending.lock();
            guard.is_reset = true;
            guard.reset_tsi = Some(tsi);
        }

        let mut out = Vec::new();
        let result = recvmsgv(&transport, &mut out, 1, RecvFlags { dontwait: true, errqueue: true })
            .expect("errqueue delivery succeeds");
        assert_eq!(result.status, RecvStatus::Eof);
        assert_eq!(out[0].from, tsi);
        assert!(out[0].apdu.data.is_empty());
    }

    #[test]
    fn reset_without_errqueue_returns_conn_reset_error() {
        let (socket, port) = bound_socket();
        let transport = make_transport(port, socket);
        let tsi = Tsi::new(Gsi::new([5, 5, 5, 5, 5, 5]), 6100);
        {
            let mut guard = transport.pending.lock();
            guard.is_reset = true;
            guard.reset_tsi = Some(tsi);
        }

        let mut out = Vec::new();
        let err = recvmsgv(&transport, &mut out, 1, RecvFlags { dontwait: true, errqueue: false })
            .expect_err("reset surfaces as an error");
        assert!(matches!(err, RecvError::ConnReset { tsi: t } if t == tsi));
    }

    #[test]
    fn recvfrom_truncates_into_caller_buffer() {
        let (socket, port) = bound_socket();
        let local = socket.local_addr().unwrap().as_socket().unwrap();
        let transport = make_transport(port, socket);

        let sender = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("sender");
        let gsi = [9, 9, 9, 9, 9, 9];
        let packet = odata_packet(port, 5200, gsi, 0, b"0123456789");
        sender.send_to(&packet, &local.into()).expect("send");
        std::thread::sleep(Duration::from_millis(20));

        let mut small = [0u8; 4];
        let (status, n, from) =
            recvfrom(&transport, &mut small, RecvFlags { dontwait: true, errqueue: false }).expect("call");
        assert_eq!(status, RecvStatus::Normal);
        assert_eq!(n, 4);
        assert_eq!(&small, b"0123");
        assert_eq!(from, Some(Tsi::new(Gsi::new(gsi), 5200)));
    }
}
