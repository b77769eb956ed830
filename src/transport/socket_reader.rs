// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Reads one datagram with ancillary control-data inspection.
//!
//! Recovers the kernel-provided source address from the `recvmsg` name
//! field and the *actual* destination address from `IP_PKTINFO`/
//! `IPV6_PKTINFO` ancillary data. Destination recovery is mandatory
//! whenever the socket is UDP-encapsulated or IPv6; if mandatory but
//! absent, the read is reported [`ReadOutcome::Invalid`] without touching
//! the checksum-error counter.

use crate::transport::mobility::pktinfo::{self, AlignedCmsgBuf};
use socket2::Socket;
use std::io;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};
use std::os::unix::io::AsRawFd;

/// Outcome of a single `read_one` call.
pub enum ReadOutcome {
    /// A datagram was read into the caller's buffer, now truncated to the
    /// actual length; `src` and (when recoverable) `dst` are populated.
    Data {
        len: usize,
        src: SocketAddr,
        dst: Option<SocketAddr>,
    },
    /// A zero-length read: the socket has been closed.
    Closed,
    /// No datagram was ready (non-blocking read).
    WouldBlock,
    /// The datagram arrived but destination recovery was mandatory and the
    /// kernel did not attach the control data (or the source address family
    /// could not be parsed). Not a checksum failure.
    Invalid,
}

/// Wraps the receive socket and the ancillary-data policy needed to recover
/// both addresses for every datagram.
pub struct SocketReader {
    socket: Socket,
    local_port: u16,
    udp_encap: bool,
    is_ipv6: bool,
}

impl SocketReader {
    /// Wrap `socket`, enabling pktinfo ancillary data for its address
    /// family. `udp_encap` is true when this transport tunnels PGM over UDP
    /// rather than raw IP protocol 113.
    pub fn new(socket: Socket, local_port: u16, udp_encap: bool) -> io::Result<Self> {
        let is_ipv6 = socket.domain()? == socket2::Domain::IPV6;
        #[cfg(target_os = "linux")]
        {
            let fd = socket.as_raw_fd();
            pktinfo::enable_pktinfo(fd, is_ipv6)?;
        }
        Ok(Self {
            socket,
            local_port,
            udp_encap,
            is_ipv6,
        })
    }

    /// True when `read_one` must recover the destination address or report
    /// `Invalid`.
    pub fn destination_required(&self) -> bool {
        self.udp_encap || self.is_ipv6
    }

    /// Read one datagram into `buf`, resizing it to `max_tpdu` first and
    /// truncating it to the actual length on success.
    #[cfg(target_os = "linux")]
    pub fn read_one(&self, buf: &mut Vec<u8>, max_tpdu: usize) -> io::Result<ReadOutcome> {
        buf.resize(max_tpdu, 0);

        let mut name: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut libc::c_void,
            iov_len: buf.len(),
        };
        let mut control = AlignedCmsgBuf::new();
        let mut msg: libc::msghdr = unsafe { std::mem::zeroed() };
        msg.msg_name = &mut name as *mut _ as *mut libc::c_void;
        msg.msg_namelen = std::mem::size_of::<libc::sockaddr_storage>() as u32;
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.as_mut_ptr() as *mut libc::c_void;
        msg.msg_controllen = AlignedCmsgBuf::SIZE as _;

        let fd = self.socket.as_raw_fd();
        // SAFETY: `msg` describes a live stack-allocated name/iovec/control
        // buffer sized above; `fd` is a valid socket owned by `self.socket`.
        let n = unsafe { libc::recvmsg(fd, &mut msg, libc::MSG_DONTWAIT) };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(ReadOutcome::WouldBlock);
            }
            return Err(err);
        }
        if n == 0 {
            return Ok(ReadOutcome::Closed);
        }
        let n = n as usize;
        buf.truncate(n);

        let Some(src) = sockaddr_storage_to_socket_addr(&name) else {
            return Ok(ReadOutcome::Invalid);
        };

        let dst = self.parse_dest(&msg);
        if self.destination_required() && dst.is_none() {
            return Ok(ReadOutcome::Invalid);
        }

        Ok(ReadOutcome::Data { len: n, src, dst })
    }

    #[cfg(target_os = "linux")]
    fn parse_dest(&self, msg: &libc::msghdr) -> Option<SocketAddr> {
        // SAFETY: `msg` was just populated by a successful `recvmsg` call
        // above and owns its control buffer for the duration of this call.
        unsafe {
            let mut cmsg = libc::CMSG_FIRSTHDR(msg);
            while !cmsg.is_null() {
                if let Some(info) = pktinfo::parse_pktinfo_v4(&*cmsg) {
                    return Some(SocketAddr::new(info.dest_addr, self.local_port));
                }
                if let Some(info) = pktinfo::parse_pktinfo_v6(&*cmsg) {
                    let IpAddr::V6(addr) = info.dest_addr else {
                        unreachable!("parse_pktinfo_v6 always returns an IPv6 address")
                    };
                    return Some(SocketAddr::V6(SocketAddrV6::new(
                        addr,
                        self.local_port,
                        0,
                        info.interface_index,
                    )));
                }
                cmsg = libc::CMSG_NXTHDR(msg, cmsg);
            }
        }
        None
    }

    #[cfg(not(target_os = "linux"))]
    pub fn read_one(&self, _buf: &mut Vec<u8>, _max_tpdu: usize) -> io::Result<ReadOutcome> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "ancillary pktinfo recovery requires Linux",
        ))
    }
}

fn sockaddr_storage_to_socket_addr(storage: &libc::sockaddr_storage) -> Option<SocketAddr> {
    match i32::from(storage.ss_family) {
        libc::AF_INET => {
            // SAFETY: family checked; storage holds a valid sockaddr_in.
            let addr_in: libc::sockaddr_in =
                unsafe { std::ptr::read(storage as *const _ as *const libc::sockaddr_in) };
            let ip = std::net::Ipv4Addr::from(u32::from_be(addr_in.sin_addr.s_addr));
            Some(SocketAddr::new(IpAddr::V4(ip), u16::from_be(addr_in.sin_port)))
        }
        libc::AF_INET6 => {
            // SAFETY: family checked; storage holds a valid sockaddr_in6.
            let addr_in6: libc::sockaddr_in6 =
                unsafe { std::ptr::read(storage as *const _ as *const libc::sockaddr_in6) };
            let ip = Ipv6Addr::from(addr_in6.sin6_addr.s6_addr);
            Some(SocketAddr::new(IpAddr::V6(ip), u16::from_be(addr_in6.sin6_port)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use socket2::{Domain, Type};
    use std::net::Ipv4Addr;

    fn bound_udp_socket() -> (Socket, u16) {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("socket");
        socket
            .bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).into())
            .expect("bind");
        socket.set_nonblocking(true).expect("nonblocking");
        let port = socket
            .local_addr()
            .expect("local addr")
            .as_socket()
            .expect("socket addr")
            .port();
        (socket, port)
    }

    #[test]
    fn would_block_on_empty_socket() {
        let (socket, port) = bound_udp_socket();
        let reader = SocketReader::new(socket, port, true).expect("reader");
        let mut buf = Vec::new();
        let outcome = reader.read_one(&mut buf, 1500).expect("read");
        assert!(matches!(outcome, ReadOutcome::WouldBlock));
    }

    #[test]
    fn destination_required_for_udp_encap_ipv4() {
        let (socket, port) = bound_udp_socket();
        let reader = SocketReader::new(socket, port, true).expect("reader");
        assert!(reader.destination_required());
    }

    #[test]
    fn reads_loopback_datagram_and_recovers_destination() {
        let (recv_socket, recv_port) = bound_udp_socket();
        let reader = SocketReader::new(recv_socket, recv_port, true).expect("reader");

        let sender = Socket::new(Domain::IPV4, Type::DGRAM, None).expect("sender socket");
        let dest: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), recv_port);
        sender.send_to(b"hello", &dest.into()).expect("send");

        std::thread::sleep(std::time::Duration::from_millis(20));

        let mut buf = Vec::new();
        let outcome = reader.read_one(&mut buf, 1500).expect("read");
        match outcome {
            ReadOutcome::Data { len, src, dst } => {
                assert_eq!(len, 5);
                assert_eq!(buf, b"hello");
                assert_eq!(src.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
                assert_eq!(
                    dst.expect("destination recovered via IP_PKTINFO").ip(),
                    IpAddr::V4(Ipv4Addr::LOCALHOST)
                );
            }
            _ => panic!("expected Data outcome"),
        }
    }
}
