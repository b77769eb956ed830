// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! `IP_PKTINFO` / `IPV6_RECVPKTINFO` helpers for recovering the true
//! destination address a datagram arrived on.
//!
//! Destination recovery via ancillary control data is mandatory whenever
//! the receive socket is UDP-encapsulated or IPv6. This module enables the
//! kernel to attach that control data to each `recvmsg` call and parses it
//! back into a [`PacketInfo`].
//!
//! # Linux
//!
//! Uses `IP_PKTINFO` for IPv4 and `IPV6_RECVPKTINFO` for IPv6.
//!
//! # Other platforms
//!
//! Not yet implemented; [`SocketReader::read_one`](crate::transport::socket_reader::SocketReader::read_one)
//! falls back to treating destination recovery as unavailable.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[cfg(target_os = "linux")]
use std::os::unix::io::RawFd;

/// The local address and arrival interface a datagram was delivered to,
/// recovered from ancillary control data.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketInfo {
    /// Local address the datagram was delivered to.
    pub dest_addr: IpAddr,
    /// Arrival interface index (IPv6 only; always 0 for IPv4).
    pub interface_index: u32,
}

impl PacketInfo {
    pub fn ipv4(addr: Ipv4Addr) -> Self {
        Self {
            dest_addr: IpAddr::V4(addr),
            interface_index: 0,
        }
    }

    pub fn ipv6(addr: Ipv6Addr, interface_index: u32) -> Self {
        Self {
            dest_addr: IpAddr::V6(addr),
            interface_index,
        }
    }

    pub fn is_ipv6(&self) -> bool {
        self.dest_addr.is_ipv6()
    }
}

/// Enable `IP_PKTINFO` on a socket so future `recvmsg` calls attach the
/// local destination address as ancillary data.
#[cfg(target_os = "linux")]
pub fn enable_pktinfo_v4(fd: RawFd) -> io::Result<()> {
    let val: libc::c_int = 1;
    // SAFETY: fd is a valid socket fd owned by the caller; val is a live
    // c_int on the stack matching the option's expected length.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            libc::IP_PKTINFO,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Enable `IPV6_RECVPKTINFO` on a socket.
#[cfg(target_os = "linux")]
pub fn enable_pktinfo_v6(fd: RawFd) -> io::Result<()> {
    let val: libc::c_int = 1;
    // SAFETY: fd is a valid socket fd owned by the caller; val is a live
    // c_int on the stack matching the option's expected length.
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IPV6,
            libc::IPV6_RECVPKTINFO,
            &val as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Enable pktinfo on a socket for either address family.
#[cfg(target_os = "linux")]
pub fn enable_pktinfo(fd: RawFd, is_ipv6: bool) -> io::Result<()> {
    if is_ipv6 {
        enable_pktinfo_v6(fd)
    } else {
        enable_pktinfo_v4(fd)
    }
}

/// Aligned buffer for ancillary control messages returned by `recvmsg`.
/// `cmsghdr` requires pointer alignment on most platforms.
#[repr(C, align(8))]
#[derive(Clone, Copy)]
pub struct AlignedCmsgBuf {
    data: [u8; 128],
}

impl AlignedCmsgBuf {
    pub const SIZE: usize = 128;

    pub fn new() -> Self {
        Self { data: [0u8; 128] }
    }

    pub fn len(&self) -> usize {
        Self::SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr()
    }
}

impl Default for AlignedCmsgBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an `IP_PKTINFO` control message into the destination it carries.
/// Returns `None` if `cmsg` is not an `IP_PKTINFO` message.
#[cfg(target_os = "linux")]
pub fn parse_pktinfo_v4(cmsg: &libc::cmsghdr) -> Option<PacketInfo> {
    if cmsg.cmsg_level != libc::IPPROTO_IP || cmsg.cmsg_type != libc::IP_PKTINFO {
        return None;
    }
    // SAFETY: level/type verified above; CMSG_DATA points at a live
    // in_pktinfo payload for the duration of this call.
    let data_ptr = unsafe { libc::CMSG_DATA(cmsg as *const _ as *mut _) };
    let pktinfo: libc::in_pktinfo =
        unsafe { std::ptr::read_unaligned(data_ptr as *const libc::in_pktinfo) };
    let addr = Ipv4Addr::from(u32::from_ne_bytes(pktinfo.ipi_addr.s_addr.to_ne_bytes()));
    Some(PacketInfo::ipv4(addr))
}

/// Parse an `IPV6_PKTINFO` control message into the destination it carries.
#[cfg(target_os = "linux")]
pub fn parse_pktinfo_v6(cmsg: &libc::cmsghdr) -> Option<PacketInfo> {
    if cmsg.cmsg_level != libc::IPPROTO_IPV6 || cmsg.cmsg_type != libc::IPV6_PKTINFO {
        return None;
    }
    // SAFETY: level/type verified above; CMSG_DATA points at a live
    // in6_pktinfo payload for the duration of this call.
    let data_ptr = unsafe { libc::CMSG_DATA(cmsg as *const _ as *mut _) };
    let pktinfo: libc::in6_pktinfo =
        unsafe { std::ptr::read_unaligned(data_ptr as *const libc::in6_pktinfo) };
    let addr = Ipv6Addr::from(pktinfo.ipi6_addr.s6_addr);
    Some(PacketInfo::ipv6(addr, pktinfo.ipi6_ifindex))
}

#[cfg(not(target_os = "linux"))]
pub fn enable_pktinfo_v4(_fd: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pktinfo not supported on this platform",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn enable_pktinfo_v6(_fd: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pktinfo not supported on this platform",
    ))
}

#[cfg(not(target_os = "linux"))]
pub fn enable_pktinfo(_fd: i32, _is_ipv6: bool) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "pktinfo not supported on this platform",
    ))
}
