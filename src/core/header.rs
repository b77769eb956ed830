// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PGM common packet header (RFC 3208 Sec.8.1).
//!
//! Only the fixed 16-byte common header is modeled here. Per-type option
//! extensions (Sec.9.11-9.23) are out of scope; [`PacketType`] is enough
//! to route a packet to the right handler.

use crate::core::gsi::Gsi;
use std::fmt;

/// Length in bytes of the fixed PGM common header.
pub const COMMON_HEADER_LEN: usize = 16;

/// PGM packet type (low 7 bits of the type octet; the options-present bit
/// lives alongside it but is tracked separately via [`CommonHeader::options_present`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacketType {
    Spm,
    Poll,
    Polr,
    Odata,
    Rdata,
    Nak,
    Nnak,
    Ncf,
    Spmr,
    Unknown(u8),
}

impl PacketType {
    fn from_byte(b: u8) -> Self {
        match b {
            0x00 => Self::Spm,
            0x01 => Self::Poll,
            0x02 => Self::Polr,
            0x04 => Self::Odata,
            0x05 => Self::Rdata,
            0x08 => Self::Nak,
            0x09 => Self::Nnak,
            0x0a => Self::Ncf,
            0x0c => Self::Spmr,
            other => Self::Unknown(other),
        }
    }

    /// True for ODATA/RDATA, the two carriers of application payload.
    pub fn is_data(&self) -> bool {
        matches!(self, Self::Odata | Self::Rdata)
    }

    /// True for the types a downstream (receiver-facing) handler accepts.
    pub fn is_downstream(&self) -> bool {
        matches!(self, Self::Odata | Self::Rdata | Self::Ncf | Self::Spm | Self::Poll)
    }

    /// True for the types that can be handled by either the upstream or
    /// peer path depending on which port the packet targets.
    pub fn is_upstream_or_peer(&self) -> bool {
        matches!(self, Self::Nak | Self::Nnak | Self::Spmr | Self::Polr)
    }

    /// True for the types the peer-only path accepts (no upstream variant).
    pub fn is_peer_only(&self) -> bool {
        matches!(self, Self::Nak | Self::Spmr)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Spm => "SPM",
            Self::Poll => "POLL",
            Self::Polr => "POLR",
            Self::Odata => "ODATA",
            Self::Rdata => "RDATA",
            Self::Nak => "NAK",
            Self::Nnak => "NNAK",
            Self::Ncf => "NCF",
            Self::Spmr => "SPMR",
            Self::Unknown(b) => return write!(f, "UNKNOWN(0x{b:02x})"),
        };
        f.write_str(s)
    }
}

/// Parsed view of the 16-byte PGM common header.
#[derive(Clone, Copy, Debug)]
pub struct CommonHeader {
    pub source_port: u16,
    pub dest_port: u16,
    pub packet_type: PacketType,
    pub options_present: bool,
    pub checksum: u16,
    pub gsi: Gsi,
    pub tsdu_length: u16,
}

/// A structurally valid header failed a semantic check during parsing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderError {
    Truncated,
    ChecksumMismatch,
}

impl CommonHeader {
    /// Parse the common header from `buf`, verifying the checksum over the
    /// full packet (`buf`) when `checksum_enabled` is true.
    ///
    /// A zero checksum field in the wire data means the sender opted out
    /// of checksumming that packet (RFC 3208 Sec.8.1); such packets are
    /// accepted without verification, matching the reference behavior.
    pub fn parse(buf: &[u8], checksum_enabled: bool) -> Result<Self, HeaderError> {
        if buf.len() < COMMON_HEADER_LEN {
            return Err(HeaderError::Truncated);
        }
        let source_port = u16::from_be_bytes([buf[0], buf[1]]);
        let dest_port = u16::from_be_bytes([buf[2], buf[3]]);
        let type_octet = buf[4];
        let options_present = buf[5] & 0x01 != 0;
        let checksum = u16::from_be_bytes([buf[6], buf[7]]);
        let gsi = Gsi::from_slice(&buf[8..14]).ok_or(HeaderError::Truncated)?;
        let tsdu_length = u16::from_be_bytes([buf[14], buf[15]]);

        if checksum_enabled && checksum != 0 && ones_complement_checksum(buf) != 0 {
            return Err(HeaderError::ChecksumMismatch);
        }

        Ok(Self {
            source_port,
            dest_port,
            packet_type: PacketType::from_byte(type_octet),
            options_present,
            checksum,
            gsi,
            tsdu_length,
        })
    }
}

/// RFC 1071 one's-complement checksum, computed over the header's own
/// checksum field (which must be zeroed by the caller for TX, or left in
/// place for RX verification where a correct packet sums to zero).
fn ones_complement_checksum(buf: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = buf.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}
