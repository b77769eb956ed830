// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the receive path.
//!
//! Hand-rolled enums with manual `Display` impls, matching the rest of the
//! stack's error style rather than pulling in a derive-macro crate for it.

use crate::core::tsi::Tsi;
use std::fmt;

/// Failure surfaced to the caller of `recvmsgv`/`recvmsg`/`recvfrom`/`recv`.
#[derive(Debug)]
pub enum RecvError {
    /// The underlying socket's file descriptor was invalid or closed.
    BadFileDescriptor,
    /// A syscall during the wait-for-event path returned an unexpected fault.
    Fault,
    /// The blocking wait was interrupted and no data became available.
    Interrupted,
    /// An invalid argument was passed (e.g. a zero timeout).
    Invalid,
    /// Allocation failed while growing a receive buffer.
    NoMemory,
    /// Catch-all for I/O errors not covered by a more specific variant.
    Failed(std::io::Error),
    /// The peer's GSI was reused with an incompatible session; the caller
    /// must treat this source as reset before further delivery.
    ConnReset { tsi: Tsi },
}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadFileDescriptor => write!(f, "bad file descriptor"),
            Self::Fault => write!(f, "fault during event wait"),
            Self::Interrupted => write!(f, "receive interrupted"),
            Self::Invalid => write!(f, "invalid argument"),
            Self::NoMemory => write!(f, "out of memory"),
            Self::Failed(err) => write!(f, "receive failed: {err}"),
            Self::ConnReset { tsi } => write!(f, "connection reset for source {tsi}"),
        }
    }
}

impl std::error::Error for RecvError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl RecvError {
    /// Map an `errno` observed from a failed syscall, matching the mapping
    /// the receive path uses when translating raw `recvmsg`/`poll` failures.
    pub fn from_io_error(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        if err.raw_os_error() == Some(libc::EFAULT) {
            return Self::Fault;
        }
        match err.kind() {
            ErrorKind::InvalidInput => Self::Invalid,
            ErrorKind::Interrupted => Self::Interrupted,
            ErrorKind::OutOfMemory => Self::NoMemory,
            _ => Self::Failed(err),
        }
    }
}

/// Failure parsing a single datagram into a common-header-delimited frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The header's checksum did not match the packet contents.
    ChecksumMismatch,
    /// The packet was too short, or a nested length field ran past the end
    /// of the datagram.
    Malformed,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::Malformed => write!(f, "malformed packet"),
        }
    }
}

impl std::error::Error for ParseError {}

impl From<crate::core::header::HeaderError> for ParseError {
    fn from(err: crate::core::header::HeaderError) -> Self {
        match err {
            crate::core::header::HeaderError::Truncated => Self::Malformed,
            crate::core::header::HeaderError::ChecksumMismatch => Self::ChecksumMismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mapping_prefers_specific_variants() {
        let err = std::io::Error::from(std::io::ErrorKind::InvalidInput);
        assert!(matches!(RecvError::from_io_error(err), RecvError::Invalid));
    }

    #[test]
    fn io_error_mapping_falls_back_to_failed() {
        let err = std::io::Error::other("boom");
        assert!(matches!(RecvError::from_io_error(err), RecvError::Failed(_)));
    }

    #[test]
    fn io_error_mapping_maps_efault() {
        let err = std::io::Error::from_raw_os_error(libc::EFAULT);
        assert!(matches!(RecvError::from_io_error(err), RecvError::Fault));
    }

    #[test]
    fn header_error_converts_to_parse_error() {
        let err: ParseError = crate::core::header::HeaderError::ChecksumMismatch.into();
        assert_eq!(err, ParseError::ChecksumMismatch);
    }
}
