//! Socket error taxonomy.
//!
//! Native socket calls report negative errno values. [`SockError`] names the
//! ones scripts care about and carries a fixed, human-readable message for
//! each; everything else collapses to `"Unknown error"`.

use std::io;

use thiserror::Error;

/// A failed socket operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SockError {
    /// `-EINVAL`: endpoints are inconsistent or incomplete.
    #[error("Invalid endpoints")]
    InvalidEndpoints,
    /// `-EAFNOSUPPORT`: the address family is not available.
    #[error("Socket type not supported")]
    AfNotSupported,
    /// `-EADDRINUSE`: the local endpoint is taken.
    #[error("Address in use")]
    AddrInUse,
    /// `-EADDRNOTAVAIL`: the local address is not assigned to this host.
    #[error("Address not available")]
    AddrNotAvailable,
    /// `-ENOTCONN`: no remote given and the socket has no default remote.
    #[error("No remote endpoint")]
    NotConnected,
    /// `-EAGAIN`: non-blocking receive found nothing.
    #[error("No data available")]
    WouldBlock,
    /// `-ETIMEDOUT`: the receive timeout expired.
    #[error("Timed out")]
    TimedOut,
    /// `-EHOSTUNREACH` / `-ENETUNREACH`: no route to the remote.
    #[error("Host unreachable")]
    Unreachable,
    /// `-EMSGSIZE`: the datagram does not fit.
    #[error("Message too large")]
    MessageTooLarge,
    /// `-ENOMEM` / `-ENOBUFS`: out of buffers.
    #[error("Out of memory")]
    NoMemory,
    /// `-EBADF`: the socket was closed.
    #[error("Socket closed")]
    Closed,
    /// Any other negative code.
    #[error("Unknown error")]
    Other(i32),
}

impl SockError {
    /// Map a negative errno to an error.
    #[must_use]
    pub fn from_errno(code: i32) -> Self {
        match code.saturating_neg() {
            libc::EINVAL => Self::InvalidEndpoints,
            libc::EAFNOSUPPORT => Self::AfNotSupported,
            libc::EADDRINUSE => Self::AddrInUse,
            libc::EADDRNOTAVAIL => Self::AddrNotAvailable,
            libc::ENOTCONN | libc::EDESTADDRREQ => Self::NotConnected,
            // EWOULDBLOCK is EAGAIN on every supported platform
            libc::EAGAIN => Self::WouldBlock,
            libc::ETIMEDOUT => Self::TimedOut,
            libc::EHOSTUNREACH | libc::ENETUNREACH => Self::Unreachable,
            libc::EMSGSIZE => Self::MessageTooLarge,
            libc::ENOMEM | libc::ENOBUFS => Self::NoMemory,
            libc::EBADF => Self::Closed,
            _ => Self::Other(code),
        }
    }

    /// The negative errno this error stands for.
    #[must_use]
    pub fn errno(self) -> i32 {
        match self {
            Self::InvalidEndpoints => -libc::EINVAL,
            Self::AfNotSupported => -libc::EAFNOSUPPORT,
            Self::AddrInUse => -libc::EADDRINUSE,
            Self::AddrNotAvailable => -libc::EADDRNOTAVAIL,
            Self::NotConnected => -libc::ENOTCONN,
            Self::WouldBlock => -libc::EAGAIN,
            Self::TimedOut => -libc::ETIMEDOUT,
            Self::Unreachable => -libc::EHOSTUNREACH,
            Self::MessageTooLarge => -libc::EMSGSIZE,
            Self::NoMemory => -libc::ENOMEM,
            Self::Closed => -libc::EBADF,
            Self::Other(code) => code,
        }
    }

    /// Message for a failed socket creation.
    ///
    /// Creation only distinguishes invalid endpoints, unsupported family and
    /// address in use; everything else reads `"Unknown error"`.
    #[must_use]
    pub fn create_message(self) -> &'static str {
        match self {
            Self::InvalidEndpoints => "Invalid endpoints",
            Self::AfNotSupported => "Socket type not supported",
            Self::AddrInUse => "Address in use",
            _ => "Unknown error",
        }
    }
}

impl From<&io::Error> for SockError {
    fn from(err: &io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            return Self::from_errno(-code);
        }
        match err.kind() {
            io::ErrorKind::WouldBlock => Self::WouldBlock,
            io::ErrorKind::TimedOut => Self::TimedOut,
            io::ErrorKind::AddrInUse => Self::AddrInUse,
            io::ErrorKind::AddrNotAvailable => Self::AddrNotAvailable,
            io::ErrorKind::NotConnected => Self::NotConnected,
            io::ErrorKind::InvalidInput => Self::InvalidEndpoints,
            io::ErrorKind::OutOfMemory => Self::NoMemory,
            _ => Self::Other(-libc::EIO),
        }
    }
}

impl From<io::Error> for SockError {
    fn from(err: io::Error) -> Self {
        Self::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_messages() {
        assert_eq!(
            SockError::from_errno(-libc::EADDRINUSE).create_message(),
            "Address in use"
        );
        assert_eq!(
            SockError::from_errno(-libc::EINVAL).create_message(),
            "Invalid endpoints"
        );
        assert_eq!(
            SockError::from_errno(-libc::EAFNOSUPPORT).create_message(),
            "Socket type not supported"
        );
        assert_eq!(
            SockError::from_errno(-libc::ENOMEM).create_message(),
            "Unknown error"
        );
        assert_eq!(SockError::from_errno(-9999).create_message(), "Unknown error");
    }

    #[test]
    fn test_errno_round_trip_for_named_codes() {
        for err in [
            SockError::InvalidEndpoints,
            SockError::AfNotSupported,
            SockError::AddrInUse,
            SockError::NotConnected,
            SockError::WouldBlock,
            SockError::TimedOut,
            SockError::Closed,
        ] {
            assert_eq!(SockError::from_errno(err.errno()), err);
        }
    }

    #[test]
    fn test_unknown_code_keeps_value() {
        let err = SockError::from_errno(-4242);
        assert_eq!(err, SockError::Other(-4242));
        assert_eq!(err.errno(), -4242);
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[test]
    fn test_from_io_error() {
        let err = io::Error::from_raw_os_error(libc::EADDRINUSE);
        assert_eq!(SockError::from(&err), SockError::AddrInUse);

        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(SockError::from(err), SockError::TimedOut);
    }
}
