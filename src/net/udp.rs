//! UDP sockets behind a small native-style interface.
//!
//! [`DatagramStack`] and [`DatagramSocket`] are the seam between the script
//! bindings and whatever actually moves datagrams. [`StdDatagramStack`] is the
//! host implementation on top of `std::net::UdpSocket`.
//!
//! # Endpoint rules
//!
//! - A local endpoint without an address binds the unspecified address
//!   (`[::]`, falling back to `0.0.0.0` when IPv6 is unavailable).
//! - A remote endpoint must carry both an address and a port, otherwise the
//!   call fails with [`SockError::InvalidEndpoints`].
//! - IPv4 remotes are reached through IPv4-mapped addresses on IPv6 sockets.

use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV6, UdpSocket};
use std::time::{Duration, Instant};

use super::endpoint::{AddressFamily, Endpoint, ANY_PORT};
use super::error::SockError;

/// Flag: allow several sockets to bind the same local endpoint.
pub const REUSE_EP: u16 = 0x0001;

/// Largest UDP payload; receive buffers never grow past this.
pub const MAX_DATAGRAM_LEN: usize = 65_535;

/// How long `recv` may block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeout {
    /// Return immediately if nothing is queued.
    NonBlocking,
    /// Give up after this long.
    After(Duration),
    /// Block until a datagram arrives.
    Forever,
}

impl RecvTimeout {
    /// `0` is non-blocking, negative waits forever, positive is milliseconds.
    #[must_use]
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            0 => Self::NonBlocking,
            ms if ms < 0 => Self::Forever,
            ms => Self::After(Duration::from_millis(ms.unsigned_abs())),
        }
    }
}

/// Factory for datagram sockets.
pub trait DatagramStack: fmt::Debug {
    /// Create a socket bound to `local` and, if given, defaulting to `remote`.
    fn create(
        &self,
        local: Option<&Endpoint>,
        remote: Option<&Endpoint>,
        flags: u16,
    ) -> Result<Box<dyn DatagramSocket>, SockError>;
}

/// An open datagram socket. Dropping it closes it.
pub trait DatagramSocket: fmt::Debug {
    /// Send one datagram to `remote`, or to the default remote.
    fn send(&mut self, data: &[u8], remote: Option<&Endpoint>) -> Result<usize, SockError>;

    /// Receive one datagram of at most `max_len` bytes.
    ///
    /// `max_len` is capped at [`MAX_DATAGRAM_LEN`].
    ///
    /// With a `remote` filter, datagrams from other sources are discarded
    /// while time remains.
    fn recv(
        &mut self,
        max_len: usize,
        timeout: RecvTimeout,
        remote: Option<&Endpoint>,
    ) -> Result<Vec<u8>, SockError>;

    /// The endpoint the socket is bound to.
    fn local_endpoint(&self) -> Result<Endpoint, SockError>;
}

/// Host UDP stack backed by `std::net`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDatagramStack;

impl StdDatagramStack {
    /// Create the host stack.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn check_remote(remote: &Endpoint) -> Result<(), SockError> {
    if remote.family == AddressFamily::Unspec || remote.port == ANY_PORT {
        return Err(SockError::InvalidEndpoints);
    }
    Ok(())
}

fn bind(addr: SocketAddr, flags: u16) -> io::Result<UdpSocket> {
    if flags & REUSE_EP != 0 {
        bind_reusable(addr)
    } else {
        UdpSocket::bind(addr)
    }
}

#[cfg(unix)]
fn bind_reusable(addr: SocketAddr) -> io::Result<UdpSocket> {
    use std::mem;
    use std::os::unix::io::FromRawFd;

    let domain = if addr.is_ipv4() {
        libc::AF_INET
    } else {
        libc::AF_INET6
    };

    // SAFETY: socket(2) takes no pointers; the result is checked before use.
    let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: `fd` was just created and is owned by nothing else.
    let socket = unsafe { UdpSocket::from_raw_fd(fd) };

    let one: libc::c_int = 1;
    // SAFETY: `fd` is open; the option value points to a live c_int of the given size.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            (&one as *const libc::c_int).cast::<libc::c_void>(),
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    let rc = match addr {
        SocketAddr::V4(v4) => {
            // SAFETY: sockaddr_in is plain old data; all-zero is a valid value.
            let mut sa: libc::sockaddr_in = unsafe { mem::zeroed() };
            sa.sin_family = libc::AF_INET as libc::sa_family_t;
            sa.sin_port = v4.port().to_be();
            sa.sin_addr.s_addr = u32::from_ne_bytes(v4.ip().octets());
            // SAFETY: `sa` is initialized and the length is its exact size.
            unsafe {
                libc::bind(
                    fd,
                    (&sa as *const libc::sockaddr_in).cast::<libc::sockaddr>(),
                    mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
                )
            }
        }
        SocketAddr::V6(v6) => {
            // SAFETY: sockaddr_in6 is plain old data; all-zero is a valid value.
            let mut sa: libc::sockaddr_in6 = unsafe { mem::zeroed() };
            sa.sin6_family = libc::AF_INET6 as libc::sa_family_t;
            sa.sin6_port = v6.port().to_be();
            sa.sin6_addr.s6_addr = v6.ip().octets();
            sa.sin6_scope_id = v6.scope_id();
            // SAFETY: `sa` is initialized and the length is its exact size.
            unsafe {
                libc::bind(
                    fd,
                    (&sa as *const libc::sockaddr_in6).cast::<libc::sockaddr>(),
                    mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t,
                )
            }
        }
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(socket)
}

#[cfg(not(unix))]
fn bind_reusable(addr: SocketAddr) -> io::Result<UdpSocket> {
    log::warn!("REUSE_EP is not supported on this platform; binding {addr} exclusively");
    UdpSocket::bind(addr)
}

/// Bind the local side, picking the unspecified address of the right family.
fn bind_local(
    local: &Endpoint,
    remote: Option<&Endpoint>,
    flags: u16,
) -> Result<UdpSocket, SockError> {
    let unspecified_v4 = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), local.port);

    if local.family != AddressFamily::Unspec {
        return bind(local.to_socket_addr(), flags).map_err(SockError::from);
    }
    if remote.is_some_and(|r| r.family == AddressFamily::Inet4) {
        return bind(unspecified_v4, flags).map_err(SockError::from);
    }

    match bind(local.to_socket_addr(), flags) {
        Ok(socket) => Ok(socket),
        Err(e) => match SockError::from(&e) {
            SockError::AfNotSupported | SockError::AddrNotAvailable => {
                log::debug!("IPv6 unavailable ({e}), binding IPv4 instead");
                bind(unspecified_v4, flags).map_err(SockError::from)
            }
            other => Err(other),
        },
    }
}

impl DatagramStack for StdDatagramStack {
    fn create(
        &self,
        local: Option<&Endpoint>,
        remote: Option<&Endpoint>,
        flags: u16,
    ) -> Result<Box<dyn DatagramSocket>, SockError> {
        if let Some(remote) = remote {
            check_remote(remote)?;
        }
        if let (Some(l), Some(r)) = (local, remote) {
            if l.family != AddressFamily::Unspec && l.family != r.family {
                return Err(SockError::InvalidEndpoints);
            }
        }

        let local = local.copied().unwrap_or_default();
        let socket = bind_local(&local, remote, flags)?;
        let sock = StdDatagramSocket { socket };

        if let Some(remote) = remote {
            let target = sock.fit(remote.to_socket_addr());
            sock.socket.connect(target)?;
        }

        log::debug!(
            "UDP socket created (local={}, remote={})",
            sock.local_endpoint()
                .map_or_else(|e| e.to_string(), |ep| ep.to_string()),
            remote.map_or_else(|| "-".to_string(), ToString::to_string)
        );

        Ok(Box::new(sock))
    }
}

/// Socket created by [`StdDatagramStack`].
#[derive(Debug)]
pub struct StdDatagramSocket {
    socket: UdpSocket,
}

impl StdDatagramSocket {
    /// Adapt a destination to the socket's own family.
    fn fit(&self, addr: SocketAddr) -> SocketAddr {
        let local_is_v6 = self.socket.local_addr().map_or(true, |a| a.is_ipv6());
        match addr {
            SocketAddr::V4(v4) if local_is_v6 => {
                SocketAddr::V6(SocketAddrV6::new(v4.ip().to_ipv6_mapped(), v4.port(), 0, 0))
            }
            SocketAddr::V6(v6) if !local_is_v6 => match v6.ip().to_ipv4_mapped() {
                Some(v4) => SocketAddr::new(IpAddr::V4(v4), v6.port()),
                None => addr,
            },
            _ => addr,
        }
    }

    fn apply_timeout(&self, timeout: RecvTimeout, deadline: Option<Instant>) -> Result<(), SockError> {
        match timeout {
            RecvTimeout::NonBlocking => self.socket.set_nonblocking(true)?,
            RecvTimeout::Forever => {
                self.socket.set_nonblocking(false)?;
                self.socket.set_read_timeout(None)?;
            }
            RecvTimeout::After(_) => {
                let remaining = deadline
                    .map(|d| d.saturating_duration_since(Instant::now()))
                    .unwrap_or_default();
                if remaining.is_zero() {
                    return Err(SockError::TimedOut);
                }
                self.socket.set_nonblocking(false)?;
                self.socket.set_read_timeout(Some(remaining))?;
            }
        }
        Ok(())
    }
}

impl DatagramSocket for StdDatagramSocket {
    fn send(&mut self, data: &[u8], remote: Option<&Endpoint>) -> Result<usize, SockError> {
        match remote {
            Some(remote) => {
                check_remote(remote)?;
                let target = self.fit(remote.to_socket_addr());
                Ok(self.socket.send_to(data, target)?)
            }
            None => Ok(self.socket.send(data)?),
        }
    }

    fn recv(
        &mut self,
        max_len: usize,
        timeout: RecvTimeout,
        remote: Option<&Endpoint>,
    ) -> Result<Vec<u8>, SockError> {
        let deadline = match timeout {
            RecvTimeout::After(d) => Some(Instant::now() + d),
            _ => None,
        };
        let mut buf = vec![0u8; max_len.min(MAX_DATAGRAM_LEN)];

        loop {
            self.apply_timeout(timeout, deadline)?;

            let (n, source) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) => {
                    return Err(match e.kind() {
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => match timeout {
                            RecvTimeout::NonBlocking => SockError::WouldBlock,
                            _ => SockError::TimedOut,
                        },
                        _ => SockError::from(&e),
                    });
                }
            };

            match remote {
                Some(filter) if !filter.matches(&source) => {
                    log::debug!("Dropping datagram from {source} (expecting {filter})");
                }
                _ => {
                    buf.truncate(n);
                    return Ok(buf);
                }
            }
        }
    }

    fn local_endpoint(&self) -> Result<Endpoint, SockError> {
        Ok(Endpoint::from_socket_addr(self.socket.local_addr()?))
    }
}
