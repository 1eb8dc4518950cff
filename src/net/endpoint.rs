//! UDP endpoint descriptors.
//!
//! An [`Endpoint`] mirrors the native descriptor layout: family, 16 address
//! bytes, port, interface index. Any part may be left unset (family
//! `Unspec`, port 0, netif 0) to let the stack choose.
//!
//! # Text form
//!
//! ```text
//! [2001:db8::1]:5683      IPv6 with port
//! [fe80::1%3]:5683        IPv6 with interface index
//! [::1]                   IPv6, port unset
//! 192.0.2.7:5683          IPv4 with port
//! 192.0.2.7               IPv4, port unset
//! ```

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};
use std::str::FromStr;

use thiserror::Error;

/// Port value meaning "any / let the stack pick".
pub const ANY_PORT: u16 = 0;

/// Interface index meaning "any interface".
pub const ANY_NETIF: u16 = 0;

/// Address family of an [`Endpoint`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressFamily {
    /// No address given.
    #[default]
    Unspec,
    /// IPv6.
    Inet6,
    /// IPv4, stored in the first four address bytes.
    Inet4,
}

/// The text form could not be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Address/port badly formatted")]
pub struct EndpointParseError;

/// A possibly partial UDP endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Address family; `Unspec` means the address bytes are ignored.
    pub family: AddressFamily,
    /// Raw address bytes (IPv4 uses the first four).
    pub addr: [u8; 16],
    /// Port, or [`ANY_PORT`].
    pub port: u16,
    /// Interface index, or [`ANY_NETIF`].
    pub netif: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::any()
    }
}

impl Endpoint {
    /// Fully unset endpoint.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            family: AddressFamily::Unspec,
            addr: [0; 16],
            port: ANY_PORT,
            netif: ANY_NETIF,
        }
    }

    /// Endpoint with only a port.
    #[must_use]
    pub const fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Self::any()
        }
    }

    /// IPv6 endpoint.
    #[must_use]
    pub fn ipv6(addr: Ipv6Addr, port: u16) -> Self {
        Self {
            family: AddressFamily::Inet6,
            addr: addr.octets(),
            port,
            netif: ANY_NETIF,
        }
    }

    /// IPv4 endpoint.
    #[must_use]
    pub fn ipv4(addr: Ipv4Addr, port: u16) -> Self {
        let mut bytes = [0; 16];
        bytes[..4].copy_from_slice(&addr.octets());
        Self {
            family: AddressFamily::Inet4,
            addr: bytes,
            port,
            netif: ANY_NETIF,
        }
    }

    /// The address, if one is set.
    #[must_use]
    pub fn ip(&self) -> Option<IpAddr> {
        match self.family {
            AddressFamily::Unspec => None,
            AddressFamily::Inet6 => Some(IpAddr::V6(Ipv6Addr::from(self.addr))),
            AddressFamily::Inet4 => Some(IpAddr::V4(Ipv4Addr::new(
                self.addr[0],
                self.addr[1],
                self.addr[2],
                self.addr[3],
            ))),
        }
    }

    /// Socket address to bind or send to. An unset address maps to `[::]`.
    #[must_use]
    pub fn to_socket_addr(&self) -> SocketAddr {
        match self.ip() {
            Some(IpAddr::V4(v4)) => SocketAddr::V4(SocketAddrV4::new(v4, self.port)),
            Some(IpAddr::V6(v6)) => {
                SocketAddr::V6(SocketAddrV6::new(v6, self.port, 0, u32::from(self.netif)))
            }
            None => SocketAddr::V6(SocketAddrV6::new(
                Ipv6Addr::UNSPECIFIED,
                self.port,
                0,
                u32::from(self.netif),
            )),
        }
    }

    /// Describe a concrete socket address.
    #[must_use]
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        match addr {
            SocketAddr::V4(v4) => Self::ipv4(*v4.ip(), v4.port()),
            SocketAddr::V6(v6) => Self {
                netif: u16::try_from(v6.scope_id()).unwrap_or(ANY_NETIF),
                ..Self::ipv6(*v6.ip(), v6.port())
            },
        }
    }

    /// Whether a datagram source satisfies this endpoint used as a filter.
    ///
    /// Unset parts match anything. IPv4-mapped IPv6 sources compare equal to
    /// their IPv4 form.
    #[must_use]
    pub fn matches(&self, source: &SocketAddr) -> bool {
        if self.port != ANY_PORT && self.port != source.port() {
            return false;
        }
        match self.ip() {
            None => true,
            Some(ip) => canonical_ip(ip) == canonical_ip(source.ip()),
        }
    }
}

fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 @ IpAddr::V4(_) => v4,
    }
}

fn parse_port(s: &str) -> Result<u16, EndpointParseError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EndpointParseError);
    }
    s.parse().map_err(|_overflow| EndpointParseError)
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(rest) = s.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or(EndpointParseError)?;
            let (addr, netif) = match host.split_once('%') {
                Some((addr, netif)) => (addr, parse_port(netif)?),
                None => (host, ANY_NETIF),
            };
            let addr = Ipv6Addr::from_str(addr).map_err(|_bad| EndpointParseError)?;
            let port = match tail {
                "" => ANY_PORT,
                _ => parse_port(tail.strip_prefix(':').ok_or(EndpointParseError)?)?,
            };
            return Ok(Self {
                netif,
                ..Self::ipv6(addr, port)
            });
        }

        let (host, port) = match s.split_once(':') {
            Some((host, port)) => (host, parse_port(port)?),
            None => (s, ANY_PORT),
        };
        let addr = Ipv4Addr::from_str(host).map_err(|_bad| EndpointParseError)?;
        Ok(Self::ipv4(addr, port))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip() {
            Some(IpAddr::V4(v4)) => write!(f, "{}:{}", v4, self.port),
            Some(IpAddr::V6(v6)) if self.netif != ANY_NETIF => {
                write!(f, "[{}%{}]:{}", v6, self.netif, self.port)
            }
            Some(IpAddr::V6(v6)) => write!(f, "[{}]:{}", v6, self.port),
            None => write!(f, "[::]:{}", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ipv6_with_port() {
        let ep: Endpoint = "[2001:db8::1]:5683".parse().expect("valid endpoint");
        assert_eq!(ep.family, AddressFamily::Inet6);
        assert_eq!(ep.ip(), Some("2001:db8::1".parse().expect("ip")));
        assert_eq!(ep.port, 5683);
        assert_eq!(ep.netif, ANY_NETIF);
    }

    #[test]
    fn test_parse_ipv6_without_port() {
        let ep: Endpoint = "[::1]".parse().expect("valid endpoint");
        assert_eq!(ep.ip(), Some(IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert_eq!(ep.port, ANY_PORT);
    }

    #[test]
    fn test_parse_ipv6_with_netif() {
        let ep: Endpoint = "[fe80::1%7]:1234".parse().expect("valid endpoint");
        assert_eq!(ep.netif, 7);
        assert_eq!(ep.port, 1234);
        assert_eq!(ep.to_string(), "[fe80::1%7]:1234");
    }

    #[test]
    fn test_parse_ipv4() {
        let ep: Endpoint = "127.0.0.1:9000".parse().expect("valid endpoint");
        assert_eq!(ep.family, AddressFamily::Inet4);
        assert_eq!(ep.to_socket_addr(), "127.0.0.1:9000".parse().expect("addr"));

        let bare: Endpoint = "10.0.0.2".parse().expect("valid endpoint");
        assert_eq!(bare.port, ANY_PORT);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "::1",
            "[::1",
            "[::1]1234",
            "[::1]:",
            "[::1]:70000",
            "[::1]:-1",
            "[not-an-ip]:1",
            "[::1%x]:1",
            "localhost:80",
            "127.0.0.1:",
            "127.0.0.1:port",
        ] {
            assert_eq!(bad.parse::<Endpoint>(), Err(EndpointParseError), "{bad:?}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for text in ["[2001:db8::1]:5683", "[::1]:0", "192.0.2.7:53"] {
            let ep: Endpoint = text.parse().expect("valid endpoint");
            assert_eq!(ep.to_string(), text);
        }
        assert_eq!(Endpoint::with_port(99).to_string(), "[::]:99");
    }

    #[test]
    fn test_unset_address_binds_unspecified() {
        let addr = Endpoint::with_port(4000).to_socket_addr();
        assert_eq!(addr, "[::]:4000".parse().expect("addr"));
    }

    #[test]
    fn test_filter_matching() {
        let src: SocketAddr = "[::ffff:127.0.0.1]:5000".parse().expect("addr");

        assert!(Endpoint::any().matches(&src));
        assert!(Endpoint::with_port(5000).matches(&src));
        assert!(!Endpoint::with_port(5001).matches(&src));
        assert!(Endpoint::ipv4(Ipv4Addr::LOCALHOST, 0).matches(&src));
        assert!(!Endpoint::ipv6(Ipv6Addr::LOCALHOST, 5000).matches(&src));
    }

    #[test]
    fn test_from_socket_addr_keeps_scope() {
        let addr: SocketAddr = "[fe80::2%4]:8080".parse().expect("addr");
        let ep = Endpoint::from_socket_addr(addr);
        assert_eq!(ep.netif, 4);
        assert_eq!(ep.port, 8080);
    }
}
