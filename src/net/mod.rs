//! Datagram networking.
//!
//! - [`endpoint`] - endpoint descriptors and their text form
//! - [`error`] - errno-based error taxonomy with fixed messages
//! - [`udp`] - socket traits and the host `std::net` implementation

pub mod endpoint;
pub mod error;
pub mod udp;

pub use endpoint::{AddressFamily, Endpoint, EndpointParseError};
pub use error::SockError;
pub use udp::{DatagramSocket, DatagramStack, RecvTimeout, StdDatagramStack, MAX_DATAGRAM_LEN, REUSE_EP};
