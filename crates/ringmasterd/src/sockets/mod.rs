//! Pre-bound listening sockets shared with supervised processes.
//!
//! Sockets are bound once, before any worker exists, and their descriptors
//! are inherited by every process generation. Restarting a worker therefore
//! never recreates the listening socket.

mod errors;
mod options;
mod set;
mod socket;

pub use errors::SocketError;
pub use options::{AddressFamily, Protocol, SocketKind};
pub use set::{InheritedSocket, SocketSet};
pub use socket::{Socket, SocketAddress, SocketInfo};

pub(crate) const SOCKETS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::sockets");
