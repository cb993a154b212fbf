//! Typed socket parameters parsed from manifest strings.

use serde::Serialize;
use strum::{Display, EnumString};

/// Address family of a managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum AddressFamily {
    /// IPv4.
    #[strum(to_string = "AF_INET", serialize = "inet", serialize = "ipv4")]
    Inet,
    /// IPv6.
    #[strum(to_string = "AF_INET6", serialize = "inet6", serialize = "ipv6")]
    Inet6,
    /// Filesystem (Unix domain) socket.
    #[strum(to_string = "AF_UNIX", serialize = "unix")]
    Unix,
}

impl AddressFamily {
    pub(crate) const fn domain(self) -> socket2::Domain {
        match self {
            Self::Inet => socket2::Domain::IPV4,
            Self::Inet6 => socket2::Domain::IPV6,
            Self::Unix => socket2::Domain::UNIX,
        }
    }
}

/// Communication semantics of a managed socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum SocketKind {
    /// Connection-oriented byte stream; listens after bind.
    #[strum(to_string = "SOCK_STREAM", serialize = "stream")]
    Stream,
    /// Connectionless datagrams; never listens.
    #[strum(to_string = "SOCK_DGRAM", serialize = "dgram", serialize = "datagram")]
    Datagram,
}

impl SocketKind {
    pub(crate) const fn socket_type(self) -> socket2::Type {
        match self {
            Self::Stream => socket2::Type::STREAM,
            Self::Datagram => socket2::Type::DGRAM,
        }
    }

    pub(crate) const fn scheme(self) -> &'static str {
        match self {
            Self::Stream => "tcp",
            Self::Datagram => "udp",
        }
    }
}

/// Transport protocol requested when creating the socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display, Serialize)]
#[strum(ascii_case_insensitive)]
pub enum Protocol {
    /// Let the OS pick (protocol number 0).
    #[default]
    #[strum(to_string = "default", serialize = "", serialize = "0", serialize = "ip")]
    Default,
    /// TCP.
    #[strum(to_string = "tcp", serialize = "6")]
    Tcp,
    /// UDP.
    #[strum(to_string = "udp", serialize = "17")]
    Udp,
}

impl Protocol {
    pub(crate) const fn protocol(self) -> Option<socket2::Protocol> {
        match self {
            Self::Default => None,
            Self::Tcp => Some(socket2::Protocol::TCP),
            Self::Udp => Some(socket2::Protocol::UDP),
        }
    }
}
