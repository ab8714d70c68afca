//! Peer addressing on both sides of the adapter.
//!
//! [`Endpoint`] is what the datagram socket speaks, [`Session`] is what the
//! DTLS engine keys its peers by. The two carry the same address, port and
//! interface triple. Translation between them lives in [`crate::netif`].

use std::fmt;
use std::net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6};

/// Address family tag of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4, stored as an IPv4-mapped IPv6 address.
    Inet,
    /// IPv6.
    Inet6,
}

impl AddressFamily {
    /// Family implied by a 16 byte address.
    pub fn of(addr: &[u8; 16]) -> Self {
        if Ipv6Addr::from(*addr).to_ipv4_mapped().is_some() {
            AddressFamily::Inet
        } else {
            AddressFamily::Inet6
        }
    }
}

/// Remote (or local) datagram endpoint as seen by the socket layer.
///
/// The family is always the one implied by the address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    family: AddressFamily,
    addr: [u8; 16],
    port: u16,
    netif: u16,
}

impl Endpoint {
    pub fn new(addr: IpAddr, port: u16, netif: u16) -> Self {
        let v6 = match addr {
            IpAddr::V4(v4) => v4.to_ipv6_mapped(),
            IpAddr::V6(v6) => v6,
        };
        Self::from_octets(v6.octets(), port, netif)
    }

    /// Build from the 16 byte form, IPv4 given as `::ffff:a.b.c.d`.
    pub fn from_octets(addr: [u8; 16], port: u16, netif: u16) -> Self {
        Endpoint {
            family: AddressFamily::of(&addr),
            addr,
            port,
            netif,
        }
    }

    #[inline(always)]
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Always the IPv6 form. IPv4 endpoints use the mapped form.
    #[inline(always)]
    pub fn octets(&self) -> [u8; 16] {
        self.addr
    }

    #[inline(always)]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Interface identifier. 0 means any interface.
    #[inline(always)]
    pub fn netif(&self) -> u16 {
        self.netif
    }

    pub fn ip(&self) -> IpAddr {
        let v6 = Ipv6Addr::from(self.addr);
        match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        }
    }

    /// Convert to a std socket address for use with `std::net`.
    ///
    /// The interface becomes the IPv6 scope id.
    pub fn to_socket_addr(&self) -> SocketAddr {
        match self.ip() {
            IpAddr::V4(v4) => SocketAddr::new(IpAddr::V4(v4), self.port),
            IpAddr::V6(v6) => SocketAddr::V6(SocketAddrV6::new(v6, self.port, 0, self.netif as u32)),
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(sa: SocketAddr) -> Self {
        // Scope ids beyond u16 cannot be represented and fall back to any.
        let netif = match sa {
            SocketAddr::V4(_) => 0,
            SocketAddr::V6(v6) => u16::try_from(v6.scope_id()).unwrap_or(0),
        };
        Endpoint::new(sa.ip(), sa.port(), netif)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}%{}", self.ip(), self.port, self.netif)
    }
}

/// Size of address plus port, as recorded in [`Session::size`].
pub const SESSION_SIZE: usize = 16 + 2;

/// The engine's peer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Session {
    pub size: usize,
    pub addr: [u8; 16],
    pub port: u16,
    pub ifindex: u16,
}

impl Session {
    pub fn new(addr: [u8; 16], port: u16, ifindex: u16) -> Self {
        Session {
            size: SESSION_SIZE,
            addr,
            port,
            ifindex,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]:{}%{}", Ipv6Addr::from(self.addr), self.port, self.ifindex)
    }
}
