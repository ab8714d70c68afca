//! Connectionless socket collaborator.

use std::io;
use std::net::UdpSocket;
use std::sync::Arc;

use crate::endpoint::Endpoint;

/// A datagram socket addressed by [`Endpoint`].
pub trait DatagramSocket {
    /// Send one datagram. Returns the number of bytes sent.
    fn send_to(&self, buf: &[u8], remote: &Endpoint) -> io::Result<usize>;

    /// Receive one datagram into `buf`.
    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Endpoint)>;
}

impl DatagramSocket for UdpSocket {
    fn send_to(&self, buf: &[u8], remote: &Endpoint) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, remote.to_socket_addr())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Endpoint)> {
        let (n, from) = UdpSocket::recv_from(self, buf)?;
        Ok((n, from.into()))
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for &T {
    fn send_to(&self, buf: &[u8], remote: &Endpoint) -> io::Result<usize> {
        (**self).send_to(buf, remote)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Endpoint)> {
        (**self).recv_from(buf)
    }
}

impl<T: DatagramSocket + ?Sized> DatagramSocket for Arc<T> {
    fn send_to(&self, buf: &[u8], remote: &Endpoint) -> io::Result<usize> {
        (**self).send_to(buf, remote)
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Endpoint)> {
        (**self).recv_from(buf)
    }
}
