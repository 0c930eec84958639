// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! A bound, non-blocking-free UDP socket with `SO_REUSEPORT` set so several
//! dispatcher threads can fan out over the same port. Reads use a short
//! timeout so the owning thread can notice shutdown without blocking
//! forever.

use std::{
    io,
    net::{SocketAddr, UdpSocket},
    os::fd::AsRawFd,
    time::Duration,
};

use crate::{consts::RECV_TIMEOUT_MILLIS, net::address::Address};

/// A single packet read off the wire: its payload and the peer that sent it.
pub struct RecvdPacket {
    pub from: Address,
    pub len: usize,
}

/// Thin wrapper around a UDP socket bound with `SO_REUSEPORT`.
///
/// Several of these, all bound to the same local port, let the relay spread
/// inbound traffic across dispatcher threads without a userspace fan-out
/// step — the kernel load-balances by 4-tuple hash.
pub struct RelaySocket {
    inner: UdpSocket,
}

impl RelaySocket {
    /// Binds a new socket to `addr` with `SO_REUSEPORT` set before bind, so
    /// multiple dispatcher threads can share the same local port.
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let inner = Self::bind_reuseport(addr)?;
        inner.set_read_timeout(Some(Duration::from_millis(RECV_TIMEOUT_MILLIS)))?;
        inner.set_nonblocking(false)?;
        Ok(Self { inner })
    }

    #[cfg(unix)]
    fn bind_reuseport(addr: SocketAddr) -> io::Result<UdpSocket> {
        use std::mem;

        let domain = if addr.is_ipv4() { libc::AF_INET } else { libc::AF_INET6 };
        // SAFETY: libc::socket is called with constant, valid arguments; the
        // returned fd is immediately checked and wrapped, never leaked.
        let fd = unsafe { libc::socket(domain, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let enable: libc::c_int = 1;
        // SAFETY: fd is a freshly created, valid socket; `enable` lives for
        // the duration of the call and matches the expected option size.
        let ret = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEPORT,
                &enable as *const _ as *const libc::c_void,
                mem::size_of_val(&enable) as libc::socklen_t,
            )
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // SAFETY: fd was obtained above and has not been closed yet.
            unsafe { libc::close(fd) };
            return Err(err);
        }

        // SAFETY: fd is a valid, open socket descriptor owned by this scope;
        // ownership transfers to UdpSocket, which will close it on drop.
        let socket = unsafe { <UdpSocket as std::os::fd::FromRawFd>::from_raw_fd(fd) };
        socket.bind(addr)?;
        Ok(socket)
    }

    #[cfg(not(unix))]
    fn bind_reuseport(addr: SocketAddr) -> io::Result<UdpSocket> {
        UdpSocket::bind(addr)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Blocks (up to the configured read timeout) for one datagram.
    /// `WouldBlock`/`TimedOut` are returned to the caller rather than
    /// collapsed here, so dispatcher loops can distinguish "nothing arrived"
    /// from a real socket error.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<(usize, Address)> {
        let (len, peer) = self.inner.recv_from(buf)?;
        Ok((len, Address::from(peer)))
    }

    pub fn send(&self, buf: &[u8], to: Address) -> io::Result<usize> {
        let sock_addr: Option<SocketAddr> = to.into();
        let sock_addr = sock_addr.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "cannot send to an empty address")
        })?;
        self.inner.send_to(buf, sock_addr)
    }

    pub fn raw_fd(&self) -> i32 {
        self.inner.as_raw_fd()
    }
}
