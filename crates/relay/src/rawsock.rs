//! Raw `IPPROTO_RAW` socket for sending fully-formed IPv4 datagrams to
//! internet hosts (`kale::RawIPv4Socket` in the reference). `IP_HDRINCL`
//! tells the kernel the caller supplies the IP header itself, so the
//! relay's rewritten source address and checksum go out untouched.

use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::os::unix::io::AsRawFd;

pub struct RawIpSocket {
    socket: Socket,
}

impl RawIpSocket {
    pub fn new() -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::from(libc::IPPROTO_RAW)))?;
        let enable: libc::c_int = 1;
        let ret = unsafe {
            libc::setsockopt(
                socket.as_raw_fd(),
                libc::IPPROTO_IP,
                libc::IP_HDRINCL,
                &enable as *const _ as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        socket.set_nonblocking(true)?;
        Ok(Self { socket })
    }

    /// Send a complete IPv4 datagram to `dst_addr:dst_port`. The raw socket
    /// only uses the address for routing; the port is already baked into
    /// `packet`'s TCP/UDP header.
    pub fn send_to(&self, packet: &[u8], dst_addr: Ipv4Addr, dst_port: u16) -> io::Result<usize> {
        let dst: SocketAddr = SocketAddrV4::new(dst_addr, dst_port).into();
        self.socket.send_to(packet, &dst.into())
    }
}
