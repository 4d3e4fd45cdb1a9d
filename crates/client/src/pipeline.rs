//! Single-threaded, edge-triggered event loop bridging the TUN device and
//! the tunnel UDP socket (`RawTunProxy::Run`/`EpollLoop` in the reference).
//!
//! Both fds are registered level-once, edge-triggered; each readable event
//! drains its side until `WouldBlock` (`spec.md` §4.6's "drain until
//! EAGAIN"). A send that would block just increments a dropped-packet
//! counter rather than buffering — the reference does the same.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use relaytun_core::{hex_dump, Codec, IpPacket};

const TUN_TOKEN: Token = Token(0);
const UDP_TOKEN: Token = Token(1);
const POLL_TICK: Duration = Duration::from_millis(500);

#[derive(Default)]
pub struct Counters {
    pub tun_dropped: u64,
    pub udp_dropped: u64,
}

pub struct Pipeline {
    tun: File,
    udp: UdpSocket,
    codec: Codec,
    remote: std::net::SocketAddr,
    counters: Counters,
}

fn log_checksum_mismatch(buf: &mut [u8]) {
    if buf.len() < 20 {
        return;
    }
    let (ip_ok, segment_ok) = {
        let packet = IpPacket::new(buf);
        if !packet.validate_ip_checksum() {
            (false, true)
        } else {
            let segment_ok = match packet.transport() {
                relaytun_core::Transport::Tcp => packet.validate_tcp_checksum(),
                relaytun_core::Transport::Udp => packet.validate_udp_checksum(),
                relaytun_core::Transport::Other(_) => true,
            };
            (true, segment_ok)
        }
    };
    if !ip_ok {
        tracing::warn!(dump = %hex_dump(buf), "ip header checksum mismatch");
    } else if !segment_ok {
        tracing::warn!(dump = %hex_dump(buf), "segment checksum mismatch");
    }
}

impl Pipeline {
    pub fn new(tun: File, udp: UdpSocket, codec: Codec, remote: std::net::SocketAddr) -> io::Result<Self> {
        udp.set_nonblocking(true)?;
        set_fd_nonblocking(tun.as_raw_fd())?;
        Ok(Self {
            tun,
            udp,
            codec,
            remote,
            counters: Counters::default(),
        })
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Run until `stop` is set or an unrecoverable I/O error occurs.
    pub fn run(&mut self, stop: &Arc<AtomicBool>) -> io::Result<()> {
        let mut poll = Poll::new()?;
        let mut tun_fd = self.tun.as_raw_fd();
        let mut udp_fd = self.udp.as_raw_fd();
        poll.registry().register(
            &mut SourceFd(&mut tun_fd),
            TUN_TOKEN,
            Interest::READABLE,
        )?;
        poll.registry().register(
            &mut SourceFd(&mut udp_fd),
            UDP_TOKEN,
            Interest::READABLE,
        )?;

        let mut events = Events::with_capacity(8);
        let mut buf = [0u8; 65536];
        while !stop.load(Ordering::Acquire) {
            match poll.poll(&mut events, Some(POLL_TICK)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
            for event in events.iter() {
                match event.token() {
                    TUN_TOKEN => self.drain_tun(&mut buf)?,
                    UDP_TOKEN => self.drain_udp(&mut buf)?,
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn drain_tun(&mut self, buf: &mut [u8]) -> io::Result<()> {
        loop {
            let n = match self.tun.read(buf) {
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            };
            log_checksum_mismatch(&mut buf[..n]);
            let data = self.codec.encode(&buf[..n]);
            match self.udp.send_to(&data, self.remote) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.counters.udp_dropped += 1;
                    tracing::error!(total = self.counters.udp_dropped, "udp send would block");
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn drain_udp(&mut self, buf: &mut [u8]) -> io::Result<()> {
        loop {
            let n = match self.udp.recv_from(buf) {
                Ok((n, _from)) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) => return Err(e),
            };
            let mut data = match self.codec.decode(&buf[..n]) {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!(error = %e, "dropping undecodable datagram");
                    continue;
                }
            };
            log_checksum_mismatch(&mut data);
            match self.tun.write(&data) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.counters.tun_dropped += 1;
                    tracing::error!(total = self.counters.tun_dropped, "tun write would block");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn set_fd_nonblocking(fd: std::os::unix::io::RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    let ret = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
