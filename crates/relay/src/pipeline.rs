//! Two-worker-thread data plane (`Proxy` in the reference): one thread
//! drains the tunnel-facing UDP socket and forwards decoded segments to
//! their internet destination over the raw socket, rewriting each
//! segment's source to the relay's own address/NAT port; the other drains
//! captured return traffic and forwards it back to the owning tunnel peer,
//! rewriting the destination back to the client's inner address/port.
//!
//! Both directions share the UDP socket (cloned) and one `NatTable` per
//! protocol, each behind its own mutex — `spec.md` §5's "per-protocol
//! lock, no single coarse lock across both directions".

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use relaytun_core::{Codec, IpPacket, NatTable, Transport};

use crate::capture::Sniffer;
use crate::rawsock::RawIpSocket;

/// `IpPacket`'s address accessors pass bytes through in the order they were
/// read (`spec.md` §4.3), so recovering a real `Ipv4Addr` — or writing one
/// back — has to round-trip through `to_ne_bytes`/native bytes rather than
/// the ordinary big-endian `u32`/`Ipv4Addr` conversions.
fn addr_from_packet(raw: u32) -> Ipv4Addr {
    Ipv4Addr::from(raw.to_ne_bytes())
}

fn addr_to_packet(addr: Ipv4Addr) -> u32 {
    u32::from_ne_bytes(addr.octets())
}

pub struct Shared {
    pub udp: UdpSocket,
    pub raw: RawIpSocket,
    pub codec: Codec,
    pub local_addr: Ipv4Addr,
    pub tcp_nat: Mutex<NatTable>,
    pub udp_nat: Mutex<NatTable>,
    pub stop: Arc<AtomicBool>,
}

/// Drain datagrams from tunnel peers, decode them, rewrite the source
/// address/port through the per-protocol NAT table, and forward to the
/// real destination over the raw socket (`OnUDPRecvFromPeer` +
/// `EpollHandle{TCP,UDP}` in the reference).
pub fn run_peer_worker(shared: &Shared) -> std::io::Result<()> {
    let mut buf = [0u8; 65536];
    while !shared.stop.load(Ordering::Acquire) {
        let (n, peer) = match shared.udp.recv_from(&mut buf) {
            Ok(v) => v,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(std::time::Duration::from_millis(50));
                continue;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let mut packet = match shared.codec.decode(&buf[..n]) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable datagram from peer");
                continue;
            }
        };
        if packet.len() < 20 {
            continue;
        }
        let peer_addr = peer.ip().to_string();
        let peer_port = peer.port();
        handle_from_peer(shared, &peer_addr, peer_port, &mut packet);
    }
    Ok(())
}

fn handle_from_peer(shared: &Shared, peer_addr: &str, peer_port: u16, packet: &mut [u8]) {
    let (transport, inner_addr, inner_port, dst_addr, dst_port) = {
        let view = IpPacket::new(packet);
        let transport = view.transport();
        let inner_addr = addr_from_packet(view.src_addr()).to_string();
        let (inner_port, dst_port) = match transport {
            Transport::Tcp => (view.tcp_src_port(), view.tcp_dst_port()),
            Transport::Udp => (view.udp_src_port(), view.udp_dst_port()),
            Transport::Other(_) => return,
        };
        let dst_addr = addr_from_packet(view.dst_addr());
        (transport, inner_addr, inner_port, dst_addr, dst_port)
    };

    let nat = match transport {
        Transport::Tcp => &shared.tcp_nat,
        Transport::Udp => &shared.udp_nat,
        Transport::Other(_) => return,
    };
    let local_port = {
        let mut nat = nat.lock();
        match nat.query_port(peer_addr, peer_port, &inner_addr, inner_port) {
            Some(port) => port,
            None => nat.add_entry(peer_addr, peer_port, &inner_addr, inner_port),
        }
    };

    {
        let mut view = IpPacket::new(packet);
        view.change_src_addr(addr_to_packet(shared.local_addr));
        match transport {
            Transport::Tcp => {
                view.change_tcp_src_port(local_port);
                view.tcp_fill_checksum();
            }
            Transport::Udp => {
                view.change_udp_src_port(local_port);
                view.udp_fill_checksum();
            }
            Transport::Other(_) => {}
        }
        view.ip_fill_checksum();
    }

    tracing::debug!(
        peer_addr, peer_port, %inner_addr, inner_port, %dst_addr, dst_port, local_port,
        "forwarding segment from tunnel peer to internet"
    );
    if let Err(e) = shared.raw.send_to(packet, dst_addr, dst_port) {
        if e.kind() != std::io::ErrorKind::WouldBlock {
            tracing::error!(error = %e, "raw socket send failed");
        }
    }
}

/// Drain captured return traffic addressed to one of the relay's NAT
/// ports, rewrite the destination back to the owning client's inner
/// address/port, encode, and send back to that client over the tunnel UDP
/// socket (`SnifferWaitAndHandle` + `SnifferHandle{TCP,UDP}` in the
/// reference).
pub fn run_capture_worker(shared: &Shared, sniffer: &mut Sniffer) -> std::io::Result<()> {
    while !shared.stop.load(Ordering::Acquire) {
        let mut packet = match sniffer.next_ip_packet() {
            Some(p) => p,
            None => continue,
        };
        if packet.len() < 20 {
            continue;
        }
        handle_from_internet(shared, &mut packet);
    }
    Ok(())
}

fn handle_from_internet(shared: &Shared, packet: &mut [u8]) {
    let transport = IpPacket::new(packet).transport();
    let local_port = match transport {
        Transport::Tcp => IpPacket::new(packet).tcp_dst_port(),
        Transport::Udp => IpPacket::new(packet).udp_dst_port(),
        Transport::Other(_) => return,
    };

    let nat = match transport {
        Transport::Tcp => &shared.tcp_nat,
        Transport::Udp => &shared.udp_nat,
        Transport::Other(_) => return,
    };
    let (peer_addr, peer_port, inner_addr, inner_port) = {
        let mut nat = nat.lock();
        match nat.query_host(local_port) {
            Some(tuple) => tuple.clone(),
            None => return,
        }
    };
    let Ok(inner_ipv4) = Ipv4Addr::from_str(&inner_addr) else {
        return;
    };

    {
        let mut view = IpPacket::new(packet);
        view.change_dst_addr(addr_to_packet(inner_ipv4));
        match transport {
            Transport::Tcp => {
                view.change_tcp_dst_port(inner_port);
                view.tcp_fill_checksum();
            }
            Transport::Udp => {
                view.change_udp_dst_port(inner_port);
                view.udp_fill_checksum();
            }
            Transport::Other(_) => {}
        }
        view.ip_fill_checksum();
    }

    tracing::debug!(
        %peer_addr, peer_port, %inner_addr, inner_port, local_port,
        "forwarding return segment to tunnel peer"
    );
    let encoded = shared.codec.encode(packet);
    let dst: SocketAddr = match format!("{peer_addr}:{peer_port}").parse() {
        Ok(addr) => addr,
        Err(_) => return,
    };
    if let Err(e) = shared.udp.send_to(&encoded, dst) {
        if e.kind() != std::io::ErrorKind::WouldBlock {
            tracing::error!(error = %e, "udp send to peer failed");
        }
    }
}
