//! Reserves the NAT port range at startup so the OS kernel never hands one
//! of those ports to an unrelated process (`FdManager`/`BindPortRange` in
//! the reference). The guard just holds the bound sockets open for the
//! process lifetime; it never reads or writes them.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;

pub struct PortRangeGuard {
    _sockets: Vec<Socket>,
}

/// Bind one TCP and one UDP socket on every port in `[port_min, port_max]`
/// at `host`. Any single bind failure is fatal — a partially reserved range
/// is worse than none, since the caller cannot tell which ports are safe.
pub fn bind_port_range(host: &str, port_min: u16, port_max: u16) -> std::io::Result<PortRangeGuard> {
    let mut sockets = Vec::with_capacity((port_max - port_min + 1) as usize * 2);
    for port in port_min..=port_max {
        let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("bad bind address {host}:{port}"))
        })?;

        let tcp = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
        tcp.set_reuse_address(true)?;
        tcp.bind(&addr.into())?;
        sockets.push(tcp);

        let udp = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        udp.set_reuse_address(true)?;
        udp.bind(&addr.into())?;
        sockets.push(udp);
    }
    Ok(PortRangeGuard { _sockets: sockets })
}
