//! Route installation via `ip route` (`kl::netdev::AddRoute` /
//! `AddDefaultGateway` in the reference, which shell out to `system()`).
//! Rust has no blessed netlink binding in this workspace's dependency set,
//! so `std::process::Command` against the `ip` binary stands in, same as
//! the reference stands in for a programmatic route API.

use std::process::Command;

fn run(args: &[&str]) -> std::io::Result<std::process::ExitStatus> {
    Command::new("ip").args(args).status()
}

/// Install a host route to `dest` via `gateway` through `iface`. Mirrors
/// `ip route add <dest> via <gateway> dev <iface>`; an already-existing
/// route (`ip` exits nonzero but the route is in place) is not an error,
/// matching the reference's `EEXIST` tolerance.
pub fn add_route(dest: &str, gateway: &str, iface: &str) -> std::io::Result<()> {
    let status = run(&["route", "add", dest, "via", gateway, "dev", iface])?;
    if status.success() {
        return Ok(());
    }
    // `ip route replace` succeeds whether or not the route already exists;
    // fall back to it instead of inspecting `ip`'s text error output.
    let status = run(&["route", "replace", dest, "via", gateway, "dev", iface])?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("ip route add {dest} via {gateway} dev {iface} failed"),
        ))
    }
}

/// Replace the default route with one through the TUN device at `tun_addr`.
/// Mirrors `ip route replace default dev <tun_addr>`.
pub fn add_default_gateway(tun_addr: &str) -> std::io::Result<()> {
    let status = run(&["route", "replace", "default", "dev", tun_addr])?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("ip route replace default dev {tun_addr} failed"),
        ))
    }
}

/// Install an `iptables` DROP rule for `port_min..=port_max` on `protocol`
/// (`"tcp"` or `"udp"`), mirroring the relay's `InsertIptablesRules`.
pub fn install_iptables_drop(protocol: &str, port_min: u16, port_max: u16) -> std::io::Result<()> {
    let range = format!("{port_min}:{port_max}");
    let status = Command::new("iptables")
        .args([
            "-I", "INPUT", "-p", protocol, "--dport", &range, "-j", "DROP",
        ])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("iptables -I INPUT -p {protocol} --dport {range} -j DROP failed"),
        ))
    }
}
