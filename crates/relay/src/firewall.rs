//! Installs DROP rules over the reserved port range so the kernel's own
//! TCP/UDP stack never answers on a port the relay has taken for NAT
//! (`InsertIptablesRules` in the reference). Each port is checked with
//! `iptables -C` before inserting, so reruns are idempotent rather than
//! piling up duplicate rules.

use std::process::Command;

fn rule_exists(protocol: &str, port: u16) -> bool {
    Command::new("iptables")
        .args([
            "-C", "INPUT", "-s", "0.0.0.0/0", "-p", protocol, "--dport",
            &port.to_string(), "-j", "DROP",
        ])
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn insert_rule(protocol: &str, port: u16) -> std::io::Result<()> {
    let status = Command::new("iptables")
        .args([
            "-A", "INPUT", "-s", "0.0.0.0/0", "-p", protocol, "--dport",
            &port.to_string(), "-j", "DROP",
        ])
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("iptables -A INPUT -p {protocol} --dport {port} -j DROP failed"),
        ))
    }
}

/// Drop all inbound UDP and TCP traffic to every port in
/// `[port_min, port_max]`. Bails on the first port that can't be inserted.
pub fn install_drop_rules(port_min: u16, port_max: u16) -> std::io::Result<()> {
    for port in port_min..=port_max {
        if !rule_exists("udp", port) {
            insert_rule("udp", port)?;
        }
    }
    for port in port_min..=port_max {
        if !rule_exists("tcp", port) {
            insert_rule("tcp", port)?;
        }
    }
    Ok(())
}
