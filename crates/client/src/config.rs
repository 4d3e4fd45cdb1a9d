//! Command-line surface (`spec.md` §6, client CLI).

use clap::Parser;

/// Userspace IP tunnel client: owns a TUN device and relays its traffic to
/// a remote relay over one encrypted, compressed UDP flow.
#[derive(Parser, Debug)]
#[command(name = "relaytun-client", disable_help_flag = false)]
pub struct Cli {
    /// Remote relay, `host:port` (host may be a name or a dotted quad).
    #[arg(short = 'r', value_name = "remote_host:remote_port")]
    pub remote: String,

    /// Physical interface with a route to the internet.
    #[arg(short = 'n', value_name = "inet_iface")]
    pub inet_iface: String,

    /// Gateway address reachable via `inet_iface`.
    #[arg(short = 'g', value_name = "inet_gateway")]
    pub inet_gateway: String,

    /// TUN device name to allocate.
    #[arg(short = 'i', value_name = "tun_name", default_value = "tun0")]
    pub tun_name: String,

    /// Address to assign to the TUN device.
    #[arg(short = 'a', value_name = "tun_addr", default_value = "10.0.0.1")]
    pub tun_addr: String,

    /// Netmask to assign to the TUN device.
    #[arg(short = 'm', value_name = "tun_mask", default_value = "255.255.255.0")]
    pub tun_mask: String,

    /// TUN device MTU.
    #[arg(short = 'u', value_name = "mtu", default_value_t = 1380)]
    pub mtu: u16,

    /// Shared-secret passphrase for the tunnel codec.
    #[arg(short = 'p', value_name = "passphrase", default_value = "\u{c0}\u{de}\u{ba}\u{be}")]
    pub passphrase: String,

    /// Redirect logs to this file instead of stderr.
    #[arg(short = 'o', value_name = "logfile")]
    pub log_file: Option<String>,

    /// Daemonize after startup.
    #[arg(short = 'd')]
    pub daemonize: bool,
}

/// `remote_host:remote_port` split into its two parts.
pub struct Remote {
    pub host: String,
    pub port: u16,
}

impl Cli {
    pub fn parse_remote(&self) -> Result<Remote, crate::error::ClientError> {
        let (host, port) = self
            .remote
            .rsplit_once(':')
            .ok_or_else(|| crate::error::ClientError::Config(format!(
                "-r must be host:port, got {}",
                self.remote
            )))?;
        let port: u16 = port.parse().map_err(|_| {
            crate::error::ClientError::Config(format!("invalid port in -r {}", self.remote))
        })?;
        if host.is_empty() {
            return Err(crate::error::ClientError::Config(
                "-r host must not be empty".to_string(),
            ));
        }
        Ok(Remote {
            host: host.to_string(),
            port,
        })
    }
}
