//! Command-line surface (`spec.md` §6, relay CLI).

use clap::Parser;

/// Relay proxy: terminates tunnel flows and forwards them to the open
/// internet through a reserved local port range.
#[derive(Parser, Debug)]
#[command(name = "relaytun-relay", disable_help_flag = false)]
pub struct Cli {
    /// Listen address for the tunnel-facing UDP socket, `host:port`.
    #[arg(short = 'l', value_name = "local_host:local_port", default_value = "0.0.0.0:4000")]
    pub listen: String,

    /// Interface with a route to the internet, captured for return traffic.
    #[arg(short = 'i', value_name = "ifname", default_value = "eth0")]
    pub iface: String,

    /// Reserved local port range, `port_min:port_max`.
    #[arg(short = 'r', value_name = "port_min:port_max", default_value = "60000:60255")]
    pub port_range: String,

    /// Redirect logs to this file instead of stderr.
    #[arg(short = 'o', value_name = "logfile")]
    pub log_file: Option<String>,

    /// Daemonize after startup.
    #[arg(short = 'd')]
    pub daemonize: bool,
}

pub struct Listen {
    pub host: String,
    pub port: u16,
}

pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl Cli {
    pub fn parse_listen(&self) -> Result<Listen, crate::error::RelayError> {
        let (host, port) = self.listen.rsplit_once(':').ok_or_else(|| {
            crate::error::RelayError::Config(format!("-l must be host:port, got {}", self.listen))
        })?;
        let port: u16 = port.parse().map_err(|_| {
            crate::error::RelayError::Config(format!("invalid port in -l {}", self.listen))
        })?;
        Ok(Listen {
            host: host.to_string(),
            port,
        })
    }

    pub fn parse_port_range(&self) -> Result<PortRange, crate::error::RelayError> {
        let (min, max) = self.port_range.split_once(':').ok_or_else(|| {
            crate::error::RelayError::Config(format!(
                "-r must be port_min:port_max, got {}",
                self.port_range
            ))
        })?;
        let min: u16 = min.parse().map_err(|_| {
            crate::error::RelayError::Config(format!("invalid port_min in -r {}", self.port_range))
        })?;
        let max: u16 = max.parse().map_err(|_| {
            crate::error::RelayError::Config(format!("invalid port_max in -r {}", self.port_range))
        })?;
        if max < min {
            return Err(crate::error::RelayError::Config(format!(
                "-r range is empty: {min}:{max}"
            )));
        }
        Ok(PortRange { min, max })
    }
}
