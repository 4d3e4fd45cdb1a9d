mod config;
mod error;
mod netdev;
mod pipeline;
mod route;
mod tun;

use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use error::ClientError;
use relaytun_core::Codec;
use relaytun_resolver::Resolver;
use socket2::{Domain, Socket, Type};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PID_FILE: &str = "/tmp/relaytun-client.pid";
const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

fn init_logging(log_file: &Option<String>) -> Result<(), ClientError> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::sync::Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
    Ok(())
}

/// Build an unbound, unconnected UDP socket via `socket2` so callers get
/// explicit control over the domain/type rather than relying on
/// `std::net::UdpSocket::bind`'s implicit address-family inference.
fn udp_socket() -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, None)?;
    socket.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0).into())?;
    Ok(socket.into())
}

fn write_pid_file() {
    if let Err(e) = std::fs::write(PID_FILE, std::process::id().to_string()) {
        tracing::warn!(error = %e, "failed to write pid file");
    }
}

/// Resolve `host` to a dotted-quad string, using the DNS helper only when
/// `host` doesn't already parse as one (`spec.md` §4.6's "accepts either
/// form").
fn resolve_host(host: &str) -> Result<String, ClientError> {
    if Ipv4Addr::from_str(host).is_ok() {
        return Ok(host.to_string());
    }
    let socket = udp_socket()?;
    let resolver = Resolver::new(socket).map_err(ClientError::Io)?;
    let txid = resolver
        .send_query(host, "8.8.8.8:53")
        .map_err(|source| ClientError::Resolve {
            host: host.to_string(),
            source,
        })?;
    let addrs = resolver
        .wait_for_result(txid, RESOLVE_TIMEOUT)
        .map_err(|source| ClientError::Resolve {
            host: host.to_string(),
            source,
        })?;
    addrs.into_iter().next().ok_or_else(|| ClientError::Resolve {
        host: host.to_string(),
        source: relaytun_resolver::ResolverError::MalformedRdata,
    })
}

fn run() -> Result<(), ClientError> {
    let cli = config::Cli::parse();
    init_logging(&cli.log_file)?;

    let remote = cli.parse_remote()?;
    let remote_addr = resolve_host(&remote.host)?;
    tracing::info!(host = %remote.host, resolved = %remote_addr, "resolved remote host");

    let tun_file = tun::allocate_tun(&cli.tun_name)?;
    netdev::set_addr(&cli.tun_name, &cli.tun_addr)?;
    netdev::set_netmask(&cli.tun_name, &cli.tun_mask)?;
    netdev::set_mtu(&cli.tun_name, cli.mtu)?;
    netdev::interface_up(&cli.tun_name)?;

    route::add_route(&remote_addr, &cli.inet_gateway, &cli.inet_iface)
        .map_err(|e| ClientError::Route(e.to_string()))?;
    route::add_default_gateway(&cli.tun_name).map_err(|e| ClientError::Route(e.to_string()))?;

    let tunnel_socket = udp_socket()?;
    let remote_ip = Ipv4Addr::from_str(&remote_addr)
        .map_err(|_| ClientError::Config(format!("bad resolved remote {remote_addr}")))?;
    let remote_socket = SocketAddr::new(IpAddr::V4(remote_ip), remote.port);

    let codec = Codec::new(cli.passphrase.as_bytes());

    if cli.daemonize {
        let ret = unsafe { libc::daemon(1, 1) };
        if ret < 0 {
            return Err(ClientError::Io(std::io::Error::last_os_error()));
        }
    }
    write_pid_file();

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Release))
            .map_err(|e| ClientError::Config(format!("failed to install signal handler: {e}")))?;
    }

    let mut pipeline = pipeline::Pipeline::new(tun_file, tunnel_socket, codec, remote_socket)?;
    pipeline
        .run(&stop)
        .map_err(|e| ClientError::WorkerStopped(e.to_string()))?;

    tracing::info!(
        tun_dropped = pipeline.counters().tun_dropped,
        udp_dropped = pipeline.counters().udp_dropped,
        "shutting down"
    );
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("relaytun-client: {e}");
        std::process::exit(1);
    }
}
