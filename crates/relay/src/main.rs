mod capture;
mod config;
mod error;
mod firewall;
mod pipeline;
mod portguard;
mod rawsock;

use std::net::{Ipv4Addr, UdpSocket};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use error::RelayError;
use relaytun_core::{Codec, NatTable};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const PID_FILE: &str = "/tmp/relaytun-relay.pid";

/// Tunnel codec key. The reference hardcodes this in `DemoCoding`'s
/// constructor rather than taking it as a flag; matched here so a relay
/// and client built from this tree can tunnel to each other out of the box.
const CODEC_KEY: &[u8] = &[0xc0, 0xde, 0xba, 0xbe];

fn init_logging(log_file: &Option<String>) -> Result<(), RelayError> {
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

fn write_pid_file() {
    if let Err(e) = std::fs::write(PID_FILE, std::process::id().to_string()) {
        tracing::warn!(error = %e, "failed to write pid file");
    }
}

fn run() -> Result<(), RelayError> {
    let cli = config::Cli::parse();
    init_logging(&cli.log_file)?;

    let listen = cli.parse_listen()?;
    let range = cli.parse_port_range()?;
    let local_addr = Ipv4Addr::from_str(&listen.host)
        .map_err(|_| RelayError::Config(format!("-l host must be a dotted quad, got {}", listen.host)))?;

    // Reserve the NAT port range before anything else binds to it.
    let _port_guard = portguard::bind_port_range(&listen.host, range.min, range.max)
        .map_err(|e| RelayError::PortRangeBind(e.to_string()))?;
    firewall::install_drop_rules(range.min, range.max).map_err(|e| RelayError::Firewall(e.to_string()))?;

    if cli.daemonize {
        let ret = unsafe { libc::daemon(1, 1) };
        if ret < 0 {
            return Err(RelayError::Io(std::io::Error::last_os_error()));
        }
    }
    write_pid_file();

    let udp = UdpSocket::bind((listen.host.as_str(), listen.port))?;
    udp.set_nonblocking(true)?;
    let raw = rawsock::RawIpSocket::new()?;
    let codec = Codec::new(CODEC_KEY);
    let tcp_nat = NatTable::new(range.min, range.max)
        .map_err(|e| RelayError::Config(format!("tcp NAT table: {e}")))?;
    let udp_nat = NatTable::new(range.min, range.max)
        .map_err(|e| RelayError::Config(format!("udp NAT table: {e}")))?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Release))
            .map_err(|e| RelayError::Config(format!("failed to install signal handler: {e}")))?;
    }

    let shared = Arc::new(pipeline::Shared {
        udp,
        raw,
        codec,
        local_addr,
        tcp_nat: parking_lot::Mutex::new(tcp_nat),
        udp_nat: parking_lot::Mutex::new(udp_nat),
        stop: stop.clone(),
    });

    let filter_expr = format!(
        "(udp or tcp) and host {} and dst portrange {}-{}",
        listen.host, range.min, range.max
    );
    let mut sniffer = capture::Sniffer::open(&cli.iface, &filter_expr)?;

    let peer_worker = {
        let shared = shared.clone();
        std::thread::spawn(move || pipeline::run_peer_worker(&shared))
    };
    let capture_worker = {
        let shared = shared.clone();
        std::thread::spawn(move || pipeline::run_capture_worker(&shared, &mut sniffer))
    };

    let peer_result = peer_worker.join();
    stop.store(true, Ordering::Release);
    let capture_result = capture_worker.join();

    match (peer_result, capture_result) {
        (Ok(Ok(())), Ok(Ok(()))) => Ok(()),
        (Ok(Err(e)), _) | (_, Ok(Err(e))) => Err(RelayError::WorkerStopped(e.to_string())),
        _ => Err(RelayError::WorkerStopped("worker thread panicked".to_string())),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("relaytun-relay: {e}");
        std::process::exit(1);
    }
}
