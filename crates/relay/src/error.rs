use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to bind reserved port range: {0}")]
    PortRangeBind(String),

    #[error("failed to install iptables rules: {0}")]
    Firewall(String),

    #[error("packet capture error: {0}")]
    Capture(#[from] pcap::Error),

    #[error("worker thread stopped: {0}")]
    WorkerStopped(String),
}
