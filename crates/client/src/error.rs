use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: relaytun_resolver::ResolverError,
    },

    #[error("failed to install route: {0}")]
    Route(String),

    #[error("tunnel worker stopped: {0}")]
    WorkerStopped(String),
}
