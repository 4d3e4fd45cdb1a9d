use thiserror::Error;

/// Errors from DNS query construction, response parsing, or waiting for a
/// matching reply.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DNS response header is shorter than 12 bytes")]
    TruncatedHeader,

    #[error("DNS response reported error code {0}")]
    ResponseCode(u8),

    #[error("resource record is truncated")]
    TruncatedRecord,

    #[error("A record RDATA is not 4 bytes")]
    MalformedRdata,

    #[error("no reply for transaction id {0:#06x} within the timeout")]
    Timeout(u16),

    #[error("resolver listener thread exited: {0}")]
    ListenerStopped(String),
}
