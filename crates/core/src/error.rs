//! Error types for relaytun-core

use thiserror::Error;

/// Errors from the codec (cipher + compression) layer.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The compressor rejected the input during `decode`.
    #[error("failed to decompress payload: {0}")]
    Decompress(String),
}

/// Errors from the two-level NAT table.
#[derive(Error, Debug)]
pub enum NatError {
    /// `port_max < port_min`, so the table has no slots to allocate from.
    #[error("NAT port range is empty")]
    RangeEmpty,
}
