//! Error kinds shared across the codec, resolver and pipeline.

use thiserror::Error;

/// Everything that can go wrong inside the core, from CLI-level argument
/// errors down to a single malformed packet.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("address resolution failed: {0}")]
    AddressResolution(String),

    #[error("could not open raw device: {0}")]
    DeviceOpen(String),

    #[error("buffer too small to pack chain ({needed} bytes needed, {have} available)")]
    PackBufferTooSmall { needed: usize, have: usize },

    #[error("malformed packet chain: {0}")]
    MalformedChain(String),

    #[error("truncated frame: {0}")]
    TruncatedFrame(String),

    #[error("timed out waiting for ARP reply after {0:?}")]
    ResolverTimeout(std::time::Duration),

    #[error("script error: {0}")]
    ScriptError(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
