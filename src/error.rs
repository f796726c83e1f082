//! Error types
//!
//! Every failure the server can hit is local to one sink. These errors are
//! logged and folded into the sink's status rather than propagated to the
//! producer.

use std::net::SocketAddr;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for frame distribution
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A listener could not be bound (typically: port already in use)
    #[error("{sink} sink failed to bind {addr}: {source}")]
    Bind {
        sink: &'static str,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Raster dimensions or buffer length are inconsistent
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// JPEG or matrix encoding failed
    #[error("encode failed: {0}")]
    Encode(String),

    /// A matrix packet could not be parsed
    #[error("malformed matrix packet: {0}")]
    MalformedPacket(String),

    /// The virtual camera device rejected a frame or could not be opened
    #[error("virtual camera: {0}")]
    Device(String),

    /// The server was stopped and cannot be started again
    #[error("server already stopped")]
    Stopped,
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Encode(err.to_string())
    }
}
