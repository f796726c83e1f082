//! Wire encodings
//!
//! - [`jpeg`]: JPEG compression for the HTTP and file sinks
//! - [`matrix`]: the length-implicit binary matrix packet for the TCP sink
//!
//! Both are pure functions over a [`Frame`](crate::frame::Frame); the result
//! is a `Bytes` that becomes visible to readers only once fully built.

pub mod jpeg;
pub mod matrix;

pub use jpeg::{encode_jpeg, JPEG_QUALITY};
pub use matrix::{encode_packet, MatrixHeader, MatrixPacket};
