//! Real-time frame distribution
//!
//! A producer pushes frames into a [`DistributionServer`]; the server encodes
//! each frame once per representation and fans it out to:
//!
//! - an MJPEG stream at `GET /stream`
//! - the latest JPEG at `GET /frame.jpg`
//! - a JPEG snapshot file overwritten on every frame
//! - one TCP client receiving raw RGB matrix packets
//! - an optional virtual camera device
//!
//! Readers only ever see the newest frame. A slow reader skips frames instead
//! of queueing them, and a failing sink never affects the producer or the
//! other sinks.
//!
//! ```no_run
//! use framecast::{DistributionServer, Frame, ServerConfig};
//!
//! # async fn run() -> framecast::Result<()> {
//! let server = DistributionServer::new(ServerConfig::video());
//! server.start().await?;
//!
//! let frame = Frame::solid(1280, 720, [0, 0, 255])?;
//! server.update(frame).await;
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod frame;
pub mod motion;
pub mod server;
pub mod sink;
pub mod state;
pub mod stats;

pub use error::{Error, Result};
pub use frame::Frame;
pub use motion::{MotionBoard, MotionSlot};
pub use server::{
    DistributionServer, MatrixSinkState, ServerConfig, SinkHealth, SinkStatus,
    VirtualCameraConfig,
};
pub use stats::ServerStats;
