//! Producer-driven sinks
//!
//! These sinks run inside `update()` on the producer's schedule, unlike the
//! HTTP and TCP sinks which pull from [`FrameState`](crate::state::FrameState)
//! on their own tasks.
//!
//! - [`file`]: JPEG snapshot overwritten on every update
//! - [`virtual_camera`]: OS-level virtual camera device, optional
//! - [`loopback`]: V4L2 loopback backend for the virtual camera
//! - [`pacer`]: frame-clock pacing for the camera device

pub mod file;
pub mod loopback;
pub mod pacer;
pub mod virtual_camera;

pub use file::FileSnapshotSink;
pub use pacer::FramePacer;
pub use loopback::LoopbackOpener;
pub use virtual_camera::{Availability, CameraDevice, DeviceOpener, VirtualCameraSink};
