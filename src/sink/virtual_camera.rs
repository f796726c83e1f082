//! Virtual camera output
//!
//! Device creation is environment dependent, so the sink is modelled as an
//! optional capability: [`VirtualCameraSink::open`] never fails, it yields a
//! sink whose [`Availability`] says whether frames will go anywhere. A
//! device that errors mid-stream is closed and flips the sink to
//! `Unavailable` for the rest of the process.
//!
//! The backend is behind [`DeviceOpener`] / [`CameraDevice`]. The default
//! [`LoopbackOpener`](super::loopback::LoopbackOpener) negotiates RGB24 on a
//! v4l2loopback node. Device writes block, so they run on the blocking pool.

use image::imageops::FilterType;

use super::pacer::FramePacer;
use crate::error::{Error, Result};
use crate::frame::{resize_rgb, Frame};
use crate::server::config::VirtualCameraConfig;

/// An open virtual camera device
pub trait CameraDevice: Send {
    /// Human-readable device name
    fn name(&self) -> &str;

    /// Push one RGB24 frame of the configured size
    fn send(&mut self, rgb: &[u8]) -> std::io::Result<()>;

    /// Release the device
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Creates camera devices
pub trait DeviceOpener: Send + Sync {
    fn open(&self, config: &VirtualCameraConfig) -> Result<Box<dyn CameraDevice>>;
}

/// Whether the virtual camera can take frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// Device open, frames are delivered
    Available,
    /// Device could not be opened or failed; frames are dropped
    Unavailable(String),
}

/// Virtual camera sink
pub struct VirtualCameraSink {
    config: VirtualCameraConfig,
    device: Option<Box<dyn CameraDevice>>,
    availability: Availability,
    pacer: FramePacer,
}

impl VirtualCameraSink {
    /// Try to open the device; failure produces an unavailable sink
    pub fn open(config: VirtualCameraConfig, opener: &dyn DeviceOpener) -> Self {
        let pacer = FramePacer::new(config.fps);

        match opener.open(&config) {
            Ok(device) => {
                tracing::info!(
                    device = device.name(),
                    width = config.width,
                    height = config.height,
                    fps = config.fps,
                    "Virtual camera created"
                );
                Self {
                    config,
                    device: Some(device),
                    availability: Availability::Available,
                    pacer,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Virtual camera unavailable");
                Self {
                    config,
                    device: None,
                    availability: Availability::Unavailable(e.to_string()),
                    pacer,
                }
            }
        }
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn is_available(&self) -> bool {
        self.availability == Availability::Available
    }

    pub fn config(&self) -> &VirtualCameraConfig {
        &self.config
    }

    /// Convert, resize and push one frame, then wait out the device's frame period
    ///
    /// A no-op on an unavailable sink. A device error closes the device and
    /// disables the sink before being returned.
    pub async fn push(&mut self, frame: &Frame) -> Result<()> {
        let mut device = match self.device.take() {
            Some(device) => device,
            None => return Ok(()),
        };

        let converted = frame.to_rgb().map(|rgb| {
            resize_rgb(rgb, self.config.width, self.config.height, FilterType::Nearest)
        });
        let rgb = match converted {
            Ok(rgb) => rgb,
            Err(e) => {
                self.device = Some(device);
                return Err(e);
            }
        };

        let written = tokio::task::spawn_blocking(move || {
            let result = device.send(rgb.as_raw());
            (device, result)
        })
        .await;

        let failure = match written {
            Ok((device, Ok(()))) => {
                self.device = Some(device);
                None
            }
            Ok((device, Err(e))) => {
                tracing::warn!(device = device.name(), error = %e, "Virtual camera disabled");
                self.device = Some(device);
                Some(format!("device write failed: {}", e))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Virtual camera writer lost");
                Some(format!("device writer lost: {}", e))
            }
        };

        if let Some(reason) = failure {
            self.close();
            self.availability = Availability::Unavailable(reason.clone());
            return Err(Error::Device(reason));
        }

        self.pacer.wait().await;
        Ok(())
    }

    /// Release the device; safe to call repeatedly
    pub fn close(&mut self) {
        if let Some(mut device) = self.device.take() {
            if let Err(e) = device.close() {
                tracing::debug!(device = device.name(), error = %e, "Virtual camera close failed");
            }
            tracing::debug!(device = device.name(), "Virtual camera closed");
            self.pacer.reset();
        }
        if self.availability == Availability::Available {
            self.availability = Availability::Unavailable("closed".into());
        }
    }
}

impl Drop for VirtualCameraSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for VirtualCameraSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualCameraSink")
            .field("config", &self.config)
            .field("availability", &self.availability)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Records every frame it receives
    #[derive(Clone, Default)]
    pub(crate) struct RecordingOpener {
        pub frames: Arc<Mutex<Vec<Vec<u8>>>>,
        pub fail_after: Option<usize>,
    }

    struct RecordingDevice {
        frames: Arc<Mutex<Vec<Vec<u8>>>>,
        fail_after: Option<usize>,
    }

    impl CameraDevice for RecordingDevice {
        fn name(&self) -> &str {
            "recording"
        }

        fn send(&mut self, rgb: &[u8]) -> std::io::Result<()> {
            let mut frames = self.frames.lock().unwrap();
            if self.fail_after.map_or(false, |n| frames.len() >= n) {
                return Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone"));
            }
            frames.push(rgb.to_vec());
            Ok(())
        }
    }

    impl DeviceOpener for RecordingOpener {
        fn open(&self, _config: &VirtualCameraConfig) -> Result<Box<dyn CameraDevice>> {
            Ok(Box::new(RecordingDevice {
                frames: self.frames.clone(),
                fail_after: self.fail_after,
            }))
        }
    }

    /// Always fails to open
    pub(crate) struct FailingOpener;

    impl DeviceOpener for FailingOpener {
        fn open(&self, _config: &VirtualCameraConfig) -> Result<Box<dyn CameraDevice>> {
            Err(Error::Device("no virtual camera backend".into()))
        }
    }

    fn small_config() -> VirtualCameraConfig {
        VirtualCameraConfig::default().resolution(4, 2).fps(1000)
    }

    #[tokio::test]
    async fn test_open_failure_is_unavailable() {
        let mut sink = VirtualCameraSink::open(small_config(), &FailingOpener);
        assert!(!sink.is_available());
        assert!(matches!(sink.availability(), Availability::Unavailable(_)));

        // Pushing to an unavailable sink is a no-op
        let frame = Frame::solid(4, 2, [0, 0, 0]).unwrap();
        assert!(sink.push(&frame).await.is_ok());
    }

    #[tokio::test]
    async fn test_push_converts_and_resizes() {
        let opener = RecordingOpener::default();
        let mut sink = VirtualCameraSink::open(small_config(), &opener);
        assert!(sink.is_available());

        let frame = Frame::solid(8, 4, [1, 2, 3]).unwrap();
        sink.push(&frame).await.unwrap();

        let frames = opener.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), 4 * 2 * 3);
        assert_eq!(&frames[0][0..3], &[3, 2, 1]);
    }

    #[tokio::test]
    async fn test_device_error_disables_sink() {
        let opener = RecordingOpener {
            fail_after: Some(1),
            ..Default::default()
        };
        let mut sink = VirtualCameraSink::open(small_config(), &opener);
        let frame = Frame::solid(4, 2, [0, 0, 0]).unwrap();

        sink.push(&frame).await.unwrap();
        assert!(matches!(sink.push(&frame).await, Err(Error::Device(_))));
        assert!(!sink.is_available());

        // Further pushes are dropped without touching the device
        sink.push(&frame).await.unwrap();
        assert_eq!(opener.frames.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_loopback_missing_device() {
        let config = VirtualCameraConfig::with_device("/nonexistent/framecast-video");
        let sink = VirtualCameraSink::open(config, &crate::sink::LoopbackOpener);
        assert!(!sink.is_available());
    }

    #[test]
    fn test_close_is_idempotent() {
        let opener = RecordingOpener::default();
        let mut sink = VirtualCameraSink::open(small_config(), &opener);
        sink.close();
        sink.close();
        assert!(!sink.is_available());
    }
}
