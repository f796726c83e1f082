//! V4L2 loopback output device
//!
//! Opens a v4l2loopback node through the `v4l` crate, negotiates RGB24 at the
//! configured size and frame rate, and writes one raw frame per `send`.
//! Only available on Linux; elsewhere [`LoopbackOpener`] always reports the
//! device as unavailable.

use crate::error::{Error, Result};
use crate::server::config::VirtualCameraConfig;

use super::virtual_camera::{CameraDevice, DeviceOpener};

/// Pixel format written to the device
pub const RGB24_FOURCC: [u8; 4] = *b"RGB3";

/// Opens a loopback video device node for output
#[derive(Debug, Clone, Copy, Default)]
pub struct LoopbackOpener;

/// Check the format a driver settled on against what was requested
pub fn verify_negotiated(
    config: &VirtualCameraConfig,
    width: u32,
    height: u32,
    fourcc: [u8; 4],
) -> Result<()> {
    if (width, height) != (config.width, config.height) || fourcc != RGB24_FOURCC {
        return Err(Error::Device(format!(
            "{} negotiated {}x{} {} instead of {}x{} {}",
            config.device.display(),
            width,
            height,
            String::from_utf8_lossy(&fourcc),
            config.width,
            config.height,
            String::from_utf8_lossy(&RGB24_FOURCC),
        )));
    }
    Ok(())
}

#[cfg(target_os = "linux")]
mod v4l2 {
    use std::io::{self, Write};

    use v4l::video::output::Parameters;
    use v4l::video::Output;
    use v4l::{Device, Format, FourCC};

    use super::*;

    impl DeviceOpener for LoopbackOpener {
        fn open(&self, config: &VirtualCameraConfig) -> Result<Box<dyn CameraDevice>> {
            let path = config.device.display().to_string();
            let device_err = |what: &str, e: io::Error| Error::Device(format!("{} {}: {}", what, path, e));

            let device = Device::with_path(&config.device).map_err(|e| device_err("cannot open", e))?;

            let requested = Format::new(config.width, config.height, FourCC::new(&RGB24_FOURCC));
            let actual = Output::set_format(&device, &requested)
                .map_err(|e| device_err("cannot set format on", e))?;
            verify_negotiated(config, actual.width, actual.height, actual.fourcc.repr)?;

            // Loopback nodes accept any rate; a refusal only affects timestamps
            if let Err(e) = Output::set_params(&device, &Parameters::with_fps(config.fps)) {
                tracing::debug!(device = %path, error = %e, "Frame rate not accepted");
            }

            Ok(Box::new(LoopbackDevice {
                name: path,
                device: Some(device),
            }))
        }
    }

    struct LoopbackDevice {
        name: String,
        device: Option<Device>,
    }

    impl CameraDevice for LoopbackDevice {
        fn name(&self) -> &str {
            &self.name
        }

        fn send(&mut self, rgb: &[u8]) -> io::Result<()> {
            let device = self.device.as_mut().ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotConnected, format!("{} is closed", self.name))
            })?;

            match device.write_all(rgb) {
                // Non-blocking node with a full queue: drop this frame
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tracing::debug!(device = %self.name, "Virtual camera busy, frame dropped");
                    Ok(())
                }
                result => result,
            }
        }

        fn close(&mut self) -> io::Result<()> {
            self.device.take();
            Ok(())
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl DeviceOpener for LoopbackOpener {
    fn open(&self, config: &VirtualCameraConfig) -> Result<Box<dyn CameraDevice>> {
        Err(Error::Device(format!(
            "{}: loopback devices are only supported on Linux",
            config.device.display()
        )))
    }
}
