//! Server configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Shortest accepted poll or send interval
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Virtual camera device settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCameraConfig {
    /// Device path (e.g. a v4l2loopback node)
    pub device: PathBuf,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Device frame rate
    pub fps: u32,
}

impl Default for VirtualCameraConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/video10"),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl VirtualCameraConfig {
    /// Use a specific device node
    pub fn with_device(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the output resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Set the frame rate
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }
}

/// Distribution server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listener for `/stream` and `/frame.jpg` (None = disabled)
    pub http_addr: Option<SocketAddr>,

    /// TCP listener for matrix packets (None = disabled)
    pub tcp_addr: Option<SocketAddr>,

    /// Maximum matrix packet width; larger frames are downscaled
    pub max_width: u32,

    /// Maximum matrix packet height; larger frames are downscaled
    pub max_height: u32,

    /// Local JPEG snapshot path (None = disabled)
    pub file_path: Option<PathBuf>,

    /// Virtual camera output (None = disabled)
    pub virtual_camera: Option<VirtualCameraConfig>,

    /// Upper bound on how long the accept loop waits before re-checking for shutdown
    pub poll_interval: Duration,

    /// Tick of the TCP send loop
    pub send_interval: Duration,

    /// Enable TCP_NODELAY on the matrix client socket
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: Some(SocketAddr::from(([127, 0, 0, 1], 8080))),
            tcp_addr: Some(SocketAddr::from(([127, 0, 0, 1], 8081))),
            max_width: 640,
            max_height: 480,
            file_path: None,
            virtual_camera: None,
            poll_interval: Duration::from_secs(1),
            send_interval: Duration::from_millis(33), // ~30 Hz
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Preset for the annotated video stream (HTTP 8080, TCP 8081)
    pub fn video() -> Self {
        Self::default()
            .http(SocketAddr::from(([127, 0, 0, 1], 8080)))
            .tcp(SocketAddr::from(([127, 0, 0, 1], 8081)))
            .file(home_file("max_video_frame.jpg"))
    }

    /// Preset for the depth stream (HTTP 8082, TCP 8083)
    pub fn depth() -> Self {
        Self::default()
            .http(SocketAddr::from(([127, 0, 0, 1], 8082)))
            .tcp(SocketAddr::from(([127, 0, 0, 1], 8083)))
            .file(home_file("max_depth_frame.jpg"))
    }

    /// Set the HTTP bind address
    pub fn http(mut self, addr: SocketAddr) -> Self {
        self.http_addr = Some(addr);
        self
    }

    /// Disable the HTTP sinks
    pub fn without_http(mut self) -> Self {
        self.http_addr = None;
        self
    }

    /// Set the TCP bind address
    pub fn tcp(mut self, addr: SocketAddr) -> Self {
        self.tcp_addr = Some(addr);
        self
    }

    /// Disable the TCP sink
    pub fn without_tcp(mut self) -> Self {
        self.tcp_addr = None;
        self
    }

    /// Set the downscale bound for matrix packets
    pub fn max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width.max(1);
        self.max_height = height.max(1);
        self
    }

    /// Enable the file snapshot sink
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Disable the file snapshot sink
    pub fn without_file(mut self) -> Self {
        self.file_path = None;
        self
    }

    /// Enable the virtual camera sink
    pub fn virtual_camera(mut self, camera: VirtualCameraConfig) -> Self {
        self.virtual_camera = Some(camera);
        self
    }

    /// Set the accept poll interval (at least [`MIN_INTERVAL`])
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_INTERVAL);
        self
    }

    /// Set the TCP send tick (at least [`MIN_INTERVAL`])
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.send_interval = interval.max(MIN_INTERVAL);
        self
    }
}

/// Resolve a file name in the user's home directory, falling back to the
/// working directory when `HOME` is unset.
fn home_file(name: &str) -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.http_addr.unwrap().port(), 8080);
        assert_eq!(config.tcp_addr.unwrap().port(), 8081);
        assert_eq!((config.max_width, config.max_height), (640, 480));
        assert!(config.file_path.is_none());
        assert!(config.virtual_camera.is_none());
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_presets() {
        let video = ServerConfig::video();
        let depth = ServerConfig::depth();

        assert_eq!(video.http_addr.unwrap().port(), 8080);
        assert_eq!(video.tcp_addr.unwrap().port(), 8081);
        assert!(video.file_path.unwrap().ends_with("max_video_frame.jpg"));

        assert_eq!(depth.http_addr.unwrap().port(), 8082);
        assert_eq!(depth.tcp_addr.unwrap().port(), 8083);
        assert!(depth.file_path.unwrap().ends_with("max_depth_frame.jpg"));
    }

    #[test]
    fn test_builder_disable_sinks() {
        let config = ServerConfig::video()
            .without_http()
            .without_tcp()
            .without_file();

        assert!(config.http_addr.is_none());
        assert!(config.tcp_addr.is_none());
        assert!(config.file_path.is_none());
    }

    #[test]
    fn test_builder_max_size_clamped() {
        let config = ServerConfig::default().max_size(0, 0);
        assert_eq!((config.max_width, config.max_height), (1, 1));
    }

    #[test]
    fn test_builder_intervals_clamped() {
        let config = ServerConfig::default()
            .poll_interval(Duration::ZERO)
            .send_interval(Duration::ZERO);

        assert_eq!(config.poll_interval, MIN_INTERVAL);
        assert_eq!(config.send_interval, MIN_INTERVAL);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .http(addr)
            .max_size(320, 240)
            .virtual_camera(VirtualCameraConfig::with_device("/dev/video4").fps(60))
            .poll_interval(Duration::from_millis(100))
            .send_interval(Duration::from_millis(10));

        assert_eq!(config.http_addr, Some(addr));
        assert_eq!((config.max_width, config.max_height), (320, 240));
        let camera = config.virtual_camera.unwrap();
        assert_eq!(camera.device, PathBuf::from("/dev/video4"));
        assert_eq!(camera.fps, 60);
        assert_eq!(config.poll_interval, Duration::from_millis(100));
        assert_eq!(config.send_interval, Duration::from_millis(10));
    }
}
