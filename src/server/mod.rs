//! Frame distribution server
//!
//! [`DistributionServer`] takes frames from one producer and fans them out to
//! independent sinks:
//!
//! ```text
//!                       update(frame)
//!                            │
//!          ┌────────────┬────┴───────┬──────────────────┐
//!          ▼            ▼            ▼                  ▼
//!     JPEG encode   file write   virtual camera    RGB + fit + matrix
//!          │            (JPEG)     (paced)             encode
//!          ▼                                            ▼
//!   FrameState.jpeg                             FrameState.packet
//!      │        │                                       │
//!   /stream  /frame.jpg                          TCP send loop
//! ```
//!
//! Every step is fault isolated: a failure is logged, reflected in
//! [`SinkStatus`], and the remaining steps still run. Nothing a sink does
//! can fail `update()`.

pub mod config;
pub mod http;
pub mod listener;
pub mod session;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use bytes::Bytes;
use image::imageops::FilterType;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::codec::{encode_jpeg, encode_packet, JPEG_QUALITY};
use crate::error::{Error, Result};
use crate::frame::{fit_within, resize_rgb, Frame};
use crate::sink::{Availability, DeviceOpener, FileSnapshotSink, LoopbackOpener, VirtualCameraSink};
use crate::state::FrameState;
use crate::stats::{Metrics, ServerStats};

pub use config::{ServerConfig, VirtualCameraConfig};
pub use http::HttpState;
pub use listener::MatrixListener;
pub use session::MatrixSinkState;

/// Shortest grace given to a background task before it is aborted on stop
const MIN_STOP_GRACE: Duration = Duration::from_millis(100);

/// Log a progress line every this many frames
const PROGRESS_EVERY: u64 = 30;

/// Health of one sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkHealth {
    /// Not configured
    Disabled,
    /// Configured, `start()` not called yet
    Pending,
    /// Running
    Active,
    /// Gave up for the rest of the process
    Failed(String),
    /// Shut down by `stop()`
    Stopped,
}

impl SinkHealth {
    pub fn is_active(&self) -> bool {
        *self == SinkHealth::Active
    }

    fn configured(enabled: bool) -> Self {
        if enabled {
            SinkHealth::Pending
        } else {
            SinkHealth::Disabled
        }
    }

    fn stop(&mut self) {
        if matches!(self, SinkHealth::Active | SinkHealth::Pending) {
            *self = SinkHealth::Stopped;
        }
    }
}

/// Health of every sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkStatus {
    /// `/stream` and `/frame.jpg`
    pub http: SinkHealth,
    /// Matrix packets over TCP
    pub tcp: SinkHealth,
    /// Local JPEG snapshot
    pub file: SinkHealth,
    /// Virtual camera device
    pub camera: SinkHealth,
}

impl SinkStatus {
    fn from_config(config: &ServerConfig) -> Self {
        Self {
            http: SinkHealth::configured(config.http_addr.is_some()),
            tcp: SinkHealth::configured(config.tcp_addr.is_some()),
            file: SinkHealth::configured(config.file_path.is_some()),
            camera: SinkHealth::configured(config.virtual_camera.is_some()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Stopped,
}

struct Lifecycle {
    phase: Phase,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

/// Sink status plus the addresses actually bound
#[derive(Debug)]
struct Runtime {
    status: SinkStatus,
    http_addr: Option<SocketAddr>,
    tcp_addr: Option<SocketAddr>,
}

/// Real-time frame distribution server
pub struct DistributionServer {
    config: ServerConfig,
    frames: Arc<FrameState>,
    metrics: Arc<Metrics>,
    cancel: CancellationToken,
    opener: Arc<dyn DeviceOpener>,
    lifecycle: Mutex<Lifecycle>,
    runtime: RwLock<Runtime>,
    camera: Mutex<Option<VirtualCameraSink>>,
    file: Option<FileSnapshotSink>,
    matrix_state: Arc<watch::Sender<MatrixSinkState>>,
    frame_count: AtomicU64,
}

impl DistributionServer {
    /// Create a server; nothing is bound until [`start`](Self::start)
    pub fn new(config: ServerConfig) -> Self {
        Self::with_device_opener(config, Arc::new(LoopbackOpener))
    }

    /// Create a server with a custom virtual camera backend
    pub fn with_device_opener(config: ServerConfig, opener: Arc<dyn DeviceOpener>) -> Self {
        let (matrix_state, _) = watch::channel(MatrixSinkState::Idle);

        Self {
            file: config.file_path.clone().map(FileSnapshotSink::new),
            runtime: RwLock::new(Runtime {
                status: SinkStatus::from_config(&config),
                http_addr: None,
                tcp_addr: None,
            }),
            config,
            frames: Arc::new(FrameState::new()),
            metrics: Arc::new(Metrics::new()),
            cancel: CancellationToken::new(),
            opener,
            lifecycle: Mutex::new(Lifecycle {
                phase: Phase::Idle,
                tasks: Vec::new(),
            }),
            camera: Mutex::new(None),
            matrix_state: Arc::new(matrix_state),
            frame_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Latest encoded representations
    pub fn frames(&self) -> &Arc<FrameState> {
        &self.frames
    }

    /// Bound HTTP address, once started
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.read_runtime(|rt| rt.http_addr)
    }

    /// Bound TCP address, once started
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.read_runtime(|rt| rt.tcp_addr)
    }

    /// Health of every sink
    pub fn status(&self) -> SinkStatus {
        self.read_runtime(|rt| rt.status.clone())
    }

    /// Counter snapshot
    pub fn stats(&self) -> ServerStats {
        self.metrics.snapshot()
    }

    /// Current state of the TCP matrix sink
    pub fn matrix_state(&self) -> MatrixSinkState {
        *self.matrix_state.borrow()
    }

    /// Watch the TCP matrix sink state
    pub fn watch_matrix_state(&self) -> watch::Receiver<MatrixSinkState> {
        self.matrix_state.subscribe()
    }

    /// Bind listeners, spawn background loops and open the virtual camera
    ///
    /// Per-sink failures (port in use, no camera backend) disable that sink
    /// and are reported through [`status`](Self::status); they do not fail
    /// the call. Calling `start()` on a running server is a no-op; a stopped
    /// server cannot be restarted.
    pub async fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle.lock().await;
        match lifecycle.phase {
            Phase::Running => {
                tracing::warn!("Distribution server already running");
                return Ok(());
            }
            Phase::Stopped => return Err(Error::Stopped),
            Phase::Idle => lifecycle.phase = Phase::Running,
        }

        if let Some(addr) = self.config.http_addr {
            match self.start_http(addr).await {
                Ok((local, task)) => {
                    lifecycle.tasks.push(("http", task));
                    self.write_runtime(|rt| {
                        rt.http_addr = Some(local);
                        rt.status.http = SinkHealth::Active;
                    });
                    tracing::info!(url = %format!("http://{}/stream", local), "MJPEG stream available");
                    tracing::info!(url = %format!("http://{}/frame.jpg", local), "Single frame available");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "HTTP sinks disabled");
                    self.write_runtime(|rt| rt.status.http = SinkHealth::Failed(e.to_string()));
                }
            }
        }

        if let Some(addr) = self.config.tcp_addr {
            match self.start_tcp(addr) {
                Ok((local, task)) => {
                    lifecycle.tasks.push(("tcp", task));
                    self.write_runtime(|rt| {
                        rt.tcp_addr = Some(local);
                        rt.status.tcp = SinkHealth::Active;
                    });
                    tracing::info!(addr = %local, "Matrix TCP server listening");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP sink disabled");
                    self.write_runtime(|rt| rt.status.tcp = SinkHealth::Failed(e.to_string()));
                }
            }
        }

        if let Some(file) = &self.file {
            tracing::info!(path = %file.path().display(), "Local file updated on every frame");
            self.write_runtime(|rt| rt.status.file = SinkHealth::Active);
        }

        if let Some(camera_config) = &self.config.virtual_camera {
            let sink = VirtualCameraSink::open(camera_config.clone(), self.opener.as_ref());
            let health = match sink.availability() {
                Availability::Available => SinkHealth::Active,
                Availability::Unavailable(reason) => SinkHealth::Failed(reason.clone()),
            };
            self.write_runtime(|rt| rt.status.camera = health);
            *self.camera.lock().await = Some(sink);
        }

        Ok(())
    }

    async fn start_http(&self, addr: SocketAddr) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind {
                sink: "http",
                addr,
                source,
            })?;
        let local = listener.local_addr()?;

        let app = http::router(Arc::new(HttpState {
            frames: Arc::clone(&self.frames),
            metrics: Arc::clone(&self.metrics),
            cancel: self.cancel.clone(),
        }));

        let shutdown = self.cancel.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "HTTP server error");
            }
            tracing::info!("HTTP server closed");
        });

        Ok((local, task))
    }

    fn start_tcp(&self, addr: SocketAddr) -> Result<(SocketAddr, JoinHandle<()>)> {
        let listener = MatrixListener::new(
            listener::bind(addr)?,
            &self.config,
            Arc::clone(&self.frames),
            Arc::clone(&self.metrics),
            Arc::clone(&self.matrix_state),
            self.cancel.clone(),
        );
        let local = listener.local_addr()?;

        Ok((local, tokio::spawn(listener.run())))
    }

    /// Distribute one frame to every active sink
    ///
    /// Encodes once per representation, publishes each one atomically, and
    /// paces to the virtual camera's frame clock when that sink is active.
    pub async fn update(&self, frame: Frame) {
        let count = self.frame_count.fetch_add(1, Ordering::Relaxed) + 1;
        Metrics::incr(&self.metrics.frames_updated);

        let status = self.status();

        // Both encodings are CPU bound; run them side by side off the runtime
        let jpeg_job = (status.http.is_active() || status.file.is_active()).then(|| {
            let frame = frame.clone();
            encode_blocking(move || encode_jpeg(&frame, JPEG_QUALITY))
        });
        let packet_job = status.tcp.is_active().then(|| {
            let frame = frame.clone();
            let (max_width, max_height) = (self.config.max_width, self.config.max_height);
            encode_blocking(move || prepare_packet(&frame, max_width, max_height))
        });

        // 1. JPEG for the HTTP sinks (and the file sink, which reuses it)
        let jpeg = match jpeg_job {
            Some(job) => self.publish_jpeg(&frame, job.await),
            None => None,
        };

        // 2. File snapshot
        if let (Some(file), Some(jpeg)) = (&self.file, &jpeg) {
            if status.file.is_active() && file.write(jpeg).await.is_err() {
                Metrics::incr(&self.metrics.file_write_failures);
            }
        }

        // 3. Virtual camera
        if status.camera.is_active() {
            self.push_camera(&frame).await;
        }

        // 4. Matrix packet for the TCP sink
        if let Some(job) = packet_job {
            self.publish_packet(job.await, count);
        }
    }

    fn publish_jpeg(&self, frame: &Frame, encoded: Result<Bytes>) -> Option<Bytes> {
        match encoded {
            Ok(jpeg) => {
                self.frames.jpeg.publish(jpeg.clone());
                Metrics::incr(&self.metrics.jpeg_published);
                Some(jpeg)
            }
            Err(e) => {
                Metrics::incr(&self.metrics.encode_failures);
                tracing::warn!(
                    width = frame.width(),
                    height = frame.height(),
                    error = %e,
                    "JPEG encode failed, keeping previous frame"
                );
                None
            }
        }
    }

    async fn push_camera(&self, frame: &Frame) {
        let mut camera = self.camera.lock().await;
        let sink = match camera.as_mut() {
            Some(sink) => sink,
            None => return,
        };

        match sink.push(frame).await {
            Ok(()) => {
                Metrics::incr(&self.metrics.camera_frames);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to send frame to virtual camera");
                if let Availability::Unavailable(reason) = sink.availability() {
                    let health = SinkHealth::Failed(reason.clone());
                    self.write_runtime(|rt| rt.status.camera = health);
                }
            }
        }
    }

    fn publish_packet(&self, packet: Result<PreparedPacket>, count: u64) {
        match packet {
            Ok(PreparedPacket { width, height, packet }) => {
                let bytes = packet.len();
                self.frames.packet.publish(packet);
                let published = Metrics::incr(&self.metrics.packets_published);

                if published == 1 {
                    tracing::info!(width, height, bytes, "First frame prepared");
                }
                if count % PROGRESS_EVERY == 0 {
                    tracing::debug!(
                        frames = count,
                        width,
                        height,
                        bytes,
                        "Prepared frames for TCP stream"
                    );
                }
            }
            Err(e) => {
                Metrics::incr(&self.metrics.encode_failures);
                tracing::warn!(error = %e, "Frame preparation failed, keeping previous packet");
            }
        }
    }

    /// Stop every sink and release sockets, files and devices
    ///
    /// Safe to call repeatedly, before `start()`, or after a partial start.
    /// Background loops observe the stop within one poll interval; any that
    /// do not are aborted.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let (was_running, tasks) = {
            let mut lifecycle = self.lifecycle.lock().await;
            let was_running = lifecycle.phase == Phase::Running;
            lifecycle.phase = Phase::Stopped;
            (was_running, std::mem::take(&mut lifecycle.tasks))
        };

        let grace = self.config.poll_interval.max(MIN_STOP_GRACE);
        for (name, mut task) in tasks {
            if tokio::time::timeout(grace, &mut task).await.is_err() {
                tracing::warn!(task = name, "Task did not stop in time, aborting");
                task.abort();
                let _ = task.await;
            }
        }

        if let Some(mut camera) = self.camera.lock().await.take() {
            camera.close();
        }

        self.matrix_state.send_modify(|s| s.close());
        self.write_runtime(|rt| {
            rt.status.http.stop();
            rt.status.tcp.stop();
            rt.status.file.stop();
            rt.status.camera.stop();
        });

        if was_running {
            tracing::info!("Distribution server stopped");
        }
    }

    fn read_runtime<T>(&self, f: impl FnOnce(&Runtime) -> T) -> T {
        f(&self.runtime.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write_runtime(&self, f: impl FnOnce(&mut Runtime)) {
        f(&mut self.runtime.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Downscaled matrix packet ready to publish
struct PreparedPacket {
    width: u32,
    height: u32,
    packet: Bytes,
}

/// RGB conversion, aspect-preserving downscale and packet framing
fn prepare_packet(frame: &Frame, max_width: u32, max_height: u32) -> Result<PreparedPacket> {
    let (width, height) = fit_within(frame.width(), frame.height(), max_width, max_height);
    let rgb = resize_rgb(frame.to_rgb()?, width, height, FilterType::Triangle);
    let packet = encode_packet(width, height, rgb.as_raw())?;

    Ok(PreparedPacket {
        width,
        height,
        packet,
    })
}

/// Start an encoder on the blocking pool right away; await the result later
fn encode_blocking<T, F>(job: F) -> impl Future<Output = Result<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(job);
    async move {
        match task.await {
            Ok(result) => result,
            Err(e) => Err(Error::Encode(format!("encoder task failed: {}", e))),
        }
    }
}

impl Drop for DistributionServer {
    fn drop(&mut self) {
        // Background loops exit on their own once cancelled
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::virtual_camera::tests::{FailingOpener, RecordingOpener};

    fn local_config() -> ServerConfig {
        ServerConfig::default()
            .http("127.0.0.1:0".parse().unwrap())
            .tcp("127.0.0.1:0".parse().unwrap())
            .poll_interval(Duration::from_millis(50))
            .send_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_status_before_start() {
        let server = DistributionServer::new(local_config());
        let status = server.status();

        assert_eq!(status.http, SinkHealth::Pending);
        assert_eq!(status.tcp, SinkHealth::Pending);
        assert_eq!(status.file, SinkHealth::Disabled);
        assert_eq!(status.camera, SinkHealth::Disabled);
        assert_eq!(server.matrix_state(), MatrixSinkState::Idle);
        assert!(server.http_addr().is_none());
    }

    #[tokio::test]
    async fn test_update_before_start_publishes_nothing() {
        let server = DistributionServer::new(local_config());
        server.update(Frame::solid(8, 8, [0, 0, 0]).unwrap()).await;

        assert!(server.frames().jpeg.snapshot().is_none());
        assert!(server.frames().packet.snapshot().is_none());
        assert_eq!(server.stats().frames_updated, 1);
    }

    #[tokio::test]
    async fn test_start_update_stop() {
        let server = DistributionServer::new(local_config());
        server.start().await.unwrap();

        assert!(server.http_addr().is_some());
        assert!(server.tcp_addr().is_some());
        assert!(server.status().http.is_active());

        server.update(Frame::solid(1280, 720, [0, 0, 255]).unwrap()).await;

        let packet = server.frames().packet.snapshot().unwrap();
        let header = crate::codec::MatrixHeader::parse(&packet.value).unwrap().unwrap();
        assert_eq!((header.width, header.height), (640, 360));
        assert!(server.frames().jpeg.snapshot().is_some());

        server.stop().await;
        assert_eq!(server.status().http, SinkHealth::Stopped);
        assert_eq!(server.matrix_state(), MatrixSinkState::Closed);
    }

    #[tokio::test]
    async fn test_start_twice_is_noop_and_restart_fails() {
        let server = DistributionServer::new(local_config());
        server.start().await.unwrap();
        let addr = server.http_addr();

        server.start().await.unwrap();
        assert_eq!(server.http_addr(), addr);

        server.stop().await;
        assert!(matches!(server.start().await, Err(Error::Stopped)));
    }

    #[tokio::test]
    async fn test_stop_without_start_and_twice() {
        let server = DistributionServer::new(local_config());
        server.stop().await;
        server.stop().await;

        assert_eq!(server.status().http, SinkHealth::Stopped);
        assert_eq!(server.matrix_state(), MatrixSinkState::Closed);
    }

    #[tokio::test]
    async fn test_http_bind_failure_is_isolated() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = local_config().http(taken.local_addr().unwrap());

        let server = DistributionServer::new(config);
        server.start().await.unwrap();

        let status = server.status();
        assert!(matches!(status.http, SinkHealth::Failed(_)));
        assert!(status.tcp.is_active());

        // Producer keeps working for the surviving sink
        server.update(Frame::solid(4, 4, [1, 2, 3]).unwrap()).await;
        assert!(server.frames().packet.snapshot().is_some());

        server.stop().await;
    }

    #[tokio::test]
    async fn test_camera_open_failure_is_isolated() {
        let config = local_config().virtual_camera(VirtualCameraConfig::default());
        let server = DistributionServer::with_device_opener(config, Arc::new(FailingOpener));
        server.start().await.unwrap();

        assert!(matches!(server.status().camera, SinkHealth::Failed(_)));

        server.update(Frame::solid(4, 4, [1, 2, 3]).unwrap()).await;
        assert!(server.frames().jpeg.snapshot().is_some());
        assert!(server.frames().packet.snapshot().is_some());
        assert_eq!(server.stats().camera_frames, 0);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_camera_receives_resized_frames() {
        let opener = RecordingOpener::default();
        let camera = VirtualCameraConfig::default().resolution(4, 2).fps(1000);
        let config = local_config().without_http().without_tcp().virtual_camera(camera);

        let server = DistributionServer::with_device_opener(config, Arc::new(opener.clone()));
        server.start().await.unwrap();
        assert!(server.status().camera.is_active());

        server.update(Frame::solid(16, 8, [0, 0, 0]).unwrap()).await;
        server.update(Frame::solid(16, 8, [0, 0, 0]).unwrap()).await;

        assert_eq!(opener.frames.lock().unwrap().len(), 2);
        assert_eq!(opener.frames.lock().unwrap()[0].len(), 4 * 2 * 3);
        assert_eq!(server.stats().camera_frames, 2);

        server.stop().await;
        assert_eq!(server.status().camera, SinkHealth::Stopped);
    }

    #[tokio::test]
    async fn test_camera_device_failure_is_isolated() {
        let opener = RecordingOpener {
            fail_after: Some(0),
            ..Default::default()
        };
        let camera = VirtualCameraConfig::default().resolution(4, 2).fps(1000);
        let config = local_config().virtual_camera(camera);

        let server = DistributionServer::with_device_opener(config, Arc::new(opener));
        server.start().await.unwrap();

        server.update(Frame::solid(8, 8, [9, 9, 9]).unwrap()).await;
        assert!(matches!(server.status().camera, SinkHealth::Failed(_)));

        server.update(Frame::solid(8, 8, [9, 9, 9]).unwrap()).await;
        assert_eq!(server.frames().jpeg.snapshot().unwrap().seq, 2);
        assert_eq!(server.frames().packet.snapshot().unwrap().seq, 2);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_jpeg_failure_keeps_previous_and_packet_flows() {
        let server = DistributionServer::new(local_config());
        server.start().await.unwrap();

        server.update(Frame::solid(8, 8, [0, 0, 0]).unwrap()).await;
        let first = server.frames().jpeg.snapshot().unwrap();

        // Wider than any JPEG can be
        server.update(Frame::solid(70_000, 1, [0, 0, 0]).unwrap()).await;

        let jpeg = server.frames().jpeg.snapshot().unwrap();
        assert_eq!(jpeg.seq, first.seq);
        assert_eq!(server.stats().encode_failures, 1);

        let packet = server.frames().packet.snapshot().unwrap();
        assert_eq!(packet.seq, 2);
        let header = crate::codec::MatrixHeader::parse(&packet.value).unwrap().unwrap();
        assert_eq!((header.width, header.height), (640, 1));

        server.stop().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_update_encodes_off_the_runtime() {
        use std::sync::atomic::AtomicUsize;

        let server = DistributionServer::new(local_config());
        server.start().await.unwrap();

        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    ticks.fetch_add(1, Ordering::Relaxed);
                }
            })
        };
        tokio::task::yield_now().await;

        // Other tasks on this single thread keep running while frames encode
        let before = ticks.load(Ordering::Relaxed);
        server.update(Frame::solid(1920, 1080, [10, 20, 30]).unwrap()).await;
        assert!(ticks.load(Ordering::Relaxed) > before);

        ticker.abort();
        server.stop().await;
    }

    #[tokio::test]
    async fn test_file_sink_writes_jpeg() {
        let path = std::env::temp_dir().join(format!("framecast-server-{}.jpg", std::process::id()));
        let config = local_config().without_http().without_tcp().file(&path);

        let server = DistributionServer::new(config);
        server.start().await.unwrap();
        server.update(Frame::solid(32, 16, [0, 255, 0]).unwrap()).await;

        let written = tokio::fs::read(&path).await.unwrap();
        let decoded = image::load_from_memory(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 16));

        server.stop().await;
        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_file_failure_does_not_stop_other_sinks() {
        let path = std::env::temp_dir()
            .join(format!("framecast-missing-{}", std::process::id()))
            .join("frame.jpg");
        let server = DistributionServer::new(local_config().file(path));
        server.start().await.unwrap();

        server.update(Frame::solid(8, 8, [0, 0, 0]).unwrap()).await;
        server.update(Frame::solid(8, 8, [0, 0, 0]).unwrap()).await;

        assert_eq!(server.stats().file_write_failures, 2);
        assert_eq!(server.frames().jpeg.snapshot().unwrap().seq, 2);
        assert_eq!(server.frames().packet.snapshot().unwrap().seq, 2);

        server.stop().await;
    }
}
