//! Demo server fed by a synthetic test pattern
//!
//! Runs a video and a depth distribution server side by side:
//!
//!   framecast                         # video on 8080/8081, depth on 8082/8083
//!   framecast --no-depth --virtual-camera
//!   RUST_LOG=framecast=debug framecast --fps 15
//!
//! Then open http://127.0.0.1:8080/stream in a browser.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::time::MissedTickBehavior;

use framecast::{
    DistributionServer, Frame, MotionBoard, MotionSlot, ServerConfig, VirtualCameraConfig,
};

#[derive(Debug, Parser)]
#[command(name = "framecast", version, about = "Real-time frame distribution server")]
struct Args {
    /// Address every sink binds to
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// HTTP port of the video server
    #[arg(long, default_value_t = 8080)]
    video_http_port: u16,

    /// TCP matrix port of the video server
    #[arg(long, default_value_t = 8081)]
    video_tcp_port: u16,

    /// HTTP port of the depth server
    #[arg(long, default_value_t = 8082)]
    depth_http_port: u16,

    /// TCP matrix port of the depth server
    #[arg(long, default_value_t = 8083)]
    depth_tcp_port: u16,

    /// Do not run the video server
    #[arg(long)]
    no_video: bool,

    /// Do not run the depth server
    #[arg(long)]
    no_depth: bool,

    /// Do not write snapshot files
    #[arg(long)]
    no_files: bool,

    /// Upper bound for the TCP matrix frames, as WIDTHxHEIGHT
    #[arg(long, default_value = "640x480", value_parser = parse_size)]
    max_size: (u32, u32),

    /// Also publish the video stream to a virtual camera device
    #[arg(long)]
    virtual_camera: bool,

    /// Virtual camera device path
    #[arg(long, default_value = "/dev/video10")]
    camera_device: PathBuf,

    /// Producer frame rate
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Width of the generated frames
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Height of the generated frames
    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {:?}", s))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".into());
    }
    Ok((w, h))
}

impl Args {
    fn video_config(&self) -> ServerConfig {
        let mut config = ServerConfig::video()
            .http(SocketAddr::new(self.host, self.video_http_port))
            .tcp(SocketAddr::new(self.host, self.video_tcp_port))
            .max_size(self.max_size.0, self.max_size.1);
        if self.no_files {
            config = config.without_file();
        }
        if self.virtual_camera {
            config = config.virtual_camera(
                VirtualCameraConfig::with_device(&self.camera_device).fps(self.fps),
            );
        }
        config
    }

    fn depth_config(&self) -> ServerConfig {
        let mut config = ServerConfig::depth()
            .http(SocketAddr::new(self.host, self.depth_http_port))
            .tcp(SocketAddr::new(self.host, self.depth_tcp_port))
            .max_size(self.max_size.0, self.max_size.1);
        if self.no_files {
            config = config.without_file();
        }
        config
    }
}

/// Moving bar over a colour gradient, plus a matching fake depth map
struct TestPattern {
    width: u32,
    height: u32,
    tick: u64,
    last_bar: u32,
}

impl TestPattern {
    const BAR_WIDTH: u32 = 40;

    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: 0,
            last_bar: 0,
        }
    }

    fn bar_x(&self) -> u32 {
        let span = u64::from(self.width.saturating_sub(Self::BAR_WIDTH).max(1));
        // Sweep back and forth across the frame
        let pos = (self.tick * 8) % (2 * span);
        (if pos < span { pos } else { 2 * span - pos }) as u32
    }

    fn next(&mut self) -> framecast::Result<(Frame, Frame)> {
        let (w, h) = (self.width as usize, self.height as usize);
        let bar = self.bar_x() as usize..(self.bar_x() + Self::BAR_WIDTH) as usize;

        let mut video = Vec::with_capacity(w * h * 3);
        let mut depth = Vec::with_capacity(w * h * 3);
        for y in 0..h {
            for x in 0..w {
                if bar.contains(&x) {
                    video.extend_from_slice(&[255, 255, 255]);
                    depth.extend_from_slice(&[230, 230, 230]);
                } else {
                    let b = (x * 255 / w) as u8;
                    let g = (y * 255 / h) as u8;
                    let r = (self.tick % 256) as u8;
                    video.extend_from_slice(&[b, g, r]);
                    let d = (y * 128 / h) as u8;
                    depth.extend_from_slice(&[d, d, d]);
                }
            }
        }

        self.tick += 1;
        Ok((
            Frame::from_bgr(self.width, self.height, video)?,
            Frame::from_bgr(self.width, self.height, depth)?,
        ))
    }

    /// Report which way the bar moved as a motion label
    fn observe(&mut self, board: &MotionBoard) {
        let x = self.bar_x();
        if x > self.last_bar {
            board.record(MotionSlot::Right, "swipe right");
        } else if x < self.last_bar {
            board.record(MotionSlot::Left, "swipe left");
        }
        if x == 0 || x + Self::BAR_WIDTH >= self.width {
            board.record(MotionSlot::Both, "bounce");
        }
        self.last_bar = x;
    }
}

async fn run_server(server: Option<&DistributionServer>, frame: Frame) {
    if let Some(server) = server {
        server.update(frame).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("framecast=info")),
        )
        .init();

    let args = Args::parse();
    if args.no_video && args.no_depth {
        return Err("nothing to run: both --no-video and --no-depth given".into());
    }

    let video = (!args.no_video).then(|| DistributionServer::new(args.video_config()));
    let depth = (!args.no_depth).then(|| DistributionServer::new(args.depth_config()));

    for server in video.iter().chain(depth.iter()) {
        server.start().await?;
    }

    let mut pattern = TestPattern::new(args.width, args.height);
    let board = MotionBoard::new();
    let mut headline = None;

    let fps = args.fps.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / fps);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(fps, width = args.width, height = args.height, "Producing test pattern");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let (video_frame, depth_frame) = pattern.next()?;
                pattern.observe(&board);

                tokio::join!(
                    run_server(video.as_ref(), video_frame),
                    run_server(depth.as_ref(), depth_frame),
                );

                board.prune();
                let current = board.headline();
                if current != headline {
                    if let Some((slot, label)) = &current {
                        tracing::info!(?slot, label = %label, "Motion");
                    }
                    headline = current;
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    for server in video.iter().chain(depth.iter()) {
        let stats = server.stats();
        tracing::info!(
            frames = stats.frames_updated,
            packets_sent = stats.packets_sent,
            rate = %format!("{:.1}", stats.update_rate()),
            "Server summary"
        );
        server.stop().await;
    }

    Ok(())
}
