//! Counters for frame distribution
//!
//! [`Metrics`] is updated lock-free from the producer and sink tasks;
//! [`ServerStats`] is the plain snapshot handed to callers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time server statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Frames passed to `update()`
    pub frames_updated: u64,
    /// JPEGs published for the HTTP/file sinks
    pub jpeg_published: u64,
    /// Matrix packets published for the TCP sink
    pub packets_published: u64,
    /// Matrix packets actually written to a TCP client
    pub packets_sent: u64,
    /// JPEG or matrix encodes that failed
    pub encode_failures: u64,
    /// File snapshot writes that failed
    pub file_write_failures: u64,
    /// Frames pushed to the virtual camera
    pub camera_frames: u64,
    /// Currently connected `/stream` clients
    pub http_stream_clients: u64,
    /// TCP clients accepted over the server lifetime
    pub tcp_connections: u64,
    /// Time since the server was constructed
    pub uptime: Duration,
}

impl ServerStats {
    /// Rate of `update()` calls over the server lifetime
    pub fn update_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_updated as f64 / secs
        } else {
            0.0
        }
    }
}

/// Live counters
#[derive(Debug)]
pub struct Metrics {
    started_at: Instant,
    pub frames_updated: AtomicU64,
    pub jpeg_published: AtomicU64,
    pub packets_published: AtomicU64,
    pub packets_sent: AtomicU64,
    pub encode_failures: AtomicU64,
    pub file_write_failures: AtomicU64,
    pub camera_frames: AtomicU64,
    pub http_stream_clients: AtomicU64,
    pub tcp_connections: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            frames_updated: AtomicU64::new(0),
            jpeg_published: AtomicU64::new(0),
            packets_published: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            file_write_failures: AtomicU64::new(0),
            camera_frames: AtomicU64::new(0),
            http_stream_clients: AtomicU64::new(0),
            tcp_connections: AtomicU64::new(0),
        }
    }

    /// Increment a counter
    pub fn incr(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Take a snapshot of all counters
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            frames_updated: self.frames_updated.load(Ordering::Relaxed),
            jpeg_published: self.jpeg_published.load(Ordering::Relaxed),
            packets_published: self.packets_published.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            file_write_failures: self.file_write_failures.load(Ordering::Relaxed),
            camera_frames: self.camera_frames.load(Ordering::Relaxed),
            http_stream_clients: self.http_stream_clients.load(Ordering::Relaxed),
            tcp_connections: self.tcp_connections.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
