//! Matrix client session
//!
//! State machine for the single-client TCP sink and the send loop that runs
//! while a client is attached.
//!
//! ```text
//!   Idle ──start──► Listening ──accept──► Connected ──first send──► Sending
//!                       ▲                     │                        │
//!                       └──────── send failure / disconnect ───────────┘
//!   any ──stop──► Closed
//! ```

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::config::MIN_INTERVAL;
use crate::state::Latest;
use crate::stats::Metrics;

/// Lifecycle of the TCP matrix sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixSinkState {
    /// Listener not started
    Idle,
    /// Waiting for a client
    Listening,
    /// Client accepted, nothing sent yet
    Connected { peer: SocketAddr },
    /// At least one packet delivered to the client
    Sending { peer: SocketAddr },
    /// Listener shut down
    Closed,
}

impl MatrixSinkState {
    /// Listener is up (or a client was just dropped)
    pub fn on_listen(&mut self) {
        if *self != MatrixSinkState::Closed {
            *self = MatrixSinkState::Listening;
        }
    }

    /// A client was accepted
    pub fn on_accept(&mut self, peer: SocketAddr) {
        if *self == MatrixSinkState::Listening {
            *self = MatrixSinkState::Connected { peer };
        }
    }

    /// A packet was written to the client
    pub fn on_send(&mut self) {
        if let MatrixSinkState::Connected { peer } = *self {
            *self = MatrixSinkState::Sending { peer };
        }
    }

    /// The client went away; resume listening
    pub fn on_disconnect(&mut self) {
        if matches!(
            self,
            MatrixSinkState::Connected { .. } | MatrixSinkState::Sending { .. }
        ) {
            *self = MatrixSinkState::Listening;
        }
    }

    /// Terminal
    pub fn close(&mut self) {
        *self = MatrixSinkState::Closed;
    }

    /// Peer of the current client, if any
    pub fn peer(&self) -> Option<SocketAddr> {
        match self {
            MatrixSinkState::Connected { peer } | MatrixSinkState::Sending { peer } => Some(*peer),
            _ => None,
        }
    }

    pub fn is_client_attached(&self) -> bool {
        self.peer().is_some()
    }
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// A write failed; the client is gone
    Disconnected(std::io::Error),
    /// Shutdown was requested
    Stopped,
}

/// Push the latest matrix packet to one client until it disconnects or the
/// server stops.
///
/// Runs on a fixed tick. Each tick sends the current packet if it differs
/// from the last one sent; nothing is queued, so a slow client simply skips
/// the packets it was too slow for.
///
/// The client never sends anything, but its read half is watched between
/// ticks: end of stream or a read error ends the session even while no new
/// packets are being published.
pub async fn run_session<R, W, F>(
    mut reader: R,
    mut writer: W,
    packets: &Latest<Bytes>,
    send_interval: Duration,
    cancel: &CancellationToken,
    metrics: &Metrics,
    mut on_sent: F,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut(),
{
    let mut ticker = tokio::time::interval(send_interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_sent: Option<u64> = None;
    let mut discard = [0u8; 64];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Stopped,
            read = reader.read(&mut discard) => match read {
                Ok(0) => {
                    return SessionEnd::Disconnected(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "client closed the connection",
                    ))
                }
                // Anything the client sends is ignored
                Ok(_) => continue,
                Err(e) => return SessionEnd::Disconnected(e),
            },
            _ = ticker.tick() => {}
        }

        let packet = match packets.snapshot() {
            Some(packet) if last_sent != Some(packet.seq) => packet,
            _ => continue,
        };

        let written = tokio::select! {
            _ = cancel.cancelled() => return SessionEnd::Stopped,
            result = writer.write_all(&packet.value) => result,
        };

        if let Err(e) = written {
            return SessionEnd::Disconnected(e);
        }

        last_sent = Some(packet.seq);
        Metrics::incr(&metrics.packets_sent);
        on_sent();
    }
}
