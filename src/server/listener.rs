//! Matrix TCP listener
//!
//! Accepts one client at a time and runs its send loop inline, so a second
//! connection waits in the kernel backlog until the first disconnects. The
//! accept itself is bounded by the poll interval so shutdown is observed
//! promptly even with nobody connecting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::server::config::{ServerConfig, MIN_INTERVAL};
use crate::server::session::{run_session, MatrixSinkState, SessionEnd};
use crate::state::FrameState;
use crate::stats::Metrics;

/// Backoff after a failed accept
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Bind the matrix listener with `SO_REUSEADDR` and a backlog of one
pub fn bind(addr: SocketAddr) -> Result<TcpListener> {
    let bind_err = |source| Error::Bind {
        sink: "tcp",
        addr,
        source,
    };

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(bind_err)?;

    socket.set_reuseaddr(true).map_err(bind_err)?;
    socket.bind(addr).map_err(bind_err)?;
    socket.listen(1).map_err(bind_err)
}

/// Single-client matrix packet server
pub struct MatrixListener {
    listener: TcpListener,
    frames: Arc<FrameState>,
    metrics: Arc<Metrics>,
    state: Arc<watch::Sender<MatrixSinkState>>,
    cancel: CancellationToken,
    poll_interval: Duration,
    send_interval: Duration,
    tcp_nodelay: bool,
}

impl MatrixListener {
    pub fn new(
        listener: TcpListener,
        config: &ServerConfig,
        frames: Arc<FrameState>,
        metrics: Arc<Metrics>,
        state: Arc<watch::Sender<MatrixSinkState>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            listener,
            frames,
            metrics,
            state,
            cancel,
            poll_interval: config.poll_interval.max(MIN_INTERVAL),
            send_interval: config.send_interval.max(MIN_INTERVAL),
            tcp_nodelay: config.tcp_nodelay,
        }
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve clients until cancelled
    pub async fn run(self) {
        loop {
            self.state.send_modify(|s| s.on_listen());

            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = tokio::time::timeout(self.poll_interval, self.listener.accept()) => result,
            };

            let (socket, peer) = match accepted {
                // Poll interval elapsed with no client
                Err(_) => continue,
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Failed to accept matrix client");
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => continue,
                    }
                }
            };

            if let SessionEnd::Stopped = self.serve(socket, peer).await {
                break;
            }
        }

        self.state.send_modify(|s| s.close());
        tracing::info!("Matrix listener closed");
    }

    async fn serve(&self, mut socket: TcpStream, peer: SocketAddr) -> SessionEnd {
        Metrics::incr(&self.metrics.tcp_connections);
        tracing::info!(peer = %peer, "Matrix client connected");

        if self.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(peer = %peer, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        self.state.send_modify(|s| s.on_accept(peer));

        let state = &self.state;
        let (reader, writer) = socket.split();
        let end = run_session(
            reader,
            writer,
            &self.frames.packet,
            self.send_interval,
            &self.cancel,
            &self.metrics,
            || {
                state.send_if_modified(|s| {
                    let before = *s;
                    s.on_send();
                    before != *s
                });
            },
        )
        .await;

        match &end {
            SessionEnd::Disconnected(e) => {
                tracing::info!(peer = %peer, error = %e, "Matrix client disconnected");
                self.state.send_modify(|s| s.on_disconnect());
            }
            SessionEnd::Stopped => {
                tracing::debug!(peer = %peer, "Matrix session stopped");
            }
        }

        end
    }
}
