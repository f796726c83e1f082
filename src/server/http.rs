//! HTTP sinks
//!
//! - `GET /stream`: `multipart/x-mixed-replace` MJPEG, one part per new frame
//! - `GET /frame.jpg`: the latest JPEG, or 404 before the first frame
//! - anything else: 404
//!
//! Each `/stream` client pulls from the shared latest-JPEG cell on its own
//! connection task. The body stream is only polled when the connection can
//! take more data, so a slow client skips frames instead of queueing them.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::{future, Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;

use crate::state::FrameState;
use crate::stats::Metrics;

/// Multipart boundary token
pub const BOUNDARY: &str = "frame";

/// Shared state for the HTTP handlers
pub struct HttpState {
    pub frames: Arc<FrameState>,
    pub metrics: Arc<Metrics>,
    pub cancel: CancellationToken,
}

/// Build the HTTP router
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/stream", get(stream))
        .route("/frame.jpg", get(snapshot))
        .fallback(not_found)
        .with_state(state)
}

/// Encode one multipart part carrying `jpeg`
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        BOUNDARY,
        jpeg.len()
    );

    let mut part = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    part.put_slice(head.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

/// Keeps the connected-client gauge accurate for the life of a stream body
struct StreamClientGuard {
    metrics: Arc<Metrics>,
}

impl StreamClientGuard {
    fn new(metrics: Arc<Metrics>) -> Self {
        let clients = Metrics::incr(&metrics.http_stream_clients);
        tracing::debug!(clients, "Stream client connected");
        Self { metrics }
    }
}

impl Drop for StreamClientGuard {
    fn drop(&mut self) {
        let prev = self.metrics.http_stream_clients.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(clients = prev.saturating_sub(1), "Stream client disconnected");
    }
}

/// Multipart body for one `/stream` client
///
/// Owns the client gauge guard, so the count drops exactly when hyper drops
/// the body: on client disconnect or at shutdown.
struct MjpegBody {
    parts: BoxStream<'static, Bytes>,
    _client: StreamClientGuard,
}

impl Stream for MjpegBody {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.parts.poll_next_unpin(cx).map(|part| part.map(Ok))
    }
}

/// GET /stream
async fn stream(State(state): State<Arc<HttpState>>) -> Response {
    let parts = WatchStream::new(state.frames.jpeg.subscribe())
        .filter_map(|latest| future::ready(latest.map(|jpeg| multipart_part(&jpeg.value))))
        .take_until(state.cancel.clone().cancelled_owned())
        .boxed();

    let body = MjpegBody {
        parts,
        _client: StreamClientGuard::new(state.metrics.clone()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={}", BOUNDARY),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// GET /frame.jpg
async fn snapshot(State(state): State<Arc<HttpState>>) -> Response {
    let jpeg = match state.frames.jpeg.snapshot() {
        Some(jpeg) => jpeg.value,
        None => return StatusCode::NOT_FOUND.into_response(),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/jpeg")
        .header(header::CONTENT_LENGTH, jpeg.len())
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(jpeg))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
