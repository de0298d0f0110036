//! HTTP listener for live device pings.
//!
//! Devices POST OwnTracks-style JSON to `/`. Decoding failures reject the
//! single ping and keep the service running; non-location messages are
//! acknowledged and dropped. All mutations and view writes happen under
//! one lock, so the persisted files always reflect whole pings even when
//! requests arrive concurrently.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::engine::Tracker;
use crate::{DeviceMessage, Error, Result};

#[derive(Clone)]
struct AppState {
    tracker: Arc<Mutex<Tracker>>,
}

/// Bind `0.0.0.0:port` and serve until the process is stopped.
pub async fn run(tracker: Tracker, port: u16) -> Result<()> {
    let state = AppState {
        tracker: Arc::new(Mutex::new(tracker)),
    };
    let app = Router::new().route("/", post(receive_ping)).with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;
    info!("listening for pings on {addr}");

    axum::serve(listener, app).await.map_err(Error::Serve)
}

async fn receive_ping(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let message: DeviceMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            warn!("rejected undecodable ping: {err}");
            return StatusCode::BAD_REQUEST;
        }
    };

    let ping = match message {
        DeviceMessage::Location(ping) => ping,
        DeviceMessage::Other => {
            debug!("ignoring non-location message");
            return StatusCode::OK;
        }
    };

    let mut tracker = state.tracker.lock().await;
    match tracker.handle_ping(&ping) {
        Ok(()) => StatusCode::OK,
        Err(err @ (Error::MalformedPing { .. } | Error::TimestampOutOfRange(_))) => {
            warn!("rejected ping: {err}");
            StatusCode::BAD_REQUEST
        }
        Err(err) => {
            error!("failed to apply ping: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
