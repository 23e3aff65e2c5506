//! HTTP surface of the barcode sidecar.
//!
//! The router only reads shared pipeline state: scans come from the
//! [`ScanLog`], frames from the [`FrameSlot`], camera health from
//! [`CaptureHealth`]. Nothing here touches the camera directly.

pub mod config;
pub mod error;
pub mod routes;

pub use config::{ServerSettings, SidecarArgs, SourceKind};
pub use error::SidecarError;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use lector_decode::{Decoder, StrategySet};
use lector_scan::{CaptureHealth, DecodeStats, FrameSlot, MemorySampler, Pipeline, ScanLog};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};

/// Everything a request handler can see.
#[derive(Clone)]
pub struct AppState {
    pub log: Arc<ScanLog>,
    pub slot: Arc<FrameSlot>,
    pub health: Arc<CaptureHealth>,
    pub stats: Arc<DecodeStats>,
    pub decoder: Arc<dyn Decoder>,
    pub strategies: StrategySet,
    pub memory: Arc<Mutex<MemorySampler>>,
    pub settings: Arc<ServerSettings>,
    // flips to true once the server starts shutting down
    stop: Arc<watch::Sender<bool>>,
}

impl AppState {
    pub fn new(
        log: Arc<ScanLog>,
        slot: Arc<FrameSlot>,
        health: Arc<CaptureHealth>,
        stats: Arc<DecodeStats>,
        decoder: Arc<dyn Decoder>,
        strategies: StrategySet,
        settings: ServerSettings,
    ) -> Self {
        Self {
            log,
            slot,
            health,
            stats,
            decoder,
            strategies,
            memory: Arc::new(Mutex::new(MemorySampler::new())),
            settings: Arc::new(settings),
            stop: Arc::new(watch::channel(false).0),
        }
    }

    /// End open streams and long polls so a graceful shutdown can finish.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    pub fn stopping(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }

    /// Share the handles of a running pipeline.
    pub fn from_pipeline(pipeline: &Pipeline, settings: ServerSettings) -> Self {
        Self::new(
            Arc::clone(pipeline.log()),
            Arc::clone(pipeline.slot()),
            Arc::clone(pipeline.health()),
            Arc::clone(pipeline.stats()),
            Arc::clone(pipeline.decoder()),
            pipeline.strategies().clone(),
            settings,
        )
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/next_scan", get(routes::next_scan))
        .route("/trigger_autofocus", post(routes::trigger_autofocus))
        .route("/video", get(routes::video))
        .route("/debug/frame", get(routes::debug_frame))
        .route("/debug/memory", get(routes::debug_memory))
        .layer(cors)
        .with_state(state)
}
