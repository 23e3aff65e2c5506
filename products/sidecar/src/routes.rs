use crate::{AppState, SidecarError};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use futures_util::stream;
use lector_base::Vec2;
use lector_decode::Symbol;
use lector_image::{encode_jpeg, resize, save_jpeg};
use lector_scan::{AwaitOutcome, Frame, Scan};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;

fn error_body(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn scan_body(scan: &Scan) -> Value {
    json!({
        "success": true,
        "id": scan.id,
        "code": scan.code,
        "timestamp": scan.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

fn camera_failure(error: String) -> Response {
    error_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "success": false, "code": null, "error": error }),
    )
}

/// Malformed or missing cursors read as 0.
pub fn parse_since_id(params: &HashMap<String, String>) -> u64 {
    params
        .get("since_id")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

// resolves once the server is shutting down
async fn stopped(mut stopping: watch::Receiver<bool>) {
    let _ = stopping.wait_for(|stop| *stop).await;
}

fn timeout_body(latest_id: u64) -> Response {
    Json(json!({
        "success": false,
        "id": latest_id,
        "code": null,
        "timeout": true,
    }))
    .into_response()
}

pub async fn health(State(state): State<AppState>) -> Response {
    match state.health.status() {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(error) => error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "status": "error", "error": error }),
        ),
    }
}

/// Long-poll for the first scan after `since_id`.
pub async fn next_scan(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let since_id = parse_since_id(&params);

    // subscribe first so a fault between the check and the wait is not lost
    let mut faults = state.health.subscribe_faults();
    if let Err(error) = state.health.status() {
        return camera_failure(error);
    }

    tokio::select! {
        outcome = state.log.await_after(since_id, state.settings.next_scan_timeout) => match outcome {
            AwaitOutcome::Scan(scan) => {
                log::debug!("next_scan since {} -> {} ({})", since_id, scan.id, scan.code);
                Json(scan_body(&scan)).into_response()
            }
            AwaitOutcome::Timeout { latest_id } => timeout_body(latest_id),
        },
        error = state.health.next_fault(&mut faults) => {
            log::debug!("next_scan since {} ended by camera fault", since_id);
            camera_failure(error)
        }
        _ = stopped(state.stopping()) => timeout_body(state.log.latest_id()),
    }
}

pub async fn trigger_autofocus(State(state): State<AppState>) -> Response {
    match state.health.request_autofocus() {
        Ok(()) => {
            log::info!("autofocus requested");
            Json(json!({ "success": true, "message": "Autofocus triggered" })).into_response()
        }
        Err(error) => error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "success": false, "error": error }),
        ),
    }
}

fn debug_frame_report(
    state: &AppState,
    frame: &Frame,
    dir: &Path,
) -> Result<Value, SidecarError> {
    let stamp = Utc::now().timestamp();
    let frame_path = dir.join(format!("debug_frame_{stamp}.jpg"));
    save_jpeg(&frame.image, &frame_path, state.settings.debug_quality)?;

    let mut by_method = Map::new();
    let mut barcodes: Vec<Symbol> = Vec::new();

    for report in state.strategies.decode_all(state.decoder.as_ref(), &frame.image) {
        let name = report.strategy.name();
        match report.result {
            Ok(symbols) => {
                by_method.insert(name.to_string(), json!(symbols.len()));
                if symbols.is_empty() {
                    continue;
                }
                if let Some(image) = &report.image {
                    let path = dir.join(format!("debug_frame_{stamp}_{name}.jpg"));
                    if let Err(e) = save_jpeg(image, &path, state.settings.debug_quality) {
                        log::warn!("cannot save {}: {}", path.display(), e);
                    }
                }
                for symbol in symbols {
                    if !barcodes.contains(&symbol) {
                        barcodes.push(symbol);
                    }
                }
            }
            Err(e) => {
                by_method.insert(name.to_string(), json!(format!("error: {e}")));
            }
        }
    }

    let barcodes: Vec<Value> = barcodes
        .iter()
        .map(|symbol| json!({ "code": symbol.code, "type": symbol.symbology.name() }))
        .collect();

    Ok(json!({
        "success": true,
        "frame_shape": frame.image.shape(),
        "frame_sequence": frame.sequence,
        "frame_saved": frame_path.display().to_string(),
        "decode_results_by_method": by_method,
        "barcodes_found": barcodes.len(),
        "barcodes": barcodes,
    }))
}

/// Save the current frame and run every strategy on it.
pub async fn debug_frame(State(state): State<AppState>) -> Result<Response, SidecarError> {
    let Some(frame) = state.slot.read() else {
        return Ok(error_body(
            StatusCode::NOT_FOUND,
            json!({ "success": false, "error": "No frame available" }),
        ));
    };

    let dir = state.settings.debug_dir.clone();
    let report =
        tokio::task::spawn_blocking(move || debug_frame_report(&state, &frame, &dir)).await??;
    Ok(Json(report).into_response())
}

pub async fn debug_memory(State(state): State<AppState>) -> Response {
    let usage = {
        let mut sampler = state.memory.lock().unwrap_or_else(|e| e.into_inner());
        sampler.sample()
    };
    let Some(usage) = usage else {
        return error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "success": false, "error": "memory statistics unavailable" }),
        );
    };

    Json(json!({
        "success": true,
        "memory": usage,
        "gc": {
            "collector": "none",
            "frame_buffers_allocated": state.health.buffers_allocated(),
            "frame_buffers_recycled": state.health.buffers_recycled(),
        },
        "threads": lector_scan::thread_count(),
        "decode": state.stats.snapshot(),
    }))
    .into_response()
}

fn preview_part(frame: &Frame, state: &AppState) -> Option<Bytes> {
    let settings = &state.settings;
    let size = Vec2::new(settings.preview_width, settings.preview_height);
    let jpeg = resize(&frame.image, size)
        .and_then(|small| encode_jpeg(&small, settings.preview_quality));
    let jpeg = match jpeg {
        Ok(jpeg) => jpeg,
        Err(e) => {
            log::warn!("preview frame dropped: {}", e);
            return None;
        }
    };

    let mut part = Vec::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(&jpeg);
    part.extend_from_slice(b"\r\n");
    Some(Bytes::from(part))
}

/// MJPEG preview of the latest frame. Runs until the client goes away or
/// the server shuts down.
pub async fn video(State(state): State<AppState>) -> Response {
    let fps = state.settings.preview_fps.max(1);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let stopping = state.stopping();

    let parts = stream::unfold(
        (state, ticker, stopping),
        |(state, mut ticker, stopping)| async move {
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped(stopping.clone()) => {
                        log::debug!("preview stream closed for shutdown");
                        return None;
                    }
                }
                let Some(frame) = state.slot.read() else {
                    continue;
                };
                let encoder_state = state.clone();
                let part =
                    tokio::task::spawn_blocking(move || preview_part(&frame, &encoder_state)).await;
                match part {
                    Ok(Some(part)) => {
                        return Some((Ok::<Bytes, Infallible>(part), (state, ticker, stopping)));
                    }
                    Ok(None) => continue,
                    Err(e) => {
                        log::warn!("preview encoder stopped: {}", e);
                        return None;
                    }
                }
            }
        },
    );

    let mut response = Response::new(Body::from_stream(parts));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("multipart/x-mixed-replace; boundary=frame"),
    );
    response
}
