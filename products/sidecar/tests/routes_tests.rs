use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use lector_base::Vec2;
use lector_camera::{CameraError, FrameSource};
use lector_decode::{DecodeError, Decoder, StrategySet, Symbol, Symbology};
use lector_image::{Image, PixelFormat};
use lector_scan::{CaptureHealth, DecodeStats, FrameSlot, Pipeline, PipelineConfig, ScanLog};
use lector_sidecar::{AppState, ServerSettings, router};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tower::ServiceExt;

const SIZE: Vec2<usize> = Vec2 { x: 8, y: 4 };

/// Camera that always delivers the same flat frame.
struct FlatSource;

impl FrameSource for FlatSource {
    fn name(&self) -> &str {
        "flat"
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        Ok(SIZE)
    }

    fn close(&mut self) {}

    fn blocking_capture(&mut self, mut buffer: Vec<u8>) -> Result<Image, CameraError> {
        buffer.clear();
        buffer.resize(SIZE.x * SIZE.y * 3, 128);
        Ok(Image::new(SIZE, buffer, PixelFormat::Rgb8)?)
    }
}

/// Camera that delivers `frames` flat frames and then stops answering.
struct DyingSource {
    frames: usize,
}

impl FrameSource for DyingSource {
    fn name(&self) -> &str {
        "dying"
    }

    fn open(&mut self) -> Result<Vec2<usize>, CameraError> {
        Ok(SIZE)
    }

    fn close(&mut self) {}

    fn blocking_capture(&mut self, buffer: Vec<u8>) -> Result<Image, CameraError> {
        if self.frames == 0 {
            return Err(CameraError::Stream("sensor timeout".to_string()));
        }
        self.frames -= 1;
        FlatSource.blocking_capture(buffer)
    }
}

/// Finds `code` in every image, or nothing at all.
struct CodeDecoder(Option<&'static str>);

impl Decoder for CodeDecoder {
    fn name(&self) -> &str {
        "code"
    }

    fn decode(&self, _image: &Image) -> Result<Vec<Symbol>, DecodeError> {
        Ok(self
            .0
            .map(|code| vec![Symbol::new(code, Symbology::Ean13)])
            .unwrap_or_default())
    }
}

fn settings(timeout_ms: u64) -> ServerSettings {
    ServerSettings {
        next_scan_timeout: Duration::from_millis(timeout_ms),
        ..ServerSettings::default()
    }
}

/// State with no capture thread behind it.
fn idle_state(decoder: CodeDecoder, settings: ServerSettings) -> AppState {
    AppState::new(
        Arc::new(ScanLog::new(16)),
        Arc::new(FrameSlot::new()),
        Arc::new(CaptureHealth::new()),
        Arc::new(DecodeStats::new()),
        Arc::new(decoder),
        StrategySet::default(),
        settings,
    )
}

async fn running(decoder: CodeDecoder, settings: ServerSettings) -> (Pipeline, AppState) {
    running_with(Box::new(FlatSource), decoder, settings).await
}

async fn running_with(
    source: Box<dyn FrameSource>,
    decoder: CodeDecoder,
    settings: ServerSettings,
) -> (Pipeline, AppState) {
    let config = PipelineConfig::default()
        .with_fps(50)
        .with_skip_frames(1)
        .with_poll_interval(Duration::from_millis(5));
    let pipeline = Pipeline::start(source, Arc::new(decoder), config).unwrap();
    for _ in 0..200 {
        if pipeline.health().status().is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(pipeline.health().status().is_ok(), "camera never came up");
    let state = AppState::from_pipeline(&pipeline, settings);
    (pipeline, state)
}

async fn call(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health_before_first_frame() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let (status, body) = call(app, "GET", "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "Camera not initialized");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_ok_while_capturing() {
    let (_pipeline, state) = running(CodeDecoder(None), settings(100)).await;
    let (status, body) = call(router(state), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_next_scan_reports_camera_failure() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let (status, body) = call(app, "GET", "/next_scan?since_id=0").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["code"].is_null());
    assert_eq!(body["error"], "Camera not initialized");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_next_scan_delivers_decoded_code() {
    let (_pipeline, state) = running(CodeDecoder(Some("4006381333931")), settings(2000)).await;
    let (status, body) = call(router(state), "GET", "/next_scan?since_id=0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["id"], 1);
    assert_eq!(body["code"], "4006381333931");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_next_scan_times_out_with_latest_id() {
    let (_pipeline, state) = running(CodeDecoder(None), settings(150)).await;
    let (status, body) = call(router(state), "GET", "/next_scan").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["timeout"], true);
    assert_eq!(body["id"], 0);
    assert!(body["code"].is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_next_scan_cursor_handling() {
    let (_pipeline, state) = running(CodeDecoder(None), settings(150)).await;
    state.log.append("first", Symbology::Code39);
    state.log.append("second", Symbology::Code39);
    let app = router(state);

    let (_, body) = call(app.clone(), "GET", "/next_scan?since_id=abc").await;
    assert_eq!(body["id"], 1);
    assert_eq!(body["code"], "first");

    let (_, body) = call(app.clone(), "GET", "/next_scan?since_id=1").await;
    assert_eq!(body["id"], 2);
    assert_eq!(body["code"], "second");

    let (_, body) = call(app, "GET", "/next_scan?since_id=2").await;
    assert_eq!(body["timeout"], true);
    assert_eq!(body["id"], 2);
}

#[tokio::test]
async fn test_debug_frame_without_frame() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let (status, body) = call(app, "GET", "/debug/frame").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "No frame available");
}

#[tokio::test]
async fn test_debug_frame_runs_every_strategy() {
    let dir = std::env::temp_dir().join(format!("lector-debug-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    let state = idle_state(
        CodeDecoder(Some("DBG-1")),
        ServerSettings {
            debug_dir: dir.clone(),
            ..settings(100)
        },
    );
    let image = Image::new(SIZE, vec![200; SIZE.x * SIZE.y * 3], PixelFormat::Rgb8).unwrap();
    state.slot.publish(image, chrono::Utc::now());

    let (status, body) = call(router(state), "GET", "/debug/frame").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["frame_saved"].as_str().unwrap().ends_with(".jpg"));
    assert_eq!(body["frame_shape"], serde_json::json!([4, 8, 3]));
    assert_eq!(body["decode_results_by_method"].as_object().unwrap().len(), 5);
    assert_eq!(body["decode_results_by_method"]["grayscale"], 1);
    // same code from every strategy is reported once
    assert_eq!(body["barcodes_found"], 1);
    assert_eq!(body["barcodes"][0]["code"], "DBG-1");
    assert_eq!(body["barcodes"][0]["type"], "EAN13");

    let saved = std::fs::read_dir(&dir).unwrap().count();
    assert_eq!(saved, 6, "frame plus one image per strategy");
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_debug_memory_shape() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let (status, body) = call(app, "GET", "/debug/memory").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["memory"]["rss_mb"].as_f64().unwrap() > 0.0);
    assert!(body["memory"]["vms_mb"].is_number());
    assert!(body["memory"]["percent"].is_number());
    assert_eq!(body["gc"]["collector"], "none");
    assert_eq!(body["gc"]["frame_buffers_allocated"], 0);
    assert!(body["threads"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_autofocus_without_camera() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let (status, body) = call(app, "POST", "/trigger_autofocus").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_autofocus_unsupported_camera() {
    let (_pipeline, state) = running(CodeDecoder(None), settings(100)).await;
    let (status, body) = call(router(state), "POST", "/trigger_autofocus").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Autofocus not supported by this camera");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_video_is_multipart() {
    let app = router(idle_state(CodeDecoder(None), settings(100)));
    let response = app
        .oneshot(Request::builder().uri("/video").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "multipart/x-mixed-replace; boundary=frame"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_next_scan_wakes_on_camera_fault() {
    // about one second of frames, then the camera dies mid-poll
    let source = Box::new(DyingSource { frames: 50 });
    let (_pipeline, state) = running_with(source, CodeDecoder(None), settings(20_000)).await;

    let started = std::time::Instant::now();
    let (status, body) = call(router(state), "GET", "/next_scan?since_id=0").await;
    assert!(started.elapsed() < Duration::from_secs(5), "waited out the timeout");
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["code"].is_null());
    assert!(
        body["error"].as_str().unwrap().starts_with("Camera capture error:"),
        "{}",
        body["error"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stop_ends_pending_long_poll() {
    let (_pipeline, state) = running(CodeDecoder(None), settings(20_000)).await;
    let stopper = state.clone();
    let request = tokio::spawn(call(router(state), "GET", "/next_scan?since_id=0"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    stopper.stop();
    let (status, body) = tokio::time::timeout(Duration::from_secs(5), request)
        .await
        .expect("long poll outlived shutdown")
        .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timeout"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_graceful_shutdown_with_preview_client() {
    let state = idle_state(CodeDecoder(None), settings(100));
    let image = Image::new(SIZE, vec![90; SIZE.x * SIZE.y * 3], PixelFormat::Rgb8).unwrap();
    state.slot.publish(image, chrono::Utc::now());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (signal, signalled) = tokio::sync::oneshot::channel::<()>();
    let stopper = state.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, router(state))
            .with_graceful_shutdown(async move {
                let _ = signalled.await;
                stopper.stop();
            })
            .await
    });

    let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
    client
        .write_all(b"GET /video HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let mut head = Vec::new();
    let mut chunk = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let read = client.read(&mut chunk).await.unwrap();
        assert!(read > 0, "connection closed before the response head");
        head.extend_from_slice(&chunk[..read]);
    }
    let head = String::from_utf8_lossy(&head);
    assert!(head.starts_with("HTTP/1.1 200 OK"), "{}", head);
    assert!(head.contains("multipart/x-mixed-replace"));

    signal.send(()).unwrap();
    let served = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server kept running with a preview client attached");
    assert!(served.unwrap().is_ok());
    drop(client);
}
