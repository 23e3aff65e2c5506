use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Errors of the sidecar process and its request handlers.
#[derive(Debug)]
pub enum SidecarError {
    Config(String),
    Camera(lector_camera::CameraError),
    Scan(lector_scan::ScanError),
    Image(lector_image::ImageError),
    Io(std::io::Error),
    /// A blocking task died before answering.
    Task(String),
}

impl fmt::Display for SidecarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SidecarError::Config(msg) => write!(f, "configuration error: {msg}"),
            SidecarError::Camera(err) => write!(f, "camera error: {err}"),
            SidecarError::Scan(err) => write!(f, "pipeline error: {err}"),
            SidecarError::Image(err) => write!(f, "image error: {err}"),
            SidecarError::Io(err) => write!(f, "I/O error: {err}"),
            SidecarError::Task(msg) => write!(f, "task failed: {msg}"),
        }
    }
}

impl std::error::Error for SidecarError {}

impl From<lector_camera::CameraError> for SidecarError {
    fn from(err: lector_camera::CameraError) -> Self {
        SidecarError::Camera(err)
    }
}

impl From<lector_scan::ScanError> for SidecarError {
    fn from(err: lector_scan::ScanError) -> Self {
        SidecarError::Scan(err)
    }
}

impl From<lector_image::ImageError> for SidecarError {
    fn from(err: lector_image::ImageError) -> Self {
        SidecarError::Image(err)
    }
}

impl From<std::io::Error> for SidecarError {
    fn from(err: std::io::Error) -> Self {
        SidecarError::Io(err)
    }
}

impl From<tokio::task::JoinError> for SidecarError {
    fn from(err: tokio::task::JoinError) -> Self {
        SidecarError::Task(err.to_string())
    }
}

impl IntoResponse for SidecarError {
    fn into_response(self) -> Response {
        log::error!("request failed: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "success": false,
                "error": self.to_string(),
            })),
        )
            .into_response()
    }
}
