//! Stream control and MJPEG feed endpoints

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::StreamExt;
use serde::Serialize;

use super::ApiState;
use crate::camera::CameraError;
use crate::stream::{StreamStatus, multipart};

/// Build stream router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/start", get(start).post(start))
        .route("/stop", get(stop).post(stop))
        .route("/status", get(status))
        .route("/video_feed", get(video_feed))
        .with_state(state)
}

/// Successful control response
#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub status: &'static str,
}

async fn start(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ControlResponse>, StreamApiError> {
    state.controller.start().await?;
    Ok(Json(ControlResponse {
        status: "Stream started successfully",
    }))
}

async fn stop(State(state): State<Arc<ApiState>>) -> Json<ControlResponse> {
    state.controller.stop().await;
    Json(ControlResponse {
        status: "Stream stopped successfully",
    })
}

async fn status(State(state): State<Arc<ApiState>>) -> Json<StreamStatus> {
    Json(state.controller.status().await)
}

/// Multipart MJPEG stream; empty when the stream is not started
async fn video_feed(State(state): State<Arc<ApiState>>) -> Response {
    let frames = state.controller.video_feed().await;
    let parts = frames.map(|frame| Ok::<_, Infallible>(multipart::part(&frame.jpeg)));

    (
        [
            (header::CONTENT_TYPE, multipart::CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

/// Stream endpoint errors
#[derive(Debug, thiserror::Error)]
pub enum StreamApiError {
    #[error("Could not open camera: {0}")]
    CameraUnavailable(String),
}

impl From<CameraError> for StreamApiError {
    fn from(e: CameraError) -> Self {
        Self::CameraUnavailable(e.to_string())
    }
}

impl IntoResponse for StreamApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
        }

        tracing::warn!(error = %self, "stream start failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
