use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capture::model::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::capture::{CaptureError, CaptureRequest};
use crate::rest::routes::error_reply;
use crate::AppContext;

/// Raw query params for `GET /capture`. Dimensions arrive as strings so
/// a junk value falls back to the default instead of rejecting the
/// whole request.
#[derive(Deserialize)]
pub struct CaptureParams {
    #[serde(default)]
    url: String,
    w: Option<String>,
    h: Option<String>,
}

fn parse_dimension(raw: Option<&str>, fallback: u32) -> u32 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(fallback)
}

pub async fn capture(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<CaptureParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let request = CaptureRequest {
        url: params.url,
        width: parse_dimension(params.w.as_deref(), DEFAULT_WIDTH),
        height: parse_dimension(params.h.as_deref(), DEFAULT_HEIGHT),
    };
    let url = request.url.clone();

    // Detached from the connection: a client disconnect must not cancel
    // the pipeline mid-flight, the browser release depends on it
    // running to completion.
    let outcome = tokio::spawn(async move { ctx.capture.capture(request).await }).await;

    match outcome {
        Ok(Ok(shot)) => Ok(Json(json!({
            "ok": true,
            "dataUrl": shot.data_url,
            "timestamp": shot.timestamp,
            "dimensions": { "width": shot.width, "height": shot.height },
            "url": shot.url,
        }))),
        Ok(Err(err)) => Err(error_reply(&err, &url)),
        Err(join_err) => {
            let err = CaptureError::UnknownBrowserError(format!("capture task failed: {join_err}"));
            Err(error_reply(&err, &url))
        }
    }
}
