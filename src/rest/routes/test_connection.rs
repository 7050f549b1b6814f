use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::capture::CaptureError;
use crate::rest::routes::error_reply;
use crate::AppContext;

#[derive(Deserialize)]
pub struct TestConnectionParams {
    #[serde(default)]
    url: String,
}

/// Navigate to the target and report what came back, without taking a
/// screenshot or judging the page content. Useful for checking whether
/// saved cookies still open a given dashboard.
pub async fn test_connection(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<TestConnectionParams>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let url = params.url;

    // Detached for the same reason as /capture: the probe holds a live
    // browser that must be released even if the client goes away.
    let outcome = {
        let url = url.clone();
        tokio::spawn(async move { ctx.capture.test_connection(&url).await }).await
    };

    match outcome {
        Ok(Ok(report)) => Ok(Json(json!({
            "ok": true,
            "url": report.url,
            "currentUrl": report.current_url,
            "title": report.title,
            "status": report.status,
        }))),
        Ok(Err(err)) => Err(error_reply(&err, &url)),
        Err(join_err) => {
            let err = CaptureError::UnknownBrowserError(format!("probe task failed: {join_err}"));
            Err(error_reply(&err, &url))
        }
    }
}
