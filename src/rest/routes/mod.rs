pub mod capture;
pub mod health;
pub mod status;
pub mod test_connection;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::capture::CaptureError;

/// Map a capture failure onto its HTTP reply. The 401 replies carry
/// `needsLogin: true` so callers know a fresh cookie export fixes them.
pub(crate) fn error_reply(err: &CaptureError, url: &str) -> (StatusCode, Json<Value>) {
    let status = match err {
        CaptureError::BadRequest => StatusCode::BAD_REQUEST,
        CaptureError::Unauthenticated | CaptureError::SessionExpired => StatusCode::UNAUTHORIZED,
        CaptureError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        CaptureError::UpstreamError(_) => StatusCode::BAD_GATEWAY,
        CaptureError::UnknownBrowserError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = json!({
        "ok": false,
        "error": err.summary(),
    });
    if err.needs_login() {
        body["needsLogin"] = json!(true);
    }
    if let Some(detail) = err.detail() {
        body["details"] = json!(detail);
    }
    if !url.is_empty() {
        body["url"] = json!(url);
    }

    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_failure_lands_on_its_status_code() {
        let cases = [
            (CaptureError::BadRequest, StatusCode::BAD_REQUEST),
            (CaptureError::Unauthenticated, StatusCode::UNAUTHORIZED),
            (CaptureError::SessionExpired, StatusCode::UNAUTHORIZED),
            (
                CaptureError::Timeout("nav".into()),
                StatusCode::REQUEST_TIMEOUT,
            ),
            (
                CaptureError::UpstreamError("503".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CaptureError::UnknownBrowserError("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let (status, _) = error_reply(&err, "");
            assert_eq!(status, expected, "{err}");
        }
    }

    #[test]
    fn auth_failures_flag_needs_login() {
        let (_, Json(body)) = error_reply(&CaptureError::SessionExpired, "https://x.test");
        assert_eq!(body["ok"], json!(false));
        assert_eq!(body["needsLogin"], json!(true));
        assert_eq!(body["url"], json!("https://x.test"));
        assert!(body.get("details").is_none());
    }

    #[test]
    fn detail_rides_in_its_own_field() {
        let err = CaptureError::Timeout("Navigation timeout of 60s exceeded".into());
        let (_, Json(body)) = error_reply(&err, "");
        assert_eq!(body["error"], json!("capture timed out"));
        assert_eq!(body["details"], json!("Navigation timeout of 60s exceeded"));
        // No url was known for this request, so none is echoed.
        assert!(body.get("url").is_none());
    }
}
