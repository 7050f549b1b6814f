use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

/// Cookie store verdict. Always 200: a missing or expired cookie file
/// is an operational state, not a request failure.
pub async fn status(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let cookies = ctx.capture.cookie_status();
    Json(json!({
        "authenticated": cookies.authenticated,
        "totalCookies": cookies.total,
        "validCookies": cookies.valid,
        "cookiesFile": cookies.file_present,
        "needsLogin": !cookies.authenticated,
        "status": if cookies.authenticated { "ready" } else { "needs_login" },
    }))
}
