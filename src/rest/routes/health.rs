use crate::AppContext;
use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.started_at.elapsed().as_secs();
    Json(json!({
        "ok": true,
        "service": "dashsnap",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": uptime,
        "environment": {
            "port": ctx.config.port,
            "cookiesFile": ctx.config.cookies_file.display().to_string(),
            "profileDir": ctx.config.profile_dir.display().to_string(),
            "headless": ctx.config.headless,
        },
    }))
}
