// SPDX-License-Identifier: MIT
// CaptureService — the pipeline behind /capture and /test-connection.
//
// Strategy:
//   1. Every capture gets its own browser instance. Startup cost per
//      request buys full isolation between concurrent captures; there
//      is no pool and no shared page state to corrupt.
//   2. The session is primed with saved cookies before the target is
//      ever visited. Zero injected cookies ends the capture right
//      there; the dashboard would only serve a login wall anyway.
//   3. After navigation the login detector gets the final word before
//      any pixels are read, because the dashboard host redirects
//      silently instead of failing loud.
//   4. Whatever happens, the browser is released exactly once, at the
//      single release point in the public methods.

pub mod detect;
pub mod model;
pub mod session;

pub use model::{CaptureError, CaptureRequest, CaptureResult, ConnectionReport};

use crate::browser::{BrowserCapability, BrowserSession, Readiness};
use crate::config::ServiceConfig;
use crate::cookies::{now_epoch, CookieStatus, CookieStore};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Budget for the target navigation. Dashboards pull chart data over
/// many requests and can take a while to go quiet.
const NAVIGATION_BUDGET: Duration = Duration::from_secs(60);

/// Fixed settle once the page looks ready. Charts keep painting for a
/// few seconds after their markup exists.
const RENDER_SETTLE: Duration = Duration::from_secs(5);

/// Render probe window and poll interval.
const RENDER_PROBE_BUDGET: Duration = Duration::from_secs(5);
const RENDER_PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// The surfaces dashboards render into.
const RENDER_SURFACE_SELECTOR: &str = "iframe, canvas, svg";

/// Screenshot pipeline shared by the HTTP routes and the doctor.
pub struct CaptureService {
    config: Arc<ServiceConfig>,
    browser: Arc<dyn BrowserCapability>,
}

impl CaptureService {
    pub fn new(config: Arc<ServiceConfig>, browser: Arc<dyn BrowserCapability>) -> Self {
        Self { config, browser }
    }

    /// Fresh snapshot of the cookie store, re-read from disk so a
    /// rotated cookie file shows up without a restart.
    pub fn cookie_status(&self) -> CookieStatus {
        CookieStore::load(&self.config.cookies_file).status(now_epoch())
    }

    /// Capture one dashboard screenshot.
    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureResult, CaptureError> {
        if request.url.trim().is_empty() {
            return Err(CaptureError::BadRequest);
        }
        info!(
            url = %request.url,
            width = request.width,
            height = request.height,
            "capture started"
        );
        let started = std::time::Instant::now();

        let result = match self.browser.launch(request.width, request.height).await {
            Ok(mut session) => {
                let result = drive_capture(session.as_mut(), &self.config, &request).await;
                release(session).await;
                result
            }
            Err(error) => Err(error.into()),
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(url = %request.url, duration_ms, "capture finished"),
            Err(error) => warn!(url = %request.url, duration_ms, %error, "capture failed"),
        }
        result
    }

    /// Connectivity probe: apply cookies best-effort, open the page,
    /// report where the browser landed. No screenshot, no login
    /// verdict — the caller gets the raw facts.
    pub async fn test_connection(&self, url: &str) -> Result<ConnectionReport, CaptureError> {
        if url.trim().is_empty() {
            return Err(CaptureError::BadRequest);
        }
        info!(url, "connection probe started");

        let mut session = self
            .browser
            .launch(model::DEFAULT_WIDTH, model::DEFAULT_HEIGHT)
            .await?;
        let result = drive_probe(session.as_mut(), &self.config, url).await;
        release(session).await;

        if let Err(error) = &result {
            warn!(url, %error, "connection probe failed");
        }
        result
    }
}

/// Everything between launch and release for a capture. Runs with a
/// borrowed session so the caller keeps the one and only release point.
async fn drive_capture(
    session: &mut dyn BrowserSession,
    config: &ServiceConfig,
    request: &CaptureRequest,
) -> Result<CaptureResult, CaptureError> {
    let store = CookieStore::load(&config.cookies_file);
    let injected = session::apply_cookies(session, &store, now_epoch()).await;
    if injected == 0 {
        return Err(CaptureError::Unauthenticated);
    }

    let outcome = session
        .goto(
            &request.url,
            Readiness::NetworkIdle {
                budget: NAVIGATION_BUDGET,
            },
        )
        .await?;
    if !outcome.is_success() {
        // is_success is only false when a concrete status came back.
        let code = outcome.status.unwrap_or_default();
        return Err(CaptureError::UpstreamError(format!(
            "dashboard responded with HTTP {code}"
        )));
    }

    let current_url = session.current_url().await?;
    let page_text = session.page_text(detect::TEXT_PROBE_CHARS).await?;
    if detect::is_login_screen(&current_url, &page_text) {
        return Err(CaptureError::SessionExpired);
    }

    await_render_surface(session).await;
    tokio::time::sleep(RENDER_SETTLE).await;

    let png = session
        .screenshot_clip(request.width, request.height)
        .await?;
    debug!(bytes = png.len(), "screenshot taken");

    Ok(CaptureResult {
        data_url: format!("data:image/png;base64,{}", BASE64.encode(&png)),
        timestamp: Utc::now().to_rfc3339(),
        width: request.width,
        height: request.height,
        url: request.url.clone(),
    })
}

async fn drive_probe(
    session: &mut dyn BrowserSession,
    config: &ServiceConfig,
    url: &str,
) -> Result<ConnectionReport, CaptureError> {
    let store = CookieStore::load(&config.cookies_file);
    let injected = session::apply_cookies(session, &store, now_epoch()).await;
    debug!(injected, "cookies applied for connection probe");

    let outcome = session
        .goto(
            url,
            Readiness::NetworkIdle {
                budget: NAVIGATION_BUDGET,
            },
        )
        .await?;

    Ok(ConnectionReport {
        url: url.to_string(),
        current_url: session.current_url().await?,
        title: session.title().await?,
        status: outcome.status,
    })
}

/// Poll for a render surface. Best effort: a dashboard that renders
/// without any of the probed markers still gets captured.
async fn await_render_surface(session: &mut dyn BrowserSession) {
    let deadline = tokio::time::Instant::now() + RENDER_PROBE_BUDGET;
    loop {
        match session.element_exists(RENDER_SURFACE_SELECTOR).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(error) => {
                debug!(%error, "render probe failed");
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            debug!("no render surface appeared within the probe window");
            return;
        }
        tokio::time::sleep(RENDER_PROBE_INTERVAL).await;
    }
}

/// The single release point. A failed close is logged, never surfaced:
/// the capture outcome is already decided by then.
async fn release(session: Box<dyn BrowserSession>) {
    if let Err(error) = session.close().await {
        warn!(%error, "browser release failed");
    }
}
