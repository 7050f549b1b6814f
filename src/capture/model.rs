//! Request, result and error shapes for the capture pipeline.

use crate::browser::BrowserError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Viewport used when the caller does not say otherwise.
pub const DEFAULT_WIDTH: u32 = 1400;
pub const DEFAULT_HEIGHT: u32 = 1500;

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

/// What to capture: a dashboard URL and the clip dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureRequest {
    pub url: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl CaptureRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

/// A finished capture.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    /// PNG payload as a `data:image/png;base64,...` URL.
    pub data_url: String,
    /// RFC 3339 completion time.
    pub timestamp: String,
    /// Clip dimensions, echoed from the request.
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// Outcome of a cookie-assisted connectivity probe (no screenshot).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub url: String,
    /// Where the browser actually ended up.
    pub current_url: String,
    pub title: String,
    /// Main document HTTP status, when the browser exposes it.
    pub status: Option<u16>,
}

/// Everything a capture can fail with. Each variant maps onto one HTTP
/// status in the REST layer.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The request itself is unusable.
    #[error("url parameter is required")]
    BadRequest,
    /// No usable cookies could be injected; someone has to log in and
    /// export a fresh set.
    #[error("no valid authentication cookies available")]
    Unauthenticated,
    /// Cookies were injected but the dashboard bounced us to a login
    /// wall anyway.
    #[error("authentication cookies were rejected; session expired")]
    SessionExpired,
    /// The dashboard itself failed to come up.
    #[error("upstream dashboard error: {0}")]
    UpstreamError(String),
    #[error("capture timed out: {0}")]
    Timeout(String),
    /// Anything the browser reported that fits no bucket above.
    #[error("browser error: {0}")]
    UnknownBrowserError(String),
}

impl CaptureError {
    /// True for the failures a fresh cookie export would fix.
    pub fn needs_login(&self) -> bool {
        matches!(
            self,
            CaptureError::Unauthenticated | CaptureError::SessionExpired
        )
    }

    /// Short, stable message for HTTP bodies. The variable part, when
    /// there is one, travels separately in [`CaptureError::detail`].
    pub fn summary(&self) -> &'static str {
        match self {
            CaptureError::BadRequest => "url parameter is required",
            CaptureError::Unauthenticated => "no valid authentication cookies available",
            CaptureError::SessionExpired => {
                "authentication cookies were rejected; session expired"
            }
            CaptureError::UpstreamError(_) => "upstream dashboard error",
            CaptureError::Timeout(_) => "capture timed out",
            CaptureError::UnknownBrowserError(_) => "browser error",
        }
    }

    /// Raw underlying message, where one exists.
    pub fn detail(&self) -> Option<&str> {
        match self {
            CaptureError::UpstreamError(detail)
            | CaptureError::Timeout(detail)
            | CaptureError::UnknownBrowserError(detail) => Some(detail.as_str()),
            _ => None,
        }
    }
}

impl From<BrowserError> for CaptureError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout(detail) => CaptureError::Timeout(detail),
            BrowserError::Network(detail) => CaptureError::UpstreamError(detail),
            BrowserError::Protocol(detail) | BrowserError::Other(detail) => {
                CaptureError::UnknownBrowserError(detail)
            }
        }
    }
}
