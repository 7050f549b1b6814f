// SPDX-License-Identifier: MIT
//! Browser capability — the seam between the capture flow and the
//! actual browser.
//!
//! The orchestrator only ever talks to these traits. The production
//! implementation drives headless Chrome over CDP (`chromium`); the
//! test suite swaps in a scripted in-memory one (`mock`).

pub mod chromium;
pub mod mock;

use crate::cookies::Cookie;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// What "ready" means for a navigation, and how long to wait for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// DOM parsed; subresources may still be loading. Used for the
    /// cookie-priming navigations.
    DomContentLoaded,
    /// No network activity for a quiet window, bounded by `budget`.
    /// Used for the target dashboard navigation.
    NetworkIdle { budget: Duration },
}

/// Outcome of a completed navigation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NavigationOutcome {
    /// HTTP status of the main document, when the browser exposes it.
    /// `None` means unknown, which counts as success.
    pub status: Option<u16>,
}

impl NavigationOutcome {
    /// Whether the main document was served successfully. Redirects are
    /// already resolved by the time the browser reports a status, so
    /// anything below 400 (or an unknown status) passes.
    pub fn is_success(&self) -> bool {
        match self.status {
            Some(code) => code < 400,
            None => true,
        }
    }
}

/// Why a browser operation failed.
///
/// Tagged at this boundary so the capture flow can map failures to HTTP
/// statuses by matching on a variant, never by sniffing message text.
#[derive(Debug, Clone, Error)]
pub enum BrowserError {
    /// The operation did not finish inside its time budget.
    #[error("timeout: {0}")]
    Timeout(String),
    /// The page could not be fetched (DNS, TLS, connection reset).
    #[error("network error: {0}")]
    Network(String),
    /// The CDP channel broke or the browser answered nonsense.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Anything else, message preserved for diagnostics.
    #[error("{0}")]
    Other(String),
}

/// Launches fresh browser instances. One instance per capture, never
/// pooled or shared across concurrent requests.
#[async_trait]
pub trait BrowserCapability: Send + Sync {
    /// Start a browser with a single page at the given viewport, with
    /// the fixed locale/identity headers already applied.
    async fn launch(&self, width: u32, height: u32)
        -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One live browser instance with a single page.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the requested readiness.
    async fn goto(&mut self, url: &str, readiness: Readiness)
        -> Result<NavigationOutcome, BrowserError>;

    /// Install cookies into the session's jar.
    async fn inject_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError>;

    /// URL the page ended up on (empty when the browser cannot say).
    async fn current_url(&mut self) -> Result<String, BrowserError>;

    /// Document title (empty when unavailable).
    async fn title(&mut self) -> Result<String, BrowserError>;

    /// First `max_chars` characters of the page's visible text.
    /// Extraction failures yield an empty string, not an error.
    async fn page_text(&mut self, max_chars: usize) -> Result<String, BrowserError>;

    /// Whether any element matches the CSS selector. The selector must
    /// not contain single quotes.
    async fn element_exists(&mut self, selector: &str) -> Result<bool, BrowserError>;

    /// Capture the region `{0, 0, width, height}` as PNG bytes.
    async fn screenshot_clip(&mut self, width: u32, height: u32)
        -> Result<Vec<u8>, BrowserError>;

    /// Shut the browser down. Consumes the session, so a release can
    /// happen at most once by construction.
    async fn close(self: Box<Self>) -> Result<(), BrowserError>;
}
