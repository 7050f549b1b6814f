// SPDX-License-Identifier: MIT

//! Scriptable in-memory stand-in for the Chromium capability.
//!
//! Tests describe the page the "browser" should pretend to show
//! (text, URL, title, navigation outcome) and then assert against the
//! shared [`MockState`] counters afterwards, which survive the
//! consuming `close()`.

use crate::browser::{
    BrowserCapability, BrowserError, BrowserSession, NavigationOutcome, Readiness,
};
use crate::cookies::Cookie;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Bytes handed out by the scripted screenshot. Not a real image, but
/// the capture pipeline never decodes what it encodes.
const PNG_STUB: &[u8] = b"\x89PNG\r\n\x1a\nstub-image-bytes";

/// Counters shared between the capability, its sessions and the test.
#[derive(Default)]
pub struct MockState {
    launches: AtomicUsize,
    closes: AtomicUsize,
    screenshots: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    injected: Mutex<Vec<Cookie>>,
}

impl MockState {
    /// Sessions successfully created.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Sessions released. Must end up equal to [`MockState::launches`].
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn screenshots(&self) -> usize {
        self.screenshots.load(Ordering::SeqCst)
    }

    /// Every URL a session was asked to visit, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn injected_cookies(&self) -> usize {
        self.injected.lock().unwrap().len()
    }
}

#[derive(Clone)]
struct Script {
    fail_launch: bool,
    fail_injection: bool,
    fail_prime: bool,
    target_failure: Option<BrowserError>,
    nav_status: Option<u16>,
    page_text: String,
    current_url_override: Option<String>,
    title: String,
    render_surface: bool,
    screenshot: Vec<u8>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_injection: false,
            fail_prime: false,
            target_failure: None,
            nav_status: None,
            page_text: String::new(),
            current_url_override: None,
            title: "Dashboard".to_string(),
            render_surface: true,
            screenshot: PNG_STUB.to_vec(),
        }
    }
}

/// Capability whose sessions follow a preconfigured script.
pub struct MockBrowser {
    state: Arc<MockState>,
    script: Script,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            script: Script::default(),
        }
    }

    /// Handle for asserting on counters after the run.
    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    /// Refuse to start a session at all.
    pub fn failing_launch(mut self) -> Self {
        self.script.fail_launch = true;
        self
    }

    /// Make every cookie injection fail.
    pub fn failing_injection(mut self) -> Self {
        self.script.fail_injection = true;
        self
    }

    /// Fail the priming navigations (the DOM-ready ones).
    pub fn failing_prime_navigation(mut self) -> Self {
        self.script.fail_prime = true;
        self
    }

    /// Fail target navigations (the network-idle ones) with `err`.
    pub fn with_target_failure(mut self, err: BrowserError) -> Self {
        self.script.target_failure = Some(err);
        self
    }

    /// HTTP status the main document should report after navigation.
    pub fn with_nav_status(mut self, status: u16) -> Self {
        self.script.nav_status = Some(status);
        self
    }

    pub fn with_page_text(mut self, text: impl Into<String>) -> Self {
        self.script.page_text = text.into();
        self
    }

    /// Pretend the browser ended up on `url` instead of the one asked for.
    pub fn with_current_url(mut self, url: impl Into<String>) -> Self {
        self.script.current_url_override = Some(url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.script.title = title.into();
        self
    }

    /// Page never grows an iframe/canvas/svg, as far as probes can tell.
    pub fn without_render_surface(mut self) -> Self {
        self.script.render_surface = false;
        self
    }

    pub fn with_screenshot(mut self, bytes: Vec<u8>) -> Self {
        self.script.screenshot = bytes;
        self
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserCapability for MockBrowser {
    async fn launch(
        &self,
        _width: u32,
        _height: u32,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.script.fail_launch {
            return Err(BrowserError::Other("scripted launch failure".to_string()));
        }
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            script: self.script.clone(),
            current_url: String::new(),
        }))
    }
}

struct MockSession {
    state: Arc<MockState>,
    script: Script,
    current_url: String,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn goto(
        &mut self,
        url: &str,
        readiness: Readiness,
    ) -> Result<NavigationOutcome, BrowserError> {
        self.state.navigations.lock().unwrap().push(url.to_string());
        match readiness {
            Readiness::NetworkIdle { .. } => {
                if let Some(err) = self.script.target_failure.clone() {
                    return Err(err);
                }
            }
            Readiness::DomContentLoaded => {
                if self.script.fail_prime {
                    return Err(BrowserError::Protocol(
                        "scripted prime navigation failure".to_string(),
                    ));
                }
            }
        }
        self.current_url = self
            .script
            .current_url_override
            .clone()
            .unwrap_or_else(|| url.to_string());
        let status = match readiness {
            Readiness::NetworkIdle { .. } => self.script.nav_status,
            Readiness::DomContentLoaded => None,
        };
        Ok(NavigationOutcome { status })
    }

    async fn inject_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        if self.script.fail_injection {
            return Err(BrowserError::Protocol(
                "scripted injection failure".to_string(),
            ));
        }
        self.state
            .injected
            .lock()
            .unwrap()
            .extend(cookies.iter().cloned());
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self.current_url.clone())
    }

    async fn title(&mut self) -> Result<String, BrowserError> {
        Ok(self.script.title.clone())
    }

    async fn page_text(&mut self, max_chars: usize) -> Result<String, BrowserError> {
        Ok(self.script.page_text.chars().take(max_chars).collect())
    }

    async fn element_exists(&mut self, _selector: &str) -> Result<bool, BrowserError> {
        Ok(self.script.render_surface)
    }

    async fn screenshot_clip(
        &mut self,
        _width: u32,
        _height: u32,
    ) -> Result<Vec<u8>, BrowserError> {
        self.state.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.screenshot.clone())
    }

    async fn close(self: Box<Self>) -> Result<(), BrowserError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
