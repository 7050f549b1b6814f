// SPDX-License-Identifier: MIT
// ChromiumBrowser — the production capability, headless Chrome over CDP.
//
// Strategy:
//   1. launch() starts a dedicated Chrome with the locale flags the
//      dashboards expect and a persistent profile directory, then opens
//      a blank page and pins the identity headers and viewport.
//   2. Navigation wraps goto + the load event in a caller-supplied
//      budget; "network idle" is approximated by a short quiet gap
//      after the load event, the closest plain CDP gets to that signal.
//   3. Failures are folded into the tagged BrowserError set by
//      classify(). Chrome only exposes fetch failures as net::ERR_*
//      message text, so that single string check lives here; the rest
//      of the crate matches on variants.

use crate::browser::{
    BrowserCapability, BrowserError, BrowserSession, NavigationOutcome, Readiness,
};
use crate::cookies::Cookie;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, CookieSameSite, TimeSinceEpoch};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

/// Fixed browser identity, matching what the dashboards were tuned on.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en;q=0.8";

/// Budget for the cookie-priming navigations (DOM ready is enough).
const DOM_READY_BUDGET: Duration = Duration::from_secs(30);

/// Quiet gap after the load event that stands in for network idle.
const NETWORK_IDLE_GRACE: Duration = Duration::from_millis(500);

/// Upper bound for individual CDP requests. Kept above every navigation
/// budget so the outer deadline is the one that fires.
const CDP_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Reads the main document's HTTP status once navigation settled.
/// Returns 0 where the browser does not expose it.
const NAV_STATUS_PROBE: &str = "(() => { \
     const e = performance.getEntriesByType('navigation'); \
     return e.length ? (e[0].responseStatus || 0) : 0; })()";

/// Launches one dedicated headless Chrome per capture.
pub struct ChromiumBrowser {
    profile_dir: PathBuf,
    headless: bool,
}

impl ChromiumBrowser {
    pub fn new(profile_dir: PathBuf, headless: bool) -> Self {
        Self {
            profile_dir,
            headless,
        }
    }

    /// Open the working page and pin identity headers plus viewport.
    async fn setup_page(browser: &Browser, width: u32, height: u32) -> Result<Page, BrowserError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| classify("open page", e))?;

        let identity = SetUserAgentOverrideParams::builder()
            .user_agent(USER_AGENT)
            .accept_language(ACCEPT_LANGUAGE)
            .build()
            .map_err(BrowserError::Other)?;
        page.execute(identity)
            .await
            .map_err(|e| classify("configure identity headers", e))?;

        let viewport = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width))
            .height(i64::from(height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(BrowserError::Other)?;
        page.execute(viewport)
            .await
            .map_err(|e| classify("set viewport", e))?;

        Ok(page)
    }
}

#[async_trait]
impl BrowserCapability for ChromiumBrowser {
    async fn launch(
        &self,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        std::fs::create_dir_all(&self.profile_dir)
            .map_err(|e| BrowserError::Other(format!("cannot create profile dir: {e}")))?;

        let mut config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-dev-shm-usage")
            .arg("--lang=pt-BR")
            .arg("--disable-web-security")
            .arg("--disable-features=VizDisplayCompositor")
            .arg("--disable-gpu")
            .arg("--no-first-run")
            .window_size(width, height)
            .user_data_dir(&self.profile_dir)
            .request_timeout(CDP_REQUEST_TIMEOUT);
        if !self.headless {
            config = config.with_head();
        }
        let config = config.build().map_err(BrowserError::Other)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Other(format!("failed to launch browser: {e}")))?;

        // CDP message pump. Ends on its own once the browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler loop ended");
                    break;
                }
            }
        });

        let page = match Self::setup_page(&browser, width, height).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!(error = %close_err, "failed to close browser after setup error");
                }
                return Err(e);
            }
        };

        debug!(width, height, "browser launched");
        Ok(Box::new(ChromiumSession {
            browser,
            page,
            _handler: handler_task,
        }))
    }
}

/// One live Chrome instance plus its working page.
struct ChromiumSession {
    browser: Browser,
    page: Page,
    _handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn goto(
        &mut self,
        url: &str,
        readiness: Readiness,
    ) -> Result<NavigationOutcome, BrowserError> {
        let budget = match readiness {
            Readiness::DomContentLoaded => DOM_READY_BUDGET,
            Readiness::NetworkIdle { budget } => budget,
        };

        let nav = async {
            self.page.goto(url).await?;
            self.page.wait_for_navigation().await?;
            Ok::<(), CdpError>(())
        };
        match timeout(budget, nav).await {
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} did not finish within {}s",
                    budget.as_secs()
                )))
            }
            Ok(Err(e)) => return Err(classify(&format!("navigate to {url}"), e)),
            Ok(Ok(())) => {}
        }

        if matches!(readiness, Readiness::NetworkIdle { .. }) {
            sleep(NETWORK_IDLE_GRACE).await;
            let status = main_document_status(&self.page).await;
            return Ok(NavigationOutcome { status });
        }
        Ok(NavigationOutcome::default())
    }

    async fn inject_cookies(&mut self, cookies: &[Cookie]) -> Result<(), BrowserError> {
        let mut params = Vec::with_capacity(cookies.len());
        for cookie in cookies {
            params.push(cookie_param(cookie)?);
        }
        self.page
            .set_cookies(params)
            .await
            .map_err(|e| classify("set cookies", e))?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| classify("read current url", e))?;
        Ok(url.unwrap_or_default())
    }

    async fn title(&mut self) -> Result<String, BrowserError> {
        Ok(self
            .page
            .get_title()
            .await
            .ok()
            .flatten()
            .unwrap_or_default())
    }

    async fn page_text(&mut self, max_chars: usize) -> Result<String, BrowserError> {
        let script =
            format!("document.body ? document.body.innerText.substring(0, {max_chars}) : ''");
        match self.page.evaluate(script).await {
            Ok(value) => Ok(value.into_value::<String>().unwrap_or_default()),
            Err(e) => {
                debug!(error = %e, "page text extraction failed");
                Ok(String::new())
            }
        }
    }

    async fn element_exists(&mut self, selector: &str) -> Result<bool, BrowserError> {
        let script = format!("document.querySelector('{selector}') !== null");
        let value = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| classify("probe selector", e))?;
        Ok(value.into_value::<bool>().unwrap_or(false))
    }

    async fn screenshot_clip(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, BrowserError> {
        let params = CaptureScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .from_surface(false)
            .capture_beyond_viewport(true)
            .clip(Viewport {
                x: 0.0,
                y: 0.0,
                width: f64::from(width),
                height: f64::from(height),
                scale: 1.0,
            })
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| classify("capture screenshot", e))
    }

    async fn close(mut self: Box<Self>) -> Result<(), BrowserError> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Other(format!("browser shutdown failed: {e}")))?;
        let _ = self.browser.wait().await;
        debug!("browser closed");
        Ok(())
    }
}

/// Map a CDP failure onto the tagged error set. Timeouts carry their
/// own variant; everything else is split by message inspection, which
/// is confined to this function.
fn classify(context: &str, err: CdpError) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::Timeout(format!("{context}: browser request timed out")),
        other => classify_message(context, &other.to_string()),
    }
}

fn classify_message(context: &str, message: &str) -> BrowserError {
    if message.contains("net::ERR") {
        BrowserError::Network(format!("{context}: {message}"))
    } else {
        BrowserError::Protocol(format!("{context}: {message}"))
    }
}

async fn main_document_status(page: &Page) -> Option<u16> {
    let value = page.evaluate(NAV_STATUS_PROBE).await.ok()?;
    let code = value.into_value::<i64>().ok()?;
    u16::try_from(code).ok().filter(|c| *c != 0)
}

/// Convert a stored cookie into CDP injection parameters.
fn cookie_param(cookie: &Cookie) -> Result<CookieParam, BrowserError> {
    let mut builder = CookieParam::builder()
        .name(cookie.name.clone())
        .value(cookie.value.clone())
        .domain(cookie.domain.clone())
        .path(cookie.path.clone())
        .secure(cookie.secure)
        .http_only(cookie.http_only);
    if let Some(expires) = cookie.expires {
        builder = builder.expires(TimeSinceEpoch::new(expires));
    }
    if let Some(same_site) = cookie.same_site.as_deref().and_then(same_site_param) {
        builder = builder.same_site(same_site);
    }
    builder.build().map_err(BrowserError::Other)
}

fn same_site_param(raw: &str) -> Option<CookieSameSite> {
    match raw.to_ascii_lowercase().as_str() {
        "strict" => Some(CookieSameSite::Strict),
        "lax" => Some(CookieSameSite::Lax),
        "none" => Some(CookieSameSite::None),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_variant_is_tagged_as_timeout() {
        let err = classify("navigate", CdpError::Timeout);
        assert!(matches!(err, BrowserError::Timeout(_)));
    }

    #[test]
    fn net_err_messages_are_network_failures() {
        let err = classify_message("navigate", "net::ERR_NAME_NOT_RESOLVED");
        assert!(matches!(err, BrowserError::Network(_)));

        let err = classify_message("navigate", "some cdp failure");
        assert!(matches!(err, BrowserError::Protocol(_)));
    }

    #[test]
    fn cookie_param_carries_domain_and_expiry() {
        let cookie = Cookie {
            name: "SID".to_string(),
            value: "abc".to_string(),
            domain: ".google.com".to_string(),
            path: "/".to_string(),
            expires: Some(4_102_444_800.0),
            secure: true,
            ..Cookie::default()
        };
        let param = cookie_param(&cookie).unwrap();
        assert_eq!(param.name, "SID");
        assert_eq!(param.domain.as_deref(), Some(".google.com"));
        assert_eq!(param.secure, Some(true));
        assert!(param.expires.is_some());
    }

    #[test]
    fn same_site_mapping_is_case_insensitive() {
        assert!(matches!(same_site_param("Lax"), Some(CookieSameSite::Lax)));
        assert!(matches!(
            same_site_param("STRICT"),
            Some(CookieSameSite::Strict)
        ));
        assert!(matches!(same_site_param("none"), Some(CookieSameSite::None)));
        assert!(same_site_param("unspecified").is_none());
    }
}
