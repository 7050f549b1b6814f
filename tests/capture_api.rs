//! End-to-end tests for the capture HTTP API.
//! Spins up the REST server on a random port with a scripted browser and
//! exercises the endpoints over plain HTTP.

use dashsnap::browser::mock::MockBrowser;
use dashsnap::browser::BrowserError;
use dashsnap::capture::CaptureService;
use dashsnap::config::ServiceConfig;
use dashsnap::AppContext;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const TARGET: &str = "https://lookerstudio.google.com/embed/reporting/475a3c3e-e6f6-4341-a5d2-c493f486d380/page/p_i6m9xrzjtd";

/// Cookie export whose expiries sit far in the future (plus one session
/// cookie without an expiry).
const LIVE_COOKIES: &str = r#"[
  {"name": "SID", "value": "live-sid", "domain": ".google.com", "expires": 4102444800.0},
  {"name": "HSID", "value": "live-hsid", "domain": ".google.com", "secure": true},
  {"name": "RAP", "value": "studio", "domain": ".lookerstudio.google.com", "expires": 4102444800.0}
]"#;

const EXPIRED_COOKIES: &str = r#"[
  {"name": "SID", "value": "stale", "domain": ".google.com", "expires": 946684800.0}
]"#;

/// Find a free local port by binding to port 0.
fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Boot the REST server on `port` against a scripted browser. Cookie
/// content, when given, lands in the temp data dir before startup.
async fn spawn_service(dir: &TempDir, port: u16, cookies: Option<&str>, browser: MockBrowser) {
    if let Some(content) = cookies {
        std::fs::write(dir.path().join("cookies.json"), content).unwrap();
    }
    let config = Arc::new(ServiceConfig {
        port,
        bind_address: "127.0.0.1".to_string(),
        data_dir: dir.path().to_path_buf(),
        cookies_file: dir.path().join("cookies.json"),
        profile_dir: dir.path().join("profile"),
        headless: true,
        log: "error".to_string(),
        log_format: "text".to_string(),
    });
    let capture = Arc::new(CaptureService::new(Arc::clone(&config), Arc::new(browser)));
    let ctx = Arc::new(AppContext {
        config,
        capture,
        started_at: std::time::Instant::now(),
    });

    tokio::spawn(async move {
        let _ = dashsnap::rest::start_rest_server(ctx).await;
    });

    // Give the listener a moment to come up.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}

/// Raw HTTP GET, returning the status code and the parsed JSON body.
async fn http_get(port: u16, path_and_query: &str) -> (u16, serde_json::Value) {
    let mut stream = TcpStream::connect(format!("127.0.0.1:{port}"))
        .await
        .unwrap();
    let request =
        format!("GET {path_and_query} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.unwrap();
    let response = String::from_utf8_lossy(&buf);

    let status: u16 = response
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .expect("no status line in response");
    let body_start = response
        .find("\r\n\r\n")
        .map(|i| i + 4)
        .expect("no body in response");
    let body = serde_json::from_str(&response[body_start..]).expect("body is not valid JSON");
    (status, body)
}

// ─── /capture ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn capture_without_cookie_file_is_401_needs_login() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new();
    let state = browser.state();
    spawn_service(&dir, port, None, browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}&w=600&h=1050")).await;

    assert_eq!(status, 401);
    assert_eq!(body["ok"], json!(false));
    assert_eq!(body["needsLogin"], json!(true));
    assert_eq!(
        body["error"],
        json!("no valid authentication cookies available")
    );
    assert_eq!(body["url"].as_str(), Some(TARGET));
    // The target dashboard is never visited without cookies.
    assert!(state.navigations().is_empty());
    assert_eq!(state.closes(), 1, "browser must still be released");
}

#[tokio::test]
async fn capture_with_expired_cookies_is_401() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new();
    let state = browser.state();
    spawn_service(&dir, port, Some(EXPIRED_COOKIES), browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}")).await;

    assert_eq!(status, 401);
    assert_eq!(body["needsLogin"], json!(true));
    assert!(state.navigations().is_empty());
}

#[tokio::test]
async fn capture_behind_login_wall_is_session_expired() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new().with_page_text("Access denied. Faça login para continuar.");
    spawn_service(&dir, port, Some(LIVE_COOKIES), browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}")).await;

    assert_eq!(status, 401);
    assert_eq!(body["needsLogin"], json!(true));
    // Distinct message from the no-cookies case: cookies were injected
    // but the dashboard bounced them.
    assert_eq!(
        body["error"],
        json!("authentication cookies were rejected; session expired")
    );
}

#[tokio::test]
async fn capture_happy_path_returns_png_data_url() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new();
    let state = browser.state();
    spawn_service(&dir, port, Some(LIVE_COOKIES), browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}&w=600&h=1050")).await;

    assert_eq!(status, 200);
    assert_eq!(body["ok"], json!(true));
    let data_url = body["dataUrl"].as_str().expect("dataUrl missing");
    assert!(data_url.starts_with("data:image/png;base64,"));
    assert_eq!(body["dimensions"]["width"], json!(600));
    assert_eq!(body["dimensions"]["height"], json!(1050));
    assert_eq!(body["url"].as_str(), Some(TARGET));
    let timestamp = body["timestamp"].as_str().expect("timestamp missing");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());

    assert_eq!(state.screenshots(), 1);
    assert_eq!(state.launches(), 1);
    assert_eq!(state.closes(), 1);
}

#[tokio::test]
async fn capture_navigation_timeout_is_408() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new().with_target_failure(BrowserError::Timeout(
        "Navigation timeout of 60000 ms exceeded".to_string(),
    ));
    let state = browser.state();
    spawn_service(&dir, port, Some(LIVE_COOKIES), browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}")).await;

    assert_eq!(status, 408);
    assert_eq!(body["error"], json!("capture timed out"));
    assert!(body["details"].as_str().unwrap().contains("60000"));
    assert!(body.get("needsLogin").is_none());
    assert_eq!(state.closes(), 1, "browser must be released on timeout");
}

#[tokio::test]
async fn capture_upstream_http_error_is_502() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new().with_nav_status(403);
    spawn_service(&dir, port, Some(LIVE_COOKIES), browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}")).await;

    assert_eq!(status, 502);
    assert_eq!(body["error"], json!("upstream dashboard error"));
    assert!(body["details"].as_str().unwrap().contains("403"));
}

#[tokio::test]
async fn capture_launch_failure_is_500() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new().failing_launch();
    let state = browser.state();
    spawn_service(&dir, port, Some(LIVE_COOKIES), browser).await;

    let (status, body) = http_get(port, &format!("/capture?url={TARGET}")).await;

    assert_eq!(status, 500);
    assert_eq!(body["error"], json!("browser error"));
    assert_eq!(state.closes(), 0, "nothing to release when launch fails");
}

#[tokio::test]
async fn capture_without_url_is_400() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, Some(LIVE_COOKIES), MockBrowser::new()).await;

    let (status, body) = http_get(port, "/capture").await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], json!("url parameter is required"));
    assert!(body.get("url").is_none());
}

// ─── /status ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn status_reports_missing_cookie_file() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, None, MockBrowser::new()).await;

    let (status, body) = http_get(port, "/status").await;

    assert_eq!(status, 200, "/status never fails the request");
    assert_eq!(body["authenticated"], json!(false));
    assert_eq!(body["cookiesFile"], json!(false));
    assert_eq!(body["needsLogin"], json!(true));
    assert_eq!(body["status"], json!("needs_login"));
    assert_eq!(body["totalCookies"], json!(0));
}

#[tokio::test]
async fn status_reports_live_cookies_as_ready() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, Some(LIVE_COOKIES), MockBrowser::new()).await;

    let (status, body) = http_get(port, "/status").await;

    assert_eq!(status, 200);
    assert_eq!(body["authenticated"], json!(true));
    assert_eq!(body["cookiesFile"], json!(true));
    assert_eq!(body["totalCookies"], json!(3));
    assert_eq!(body["validCookies"], json!(3));
    assert_eq!(body["status"], json!("ready"));
    assert_eq!(body["needsLogin"], json!(false));
}

#[tokio::test]
async fn status_counts_expired_cookies_as_needs_login() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, Some(EXPIRED_COOKIES), MockBrowser::new()).await;

    let (_, body) = http_get(port, "/status").await;

    assert_eq!(body["authenticated"], json!(false));
    assert_eq!(body["cookiesFile"], json!(true));
    assert_eq!(body["totalCookies"], json!(1));
    assert_eq!(body["validCookies"], json!(0));
}

#[tokio::test]
async fn status_with_corrupt_file_still_reports_file_present() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, Some("{not json"), MockBrowser::new()).await;

    let (_, body) = http_get(port, "/status").await;

    assert_eq!(body["authenticated"], json!(false));
    assert_eq!(body["cookiesFile"], json!(true));
    assert_eq!(body["totalCookies"], json!(0));
}

// ─── /health and /test-connection ─────────────────────────────────────────────

#[tokio::test]
async fn health_reports_service_environment() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, None, MockBrowser::new()).await;

    let (status, body) = http_get(port, "/health").await;

    assert_eq!(status, 200);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["service"], json!("dashsnap"));
    assert_eq!(body["version"].as_str(), Some(env!("CARGO_PKG_VERSION")));
    assert!(body["uptime_secs"].is_number());
    assert_eq!(body["environment"]["port"].as_u64(), Some(port as u64));
    assert_eq!(body["environment"]["headless"], json!(true));
}

#[tokio::test]
async fn test_connection_reports_navigation_without_judging() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    let browser = MockBrowser::new()
        .with_nav_status(200)
        .with_title("SICREDI Dashboard");
    spawn_service(&dir, port, None, browser).await;

    let (status, body) = http_get(port, &format!("/test-connection?url={TARGET}")).await;

    assert_eq!(status, 200);
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["url"].as_str(), Some(TARGET));
    assert_eq!(body["currentUrl"].as_str(), Some(TARGET));
    assert_eq!(body["title"], json!("SICREDI Dashboard"));
    assert_eq!(body["status"], json!(200));
}

#[tokio::test]
async fn test_connection_without_url_is_400() {
    let dir = TempDir::new().unwrap();
    let port = find_free_port();
    spawn_service(&dir, port, None, MockBrowser::new()).await;

    let (status, body) = http_get(port, "/test-connection").await;

    assert_eq!(status, 400);
    assert_eq!(body["ok"], json!(false));
}
