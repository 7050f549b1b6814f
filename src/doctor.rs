//! doctor.rs — smoke checks for `dashsnap doctor`.
//!
//! Drives a RUNNING service instance over plain HTTP, end to end: health,
//! cookie store, upstream connectivity per known dashboard, and (when the
//! store is authenticated) a real capture. It is self-contained and does
//! not require AppContext.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3001";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
// test-connection and capture both sit on a real browser navigation, so
// their requests get budgets past the service's own 60 s ceiling.
const PROBE_TIMEOUT: Duration = Duration::from_secs(90);
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(150);

/// The result of a single diagnostic check.
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// A dashboard the service captures in production, with the dimensions
/// its consumers expect.
pub struct DashboardTarget {
    pub name: &'static str,
    pub url: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const KNOWN_DASHBOARDS: &[DashboardTarget] = &[
    DashboardTarget {
        name: "SICREDI CAS",
        url: "https://lookerstudio.google.com/embed/reporting/475a3c3e-e6f6-4341-a5d2-c493f486d380/page/p_i6m9xrzjtd",
        width: 600,
        height: 1050,
    },
    DashboardTarget {
        name: "SICREDI PR/SP/RJ",
        url: "https://lookerstudio.google.com/embed/reporting/e747cd62-1085-43f8-8d4a-4d993140c8b1/page/p_hp7fdemgvd",
        width: 600,
        height: 1550,
    },
];

/// Run every check against `server` (default `http://127.0.0.1:3001`)
/// and return the results in the order they ran.
pub async fn run_doctor(server: Option<&str>) -> Vec<CheckResult> {
    let base = server.unwrap_or(DEFAULT_SERVER).trim_end_matches('/');

    let client = match build_client() {
        Ok(client) => client,
        Err(e) => {
            return vec![CheckResult {
                name: "http client".to_string(),
                passed: false,
                detail: format!("{e:#}"),
            }]
        }
    };

    let mut results = Vec::new();

    // If the service is down there is nothing else worth testing.
    let health = check_health(&client, base).await;
    let reachable = health.passed;
    results.push(health);
    if !reachable {
        return results;
    }

    let (status, authenticated) = check_status(&client, base).await;
    results.push(status);

    for target in KNOWN_DASHBOARDS {
        results.push(check_connection(&client, base, target).await);
    }
    for target in KNOWN_DASHBOARDS {
        results.push(check_capture(&client, base, target, authenticated).await);
    }

    results
}

// ─── Individual checks ────────────────────────────────────────────────────────

async fn check_health(client: &reqwest::Client, base: &str) -> CheckResult {
    let name = "service reachable".to_string();
    match get_json(client.get(format!("{base}/health"))).await {
        Ok((status, body)) if status.is_success() && body["ok"] == json!(true) => {
            let version = body["version"].as_str().unwrap_or("?");
            let uptime = body["uptime_secs"].as_u64().unwrap_or(0);
            let port = body["environment"]["port"].as_u64().unwrap_or(0);
            CheckResult {
                name,
                passed: true,
                detail: format!("dashsnap v{version} on port {port}, up {uptime}s"),
            }
        }
        Ok((status, _)) => CheckResult {
            name,
            passed: false,
            detail: format!("unexpected HTTP {status} from /health"),
        },
        Err(e) => CheckResult {
            name,
            passed: false,
            detail: format!("cannot reach {base}: {e} — start the service with `dashsnap serve`"),
        },
    }
}

async fn check_status(client: &reqwest::Client, base: &str) -> (CheckResult, bool) {
    let name = "cookie store".to_string();
    match get_json(client.get(format!("{base}/status"))).await {
        Ok((status, body)) if status.is_success() => {
            let authenticated = body["authenticated"].as_bool().unwrap_or(false);
            let valid = body["validCookies"].as_u64().unwrap_or(0);
            let total = body["totalCookies"].as_u64().unwrap_or(0);
            let detail = if authenticated {
                format!("authenticated, {valid}/{total} cookies valid")
            } else if body["cookiesFile"] == json!(false) {
                "no cookie file — export cookies from a logged-in browser".to_string()
            } else {
                format!("needs login, {valid}/{total} cookies valid — export a fresh set")
            };
            // Needs-login is an operational state, not a harness failure;
            // the capture checks below are skipped instead.
            (
                CheckResult {
                    name,
                    passed: true,
                    detail,
                },
                authenticated,
            )
        }
        Ok((status, _)) => (
            CheckResult {
                name,
                passed: false,
                detail: format!("unexpected HTTP {status} from /status"),
            },
            false,
        ),
        Err(e) => (
            CheckResult {
                name,
                passed: false,
                detail: e.to_string(),
            },
            false,
        ),
    }
}

async fn check_connection(
    client: &reqwest::Client,
    base: &str,
    target: &DashboardTarget,
) -> CheckResult {
    let name = format!("test-connection: {}", target.name);
    let request = client
        .get(format!("{base}/test-connection"))
        .query(&[("url", target.url)])
        .timeout(PROBE_TIMEOUT);
    match get_json(request).await {
        Ok((status, body)) if status.is_success() && body["ok"] == json!(true) => {
            let title: String = body["title"]
                .as_str()
                .unwrap_or("")
                .chars()
                .take(50)
                .collect();
            let http = match body["status"].as_u64() {
                Some(code) => code.to_string(),
                None => "unknown".to_string(),
            };
            CheckResult {
                name,
                passed: true,
                detail: format!("\"{title}\" (HTTP {http})"),
            }
        }
        Ok((status, body)) => CheckResult {
            name,
            passed: false,
            detail: failure_detail(status, &body),
        },
        Err(e) => CheckResult {
            name,
            passed: false,
            detail: e.to_string(),
        },
    }
}

async fn check_capture(
    client: &reqwest::Client,
    base: &str,
    target: &DashboardTarget,
    authenticated: bool,
) -> CheckResult {
    let name = format!("capture: {}", target.name);
    if !authenticated {
        return CheckResult {
            name,
            passed: true,
            detail: "skipped — no valid cookies".to_string(),
        };
    }

    let request = client
        .get(format!("{base}/capture"))
        .query(&[
            ("url", target.url.to_string()),
            ("w", target.width.to_string()),
            ("h", target.height.to_string()),
        ])
        .timeout(CAPTURE_TIMEOUT);
    match get_json(request).await {
        Ok((status, body)) if status.is_success() && body["ok"] == json!(true) => {
            let data_url = body["dataUrl"].as_str().unwrap_or("");
            if !data_url.starts_with("data:image/png;base64,") {
                return CheckResult {
                    name,
                    passed: false,
                    detail: "reply carried no PNG data url".to_string(),
                };
            }
            let width = body["dimensions"]["width"].as_u64().unwrap_or(0);
            let height = body["dimensions"]["height"].as_u64().unwrap_or(0);
            let kb = data_url.len() * 3 / 4 / 1024;
            CheckResult {
                name,
                passed: true,
                detail: format!("{width}x{height} png, ~{kb} KB"),
            }
        }
        Ok((status, body)) => CheckResult {
            name,
            passed: false,
            detail: failure_detail(status, &body),
        },
        Err(e) => CheckResult {
            name,
            passed: false,
            detail: e.to_string(),
        },
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("failed to build HTTP client")
}

async fn get_json(
    request: reqwest::RequestBuilder,
) -> Result<(reqwest::StatusCode, Value), reqwest::Error> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.json::<Value>().await.unwrap_or_else(|_| json!({}));
    Ok((status, body))
}

/// Condense an error reply into one line for the report.
fn failure_detail(status: reqwest::StatusCode, body: &Value) -> String {
    let error = body["error"].as_str().unwrap_or("unrecognized reply");
    match body["details"].as_str() {
        Some(details) => format!("HTTP {status}: {error} ({details})"),
        None => format!("HTTP {status}: {error}"),
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print a formatted table of check results to stdout.
pub fn print_doctor_results(results: &[CheckResult]) {
    println!();
    println!("{BOLD}dashsnap doctor — capture service smoke checks{RESET}");
    println!("{}", "─".repeat(72));

    for r in results {
        let (symbol, color) = if r.passed { ("✓", GREEN) } else { ("✗", RED) };
        println!("  {color}{symbol}{RESET}  {:<34}  {}", r.name, r.detail);
    }

    println!("{}", "─".repeat(72));

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed == 0 {
        println!("{GREEN}All checks passed.{RESET}");
    } else {
        println!("{RED}{failed} check(s) failed. See above for details.{RESET}");
    }
    println!();
}
