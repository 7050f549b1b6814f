//! Criterion benchmarks for hot paths in the dashsnap service.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - Cookie export parsing (serde_json)
//!   - Cookie partitioning by domain fragment
//!   - Login-screen detection over page text

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dashsnap::capture::detect::is_login_screen;
use dashsnap::cookies::{Cookie, CookieStore};
use std::path::PathBuf;

// ─── Cookie export parsing ───────────────────────────────────────────────────

/// A realistic slice of a Chrome cookie export for google.com.
static COOKIE_EXPORT: &str = r#"[
    {"name": "SID", "value": "g.a000kQhj1234567890abcdef", "domain": ".google.com", "path": "/", "expires": 4102444800.0, "httpOnly": false, "secure": true, "sameSite": "None"},
    {"name": "HSID", "value": "AbCdEf12345", "domain": ".google.com", "path": "/", "expires": 4102444800.0, "httpOnly": true, "secure": false},
    {"name": "SSID", "value": "AxYz9876543", "domain": ".google.com", "path": "/", "expires": 4102444800.0, "httpOnly": true, "secure": true},
    {"name": "SAPISID", "value": "qwerty/AAAA1111", "domain": ".google.com", "path": "/", "expires": 4102444800.0, "secure": true},
    {"name": "__Secure-1PSID", "value": "g.a000another-long-value", "domain": ".google.com", "path": "/", "expires": 4102444800.0, "httpOnly": true, "secure": true, "sameSite": "Lax"},
    {"name": "NID", "value": "511=short-lived", "domain": ".google.com", "path": "/", "expires": 1700000000.0, "httpOnly": true},
    {"name": "RAP_SESSION", "value": "studio-session-token", "domain": ".lookerstudio.google.com", "path": "/", "expires": 4102444800.0, "secure": true},
    {"name": "S", "value": "billing=sessiononly", "domain": ".lookerstudio.google.com", "path": "/"}
]"#;

fn bench_cookie_parsing(c: &mut Criterion) {
    c.bench_function("cookie_export_parse", |b| {
        b.iter(|| {
            let cookies: Vec<Cookie> = serde_json::from_str(black_box(COOKIE_EXPORT)).unwrap();
            black_box(cookies);
        });
    });
}

// ─── Cookie partitioning ──────────────────────────────────────────────────────

fn bench_partitioning(c: &mut Criterion) {
    let cookies: Vec<Cookie> = serde_json::from_str(COOKIE_EXPORT).unwrap();
    // Repeat the export to the size of a messy real-world browser profile.
    let many: Vec<Cookie> = std::iter::repeat(cookies)
        .take(16)
        .flatten()
        .collect();
    let store = CookieStore::from_cookies(PathBuf::from("cookies.json"), many);
    let now = 2_000_000_000.0;

    c.bench_function("partition_google_128_cookies", |b| {
        b.iter(|| {
            let slice = store.partition(black_box("google.com"), black_box(now));
            black_box(slice);
        });
    });

    c.bench_function("status_128_cookies", |b| {
        b.iter(|| {
            let status = store.status(black_box(now));
            black_box(status);
        });
    });
}

// ─── Login-screen detection ──────────────────────────────────────────────────

fn bench_login_detection(c: &mut Criterion) {
    let dashboard_url = "https://lookerstudio.google.com/embed/reporting/abc/page/p1";
    // Worst case for the detector: clean text, every marker checked
    // against the full probe window.
    let clean_text = "Receita operacional consolidada por regional. "
        .repeat(80);
    let login_text = format!(
        "{}Para continuar, faça login com sua conta corporativa.",
        "Carregando painel... ".repeat(10)
    );

    c.bench_function("detect_clean_dashboard", |b| {
        b.iter(|| {
            let hit = is_login_screen(black_box(dashboard_url), black_box(&clean_text));
            black_box(hit);
        });
    });

    c.bench_function("detect_login_wall", |b| {
        b.iter(|| {
            let hit = is_login_screen(black_box(dashboard_url), black_box(&login_text));
            black_box(hit);
        });
    });
}

// ─── Entry point ─────────────────────────────────────────────────────────────

criterion_group!(
    benches,
    bench_cookie_parsing,
    bench_partitioning,
    bench_login_detection
);
criterion_main!(benches);
