use dashsnap::doctor;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use dashsnap::browser::chromium::ChromiumBrowser;
use dashsnap::capture::CaptureService;
use dashsnap::config::ServiceConfig;
use dashsnap::rest::start_rest_server;
use dashsnap::AppContext;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(
    name = "dashsnap",
    about = "Dashboard screenshot service — replays saved auth cookies into a headless browser",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP API port
    #[arg(long, env = "DASHSNAP_PORT")]
    port: Option<u16>,

    /// Data directory for config, cookies, and the browser profile
    #[arg(long, env = "DASHSNAP_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DASHSNAP_LOG")]
    log: Option<String>,

    /// Bind address for the HTTP server (default: 127.0.0.1; use 0.0.0.0 for LAN access)
    #[arg(long, env = "DASHSNAP_BIND")]
    bind_address: Option<String>,

    /// Path to the exported cookie file (default: {data_dir}/cookies.json)
    #[arg(long, env = "DASHSNAP_COOKIES_FILE")]
    cookies_file: Option<std::path::PathBuf>,

    /// Browser profile directory (default: {data_dir}/profile)
    #[arg(long, env = "DASHSNAP_PROFILE_DIR")]
    profile_dir: Option<std::path::PathBuf>,

    /// Run the browser headless (default: true). Pass --headless=false to watch captures.
    #[arg(long, env = "DASHSNAP_HEADLESS")]
    headless: Option<bool>,

    /// Write logs to this file path (rotated daily). Optional.
    #[arg(long, env = "DASHSNAP_LOG_FILE")]
    log_file: Option<std::path::PathBuf>,

    /// Log format: text (default) or json
    #[arg(long, env = "DASHSNAP_LOG_FORMAT")]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the capture service (default when no subcommand given).
    ///
    /// Runs dashsnap in the foreground. When invoked with no subcommand, this is the default.
    ///
    /// Examples:
    ///   dashsnap serve
    ///   dashsnap
    Serve,
    /// Run smoke checks against a running service instance.
    ///
    /// Exercises /health, /status, and /test-connection, plus a real
    /// capture per known dashboard when the cookie store is authenticated.
    ///
    /// Exit code 0 if all checks pass, 1 if any check fails.
    ///
    /// Examples:
    ///   dashsnap doctor
    ///   dashsnap doctor --server http://192.168.0.12:3001
    Doctor {
        /// Base URL of the instance to check (default: http://127.0.0.1:3001)
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // ── Logging setup ────────────────────────────────────────────────────────
    // Init once — must happen before any tracing calls.
    let log_level = args.log.as_deref().unwrap_or("info").to_owned();
    let log_format = args.log_format.as_deref().unwrap_or("text").to_owned();
    let _file_guard = setup_logging(&log_level, args.log_file.as_deref(), &log_format);

    match args.command {
        Some(Command::Doctor { server }) => {
            let results = doctor::run_doctor(server.as_deref()).await;
            doctor::print_doctor_results(&results);
            let failed = results.iter().filter(|r| !r.passed).count();
            std::process::exit(if failed == 0 { 0 } else { 1 });
        }
        None | Some(Command::Serve) => {
            run_server(
                args.port,
                args.data_dir,
                args.log,
                args.bind_address,
                args.cookies_file,
                args.profile_dir,
                args.headless,
            )
            .await?;
        }
    }

    Ok(())
}

// ── dashsnap serve ────────────────────────────────────────────────────────────

async fn run_server(
    port: Option<u16>,
    data_dir: Option<std::path::PathBuf>,
    log: Option<String>,
    bind_address: Option<String>,
    cookies_file: Option<std::path::PathBuf>,
    profile_dir: Option<std::path::PathBuf>,
    headless: Option<bool>,
) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "dashsnap starting");

    let config = Arc::new(ServiceConfig::new(
        port,
        data_dir,
        log,
        bind_address,
        cookies_file,
        profile_dir,
        headless,
    ));
    info!(
        data_dir = %config.data_dir.display(),
        port = config.port,
        cookies_file = %config.cookies_file.display(),
        headless = config.headless,
        "config loaded"
    );

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!(
            "failed to create data directory {}",
            config.data_dir.display()
        )
    })?;

    install_panic_hook(config.data_dir.clone());
    // If previous run panicked, log the crash report and delete it.
    check_crash_log(&config.data_dir);

    let browser = Arc::new(ChromiumBrowser::new(
        config.profile_dir.clone(),
        config.headless,
    ));
    let capture = Arc::new(CaptureService::new(Arc::clone(&config), browser));

    let ctx = Arc::new(AppContext {
        config,
        capture,
        started_at: std::time::Instant::now(),
    });

    start_rest_server(ctx).await
}

/// Initialize the tracing subscriber.
/// If `log_file` is set, logs go to both stdout and a daily-rolling file.
/// Returns a `WorkerGuard` that must stay alive for the process lifetime.
///
/// `log_format` may be `"text"` (default, human-readable compact format) or
/// `"json"` (structured JSON for log aggregators).
///
/// If the log directory cannot be created, falls back to stdout-only logging
/// with a warning — never panics.
fn setup_logging(
    log_level: &str,
    log_file: Option<&std::path::Path>,
    log_format: &str,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let use_json = log_format == "json";

    if let Some(path) = log_file {
        let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let filename = path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("dashsnap.log"));

        // Ensure the directory exists before tracing-appender tries to open it.
        if let Err(e) = std::fs::create_dir_all(dir) {
            // Fall back to stdout-only — don't panic on a bad log path.
            eprintln!(
                "warn: could not create log directory '{}': {e} — falling back to stdout",
                dir.display()
            );
            if use_json {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(log_level)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_env_filter(log_level)
                    .compact()
                    .init();
            }
            return None;
        }

        let appender = tracing_appender::rolling::daily(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);

        if use_json {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().json())
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            tracing_subscriber::registry()
                .with(EnvFilter::new(log_level))
                .with(fmt::layer().compact())
                .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
                .init();
        }

        Some(guard)
    } else if use_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(log_level)
            .init();
        None
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(log_level)
            .compact()
            .init();
        None
    }
}

// ── Panic hook + crash log ────────────────────────────────────────────────────

/// Install a custom panic hook that writes panic info + backtrace to
/// `{data_dir}/crash.log`. The crash log is checked and removed on the
/// next startup (`check_crash_log`).
fn install_panic_hook(data_dir: std::path::PathBuf) {
    let original = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        // Call the original hook first (prints to stderr).
        original(info);

        let crash_path = data_dir.join("crash.log");
        let msg = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        let backtrace = std::backtrace::Backtrace::capture();
        let content = format!(
            "dashsnap panic at {location}\n\
             message: {msg}\n\
             version: {}\n\
             backtrace:\n{backtrace:#}\n",
            env!("CARGO_PKG_VERSION")
        );

        // Best-effort write — if this fails, we can't do much.
        let _ = std::fs::write(&crash_path, &content);
    }));
}

/// Check for a crash log from the previous run, log it at error level,
/// then delete it.
fn check_crash_log(data_dir: &std::path::Path) {
    let crash_path = data_dir.join("crash.log");
    match std::fs::read_to_string(&crash_path) {
        Ok(content) => {
            tracing::error!(
                crash_report = %content.trim(),
                "previous run ended with a panic — see crash report above"
            );
            let _ = std::fs::remove_file(&crash_path);
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(err = %e, "could not read crash.log");
        }
    }
}
