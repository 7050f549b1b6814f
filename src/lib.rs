pub mod browser;
pub mod capture;
pub mod config;
pub mod cookies;
pub mod doctor;
pub mod rest;

use std::sync::Arc;

use capture::CaptureService;
use config::ServiceConfig;

/// Shared application state passed to every route handler.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServiceConfig>,
    /// The capture pipeline; owns the browser launcher and reads the
    /// cookie store fresh on every request.
    pub capture: Arc<CaptureService>,
    pub started_at: std::time::Instant,
}
