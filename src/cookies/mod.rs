// SPDX-License-Identifier: MIT
//! Cookie store — loads the saved browser cookie dump and answers
//! validity and partitioning questions about it.
//!
//! The dump is a JSON array produced by the cookie-refresh tooling (a
//! CDP cookie export). Loading is fail-soft: a missing, unreadable, or
//! malformed file is an *absent* store, never an error, so `/status`
//! keeps answering while someone rotates the cookie file underneath us.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One saved browser cookie, as serialized by the CDP cookie export.
///
/// The browser owns this format. Unknown fields are ignored and every
/// field is defaulted, so exports from newer browser versions still
/// parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// May carry a leading dot (`.google.com`).
    pub domain: String,
    pub path: String,
    /// Expiry in epoch seconds. Session cookies are exported as `-1`.
    pub expires: Option<f64>,
    pub http_only: bool,
    pub secure: bool,
    pub session: bool,
    pub same_site: Option<String>,
}

impl Cookie {
    /// A cookie is usable iff it has no expiry or the expiry is strictly
    /// in the future. Session cookies exported as `expires: -1` fail
    /// this test; they cannot outlive the browser that minted them.
    pub fn is_valid_at(&self, now: f64) -> bool {
        match self.expires {
            None => true,
            Some(expires) => expires > now,
        }
    }
}

/// Validity summary for `/status` and the capture pre-check.
#[derive(Debug, Clone, Serialize)]
pub struct CookieStatus {
    pub total: usize,
    pub valid: usize,
    pub authenticated: bool,
    /// Whether the cookie file was readable at all. A readable file
    /// full of garbage still counts as present.
    pub file_present: bool,
    pub path: PathBuf,
}

/// The parsed contents of the cookie file.
///
/// `cookies == None` means the file was missing, unreadable, or not
/// valid JSON. That is a normal operational state (`needs_login`), not
/// an error.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
    cookies: Option<Vec<Cookie>>,
    file_present: bool,
}

impl CookieStore {
    /// Read and parse the cookie file.
    ///
    /// Fail-soft: any I/O or parse failure yields an absent store and a
    /// warning in the log, never an error to the caller.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cookie file not readable");
                return Self {
                    path: path.to_path_buf(),
                    cookies: None,
                    file_present: false,
                };
            }
        };

        match serde_json::from_str::<Vec<Cookie>>(&raw) {
            Ok(cookies) => {
                debug!(path = %path.display(), count = cookies.len(), "cookie file loaded");
                Self {
                    path: path.to_path_buf(),
                    cookies: Some(cookies),
                    file_present: true,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cookie file is not valid JSON");
                Self {
                    path: path.to_path_buf(),
                    cookies: None,
                    file_present: true,
                }
            }
        }
    }

    /// Build a store from already-parsed cookies (tests, doctor fixtures).
    pub fn from_cookies(path: PathBuf, cookies: Vec<Cookie>) -> Self {
        Self {
            path,
            cookies: Some(cookies),
            file_present: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the file could not be loaded at all.
    pub fn is_absent(&self) -> bool {
        self.cookies.is_none()
    }

    /// Total number of cookies in the file (0 when absent).
    pub fn total(&self) -> usize {
        self.cookies.as_ref().map_or(0, Vec::len)
    }

    /// Cookies still usable at `now` (epoch seconds), in file order.
    pub fn valid_at(&self, now: f64) -> impl Iterator<Item = &Cookie> + '_ {
        self.cookies
            .iter()
            .flatten()
            .filter(move |c| c.is_valid_at(now))
    }

    /// Valid cookies whose domain contains `fragment` as a substring,
    /// preserving file order.
    ///
    /// Substring containment means the `google.com` partition is a
    /// superset of the `lookerstudio.google.com` one. That over-match is
    /// intentional: the session applier re-injects shared cookies on
    /// both origins, which is what the dashboards need.
    pub fn partition(&self, fragment: &str, now: f64) -> Vec<&Cookie> {
        self.valid_at(now)
            .filter(|c| c.domain.contains(fragment))
            .collect()
    }

    /// Summary used by `/status` and the capture orchestrator.
    pub fn status(&self, now: f64) -> CookieStatus {
        let valid = self.valid_at(now).count();
        CookieStatus {
            total: self.total(),
            valid,
            authenticated: valid > 0,
            file_present: self.file_present,
            path: self.path.clone(),
        }
    }
}

/// Current wall-clock time in epoch seconds, the unit cookie expiries use.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
