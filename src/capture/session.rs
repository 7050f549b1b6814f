// SPDX-License-Identifier: MIT

//! Session priming — walks the domain partitions in order and replays
//! each partition's cookies into the live browser session.

use crate::browser::{BrowserSession, Readiness};
use crate::cookies::CookieStore;
use tracing::{debug, info, warn};

/// A cookie domain group and where the browser must be parked before
/// that group can be injected.
pub struct DomainPartition {
    /// Substring matched against each cookie's domain attribute. Broad
    /// on purpose: `google.com` also picks up the Looker Studio host.
    pub fragment: &'static str,
    /// Page opened before injecting, so the engine scopes cookies to
    /// the right origin.
    pub prime_url: &'static str,
}

/// Partitions in application order: the broad Google session first,
/// then the dashboard host itself.
pub const DOMAIN_PARTITIONS: &[DomainPartition] = &[
    DomainPartition {
        fragment: "google.com",
        prime_url: "https://accounts.google.com",
    },
    DomainPartition {
        fragment: "lookerstudio.google.com",
        prime_url: "https://lookerstudio.google.com",
    },
];

/// Apply every currently-valid cookie to the session, partition by
/// partition. A failing partition is logged and contributes zero; the
/// return value is the total number of cookies injected. Leaves the
/// session parked on the last partition's prime URL.
pub async fn apply_cookies(
    session: &mut dyn BrowserSession,
    store: &CookieStore,
    now: f64,
) -> usize {
    let mut injected = 0;
    for partition in DOMAIN_PARTITIONS {
        let matching: Vec<_> = store
            .partition(partition.fragment, now)
            .into_iter()
            .cloned()
            .collect();
        if matching.is_empty() {
            debug!(domain = partition.fragment, "no valid cookies to apply");
            continue;
        }

        let outcome = async {
            session
                .goto(partition.prime_url, Readiness::DomContentLoaded)
                .await?;
            session.inject_cookies(&matching).await
        }
        .await;

        match outcome {
            Ok(()) => {
                info!(
                    domain = partition.fragment,
                    count = matching.len(),
                    "cookies applied"
                );
                injected += matching.len();
            }
            Err(error) => {
                warn!(domain = partition.fragment, %error, "cookie partition failed");
            }
        }
    }
    injected
}
