//! HTTP readiness probing with a bounded attempt budget.
//!
//! The probe polls a service's readiness endpoint at a fixed interval.
//! No backoff: callers rely on the worst case being exactly
//! `max_attempts * (interval + attempt_timeout)`.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::service::ManagedService;

/// Probe parameters, resolved once from settings.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Readiness endpoint to poll.
    pub url: String,
    /// Attempts before giving up.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub interval: Duration,
    /// HTTP timeout applied to each attempt.
    pub attempt_timeout: Duration,
}

/// Outcome of a probe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessResult {
    /// A 2xx answer arrived on the given attempt (1-based).
    Ready { attempts: u32 },
    /// The target process exited before ever answering.
    ProcessDied,
    /// The attempt budget ran out with the process still alive.
    TimedOut,
}

/// Poll a service's readiness endpoint until it answers 2xx.
///
/// Each iteration first checks that the process is still alive, so a
/// crashed service is reported within one interval instead of after the
/// whole attempt budget. The response body is ignored; only the status
/// code matters.
pub async fn wait_until_ready(
    service: &mut ManagedService,
    config: &ProbeConfig,
) -> ReadinessResult {
    info!(url = %config.url, max_attempts = config.max_attempts, "waiting for service readiness");
    let client = reqwest::Client::new();

    for attempt in 1..=config.max_attempts {
        if !service.is_alive() {
            warn!(attempt, "service exited before becoming ready");
            return ReadinessResult::ProcessDied;
        }

        let request = client.get(&config.url).timeout(config.attempt_timeout);
        match request.send().await {
            Ok(response) if response.status().is_success() => {
                info!(attempt, url = %config.url, "service is ready");
                return ReadinessResult::Ready { attempts: attempt };
            }
            Ok(response) => {
                debug!(attempt, status = %response.status(), "endpoint answered but not ready");
            }
            Err(e) => {
                debug!(attempt, error = %e, "readiness probe attempt failed");
            }
        }

        sleep(config.interval).await;
    }

    ReadinessResult::TimedOut
}
