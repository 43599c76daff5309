//! Single-asset fetch: per-attempt timeout, exponential backoff, fallback URL

use std::sync::Arc;
use std::time::Duration;

use super::source::{AssetSource, FetchError};

/// How to fetch one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub id: String,
    pub url: String,
    pub fallback_url: Option<String>,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Per-attempt timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Delay before the first retry; doubles for each later one
    pub backoff_base: Duration,
}

impl FetchPlan {
    /// Delay before retry `retry` (1-based): `base * 2^(retry - 1)`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_base.saturating_mul(1u32 << exponent)
    }
}

/// Payload delivered by a successful fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub url: String,
    pub from_fallback: bool,
}

/// Result of running a [`FetchPlan`] to completion
#[derive(Debug)]
pub struct FetchOutcome {
    pub result: Result<Fetched, FetchError>,
    /// Attempts made against the primary URL
    pub attempts: u32,
    /// True once the primary URL exhausted its retries
    pub primary_failed: bool,
    pub fallback_attempted: bool,
}

/// Run `plan` against `source`.
///
/// The primary URL gets `1 + max_retries` attempts. A local I/O fault ends
/// the primary phase early. If the primary fails and a fallback exists, the
/// fallback is tried exactly once with the same timeout.
pub async fn fetch_asset(source: Arc<dyn AssetSource>, plan: FetchPlan) -> FetchOutcome {
    let mut attempts = 0;
    let mut last_error = None;

    for attempt in 0..=plan.max_retries {
        if attempt > 0 {
            let delay = plan.backoff(attempt);
            log::debug!("Retrying '{}' (retry {}) after {:?}", plan.id, attempt, delay);
            tokio::time::sleep(delay).await;
        }

        attempts += 1;
        match fetch_once(source.as_ref(), &plan.url, plan.timeout).await {
            Ok(bytes) => {
                return FetchOutcome {
                    result: Ok(Fetched {
                        bytes,
                        url: plan.url.clone(),
                        from_fallback: false,
                    }),
                    attempts,
                    primary_failed: false,
                    fallback_attempted: false,
                };
            }
            Err(e) => {
                log::warn!("Fetch of '{}' failed (attempt {}): {}", plan.id, attempts, e);
                let retryable = e.is_retryable();
                last_error = Some(e);
                if !retryable {
                    break;
                }
            }
        }
    }

    let primary_error = last_error.unwrap_or_else(|| FetchError::Network("no attempts made".into()));

    let Some(fallback) = plan.fallback_url.as_deref() else {
        return FetchOutcome {
            result: Err(primary_error),
            attempts,
            primary_failed: true,
            fallback_attempted: false,
        };
    };

    log::info!("Trying fallback for '{}': {}", plan.id, fallback);
    let result = fetch_once(source.as_ref(), fallback, plan.timeout)
        .await
        .map(|bytes| Fetched {
            bytes,
            url: fallback.to_string(),
            from_fallback: true,
        });

    FetchOutcome {
        result,
        attempts,
        primary_failed: true,
        fallback_attempted: true,
    }
}

async fn fetch_once(
    source: &dyn AssetSource,
    url: &str,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, FetchError> {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, source.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                ms: limit.as_millis() as u64,
            }),
        },
        None => source.fetch(url).await,
    }
}
