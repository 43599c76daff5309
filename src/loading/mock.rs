//! Scriptable in-memory source for exercising the pipeline without I/O

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::source::{AssetSource, BoxFuture, FetchError};
use crate::core::types::lock;

/// Scripted behaviour for one URL of a [`MockSource`]
#[derive(Debug, Clone)]
pub enum MockRoute {
    /// Always succeed with these bytes
    Serve(Vec<u8>),
    /// Fail with a network error `remaining` more times, then serve
    Flaky { remaining: u32, bytes: Vec<u8> },
    /// Always fail with a network error
    Fail,
    /// Always fail with this HTTP status
    Status(u16),
    /// Never complete
    Hang,
}

/// Scriptable source for testing. Records every call and the peak number of
/// concurrent fetches.
#[derive(Debug, Default)]
pub struct MockSource {
    routes: Mutex<HashMap<String, MockRoute>>,
    calls: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn route(self, url: impl Into<String>, route: MockRoute) -> Self {
        lock(&self.routes).insert(url.into(), route);
        self
    }

    pub fn serve(self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.route(url, MockRoute::Serve(bytes.into()))
    }

    pub fn fail(self, url: impl Into<String>) -> Self {
        self.route(url, MockRoute::Fail)
    }

    /// Number of fetches issued for `url`
    pub fn calls(&self, url: &str) -> usize {
        lock(&self.calls).iter().filter(|called| called.as_str() == url).count()
    }

    /// Every fetched URL, in call order
    pub fn call_log(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, url: &str) -> Option<Result<Vec<u8>, FetchError>> {
        let mut routes = lock(&self.routes);
        let result = match routes.get_mut(url) {
            None => Err(FetchError::NotFound(url.to_string())),
            Some(MockRoute::Serve(bytes)) => Ok(bytes.clone()),
            Some(MockRoute::Flaky { remaining, bytes }) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    Err(FetchError::Network(format!("connection reset: {}", url)))
                } else {
                    Ok(bytes.clone())
                }
            }
            Some(MockRoute::Fail) => Err(FetchError::Network(format!("connection refused: {}", url))),
            Some(MockRoute::Status(status)) => Err(FetchError::Http {
                status: *status,
                url: url.to_string(),
            }),
            Some(MockRoute::Hang) => return None,
        };
        Some(result)
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AssetSource for MockSource {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, FetchError>> {
        Box::pin(async move {
            lock(&self.calls).push(url.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.answer(url) {
                Some(result) => result,
                None => std::future::pending().await,
            }
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
