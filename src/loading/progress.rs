//! Loading progress snapshots and observers

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Progress of the current loading session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadingProgress {
    pub loaded_count: usize,
    pub failed_count: usize,
    /// Gated out by budget, load condition, or an earlier permanent failure
    pub skipped_count: usize,
    pub total_count: usize,
    pub bytes_loaded: u64,
    pub bytes_total: u64,
    /// Asset resolved most recently
    pub current_asset_id: Option<String>,
    pub estimated_ms_remaining: u64,
    pub elapsed_ms: u64,
}

impl LoadingProgress {
    /// Assets that reached a terminal state
    pub fn resolved_count(&self) -> usize {
        self.loaded_count + self.failed_count + self.skipped_count
    }

    /// Loaded fraction by count (0.0 to 1.0)
    pub fn fraction(&self) -> f32 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.loaded_count as f32 / self.total_count as f32
    }

    pub fn is_complete(&self) -> bool {
        self.resolved_count() >= self.total_count
    }

    /// Recompute elapsed time and the remaining-time estimate
    ///
    /// `elapsed / (loaded / total) - elapsed`, or 0 before the first load.
    pub fn update_timing(&mut self, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        self.elapsed_ms = elapsed_ms;
        self.estimated_ms_remaining = if self.loaded_count == 0 || self.total_count == 0 {
            0
        } else {
            let fraction = self.loaded_count as f64 / self.total_count as f64;
            ((elapsed_ms as f64 / fraction) - elapsed_ms as f64).max(0.0).round() as u64
        };
    }
}

/// Receives a snapshot after every asset resolution
pub type ProgressCallback = Box<dyn Fn(&LoadingProgress) + Send + Sync>;

/// Handle returned by [`ProgressObservers::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Registered progress callbacks
#[derive(Default)]
pub struct ProgressObservers {
    next_id: u64,
    observers: Vec<(ObserverId, ProgressCallback)>,
}

impl ProgressObservers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, callback: ProgressCallback) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, callback));
        id
    }

    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `progress` to every observer. A panicking observer is logged and skipped.
    pub fn notify(&self, progress: &LoadingProgress) {
        for (id, callback) in &self.observers {
            if catch_unwind(AssertUnwindSafe(|| callback(progress))).is_err() {
                log::error!("Progress observer {:?} panicked", id);
            }
        }
    }
}
