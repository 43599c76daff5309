//! Per-frame tasks

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::types::Result;

/// Execution priority. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

/// Frame callback: `(delta_ms, elapsed_ms)`. Returning an error disables the task.
pub type TaskCallback = Box<dyn FnMut(f64, f64) -> Result<()> + Send>;

/// Snapshot of a registered task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskInfo {
    pub id: String,
    pub priority: TaskPriority,
    pub target_fps: Option<u32>,
    pub enabled: bool,
    pub run_count: u64,
    pub consecutive_skips: u32,
    /// Why the task was disabled, if it failed
    pub last_error: Option<String>,
}

pub(crate) struct FrameTask {
    pub id: String,
    pub priority: TaskPriority,
    pub target_fps: Option<u32>,
    pub enabled: bool,
    pub last_run_at: Option<Instant>,
    pub consecutive_skips: u32,
    pub run_count: u64,
    pub last_error: Option<String>,
    /// Registration order, for stable ordering within a priority
    pub seq: u64,
    pub callback: TaskCallback,
}

impl FrameTask {
    /// Shortest time between two runs, if throttled
    pub fn min_interval(&self) -> Option<Duration> {
        self.target_fps
            .filter(|&fps| fps > 0)
            .map(|fps| Duration::from_secs_f64(1.0 / fps as f64))
    }

    /// Whether the throttle allows a run at `now`
    pub fn due(&self, now: Instant) -> bool {
        match (self.min_interval(), self.last_run_at) {
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
            _ => true,
        }
    }

    pub fn info(&self) -> TaskInfo {
        TaskInfo {
            id: self.id.clone(),
            priority: self.priority,
            target_fps: self.target_fps,
            enabled: self.enabled,
            run_count: self.run_count,
            consecutive_skips: self.consecutive_skips,
            last_error: self.last_error.clone(),
        }
    }
}
