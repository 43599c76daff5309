//! FPS and memory sampling that drives quality level transitions
//!
//! FPS and memory are each mapped to an eligible level; the active level is
//! the stricter of the two. Subscribers hear about a transition once, when
//! the combined level actually changes.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::level::QualityLevel;
use crate::frame::FrameScheduler;
use crate::resource::ResourceTracker;

/// Sampling cadence and thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub target_fps: f32,
    pub fps_sample_interval_ms: u64,
    pub memory_sample_interval_ms: u64,
    /// FPS at or above `target * fps_high` is High-eligible
    pub fps_high: f32,
    /// FPS at or above `target * fps_medium` is Medium-eligible
    pub fps_medium: f32,
    /// Utilization below this is High-eligible
    pub memory_medium: f32,
    /// Utilization above this is Low
    pub memory_low: f32,
    /// Utilization above this forces an emergency eviction
    pub memory_emergency: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            fps_sample_interval_ms: 1000,
            memory_sample_interval_ms: 5000,
            fps_high: 0.8,
            fps_medium: 0.6,
            memory_medium: 0.7,
            memory_low: 0.9,
            memory_emergency: 1.2,
        }
    }
}

impl QualityConfig {
    pub fn level_for_fps(&self, fps: f32) -> QualityLevel {
        if fps >= self.target_fps * self.fps_high {
            QualityLevel::High
        } else if fps >= self.target_fps * self.fps_medium {
            QualityLevel::Medium
        } else {
            QualityLevel::Low
        }
    }

    pub fn level_for_memory(&self, utilization: f32) -> QualityLevel {
        if utilization < self.memory_medium {
            QualityLevel::High
        } else if utilization <= self.memory_low {
            QualityLevel::Medium
        } else {
            QualityLevel::Low
        }
    }
}

/// A level transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QualityChange {
    pub from: QualityLevel,
    pub to: QualityLevel,
    /// Most recent FPS sample
    pub fps: Option<f32>,
    /// Most recent memory utilization sample
    pub memory_utilization: Option<f32>,
}

/// Handle returned by [`QualityController::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&QualityChange) + Send + Sync>;

pub struct QualityController {
    config: QualityConfig,
    level: QualityLevel,
    fps_level: QualityLevel,
    memory_level: QualityLevel,
    last_fps: Option<f32>,
    last_memory: Option<f32>,
    fps_sampled_at: Option<Instant>,
    memory_sampled_at: Option<Instant>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    transitions: u64,
}

impl QualityController {
    pub fn new(config: QualityConfig) -> Self {
        Self {
            config,
            level: QualityLevel::High,
            fps_level: QualityLevel::High,
            memory_level: QualityLevel::High,
            last_fps: None,
            last_memory: None,
            fps_sampled_at: None,
            memory_sampled_at: None,
            subscribers: Vec::new(),
            next_subscription: 0,
            transitions: 0,
        }
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Transitions emitted so far
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    pub fn subscribe(&mut self, callback: impl Fn(&QualityChange) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(subscription, _)| *subscription != id);
        self.subscribers.len() != before
    }

    /// Feed one FPS sample
    pub fn record_fps(&mut self, fps: f32) -> Option<QualityChange> {
        self.note_fps(fps);
        self.evaluate()
    }

    /// Feed one memory utilization sample (fraction of budget)
    pub fn record_memory(&mut self, utilization: f32) -> Option<QualityChange> {
        self.note_memory(utilization);
        self.evaluate()
    }

    fn note_fps(&mut self, fps: f32) {
        self.last_fps = Some(fps);
        self.fps_level = self.config.level_for_fps(fps);
    }

    fn note_memory(&mut self, utilization: f32) {
        self.last_memory = Some(utilization);
        self.memory_level = self.config.level_for_memory(utilization);
    }

    /// Take whichever samples are due at `now` and emit at most one
    /// transition.
    ///
    /// FPS comes from the scheduler and is ignored until it has frames to
    /// average. Memory comes from `heap_utilization` when the host provides
    /// it, otherwise from the tracker. Utilization above the emergency
    /// threshold runs one emergency eviction per memory interval; the level
    /// it implies is applied on the next call, never in the evicting one.
    pub fn sample(
        &mut self,
        now: Instant,
        scheduler: &FrameScheduler,
        tracker: &mut ResourceTracker,
        heap_utilization: Option<f32>,
    ) -> Option<QualityChange> {
        if due(self.memory_sampled_at, now, self.config.memory_sample_interval_ms) {
            let utilization = heap_utilization.unwrap_or_else(|| tracker.utilization());
            self.memory_sampled_at = Some(now);
            self.note_memory(utilization);

            if utilization > self.config.memory_emergency {
                let evicted = tracker.emergency_evict();
                log::warn!(
                    "Memory at {:.0}% of budget, emergency evicted {} resources",
                    utilization * 100.0,
                    evicted.len()
                );
                return None;
            }
        }

        if due(self.fps_sampled_at, now, self.config.fps_sample_interval_ms) {
            let fps = scheduler.fps();
            if fps > 0.0 {
                self.fps_sampled_at = Some(now);
                self.note_fps(fps);
            }
        }

        self.evaluate()
    }

    fn evaluate(&mut self) -> Option<QualityChange> {
        let next = self.fps_level.stricter(self.memory_level);
        if next == self.level {
            return None;
        }

        let change = QualityChange {
            from: self.level,
            to: next,
            fps: self.last_fps,
            memory_utilization: self.last_memory,
        };
        self.level = next;
        self.transitions += 1;
        log::info!(
            "Quality {:?} -> {:?} (fps {:?}, memory {:?})",
            change.from,
            change.to,
            change.fps,
            change.memory_utilization
        );

        for (id, subscriber) in &self.subscribers {
            if catch_unwind(AssertUnwindSafe(|| subscriber(&change))).is_err() {
                log::error!("Quality subscriber {:?} panicked", id);
            }
        }
        Some(change)
    }

    /// Forget samples and return to High without notifying
    pub fn reset(&mut self) {
        self.level = QualityLevel::High;
        self.fps_level = QualityLevel::High;
        self.memory_level = QualityLevel::High;
        self.last_fps = None;
        self.last_memory = None;
        self.fps_sampled_at = None;
        self.memory_sampled_at = None;
    }
}

impl Default for QualityController {
    fn default() -> Self {
        Self::new(QualityConfig::default())
    }
}

fn due(last: Option<Instant>, now: Instant, interval_ms: u64) -> bool {
    last.is_none_or(|at| now.saturating_duration_since(at) >= Duration::from_millis(interval_ms))
}
