//! Cooperative per-frame task scheduler
//!
//! The host calls [`FrameScheduler::tick`] once per display refresh. Each tick
//! runs enabled tasks in priority order, honouring per-task frame-rate
//! throttles. Low-priority tasks may be skipped while the frame runs long.
//! A rolling average of frame deltas steers the internal target rate between
//! the configured floor and ceiling.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::task::{FrameTask, TaskCallback, TaskInfo, TaskPriority};
use crate::core::error::Error;
use crate::core::time::FrameTimer;
use crate::core::types::Result;

/// Scheduler configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Initial target frame rate
    pub target_fps: u32,
    /// Adaptive floor
    pub min_fps: u32,
    /// Adaptive ceiling
    pub max_fps: u32,
    /// Adaptive step per adjustment
    pub fps_step: u32,
    /// Frames in the rolling average
    pub window_size: usize,
    /// Frame is "under load" above this multiple of the target interval
    pub load_factor: f64,
    /// Target rises when the average drops below this multiple of the interval
    pub recover_factor: f64,
    /// Consecutive skips allowed per low-priority task
    pub max_consecutive_skips: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            min_fps: 30,
            max_fps: 60,
            fps_step: 5,
            window_size: 60,
            load_factor: 1.5,
            recover_factor: 0.8,
            max_consecutive_skips: 3,
        }
    }
}

/// Scheduler performance snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub fps: f32,
    pub average_frame_ms: f32,
    pub target_fps: u32,
    pub frame_count: u64,
    /// Low-priority runs skipped under load
    pub skipped_runs: u64,
    pub active_tasks: usize,
    pub disabled_tasks: usize,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameReport {
    pub delta: Duration,
    pub ran: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Teardown hook run by [`FrameScheduler::cleanup`]
pub type Teardown = Box<dyn FnOnce() -> Result<()> + Send>;

pub struct FrameScheduler {
    config: SchedulerConfig,
    /// Sorted by (priority, registration order)
    tasks: Vec<FrameTask>,
    timer: FrameTimer,
    running: bool,
    target_fps: u32,
    /// Upper bound imposed by quality settings
    fps_ceiling: u32,
    skipped_runs: u64,
    teardowns: Vec<Teardown>,
    next_seq: u64,
}

impl FrameScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let max_fps = config.max_fps.max(config.min_fps);
        Self {
            timer: FrameTimer::new(config.window_size),
            target_fps: config.target_fps.clamp(config.min_fps, max_fps),
            fps_ceiling: max_fps,
            config,
            tasks: Vec::new(),
            running: false,
            skipped_runs: 0,
            teardowns: Vec::new(),
            next_seq: 0,
        }
    }

    /// Register a task. Starts the scheduler if it was stopped.
    ///
    /// Registering an existing id replaces that task.
    pub fn add_task(
        &mut self,
        id: impl Into<String>,
        priority: TaskPriority,
        target_fps: Option<u32>,
        callback: impl FnMut(f64, f64) -> Result<()> + Send + 'static,
    ) {
        let id = id.into();
        if self.remove_entry(&id) {
            log::warn!("Replacing frame task '{}'", id);
        }

        let callback: TaskCallback = Box::new(callback);
        let task = FrameTask {
            id: id.clone(),
            priority,
            target_fps,
            enabled: true,
            last_run_at: None,
            consecutive_skips: 0,
            run_count: 0,
            last_error: None,
            seq: self.next_seq,
            callback,
        };
        self.next_seq += 1;

        let at = self
            .tasks
            .partition_point(|t| (t.priority, t.seq) <= (task.priority, task.seq));
        self.tasks.insert(at, task);
        log::debug!("Added frame task '{}' ({:?}, {:?} fps)", id, priority, target_fps);

        if !self.running {
            self.start();
        }
    }

    /// Unregister a task. Stops the scheduler once no tasks remain.
    pub fn remove_task(&mut self, id: &str) -> bool {
        let removed = self.remove_entry(id);
        if removed {
            log::debug!("Removed frame task '{}'", id);
            if self.tasks.is_empty() {
                self.stop();
            }
        }
        removed
    }

    fn remove_entry(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        self.tasks.len() != before
    }

    pub fn enable(&mut self, id: &str) -> Result<()> {
        let task = self.task_mut(id)?;
        task.enabled = true;
        task.last_error = None;
        Ok(())
    }

    pub fn disable(&mut self, id: &str) -> Result<()> {
        self.task_mut(id)?.enabled = false;
        Ok(())
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut FrameTask> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::UnknownTask(id.to_string()))
    }

    pub fn pause_all(&mut self) {
        for task in &mut self.tasks {
            task.enabled = false;
        }
    }

    /// Re-enable every task, including ones disabled by a failure. Their
    /// recorded error is cleared as [`enable`](Self::enable) does.
    pub fn resume_all(&mut self) {
        for task in &mut self.tasks {
            task.enabled = true;
            task.last_error = None;
        }
    }

    fn start(&mut self) {
        self.running = true;
        self.timer.reset();
        log::info!("Frame scheduler started at {} fps", self.target_fps);
    }

    fn stop(&mut self) {
        self.running = false;
        log::info!("Frame scheduler stopped");
    }

    /// Run one frame at host timestamp `now`. A stopped scheduler does nothing.
    pub fn tick(&mut self, now: Instant) -> FrameReport {
        if !self.running {
            return FrameReport::default();
        }

        let delta = self.timer.tick(now);
        let delta_ms = delta.as_secs_f64() * 1000.0;
        let elapsed_ms = self.timer.elapsed().as_secs_f64() * 1000.0;
        let under_load = delta.as_secs_f64() > self.target_interval() * self.config.load_factor;

        let mut report = FrameReport { delta, ..Default::default() };
        let max_skips = self.config.max_consecutive_skips;

        for task in self.tasks.iter_mut() {
            if !task.enabled || !task.due(now) {
                continue;
            }

            if under_load && task.priority == TaskPriority::Low && task.consecutive_skips < max_skips {
                task.consecutive_skips += 1;
                report.skipped += 1;
                continue;
            }

            task.last_run_at = Some(now);
            let callback = &mut task.callback;
            let failure = match catch_unwind(AssertUnwindSafe(|| callback(delta_ms, elapsed_ms))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };

            match failure {
                None => {
                    task.run_count += 1;
                    task.consecutive_skips = 0;
                    report.ran += 1;
                }
                Some(message) => {
                    log::error!("Frame task '{}' failed and was disabled: {}", task.id, message);
                    task.enabled = false;
                    task.last_error = Some(message);
                    report.failed += 1;
                }
            }
        }

        self.skipped_runs += report.skipped as u64;
        self.adapt();
        report
    }

    /// Step the target rate from the rolling average once the window is full
    fn adapt(&mut self) {
        if !self.timer.window_full() {
            return;
        }
        let Some(average) = self.timer.average_delta() else {
            return;
        };

        let average = average.as_secs_f64();
        let interval = self.target_interval();
        let previous = self.target_fps;

        if average > interval * self.config.load_factor {
            self.target_fps = previous.saturating_sub(self.config.fps_step).max(self.config.min_fps);
        } else if average < interval * self.config.recover_factor {
            self.target_fps = (previous + self.config.fps_step).min(self.fps_ceiling);
        }

        if self.target_fps != previous {
            log::debug!("Adaptive target fps {} -> {}", previous, self.target_fps);
        }
    }

    fn target_interval(&self) -> f64 {
        1.0 / self.target_fps.max(1) as f64
    }

    /// Cap the adaptive target. Clamped to the configured range.
    pub fn set_fps_ceiling(&mut self, fps: u32) {
        let max_fps = self.config.max_fps.max(self.config.min_fps);
        self.fps_ceiling = fps.clamp(self.config.min_fps, max_fps);
        self.target_fps = self.target_fps.min(self.fps_ceiling);
    }

    /// Register a hook for [`cleanup`](Self::cleanup)
    pub fn on_cleanup(&mut self, teardown: impl FnOnce() -> Result<()> + Send + 'static) {
        self.teardowns.push(Box::new(teardown));
    }

    /// Stop, drop every task and run teardown hooks.
    ///
    /// Hook failures are logged and do not stop the remaining hooks. Returns
    /// the number of hooks that failed.
    pub fn cleanup(&mut self) -> usize {
        self.stop();
        self.tasks.clear();
        self.timer.reset();

        let mut failures = 0;
        for teardown in self.teardowns.drain(..) {
            let error = match catch_unwind(AssertUnwindSafe(teardown)) {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => Error::Cleanup(e.to_string()),
                Err(panic) => Error::Cleanup(panic_message(panic.as_ref())),
            };
            log::error!("{}", error);
            failures += 1;
        }
        failures
    }

    // --- Introspection ---

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn fps(&self) -> f32 {
        self.timer.fps()
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    pub fn task_info(&self, id: &str) -> Option<TaskInfo> {
        self.tasks.iter().find(|t| t.id == id).map(FrameTask::info)
    }

    /// Every task, in execution order
    pub fn tasks(&self) -> Vec<TaskInfo> {
        self.tasks.iter().map(FrameTask::info).collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        let disabled_tasks = self.tasks.iter().filter(|t| !t.enabled).count();
        PerformanceMetrics {
            fps: self.timer.fps(),
            average_frame_ms: self
                .timer
                .average_delta()
                .map_or(0.0, |d| d.as_secs_f32() * 1000.0),
            target_fps: self.target_fps,
            frame_count: self.timer.frame_count(),
            skipped_runs: self.skipped_runs,
            active_tasks: self.tasks.len() - disabled_tasks,
            disabled_tasks,
        }
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const FRAME_60HZ: Duration = Duration::from_nanos(16_666_667);

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(f64, f64) -> Result<()> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move |_, _| {
            inner.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    #[test]
    fn test_add_starts_remove_stops() {
        let mut scheduler = FrameScheduler::default();
        assert!(!scheduler.is_running());

        scheduler.add_task("a", TaskPriority::High, None, |_, _| Ok(()));
        assert!(scheduler.is_running());
        scheduler.add_task("b", TaskPriority::Low, None, |_, _| Ok(()));

        assert!(scheduler.remove_task("a"));
        assert!(scheduler.is_running());
        assert!(scheduler.remove_task("b"));
        assert!(!scheduler.is_running());
        assert!(!scheduler.remove_task("b"));
    }

    #[test]
    fn test_priority_execution_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut scheduler = FrameScheduler::default();

        for (id, priority) in [
            ("low", TaskPriority::Low),
            ("high", TaskPriority::High),
            ("medium", TaskPriority::Medium),
            ("high2", TaskPriority::High),
        ] {
            let sink = Arc::clone(&order);
            scheduler.add_task(id, priority, None, move |_, _| {
                sink.lock().unwrap().push(id);
                Ok(())
            });
        }

        scheduler.tick(Instant::now());
        assert_eq!(*order.lock().unwrap(), vec!["high", "high2", "medium", "low"]);
    }

    #[test]
    fn test_target_fps_throttle_over_120_ticks() {
        let runs = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&runs);
        let mut scheduler = FrameScheduler::default();
        scheduler.add_task("half_rate", TaskPriority::Medium, Some(30), move |_, elapsed| {
            sink.lock().unwrap().push(elapsed);
            Ok(())
        });

        let start = Instant::now();
        for frame in 0..120u32 {
            scheduler.tick(start + FRAME_60HZ * frame);
        }

        let runs = runs.lock().unwrap();
        assert_eq!(runs.len(), 60);
        for pair in runs.windows(2) {
            assert!(pair[1] - pair[0] >= 33.3, "ran {}ms apart", pair[1] - pair[0]);
        }
    }

    #[test]
    fn test_failing_task_disabled_not_removed() {
        let (count, ok_task) = counter();
        let mut scheduler = FrameScheduler::default();
        scheduler.add_task("broken", TaskPriority::High, None, |_, _| Err(Error::task("boom")));
        scheduler.add_task("panicky", TaskPriority::High, None, |_, _| panic!("bad frame"));
        scheduler.add_task("fine", TaskPriority::Low, None, ok_task);

        let start = Instant::now();
        let report = scheduler.tick(start);
        assert_eq!(report.failed, 2);
        assert_eq!(report.ran, 1);

        scheduler.tick(start + FRAME_60HZ);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        let broken = scheduler.task_info("broken").unwrap();
        assert!(!broken.enabled);
        assert_eq!(broken.last_error.as_deref(), Some("Task error: boom"));
        let panicky = scheduler.task_info("panicky").unwrap();
        assert!(panicky.last_error.unwrap().contains("bad frame"));
        assert_eq!(scheduler.task_count(), 3);
        assert_eq!(scheduler.performance_metrics().disabled_tasks, 2);
    }

    #[test]
    fn test_enable_disable_unknown() {
        let mut scheduler = FrameScheduler::default();
        assert!(matches!(scheduler.enable("nope"), Err(Error::UnknownTask(_))));

        let (count, task) = counter();
        scheduler.add_task("t", TaskPriority::Medium, None, task);
        scheduler.disable("t").unwrap();
        let start = Instant::now();
        scheduler.tick(start);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        scheduler.enable("t").unwrap();
        scheduler.tick(start + FRAME_60HZ);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_low_priority_skipped_under_load() {
        let (low_count, low) = counter();
        let (high_count, high) = counter();
        let mut scheduler = FrameScheduler::default();
        scheduler.add_task("low", TaskPriority::Low, None, low);
        scheduler.add_task("high", TaskPriority::High, None, high);

        let start = Instant::now();
        scheduler.tick(start);
        let slow = Duration::from_millis(40);
        let mut now = start;
        for _ in 0..4 {
            now += slow;
            scheduler.tick(now);
        }

        // 3 skips allowed, then forced run
        assert_eq!(high_count.load(Ordering::SeqCst), 5);
        assert_eq!(low_count.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.task_info("low").unwrap().consecutive_skips, 0);
        assert_eq!(scheduler.performance_metrics().skipped_runs, 3);
    }

    #[test]
    fn test_adaptive_target_lowers_and_recovers() {
        let config = SchedulerConfig { window_size: 10, ..Default::default() };
        let mut scheduler = FrameScheduler::new(config);
        scheduler.add_task("t", TaskPriority::High, None, |_, _| Ok(()));

        let start = Instant::now();
        let mut now = start;
        scheduler.tick(now);
        for _ in 0..10 {
            now += Duration::from_millis(60);
            scheduler.tick(now);
        }
        assert_eq!(scheduler.target_fps(), 55);

        for _ in 0..100 {
            now += Duration::from_millis(60);
            scheduler.tick(now);
        }
        assert_eq!(scheduler.target_fps(), 30);

        for _ in 0..200 {
            now += Duration::from_millis(5);
            scheduler.tick(now);
        }
        assert_eq!(scheduler.target_fps(), 60);
    }

    #[test]
    fn test_fps_ceiling() {
        let mut scheduler = FrameScheduler::default();
        scheduler.set_fps_ceiling(45);
        assert_eq!(scheduler.target_fps(), 45);
        scheduler.set_fps_ceiling(10);
        assert_eq!(scheduler.target_fps(), 30);
    }

    #[test]
    fn test_pause_resume() {
        let (count, task) = counter();
        let mut scheduler = FrameScheduler::default();
        scheduler.add_task("t", TaskPriority::Medium, None, task);

        let start = Instant::now();
        scheduler.pause_all();
        scheduler.tick(start);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_running());

        scheduler.resume_all();
        scheduler.tick(start + FRAME_60HZ);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resume_clears_failure() {
        let mut scheduler = FrameScheduler::default();
        scheduler.add_task("broken", TaskPriority::High, None, |_, _| Err(Error::task("boom")));

        let start = Instant::now();
        scheduler.tick(start);
        assert!(scheduler.task_info("broken").unwrap().last_error.is_some());

        scheduler.resume_all();
        let info = scheduler.task_info("broken").unwrap();
        assert!(info.enabled);
        assert!(info.last_error.is_none());
        assert_eq!(scheduler.performance_metrics().disabled_tasks, 0);
    }

    #[test]
    fn test_cleanup_runs_all_teardowns() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut scheduler = FrameScheduler::default();
        scheduler.add_task("t", TaskPriority::Medium, None, |_, _| Ok(()));

        let first = Arc::clone(&ran);
        scheduler.on_cleanup(move || {
            first.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        scheduler.on_cleanup(|| Err(Error::Cleanup("socket already closed".into())));
        scheduler.on_cleanup(|| panic!("teardown bug"));
        let last = Arc::clone(&ran);
        scheduler.on_cleanup(move || {
            last.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(scheduler.cleanup(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.task_count(), 0);
        assert_eq!(scheduler.cleanup(), 0);
    }
}
