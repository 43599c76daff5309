//! Clocks and frame timing utilities

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::core::types::lock;

/// Source of the current time.
///
/// Components that age resources read time through this trait so hosts and
/// tests can drive time explicitly.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for headless hosts and tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Instant>>,
}

impl ManualClock {
    /// Create a clock frozen at the current instant
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a clock frozen at `start`
    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }
}

/// FPS statistics for a time window
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FpsWindow {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

/// Rolling FPS statistics over multiple time windows
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FpsStats {
    pub one_sec: FpsWindow,
    pub five_sec: FpsWindow,
    pub current_fps: f32,
    pub frame_count: u64,
}

/// Tracks frame timing from host-provided timestamps.
///
/// Keeps a fixed-size window of recent deltas for the rolling average used by
/// adaptive rate control, plus a time-bounded history for windowed FPS stats.
pub struct FrameTimer {
    started: Option<Instant>,
    last_frame: Option<Instant>,
    delta: Duration,
    frame_count: u64,
    /// Most recent deltas, newest last
    window: VecDeque<Duration>,
    window_size: usize,
    /// (timestamp, frame_time_secs) for windowed stats
    frame_history: VecDeque<(Instant, f32)>,
}

impl FrameTimer {
    /// How far back windowed stats look
    const HISTORY_SPAN: Duration = Duration::from_secs(5);

    /// Create a new frame timer averaging over `window_size` frames
    pub fn new(window_size: usize) -> Self {
        Self {
            started: None,
            last_frame: None,
            delta: Duration::ZERO,
            frame_count: 0,
            window: VecDeque::with_capacity(window_size),
            window_size: window_size.max(1),
            frame_history: VecDeque::new(),
        }
    }

    /// Record a frame at `now` and return the delta since the previous one.
    ///
    /// The first frame after construction or [`reset`](Self::reset) has a zero delta.
    pub fn tick(&mut self, now: Instant) -> Duration {
        self.delta = match self.last_frame {
            Some(last) => now.saturating_duration_since(last),
            None => {
                self.started = Some(now);
                Duration::ZERO
            }
        };
        self.last_frame = Some(now);
        self.frame_count += 1;

        if self.frame_count > 1 {
            if self.window.len() == self.window_size {
                self.window.pop_front();
            }
            self.window.push_back(self.delta);
            self.frame_history.push_back((now, self.delta.as_secs_f32()));
        }

        // Prune frames older than the history span
        while let Some(&(timestamp, _)) = self.frame_history.front() {
            if now.saturating_duration_since(timestamp) > Self::HISTORY_SPAN {
                self.frame_history.pop_front();
            } else {
                break;
            }
        }

        self.delta
    }

    /// Forget all recorded frames
    pub fn reset(&mut self) {
        self.started = None;
        self.last_frame = None;
        self.delta = Duration::ZERO;
        self.frame_count = 0;
        self.window.clear();
        self.frame_history.clear();
    }

    /// Delta of the most recent frame
    pub fn delta(&self) -> Duration {
        self.delta
    }

    /// Time since the first recorded frame
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.last_frame) {
            (Some(start), Some(last)) => last.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    /// Total recorded frames
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether the rolling window holds `window_size` deltas
    pub fn window_full(&self) -> bool {
        self.window.len() == self.window_size
    }

    /// Average delta over the rolling window
    pub fn average_delta(&self) -> Option<Duration> {
        if self.window.is_empty() {
            return None;
        }
        let total: Duration = self.window.iter().sum();
        Some(total / self.window.len() as u32)
    }

    /// FPS implied by the rolling average (0 until two frames were seen)
    pub fn fps(&self) -> f32 {
        match self.average_delta() {
            Some(avg) if !avg.is_zero() => 1.0 / avg.as_secs_f32(),
            _ => 0.0,
        }
    }

    /// Rolling FPS statistics over 1s and 5s windows ending at the last frame
    pub fn fps_stats(&self) -> FpsStats {
        let Some(now) = self.last_frame else {
            return FpsStats::default();
        };

        FpsStats {
            one_sec: self.compute_window_stats(now, Duration::from_secs(1)),
            five_sec: self.compute_window_stats(now, Duration::from_secs(5)),
            current_fps: self.fps(),
            frame_count: self.frame_count,
        }
    }

    fn compute_window_stats(&self, now: Instant, window: Duration) -> FpsWindow {
        let mut frame_count = 0;
        let mut total_time = 0.0f32;
        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;

        for &(timestamp, frame_time) in self.frame_history.iter() {
            if now.saturating_duration_since(timestamp) <= window {
                frame_count += 1;
                total_time += frame_time;

                let fps = if frame_time > 0.0 { 1.0 / frame_time } else { 0.0 };
                min_fps = min_fps.min(fps);
                max_fps = max_fps.max(fps);
            }
        }

        if frame_count == 0 {
            return FpsWindow::default();
        }

        FpsWindow {
            avg: if total_time > 0.0 { frame_count as f32 / total_time } else { 0.0 },
            min: min_fps,
            max: max_fps,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(3));
        assert_eq!(clock.now() - start, Duration::from_secs(3));

        // Clones share the same time source
        let other = clock.clone();
        other.advance(Duration::from_secs(1));
        assert_eq!(clock.now() - start, Duration::from_secs(4));
    }

    #[test]
    fn test_first_tick_zero_delta() {
        let mut timer = FrameTimer::new(4);
        let t0 = Instant::now();
        assert_eq!(timer.tick(t0), Duration::ZERO);
        assert_eq!(timer.tick(t0 + Duration::from_millis(16)), Duration::from_millis(16));
        assert_eq!(timer.frame_count(), 2);
        assert_eq!(timer.elapsed(), Duration::from_millis(16));
    }

    #[test]
    fn test_window_rolls() {
        let mut timer = FrameTimer::new(3);
        let t0 = Instant::now();
        let mut t = t0;
        timer.tick(t);
        for ms in [10, 10, 10, 40] {
            t += Duration::from_millis(ms);
            timer.tick(t);
        }
        assert!(timer.window_full());
        // Window holds 10, 10, 40
        assert_eq!(timer.average_delta(), Some(Duration::from_millis(20)));
        assert!((timer.fps() - 50.0).abs() < 0.5);
    }

    #[test]
    fn test_fps_stats_window() {
        let mut timer = FrameTimer::new(60);
        let t0 = Instant::now();
        for i in 0..=120u64 {
            timer.tick(t0 + Duration::from_micros(i * 16_667));
        }
        let stats = timer.fps_stats();
        assert!((stats.one_sec.avg - 60.0).abs() < 1.0);
        assert!((stats.current_fps - 60.0).abs() < 1.0);
        assert_eq!(stats.frame_count, 121);
    }

    #[test]
    fn test_reset() {
        let mut timer = FrameTimer::new(2);
        let t0 = Instant::now();
        timer.tick(t0);
        timer.tick(t0 + Duration::from_millis(5));
        timer.reset();
        assert_eq!(timer.frame_count(), 0);
        assert_eq!(timer.average_delta(), None);
        assert_eq!(timer.fps(), 0.0);
    }
}
