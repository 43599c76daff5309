//! Runtime context wiring the loader, tracker, scheduler and quality loop

use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::core::config::RuntimeConfig;
use crate::core::environment::EnvironmentProbe;
use crate::core::time::{Clock, SystemClock};
use crate::core::types::lock;
use crate::frame::{FrameReport, FrameScheduler, PerformanceMetrics};
use crate::loading::{AssetFetchPipeline, AssetSource, LoadReport};
use crate::quality::{QualityChange, QualityController, QualityLevel, QualitySettings};
use crate::resource::{MemoryStats, ResourceBudget, ResourceTracker, SharedTracker};

/// What one [`RuntimeContext::frame`] call did
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameSummary {
    pub tasks: FrameReport,
    /// Resources released by the periodic sweep this frame
    pub evicted: usize,
    /// Queued disposers run this frame
    pub disposed: usize,
    pub quality_change: Option<QualityChange>,
}

/// Owns every runtime component and drives them from the host's frame tick
pub struct RuntimeContext {
    config: RuntimeConfig,
    probe: Arc<dyn EnvironmentProbe>,
    tracker: SharedTracker,
    pipeline: AssetFetchPipeline,
    scheduler: FrameScheduler,
    quality: QualityController,
}

impl RuntimeContext {
    pub fn new(
        config: RuntimeConfig,
        probe: Arc<dyn EnvironmentProbe>,
        source: Arc<dyn AssetSource>,
    ) -> Self {
        Self::with_clock(config, probe, source, Arc::new(SystemClock))
    }

    /// Build with an explicit clock for the tracker's eviction timers
    pub fn with_clock(
        config: RuntimeConfig,
        probe: Arc<dyn EnvironmentProbe>,
        source: Arc<dyn AssetSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let budget = ResourceBudget::from_config(&config.budget, probe.memory_budget_hint());
        log::info!(
            "Runtime budget {} bytes, {:?} connection",
            budget.total_ceiling(),
            probe.connection_class()
        );

        let tracker: SharedTracker =
            Arc::new(Mutex::new(ResourceTracker::new(budget, config.tracker, clock)));
        let pipeline = AssetFetchPipeline::new(
            config.loading,
            source,
            Arc::clone(&probe),
            Arc::clone(&tracker),
        );

        let mut context = Self {
            scheduler: FrameScheduler::new(config.scheduler),
            quality: QualityController::new(config.quality),
            config,
            probe,
            tracker,
            pipeline,
        };
        context.apply_quality(QualityLevel::High);
        context
    }

    /// Run one cooperative frame at host timestamp `now`.
    ///
    /// Order: scheduled tasks, periodic eviction, disposal drain, quality
    /// sampling. A quality change is applied before this returns.
    pub fn frame(&mut self, now: Instant) -> FrameSummary {
        let tasks = self.scheduler.tick(now);

        let (evicted, disposed, quality_change) = {
            let mut tracker = lock(&self.tracker);
            let evicted = tracker.run_periodic().map_or(0, |ids| ids.len());
            let disposed = tracker.drain_disposals(self.config.tracker.max_disposals_per_frame);
            let change = self.quality.sample(
                now,
                &self.scheduler,
                &mut tracker,
                self.probe.heap_utilization(),
            );
            (evicted, disposed, change)
        };

        if let Some(change) = quality_change {
            self.apply_quality(change.to);
        }

        FrameSummary {
            tasks,
            evicted,
            disposed,
            quality_change,
        }
    }

    fn apply_quality(&mut self, level: QualityLevel) {
        let settings = *self.config.quality_table.get(level);
        self.pipeline.apply_quality(&settings);
        self.scheduler.set_fps_ceiling(settings.frame_rate_ceiling);
    }

    /// Load everything queued on the pipeline
    pub async fn load(&mut self) -> LoadReport {
        self.pipeline.run().await
    }

    // --- Components ---

    pub fn pipeline(&self) -> &AssetFetchPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut AssetFetchPipeline {
        &mut self.pipeline
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FrameScheduler {
        &mut self.scheduler
    }

    pub fn quality(&self) -> &QualityController {
        &self.quality
    }

    pub fn quality_mut(&mut self) -> &mut QualityController {
        &mut self.quality
    }

    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // --- Host-facing snapshots ---

    pub fn memory_stats(&self) -> MemoryStats {
        lock(&self.tracker).stats()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.scheduler.performance_metrics()
    }

    pub fn quality_level(&self) -> QualityLevel {
        self.quality.level()
    }

    /// Settings for the active quality level
    pub fn quality_settings(&self) -> QualitySettings {
        *self.config.quality_table.get(self.quality.level())
    }

    /// Release every asset, stop the scheduler and empty the tracker.
    ///
    /// Returns the number of teardown hooks that failed.
    pub fn cleanup(&mut self) -> usize {
        self.pipeline.cleanup();
        let failures = self.scheduler.cleanup();
        lock(&self.tracker).clear();
        self.quality.reset();
        self.apply_quality(QualityLevel::High);
        log::info!("Runtime cleaned up ({} teardown failures)", failures);
        failures
    }
}
