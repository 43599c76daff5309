//! Priority-phased asset fetch pipeline
//!
//! A run drains the queue in two phases. `Critical` and `High` assets load one
//! at a time, in priority order. `Medium` and `Low` assets then load
//! concurrently, with in-flight fetches capped by the connection class (and by
//! the active quality settings). Every delivered payload is registered with
//! the shared [`ResourceTracker`](crate::resource::ResourceTracker), whose
//! eviction releases it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::descriptor::{AssetDescriptor, AssetKind};
use super::fetch::{fetch_asset, FetchOutcome, FetchPlan, Fetched};
use super::progress::{LoadingProgress, ObserverId, ProgressCallback, ProgressObservers};
use super::source::AssetSource;
use crate::core::environment::{ConnectionClass, EnvironmentProbe};
use crate::core::types::lock;
use crate::quality::QualitySettings;
use crate::resource::{Disposer, ResourceInfo, SharedTracker};

/// Fetch policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadingStrategy {
    /// Concurrent background fetches on a slow connection
    pub slow_concurrency: usize,
    pub medium_concurrency: usize,
    pub fast_concurrency: usize,
    /// Delay before the first retry in milliseconds; doubles per retry
    pub backoff_base_ms: u64,
}

impl Default for LoadingStrategy {
    fn default() -> Self {
        Self {
            slow_concurrency: 2,
            medium_concurrency: 4,
            fast_concurrency: 6,
            backoff_base_ms: 1000,
        }
    }
}

impl LoadingStrategy {
    pub fn concurrency_for(&self, class: ConnectionClass) -> usize {
        match class {
            ConnectionClass::Slow => self.slow_concurrency,
            ConnectionClass::Medium => self.medium_concurrency,
            ConnectionClass::Fast => self.fast_concurrency,
        }
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

/// A delivered asset. The payload is dropped when the tracker evicts it or
/// the pipeline is cleaned up.
#[derive(Debug)]
pub struct LoadedAsset {
    pub id: String,
    pub kind: AssetKind,
    /// URL the payload actually came from
    pub url: String,
    /// Bytes charged to the budget
    pub size_bytes: u64,
    pub from_fallback: bool,
    payload: Mutex<Option<Arc<[u8]>>>,
}

impl LoadedAsset {
    fn new(desc: &AssetDescriptor, fetched: Fetched, size_bytes: u64) -> Self {
        Self {
            id: desc.id.clone(),
            kind: desc.kind,
            url: fetched.url,
            size_bytes,
            from_fallback: fetched.from_fallback,
            payload: Mutex::new(Some(Arc::from(fetched.bytes))),
        }
    }

    /// Payload bytes, or `None` once released
    pub fn bytes(&self) -> Option<Arc<[u8]>> {
        lock(&self.payload).clone()
    }

    pub fn is_released(&self) -> bool {
        lock(&self.payload).is_none()
    }

    /// Drop the payload. Returns false if it was already released.
    pub fn release(&self) -> bool {
        lock(&self.payload).take().is_some()
    }
}

/// Outcome of [`AssetFetchPipeline::run`]
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Assets delivered by this run
    pub assets: HashMap<String, Arc<LoadedAsset>>,
    /// Progress after the run
    pub progress: LoadingProgress,
}

/// Per-run bookkeeping
struct LoadSession {
    started: Instant,
    class: ConnectionClass,
    delivered: HashMap<String, Arc<LoadedAsset>>,
    tasks: JoinSet<(String, FetchOutcome)>,
    in_flight: HashMap<String, AssetDescriptor>,
}

/// Fetches queued assets and hands them to the resource tracker
pub struct AssetFetchPipeline {
    strategy: LoadingStrategy,
    source: Arc<dyn AssetSource>,
    probe: Arc<dyn EnvironmentProbe>,
    tracker: SharedTracker,
    queue: Vec<AssetDescriptor>,
    assets: HashMap<String, Arc<LoadedAsset>>,
    /// Ids whose primary URL exhausted its retries; never refetched
    failed: HashSet<String>,
    progress: LoadingProgress,
    observers: ProgressObservers,
    /// Background concurrency cap imposed by quality settings
    fetch_limit: Option<usize>,
    /// Best variant quality settings allow
    variant_ceiling: ConnectionClass,
    started: Option<Instant>,
}

impl AssetFetchPipeline {
    pub fn new(
        strategy: LoadingStrategy,
        source: Arc<dyn AssetSource>,
        probe: Arc<dyn EnvironmentProbe>,
        tracker: SharedTracker,
    ) -> Self {
        Self {
            strategy,
            source,
            probe,
            tracker,
            queue: Vec::new(),
            assets: HashMap::new(),
            failed: HashSet::new(),
            progress: LoadingProgress::default(),
            observers: ProgressObservers::new(),
            fetch_limit: None,
            variant_ceiling: ConnectionClass::Fast,
            started: None,
        }
    }

    /// Queue an asset for the next [`run`](Self::run)
    pub fn enqueue(&mut self, desc: AssetDescriptor) {
        log::debug!("Queued '{}' ({:?}, {} bytes)", desc.id, desc.priority, desc.size_bytes);
        self.progress.total_count += 1;
        self.progress.bytes_total = self.progress.bytes_total.saturating_add(desc.size_bytes);
        self.queue.push(desc);
    }

    pub fn enqueue_all(&mut self, descs: impl IntoIterator<Item = AssetDescriptor>) {
        for desc in descs {
            self.enqueue(desc);
        }
    }

    /// Assets waiting for the next run
    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    /// Load everything queued. Individual failures never abort the run.
    pub async fn run(&mut self) -> LoadReport {
        self.prune_released();
        let mut queue = std::mem::take(&mut self.queue);
        queue.sort_by(|a, b| b.priority.cmp(&a.priority));

        let probed = self.probe.connection_class();
        let concurrency = self.concurrency(probed);
        let mut session = LoadSession {
            started: *self.started.get_or_insert_with(Instant::now),
            class: probed.min(self.variant_ceiling),
            delivered: HashMap::new(),
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
        };

        log::info!(
            "Loading {} assets via {} source ({:?} connection, {} concurrent)",
            queue.len(),
            self.source.name(),
            probed,
            concurrency
        );

        let (blocking, background): (Vec<_>, Vec<_>) =
            queue.into_iter().partition(|desc| desc.priority.is_blocking());

        for desc in blocking {
            if !self.admit(&desc, &session) {
                continue;
            }
            let plan = self.plan_for(&desc, session.class);
            let outcome = fetch_asset(Arc::clone(&self.source), plan).await;
            self.resolve(&desc, outcome, &mut session);
        }

        for desc in background {
            while session.tasks.len() >= concurrency {
                self.join_next(&mut session).await;
            }
            if !self.admit(&desc, &session) {
                continue;
            }

            let plan = self.plan_for(&desc, session.class);
            let source = Arc::clone(&self.source);
            let id = desc.id.clone();
            session.in_flight.insert(id.clone(), desc);
            session.tasks.spawn(async move {
                let outcome = fetch_asset(source, plan).await;
                (id, outcome)
            });
        }

        while !session.tasks.is_empty() {
            self.join_next(&mut session).await;
        }

        // Tasks that panicked never reported back
        let lost: Vec<String> = session.in_flight.drain().map(|(id, _)| id).collect();
        for id in lost {
            log::error!("Fetch task for '{}' ended without a result", id);
            self.failed.insert(id.clone());
            self.progress.failed_count += 1;
            self.progress.current_asset_id = Some(id);
            self.publish(session.started);
        }

        log::info!(
            "Loading finished: {} loaded, {} failed, {} skipped",
            self.progress.loaded_count,
            self.progress.failed_count,
            self.progress.skipped_count
        );

        LoadReport {
            assets: session.delivered,
            progress: self.progress.clone(),
        }
    }

    async fn join_next(&mut self, session: &mut LoadSession) {
        match session.tasks.join_next().await {
            Some(Ok((id, outcome))) => {
                if let Some(desc) = session.in_flight.remove(&id) {
                    self.resolve(&desc, outcome, session);
                }
            }
            Some(Err(e)) => log::error!("Fetch task panicked: {}", e),
            None => {}
        }
    }

    /// Decide whether `desc` is fetched; records a skip when it isn't
    fn admit(&mut self, desc: &AssetDescriptor, session: &LoadSession) -> bool {
        let reason = if self.failed.contains(&desc.id) {
            Some("previously failed")
        } else if self.has_asset(&desc.id) || session.in_flight.contains_key(&desc.id) {
            Some("already loaded")
        } else if !desc.condition_met() {
            Some("load condition not met")
        } else if !lock(&self.tracker).has_headroom(desc.size_bytes) {
            Some("no budget headroom")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                log::debug!("Skipping '{}': {}", desc.id, reason);
                self.progress.skipped_count += 1;
                self.progress.current_asset_id = Some(desc.id.clone());
                self.publish(session.started);
                false
            }
            None => true,
        }
    }

    fn resolve(&mut self, desc: &AssetDescriptor, outcome: FetchOutcome, session: &mut LoadSession) {
        if outcome.primary_failed {
            log::warn!(
                "'{}' failed after {} attempts{}",
                desc.id,
                outcome.attempts,
                if outcome.fallback_attempted { ", trying fallback" } else { "" }
            );
            self.failed.insert(desc.id.clone());
        }

        match outcome.result {
            Ok(fetched) => {
                let size = if desc.size_bytes > 0 {
                    desc.size_bytes
                } else {
                    fetched.bytes.len() as u64
                };
                let asset = Arc::new(LoadedAsset::new(desc, fetched, size));
                self.register(&asset);

                log::info!(
                    "Loaded '{}' from {} ({} bytes{})",
                    asset.id,
                    asset.url,
                    size,
                    if asset.from_fallback { ", fallback" } else { "" }
                );
                self.progress.loaded_count += 1;
                self.progress.bytes_loaded = self.progress.bytes_loaded.saturating_add(size);
                self.assets.insert(desc.id.clone(), Arc::clone(&asset));
                session.delivered.insert(desc.id.clone(), asset);
            }
            Err(e) => {
                log::error!("Failed to load '{}': {}", desc.id, e);
                self.progress.failed_count += 1;
            }
        }

        self.progress.current_asset_id = Some(desc.id.clone());
        self.publish(session.started);
    }

    /// Charge the asset to the tracker; eviction releases the payload
    fn register(&self, asset: &Arc<LoadedAsset>) {
        let weak = Arc::downgrade(asset);
        let disposer: Disposer = Box::new(move || {
            if let Some(asset) = weak.upgrade() {
                asset.release();
            }
        });
        let info = ResourceInfo::Measured {
            class: asset.kind.resource_class(),
            bytes: asset.size_bytes,
        };

        let evicted = lock(&self.tracker).track(asset.id.clone(), info, Some(disposer));
        if !evicted.is_empty() {
            log::warn!("Tracking '{}' evicted {} resources", asset.id, evicted.len());
        }
    }

    fn publish(&mut self, started: Instant) {
        self.progress.update_timing(started.elapsed());
        self.observers.notify(&self.progress);
    }

    fn plan_for(&self, desc: &AssetDescriptor, class: ConnectionClass) -> FetchPlan {
        FetchPlan {
            id: desc.id.clone(),
            url: desc.url_for(class).to_string(),
            fallback_url: desc.fallback_url.clone(),
            max_retries: desc.max_retries,
            timeout: (desc.timeout_ms > 0).then(|| Duration::from_millis(desc.timeout_ms as u64)),
            backoff_base: self.strategy.backoff_base(),
        }
    }

    fn concurrency(&self, class: ConnectionClass) -> usize {
        let cap = self.strategy.concurrency_for(class);
        self.fetch_limit.map_or(cap, |limit| cap.min(limit)).max(1)
    }

    /// Cap concurrency and variant quality for subsequent runs
    pub fn apply_quality(&mut self, settings: &QualitySettings) {
        self.fetch_limit = Some(settings.max_concurrent_fetches);
        self.variant_ceiling = settings.max_variant;
        log::debug!(
            "Pipeline limits: {} concurrent, variants up to {:?}",
            settings.max_concurrent_fetches,
            settings.max_variant
        );
    }

    // --- Queries ---

    /// Delivered asset whose payload is still resident
    pub fn get_asset(&self, id: &str) -> Option<Arc<LoadedAsset>> {
        self.assets
            .get(id)
            .filter(|asset| !asset.is_released())
            .cloned()
    }

    pub fn has_asset(&self, id: &str) -> bool {
        self.assets.get(id).is_some_and(|asset| !asset.is_released())
    }

    /// Delivered assets still held, released ones included until the next run
    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    /// Forget assets whose payload was evicted or released
    fn prune_released(&mut self) {
        let before = self.assets.len();
        self.assets.retain(|_, asset| !asset.is_released());
        let pruned = before - self.assets.len();
        if pruned > 0 {
            log::debug!("Pruned {} released assets", pruned);
        }
    }

    /// Whether `id` was marked permanently failed
    pub fn is_failed(&self, id: &str) -> bool {
        self.failed.contains(id)
    }

    /// Assets that reached a terminal failure this session
    pub fn failed_count(&self) -> usize {
        self.progress.failed_count
    }

    pub fn progress(&self) -> &LoadingProgress {
        &self.progress
    }

    pub fn tracker(&self) -> &SharedTracker {
        &self.tracker
    }

    /// Observe progress after every asset resolution
    pub fn on_progress(&mut self, callback: impl Fn(&LoadingProgress) + Send + Sync + 'static) -> ObserverId {
        let callback: ProgressCallback = Box::new(callback);
        self.observers.add(callback)
    }

    pub fn remove_progress_observer(&mut self, id: ObserverId) -> bool {
        self.observers.remove(id)
    }

    /// Release every delivered asset and reset all state. Observers stay registered.
    pub fn cleanup(&mut self) {
        let released = self.assets.len();
        {
            let mut tracker = lock(&self.tracker);
            for (id, asset) in self.assets.drain() {
                tracker.dispose(&id);
                asset.release();
            }
        }
        self.queue.clear();
        self.failed.clear();
        self.progress = LoadingProgress::default();
        self.started = None;
        log::info!("Asset pipeline cleaned up ({} assets released)", released);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::environment::StaticProbe;
    use crate::core::time::SystemClock;
    use crate::loading::descriptor::{AssetPriority, AssetVariants};
    use crate::loading::mock::MockSource;
    use crate::resource::{ClassShares, ResourceBudget, ResourceTracker, TrackerConfig};

    const MB: u64 = 1024 * 1024;

    fn tracker(total: u64) -> SharedTracker {
        let budget = ResourceBudget::new(total, &ClassShares::default());
        Arc::new(Mutex::new(ResourceTracker::new(
            budget,
            TrackerConfig::default(),
            Arc::new(SystemClock),
        )))
    }

    fn pipeline(source: &Arc<MockSource>, class: ConnectionClass, total: u64) -> AssetFetchPipeline {
        AssetFetchPipeline::new(
            LoadingStrategy::default(),
            source.clone(),
            Arc::new(StaticProbe::new(class, total)),
            tracker(total),
        )
    }

    fn texture(id: &str, priority: AssetPriority) -> AssetDescriptor {
        AssetDescriptor::new(id, format!("{}.png", id), AssetKind::Texture, 1024).with_priority(priority)
    }

    fn serve_all(ids: &[&str]) -> MockSource {
        ids.iter().fold(MockSource::new(), |source, id| {
            source.serve(format!("{}.png", id), vec![0u8; 16])
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_phase_first() {
        let source = Arc::new(
            serve_all(&["low", "medium", "high", "critical"]).with_delay(Duration::from_millis(10)),
        );
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 64 * MB);
        pipeline.enqueue(texture("low", AssetPriority::Low));
        pipeline.enqueue(texture("medium", AssetPriority::Medium));
        pipeline.enqueue(texture("high", AssetPriority::High));
        pipeline.enqueue(texture("critical", AssetPriority::Critical));

        let report = pipeline.run().await;
        assert_eq!(report.assets.len(), 4);

        let log = source.call_log();
        assert_eq!(&log[..2], &["critical.png".to_string(), "high.png".to_string()]);
        assert_eq!(report.progress.loaded_count, 4);
        assert_eq!(report.progress.total_count, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_cap_follows_connection() {
        let ids: Vec<String> = (0..10).map(|i| format!("bg{}", i)).collect();
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        for (class, cap) in [(ConnectionClass::Slow, 2), (ConnectionClass::Medium, 4), (ConnectionClass::Fast, 6)] {
            let source = Arc::new(serve_all(&refs).with_delay(Duration::from_millis(50)));
            let mut pipeline = pipeline(&source, class, 64 * MB);
            for id in &refs {
                pipeline.enqueue(texture(id, AssetPriority::Low));
            }
            let report = pipeline.run().await;
            assert_eq!(report.progress.loaded_count, 10);
            assert_eq!(source.peak_in_flight(), cap, "{:?}", class);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quality_settings_cap_fetches_and_variants() {
        let source = Arc::new(
            MockSource::new()
                .serve("a_slow", vec![1u8])
                .serve("b_slow", vec![1u8])
                .serve("c_slow", vec![1u8])
                .with_delay(Duration::from_millis(20)),
        );
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 64 * MB);
        let settings = QualitySettings {
            max_concurrent_fetches: 1,
            max_variant: ConnectionClass::Slow,
            ..QualitySettings::default()
        };
        pipeline.apply_quality(&settings);

        for id in ["a", "b", "c"] {
            let variants = AssetVariants {
                slow: format!("{}_slow", id),
                medium: format!("{}_medium", id),
                fast: format!("{}_fast", id),
            };
            pipeline.enqueue(texture(id, AssetPriority::Medium).with_variants(variants));
        }

        let report = pipeline.run().await;
        assert_eq!(report.progress.loaded_count, 3);
        assert_eq!(source.peak_in_flight(), 1);
        assert_eq!(source.calls("a_fast"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_then_fallback() {
        let source = Arc::new(MockSource::new().fail("bad.png").serve("backup.png", vec![5u8; 8]));
        let mut pipeline = pipeline(&source, ConnectionClass::Medium, 64 * MB);
        pipeline.enqueue(
            AssetDescriptor::new("bad", "bad.png", AssetKind::Texture, 0)
                .with_priority(AssetPriority::Critical)
                .with_fallback("backup.png"),
        );

        let report = pipeline.run().await;
        assert_eq!(source.calls("bad.png"), 3);
        assert_eq!(source.calls("backup.png"), 1);

        let asset = pipeline.get_asset("bad").unwrap();
        assert!(asset.from_fallback);
        assert_eq!(asset.size_bytes, 8);
        assert_eq!(report.progress.loaded_count, 1);
        assert!(pipeline.is_failed("bad"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fallback_leaves_asset_absent() {
        let source = Arc::new(MockSource::new().fail("bad.png").fail("backup.png"));
        let mut pipeline = pipeline(&source, ConnectionClass::Medium, 64 * MB);
        pipeline.enqueue(
            texture("bad", AssetPriority::Low)
                .with_max_retries(2)
                .with_fallback("backup.png"),
        );

        let report = pipeline.run().await;
        assert_eq!(source.calls("bad.png"), 3);
        assert_eq!(source.calls("backup.png"), 1);
        assert!(!report.assets.contains_key("bad"));
        assert!(!pipeline.has_asset("bad"));
        assert_eq!(pipeline.failed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_not_refetched() {
        let source = Arc::new(MockSource::new().fail("gone.png"));
        let mut pipeline = pipeline(&source, ConnectionClass::Medium, 64 * MB);
        pipeline.enqueue(texture("gone", AssetPriority::High));

        let report = pipeline.run().await;
        assert_eq!(report.progress.failed_count, 1);
        assert_eq!(pipeline.failed_count(), 1);
        assert_eq!(source.calls("gone.png"), 3);

        pipeline.enqueue(texture("gone", AssetPriority::High));
        let report = pipeline.run().await;
        assert_eq!(source.calls("gone.png"), 3);
        assert_eq!(report.progress.skipped_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_and_condition_gates() {
        let source = Arc::new(serve_all(&["big", "gated", "ok"]));
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 4096);
        pipeline.enqueue(
            AssetDescriptor::new("big", "big.png", AssetKind::Texture, 8192)
                .with_priority(AssetPriority::High),
        );
        pipeline.enqueue(texture("gated", AssetPriority::Low).with_condition(|| false));
        pipeline.enqueue(texture("ok", AssetPriority::Low));

        let report = pipeline.run().await;
        assert_eq!(report.progress.skipped_count, 2);
        assert_eq!(report.progress.loaded_count, 1);
        assert_eq!(source.calls("big.png"), 0);
        assert_eq!(source.calls("gated.png"), 0);
        assert!(pipeline.has_asset("ok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_observer() {
        let source = Arc::new(serve_all(&["a", "b", "c"]).with_delay(Duration::from_millis(100)));
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 64 * MB);
        let snapshots = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&snapshots);
        pipeline.on_progress(move |p| sink.lock().unwrap().push(p.clone()));

        for id in ["a", "b", "c"] {
            pipeline.enqueue(texture(id, AssetPriority::High));
        }
        pipeline.run().await;

        let snapshots = snapshots.lock().unwrap();
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].loaded_count, 1);
        // ~100ms / (1/3) - ~100ms
        assert!((195..=205).contains(&snapshots[0].estimated_ms_remaining));
        assert_eq!(snapshots[2].loaded_count, 3);
        assert_eq!(snapshots[2].bytes_loaded, 3 * 1024);
        assert_eq!(snapshots[2].estimated_ms_remaining, 0);
        assert_eq!(snapshots[2].current_asset_id.as_deref(), Some("c"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_releases_payload() {
        let source = Arc::new(serve_all(&["a"]));
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 64 * MB);
        pipeline.enqueue(texture("a", AssetPriority::Medium));
        let report = pipeline.run().await;

        let asset = Arc::clone(&report.assets["a"]);
        assert!(asset.bytes().is_some());
        assert!(lock(pipeline.tracker()).contains("a"));

        lock(pipeline.tracker()).dispose("a");
        assert!(asset.is_released());
        assert!(!pipeline.has_asset("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_assets_pruned_on_run() {
        let source = Arc::new(serve_all(&["a", "b"]));
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 64 * MB);
        pipeline.enqueue(texture("a", AssetPriority::Medium));
        pipeline.run().await;
        assert_eq!(pipeline.asset_count(), 1);

        lock(pipeline.tracker()).dispose("a");
        pipeline.enqueue(texture("b", AssetPriority::Medium));
        pipeline.run().await;

        assert_eq!(pipeline.asset_count(), 1);
        assert!(pipeline.has_asset("b"));
        assert!(pipeline.get_asset("a").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_resets() {
        let source = Arc::new(serve_all(&["a", "b"]).fail("c.png"));
        let mut pipeline = pipeline(&source, ConnectionClass::Fast, 64 * MB);
        for id in ["a", "b", "c"] {
            pipeline.enqueue(texture(id, AssetPriority::Low));
        }
        let report = pipeline.run().await;
        assert_eq!(pipeline.failed_count(), 1);

        pipeline.cleanup();
        assert!(report.assets.values().all(|asset| asset.is_released()));
        assert!(lock(pipeline.tracker()).is_empty());
        assert_eq!(*pipeline.progress(), LoadingProgress::default());
        assert_eq!(pipeline.failed_count(), 0);

        // Usable again after cleanup
        pipeline.enqueue(texture("a", AssetPriority::Low));
        let report = pipeline.run().await;
        assert_eq!(report.progress.loaded_count, 1);
        assert_eq!(report.progress.total_count, 1);
    }
}
