//! Live resource tracking with budget enforcement and eviction
//!
//! Every registered resource is charged to the [`ResourceBudget`]. Two eviction
//! paths keep usage bounded:
//!
//! - **Emergency**: after a `track` that leaves any ceiling exceeded, the
//!   least recently used fraction of entries is disposed synchronously.
//! - **Periodic**: on a fixed interval, entries idle past the stale window
//!   *and* used fewer than `min_use_count` times are released from the budget
//!   and their disposers queued; [`drain_disposals`](ResourceTracker::drain_disposals)
//!   runs them a few per frame.

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::budget::ResourceBudget;
use super::class::{ResourceClass, ResourceInfo, SizeEstimates};
use crate::core::time::Clock;

/// Releases the native handle behind a tracked resource. Invoked exactly once.
pub type Disposer = Box<dyn FnOnce() + Send>;

/// Tracker configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// How often the periodic sweep runs (ms)
    pub periodic_interval_ms: u64,
    /// Idle time after which a rarely used resource is stale (ms)
    pub stale_after_ms: u64,
    /// Resources used at least this many times survive the periodic sweep
    pub min_use_count: u32,
    /// Fraction of tracked entries disposed by an emergency eviction
    pub emergency_fraction: f64,
    /// Queued disposers run per frame by the runtime
    pub max_disposals_per_frame: usize,
    /// Size estimates for unmeasured resources
    pub sizes: SizeEstimates,
}

impl TrackerConfig {
    pub fn periodic_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            periodic_interval_ms: 30_000,
            stale_after_ms: 5 * 60 * 1000,
            min_use_count: 5,
            emergency_fraction: 0.2,
            max_disposals_per_frame: 16,
            sizes: SizeEstimates::default(),
        }
    }
}

/// Bookkeeping for one live resource
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedResource {
    pub id: String,
    pub class: ResourceClass,
    pub estimated_bytes: u64,
    pub created_at: Instant,
    pub last_used_at: Instant,
    /// Number of `touch` calls since registration
    pub use_count: u32,
    /// Registration order, breaks `last_used_at` ties
    seq: u64,
}

struct Entry {
    resource: TrackedResource,
    disposer: Option<Disposer>,
}

/// Usage of a single class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassUsage {
    pub class: ResourceClass,
    pub used_bytes: u64,
    pub ceiling_bytes: u64,
    /// used / ceiling, clamped to 0.0..=1.0
    pub utilization: f32,
}

/// Snapshot returned by [`ResourceTracker::stats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_used_bytes: u64,
    pub total_ceiling_bytes: u64,
    /// used / ceiling, clamped to 0.0..=1.0
    pub total_utilization: f32,
    pub classes: Vec<ClassUsage>,
    pub tracked_count: usize,
    pub disposal_queue_depth: usize,
    pub evicted_total: u64,
    pub emergency_evictions: u64,
}

impl MemoryStats {
    pub fn class(&self, class: ResourceClass) -> Option<&ClassUsage> {
        self.classes.iter().find(|usage| usage.class == class)
    }
}

/// Registers live resources and keeps them within budget
pub struct ResourceTracker {
    config: TrackerConfig,
    budget: ResourceBudget,
    entries: HashMap<String, Entry>,
    clock: Arc<dyn Clock>,
    next_seq: u64,
    /// Disposers released from the budget but not yet run
    disposal_queue: VecDeque<(String, Disposer)>,
    last_periodic: Instant,
    evicted_total: u64,
    emergency_evictions: u64,
}

impl ResourceTracker {
    /// Create a tracker enforcing `budget`
    pub fn new(budget: ResourceBudget, config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        let last_periodic = clock.now();
        Self {
            config,
            budget,
            entries: HashMap::new(),
            clock,
            next_seq: 0,
            disposal_queue: VecDeque::new(),
            last_periodic,
            evicted_total: 0,
            emergency_evictions: 0,
        }
    }

    /// Register a resource and charge its estimated size to the budget.
    ///
    /// Re-tracking a known id disposes the previous entry first. If any
    /// ceiling is exceeded afterwards an emergency eviction runs before this
    /// returns; the ids it evicted are returned.
    pub fn track(
        &mut self,
        id: impl Into<String>,
        info: ResourceInfo,
        disposer: Option<Disposer>,
    ) -> Vec<String> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            log::debug!("Re-tracking '{}', disposing previous entry", id);
            self.dispose(&id);
        }

        let now = self.clock.now();
        let class = info.class();
        let estimated_bytes = info.estimated_bytes(&self.config.sizes);
        let resource = TrackedResource {
            id: id.clone(),
            class,
            estimated_bytes,
            created_at: now,
            last_used_at: now,
            use_count: 0,
            seq: self.next_seq,
        };
        self.next_seq += 1;

        self.budget.add(class, estimated_bytes);
        self.entries.insert(id.clone(), Entry { resource, disposer });
        log::trace!("Tracked {} '{}' ({} bytes)", class, id, estimated_bytes);

        match self.budget.breach() {
            Some(breach) => {
                log::warn!("Memory budget exceeded after tracking '{}': {:?}", id, breach);
                self.emergency_evict()
            }
            None => Vec::new(),
        }
    }

    /// Mark a resource as used now. Returns false for unknown ids.
    pub fn touch(&mut self, id: &str) -> bool {
        let now = self.clock.now();
        match self.entries.get_mut(id) {
            Some(entry) => {
                entry.resource.last_used_at = now;
                entry.resource.use_count = entry.resource.use_count.saturating_add(1);
                true
            }
            None => false,
        }
    }

    /// Stop tracking a resource, release its budget and run its disposer.
    ///
    /// Returns false if the id is not tracked; a second dispose of the same id
    /// is therefore a no-op.
    pub fn dispose(&mut self, id: &str) -> bool {
        match self.remove_entry(id) {
            Some((resource, disposer)) => {
                if let Some(disposer) = disposer {
                    run_disposer(&resource.id, disposer);
                }
                true
            }
            None => false,
        }
    }

    /// Dispose the least recently used `emergency_fraction` of entries (rounded up).
    pub fn emergency_evict(&mut self) -> Vec<String> {
        let count = self.emergency_count();
        if count == 0 {
            return Vec::new();
        }

        let victims = self.oldest_ids(count);
        self.emergency_evictions += 1;
        log::warn!(
            "Emergency eviction: disposing {} of {} tracked resources",
            victims.len(),
            self.entries.len()
        );

        for id in &victims {
            if let Some((resource, disposer)) = self.remove_entry(id) {
                log::debug!(
                    "Evicted {} '{}' ({} bytes, {} uses)",
                    resource.class,
                    resource.id,
                    resource.estimated_bytes,
                    resource.use_count
                );
                self.evicted_total += 1;
                if let Some(disposer) = disposer {
                    run_disposer(&resource.id, disposer);
                }
            }
        }

        victims
    }

    /// Number of entries an emergency eviction would dispose right now
    pub fn emergency_count(&self) -> usize {
        let fraction = self.config.emergency_fraction.clamp(0.0, 1.0);
        (self.entries.len() as f64 * fraction).ceil() as usize
    }

    /// Run the periodic sweep if its interval has elapsed.
    ///
    /// Returns the ids released, or `None` when the sweep was not due.
    pub fn run_periodic(&mut self) -> Option<Vec<String>> {
        let now = self.clock.now();
        if now.saturating_duration_since(self.last_periodic) < self.config.periodic_interval() {
            return None;
        }
        self.last_periodic = now;
        Some(self.evict_stale())
    }

    /// Release every entry idle past the stale window and used fewer than
    /// `min_use_count` times. Disposers are queued, not run.
    pub fn evict_stale(&mut self) -> Vec<String> {
        let now = self.clock.now();
        let stale_after = self.config.stale_after();
        let min_uses = self.config.min_use_count;

        let mut stale: Vec<(Instant, u64, String)> = self
            .entries
            .values()
            .map(|entry| &entry.resource)
            .filter(|r| {
                now.saturating_duration_since(r.last_used_at) > stale_after && r.use_count < min_uses
            })
            .map(|r| (r.last_used_at, r.seq, r.id.clone()))
            .collect();
        stale.sort();

        let ids: Vec<String> = stale.into_iter().map(|(_, _, id)| id).collect();
        for id in &ids {
            if let Some((resource, disposer)) = self.remove_entry(id) {
                self.evicted_total += 1;
                if let Some(disposer) = disposer {
                    self.disposal_queue.push_back((resource.id, disposer));
                }
            }
        }

        if !ids.is_empty() {
            log::info!(
                "Periodic eviction released {} stale resources ({} disposals queued)",
                ids.len(),
                self.disposal_queue.len()
            );
        }
        ids
    }

    /// Run up to `limit` queued disposers. Returns how many ran.
    pub fn drain_disposals(&mut self, limit: usize) -> usize {
        let mut ran = 0;
        while ran < limit {
            let Some((id, disposer)) = self.disposal_queue.pop_front() else {
                break;
            };
            run_disposer(&id, disposer);
            ran += 1;
        }
        ran
    }

    /// Dispose everything, including queued disposers, and zero the budget.
    pub fn clear(&mut self) {
        let ids: Vec<String> = self.entries.keys().cloned().collect();
        for id in ids {
            self.dispose(&id);
        }
        self.drain_disposals(usize::MAX);
        self.budget.reset();
        log::debug!("Resource tracker cleared");
    }

    // --- Query methods ---

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TrackedResource> {
        self.entries.get(id).map(|entry| &entry.resource)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn budget(&self) -> &ResourceBudget {
        &self.budget
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Whether `bytes` more would fit under the total ceiling
    pub fn has_headroom(&self, bytes: u64) -> bool {
        self.budget.has_headroom(bytes)
    }

    /// Total usage over the total ceiling, unclamped
    pub fn utilization(&self) -> f32 {
        self.budget.total_pressure()
    }

    pub fn disposal_queue_depth(&self) -> usize {
        self.disposal_queue.len()
    }

    /// Pure snapshot of usage and eviction counters
    pub fn stats(&self) -> MemoryStats {
        let classes = ResourceClass::ALL
            .into_iter()
            .map(|class| ClassUsage {
                class,
                used_bytes: self.budget.used(class),
                ceiling_bytes: self.budget.ceiling(class),
                utilization: self.budget.utilization(class),
            })
            .collect();

        MemoryStats {
            total_used_bytes: self.budget.total_used(),
            total_ceiling_bytes: self.budget.total_ceiling(),
            total_utilization: self.budget.total_pressure().clamp(0.0, 1.0),
            classes,
            tracked_count: self.entries.len(),
            disposal_queue_depth: self.disposal_queue.len(),
            evicted_total: self.evicted_total,
            emergency_evictions: self.emergency_evictions,
        }
    }

    /// `count` ids ordered oldest `last_used_at` first
    fn oldest_ids(&self, count: usize) -> Vec<String> {
        let mut order: Vec<(Instant, u64, &str)> = self
            .entries
            .values()
            .map(|entry| {
                let r = &entry.resource;
                (r.last_used_at, r.seq, r.id.as_str())
            })
            .collect();
        order.sort();
        order.into_iter().take(count).map(|(_, _, id)| id.to_string()).collect()
    }

    fn remove_entry(&mut self, id: &str) -> Option<(TrackedResource, Option<Disposer>)> {
        let entry = self.entries.remove(id)?;
        self.budget.remove(entry.resource.class, entry.resource.estimated_bytes);
        Some((entry.resource, entry.disposer))
    }
}

impl Drop for ResourceTracker {
    fn drop(&mut self) {
        if !self.entries.is_empty() || !self.disposal_queue.is_empty() {
            self.clear();
        }
    }
}

fn run_disposer(id: &str, disposer: Disposer) {
    if catch_unwind(AssertUnwindSafe(disposer)).is_err() {
        log::error!("Disposer for '{}' panicked", id);
    }
}
