//! Resource memory budgeting, tracking and eviction

pub mod class;
pub mod budget;
pub mod tracker;

pub use class::{ResourceClass, ResourceInfo, SizeEstimates};
pub use budget::{BudgetBreach, BudgetConfig, ClassShares, ResourceBudget};
pub use tracker::{
    ClassUsage, Disposer, MemoryStats, ResourceTracker, TrackedResource, TrackerConfig,
};

use std::sync::{Arc, Mutex};

/// Tracker shared between the fetch pipeline and the frame loop
pub type SharedTracker = Arc<Mutex<ResourceTracker>>;
