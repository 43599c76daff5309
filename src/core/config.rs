//! Runtime configuration, loadable from JSON

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::frame::SchedulerConfig;
use crate::loading::LoadingStrategy;
use crate::quality::{QualityConfig, QualityTable};
use crate::resource::{BudgetConfig, TrackerConfig};

/// Configuration for every component of a [`RuntimeContext`](crate::runtime::RuntimeContext).
///
/// Missing fields fall back to their defaults, so a partial JSON file is valid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Memory ceilings
    pub budget: BudgetConfig,
    /// Eviction policy and size estimates
    pub tracker: TrackerConfig,
    /// Asset fetch policy
    pub loading: LoadingStrategy,
    /// Frame scheduling and adaptive rate
    pub scheduler: SchedulerConfig,
    /// Quality sampling thresholds
    pub quality: QualityConfig,
    /// Level -> concrete parameters
    pub quality_table: QualityTable,
}

impl RuntimeConfig {
    /// Save to file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<(), io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)
    }

    /// Load from file (sync)
    pub fn load_sync(path: &Path) -> Result<Self, io::Error> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self, io::Error> {
        serde_json::from_str(json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }
}
