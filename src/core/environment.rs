//! Host environment capabilities (network quality, memory hints)

use serde::{Deserialize, Serialize};

/// Coarse network quality, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionClass {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl ConnectionClass {
    /// Classify an effective-connection-type string ("slow-2g", "2g", "3g", "4g").
    ///
    /// Unknown strings map to `Medium`.
    pub fn from_effective_type(effective_type: &str) -> Self {
        match effective_type {
            "slow-2g" | "2g" => Self::Slow,
            "4g" | "5g" | "wifi" | "ethernet" => Self::Fast,
            _ => Self::Medium,
        }
    }
}

/// Capabilities the runtime needs from its host.
pub trait EnvironmentProbe: Send + Sync {
    /// Current network quality
    fn connection_class(&self) -> ConnectionClass;

    /// Suggested total memory budget in bytes for tracked resources
    fn memory_budget_hint(&self) -> u64;

    /// Host heap usage as a fraction of its limit, when the host can measure it.
    fn heap_utilization(&self) -> Option<f32> {
        None
    }
}

/// Fixed answers, for headless hosts and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    pub connection: ConnectionClass,
    pub memory_budget: u64,
    pub heap_utilization: Option<f32>,
}

impl StaticProbe {
    /// 512 MiB budget on a medium connection
    pub const DEFAULT_BUDGET: u64 = 512 * 1024 * 1024;

    pub fn new(connection: ConnectionClass, memory_budget: u64) -> Self {
        Self {
            connection,
            memory_budget,
            heap_utilization: None,
        }
    }
}

impl Default for StaticProbe {
    fn default() -> Self {
        Self::new(ConnectionClass::Medium, Self::DEFAULT_BUDGET)
    }
}

impl EnvironmentProbe for StaticProbe {
    fn connection_class(&self) -> ConnectionClass {
        self.connection
    }

    fn memory_budget_hint(&self) -> u64 {
        self.memory_budget
    }

    fn heap_utilization(&self) -> Option<f32> {
        self.heap_utilization
    }
}
