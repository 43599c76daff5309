//! Memory budget accounting per resource class
//!
//! Tracks bytes in use per [`ResourceClass`] against per-class and total
//! ceilings. Pure bookkeeping: no I/O and no eviction decisions beyond
//! reporting which ceiling is breached.

use serde::{Deserialize, Serialize};

use super::class::ResourceClass;

/// Fraction of the total ceiling each class may use.
///
/// Shares may sum to more than 1.0; the total ceiling is enforced separately.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassShares {
    pub geometry: f64,
    pub texture: f64,
    pub material: f64,
    pub mesh: f64,
    pub scene: f64,
    pub audio: f64,
}

impl ClassShares {
    pub fn get(&self, class: ResourceClass) -> f64 {
        match class {
            ResourceClass::Geometry => self.geometry,
            ResourceClass::Texture => self.texture,
            ResourceClass::Material => self.material,
            ResourceClass::Mesh => self.mesh,
            ResourceClass::Scene => self.scene,
            ResourceClass::Audio => self.audio,
        }
    }
}

impl Default for ClassShares {
    fn default() -> Self {
        Self {
            geometry: 0.30,
            texture: 0.60,
            material: 0.10,
            mesh: 0.10,
            scene: 0.10,
            audio: 0.10,
        }
    }
}

/// Budget configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Total ceiling in bytes. `None` defers to the environment's memory hint.
    pub total_bytes: Option<u64>,
    /// Per-class shares of the total
    pub shares: ClassShares,
}

/// Which ceiling a budget check found exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetBreach {
    Total { used: u64, ceiling: u64 },
    Class { class: ResourceClass, used: u64, ceiling: u64 },
}

/// Per-class memory budget
#[derive(Debug, Clone)]
pub struct ResourceBudget {
    /// Maximum bytes across all classes
    total_ceiling: u64,
    /// Maximum bytes per class, indexed by [`ResourceClass::index`]
    class_ceilings: [u64; ResourceClass::ALL.len()],
    /// Bytes in use per class
    class_used: [u64; ResourceClass::ALL.len()],
}

impl ResourceBudget {
    /// Create a budget with `total_bytes` split by `shares`
    pub fn new(total_bytes: u64, shares: &ClassShares) -> Self {
        let mut class_ceilings = [0u64; ResourceClass::ALL.len()];
        for class in ResourceClass::ALL {
            let share = shares.get(class).max(0.0);
            class_ceilings[class.index()] = (total_bytes as f64 * share).round() as u64;
        }

        Self {
            total_ceiling: total_bytes,
            class_ceilings,
            class_used: [0; ResourceClass::ALL.len()],
        }
    }

    /// Create a budget from config, using `hint` when no total is configured
    pub fn from_config(config: &BudgetConfig, hint: u64) -> Self {
        Self::new(config.total_bytes.unwrap_or(hint), &config.shares)
    }

    // --- Tracking methods ---

    /// Charge `bytes` to `class`
    pub fn add(&mut self, class: ResourceClass, bytes: u64) {
        let used = &mut self.class_used[class.index()];
        *used = used.saturating_add(bytes);
    }

    /// Release `bytes` from `class`, saturating at zero
    pub fn remove(&mut self, class: ResourceClass, bytes: u64) {
        let used = &mut self.class_used[class.index()];
        *used = used.saturating_sub(bytes);
    }

    /// Zero every bucket
    pub fn reset(&mut self) {
        self.class_used = [0; ResourceClass::ALL.len()];
    }

    // --- Query methods ---

    /// Bytes in use by `class`
    pub fn used(&self, class: ResourceClass) -> u64 {
        self.class_used[class.index()]
    }

    /// Bytes in use across all classes (always the sum of the buckets)
    pub fn total_used(&self) -> u64 {
        self.class_used.iter().fold(0u64, |acc, &b| acc.saturating_add(b))
    }

    pub fn ceiling(&self, class: ResourceClass) -> u64 {
        self.class_ceilings[class.index()]
    }

    pub fn total_ceiling(&self) -> u64 {
        self.total_ceiling
    }

    /// Bytes left under the total ceiling
    pub fn total_available(&self) -> u64 {
        self.total_ceiling.saturating_sub(self.total_used())
    }

    /// Whether `bytes` more would still fit under the total ceiling
    pub fn has_headroom(&self, bytes: u64) -> bool {
        self.total_available() >= bytes
    }

    /// Class usage over its ceiling (0.0 to 1.0+)
    pub fn pressure(&self, class: ResourceClass) -> f32 {
        ratio(self.used(class), self.ceiling(class))
    }

    /// Total usage over the total ceiling (0.0 to 1.0+)
    ///
    /// Values above 1.0 indicate over-budget.
    pub fn total_pressure(&self) -> f32 {
        ratio(self.total_used(), self.total_ceiling)
    }

    /// Class utilization clamped to 0.0..=1.0
    pub fn utilization(&self, class: ResourceClass) -> f32 {
        self.pressure(class).clamp(0.0, 1.0)
    }

    // --- Decision methods ---

    /// First exceeded ceiling, checking the total before the classes
    pub fn breach(&self) -> Option<BudgetBreach> {
        let total = self.total_used();
        if total > self.total_ceiling {
            return Some(BudgetBreach::Total {
                used: total,
                ceiling: self.total_ceiling,
            });
        }

        ResourceClass::ALL.into_iter().find_map(|class| {
            let used = self.used(class);
            let ceiling = self.ceiling(class);
            (used > ceiling).then_some(BudgetBreach::Class { class, used, ceiling })
        })
    }

    /// Whether any ceiling is exceeded
    pub fn is_exceeded(&self) -> bool {
        self.breach().is_some()
    }
}

fn ratio(used: u64, ceiling: u64) -> f32 {
    if ceiling == 0 {
        return if used == 0 { 0.0 } else { f32::INFINITY };
    }
    (used as f64 / ceiling as f64) as f32
}
