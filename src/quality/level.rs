//! Quality levels and the parameters each one maps to

use serde::{Deserialize, Serialize};

use crate::core::environment::ConnectionClass;

/// Discrete quality tier. Ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Low,
    Medium,
    #[default]
    High,
}

impl QualityLevel {
    /// The more conservative of two levels
    pub fn stricter(self, other: Self) -> Self {
        self.min(other)
    }
}

/// Concrete rendering and loading parameters for one level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    /// Largest texture edge the renderer should upload
    pub max_texture_size: u32,
    /// Cap on concurrent background fetches
    pub max_concurrent_fetches: usize,
    /// Best asset variant to request
    pub max_variant: ConnectionClass,
    /// Ceiling for the scheduler's adaptive target
    pub frame_rate_ceiling: u32,
    pub shadows: bool,
    /// Added to LOD selection; higher means coarser
    pub lod_bias: f32,
}

impl QualitySettings {
    pub fn high() -> Self {
        Self {
            max_texture_size: 4096,
            max_concurrent_fetches: 6,
            max_variant: ConnectionClass::Fast,
            frame_rate_ceiling: 60,
            shadows: true,
            lod_bias: 0.0,
        }
    }

    pub fn medium() -> Self {
        Self {
            max_texture_size: 2048,
            max_concurrent_fetches: 4,
            max_variant: ConnectionClass::Medium,
            frame_rate_ceiling: 60,
            shadows: true,
            lod_bias: 1.0,
        }
    }

    pub fn low() -> Self {
        Self {
            max_texture_size: 1024,
            max_concurrent_fetches: 2,
            max_variant: ConnectionClass::Slow,
            frame_rate_ceiling: 30,
            shadows: false,
            lod_bias: 2.0,
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::high()
    }
}

/// Caller-owned mapping from level to settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityTable {
    pub high: QualitySettings,
    pub medium: QualitySettings,
    pub low: QualitySettings,
}

impl QualityTable {
    pub fn get(&self, level: QualityLevel) -> &QualitySettings {
        match level {
            QualityLevel::High => &self.high,
            QualityLevel::Medium => &self.medium,
            QualityLevel::Low => &self.low,
        }
    }
}

impl Default for QualityTable {
    fn default() -> Self {
        Self {
            high: QualitySettings::high(),
            medium: QualitySettings::medium(),
            low: QualitySettings::low(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stricter() {
        assert_eq!(QualityLevel::High.stricter(QualityLevel::Medium), QualityLevel::Medium);
        assert_eq!(QualityLevel::Low.stricter(QualityLevel::High), QualityLevel::Low);
        assert_eq!(QualityLevel::default(), QualityLevel::High);
    }

    #[test]
    fn test_table_lookup() {
        let table = QualityTable::default();
        assert_eq!(table.get(QualityLevel::Low).max_variant, ConnectionClass::Slow);
        assert!(!table.get(QualityLevel::Low).shadows);
        assert_eq!(table.get(QualityLevel::High).max_texture_size, 4096);
    }

    #[test]
    fn test_partial_table_json() {
        let table: QualityTable =
            serde_json::from_str(r#"{"low": {"max_texture_size": 512}}"#).unwrap();
        assert_eq!(table.low.max_texture_size, 512);
        // Missing fields of a given level come from the high defaults
        assert_eq!(table.low.max_concurrent_fetches, 6);
        assert_eq!(table.medium, QualitySettings::medium());
    }
}
