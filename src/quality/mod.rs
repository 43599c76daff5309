//! Quality levels and the sampling controller that moves between them

pub mod level;
pub mod controller;

pub use level::{QualityLevel, QualitySettings, QualityTable};
pub use controller::{QualityChange, QualityConfig, QualityController, SubscriptionId};
