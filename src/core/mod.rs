//! Core runtime types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod time;
pub mod environment;
pub mod config;

pub use types::*;
pub use error::Error;
pub use time::{Clock, FpsStats, FpsWindow, FrameTimer, ManualClock, SystemClock};
pub use environment::{ConnectionClass, EnvironmentProbe, StaticProbe};
pub use config::RuntimeConfig;
