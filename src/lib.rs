//! Assetflow - budgeted asset loading and frame scheduling runtime

pub mod core;
pub mod resource;
pub mod loading;
pub mod frame;
pub mod quality;
pub mod runtime;

pub use runtime::{FrameSummary, RuntimeContext};
