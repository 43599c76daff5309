//! Per-frame task scheduling with adaptive frame rate

pub mod task;
pub mod scheduler;

pub use task::{TaskCallback, TaskInfo, TaskPriority};
pub use scheduler::{FrameReport, FrameScheduler, PerformanceMetrics, SchedulerConfig, Teardown};
