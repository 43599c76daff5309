//! Asset loading: descriptors, sources, retrying fetches and the pipeline

pub mod descriptor;
pub mod progress;
pub mod source;
pub mod fetch;
pub mod pipeline;
pub mod mock;

pub use descriptor::{AssetDescriptor, AssetKind, AssetPriority, AssetVariants, LoadCondition};
pub use progress::{LoadingProgress, ObserverId, ProgressCallback, ProgressObservers};
pub use source::{AssetSource, BoxFuture, FetchError, FileSource, StaticSource};
#[cfg(feature = "http")]
pub use source::HttpSource;
pub use fetch::{fetch_asset, FetchOutcome, FetchPlan, Fetched};
pub use pipeline::{AssetFetchPipeline, LoadReport, LoadedAsset, LoadingStrategy};
