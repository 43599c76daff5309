//! Asset descriptors: what to fetch, from where, and how hard to try

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::environment::ConnectionClass;
use crate::resource::ResourceClass;

/// Kind of asset being fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Texture,
    Model,
    Audio,
    Font,
}

impl AssetKind {
    /// Budget bucket a delivered asset of this kind is charged to
    pub fn resource_class(self) -> ResourceClass {
        match self {
            AssetKind::Texture | AssetKind::Font => ResourceClass::Texture,
            AssetKind::Model => ResourceClass::Geometry,
            AssetKind::Audio => ResourceClass::Audio,
        }
    }
}

/// Load priority. `Critical` and `High` load sequentially before anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl AssetPriority {
    fn rank(self) -> u8 {
        match self {
            AssetPriority::Critical => 3,
            AssetPriority::High => 2,
            AssetPriority::Medium => 1,
            AssetPriority::Low => 0,
        }
    }

    /// Whether this priority loads in the sequential phase
    pub fn is_blocking(self) -> bool {
        matches!(self, AssetPriority::Critical | AssetPriority::High)
    }
}

// Higher priority compares greater
impl Ord for AssetPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl PartialOrd for AssetPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Alternate-quality URLs for the same logical asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetVariants {
    pub slow: String,
    pub medium: String,
    pub fast: String,
}

impl AssetVariants {
    pub fn for_connection(&self, class: ConnectionClass) -> &str {
        match class {
            ConnectionClass::Slow => &self.slow,
            ConnectionClass::Medium => &self.medium,
            ConnectionClass::Fast => &self.fast,
        }
    }
}

/// Caller-supplied gate evaluated right before an asset is fetched
pub type LoadCondition = Arc<dyn Fn() -> bool + Send + Sync>;

/// Everything the pipeline needs to fetch one asset. Immutable once enqueued.
#[derive(Clone)]
pub struct AssetDescriptor {
    pub id: String,
    pub url: String,
    pub kind: AssetKind,
    /// Declared size, charged to the budget on delivery
    pub size_bytes: u64,
    pub priority: AssetPriority,
    pub variants: Option<AssetVariants>,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Per-attempt timeout; 0 disables it
    pub timeout_ms: u32,
    pub fallback_url: Option<String>,
    pub load_condition: Option<LoadCondition>,
}

impl AssetDescriptor {
    pub const DEFAULT_MAX_RETRIES: u32 = 2;
    pub const DEFAULT_TIMEOUT_MS: u32 = 30_000;

    /// Medium-priority descriptor with default retry and timeout policy
    pub fn new(id: impl Into<String>, url: impl Into<String>, kind: AssetKind, size_bytes: u64) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            kind,
            size_bytes,
            priority: AssetPriority::Medium,
            variants: None,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            timeout_ms: Self::DEFAULT_TIMEOUT_MS,
            fallback_url: None,
            load_condition: None,
        }
    }

    pub fn with_priority(mut self, priority: AssetPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_variants(mut self, variants: AssetVariants) -> Self {
        self.variants = Some(variants);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.load_condition = Some(Arc::new(condition));
        self
    }

    /// URL to fetch on a connection of class `class`
    pub fn url_for(&self, class: ConnectionClass) -> &str {
        match &self.variants {
            Some(variants) => variants.for_connection(class),
            None => &self.url,
        }
    }

    /// Evaluate the caller's load condition (true when none is set)
    pub fn condition_met(&self) -> bool {
        self.load_condition.as_ref().is_none_or(|condition| condition())
    }
}

impl fmt::Debug for AssetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetDescriptor")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("size_bytes", &self.size_bytes)
            .field("priority", &self.priority)
            .field("variants", &self.variants)
            .field("max_retries", &self.max_retries)
            .field("timeout_ms", &self.timeout_ms)
            .field("fallback_url", &self.fallback_url)
            .field("load_condition", &self.load_condition.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
