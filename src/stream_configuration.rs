//! Configuration types for stages

use serde::{Deserialize, Serialize};

/// Default high-water mark, in values, of a stage's outgoing buffer
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

/// Per-stage configuration
///
/// Loadable from JSON; missing fields fall back to [`StageConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Number of pushed-but-not-forwarded values after which `push` returns `false`
    pub high_water_mark: usize,
    /// Maximum outstanding invocations for concurrent adapters
    pub concurrency: usize,
    /// Name used in log output
    pub label: Option<String>,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            concurrency: num_cpus::get(),
            label: None,
        }
    }
}

impl StageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_high_water_mark(mut self, high_water_mark: usize) -> Self {
        self.high_water_mark = high_water_mark.max(1);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label for log lines, `"stage"` when none was configured
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or("stage")
    }
}
