use serde::{Deserialize, Serialize};

/// What the filter compiler does with keys it does not recognize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Reject the filter.
    #[default]
    Strict,
    /// Skip the key.
    Lenient,
}

/// What auto-lookup does when a foreign key leads back to a table already
/// on the current join path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Emit the lookup but do not expand the referenced table again.
    #[default]
    Truncate,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub filter_mode: FilterMode,
    pub cycle_policy: CyclePolicy,
    /// Largest accepted auto-lookup depth.
    pub max_lookup_depth: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            filter_mode: FilterMode::Strict,
            cycle_policy: CyclePolicy::Truncate,
            max_lookup_depth: 8,
        }
    }
}
