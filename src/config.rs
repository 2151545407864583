use serde::{Deserialize, Serialize};

/// Configuration for an [`Executor`](crate::Executor)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Free-form label attached to the executor's log events
    pub label: Option<String>,
    /// Upper bound on ticks a single `wait_all` may perform. `None` drains without limit;
    /// loaders that keep registering new loaders forever will then never finish.
    pub max_ticks: Option<usize>,
}

impl ExecutorConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: usize) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }
}
