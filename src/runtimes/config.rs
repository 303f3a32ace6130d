//! Per-invocation configuration.
//!
//! Callers address a thread (a named state lineage) through
//! [`RunConfig::configurable`]: `thread_id` selects the lineage,
//! `checkpoint_ns` partitions it (defaulting to the empty namespace), and
//! `checkpoint_id` pins a specific saved point instead of the latest.

use serde::{Deserialize, Serialize};

/// The addressable part of a run config.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configurable {
    /// Thread (state lineage) identifier. Checkpointing is active only when
    /// this is set and the app has a store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    /// Checkpoint namespace within the thread; empty by default.
    #[serde(default)]
    pub checkpoint_ns: String,
    /// Pin a specific checkpoint instead of the latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

/// Configuration for one `invoke`/`stream` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub configurable: Configurable,
    /// Per-call override of the superstep limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursion_limit: Option<usize>,
}

impl RunConfig {
    /// Default superstep limit.
    pub const DEFAULT_RECURSION_LIMIT: usize = 25;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Config addressing the given thread.
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.configurable.thread_id = Some(thread_id.into());
        self
    }

    #[must_use]
    pub fn with_checkpoint_ns(mut self, ns: impl Into<String>) -> Self {
        self.configurable.checkpoint_ns = ns.into();
        self
    }

    #[must_use]
    pub fn with_checkpoint_id(mut self, id: impl Into<String>) -> Self {
        self.configurable.checkpoint_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = Some(limit);
        self
    }

    #[must_use]
    pub fn thread_id(&self) -> Option<&str> {
        self.configurable.thread_id.as_deref()
    }

    #[must_use]
    pub fn checkpoint_ns(&self) -> &str {
        &self.configurable.checkpoint_ns
    }

    #[must_use]
    pub fn checkpoint_id(&self) -> Option<&str> {
        self.configurable.checkpoint_id.as_deref()
    }

    /// Effective superstep limit for this call.
    #[must_use]
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit.unwrap_or(Self::DEFAULT_RECURSION_LIMIT)
    }

    /// Same thread and namespace, pointing at a new checkpoint id.
    #[must_use]
    pub(crate) fn child(&self, checkpoint_id: String) -> RunConfig {
        RunConfig {
            configurable: Configurable {
                thread_id: self.configurable.thread_id.clone(),
                checkpoint_ns: self.configurable.checkpoint_ns.clone(),
                checkpoint_id: Some(checkpoint_id),
            },
            recursion_limit: self.recursion_limit,
        }
    }
}
