//! Checkpoint store contract and the in-memory reference implementation.
//!
//! A checkpoint is a durable snapshot of one thread's state at a superstep
//! boundary: the channel values, per-channel versions, the versions each
//! node has seen, and the frontier planned next. Stores keep an append-only
//! log of checkpoints per `(thread, namespace)` plus optional pending writes
//! attached to individual checkpoints.
//!
//! [`InMemorySaver`] is the volatile reference implementation; persistent
//! backends implement [`CheckpointStore`] against the same contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use thiserror::Error;

use super::config::RunConfig;
use crate::state::StateMap;
use crate::utils::ids;

/// Reserved pending-write channel carrying interrupt payloads.
pub const INTERRUPT_CHANNEL: &str = "__interrupt__";

/// Reserved pending-write channel carrying resume values from commands.
pub const RESUME_CHANNEL: &str = "__resume__";

/// One persisted snapshot of a thread's execution state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique checkpoint id (UUIDv4; ordering comes from the store's log).
    pub id: String,
    /// Field values at the snapshot.
    pub channel_values: StateMap,
    /// Monotonic per-field versions.
    pub channel_versions: FxHashMap<String, u64>,
    /// Per-node view of channel versions when the node last ran.
    pub versions_seen: FxHashMap<String, FxHashMap<String, u64>>,
    /// Frontier planned for the next superstep, encoded node kinds.
    pub next_nodes: Vec<String>,
}

impl Checkpoint {
    /// New checkpoint with a fresh id.
    #[must_use]
    pub fn new(
        channel_values: StateMap,
        channel_versions: FxHashMap<String, u64>,
        versions_seen: FxHashMap<String, FxHashMap<String, u64>>,
        next_nodes: Vec<String>,
    ) -> Self {
        Self {
            id: ids::checkpoint_id(),
            channel_values,
            channel_versions,
            versions_seen,
            next_nodes,
        }
    }

    /// Same checkpoint under a caller-chosen id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Why a checkpoint was saved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// After initial state was built from input.
    Input,
    /// After a superstep completed.
    Loop,
    /// When an interrupt fired.
    Interrupt,
    /// After `update_state`.
    Update,
    /// After the graph terminated.
    Exit,
}

/// Metadata saved alongside each checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    pub source: CheckpointSource,
    /// Superstep counter at save time.
    pub step: u64,
    /// Parent lineage by namespace (empty for root threads).
    #[serde(default)]
    pub parents: FxHashMap<String, String>,
    /// Attribution of out-of-band writes (`update_state`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writes: Option<FxHashMap<String, StateMap>>,
}

impl CheckpointMetadata {
    #[must_use]
    pub fn new(source: CheckpointSource, step: u64) -> Self {
        Self {
            source,
            step,
            parents: FxHashMap::default(),
            writes: None,
        }
    }
}

/// A write recorded against a checkpoint before the next one exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    /// Task that produced the write (node name for interrupts).
    pub task_id: String,
    /// Target channel.
    pub channel: String,
    pub value: Value,
}

/// A checkpoint joined with its addressing config, metadata, parent link,
/// and pending writes.
#[derive(Clone, Debug)]
pub struct CheckpointTuple {
    /// Config addressing this checkpoint (thread, namespace, id).
    pub config: RunConfig,
    pub checkpoint: Checkpoint,
    pub metadata: CheckpointMetadata,
    /// Config of the parent checkpoint, if any.
    pub parent_config: Option<RunConfig>,
    pub pending_writes: Vec<PendingWrite>,
    pub created_at: DateTime<Utc>,
}

/// Errors from checkpoint store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// Backend storage failure (database, filesystem, lock poisoning).
    #[error("checkpoint store backend error: {message}")]
    #[diagnostic(code(graphloom::store::backend))]
    Backend { message: String },

    /// The operation requires a thread id in the config.
    #[error("config has no thread_id; checkpoint operations need one")]
    #[diagnostic(
        code(graphloom::store::missing_thread),
        help("Pass a config built with RunConfig::with_thread_id.")
    )]
    MissingThreadId,

    /// `put_writes` requires a config pointing at a saved checkpoint.
    #[error("config has no checkpoint_id; pending writes attach to a specific checkpoint")]
    #[diagnostic(code(graphloom::store::missing_checkpoint))]
    MissingCheckpointId,
}

/// Contract for persistent checkpoint storage.
///
/// Checkpoints for a `(thread, namespace)` pair are appended in save order;
/// `list` returns them newest-first. Implementations must serialise
/// concurrent writes to the same pair.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Fetch the tuple addressed by `config`: the checkpoint with the
    /// config's `checkpoint_id`, or the latest for the thread/namespace
    /// when no id is pinned.
    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>, StoreError>;

    /// List checkpoints for the thread/namespace, newest first.
    ///
    /// `filter` entries must each match the checkpoint's metadata (compared
    /// through its JSON form). `before` excludes the referenced checkpoint
    /// and everything after it in the log. `limit` truncates the result.
    async fn list(
        &self,
        config: &RunConfig,
        filter: Option<&FxHashMap<String, Value>>,
        before: Option<&RunConfig>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple>, StoreError>;

    /// Append a checkpoint; the parent link is taken from the
    /// `checkpoint_id` in `config`. Returns a config addressing the newly
    /// saved checkpoint.
    async fn put(
        &self,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: FxHashMap<String, u64>,
    ) -> Result<RunConfig, StoreError>;

    /// Attach `(channel, value)` writes for `task_id` to the checkpoint the
    /// config points at.
    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
    ) -> Result<(), StoreError>;

    /// Drop all checkpoints and pending writes for a thread, across
    /// namespaces.
    async fn delete_thread(&self, thread_id: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug)]
struct StoredCheckpoint {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    parent_id: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct SaverInner {
    /// Append-only logs keyed by `(thread, namespace)`.
    logs: FxHashMap<(String, String), Vec<StoredCheckpoint>>,
    /// Pending writes keyed by `(thread, namespace, checkpoint_id)`.
    writes: FxHashMap<(String, String, String), Vec<PendingWrite>>,
}

/// Volatile in-process checkpoint store.
///
/// The reference implementation of [`CheckpointStore`]: per-thread
/// append-only logs guarded by an `RwLock`. Suitable for tests and
/// single-process runs; nothing survives the process.
#[derive(Default)]
pub struct InMemorySaver {
    inner: RwLock<SaverInner>,
}

impl InMemorySaver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Thread ids with at least one checkpoint, in no particular order.
    pub fn list_threads(&self) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        let mut threads: Vec<String> = inner
            .logs
            .keys()
            .map(|(thread, _)| thread.clone())
            .collect();
        threads.sort();
        threads.dedup();
        Ok(threads)
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, SaverInner>, StoreError> {
        self.inner.read().map_err(|e| StoreError::Backend {
            message: format!("lock poisoned: {e}"),
        })
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, SaverInner>, StoreError> {
        self.inner.write().map_err(|e| StoreError::Backend {
            message: format!("lock poisoned: {e}"),
        })
    }

    fn tuple_from(
        &self,
        thread: &str,
        ns: &str,
        stored: &StoredCheckpoint,
        inner: &SaverInner,
    ) -> CheckpointTuple {
        let config = RunConfig::new()
            .with_thread_id(thread)
            .with_checkpoint_ns(ns)
            .with_checkpoint_id(stored.checkpoint.id.clone());
        let parent_config = stored.parent_id.as_ref().map(|id| {
            RunConfig::new()
                .with_thread_id(thread)
                .with_checkpoint_ns(ns)
                .with_checkpoint_id(id.clone())
        });
        let pending_writes = inner
            .writes
            .get(&(
                thread.to_string(),
                ns.to_string(),
                stored.checkpoint.id.clone(),
            ))
            .cloned()
            .unwrap_or_default();
        CheckpointTuple {
            config,
            checkpoint: stored.checkpoint.clone(),
            metadata: stored.metadata.clone(),
            parent_config,
            pending_writes,
            created_at: stored.created_at,
        }
    }
}

fn thread_of(config: &RunConfig) -> Result<String, StoreError> {
    config
        .thread_id()
        .map(str::to_string)
        .ok_or(StoreError::MissingThreadId)
}

/// True when every filter entry equals the corresponding metadata entry.
fn metadata_matches(metadata: &CheckpointMetadata, filter: &FxHashMap<String, Value>) -> bool {
    let encoded = match serde_json::to_value(metadata) {
        Ok(Value::Object(map)) => map,
        _ => return false,
    };
    filter
        .iter()
        .all(|(key, expected)| encoded.get(key) == Some(expected))
}

#[async_trait]
impl CheckpointStore for InMemorySaver {
    async fn get_tuple(&self, config: &RunConfig) -> Result<Option<CheckpointTuple>, StoreError> {
        let thread = thread_of(config)?;
        let ns = config.checkpoint_ns().to_string();
        let inner = self.read()?;
        let Some(log) = inner.logs.get(&(thread.clone(), ns.clone())) else {
            return Ok(None);
        };
        let stored = match config.checkpoint_id() {
            Some(id) => log.iter().find(|s| s.checkpoint.id == id),
            None => log.last(),
        };
        Ok(stored.map(|s| self.tuple_from(&thread, &ns, s, &inner)))
    }

    async fn list(
        &self,
        config: &RunConfig,
        filter: Option<&FxHashMap<String, Value>>,
        before: Option<&RunConfig>,
        limit: Option<usize>,
    ) -> Result<Vec<CheckpointTuple>, StoreError> {
        let thread = thread_of(config)?;
        let ns = config.checkpoint_ns().to_string();
        let inner = self.read()?;
        let Some(log) = inner.logs.get(&(thread.clone(), ns.clone())) else {
            return Ok(Vec::new());
        };

        // `before` is an exclusive upper bound in log (creation) order.
        let cutoff = before
            .and_then(|cfg| cfg.checkpoint_id())
            .and_then(|id| log.iter().position(|s| s.checkpoint.id == id))
            .unwrap_or(log.len());

        let mut tuples = Vec::new();
        for stored in log[..cutoff].iter().rev() {
            if let Some(filter) = filter
                && !metadata_matches(&stored.metadata, filter)
            {
                continue;
            }
            tuples.push(self.tuple_from(&thread, &ns, stored, &inner));
            if let Some(limit) = limit
                && tuples.len() >= limit
            {
                break;
            }
        }
        Ok(tuples)
    }

    async fn put(
        &self,
        config: &RunConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: FxHashMap<String, u64>,
    ) -> Result<RunConfig, StoreError> {
        let thread = thread_of(config)?;
        let ns = config.checkpoint_ns().to_string();
        tracing::trace!(
            thread = %thread,
            ns = %ns,
            checkpoint_id = %checkpoint.id,
            source = ?metadata.source,
            step = metadata.step,
            versions = new_versions.len(),
            "saving checkpoint"
        );
        let child = config.child(checkpoint.id.clone());
        let stored = StoredCheckpoint {
            checkpoint,
            metadata,
            parent_id: config.checkpoint_id().map(str::to_string),
            created_at: Utc::now(),
        };
        let mut inner = self.write()?;
        inner.logs.entry((thread, ns)).or_default().push(stored);
        Ok(child)
    }

    async fn put_writes(
        &self,
        config: &RunConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
    ) -> Result<(), StoreError> {
        let thread = thread_of(config)?;
        let ns = config.checkpoint_ns().to_string();
        let checkpoint_id = config
            .checkpoint_id()
            .ok_or(StoreError::MissingCheckpointId)?
            .to_string();
        let mut inner = self.write()?;
        let entry = inner
            .writes
            .entry((thread, ns, checkpoint_id))
            .or_default();
        for (channel, value) in writes {
            entry.push(PendingWrite {
                task_id: task_id.to_string(),
                channel,
                value,
            });
        }
        Ok(())
    }

    async fn delete_thread(&self, thread_id: &str) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        inner.logs.retain(|(thread, _), _| thread != thread_id);
        inner.writes.retain(|(thread, _, _), _| thread != thread_id);
        Ok(())
    }
}
