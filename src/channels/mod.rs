//! Per-field storage disciplines and their checkpoint format.
//!
//! A [`Channel`] holds one state field's value between supersteps and
//! defines how a batch of pending writes for one step lands in it:
//!
//! - [`LastValue`]: single slot, at most one write per step;
//! - [`OperatorAggregate`]: folds writes through a binary operator,
//!   accumulating across supersteps;
//! - [`Ephemeral`]: last-value that clears itself on steps with no writes;
//! - [`Topic`]: collects many values, optionally accumulating across steps.
//!
//! Every channel serializes to a [`ChannelCheckpoint`] and restores to an
//! equal channel, flags included. The empty slot is encoded explicitly as
//! [`Slot::Missing`] so a stored `null` stays distinguishable from absence.

mod aggregate;
mod ephemeral;
mod errors;
mod last_value;
mod topic;

pub use aggregate::OperatorAggregate;
pub use ephemeral::Ephemeral;
pub use errors::ChannelError;
pub use last_value::LastValue;
pub use topic::Topic;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Storage discipline for one state field.
///
/// `update` takes the pending writes for one superstep and reports whether
/// the channel changed.
pub trait Channel: Send + Sync {
    /// Read the current value. Reading an empty channel is an error.
    fn get(&self) -> Result<Value, ChannelError>;

    /// Apply one superstep's pending writes. Returns whether anything
    /// changed.
    fn update(&mut self, writes: Vec<Value>) -> Result<bool, ChannelError>;

    /// Whether the channel currently holds a readable value.
    fn is_available(&self) -> bool;

    /// Serialize the channel (value and flags) for persistence.
    fn checkpoint(&self) -> ChannelCheckpoint;

    /// Clone into a boxed trait object.
    fn boxed_clone(&self) -> Box<dyn Channel>;
}

impl Clone for Box<dyn Channel> {
    fn clone(&self) -> Self {
        self.boxed_clone()
    }
}

/// Explicit empty-or-present marker used in checkpoints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "slot", content = "value", rename_all = "snake_case")]
pub enum Slot {
    /// The channel held no value.
    Missing,
    /// The channel held this value (which may legitimately be `null`).
    Present(Value),
}

impl Slot {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Slot::Missing)
    }

    #[must_use]
    pub fn into_option(self) -> Option<Value> {
        match self {
            Slot::Missing => None,
            Slot::Present(v) => Some(v),
        }
    }
}

impl From<Option<Value>> for Slot {
    fn from(value: Option<Value>) -> Self {
        match value {
            None => Slot::Missing,
            Some(v) => Slot::Present(v),
        }
    }
}

/// Persisted form of a channel, preserving kind, key, flags, and contents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ChannelCheckpoint {
    LastValue {
        key: String,
        slot: Slot,
    },
    OperatorAggregate {
        key: String,
        slot: Slot,
    },
    Ephemeral {
        key: String,
        guard: bool,
        slot: Slot,
    },
    Topic {
        key: String,
        accumulate: bool,
        values: Vec<Value>,
    },
}

impl ChannelCheckpoint {
    /// Restore the checkpointed channel.
    ///
    /// [`OperatorAggregate`] cannot be rebuilt from data alone (its
    /// operator is code), so restoring one goes through
    /// [`OperatorAggregate::from_checkpoint`] instead; here it is a
    /// [`ChannelError::Restore`].
    pub fn restore(&self) -> Result<Box<dyn Channel>, ChannelError> {
        match self {
            ChannelCheckpoint::LastValue { .. } => {
                Ok(Box::new(LastValue::from_checkpoint(self)?))
            }
            ChannelCheckpoint::Ephemeral { .. } => {
                Ok(Box::new(Ephemeral::from_checkpoint(self)?))
            }
            ChannelCheckpoint::Topic { .. } => Ok(Box::new(Topic::from_checkpoint(self)?)),
            ChannelCheckpoint::OperatorAggregate { key, .. } => {
                Err(ChannelError::Restore { key: key.clone() })
            }
        }
    }

    /// The field key this checkpoint belongs to.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            ChannelCheckpoint::LastValue { key, .. }
            | ChannelCheckpoint::OperatorAggregate { key, .. }
            | ChannelCheckpoint::Ephemeral { key, .. }
            | ChannelCheckpoint::Topic { key, .. } => key,
        }
    }
}
