//! Folding channel backed by a binary operator.

use std::sync::Arc;

use serde_json::Value;

use super::{Channel, ChannelCheckpoint, ChannelError, Slot};
use crate::reducers::Reducer;

/// Folds every write into a running accumulator via a binary operator.
///
/// The first write becomes the accumulator unless a seed was supplied; later
/// writes fold in order. The accumulator persists across supersteps.
#[derive(Clone)]
pub struct OperatorAggregate {
    key: String,
    operator: Arc<dyn Reducer>,
    acc: Option<Value>,
}

impl OperatorAggregate {
    #[must_use]
    pub fn new(key: impl Into<String>, operator: Arc<dyn Reducer>) -> Self {
        Self {
            key: key.into(),
            operator,
            acc: None,
        }
    }

    /// Start from a seed value instead of an empty accumulator.
    #[must_use]
    pub fn with_seed(key: impl Into<String>, operator: Arc<dyn Reducer>, seed: Value) -> Self {
        Self {
            key: key.into(),
            operator,
            acc: Some(seed),
        }
    }

    /// Restore from a [`ChannelCheckpoint::OperatorAggregate`], re-supplying
    /// the operator (operators are code; they never live in checkpoints).
    pub fn from_checkpoint(
        cp: &ChannelCheckpoint,
        operator: Arc<dyn Reducer>,
    ) -> Result<Self, ChannelError> {
        match cp {
            ChannelCheckpoint::OperatorAggregate { key, slot } => Ok(Self {
                key: key.clone(),
                operator,
                acc: slot.clone().into_option(),
            }),
            other => Err(ChannelError::Restore {
                key: other.key().to_string(),
            }),
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Channel for OperatorAggregate {
    fn get(&self) -> Result<Value, ChannelError> {
        self.acc.clone().ok_or_else(|| ChannelError::Empty {
            key: self.key.clone(),
        })
    }

    fn update(&mut self, writes: Vec<Value>) -> Result<bool, ChannelError> {
        if writes.is_empty() {
            return Ok(false);
        }
        for write in writes {
            self.acc = Some(match self.acc.take() {
                None => write,
                Some(current) => self
                    .operator
                    .merge(Some(current), write)
                    .map_err(|source| ChannelError::Operator {
                        key: self.key.clone(),
                        source,
                    })?,
            });
        }
        Ok(true)
    }

    fn is_available(&self) -> bool {
        self.acc.is_some()
    }

    fn checkpoint(&self) -> ChannelCheckpoint {
        ChannelCheckpoint::OperatorAggregate {
            key: self.key.clone(),
            slot: Slot::from(self.acc.clone()),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}
