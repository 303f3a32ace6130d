//! Single-slot channel with an at-most-one-write-per-step discipline.

use serde_json::Value;

use super::{Channel, ChannelCheckpoint, ChannelError, Slot};

/// Stores the last value written; rejects more than one write per step.
///
/// This is the discipline backing every schema field that declares no
/// reducer: two nodes writing the field in the same superstep is a conflict,
/// not a race.
#[derive(Clone, Debug, PartialEq)]
pub struct LastValue {
    key: String,
    slot: Option<Value>,
}

impl LastValue {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            slot: None,
        }
    }

    /// Restore from a [`ChannelCheckpoint::LastValue`].
    pub fn from_checkpoint(cp: &ChannelCheckpoint) -> Result<Self, ChannelError> {
        match cp {
            ChannelCheckpoint::LastValue { key, slot } => Ok(Self {
                key: key.clone(),
                slot: slot.clone().into_option(),
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

impl Channel for LastValue {
    fn get(&self) -> Result<Value, ChannelError> {
        self.slot.clone().ok_or_else(|| ChannelError::Empty {
            key: self.key.clone(),
        })
    }

    fn update(&mut self, mut writes: Vec<Value>) -> Result<bool, ChannelError> {
        match writes.len() {
            0 => Ok(false),
            1 => {
                self.slot = writes.pop();
                Ok(true)
            }
            _ => Err(ChannelError::InvalidUpdate {
                key: self.key.clone(),
            }),
        }
    }

    fn is_available(&self) -> bool {
        self.slot.is_some()
    }

    fn checkpoint(&self) -> ChannelCheckpoint {
        ChannelCheckpoint::LastValue {
            key: self.key.clone(),
            slot: self.slot.clone().into(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}
