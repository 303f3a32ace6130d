//! Self-clearing single-slot channel.

use serde_json::Value;

use super::{Channel, ChannelCheckpoint, ChannelError, Slot};

/// Last-value slot that empties itself on steps with no new writes.
///
/// With `guard` (the default), more than one write per step is a conflict,
/// exactly like [`LastValue`](super::LastValue). With `guard` off, the last
/// of several writes wins. An empty update clears a populated slot
/// (reporting a change) and is a no-op on an empty one.
#[derive(Clone, Debug, PartialEq)]
pub struct Ephemeral {
    key: String,
    guard: bool,
    slot: Option<Value>,
}

impl Ephemeral {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_guard(key, true)
    }

    #[must_use]
    pub fn with_guard(key: impl Into<String>, guard: bool) -> Self {
        Self {
            key: key.into(),
            guard,
            slot: None,
        }
    }

    /// Restore from a [`ChannelCheckpoint::Ephemeral`].
    pub fn from_checkpoint(cp: &ChannelCheckpoint) -> Result<Self, ChannelError> {
        match cp {
            ChannelCheckpoint::Ephemeral { key, guard, slot } => Ok(Self {
                key: key.clone(),
                guard: *guard,
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

    #[must_use]
    pub fn guard(&self) -> bool {
        self.guard
    }
}

impl Channel for Ephemeral {
    fn get(&self) -> Result<Value, ChannelError> {
        self.slot.clone().ok_or_else(|| ChannelError::Empty {
            key: self.key.clone(),
        })
    }

    fn update(&mut self, mut writes: Vec<Value>) -> Result<bool, ChannelError> {
        if writes.is_empty() {
            return Ok(self.slot.take().is_some());
        }
        if self.guard && writes.len() > 1 {
            return Err(ChannelError::InvalidUpdate {
                key: self.key.clone(),
            });
        }
        self.slot = writes.pop();
        Ok(true)
    }

    fn is_available(&self) -> bool {
        self.slot.is_some()
    }

    fn checkpoint(&self) -> ChannelCheckpoint {
        ChannelCheckpoint::Ephemeral {
            key: self.key.clone(),
            guard: self.guard,
            slot: Slot::from(self.slot.clone()),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}
