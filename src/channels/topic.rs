//! Multi-value collecting channel.

use serde_json::Value;

use super::{Channel, ChannelCheckpoint, ChannelError};

/// Collects multiple values per step, flattening one level of nested arrays
/// on ingest.
///
/// Non-accumulating topics (the default) clear at the start of each update
/// cycle; accumulating topics keep collecting across supersteps. Reading an
/// empty topic is an error.
#[derive(Clone, Debug, PartialEq)]
pub struct Topic {
    key: String,
    accumulate: bool,
    values: Vec<Value>,
}

impl Topic {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_accumulate(key, false)
    }

    #[must_use]
    pub fn with_accumulate(key: impl Into<String>, accumulate: bool) -> Self {
        Self {
            key: key.into(),
            accumulate,
            values: Vec::new(),
        }
    }

    /// Restore from a [`ChannelCheckpoint::Topic`].
    pub fn from_checkpoint(cp: &ChannelCheckpoint) -> Result<Self, ChannelError> {
        match cp {
            ChannelCheckpoint::Topic {
                key,
                accumulate,
                values,
            } => Ok(Self {
                key: key.clone(),
                accumulate: *accumulate,
                values: values.clone(),
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
    pub fn accumulate(&self) -> bool {
        self.accumulate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Channel for Topic {
    fn get(&self) -> Result<Value, ChannelError> {
        if self.values.is_empty() {
            return Err(ChannelError::Empty {
                key: self.key.clone(),
            });
        }
        Ok(Value::Array(self.values.clone()))
    }

    fn update(&mut self, writes: Vec<Value>) -> Result<bool, ChannelError> {
        if !self.accumulate {
            let had_values = !self.values.is_empty();
            self.values.clear();
            if writes.is_empty() {
                return Ok(had_values);
            }
        } else if writes.is_empty() {
            return Ok(false);
        }
        for write in writes {
            match write {
                Value::Array(items) => self.values.extend(items),
                other => self.values.push(other),
            }
        }
        Ok(true)
    }

    fn is_available(&self) -> bool {
        !self.values.is_empty()
    }

    fn checkpoint(&self) -> ChannelCheckpoint {
        ChannelCheckpoint::Topic {
            key: self.key.clone(),
            accumulate: self.accumulate,
            values: self.values.clone(),
        }
    }

    fn boxed_clone(&self) -> Box<dyn Channel> {
        Box::new(self.clone())
    }
}
