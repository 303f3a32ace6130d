//! Per-invocation event streaming.
//!
//! [`App::stream`](crate::app::App::stream) spawns the run on a background
//! task and hands back an [`EventStream`]. The channel between them is a
//! rendezvous (zero-capacity) channel, so execution only advances when the
//! consumer pulls the next event, a lazy sequence whose consumption drives
//! the run. Dropping the stream aborts the driver task; detaching it (by
//! calling [`EventStream::join`]) lets the run finish without a consumer.

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::Value;

use crate::errors::GraphError;
use crate::state::StateMap;

/// Which events `stream` yields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamMode {
    /// One copied state mapping after each superstep (and a final one).
    Values,
    /// One `{node -> update}` mapping per superstep.
    Updates,
    /// Raw event payloads for both of the above.
    Debug,
}

/// An event yielded by [`EventStream`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StreamEvent {
    Values {
        step: u64,
        values: StateMap,
    },
    Updates {
        step: u64,
        updates: FxHashMap<String, StateMap>,
    },
    Debug {
        payload: DebugPayload,
    },
}

/// Raw event dict carried by [`StreamEvent::Debug`].
#[derive(Clone, Debug, Serialize)]
pub struct DebugPayload {
    /// `"updates"` or `"values"`.
    pub event_type: String,
    pub step: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updates: Option<FxHashMap<String, StateMap>>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub extra: Value,
}

/// Sender half used by the runner; filters events by mode and goes quiet
/// once the consumer is gone.
pub(crate) struct StreamEmitter {
    tx: flume::Sender<StreamEvent>,
    mode: StreamMode,
    closed: bool,
}

impl StreamEmitter {
    pub(crate) fn new(tx: flume::Sender<StreamEvent>, mode: StreamMode) -> Self {
        Self {
            tx,
            mode,
            closed: false,
        }
    }

    pub(crate) async fn emit_updates(
        &mut self,
        step: u64,
        updates: FxHashMap<String, StateMap>,
    ) {
        match self.mode {
            StreamMode::Updates => self.send(StreamEvent::Updates { step, updates }).await,
            StreamMode::Debug => {
                self.send(StreamEvent::Debug {
                    payload: DebugPayload {
                        event_type: "updates".to_string(),
                        step,
                        state: None,
                        updates: Some(updates),
                        extra: Value::Null,
                    },
                })
                .await
            }
            StreamMode::Values => {}
        }
    }

    pub(crate) async fn emit_values(&mut self, step: u64, state: &StateMap) {
        match self.mode {
            StreamMode::Values => {
                self.send(StreamEvent::Values {
                    step,
                    values: state.clone(),
                })
                .await
            }
            StreamMode::Debug => {
                self.send(StreamEvent::Debug {
                    payload: DebugPayload {
                        event_type: "values".to_string(),
                        step,
                        state: Some(state.clone()),
                        updates: None,
                        extra: Value::Null,
                    },
                })
                .await
            }
            StreamMode::Updates => {}
        }
    }

    async fn send(&mut self, event: StreamEvent) {
        if self.closed {
            return;
        }
        if self.tx.send_async(event).await.is_err() {
            // Consumer hung up; keep running, stop emitting.
            self.closed = true;
        }
    }
}

/// Handle over a streaming run.
pub struct EventStream {
    rx: Option<flume::Receiver<StreamEvent>>,
    handle: Option<tokio::task::JoinHandle<Result<StateMap, GraphError>>>,
}

impl EventStream {
    pub(crate) fn new(
        rx: flume::Receiver<StreamEvent>,
        handle: tokio::task::JoinHandle<Result<StateMap, GraphError>>,
    ) -> Self {
        Self {
            rx: Some(rx),
            handle: Some(handle),
        }
    }

    /// Pull the next event; `None` once the run finished.
    pub async fn next(&mut self) -> Option<StreamEvent> {
        match &self.rx {
            Some(rx) => rx.recv_async().await.ok(),
            None => None,
        }
    }

    /// Adapt into a [`futures_util::Stream`] of events.
    pub fn into_stream(self) -> impl futures_util::Stream<Item = StreamEvent> {
        futures_util::stream::unfold(self, |mut stream| async move {
            stream.next().await.map(|event| (event, stream))
        })
    }

    /// Stop consuming events and wait for the run's final state.
    pub async fn join(mut self) -> Result<StateMap, GraphError> {
        // Dropping the receiver unblocks the producer; the run continues
        // without emitting.
        self.rx.take();
        let Some(handle) = self.handle.take() else {
            return Err(GraphError::Join {
                message: "stream already joined".to_string(),
            });
        };
        match handle.await {
            Ok(result) => result,
            Err(e) => Err(GraphError::Join {
                message: e.to_string(),
            }),
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
