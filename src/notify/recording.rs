//! In-memory broker for tests, enabled by the `test-util` feature.

use std::sync::{Arc, Mutex};

use crate::error::{NotifyError, NotifyResult};

use super::{Broker, BrokerConnection};

/// A message captured by [`RecordingBroker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: String,
}

#[derive(Debug, Default)]
struct Recording {
    messages: Vec<PublishedMessage>,
    connections: usize,
    closed: usize,
}

/// In-memory broker. Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct RecordingBroker {
    state: Arc<Mutex<Recording>>,
    unreachable: bool,
}

impl RecordingBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A broker whose every connection attempt fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.state
            .lock()
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Messages published on one topic.
    pub fn messages_on(&self, topic: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload)
            .collect()
    }

    /// Connections opened and connections closed so far.
    pub fn connection_counts(&self) -> (usize, usize) {
        self.state
            .lock()
            .map(|s| (s.connections, s.closed))
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.messages.clear();
        }
    }
}

impl Broker for RecordingBroker {
    fn connect(&self) -> NotifyResult<Box<dyn BrokerConnection>> {
        if self.unreachable {
            return Err(NotifyError::Connect {
                message: "recording broker configured as unreachable".into(),
            });
        }
        if let Ok(mut s) = self.state.lock() {
            s.connections += 1;
        }
        Ok(Box::new(RecordingConnection {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }
}

struct RecordingConnection {
    state: Arc<Mutex<Recording>>,
    open: bool,
}

impl BrokerConnection for RecordingConnection {
    fn publish(&mut self, topic: &str, payload: &str) -> NotifyResult<()> {
        if !self.open {
            return Err(NotifyError::Closed);
        }
        let mut state = self.state.lock().map_err(|_| NotifyError::Publish {
            topic: topic.to_string(),
            message: "recording mutex poisoned".into(),
        })?;
        state.messages.push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    fn close(&mut self) -> NotifyResult<()> {
        if !self.open {
            return Err(NotifyError::Closed);
        }
        self.open = false;
        if let Ok(mut s) = self.state.lock() {
            s.closed += 1;
        }
        Ok(())
    }
}
