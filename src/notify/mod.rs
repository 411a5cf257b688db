//! Best-effort completion events and search reindex requests.
//!
//! Everything here goes through the [`Broker`] trait: the AMQP implementation
//! talks to a real message broker, [`NullBroker`] only logs, and
//! `RecordingBroker` (feature `test-util`) keeps messages in memory. Nothing in this
//! module ever fails an ingest: callers get a [`NotificationOutcome`] or a
//! [`NotifyResult`] they turn into a warning.

#[cfg(feature = "amqp")]
pub mod amqp;
#[cfg(any(test, feature = "test-util"))]
mod recording;

use std::sync::Arc;

use crate::config::BrokerConfig;
use crate::error::NotifyResult;

#[cfg(feature = "amqp")]
pub use amqp::AmqpBroker;
#[cfg(any(test, feature = "test-util"))]
pub use recording::{PublishedMessage, RecordingBroker};

/// A message broker that hands out short-lived connections.
pub trait Broker: Send + Sync {
    fn connect(&self) -> NotifyResult<Box<dyn BrokerConnection>>;
}

/// One open broker connection.
pub trait BrokerConnection {
    fn publish(&mut self, topic: &str, payload: &str) -> NotifyResult<()>;
    fn close(&mut self) -> NotifyResult<()>;
}

/// Pick the broker the configuration asks for.
pub fn broker_from_config(config: &BrokerConfig) -> Arc<dyn Broker> {
    if !config.enabled {
        return Arc::new(NullBroker);
    }
    #[cfg(feature = "amqp")]
    {
        Arc::new(AmqpBroker::new(&config.url))
    }
    #[cfg(not(feature = "amqp"))]
    {
        tracing::warn!("broker enabled but built without the `amqp` feature; notifications will only be logged");
        Arc::new(NullBroker)
    }
}

// ---------------------------------------------------------------------------
// Completion events
// ---------------------------------------------------------------------------

fn event_payload(title: &str, content: &str, summary: &str) -> String {
    format!(
        "<xml><title type=\"text\">{title}</title><content type=\"text\">{content}</content><summary type=\"text\">{summary}</summary> </xml>"
    )
}

/// Payload announcing that ingest of an item finished.
pub fn finished_work_payload(item_pid: &str) -> String {
    event_payload(
        "finishedWork",
        &format!("Repository worker has finished with {item_pid}"),
        item_pid,
    )
}

/// Payload announcing that an object is a document.
pub fn is_document_payload(doc_pid: &str) -> String {
    event_payload(
        "isDocument",
        &format!("Repository object {doc_pid} is a Document"),
        doc_pid,
    )
}

/// What happened to an item's completion events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    Delivered { published: usize },
    /// Delivery stopped early; `published` messages went out before the failure.
    Failed { message: String, published: usize },
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

/// Publishes per-item completion events.
#[derive(Clone)]
pub struct NotificationPublisher {
    broker: Arc<dyn Broker>,
    work_topic: String,
    document_topic: String,
}

impl NotificationPublisher {
    pub fn new(broker: Arc<dyn Broker>, config: &BrokerConfig) -> Self {
        Self {
            broker,
            work_topic: config.work_topic.clone(),
            document_topic: config.document_topic.clone(),
        }
    }

    /// Send `finishedWork` for the item, then one `isDocument` per document.
    /// The connection is closed whatever happens.
    pub fn notify_ingested(&self, item_pid: &str, document_pids: &[String]) -> NotificationOutcome {
        let mut conn = match self.broker.connect() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(item = item_pid, error = %e, "cannot connect to message broker");
                return NotificationOutcome::Failed {
                    message: e.to_string(),
                    published: 0,
                };
            }
        };

        let mut published = 0;
        let mut result = conn.publish(&self.work_topic, &finished_work_payload(item_pid));
        if result.is_ok() {
            published += 1;
            for pid in document_pids {
                result = conn.publish(&self.document_topic, &is_document_payload(pid));
                if result.is_err() {
                    break;
                }
                published += 1;
            }
        }

        if let Err(e) = conn.close() {
            tracing::warn!(item = item_pid, error = %e, "closing broker connection failed");
        }

        match result {
            Ok(()) => {
                tracing::debug!(item = item_pid, published, "completion events published");
                NotificationOutcome::Delivered { published }
            }
            Err(e) => {
                tracing::error!(item = item_pid, published, error = %e, "error sending completion events");
                NotificationOutcome::Failed {
                    message: e.to_string(),
                    published,
                }
            }
        }
    }
}

impl std::fmt::Debug for NotificationPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationPublisher")
            .field("work_topic", &self.work_topic)
            .field("document_topic", &self.document_topic)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Search index
// ---------------------------------------------------------------------------

/// Client of the search indexer.
pub trait SearchIndex: Send + Sync {
    /// Ask the indexer to rebuild the entry for `pid`.
    fn reindex(&self, pid: &str) -> NotifyResult<()>;
}

/// Sends `index <pid>` requests to the indexer's queue.
pub struct QueueSearchIndex {
    broker: Arc<dyn Broker>,
    topic: String,
}

impl QueueSearchIndex {
    pub fn new(broker: Arc<dyn Broker>, topic: &str) -> Self {
        Self {
            broker,
            topic: topic.to_string(),
        }
    }
}

impl SearchIndex for QueueSearchIndex {
    fn reindex(&self, pid: &str) -> NotifyResult<()> {
        let mut conn = self.broker.connect()?;
        let result = conn.publish(&self.topic, &format!("index {pid}"));
        let closed = conn.close();
        result?;
        closed
    }
}

// ---------------------------------------------------------------------------
// Brokers without a server
// ---------------------------------------------------------------------------

/// Broker that logs every message and delivers nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBroker;

impl Broker for NullBroker {
    fn connect(&self) -> NotifyResult<Box<dyn BrokerConnection>> {
        Ok(Box::new(NullConnection))
    }
}

struct NullConnection;

impl BrokerConnection for NullConnection {
    fn publish(&mut self, topic: &str, payload: &str) -> NotifyResult<()> {
        tracing::debug!(topic, payload, "broker disabled; message dropped");
        Ok(())
    }

    fn close(&mut self) -> NotifyResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;

    /// Broker whose connections reject publishes after `limit` successes.
    struct FlakyBroker {
        limit: usize,
        inner: RecordingBroker,
    }

    struct FlakyConnection {
        remaining: usize,
        inner: Box<dyn BrokerConnection>,
    }

    impl Broker for FlakyBroker {
        fn connect(&self) -> NotifyResult<Box<dyn BrokerConnection>> {
            Ok(Box::new(FlakyConnection {
                remaining: self.limit,
                inner: self.inner.connect()?,
            }))
        }
    }

    impl BrokerConnection for FlakyConnection {
        fn publish(&mut self, topic: &str, payload: &str) -> NotifyResult<()> {
            if self.remaining == 0 {
                return Err(NotifyError::Publish {
                    topic: topic.into(),
                    message: "channel closed by broker".into(),
                });
            }
            self.remaining -= 1;
            self.inner.publish(topic, payload)
        }

        fn close(&mut self) -> NotifyResult<()> {
            self.inner.close()
        }
    }

    fn publisher(broker: Arc<dyn Broker>) -> NotificationPublisher {
        NotificationPublisher::new(broker, &BrokerConfig::default())
    }

    #[test]
    fn payload_shape() {
        assert_eq!(
            finished_work_payload("corpus:7"),
            "<xml><title type=\"text\">finishedWork</title><content type=\"text\">Repository worker has finished with corpus:7</content><summary type=\"text\">corpus:7</summary> </xml>"
        );
        assert!(is_document_payload("corpus:8").contains("<title type=\"text\">isDocument</title>"));
        assert!(is_document_payload("corpus:8").contains("<summary type=\"text\">corpus:8</summary>"));
    }

    #[test]
    fn item_event_precedes_document_events() {
        let broker = RecordingBroker::new();
        let outcome = publisher(Arc::new(broker.clone()))
            .notify_ingested("corpus:1", &["corpus:2".into(), "corpus:3".into()]);
        assert_eq!(outcome, NotificationOutcome::Delivered { published: 3 });

        let messages = broker.messages();
        assert!(messages[0].payload.contains("finishedWork"));
        assert!(messages[1].payload.contains("corpus:2"));
        assert!(messages[2].payload.contains("corpus:3"));
        assert_eq!(broker.connection_counts(), (1, 1));
    }

    #[test]
    fn unreachable_broker_is_reported_not_raised() {
        let outcome = publisher(Arc::new(RecordingBroker::unreachable())).notify_ingested("corpus:1", &[]);
        assert!(matches!(outcome, NotificationOutcome::Failed { published: 0, .. }));
    }

    #[test]
    fn publish_failure_still_closes_connection() {
        let recording = RecordingBroker::new();
        let flaky = FlakyBroker {
            limit: 1,
            inner: recording.clone(),
        };
        let outcome = publisher(Arc::new(flaky)).notify_ingested("corpus:1", &["corpus:2".into()]);
        assert!(matches!(outcome, NotificationOutcome::Failed { published: 1, .. }));
        assert_eq!(recording.connection_counts(), (1, 1));
    }

    #[test]
    fn reindex_publishes_on_index_topic() {
        let broker = RecordingBroker::new();
        let index = QueueSearchIndex::new(Arc::new(broker.clone()), "search.index.worker");
        index.reindex("corpus:5").unwrap();
        assert_eq!(broker.messages_on("search.index.worker"), vec!["index corpus:5"]);

        let down = QueueSearchIndex::new(Arc::new(RecordingBroker::unreachable()), "search.index.worker");
        assert!(matches!(down.reindex("corpus:5"), Err(NotifyError::Connect { .. })));
    }

    #[test]
    fn disabled_config_yields_null_broker() {
        let config = BrokerConfig {
            enabled: false,
            ..BrokerConfig::default()
        };
        let broker = broker_from_config(&config);
        let mut conn = broker.connect().unwrap();
        conn.publish("anything", "payload").unwrap();
        conn.close().unwrap();
    }
}
