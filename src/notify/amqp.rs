//! AMQP broker via lapin.
//!
//! The pipeline is synchronous, so each connection owns a current-thread
//! tokio runtime and blocks on lapin's futures. Messages go to the default
//! exchange with the topic as routing key; the target queue is declared
//! durable the first time a connection publishes to it.

use std::collections::HashSet;

use lapin::options::{BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};

use crate::error::{NotifyError, NotifyResult};

use super::{Broker, BrokerConnection};

pub struct AmqpBroker {
    url: String,
}

impl AmqpBroker {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl std::fmt::Debug for AmqpBroker {
    // The URL carries credentials.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpBroker").finish_non_exhaustive()
    }
}

impl Broker for AmqpBroker {
    fn connect(&self) -> NotifyResult<Box<dyn BrokerConnection>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| NotifyError::Connect {
                message: format!("tokio runtime: {e}"),
            })?;

        let (connection, channel) = runtime.block_on(async {
            let connection = Connection::connect(&self.url, ConnectionProperties::default())
                .await
                .map_err(|e| NotifyError::Connect {
                    message: e.to_string(),
                })?;
            let channel = connection
                .create_channel()
                .await
                .map_err(|e| NotifyError::Connect {
                    message: format!("channel: {e}"),
                })?;
            Ok::<_, NotifyError>((connection, channel))
        })?;

        tracing::debug!("connected to AMQP broker");
        Ok(Box::new(AmqpConnection {
            runtime,
            connection,
            channel,
            declared: HashSet::new(),
            open: true,
        }))
    }
}

struct AmqpConnection {
    runtime: tokio::runtime::Runtime,
    connection: Connection,
    channel: Channel,
    declared: HashSet<String>,
    open: bool,
}

impl BrokerConnection for AmqpConnection {
    fn publish(&mut self, topic: &str, payload: &str) -> NotifyResult<()> {
        if !self.open {
            return Err(NotifyError::Closed);
        }
        let publish_err = |e: lapin::Error| NotifyError::Publish {
            topic: topic.to_string(),
            message: e.to_string(),
        };

        let channel = &self.channel;
        let declare = !self.declared.contains(topic);
        self.runtime.block_on(async {
            if declare {
                channel
                    .queue_declare(
                        topic,
                        QueueDeclareOptions {
                            durable: true,
                            ..Default::default()
                        },
                        FieldTable::default(),
                    )
                    .await
                    .map_err(publish_err)?;
            }
            channel
                .basic_publish(
                    "",
                    topic,
                    BasicPublishOptions::default(),
                    payload.as_bytes(),
                    BasicProperties::default()
                        .with_content_type("text/xml".into())
                        .with_delivery_mode(2), // Persistent.
                )
                .await
                .map_err(publish_err)?;
            Ok::<_, NotifyError>(())
        })?;

        self.declared.insert(topic.to_string());
        Ok(())
    }

    fn close(&mut self) -> NotifyResult<()> {
        if !self.open {
            return Err(NotifyError::Closed);
        }
        self.open = false;
        self.runtime
            .block_on(self.connection.close(200, "OK"))
            .map_err(|e| NotifyError::Connect {
                message: format!("close: {e}"),
            })
    }
}

impl Drop for AmqpConnection {
    fn drop(&mut self) {
        if self.open {
            let _ = self.runtime.block_on(self.connection.close(200, "OK"));
        }
    }
}
