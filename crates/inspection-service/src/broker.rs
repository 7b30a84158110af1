//! Kafka transport: task events in, inspection events out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{ClientConfig, Message};
use tracing::{error, info, warn};

use crate::config::KafkaConfig;
use crate::workflows::inspection::{
    EventPublisher, InspectionEvent, InspectionRepository, InspectionService, PublishError,
};

const PRODUCE_QUEUE_TIMEOUT: Duration = Duration::from_secs(5);

fn bootstrap_servers(config: &KafkaConfig) -> String {
    config.brokers.join(",")
}

/// Publishes inspection events keyed by inspection id.
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(config: &KafkaConfig) -> Result<Self, KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers(config))
            .set("message.timeout.ms", "10000")
            .create()?;

        Ok(Self {
            producer,
            topic: config.inspections_topic.clone(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &InspectionEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        let key = event.key();
        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        self.producer
            .send(record, PRODUCE_QUEUE_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(err, _)| PublishError::Transport(err.to_string()))
    }
}

/// Consume task events until `shutdown` resolves.
///
/// Each message is handled under the configured timeout; a message that times out is
/// logged and skipped. Offsets are committed automatically.
pub async fn run_task_consumer<R, F>(
    service: Arc<InspectionService<R>>,
    config: &KafkaConfig,
    shutdown: F,
) -> Result<(), KafkaError>
where
    R: InspectionRepository + 'static,
    F: Future<Output = ()>,
{
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &config.consumer_group)
        .set("bootstrap.servers", bootstrap_servers(config))
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "earliest")
        .create()?;
    consumer.subscribe(&[&config.tasks_topic])?;
    info!(
        topic = %config.tasks_topic,
        group = %config.consumer_group,
        "task event consumer started"
    );

    let handler_timeout = config.handler_timeout();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            received = consumer.recv() => match received {
                Err(err) => warn!(error = %err, "kafka receive error"),
                Ok(message) => {
                    let Some(payload) = message.payload() else {
                        warn!(offset = message.offset(), "task event without payload");
                        continue;
                    };
                    let handled =
                        tokio::time::timeout(handler_timeout, service.handle_task_message(payload))
                            .await;
                    if handled.is_err() {
                        error!(
                            offset = message.offset(),
                            timeout_secs = handler_timeout.as_secs(),
                            "task event handler timed out, dropping message"
                        );
                    }
                }
            }
        }
    }

    info!("task event consumer stopped");
    Ok(())
}
