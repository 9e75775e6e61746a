use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rsvp_core::{NotificationError, Notifier};
use rsvp_shared::InvitationEvent;
use std::time::Duration;
use tracing::{info, error};

/// Kafka producer feeding the transactional mailer.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    invitation_topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, invitation_topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            invitation_topic: invitation_topic.to_string(),
        })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl Notifier for EventProducer {
    async fn send_invitation(&self, invitation: &InvitationEvent) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(invitation).map_err(|e| NotificationError::Encode(e.to_string()))?;

        self.publish(&self.invitation_topic, &invitation.guest_id.to_string(), &payload)
            .await
            .map_err(|e| NotificationError::Dispatch(e.to_string()))
    }
}
