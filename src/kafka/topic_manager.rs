use crate::{Error, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::ClientConfig;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Creates the event topics on startup when they are missing.
pub struct TopicManager {
    admin_client: AdminClient<DefaultClientContext>,
    default_partitions: i32,
    default_replication_factor: i32,
    metadata_timeout: Duration,
    verified_topics: HashSet<String>,
}

impl TopicManager {
    pub fn new(
        bootstrap_servers: &str,
        partitions: i32,
        replication_factor: i32,
        metadata_timeout: Duration,
    ) -> Result<Self> {
        let admin_client: AdminClient<_> = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .create()
            .map_err(Error::Kafka)?;

        Ok(Self {
            admin_client,
            default_partitions: partitions,
            default_replication_factor: replication_factor,
            metadata_timeout,
            verified_topics: HashSet::new(),
        })
    }

    pub async fn ensure_topics_exist(&mut self, topic_names: &[&str]) -> Result<()> {
        for topic_name in topic_names {
            self.ensure_topic_exists(topic_name).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(topic = %topic_name))]
    pub async fn ensure_topic_exists(&mut self, topic_name: &str) -> Result<()> {
        if self.verified_topics.contains(topic_name) {
            debug!("Topic '{}' already verified to exist", topic_name);
            return Ok(());
        }

        match self.topic_exists(topic_name).await {
            Ok(true) => {
                info!("Topic '{}' already exists", topic_name);
                self.verified_topics.insert(topic_name.to_string());
                Ok(())
            }
            Ok(false) => {
                info!(
                    partitions = self.default_partitions,
                    replication_factor = self.default_replication_factor,
                    "Creating topic '{}'",
                    topic_name
                );
                self.create_topic(topic_name).await?;
                self.verified_topics.insert(topic_name.to_string());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to check if topic '{}' exists: {}", topic_name, e);
                Err(e)
            }
        }
    }

    pub async fn topic_exists(&self, topic_name: &str) -> Result<bool> {
        let metadata = self
            .admin_client
            .inner()
            .fetch_metadata(Some(topic_name), self.metadata_timeout)
            .map_err(Error::Kafka)?;

        Ok(metadata
            .topics()
            .iter()
            .any(|topic| topic.name() == topic_name && !topic.partitions().is_empty()))
    }

    async fn create_topic(&self, topic_name: &str) -> Result<()> {
        // min.insync.replicas caps what acks=all can demand of a partition
        let min_insync = self.default_replication_factor.clamp(1, 2).to_string();
        let new_topic = NewTopic::new(
            topic_name,
            self.default_partitions,
            TopicReplication::Fixed(self.default_replication_factor),
        )
        .set("cleanup.policy", "delete")
        .set("min.insync.replicas", &min_insync);

        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));

        let results = self
            .admin_client
            .create_topics(&[new_topic], &opts)
            .await
            .map_err(Error::Kafka)?;

        for result in results {
            match result {
                Ok(topic) => {
                    info!("Successfully created topic: {}", topic);
                }
                Err((topic, rdkafka::types::RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("Topic '{}' was created concurrently", topic);
                }
                Err((_topic, error)) => {
                    return Err(Error::Kafka(rdkafka::error::KafkaError::AdminOp(error)));
                }
            }
        }

        Ok(())
    }

    #[cfg(test)]
    pub async fn delete_topic(&self, topic_name: &str) -> Result<()> {
        let opts = AdminOptions::new().operation_timeout(Some(Duration::from_secs(30)));

        let results = self
            .admin_client
            .delete_topics(&[topic_name], &opts)
            .await
            .map_err(Error::Kafka)?;

        for result in results {
            match result {
                Ok(topic) => {
                    info!("Successfully deleted topic: {}", topic);
                }
                Err((_topic, error)) => {
                    return Err(Error::Kafka(rdkafka::error::KafkaError::AdminOp(error)));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires running Kafka
    async fn test_topic_creation() {
        let manager = TopicManager::new("localhost:9092", 3, 1, Duration::from_secs(5)).unwrap();

        let topic_name = "test-cat-topic-creation";

        // Clean up if exists
        let _ = manager.delete_topic(topic_name).await;

        let mut manager = manager;
        manager.ensure_topic_exists(topic_name).await.unwrap();

        assert!(manager.topic_exists(topic_name).await.unwrap());

        manager.delete_topic(topic_name).await.unwrap();
    }
}
