use super::balancer::{LeastBytesBalancer, PartitionLease};
use crate::config::{Config, ConnectionMode, PartitionerKind};
use crate::events::Event;
use crate::publisher::{
    DeliveryReceipt, EventPublisher, PublishState, PublishStats, PublishStatsSnapshot,
    PublishTracker,
};
use crate::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

const RELEASE_FLUSH_TIMEOUT: Duration = Duration::from_millis(100);

/// Slack given to librdkafka's own delivery report before we stop waiting.
const REPORT_GRACE: Duration = Duration::from_secs(2);

/// How long a failed metadata lookup is remembered before it is retried.
const METADATA_RETRY_AFTER: Duration = Duration::from_secs(10);

/// Split of one publish's `ack_timeout` between the metadata lookup and
/// librdkafka's `message.timeout.ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimeBudget {
    pub metadata: Duration,
    pub delivery: Duration,
}

impl TimeBudget {
    pub(crate) fn from_config(config: &Config) -> Self {
        let total = config.publish.ack_timeout();
        let metadata = config.kafka.metadata_timeout().min(total / 4);
        let delivery = total
            .saturating_sub(metadata)
            .max(Duration::from_millis(1));
        Self { metadata, delivery }
    }
}

#[derive(Debug, Clone, Copy)]
enum PartitionCount {
    Known(usize),
    Unavailable { until: Instant },
}

/// Publishes events to Kafka with `acks=all`.
///
/// In [`ConnectionMode::Shared`] a single producer is created up front and
/// shared by all publishes; librdkafka keeps each request's framing
/// separate. In [`ConnectionMode::PerRequest`] every publish opens its own
/// producer and releases it when the attempt ends.
///
/// A publish never waits longer than `ack_timeout` for librdkafka to decide:
/// the metadata lookup and `message.timeout.ms` share that budget.
pub struct KafkaProducer {
    client_config: ClientConfig,
    shared: Option<FutureProducer>,
    balancer: Option<LeastBytesBalancer>,
    partition_counts: Mutex<HashMap<&'static str, PartitionCount>>,
    budget: TimeBudget,
    stats: Arc<PublishStats>,
}

/// A producer checked out for one publish.
struct ProducerLease {
    producer: Option<FutureProducer>,
    dedicated: bool,
    stats: Arc<PublishStats>,
}

impl ProducerLease {
    fn producer(&self) -> Result<&FutureProducer> {
        self.producer
            .as_ref()
            .ok_or_else(|| Error::delivery("Producer already released"))
    }
}

impl Drop for ProducerLease {
    fn drop(&mut self) {
        if !self.dedicated {
            return;
        }
        let Some(producer) = self.producer.take() else {
            return;
        };
        let stats = Arc::clone(&self.stats);
        // flush and rd_kafka_destroy both block
        let release = move || {
            if let Err(e) = producer.flush(RELEASE_FLUSH_TIMEOUT) {
                warn!(error = %e, "Flush failed while releasing producer");
            }
            drop(producer);
            stats.connection_released();
            debug!("Released dedicated producer");
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(release);
            }
            Err(_) => release(),
        }
    }
}

impl KafkaProducer {
    pub fn new(config: &Config) -> Result<Self> {
        let client_config = client_config(config);

        let shared = match config.publish.connection {
            ConnectionMode::Shared => {
                let producer: FutureProducer = client_config.create().map_err(Error::Kafka)?;
                Some(producer)
            }
            ConnectionMode::PerRequest => None,
        };

        let balancer = match config.publish.partitioner {
            PartitionerKind::LeastBytes => Some(LeastBytesBalancer::new()),
            PartitionerKind::KeyHash => None,
        };

        let budget = TimeBudget::from_config(config);
        info!(
            brokers = %config.bootstrap_servers(),
            connection = ?config.publish.connection,
            partitioner = ?config.publish.partitioner,
            ack_timeout_ms = config.publish.ack_timeout_ms,
            metadata_budget_ms = budget.metadata.as_millis() as u64,
            "Kafka producer configured"
        );

        Ok(Self {
            client_config,
            shared,
            balancer,
            partition_counts: Mutex::new(HashMap::new()),
            budget,
            stats: Arc::new(PublishStats::default()),
        })
    }

    /// Outcome counters for every publish made through this producer.
    pub fn stats(&self) -> PublishStatsSnapshot {
        self.stats.snapshot()
    }

    fn checkout(&self) -> Result<ProducerLease> {
        match &self.shared {
            Some(producer) => Ok(ProducerLease {
                producer: Some(producer.clone()),
                dedicated: false,
                stats: Arc::clone(&self.stats),
            }),
            None => {
                let producer: FutureProducer = self.client_config.create().map_err(Error::Kafka)?;
                self.stats.connection_opened();
                debug!("Opened dedicated producer");
                Ok(ProducerLease {
                    producer: Some(producer),
                    dedicated: true,
                    stats: Arc::clone(&self.stats),
                })
            }
        }
    }

    async fn reserve_partition(
        &self,
        producer: &FutureProducer,
        event: &Event,
    ) -> Option<PartitionLease> {
        let balancer = self.balancer.as_ref()?;
        let partitions = self.partition_count(producer, event.topic()).await?;
        balancer.acquire(event.topic(), partitions, event.payload().len())
    }

    /// Partition count from broker metadata, cached per topic.
    ///
    /// A failed or empty lookup is cached as unavailable for
    /// [`METADATA_RETRY_AFTER`]; meanwhile librdkafka picks the partition.
    async fn partition_count(&self, producer: &FutureProducer, topic: &'static str) -> Option<usize> {
        let cached = self.partition_counts.lock().get(topic).copied();
        match cached {
            Some(PartitionCount::Known(count)) => return Some(count),
            Some(PartitionCount::Unavailable { until }) if Instant::now() < until => return None,
            _ => {}
        }

        let producer = producer.clone();
        let timeout = self.budget.metadata;
        let fetched = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(topic), timeout)
                .map(|metadata| {
                    metadata
                        .topics()
                        .iter()
                        .find(|t| t.name() == topic)
                        .map_or(0, |t| t.partitions().len())
                })
        })
        .await;

        let count = match fetched {
            Ok(Ok(count)) if count > 0 => {
                debug!(topic, partitions = count, "Fetched partition count");
                Some(count)
            }
            Ok(Ok(_)) => {
                debug!(topic, "Topic has no partitions yet, leaving partition to librdkafka");
                None
            }
            Ok(Err(e)) => {
                warn!(topic, error = %e, "Failed to fetch topic metadata");
                None
            }
            Err(e) => {
                warn!(topic, error = %e, "Metadata task failed");
                None
            }
        };

        let entry = match count {
            Some(count) => PartitionCount::Known(count),
            None => PartitionCount::Unavailable {
                until: Instant::now() + METADATA_RETRY_AFTER,
            },
        };
        self.partition_counts.lock().insert(topic, entry);
        count
    }
}

#[async_trait]
impl EventPublisher for KafkaProducer {
    #[instrument(skip(self, event), fields(topic = event.topic(), kind = %event.kind()))]
    async fn publish(&self, event: &Event) -> Result<DeliveryReceipt> {
        let started = Instant::now();
        let topic = event.topic();
        let mut tracker = PublishTracker::with_stats(topic, Arc::clone(&self.stats));
        tracker.advance(PublishState::Connecting);

        let lease = match self.checkout() {
            Ok(lease) => lease,
            Err(e) => {
                tracker.advance(PublishState::Failed);
                warn!(error = %e, "Could not open producer");
                return Err(Error::delivery(e.to_string()));
            }
        };
        let producer = match lease.producer() {
            Ok(producer) => producer,
            Err(e) => {
                tracker.advance(PublishState::Failed);
                return Err(e);
            }
        };

        let reserved = self.reserve_partition(producer, event).await;

        tracker.advance(PublishState::Publishing);
        let mut record = FutureRecord::<[u8], [u8]>::to(topic)
            .payload(event.payload())
            .timestamp(chrono::Utc::now().timestamp_millis());
        if let Some(key) = event.key() {
            record = record.key(key);
        }
        if let Some(reserved) = &reserved {
            record = record.partition(reserved.partition());
        }

        // message.timeout.ms settles the outcome; the outer timer only
        // guards against a delivery report that never arrives
        let delivery = self.budget.delivery;
        let outcome =
            tokio::time::timeout(delivery + REPORT_GRACE, producer.send(record, delivery)).await;
        drop(reserved);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok((partition, offset))) => {
                tracker.advance(PublishState::Acked);
                info!(partition, offset, elapsed_ms, "Event acknowledged by all replicas");
                Ok(DeliveryReceipt {
                    topic: topic.to_string(),
                    partition,
                    offset,
                    attempts: 1,
                })
            }
            Ok(Err((e, _message))) => {
                tracker.advance(PublishState::Failed);
                warn!(error = %e, elapsed_ms, "Broker did not acknowledge event");
                Err(Error::delivery(e.to_string()))
            }
            Err(_) => {
                tracker.advance(PublishState::Failed);
                warn!(elapsed_ms, "No delivery report from librdkafka, the event may still arrive");
                Err(Error::delivery(format!(
                    "No delivery report within {}ms",
                    (delivery + REPORT_GRACE).as_millis()
                )))
            }
        }
    }
}

pub(crate) fn client_config(config: &Config) -> ClientConfig {
    let budget = TimeBudget::from_config(config);
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.bootstrap_servers())
        .set("acks", "all")
        .set("compression.type", &config.kafka.compression)
        .set("message.timeout.ms", budget.delivery.as_millis().to_string())
        .set("linger.ms", "0");

    if config.publish.partitioner == PartitionerKind::KeyHash {
        client_config.set("partitioner", "murmur2_random");
    }

    client_config
}
