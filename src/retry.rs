use crate::config::RetryConfig;
use crate::events::Event;
use crate::publisher::{DeliveryReceipt, EventPublisher};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, warn};

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
            multiplier: config.multiplier,
        }
    }
}

/// Retries delivery failures of the wrapped publisher.
///
/// Only [`crate::Error::Delivery`] is retried. The last delivery error is
/// returned once the policy is exhausted.
pub struct RetryingPublisher<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: EventPublisher> RetryingPublisher<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: EventPublisher> EventPublisher for RetryingPublisher<P> {
    async fn publish(&self, event: &Event) -> Result<DeliveryReceipt> {
        let mut retry = 0;
        loop {
            match self.inner.publish(event).await {
                Ok(mut receipt) => {
                    receipt.attempts = retry + 1;
                    return Ok(receipt);
                }
                Err(e) if e.is_retryable() && retry < self.policy.max_retries => {
                    let delay = self.policy.backoff(retry);
                    retry += 1;
                    warn!(
                        topic = event.topic(),
                        attempt = retry,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if retry > 0 {
                        error!(
                            topic = event.topic(),
                            attempts = retry + 1,
                            error = %e,
                            "Publish failed after retries"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Cat, Intent};
    use crate::kafka::KeyStrategy;
    use crate::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> Error,
    }

    #[async_trait]
    impl EventPublisher for Flaky {
        async fn publish(&self, event: &Event) -> Result<DeliveryReceipt> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err((self.error)());
            }
            Ok(DeliveryReceipt {
                topic: event.topic().to_string(),
                partition: 0,
                offset: call as i64,
                attempts: 1,
            })
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
            error: || Error::delivery("Local: Broker transport failure"),
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    fn event() -> Event {
        let intent = Intent::Create {
            cat: Cat::new("Tom", 3, "Tabby"),
        };
        Event::from_intent(&intent, &KeyStrategy::KindConstant).unwrap()
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(1000),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_millis(1000));
        assert_eq!(policy.backoff(60), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_no_retry_by_default() {
        let publisher = RetryingPublisher::new(flaky(1), RetryPolicy::none());
        let result = publisher.publish(&event()).await;
        assert!(matches!(result, Err(Error::Delivery { .. })));
        assert_eq!(publisher.inner().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failures() {
        let publisher = RetryingPublisher::new(flaky(2), fast_policy(3));
        let receipt = publisher.publish(&event()).await.unwrap();
        assert_eq!(receipt.attempts, 3);
        assert_eq!(receipt.topic, "cat_created");
    }

    #[tokio::test]
    async fn test_surfaces_delivery_error_after_exhaustion() {
        let publisher = RetryingPublisher::new(flaky(10), fast_policy(2));
        let result = publisher.publish(&event()).await;
        assert!(matches!(result, Err(Error::Delivery { .. })));
        assert_eq!(publisher.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_delivery_errors_are_not_retried() {
        let inner = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
            error: || Error::Config("bad producer settings".to_string()),
        };
        let publisher = RetryingPublisher::new(inner, fast_policy(5));
        assert!(matches!(
            publisher.publish(&event()).await,
            Err(Error::Config(_))
        ));
        assert_eq!(publisher.inner().calls.load(Ordering::SeqCst), 1);
    }
}
