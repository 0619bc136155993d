//! Publishing decoded readings to the message broker.
//!
//! The pipeline waits for the network, opens a fresh broker session, and
//! publishes one message per quantity. The first failed publish ends the
//! pipeline; messages already sent stay sent.

#[cfg(feature = "mqtt")]
pub mod mqtt;
pub mod probe;

use crate::reading::{DecodedReading, Quantity};
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep_until, timeout};

/// Default budget for waiting on network connectivity.
pub const DEFAULT_NETWORK_WAIT: Duration = Duration::from_secs(30);

/// Default interval between connectivity checks.
pub const DEFAULT_NETWORK_POLL: Duration = Duration::from_millis(500);

/// Connection settings for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upper bound on establishing (and tearing down) a session
    pub timeout: Duration,
}

/// Failure reported by a broker backend.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("broker connection failed: {0}")]
    Connect(String),
    #[error("publish failed: {0}")]
    Publish(String),
}

/// Errors returned by [`PublishPipeline::publish`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PublishError {
    #[error("network unavailable after waiting {0:?}")]
    NetworkUnavailable(Duration),
    #[error("connecting to broker failed: {0}")]
    BrokerConnectFailed(BrokerError),
    #[error("publishing to {topic} failed after {published} messages: {source}")]
    PublishFailed {
        topic: String,
        published: usize,
        source: BrokerError,
    },
}

/// Reports whether the network link is up.
pub trait NetworkMonitor: Send + Sync {
    fn is_connected(&self) -> BoxFuture<'_, bool>;
}

/// Opens broker sessions.
pub trait Broker: Send + Sync {
    fn connect<'a>(
        &'a self,
        settings: &'a BrokerSettings,
    ) -> BoxFuture<'a, Result<Box<dyn BrokerSession>, BrokerError>>;
}

/// A single broker session, used for one cycle and then closed.
pub trait BrokerSession: Send {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), BrokerError>>;

    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Topic names under a fixed namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    namespace: String,
}

impl Topics {
    pub fn new(namespace: impl Into<String>) -> Self {
        let namespace: String = namespace.into();
        Self {
            namespace: namespace.trim_end_matches('/').to_string(),
        }
    }

    pub fn topic(&self, quantity: Quantity) -> String {
        format!("{}/{}", self.namespace, quantity.topic_suffix())
    }
}

/// Poll `monitor` every `poll` until it reports a connection or `budget`
/// is spent.
///
/// Neither a slow check nor the final poll interval can run past the budget.
pub async fn wait_for_network(
    monitor: &dyn NetworkMonitor,
    budget: Duration,
    poll: Duration,
) -> Result<(), PublishError> {
    let deadline = Instant::now() + budget;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if timeout(remaining, monitor.is_connected())
            .await
            .unwrap_or(false)
        {
            return Ok(());
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(PublishError::NetworkUnavailable(budget));
        }
        sleep_until((now + poll).min(deadline)).await;
    }
}

/// Publish every value of `reading`, stopping at the first failure.
///
/// Returns the number of messages published.
pub async fn publish_reading(
    session: &mut dyn BrokerSession,
    topics: &Topics,
    reading: &DecodedReading,
) -> Result<usize, PublishError> {
    let mut published = 0;
    for (quantity, value) in reading.values() {
        let topic = topics.topic(quantity);
        if let Err(source) = session.publish(&topic, value).await {
            return Err(PublishError::PublishFailed {
                topic,
                published,
                source,
            });
        }
        debug!("Published {} = {}", topic, value);
        published += 1;
    }
    Ok(published)
}

/// Network wait, broker session and publish, bundled for the controller.
pub struct PublishPipeline<'a> {
    pub network: &'a dyn NetworkMonitor,
    pub broker: &'a dyn Broker,
    pub settings: BrokerSettings,
    pub topics: Topics,
    pub network_wait: Duration,
    pub network_poll: Duration,
}

impl PublishPipeline<'_> {
    pub async fn publish(&self, reading: &DecodedReading) -> Result<usize, PublishError> {
        wait_for_network(self.network, self.network_wait, self.network_poll).await?;

        info!(
            "Connecting to broker {}:{}",
            self.settings.host, self.settings.port
        );
        let mut session = self
            .broker
            .connect(&self.settings)
            .await
            .map_err(PublishError::BrokerConnectFailed)?;

        let result = publish_reading(session.as_mut(), &self.topics, reading).await;
        if let Err(e) = &result {
            warn!("{}", e);
        }
        session.close().await;
        result
    }
}
