//! MQTT broker backend built on `rumqttc`.
//!
//! Each session owns its own client and event loop. The event loop is driven
//! by a background task from CONNACK until the session is closed. Messages
//! go out at QoS 1 and a publish only counts once the broker has acknowledged
//! it; a session the broker dropped fails the next publish.

use super::{Broker, BrokerError, BrokerSession, BrokerSettings};
use futures::future::BoxFuture;
use log::{debug, warn};
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

const KEEP_ALIVE: Duration = Duration::from_secs(30);

/// Capacity of the client request queue; one cycle publishes at most nine
/// messages.
const REQUEST_CAPACITY: usize = 16;

/// Opens MQTT sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct MqttBroker;

fn mqtt_options(settings: &BrokerSettings) -> MqttOptions {
    let mut options = MqttOptions::new(&settings.client_id, &settings.host, settings.port);
    options.set_keep_alive(KEEP_ALIVE);
    options.set_clean_session(true);
    if let Some(username) = &settings.username {
        options.set_credentials(username, settings.password.as_deref().unwrap_or_default());
    }
    options
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(ack)) = eventloop.poll().await? {
            debug!("CONNACK {:?}", ack.code);
            return Ok(());
        }
    }
}

/// Poll the event loop until DISCONNECT goes out, forwarding every PUBACK.
///
/// Returning drops `acks`, which is how a waiting publish learns that the
/// session is gone.
async fn drive(mut eventloop: EventLoop, acks: mpsc::Sender<u16>) -> Result<(), ConnectionError> {
    loop {
        match eventloop.poll().await? {
            Event::Incoming(Packet::PubAck(ack)) => {
                if acks.send(ack.pkid).await.is_err() {
                    return Ok(());
                }
            }
            Event::Outgoing(Outgoing::Disconnect) => return Ok(()),
            _ => {}
        }
    }
}

impl MqttBroker {
    async fn open(settings: &BrokerSettings) -> Result<Box<dyn BrokerSession>, BrokerError> {
        let (client, mut eventloop) = AsyncClient::new(mqtt_options(settings), REQUEST_CAPACITY);

        match timeout(settings.timeout, wait_for_connack(&mut eventloop)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(BrokerError::Connect(e.to_string())),
            Err(_) => {
                return Err(BrokerError::Connect(format!(
                    "no CONNACK within {:?}",
                    settings.timeout
                )));
            }
        }

        let (ack_tx, acks) = mpsc::channel(REQUEST_CAPACITY);
        Ok(Box::new(MqttSession {
            client,
            acks,
            driver: Some(tokio::spawn(drive(eventloop, ack_tx))),
            timeout: settings.timeout,
        }))
    }
}

impl Broker for MqttBroker {
    fn connect<'a>(
        &'a self,
        settings: &'a BrokerSettings,
    ) -> BoxFuture<'a, Result<Box<dyn BrokerSession>, BrokerError>> {
        Box::pin(Self::open(settings))
    }
}

struct MqttSession {
    client: AsyncClient,
    /// Packet ids acknowledged by the broker
    acks: mpsc::Receiver<u16>,
    driver: Option<JoinHandle<Result<(), ConnectionError>>>,
    timeout: Duration,
}

impl MqttSession {
    async fn send(&mut self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        if let Err(e) = self
            .client
            .publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .await
        {
            debug!("MQTT request rejected: {}", e);
            return Err(self.session_lost().await);
        }

        // One message is in flight at a time, so the next PUBACK is ours.
        match timeout(self.timeout, self.acks.recv()).await {
            Ok(Some(pkid)) => {
                debug!("PUBACK {} for {}", pkid, topic);
                Ok(())
            }
            Ok(None) => Err(self.session_lost().await),
            Err(_) => Err(BrokerError::Publish(format!(
                "no PUBACK within {:?}",
                self.timeout
            ))),
        }
    }

    /// Collect the reason the event loop stopped.
    async fn session_lost(&mut self) -> BrokerError {
        let reason = match self.driver.take() {
            Some(driver) => match timeout(self.timeout, driver).await {
                Ok(Ok(Err(e))) => e.to_string(),
                Ok(Ok(Ok(()))) => "session closed".to_string(),
                Ok(Err(e)) => e.to_string(),
                Err(_) => "event loop unresponsive".to_string(),
            },
            None => "session closed".to_string(),
        };
        warn!("MQTT session lost: {}", reason);
        BrokerError::Publish(reason)
    }

    async fn shutdown(&mut self) {
        let Some(driver) = self.driver.take() else {
            return;
        };
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect request failed: {}", e);
        }
        match timeout(self.timeout, driver).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!("MQTT connection error while closing: {}", e),
            Ok(Err(e)) => warn!("MQTT event loop failed: {}", e),
            Err(_) => warn!("MQTT session did not close within {:?}", self.timeout),
        }
    }
}

impl BrokerSession for MqttSession {
    fn publish<'a>(
        &'a mut self,
        topic: &'a str,
        payload: &'a str,
    ) -> BoxFuture<'a, Result<(), BrokerError>> {
        Box::pin(self.send(topic, payload))
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(self.shutdown())
    }
}
