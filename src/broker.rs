use crate::config_loader::Settings;
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Something the handler can subscribe topics on.
#[async_trait]
pub trait Subscriber: Send + Sync {
    async fn subscribe(&self, topic: &str) -> BridgeResult<()>;
}

#[async_trait]
impl Subscriber for AsyncClient {
    async fn subscribe(&self, topic: &str) -> BridgeResult<()> {
        AsyncClient::subscribe(self, topic, QoS::AtMostOnce).await?;
        Ok(())
    }
}

/// Receives broker events from the receive loop. Calls are awaited one at a
/// time, so a handler never sees two messages concurrently.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Called on every connection acknowledgment, including reconnects.
    async fn on_connect(&self, subscriber: &dyn Subscriber) -> BridgeResult<()>;

    async fn on_message(&self, topic: &str, payload: &[u8]) -> BridgeResult<()>;
}

pub fn mqtt_options(settings: &Settings) -> MqttOptions {
    let mut options = MqttOptions::new(
        settings.client_id.clone(),
        settings.hostname.clone(),
        settings.port,
    );
    options.set_keep_alive(settings.keep_alive());
    options
}

/// Routes a single event-loop event to the handler.
pub async fn dispatch(
    event: Event,
    subscriber: &dyn Subscriber,
    handler: &dyn MessageHandler,
) -> BridgeResult<()> {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => {
            info!("connected to the mqtt server");
            handler.on_connect(subscriber).await
        }
        Event::Incoming(Packet::Publish(publish)) => {
            debug!(topic = %publish.topic, bytes = publish.payload.len(), "message received");
            handler.on_message(&publish.topic, &publish.payload).await
        }
        _ => Ok(()),
    }
}

pub struct BrokerClient {
    client: AsyncClient,
    eventloop: EventLoop,
    address: (String, u16),
    reconnect_delay: Duration,
}

impl BrokerClient {
    /// Prepares the session. No I/O happens until `run` polls the event loop.
    pub fn new(settings: &Settings) -> Self {
        let options = mqtt_options(settings);
        let address = options.broker_address();
        let (client, eventloop) = AsyncClient::new(options, settings.request_capacity);
        Self {
            client,
            eventloop,
            address,
            reconnect_delay: settings.reconnect_delay(),
        }
    }

    /// Receive loop. Never returns `Ok`; only a handler error ends it.
    ///
    /// Polling again after a connection error makes rumqttc reconnect, and the
    /// handler resubscribes on the next ConnAck.
    pub async fn run(mut self, handler: &dyn MessageHandler) -> Result<Infallible, BridgeError> {
        info!("Connecting to mqtt://{}:{}", self.address.0, self.address.1);

        loop {
            match self.eventloop.poll().await {
                Ok(event) => dispatch(event, &self.client, handler).await?,
                Err(e) => {
                    warn!("MQTT connection error: {}. Retrying in {:?}", e, self.reconnect_delay);
                    tokio::time::sleep(self.reconnect_delay).await;
                }
            }
        }
    }
}
