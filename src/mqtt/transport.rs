/// MQTT subscription feeding decoded events into the scheduler's channel
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{sleep, Duration};

use crate::config::MqttConfig;
use crate::models::MeasurementEvent;
use crate::mqtt::decoder::MeasurementDecoder;

const KEEP_ALIVE_SECS: u64 = 30;
const RECONNECT_DELAY_SECS: u64 = 2;
const REQUEST_CAPACITY: usize = 64;

/// Handle to the broker connection
///
/// The event loop is returned separately from `new` and driven by `run`,
/// which owns it for the life of the connection.
pub struct MqttTransport {
    client: AsyncClient,
    topic: String,
}

impl MqttTransport {
    pub fn new(config: &MqttConfig) -> (Self, EventLoop) {
        let mut opts = MqttOptions::new(&config.client_id, &config.host, config.port);
        opts.set_keep_alive(Duration::from_secs(KEEP_ALIVE_SECS));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            opts.set_credentials(user, pass);
        }

        let (client, eventloop) = AsyncClient::new(opts, REQUEST_CAPACITY);
        let transport = Self {
            client,
            topic: config.topic.clone(),
        };
        (transport, eventloop)
    }

    /// Poll the broker until disconnected or the receiver goes away
    ///
    /// Subscribes on every ConnAck so the subscription survives reconnects.
    /// Payloads that fail to decode are logged and dropped.
    pub async fn run(
        &self,
        mut eventloop: EventLoop,
        decoder: MeasurementDecoder,
        events: UnboundedSender<MeasurementEvent>,
    ) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected");
                    match self.client.try_subscribe(&self.topic, QoS::AtLeastOnce) {
                        Ok(()) => info!("Subscribed to topic: {}", self.topic),
                        Err(e) => error!("Failed to subscribe to {}: {}", self.topic, e),
                    }
                }
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    debug!(
                        "Received weather message: {} from topic: {}",
                        String::from_utf8_lossy(&msg.payload),
                        msg.topic
                    );

                    let event = match decoder.decode(&msg.payload) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!("Could not decode message from {}: {}", msg.topic, e);
                            continue;
                        }
                    };

                    if events.send(event).is_err() {
                        info!("Event receiver closed, stopping MQTT transport");
                        return;
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("Disconnected from broker");
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Connection lost: {}", e);
                    sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                    info!("Attempting reconnection");
                }
            }
        }
    }

    /// Unsubscribe and ask the event loop to disconnect
    pub fn close(&self) {
        if let Err(e) = self.client.try_unsubscribe(&self.topic) {
            debug!("Unsubscribe from {} not sent: {}", self.topic, e);
        }
        if let Err(e) = self.client.try_disconnect() {
            debug!("Disconnect not sent: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MqttConfig {
        MqttConfig {
            host: "localhost".into(),
            port: 1883,
            topic: "rtl_433/+/events".into(),
            username: None,
            password: None,
            client_id: "weather-metrics-test".into(),
        }
    }

    #[test]
    fn new_transport_keeps_topic() {
        let (transport, eventloop) = MqttTransport::new(&config());
        assert_eq!(transport.topic, "rtl_433/+/events");
        assert_eq!(eventloop.mqtt_options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(
            eventloop.mqtt_options.keep_alive(),
            Duration::from_secs(KEEP_ALIVE_SECS)
        );
    }
}
