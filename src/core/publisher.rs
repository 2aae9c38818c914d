//! Discovery and state publishing for one vehicle at a time.
//!
//! [`HaClient`] turns a [`Vehicle`] into broker messages and delivers them
//! through a [`Broker`]. Each delivery opens its own session, publishes in
//! order, and closes the session again whatever the outcome.

use std::sync::Arc;

use async_trait::async_trait;
use fuelbee_mqtt_v4::{root_cause, EndpointMetadata, Session, TransferError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::{
    discovery::{DeviceId, DiscoveryPayload, Topics, MEASUREMENTS},
    metrics::{DerivedMetrics, RefuelingDelta},
    model::Vehicle,
};
use crate::config::TransportConfig;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Source of broker sessions.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Connects and returns a session ready to publish.
    async fn open(&self) -> Result<Box<dyn BrokerSession>, TransferError>;
}

/// An open broker connection.
#[async_trait]
pub trait BrokerSession: Send {
    /// Publishes and waits for the delivery confirmation matching the QoS.
    async fn publish(
        &mut self,
        metadata: &EndpointMetadata,
        payload: Vec<u8>,
    ) -> Result<(), TransferError>;

    /// Disconnects. Never fails; problems are only logged.
    async fn close(self: Box<Self>);
}

/// Opens a fresh MQTT connection per session.
pub struct MqttBroker {
    config: TransportConfig,
}

impl MqttBroker {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Broker for MqttBroker {
    async fn open(&self) -> Result<Box<dyn BrokerSession>, TransferError> {
        Ok(Box::new(Session::connect(&self.config).await?))
    }
}

#[async_trait]
impl BrokerSession for Session {
    async fn publish(
        &mut self,
        metadata: &EndpointMetadata,
        payload: Vec<u8>,
    ) -> Result<(), TransferError> {
        Session::publish(self, metadata, payload).await
    }

    async fn close(self: Box<Self>) {
        Session::close(*self).await
    }
}

/// Home Assistant discovery client.
pub struct HaClient {
    broker: Arc<dyn Broker>,
    discovery_prefix: String,
}

impl HaClient {
    pub fn new(broker: Arc<dyn Broker>, discovery_prefix: impl Into<String>) -> Self {
        Self {
            broker,
            discovery_prefix: discovery_prefix.into(),
        }
    }

    /// Announces every sensor of `vehicle` in one session.
    pub async fn broadcast_discovery(&self, vehicle: &Vehicle) -> Result<(), PublishError> {
        let device = DeviceId::from_name(&vehicle.name);
        let topics = Topics::new(&self.discovery_prefix, &device);

        let messages = MEASUREMENTS
            .iter()
            .map(|measurement| -> Result<_, serde_json::Error> {
                let payload =
                    DiscoveryPayload::new(measurement, &vehicle.name, &device, topics.state());
                Ok((
                    EndpointMetadata::at_least_once(topics.config(measurement)),
                    serde_json::to_vec(&payload)?,
                ))
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        self.deliver(messages).await
    }

    /// Publishes the current metrics of `vehicle` to its state topic.
    pub async fn send_state(&self, vehicle: &Vehicle) -> Result<(), PublishError> {
        if let Some(issue) = DerivedMetrics::price_per_unit_issue(vehicle) {
            warn!(
                "Price per unit for '{}' is unavailable: {}",
                vehicle.name, issue
            );
        }

        if RefuelingDelta::overflows(vehicle) {
            warn!(
                "Deltas for '{}' are unavailable: values out of range",
                vehicle.name
            );
        }

        let device = DeviceId::from_name(&vehicle.name);
        let topic = Topics::new(&self.discovery_prefix, &device).state();
        let payload = serde_json::to_vec(&DerivedMetrics::compute(vehicle))?;

        self.deliver(vec![(EndpointMetadata::at_least_once(topic), payload)])
            .await
    }

    /// Discovery followed by state. Returns whether both succeeded.
    pub async fn initialize_vehicle(&self, vehicle: &Vehicle) -> bool {
        if let Err(e) = self.broadcast_discovery(vehicle).await {
            error!("Discovery for '{}' failed: {}", vehicle.name, root_cause(&e));
            return false;
        }
        debug!("Discovery for '{}' published", vehicle.name);

        if let Err(e) = self.send_state(vehicle).await {
            error!("State update for '{}' failed: {}", vehicle.name, root_cause(&e));
            return false;
        }
        info!("State of '{}' published", vehicle.name);
        true
    }

    async fn deliver(&self, messages: Vec<(EndpointMetadata, Vec<u8>)>) -> Result<(), PublishError> {
        let mut session = self.broker.open().await?;

        let mut result = Ok(());
        for (metadata, payload) in messages {
            debug!("Publishing {} bytes to '{}'", payload.len(), metadata.topic);
            if let Err(e) = session.publish(&metadata, payload).await {
                result = Err(e.into());
                break;
            }
        }

        session.close().await;
        result
    }
}


#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use super::{mock::*, *};
    use crate::core::model::fixtures::*;

    const T0: i64 = 1_600_000_000_000;

    fn client(broker: &Arc<RecordingBroker>) -> HaClient {
        HaClient::new(broker.clone(), "homeassistant")
    }

    fn my_car() -> Vehicle {
        vehicle(
            "My Car",
            vec![
                refueling(1, T0, 1000, 40.0, 60.0),
                refueling(2, T0 + 3_600_000, 1200, 40.0, 50.0),
            ],
        )
    }

    #[tokio::test]
    async fn discovery_publishes_every_sensor_in_one_session() {
        let broker = Arc::new(RecordingBroker::default());

        client(&broker).broadcast_discovery(&my_car()).await.unwrap();

        let calls = broker.calls();
        assert_eq!(calls.first(), Some(&Call::Open));
        assert_eq!(calls.last(), Some(&Call::Close));
        assert_eq!(calls.len(), MEASUREMENTS.len() + 2);

        let topics: Vec<_> = broker.published().into_iter().map(|(t, _)| t).collect();
        let expected: Vec<_> = MEASUREMENTS
            .iter()
            .map(|m| format!("homeassistant/sensor/car_report_my_car/{}/config", m.key))
            .collect();
        assert_eq!(topics, expected);

        for call in &calls[1..calls.len() - 1] {
            assert!(matches!(
                call,
                Call::Publish {
                    qos: 1,
                    retain: false,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn discovery_payload_references_state_topic() {
        let broker = Arc::new(RecordingBroker::default());
        client(&broker).broadcast_discovery(&my_car()).await.unwrap();

        let (_, payload) = broker.published().remove(2);
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(json["name"], "Mileage");
        assert_eq!(
            json["state_topic"],
            "homeassistant/sensor/car_report_my_car/state"
        );
        assert_eq!(json["unique_id"], "car_report_my_car_mileage");
    }

    #[tokio::test]
    async fn state_is_published_to_state_topic() {
        let broker = Arc::new(RecordingBroker::default());

        client(&broker).send_state(&my_car()).await.unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        let (topic, payload) = &published[0];
        assert_eq!(topic, "homeassistant/sensor/car_report_my_car/state");

        let json: serde_json::Value = serde_json::from_str(payload).unwrap();
        assert_eq!(json["mileage"], 1200);
        assert_eq!(json["price_per_unit"], 1.25);
        assert_eq!(json["delta_mileage"], 200);
        assert_eq!(json["delta_time"], 3600);
        assert_eq!(json["timestamp"], "2020-09-13T13:26:40Z");
    }

    #[tokio::test]
    async fn custom_prefix_is_used_for_all_topics() {
        let broker = Arc::new(RecordingBroker::default());
        let client = HaClient::new(broker.clone(), "ha");

        assert!(client.initialize_vehicle(&my_car()).await);

        assert!(broker
            .published()
            .iter()
            .all(|(topic, _)| topic.starts_with("ha/sensor/car_report_my_car/")));
    }

    #[tokio::test]
    async fn initialize_uses_two_sessions() {
        let broker = Arc::new(RecordingBroker::default());

        assert!(client(&broker).initialize_vehicle(&my_car()).await);

        let calls = broker.calls();
        let opens = calls.iter().filter(|c| **c == Call::Open).count();
        let closes = calls.iter().filter(|c| **c == Call::Close).count();
        assert_eq!((opens, closes), (2, 2));
        assert_eq!(
            calls[MEASUREMENTS.len() + 1..],
            [
                Call::Close,
                Call::Open,
                Call::Publish {
                    topic: "homeassistant/sensor/car_report_my_car/state".into(),
                    qos: 1,
                    retain: false,
                    payload: serde_json::to_string(&DerivedMetrics::compute(&my_car())).unwrap(),
                },
                Call::Close,
            ]
        );
    }

    #[tokio::test]
    async fn failed_publish_aborts_and_still_closes() {
        let broker = Arc::new(RecordingBroker::failing_on("/color/"));

        let err = client(&broker)
            .broadcast_discovery(&my_car())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::Transfer(TransferError::SessionClosed(_))
        ));

        let calls = broker.calls();
        // name was published, color failed, nothing after it
        assert_eq!(calls.len(), 3);
        assert_eq!(calls.last(), Some(&Call::Close));
    }

    #[tokio::test]
    #[traced_test]
    async fn discovery_failure_skips_state() {
        let broker = Arc::new(RecordingBroker::failing_on("/config"));

        assert!(!client(&broker).initialize_vehicle(&my_car()).await);

        assert!(broker.published().is_empty());
        assert_eq!(broker.calls(), [Call::Open, Call::Close]);
        assert!(logs_contain("Discovery for 'My Car' failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn state_failure_is_reported() {
        let broker = Arc::new(RecordingBroker::failing_on("/state"));

        assert!(!client(&broker).initialize_vehicle(&my_car()).await);

        assert_eq!(broker.published().len(), MEASUREMENTS.len());
        assert!(logs_contain("State update for 'My Car' failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn refused_connection_is_terminal() {
        let broker = Arc::new(RecordingBroker::refusing());

        assert!(!client(&broker).initialize_vehicle(&my_car()).await);

        assert!(broker.calls().is_empty());
        assert!(logs_contain(
            "Discovery for 'My Car' failed: Connection refused by broker: NotAuthorized"
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn out_of_range_dates_publish_null_deltas() {
        let broker = Arc::new(RecordingBroker::default());
        let car = vehicle(
            "My Car",
            vec![
                refueling(1, i64::MIN, 1000, 40.0, 60.0),
                refueling(2, i64::MAX, 1200, 40.0, 60.0),
            ],
        );

        client(&broker).send_state(&car).await.unwrap();

        let (_, payload) = broker.published().remove(0);
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(json["delta_time"].is_null());
        assert!(json["delta_mileage"].is_null());
        assert_eq!(json["mileage"], 1200);
        assert!(logs_contain("Deltas for 'My Car' are unavailable"));
    }

    #[tokio::test]
    #[traced_test]
    async fn zero_volume_is_logged_and_published_as_null() {
        let broker = Arc::new(RecordingBroker::default());
        let car = vehicle("My Car", vec![refueling(1, T0, 1000, 0.0, 45.0)]);

        client(&broker).send_state(&car).await.unwrap();

        let (_, payload) = broker.published().remove(0);
        let json: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(json["price_per_unit"].is_null());
        assert!(logs_contain("Price per unit for 'My Car' is unavailable"));
    }
}
