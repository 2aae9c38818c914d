//! Short-lived broker sessions.
//!
//! A [`Session`] owns one rumqttc client and its event loop for the duration
//! of a handful of publishes: connect, wait for CONNACK, publish and wait for
//! each acknowledgement, then disconnect. There is no background task and no
//! reconnection; the event loop is only driven while a caller is waiting on
//! it, which keeps the whole exchange sequential.
//!
//! ```ignore
//! let mut session = Session::connect(&config).await?;
//! let result = session
//!     .publish(&EndpointMetadata::at_least_once("a/b"), b"{}".to_vec())
//!     .await;
//! session.close().await;
//! result?;
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Outgoing, Packet, QoS};
use tracing::{debug, trace, warn};

use super::{
    client::ClientBuilder,
    config::{Config, EndpointMetadata},
    error::TransferError,
};

/// A connected broker session.
pub struct Session {
    client: AsyncClient,
    event_loop: EventLoop,
    ack_timeout: Duration,
    disconnect_timeout: Duration,
    broker: String,
}

impl Session {
    /// Opens a connection and waits for a successful CONNACK.
    pub async fn connect(config: &Config) -> Result<Self, TransferError> {
        let (client, event_loop) = ClientBuilder::from_config(config)?.build()?;
        let mut session = Self {
            client,
            event_loop,
            ack_timeout: config.connection_timeout(),
            disconnect_timeout: config.disconnect_timeout(),
            broker: config.address(),
        };

        debug!("Connecting to MQTT broker {}", session.broker);
        let timeout = session.ack_timeout;
        tokio::time::timeout(timeout, wait_for_connack(&mut session.event_loop))
            .await
            .map_err(|_| TransferError::Timeout {
                operation: "CONNACK",
                timeout,
            })??;
        debug!("Connected to MQTT broker {}", session.broker);

        Ok(session)
    }

    /// Publishes `payload` and waits until the broker confirms it per the QoS level.
    ///
    /// QoS 0 completes once the packet is written, QoS 1 on PUBACK and QoS 2
    /// on PUBCOMP.
    pub async fn publish(
        &mut self,
        metadata: &EndpointMetadata,
        payload: Vec<u8>,
    ) -> Result<(), TransferError> {
        let qos = metadata.qos()?;

        trace!(
            "Publishing {} bytes to '{}' (qos {}, retain {})",
            payload.len(),
            metadata.topic,
            metadata.qos,
            metadata.retain
        );

        self.client
            .publish(metadata.topic.clone(), qos, metadata.retain, payload)
            .await?;

        let timeout = self.ack_timeout;
        tokio::time::timeout(timeout, wait_for_delivery(&mut self.event_loop, qos))
            .await
            .map_err(|_| TransferError::Timeout {
                operation: "publish acknowledgement",
                timeout,
            })?
    }

    /// Sends DISCONNECT and drives the event loop until it is flushed or the grace period ends.
    ///
    /// Best effort: failures are logged and the connection is dropped either way.
    pub async fn close(mut self) {
        if let Err(e) = self.client.disconnect().await {
            warn!("Error queueing disconnect for {}: {}", self.broker, e);
            return;
        }

        match tokio::time::timeout(
            self.disconnect_timeout,
            drain_until_disconnect(&mut self.event_loop),
        )
        .await
        {
            Ok(()) => debug!("Disconnected from MQTT broker {}", self.broker),
            Err(_) => debug!(
                "Disconnect from {} not confirmed within {:?}, dropping connection",
                self.broker, self.disconnect_timeout
            ),
        }
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), TransferError> {
    loop {
        match event_loop.poll().await? {
            Event::Incoming(Packet::ConnAck(ack)) => {
                return match ack.code {
                    ConnectReturnCode::Success => Ok(()),
                    code => Err(TransferError::ConnectionRefused(format!("{code:?}"))),
                };
            }
            event => trace!("Event before CONNACK: {:?}", event),
        }
    }
}

async fn wait_for_delivery(event_loop: &mut EventLoop, qos: QoS) -> Result<(), TransferError> {
    let mut pkid = None;
    loop {
        match event_loop.poll().await? {
            Event::Outgoing(Outgoing::Publish(id)) => {
                if qos == QoS::AtMostOnce {
                    return Ok(());
                }
                pkid = Some(id);
            }
            Event::Incoming(Packet::PubAck(ack))
                if qos == QoS::AtLeastOnce && pkid == Some(ack.pkid) =>
            {
                return Ok(());
            }
            Event::Incoming(Packet::PubComp(comp))
                if qos == QoS::ExactlyOnce && pkid == Some(comp.pkid) =>
            {
                return Ok(());
            }
            Event::Incoming(Packet::Disconnect) => {
                return Err(TransferError::SessionClosed("publish acknowledgement"));
            }
            event => trace!("Event while awaiting delivery: {:?}", event),
        }
    }
}

async fn drain_until_disconnect(event_loop: &mut EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => return,
            Ok(event) => trace!("Event while disconnecting: {:?}", event),
            Err(e) => {
                trace!("Event loop ended while disconnecting: {}", e);
                return;
            }
        }
    }
}
