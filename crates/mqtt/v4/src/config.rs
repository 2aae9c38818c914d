//! Broker connection settings.
//!
//! All types deserialize with serde (the application embeds [`Config`] as the
//! `[transport]` table of its TOML file) and carry `validator` rules so that a
//! bad broker configuration fails at load time rather than on the first
//! connect.
//!
//! ```toml
//! host = "mqtt.home.local"
//! port = 1883
//! username = "homeassistant"
//! password = "secret"
//! connection_timeout = 10
//! disconnect_timeout_ms = 250
//!
//! [tls]
//! ca_cert_path = "/etc/mqtt/ca.pem"
//! ```

use std::{path::Path, time::Duration};

use rumqttc::QoS;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::error::TransferError;

/// MQTT broker configuration for short-lived publishing sessions.
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Broker hostname or IP address.
    #[validate(length(
        min = 1,
        max = 255,
        message = "Host must be between 1 and 255 characters"
    ))]
    pub host: String,

    /// Broker port. 1883 for plain TCP, 8883 for TLS.
    #[validate(range(min = 1, max = 65535, message = "Port must be between 1 and 65535"))]
    pub port: u16,

    /// Username sent in CONNECT. Empty means anonymous.
    pub username: String,

    /// Password sent in CONNECT together with `username`.
    pub password: String,

    /// Client identifier. Empty generates a fresh id for every session.
    #[validate(length(max = 36, message = "Client ID must not exceed 36 characters"))]
    pub client_id: String,

    /// Keep-alive interval in seconds.
    #[validate(range(
        min = 5,
        max = 3600,
        message = "Keep alive must be between 5 and 3600 seconds"
    ))]
    pub keep_alive: u64,

    /// Upper bound, in seconds, for CONNACK and for each publish acknowledgement.
    #[validate(range(
        min = 1,
        max = 300,
        message = "Connection timeout must be between 1 and 300 seconds"
    ))]
    pub connection_timeout: u64,

    /// Grace period for a clean DISCONNECT before the session is dropped.
    #[validate(range(
        min = 1,
        max = 10000,
        message = "Disconnect timeout must be between 1 and 10000 milliseconds"
    ))]
    pub disconnect_timeout_ms: u64,

    /// Maximum MQTT packet size in bytes, applied in both directions.
    #[validate(range(
        min = 64,
        max = 65535,
        message = "Max packet size must be between 64 and 65535 bytes"
    ))]
    pub max_packet_size: Option<u16>,

    /// Capacity of the rumqttc request channel.
    #[validate(range(
        min = 1,
        max = 255,
        message = "Request channel capacity must be between 1 and 255"
    ))]
    pub request_channel_capacity: Option<u8>,

    /// Optional TLS settings. Absent means plain TCP.
    #[validate(nested)]
    pub tls: Option<TlsConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "localhost".to_string(),
            port: 1883,
            username: String::new(),
            password: String::new(),
            client_id: String::new(),
            keep_alive: 30,
            connection_timeout: 10,
            disconnect_timeout_ms: 250,
            max_packet_size: None,
            request_channel_capacity: Some(10),
            tls: None,
        }
    }
}

impl Config {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout)
    }

    pub fn disconnect_timeout(&self) -> Duration {
        Duration::from_millis(self.disconnect_timeout_ms)
    }

    /// Broker address as `host:port`, for log lines.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// The password never reaches the logs through `{:?}`.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("client_id", &self.client_id)
            .field("keep_alive", &self.keep_alive)
            .field("connection_timeout", &self.connection_timeout)
            .field("disconnect_timeout_ms", &self.disconnect_timeout_ms)
            .field("max_packet_size", &self.max_packet_size)
            .field("request_channel_capacity", &self.request_channel_capacity)
            .field("tls", &self.tls)
            .finish()
    }
}

/// TLS certificate paths. Files are read when the client is built.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct TlsConfig {
    /// CA certificate (PEM) used to verify the broker.
    #[validate(custom(
        function = "validate_file_path",
        message = "CA certificate file does not exist"
    ))]
    pub ca_cert_path: Option<String>,

    /// Client certificate (PEM) for mutual TLS. Requires `client_key_path`.
    #[validate(custom(
        function = "validate_file_path",
        message = "Client certificate file does not exist"
    ))]
    pub client_cert_path: Option<String>,

    /// Unencrypted client private key (PEM) for mutual TLS.
    #[validate(custom(
        function = "validate_file_path",
        message = "Client key file does not exist"
    ))]
    pub client_key_path: Option<String>,
}

impl TlsConfig {
    pub fn with_ca_only(ca_cert_path: impl Into<String>) -> Self {
        TlsConfig {
            ca_cert_path: Some(ca_cert_path.into()),
            client_cert_path: None,
            client_key_path: None,
        }
    }

    /// Checks that a CA is present and that client auth is either complete or absent.
    pub fn validate_config(&self) -> Result<(), ValidationError> {
        let Some(ca) = &self.ca_cert_path else {
            return Err(ValidationError::new("missing_ca_cert")
                .with_message("CA certificate path is required".into()));
        };
        validate_file_path(ca)?;

        match (&self.client_cert_path, &self.client_key_path) {
            (Some(cert), Some(key)) => {
                validate_file_path(cert)?;
                validate_file_path(key)
            }
            (None, None) => Ok(()),
            _ => Err(ValidationError::new("incomplete_client_auth").with_message(
                "Both client certificate and key must be provided or neither".into(),
            )),
        }
    }
}

fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(
            ValidationError::new("empty_path").with_message("File path cannot be empty".into())
        );
    }

    if !Path::new(path).is_file() {
        return Err(ValidationError::new("file_not_found")
            .with_message(format!("File does not exist: {path}").into()));
    }

    Ok(())
}

/// Destination of a single publish: topic, QoS level and retain flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EndpointMetadata {
    #[validate(range(min = 0, max = 2, message = "Invalid QoS value, must be 0, 1, or 2"))]
    pub qos: u8,

    #[validate(length(min = 1, message = "Topic must not be empty"))]
    pub topic: String,

    pub retain: bool,
}

impl EndpointMetadata {
    /// At-least-once, non-retained delivery to `topic`.
    pub fn at_least_once(topic: impl Into<String>) -> Self {
        Self {
            qos: 1,
            topic: topic.into(),
            retain: false,
        }
    }

    pub fn qos(&self) -> Result<QoS, TransferError> {
        match self.qos {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(TransferError::InvalidMetadata(format!(
                "Invalid QoS value {other}, must be 0, 1, or 2"
            ))),
        }
    }
}
