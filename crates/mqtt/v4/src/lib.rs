//! # fuelbee-mqtt-v4: short-lived MQTT 3.1.1 sessions
//!
//! Thin layer over `rumqttc` for batch publishers that connect, send a few
//! messages with confirmed delivery, and disconnect again:
//!
//! - [`Config`]: broker settings with `validator` rules, deserializable from TOML
//! - [`ClientBuilder`]: turns a `Config` into an `AsyncClient` + `EventLoop`
//! - [`Session`]: one connection, driven inline until each publish is acknowledged
//! - [`TransferError`]: the single error type returned by every operation
//!
//! Nothing here reconnects. A session that fails is closed and the error is
//! handed back to the caller.
//!
//! ```ignore
//! use fuelbee_mqtt_v4::{Config, EndpointMetadata, Session};
//!
//! let config: Config = toml::from_str(r#"host = "mqtt.local""#)?;
//! let mut session = Session::connect(&config).await?;
//! session
//!     .publish(&EndpointMetadata::at_least_once("sensors/garage"), b"{}".to_vec())
//!     .await?;
//! session.close().await;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;

pub use client::ClientBuilder;
pub use config::{Config, EndpointMetadata, TlsConfig};
pub use error::{root_cause, TransferError};
pub use session::Session;
