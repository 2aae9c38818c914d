//! Construction of rumqttc clients from [`Config`].
//!
//! `ClientBuilder` turns a validated configuration into the `AsyncClient` /
//! `EventLoop` pair that a [`Session`](crate::Session) drives. Nothing
//! touches the network here; the CONNECT packet is only sent once the event
//! loop is polled.

use std::{fs, time::Duration};

use rumqttc::{AsyncClient, EventLoop, MqttOptions, TlsConfiguration, Transport};
use uuid::Uuid;
use validator::Validate;

use super::{
    config::{Config, TlsConfig},
    error::TransferError,
};

/// Prefix of generated client identifiers.
const CLIENT_ID_PREFIX: &str = "fuelbee";

/// Accumulates MQTT options and builds a client with its event loop.
pub struct ClientBuilder {
    opts: MqttOptions,
    cap: usize,
    tls_config: Option<TlsConfig>,
}

impl ClientBuilder {
    pub fn new(client_id: impl Into<String>, host: impl Into<String>, port: u16, cap: usize) -> Self {
        Self {
            opts: MqttOptions::new(client_id, host, port),
            cap,
            tls_config: None,
        }
    }

    /// Builds from a configuration, validating it first.
    ///
    /// An empty `client_id` is replaced by a generated one so that two
    /// back-to-back sessions never collide on the broker.
    pub fn from_config(config: &Config) -> Result<Self, TransferError> {
        config.validate()?;

        let client_id = if config.client_id.is_empty() {
            generated_client_id()
        } else {
            config.client_id.clone()
        };

        let mut builder = Self::new(
            client_id,
            config.host.clone(),
            config.port,
            config.request_channel_capacity.unwrap_or(10) as usize,
        )
        .keep_alive(config.keep_alive)
        .clean_session(true);

        if !config.username.is_empty() {
            builder = builder.credentials(&config.username, &config.password);
        }

        if let Some(max_packet_size) = config.max_packet_size {
            builder = builder.max_packet_size(max_packet_size as usize, max_packet_size as usize);
        }

        builder.tls_config = config.tls.clone().filter(|tls| tls.ca_cert_path.is_some());
        Ok(builder)
    }

    pub fn with_tls_ca_only(mut self, ca_cert_path: impl Into<String>) -> Self {
        self.tls_config = Some(TlsConfig::with_ca_only(ca_cert_path));
        self
    }

    pub fn keep_alive(mut self, secs: u64) -> Self {
        self.opts.set_keep_alive(Duration::from_secs(secs));
        self
    }

    pub fn max_packet_size(mut self, incoming: usize, outgoing: usize) -> Self {
        self.opts.set_max_packet_size(incoming, outgoing);
        self
    }

    pub fn clean_session(mut self, clean: bool) -> Self {
        self.opts.set_clean_session(clean);
        self
    }

    /// Credentials travel in clear text unless TLS is configured.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.opts.set_credentials(username, password);
        self
    }

    fn build_tls_transport(tls: &TlsConfig) -> Result<Transport, TransferError> {
        tls.validate_config()
            .map_err(|e| TransferError::ClientSetup(format!("Invalid TLS configuration: {e}")))?;

        let ca = match &tls.ca_cert_path {
            Some(path) => fs::read(path)?,
            None => return Err(TransferError::ClientSetup("TLS configuration is not set".into())),
        };

        let client_auth = match (&tls.client_cert_path, &tls.client_key_path) {
            (Some(cert), Some(key)) => Some((fs::read(cert)?, fs::read(key)?)),
            _ => None,
        };

        Ok(Transport::Tls(TlsConfiguration::Simple {
            ca,
            client_auth,
            alpn: None,
        }))
    }

    /// Consumes the builder. The event loop must be polled for anything to happen.
    pub fn build(self) -> Result<(AsyncClient, EventLoop), TransferError> {
        let mut opts = self.opts;
        if let Some(tls) = &self.tls_config {
            opts.set_transport(Self::build_tls_transport(tls)?);
        }

        Ok(AsyncClient::new(opts, self.cap))
    }
}

fn generated_client_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{CLIENT_ID_PREFIX}-{}", &id[..12])
}
