//! fuelbee: publishes CarReport refueling data to Home Assistant over MQTT
//!
//! A batch job meant to run from a systemd timer or cron. Each run reads the
//! newest CarReport SQLite backup, derives per-vehicle metrics from the last
//! refuelings, announces one Home Assistant device per vehicle through MQTT
//! discovery, and publishes the current state.
//!
//! ## Modules
//!
//! * `config`: TOML configuration with `validator` rules and environment
//!   overrides for broker credentials.
//!
//! * `core`: the domain.
//!   - Entities loaded from the snapshot
//!   - Derived metrics (price per unit, deltas, timestamps)
//!   - Discovery catalogue and topic layout
//!   - Broker abstraction and the Home Assistant client
//!   - Batch orchestrator
//!
//! * `logger`: `tracing` subscriber setup with console and journald output.
//!
//! * `store`: snapshot selection and read-only SQLite loading.
//!
//! The MQTT transport lives in the `fuelbee-mqtt-v4` workspace crate.

pub mod config;
pub mod core;
pub mod logger;
pub mod store;
