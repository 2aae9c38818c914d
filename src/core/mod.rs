//! Domain core: entities, derived metrics, Home Assistant discovery and the batch run.

pub mod discovery;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod publisher;
