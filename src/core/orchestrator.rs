//! Batch run over all loaded vehicles.

use tracing::info;

use super::{metrics::hex_color, model::Vehicle, publisher::HaClient};

/// Outcome of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub published: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.published + self.failed
    }

    pub fn all_published(&self) -> bool {
        self.failed == 0
    }
}

/// Publishes vehicles one after another. A failing vehicle never stops the batch.
pub struct Orchestrator {
    client: HaClient,
}

impl Orchestrator {
    pub fn new(client: HaClient) -> Self {
        Self { client }
    }

    pub async fn run(&self, vehicles: &[Vehicle]) -> RunSummary {
        let mut summary = RunSummary::default();

        for vehicle in vehicles {
            info!(
                "Publishing vehicle '{}' (color {}, {} refuelings)",
                vehicle.name,
                hex_color(vehicle.color),
                vehicle.refuelings.len()
            );

            if self.client.initialize_vehicle(vehicle).await {
                summary.published += 1;
            } else {
                summary.failed += 1;
            }
        }

        info!(
            "Run finished: {} published, {} failed",
            summary.published, summary.failed
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tracing_test::traced_test;

    use super::*;
    use crate::core::{
        model::fixtures::*,
        publisher::mock::{Call, RecordingBroker},
    };

    fn named(name: &str) -> Vehicle {
        vehicle(name, vec![refueling(1, 1_600_000_000_000, 1000, 40.0, 60.0)])
    }

    #[tokio::test]
    async fn empty_batch_publishes_nothing() {
        let broker = Arc::new(RecordingBroker::default());
        let orchestrator = Orchestrator::new(HaClient::new(broker.clone(), "homeassistant"));

        let summary = orchestrator.run(&[]).await;

        assert_eq!(summary, RunSummary::default());
        assert!(summary.all_published());
        assert!(broker.calls().is_empty());
    }

    #[tokio::test]
    #[traced_test]
    async fn failure_of_one_vehicle_does_not_stop_the_next() {
        let broker = Arc::new(RecordingBroker::failing_on("car_report_broken/"));
        let orchestrator = Orchestrator::new(HaClient::new(broker.clone(), "homeassistant"));

        let summary = orchestrator
            .run(&[named("Broken"), named("Working Car")])
            .await;

        assert_eq!(
            summary,
            RunSummary {
                published: 1,
                failed: 1
            }
        );
        assert_eq!(summary.total(), 2);

        let topics: Vec<_> = broker.published().into_iter().map(|(t, _)| t).collect();
        assert!(topics
            .iter()
            .all(|t| t.contains("/car_report_working_car/")));
        assert!(topics
            .iter()
            .any(|t| t == "homeassistant/sensor/car_report_working_car/state"));

        assert!(logs_contain("Publishing vehicle 'Broken' (color #336699"));
        assert!(logs_contain("Discovery for 'Broken' failed"));
        assert!(logs_contain("Run finished: 1 published, 1 failed"));
    }

    #[tokio::test]
    async fn vehicles_are_processed_in_load_order() {
        let broker = Arc::new(RecordingBroker::default());
        let orchestrator = Orchestrator::new(HaClient::new(broker.clone(), "homeassistant"));

        let summary = orchestrator.run(&[named("B"), named("A")]).await;
        assert_eq!(summary.published, 2);

        let states: Vec<_> = broker
            .published()
            .into_iter()
            .map(|(t, _)| t)
            .filter(|t| t.ends_with("/state"))
            .collect();
        assert_eq!(
            states,
            [
                "homeassistant/sensor/car_report_b/state",
                "homeassistant/sensor/car_report_a/state"
            ]
        );
        assert_eq!(
            broker.calls().iter().filter(|c| **c == Call::Open).count(),
            4
        );
    }
}
