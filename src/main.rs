use std::{env, path::PathBuf, process, sync::Arc};

use fuelbee::{
    config::Config,
    core::{
        orchestrator::Orchestrator,
        publisher::{HaClient, MqttBroker},
    },
    logger::LoggerManager,
    print_error,
    store::{latest_snapshot, SnapshotStore},
};
use tracing::{debug, error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cfg = Config::new(env::args_os().nth(1).map(PathBuf::from)).unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });
    info!("Starting fuelbee version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.transport);

    let snapshot = latest_snapshot(&cfg.source.db_root, cfg.source.extension_filter())
        .unwrap_or_else(|e| {
            error!("Failed to select snapshot: {}", e);
            process::exit(1);
        });
    info!("Reading snapshot {}", snapshot.display());

    let vehicles = SnapshotStore::open(&snapshot)
        .and_then(|store| store.load_vehicles())
        .unwrap_or_else(|e| {
            error!("Failed to load vehicles: {}", e);
            process::exit(1);
        });
    if vehicles.is_empty() {
        warn!("Snapshot contains no vehicles");
    }

    info!(
        "Publishing to MQTT broker {} (discovery prefix '{}')",
        cfg.transport.address(),
        cfg.homeassistant.discovery_prefix
    );
    let broker = Arc::new(MqttBroker::new(cfg.transport.clone()));
    let client = HaClient::new(broker, cfg.homeassistant.discovery_prefix.clone());

    let summary = Orchestrator::new(client).run(&vehicles).await;
    if !summary.all_published() {
        warn!(
            "{} of {} vehicles could not be published",
            summary.failed,
            summary.total()
        );
    }
}
