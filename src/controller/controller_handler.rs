use std::sync::Arc;

use chrono::Utc;
use log::info;
use tokio::sync::mpsc;

use super::supervisor::Supervisor;
use crate::configuration::config::Config;
use crate::configuration::types::HostConfig;
use crate::error_handling::types::*;
use crate::monitoring::aggregator::Aggregator;
use crate::monitoring::poller::Poller;
use crate::monitoring::status_client::{StatusClient, StatusSource};
use crate::storage::database_storage::DatabaseStorage;
use crate::storage::storage_trait::TelemetryStore;
use crate::storage::writers::{DataWriter, SessionWriter};

/// Owns the configuration and wires the whole pipeline together.
pub struct Controller {
    pub config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        info!(
            "Monitoring {} host(s) every {}s (read timeout {:?})",
            config.hosts.len(),
            config.interval_secs,
            config.read_timeout()
        );
        Ok(Self { config })
    }

    /// Runs the pipeline against the configured database until a unit stops.
    ///
    /// Never returns `Ok`: any unit ending is a failure of the whole pipeline.
    pub async fn run(&self) -> Result<(), ControllerError> {
        let storage = Arc::new(DatabaseStorage::connect(&self.config.database_url).await?);
        let timeout = self.config.read_timeout();
        let supervisor = self.build_pipeline(storage, |alias, target| {
            StatusClient::new(alias, target.clone(), timeout)
        });
        Err(supervisor.wait_for_first_exit().await)
    }

    /// Spawns both writers and one poller/aggregator pair per host.
    pub fn build_pipeline<S, C, F>(&self, store: Arc<S>, mut status_source: F) -> Supervisor
    where
        S: TelemetryStore,
        C: StatusSource + 'static,
        F: FnMut(&str, &HostConfig) -> C,
    {
        let capacity = self.config.channel_capacity();
        let (closed_tx, closed_rx) = mpsc::channel(capacity);
        let (samples_tx, samples_rx) = mpsc::channel(capacity);

        let mut supervisor = Supervisor::new();
        supervisor.spawn("session-writer", SessionWriter::new(store.clone()).run(closed_rx));
        supervisor.spawn("data-writer", DataWriter::new(store).run(samples_rx));

        let started_at = Utc::now();
        for (alias, target) in &self.config.hosts {
            let (snapshots_tx, snapshots_rx) = mpsc::channel(capacity);
            let poller = Poller::new(
                alias.as_str(),
                status_source(alias, target),
                self.config.interval(),
            );
            let aggregator = Aggregator::new(alias.as_str(), started_at);

            supervisor.spawn(format!("poller[{}]", alias), poller.run(snapshots_tx));
            supervisor.spawn(
                format!("aggregator[{}]", alias),
                aggregator.run(snapshots_rx, closed_tx.clone(), samples_tx.clone()),
            );
        }
        supervisor
    }
}
