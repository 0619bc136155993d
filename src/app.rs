//! Core application runner for `airthings-wave-mqtt`.
//!
//! This module is decoupled from CLI parsing and process exit codes so the
//! cycle loop can be tested with injected collaborators.

use crate::cycle::{Controller, CycleOutcome, Stage};
use crate::scanner::ScanError;
use log::info;
use std::future::Future;
use thiserror::Error;
use tokio::time::sleep;

/// Errors returned by the run loop.
#[derive(Error, Debug)]
pub enum RunError {
    /// The radio could not be set up at all.
    #[error(transparent)]
    Bluetooth(#[from] ScanError),
    /// Single-cycle mode ended with a failed cycle.
    #[error("cycle failed while {0}")]
    CycleFailed(Stage),
}

/// Run duty cycles until `shutdown` resolves.
///
/// Between cycles the loop suspends for the duration the cycle selected; a
/// shutdown request interrupts the suspension but never a running cycle.
/// With `once` set, exactly one cycle runs and its status is returned.
pub async fn run_cycles<F>(
    controller: &Controller<'_>,
    once: bool,
    shutdown: F,
) -> Result<(), RunError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let report = controller.run_cycle().await;

        if once {
            return match report.outcome {
                CycleOutcome::Completed { .. } => Ok(()),
                CycleOutcome::Failed(e) => Err(RunError::CycleFailed(e.stage())),
            };
        }

        tokio::select! {
            _ = sleep(report.next_sleep) => {}
            _ = &mut shutdown => {
                info!("Shutdown requested, exiting");
                return Ok(());
            }
        }
    }
}

/// Wire the BlueZ and MQTT backends together and run until `shutdown`.
#[cfg(all(feature = "bluer", feature = "mqtt"))]
pub async fn run<F>(config: &crate::config::Config, shutdown: F) -> Result<(), RunError>
where
    F: Future<Output = ()>,
{
    use crate::acquisition::bluer::BluerConnector;
    use crate::publish::PublishPipeline;
    use crate::publish::mqtt::MqttBroker;
    use crate::publish::probe::ResolveProbe;
    use crate::scanner::bluer::{BluerScanner, open_adapter};

    // The session must outlive every use of the adapter.
    let (_session, adapter) = open_adapter(config.adapter.as_deref()).await?;
    info!("Using Bluetooth adapter {}", adapter.name());

    let scanner = BluerScanner::new(adapter.clone());
    let connector = BluerConnector::new(adapter);
    let network = ResolveProbe::new(config.mqtt_host.as_str(), config.mqtt_port);
    let broker = MqttBroker;

    let controller = Controller {
        scanner: &scanner,
        connector: &connector,
        pipeline: PublishPipeline {
            network: &network,
            broker: &broker,
            settings: config.broker_settings(),
            topics: config.topics(),
            network_wait: config.network_wait,
            network_poll: config.network_poll,
        },
        scan_window: config.scan_window,
        policy: config.sleep_policy(),
    };

    run_cycles(&controller, config.once, shutdown).await
}
