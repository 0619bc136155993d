//! One duty cycle: discover, acquire, publish, then pick the next sleep.
//!
//! Every cycle starts from scratch. There is no failure counting across
//! cycles: a cycle either completes and the device sleeps for the normal
//! interval, or it fails at some stage and the device sleeps for the short
//! retry interval.

use crate::acquisition::{self, AcquireError, GattConnector};
use crate::publish::{PublishError, PublishPipeline};
use crate::scanner::{self, DiscoveryOutcome, ScanError, Scanner};
use crate::sensor::{DeviceVariant, KNOWN_SERVICES};
use log::{info, warn};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default sleep after a failed cycle.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Default sleep after a successful cycle.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_secs(3600);

/// Stage a cycle is in (or failed in).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Discovering,
    Acquiring,
    Publishing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Discovering => write!(f, "discovering"),
            Stage::Acquiring => write!(f, "acquiring"),
            Stage::Publishing => write!(f, "publishing"),
        }
    }
}

/// Any reason a cycle can fail. All of them are recoverable.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error("no Wave sensor found within {0:?}")]
    ScanTimeout(Duration),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl CycleError {
    /// The stage this error aborts.
    pub fn stage(&self) -> Stage {
        match self {
            CycleError::ScanTimeout(_) | CycleError::Scan(_) => Stage::Discovering,
            CycleError::Acquire(_) => Stage::Acquiring,
            CycleError::Publish(_) => Stage::Publishing,
        }
    }
}

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    Completed {
        variant: DeviceVariant,
        published: usize,
    },
    Failed(CycleError),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Completed { .. })
    }
}

/// The two sleep durations a cycle can end with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepPolicy {
    pub retry_interval: Duration,
    pub cycle_interval: Duration,
}

impl Default for SleepPolicy {
    fn default() -> Self {
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        }
    }
}

impl SleepPolicy {
    pub fn next_sleep(&self, outcome: &CycleOutcome) -> Duration {
        if outcome.is_success() {
            self.cycle_interval
        } else {
            self.retry_interval
        }
    }
}

/// Result of a single cycle together with the sleep it selected.
#[derive(Debug)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    pub next_sleep: Duration,
}

/// Runs duty cycles against a fixed set of collaborators.
pub struct Controller<'a> {
    pub scanner: &'a dyn Scanner,
    pub connector: &'a dyn GattConnector,
    pub pipeline: PublishPipeline<'a>,
    pub scan_window: Duration,
    pub policy: SleepPolicy,
}

impl Controller<'_> {
    /// Run one complete cycle. Never fails; failures are part of the report.
    pub async fn run_cycle(&self) -> CycleReport {
        let outcome = match self.stages().await {
            Ok((variant, published)) => {
                info!("Cycle complete: published {} values from {}", published, variant);
                CycleOutcome::Completed { variant, published }
            }
            Err(e) => {
                warn!("Cycle failed while {}: {}", e.stage(), e);
                CycleOutcome::Failed(e)
            }
        };

        let next_sleep = self.policy.next_sleep(&outcome);
        info!("Next cycle in {:?}", next_sleep);
        CycleReport {
            outcome,
            next_sleep,
        }
    }

    async fn stages(&self) -> Result<(DeviceVariant, usize), CycleError> {
        info!("Scanning for Wave sensors ({:?} window)", self.scan_window);
        let address =
            match scanner::scan_for_device(self.scanner, &KNOWN_SERVICES, self.scan_window).await? {
                DiscoveryOutcome::Found(address) => address,
                DiscoveryOutcome::NotFound => {
                    return Err(CycleError::ScanTimeout(self.scan_window));
                }
            };

        info!("Reading sensor {}", address);
        let reading = acquisition::acquire(self.connector, address).await?;

        info!("Publishing {} reading", reading.variant());
        let published = self.pipeline.publish(&reading).await?;
        Ok((reading.variant(), published))
    }
}
