//! Bounded-concurrency backup runs.
//!
//! Every device gets its own tokio task; a semaphore of `workers` permits
//! gates how many of them hold a live session at once. Results are
//! gathered only after every task has finished.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use log::{error, info, warn};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::{DEFAULT_TIMEOUT, Device, Model, ModelSet};
use crate::driver::{Artifact, BackupResult, DeviceTask};
use crate::error::{ChannelError, ConfigError};
use crate::output::OutputWriter;
use crate::transport::Connector;

/// Default number of concurrently active devices.
pub const DEFAULT_WORKERS: usize = 5;

/// Runs device tasks against a shared connector and output writer.
pub struct Orchestrator<C: Connector> {
    connector: Arc<C>,
    models: Arc<ModelSet>,
    writer: Arc<OutputWriter>,
    workers: usize,
    default_timeout: Duration,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(connector: C, models: ModelSet, writer: OutputWriter) -> Self {
        Self {
            connector: Arc::new(connector),
            models: Arc::new(models),
            writer: Arc::new(writer),
            workers: DEFAULT_WORKERS,
            default_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Worker limit; values below 1 are raised to 1.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Timeout for devices that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Warn about devices whose model is not loaded. They still get a
    /// failed result when the run happens.
    pub fn check_models(&self, devices: &[Device]) -> usize {
        let mut missing = 0;
        for device in devices.iter().filter(|d| !self.models.contains(&d.model)) {
            warn!("{}: model {:?} not found", device.name, device.model);
            missing += 1;
        }
        missing
    }

    /// Start one device's task. A device with an unknown model fails
    /// straight away without waiting for admission.
    fn spawn_device(&self, device: Arc<Device>, semaphore: Arc<Semaphore>) -> JoinHandle<BackupResult> {
        let model = self.models.get(&device.model);
        let connector = Arc::clone(&self.connector);
        let writer = Arc::clone(&self.writer);
        let timeout = device.effective_timeout(self.default_timeout);

        tokio::spawn(async move {
            let Some(model) = model else {
                let err = ConfigError::UnknownModel {
                    model: device.model.clone(),
                };
                return BackupResult::failed(device, err, Duration::ZERO);
            };
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return BackupResult::failed(device, ChannelError::Closed, Duration::ZERO);
            };
            backup_device(&*connector, model, &writer, device, timeout).await
        })
    }

    /// Back up every device, returning one result per device in input
    /// order.
    pub async fn run(&self, devices: Vec<Device>) -> Vec<BackupResult> {
        info!("backing up {} devices with {} workers", devices.len(), self.workers);
        let semaphore = Arc::new(Semaphore::new(self.workers));

        let devices: Vec<Arc<Device>> = devices.into_iter().map(Arc::new).collect();
        let handles = devices
            .iter()
            .map(|device| self.spawn_device(Arc::clone(device), Arc::clone(&semaphore)))
            .collect::<Vec<_>>();

        join_all(handles)
            .await
            .into_iter()
            .zip(devices)
            .map(|(joined, device)| match joined {
                Ok(result) => result,
                Err(e) => {
                    error!("{}: task aborted: {}", device.name, e);
                    let err = std::io::Error::other(format!("task aborted: {e}"));
                    BackupResult::failed(device, ChannelError::Io(err), Duration::ZERO)
                }
            })
            .collect()
    }
}

/// One admitted device from connect to persisted artifact.
async fn backup_device<C: Connector>(
    connector: &C,
    model: Arc<Model>,
    writer: &OutputWriter,
    device: Arc<Device>,
    timeout: Duration,
) -> BackupResult {
    let start = Instant::now();

    let text = match DeviceTask::new(connector, &device, model, timeout).run().await {
        Ok(text) => text,
        Err(e) => {
            warn!("{}: backup failed: {}", device.name, e);
            return BackupResult::failed(device, e, start.elapsed());
        }
    };

    match writer.write(&device, &text).await {
        Ok(path) => {
            info!("{}: saved to {}", device.name, path.display());
            BackupResult::success(device, Artifact { text, path }, start.elapsed())
        }
        Err(e) => {
            warn!("{}: write failed: {}", device.name, e);
            BackupResult::failed(device, e, start.elapsed())
        }
    }
}
