//! Runs a `download` job through the full engine and prints its artifact.
//!
//! Usage: `depot-jobs [lines] [delay-per-line-millis]`

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};

use depot_jobs::runners::DownloadJobSpecification;
use depot_jobs::{
    CoalesceMode, JobMaintenance, JobRunnerRegistry, JobService, JobServiceConfig, JobStatus,
};
use depot_storage::{LocalDataStorageService, StorageConfig};

fn main() -> anyhow::Result<()> {
    depot_observability::init();

    let mut args = std::env::args().skip(1);
    let lines: u32 = args
        .next()
        .map(|a| a.parse::<u32>())
        .transpose()
        .context("lines must be a non-negative integer")?
        .unwrap_or(3);
    let delay: u64 = args
        .next()
        .map(|a| a.parse::<u64>())
        .transpose()
        .context("delay must be a non-negative integer")?
        .unwrap_or(0);

    let config = JobServiceConfig::from_env()?;
    let storage = LocalDataStorageService::new(&StorageConfig::from_env())?;
    let service = JobService::start(config, Arc::new(storage), JobRunnerRegistry::standard());
    let maintenance = JobMaintenance::for_service(&service).spawn(service.clone())?;

    let guid = service.submit(DownloadJobSpecification::new(lines, delay), CoalesceMode::None)?;
    tracing::info!(job_guid = %guid, lines, "submitted download job");

    let timeout = Duration::from_millis(delay.saturating_mul(u64::from(lines))) + Duration::from_secs(30);
    let status = service.await_job_concluded(&guid, timeout)?;
    if status != JobStatus::Finished {
        bail!("job {guid} did not finish (status {status:?})");
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for data in service.data_for_job(&guid)? {
        let Some((_, mut source)) = service.try_obtain_data(&data.guid)? else {
            bail!("generated data {} is missing from storage", data.guid);
        };
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        out.write_all(&bytes)?;
    }
    out.flush()?;

    maintenance.shutdown();
    service.shutdown();
    Ok(())
}
