//! Periodic expiry sweep.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::service::JobService;

/// Runs [`JobService::clear_expired_jobs`] on a background thread.
#[derive(Debug, Clone)]
pub struct JobMaintenance {
    pub interval: Duration,
}

impl JobMaintenance {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Use the service's configured maintenance interval.
    pub fn for_service(service: &JobService) -> Self {
        Self::new(service.config().maintenance_interval)
    }

    /// Spawn the sweep thread. It sweeps every `interval` and whenever
    /// triggered; it never sweeps on startup.
    pub fn spawn(&self, service: JobService) -> std::io::Result<JobMaintenanceHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);
        let (done_tx, done_rx) = mpsc::sync_channel::<usize>(1);

        let interval = self.interval.max(Duration::from_millis(1));
        let join = thread::Builder::new()
            .name("job-maintenance".to_string())
            .spawn(move || {
                maintenance_loop(service, interval, shutdown_rx, trigger_rx, done_tx)
            })?;

        Ok(JobMaintenanceHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            sweeps: done_rx,
            join: Some(join),
        })
    }
}

/// Handle for the running sweep thread.
#[derive(Debug)]
pub struct JobMaintenanceHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    sweeps: mpsc::Receiver<usize>,
    join: Option<thread::JoinHandle<()>>,
}

impl JobMaintenanceHandle {
    /// Request a sweep now. Triggers coalesce: if one is already pending this
    /// is a no-op.
    ///
    /// Results of earlier sweeps that nobody awaited are discarded, so the
    /// next [`Self::await_sweep`] reports a sweep that ran after this call.
    pub fn trigger(&self) {
        while self.sweeps.try_recv().is_ok() {}
        let _ = self.trigger.try_send(());
    }

    /// Wait for the next sweep result; returns how many jobs that sweep
    /// removed. Without a preceding [`Self::trigger`] this may be the result
    /// of a periodic sweep that completed earlier and was never awaited.
    pub fn await_sweep(&self, timeout: Duration) -> Option<usize> {
        self.sweeps.recv_timeout(timeout).ok()
    }

    /// Stop the thread and wait for it to exit.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

fn maintenance_loop(
    service: JobService,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    done_tx: mpsc::SyncSender<usize>,
) {
    info!(interval_ms = interval.as_millis() as u64, "job maintenance started");

    let mut next_tick = Instant::now() + interval;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let mut pending = false;

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if a sweep ran long.
            while next_tick <= now {
                next_tick += interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(50));
            thread::sleep(sleep_for);
            continue;
        }

        let removed = service.clear_expired_jobs();
        debug!(removed, "maintenance sweep complete");
        // Unobserved results are dropped rather than queued.
        let _ = done_tx.try_send(removed);
    }

    info!("job maintenance stopped");
}
