//! The job engine: registry, coalescing, dispatch and expiry.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use depot_core::{new_guid, validate_key};
use depot_storage::{ByteSource, DataStorageService};

use crate::config::JobServiceConfig;
use crate::data::{JobData, JobDataEncoding, JobDataWithByteSink};
use crate::error::{JobRunnerError, JobServiceError};
use crate::job::{Job, JobStatus};
use crate::query::JobQuery;
use crate::runner::JobRunnerRegistry;
use crate::specification::JobSpecification;

/// Whether a submission may reuse an equivalent active job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CoalesceMode {
    /// Always create a new job.
    #[default]
    None,
    /// Reuse an equivalent job that is still queued.
    Queued,
    /// Reuse an equivalent job that is queued or running.
    QueuedOrStarted,
}

impl CoalesceMode {
    fn accepts(&self, status: JobStatus) -> bool {
        match self {
            CoalesceMode::None => false,
            CoalesceMode::Queued => status == JobStatus::Queued,
            CoalesceMode::QueuedOrStarted => status.is_queued_or_started(),
        }
    }
}

/// Everything guarded by the registry lock.
#[derive(Default)]
struct Registry {
    jobs: HashMap<String, Job>,
    data: HashMap<String, JobData>,
}

struct Inner {
    config: JobServiceConfig,
    storage: Arc<dyn DataStorageService>,
    runners: JobRunnerRegistry,
    registry: Mutex<Registry>,
    /// Signalled on every job state change.
    changed: Condvar,
    dispatch: Mutex<Option<mpsc::Sender<String>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

/// Handle to the job engine. Cheap to clone; all clones share one registry.
///
/// Workers only hold a weak reference, so the pool winds down once every
/// handle is dropped; [`Self::shutdown`] does the same deterministically.
#[derive(Clone)]
pub struct JobService {
    inner: Arc<Inner>,
}

impl fmt::Debug for JobService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobService")
            .field("config", &self.inner.config)
            .field("runners", &self.inner.runners)
            .finish_non_exhaustive()
    }
}

impl JobService {
    /// Build the engine and spawn its worker threads.
    pub fn start(
        config: JobServiceConfig,
        storage: Arc<dyn DataStorageService>,
        runners: JobRunnerRegistry,
    ) -> Self {
        let (tx, rx) = mpsc::channel::<String>();
        let rx = Arc::new(Mutex::new(rx));
        let worker_count = config.worker_count.max(1);

        let inner = Arc::new(Inner {
            config,
            storage,
            runners,
            registry: Mutex::new(Registry::default()),
            changed: Condvar::new(),
            dispatch: Mutex::new(Some(tx)),
            workers: Mutex::new(Vec::new()),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let name = format!("{}-{}", inner.config.name, i);
            let weak = Arc::downgrade(&inner);
            let rx = rx.clone();
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(name, weak, rx));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => error!(worker = i, error = %e, "failed to spawn job worker"),
            }
        }

        info!(
            workers = workers.len(),
            job_types = ?inner.runners.job_type_codes(),
            "job service started"
        );
        *lock(&inner.workers) = workers;

        Self { inner }
    }

    pub fn config(&self) -> &JobServiceConfig {
        &self.inner.config
    }

    /// The storage runners read supplied data from.
    pub fn storage(&self) -> &Arc<dyn DataStorageService> {
        &self.inner.storage
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        lock(&self.inner.registry)
    }

    // ----- submission -------------------------------------------------------

    /// Submit a specification; returns the guid of the job that will do the
    /// work, which is an existing job's guid on a coalescing hit.
    pub fn submit<S: JobSpecification>(
        &self,
        specification: S,
        coalesce_mode: CoalesceMode,
    ) -> Result<String, JobServiceError> {
        self.submit_shared(Arc::new(specification), coalesce_mode)
    }

    /// [`Self::submit`] for an already shared specification.
    pub fn submit_shared(
        &self,
        specification: Arc<dyn JobSpecification>,
        coalesce_mode: CoalesceMode,
    ) -> Result<String, JobServiceError> {
        let guid = specification.guid().to_string();
        let job_type_code = specification.job_type_code().to_string();
        validate_key(&guid)?;

        if !self.inner.runners.contains(&job_type_code) {
            error!(job_type = %job_type_code, "no runner registered; check the runner registry");
            return Err(JobServiceError::UnknownJobType(job_type_code));
        }

        // Finding an equivalent job and registering a new one happen under
        // one lock so concurrent submissions cannot both miss.
        let mut registry = self.registry();

        if let Some(existing) = registry.jobs.values().find(|job| {
            coalesce_mode.accepts(job.status())
                && job.specification().is_equivalent(specification.as_ref())
        }) {
            debug!(
                job_guid = %existing.guid(),
                job_type = %job_type_code,
                mode = ?coalesce_mode,
                "coalesced submission onto existing job"
            );
            return Ok(existing.guid().to_string());
        }

        if registry.jobs.contains_key(&guid) {
            return Err(JobServiceError::DuplicateGuid(guid));
        }

        {
            let dispatch = lock(&self.inner.dispatch);
            let sender = dispatch.as_ref().ok_or(JobServiceError::ShutDown)?;
            registry
                .jobs
                .insert(guid.clone(), Job::queued(specification, Utc::now()));
            if sender.send(guid.clone()).is_err() {
                registry.jobs.remove(&guid);
                return Err(JobServiceError::ShutDown);
            }
        }

        drop(registry);
        self.inner.changed.notify_all();

        info!(job_guid = %guid, job_type = %job_type_code, "job queued");
        Ok(guid)
    }

    // ----- queries ----------------------------------------------------------

    pub fn try_get_job(&self, guid: &str) -> Option<Job> {
        self.registry().jobs.get(guid).cloned()
    }

    pub fn get_job(&self, guid: &str) -> Result<Job, JobServiceError> {
        self.try_get_job(guid)
            .ok_or_else(|| JobServiceError::NotFound(guid.to_string()))
    }

    pub fn find_jobs(&self, query: &JobQuery) -> Vec<Job> {
        query.apply(self.registry().jobs.values())
    }

    pub fn total_jobs(&self, query: &JobQuery) -> usize {
        query.count(self.registry().jobs.values())
    }

    /// Whether the job has been cancelled; runners poll this to stop early.
    pub fn is_cancelled(&self, guid: &str) -> bool {
        self.registry()
            .jobs
            .get(guid)
            .is_some_and(|job| job.cancelled_at.is_some())
    }

    /// Block until the job concludes or `timeout` passes; returns the status
    /// observed last. A timeout too large to represent waits indefinitely.
    pub fn await_job_concluded(
        &self,
        guid: &str,
        timeout: Duration,
    ) -> Result<JobStatus, JobServiceError> {
        let deadline = Instant::now().checked_add(timeout);
        let mut registry = self.registry();

        loop {
            let status = registry
                .jobs
                .get(guid)
                .map(Job::status)
                .ok_or_else(|| JobServiceError::NotFound(guid.to_string()))?;

            if status.is_concluded() {
                return Ok(status);
            }

            registry = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(status);
                    }
                    self.inner
                        .changed
                        .wait_timeout(registry, remaining)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .inner
                    .changed
                    .wait(registry)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    // ----- mutation ---------------------------------------------------------

    fn update_job(
        &self,
        guid: &str,
        update: impl FnOnce(&mut Job),
    ) -> Result<(), JobServiceError> {
        {
            let mut registry = self.registry();
            let job = registry
                .jobs
                .get_mut(guid)
                .ok_or_else(|| JobServiceError::NotFound(guid.to_string()))?;
            update(job);
        }
        self.inner.changed.notify_all();
        Ok(())
    }

    pub fn set_progress_percent(&self, guid: &str, percent: u8) -> Result<(), JobServiceError> {
        if percent > 100 {
            return Err(JobServiceError::InvalidProgress(percent));
        }
        self.update_job(guid, |job| job.progress_percent = Some(percent))
    }

    /// Record a failure; the first recorded failure time is kept.
    pub fn set_job_fail_timestamp(&self, guid: &str) -> Result<(), JobServiceError> {
        self.update_job(guid, |job| {
            job.failed_at.get_or_insert_with(Utc::now);
        })?;
        info!(job_guid = %guid, "job marked failed");
        Ok(())
    }

    /// Cancel a job. A queued job will not be started; a running one keeps
    /// running unless its runner polls [`Self::is_cancelled`].
    pub fn set_job_cancel_timestamp(&self, guid: &str) -> Result<(), JobServiceError> {
        self.update_job(guid, |job| {
            job.cancelled_at.get_or_insert_with(Utc::now);
        })?;
        info!(job_guid = %guid, "job cancelled");
        Ok(())
    }

    // ----- data -------------------------------------------------------------

    /// Allocate an artifact generated by `job_guid` and open its sink.
    pub fn store_generated_data(
        &self,
        job_guid: &str,
        use_code: &str,
        media_type_code: &str,
        encoding: JobDataEncoding,
    ) -> Result<JobDataWithByteSink, JobServiceError> {
        let data = JobData {
            guid: new_guid(),
            job_guid: Some(job_guid.to_string()),
            use_code: use_code.to_string(),
            media_type_code: media_type_code.to_string(),
            encoding,
        };

        {
            let mut registry = self.registry();
            let job = registry
                .jobs
                .get_mut(job_guid)
                .ok_or_else(|| JobServiceError::NotFound(job_guid.to_string()))?;
            job.generated_data_guids.insert(data.guid.clone());
            registry.data.insert(data.guid.clone(), data.clone());
        }

        match self.inner.storage.put(&data.guid) {
            Ok(sink) => {
                debug!(job_guid = %job_guid, data_guid = %data.guid, use_code, "generated data allocated");
                Ok(JobDataWithByteSink { data, sink })
            }
            Err(e) => {
                let mut registry = self.registry();
                if let Some(job) = registry.jobs.get_mut(job_guid) {
                    job.generated_data_guids.remove(&data.guid);
                }
                registry.data.remove(&data.guid);
                Err(e.into())
            }
        }
    }

    /// Allocate an input artifact before the job that consumes it exists.
    ///
    /// List the returned guid in the specification's supplied data; unused
    /// supplied data is removed by [`Self::clear_orphaned_data`].
    pub fn store_supplied_data(
        &self,
        use_code: &str,
        media_type_code: &str,
        encoding: JobDataEncoding,
    ) -> Result<JobDataWithByteSink, JobServiceError> {
        let data = JobData {
            guid: new_guid(),
            job_guid: None,
            use_code: use_code.to_string(),
            media_type_code: media_type_code.to_string(),
            encoding,
        };

        let sink = self.inner.storage.put(&data.guid)?;
        self.registry().data.insert(data.guid.clone(), data.clone());
        debug!(data_guid = %data.guid, use_code, "supplied data allocated");
        Ok(JobDataWithByteSink { data, sink })
    }

    pub fn try_get_data(&self, data_guid: &str) -> Option<JobData> {
        self.registry().data.get(data_guid).cloned()
    }

    /// Descriptor and an open source for a known artifact.
    ///
    /// `Ok(None)` for an unknown guid; `DataNotFound` when the descriptor is
    /// known but storage no longer holds its bytes.
    pub fn try_obtain_data(
        &self,
        data_guid: &str,
    ) -> Result<Option<(JobData, ByteSource)>, JobServiceError> {
        let Some(data) = self.try_get_data(data_guid) else {
            return Ok(None);
        };
        match self.inner.storage.get(data_guid)? {
            Some(source) => Ok(Some((data, source))),
            None => {
                warn!(data_guid = %data_guid, "data descriptor has no stored bytes");
                Err(JobServiceError::DataNotFound(data_guid.to_string()))
            }
        }
    }

    /// Descriptors of everything the job generated.
    pub fn data_for_job(&self, job_guid: &str) -> Result<Vec<JobData>, JobServiceError> {
        let registry = self.registry();
        let job = registry
            .jobs
            .get(job_guid)
            .ok_or_else(|| JobServiceError::NotFound(job_guid.to_string()))?;
        Ok(job
            .generated_data_guids
            .iter()
            .filter_map(|guid| registry.data.get(guid).cloned())
            .collect())
    }

    // ----- maintenance ------------------------------------------------------

    /// Remove expired jobs and their artifacts; returns the number of jobs
    /// removed.
    pub fn clear_expired_jobs(&self) -> usize {
        self.clear_expired_jobs_at(Utc::now())
    }

    /// [`Self::clear_expired_jobs`] evaluated at `now`.
    pub fn clear_expired_jobs_at(&self, now: DateTime<Utc>) -> usize {
        let default_ttl = self.inner.config.default_time_to_live;

        let (expired, keys) = {
            let mut registry = self.registry();
            let expired: Vec<String> = registry
                .jobs
                .values()
                .filter(|job| job.is_expired(now, default_ttl))
                .map(|job| job.guid().to_string())
                .collect();

            // Supplied data goes with the job even if another job lists it.
            let mut keys = BTreeSet::new();
            for guid in &expired {
                if let Some(job) = registry.jobs.remove(guid) {
                    keys.extend(job.data_guids());
                }
            }

            for key in &keys {
                registry.data.remove(key);
            }

            (expired, keys)
        };

        if expired.is_empty() {
            return 0;
        }

        for key in &keys {
            if !self.inner.storage.remove(key) {
                warn!(data_guid = %key, "unable to delete data of expired job; continuing");
            }
        }

        self.inner.changed.notify_all();
        info!(jobs = expired.len(), data = keys.len(), "cleared expired jobs");
        expired.len()
    }

    /// Delete stored blobs older than `older_than` that no job references.
    pub fn clear_orphaned_data(&self, older_than: Duration) -> Result<usize, JobServiceError> {
        let candidates = self.inner.storage.keys(Some(older_than))?;

        let orphans: Vec<String> = {
            let mut registry = self.registry();
            let referenced: BTreeSet<String> =
                registry.jobs.values().flat_map(Job::data_guids).collect();
            let orphans: Vec<String> = candidates
                .into_iter()
                .filter(|key| !referenced.contains(key))
                .collect();
            for key in &orphans {
                registry.data.remove(key);
            }
            orphans
        };

        let removed = orphans
            .iter()
            .filter(|key| {
                let ok = self.inner.storage.remove(key);
                if !ok {
                    warn!(data_guid = %key, "unable to delete orphaned data; continuing");
                }
                ok
            })
            .count();

        if removed > 0 {
            info!(removed, "cleared orphaned data");
        }
        Ok(removed)
    }

    /// Stop accepting submissions and wait for workers to drain the queue.
    ///
    /// Must not be called from inside a runner.
    pub fn shutdown(&self) {
        lock(&self.inner.dispatch).take();

        let workers = std::mem::take(&mut *lock(&self.inner.workers));
        let current = thread::current().id();
        for handle in workers {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("job worker panicked during shutdown");
            }
        }

        info!(service = %self.inner.config.name, "job service stopped");
    }

    // ----- execution --------------------------------------------------------

    /// Run one dequeued job to completion on the calling worker.
    fn run_job(&self, guid: &str) {
        let specification = {
            let mut registry = self.registry();
            let Some(job) = registry.jobs.get_mut(guid) else {
                debug!(job_guid = %guid, "job was removed before it could start");
                return;
            };

            match job.status() {
                JobStatus::Queued => {}
                JobStatus::Cancelled => {
                    info!(job_guid = %guid, "job cancelled before start; skipping");
                    return;
                }
                other => {
                    warn!(job_guid = %guid, status = ?other, "dequeued job is not queued; skipping");
                    return;
                }
            }

            job.started_at = Some(Utc::now());
            job.shared_specification()
        };
        self.inner.changed.notify_all();

        let job_type_code = specification.job_type_code().to_string();
        let result = match self.inner.runners.get(&job_type_code) {
            Some(runner) => {
                info!(job_guid = %guid, job_type = %job_type_code, "job started");
                panic::catch_unwind(AssertUnwindSafe(|| {
                    runner.run_erased(self, specification.as_ref())
                }))
                .unwrap_or_else(|payload| Err(JobRunnerError::Panicked(panic_message(&*payload))))
            }
            None => Err(JobRunnerError::failed(format!(
                "no runner registered for job type: {job_type_code}"
            ))),
        };

        let concluded = self.update_job(guid, |job| {
            let now = Utc::now();
            match &result {
                Ok(()) => job.finished_at = Some(now),
                Err(_) => {
                    job.failed_at.get_or_insert(now);
                }
            }
        });

        match (&result, concluded) {
            (_, Err(_)) => {
                debug!(job_guid = %guid, "job was removed while running");
            }
            (Ok(()), Ok(())) => {
                info!(job_guid = %guid, job_type = %job_type_code, "job finished");
            }
            (Err(e), Ok(())) => {
                warn!(job_guid = %guid, job_type = %job_type_code, error = %e, "job failed");
            }
        }
    }
}

fn worker_loop(name: String, service: Weak<Inner>, rx: Arc<Mutex<mpsc::Receiver<String>>>) {
    debug!(worker = %name, "job worker started");

    loop {
        let next = lock(&rx).recv();
        let Ok(guid) = next else {
            break;
        };

        let Some(inner) = service.upgrade() else {
            break;
        };
        JobService { inner }.run_job(&guid);
    }

    debug!(worker = %name, "job worker stopped");
}

/// Locks are only held for short, self-contained updates, so the state is
/// consistent even if a holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::io::{Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use depot_storage::InMemoryDataStorageService;

    use super::*;
    use crate::runner::JobRunner;
    use crate::specification::SpecificationBase;

    #[derive(Debug)]
    struct CountingSpecification {
        base: SpecificationBase,
        fail: bool,
    }

    impl JobSpecification for CountingSpecification {
        fn job_type_code(&self) -> &str {
            "counting"
        }

        fn base(&self) -> &SpecificationBase {
            &self.base
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Default)]
    struct CountingRunner {
        runs: Arc<AtomicUsize>,
    }

    impl JobRunner for CountingRunner {
        type Specification = CountingSpecification;

        fn job_type_code(&self) -> &str {
            "counting"
        }

        fn run(
            &self,
            jobs: &JobService,
            specification: &CountingSpecification,
        ) -> Result<(), JobRunnerError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if specification.fail {
                return Err(JobRunnerError::failed("asked to fail"));
            }
            let mut out = jobs.store_generated_data(
                specification.guid(),
                "result",
                "text/plain",
                JobDataEncoding::None,
            )?;
            out.sink.write_all(b"done")?;
            Ok(())
        }
    }

    fn service() -> (JobService, Arc<AtomicUsize>, Arc<InMemoryDataStorageService>) {
        let runs = Arc::new(AtomicUsize::new(0));
        let registry = JobRunnerRegistry::new()
            .with(CountingRunner { runs: runs.clone() })
            .unwrap();
        let storage = InMemoryDataStorageService::arc();
        let service = JobService::start(
            JobServiceConfig::default().with_worker_count(2),
            storage.clone(),
            registry,
        );
        (service, runs, storage)
    }

    fn spec(fail: bool) -> CountingSpecification {
        CountingSpecification {
            base: SpecificationBase::new(),
            fail,
        }
    }

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn successful_job_finishes_and_keeps_its_output() {
        let (service, runs, _) = service();

        let guid = service.submit(spec(false), CoalesceMode::None).unwrap();
        assert_eq!(service.await_job_concluded(&guid, WAIT).unwrap(), JobStatus::Finished);

        let job = service.get_job(&guid).unwrap();
        assert!(job.queued_at.is_some() && job.started_at.is_some());
        assert!(job.started_at <= job.finished_at);
        assert_eq!(job.generated_data_guids.len(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let data_guid = job.generated_data_guids.iter().next().unwrap();
        let (data, mut source) = service.try_obtain_data(data_guid).unwrap().unwrap();
        assert_eq!(data.job_guid.as_deref(), Some(guid.as_str()));
        let mut s = String::new();
        source.read_to_string(&mut s).unwrap();
        assert_eq!(s, "done");

        service.shutdown();
    }

    #[test]
    fn runner_error_marks_job_failed() {
        let (service, _, _) = service();

        let guid = service.submit(spec(true), CoalesceMode::None).unwrap();
        assert_eq!(service.await_job_concluded(&guid, WAIT).unwrap(), JobStatus::Failed);
        assert!(service.get_job(&guid).unwrap().finished_at.is_none());

        service.shutdown();
    }

    #[test]
    fn unknown_job_type_is_rejected_without_registering() {
        let (service, _, _) = service();

        let err = service
            .submit(
                crate::specification::testing::TestSpecification::new("orphan"),
                CoalesceMode::None,
            )
            .unwrap_err();

        assert!(matches!(err, JobServiceError::UnknownJobType(code) if code == "test"));
        assert!(service.try_get_job("orphan").is_none());
        service.shutdown();
    }

    #[test]
    fn duplicate_guid_is_rejected() {
        let (service, _, _) = service();
        let first = CountingSpecification {
            base: SpecificationBase::with_guid("same"),
            fail: false,
        };
        let second = CountingSpecification {
            base: SpecificationBase::with_guid("same"),
            fail: false,
        };

        service.submit(first, CoalesceMode::None).unwrap();
        let err = service.submit(second, CoalesceMode::None).unwrap_err();
        assert!(matches!(err, JobServiceError::DuplicateGuid(_)));
        service.shutdown();
    }

    #[test]
    fn mutations_on_unknown_guid_report_not_found() {
        let (service, _, _) = service();

        assert!(matches!(
            service.set_progress_percent("missing", 5),
            Err(JobServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.set_job_fail_timestamp("missing"),
            Err(JobServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.set_job_cancel_timestamp("missing"),
            Err(JobServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.store_generated_data("missing", "x", "text/plain", JobDataEncoding::None),
            Err(JobServiceError::NotFound(_))
        ));
        service.shutdown();
    }

    #[test]
    fn progress_is_validated() {
        let (service, _, _) = service();
        let guid = service.submit(spec(false), CoalesceMode::None).unwrap();

        assert!(matches!(
            service.set_progress_percent(&guid, 101),
            Err(JobServiceError::InvalidProgress(101))
        ));
        service.set_progress_percent(&guid, 40).unwrap();
        assert_eq!(service.get_job(&guid).unwrap().progress_percent, Some(40));
        service.shutdown();
    }

    #[test]
    fn submit_after_shutdown_fails() {
        let (service, _, _) = service();
        service.shutdown();

        let err = service.submit(spec(false), CoalesceMode::None).unwrap_err();
        assert!(matches!(err, JobServiceError::ShutDown));
    }

    #[test]
    fn expiry_removes_job_and_its_data() {
        let (service, _, storage) = service();

        let guid = service.submit(spec(false), CoalesceMode::None).unwrap();
        service.await_job_concluded(&guid, WAIT).unwrap();
        let data_guid = service
            .get_job(&guid)
            .unwrap()
            .generated_data_guids
            .into_iter()
            .next()
            .unwrap();

        // Default ttl is hours away.
        assert_eq!(service.clear_expired_jobs(), 0);

        let later = Utc::now() + chrono::Duration::hours(3);
        assert_eq!(service.clear_expired_jobs_at(later), 1);
        assert!(service.try_get_job(&guid).is_none());
        assert!(service.try_get_data(&data_guid).is_none());
        assert!(storage.get(&data_guid).unwrap().is_none());
        service.shutdown();
    }

    #[test]
    fn orphaned_supplied_data_is_cleared() {
        let (service, _, storage) = service();

        let orphan = {
            let mut supplied = service
                .store_supplied_data("input", "text/plain", JobDataEncoding::None)
                .unwrap();
            supplied.sink.write_all(b"abandoned").unwrap();
            supplied.data.guid.clone()
        };
        assert!(service.try_get_data(&orphan).is_some());

        // Too young to be considered orphaned.
        assert_eq!(service.clear_orphaned_data(Duration::from_secs(60)).unwrap(), 0);

        storage.set_modified(&orphan, std::time::SystemTime::now() - Duration::from_secs(120));
        assert_eq!(service.clear_orphaned_data(Duration::from_secs(60)).unwrap(), 1);
        assert!(service.try_get_data(&orphan).is_none());
        assert!(storage.is_empty());
        service.shutdown();
    }

    #[test]
    fn supplied_data_listed_by_a_job_is_not_orphaned() {
        let (service, _, storage) = service();

        let input = service
            .store_supplied_data("input", "text/plain", JobDataEncoding::None)
            .unwrap()
            .data
            .guid;
        let guid = service
            .submit(
                CountingSpecification {
                    base: SpecificationBase::new().supplying(&input),
                    fail: false,
                },
                CoalesceMode::None,
            )
            .unwrap();
        service.await_job_concluded(&guid, WAIT).unwrap();

        let old = std::time::SystemTime::now() - Duration::from_secs(120);
        storage.set_modified(&input, old);
        for data_guid in service.get_job(&guid).unwrap().generated_data_guids {
            storage.set_modified(&data_guid, old);
        }

        assert_eq!(service.clear_orphaned_data(Duration::from_secs(60)).unwrap(), 0);
        assert!(storage.get(&input).unwrap().is_some());
        assert!(service.try_get_data(&input).is_some());
        service.shutdown();
    }

    #[test]
    fn unbounded_timeout_waits_for_the_job() {
        let (service, _, _) = service();

        let guid = service.submit(spec(false), CoalesceMode::None).unwrap();
        assert_eq!(
            service.await_job_concluded(&guid, Duration::MAX).unwrap(),
            JobStatus::Finished
        );
        service.shutdown();
    }

    #[test]
    fn descriptor_without_stored_bytes_is_data_not_found() {
        let (service, _, storage) = service();

        let guid = service.submit(spec(false), CoalesceMode::None).unwrap();
        service.await_job_concluded(&guid, WAIT).unwrap();
        let data_guid = service
            .get_job(&guid)
            .unwrap()
            .generated_data_guids
            .into_iter()
            .next()
            .unwrap();
        storage.remove(&data_guid);

        assert!(matches!(
            service.try_obtain_data(&data_guid),
            Err(JobServiceError::DataNotFound(g)) if g == data_guid
        ));
        assert!(matches!(service.try_obtain_data("never-stored"), Ok(None)));
        service.shutdown();
    }

    #[test]
    fn panicking_runner_fails_the_job_and_keeps_the_worker() {
        #[derive(Debug)]
        struct PanicSpecification(SpecificationBase);

        impl JobSpecification for PanicSpecification {
            fn job_type_code(&self) -> &str {
                "panic"
            }
            fn base(&self) -> &SpecificationBase {
                &self.0
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        struct PanicRunner;

        impl JobRunner for PanicRunner {
            type Specification = PanicSpecification;

            fn job_type_code(&self) -> &str {
                "panic"
            }

            fn run(&self, _: &JobService, _: &PanicSpecification) -> Result<(), JobRunnerError> {
                panic!("runner blew up");
            }
        }

        let registry = JobRunnerRegistry::new().with(PanicRunner).unwrap();
        let service = JobService::start(
            JobServiceConfig::default().with_worker_count(1),
            InMemoryDataStorageService::arc(),
            registry,
        );

        for _ in 0..2 {
            let guid = service
                .submit(PanicSpecification(SpecificationBase::new()), CoalesceMode::None)
                .unwrap();
            assert_eq!(service.await_job_concluded(&guid, WAIT).unwrap(), JobStatus::Failed);
        }
        service.shutdown();
    }
}
