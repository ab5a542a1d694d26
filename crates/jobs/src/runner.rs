//! Runner abstraction and the type-code registry.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{JobRunnerError, JobServiceError};
use crate::runners::{DownloadJobRunner, LineCountJobRunner};
use crate::service::JobService;
use crate::specification::JobSpecification;

/// Executes specifications of one job type.
///
/// Runners get a handle to the engine for storing generated data and
/// reporting progress. Returning an error marks the job failed; there is no
/// retry. Cancellation is cooperative: a long runner may poll
/// [`JobService::is_cancelled`].
pub trait JobRunner: Send + Sync + 'static {
    type Specification: JobSpecification;

    fn job_type_code(&self) -> &str;

    fn run(
        &self,
        jobs: &JobService,
        specification: &Self::Specification,
    ) -> Result<(), JobRunnerError>;
}

/// Object-safe form of [`JobRunner`] stored in the registry.
pub(crate) trait ErasedJobRunner: Send + Sync {
    fn job_type_code(&self) -> &str;

    fn run_erased(
        &self,
        jobs: &JobService,
        specification: &dyn JobSpecification,
    ) -> Result<(), JobRunnerError>;
}

impl<R: JobRunner> ErasedJobRunner for R {
    fn job_type_code(&self) -> &str {
        JobRunner::job_type_code(self)
    }

    fn run_erased(
        &self,
        jobs: &JobService,
        specification: &dyn JobSpecification,
    ) -> Result<(), JobRunnerError> {
        let typed = specification
            .as_any()
            .downcast_ref::<R::Specification>()
            .ok_or_else(|| JobRunnerError::SpecificationMismatch {
                job_type_code: specification.job_type_code().to_string(),
                expected: type_name::<R::Specification>(),
            })?;
        self.run(jobs, typed)
    }
}

/// Type code → runner, built once before the service starts.
#[derive(Default, Clone)]
pub struct JobRunnerRegistry {
    runners: HashMap<String, Arc<dyn ErasedJobRunner>>,
}

impl JobRunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every runner shipped with this crate.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.runners.insert(
            crate::runners::download::JOB_TYPE_CODE.to_string(),
            Arc::new(DownloadJobRunner),
        );
        registry.runners.insert(
            crate::runners::line_count::JOB_TYPE_CODE.to_string(),
            Arc::new(LineCountJobRunner),
        );
        registry
    }

    /// Register a runner under its type code.
    pub fn register<R: JobRunner>(&mut self, runner: R) -> Result<(), JobServiceError> {
        let code = JobRunner::job_type_code(&runner).to_string();
        if self.runners.contains_key(&code) {
            return Err(JobServiceError::DuplicateRunner(code));
        }
        self.runners.insert(code, Arc::new(runner));
        Ok(())
    }

    /// Builder form of [`Self::register`].
    pub fn with<R: JobRunner>(mut self, runner: R) -> Result<Self, JobServiceError> {
        self.register(runner)?;
        Ok(self)
    }

    pub fn contains(&self, job_type_code: &str) -> bool {
        self.runners.contains_key(job_type_code)
    }

    /// Registered type codes, sorted.
    pub fn job_type_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = self.runners.keys().map(String::as_str).collect();
        codes.sort_unstable();
        codes
    }

    pub(crate) fn get(&self, job_type_code: &str) -> Option<Arc<dyn ErasedJobRunner>> {
        self.runners.get(job_type_code).cloned()
    }
}

impl fmt::Debug for JobRunnerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunnerRegistry")
            .field("job_type_codes", &self.job_type_codes())
            .finish()
    }
}
