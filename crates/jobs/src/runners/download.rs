//! `download`: writes numbered lines as a plain-text artifact.
//!
//! Handy for exercising the engine end to end: the output is predictable and
//! the per-line delay makes progress and cancellation observable.

use std::any::Any;
use std::io::{BufWriter, Write};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::data::JobDataEncoding;
use crate::error::JobRunnerError;
use crate::runner::JobRunner;
use crate::service::JobService;
use crate::specification::{JobSpecification, SpecificationBase};

pub const JOB_TYPE_CODE: &str = "download";
pub const USE_CODE: &str = "download";
pub const MEDIA_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Clone)]
pub struct DownloadJobSpecification {
    pub base: SpecificationBase,
    pub lines: u32,
    pub delay_per_line_millis: u64,
}

impl DownloadJobSpecification {
    pub fn new(lines: u32, delay_per_line_millis: u64) -> Self {
        Self {
            base: SpecificationBase::new(),
            lines,
            delay_per_line_millis,
        }
    }

    pub fn with_base(mut self, base: SpecificationBase) -> Self {
        self.base = base;
        self
    }
}

impl JobSpecification for DownloadJobSpecification {
    fn job_type_code(&self) -> &str {
        JOB_TYPE_CODE
    }

    fn base(&self) -> &SpecificationBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Same owner asking for the same output.
    fn is_equivalent(&self, other: &dyn JobSpecification) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|other| {
                other.owner_user_nickname() == self.owner_user_nickname()
                    && other.lines == self.lines
            })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DownloadJobRunner;

impl JobRunner for DownloadJobRunner {
    type Specification = DownloadJobSpecification;

    fn job_type_code(&self) -> &str {
        JOB_TYPE_CODE
    }

    fn run(
        &self,
        jobs: &JobService,
        specification: &DownloadJobSpecification,
    ) -> Result<(), JobRunnerError> {
        let guid = specification.guid();
        let output = jobs.store_generated_data(guid, USE_CODE, MEDIA_TYPE, JobDataEncoding::None)?;
        let mut writer = BufWriter::new(output.sink);
        let delay = Duration::from_millis(specification.delay_per_line_millis);

        for i in 0..specification.lines {
            if jobs.is_cancelled(guid) {
                debug!(job_guid = %guid, line = i, "cancelled; stopping early");
                break;
            }

            writeln!(writer, "{i}")?;
            debug!(job_guid = %guid, line = i, "written line");

            let percent = ((u64::from(i) + 1) * 100 / u64::from(specification.lines)) as u8;
            jobs.set_progress_percent(guid, percent)?;

            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }

        writer.flush()?;
        Ok(())
    }
}
