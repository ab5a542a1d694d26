//! `linecount`: counts the lines of a supplied artifact.

use std::any::Any;
use std::io::{BufRead, BufReader, Write};

use crate::data::JobDataEncoding;
use crate::error::JobRunnerError;
use crate::runner::JobRunner;
use crate::service::JobService;
use crate::specification::{JobSpecification, SpecificationBase};

pub const JOB_TYPE_CODE: &str = "linecount";
pub const USE_CODE: &str = "linecount";

#[derive(Debug, Clone)]
pub struct LineCountJobSpecification {
    pub base: SpecificationBase,
}

impl LineCountJobSpecification {
    /// Count the lines of the artifact stored under `input_guid`.
    pub fn new(input_guid: impl Into<String>) -> Self {
        Self {
            base: SpecificationBase::new().supplying(input_guid),
        }
    }

    pub fn with_base(base: SpecificationBase) -> Self {
        Self { base }
    }
}

impl JobSpecification for LineCountJobSpecification {
    fn job_type_code(&self) -> &str {
        JOB_TYPE_CODE
    }

    fn base(&self) -> &SpecificationBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    /// Same owner counting the same inputs.
    fn is_equivalent(&self, other: &dyn JobSpecification) -> bool {
        other.job_type_code() == JOB_TYPE_CODE
            && other.owner_user_nickname() == self.owner_user_nickname()
            && other.supplied_data_guids() == self.supplied_data_guids()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LineCountJobRunner;

impl JobRunner for LineCountJobRunner {
    type Specification = LineCountJobSpecification;

    fn job_type_code(&self) -> &str {
        JOB_TYPE_CODE
    }

    fn run(
        &self,
        jobs: &JobService,
        specification: &LineCountJobSpecification,
    ) -> Result<(), JobRunnerError> {
        let mut inputs = specification.supplied_data_guids().iter();
        let (Some(input), None) = (inputs.next(), inputs.next()) else {
            return Err(JobRunnerError::failed(
                "exactly one supplied data artifact is required",
            ));
        };

        let source = jobs
            .storage()
            .get(input)?
            .ok_or_else(|| JobRunnerError::failed(format!("supplied data missing: {input}")))?;

        let mut lines: u64 = 0;
        for line in BufReader::new(source).lines() {
            line?;
            lines += 1;
        }

        let mut output = jobs.store_generated_data(
            specification.guid(),
            USE_CODE,
            "text/plain; charset=utf-8",
            JobDataEncoding::None,
        )?;
        writeln!(output.sink, "{lines}")?;
        output.sink.flush()?;
        Ok(())
    }
}
