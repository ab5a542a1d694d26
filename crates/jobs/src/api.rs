//! Request/response shapes for the job search and lookup endpoints.
//!
//! Transport-agnostic: a web layer deserializes the requests, calls
//! [`search_jobs`] / [`get_job`] and serializes the results. Timestamps are
//! epoch milliseconds.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::JobData;
use crate::error::JobServiceError;
use crate::job::{Job, JobStatus};
use crate::query::JobQuery;
use crate::service::JobService;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchJobsRequest {
    /// Only jobs owned by this user; omitted means all jobs, which only a
    /// privileged caller should be allowed to ask for.
    pub owner_user_nickname: Option<String>,
    pub statuses: Option<HashSet<JobStatus>>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl From<&SearchJobsRequest> for JobQuery {
    fn from(request: &SearchJobsRequest) -> Self {
        JobQuery {
            owner_user_nickname: request.owner_user_nickname.clone(),
            statuses: request.statuses.clone(),
            offset: request.offset,
            limit: request.limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub guid: String,
    pub job_type_code: String,
    pub owner_user_nickname: Option<String>,
    pub job_status: JobStatus,
    pub queued_timestamp: Option<i64>,
    pub start_timestamp: Option<i64>,
    pub finish_timestamp: Option<i64>,
    pub fail_timestamp: Option<i64>,
    pub cancel_timestamp: Option<i64>,
    pub progress_percent: Option<u8>,
}

fn millis(at: Option<DateTime<Utc>>) -> Option<i64> {
    at.map(|at| at.timestamp_millis())
}

impl From<&Job> for JobSummary {
    fn from(job: &Job) -> Self {
        Self {
            guid: job.guid().to_string(),
            job_type_code: job.job_type_code().to_string(),
            owner_user_nickname: job.owner_user_nickname().map(str::to_string),
            job_status: job.status(),
            queued_timestamp: millis(job.queued_at),
            start_timestamp: millis(job.started_at),
            finish_timestamp: millis(job.finished_at),
            fail_timestamp: millis(job.failed_at),
            cancel_timestamp: millis(job.cancelled_at),
            progress_percent: job.progress_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchJobsResult {
    pub items: Vec<JobSummary>,
    /// Matches before paging.
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetJobRequest {
    pub guid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetJobResult {
    #[serde(flatten)]
    pub job: JobSummary,
    pub generated_data: Vec<JobData>,
}

/// Search over an arbitrary set of job snapshots.
pub fn search(jobs: &[Job], request: &SearchJobsRequest) -> SearchJobsResult {
    let query = JobQuery::from(request);
    SearchJobsResult {
        items: query.apply(jobs).iter().map(JobSummary::from).collect(),
        total: query.count(jobs),
    }
}

pub fn search_jobs(service: &JobService, request: &SearchJobsRequest) -> SearchJobsResult {
    let query = JobQuery::from(request);
    SearchJobsResult {
        items: service.find_jobs(&query).iter().map(JobSummary::from).collect(),
        total: service.total_jobs(&query),
    }
}

/// Look up one job; unknown guids are `JobServiceError::NotFound`.
pub fn get_job(service: &JobService, request: &GetJobRequest) -> Result<GetJobResult, JobServiceError> {
    let job = service.get_job(&request.guid)?;
    let generated_data = service.data_for_job(&request.guid)?;
    Ok(GetJobResult {
        job: JobSummary::from(&job),
        generated_data,
    })
}
