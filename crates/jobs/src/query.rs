//! Job search filter.

use std::collections::HashSet;

use crate::job::{Job, JobStatus};

/// Filter, order and page over job snapshots.
///
/// - `owner_user_nickname`: exact, case-sensitive match; `None` matches all
///   jobs (including unowned ones)
/// - `statuses`: derived status must be in the set; `None` matches all
/// - results are in [`Job::listing_order`], then `offset`/`limit` apply
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub owner_user_nickname: Option<String>,
    pub statuses: Option<HashSet<JobStatus>>,
    pub offset: usize,
    /// `None` is unbounded.
    pub limit: Option<usize>,
}

impl JobQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_owner(mut self, nickname: impl Into<String>) -> Self {
        self.owner_user_nickname = Some(nickname.into());
        self
    }

    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = JobStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(owner) = &self.owner_user_nickname {
            if job.owner_user_nickname() != Some(owner.as_str()) {
                return false;
            }
        }

        self.statuses
            .as_ref()
            .is_none_or(|statuses| statuses.contains(&job.status()))
    }

    /// Matching jobs, ordered and paged.
    pub fn apply<'a>(&self, jobs: impl IntoIterator<Item = &'a Job>) -> Vec<Job> {
        let mut result: Vec<Job> = jobs
            .into_iter()
            .filter(|job| self.matches(job))
            .cloned()
            .collect();

        result.sort_by(Job::listing_order);

        result
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Number of matching jobs, ignoring offset/limit.
    pub fn count<'a>(&self, jobs: impl IntoIterator<Item = &'a Job>) -> usize {
        jobs.into_iter().filter(|job| self.matches(job)).count()
    }
}
