//! Job run-state and status derivation.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::specification::JobSpecification;

/// Status derived from a job's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// No timestamp is set.
    Indeterminate,
    /// Waiting for a worker.
    Queued,
    /// A runner is executing it.
    Started,
    /// The runner returned successfully.
    Finished,
    /// The runner (or a caller) recorded a failure.
    Failed,
    /// Cancelled; dominates every other timestamp.
    Cancelled,
}

impl JobStatus {
    /// Finished, failed or cancelled.
    pub fn is_concluded(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_queued_or_started(&self) -> bool {
        matches!(self, JobStatus::Queued | JobStatus::Started)
    }
}

/// A specification paired with its run-state.
///
/// The engine hands out clones of these; mutating a clone has no effect on
/// the engine's record.
#[derive(Debug, Clone)]
pub struct Job {
    specification: Arc<dyn JobSpecification>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub progress_percent: Option<u8>,
    pub generated_data_guids: BTreeSet<String>,
}

impl Job {
    /// A job with no timestamps set (status `Indeterminate`).
    pub fn new(specification: Arc<dyn JobSpecification>) -> Self {
        Self {
            specification,
            queued_at: None,
            started_at: None,
            finished_at: None,
            failed_at: None,
            cancelled_at: None,
            progress_percent: None,
            generated_data_guids: BTreeSet::new(),
        }
    }

    /// A job queued at `at`.
    pub fn queued(specification: Arc<dyn JobSpecification>, at: DateTime<Utc>) -> Self {
        let mut job = Self::new(specification);
        job.queued_at = Some(at);
        job
    }

    pub fn specification(&self) -> &dyn JobSpecification {
        self.specification.as_ref()
    }

    pub(crate) fn shared_specification(&self) -> Arc<dyn JobSpecification> {
        self.specification.clone()
    }

    pub fn guid(&self) -> &str {
        self.specification.guid()
    }

    pub fn job_type_code(&self) -> &str {
        self.specification.job_type_code()
    }

    pub fn owner_user_nickname(&self) -> Option<&str> {
        self.specification.owner_user_nickname()
    }

    /// First match wins: cancelled, failed, finished, started, queued.
    pub fn status(&self) -> JobStatus {
        if self.cancelled_at.is_some() {
            JobStatus::Cancelled
        } else if self.failed_at.is_some() {
            JobStatus::Failed
        } else if self.finished_at.is_some() {
            JobStatus::Finished
        } else if self.started_at.is_some() {
            JobStatus::Started
        } else if self.queued_at.is_some() {
            JobStatus::Queued
        } else {
            JobStatus::Indeterminate
        }
    }

    /// Generated and supplied data keys together.
    pub fn data_guids(&self) -> BTreeSet<String> {
        self.generated_data_guids
            .iter()
            .chain(self.specification.supplied_data_guids())
            .cloned()
            .collect()
    }

    /// Listing order: newest `queued_at` first (unset sorts as oldest), then
    /// guid ascending.
    pub fn listing_order(&self, other: &Job) -> Ordering {
        other
            .queued_at
            .cmp(&self.queued_at)
            .then_with(|| self.guid().cmp(other.guid()))
    }

    /// The instant the time-to-live is measured from.
    ///
    /// - concluded: the earliest of finish/fail/cancel (a later cancel does
    ///   not extend the job's life)
    /// - never started: queued
    /// - running: none, a running job does not expire
    pub fn expiry_reference(&self) -> Option<DateTime<Utc>> {
        let concluded = [self.finished_at, self.failed_at, self.cancelled_at]
            .into_iter()
            .flatten()
            .min();

        match concluded {
            Some(at) => Some(at),
            None if self.started_at.is_none() => self.queued_at,
            None => None,
        }
    }

    /// Whether the effective time-to-live has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, default_ttl: Duration) -> bool {
        let Some(reference) = self.expiry_reference() else {
            return false;
        };
        let ttl = self.specification.time_to_live().unwrap_or(default_ttl);

        // A ttl too large for chrono never elapses.
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => now.signed_duration_since(reference) >= ttl,
            Err(_) => false,
        }
    }
}
