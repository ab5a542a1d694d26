//! Search and lookup through the `api` layer.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use depot_jobs::api::{self, GetJobRequest, SearchJobsRequest};
use depot_jobs::runners::DownloadJobSpecification;
use depot_jobs::{
    CoalesceMode, Job, JobRunnerRegistry, JobService, JobServiceConfig, JobServiceError, JobStatus,
    SpecificationBase,
};
use depot_storage::InMemoryDataStorageService;

fn date(year: i32, month: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, 1, 12, 0, 0).unwrap()
}

fn job(owner: Option<&str>, queued_at: DateTime<Utc>) -> Job {
    let base = match owner {
        Some(owner) => SpecificationBase::new().owned_by(owner),
        None => SpecificationBase::new(),
    };
    Job::queued(
        Arc::new(DownloadJobSpecification::new(1, 0).with_base(base)),
        queued_at,
    )
}

/// Queued in January, started in February, finished in April.
fn jobs_of_1976() -> (Vec<Job>, String, String) {
    let queued = job(None, date(1976, 1));

    let mut started = job(None, date(1976, 2));
    started.started_at = Some(date(1976, 2) + chrono::Duration::minutes(1));

    let mut finished = job(Some("testuser"), date(1976, 4));
    finished.started_at = Some(date(1976, 4) + chrono::Duration::minutes(1));
    finished.finished_at = Some(date(1976, 4) + chrono::Duration::minutes(2));

    let started_guid = started.guid().to_string();
    let finished_guid = finished.guid().to_string();
    (vec![queued, started, finished], started_guid, finished_guid)
}

#[test]
fn status_filter_returns_only_started_job() {
    let (jobs, started_guid, _) = jobs_of_1976();

    let request = SearchJobsRequest {
        statuses: Some([JobStatus::Started].into_iter().collect()),
        ..SearchJobsRequest::default()
    };
    let result = api::search(&jobs, &request);

    assert_eq!(result.total, 1);
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].guid, started_guid);
    assert_eq!(result.items[0].job_status, JobStatus::Started);
}

#[test]
fn owner_filter_returns_only_owned_job() {
    let (jobs, _, finished_guid) = jobs_of_1976();

    let request = SearchJobsRequest {
        owner_user_nickname: Some("testuser".to_string()),
        ..SearchJobsRequest::default()
    };
    let result = api::search(&jobs, &request);

    assert_eq!(result.total, 1);
    assert_eq!(result.items[0].guid, finished_guid);
    assert_eq!(result.items[0].job_status, JobStatus::Finished);
}

#[test]
fn owner_filter_is_case_sensitive() {
    let (jobs, _, _) = jobs_of_1976();

    let request = SearchJobsRequest {
        owner_user_nickname: Some("TestUser".to_string()),
        ..SearchJobsRequest::default()
    };

    assert_eq!(api::search(&jobs, &request).total, 0);
}

#[test]
fn unfiltered_search_is_newest_first_and_paged() {
    let (jobs, started_guid, finished_guid) = jobs_of_1976();

    let all = api::search(&jobs, &SearchJobsRequest::default());
    assert_eq!(all.total, 3);
    assert_eq!(all.items[0].guid, finished_guid);
    assert_eq!(all.items[1].guid, started_guid);

    let page = api::search(
        &jobs,
        &SearchJobsRequest {
            offset: 1,
            limit: Some(1),
            ..SearchJobsRequest::default()
        },
    );
    // Paging narrows the items but not the total.
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].guid, started_guid);
}

#[test]
fn request_deserializes_from_camel_case_json() {
    let request: SearchJobsRequest = serde_json::from_str(
        r#"{"ownerUserNickname":"testuser","statuses":["STARTED","FINISHED"],"limit":5}"#,
    )
    .unwrap();

    assert_eq!(request.owner_user_nickname.as_deref(), Some("testuser"));
    assert_eq!(request.statuses.as_ref().map(|s| s.len()), Some(2));
    assert_eq!(request.offset, 0);
    assert_eq!(request.limit, Some(5));
}

#[test]
fn get_job_reports_generated_data_and_unknown_guids() {
    depot_observability::init_for_tests();
    let service = JobService::start(
        JobServiceConfig::default().with_worker_count(1),
        InMemoryDataStorageService::arc(),
        JobRunnerRegistry::standard(),
    );

    let guid = service
        .submit(DownloadJobSpecification::new(2, 0), CoalesceMode::None)
        .unwrap();
    service
        .await_job_concluded(&guid, Duration::from_secs(10))
        .unwrap();

    let found = api::get_job(&service, &GetJobRequest { guid: guid.clone() }).unwrap();
    assert_eq!(found.job.job_status, JobStatus::Finished);
    assert!(found.job.finish_timestamp.is_some());
    assert_eq!(found.generated_data.len(), 1);

    let json = serde_json::to_value(&found).unwrap();
    assert_eq!(json["guid"], guid);
    assert_eq!(json["generatedData"][0]["useCode"], "download");

    let missing = api::get_job(
        &service,
        &GetJobRequest {
            guid: "no-such-job".to_string(),
        },
    );
    assert!(matches!(missing, Err(JobServiceError::NotFound(_))));

    let listed = api::search_jobs(&service, &SearchJobsRequest::default());
    assert_eq!(listed.total, 1);

    service.shutdown();
}
