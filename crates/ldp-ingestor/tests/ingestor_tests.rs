//! Ingestion scheduler integration tests
//!
//! Exercises the scheduler, job store, and file processor against real
//! PostgreSQL and MinIO containers. All tests here require Docker and are
//! run explicitly with `cargo test -- --ignored`.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use serial_test::serial;

use ldp_ingestor::config::IngestConfig;
use ldp_ingestor::ingest::{
    IngestScheduler, JobStatus, JobStore, LogRecordStore, NewIngestionJob, NewLogRecord,
};

mod common;
use common::{gzip_json, TestEnvironment, TEST_BUCKET};

/// Ingest configuration tuned for tests: no retry delay, small pages
fn test_config() -> IngestConfig {
    IngestConfig {
        page_size: 10,
        stale_after_secs: 300,
        decompress_attempts: 3,
        retry_delay_secs: 0,
    }
}

async fn scheduler_for(env: &TestEnvironment) -> IngestScheduler {
    let storage = env.storage().await.expect("storage client");
    IngestScheduler::new(env.pool().clone(), storage, test_config())
}

fn sample_record(timestamp: &str, id: u64) -> serde_json::Value {
    json!({
        "timestamp": timestamp,
        "level": 30,
        "context": "AppController",
        "message": "Request completed",
        "req": {
            "id": id,
            "method": "GET",
            "url": "/api/items",
            "headers": { "host": "localhost" },
            "remoteAddress": "127.0.0.1",
            "remotePort": 40000
        }
    })
}

fn stale_cutoff() -> DateTime<Utc> {
    Utc::now() - Duration::seconds(300)
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_end_to_end_two_records() {
    let env = TestEnvironment::start().await.expect("environment");

    let key = "2024-01-02T00:00:00.000Z.json.gz";
    let batch = json!([
        sample_record("2024-01-01T23:10:00.000Z", 1),
        sample_record("2024-01-01T23:20:00.000Z", 2),
    ]);
    env.upload(key, gzip_json(&batch)).await.expect("upload");

    let scheduler = scheduler_for(&env).await;
    let stats = scheduler.run_once(TEST_BUCKET, None).await.expect("pass");

    assert_eq!(stats.files_discovered, 1);
    assert_eq!(stats.jobs_succeeded, 1);
    assert_eq!(stats.jobs_failed, 0);

    let jobs = JobStore::new(env.pool().clone());
    let job = jobs
        .get(key, TEST_BUCKET)
        .await
        .expect("job query")
        .expect("job row");
    assert_eq!(job.status, JobStatus::Completed);

    let metadata = job.metadata.expect("job metadata");
    assert_eq!(metadata["records_ingested"], 2);
    assert_eq!(metadata["records_skipped"], 0);
    assert!(metadata["size_bytes"].as_i64().unwrap() > 0);
    assert!(metadata["batch_claimed_at"].is_string());

    let timestamps: Vec<(DateTime<Utc>,)> =
        sqlx::query_as("SELECT timestamp FROM logs ORDER BY timestamp")
            .fetch_all(env.pool())
            .await
            .expect("log rows");

    assert_eq!(timestamps.len(), 2);
    assert_eq!(
        timestamps[0].0,
        Utc.with_ymd_and_hms(2024, 1, 1, 23, 10, 0).unwrap()
    );
    assert_eq!(
        timestamps[1].0,
        Utc.with_ymd_and_hms(2024, 1, 1, 23, 20, 0).unwrap()
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_empty_bucket_is_a_noop() {
    let env = TestEnvironment::start().await.expect("environment");

    let scheduler = scheduler_for(&env).await;
    let stats = scheduler.run_once(TEST_BUCKET, None).await.expect("pass");

    assert_eq!(stats.files_discovered, 0);
    assert_eq!(stats.jobs_succeeded, 0);
    assert_eq!(stats.jobs_failed, 0);
}

// ============================================================================
// Per-record and per-job fault tolerance
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_partial_batch_completes_and_skips() {
    let env = TestEnvironment::start().await.expect("environment");

    let key = "2024-01-02T00:00:00.000Z.json.gz";
    let batch = json!([
        sample_record("2024-01-01T23:10:00.000Z", 1),
        { "message": "no timestamp here" },
        sample_record("2024-01-01T23:20:00.000Z", 2),
    ]);
    env.upload(key, gzip_json(&batch)).await.expect("upload");

    let scheduler = scheduler_for(&env).await;
    let stats = scheduler.run_once(TEST_BUCKET, None).await.expect("pass");

    assert_eq!(stats.jobs_succeeded, 1);
    assert_eq!(stats.jobs_failed, 0);

    let jobs = JobStore::new(env.pool().clone());
    let job = jobs.get(key, TEST_BUCKET).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);

    let metadata = job.metadata.expect("job metadata");
    assert_eq!(metadata["records_ingested"], 2);
    assert_eq!(metadata["records_skipped"], 1);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM logs")
        .fetch_one(env.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 2);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_malformed_container_marks_job_failed() {
    let env = TestEnvironment::start().await.expect("environment");

    let key = "2024-01-02T00:00:00.000Z.json.gz";
    env.upload(key, gzip_json(&json!({ "not": "an array" })))
        .await
        .expect("upload");

    let scheduler = scheduler_for(&env).await;
    let stats = scheduler.run_once(TEST_BUCKET, None).await.expect("pass");

    assert_eq!(stats.jobs_succeeded, 0);
    assert_eq!(stats.jobs_failed, 1);

    let jobs = JobStore::new(env.pool().clone());
    let job = jobs.get(key, TEST_BUCKET).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);

    let metadata = job.metadata.expect("job metadata");
    assert!(metadata["error"]
        .as_str()
        .unwrap()
        .contains("malformed log batch"));
    assert!(metadata["last_attempt"].is_string());
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_corrupt_gzip_fails_after_retries() {
    let env = TestEnvironment::start().await.expect("environment");

    let key = "2024-01-02T00:00:00.000Z.json.gz";
    env.upload(key, b"definitely not gzip".to_vec())
        .await
        .expect("upload");

    let scheduler = scheduler_for(&env).await;
    let stats = scheduler.run_once(TEST_BUCKET, None).await.expect("pass");

    assert_eq!(stats.jobs_failed, 1);

    let jobs = JobStore::new(env.pool().clone());
    let job = jobs.get(key, TEST_BUCKET).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);

    let metadata = job.metadata.expect("job metadata");
    assert!(metadata["error"]
        .as_str()
        .unwrap()
        .contains("corrupt gzip stream"));
}

// ============================================================================
// Claiming and reclamation
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_at_most_one_concurrent_claim() {
    let env = TestEnvironment::start().await.expect("environment");
    let store = JobStore::new(env.pool().clone());

    store
        .insert_new_if_absent(&[NewIngestionJob {
            s3_key: "2024-01-02T00:00:00.000Z.json.gz".to_string(),
            bucket: TEST_BUCKET.to_string(),
        }])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.claim_pending_page(10, stale_cutoff()).await.unwrap().len()
        }));
    }

    let mut total = 0usize;
    for handle in handles {
        total += handle.await.unwrap();
    }

    // Exactly one claimant wins; everyone else sees an empty page
    assert_eq!(total, 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_stuck_job_reclamation_honors_threshold() {
    let env = TestEnvironment::start().await.expect("environment");
    let store = JobStore::new(env.pool().clone());

    let key = "2024-01-02T00:00:00.000Z.json.gz";
    store
        .insert_new_if_absent(&[NewIngestionJob {
            s3_key: key.to_string(),
            bucket: TEST_BUCKET.to_string(),
        }])
        .await
        .unwrap();

    let claimed = store.claim_pending_page(10, stale_cutoff()).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, JobStatus::Processing);

    // Claim is fresh: a cutoff in the past must not touch it
    let reclaimed = store.reclaim_stuck(stale_cutoff()).await.unwrap();
    assert_eq!(reclaimed, 0);

    // Claim older than the cutoff: reclaimed back to pending
    let reclaimed = store
        .reclaim_stuck(Utc::now() + Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(reclaimed, 1);

    let job = store.get(key, TEST_BUCKET).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.claimed_at.is_none());

    let metadata = job.metadata.expect("job metadata");
    assert!(metadata["last_stuck_reset"].is_string());
    assert_eq!(metadata["previous_status"], "processing");

    // Reclaimed jobs are claimable again
    let reclaimed_page = store.claim_pending_page(10, stale_cutoff()).await.unwrap();
    assert_eq!(reclaimed_page.len(), 1);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_duplicate_keys_insert_once() {
    let env = TestEnvironment::start().await.expect("environment");
    let store = JobStore::new(env.pool().clone());

    let job = NewIngestionJob {
        s3_key: "2024-01-02T00:00:00.000Z.json.gz".to_string(),
        bucket: TEST_BUCKET.to_string(),
    };

    // Sequential duplicate
    assert_eq!(store.insert_new_if_absent(&[job.clone()]).await.unwrap(), 1);
    assert_eq!(store.insert_new_if_absent(&[job.clone()]).await.unwrap(), 0);

    // Concurrent duplicates of a second key
    let other = NewIngestionJob {
        s3_key: "2024-01-03T00:00:00.000Z.json.gz".to_string(),
        bucket: TEST_BUCKET.to_string(),
    };
    let mut handles = Vec::new();
    for _ in 0..4 {
        let store = store.clone();
        let other = other.clone();
        handles.push(tokio::spawn(async move {
            store.insert_new_if_absent(&[other]).await.unwrap()
        }));
    }

    let mut total = 0usize;
    for handle in handles {
        total += handle.await.unwrap();
    }
    assert_eq!(total, 1);

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM ingestion_jobs")
        .fetch_one(env.pool())
        .await
        .unwrap();
    assert_eq!(count.0, 2);
}

// ============================================================================
// Discovery
// ============================================================================

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn test_discovery_respects_watermark() {
    let env = TestEnvironment::start().await.expect("environment");

    // Seed the watermark: most recent ingested record at 2024-01-02T00:00:00Z
    let records = LogRecordStore::new(env.pool().clone());
    records
        .insert(&NewLogRecord {
            id: "seed-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            level: "30".to_string(),
            method: "GET".to_string(),
            url: "/".to_string(),
            query: None,
            headers: json!({}),
            context: "AppController".to_string(),
            message: String::new(),
            auth_user_id: None,
            remote_address: "127.0.0.1".to_string(),
            remote_port: 0,
            processing_time_ms: None,
            params: None,
            raw_data: json!({}),
        })
        .await
        .expect("seed record");

    let older = "2024-01-01T00:00:00.000Z.json.gz";
    let equal = "2024-01-02T00:00:00.000Z.json.gz";
    let newer = "2024-01-03T00:00:00.000Z.json.gz";

    for key in [older, equal, newer] {
        let batch = json!([sample_record("2024-01-03T01:00:00.000Z", 7)]);
        env.upload(key, gzip_json(&batch)).await.expect("upload");
    }

    let scheduler = scheduler_for(&env).await;
    let stats = scheduler.run_once(TEST_BUCKET, None).await.expect("pass");

    // Only the key strictly newer than the watermark is enqueued
    assert_eq!(stats.files_discovered, 1);

    let jobs = JobStore::new(env.pool().clone());
    assert!(jobs.get(older, TEST_BUCKET).await.unwrap().is_none());
    assert!(jobs.get(equal, TEST_BUCKET).await.unwrap().is_none());

    let job = jobs.get(newer, TEST_BUCKET).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
}
