use batch_edit_worker::{
    db::{self, queries, queries::PgJobStore, JobStore},
    models::job::JobStatus,
    services::lifecycle::{recovery_cutoff, ClaimOutcome, JobLifecycle, DEFAULT_RECOVERY_WINDOW},
};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;

/// Integration test: job lifecycle against PostgreSQL
///
/// Covers migrations, the pending listing join, conditional claim, terminal
/// writes and startup recovery.
///
/// Note: This requires a running PostgreSQL instance configured via
/// DATABASE_URL.
#[tokio::test]
#[ignore] // Run with: cargo test --test pg_store_test -- --ignored
async fn test_job_lifecycle_against_postgres() {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL not set");

    let pool = db::init_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let store = Arc::new(PgJobStore::new(pool.clone()));
    let lifecycle = JobLifecycle::new(store.clone());

    // 1. Create a batch and a pending job
    let template = json!({"brightness": 1.2, "contrast": 1.1});
    let batch_id = queries::create_batch(&pool, &template)
        .await
        .expect("Failed to create batch");
    let job = queries::create_job(
        &pool,
        batch_id,
        "https://example.com/source.png",
        Some(&json!({"hue": 30})),
    )
    .await
    .expect("Failed to create job");
    assert_eq!(job.status, JobStatus::Pending);

    // 2. Pending listing carries the batch template
    let pending = store.list_pending().await.expect("Failed to list pending");
    let listed = pending
        .iter()
        .find(|p| p.id == job.id)
        .expect("Job not listed as pending");
    assert_eq!(listed.batch_settings, Some(template));
    assert_eq!(listed.image_override_settings, Some(json!({"hue": 30})));

    // 3. Claim once, then a second claim is refused
    assert_eq!(lifecycle.claim(job.id).await.unwrap(), ClaimOutcome::Acquired);
    assert_eq!(
        lifecycle.claim(job.id).await.unwrap(),
        ClaimOutcome::AlreadyClaimed
    );
    let claimed = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, JobStatus::Processing);
    assert!(claimed.claimed_at.is_some());
    assert_eq!(claimed.original_url, job.original_url);

    // 4. A freshly created processing job survives recovery
    let cutoff = recovery_cutoff(Utc::now(), DEFAULT_RECOVERY_WINDOW);
    lifecycle.recover(cutoff).await.unwrap();
    let still = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(still.status, JobStatus::Processing);

    // 5. A cutoff in the future reverts it
    let reverted = lifecycle
        .recover(Utc::now() + chrono::Duration::minutes(1))
        .await
        .unwrap();
    assert!(reverted >= 1);
    let back = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(back.status, JobStatus::Pending);

    // 6. Claim again and complete
    lifecycle.claim(job.id).await.unwrap();
    lifecycle
        .complete(job.id, "https://cdn.example.com/edited/x.jpg")
        .await
        .unwrap();
    let done = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Done);
    assert_eq!(
        done.edited_url.as_deref(),
        Some("https://cdn.example.com/edited/x.jpg")
    );

    // 7. Terminal writes outside processing are refused
    assert!(!lifecycle.fail(job.id, &"late failure").await.unwrap());
    assert!(!lifecycle
        .complete(job.id, "https://cdn.example.com/edited/y.jpg")
        .await
        .unwrap());
    let unchanged = queries::get_job(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, JobStatus::Done);
    assert_eq!(
        unchanged.edited_url.as_deref(),
        Some("https://cdn.example.com/edited/x.jpg")
    );

    // 8. Failure path on a second job
    let other = queries::create_job(&pool, batch_id, "https://example.com/404.png", None)
        .await
        .unwrap();
    lifecycle.claim(other.id).await.unwrap();
    assert!(lifecycle.fail(other.id, &"404 Not Found").await.unwrap());
    let failed = queries::get_job(&pool, other.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.edited_url.is_none());
}
