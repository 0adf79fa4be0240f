mod common;

use chrono::NaiveDate;
use common::{Responder, local_config, local_edgar, read_fixture};
use edgar_mirror::{
    Artifact, ArtifactOutcome, CancellationToken, DataLayout, DateRange, Edgar, EdgarError,
    ExistingPolicy, FilingOperations, IndexFeed, IndexOperations, MergeOutcome, MergedIndex,
    RetryPolicy, SyncOptions, UpdateOptions,
};
use reqwest::StatusCode;
use std::fs;
use std::time::{Duration, Instant};

fn artifact(base: &str, path: std::path::PathBuf) -> Artifact {
    Artifact {
        feed: IndexFeed::DailyIndex,
        url: format!("{}/daily-index/2024/QTR4/master.20241031.idx", base),
        path,
    }
}

#[tokio::test]
async fn retries_server_errors_until_success() {
    let server = Responder::start(vec![(503, Vec::new()), (200, b"hello".to_vec())]).await;
    let edgar = local_edgar(&server.base);

    let body = edgar.get(&format!("{}/anything", server.base)).await.unwrap();
    assert_eq!(body, "hello");
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn gives_up_after_max_retries() {
    let server = Responder::start(vec![(500, Vec::new())]).await;
    let edgar = local_edgar(&server.base);

    let err = edgar.get(&server.base).await.unwrap_err();
    assert!(matches!(err, EdgarError::ServerError(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn persistent_429_becomes_rate_limit_exceeded() {
    let server = Responder::start(vec![(429, Vec::new())]).await;
    let edgar = local_edgar(&server.base);

    let err = edgar.get_bytes(&server.base).await.unwrap_err();
    assert!(matches!(err, EdgarError::RateLimitExceeded));
    assert_eq!(server.hits(), 3);
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let server = Responder::start(vec![(404, Vec::new())]).await;
    let edgar = local_edgar(&server.base);

    let err = edgar.get(&server.base).await.unwrap_err();
    assert!(matches!(err, EdgarError::NotFound));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn unexpected_status_is_terminal() {
    let server = Responder::start(vec![(403, b"Forbidden".to_vec())]).await;
    let edgar = local_edgar(&server.base);

    let err = edgar.get(&server.base).await.unwrap_err();
    assert!(matches!(err, EdgarError::InvalidResponse(_)));
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn download_writes_file_atomically() {
    let server = Responder::start(vec![(200, b"index body".to_vec())]).await;
    let edgar = local_edgar(&server.base);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested/dir/master.idx");

    let written = edgar.download(&server.base, &path).await.unwrap();
    assert_eq!(written, 10);
    assert_eq!(fs::read(&path).unwrap(), b"index body");
    assert!(!tmp.path().join("nested/dir/master.idx.part").exists());
}

#[tokio::test]
async fn failed_download_leaves_no_partial_file() {
    let server = Responder::start(vec![(503, Vec::new())]).await;
    let edgar = local_edgar(&server.base);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("master.idx");

    assert!(edgar.download(&server.base, &path).await.is_err());
    assert!(!path.exists());
    assert!(!tmp.path().join("master.idx.part").exists());
}

#[tokio::test]
async fn truncated_body_removes_partial_file() {
    let raw = b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\nConnection: close\r\n\r\nonly a few bytes"
        .to_vec();
    let server = Responder::start_raw(vec![raw]).await;
    let edgar = local_edgar(&server.base);
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("0000320193-24-000123.txt");

    assert!(edgar.download(&server.base, &path).await.is_err());
    assert!(!path.exists());
    assert!(!tmp.path().join("0000320193-24-000123.txt.part").exists());
}

#[tokio::test]
async fn diff_policy_compares_byte_sizes() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("master.20241031.idx");
    fs::write(&path, b"abc").unwrap();

    let same_size = Responder::start(vec![(200, b"xyz".to_vec())]).await;
    let outcome = local_edgar(&same_size.base)
        .fetch_artifact(&artifact(&same_size.base, path.clone()), ExistingPolicy::Diff)
        .await
        .unwrap();
    assert_eq!(outcome, ArtifactOutcome::Unchanged);
    assert_eq!(fs::read(&path).unwrap(), b"abc");
    assert!(!tmp.path().join("master.20241031.idx.tmp").exists());

    let bigger = Responder::start(vec![(200, b"abcdef".to_vec())]).await;
    let outcome = local_edgar(&bigger.base)
        .fetch_artifact(&artifact(&bigger.base, path.clone()), ExistingPolicy::Diff)
        .await
        .unwrap();
    assert_eq!(outcome, ArtifactOutcome::Changed);
    assert_eq!(fs::read(&path).unwrap(), b"abcdef");
}

#[tokio::test]
async fn skip_and_missing_outcomes() {
    let tmp = tempfile::tempdir().unwrap();
    let existing = tmp.path().join("existing.idx");
    fs::write(&existing, b"keep").unwrap();

    let server = Responder::start(vec![(404, Vec::new())]).await;
    let edgar = local_edgar(&server.base);

    let skipped = edgar
        .fetch_artifact(&artifact(&server.base, existing.clone()), ExistingPolicy::Skip)
        .await
        .unwrap();
    assert_eq!(skipped, ArtifactOutcome::Skipped);
    assert_eq!(server.hits(), 0);

    let missing = edgar
        .fetch_artifact(
            &artifact(&server.base, tmp.path().join("absent.idx")),
            ExistingPolicy::Skip,
        )
        .await
        .unwrap();
    assert_eq!(missing, ArtifactOutcome::Missing);
    assert!(!tmp.path().join("absent.idx").exists());
}

#[tokio::test]
async fn replace_policy_refetches() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("master.idx");
    fs::write(&path, b"old").unwrap();

    let server = Responder::start(vec![(200, b"new".to_vec())]).await;
    let outcome = local_edgar(&server.base)
        .fetch_artifact(&artifact(&server.base, path.clone()), ExistingPolicy::Replace)
        .await
        .unwrap();
    assert_eq!(outcome, ArtifactOutcome::Downloaded);
    assert_eq!(fs::read(&path).unwrap(), b"new");
}

#[tokio::test]
async fn update_indexes_mirrors_converts_and_merges() {
    let master = read_fixture("indexes/master.idx").into_bytes();
    let server = Responder::start(vec![(200, master)]).await;
    let edgar = local_edgar(&server.base);
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    )
    .unwrap();
    let mut options = UpdateOptions::new(range);
    options.include_daily = false;

    let report = edgar.update_indexes(&layout, &options).await.unwrap();
    assert_eq!(report.full_index.downloaded(), 1);
    assert_eq!(report.convert.rows(), 6);
    assert!(matches!(report.merge, MergeOutcome::Rebuilt { rows: 6, .. }));
    assert!(tmp.path().join("full-index/2024/QTR4/master.csv").exists());

    let merged = MergedIndex::load(&layout.merged_index_path()).unwrap();
    assert!(merged.iter().any(|e| e.cik == 320193 && e.form_type == "10-K"));

    // Quarterly files are kept once present.
    let again = edgar.update_indexes(&layout, &options).await.unwrap();
    assert_eq!(again.full_index.skipped(), 1);
    assert_eq!(again.merge, MergeOutcome::UpToDate);
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn sync_records_failures_without_aborting() {
    let server = Responder::start(vec![(500, Vec::new())]).await;
    let edgar = local_edgar(&server.base);
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    layout.init().unwrap();

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap();

    let report = edgar
        .sync_full_index(&layout, &range, &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(report.failed(), 2);

    let fail_fast = SyncOptions::default().with_fail_fast(true);
    assert!(
        edgar
            .sync_full_index(&layout, &range, &fail_fast)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn download_filing_uses_the_archive_layout() {
    let submission = b"<SEC-DOCUMENT>\n</SEC-DOCUMENT>\n".to_vec();
    let server = Responder::start(vec![(200, submission.clone())]).await;
    let edgar = local_edgar(&server.base);
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());

    assert_eq!(
        edgar.filing_url(320193, "000032019324000123").unwrap(),
        format!("{}/data/320193/0000320193-24-000123.txt", server.base)
    );

    let path = edgar
        .download_filing(&layout, 320193, "0000320193-24-000123")
        .await
        .unwrap();
    assert_eq!(path, tmp.path().join("data/320193/0000320193-24-000123.txt"));
    assert_eq!(fs::read(&path).unwrap(), submission);

    // Already on disk: no second request.
    edgar
        .download_filing(&layout, 320193, "0000320193-24-000123")
        .await
        .unwrap();
    assert_eq!(server.hits(), 1);
}

fn slow_backoff_edgar(base: &str, token: CancellationToken) -> Edgar {
    let config = local_config(base)
        .with_retry(RetryPolicy {
            max_retries: 5,
            backoff_base: Duration::from_secs(5),
            backoff_factor: 2.0,
            max_backoff: Duration::from_secs(30),
        })
        .with_cancellation(token);
    Edgar::with_config(config).unwrap()
}

#[tokio::test]
async fn cancelling_during_backoff_stops_retries() {
    let server = Responder::start(vec![(503, Vec::new())]).await;
    let token = CancellationToken::new();
    let edgar = slow_backoff_edgar(&server.base, token.clone());

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = edgar.get(&server.base).await.unwrap_err();
    assert!(matches!(err, EdgarError::Interrupted));
    assert!(started.elapsed() < Duration::from_secs(4));

    // No attempt after the cancelled backoff.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn cancelled_token_skips_requests() {
    let server = Responder::start(vec![(200, b"body".to_vec())]).await;
    let token = CancellationToken::new();
    token.cancel();
    let edgar = slow_backoff_edgar(&server.base, token);

    assert!(matches!(
        edgar.get(&server.base).await,
        Err(EdgarError::Interrupted)
    ));

    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    layout.init().unwrap();
    fs::create_dir_all(tmp.path().join("full-index/2024/QTR1")).unwrap();
    fs::write(tmp.path().join("full-index/2024/QTR1/master.idx"), b"kept").unwrap();
    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
    .unwrap();

    // Even artifacts that would be skipped stop the batch.
    let result = edgar
        .sync_full_index(&layout, &range, &SyncOptions::default())
        .await;
    assert!(matches!(result, Err(EdgarError::Interrupted)));
    assert_eq!(server.hits(), 0);
}

#[test]
fn nan_backoff_factor_is_rejected() {
    let config = local_config("http://127.0.0.1:9").with_retry(RetryPolicy {
        max_retries: 1,
        backoff_base: Duration::from_millis(5),
        backoff_factor: f64::NAN,
        max_backoff: Duration::from_millis(20),
    });
    assert!(matches!(
        Edgar::with_config(config),
        Err(EdgarError::ConfigError(_))
    ));
}
