use chrono::NaiveDate;
use edgar_mirror::{
    ArtifactOutcome, DataLayout, DateRange, Edgar, EdgarDay, FilingOperations, FilingOptions,
    IndexFile, IndexOperations, MergedIndex, PrimaryDocumentOptions, SyncOptions, UpdateOptions,
    identify_primary,
};

#[tokio::test]
#[ignore]
async fn sync_one_quarter() {
    let edgar = Edgar::new("test_agent example@example.com").unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    layout.init().unwrap();

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 3, 31).unwrap(),
    )
    .unwrap();
    let report = edgar
        .sync_full_index(&layout, &range, &SyncOptions::default())
        .await
        .unwrap();
    assert_eq!(report.downloaded(), 1);
    assert!(tmp.path().join("full-index/2023/QTR1/master.idx").exists());
}

#[tokio::test]
#[ignore]
async fn sync_one_business_day() {
    let edgar = Edgar::new("test_agent example@example.com").unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    layout.init().unwrap();

    let day = EdgarDay::new(2023, 8, 1).unwrap();
    let range = DateRange::day(day.date()).unwrap();
    let options = SyncOptions::default().with_files(vec![IndexFile::Master]);
    let report = edgar
        .sync_daily_index(&layout, &range, &options)
        .await
        .unwrap();
    assert_eq!(report.outcomes.len(), IndexFile::DAILY.len());
    assert!(report.downloaded() >= 1);
}

#[tokio::test]
#[ignore]
async fn refresh_master_snapshot() {
    let edgar = Edgar::new("test_agent example@example.com").unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());
    layout.init().unwrap();

    let outcome = edgar.refresh_master_snapshot(&layout).await.unwrap();
    assert_eq!(outcome, ArtifactOutcome::Downloaded);
}

#[tokio::test]
#[ignore]
async fn update_and_extract_apple_10k() {
    let edgar = Edgar::new("test_agent example@example.com").unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let layout = DataLayout::new(tmp.path());

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
    )
    .unwrap();
    let mut options = UpdateOptions::new(range);
    options.include_daily = false;
    edgar.update_indexes(&layout, &options).await.unwrap();

    let index = MergedIndex::load(&layout.merged_index_path()).unwrap();
    let hits = index.filter(
        &FilingOptions::new()
            .with_cik(320193)
            .with_form_type("10-K"),
    );
    assert_eq!(hits.len(), 1);

    let accession = hits[0].accession_number().unwrap();
    let extraction = edgar
        .fetch_and_extract(&layout, 320193, &accession)
        .await
        .unwrap();
    assert_eq!(extraction.submission_type.as_deref(), Some("10-K"));

    let primary = identify_primary(
        &extraction.documents,
        &PrimaryDocumentOptions::new().with_form_type("10-K"),
    )
    .unwrap();
    assert_eq!(primary.doc_type, "10-K");
}
