//! Full runs: listing, rendering, enrichment, documents and snapshot merge

mod common;

use chrono::NaiveDate;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use common::{MockEngine, Script, detail_url};
use kodegen_tools_tenderscrape::{ErrorKind, HarvestConfig, Harvester};

const DETAIL_BASE: &str = "https://www.tender.gov.mn/mn/invitation/detail/";

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn config(server: &ServerGuard, storage: &std::path::Path) -> HarvestConfig {
    HarvestConfig::builder()
        .storage_dir(storage)
        .listing_url(format!("{}/list", server.url()))
        .detail_api_url(format!("{}/detail", server.url()))
        .detail_page_base(DETAIL_BASE)
        .document_proxy_url(format!("{}/stream", server.url()))
        .download_documents(true)
        .backoff_base_ms(10)
        .concurrency(2)
        .build()
        .unwrap()
}

async fn mock_api(server: &mut ServerGuard) {
    server
        .mock("GET", "/list")
        .match_query(Matcher::UrlEncoded("publishDate".into(), "2025-03-01".into()))
        .with_body(
            json!([
                {"tenderId": 11, "tenderCode": "T-11", "invitationId": 1,
                 "invitationNumber": "INV-1", "totalBudget": 5000000, "publishDate": "2025-03-01"},
                {"tenderId": 12, "tenderCode": "T-12", "invitationId": 2},
                {"tenderId": 13, "invitationId": 3, "docStatusCode": "CLOSED_STATUS"}
            ])
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/list")
        .match_query(Matcher::UrlEncoded("publishDate".into(), "2025-03-02".into()))
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("GET", "/list")
        .match_query(Matcher::UrlEncoded("publishDate".into(), "2025-03-03".into()))
        .with_body(json!([{"tenderId": 14, "invitationId": 4}]).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/detail")
        .match_query(Matcher::Any)
        .with_body(json!({"data": {"body": "<p>Announcement <em>text</em></p>"}}).to_string())
        .create_async()
        .await;
    server
        .mock("GET", "/stream")
        .match_query(Matcher::Any)
        .with_body(b"%PDF-1.4".as_slice())
        .create_async()
        .await;
}

#[tokio::test]
async fn date_range_run_is_enriched_persisted_and_incremental() {
    common::init_tracing();
    let mut server = Server::new_async().await;
    mock_api(&mut server).await;
    let storage = tempfile::tempdir().unwrap();

    let engine = MockEngine::new();
    let harvester = Harvester::new(config(&server, storage.path()), engine.clone()).unwrap();

    let summary = harvester.run_dates(day(1), day(3)).await.unwrap();

    assert_eq!(summary.dates, vec![day(1), day(2), day(3)]);
    assert_eq!(summary.listed, 3, "closed item and failed day contribute nothing");
    assert_eq!(summary.scheduled, 3);
    assert_eq!(summary.succeeded, 3);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.new_records, 3);
    assert_eq!(summary.snapshot_size, 3);
    assert_eq!(summary.metrics.documents_downloaded, 3);

    let records = harvester.config().snapshot_store().load().await.unwrap();
    assert_eq!(records.len(), 3);
    let first = records
        .iter()
        .find(|r| r.official_link == detail_url(1))
        .unwrap();
    assert_eq!(first.identity, detail_url(1));
    assert_eq!(first.extra["tender_code"], json!("T-11"));
    assert_eq!(first.extra["invitation_number"], json!("INV-1"));
    assert_eq!(first.extra["total_budget"], json!(5000000));
    assert_eq!(first.extra["pdf_paths"], json!(["documents/tender_1.pdf"]));
    assert!(first.body.contains("Announcement"), "{}", first.body);
    assert!(first.body.contains("_text_") || first.body.contains("*text*"), "{}", first.body);
    assert!(storage.path().join("documents/tender_1.pdf").exists());

    let second = harvester.run_dates(day(1), day(3)).await.unwrap();
    assert_eq!(second.skipped_known, 3);
    assert_eq!(second.scheduled, 0);
    assert_eq!(second.new_records, 0);
    assert_eq!(second.snapshot_size, 3);
    assert_eq!(engine.total_render_calls(), 3, "known pages are never rendered again");
    assert_eq!(engine.prepares(), 1, "renderer set up only for runs with work");

    harvester.shutdown().await;
    assert_eq!(engine.shutdowns(), 1);
}

#[tokio::test]
async fn failed_targets_are_reported_and_excluded() {
    let mut server = Server::new_async().await;
    mock_api(&mut server).await;
    let storage = tempfile::tempdir().unwrap();

    let engine = MockEngine::new();
    engine.script(&detail_url(2), [Script::Status(502)]);
    let harvester = Harvester::new(config(&server, storage.path()), engine.clone()).unwrap();

    let summary = harvester.run_dates(day(1), day(1)).await.unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed.len(), 1);
    let failure = &summary.failed[0];
    assert_eq!(failure.url, detail_url(2));
    assert_eq!(failure.id, "12");
    assert_eq!(failure.kind, ErrorKind::ServerError);
    assert_eq!(failure.attempts, 3);
    assert_eq!(summary.snapshot_size, 1);

    // The failed page is retried on the next run because it never reached the snapshot.
    let engine_retry = MockEngine::new();
    let harvester = Harvester::new(config(&server, storage.path()), engine_retry.clone()).unwrap();
    let retry = harvester.run_dates(day(1), day(1)).await.unwrap();
    assert_eq!(retry.skipped_known, 1);
    assert_eq!(retry.new_records, 1);
    assert_eq!(retry.snapshot_size, 2);
}

#[tokio::test]
async fn url_run_skips_listing_and_rejects_malformed_input() {
    let mut server = Server::new_async().await;
    mock_api(&mut server).await;
    let storage = tempfile::tempdir().unwrap();

    let engine = MockEngine::new();
    let harvester = Harvester::new(config(&server, storage.path()), engine.clone()).unwrap();

    let urls = vec![
        detail_url(7),
        "not a url".to_string(),
        format!("  {}  ", detail_url(7)),
    ];
    let summary = harvester.run_urls(&urls).await.unwrap();

    assert!(summary.dates.is_empty());
    assert_eq!(summary.listed, 3);
    assert_eq!(summary.scheduled, 1);
    assert_eq!(summary.skipped_duplicate, 1);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, ErrorKind::MalformedTarget);
    assert_eq!(summary.failed[0].attempts, 0);
    assert_eq!(engine.render_calls(&detail_url(7)), 1);
}

#[tokio::test]
async fn reversed_date_range_is_rejected() {
    let server = Server::new_async().await;
    let storage = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(config(&server, storage.path()), MockEngine::new()).unwrap();

    assert!(harvester.run_dates(day(5), day(1)).await.is_err());
}
