//! Listing, detail and document endpoints against a local mock server

use std::time::Duration;

use chrono::NaiveDate;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use kodegen_tools_tenderscrape::documents::DocumentDownloader;
use kodegen_tools_tenderscrape::tender_api::ApiError;
use kodegen_tools_tenderscrape::{ApiEndpoints, ErrorKind, RetryPolicy, TenderApiClient};

const DETAIL_BASE: &str = "https://www.tender.gov.mn/mn/invitation/detail/";

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(10))
}

fn client(server: &ServerGuard) -> TenderApiClient {
    let endpoints = ApiEndpoints {
        listing_url: format!("{}/api/process/300/list", server.url()),
        detail_api_url: format!("{}/api/get-invitation-by-document-id", server.url()),
        detail_page_base: DETAIL_BASE.to_string(),
    };
    TenderApiClient::new(endpoints, fast_policy(), Duration::from_secs(5)).unwrap()
}

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
}

#[tokio::test]
async fn listing_keeps_only_open_items_with_ids() {
    let mut server = Server::new_async().await;
    let listing = server
        .mock("GET", "/api/process/300/list")
        .match_query(Matcher::UrlEncoded("publishDate".into(), "2025-03-01".into()))
        .with_header("content-type", "application/json")
        .with_body(
            json!([
                {"tenderId": 101, "tenderCode": "T-101", "invitationId": 5001,
                 "tenderName": "Road repair", "totalBudget": 150000000, "docStatusCode": "OPEN"},
                {"tenderId": "102", "invitationId": "5002", "docStatusCode": "CLOSED_STATUS"},
                {"tenderId": 103, "invitationId": null},
                {"invitationId": 5004, "tenderName": "No id"}
            ])
            .to_string(),
        )
        .create_async()
        .await;

    let api = client(&server);
    let open = api.open_invitations(date()).await.unwrap();

    listing.assert_async().await;
    assert_eq!(open.len(), 1);
    let (item, url) = &open[0];
    assert_eq!(item.tender_id().as_deref(), Some("101"));
    assert_eq!(url, &format!("{DETAIL_BASE}5001"));

    let metadata: std::collections::HashMap<_, _> = item.metadata().into_iter().collect();
    assert_eq!(metadata["tender_code"], json!("T-101"));
    assert_eq!(metadata["total_budget"], json!(150000000));
    assert!(!metadata.contains_key("fund_name"));
}

#[tokio::test]
async fn null_listing_is_an_empty_day() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/process/300/list")
        .match_query(Matcher::Any)
        .with_body("null")
        .create_async()
        .await;

    let items = client(&server).fetch_listing(date()).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn listing_server_errors_are_retried_then_reported() {
    let mut server = Server::new_async().await;
    let failing = server
        .mock("GET", "/api/process/300/list")
        .match_query(Matcher::Any)
        .with_status(500)
        .expect(3)
        .create_async()
        .await;

    let err = client(&server).fetch_listing(date()).await.unwrap_err();

    failing.assert_async().await;
    match err {
        ApiError::Request(e) => assert_eq!(e.kind(), ErrorKind::ServerError),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn detail_body_is_returned_as_markdown() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/get-invitation-by-document-id")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("tenderDocumentId".into(), "8812".into()),
            Matcher::UrlEncoded("invitationTypeId".into(), "1".into()),
        ]))
        .with_body(
            json!({"data": {"body": "<h2>Урилга</h2><p>Тендерт <strong>оролцохыг</strong> урьж байна.</p>"}})
                .to_string(),
        )
        .create_async()
        .await;

    let body = client(&server).fetch_detail_body(8812).await.unwrap();

    assert!(body.contains("Урилга"), "{body}");
    assert!(body.contains("**оролцохыг**"), "{body}");
    assert!(!body.contains("<p>"), "{body}");
}

#[tokio::test]
async fn unavailable_detail_body_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/get-invitation-by-document-id")
        .match_query(Matcher::UrlEncoded("tenderDocumentId".into(), "1".into()))
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/api/get-invitation-by-document-id")
        .match_query(Matcher::UrlEncoded("tenderDocumentId".into(), "2".into()))
        .with_body(r#"{"data": null}"#)
        .create_async()
        .await;

    let api = client(&server);
    assert_eq!(api.detail_body(1).await, "");
    assert_eq!(api.detail_body(2).await, "");
}

#[tokio::test]
async fn documents_stream_through_the_proxy() {
    let mut server = Server::new_async().await;
    let ok_link = "https://www.tender.gov.mn/files/a.pdf";
    let missing_link = "https://www.tender.gov.mn/files/missing.pdf";
    let flaky_link = "https://www.tender.gov.mn/files/flaky.pdf";

    let ok = server
        .mock("GET", "/tender/stream")
        .match_query(Matcher::UrlEncoded("url".into(), ok_link.into()))
        .with_body(b"%PDF-1.7 fake".as_slice())
        .create_async()
        .await;
    let missing = server
        .mock("GET", "/tender/stream")
        .match_query(Matcher::UrlEncoded("url".into(), missing_link.into()))
        .with_status(404)
        .expect(1)
        .create_async()
        .await;
    let flaky = server
        .mock("GET", "/tender/stream")
        .match_query(Matcher::UrlEncoded("url".into(), flaky_link.into()))
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let root = tempfile::tempdir().unwrap();
    let downloader = DocumentDownloader::new(
        format!("{}/tender/stream", server.url()),
        root.path(),
        fast_policy(),
        Duration::from_secs(5),
    )
    .unwrap();

    let saved = downloader
        .download_all(
            &format!("{DETAIL_BASE}1766385752801"),
            &[ok_link.to_string(), missing_link.to_string(), flaky_link.to_string()],
        )
        .await;

    ok.assert_async().await;
    missing.assert_async().await;
    flaky.assert_async().await;
    assert_eq!(saved, vec!["documents/tender_1766385752801.pdf"]);

    let written = std::fs::read(root.path().join(&saved[0])).unwrap();
    assert_eq!(written, b"%PDF-1.7 fake");
    assert!(!root.path().join("documents/tender_1766385752801_3.pdf").exists());
    assert!(!root.path().join("documents/tender_1766385752801_3.pdf.part").exists());
}
