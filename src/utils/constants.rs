//! Shared configuration constants for tenderscrape
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Listing API endpoint, queried with a single `publishDate` parameter.
pub const DEFAULT_LISTING_URL: &str = "https://api.tender.gov.mn/api/process/300/list";

/// Detail API endpoint, queried with `tenderDocumentId` and `invitationTypeId=1`.
pub const DEFAULT_DETAIL_API_URL: &str =
    "https://www.tender.gov.mn/api/get-invitation-by-document-id";

/// Detail pages live at `{base}{invitationId}`.
pub const DEFAULT_DETAIL_PAGE_BASE: &str = "https://www.tender.gov.mn/mn/invitation/detail/";

/// Origin used to resolve relative document links found on detail pages.
pub const DEFAULT_SITE_ORIGIN: &str = "https://www.tender.gov.mn";

/// Streaming download proxy; the absolute document URL goes in the `url` parameter.
pub const DEFAULT_DOCUMENT_PROXY_URL: &str = "https://api.mcs.mn/tender/stream";

/// `docStatusCode` value marking a listing item that must not be scheduled.
pub const CLOSED_STATUS: &str = "CLOSED_STATUS";

/// Label of the button that opens the announcement dialog on a detail page.
pub const DEFAULT_REVEAL_LABEL: &str = "Зарлал харах";

/// Key embedded in the client-side payload that carries the detail document id.
pub const DOCUMENT_ID_KEY: &str = "tenderDocumentId";

/// Default snapshot file stem under `tender_data/`.
pub const DEFAULT_SNAPSHOT_NAME: &str = "tender_overviews";

/// Default number of detail pages rendered at the same time.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound accepted for `concurrency`.
pub const MAX_CONCURRENCY: usize = 64;

/// Total attempts per target, first try included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff base: waits are 1s, 2s, 4s, ...
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Browser launch / context creation ceiling.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;

/// `page.goto()` ceiling.
pub const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 60;

/// Ceiling for waiting on `document.readyState === 'complete'`.
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;

/// Ceiling for the reveal-control interaction.
pub const DEFAULT_REVEAL_TIMEOUT_SECS: u64 = 15;

/// Ceiling for plain HTTP requests (listing, detail, downloads).
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Chrome user agent string for stealth mode
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/143.0.0.0 Safari/537.36";
