//! Listing and detail endpoints of the procurement portal.

pub mod client;
pub mod types;

pub use client::{ApiEndpoints, ApiError, TenderApiClient};
pub use types::{DetailEnvelope, ListingItem};
