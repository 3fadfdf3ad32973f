//! Page data extraction.
//!
//! Turns rendered detail-page markup into an [`ExtractedRecord`] and pulls
//! the embedded tender document id out of the raw payload.

pub mod document_id;
pub mod extractors;
pub mod record;
pub mod selectors;

pub use document_id::DocumentIdResolver;
pub use extractors::{PageExtractor, extract_document_links};
pub use record::ExtractedRecord;
