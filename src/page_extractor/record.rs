use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One harvested tender.
///
/// Fixed fields cover what every detail page carries. `extra` holds listing
/// metadata and anything added later; it is flattened into the same JSON
/// object on disk, so unknown keys in an existing snapshot survive a
/// load/persist cycle untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// De-duplication key. Empty in snapshots written before it existed.
    #[serde(default)]
    pub identity: String,
    #[serde(default)]
    pub official_link: String,
    #[serde(default)]
    pub name: String,
    /// Labelled key/value rows of the detail page, label text as key
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// List items from the announcement dialog, document order
    #[serde(default)]
    pub details: Vec<String>,
    #[serde(default)]
    pub document_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tender_document_id: Option<u64>,
    /// Announcement body as markdown
    #[serde(default)]
    pub body: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ExtractedRecord {
    /// Key used for merging. Falls back to the official link.
    #[must_use]
    pub fn identity(&self) -> &str {
        if self.identity.is_empty() {
            &self.official_link
        } else {
            &self.identity
        }
    }

    /// Neither a title nor a single labelled field was found.
    #[must_use]
    pub fn is_empty_extraction(&self) -> bool {
        self.name.is_empty() && self.fields.is_empty()
    }

    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    #[must_use]
    pub fn with_official_link(mut self, link: impl Into<String>) -> Self {
        self.official_link = link.into();
        self
    }

    #[must_use]
    pub fn with_document_id(mut self, id: Option<u64>) -> Self {
        self.tender_document_id = id;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a side-map entry. Existing keys are overwritten.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_falls_back_to_link() {
        let record = ExtractedRecord::default().with_official_link("https://a/1");
        assert_eq!(record.identity(), "https://a/1");
        assert_eq!(record.with_identity("42").identity(), "42");
    }

    #[test]
    fn unknown_keys_survive_in_extra() {
        let raw = json!({
            "official_link": "https://a/1",
            "name": "Road repair",
            "category": "construction",
            "score": 7
        });
        let record: ExtractedRecord = serde_json::from_value(raw).unwrap();
        assert_eq!(record.extra["category"], json!("construction"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["score"], json!(7));
        assert!(back.get("tender_document_id").is_none());
    }

    #[test]
    fn top_level_labels_from_older_snapshots_are_kept_verbatim() {
        let raw = json!({
            "official_link": "https://a/1",
            "name": "Road repair",
            "Захиалагч": "Aimag office",
            "Төсөв": "1,000,000 ₮"
        });
        let record: ExtractedRecord = serde_json::from_value(raw).unwrap();

        assert!(record.fields.is_empty());
        assert!(!record.is_empty_extraction());
        assert_eq!(record.extra["Захиалагч"], json!("Aimag office"));

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["Төсөв"], json!("1,000,000 ₮"));
        assert_eq!(back["fields"], json!({}));
    }
}
