use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::CLOSED_STATUS;

/// One row of the daily listing endpoint.
///
/// The backend is loose about types (ids come as numbers or strings), so
/// identifiers and amounts stay as raw JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingItem {
    #[serde(default)]
    pub tender_id: Option<Value>,
    #[serde(default)]
    pub tender_code: Option<String>,
    #[serde(default)]
    pub invitation_id: Option<Value>,
    #[serde(default)]
    pub invitation_number: Option<String>,
    #[serde(default)]
    pub publish_date: Option<String>,
    #[serde(default)]
    pub tender_name: Option<String>,
    #[serde(default)]
    pub total_budget: Option<Value>,
    #[serde(default)]
    pub tender_type_name: Option<String>,
    #[serde(default)]
    pub budget_entity_name: Option<String>,
    #[serde(default)]
    pub fund_name: Option<String>,
    #[serde(default)]
    pub doc_status_code: Option<String>,
}

impl ListingItem {
    #[must_use]
    pub fn tender_id(&self) -> Option<String> {
        self.tender_id.as_ref().and_then(id_text)
    }

    #[must_use]
    pub fn invitation_id(&self) -> Option<String> {
        self.invitation_id.as_ref().and_then(id_text)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.doc_status_code.as_deref() == Some(CLOSED_STATUS)
    }

    /// Open items with a tender id and an invitation to link to.
    #[must_use]
    pub fn is_harvestable(&self) -> bool {
        !self.is_closed() && self.tender_id().is_some() && self.invitation_id().is_some()
    }

    /// Listing metadata carried onto the harvested record.
    #[must_use]
    pub fn metadata(&self) -> Vec<(&'static str, Value)> {
        let text = |v: &Option<String>| v.clone().map(Value::String);
        [
            ("tender_id", self.tender_id().map(Value::String)),
            ("tender_code", text(&self.tender_code)),
            ("invitation_id", self.invitation_id().map(Value::String)),
            ("invitation_number", text(&self.invitation_number)),
            ("tender_name", text(&self.tender_name)),
            ("total_budget", self.total_budget.clone()),
            ("tender_type_name", text(&self.tender_type_name)),
            ("budget_entity_name", text(&self.budget_entity_name)),
            ("fund_name", text(&self.fund_name)),
            ("publish_date", text(&self.publish_date)),
        ]
        .into_iter()
        .filter_map(|(key, value)| match value {
            Some(Value::Null) | None => None,
            Some(value) => Some((key, value)),
        })
        .collect()
    }
}

fn id_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Envelope of the detail endpoint: `{"data": {"body": "<html>"}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailEnvelope {
    #[serde(default)]
    pub data: Option<DetailData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DetailData {
    #[serde(default)]
    pub body: Option<String>,
}

impl DetailEnvelope {
    #[must_use]
    pub fn body(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|d| d.body.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn closed_and_idless_items_are_not_harvestable() {
        let items: Vec<ListingItem> = serde_json::from_value(json!([
            {"tenderId": 11, "invitationId": 1766385743198_u64, "docStatusCode": "OPEN"},
            {"tenderId": 12, "invitationId": 2, "docStatusCode": "CLOSED_STATUS"},
            {"tenderId": null, "invitationId": 3},
            {"tenderId": "  ", "invitationId": 4}
        ]))
        .unwrap();

        let open: Vec<_> = items.iter().filter(|i| i.is_harvestable()).collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].invitation_id().as_deref(), Some("1766385743198"));
    }

    #[test]
    fn metadata_skips_absent_values() {
        let item: ListingItem = serde_json::from_value(json!({
            "tenderId": 7,
            "tenderCode": "T-7",
            "totalBudget": 1500000,
            "fundName": null
        }))
        .unwrap();
        let meta = item.metadata();
        assert!(meta.contains(&("tender_code", json!("T-7"))));
        assert!(meta.contains(&("total_budget", json!(1_500_000))));
        assert!(!meta.iter().any(|(k, _)| *k == "fund_name"));
    }
}
