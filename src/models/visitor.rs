use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::common::flexible_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Visitor {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
    #[serde(default)]
    pub vehicle_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub society_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Visitor {
    pub fn document_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }

    /// Case-insensitive match on name or purpose.
    pub fn matches_query(&self, query: &str) -> bool {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&q)
            || self
                .purpose
                .as_deref()
                .unwrap_or("")
                .to_lowercase()
                .contains(&q)
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
    #[validate(length(min = 1, message = "Visitor name is required"))]
    pub name: String,
    #[validate(length(min = 7, max = 15, message = "Contact number must be 7 to 15 digits"))]
    pub contact_number: String,
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub society_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_visitor_query_matching() {
        let visitor: Visitor = serde_json::from_value(json!({
            "id": 4,
            "name": "Courier Express",
            "purpose": "Delivery",
            "status": "PENDING"
        }))
        .unwrap();

        assert_eq!(visitor.id.as_deref(), Some("4"));
        assert!(visitor.matches_query("deliv"));
        assert!(visitor.matches_query("COURIER"));
        assert!(visitor.matches_query(""));
        assert!(!visitor.matches_query("plumber"));
    }

    #[test]
    fn test_new_visitor_validation() {
        let visitor = NewVisitor {
            name: "".to_string(),
            contact_number: "98200".to_string(),
            purpose: "Guest".to_string(),
            vehicle_number: None,
            society_id: None,
            user_id: None,
        };
        let errors = visitor.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("contact_number"));
    }

    #[test]
    fn test_visitor_with_both_ids() {
        let visitor: Visitor =
            serde_json::from_value(json!({"id": 5, "_id": 5, "name": "Plumber"})).unwrap();
        assert_eq!(visitor.document_id(), Some("5"));

        let visitor: Visitor = serde_json::from_value(json!({"_id": "v6", "name": "Guest"})).unwrap();
        assert_eq!(visitor.document_id(), Some("v6"));
    }
}
