use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::common::flexible_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_priority")]
    pub priority: String,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub user_id: Option<String>,
    #[serde(default, alias = "createdAt")]
    pub date: Option<String>,
}

impl Complaint {
    pub fn document_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }
}

fn default_status() -> String {
    "Pending".to_string()
}

fn default_priority() -> String {
    "Medium".to_string()
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewComplaint {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    pub attachment: Option<String>,
    pub user_id: String,
}

impl NewComplaint {
    pub fn new(title: &str, category: &str, description: &str, user_id: String) -> Self {
        Self {
            title: title.trim().to_string(),
            category: category.trim().to_string(),
            description: description.trim().to_string(),
            attachment: None,
            user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_complaint_defaults() {
        let complaint: Complaint = serde_json::from_value(json!({
            "_id": "c1",
            "title": "Lift stuck",
            "category": "Maintenance",
            "createdAt": "2025-06-01T09:00:00"
        }))
        .unwrap();

        assert_eq!(complaint.status, "Pending");
        assert_eq!(complaint.priority, "Medium");
        assert_eq!(complaint.date.as_deref(), Some("2025-06-01T09:00:00"));
    }

    #[test]
    fn test_new_complaint_is_trimmed_and_validated() {
        let complaint = NewComplaint::new("  Leak ", "Plumbing", "   ", "u1".to_string());
        assert_eq!(complaint.title, "Leak");
        assert!(complaint.validate().is_err());
    }

    #[test]
    fn test_complaint_with_both_ids() {
        let complaint: Complaint = serde_json::from_value(json!({
            "id": "c2",
            "_id": "c2",
            "title": "Noise",
            "category": "Neighbours"
        }))
        .unwrap();
        assert_eq!(complaint.document_id(), Some("c2"));
    }
}
