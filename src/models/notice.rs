use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::common::flexible_id;

/// Society announcement posted by a secretary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub valid_till: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

fn default_category() -> String {
    "General".to_string()
}

/// Calendar day of an ISO date or date-time string.
fn day_of(value: Option<&str>) -> Option<NaiveDate> {
    let value = value?.trim();
    let day = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

impl Notice {
    pub fn document_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }

    pub fn matches_query(&self, query: &str) -> bool {
        self.title
            .to_lowercase()
            .contains(&query.trim().to_lowercase())
    }

    /// A notice without a parseable `validTill` never expires.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        day_of(self.valid_till.as_deref()).is_some_and(|until| until < today)
    }
}

/// Body of `POST /notices` and `PUT /notices/{id}`. Dates are `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Serialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoticeForm {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub category: String,
    pub date: String,
    pub valid_till: String,
    pub desc: String,
}

impl NoticeForm {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            category: default_category(),
            ..Self::default()
        }
    }

    /// Prefills the edit form, keeping only the day part of stored dates.
    pub fn from_notice(notice: &Notice) -> Self {
        let day = |value: &Option<String>| {
            day_of(value.as_deref())
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        Self {
            title: notice.title.clone(),
            category: notice.category.clone(),
            date: day(&notice.date),
            valid_till: day(&notice.valid_till),
            desc: notice.desc.clone().unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn notice(value: serde_json::Value) -> Notice {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_notice_defaults_and_ids() {
        let n = notice(json!({"id": "x1", "_id": "x1", "title": "Water cut"}));
        assert_eq!(n.document_id(), Some("x1"));
        assert_eq!(n.category, "General");

        let n = notice(json!({"_id": "x2", "title": "Lift service"}));
        assert_eq!(n.document_id(), Some("x2"));
        assert!(n.matches_query("LIFT"));
        assert!(!n.matches_query("water"));
    }

    #[test]
    fn test_expiry_uses_calendar_day() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let n = notice(json!({"title": "AGM", "validTill": "2025-06-20T18:30:00.000Z"}));
        assert!(!n.is_expired(today));

        let n = notice(json!({"title": "AGM", "validTill": "2025-06-19"}));
        assert!(n.is_expired(today));

        let n = notice(json!({"title": "AGM", "validTill": "soon"}));
        assert!(!n.is_expired(today));
    }

    #[test]
    fn test_form_prefill() {
        let n = notice(json!({
            "title": "Painting",
            "category": "Maintenance",
            "date": "2025-06-01T00:00:00Z",
            "validTill": "2025-06-30"
        }));
        let form = NoticeForm::from_notice(&n);
        assert_eq!(form.date, "2025-06-01");
        assert_eq!(form.valid_till, "2025-06-30");
        assert_eq!(form.desc, "");
        assert!(form.validate().is_ok());

        assert!(NoticeForm::new("   ").validate().is_err());
    }
}
