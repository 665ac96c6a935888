use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::{decode_list, normalize, ApiClient};
use crate::error::ApiError;
use crate::models::notification::{Notification, NotificationRecord};

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ApiError>;
    async fn fetch_unread_count(&self) -> Result<u64, ApiError>;
    async fn mark_notification_read(&self, id: &str) -> Result<(), ApiError>;
    async fn mark_all_notifications_read(&self) -> Result<(), ApiError>;
}

#[async_trait]
impl NotificationApi for ApiClient {
    async fn fetch_notifications(&self) -> Result<Vec<Notification>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["notifications"], None),
                "Notification load failed",
            )
            .await?;

        let records: Vec<NotificationRecord> = decode_list(body, "notification");
        Ok(normalize(records, "notification", Notification::from_record))
    }

    async fn fetch_unread_count(&self) -> Result<u64, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["notifications", "count"], None),
                "Notification count failed",
            )
            .await?;
        Ok(parse_count(&body))
    }

    async fn mark_notification_read(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, &["notifications", id, "read"], None),
            "Failed to mark notification read",
        )
        .await
    }

    async fn mark_all_notifications_read(&self) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, &["notifications", "read-all"], None),
            "Failed to mark notifications read",
        )
        .await
    }
}

/// The count endpoint answers with a bare number; `{"count": n}` is tolerated.
fn parse_count(body: &Value) -> u64 {
    match body {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        Value::Object(map) => map.get("count").map(parse_count).unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_count_shapes() {
        assert_eq!(parse_count(&json!(3)), 3);
        assert_eq!(parse_count(&json!("4")), 4);
        assert_eq!(parse_count(&json!({"count": 2})), 2);
        assert_eq!(parse_count(&json!(null)), 0);
        assert_eq!(parse_count(&json!(-1)), 0);
    }
}
