use reqwest::Method;
use serde_json::Value;
use validator::Validate;

use super::{decode_list, ApiClient};
use crate::error::{ApiError, RequestError};
use crate::models::complaint::{Complaint, NewComplaint};
use crate::models::visitor::{NewVisitor, Visitor};

impl ApiClient {
    // Visitors

    pub async fn get_visitors(
        &self,
        society_id: &str,
        user_ids: &[String],
    ) -> Result<Vec<Visitor>, ApiError> {
        let mut query = vec![("societyId", society_id.to_string())];
        query.extend(user_ids.iter().map(|id| ("userIds", id.clone())));

        let body: Value = self
            .send_json(
                self.request(Method::GET, &["visitors"], None).query(&query),
                "Failed to load visitors.",
            )
            .await?;
        Ok(decode_list(body, "visitor"))
    }

    pub async fn add_visitor(&self, visitor: &NewVisitor) -> Result<Visitor, RequestError> {
        visitor.validate()?;

        let created = self
            .send_json(
                self.request(Method::POST, &["visitors"], None).json(visitor),
                "Failed to add visitor.",
            )
            .await?;
        Ok(created)
    }

    pub async fn update_visitor_status(&self, id: &str, status: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, &["visitors", id, "status"], None)
                .query(&[("status", status)]),
            "Failed to update visitor status.",
        )
        .await
    }

    pub async fn delete_visitor(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::DELETE, &["visitors", id], None),
            "Failed to delete visitor.",
        )
        .await
    }

    // Complaints

    pub async fn get_complaints_by_society(
        &self,
        society_id: &str,
    ) -> Result<Vec<Complaint>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["complaints", "society"], None)
                    .query(&[("societyId", society_id)]),
                "Failed to load complaints.",
            )
            .await?;
        Ok(decode_list(body, "complaint"))
    }

    pub async fn get_complaints_by_member(&self, user_id: &str) -> Result<Vec<Complaint>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["complaints", "member"], None)
                    .query(&[("userId", user_id)]),
                "Failed to load complaints.",
            )
            .await?;
        Ok(decode_list(body, "complaint"))
    }

    pub async fn get_complaint(&self, id: &str) -> Result<Complaint, ApiError> {
        self.send_json(
            self.request(Method::GET, &["complaints", id], None),
            "Failed to load complaint.",
        )
        .await
    }

    pub async fn add_complaint(&self, complaint: &NewComplaint) -> Result<Complaint, RequestError> {
        complaint.validate()?;

        let created = self
            .send_json(
                self.request(Method::POST, &["complaints"], None).json(complaint),
                "Failed to submit complaint.",
            )
            .await?;
        Ok(created)
    }

    pub async fn update_complaint_status(
        &self,
        id: &str,
        status: &str,
        priority: Option<&str>,
    ) -> Result<(), ApiError> {
        let mut query = vec![("status", status)];
        if let Some(priority) = priority.filter(|p| !p.is_empty()) {
            query.push(("priority", priority));
        }

        self.send_unit(
            self.request(Method::PUT, &["complaints", id, "status"], None)
                .query(&query),
            "Failed to update complaint.",
        )
        .await
    }

    pub async fn delete_complaint(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::DELETE, &["complaints", id], None),
            "Failed to delete complaint.",
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api::tests::serve;

    #[tokio::test]
    async fn test_get_complaint_by_id() {
        let (api, mut requests) = serve(
            200,
            r#"{"id":"c1","_id":"c1","title":"Lift stuck","category":"Maintenance"}"#,
        )
        .await;
        let complaint = api.get_complaint("c1").await.unwrap();
        assert_eq!(requests.recv().await.unwrap(), "GET /complaints/c1");
        assert_eq!(complaint.document_id(), Some("c1"));
        assert_eq!(complaint.status, "Pending");
    }

    #[tokio::test]
    async fn test_status_update_sends_priority_only_when_set() {
        let (api, mut requests) = serve(200, "").await;
        api.update_complaint_status("c1", "Resolved", Some("")).await.unwrap();
        assert_eq!(
            requests.recv().await.unwrap(),
            "PUT /complaints/c1/status?status=Resolved"
        );
    }
}
