use reqwest::Method;
use serde_json::Value;
use validator::Validate;

use super::{decode_list, ApiClient};
use crate::error::{ApiError, RequestError};
use crate::models::notice::{Notice, NoticeForm};

impl ApiClient {
    pub async fn get_notices(&self) -> Result<Vec<Notice>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["notices"], None),
                "Failed to load notices",
            )
            .await?;
        Ok(decode_list(body, "notice"))
    }

    pub async fn create_notice(&self, form: &NoticeForm) -> Result<Notice, RequestError> {
        form.validate()?;

        let created = self
            .send_json(
                self.request(Method::POST, &["notices"], None).json(form),
                "Failed to create notice",
            )
            .await?;
        Ok(created)
    }

    /// Answers with the stored notice, which replaces the local copy.
    pub async fn update_notice(&self, id: &str, form: &NoticeForm) -> Result<Notice, RequestError> {
        form.validate()?;

        let updated = self
            .send_json(
                self.request(Method::PUT, &["notices", id], None).json(form),
                "Failed to update notice",
            )
            .await?;
        Ok(updated)
    }

    pub async fn delete_notice(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::DELETE, &["notices", id], None),
            "Failed to delete notice",
        )
        .await
    }
}
