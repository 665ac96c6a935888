use reqwest::Method;
use serde_json::Value;
use validator::Validate;

use super::{decode_list, ApiClient};
use crate::error::{ApiError, RequestError};
use crate::models::user::{InviteRequest, Role, RoleUpdate, UserRecord};

impl ApiClient {
    /// `GET /users/{id}`; used to look up the e-mail of the signed-in user.
    pub async fn get_user(&self, id: &str) -> Result<UserRecord, ApiError> {
        self.send_json(
            self.request(Method::GET, &["users", id], None),
            "Failed to load user",
        )
        .await
    }

    pub async fn get_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["users"], None),
                "Failed to load users",
            )
            .await?;
        Ok(decode_list(body, "user"))
    }

    /// Id, e-mail and society of every user, readable without admin rights.
    pub async fn get_public_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["users", "public"], None),
                "Failed to load users",
            )
            .await?;
        Ok(decode_list(body, "user"))
    }

    pub async fn invite_user(&self, invite: &InviteRequest) -> Result<Value, RequestError> {
        invite.validate()?;

        let body: Option<Value> = self
            .send_json(
                self.request(Method::POST, &["users", "invite"], None).json(invite),
                "Failed to invite user",
            )
            .await?;
        Ok(body.unwrap_or(Value::Null))
    }

    pub async fn update_user_role(&self, id: &str, role: Role) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, &["users", id, "role"], None)
                .json(&RoleUpdate { role }),
            "Failed to update role",
        )
        .await
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::DELETE, &["users", id], None),
            "Failed to delete user",
        )
        .await
    }
}
