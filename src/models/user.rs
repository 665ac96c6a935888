use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

use crate::models::common::flexible_id;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Secretary,
    Member,
    Watchman,
    #[serde(other)]
    User,
}

impl Role {
    /// Owners and secretaries approve, reject and score visit requests.
    pub fn can_review_appointments(&self) -> bool {
        matches!(self, Role::Owner | Role::Secretary)
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Owner => "/dashboard/owner",
            Role::Secretary => "/dashboard/secretary",
            Role::Member => "/dashboard/member",
            Role::Watchman => "/dashboard/watchman",
            Role::User => "/dashboard/user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Owner => "OWNER",
            Role::Secretary => "SECRETARY",
            Role::Member => "MEMBER",
            Role::Watchman => "WATCHMAN",
            Role::User => "USER",
        };
        write!(f, "{}", s)
    }
}

/// Payload segment of the bearer token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: Role,
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
}

/// The signed-in user, derived entirely from the bearer token.
#[derive(Clone, PartialEq)]
pub struct UserIdentity {
    pub id: Option<String>,
    pub email: String,
    pub role: Role,
    pub token: String,
}

impl UserIdentity {
    pub fn from_claims(claims: TokenClaims, token: String) -> Self {
        Self {
            id: claims.id,
            email: claims.sub,
            role: claims.role,
            token,
        }
    }
}

// Keeps the bearer token out of logs.
impl fmt::Debug for UserIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserIdentity")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub remember_me: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    pub role: String,
}

impl RegisterRequest {
    /// Role names go out upper-cased, defaulting to `USER`.
    pub fn new(name: String, email: String, password: String, role: Option<&str>) -> Self {
        let role = role
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| Role::User.to_string());
        Self {
            name,
            email,
            password,
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OtpPurpose {
    Verify,
    Reset,
}

#[derive(Debug, Serialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(custom = "validate_otp")]
    pub code: String,
    pub purpose: OtpPurpose,
}

#[derive(Debug, Serialize, Validate)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

#[derive(Debug, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

/// Generic acknowledgement most auth endpoints answer with.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AuthMessage {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, rename = "resetToken")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub society_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl UserRecord {
    pub fn document_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }
}

/// Body of `POST /users/invite`.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub society_id: Option<String>,
}

/// Body of `PUT /users/{id}/role`.
#[derive(Debug, Clone, Serialize)]
pub struct RoleUpdate {
    pub role: Role,
}

fn validate_otp(code: &str) -> Result<(), ValidationError> {
    let valid = Regex::new(r"^\d{6}$")
        .map(|re| re.is_match(code))
        .unwrap_or(false);
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("otp_must_be_six_digits"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_parsing() {
        let role: Role = serde_json::from_value(json!("SECRETARY")).unwrap();
        assert_eq!(role, Role::Secretary);
        assert!(role.can_review_appointments());

        let role: Role = serde_json::from_value(json!("TENANT")).unwrap();
        assert_eq!(role, Role::User);
        assert!(!role.can_review_appointments());
        assert_eq!(role.dashboard_path(), "/dashboard/user");
    }

    #[test]
    fn test_register_role_is_uppercased() {
        let request = RegisterRequest::new(
            "Meera".to_string(),
            "meera@example.com".to_string(),
            "secret123".to_string(),
            Some("member"),
        );
        assert_eq!(request.role, "MEMBER");

        let request = RegisterRequest::new(
            "Meera".to_string(),
            "meera@example.com".to_string(),
            "secret123".to_string(),
            None,
        );
        assert_eq!(request.role, "USER");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_otp_validation() {
        let request = VerifyOtpRequest {
            email: "a@example.com".to_string(),
            code: "123456".to_string(),
            purpose: OtpPurpose::Verify,
        };
        assert!(request.validate().is_ok());

        let request = VerifyOtpRequest {
            code: "12a456".to_string(),
            ..request
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_identity_debug_hides_token() {
        let identity = UserIdentity {
            id: Some("1".to_string()),
            email: "owner@example.com".to_string(),
            role: Role::Owner,
            token: "header.payload.signature".to_string(),
        };
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains("owner@example.com"));
        assert!(!rendered.contains("signature"));
    }

    #[test]
    fn test_user_record_with_both_ids() {
        let user: UserRecord = serde_json::from_value(json!({
            "id": 3,
            "_id": 3,
            "email": "sec@example.com",
            "role": "SECRETARY"
        }))
        .unwrap();
        assert_eq!(user.document_id(), Some("3"));
        assert_eq!(user.role, Some(Role::Secretary));
    }

    #[test]
    fn test_invite_request_shape() {
        let invite = InviteRequest {
            email: "new@example.com".to_string(),
            role: Role::Watchman,
            society_id: None,
        };
        assert!(invite.validate().is_ok());
        assert_eq!(
            serde_json::to_value(&invite).unwrap(),
            json!({"email": "new@example.com", "role": "WATCHMAN"})
        );

        let bad = InviteRequest {
            email: "nope".to_string(),
            ..invite
        };
        assert!(bad.validate().is_err());
    }
}
