use reqwest::Method;
use validator::Validate;

use super::ApiClient;
use crate::error::RequestError;
use crate::models::user::{
    AuthMessage, EmailRequest, LoginRequest, LoginResponse, OtpPurpose, RegisterRequest,
    ResetPasswordRequest, VerifyOtpRequest,
};

impl ApiClient {
    /// `POST /auth/login`. Returns the raw bearer token; the caller hands it
    /// to the session store.
    pub async fn login(&self, request: &LoginRequest) -> Result<String, RequestError> {
        request.validate()?;

        let response: LoginResponse = self
            .send_json(
                self.request(Method::POST, &["auth", "login"], None).json(request),
                "Login failed",
            )
            .await?;
        Ok(response.token)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthMessage, RequestError> {
        request.validate()?;

        let body: Option<AuthMessage> = self
            .send_json(
                self.request(Method::POST, &["auth", "register"], None).json(request),
                "Registration failed",
            )
            .await?;
        Ok(body.unwrap_or_default())
    }

    pub async fn verify_otp(
        &self,
        email: &str,
        code: &str,
        purpose: OtpPurpose,
    ) -> Result<AuthMessage, RequestError> {
        let request = VerifyOtpRequest {
            email: email.trim().to_string(),
            code: code.trim().to_string(),
            purpose,
        };
        request
            .validate()
            .map_err(|_| RequestError::Validation("Please enter the 6-digit code.".to_string()))?;

        let body: Option<AuthMessage> = self
            .send_json(
                self.request(Method::POST, &["auth", "verify-otp"], None).json(&request),
                "Verification failed",
            )
            .await?;
        Ok(body.unwrap_or_default())
    }

    pub async fn resend_otp(&self, email: &str) -> Result<AuthMessage, RequestError> {
        self.email_only(&["auth", "resend"], email, "Could not resend code. Please try again.")
            .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<AuthMessage, RequestError> {
        self.email_only(&["auth", "forgot-password"], email, "Could not start password reset")
            .await
    }

    pub async fn reset_password(
        &self,
        request: &ResetPasswordRequest,
    ) -> Result<AuthMessage, RequestError> {
        request.validate()?;
        if request.code.is_none() && request.reset_token.is_none() {
            return Err(RequestError::Validation(
                "A reset code or reset token is required".to_string(),
            ));
        }

        let body: Option<AuthMessage> = self
            .send_json(
                self.request(Method::POST, &["auth", "reset-password"], None).json(request),
                "Password reset failed",
            )
            .await?;
        Ok(body.unwrap_or_default())
    }

    async fn email_only(
        &self,
        segments: &[&str],
        email: &str,
        fallback: &str,
    ) -> Result<AuthMessage, RequestError> {
        let request = EmailRequest {
            email: email.trim().to_string(),
        };
        request.validate()?;

        let body: Option<AuthMessage> = self
            .send_json(self.request(Method::POST, segments, None).json(&request), fallback)
            .await?;
        Ok(body.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use tokio::sync::watch;

    fn offline_client() -> ApiClient {
        let (_tx, rx) = watch::channel(None);
        let config = ApiConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            ..ApiConfig::default()
        };
        ApiClient::new(&config, rx).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_login_never_reaches_network() {
        let api = offline_client();
        let request = LoginRequest {
            email: "not-an-email".to_string(),
            password: "pw".to_string(),
            remember_me: false,
        };
        assert!(matches!(
            api.login(&request).await,
            Err(RequestError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_short_otp_is_rejected_locally() {
        let api = offline_client();
        let result = api.verify_otp("a@example.com", "123", OtpPurpose::Verify).await;
        match result {
            Err(RequestError::Validation(msg)) => assert!(msg.contains("6-digit")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_reset_requires_code_or_token() {
        let api = offline_client();
        let request = ResetPasswordRequest {
            email: "a@example.com".to_string(),
            code: None,
            password: "secret123".to_string(),
            reset_token: None,
        };
        assert!(matches!(
            api.reset_password(&request).await,
            Err(RequestError::Validation(_))
        ));
    }
}
