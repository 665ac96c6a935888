use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::{decode_list, normalize, ApiClient};
use crate::error::ApiError;
use crate::models::appointment::{Appointment, AppointmentRecord, NewAppointment, RespondParams};

#[async_trait]
pub trait AppointmentApi: Send + Sync {
    /// `GET /appointments`
    async fn fetch_appointments(&self) -> Result<Vec<Appointment>, ApiError>;

    /// `POST /appointments`
    async fn create_appointment(&self, request: &NewAppointment)
        -> Result<AppointmentRecord, ApiError>;

    /// `PUT /appointments/{id}/respond`, parameters in the query string.
    async fn respond_to_appointment(&self, id: &str, params: &RespondParams)
        -> Result<(), ApiError>;

    /// `DELETE /appointments/{id}`. Rejecting and cancelling both land here.
    async fn delete_appointment(&self, id: &str) -> Result<(), ApiError>;

    /// `POST /no-show/score/{id}`, answering with the re-scored document.
    async fn score_appointment(&self, id: &str) -> Result<AppointmentRecord, ApiError>;
}

#[async_trait]
impl AppointmentApi for ApiClient {
    async fn fetch_appointments(&self) -> Result<Vec<Appointment>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["appointments"], None),
                "Failed to fetch requests.",
            )
            .await?;

        let records: Vec<AppointmentRecord> = decode_list(body, "appointment");
        Ok(normalize(records, "appointment", Appointment::from_record))
    }

    async fn create_appointment(
        &self,
        request: &NewAppointment,
    ) -> Result<AppointmentRecord, ApiError> {
        let body: Option<AppointmentRecord> = self
            .send_json(
                self.request(Method::POST, &["appointments"], None).json(request),
                "Failed to send appointment request.",
            )
            .await?;
        Ok(body.unwrap_or_default())
    }

    async fn respond_to_appointment(
        &self,
        id: &str,
        params: &RespondParams,
    ) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::PUT, &["appointments", id, "respond"], None)
                .query(&params.query_pairs()),
            "Failed to approve request.",
        )
        .await
    }

    async fn delete_appointment(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::DELETE, &["appointments", id], None),
            "Failed to reject request.",
        )
        .await
    }

    async fn score_appointment(&self, id: &str) -> Result<AppointmentRecord, ApiError> {
        let body: Option<AppointmentRecord> = self
            .send_json(
                self.request(Method::POST, &["no-show", "score", id], None),
                "Failed to score appointment.",
            )
            .await?;
        body.ok_or_else(|| ApiError::transport("Scoring returned an empty response"))
    }
}
