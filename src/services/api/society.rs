//! Society-scoped endpoints. Members routinely lack rights to some of these,
//! so a 403 is an answer rather than a failure.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use super::{decode_list, ApiClient};
use crate::error::{ApiError, RequestError};
use crate::models::society::{
    Booking, BookingRequest, Facility, MaintenanceSummary, NewSociety, Society,
};

/// Result of a read the caller may not be allowed to make.
#[derive(Debug, Clone, PartialEq)]
pub enum Access<T> {
    Granted(T),
    Denied,
}

impl<T> Access<T> {
    pub fn is_denied(&self) -> bool {
        matches!(self, Access::Denied)
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Access<U> {
        match self {
            Access::Granted(value) => Access::Granted(f(value)),
            Access::Denied => Access::Denied,
        }
    }

    /// The granted value, or `T::default()` when denied.
    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        match self {
            Access::Granted(value) => value,
            Access::Denied => T::default(),
        }
    }
}

impl ApiClient {
    /// GET that maps 403 onto [`Access::Denied`]; every other failure is an error.
    async fn guarded_get<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        fallback: &str,
    ) -> Result<Access<T>, ApiError> {
        match self
            .send_json(self.request(Method::GET, segments, None), fallback)
            .await
        {
            Ok(value) => Ok(Access::Granted(value)),
            Err(ApiError::PermissionDenied { message }) => {
                log::debug!("{} denied: {}", segments.join("/"), message);
                Ok(Access::Denied)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_societies(&self) -> Result<Access<Vec<Society>>, ApiError> {
        let body: Access<Value> = self
            .guarded_get(&["societies"], "Failed to load societies")
            .await?;
        Ok(body.map(|value| decode_list(value, "society")))
    }

    pub async fn create_society(&self, society: &NewSociety) -> Result<Society, RequestError> {
        society.validate()?;

        let created = self
            .send_json(
                self.request(Method::POST, &["societies"], None).json(society),
                "Failed to add society",
            )
            .await?;
        Ok(created)
    }

    /// Facilities of a society. No society means nothing to list.
    pub async fn get_facilities(
        &self,
        society_id: &str,
    ) -> Result<Access<Vec<Facility>>, ApiError> {
        if society_id.trim().is_empty() {
            return Ok(Access::Granted(Vec::new()));
        }
        let body: Access<Value> = self
            .guarded_get(
                &["societies", society_id, "facilities"],
                "Failed to load facilities",
            )
            .await?;
        Ok(body.map(|value| decode_list(value, "facility")))
    }

    pub async fn get_facility_bookings(
        &self,
        facility_id: &str,
    ) -> Result<Access<Vec<Booking>>, ApiError> {
        if facility_id.trim().is_empty() {
            return Ok(Access::Granted(Vec::new()));
        }
        let body: Access<Value> = self
            .guarded_get(
                &["facilities", facility_id, "bookings"],
                "Failed to load bookings",
            )
            .await?;
        Ok(body.map(|value| decode_list(value, "booking")))
    }

    pub async fn book_facility(
        &self,
        facility_id: &str,
        request: &BookingRequest,
    ) -> Result<Booking, RequestError> {
        if facility_id.trim().is_empty() {
            return Err(RequestError::Validation("facilityId is required".to_string()));
        }
        request.validate()?;

        let booking = self
            .send_json(
                self.request(Method::POST, &["facilities", facility_id, "bookings"], None)
                    .json(request),
                "Failed to book facility",
            )
            .await?;
        Ok(booking)
    }

    /// Maintenance invoices for a society. An empty or oddly shaped body is
    /// an empty summary.
    pub async fn get_maintenance_summary(
        &self,
        society_id: &str,
    ) -> Result<Access<MaintenanceSummary>, ApiError> {
        if society_id.trim().is_empty() {
            return Ok(Access::Granted(MaintenanceSummary::default()));
        }
        let body: Access<Value> = self
            .guarded_get(
                &["societies", society_id, "maintenance", "summary"],
                "Failed to load maintenance data.",
            )
            .await?;
        Ok(body.map(|value| serde_json::from_value(value).unwrap_or_default()))
    }
}
