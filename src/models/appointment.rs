use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use validator::Validate;

use crate::error::AppointmentError;
use crate::models::common::{flexible_id, PersonRecord};

/// Time used when a visit date is picked without a time.
pub const DEFAULT_VISIT_TIME: &str = "09:00:00";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Requested,
    Accepted,
    #[serde(alias = "DECLINED")]
    Rejected,
    #[serde(other)]
    Unknown,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Accepted | AppointmentStatus::Rejected)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppointmentStatus::Requested => "REQUESTED",
            AppointmentStatus::Accepted => "ACCEPTED",
            AppointmentStatus::Rejected => "REJECTED",
            AppointmentStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Appointment document exactly as the backend sends it. Every field is
/// optional so the same type doubles as a partial patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub property_id: Option<String>,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
    #[serde(default)]
    pub date_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub no_show_score: Option<f64>,
    #[serde(default)]
    pub no_show_flag: Option<bool>,
    #[serde(default)]
    pub last_scored_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub tenant: Option<Value>,
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub tenant_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub requested_by: Option<String>,
}

/// Who asked for the visit, folded from whichever shape the server used.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Requester {
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Requester {
    fn from_record(record: &AppointmentRecord) -> Option<Self> {
        let nested = [&record.tenant, &record.user]
            .into_iter()
            .flatten()
            .filter(|v| v.is_object())
            .find_map(|v| serde_json::from_value::<PersonRecord>(v.clone()).ok());

        if let Some(person) = nested {
            return Some(Requester {
                user_id: person.document_id().map(str::to_string),
                name: person.display_name(),
                email: person.contact_email(),
            });
        }

        let user_id = record
            .user_id
            .clone()
            .or_else(|| record.tenant_id.clone())
            .or_else(|| record.requested_by.clone())?;

        Some(Requester {
            user_id: Some(user_id),
            name: None,
            email: None,
        })
    }
}

/// Canonical visit request held by the client.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub property_id: Option<String>,
    pub status: AppointmentStatus,
    pub date_time: Option<String>,
    pub location: Option<String>,
    pub no_show_score: Option<f64>,
    pub no_show_flag: Option<bool>,
    pub last_scored_at: Option<String>,
    pub created_at: Option<String>,
    pub requester: Option<Requester>,
}

impl Appointment {
    /// Normalizes a server document. Documents without an id are unusable.
    pub fn from_record(record: AppointmentRecord) -> Option<Self> {
        let requester = Requester::from_record(&record);
        let id = record.id.or(record.legacy_id)?;

        Some(Self {
            id,
            property_id: record.property_id,
            status: record.status.unwrap_or(AppointmentStatus::Requested),
            date_time: record.date_time,
            location: record.location,
            no_show_score: record.no_show_score,
            no_show_flag: record.no_show_flag,
            last_scored_at: record.last_scored_at,
            created_at: record.created_at,
            requester,
        })
    }

    /// Spreads the fields present in `patch` over this record.
    pub fn merge(&mut self, patch: AppointmentRecord) {
        if let Some(requester) = Requester::from_record(&patch) {
            self.requester = Some(requester);
        }
        if let Some(property_id) = patch.property_id {
            self.property_id = Some(property_id);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(date_time) = patch.date_time {
            self.date_time = Some(date_time);
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(score) = patch.no_show_score {
            self.no_show_score = Some(score);
        }
        if let Some(flag) = patch.no_show_flag {
            self.no_show_flag = Some(flag);
        }
        if let Some(scored_at) = patch.last_scored_at {
            self.last_scored_at = Some(scored_at);
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = Some(created_at);
        }
    }

    pub fn risk(&self) -> Option<RiskTier> {
        self.no_show_score.map(RiskTier::from_score)
    }
}

/// Body of `POST /appointments`.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAppointment {
    #[validate(length(min = 1, message = "A property must be selected"))]
    pub property_id: String,
    pub date_time: Option<String>,
    pub location: Option<String>,
}

/// Raw visit form as a tenant fills it in.
#[derive(Debug, Clone, Default)]
pub struct VisitForm {
    pub property_id: String,
    pub date: String,
    pub time: String,
    pub location: String,
}

impl VisitForm {
    /// Builds the request body. An empty location falls back to the
    /// property's own location.
    pub fn into_new_appointment(
        self,
        fallback_location: Option<&str>,
    ) -> Result<NewAppointment, AppointmentError> {
        let date_time = compose_date_time(&self.date, &self.time)?;
        let location = Some(self.location.trim())
            .filter(|l| !l.is_empty())
            .or(fallback_location)
            .unwrap_or("")
            .to_string();

        let request = NewAppointment {
            property_id: self.property_id.trim().to_string(),
            date_time,
            location: Some(location),
        };
        request
            .validate()
            .map_err(|e| AppointmentError::Validation(e.to_string()))?;
        Ok(request)
    }
}

/// Query parameters of `PUT /appointments/{id}/respond`.
#[derive(Debug, Clone, PartialEq)]
pub struct RespondParams {
    pub accepted: bool,
    pub date_time: Option<String>,
    pub location: Option<String>,
}

impl RespondParams {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("accepted", self.accepted.to_string())];
        if let Some(date_time) = self.date_time.as_ref().filter(|d| !d.is_empty()) {
            pairs.push(("dateTime", date_time.clone()));
        }
        if let Some(location) = self.location.as_ref().filter(|l| !l.is_empty()) {
            pairs.push(("location", location.clone()));
        }
        pairs
    }
}

/// Approver's edit form, pre-filled from the tenant's request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApprovalForm {
    pub date: String,
    pub time: String,
    pub location: String,
}

impl ApprovalForm {
    pub fn prefill(appointment: &Appointment) -> Self {
        let (date, time) = match appointment.date_time.as_deref() {
            Some(dt) if dt.len() >= 16 && dt.is_char_boundary(16) => {
                (dt[..10].to_string(), dt[11..16].to_string())
            }
            Some(dt) if dt.len() >= 10 && dt.is_char_boundary(10) => {
                (dt[..10].to_string(), String::new())
            }
            _ => (String::new(), String::new()),
        };

        Self {
            date,
            time,
            location: appointment.location.clone().unwrap_or_default(),
        }
    }

    /// Acceptance parameters. An empty location keeps the requested one.
    pub fn into_params(self, original: &Appointment) -> Result<RespondParams, AppointmentError> {
        let date_time = compose_date_time(&self.date, &self.time)?;
        let location = Some(self.location.trim().to_string())
            .filter(|l| !l.is_empty())
            .or_else(|| original.location.clone());

        Ok(RespondParams {
            accepted: true,
            date_time,
            location,
        })
    }
}

/// Joins a date field and a time field into a local ISO timestamp.
///
/// Both present gives `{date}T{time}:00`, a date alone defaults to nine in the
/// morning, and no date at all means no timestamp.
pub fn compose_date_time(date: &str, time: &str) -> Result<Option<String>, AppointmentError> {
    let date = date.trim();
    let time = time.trim();

    if date.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| AppointmentError::Validation(format!("Invalid date: {}", date)))?;

    if time.is_empty() {
        return Ok(Some(format!("{}T{}", date, DEFAULT_VISIT_TIME)));
    }
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| AppointmentError::Validation(format!("Invalid time: {}", time)))?;

    Ok(Some(format!("{}T{}:00", date, time)))
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn percent(score: f64) -> i64 {
        (score * 100.0).round() as i64
    }

    pub fn from_score(score: f64) -> Self {
        match Self::percent(score) {
            pct if pct >= 70 => RiskTier::High,
            pct if pct >= 40 => RiskTier::Medium,
            _ => RiskTier::Low,
        }
    }

    /// Human label such as `"72% (High risk)"`.
    pub fn label(score: f64) -> String {
        let tier = match Self::from_score(score) {
            RiskTier::High => "High",
            RiskTier::Medium => "Medium",
            RiskTier::Low => "Low",
        };
        format!("{}% ({} risk)", Self::percent(score), tier)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}
