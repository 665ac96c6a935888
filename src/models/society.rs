use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::models::common::{decimal_from_value, flexible_id};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Society {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
}

impl Society {
    pub fn document_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct NewSociety {
    #[validate(length(min = 1, message = "Society name is required"))]
    pub name: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub society_id: Option<String>,
}

impl Facility {
    pub fn document_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.legacy_id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id", skip_serializing)]
    pub legacy_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub facility_id: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Body of `POST /facilities/{id}/bookings`.
#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[validate(length(min = 1, message = "Booking date is required"))]
    pub date: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub due_date: Option<String>,
}

impl Invoice {
    /// Unparseable amounts count as zero.
    pub fn amount(&self) -> Decimal {
        self.amount
            .as_ref()
            .and_then(decimal_from_value)
            .unwrap_or(Decimal::ZERO)
    }
}

/// `GET /societies/{id}/maintenance/summary`. Unknown shapes decode as an
/// empty invoice list.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MaintenanceSummary {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceTotals {
    pub total: Decimal,
    pub paid: Decimal,
    pub pending: Decimal,
    /// Due date of the last paid invoice in list order.
    pub last_payment: Option<String>,
}

impl MaintenanceSummary {
    pub fn totals(&self) -> MaintenanceTotals {
        let total: Decimal = self.invoices.iter().map(Invoice::amount).sum();
        let paid: Decimal = self
            .invoices
            .iter()
            .filter(|i| i.paid)
            .map(Invoice::amount)
            .sum();
        let last_payment = self
            .invoices
            .iter()
            .filter(|i| i.paid)
            .last()
            .and_then(|i| i.due_date.clone());

        MaintenanceTotals {
            total,
            paid,
            pending: total - paid,
            last_payment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_maintenance_totals() {
        let summary: MaintenanceSummary = serde_json::from_value(json!({
            "invoices": [
                {"id": 1, "amount": 1500, "paid": true, "dueDate": "2025-04-05"},
                {"id": 2, "amount": "1500.50", "paid": true, "dueDate": "2025-05-05"},
                {"id": 3, "amount": 1500, "dueDate": "2025-06-05"},
                {"id": 4, "amount": "n/a"}
            ]
        }))
        .unwrap();

        let totals = summary.totals();
        assert_eq!(totals.total, Decimal::new(450050, 2));
        assert_eq!(totals.paid, Decimal::new(300050, 2));
        assert_eq!(totals.pending, Decimal::from(1500));
        assert_eq!(totals.last_payment.as_deref(), Some("2025-05-05"));
    }

    #[test]
    fn test_empty_summary() {
        let summary: MaintenanceSummary = serde_json::from_value(json!({})).unwrap();
        let totals = summary.totals();
        assert_eq!(totals.total, Decimal::ZERO);
        assert_eq!(totals.last_payment, None);
    }

    #[test]
    fn test_facility_and_booking_ids() {
        let facility: Facility =
            serde_json::from_value(json!({"id": "f1", "_id": "f1", "name": "Clubhouse"})).unwrap();
        assert_eq!(facility.document_id(), Some("f1"));

        let booking: Booking = serde_json::from_value(json!({
            "_id": "b1",
            "facilityId": "f1",
            "date": "2025-07-01",
            "startTime": "10:00"
        }))
        .unwrap();
        assert_eq!(booking.legacy_id.as_deref(), Some("b1"));
        assert_eq!(booking.start_time.as_deref(), Some("10:00"));
    }
}
