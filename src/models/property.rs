use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;
use serde_json::Value;
use std::collections::BTreeSet;

use crate::error::RequestError;
use crate::models::common::{decimal_from_value, flexible_id};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    #[serde(default, deserialize_with = "flexible_id")]
    pub id: Option<String>,
    #[serde(default, rename = "_id", deserialize_with = "flexible_id")]
    pub legacy_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub property_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    pub society_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub price: Option<Decimal>,
    pub location: Option<String>,
    pub area: Option<String>,
    pub image: Option<String>,
    pub society_id: Option<String>,
    pub score: Option<f64>,
}

impl Property {
    pub fn from_record(record: PropertyRecord) -> Option<Self> {
        let name = record
            .name
            .or(record.title)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Unnamed Property".to_string());

        Some(Self {
            id: record.id.or(record.legacy_id)?,
            name,
            property_type: record.property_type,
            status: record.status,
            price: record.price.as_ref().and_then(decimal_from_value),
            location: record.location,
            area: record.area,
            image: record.image.or(record.image_url),
            society_id: record.society_id,
            score: record.score,
        })
    }

    /// Where a visit happens when the tenant leaves the meeting point blank.
    pub fn meeting_point(&self) -> Option<&str> {
        [&self.area, &self.location]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .find(|s| !s.trim().is_empty())
    }
}


/// Client-side projection over an already fetched catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyFilter {
    pub location: Option<String>,
    pub property_type: Option<String>,
    pub status: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl PropertyFilter {
    pub fn matches(&self, property: &Property) -> bool {
        if let Some(location) = &self.location {
            if property.location.as_ref() != Some(location) {
                return false;
            }
        }
        if let Some(kind) = &self.property_type {
            if property.property_type.as_ref() != Some(kind) {
                return false;
            }
        }
        if let Some(status) = &self.status {
            if property.status.as_ref() != Some(status) {
                return false;
            }
        }

        let price = property.price.unwrap_or(Decimal::ZERO);
        if self.min_price.map_or(false, |min| price < min) {
            return false;
        }
        if self.max_price.map_or(false, |max| price > max) {
            return false;
        }
        true
    }

    pub fn apply<'a>(&self, properties: &'a [Property]) -> Vec<&'a Property> {
        properties.iter().filter(|p| self.matches(p)).collect()
    }
}

/// Distinct, sorted values to offer in filter dropdowns.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct FilterOptions {
    pub locations: Vec<String>,
    pub types: Vec<String>,
    pub statuses: Vec<String>,
}

impl FilterOptions {
    pub fn from_properties(properties: &[Property]) -> Self {
        fn distinct<'a>(values: impl Iterator<Item = &'a Option<String>>) -> Vec<String> {
            values
                .flatten()
                .filter(|v| !v.is_empty())
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        }

        Self {
            locations: distinct(properties.iter().map(|p| &p.location)),
            types: distinct(properties.iter().map(|p| &p.property_type)),
            statuses: distinct(properties.iter().map(|p| &p.status)),
        }
    }
}

/// Body of `POST /properties/recommend`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationQuery {
    pub k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl RecommendationQuery {
    pub fn top(k: u32) -> Self {
        Self {
            k,
            location: None,
            min_price: None,
            max_price: None,
            alpha: None,
        }
    }

    /// Carries the location and price bounds of a browsing filter over.
    pub fn from_filter(k: u32, filter: &PropertyFilter) -> Self {
        Self {
            location: filter.location.clone(),
            min_price: filter.min_price,
            max_price: filter.max_price,
            ..Self::top(k)
        }
    }
}

impl Default for RecommendationQuery {
    fn default() -> Self {
        Self::top(6)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickEvent {
    pub property_id: String,
}

/// Body of `POST /properties` and `PUT /properties/{id}`.
#[derive(Debug, Clone, Serialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertyForm {
    #[validate(length(min = 1, message = "Please enter property name"))]
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: String,
    pub status: String,
    pub location: String,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub society_id: Option<String>,
}

impl PropertyForm {
    pub const APARTMENT: &'static str = "Apartment";

    pub fn new(name: &str, property_type: &str) -> Self {
        Self {
            name: name.to_string(),
            property_type: property_type.to_string(),
            status: "Available".to_string(),
            location: String::new(),
            price: Decimal::ZERO,
            image: None,
            society_id: None,
        }
    }

    /// Prefills the edit form from a catalog entry.
    pub fn from_property(property: &Property) -> Self {
        Self {
            name: property.name.clone(),
            property_type: property
                .property_type
                .clone()
                .unwrap_or_else(|| Self::APARTMENT.to_string()),
            status: property
                .status
                .clone()
                .unwrap_or_else(|| "Available".to_string()),
            location: property.location.clone().unwrap_or_default(),
            price: property.price.unwrap_or(Decimal::ZERO),
            image: property.image.clone(),
            society_id: property.society_id.clone(),
        }
    }

    pub fn is_apartment(&self) -> bool {
        self.property_type == Self::APARTMENT
    }

    /// Trimmed copy ready to send. Apartments must name their society and
    /// every other type is sent without one.
    pub fn prepared(&self) -> Result<Self, RequestError> {
        let mut form = self.clone();
        form.name = form.name.trim().to_string();
        form.society_id = form.society_id.filter(|id| !id.trim().is_empty());
        form.image = form.image.filter(|url| !url.trim().is_empty());

        if form.name.is_empty() {
            let message = if form.is_apartment() {
                "Please enter flat or apartment number"
            } else {
                "Please enter property name"
            };
            return Err(RequestError::Validation(message.to_string()));
        }
        form.validate()?;

        if form.is_apartment() {
            if form.society_id.is_none() {
                return Err(RequestError::Validation(
                    "Please select a society for Apartment".to_string(),
                ));
            }
        } else {
            form.society_id = None;
        }
        if form.price < Decimal::ZERO {
            return Err(RequestError::Validation("Price cannot be negative".to_string()));
        }
        Ok(form)
    }
}
