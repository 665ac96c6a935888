use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use super::{decode_list, normalize, ApiClient};
use crate::error::{ApiError, RequestError};
use crate::models::property::{
    ClickEvent, Property, PropertyForm, PropertyRecord, RecommendationQuery,
};

/// Property browsing endpoints. `token` overrides the session token when set.
#[async_trait]
pub trait PropertyApi: Send + Sync {
    async fn fetch_properties(&self, token: Option<&str>) -> Result<Vec<Property>, ApiError>;

    async fn recommend_properties(
        &self,
        query: &RecommendationQuery,
        token: Option<&str>,
    ) -> Result<Vec<Property>, ApiError>;

    async fn record_property_click(
        &self,
        property_id: &str,
        token: Option<&str>,
    ) -> Result<(), ApiError>;
}

#[async_trait]
impl PropertyApi for ApiClient {
    async fn fetch_properties(&self, token: Option<&str>) -> Result<Vec<Property>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::GET, &["properties"], token),
                "Failed to load properties",
            )
            .await?;

        let records: Vec<PropertyRecord> = decode_list(body, "property");
        Ok(normalize(records, "property", Property::from_record))
    }

    async fn recommend_properties(
        &self,
        query: &RecommendationQuery,
        token: Option<&str>,
    ) -> Result<Vec<Property>, ApiError> {
        let body: Value = self
            .send_json(
                self.request(Method::POST, &["properties", "recommend"], token)
                    .json(query),
                "Failed to fetch recommendations",
            )
            .await?;

        let records: Vec<PropertyRecord> = decode_list(body, "recommendation");
        Ok(normalize(records, "recommendation", Property::from_record))
    }

    async fn record_property_click(
        &self,
        property_id: &str,
        token: Option<&str>,
    ) -> Result<(), ApiError> {
        let event = ClickEvent {
            property_id: property_id.to_string(),
        };
        self.send_unit(
            self.request(Method::POST, &["properties", "events", "property-click"], token)
                .json(&event),
            "Failed to record property click",
        )
        .await
    }
}

/// Property management for owners.
impl ApiClient {
    pub async fn get_property(&self, id: &str) -> Result<Property, ApiError> {
        let record: PropertyRecord = self
            .send_json(
                self.request(Method::GET, &["properties", id], None),
                "Failed to fetch property",
            )
            .await?;
        Property::from_record(record)
            .ok_or_else(|| ApiError::transport("Property response carried no id"))
    }

    pub async fn add_property(&self, form: &PropertyForm) -> Result<Option<Property>, RequestError> {
        let form = form.prepared()?;
        let body: Option<PropertyRecord> = self
            .send_json(
                self.request(Method::POST, &["properties"], None).json(&form),
                "Failed to add property",
            )
            .await?;
        Ok(body.and_then(Property::from_record))
    }

    pub async fn update_property(
        &self,
        id: &str,
        form: &PropertyForm,
    ) -> Result<Option<Property>, RequestError> {
        let form = form.prepared()?;
        let body: Option<PropertyRecord> = self
            .send_json(
                self.request(Method::PUT, &["properties", id], None).json(&form),
                "Failed to update property",
            )
            .await?;
        Ok(body.and_then(Property::from_record))
    }

    pub async fn delete_property(&self, id: &str) -> Result<(), ApiError> {
        self.send_unit(
            self.request(Method::DELETE, &["properties", id], None),
            "Failed to delete property",
        )
        .await
    }
}
