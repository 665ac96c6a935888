use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::api::PropertyApi;
use crate::error::ApiError;
use crate::models::property::{Property, RecommendationQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Recorded,
    /// Already sent for this property during the session.
    Duplicate,
    /// Anonymous visitors are not tracked.
    Skipped,
    /// The backend refused to track this user (401/403).
    NotTracked { status: u16 },
}

/// Per-session set of property ids whose click was already sent.
#[derive(Default)]
pub struct ClickTracker {
    seen: Mutex<HashSet<String>>,
}

impl ClickTracker {
    /// Returns true the first time an id is claimed.
    fn claim(&self, property_id: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(property_id.to_string())
    }

    pub fn contains(&self, property_id: &str) -> bool {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(property_id)
    }

    pub fn reset(&self) {
        self.seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

pub struct RecommendationService<P: PropertyApi> {
    api: P,
    clicks: ClickTracker,
    debounce: Duration,
    generation: AtomicU64,
}

impl<P: PropertyApi> RecommendationService<P> {
    pub fn new(api: P, debounce: Duration) -> Self {
        Self {
            api,
            clicks: ClickTracker::default(),
            debounce,
            generation: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    pub fn clicks(&self) -> &ClickTracker {
        &self.clicks
    }

    /// Up to `query.k` ranked suggestions.
    pub async fn recommend(
        &self,
        query: &RecommendationQuery,
        token: Option<&str>,
    ) -> Result<Vec<Property>, ApiError> {
        let mut properties = self.api.recommend_properties(query, token).await?;
        properties.truncate(query.k as usize);
        Ok(properties)
    }

    /// Debounced variant for filter-driven lookups. Each call supersedes the
    /// previous one; a superseded call resolves to `None` without its result
    /// ever being returned.
    pub async fn recommend_latest(
        &self,
        query: &RecommendationQuery,
        token: Option<&str>,
    ) -> Result<Option<Vec<Property>>, ApiError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.debounce).await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return Ok(None);
        }

        let properties = self.recommend(query, token).await?;
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Discarding superseded recommendation result");
            return Ok(None);
        }
        Ok(Some(properties))
    }

    /// Sends a click event at most once per property per session.
    pub async fn record_click(
        &self,
        property_id: &str,
        token: Option<&str>,
    ) -> Result<ClickOutcome, ApiError> {
        let property_id = property_id.trim();
        let token = match token.filter(|t| !t.is_empty()) {
            Some(token) if !property_id.is_empty() => token,
            _ => return Ok(ClickOutcome::Skipped),
        };
        if !self.clicks.claim(property_id) {
            return Ok(ClickOutcome::Duplicate);
        }

        match self.api.record_property_click(property_id, Some(token)).await {
            Ok(()) => {
                log::debug!("Recorded property click: {}", property_id);
                Ok(ClickOutcome::Recorded)
            }
            Err(e) if e.is_auth_rejection() => {
                let status = e.status().unwrap_or_default();
                log::debug!("Property click not tracked ({}) for {}", status, property_id);
                Ok(ClickOutcome::NotTracked { status })
            }
            Err(e) => {
                log::warn!("Failed to record click for {}: {}", property_id, e);
                Err(e)
            }
        }
    }

    /// Starts a fresh session: clicks may be sent again and pending debounced
    /// lookups are abandoned.
    pub fn reset_session(&self) {
        self.clicks.reset();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
