use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::api::PropertyApi;
use crate::error::ApiError;
use crate::models::property::{FilterOptions, Property, PropertyFilter};

/// Read-through view of `GET /properties`, backed by a per-session cache file.
/// The cache is best-effort: read and write failures only log.
pub struct PropertyCatalog<P: PropertyApi> {
    api: P,
    cache_path: Option<PathBuf>,
    properties: Mutex<Option<Vec<Property>>>,
}

impl<P: PropertyApi> PropertyCatalog<P> {
    pub fn new(api: P, cache_path: Option<PathBuf>) -> Self {
        Self {
            api,
            cache_path,
            properties: Mutex::new(None),
        }
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    fn slot(&self) -> MutexGuard<'_, Option<Vec<Property>>> {
        self.properties.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns the catalog, fetching only when neither memory nor the cache
    /// file has it, or when `force` is set.
    pub async fn load(&self, force: bool, token: Option<&str>) -> Result<Vec<Property>, ApiError> {
        if !force {
            let in_memory = self.slot().clone();
            if let Some(properties) = in_memory {
                return Ok(properties);
            }
            if let Some(properties) = self.read_cache() {
                *self.slot() = Some(properties.clone());
                return Ok(properties);
            }
        }

        let properties = self.api.fetch_properties(token).await?;
        log::debug!("Fetched {} propert(ies)", properties.len());
        self.write_cache(&properties);
        *self.slot() = Some(properties.clone());
        Ok(properties)
    }

    pub fn cached(&self) -> Vec<Property> {
        self.slot().clone().unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<Property> {
        self.slot()
            .as_ref()
            .and_then(|properties| properties.iter().find(|p| p.id == id).cloned())
    }

    pub fn filter(&self, filter: &PropertyFilter) -> Vec<Property> {
        self.slot()
            .as_ref()
            .map(|properties| filter.apply(properties).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn options(&self) -> FilterOptions {
        self.slot()
            .as_ref()
            .map(|properties| FilterOptions::from_properties(properties))
            .unwrap_or_default()
    }

    /// Drops the in-memory list and the cache file. Called when the session ends.
    pub fn clear(&self) {
        *self.slot() = None;
        if let Some(path) = &self.cache_path {
            match fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove property cache: {}", e),
            }
        }
    }

    fn read_cache(&self) -> Option<Vec<Property>> {
        let path = self.cache_path.as_ref()?;
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("Failed to read property cache: {}", e);
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(properties) => Some(properties),
            Err(e) => {
                log::warn!("Ignoring corrupt property cache: {}", e);
                None
            }
        }
    }

    fn write_cache(&self, properties: &[Property]) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let result = serde_json::to_vec(properties)
            .map_err(|e| e.to_string())
            .and_then(|bytes| {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|e| e.to_string())?;
                }
                fs::write(path, bytes).map_err(|e| e.to_string())
            });
        if let Err(e) = result {
            log::warn!("Failed to write property cache: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::property::RecommendationQuery;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeApi {
        fetches: AtomicUsize,
    }

    fn property(id: &str, location: &str, kind: &str, price: i64) -> Property {
        Property {
            id: id.to_string(),
            name: format!("Unit {}", id),
            property_type: Some(kind.to_string()),
            status: Some("Available".to_string()),
            price: Some(Decimal::from(price)),
            location: Some(location.to_string()),
            area: None,
            image: None,
            society_id: Some("s1".to_string()),
            score: None,
        }
    }

    #[async_trait]
    impl PropertyApi for FakeApi {
        async fn fetch_properties(&self, _token: Option<&str>) -> Result<Vec<Property>, ApiError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                property("p1", "Durban", "Flat", 900_000),
                property("p2", "Cape Town", "House", 2_500_000),
                property("p3", "Durban", "House", 1_800_000),
            ])
        }

        async fn recommend_properties(
            &self,
            _query: &RecommendationQuery,
            _token: Option<&str>,
        ) -> Result<Vec<Property>, ApiError> {
            Ok(Vec::new())
        }

        async fn record_property_click(
            &self,
            _property_id: &str,
            _token: Option<&str>,
        ) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cache_file_survives_new_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");

        let first = PropertyCatalog::new(FakeApi::default(), Some(path.clone()));
        let fetched = first.load(false, None).await.unwrap();
        first.load(false, None).await.unwrap();
        assert_eq!(first.api().fetches.load(Ordering::SeqCst), 1);

        let second = PropertyCatalog::new(FakeApi::default(), Some(path));
        let cached = second.load(false, None).await.unwrap();
        assert_eq!(second.api().fetches.load(Ordering::SeqCst), 0);
        assert_eq!(cached, fetched);

        second.load(true, None).await.unwrap();
        assert_eq!(second.api().fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        fs::write(&path, b"{not json").unwrap();

        let catalog = PropertyCatalog::new(FakeApi::default(), Some(path));
        assert_eq!(catalog.load(false, None).await.unwrap().len(), 3);
        assert_eq!(catalog.api().fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_filter_and_options() {
        let catalog = PropertyCatalog::new(FakeApi::default(), None);
        catalog.load(false, None).await.unwrap();

        let filter = PropertyFilter {
            location: Some("Durban".to_string()),
            max_price: Some(Decimal::from(1_000_000)),
            ..PropertyFilter::default()
        };
        let matches = catalog.filter(&filter);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, "p1");

        let options = catalog.options();
        assert_eq!(options.locations, vec!["Cape Town", "Durban"]);
        assert_eq!(options.types, vec!["Flat", "House"]);
        assert_eq!(catalog.get("p2").unwrap().name, "Unit p2");
    }

    #[tokio::test]
    async fn test_clear_removes_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("properties.json");
        let catalog = PropertyCatalog::new(FakeApi::default(), Some(path.clone()));
        catalog.load(false, None).await.unwrap();
        assert!(path.exists());

        catalog.clear();
        catalog.clear();
        assert!(!path.exists());
        assert!(catalog.cached().is_empty());
    }
}
