use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub channel: ChannelConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub ws_url: String,
    pub reconnect_delay_secs: u64,
    pub topic_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub poll_interval_secs: u64,
    pub recommend_debounce_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            api: ApiConfig {
                base_url: env::var("ONEGATE_API_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
                request_timeout_secs: env_number("ONEGATE_REQUEST_TIMEOUT_SECS", 30),
            },

            channel: ChannelConfig {
                ws_url: env::var("ONEGATE_WS_URL")
                    .unwrap_or_else(|_| "ws://localhost:8080/ws/websocket".to_string()),
                reconnect_delay_secs: env_number("ONEGATE_RECONNECT_DELAY_SECS", 5),
                topic_prefix: "/topic/notifications".to_string(),
            },

            app: AppConfig {
                data_dir: env::var("ONEGATE_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| AppConfig::default_data_dir()),
                poll_interval_secs: env_number("ONEGATE_POLL_INTERVAL_SECS", 60),
                recommend_debounce_ms: env_number("ONEGATE_RECOMMEND_DEBOUNCE_MS", 400),
            },
        }
    }
}

fn env_number(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ChannelConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Per-user destination, e.g. `/topic/notifications/42`.
    pub fn topic_for(&self, user_id: &str) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), user_id)
    }
}

impl AppConfig {
    fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(env::temp_dir)
            .join("onegate")
    }

    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join("token")
    }

    pub fn property_cache_path(&self) -> PathBuf {
        self.data_dir.join("properties.json")
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn recommend_debounce(&self) -> Duration {
        Duration::from_millis(self.recommend_debounce_ms)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:8080/ws/websocket".to_string(),
            reconnect_delay_secs: 5,
            topic_prefix: "/topic/notifications".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            poll_interval_secs: 60,
            recommend_debounce_ms: 400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_for_user() {
        let channel = ChannelConfig::default();
        assert_eq!(channel.topic_for("42"), "/topic/notifications/42");

        let trailing = ChannelConfig {
            topic_prefix: "/topic/notifications/".to_string(),
            ..ChannelConfig::default()
        };
        assert_eq!(trailing.topic_for("7"), "/topic/notifications/7");
    }

    #[test]
    fn test_default_reconnect_delay_is_five_seconds() {
        assert_eq!(ChannelConfig::default().reconnect_delay(), Duration::from_secs(5));
    }

    #[test]
    fn test_data_paths() {
        let app = AppConfig {
            data_dir: PathBuf::from("/tmp/onegate-test"),
            ..AppConfig::default()
        };
        assert_eq!(app.token_path(), PathBuf::from("/tmp/onegate-test/token"));
        assert_eq!(
            app.property_cache_path(),
            PathBuf::from("/tmp/onegate-test/properties.json")
        );
    }
}
