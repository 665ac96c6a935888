//! API client layer: one reqwest-backed client, one file per resource.
//!
//! Every call issues exactly one HTTP request, unwraps the body and maps
//! failures onto [`ApiError`]. Nothing here retries.

pub mod appointments;
pub mod auth;
pub mod community;
pub mod notices;
pub mod notifications;
pub mod properties;
pub mod society;
pub mod users;

pub use appointments::AppointmentApi;
pub use notifications::NotificationApi;
pub use properties::PropertyApi;
pub use society::Access;

use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::watch;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::models::common::ApiErrorBody;
use crate::models::user::UserIdentity;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    session: watch::Receiver<Option<UserIdentity>>,
}

impl ApiClient {
    /// `session` is a read-only view of the session store; the bearer token
    /// is read from it on every request.
    pub fn new(
        config: &ApiConfig,
        session: watch::Receiver<Option<UserIdentity>>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ApiError::transport(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::transport(format!("Invalid API URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::transport(format!("Invalid API URL {}", config.base_url)));
        }

        Ok(Self {
            client,
            base_url,
            session,
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one, so an
    /// id can never escape its path segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn session_token(&self) -> Option<String> {
        self.session.borrow().as_ref().map(|user| user.token.clone())
    }

    /// Starts a request carrying the session token, or `token` when given.
    fn request(&self, method: Method, segments: &[&str], token: Option<&str>) -> RequestBuilder {
        let url = self.url(segments);
        log::debug!("{} {}", method, url.path());

        let builder = self.client.request(method, url);
        match token.map(str::to_string).or_else(|| self.session_token()) {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn execute(
        &self,
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("{}: {}", fallback, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(ApiErrorBody::into_message)
            .unwrap_or_else(|| fallback.to_string());

        log::debug!("Request failed with {}: {}", status, message);
        Err(ApiError::from_status(status.as_u16(), message))
    }

    /// Sends and decodes the JSON body. An empty body decodes as `null`.
    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        fallback: &str,
    ) -> Result<T, ApiError> {
        let response = self.execute(builder, fallback).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::transport(format!("{}: {}", fallback, e)))?;

        let slice: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        serde_json::from_slice(slice)
            .map_err(|e| ApiError::transport(format!("{}: unexpected response ({})", fallback, e)))
    }

    /// Sends and discards whatever body comes back.
    async fn send_unit(&self, builder: RequestBuilder, fallback: &str) -> Result<(), ApiError> {
        self.execute(builder, fallback).await.map(|_| ())
    }
}

/// Decodes a list response item by item. A body that is not an array is an
/// empty list, and malformed items are skipped.
pub(crate) fn decode_list<R: DeserializeOwned>(value: Value, what: &str) -> Vec<R> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("Skipping malformed {} record: {}", what, e);
                    None
                }
            })
            .collect(),
        Value::Null => Vec::new(),
        other => {
            log::warn!("Expected a list of {}, got {}", what, type_name(&other));
            Vec::new()
        }
    }
}

/// Runs each record through its normalizer, dropping those without an id.
pub(crate) fn normalize<R, T>(records: Vec<R>, what: &str, f: impl Fn(R) -> Option<T>) -> Vec<T> {
    let total = records.len();
    let normalized: Vec<T> = records.into_iter().filter_map(f).collect();
    if normalized.len() < total {
        log::warn!("Dropped {} {} record(s) without an id", total - normalized.len(), what);
    }
    normalized
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::notification::NotificationRecord;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;

    /// Client against a loopback server that answers every request with
    /// `status` and `body`. Each request line ("PUT /path") is reported on
    /// the returned channel.
    pub(crate) async fn serve(
        status: u16,
        body: &'static str,
    ) -> (ApiClient, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Some(line) = answer(stream, status, body).await {
                        let _ = tx.send(line);
                    }
                });
            }
        });

        (client(&format!("http://{}", addr)), rx)
    }

    async fn answer(mut stream: TcpStream, status: u16, body: &str) -> Option<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                return None;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
        };

        let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        while buf.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await.ok()?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.ok()?;
        let _ = stream.shutdown().await;

        let request_line = head.lines().next()?;
        let mut parts = request_line.split_whitespace();
        Some(format!("{} {}", parts.next()?, parts.next()?))
    }

    pub(crate) fn client(base_url: &str) -> ApiClient {
        let (_tx, rx) = watch::channel(None);
        let config = ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        };
        ApiClient::new(&config, rx).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let api = client("http://localhost:8080/api/");
        assert_eq!(
            api.url(&["appointments"]).as_str(),
            "http://localhost:8080/api/appointments"
        );
        assert_eq!(
            api.url(&["no-show", "score", "1"]).as_str(),
            "http://localhost:8080/api/no-show/score/1"
        );

        let api = client("http://localhost:8080/api");
        assert_eq!(api.url(&["notices"]).as_str(), "http://localhost:8080/api/notices");
    }

    #[test]
    fn test_ids_stay_inside_their_segment() {
        let api = client("http://localhost:8080/api");
        let url = api.url(&["appointments", "a/b?c#d", "respond"]);
        assert_eq!(url.path(), "/api/appointments/a%2Fb%3Fc%23d/respond");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        let (_tx, rx) = watch::channel(None);
        let config = ApiConfig {
            base_url: "not a url".to_string(),
            ..ApiConfig::default()
        };
        assert!(ApiClient::new(&config, rx).is_err());
    }

    #[test]
    fn test_session_token_tracks_store() {
        use crate::models::user::{Role, UserIdentity};

        let (tx, rx) = watch::channel(None);
        let api = ApiClient::new(&ApiConfig::default(), rx).unwrap();
        assert_eq!(api.session_token(), None);

        tx.send_replace(Some(UserIdentity {
            id: Some("1".to_string()),
            email: "a@example.com".to_string(),
            role: Role::Owner,
            token: "t.o.k".to_string(),
        }));
        assert_eq!(api.session_token().as_deref(), Some("t.o.k"));
    }

    #[test]
    fn test_decode_list_is_lenient() {
        let records: Vec<NotificationRecord> = decode_list(
            json!([{"id": "n1", "readStatus": "UNREAD"}, {"id": "n2", "readStatus": 5}]),
            "notification",
        );
        assert_eq!(records.len(), 1);

        let records: Vec<NotificationRecord> = decode_list(json!({"error": "x"}), "notification");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_has_no_status() {
        let api = client("http://127.0.0.1:1");
        let err = api
            .send_unit(api.request(Method::GET, &["appointments"], None), "Failed to fetch requests")
            .await
            .unwrap_err();
        assert_eq!(err.status(), None);
        assert!(err.message().starts_with("Failed to fetch requests"));
    }

    #[tokio::test]
    async fn test_ids_are_encoded_on_the_wire() {
        let (api, mut requests) = serve(200, "").await;
        api.delete_appointment("a/b?c").await.unwrap();
        assert_eq!(requests.recv().await.unwrap(), "DELETE /appointments/a%2Fb%3Fc");
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let (api, _requests) = serve(409, r#"{"message":"Slot already booked"}"#).await;
        let err = api.fetch_appointments().await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.message(), "Slot already booked");
    }
}
