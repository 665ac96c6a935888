//! Push-invalidate channel: one STOMP subscription per signed-in user whose
//! only job is to tell the caller that its cached view may be stale.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::stomp::Frame;
use crate::config::ChannelConfig;
use crate::error::ChannelError;

/// Invoked once per inbound MESSAGE frame. The payload is ignored.
pub type EventCallback = Arc<dyn Fn() + Send + Sync>;

/// Upper bound on the DISCONNECT and close handshake during teardown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct ActiveChannel {
    user_id: String,
    cancel: CancellationToken,
    connected: Arc<AtomicBool>,
}

pub struct NotificationChannel {
    config: ChannelConfig,
    active: Mutex<Option<ActiveChannel>>,
}

impl NotificationChannel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            active: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveChannel>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Opens the subscription for `user_id` in a background task, tearing
    /// down any channel that is already open. Transport failures are retried
    /// after the configured fixed delay until [`disconnect`](Self::disconnect).
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(
        &self,
        user_id: &str,
        token: Option<String>,
        on_event: EventCallback,
    ) -> Result<(), ChannelError> {
        let url = self.config.ws_url.trim();
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ChannelError::InvalidUrl(url.to_string()));
        }
        if user_id.trim().is_empty() {
            return Err(ChannelError::Protocol(
                "cannot subscribe without a user id".to_string(),
            ));
        }

        self.disconnect();

        let cancel = CancellationToken::new();
        let connected = Arc::new(AtomicBool::new(false));
        let worker = Worker {
            url: url.to_string(),
            topic: self.config.topic_for(user_id),
            token,
            on_event,
            connected: connected.clone(),
            reconnect_delay: self.config.reconnect_delay(),
        };
        tokio::spawn(worker.run(cancel.clone()));

        log::info!("Notification channel opening for user {}", user_id);
        *self.slot() = Some(ActiveChannel {
            user_id: user_id.to_string(),
            cancel,
            connected,
        });
        Ok(())
    }

    /// Closes the open channel, if any. Safe to call repeatedly.
    ///
    /// The worker sends DISCONNECT and a close frame before it exits; no
    /// further callbacks fire once this returns.
    pub fn disconnect(&self) {
        let previous = self.slot().take();
        if let Some(channel) = previous {
            channel.connected.store(false, Ordering::SeqCst);
            channel.cancel.cancel();
            log::info!("Notification channel closed for user {}", channel.user_id);
        }
    }

    /// True while a subscription is acknowledged by the broker.
    pub fn is_connected(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|channel| channel.connected.load(Ordering::SeqCst))
    }

    pub fn current_user(&self) -> Option<String> {
        self.slot().as_ref().map(|channel| channel.user_id.clone())
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

struct Worker {
    url: String,
    topic: String,
    token: Option<String>,
    on_event: EventCallback,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        loop {
            let outcome = self.session(&cancel).await;
            self.connected.store(false, Ordering::SeqCst);
            if cancel.is_cancelled() {
                break;
            }

            match outcome {
                Ok(()) => log::info!("Notification channel dropped by broker"),
                Err(e) => log::warn!("Notification channel failed: {}", e),
            }
            log::info!(
                "Reconnecting notification channel in {}s",
                self.reconnect_delay.as_secs()
            );

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    /// One websocket connection from handshake to close. Cancellation ends
    /// the session cleanly with DISCONNECT followed by a close frame.
    async fn session(&self, cancel: &CancellationToken) -> Result<(), ChannelError> {
        let connecting = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            connecting = connect_async(self.url.as_str()) => connecting,
        };
        let (socket, _) = connecting.map_err(|e| ChannelError::Transport(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let connect = Frame::connect(host_of(&self.url), self.token.as_deref());
        sink.send(Message::Text(connect.encode()))
            .await
            .map_err(|e| ChannelError::Transport(e.to_string()))?;

        let subscription_id = format!("sub-{}", Uuid::new_v4());

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    let goodbye = async {
                        sink.send(Message::Text(Frame::disconnect().encode())).await?;
                        sink.close().await
                    };
                    match tokio::time::timeout(CLOSE_TIMEOUT, goodbye).await {
                        Ok(Ok(())) => log::debug!("Sent DISCONNECT on {}", self.topic),
                        Ok(Err(e)) => log::debug!("DISCONNECT not delivered: {}", e),
                        Err(_) => log::debug!("DISCONNECT timed out"),
                    }
                    return Ok(());
                }
                message = stream.next() => message,
            };
            let Some(message) = message else {
                break;
            };
            let text = match message.map_err(|e| ChannelError::Transport(e.to_string()))? {
                Message::Text(text) => text,
                Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Message::Close(_) => return Ok(()),
                _ => continue,
            };

            for frame in Frame::decode_all(&text)? {
                match frame.command.as_str() {
                    "CONNECTED" => {
                        let subscribe = Frame::subscribe(&subscription_id, &self.topic);
                        sink.send(Message::Text(subscribe.encode()))
                            .await
                            .map_err(|e| ChannelError::Transport(e.to_string()))?;
                        self.connected.store(true, Ordering::SeqCst);
                        log::info!("Subscribed to {}", self.topic);
                    }
                    "MESSAGE" if !cancel.is_cancelled() => {
                        log::debug!("Invalidation received on {}", self.topic);
                        (self.on_event)();
                    }
                    "ERROR" => {
                        let reason = frame
                            .get("message")
                            .map(str::to_string)
                            .unwrap_or_else(|| frame.body.clone());
                        return Err(ChannelError::Protocol(reason));
                    }
                    other => log::debug!("Ignoring {} frame", other),
                }
            }
        }
        Ok(())
    }
}

/// Host part of a websocket URL, for the CONNECT `host` header.
fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let authority = rest.split('/').next().unwrap_or(rest);
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio_tungstenite::accept_async;

    fn config(ws_url: &str) -> ChannelConfig {
        ChannelConfig {
            ws_url: ws_url.to_string(),
            reconnect_delay_secs: 0,
            ..ChannelConfig::default()
        }
    }

    fn counting_callback() -> (EventCallback, mpsc::UnboundedReceiver<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: EventCallback = Arc::new(move || {
            let _ = tx.send(());
        });
        (callback, rx)
    }

    #[derive(Debug, Default)]
    struct Served {
        destination: Option<String>,
        disconnected: bool,
    }

    /// Accepts one websocket, answers CONNECT, waits for SUBSCRIBE and pushes a
    /// single MESSAGE. Reports what the client sent once it hangs up.
    async fn serve_one(listener: &TcpListener) -> Option<Served> {
        let (tcp, _) = listener.accept().await.ok()?;
        let mut ws = accept_async(tcp).await.ok()?;
        let mut served = Served::default();

        while let Some(Ok(message)) = ws.next().await {
            let Message::Text(text) = message else { continue };
            for frame in Frame::decode_all(&text).ok()? {
                match frame.command.as_str() {
                    "CONNECT" => {
                        let reply = Frame::new("CONNECTED").header("version", "1.2");
                        ws.send(Message::Text(reply.encode())).await.ok()?;
                    }
                    "SUBSCRIBE" => {
                        served.destination = frame.get("destination").map(str::to_string);
                        let push = Frame::new("MESSAGE")
                            .header("destination", served.destination.as_deref().unwrap_or(""))
                            .header("subscription", frame.get("id").unwrap_or(""))
                            .header("message-id", "1")
                            .body("{\"type\":\"APPOINTMENT\"}");
                        ws.send(Message::Text(push.encode())).await.ok()?;
                    }
                    "DISCONNECT" => served.disconnected = true,
                    _ => {}
                }
            }
        }
        Some(served)
    }

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("ws://localhost:8080/ws/websocket"), "localhost");
        assert_eq!(host_of("wss://gate.example.com/ws"), "gate.example.com");
        assert_eq!(host_of("ws://10.0.0.2"), "10.0.0.2");
    }

    #[test]
    fn test_disconnect_without_connect_is_noop() {
        let channel = NotificationChannel::new(ChannelConfig::default());
        channel.disconnect();
        channel.disconnect();
        assert!(!channel.is_connected());
        assert_eq!(channel.current_user(), None);
    }

    #[tokio::test]
    async fn test_rejects_non_websocket_url() {
        let channel = NotificationChannel::new(config("http://localhost:8080/ws"));
        let (callback, _rx) = counting_callback();

        let result = channel.connect("42", None, callback);
        assert!(matches!(result, Err(ChannelError::InvalidUrl(_))));
        assert_eq!(channel.current_user(), None);
    }

    #[tokio::test]
    async fn test_connect_replaces_previous_channel() {
        let channel = NotificationChannel::new(config("ws://127.0.0.1:1/ws/websocket"));
        let (callback, _rx) = counting_callback();

        channel.connect("1", None, callback.clone()).unwrap();
        channel.connect("2", None, callback).unwrap();
        assert_eq!(channel.current_user().as_deref(), Some("2"));
        assert!(!channel.is_connected());

        channel.disconnect();
        channel.disconnect();
        assert_eq!(channel.current_user(), None);
    }

    #[tokio::test]
    async fn test_message_triggers_callback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { serve_one(&listener).await });

        let channel = NotificationChannel::new(config(&format!("ws://{}/ws/websocket", addr)));
        let (callback, mut rx) = counting_callback();
        channel.connect("42", Some("t.o.k".to_string()), callback).unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(fired.unwrap(), Some(()));
        assert!(channel.is_connected());

        channel.disconnect();
        assert!(!channel.is_connected());

        let served = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(served.destination.as_deref(), Some("/topic/notifications/42"));
        assert!(served.disconnected);
    }

    #[tokio::test]
    async fn test_replacing_channel_says_goodbye() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move { serve_one(&listener).await });

        let channel = NotificationChannel::new(config(&format!("ws://{}/ws/websocket", addr)));
        let (callback, mut rx) = counting_callback();
        channel.connect("42", None, callback.clone()).unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(fired.unwrap(), Some(()));

        channel.connect("43", None, callback).unwrap();

        let served = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(served.disconnected);
        assert_eq!(channel.current_user().as_deref(), Some("43"));
        channel.disconnect();
    }

    #[tokio::test]
    async fn test_reconnects_after_drop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            // First connection is accepted and dropped straight away.
            if let Ok((tcp, _)) = listener.accept().await {
                drop(tcp);
            }
            serve_one(&listener).await
        });

        let channel = NotificationChannel::new(config(&format!("ws://{}/ws/websocket", addr)));
        let (callback, mut rx) = counting_callback();
        channel.connect("7", None, callback).unwrap();

        let fired = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(fired.unwrap(), Some(()));

        channel.disconnect();
        let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
    }
}
