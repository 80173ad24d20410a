//! Duplex heartbeat channel
//!
//! Owns at most one WebSocket session. While open, the session sends a
//! heartbeat frame on a fixed interval and records every sent frame,
//! received frame and lifecycle notice in a bounded log.
//!
//! The session runs as one spawned task that owns the transport and the
//! timer. `stop()` signals the task and waits for it; an unsolicited close
//! ends the task on its own and leaves the channel in an error status.

pub mod log;

pub use log::{Direction, HeartbeatLog, LogEntry};

use crate::{
    error::{AppError, ErrorContext, Result},
    logging::ChannelLogger,
    models::Config,
    types::{ChannelState, ChannelStatus},
};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

/// System log texts
pub const MSG_CONNECTED: &str = "Connected";
pub const MSG_DISCONNECTED: &str = "Disconnected";
pub const MSG_UNEXPECTED_CLOSE: &str = "Connection closed unexpectedly";

/// Heartbeat channel settings
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:8080/ws`
    pub url: Url,
    /// Time between heartbeat frames
    pub interval: Duration,
    /// Maximum number of retained log entries
    pub log_capacity: usize,
}

impl HeartbeatConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            interval: crate::defaults::HEARTBEAT_INTERVAL,
            log_capacity: crate::defaults::HEARTBEAT_LOG_CAPACITY,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.heartbeat_endpoint()?))
    }
}

/// Frame sent on every tick
#[derive(Debug, Serialize)]
struct HeartbeatFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    /// Milliseconds since the Unix epoch
    timestamp: i64,
}

fn heartbeat_payload() -> String {
    let frame = HeartbeatFrame {
        kind: "heartbeat",
        timestamp: Utc::now().timestamp_millis(),
    };
    serde_json::to_string(&frame)
        .unwrap_or_else(|_| format!(r#"{{"type":"heartbeat","timestamp":{}}}"#, frame.timestamp))
}

struct Session {
    id: u64,
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

struct Inner {
    status: ChannelStatus,
    session: Option<Session>,
    log: HeartbeatLog,
    next_session_id: u64,
}

struct Shared {
    config: HeartbeatConfig,
    inner: Mutex<Inner>,
    state: watch::Sender<ChannelState>,
    entries: broadcast::Sender<LogEntry>,
    logger: ChannelLogger,
}

/// How a session task ended
enum Ending {
    Stopped,
    ConnectFailed(AppError),
    Closed(String),
}

/// Handle to the heartbeat channel; clones share the same session and log
#[derive(Clone)]
pub struct HeartbeatChannel {
    shared: Arc<Shared>,
}

impl HeartbeatChannel {
    pub fn new(config: HeartbeatConfig) -> Self {
        Self::with_logger(config, ChannelLogger::quiet())
    }

    pub fn with_logger(config: HeartbeatConfig, logger: ChannelLogger) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        let (entries, _) = broadcast::channel(256);
        let log = HeartbeatLog::with_capacity(config.log_capacity);

        Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(Inner {
                    status: ChannelStatus::Idle,
                    session: None,
                    log,
                    next_session_id: 1,
                }),
                state,
                entries,
                logger,
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.shared.config.url
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn status(&self) -> ChannelStatus {
        self.lock().status.clone()
    }

    /// Whether a session task currently owns the connection
    pub fn has_session(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Copy of the log, most recent first
    pub fn log_snapshot(&self) -> Vec<LogEntry> {
        self.lock().log.newest_first().cloned().collect()
    }

    /// Receive every new log entry as it is recorded
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.shared.entries.subscribe()
    }

    /// Watch lifecycle state changes
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Wait until the channel reaches `target`
    pub async fn wait_for_state(&self, target: ChannelState) -> Result<()> {
        let mut rx = self.watch_state();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| AppError::internal("Heartbeat state watch closed"))
    }

    /// Open the connection and begin sending heartbeats.
    ///
    /// Returns `Ok(false)` without opening anything if a session is already
    /// live. Connecting happens in the background; watch the state to learn
    /// whether it succeeded.
    pub async fn start(&self) -> Result<bool> {
        // Leaving `Closed` reserves the channel for this call
        let session_id = {
            let mut inner = self.lock();
            if inner.session.is_some() || self.state() != ChannelState::Closed {
                return Ok(false);
            }
            let session_id = inner.next_session_id;
            inner.next_session_id += 1;
            self.shared.state.send_replace(ChannelState::Connecting);
            session_id
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let (registered_tx, registered_rx) = oneshot::channel();
        let task = tokio::spawn(self.clone().run_session(session_id, registered_rx, stop_rx));
        self.lock().session = Some(Session { id: session_id, stop_tx, task });
        // The task only proceeds once its session is visible to stop() and finish()
        let _ = registered_tx.send(());

        self.shared.logger
            .log_state_change(self.url().as_str(), ChannelState::Closed, ChannelState::Connecting)
            .await;
        Ok(true)
    }

    /// Cancel the timer and close the connection.
    ///
    /// Returns `Ok(false)` when there is no live session.
    pub async fn stop(&self) -> Result<bool> {
        let session = self.lock().session.take();
        let Some(session) = session else {
            return Ok(false);
        };

        // The task may already be gone if the peer closed at the same moment
        let _ = session.stop_tx.send(());
        session.task.await.context("Heartbeat session task failed")?;
        Ok(true)
    }

    /// Start when closed, stop otherwise. Returns the resulting state.
    pub async fn toggle(&self) -> Result<ChannelState> {
        if self.has_session() {
            self.stop().await?;
        } else {
            self.start().await?;
        }
        Ok(self.state())
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, entry: LogEntry) {
        self.lock().log.push(entry.clone());
        let _ = self.shared.entries.send(entry);
    }

    async fn run_session(
        self,
        session_id: u64,
        registered: oneshot::Receiver<()>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        if registered.await.is_err() {
            return;
        }
        let url = self.shared.config.url.to_string();

        let connected = tokio::select! {
            result = connect_async(url.as_str()) => result,
            _ = &mut stop_rx => {
                self.finish(session_id, Ending::Stopped).await;
                return;
            }
        };

        let stream = match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let error = AppError::from(e);
                self.shared.logger.log_connect_failure(&url, &error).await;
                self.finish(session_id, Ending::ConnectFailed(error)).await;
                return;
            }
        };

        self.mark_open().await;

        let (mut sink, mut incoming) = stream.split();
        let interval = self.shared.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_error: Option<String> = None;

        let ending = loop {
            tokio::select! {
                _ = &mut stop_rx => {
                    let _ = sink.close().await;
                    break Ending::Stopped;
                }
                _ = ticker.tick() => {
                    let payload = heartbeat_payload();
                    match sink.send(Message::text(payload.clone())).await {
                        Ok(()) => {
                            self.shared.logger.log_frame(Direction::Sent, &payload).await;
                            self.record(LogEntry::sent(payload));
                        }
                        Err(e) => {
                            let error = AppError::from(e);
                            self.transport_error(&url, &error).await;
                            last_error = Some(error.detail().to_string());
                        }
                    }
                }
                frame = incoming.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.shared.logger.log_frame(Direction::Received, text.as_str()).await;
                        self.record(LogEntry::received(text.as_str()));
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        let text = String::from_utf8_lossy(&bytes).into_owned();
                        self.shared.logger.log_frame(Direction::Received, &text).await;
                        self.record(LogEntry::received(text));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = match frame {
                            Some(frame) if !frame.reason.is_empty() => {
                                format!("closed by peer ({}: {})", u16::from(frame.code), frame.reason)
                            }
                            Some(frame) => format!("closed by peer ({})", u16::from(frame.code)),
                            None => "closed by peer".to_string(),
                        };
                        break Ending::Closed(reason);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        // The stream ends after an error; that end drives the close
                        let error = AppError::from(e);
                        self.transport_error(&url, &error).await;
                        last_error = Some(error.detail().to_string());
                    }
                    None => {
                        break Ending::Closed(last_error.take().unwrap_or_else(|| "stream ended".to_string()));
                    }
                }
            }
        };

        self.finish(session_id, ending).await;
    }

    async fn mark_open(&self) {
        {
            let mut inner = self.lock();
            inner.status = ChannelStatus::Connected;
            inner.log.push(LogEntry::system(MSG_CONNECTED));
            self.shared.state.send_replace(ChannelState::Open);
        }
        let _ = self.shared.entries.send(LogEntry::system(MSG_CONNECTED));
        self.shared.logger
            .log_state_change(self.url().as_str(), ChannelState::Connecting, ChannelState::Open)
            .await;
    }

    async fn transport_error(&self, url: &str, error: &AppError) {
        self.shared.logger.log_transport_error(url, error).await;
        self.record(LogEntry::system(format!("Error: {}", error.detail())));
    }

    async fn finish(&self, session_id: u64, ending: Ending) {
        let (entry, previous, unexpected) = {
            let mut inner = self.lock();

            // stop() takes the session before signalling; if it is gone the
            // caller asked for this close regardless of how the task ended
            let owned = inner.session.as_ref().map(|s| s.id) == Some(session_id);
            if owned {
                inner.session = None;
            }
            let ending = if owned { ending } else { Ending::Stopped };

            let (entry, status, unexpected) = match ending {
                Ending::Stopped => (LogEntry::system(MSG_DISCONNECTED), ChannelStatus::Idle, None),
                Ending::ConnectFailed(error) => {
                    let message = format!("Connection failed: {}", error.detail());
                    (LogEntry::system(message.clone()), ChannelStatus::Error(message), None)
                }
                Ending::Closed(reason) => (
                    LogEntry::system(MSG_UNEXPECTED_CLOSE),
                    ChannelStatus::Error(format!("{}: {}", MSG_UNEXPECTED_CLOSE, reason)),
                    Some(reason),
                ),
            };

            inner.status = status;
            inner.log.push(entry.clone());
            let previous = self.shared.state.send_replace(ChannelState::Closed);
            (entry, previous, unexpected)
        };

        let _ = self.shared.entries.send(entry);
        let url = self.url().to_string();
        if let Some(reason) = unexpected {
            self.shared.logger.log_unexpected_close(&url, &reason).await;
        }
        self.shared.logger.log_state_change(&url, previous, ChannelState::Closed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::{accept_async, WebSocketStream};

    const WAIT: Duration = Duration::from_secs(5);

    /// Local WebSocket server running `handler` for every accepted connection
    async fn spawn_server<F, Fut>(handler: F) -> (Url, Arc<AtomicUsize>)
    where
        F: Fn(WebSocketStream<TcpStream>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = connections.clone();
        let handler = Arc::new(handler);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                tokio::spawn(async move {
                    if let Ok(ws) = accept_async(stream).await {
                        handler(ws).await;
                    }
                });
            }
        });

        (Url::parse(&format!("ws://{}/ws", addr)).unwrap(), connections)
    }

    async fn echo(mut ws: WebSocketStream<TcpStream>) {
        while let Some(Ok(message)) = ws.next().await {
            if message.is_text() && ws.send(message).await.is_err() {
                break;
            }
        }
    }

    fn channel(url: Url) -> HeartbeatChannel {
        HeartbeatChannel::new(HeartbeatConfig::new(url).with_interval(Duration::from_millis(40)))
    }

    async fn wait_for_entries(channel: &HeartbeatChannel, direction: Direction, count: usize) {
        let mut rx = channel.subscribe();
        let seen = channel.log_snapshot().iter().filter(|e| e.direction == direction).count();
        let mut remaining = count.saturating_sub(seen);
        timeout(WAIT, async {
            while remaining > 0 {
                if let Ok(entry) = rx.recv().await {
                    if entry.direction == direction {
                        remaining -= 1;
                    }
                }
            }
        })
        .await
        .expect("timed out waiting for log entries");
    }

    async fn wait_for_session_end(channel: &HeartbeatChannel) {
        timeout(WAIT, async {
            while channel.has_session() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("session never ended");
    }

    #[tokio::test]
    async fn test_start_send_receive_stop() {
        let (url, _) = spawn_server(echo).await;
        let channel = channel(url);
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.status(), ChannelStatus::Idle);

        assert!(channel.start().await.unwrap());
        timeout(WAIT, channel.wait_for_state(ChannelState::Open)).await.unwrap().unwrap();
        assert_eq!(channel.status(), ChannelStatus::Connected);

        wait_for_entries(&channel, Direction::Received, 2).await;

        assert!(channel.stop().await.unwrap());
        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.status(), ChannelStatus::Idle);
        assert!(!channel.has_session());

        let log = channel.log_snapshot();
        assert_eq!(log[0].direction, Direction::System);
        assert_eq!(log[0].raw_text, MSG_DISCONNECTED);
        assert_eq!(log.last().unwrap().raw_text, MSG_CONNECTED);
        assert!(log.iter().any(|e| e.direction == Direction::Sent));
    }

    #[tokio::test]
    async fn test_sent_frames_are_heartbeats() {
        let (url, _) = spawn_server(echo).await;
        let channel = channel(url);
        channel.start().await.unwrap();
        wait_for_entries(&channel, Direction::Sent, 1).await;
        channel.stop().await.unwrap();

        let sent = channel.log_snapshot().into_iter().find(|e| e.direction == Direction::Sent).unwrap();
        let frame: serde_json::Value = serde_json::from_str(&sent.raw_text).unwrap();
        assert_eq!(frame["type"], "heartbeat");
        assert!(frame["timestamp"].as_i64().unwrap() > 1_600_000_000_000);
    }

    #[tokio::test]
    async fn test_second_start_does_not_reconnect() {
        let (url, connections) = spawn_server(echo).await;
        let channel = channel(url);

        assert!(channel.start().await.unwrap());
        assert!(!channel.start().await.unwrap());
        timeout(WAIT, channel.wait_for_state(ChannelState::Open)).await.unwrap().unwrap();
        assert!(!channel.start().await.unwrap());

        channel.stop().await.unwrap();
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unexpected_close_sets_error_status() {
        let (url, _) = spawn_server(|mut ws: WebSocketStream<TcpStream>| async move {
            if let Some(Ok(_)) = ws.next().await {
                let _ = ws.close(None).await;
            }
        }).await;
        let channel = channel(url);

        channel.start().await.unwrap();
        wait_for_session_end(&channel).await;

        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.status().is_error());
        assert!(!channel.has_session());
        assert_eq!(channel.log_snapshot()[0].raw_text, MSG_UNEXPECTED_CLOSE);

        // Stopping a dead session is a no-op, and a fresh start is allowed
        assert!(!channel.stop().await.unwrap());
        assert!(channel.start().await.unwrap());
        channel.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_error_is_logged_before_close() {
        let (url, _) = spawn_server(|mut ws: WebSocketStream<TcpStream>| async move {
            // FIN + all reserved bits + text opcode: a protocol violation
            let _ = ws.get_mut().write_all(&[0xF1, 0x00]).await;
            while let Some(Ok(_)) = ws.next().await {}
        }).await;
        let channel = channel(url);

        channel.start().await.unwrap();
        wait_for_session_end(&channel).await;

        let log = channel.log_snapshot();
        assert_eq!(log[0].raw_text, MSG_UNEXPECTED_CLOSE);
        let error_at = log
            .iter()
            .position(|e| e.direction == Direction::System && e.raw_text.starts_with("Error: "))
            .expect("transport error was not logged");
        let connected_at = log.iter().position(|e| e.raw_text == MSG_CONNECTED).unwrap();
        // Newest first: connected, then the error, then the close that it led to
        assert!(error_at > 0 && error_at < connected_at, "{:?}", log);

        assert_eq!(channel.state(), ChannelState::Closed);
        match channel.status() {
            ChannelStatus::Error(message) => assert!(message.starts_with(MSG_UNEXPECTED_CLOSE), "{}", message),
            other => panic!("expected error status, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_connect_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = channel(Url::parse(&format!("ws://{}/ws", addr)).unwrap());
        channel.start().await.unwrap();
        wait_for_session_end(&channel).await;

        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.status().is_error());
        assert!(channel.log_snapshot()[0].raw_text.starts_with("Connection failed"));
    }

    #[tokio::test]
    async fn test_toggle() {
        let (url, _) = spawn_server(echo).await;
        let channel = channel(url);

        assert_eq!(channel.toggle().await.unwrap(), ChannelState::Connecting);
        timeout(WAIT, channel.wait_for_state(ChannelState::Open)).await.unwrap().unwrap();
        assert_eq!(channel.toggle().await.unwrap(), ChannelState::Closed);
        assert_eq!(channel.status(), ChannelStatus::Idle);
    }

    #[test]
    fn test_heartbeat_payload_shape() {
        let payload = heartbeat_payload();
        assert!(payload.starts_with(r#"{"type":"heartbeat","timestamp":"#));
    }

    #[test]
    fn test_config_from_app_config() {
        let config = Config { base_url: "https://example.com".into(), ..Config::default() };
        let heartbeat = HeartbeatConfig::from_config(&config).unwrap();
        assert_eq!(heartbeat.url.as_str(), "wss://example.com/ws");
        assert_eq!(heartbeat.interval, Duration::from_millis(1000));
        assert_eq!(heartbeat.log_capacity, 1000);
    }
}
