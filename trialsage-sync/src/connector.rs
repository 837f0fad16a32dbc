//! Channel Connector: keeps a live WebSocket to the QC event stream.
//!
//! Lifecycle:
//!
//! ```text
//! Connecting ──open──► Open ──drop/error──► WaitingRetry
//!     ▲                                          │
//!     └──────────── backoff timer ◄──────────────┘
//!
//! any state ──shutdown──► Stopped (terminal)
//! ```
//!
//! Reconnects are scheduled with bounded exponential backoff
//! (`base · growth^n`, capped) and the retry counter resets on every
//! successful open. Retries continue until explicit shutdown; this is an
//! interactive tool, so there is no giving-up ceiling. The server forgets a
//! client across drops, so each open re-announces the region subscription
//! before anything else.
//!
//! Malformed inbound frames are logged and dropped per message; they never
//! change connection state. Consumers see a clean event stream
//! ([`ChannelEvent`]) regardless of transport churn.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::protocol::{LiveEvent, Region};
use crate::subscribe::SubscriptionManager;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;
type WsSource = futures_util::stream::SplitStream<WsStream>;

/// Bounded exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub growth_factor: f64,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            growth_factor: 1.5,
            max_delay: Duration::from_millis(30_000),
        }
    }
}

impl BackoffPolicy {
    /// Delay scheduled before retry number `retry_count` (zero-based):
    /// `min(base · growth^retry_count, max)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let ms = self.base_delay.as_millis() as f64 * self.growth_factor.powi(retry_count as i32);
        let capped = ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Connecting,
    Open,
    /// Closed, reconnect scheduled.
    WaitingRetry,
    /// Closed for good by explicit shutdown.
    Stopped,
}

/// The reconnect state machine, independent of any real socket.
///
/// The async run loop drives it; tests exercise it directly.
#[derive(Debug)]
pub struct ConnectorFsm {
    state: ConnectorState,
    retry_count: u32,
    policy: BackoffPolicy,
}

impl ConnectorFsm {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            state: ConnectorState::Connecting,
            retry_count: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// A connection attempt is starting.
    pub fn connect_started(&mut self) {
        if self.state != ConnectorState::Stopped {
            self.state = ConnectorState::Connecting;
        }
    }

    /// Handshake succeeded: the retry counter resets to zero.
    pub fn opened(&mut self) {
        if self.state != ConnectorState::Stopped {
            self.state = ConnectorState::Open;
            self.retry_count = 0;
        }
    }

    /// The transport dropped (failed handshake or lost connection).
    ///
    /// Returns the delay to wait before the next attempt, or `None` after
    /// shutdown.
    pub fn dropped(&mut self) -> Option<Duration> {
        if self.state == ConnectorState::Stopped {
            return None;
        }
        let delay = self.policy.delay_for(self.retry_count);
        self.retry_count += 1;
        self.state = ConnectorState::WaitingRetry;
        Some(delay)
    }

    /// Explicit shutdown. Idempotent; no transition leaves `Stopped`.
    pub fn stop(&mut self) {
        self.state = ConnectorState::Stopped;
    }
}

/// Events surfaced to the session, already parsed and churn-free.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Connection opened and the region subscription was announced.
    Opened { region: Region },
    /// A parsed inbound event.
    Event(LiveEvent),
    /// Connection lost; `retry_in` is the scheduled backoff delay
    /// (`None` once the connector has stopped for good).
    Closed { retry_in: Option<Duration> },
}

/// Connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// WebSocket endpoint, e.g. `ws://host:port/ws/qc`.
    pub url: String,
    /// Region to subscribe on (re)connect.
    pub region: Region,
    pub backoff: BackoffPolicy,
}

impl ConnectorConfig {
    pub fn new(url: impl Into<String>, region: Region) -> Self {
        Self {
            url: url.into(),
            region,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Handle to the background connection task.
pub struct ChannelConnector {
    event_rx: Option<mpsc::Receiver<ChannelEvent>>,
    region_tx: watch::Sender<Region>,
    shutdown_tx: watch::Sender<bool>,
    state: Arc<RwLock<ConnectorState>>,
    task: JoinHandle<()>,
}

impl ChannelConnector {
    /// Spawn the connection task. It runs until [`shutdown`](Self::shutdown).
    pub fn spawn(config: ConnectorConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        let (region_tx, region_rx) = watch::channel(config.region);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state = Arc::new(RwLock::new(ConnectorState::Connecting));

        let task = tokio::spawn(run_loop(
            config,
            event_tx,
            region_rx,
            shutdown_rx,
            state.clone(),
        ));

        Self {
            event_rx: Some(event_rx),
            region_tx,
            shutdown_tx,
            state,
            task,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ChannelEvent>> {
        self.event_rx.take()
    }

    /// Switch the subscribed region. Re-announces on the live connection if
    /// one is open; otherwise the next open announces the new region.
    pub fn set_region(&self, region: Region) {
        let _ = self.region_tx.send(region);
    }

    /// Stop the connector: closes any open connection and cancels a pending
    /// reconnect timer. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Current lifecycle state (passive indicator for the UI).
    pub async fn state(&self) -> ConnectorState {
        *self.state.read().await
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ChannelConnector {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn run_loop(
    config: ConnectorConfig,
    event_tx: mpsc::Sender<ChannelEvent>,
    region_rx: watch::Receiver<Region>,
    mut shutdown_rx: watch::Receiver<bool>,
    state: Arc<RwLock<ConnectorState>>,
) {
    let mut fsm = ConnectorFsm::new(config.backoff);
    let mut subs = SubscriptionManager::new(region_rx);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        fsm.connect_started();
        *state.write().await = ConnectorState::Connecting;

        let attempt = tokio::select! {
            result = tokio_tungstenite::connect_async(config.url.as_str()) => Some(result),
            _ = shutdown_rx.changed() => None,
        };
        let Some(attempt) = attempt else { break };

        match attempt {
            Ok((ws, _)) => {
                fsm.opened();
                *state.write().await = ConnectorState::Open;
                let (mut sink, mut source) = ws.split();

                match subs.announce(&mut sink).await {
                    Ok(region) => {
                        if event_tx
                            .send(ChannelEvent::Opened { region })
                            .await
                            .is_err()
                        {
                            break; // Consumer gone; nothing left to serve.
                        }
                        let outcome = drive_connection(
                            &mut sink,
                            &mut source,
                            &event_tx,
                            &mut subs,
                            &mut shutdown_rx,
                        )
                        .await;
                        if outcome == ConnectionOutcome::Stopped {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("Subscription announce failed: {e}");
                    }
                }
            }
            Err(e) => {
                log::debug!("Connection attempt to {} failed: {e}", config.url);
            }
        }

        let Some(delay) = fsm.dropped() else { break };
        *state.write().await = ConnectorState::WaitingRetry;
        log::info!(
            "Live channel closed; retrying in {:?} (attempt {})",
            delay,
            fsm.retry_count()
        );
        if event_tx
            .send(ChannelEvent::Closed {
                retry_in: Some(delay),
            })
            .await
            .is_err()
        {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    fsm.stop();
    *state.write().await = ConnectorState::Stopped;
    let _ = event_tx.send(ChannelEvent::Closed { retry_in: None }).await;
    log::info!("Live channel connector stopped");
}

#[derive(Debug, PartialEq, Eq)]
enum ConnectionOutcome {
    /// Transport dropped; the outer loop schedules a retry.
    Dropped,
    /// Shutdown requested or consumer gone; no retry.
    Stopped,
}

async fn drive_connection(
    sink: &mut WsSink,
    source: &mut WsSource,
    event_tx: &mpsc::Sender<ChannelEvent>,
    subs: &mut SubscriptionManager,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> ConnectionOutcome {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => return ConnectionOutcome::Stopped,

            changed = subs.changed() => {
                if changed.is_err() {
                    return ConnectionOutcome::Stopped;
                }
                // Region switch while open: lighter than a reconnect.
                if let Err(e) = subs.announce(sink).await {
                    log::warn!("Re-announce failed, treating connection as lost: {e}");
                    return ConnectionOutcome::Dropped;
                }
            }

            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => match LiveEvent::parse(text.as_str()) {
                    Ok(event) => {
                        if event_tx.send(ChannelEvent::Event(event)).await.is_err() {
                            return ConnectionOutcome::Stopped;
                        }
                    }
                    Err(e) => {
                        log::warn!("Dropping malformed frame: {e}");
                    }
                },
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => return ConnectionOutcome::Dropped,
                Some(Err(e)) => {
                    log::debug!("Transport error: {e}");
                    return ConnectionOutcome::Dropped;
                }
                Some(Ok(_)) => {} // Binary/pong frames carry nothing for us.
            }
        }
    }
}
