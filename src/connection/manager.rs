use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event::{EventDecoder, SensorEvent};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::ShuttingDown => "shutting_down",
            ConnectionState::Closed => "closed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Wait between a failed dial or dropped connection and the next dial.
    pub reconnect_delay: Duration,

    /// Bound of the event stream handed to the consumer.
    pub channel_capacity: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            channel_capacity: 256,
        }
    }
}

/// Dials the push channel.
#[async_trait]
pub trait EventSource: Send + Sync + 'static {
    async fn connect(&self) -> anyhow::Result<Box<dyn FrameStream>>;
}

/// One established push connection.
#[async_trait]
pub trait FrameStream: Send {
    /// Next payload, or `None` once the peer has closed the connection.
    async fn next_frame(&mut self) -> Option<anyhow::Result<Vec<u8>>>;

    async fn close(&mut self);
}

pub type EventStream = ReceiverStream<SensorEvent>;

/// Keeps a push connection to the gateway alive and delivers its decoded
/// events over a bounded stream.
pub struct ConnectionManager {
    token: CancellationToken,
    state: Arc<watch::Sender<ConnectionState>>,
    task: JoinHandle<()>,
}

enum ReadOutcome {
    Disconnected(Option<anyhow::Error>),
    Cancelled,
    ReceiverDropped,
}

impl ConnectionManager {
    /// Spawns the connection task. Must be called from within a Tokio runtime.
    pub fn start(
        source: Arc<dyn EventSource>,
        decoder: EventDecoder,
        config: ConnectionConfig,
    ) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let token = CancellationToken::new();
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let state = Arc::new(state);

        let task = tokio::spawn(run(
            source,
            decoder,
            config,
            tx,
            Arc::clone(&state),
            token.clone(),
        ));

        let manager = Self { token, state, task };

        (manager, ReceiverStream::new(rx))
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Cancels the connection and waits up to `timeout` for it to close.
    ///
    /// Returns `false` if the connection had not closed when the timeout
    /// elapsed. The task is then left to finish closing in the background
    /// and moves the state to `Closed` itself.
    pub async fn shutdown(mut self, timeout: Duration) -> bool {
        transition(&self.state, ConnectionState::ShuttingDown);
        self.token.cancel();

        match tokio::time::timeout(timeout, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                error!("connection task failed: {err}");
                transition(&self.state, ConnectionState::Closed);
                true
            }
            Err(_) => {
                warn!(?timeout, "connection did not close in time, closing in background");
                false
            }
        }
    }
}

/// Moves to `next` unless shutdown has begun, after which only `Closed` is
/// accepted.
fn transition(state: &watch::Sender<ConnectionState>, next: ConnectionState) {
    state.send_if_modified(|current| {
        let locked = matches!(
            current,
            ConnectionState::ShuttingDown | ConnectionState::Closed
        );
        if *current == next || (locked && next != ConnectionState::Closed) {
            return false;
        }

        info!(from = %current, to = %next, "connection state changed");
        *current = next;
        true
    });
}

async fn run(
    source: Arc<dyn EventSource>,
    decoder: EventDecoder,
    config: ConnectionConfig,
    events: mpsc::Sender<SensorEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() {
            debug!("connection cancelled before dial");
            break;
        }

        transition(&state, ConnectionState::Connecting);

        let connected = tokio::select! {
            _ = token.cancelled() => break,
            connected = source.connect() => connected,
        };

        match connected {
            Ok(mut stream) => {
                transition(&state, ConnectionState::Connected);

                match read_frames(&mut *stream, &decoder, &events, &token).await {
                    ReadOutcome::Cancelled => {
                        transition(&state, ConnectionState::ShuttingDown);
                        stream.close().await;
                        break;
                    }
                    ReadOutcome::ReceiverDropped => {
                        info!("event stream dropped, closing connection");
                        transition(&state, ConnectionState::ShuttingDown);
                        stream.close().await;
                        break;
                    }
                    ReadOutcome::Disconnected(Some(err)) => {
                        warn!("connection lost: {err:#}");
                        stream.close().await;
                    }
                    ReadOutcome::Disconnected(None) => {
                        warn!("connection closed by gateway");
                    }
                }
            }
            Err(err) => {
                error!("failed to connect: {err:#}");
            }
        }

        transition(&state, ConnectionState::Disconnected);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    transition(&state, ConnectionState::Closed);
    debug!("connection task finished");
}

async fn read_frames(
    stream: &mut dyn FrameStream,
    decoder: &EventDecoder,
    events: &mpsc::Sender<SensorEvent>,
    token: &CancellationToken,
) -> ReadOutcome {
    loop {
        let frame = tokio::select! {
            _ = token.cancelled() => return ReadOutcome::Cancelled,
            frame = stream.next_frame() => frame,
        };

        let frame = match frame {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => return ReadOutcome::Disconnected(Some(err)),
            None => return ReadOutcome::Disconnected(None),
        };

        debug!(frame = %String::from_utf8_lossy(&frame), "received frame");

        let event = match decoder.decode(&frame) {
            Ok(event) => event,
            Err(err) => {
                warn!("dropping event: {err}");
                continue;
            }
        };

        tokio::select! {
            _ = token.cancelled() => return ReadOutcome::Cancelled,
            sent = events.send(event) => {
                if sent.is_err() {
                    return ReadOutcome::ReceiverDropped;
                }
            }
        }
    }
}
