pub mod socket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::StreamError;
use crate::models::decode_survey;
use crate::store::StoreHandle;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed { reason: Option<String> },
    Reconnecting { delay_remaining: Duration },
}

impl ConnectionState {
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    pub fn label(&self) -> String {
        match self {
            ConnectionState::Connecting => "connecting".to_string(),
            ConnectionState::Open => "live".to_string(),
            ConnectionState::Closed { .. } => "disconnected".to_string(),
            ConnectionState::Reconnecting { delay_remaining } => {
                format!("reconnecting in {}s", delay_remaining.as_secs())
            }
        }
    }
}

/// One event read off an open feed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Message(String),
    Error(String),
    Closed(Option<String>),
}

/// Opens feed connections. Implemented over WebSocket by [`socket::WsConnector`].
#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    async fn connect(&self, target: &Url) -> Result<Box<dyn FeedConnection>, StreamError>;
}

#[async_trait]
pub trait FeedConnection: Send {
    /// Next event in arrival order. After `Closed` the connection is spent.
    async fn next_event(&mut self) -> FeedEvent;

    async fn close(&mut self);
}

pub struct StreamClient {
    survey_id: String,
    target: Url,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Spawn the feed task for `survey_id`. The target is fixed for the
    /// lifetime of the client; every reconnect goes back to it.
    pub fn spawn(
        connector: Arc<dyn FeedConnector>,
        target: Url,
        survey_id: impl Into<String>,
        store: StoreHandle,
        reconnect_delay: Duration,
    ) -> Self {
        let survey_id = survey_id.into();
        let cancel = store.cancel_token();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let machine = FeedMachine {
            connector,
            target: target.clone(),
            survey_id: survey_id.clone(),
            store,
            cancel: cancel.clone(),
            reconnect_delay,
            state: state_tx,
        };
        let task = tokio::spawn(machine.run());

        Self {
            survey_id,
            target,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn survey_id(&self) -> &str {
        &self.survey_id
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Stop the feed and wait for the task to finish closing its connection.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Results feed task for survey {} ended abnormally: {}", self.survey_id, e);
            }
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        // Dropped without shutdown(): the task still observes the token and exits.
        self.cancel.cancel();
    }
}

// Connecting -> Open -> Closed -> Reconnecting -> Connecting, until cancelled
struct FeedMachine {
    connector: Arc<dyn FeedConnector>,
    target: Url,
    survey_id: String,
    store: StoreHandle,
    cancel: CancellationToken,
    reconnect_delay: Duration,
    state: watch::Sender<ConnectionState>,
}

impl FeedMachine {
    async fn run(self) {
        let mut state = ConnectionState::Connecting;
        let mut connection: Option<Box<dyn FeedConnection>> = None;
        let mut attempt: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            self.state.send_replace(state.clone());

            let next = match state {
                ConnectionState::Connecting => {
                    attempt += 1;
                    debug!("Connecting to results feed {} (attempt {})", self.target, attempt);
                    tokio::select! {
                        _ = self.cancel.cancelled() => None,
                        result = self.connector.connect(&self.target) => Some(match result {
                            Ok(conn) => {
                                connection = Some(conn);
                                ConnectionState::Open
                            }
                            Err(e) => {
                                warn!("Results feed for survey {} unavailable: {}", self.survey_id, e);
                                ConnectionState::Closed { reason: Some(e.to_string()) }
                            }
                        }),
                    }
                }
                ConnectionState::Open => match connection.take() {
                    Some(mut conn) => {
                        info!("Results feed open for survey {}", self.survey_id);
                        attempt = 0;
                        let outcome = self.pump(&mut *conn).await;
                        if outcome.is_none() {
                            conn.close().await;
                        }
                        outcome
                    }
                    None => Some(ConnectionState::Closed { reason: None }),
                },
                ConnectionState::Closed { reason } => {
                    info!(
                        "Results feed for survey {} closed ({}), retrying in {:?}",
                        self.survey_id,
                        reason.as_deref().unwrap_or("no reason"),
                        self.reconnect_delay
                    );
                    Some(ConnectionState::Reconnecting {
                        delay_remaining: self.reconnect_delay,
                    })
                }
                ConnectionState::Reconnecting { delay_remaining } => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => None,
                        _ = tokio::time::sleep(delay_remaining) => Some(ConnectionState::Connecting),
                    }
                }
            };

            match next {
                Some(next) => state = next,
                None => break,
            }
        }

        if let Some(mut conn) = connection.take() {
            conn.close().await;
        }
        debug!("Results feed for survey {} torn down", self.survey_id);
    }

    /// Read events until the connection closes (`Some(Closed)`) or the view is
    /// torn down (`None`).
    async fn pump(&self, conn: &mut dyn FeedConnection) -> Option<ConnectionState> {
        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                event = conn.next_event() => event,
            };

            match event {
                FeedEvent::Message(text) => self.handle_message(&text),
                // The close event that follows drives the reconnect
                FeedEvent::Error(e) => warn!("Results feed error for survey {}: {}", self.survey_id, e),
                FeedEvent::Closed(reason) => return Some(ConnectionState::Closed { reason }),
            }
        }
    }

    fn handle_message(&self, text: &str) {
        match decode_survey(text) {
            Ok(survey) => {
                let count = survey.questions.len();
                if self.store.apply_survey(survey) {
                    debug!("Applied live update with {} question(s)", count);
                }
            }
            Err(e) => warn!("Ignoring results message for survey {}: {}", self.survey_id, e),
        }
    }
}
