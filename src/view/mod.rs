use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Config;
use crate::error::ConfigError;
use crate::loader::{InitialLoader, LoadState, SnapshotSource};
use crate::presenter::{ResultsPage, ResultsPresenter};
use crate::session::Session;
use crate::store::StoreHandle;
use crate::stream::socket::WsConnector;
use crate::stream::{ConnectionState, FeedConnector, StreamClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewAction {
    Previous,
    Next,
    ToggleSort,
    ToggleTextPanel,
}

impl ViewAction {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "p" | "prev" | "previous" => Some(ViewAction::Previous),
            "n" | "next" => Some(ViewAction::Next),
            "s" | "sort" => Some(ViewAction::ToggleSort),
            "t" | "text" => Some(ViewAction::ToggleTextPanel),
            _ => None,
        }
    }
}

pub struct ResultsView {
    survey_id: String,
    store: StoreHandle,
    stream: Option<StreamClient>,
    loader: Option<JoinHandle<()>>,
    load_state: watch::Receiver<LoadState>,
    // Cleared once the loader task has finished and dropped its sender
    load_pending: bool,
    store_changes: watch::Receiver<u64>,
    connection: Option<watch::Receiver<ConnectionState>>,
    presenter: ResultsPresenter,
}

impl ResultsView {
    /// Mount against the configured HTTP API and WebSocket feed.
    pub fn mount(config: &Config, session: &Session, survey_id: &str) -> Result<Self, ConfigError> {
        let feed_target = config.feed_url(survey_id)?;
        let loader = InitialLoader::new(config.api_base_url.clone(), session.clone());
        Ok(Self::mount_with(
            survey_id,
            Arc::new(loader),
            Arc::new(WsConnector),
            feed_target,
            config.reconnect_delay,
        ))
    }

    pub fn mount_with(
        survey_id: impl Into<String>,
        source: Arc<dyn SnapshotSource>,
        connector: Arc<dyn FeedConnector>,
        feed_target: Url,
        reconnect_delay: Duration,
    ) -> Self {
        let survey_id = survey_id.into();
        info!("Mounting results view for survey {}", survey_id);

        let store = StoreHandle::new(CancellationToken::new());
        store.reset();
        let store_changes = store.subscribe();

        let (load_status, load_state) = watch::channel(LoadState::Loading);
        let loader = tokio::spawn(run_initial_load(
            source,
            survey_id.clone(),
            store.clone(),
            load_status,
        ));
        let stream = StreamClient::spawn(
            connector,
            feed_target,
            survey_id.clone(),
            store.clone(),
            reconnect_delay,
        );
        let connection = Some(stream.subscribe_state());

        Self {
            survey_id,
            store,
            stream: Some(stream),
            loader: Some(loader),
            load_state,
            load_pending: true,
            store_changes,
            connection,
            presenter: ResultsPresenter::new(),
        }
    }

    pub fn survey_id(&self) -> &str {
        &self.survey_id
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state.borrow().clone()
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.stream.as_ref().map(|stream| stream.state())
    }

    pub fn render(&mut self) -> ResultsPage {
        self.store_changes.borrow_and_update();
        if let Some(connection) = self.connection.as_mut() {
            connection.borrow_and_update();
        }
        let load = self.load_state.borrow_and_update().clone();

        let (header, questions) = self.store.snapshot();
        let mut page = self.presenter.render(header.as_ref(), &questions, &load);
        page.connection = self.connection_state();
        page
    }

    pub fn handle(&mut self, action: ViewAction) {
        let len = self.store.len();
        match action {
            ViewAction::Previous => self.presenter.previous(len),
            ViewAction::Next => self.presenter.next(len),
            ViewAction::ToggleSort => self.presenter.toggle_sort(),
            ViewAction::ToggleTextPanel => self.presenter.toggle_text_panel(),
        }
    }

    /// Wait until the results, the load status or the feed state change.
    pub async fn changed(&mut self) {
        loop {
            tokio::select! {
                result = self.store_changes.changed() => {
                    if result.is_ok() {
                        return;
                    }
                }
                result = self.load_state.changed(), if self.load_pending => {
                    match result {
                        Ok(()) => return,
                        Err(_) => self.load_pending = false,
                    }
                }
                result = feed_changed(&mut self.connection) => {
                    match result {
                        Ok(()) => return,
                        // Feed task is gone; stop listening to it
                        Err(_) => self.connection = None,
                    }
                }
            }
        }
    }

    pub async fn unmount(mut self) {
        self.teardown();
        if let Some(stream) = self.stream.take() {
            stream.shutdown().await;
        }
        info!("Unmounted results view for survey {}", self.survey_id);
    }

    fn teardown(&mut self) {
        self.store.detach();
        if let Some(loader) = self.loader.take() {
            loader.abort();
        }
    }
}

impl Drop for ResultsView {
    fn drop(&mut self) {
        if !self.store.is_detached() {
            warn!("Results view for survey {} dropped without unmount", self.survey_id);
            self.teardown();
        }
    }
}

async fn feed_changed(
    connection: &mut Option<watch::Receiver<ConnectionState>>,
) -> Result<(), watch::error::RecvError> {
    match connection {
        Some(connection) => connection.changed().await,
        None => std::future::pending().await,
    }
}

async fn run_initial_load(
    source: Arc<dyn SnapshotSource>,
    survey_id: String,
    store: StoreHandle,
    status: watch::Sender<LoadState>,
) {
    let cancel = store.cancel_token();
    let result = tokio::select! {
        _ = cancel.cancelled() => return,
        result = source.load_initial(&survey_id) => result,
    };

    match result {
        Ok(survey) => {
            info!(
                "Initial results for survey {}: {} question(s)",
                survey_id,
                survey.questions.len()
            );
            if store.apply_survey(survey) {
                status.send_replace(LoadState::Ready);
            }
        }
        Err(e) => {
            if cancel.is_cancelled() {
                return;
            }
            error!("Failed to load initial results for survey {}: {}", survey_id, e);
            status.send_replace(LoadState::Failed(e.user_message()));
        }
    }
}
