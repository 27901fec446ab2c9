use async_trait::async_trait;
use log::{info, warn};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION};
use serde::Deserialize;
use url::Url;

use crate::config::snapshot_url;
use crate::error::LoadError;
use crate::models::{SurveyAggregate, decode_survey_bytes};
use crate::session::Session;

/// Where the one-shot snapshot of a survey comes from.
#[async_trait]
pub trait SnapshotSource: Send + Sync + 'static {
    async fn load_initial(&self, survey_id: &str) -> Result<SurveyAggregate, LoadError>;
}

/// Progress of the initial fetch as the page sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Loading,
    Ready,
    Failed(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Fetches the current aggregate over HTTP. One request, no retry.
pub struct InitialLoader {
    client: reqwest::Client,
    api_base: Url,
    session: Session,
}

impl InitialLoader {
    pub fn new(api_base: Url, session: Session) -> Self {
        Self::with_client(reqwest::Client::new(), api_base, session)
    }

    pub fn with_client(client: reqwest::Client, api_base: Url, session: Session) -> Self {
        Self {
            client,
            api_base,
            session,
        }
    }
}

#[async_trait]
impl SnapshotSource for InitialLoader {
    async fn load_initial(&self, survey_id: &str) -> Result<SurveyAggregate, LoadError> {
        let url = snapshot_url(&self.api_base, survey_id)?;
        info!("Fetching initial results for survey {}", survey_id);

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, self.session.locale.code());
        if let Some(bearer) = self.session.bearer() {
            request = request.header(AUTHORIZATION, bearer);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    format!("Failed to load results (status {})", status.as_u16())
                });
            warn!("Initial results for survey {} failed: {} {}", survey_id, status, message);
            return Err(LoadError::Api { status, message });
        }

        Ok(decode_survey_bytes(&body)?)
    }
}
