//! Video session providers.
//!
//! A booking needs a session id before it is committed. The HTTP provider
//! asks an external video service for one; the local provider mints ids
//! itself for development setups without a video backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ServerConfig;

#[derive(Debug, Error)]
pub enum VideoError {
    #[error("video service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("video service answered {0}")]
    Status(reqwest::StatusCode),

    #[error("video service returned an empty session id")]
    EmptySession,
}

#[async_trait]
pub trait VideoSessionProvider: Send + Sync {
    async fn create_session(&self) -> Result<String, VideoError>;
}

/// Pick the provider described by the configuration.
pub fn from_config(config: &ServerConfig) -> Result<Arc<dyn VideoSessionProvider>, VideoError> {
    match &config.video_api_url {
        Some(url) => {
            tracing::info!(endpoint = %url, "using HTTP video provider");
            Ok(Arc::new(HttpVideoProvider::new(
                url.clone(),
                config.video_api_key.clone(),
            )?))
        }
        None => {
            tracing::warn!("VIDEO_API_URL not set, minting local video session ids");
            Ok(Arc::new(LocalVideoProvider))
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

pub struct HttpVideoProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(alias = "sessionId")]
    session_id: String,
}

impl HttpVideoProvider {
    pub fn new(endpoint: String, api_key: Option<String>) -> Result<Self, VideoError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, endpoint, api_key))
    }

    pub fn with_client(client: reqwest::Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl VideoSessionProvider for HttpVideoProvider {
    async fn create_session(&self) -> Result<String, VideoError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "media_mode": "routed" }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(VideoError::Status(resp.status()));
        }

        let body: SessionResponse = resp.json().await?;
        if body.session_id.trim().is_empty() {
            return Err(VideoError::EmptySession);
        }
        Ok(body.session_id)
    }
}

// ---------------------------------------------------------------------------
// Local
// ---------------------------------------------------------------------------

pub struct LocalVideoProvider;

#[async_trait]
impl VideoSessionProvider for LocalVideoProvider {
    async fn create_session(&self) -> Result<String, VideoError> {
        Ok(format!("local-{}", Uuid::new_v4()))
    }
}
