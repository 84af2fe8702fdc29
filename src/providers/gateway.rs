/*!
 * JSON-over-HTTP client for a hosted generation studio.
 *
 * One `StudioGateway` serves every collaborator contract. Each call is a
 * POST of the request struct to a versioned path; responses carry the
 * produced value plus the cost the gateway charged.
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error};
use reqwest::{Client, Response, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::production::AudioClip;
use crate::timeline::TimelineDocument;

use super::{
    AudioGenerator, ClipGenerator, ClipRequest, Generated, ImageGenerator, ImageRequest,
    MusicRequest, ObjectStore, PublishReceipt, PublishRequest, Publisher, RenderService,
    RenderStatus, SoundEffectRequest, SpeechRequest, TextGenerator, TextRequest,
};

#[derive(Debug, Deserialize)]
struct TextResponse {
    output: Value,
    #[serde(default)]
    cost: f64,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    url: String,
    #[serde(default)]
    cost: f64,
}

#[derive(Debug, Deserialize)]
struct AudioResponse {
    url: String,
    duration: f64,
    #[serde(default)]
    cost: f64,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    url: String,
}

#[derive(Debug, Serialize)]
struct RenderSubmission<'a> {
    timeline: &'a TimelineDocument,
    manifest_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct RenderSubmitted {
    render_id: String,
}

/// HTTP client for the studio gateway
#[derive(Clone)]
pub struct StudioGateway {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl fmt::Debug for StudioGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudioGateway")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Parse an endpoint, accepting a bare host and keeping a trailing slash so
/// relative paths join under it
fn parse_base_url(endpoint: &str) -> Result<Url> {
    if endpoint.trim().is_empty() {
        return Err(anyhow!("Gateway endpoint cannot be empty"));
    }

    let with_scheme = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{}", endpoint)
    };
    let normalized = format!("{}/", with_scheme.trim_end_matches('/'));

    let url = Url::parse(&normalized)?;
    if url.host_str().is_none() {
        return Err(anyhow!("Invalid host in endpoint: {}", endpoint));
    }
    Ok(url)
}

/// Map an error status to the matching provider error
fn classify_status(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        _ => ProviderError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn transport_error(e: reqwest::Error) -> ProviderError {
    if e.is_connect() || e.is_timeout() {
        ProviderError::ConnectionError(e.to_string())
    } else {
        ProviderError::RequestFailed(e.to_string())
    }
}

impl StudioGateway {
    pub fn new(endpoint: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key: api_key.into(),
            base_url: parse_base_url(endpoint)?,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid path {}: {}", path, e)))
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Gateway error ({}): {}", status, error_text);
            return Err(classify_status(status.as_u16(), error_text));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read(response).await
    }

    /// Check that the gateway is reachable and the key is accepted
    pub async fn test_connection(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .get(self.url("v1/health")?)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_status(status.as_u16(), body))
        }
    }
}

#[async_trait]
impl TextGenerator for StudioGateway {
    async fn generate_text(&self, request: TextRequest) -> Result<Generated<Value>, ProviderError> {
        let response: TextResponse = self.post("v1/text", &request).await?;
        Ok(Generated::new(response.output, response.cost))
    }
}

#[async_trait]
impl ImageGenerator for StudioGateway {
    async fn generate_image(&self, request: ImageRequest) -> Result<Generated<String>, ProviderError> {
        let response: MediaResponse = self.post("v1/images", &request).await?;
        Ok(Generated::new(response.url, response.cost))
    }
}

#[async_trait]
impl ClipGenerator for StudioGateway {
    async fn generate_clip(&self, request: ClipRequest) -> Result<Generated<String>, ProviderError> {
        let response: MediaResponse = self.post("v1/clips", &request).await?;
        Ok(Generated::new(response.url, response.cost))
    }
}

impl From<AudioResponse> for Generated<AudioClip> {
    fn from(response: AudioResponse) -> Self {
        Generated::new(
            AudioClip {
                url: response.url,
                duration: response.duration,
            },
            response.cost,
        )
    }
}

#[async_trait]
impl AudioGenerator for StudioGateway {
    async fn generate_speech(&self, request: SpeechRequest) -> Result<Generated<AudioClip>, ProviderError> {
        let response: AudioResponse = self.post("v1/speech", &request).await?;
        Ok(response.into())
    }

    async fn generate_music(&self, request: MusicRequest) -> Result<Generated<AudioClip>, ProviderError> {
        let response: AudioResponse = self.post("v1/music", &request).await?;
        Ok(response.into())
    }

    async fn generate_sound_effect(
        &self,
        request: SoundEffectRequest,
    ) -> Result<Generated<AudioClip>, ProviderError> {
        let response: AudioResponse = self.post("v1/sound-effects", &request).await?;
        Ok(response.into())
    }
}

#[async_trait]
impl ObjectStore for StudioGateway {
    async fn store_object(&self, path: &str, bytes: Bytes, mime_type: &str) -> Result<String, ProviderError> {
        let url = self.url(&format!("v1/objects/{}", path.trim_start_matches('/')))?;
        debug!("PUT {} ({} bytes)", url, bytes.len());

        let response = self
            .client
            .put(url)
            .bearer_auth(&self.api_key)
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(transport_error)?;

        let stored: StoredObject = Self::read(response).await?;
        Ok(stored.url)
    }
}

#[async_trait]
impl RenderService for StudioGateway {
    async fn submit_render(
        &self,
        document: &TimelineDocument,
        manifest_url: &str,
    ) -> Result<String, ProviderError> {
        let submission = RenderSubmission {
            timeline: document,
            manifest_url,
        };
        let response: RenderSubmitted = self.post("v1/renders", &submission).await?;
        Ok(response.render_id)
    }

    async fn poll_render(&self, render_id: &str) -> Result<RenderStatus, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("v1/renders/{}", render_id))?)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(transport_error)?;

        Self::read(response).await
    }
}

#[async_trait]
impl Publisher for StudioGateway {
    async fn publish(&self, request: PublishRequest) -> Result<PublishReceipt, ProviderError> {
        self.post("v1/publish", &request).await
    }
}
