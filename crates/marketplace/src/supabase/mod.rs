//! Client for the hosted Supabase backend.
//!
//! # Architecture
//!
//! - One `reqwest` client shared through an `Arc`, bounded by the configured
//!   request timeout
//! - The backend is the source of truth: no local tables, no response cache
//! - Every call carries the anon key; user-scoped calls add the session's
//!   access token as the bearer so row level security applies
//!
//! # APIs
//!
//! - `auth/v1` (GoTrue): password sign-in, sign-up, refresh, sign-out
//! - `rest/v1` (PostgREST): profile tables, advertisements, categories, images
//! - `storage/v1`: advertisement image uploads and their public URLs

mod auth;
mod rest;
mod storage;
pub mod types;

pub use types::{ApiErrorBody, NewAdImage, NewAdvertisement};

use std::sync::Arc;

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::config::SupabaseConfig;
use crate::models::AuthSession;
use crate::services::backend::TransportError;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("API error {status}: {}", body.message())]
    Api { status: u16, body: ApiErrorBody },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The response parsed but lacks data the caller needs.
    #[error("unexpected response: {0}")]
    Unexpected(String),
}

impl SupabaseError {
    /// Status code of an API error, if this is one.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<SupabaseError> for TransportError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Http(e) if e.is_timeout() => Self::Timeout,
            SupabaseError::Http(e) if e.is_decode() => Self::Malformed(e.to_string()),
            SupabaseError::Http(e) => Self::Unreachable(e.to_string()),
            SupabaseError::Api { status, body } => Self::Backend {
                status,
                message: body.message().to_owned(),
            },
            SupabaseError::Parse(e) => Self::Malformed(e.to_string()),
            SupabaseError::InvalidUrl(e) => Self::Malformed(e.to_string()),
            SupabaseError::Unexpected(message) => Self::Malformed(message),
        }
    }
}

// =============================================================================
// SupabaseClient
// =============================================================================

/// Client for the auth, REST and storage APIs of one project.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct SupabaseClient {
    inner: Arc<SupabaseClientInner>,
}

struct SupabaseClientInner {
    client: reqwest::Client,
    /// Project URL, always ending in `/` so relative joins keep its path.
    base_url: Url,
    anon_key: SecretString,
    storage_bucket: String,
}

impl SupabaseClient {
    /// Create a client for the configured project.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("zesty-marketplace/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let mut base_url = config.url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            inner: Arc::new(SupabaseClientInner {
                client,
                base_url,
                anon_key: config.anon_key.clone(),
                storage_bucket: config.storage_bucket.clone(),
            }),
        })
    }

    /// Name of the bucket advertisement images are uploaded to.
    #[must_use]
    pub fn storage_bucket(&self) -> &str {
        &self.inner.storage_bucket
    }

    /// Resolve a path relative to the project URL.
    fn endpoint(&self, path: &str) -> Result<Url, SupabaseError> {
        Ok(self.inner.base_url.join(path)?)
    }

    /// Start a request with the project's auth headers.
    ///
    /// The bearer is the session's access token when one is given, else the
    /// anon key.
    fn request(&self, method: Method, url: Url, session: Option<&AuthSession>) -> RequestBuilder {
        let anon_key = self.inner.anon_key.expose_secret();
        let bearer = session.map_or(anon_key, |s| s.access_token().expose_secret());

        self.inner
            .client
            .request(method, url)
            .header("apikey", anon_key)
            .bearer_auth(bearer)
    }

    /// Send a request and decode a JSON success body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SupabaseError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %String::from_utf8_lossy(&body).chars().take(500).collect::<String>(),
                "Failed to parse Supabase response"
            );
            SupabaseError::Parse(e)
        })
    }

    /// Send a request whose success body is irrelevant.
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), SupabaseError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(api_error(status, &body));
        }

        Ok(())
    }
}

/// Build an API error from a failed response, whatever shape its body has.
fn api_error(status: StatusCode, body: &[u8]) -> SupabaseError {
    let body = serde_json::from_slice::<ApiErrorBody>(body)
        .unwrap_or_else(|_| ApiErrorBody::from_text(&String::from_utf8_lossy(body)));

    if status.is_server_error() {
        tracing::error!(status = %status, message = %body.message(), "Supabase returned server error");
    } else {
        tracing::debug!(status = %status, message = %body.message(), "Supabase rejected request");
    }

    SupabaseError::Api {
        status: status.as_u16(),
        body,
    }
}
