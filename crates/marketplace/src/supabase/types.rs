//! Wire types for the Supabase auth, REST and storage APIs.

use chrono::{DateTime, Duration, TimeZone, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use zesty_core::{AdStatus, AdvertisementId, CategoryId, Email, Identity, IdentityId, Price};

use super::SupabaseError;
use crate::models::AuthSession;

// =============================================================================
// Error Bodies
// =============================================================================

/// Error body returned by any of the APIs.
///
/// GoTrue answers with `error_code` / `msg` (older versions `error` /
/// `error_description`), PostgREST with `code` / `message` / `details` /
/// `hint`. Every field is optional so one type reads both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    /// PostgREST error code (`23505`, `PGRST116`...). GoTrue puts the HTTP
    /// status here as a number.
    pub code: Option<serde_json::Value>,
    pub error_code: Option<String>,
    pub msg: Option<String>,
    pub message: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub details: Option<String>,
    pub hint: Option<String>,
}

impl ApiErrorBody {
    /// Wrap a body that was not JSON.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self {
            message: Some(text.trim().to_owned()),
            ..Self::default()
        }
    }

    /// The most specific human-readable message available.
    #[must_use]
    pub fn message(&self) -> &str {
        self.msg
            .as_deref()
            .or(self.message.as_deref())
            .or(self.error_description.as_deref())
            .or(self.error.as_deref())
            .unwrap_or("unknown error")
    }

    /// The machine-readable error code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_code
            .as_deref()
            .or_else(|| self.code.as_ref().and_then(serde_json::Value::as_str))
            .or(self.error.as_deref())
    }

    /// Whether any code field equals `code`.
    #[must_use]
    pub fn has_code(&self, code: &str) -> bool {
        self.error_code.as_deref() == Some(code)
            || self.code.as_ref().and_then(serde_json::Value::as_str) == Some(code)
            || self.error.as_deref() == Some(code)
    }

    /// Case-insensitive search of the message fields.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [
            self.msg.as_deref(),
            self.message.as_deref(),
            self.error_description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|text| text.to_lowercase().contains(&needle))
    }
}

// =============================================================================
// Auth Types
// =============================================================================

/// A user as returned by `auth/v1`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: IdentityId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Convert into an [`Identity`].
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Unexpected` if the user has no usable email.
    pub fn into_identity(self) -> Result<Identity, SupabaseError> {
        let raw = self
            .email
            .ok_or_else(|| SupabaseError::Unexpected(format!("user {} has no email", self.id)))?;
        let email = Email::parse(&raw)
            .map_err(|e| SupabaseError::Unexpected(format!("user {} email: {e}", self.id)))?;

        Ok(Identity {
            id: self.id,
            email,
            email_verified: self.email_confirmed_at.is_some(),
        })
    }
}

/// Session grant returned by the token and sign-up endpoints.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: i64,
    /// Absolute expiry as a unix timestamp; newer servers send it.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl TokenResponse {
    /// Convert into an [`AuthSession`], computing the expiry from `now` when
    /// the server did not send an absolute one.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Unexpected` if the embedded user is unusable.
    pub fn into_session(self, now: DateTime<Utc>) -> Result<AuthSession, SupabaseError> {
        let expires_at = self
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| now + Duration::seconds(self.expires_in));

        Ok(AuthSession::new(
            SecretString::from(self.access_token),
            SecretString::from(self.refresh_token),
            expires_at,
            self.user.into_identity()?,
        ))
    }
}

/// Body of a sign-up response.
///
/// When email confirmation is required the server returns the bare user;
/// otherwise it returns a full session grant.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SignUpResponse {
    Session(Box<TokenResponse>),
    User(AuthUser),
}

/// Credentials sent to the password grant and sign-up endpoints.
#[derive(Serialize)]
pub(super) struct PasswordCredentials<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Serialize)]
pub(super) struct RefreshTokenRequest<'a> {
    pub refresh_token: &'a str,
}

// =============================================================================
// REST Payloads
// =============================================================================

/// Row inserted into `advertisements`. Id and timestamps are assigned by the
/// database.
#[derive(Debug, Clone, Serialize)]
pub struct NewAdvertisement {
    pub title: String,
    pub description: String,
    pub price: Price,
    pub status: AdStatus,
    pub category_id: CategoryId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_user_id: Option<IdentityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_owner_id: Option<IdentityId>,
}

/// Row inserted into `images`.
#[derive(Debug, Clone, Serialize)]
pub struct NewAdImage {
    pub advertisement_id: AdvertisementId,
    pub url: String,
    pub order: i32,
}

/// Body of a successful storage upload.
#[derive(Debug, Deserialize)]
pub(super) struct UploadResponse {
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
}
