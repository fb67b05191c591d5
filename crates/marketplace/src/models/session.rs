//! Session-related types.
//!
//! Types stored in the cookie session for authentication state.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use zesty_core::{Email, Identity, IdentityId};

/// Tokens are treated as expired this long before their real expiry so a
/// request never starts with a token that lapses mid-flight.
const EXPIRY_LEEWAY_SECONDS: i64 = 30;

/// A session issued by the auth provider.
///
/// This is the explicit session context handed to every resolver,
/// provisioner and store call. Tokens are redacted from `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    #[serde(with = "secret_string")]
    access_token: SecretString,
    #[serde(with = "secret_string")]
    refresh_token: SecretString,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
    /// The identity the session belongs to.
    pub identity: Identity,
}

impl AuthSession {
    /// Create a session from provider-issued tokens.
    #[must_use]
    pub const fn new(
        access_token: SecretString,
        refresh_token: SecretString,
        expires_at: DateTime<Utc>,
        identity: Identity,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
            identity,
        }
    }

    /// Bearer token for authenticated API calls.
    #[must_use]
    pub const fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Token used to obtain a fresh session once this one expires.
    #[must_use]
    pub const fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    #[must_use]
    pub const fn identity_id(&self) -> &IdentityId {
        &self.identity.id
    }

    /// The session's email, which is the profile lookup key.
    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.identity.email
    }

    /// Whether the access token should be refreshed before use.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_LEEWAY_SECONDS) >= self.expires_at
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("identity", &self.identity)
            .finish()
    }
}

/// Serde adapter that stores a `SecretString` as a plain string.
///
/// Only used for the server-side session store; the value never reaches the
/// browser (the cookie carries the session id only).
mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for the signed-in user's [`AuthSession`](super::AuthSession).
    pub const AUTH_SESSION: &str = "auth_session";
}
