//! GoTrue (`auth/v1`) operations.

use chrono::Utc;
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};

use zesty_core::{Email, Identity};

use super::types::{
    AuthUser, PasswordCredentials, RefreshTokenRequest, SignUpResponse, TokenResponse,
};
use super::{SupabaseClient, SupabaseError};
use crate::models::AuthSession;
use crate::services::backend::{
    AuthProvider, SignInError, SignUpError, SignUpOutcome, TransportError,
};

impl SupabaseClient {
    /// Exchange an email and password for a session.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` when the provider refuses the
    /// credentials.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn password_grant(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, SupabaseError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let request = self
            .request(Method::POST, url, None)
            .json(&PasswordCredentials {
                email: email.as_str(),
                password: password.expose_secret(),
            });

        let token: TokenResponse = self.send_json(request).await?;
        token.into_session(Utc::now())
    }

    /// Exchange a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Api` when the refresh token was revoked or
    /// already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, SupabaseError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut()
            .append_pair("grant_type", "refresh_token");

        let request = self
            .request(Method::POST, url, None)
            .json(&RefreshTokenRequest {
                refresh_token: refresh_token.expose_secret(),
            });

        let token: TokenResponse = self.send_json(request).await?;
        token.into_session(Utc::now())
    }

    /// Check that the auth API is up.
    ///
    /// # Errors
    ///
    /// Returns an error if the health endpoint is unreachable or unhealthy.
    #[instrument(skip(self))]
    pub async fn health(&self) -> Result<(), SupabaseError> {
        let url = self.endpoint("auth/v1/health")?;
        self.send_empty(self.request(Method::GET, url, None)).await
    }
}

impl AuthProvider for SupabaseClient {
    async fn get_session(
        &self,
        stored: Option<&AuthSession>,
    ) -> Result<Option<AuthSession>, TransportError> {
        let Some(stored) = stored else {
            return Ok(None);
        };

        if !stored.is_expired(Utc::now()) {
            return Ok(Some(stored.clone()));
        }

        match self.refresh_session(stored.refresh_token()).await {
            Ok(session) => {
                debug!(user_id = %session.identity_id(), "Refreshed expired session");
                Ok(Some(session))
            }
            Err(SupabaseError::Api { status, .. }) if (400..500).contains(&status) => {
                debug!(status, "Refresh token rejected, session ended");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, SignInError> {
        self.password_grant(email, password)
            .await
            .map_err(classify_sign_in_error)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<SignUpOutcome, SignUpError> {
        let url = self.endpoint("auth/v1/signup")?;
        let request = self
            .request(Method::POST, url, None)
            .json(&PasswordCredentials {
                email: email.as_str(),
                password: password.expose_secret(),
            });

        let response: SignUpResponse = self
            .send_json(request)
            .await
            .map_err(classify_sign_up_error)?;

        match response {
            SignUpResponse::Session(token) => {
                let session = token.into_session(Utc::now())?;
                Ok(SignUpOutcome {
                    identity: session.identity.clone(),
                    session: Some(session),
                })
            }
            SignUpResponse::User(user) => Ok(SignUpOutcome {
                identity: user.into_identity()?,
                session: None,
            }),
        }
    }

    #[instrument(skip_all, fields(user_id = %session.identity_id()))]
    async fn sign_out(&self, session: &AuthSession) -> Result<(), TransportError> {
        let url = self.endpoint("auth/v1/logout")?;
        match self
            .send_empty(self.request(Method::POST, url, Some(session)))
            .await
        {
            // An expired or already revoked token is as signed out as it gets.
            Err(SupabaseError::Api {
                status: 401 | 403 | 404,
                ..
            }) => Ok(()),
            other => other.map_err(TransportError::from),
        }
    }

    #[instrument(skip_all, fields(user_id = %session.identity_id()))]
    async fn get_identity(&self, session: &AuthSession) -> Result<Identity, TransportError> {
        let url = self.endpoint("auth/v1/user")?;
        let user: AuthUser = self
            .send_json(self.request(Method::GET, url, Some(session)))
            .await?;
        Ok(user.into_identity()?)
    }
}

impl From<SupabaseError> for SignUpError {
    fn from(err: SupabaseError) -> Self {
        Self::Transport(err.into())
    }
}

impl From<SupabaseError> for SignInError {
    fn from(err: SupabaseError) -> Self {
        Self::Transport(err.into())
    }
}

/// Map a password grant failure onto the sign-in taxonomy.
fn classify_sign_in_error(err: SupabaseError) -> SignInError {
    match err {
        SupabaseError::Api { ref body, .. }
            if body.has_code("email_not_confirmed") || body.mentions("email not confirmed") =>
        {
            SignInError::EmailUnconfirmed
        }
        SupabaseError::Api { ref body, .. }
            if body.has_code("invalid_credentials")
                || body.has_code("invalid_grant")
                || body.mentions("invalid login credentials") =>
        {
            SignInError::InvalidCredentials
        }
        other => other.into(),
    }
}

/// Map a sign-up failure onto the sign-up taxonomy.
fn classify_sign_up_error(err: SupabaseError) -> SignUpError {
    match err {
        SupabaseError::Api { ref body, .. }
            if body.has_code("user_already_exists")
                || body.has_code("email_exists")
                || body.mentions("already registered") =>
        {
            SignUpError::DuplicateEmail
        }
        SupabaseError::Api { ref body, .. }
            if body.has_code("weak_password") || body.mentions("password should") =>
        {
            SignUpError::WeakPassword(body.message().to_owned())
        }
        SupabaseError::Api { status, ref body } if (400..500).contains(&status) => {
            SignUpError::Rejected(body.message().to_owned())
        }
        other => other.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::supabase::test_support::{ANON_KEY, client_for, user_session};

    fn token_body(user_id: &str, email: &str) -> serde_json::Value {
        json!({
            "access_token": "access-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "refresh-2",
            "user": { "id": user_id, "email": email, "email_confirmed_at": "2024-05-01T10:00:00Z" }
        })
    }

    fn email() -> Email {
        Email::parse("a@x.com").unwrap()
    }

    fn password() -> SecretString {
        SecretString::from("pw123456")
    }

    #[tokio::test]
    async fn test_password_sign_in_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", ANON_KEY))
            .and(body_json(json!({ "email": "a@x.com", "password": "pw123456" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u-1", "a@x.com")))
            .expect(1)
            .mount(&server)
            .await;

        let session = client_for(&server)
            .sign_in_with_password(&email(), &password())
            .await
            .unwrap();

        assert_eq!(session.identity_id().as_str(), "u-1");
        assert_eq!(session.access_token().expose_secret(), "access-1");
    }

    #[tokio::test]
    async fn test_sign_in_error_mapping() {
        let cases = [
            (
                json!({ "code": 400, "error_code": "email_not_confirmed", "msg": "Email not confirmed" }),
                SignInError::EmailUnconfirmed,
            ),
            (
                json!({ "code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials" }),
                SignInError::InvalidCredentials,
            ),
            (
                json!({ "error": "invalid_grant", "error_description": "Invalid login credentials" }),
                SignInError::InvalidCredentials,
            ),
        ];

        for (body, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/auth/v1/token"))
                .respond_with(ResponseTemplate::new(400).set_body_json(body))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .sign_in_with_password(&email(), &password())
                .await
                .unwrap_err();
            assert_eq!(err, expected);
        }
    }

    #[tokio::test]
    async fn test_sign_in_server_error_is_transport() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "msg": "boom" })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_in_with_password(&email(), &password())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SignInError::Transport(TransportError::Backend { status: 500, .. })
        ));
    }

    #[tokio::test]
    async fn test_sign_in_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(token_body("u-1", "a@x.com"))
                    .set_delay(std::time::Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .sign_in_with_password(&email(), &password())
            .await
            .unwrap_err();
        assert_eq!(err, SignInError::Transport(TransportError::Timeout));
    }

    #[tokio::test]
    async fn test_sign_up_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-new",
                "email": "a@x.com",
                "email_confirmed_at": null
            })))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .sign_up(&email(), &password())
            .await
            .unwrap();

        assert_eq!(outcome.identity.id.as_str(), "u-new");
        assert!(!outcome.identity.email_verified);
        assert!(outcome.session.is_none());
    }

    #[tokio::test]
    async fn test_sign_up_with_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u-new", "a@x.com")))
            .mount(&server)
            .await;

        let outcome = client_for(&server)
            .sign_up(&email(), &password())
            .await
            .unwrap();

        assert_eq!(outcome.identity.id.as_str(), "u-new");
        assert!(outcome.session.is_some());
    }

    #[tokio::test]
    async fn test_sign_up_error_mapping() {
        let cases = [
            (
                422,
                json!({ "code": 422, "error_code": "user_already_exists", "msg": "User already registered" }),
                SignUpError::DuplicateEmail,
            ),
            (
                422,
                json!({ "code": 422, "error_code": "weak_password", "msg": "Password should be at least 6 characters." }),
                SignUpError::WeakPassword("Password should be at least 6 characters.".to_string()),
            ),
            (
                403,
                json!({ "code": 403, "error_code": "signup_disabled", "msg": "Signups not allowed for this instance" }),
                SignUpError::Rejected("Signups not allowed for this instance".to_string()),
            ),
        ];

        for (status, body, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/auth/v1/signup"))
                .respond_with(ResponseTemplate::new(status).set_body_json(body))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .sign_up(&email(), &password())
                .await
                .unwrap_err();
            assert_eq!(err, expected);
        }
    }

    #[tokio::test]
    async fn test_get_session_passes_through_fresh_session() {
        let server = MockServer::start().await;
        let session = user_session("access-1");

        let current = client_for(&server)
            .get_session(Some(&session))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.access_token().expose_secret(), "access-1");

        assert!(client_for(&server).get_session(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_session_refreshes_expired_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "refresh-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("u-1", "a@x.com")))
            .expect(1)
            .mount(&server)
            .await;

        let mut expired = user_session("stale");
        expired.expires_at = Utc::now() - Duration::minutes(5);

        let refreshed = client_for(&server)
            .get_session(Some(&expired))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.access_token().expose_secret(), "access-1");
        assert_eq!(refreshed.refresh_token().expose_secret(), "refresh-2");
    }

    #[tokio::test]
    async fn test_get_session_rejected_refresh_ends_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_code": "refresh_token_not_found",
                "msg": "Invalid Refresh Token: Refresh Token Not Found"
            })))
            .mount(&server)
            .await;

        let mut expired = user_session("stale");
        expired.expires_at = Utc::now() - Duration::minutes(5);

        let result = client_for(&server).get_session(Some(&expired)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_identity_uses_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer access-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-1",
                "email": "a@x.com",
                "email_confirmed_at": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let identity = client_for(&server)
            .get_identity(&user_session("access-9"))
            .await
            .unwrap();
        assert_eq!(identity.email.as_str(), "a@x.com");
        assert!(!identity.email_verified);
    }

    #[tokio::test]
    async fn test_sign_out_tolerates_expired_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "invalid JWT" })))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .sign_out(&user_session("access-1"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": "GoTrue" })))
            .mount(&server)
            .await;

        assert!(client_for(&server).health().await.is_ok());
    }
}
