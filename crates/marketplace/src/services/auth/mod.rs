//! Authentication service.
//!
//! Password sign-in, registration and sign-out. Passwords are verified by
//! the auth provider; this service only sequences the provider, the
//! provisioner and the resolver.

mod error;

pub use error::AuthError;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, instrument, warn};

use zesty_core::{AccountKind, Email, Profile};

use super::backend::{AuthProvider, ProfileStore, SignInError};
use super::provisioner::{AccountProvisioner, ProfileFields, ValidationError};
use super::resolver::{Destination, IdentityResolver, Resolution};
use crate::models::AuthSession;

/// Result of a sign-in attempt that did not fail outright.
#[derive(Debug, Clone)]
pub enum SignInOutcome {
    /// Credentials accepted; the session should be stored.
    Authenticated {
        session: AuthSession,
        resolution: Resolution,
    },
    /// The provider refused to issue a session because the email is not
    /// confirmed, but a profile exists for it. Only a redirect decision;
    /// there is no session to store.
    Unconfirmed { resolution: Resolution },
}

impl SignInOutcome {
    #[must_use]
    pub const fn resolution(&self) -> &Resolution {
        match self {
            Self::Authenticated { resolution, .. } | Self::Unconfirmed { resolution } => resolution,
        }
    }

    #[must_use]
    pub const fn destination(&self) -> Destination {
        self.resolution().destination()
    }
}

/// Everything submitted on the registration form.
#[derive(Debug, Clone)]
pub struct Registration {
    pub kind: AccountKind,
    pub password: SecretString,
    pub fields: ProfileFields,
}

/// Authentication service.
///
/// Borrows the backend for the duration of a request.
pub struct AuthService<'a, A, S> {
    auth: &'a A,
    store: &'a S,
}

impl<'a, A: AuthProvider, S: ProfileStore> AuthService<'a, A, S> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(auth: &'a A, store: &'a S) -> Self {
        Self { auth, store }
    }

    fn resolver(&self) -> IdentityResolver<'a, A, S> {
        IdentityResolver::new(self.auth, self.store)
    }

    // =========================================================================
    // Sign-in
    // =========================================================================

    /// Sign in with email and password and resolve the account.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email,
    /// `AuthError::InvalidCredentials` when the provider refuses the
    /// password, `AuthError::NotAuthenticated` when the email is unconfirmed
    /// and has no profile, and `AuthError::Transport` when the provider is
    /// unavailable.
    #[instrument(skip(self, email, password))]
    pub async fn sign_in(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<SignInOutcome, AuthError> {
        let email = Email::parse(email).map_err(ValidationError::from)?;
        if password.expose_secret().is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }

        match self.auth.sign_in_with_password(&email, password).await {
            Ok(session) => {
                let resolved = self.resolver().resolve(Some(&session)).await?;
                info!(user_id = %resolved.session.identity_id(), "User signed in");
                Ok(SignInOutcome::Authenticated {
                    session: resolved.session,
                    resolution: resolved.resolution,
                })
            }
            Err(SignInError::EmailUnconfirmed) => {
                info!(email = %email, "Sign-in with unconfirmed email");
                self.resolver()
                    .resolve_by_email(&email)
                    .await
                    .map(|resolution| SignInOutcome::Unconfirmed { resolution })
                    .ok_or(AuthError::NotAuthenticated)
            }
            Err(SignInError::InvalidCredentials) => Err(AuthError::InvalidCredentials),
            Err(SignInError::Transport(e)) => Err(AuthError::Transport(e)),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a new account: create the identity, then its profile, then
    /// sign out so the user signs in explicitly.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` before anything is written,
    /// `AuthError::SignUp` when the provider refuses the account, and
    /// `AuthError::Provisioning` when the profile insert fails. The identity
    /// is not removed in that last case.
    #[instrument(skip_all, fields(kind = %registration.kind))]
    pub async fn register(&self, registration: Registration) -> Result<Profile, AuthError> {
        let Registration {
            kind,
            password,
            fields,
        } = registration;

        let email = fields.validate(kind)?;
        if password.expose_secret().is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }

        let outcome = self.auth.sign_up(&email, &password).await?;
        let identity_id = outcome.identity.id.clone();

        let profile = AccountProvisioner::new(self.store)
            .provision(&identity_id, kind, fields, outcome.session.as_ref())
            .await
            .inspect_err(|e| {
                warn!(user_id = %identity_id, error = %e, "Identity created without a profile");
            })?;

        if let Some(session) = &outcome.session {
            self.sign_out(session).await;
        }

        info!(user_id = %identity_id, "Account registered");
        Ok(profile)
    }

    // =========================================================================
    // Sign-out
    // =========================================================================

    /// Revoke the session at the provider. Failures are logged and ignored;
    /// the caller drops its copy of the session either way.
    #[instrument(skip_all, fields(user_id = %session.identity_id()))]
    pub async fn sign_out(&self, session: &AuthSession) {
        if let Err(e) = self.auth.sign_out(session).await {
            warn!(error = %e, "Failed to revoke session at provider");
        }
    }
}
