//! Contracts for the hosted backend.
//!
//! The resolver, provisioner and auth flows are written against these two
//! traits. [`crate::supabase::SupabaseClient`] implements both; tests use an
//! in-memory fake.

use secrecy::SecretString;
use thiserror::Error;

use zesty_core::{AccountKind, Email, Identity, Profile};

use crate::models::AuthSession;

/// A remote call failed before producing a usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The call exceeded the configured request timeout.
    #[error("request timed out")]
    Timeout,

    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered with an unexpected error status.
    #[error("backend error {status}: {message}")]
    Backend { status: u16, message: String },

    /// The backend answered but the body could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Failure modes of a password sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignInError {
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Credentials are right but the email has not been confirmed yet.
    #[error("email not confirmed")]
    EmailUnconfirmed,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure modes of a sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignUpError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("password rejected: {0}")]
    WeakPassword(String),

    /// Any other refusal by the provider (signups disabled, bad email...).
    #[error("sign-up rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failure modes of a profile insert.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InsertError {
    /// A unique or foreign key constraint refused the row.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of a successful sign-up.
///
/// Providers that require email confirmation issue no session.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub identity: Identity,
    pub session: Option<AuthSession>,
}

/// Issues and verifies sessions.
pub trait AuthProvider: Send + Sync {
    /// Validate a stored session, refreshing it when the access token has
    /// expired. `Ok(None)` means there is no usable session.
    fn get_session(
        &self,
        stored: Option<&AuthSession>,
    ) -> impl Future<Output = Result<Option<AuthSession>, TransportError>> + Send;

    fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> impl Future<Output = Result<AuthSession, SignInError>> + Send;

    fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> impl Future<Output = Result<SignUpOutcome, SignUpError>> + Send;

    /// Revoke the session at the provider.
    fn sign_out(&self, session: &AuthSession)
    -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Fetch the full identity behind a session.
    fn get_identity(
        &self,
        session: &AuthSession,
    ) -> impl Future<Output = Result<Identity, TransportError>> + Send;
}

/// Reads and writes rows of the two profile tables.
///
/// Every call takes the caller's session explicitly; `None` means the call
/// is made with the anonymous role.
pub trait ProfileStore: Send + Sync {
    fn find_by_email(
        &self,
        kind: AccountKind,
        email: &Email,
        session: Option<&AuthSession>,
    ) -> impl Future<Output = Result<Option<Profile>, TransportError>> + Send;

    /// Insert a row into the table matching the profile's kind.
    fn insert(
        &self,
        profile: &Profile,
        session: Option<&AuthSession>,
    ) -> impl Future<Output = Result<Profile, InsertError>> + Send;

    /// Insert unless a row with the same id exists. `Ok(None)` when the row
    /// was already there.
    fn insert_if_absent(
        &self,
        profile: &Profile,
        session: Option<&AuthSession>,
    ) -> impl Future<Output = Result<Option<Profile>, InsertError>> + Send;
}
