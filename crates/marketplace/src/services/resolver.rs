//! Identity resolution: which kind of account does a session belong to?
//!
//! A profile is looked up by the session's email in the business table first
//! and the individual table second. An identity with no profile at all gets
//! a placeholder individual profile, inserted on first resolution.

use tracing::{debug, info, instrument, warn};

use zesty_core::{AccountKind, Email, Profile};

use super::auth::AuthError;
use super::backend::{AuthProvider, ProfileStore};
use crate::models::AuthSession;

/// Tables are searched in this order; the first hit wins.
const LOOKUP_ORDER: [AccountKind; 2] = [AccountKind::Business, AccountKind::Individual];

/// Where a resolved visitor is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    SignIn,
    IndividualProfile,
    BusinessProfile,
}

impl Destination {
    #[must_use]
    pub const fn for_kind(kind: AccountKind) -> Self {
        match kind {
            AccountKind::Individual => Self::IndividualProfile,
            AccountKind::Business => Self::BusinessProfile,
        }
    }

    /// Route path of the destination page.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::SignIn => "/login",
            Self::IndividualProfile => "/user-profile",
            Self::BusinessProfile => "/business-dashboard",
        }
    }
}

/// The outcome of resolving a session or email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A profile row already existed.
    Existing(Profile),
    /// No row existed; a placeholder individual profile was provisioned.
    ProvisionedDefault(Profile),
}

impl Resolution {
    #[must_use]
    pub const fn profile(&self) -> &Profile {
        match self {
            Self::Existing(profile) | Self::ProvisionedDefault(profile) => profile,
        }
    }

    #[must_use]
    pub fn into_profile(self) -> Profile {
        match self {
            Self::Existing(profile) | Self::ProvisionedDefault(profile) => profile,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> AccountKind {
        self.profile().kind()
    }

    #[must_use]
    pub const fn destination(&self) -> Destination {
        Destination::for_kind(self.kind())
    }
}

/// A resolution together with the (possibly refreshed) session it was made
/// for.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub session: AuthSession,
    pub resolution: Resolution,
}

/// Maps sessions to profiles.
pub struct IdentityResolver<'a, A, S> {
    auth: &'a A,
    store: &'a S,
}

impl<'a, A: AuthProvider, S: ProfileStore> IdentityResolver<'a, A, S> {
    #[must_use]
    pub const fn new(auth: &'a A, store: &'a S) -> Self {
        Self { auth, store }
    }

    /// Resolve the visitor behind `stored`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NotAuthenticated` when there is no usable session
    /// (including when the session check itself fails), or
    /// `AuthError::Transport` when a placeholder profile is needed but the
    /// identity cannot be fetched.
    #[instrument(skip_all)]
    pub async fn resolve(&self, stored: Option<&AuthSession>) -> Result<Resolved, AuthError> {
        let session = match self.auth.get_session(stored).await {
            Ok(Some(session)) => session,
            Ok(None) => return Err(AuthError::NotAuthenticated),
            Err(e) => {
                warn!(error = %e, "Session check failed, sending visitor to sign-in");
                return Err(AuthError::NotAuthenticated);
            }
        };

        let resolution = match self.find_existing(session.email(), Some(&session)).await {
            Some(profile) => Resolution::Existing(profile),
            None => self.provision_default(&session).await?,
        };

        debug!(
            user_id = %session.identity_id(),
            kind = %resolution.kind(),
            "Resolved session"
        );
        Ok(Resolved {
            session,
            resolution,
        })
    }

    /// Look up an existing profile by email alone, without a session.
    ///
    /// Never provisions anything.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn resolve_by_email(&self, email: &Email) -> Option<Resolution> {
        self.find_existing(email, None)
            .await
            .map(Resolution::Existing)
    }

    /// Search the profile tables in precedence order.
    ///
    /// A failed lookup counts as "not found" for that table.
    async fn find_existing(
        &self,
        email: &Email,
        session: Option<&AuthSession>,
    ) -> Option<Profile> {
        for kind in LOOKUP_ORDER {
            match self.store.find_by_email(kind, email, session).await {
                Ok(Some(profile)) => return Some(profile),
                Ok(None) => {}
                Err(e) => {
                    warn!(table = kind.table(), error = %e, "Profile lookup failed, treating as not found");
                }
            }
        }
        None
    }

    /// Insert the placeholder individual profile for the session's identity.
    ///
    /// The synthesized profile is returned even when the insert fails.
    async fn provision_default(&self, session: &AuthSession) -> Result<Resolution, AuthError> {
        let identity = self.auth.get_identity(session).await?;
        let profile = Profile::placeholder_for(&identity);

        match self.store.insert_if_absent(&profile, Some(session)).await {
            Ok(Some(inserted)) => {
                info!(user_id = %identity.id, "Provisioned default individual profile");
                Ok(Resolution::ProvisionedDefault(inserted))
            }
            Ok(None) => {
                debug!(user_id = %identity.id, "Default profile already present");
                Ok(Resolution::ProvisionedDefault(profile))
            }
            Err(e) => {
                warn!(user_id = %identity.id, error = %e, "Failed to store default profile");
                Ok(Resolution::ProvisionedDefault(profile))
            }
        }
    }
}
