//! Creating the profile row that goes with a new identity.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use zesty_core::{
    AccountKind, BusinessProfile, Email, EmailError, IdentityId, IndividualProfile, Profile,
    ProfileBase,
};

use super::auth::AuthError;
use super::backend::ProfileStore;
use crate::models::AuthSession;

/// A submitted field failed validation. Nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was empty after trimming.
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),
}

impl ValidationError {
    /// Short code carried in the `?error=` query of the form pages.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::MissingField(field) => format!("missing_{field}"),
            Self::InvalidEmail(_) => "invalid_email".to_owned(),
        }
    }
}

/// Profile fields as submitted on the registration form.
///
/// `id` is accepted so a form carrying one still parses; it is never used.
/// The row id always comes from the identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub business_name: Option<String>,
    #[serde(default)]
    pub business_address: Option<String>,
}

impl ProfileFields {
    /// Check the fields required for `kind` and parse the email.
    ///
    /// # Errors
    ///
    /// Returns the first missing field in form order, or the email parse
    /// error.
    pub fn validate(&self, kind: AccountKind) -> Result<Email, ValidationError> {
        require("email", &self.email)?;
        require("full_name", &self.full_name)?;
        require("phone", &self.phone)?;
        if kind == AccountKind::Business {
            require("business_name", self.business_name.as_deref().unwrap_or_default())?;
            require(
                "business_address",
                self.business_address.as_deref().unwrap_or_default(),
            )?;
        }

        Ok(Email::parse(&self.email)?)
    }

    /// Build the row for `kind`, keyed by `identity_id`.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if [`validate`](Self::validate) fails.
    pub fn into_profile(
        self,
        identity_id: IdentityId,
        kind: AccountKind,
    ) -> Result<Profile, ValidationError> {
        let email = self.validate(kind)?;
        let base = ProfileBase {
            id: identity_id,
            email,
            full_name: self.full_name.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
        };

        Ok(match kind {
            AccountKind::Individual => Profile::Individual(IndividualProfile {
                base,
                avatar_url: None,
            }),
            AccountKind::Business => Profile::Business(BusinessProfile {
                base,
                logo_url: None,
                business_name: trimmed(self.business_name),
                business_address: trimmed(self.business_address),
            }),
        })
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn trimmed(value: Option<String>) -> String {
    value.as_deref().map(str::trim).unwrap_or_default().to_owned()
}

/// Writes the profile row at registration.
pub struct AccountProvisioner<'a, S> {
    store: &'a S,
}

impl<'a, S: ProfileStore> AccountProvisioner<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create the profile of `kind` for `identity_id`.
    ///
    /// Any `id` in `fields` is ignored. A failed insert is not rolled back
    /// and leaves the identity without a profile; the resolver provisions a
    /// default one on first sign-in.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` before any write when a field is
    /// missing, or `AuthError::Provisioning` when the insert fails.
    #[instrument(skip(self, fields, session), fields(user_id = %identity_id, kind = %kind))]
    pub async fn provision(
        &self,
        identity_id: &IdentityId,
        kind: AccountKind,
        fields: ProfileFields,
        session: Option<&AuthSession>,
    ) -> Result<Profile, AuthError> {
        if fields.id.as_deref().is_some_and(|id| id != identity_id.as_str()) {
            warn!("Ignoring profile id supplied with registration fields");
        }

        let profile = fields.into_profile(identity_id.clone(), kind)?;
        let inserted = self
            .store
            .insert(&profile, session)
            .await
            .map_err(AuthError::Provisioning)?;

        info!("Profile provisioned");
        Ok(inserted)
    }
}
