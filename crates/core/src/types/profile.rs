//! Identities and marketplace profiles.
//!
//! An [`Identity`] is the auth provider's record of a user. A [`Profile`] is
//! the application's record extending an identity with contact fields. The
//! two profile shapes live in disjoint tables but share [`ProfileBase`].

use serde::{Deserialize, Serialize};

use crate::{AccountKind, Email, IdentityId};

/// Display name given to profiles created without user input.
pub const PLACEHOLDER_FULL_NAME: &str = "User";

/// The auth provider's view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id, shared with the profile tables.
    pub id: IdentityId,
    /// Email the identity signed up with.
    pub email: Email,
    /// Whether the provider has confirmed the email.
    pub email_verified: bool,
}

/// Fields shared by both profile shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileBase {
    /// Equal to the owning [`Identity::id`].
    pub id: IdentityId,
    pub email: Email,
    pub full_name: String,
    pub phone: String,
}

/// Profile of an individual seller (`normal_user` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndividualProfile {
    #[serde(flatten)]
    pub base: ProfileBase,
    #[serde(rename = "profile_image", default)]
    pub avatar_url: Option<String>,
}

/// Profile of a business owner (`business_owner` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    #[serde(flatten)]
    pub base: ProfileBase,
    #[serde(rename = "profile_image", default)]
    pub logo_url: Option<String>,
    pub business_name: String,
    pub business_address: String,
}

/// A profile of either kind.
///
/// Serializes as the bare row of its table. There is no `Deserialize` impl:
/// the table a row came from decides its shape, see [`Profile::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Profile {
    Individual(IndividualProfile),
    Business(BusinessProfile),
}

impl Profile {
    /// The placeholder individual profile created for an identity that has
    /// no profile row yet.
    #[must_use]
    pub fn placeholder_for(identity: &Identity) -> Self {
        Self::Individual(IndividualProfile {
            base: ProfileBase {
                id: identity.id.clone(),
                email: identity.email.clone(),
                full_name: PLACEHOLDER_FULL_NAME.to_owned(),
                phone: String::new(),
            },
            avatar_url: None,
        })
    }

    /// Decode a row read from the table of `kind`.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error if the row does not have the columns
    /// of that table.
    pub fn decode(kind: AccountKind, row: serde_json::Value) -> Result<Self, serde_json::Error> {
        match kind {
            AccountKind::Individual => serde_json::from_value(row).map(Self::Individual),
            AccountKind::Business => serde_json::from_value(row).map(Self::Business),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> AccountKind {
        match self {
            Self::Individual(_) => AccountKind::Individual,
            Self::Business(_) => AccountKind::Business,
        }
    }

    #[must_use]
    pub const fn base(&self) -> &ProfileBase {
        match self {
            Self::Individual(p) => &p.base,
            Self::Business(p) => &p.base,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &IdentityId {
        &self.base().id
    }

    #[must_use]
    pub const fn email(&self) -> &Email {
        &self.base().email
    }

    /// Avatar for individuals, logo for businesses.
    #[must_use]
    pub fn image_url(&self) -> Option<&str> {
        match self {
            Self::Individual(p) => p.avatar_url.as_deref(),
            Self::Business(p) => p.logo_url.as_deref(),
        }
    }
}
