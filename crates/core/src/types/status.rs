//! Enumerations shared by profiles and listings.

use serde::{Deserialize, Serialize};

/// Error returned when parsing one of the enums in this module fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

/// The two mutually-exclusive kinds of marketplace account.
///
/// Each kind owns its own profile table. The wire form (`normal` /
/// `business`) is what the registration link carries in `?type=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    /// Individual seller posting personal items.
    #[serde(rename = "normal")]
    Individual,
    /// Business owner managing multiple listings.
    #[serde(rename = "business")]
    Business,
}

impl AccountKind {
    /// Name of the profile table that stores this kind of account.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Individual => "normal_user",
            Self::Business => "business_owner",
        }
    }

    /// Column on `advertisements` that references an owner of this kind.
    #[must_use]
    pub const fn owner_column(self) -> &'static str {
        match self {
            Self::Individual => "normal_user_id",
            Self::Business => "business_owner_id",
        }
    }

    /// Wire form used in query strings and forms.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "normal",
            Self::Business => "business",
        }
    }

    /// Monthly advertisement allowance shown on the account-type picker.
    #[must_use]
    pub const fn monthly_ad_allowance(self) -> u32 {
        match self {
            Self::Individual => 5,
            Self::Business => 50,
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Individual),
            "business" => Ok(Self::Business),
            _ => Err(ParseEnumError {
                kind: "account kind",
                value: s.to_owned(),
            }),
        }
    }
}

/// Advertisement lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    #[default]
    Active,
    Inactive,
    Sold,
}

impl std::fmt::Display for AdStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
            Self::Sold => write!(f, "sold"),
        }
    }
}

impl std::str::FromStr for AdStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "sold" => Ok(Self::Sold),
            _ => Err(ParseEnumError {
                kind: "advertisement status",
                value: s.to_owned(),
            }),
        }
    }
}
