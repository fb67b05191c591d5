//! Core types for the Zesty marketplace.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod listing;
pub mod price;
pub mod profile;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use listing::{AdImage, Advertisement, AdvertisementDetail, Category};
pub use price::{Price, PriceError};
pub use profile::{
    BusinessProfile, Identity, IndividualProfile, PLACEHOLDER_FULL_NAME, Profile, ProfileBase,
};
pub use status::*;
