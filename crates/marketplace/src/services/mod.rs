//! Business logic services for the marketplace.
//!
//! # Services
//!
//! - `backend` - Contracts for the hosted auth provider and profile tables
//! - `resolver` - Maps a session to its account kind and profile
//! - `provisioner` - Creates the profile row at registration
//! - `auth` - Sign-in, registration and sign-out flows
//! - `listings` - Advertisements, categories and images

pub mod auth;
pub mod backend;
pub mod listings;
pub mod provisioner;
pub mod resolver;

#[cfg(test)]
pub(crate) mod fake;

pub use auth::{AuthError, AuthService, Registration, SignInOutcome};
pub use backend::{AuthProvider, ProfileStore, TransportError};
pub use listings::{
    AdvertisementDraft, ImageUpload, ListingError, ListingService, check_advertisement_id,
};
pub use provisioner::{AccountProvisioner, ProfileFields, ValidationError};
pub use resolver::{Destination, IdentityResolver, Resolution, Resolved};
