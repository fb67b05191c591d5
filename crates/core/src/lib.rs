//! Zesty Core - Shared domain types.
//!
//! This crate provides the types shared by the marketplace front-end and its
//! tests:
//! - identities and the two profile shapes (individual seller, business owner)
//! - advertisements, categories and advertisement images
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Wire
//! (de)serialization matches the column names of the hosted tables so the
//! client can decode rows directly into these types.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, emails and prices, plus the
//!   profile and listing models

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
