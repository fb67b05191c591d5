//! Zesty Marketplace library.
//!
//! This crate provides the marketplace front-end as a library, allowing the
//! router to be tested end to end and the binary to stay thin.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod supabase;
