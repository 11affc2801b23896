//! # PrintCRM Shared Library
//!
//! Domain types, persistence and account workflows used by the PrintCRM
//! API server.
//!
//! ## Module Organization
//!
//! - `account`: account export and the deletion cascade
//! - `auth`: password hashing and session tokens
//! - `db`: connection pool and migrations
//! - `identity`: resolving requests to identities
//! - `models`: database models and ownership-scoped queries

pub mod account;
pub mod auth;
pub mod db;
pub mod identity;
pub mod models;

/// Current version of the PrintCRM shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
