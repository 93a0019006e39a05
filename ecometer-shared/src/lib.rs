//! # Ecometer Shared Library
//!
//! Domain types, storage and business rules for the Ecometer API: a ledger
//! of energy, emissions and water usage for AI workloads, grouped by project
//! and team, behind username/password authentication.
//!
//! ## Module Organization
//!
//! - `models`: Database models and data structures
//! - `store`: Storage traits with PostgreSQL and in-memory backends
//! - `auth`: Password hashing, tokens, access guard and role checks
//! - `services`: Credential and metric ledger operations
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the Ecometer shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
