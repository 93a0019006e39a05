//! # Ecometer API Server Library
//!
//! HTTP surface for the Ecometer metrics ledger.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `cli`: `serve`, `migrate` and `seed` commands
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers
//! - `telemetry`: Tracing subscriber setup

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod telemetry;
