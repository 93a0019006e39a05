/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Banner and health check
/// - `auth`: Login, registration, password setup and user management
/// - `metrics`: Metric ingestion, listing and sample data
/// - `projects`: Project and team listings
/// - `insights`: Aggregate totals

pub mod auth;
pub mod health;
pub mod insights;
pub mod metrics;
pub mod projects;

use ecometer_shared::store::Page;
use serde::Deserialize;

/// `?skip=&limit=` query parameters
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.skip, self.limit)
    }
}
