/// Storage backends
///
/// The credential store and the metric ledger are traits so the services can
/// run against PostgreSQL in production and against an in-memory store in
/// tests and local development.
///
/// # Backends
///
/// - [`postgres::PgStore`]: sqlx + PostgreSQL, unique constraints enforced by the database
/// - [`memory::MemoryStore`]: process-local maps behind a single lock
///
/// Both backends report unique-constraint violations as [`StoreError::Conflict`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    metric::{MetricRecord, NewMetric, ProjectTotals},
    project::Project,
    team::Team,
    user::{CreateUser, UpdateUser, User},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Default page size for listings
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page a caller may request
pub const MAX_LIMIT: i64 = 1000;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Conflict on {0}")]
    Conflict(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Offset pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip
    pub skip: i64,

    /// Rows to return
    pub limit: i64,
}

impl Page {
    /// Builds a page, applying defaults and clamping to sane bounds
    ///
    /// Negative `skip` becomes 0; `limit` is clamped to `1..=MAX_LIMIT`.
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            skip: skip.unwrap_or(0).max(0),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Persisted user records
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user; `Conflict` when the username or email is taken
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    /// Applies a partial update; None when the user does not exist
    async fn update_user(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError>;

    /// Sets the first password hash and clears `needs_password_setup`
    ///
    /// Check and write are one atomic step. None when the user does not
    /// exist or has already set a password.
    async fn complete_password_setup(
        &self,
        id: Uuid,
        password_hash: String,
    ) -> Result<Option<User>, StoreError>;

    /// Hard delete; false when the user does not exist
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    /// All users, oldest first
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn count_users(&self) -> Result<i64, StoreError>;
}

/// Append-only metric storage with its project and team catalog
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Resolves or creates the project and team, then appends the metric
    ///
    /// All three writes commit together.
    async fn append_metric(&self, data: NewMetric) -> Result<MetricRecord, StoreError>;

    /// Appends a metric with an explicit timestamp (sample data only)
    async fn append_metric_at(
        &self,
        data: NewMetric,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> Result<MetricRecord, StoreError>;

    /// Page of metrics in insertion order
    async fn list_metrics(&self, page: Page) -> Result<Vec<MetricRecord>, StoreError>;

    /// Page of one user's metrics, newest first
    async fn list_metrics_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<MetricRecord>, StoreError>;

    async fn list_projects(&self, page: Page) -> Result<Vec<Project>, StoreError>;

    async fn list_teams(&self, page: Page) -> Result<Vec<Team>, StoreError>;

    /// Per-project sums, largest emitters first
    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError>;

    /// Backend liveness check
    async fn ping(&self) -> Result<(), StoreError>;
}
