/// PostgreSQL storage backend
///
/// Delegates to the model-level queries in [`crate::models`] and maps
/// unique-constraint violations (SQLSTATE 23505) to [`StoreError::Conflict`].
/// Uniqueness of usernames, emails, project names and team names is left to
/// the database constraints, so concurrent duplicates resolve to exactly one
/// winner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::{MetricStore, Page, StoreError, UserStore};
use crate::models::{
    metric::{Metric, MetricRecord, NewMetric, ProjectTotals},
    project::Project,
    team::Team,
    user::{CreateUser, UpdateUser, User},
};

const UNIQUE_VIOLATION: &str = "23505";

/// Store backed by a sqlx PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Underlying pool, for migrations and health checks
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn append(
        &self,
        data: NewMetric,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<MetricRecord, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let project = Project::upsert_by_name(&mut *tx, data.project.trim())
            .await
            .map_err(map_db_error)?;

        let team = match data.team.as_deref().map(str::trim) {
            Some(name) => Some(
                Team::upsert(&mut *tx, project.id, name)
                    .await
                    .map_err(map_db_error)?,
            ),
            None => None,
        };

        let metric = Metric::insert(
            &mut *tx,
            &data,
            project.id,
            team.as_ref().map(|t| t.id),
            timestamp,
        )
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        debug!(
            metric_id = metric.id,
            project_id = project.id,
            team_id = ?team.as_ref().map(|t| t.id),
            "Appended metric"
        );

        Ok(MetricRecord::from_parts(metric, Some(&project), team.as_ref()))
    }
}

/// Converts a sqlx error, turning unique violations into `Conflict`
pub fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let constraint = db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| "unique constraint".to_string());
            return StoreError::Conflict(constraint);
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        User::create(&self.pool, data).await.map_err(map_db_error)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        User::find_by_id(&self.pool, id).await.map_err(map_db_error)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        User::find_by_username(&self.pool, username)
            .await
            .map_err(map_db_error)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        User::find_by_email(&self.pool, email).await.map_err(map_db_error)
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError> {
        User::update(&self.pool, id, data).await.map_err(map_db_error)
    }

    async fn complete_password_setup(
        &self,
        id: Uuid,
        password_hash: String,
    ) -> Result<Option<User>, StoreError> {
        User::complete_password_setup(&self.pool, id, &password_hash)
            .await
            .map_err(map_db_error)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        User::delete(&self.pool, id).await.map_err(map_db_error)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        User::list(&self.pool).await.map_err(map_db_error)
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        User::count(&self.pool).await.map_err(map_db_error)
    }
}

#[async_trait]
impl MetricStore for PgStore {
    async fn append_metric(&self, data: NewMetric) -> Result<MetricRecord, StoreError> {
        self.append(data, None).await
    }

    async fn append_metric_at(
        &self,
        data: NewMetric,
        timestamp: DateTime<Utc>,
    ) -> Result<MetricRecord, StoreError> {
        self.append(data, Some(timestamp)).await
    }

    async fn list_metrics(&self, page: Page) -> Result<Vec<MetricRecord>, StoreError> {
        Metric::list_records(&self.pool, page.limit, page.skip)
            .await
            .map_err(map_db_error)
    }

    async fn list_metrics_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<MetricRecord>, StoreError> {
        Metric::list_records_for_user(&self.pool, user_id, page.limit, page.skip)
            .await
            .map_err(map_db_error)
    }

    async fn list_projects(&self, page: Page) -> Result<Vec<Project>, StoreError> {
        Project::list(&self.pool, page.limit, page.skip)
            .await
            .map_err(map_db_error)
    }

    async fn list_teams(&self, page: Page) -> Result<Vec<Team>, StoreError> {
        Team::list(&self.pool, page.limit, page.skip)
            .await
            .map_err(map_db_error)
    }

    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError> {
        Metric::totals_by_project(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool)
            .await
            .map_err(StoreError::Database)
    }
}
