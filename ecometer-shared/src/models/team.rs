/// Team model and database operations
///
/// A team is an optional sub-grouping inside one project. Team names are
/// unique per project, so "research" under two projects is two teams.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE teams (
///     id BIGSERIAL PRIMARY KEY,
///     name VARCHAR(255) NOT NULL,
///     project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (name, project_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

/// Team scoped to a project
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Team {
    /// Sequential team ID
    pub id: i64,

    /// Team name, unique within its project
    pub name: String,

    /// Owning project
    pub project_id: i64,

    /// When the team was first seen
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// Returns the team with this name inside `project_id`, creating it when absent
    pub async fn upsert<'e, E>(executor: E, project_id: i64, name: &str) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let team = sqlx::query_as::<_, Team>(
            r#"
            INSERT INTO teams (name, project_id)
            VALUES ($1, $2)
            ON CONFLICT (name, project_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, project_id, created_at
            "#,
        )
        .bind(name)
        .bind(project_id)
        .fetch_one(executor)
        .await?;

        Ok(team)
    }

    /// Lists teams in creation order with pagination
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let teams = sqlx::query_as::<_, Team>(
            r#"
            SELECT id, name, project_id, created_at
            FROM teams
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(teams)
    }
}
