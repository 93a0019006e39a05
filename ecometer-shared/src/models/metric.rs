/// Metric model and database operations
///
/// The metrics table is an append-only ledger of environmental-impact
/// observations. There are no update or delete operations; a row is written
/// once at ingestion and read back enriched with its project and team names.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE metrics (
///     id BIGSERIAL PRIMARY KEY,
///     project_id BIGINT NOT NULL REFERENCES projects(id),
///     team_id BIGINT REFERENCES teams(id) ON DELETE SET NULL,
///     user_id UUID REFERENCES users(id) ON DELETE SET NULL,
///     energy_consumed DOUBLE PRECISION NOT NULL CHECK (energy_consumed >= 0),
///     emissions DOUBLE PRECISION NOT NULL CHECK (emissions >= 0),
///     duration DOUBLE PRECISION NOT NULL CHECK (duration >= 0),
///     gpu_energy DOUBLE PRECISION,
///     cpu_energy DOUBLE PRECISION,
///     water_usage DOUBLE PRECISION,
///     environment VARCHAR(64) NOT NULL DEFAULT 'development',
///     timestamp TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Units
///
/// - `energy_consumed`, `gpu_energy`, `cpu_energy`: kWh
/// - `emissions`: kg CO2-equivalent
/// - `duration`: seconds
/// - `water_usage`: liters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::{project::Project, team::Team};

/// Environment label used when the client does not send one
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Project name reported when a metric's project row is missing
pub const UNKNOWN_PROJECT: &str = "Unknown";

const RECORD_SELECT: &str = r#"
    SELECT m.id, m.project_id, m.team_id, m.user_id,
           COALESCE(p.name, 'Unknown') AS project,
           t.name AS team,
           m.energy_consumed, m.emissions, m.duration,
           m.gpu_energy, m.cpu_energy, m.water_usage,
           m.environment, m.timestamp
    FROM metrics m
    LEFT JOIN projects p ON p.id = m.project_id
    LEFT JOIN teams t ON t.id = m.team_id
"#;

/// Stored metric row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Metric {
    /// Ledger sequence number
    pub id: i64,

    /// Owning project
    pub project_id: i64,

    /// Optional team inside the project
    pub team_id: Option<i64>,

    /// User who submitted the observation
    pub user_id: Option<Uuid>,

    /// Energy consumed (kWh)
    pub energy_consumed: f64,

    /// Emissions (kg CO2-eq)
    pub emissions: f64,

    /// Workload duration (seconds)
    pub duration: f64,

    /// GPU share of the energy (kWh)
    pub gpu_energy: Option<f64>,

    /// CPU share of the energy (kWh)
    pub cpu_energy: Option<f64>,

    /// Water usage (liters)
    pub water_usage: Option<f64>,

    /// Free-form environment label
    pub environment: String,

    /// Server-assigned insertion time
    pub timestamp: DateTime<Utc>,
}

/// Input for appending a metric to the ledger
///
/// Project and team are given by name; the ledger resolves or creates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMetric {
    /// Project name (created if unseen)
    pub project: String,

    /// Optional team name (created inside the project if unseen)
    pub team: Option<String>,

    pub energy_consumed: f64,
    pub emissions: f64,
    pub duration: f64,
    pub gpu_energy: Option<f64>,
    pub cpu_energy: Option<f64>,
    pub water_usage: Option<f64>,

    /// Environment label, defaults to "development"
    pub environment: Option<String>,

    /// Submitting user
    pub user_id: Option<Uuid>,
}

impl NewMetric {
    /// Checks the ledger invariants before anything is written
    ///
    /// Returns the offending field name and a message.
    pub fn check(&self) -> Result<(), (&'static str, String)> {
        if self.project.trim().is_empty() {
            return Err(("project", "Project name must not be empty".to_string()));
        }
        if matches!(&self.team, Some(team) if team.trim().is_empty()) {
            return Err(("team", "Team name must not be empty".to_string()));
        }

        let quantities = [
            ("energy_consumed", Some(self.energy_consumed)),
            ("emissions", Some(self.emissions)),
            ("duration", Some(self.duration)),
            ("gpu_energy", self.gpu_energy),
            ("cpu_energy", self.cpu_energy),
            ("water_usage", self.water_usage),
        ];
        for (field, value) in quantities {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err((field, format!("{} must be a non-negative number", field)));
                }
            }
        }

        Ok(())
    }

    /// Environment label with the default applied
    pub fn environment_or_default(&self) -> String {
        match self.environment.as_deref().map(str::trim) {
            Some(env) if !env.is_empty() => env.to_string(),
            _ => DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

/// Metric enriched with its project and team names
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MetricRecord {
    pub id: i64,
    pub project_id: i64,
    pub team_id: Option<i64>,
    pub user_id: Option<Uuid>,

    /// Project name, "Unknown" if the project row is gone
    pub project: String,

    /// Team name, absent when there is no team
    pub team: Option<String>,

    pub energy_consumed: f64,
    pub emissions: f64,
    pub duration: f64,
    pub gpu_energy: Option<f64>,
    pub cpu_energy: Option<f64>,
    pub water_usage: Option<f64>,
    pub environment: String,
    pub timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Builds the enriched view from a stored row and its resolved relations
    pub fn from_parts(metric: Metric, project: Option<&Project>, team: Option<&Team>) -> Self {
        Self {
            id: metric.id,
            project_id: metric.project_id,
            team_id: metric.team_id,
            user_id: metric.user_id,
            project: project
                .map(|p| p.name.clone())
                .unwrap_or_else(|| UNKNOWN_PROJECT.to_string()),
            team: team.map(|t| t.name.clone()),
            energy_consumed: metric.energy_consumed,
            emissions: metric.emissions,
            duration: metric.duration,
            gpu_energy: metric.gpu_energy,
            cpu_energy: metric.cpu_energy,
            water_usage: metric.water_usage,
            environment: metric.environment,
            timestamp: metric.timestamp,
        }
    }
}

/// Per-project aggregate over the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectTotals {
    pub project_id: i64,
    pub project: String,
    pub metric_count: i64,
    pub total_energy: f64,
    pub total_emissions: f64,
    pub total_duration: f64,
    pub total_water_usage: f64,
}

impl Metric {
    /// Appends a metric row
    ///
    /// `timestamp` is an optional backdate used only by sample data
    /// generation; ingestion always passes None so the database clock wins.
    pub async fn insert<'e, E>(
        executor: E,
        data: &NewMetric,
        project_id: i64,
        team_id: Option<i64>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let metric = sqlx::query_as::<_, Metric>(
            r#"
            INSERT INTO metrics (project_id, team_id, user_id, energy_consumed, emissions,
                                 duration, gpu_energy, cpu_energy, water_usage, environment,
                                 timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, COALESCE($11, NOW()))
            RETURNING id, project_id, team_id, user_id, energy_consumed, emissions, duration,
                      gpu_energy, cpu_energy, water_usage, environment, timestamp
            "#,
        )
        .bind(project_id)
        .bind(team_id)
        .bind(data.user_id)
        .bind(data.energy_consumed)
        .bind(data.emissions)
        .bind(data.duration)
        .bind(data.gpu_energy)
        .bind(data.cpu_energy)
        .bind(data.water_usage)
        .bind(data.environment_or_default())
        .bind(timestamp)
        .fetch_one(executor)
        .await?;

        Ok(metric)
    }

    /// Lists enriched metrics in insertion order
    pub async fn list_records(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MetricRecord>, sqlx::Error> {
        let query = format!("{RECORD_SELECT} ORDER BY m.id ASC LIMIT $1 OFFSET $2");

        let records = sqlx::query_as::<_, MetricRecord>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(records)
    }

    /// Lists one user's enriched metrics, newest first
    pub async fn list_records_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MetricRecord>, sqlx::Error> {
        let query = format!(
            "{RECORD_SELECT} WHERE m.user_id = $1 ORDER BY m.timestamp DESC, m.id DESC LIMIT $2 OFFSET $3"
        );

        let records = sqlx::query_as::<_, MetricRecord>(&query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;

        Ok(records)
    }

    /// Sums the ledger per project, largest emitters first
    pub async fn totals_by_project(pool: &PgPool) -> Result<Vec<ProjectTotals>, sqlx::Error> {
        let totals = sqlx::query_as::<_, ProjectTotals>(
            r#"
            SELECT m.project_id,
                   COALESCE(p.name, 'Unknown') AS project,
                   COUNT(*) AS metric_count,
                   COALESCE(SUM(m.energy_consumed), 0) AS total_energy,
                   COALESCE(SUM(m.emissions), 0) AS total_emissions,
                   COALESCE(SUM(m.duration), 0) AS total_duration,
                   COALESCE(SUM(m.water_usage), 0) AS total_water_usage
            FROM metrics m
            LEFT JOIN projects p ON p.id = m.project_id
            GROUP BY m.project_id, p.name
            ORDER BY total_emissions DESC, m.project_id ASC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(totals)
    }

    /// Counts ledger rows
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM metrics")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}
