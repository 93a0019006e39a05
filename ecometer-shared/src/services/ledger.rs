/// Metric ledger service
///
/// Validates observations, stamps them with their owner and appends them
/// through [`MetricStore`]. Reads are paginated and enriched with project
/// and team names by the store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{seq::SliceRandom, Rng};
use serde::Serialize;
use tracing::info;

use super::ServiceError;
use crate::auth::{
    authorization::{authorize, USER_MANAGERS},
    guard::Principal,
};
use crate::models::{
    metric::{MetricRecord, NewMetric, ProjectTotals},
    project::Project,
    team::Team,
};
use crate::store::{MetricStore, Page};

/// Number of metrics produced by one sample-data request
pub const SAMPLE_BATCH: usize = 50;

/// Emission factor used for sample data (kg CO2-eq per kWh)
const SAMPLE_EMISSION_FACTOR: f64 = 0.5;

const SAMPLE_PROJECTS: [&str; 4] = [
    "image-classification",
    "nlp-model",
    "recommendation-system",
    "computer-vision",
];

const SAMPLE_ENVIRONMENTS: [&str; 3] = ["development", "production", "staging"];

/// Ledger-wide aggregates
#[derive(Debug, Clone, Serialize)]
pub struct Insights {
    pub metric_count: i64,
    pub total_energy: f64,
    pub total_emissions: f64,
    pub total_water_usage: f64,

    /// Per-project totals, largest emitters first
    pub projects: Vec<ProjectTotals>,
}

impl Insights {
    fn from_totals(projects: Vec<ProjectTotals>) -> Self {
        Self {
            metric_count: projects.iter().map(|p| p.metric_count).sum(),
            total_energy: projects.iter().map(|p| p.total_energy).sum(),
            total_emissions: projects.iter().map(|p| p.total_emissions).sum(),
            total_water_usage: projects.iter().map(|p| p.total_water_usage).sum(),
            projects,
        }
    }
}

/// Append-only metric ledger with read views
#[derive(Clone)]
pub struct LedgerService {
    metrics: Arc<dyn MetricStore>,
}

impl LedgerService {
    pub fn new(metrics: Arc<dyn MetricStore>) -> Self {
        Self { metrics }
    }

    /// Appends an observation owned by `owner`
    ///
    /// The project (and team, when named) is created on first use.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for blank names or negative quantities
    pub async fn ingest(&self, owner: &Principal, mut observation: NewMetric) -> Result<MetricRecord, ServiceError> {
        observation
            .check()
            .map_err(|(field, message)| ServiceError::InvalidInput {
                field: field.to_string(),
                message,
            })?;

        observation.user_id = Some(owner.id());

        let record = self.metrics.append_metric(observation).await?;

        info!(
            metric_id = record.id,
            project_id = record.project_id,
            user_id = %owner.id(),
            "Ingested metric"
        );

        Ok(record)
    }

    /// Page of all metrics in insertion order
    pub async fn list(&self, page: Page) -> Result<Vec<MetricRecord>, ServiceError> {
        Ok(self.metrics.list_metrics(page).await?)
    }

    /// Page of the caller's own metrics, newest first
    pub async fn list_for_user(&self, owner: &Principal, page: Page) -> Result<Vec<MetricRecord>, ServiceError> {
        Ok(self.metrics.list_metrics_for_user(owner.id(), page).await?)
    }

    pub async fn projects(&self, page: Page) -> Result<Vec<Project>, ServiceError> {
        Ok(self.metrics.list_projects(page).await?)
    }

    pub async fn teams(&self, page: Page) -> Result<Vec<Team>, ServiceError> {
        Ok(self.metrics.list_teams(page).await?)
    }

    /// Totals per project plus ledger-wide sums
    pub async fn insights(&self) -> Result<Insights, ServiceError> {
        let totals = self.metrics.project_totals().await?;
        Ok(Insights::from_totals(totals))
    }

    /// Appends `count` random metrics owned by `owner`
    ///
    /// Admins and developers only, unlike ingestion which any active user may do.
    ///
    /// Timestamps are spread over the last 30 days. Returns the number of
    /// metrics written.
    pub async fn generate_sample_data(&self, owner: &Principal, count: usize) -> Result<usize, ServiceError> {
        authorize(owner, USER_MANAGERS)?;

        let samples = sample_metrics(owner, count, Utc::now());
        for (observation, timestamp) in samples {
            self.metrics.append_metric_at(observation, timestamp).await?;
        }

        info!(user_id = %owner.id(), count, "Generated sample metrics");

        Ok(count)
    }

    /// Store liveness, for health checks
    pub async fn ping(&self) -> Result<(), ServiceError> {
        Ok(self.metrics.ping().await?)
    }
}

/// Builds random observations; kept synchronous so the RNG never crosses an await
fn sample_metrics(owner: &Principal, count: usize, now: DateTime<Utc>) -> Vec<(NewMetric, DateTime<Utc>)> {
    let mut rng = rand::thread_rng();

    (0..count)
        .map(|_| {
            let age = Duration::days(rng.gen_range(0..=30))
                + Duration::hours(rng.gen_range(0..=23))
                + Duration::minutes(rng.gen_range(0..=59));

            let energy_consumed = round6(rng.gen_range(0.1..=10.0));
            let gpu_share: f64 = rng.gen_range(0.6..=0.9);

            let observation = NewMetric {
                project: SAMPLE_PROJECTS
                    .choose(&mut rng)
                    .copied()
                    .unwrap_or(SAMPLE_PROJECTS[0])
                    .to_string(),
                team: None,
                energy_consumed,
                emissions: round6(energy_consumed * SAMPLE_EMISSION_FACTOR),
                duration: f64::from(rng.gen_range(1..=3600u32)),
                gpu_energy: Some(round6(energy_consumed * gpu_share)),
                cpu_energy: Some(round6(energy_consumed * (1.0 - gpu_share))),
                water_usage: Some(round6(rng.gen_range(0.1..=5.0))),
                environment: SAMPLE_ENVIRONMENTS
                    .choose(&mut rng)
                    .map(|env| env.to_string()),
                user_id: Some(owner.id()),
            };

            (observation, now - age)
        })
        .collect()
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}
