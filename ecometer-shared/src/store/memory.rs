/// In-memory storage backend
///
/// Keeps every table in process memory behind one `tokio::sync::RwLock`.
/// Used by the test suites and by `STORAGE=memory` development runs. The
/// unique constraints of the SQL schema (username, email, project name,
/// team name per project) are enforced under the write lock, so the
/// semantics match the PostgreSQL backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{MetricStore, Page, StoreError, UserStore};
use crate::models::{
    metric::{Metric, MetricRecord, NewMetric, ProjectTotals},
    project::Project,
    team::Team,
    user::{CreateUser, UpdateUser, User},
};

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    projects: Vec<Project>,
    teams: Vec<Team>,
    metrics: Vec<Metric>,
    next_project_id: i64,
    next_team_id: i64,
    next_metric_id: i64,
}

impl Tables {
    fn username_taken(&self, username: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.username == username && Some(u.id) != except)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email.as_deref() == Some(email) && Some(u.id) != except)
    }

    fn upsert_project(&mut self, name: &str) -> Project {
        if let Some(project) = self.projects.iter().find(|p| p.name == name) {
            return project.clone();
        }

        self.next_project_id += 1;
        let now = Utc::now();
        let project = Project {
            id: self.next_project_id,
            name: name.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        self.projects.push(project.clone());
        project
    }

    fn upsert_team(&mut self, project_id: i64, name: &str) -> Team {
        if let Some(team) = self
            .teams
            .iter()
            .find(|t| t.project_id == project_id && t.name == name)
        {
            return team.clone();
        }

        self.next_team_id += 1;
        let team = Team {
            id: self.next_team_id,
            name: name.to_string(),
            project_id,
            created_at: Utc::now(),
        };
        self.teams.push(team.clone());
        team
    }

    fn enrich(&self, metric: &Metric) -> MetricRecord {
        let project = self.projects.iter().find(|p| p.id == metric.project_id);
        let team = metric
            .team_id
            .and_then(|id| self.teams.iter().find(|t| t.id == id));
        MetricRecord::from_parts(metric.clone(), project, team)
    }
}

fn window<T: Clone>(rows: impl Iterator<Item = T>, page: Page) -> Vec<T> {
    rows.skip(page.skip as usize).take(page.limit as usize).collect()
}

/// Store that lives entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    async fn append(
        &self,
        data: NewMetric,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<MetricRecord, StoreError> {
        let mut tables = self.tables.write().await;

        let project = tables.upsert_project(data.project.trim());
        let team = data
            .team
            .as_deref()
            .map(str::trim)
            .map(|name| tables.upsert_team(project.id, name));

        tables.next_metric_id += 1;
        let metric = Metric {
            id: tables.next_metric_id,
            project_id: project.id,
            team_id: team.as_ref().map(|t| t.id),
            user_id: data.user_id,
            energy_consumed: data.energy_consumed,
            emissions: data.emissions,
            duration: data.duration,
            gpu_energy: data.gpu_energy,
            cpu_energy: data.cpu_energy,
            water_usage: data.water_usage,
            environment: data.environment_or_default(),
            timestamp: timestamp.unwrap_or_else(Utc::now),
        };
        tables.metrics.push(metric.clone());

        Ok(MetricRecord::from_parts(metric, Some(&project), team.as_ref()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.username_taken(&data.username, None) {
            return Err(StoreError::Conflict("users_username_key".to_string()));
        }
        if let Some(email) = data.email.as_deref() {
            if tables.email_taken(email, None) {
                return Err(StoreError::Conflict("users_email_key".to_string()));
            }
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: data.username,
            email: data.email,
            full_name: data.full_name,
            password_hash: data.password_hash,
            role: data.role,
            is_active: data.is_active,
            needs_password_setup: data.needs_password_setup,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());

        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;

        if let Some(username) = data.username.as_deref() {
            if tables.username_taken(username, Some(id)) {
                return Err(StoreError::Conflict("users_username_key".to_string()));
            }
        }
        if let Some(email) = data.email.as_deref() {
            if tables.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("users_email_key".to_string()));
            }
        }

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        data.apply_to(user);

        Ok(Some(user.clone()))
    }

    async fn complete_password_setup(
        &self,
        id: Uuid,
        password_hash: String,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;

        let Some(user) = tables
            .users
            .iter_mut()
            .find(|u| u.id == id && u.needs_password_setup)
        else {
            return Ok(None);
        };

        user.password_hash = Some(password_hash);
        user.needs_password_setup = false;
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;

        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        let deleted = tables.users.len() < before;

        if deleted {
            // ON DELETE SET NULL
            for metric in tables.metrics.iter_mut().filter(|m| m.user_id == Some(id)) {
                metric.user_id = None;
            }
        }

        Ok(deleted)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.clone())
    }

    async fn count_users(&self) -> Result<i64, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.len() as i64)
    }
}

#[async_trait]
impl MetricStore for MemoryStore {
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
        let tables = self.tables.read().await;
        Ok(window(tables.metrics.iter().map(|m| tables.enrich(m)), page))
    }

    async fn list_metrics_for_user(
        &self,
        user_id: Uuid,
        page: Page,
    ) -> Result<Vec<MetricRecord>, StoreError> {
        let tables = self.tables.read().await;

        let mut owned: Vec<&Metric> = tables
            .metrics
            .iter()
            .filter(|m| m.user_id == Some(user_id))
            .collect();
        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));

        Ok(window(owned.into_iter().map(|m| tables.enrich(m)), page))
    }

    async fn list_projects(&self, page: Page) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.read().await;
        Ok(window(tables.projects.iter().cloned(), page))
    }

    async fn list_teams(&self, page: Page) -> Result<Vec<Team>, StoreError> {
        let tables = self.tables.read().await;
        Ok(window(tables.teams.iter().cloned(), page))
    }

    async fn project_totals(&self) -> Result<Vec<ProjectTotals>, StoreError> {
        let tables = self.tables.read().await;

        let mut totals: BTreeMap<i64, ProjectTotals> = BTreeMap::new();
        for metric in &tables.metrics {
            let entry = totals.entry(metric.project_id).or_insert_with(|| ProjectTotals {
                project_id: metric.project_id,
                project: tables.enrich(metric).project,
                metric_count: 0,
                total_energy: 0.0,
                total_emissions: 0.0,
                total_duration: 0.0,
                total_water_usage: 0.0,
            });
            entry.metric_count += 1;
            entry.total_energy += metric.energy_consumed;
            entry.total_emissions += metric.emissions;
            entry.total_duration += metric.duration;
            entry.total_water_usage += metric.water_usage.unwrap_or(0.0);
        }

        let mut totals: Vec<ProjectTotals> = totals.into_values().collect();
        totals.sort_by(|a, b| {
            b.total_emissions
                .total_cmp(&a.total_emissions)
                .then(a.project_id.cmp(&b.project_id))
        });

        Ok(totals)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn candidate(username: &str, email: Option<&str>) -> CreateUser {
        CreateUser {
            username: username.to_string(),
            email: email.map(str::to_string),
            full_name: "Test User".to_string(),
            password_hash: None,
            role: Role::Viewer,
            is_active: true,
            needs_password_setup: true,
        }
    }

    fn observation(project: &str, team: Option<&str>, user_id: Option<Uuid>) -> NewMetric {
        NewMetric {
            project: project.to_string(),
            team: team.map(str::to_string),
            energy_consumed: 2.0,
            emissions: 1.0,
            duration: 60.0,
            gpu_energy: None,
            cpu_energy: None,
            water_usage: Some(0.5),
            environment: None,
            user_id,
        }
    }

    #[tokio::test]
    async fn test_complete_password_setup_only_once() {
        let store = MemoryStore::new();
        let user = store.create_user(candidate("setup", None)).await.unwrap();

        let done = store
            .complete_password_setup(user.id, "hash-one".to_string())
            .await
            .unwrap()
            .expect("first setup applies");
        assert!(!done.needs_password_setup);
        assert_eq!(done.password_hash.as_deref(), Some("hash-one"));

        assert!(store
            .complete_password_setup(user.id, "hash-two".to_string())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .complete_password_setup(Uuid::new_v4(), "hash".to_string())
            .await
            .unwrap()
            .is_none());

        let stored = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash.as_deref(), Some("hash-one"));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(candidate("alice", None)).await.unwrap();

        let result = store.create_user(candidate("alice", None)).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_but_missing_email_does_not() {
        let store = MemoryStore::new();
        store
            .create_user(candidate("alice", Some("a@example.com")))
            .await
            .unwrap();

        let result = store.create_user(candidate("bob", Some("a@example.com"))).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        store.create_user(candidate("carol", None)).await.unwrap();
        store.create_user(candidate("dave", None)).await.unwrap();
        assert_eq!(store.count_users().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_to_taken_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(candidate("alice", None)).await.unwrap();
        let bob = store.create_user(candidate("bob", None)).await.unwrap();

        let result = store
            .update_user(
                bob.id,
                UpdateUser {
                    username: Some("alice".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));

        // Renaming to its own name is fine
        let renamed = store
            .update_user(
                bob.id,
                UpdateUser {
                    username: Some("bob".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(renamed.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_user_returns_none() {
        let store = MemoryStore::new();
        let result = store
            .update_user(Uuid::new_v4(), UpdateUser::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_project_and_team_upserted_once() {
        let store = MemoryStore::new();

        let first = store
            .append_metric(observation("nlp-model", Some("research"), None))
            .await
            .unwrap();
        let second = store
            .append_metric(observation("nlp-model", Some("research"), None))
            .await
            .unwrap();

        assert_eq!(first.project_id, second.project_id);
        assert_eq!(first.team_id, second.team_id);
        assert_eq!(store.list_projects(Page::default()).await.unwrap().len(), 1);
        assert_eq!(store.list_teams(Page::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_team_name_in_two_projects_is_two_teams() {
        let store = MemoryStore::new();
        store
            .append_metric(observation("a", Some("research"), None))
            .await
            .unwrap();
        store
            .append_metric(observation("b", Some("research"), None))
            .await
            .unwrap();

        assert_eq!(store.list_teams(Page::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_deleting_user_keeps_metrics() {
        let store = MemoryStore::new();
        let user = store.create_user(candidate("alice", None)).await.unwrap();
        store
            .append_metric(observation("p", None, Some(user.id)))
            .await
            .unwrap();

        assert!(store.delete_user(user.id).await.unwrap());
        assert!(!store.delete_user(user.id).await.unwrap());

        let metrics = store.list_metrics(Page::default()).await.unwrap();
        assert_eq!(metrics.len(), 1);
        assert!(metrics[0].user_id.is_none());
    }

    #[tokio::test]
    async fn test_user_listing_is_newest_first() {
        let store = MemoryStore::new();
        let user = store.create_user(candidate("alice", None)).await.unwrap();
        let older = Utc::now() - chrono::Duration::hours(2);

        store
            .append_metric_at(observation("old", None, Some(user.id)), older)
            .await
            .unwrap();
        store
            .append_metric(observation("new", None, Some(user.id)))
            .await
            .unwrap();
        store.append_metric(observation("other", None, None)).await.unwrap();

        let mine = store
            .list_metrics_for_user(user.id, Page::default())
            .await
            .unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].project, "new");
        assert_eq!(mine[1].project, "old");
    }

    #[tokio::test]
    async fn test_project_totals() {
        let store = MemoryStore::new();
        store.append_metric(observation("a", None, None)).await.unwrap();
        store.append_metric(observation("a", None, None)).await.unwrap();
        store.append_metric(observation("b", None, None)).await.unwrap();

        let totals = store.project_totals().await.unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].project, "a");
        assert_eq!(totals[0].metric_count, 2);
        assert!((totals[0].total_energy - 4.0).abs() < f64::EPSILON);
        assert!((totals[0].total_water_usage - 1.0).abs() < f64::EPSILON);
        assert_eq!(totals[1].metric_count, 1);
    }
}
