/// Database models for Ecometer
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts, roles and first-login state
/// - `project`: Projects, created on first use by name
/// - `team`: Teams scoped to a project
/// - `metric`: Append-only ledger of environmental-impact observations
///
/// # Example
///
/// ```no_run
/// use ecometer_shared::models::project::Project;
/// use ecometer_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let project = Project::upsert_by_name(&pool, "image-classification").await?;
/// println!("Project {} has id {}", project.name, project.id);
/// # Ok(())
/// # }
/// ```

pub mod metric;
pub mod project;
pub mod team;
pub mod user;
