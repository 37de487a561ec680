//! Application state wiring services to their SQLite implementations.

use std::path::Path;
use std::sync::Arc;

use formflow_core::service::workflow::WorkflowService;
use formflow_infra::filesystem::ensure_data_dir;
use formflow_infra::sqlite::pool::{DatabasePool, database_url};
use formflow_infra::sqlite::question::SqliteQuestionRepository;
use formflow_infra::sqlite::workflow::SqliteWorkflowVersionRepository;
use formflow_types::config::GlobalConfig;

pub type ConcreteWorkflowService =
    WorkflowService<SqliteWorkflowVersionRepository, SqliteQuestionRepository>;

/// Shared state for CLI command handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow_service: Arc<ConcreteWorkflowService>,
    /// Direct handle for question registration, which has no service of its own.
    pub question_repo: Arc<SqliteQuestionRepository>,
}

impl AppState {
    /// Connect to the database and wire services.
    pub async fn init(data_dir: &Path, config: &GlobalConfig) -> anyhow::Result<Self> {
        ensure_data_dir(data_dir).await?;

        let db_pool = DatabasePool::new(&database_url(data_dir, config)).await?;

        let workflow_service = WorkflowService::new(
            SqliteWorkflowVersionRepository::new(db_pool.clone()),
            SqliteQuestionRepository::new(db_pool.clone()),
        );

        tracing::debug!(data_dir = %data_dir.display(), "application state ready");

        Ok(Self {
            workflow_service: Arc::new(workflow_service),
            question_repo: Arc::new(SqliteQuestionRepository::new(db_pool)),
        })
    }
}
