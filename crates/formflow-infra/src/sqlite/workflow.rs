//! SQLite workflow version repository.
//!
//! Each version row stores its graph as a JSON array of nodes. Every mutation
//! runs in a writer transaction so that version numbering and the
//! single-active-version rule hold under concurrent editors.

use chrono::{DateTime, Utc};
use formflow_core::repository::workflow::WorkflowVersionRepository;
use formflow_types::error::RepositoryError;
use formflow_types::form::FormId;
use formflow_types::workflow::{Node, WorkflowVersion};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowVersionRepository`.
pub struct SqliteWorkflowVersionRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowVersionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct VersionRow {
    id: String,
    form_id: String,
    version: i64,
    nodes: String,
    is_active: bool,
    last_editor: String,
    created_at: String,
    updated_at: String,
}

impl VersionRow {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            form_id: row.try_get("form_id")?,
            version: row.try_get("version")?,
            nodes: row.try_get("nodes")?,
            is_active: row.try_get("is_active")?,
            last_editor: row.try_get("last_editor")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_version(self) -> Result<WorkflowVersion, RepositoryError> {
        let nodes: Vec<Node> = serde_json::from_str(&self.nodes)
            .map_err(|e| RepositoryError::Query(format!("invalid workflow nodes JSON: {e}")))?;
        let version = u32::try_from(self.version)
            .map_err(|_| RepositoryError::Query(format!("invalid version number: {}", self.version)))?;

        Ok(WorkflowVersion {
            id: parse_uuid(&self.id)?,
            form_id: self
                .form_id
                .parse::<FormId>()
                .map_err(|e| RepositoryError::Query(format!("invalid form id: {e}")))?,
            version,
            nodes,
            is_active: self.is_active,
            last_editor: parse_uuid(&self.last_editor)?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// Latest row of a form as seen inside a transaction.
struct LatestRow {
    id: String,
    version: i64,
    is_active: bool,
}

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn encode_nodes(nodes: &[Node]) -> Result<String, RepositoryError> {
    serde_json::to_string(nodes)
        .map_err(|e| RepositoryError::Query(format!("failed to encode nodes: {e}")))
}

fn map_err(e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            RepositoryError::Connection
        }
        sqlx::Error::Database(ref db_err) if db_err.message().contains("UNIQUE") => {
            RepositoryError::Conflict(db_err.message().to_string())
        }
        other => RepositoryError::Query(other.to_string()),
    }
}

fn rows_to_versions(rows: &[SqliteRow]) -> Result<Vec<WorkflowVersion>, RepositoryError> {
    rows.iter()
        .map(|row| {
            VersionRow::from_row(row)
                .map_err(map_err)?
                .into_version()
        })
        .collect()
}

async fn latest_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    form_id: &FormId,
) -> Result<Option<LatestRow>, RepositoryError> {
    let row = sqlx::query(
        "SELECT id, version, is_active FROM workflow_versions
         WHERE form_id = ? ORDER BY version DESC LIMIT 1",
    )
    .bind(form_id.to_string())
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_err)?;

    row.map(|row| -> Result<LatestRow, sqlx::Error> {
        Ok(LatestRow {
            id: row.try_get("id")?,
            version: row.try_get("version")?,
            is_active: row.try_get("is_active")?,
        })
    })
    .transpose()
    .map_err(map_err)
}

async fn insert_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    form_id: &FormId,
    version: i64,
    nodes: &str,
    is_active: bool,
    editor: &Uuid,
) -> Result<String, RepositoryError> {
    let id = Uuid::now_v7().to_string();
    let now = format_datetime(&Utc::now());
    sqlx::query(
        "INSERT INTO workflow_versions
            (id, form_id, version, nodes, is_active, last_editor, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(form_id.to_string())
    .bind(version)
    .bind(nodes)
    .bind(is_active)
    .bind(editor.to_string())
    .bind(&now)
    .bind(&now)
    .execute(&mut **tx)
    .await
    .map_err(map_err)?;
    Ok(id)
}

async fn fetch_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    id: &str,
) -> Result<WorkflowVersion, RepositoryError> {
    let row = sqlx::query("SELECT * FROM workflow_versions WHERE id = ?")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(map_err)?;
    VersionRow::from_row(&row).map_err(map_err)?.into_version()
}

impl WorkflowVersionRepository for SqliteWorkflowVersionRepository {
    async fn get_latest(&self, form_id: &FormId) -> Result<Option<WorkflowVersion>, RepositoryError> {
        let row = sqlx::query(
            "SELECT * FROM workflow_versions WHERE form_id = ? ORDER BY version DESC LIMIT 1",
        )
        .bind(form_id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_err)?;

        match row {
            Some(row) => Ok(Some(VersionRow::from_row(&row).map_err(map_err)?.into_version()?)),
            None => Ok(None),
        }
    }

    async fn get_active(&self, form_id: &FormId) -> Result<Option<WorkflowVersion>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM workflow_versions WHERE form_id = ? AND is_active = 1")
            .bind(form_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(map_err)?;

        match row {
            Some(row) => Ok(Some(VersionRow::from_row(&row).map_err(map_err)?.into_version()?)),
            None => Ok(None),
        }
    }

    async fn list_versions(&self, form_id: &FormId) -> Result<Vec<WorkflowVersion>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM workflow_versions WHERE form_id = ? ORDER BY version DESC")
            .bind(form_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_err)?;
        rows_to_versions(&rows)
    }

    async fn save_draft(
        &self,
        form_id: &FormId,
        nodes: &[Node],
        editor: &Uuid,
    ) -> Result<WorkflowVersion, RepositoryError> {
        let encoded = encode_nodes(nodes)?;
        let mut tx = self.pool.writer.begin().await.map_err(map_err)?;

        let id = match latest_in_tx(&mut tx, form_id).await? {
            Some(latest) if latest.is_active => {
                return Err(RepositoryError::Conflict(format!(
                    "version {} of form {form_id} is active and cannot be overwritten",
                    latest.version
                )));
            }
            Some(latest) => {
                sqlx::query(
                    "UPDATE workflow_versions SET nodes = ?, last_editor = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(&encoded)
                .bind(editor.to_string())
                .bind(format_datetime(&Utc::now()))
                .bind(&latest.id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
                latest.id
            }
            None => insert_in_tx(&mut tx, form_id, 1, &encoded, false, editor).await?,
        };

        let saved = fetch_in_tx(&mut tx, &id).await?;
        tx.commit().await.map_err(map_err)?;
        Ok(saved)
    }

    async fn fork_draft(
        &self,
        form_id: &FormId,
        nodes: &[Node],
        editor: &Uuid,
    ) -> Result<WorkflowVersion, RepositoryError> {
        let encoded = encode_nodes(nodes)?;
        let mut tx = self.pool.writer.begin().await.map_err(map_err)?;

        let next = latest_in_tx(&mut tx, form_id)
            .await?
            .map_or(1, |latest| latest.version + 1);
        let id = insert_in_tx(&mut tx, form_id, next, &encoded, false, editor).await?;

        let forked = fetch_in_tx(&mut tx, &id).await?;
        tx.commit().await.map_err(map_err)?;
        Ok(forked)
    }

    async fn activate(
        &self,
        form_id: &FormId,
        nodes: &[Node],
        editor: &Uuid,
    ) -> Result<WorkflowVersion, RepositoryError> {
        let encoded = encode_nodes(nodes)?;
        let mut tx = self.pool.writer.begin().await.map_err(map_err)?;
        let latest = latest_in_tx(&mut tx, form_id).await?;

        sqlx::query("UPDATE workflow_versions SET is_active = 0 WHERE form_id = ? AND is_active = 1")
            .bind(form_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        let id = match latest {
            Some(latest) if !latest.is_active => {
                sqlx::query(
                    "UPDATE workflow_versions
                     SET nodes = ?, is_active = 1, last_editor = ?, updated_at = ?
                     WHERE id = ?",
                )
                .bind(&encoded)
                .bind(editor.to_string())
                .bind(format_datetime(&Utc::now()))
                .bind(&latest.id)
                .execute(&mut *tx)
                .await
                .map_err(map_err)?;
                latest.id
            }
            Some(latest) => {
                insert_in_tx(&mut tx, form_id, latest.version + 1, &encoded, true, editor).await?
            }
            None => insert_in_tx(&mut tx, form_id, 1, &encoded, true, editor).await?,
        };

        let activated = fetch_in_tx(&mut tx, &id).await?;
        tx.commit().await.map_err(map_err)?;
        Ok(activated)
    }
}
