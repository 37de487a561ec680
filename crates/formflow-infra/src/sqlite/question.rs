//! SQLite question store.
//!
//! Holds the narrow question view workflow validation resolves rule keys
//! against. The CLI uses `create` to register questions for a form.

use chrono::Utc;
use formflow_core::repository::question::QuestionResolver;
use formflow_types::error::RepositoryError;
use formflow_types::form::FormId;
use formflow_types::question::{AnswerableRef, QuestionKind};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `QuestionResolver`.
pub struct SqliteQuestionRepository {
    pool: DatabasePool,
}

impl SqliteQuestionRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Store a question. Fails with `Conflict` if the id is taken.
    pub async fn create(&self, question: &AnswerableRef) -> Result<(), RepositoryError> {
        let choice_ids = serde_json::to_string(&question.choice_ids)
            .map_err(|e| RepositoryError::Query(format!("failed to encode choice ids: {e}")))?;

        sqlx::query(
            "INSERT INTO questions (id, form_id, section_id, kind, choice_ids, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(question.id.to_string())
        .bind(question.form_id.to_string())
        .bind(question.section_id.as_deref())
        .bind(question.kind.as_str())
        .bind(choice_ids)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e {
                if db_err.message().contains("UNIQUE") {
                    return RepositoryError::Conflict(format!(
                        "question {} already exists",
                        question.id
                    ));
                }
            }
            RepositoryError::Query(e.to_string())
        })?;

        tracing::debug!(question_id = %question.id, form_id = %question.form_id, "question stored");
        Ok(())
    }
}

fn row_to_question(row: &SqliteRow) -> Result<AnswerableRef, RepositoryError> {
    let get = |e: sqlx::Error| RepositoryError::Query(e.to_string());
    let id: String = row.try_get("id").map_err(get)?;
    let form_id: String = row.try_get("form_id").map_err(get)?;
    let section_id: Option<String> = row.try_get("section_id").map_err(get)?;
    let kind: String = row.try_get("kind").map_err(get)?;
    let choice_ids: String = row.try_get("choice_ids").map_err(get)?;

    Ok(AnswerableRef {
        id: id
            .parse::<Uuid>()
            .map_err(|e| RepositoryError::Query(format!("invalid question id: {e}")))?,
        form_id: form_id
            .parse::<FormId>()
            .map_err(|e| RepositoryError::Query(format!("invalid form id: {e}")))?,
        section_id,
        kind: kind.parse::<QuestionKind>().map_err(RepositoryError::Query)?,
        choice_ids: serde_json::from_str(&choice_ids)
            .map_err(|e| RepositoryError::Query(format!("invalid choice ids JSON: {e}")))?,
    })
}

impl QuestionResolver for SqliteQuestionRepository {
    async fn get_by_id(&self, id: &Uuid) -> Result<Option<AnswerableRef>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM questions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.as_ref().map(row_to_question).transpose()
    }

    async fn list_by_form_id(&self, form_id: &FormId) -> Result<Vec<AnswerableRef>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM questions WHERE form_id = ? ORDER BY created_at, id")
            .bind(form_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter().map(row_to_question).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_repo() -> SqliteQuestionRepository {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
        std::mem::forget(dir);
        SqliteQuestionRepository::new(DatabasePool::new(&url).await.unwrap())
    }

    fn choice_question(form_id: FormId) -> AnswerableRef {
        AnswerableRef {
            id: Uuid::now_v7(),
            form_id,
            section_id: Some("s1".to_string()),
            kind: QuestionKind::Dropdown,
            choice_ids: vec!["red".to_string(), "blue".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_and_get_by_id() {
        let repo = test_repo().await;
        let question = choice_question(FormId::new());
        repo.create(&question).await.unwrap();

        let loaded = repo.get_by_id(&question.id).await.unwrap().unwrap();
        assert_eq!(loaded, question);
        assert!(loaded.is_choice());
    }

    #[tokio::test]
    async fn test_get_unknown_returns_none() {
        let repo = test_repo().await;
        assert!(repo.get_by_id(&Uuid::now_v7()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let repo = test_repo().await;
        let question = choice_question(FormId::new());
        repo.create(&question).await.unwrap();
        let err = repo.create(&question).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_list_by_form_id_filters_forms() {
        let repo = test_repo().await;
        let form = FormId::new();
        let unplaced = AnswerableRef {
            id: Uuid::now_v7(),
            form_id: form,
            section_id: None,
            kind: QuestionKind::ShortText,
            choice_ids: Vec::new(),
        };
        repo.create(&choice_question(form)).await.unwrap();
        repo.create(&unplaced).await.unwrap();
        repo.create(&choice_question(FormId::new())).await.unwrap();

        let listed = repo.list_by_form_id(&form).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|q| q.form_id == form));
        assert!(listed.iter().any(|q| q.section_id.is_none()));
    }
}
