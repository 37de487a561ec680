//! Question reference resolver trait definition.
//!
//! Owned by the question subsystem and consumed by workflow validation, which
//! only needs existence, placement and capability class of a question.

use formflow_types::error::RepositoryError;
use formflow_types::form::FormId;
use formflow_types::question::AnswerableRef;
use uuid::Uuid;

/// Narrow lookup over questions.
pub trait QuestionResolver: Send + Sync {
    /// Look up one question by id, regardless of form.
    fn get_by_id(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<AnswerableRef>, RepositoryError>> + Send;

    /// All questions belonging to a form.
    fn list_by_form_id(
        &self,
        form_id: &FormId,
    ) -> impl std::future::Future<Output = Result<Vec<AnswerableRef>, RepositoryError>> + Send;
}
