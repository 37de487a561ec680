//! Workflow version repository trait definition.
//!
//! The repository durably records the version state the workflow service
//! hands it. Lifecycle decisions (overwrite a draft or fork a new one) are
//! made by the service; the repository enforces that an active version is
//! never overwritten and that at most one version per form is active.

use formflow_types::error::RepositoryError;
use formflow_types::form::FormId;
use formflow_types::workflow::{Node, WorkflowVersion};
use uuid::Uuid;

/// Repository trait for workflow version persistence.
///
/// There are no single-node insert/remove methods: the service applies node
/// edits to the graph itself and hands the complete node list to
/// `save_draft`, `fork_draft` or `activate`.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowVersionRepository: Send + Sync {
    /// Latest version for a form (highest version number), active or not.
    fn get_latest(
        &self,
        form_id: &FormId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowVersion>, RepositoryError>> + Send;

    /// The version currently served to respondents, if any.
    fn get_active(
        &self,
        form_id: &FormId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowVersion>, RepositoryError>> + Send;

    /// All versions for a form, newest first.
    fn list_versions(
        &self,
        form_id: &FormId,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowVersion>, RepositoryError>> + Send;

    /// Overwrite the latest version, which must be a draft. Creates version 1
    /// as a draft when the form has no versions yet.
    ///
    /// Returns `RepositoryError::Conflict` if the latest version is active.
    fn save_draft(
        &self,
        form_id: &FormId,
        nodes: &[Node],
        editor: &Uuid,
    ) -> impl std::future::Future<Output = Result<WorkflowVersion, RepositoryError>> + Send;

    /// Insert a new draft version numbered after the latest one.
    fn fork_draft(
        &self,
        form_id: &FormId,
        nodes: &[Node],
        editor: &Uuid,
    ) -> impl std::future::Future<Output = Result<WorkflowVersion, RepositoryError>> + Send;

    /// Make `nodes` the active graph for the form, deactivating the previous
    /// active version in the same transaction. The latest version is promoted
    /// in place when it is a draft; otherwise a new active version is inserted.
    fn activate(
        &self,
        form_id: &FormId,
        nodes: &[Node],
        editor: &Uuid,
    ) -> impl std::future::Future<Output = Result<WorkflowVersion, RepositoryError>> + Send;
}
