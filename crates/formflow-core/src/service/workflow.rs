//! Form workflow service.
//!
//! Mediates every workflow mutation: load the current version, apply the
//! edit, validate in the right mode, and persist through the version
//! repository. Per form the lifecycle is
//! `NoWorkflow -> Draft -> Active -> Draft (fork) -> Active -> ...`:
//! drafts are overwritten in place, and any edit on an active version forks
//! a new draft so the live graph is never mutated.
//!
//! `update` and `activate` validate before writing and are all-or-nothing.
//! `create_node`, `delete_node` and `rename_node` write the structural edit
//! first and validate the result afterwards; a validation error from them
//! describes a graph that is already persisted and needs fixing.

use formflow_types::error::WorkflowError;
use formflow_types::form::FormId;
use formflow_types::workflow::{Node, NodeType, Violation, WorkflowVersion};
use uuid::Uuid;

use crate::repository::question::QuestionResolver;
use crate::repository::workflow::WorkflowVersionRepository;
use crate::workflow::graph::Graph;
use crate::workflow::identity::{validate_node_ids_unchanged, validate_update_node_ids};
use crate::workflow::validator::{self, QuestionCatalog};

/// Result of a successful single-node insert.
#[derive(Debug, Clone)]
pub struct NodeCreated {
    pub node_id: String,
    pub version: WorkflowVersion,
}

/// Service orchestrating the workflow lifecycle of forms.
///
/// Generic over the version repository and question resolver so that
/// formflow-core never depends on formflow-infra.
pub struct WorkflowService<W: WorkflowVersionRepository, Q: QuestionResolver> {
    versions: W,
    questions: Q,
}

impl<W: WorkflowVersionRepository, Q: QuestionResolver> WorkflowService<W, Q> {
    pub fn new(versions: W, questions: Q) -> Self {
        Self {
            versions,
            questions,
        }
    }

    /// Latest workflow version of a form.
    pub async fn get(&self, form_id: &FormId) -> Result<WorkflowVersion, WorkflowError> {
        self.versions
            .get_latest(form_id)
            .await?
            .ok_or(WorkflowError::NotFound)
    }

    /// The version currently served to respondents.
    pub async fn get_active(&self, form_id: &FormId) -> Result<WorkflowVersion, WorkflowError> {
        self.versions
            .get_active(form_id)
            .await?
            .ok_or(WorkflowError::NotFound)
    }

    /// Version history, newest first.
    pub async fn history(&self, form_id: &FormId) -> Result<Vec<WorkflowVersion>, WorkflowError> {
        Ok(self.versions.list_versions(form_id).await?)
    }

    /// Replace the whole graph.
    ///
    /// Relaxed validation and the node-identity guard run before anything is
    /// written; on failure nothing is persisted.
    pub async fn update(
        &self,
        form_id: &FormId,
        raw_graph: &[u8],
        editor: &Uuid,
    ) -> Result<WorkflowVersion, WorkflowError> {
        let graph = Graph::parse(raw_graph)?;
        if let Err(violations) = validator::validate(&graph) {
            return Err(rejected(form_id, "update", violations));
        }

        let latest = self.versions.get_latest(form_id).await?;
        if let Some(previous) = &latest {
            let previous_graph = Graph::from_nodes(previous.nodes.clone());
            validate_update_node_ids(&previous_graph, &graph)
                .map_err(WorkflowError::NodeIdentityViolation)?;
        }

        self.persist(form_id, latest.as_ref(), graph.nodes(), editor)
            .await
    }

    /// Insert a new `section` or `condition` right after `start`.
    ///
    /// A form without a workflow starts from `start -> end`.
    pub async fn create_node(
        &self,
        form_id: &FormId,
        node_type: NodeType,
        editor: &Uuid,
    ) -> Result<NodeCreated, WorkflowError> {
        let latest = self.versions.get_latest(form_id).await?;
        let mut graph = match &latest {
            Some(v) => Graph::from_nodes(v.nodes.clone()),
            None => Graph::initial(),
        };
        let node_id = graph.insert_node(node_type)?;

        let version = self
            .persist(form_id, latest.as_ref(), graph.nodes(), editor)
            .await?;
        tracing::debug!(%form_id, %node_type, node_id = %node_id, "node inserted");

        if let Err(violations) = validator::validate(&graph) {
            return Err(rejected(form_id, "create_node", violations));
        }
        Ok(NodeCreated { node_id, version })
    }

    /// Remove a node, redirect edges around it, and clear rules that tested it.
    pub async fn delete_node(
        &self,
        form_id: &FormId,
        node_id: &str,
        editor: &Uuid,
    ) -> Result<Vec<Node>, WorkflowError> {
        let latest = self.get(form_id).await?;
        let mut graph = Graph::from_nodes(latest.nodes.clone());
        graph.remove_node(node_id)?;

        let version = self
            .persist(form_id, Some(&latest), graph.nodes(), editor)
            .await?;
        tracing::debug!(%form_id, node_id, version = version.version, "node removed");

        if let Err(violations) = validator::validate(&graph) {
            return Err(rejected(form_id, "delete_node", violations));
        }
        Ok(version.nodes)
    }

    /// Change a node's label without touching the node set.
    pub async fn rename_node(
        &self,
        form_id: &FormId,
        node_id: &str,
        label: &str,
        editor: &Uuid,
    ) -> Result<WorkflowVersion, WorkflowError> {
        let latest = self.get(form_id).await?;
        let mut graph = Graph::from_nodes(latest.nodes);
        graph.rename_node(node_id, label)?;

        // Another editor may have written since the read above; a label edit
        // must not resurrect or drop their nodes.
        let fresh = self.get(form_id).await?;
        validate_node_ids_unchanged(&Graph::from_nodes(fresh.nodes.clone()), &graph)
            .map_err(WorkflowError::NodeIdentityViolation)?;

        let version = self
            .persist(form_id, Some(&fresh), graph.nodes(), editor)
            .await?;

        if let Err(violations) = validator::validate(&graph) {
            return Err(rejected(form_id, "rename_node", violations));
        }
        Ok(version)
    }

    /// Promote a graph to the live version after strict validation.
    pub async fn activate(
        &self,
        form_id: &FormId,
        editor: &Uuid,
        raw_graph: &[u8],
    ) -> Result<WorkflowVersion, WorkflowError> {
        let graph = Graph::parse(raw_graph)?;
        let catalog = self.question_catalog(form_id, &graph).await?;
        if let Err(violations) = validator::validate_activation(form_id, &graph, &catalog) {
            return Err(rejected(form_id, "activate", violations));
        }

        if let Some(previous) = self.versions.get_latest(form_id).await? {
            let previous_graph = Graph::from_nodes(previous.nodes);
            validate_update_node_ids(&previous_graph, &graph)
                .map_err(WorkflowError::NodeIdentityViolation)?;
        }

        let version = self.versions.activate(form_id, graph.nodes(), editor).await?;
        tracing::info!(%form_id, version = version.version, %editor, "workflow activated");
        Ok(version)
    }

    /// Dry run of `activate` for editor pre-flight: strict violations plus
    /// node identity violations against the latest version. Never writes.
    pub async fn validation_info(
        &self,
        form_id: &FormId,
        raw_graph: &[u8],
    ) -> Result<Vec<Violation>, WorkflowError> {
        let graph = Graph::parse(raw_graph)?;
        let catalog = self.question_catalog(form_id, &graph).await?;
        let mut violations = validator::validate_activation(form_id, &graph, &catalog)
            .err()
            .unwrap_or_default();

        if let Some(previous) = self.versions.get_latest(form_id).await? {
            let previous_graph = Graph::from_nodes(previous.nodes);
            if let Err(identity) = validate_update_node_ids(&previous_graph, &graph) {
                violations.extend(identity);
            }
        }
        Ok(violations)
    }

    /// Write `nodes` as a draft: in place when the latest version is a draft
    /// (or there is none), as a new fork when it is active.
    async fn persist(
        &self,
        form_id: &FormId,
        latest: Option<&WorkflowVersion>,
        nodes: &[Node],
        editor: &Uuid,
    ) -> Result<WorkflowVersion, WorkflowError> {
        let version = match latest {
            Some(v) if v.is_active => {
                let forked = self.versions.fork_draft(form_id, nodes, editor).await?;
                tracing::info!(
                    %form_id,
                    from = v.version,
                    to = forked.version,
                    "forked new draft from active workflow"
                );
                forked
            }
            _ => self.versions.save_draft(form_id, nodes, editor).await?,
        };
        tracing::debug!(%form_id, version = version.version, nodes = nodes.len(), "draft saved");
        Ok(version)
    }

    /// Resolve every question the graph's rules could reference: the form's
    /// own questions, plus direct lookups for keys outside that listing.
    async fn question_catalog(
        &self,
        form_id: &FormId,
        graph: &Graph,
    ) -> Result<QuestionCatalog, WorkflowError> {
        let mut catalog = QuestionCatalog::from_refs(self.questions.list_by_form_id(form_id).await?);
        for id in validator::rule_question_ids(graph) {
            if catalog.contains(&id) {
                continue;
            }
            if let Some(question) = self.questions.get_by_id(&id).await? {
                catalog.insert(question);
            }
        }
        Ok(catalog)
    }
}

fn rejected(form_id: &FormId, operation: &str, violations: Vec<Violation>) -> WorkflowError {
    tracing::warn!(
        %form_id,
        operation,
        violations = violations.len(),
        "workflow graph rejected"
    );
    for v in &violations {
        tracing::debug!(%form_id, rule = %v.rule, node_id = ?v.node_id, "{}", v.message);
    }
    WorkflowError::ValidationFailed(violations)
}
