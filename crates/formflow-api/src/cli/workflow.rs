//! CLI workflow subcommands.
//!
//! Thin wrappers over `WorkflowService`: read graph files, call the service,
//! render versions and violations as tables or JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Subcommand, ValueEnum};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use uuid::Uuid;

use formflow_core::workflow::graph::Graph;
use formflow_types::error::WorkflowError;
use formflow_types::form::FormId;
use formflow_types::workflow::{Node, NodeKind, NodeType, Violation, WorkflowVersion};

use crate::state::AppState;

/// Node types that can be inserted one at a time.
#[derive(Clone, Copy, ValueEnum)]
pub enum NewNodeType {
    Section,
    Condition,
}

impl From<NewNodeType> for NodeType {
    fn from(value: NewNodeType) -> Self {
        match value {
            NewNodeType::Section => NodeType::Section,
            NewNodeType::Condition => NodeType::Condition,
        }
    }
}

/// Workflow subcommands.
#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Show the latest (or active) version of a form's workflow.
    Show {
        /// Form UUID.
        form: String,

        /// Show the live version instead of the latest one.
        #[arg(long)]
        active: bool,
    },

    /// List all versions of a form's workflow, newest first.
    History {
        /// Form UUID.
        form: String,
    },

    /// Replace the whole graph with the node list in a JSON file.
    Update {
        /// Form UUID.
        form: String,

        /// Path to a JSON array of nodes.
        #[arg(long, short)]
        file: PathBuf,
    },

    /// Insert a new section or condition right after start.
    #[command(name = "add-node")]
    AddNode {
        /// Form UUID.
        form: String,

        /// Kind of node to insert.
        #[arg(value_enum)]
        node_type: NewNodeType,
    },

    /// Delete a node and route its predecessors around it.
    #[command(name = "delete-node")]
    DeleteNode {
        /// Form UUID.
        form: String,

        /// Node id.
        node: String,
    },

    /// Change a node's label.
    #[command(name = "rename-node")]
    RenameNode {
        /// Form UUID.
        form: String,

        /// Node id.
        node: String,

        /// New label.
        label: String,
    },

    /// Validate strictly and make a graph live.
    Activate {
        /// Form UUID.
        form: String,

        /// Graph to activate; defaults to the latest version's graph.
        #[arg(long, short)]
        file: Option<PathBuf>,
    },

    /// Report everything that would block activation, without saving.
    Check {
        /// Form UUID.
        form: String,

        /// Graph to check; defaults to the latest version's graph.
        #[arg(long, short)]
        file: Option<PathBuf>,
    },
}

/// Handle a workflow subcommand.
pub async fn handle_workflow_command(
    cmd: WorkflowCommand,
    state: &AppState,
    editor: Uuid,
    json: bool,
) -> Result<()> {
    match cmd {
        WorkflowCommand::Show { form, active } => handle_show(&parse_form(&form)?, active, state, json).await,
        WorkflowCommand::History { form } => handle_history(&parse_form(&form)?, state, json).await,
        WorkflowCommand::Update { form, file } => {
            handle_update(&parse_form(&form)?, &file, state, &editor, json).await
        }
        WorkflowCommand::AddNode { form, node_type } => {
            handle_add_node(&parse_form(&form)?, node_type.into(), state, &editor, json).await
        }
        WorkflowCommand::DeleteNode { form, node } => {
            handle_delete_node(&parse_form(&form)?, &node, state, &editor, json).await
        }
        WorkflowCommand::RenameNode { form, node, label } => {
            handle_rename_node(&parse_form(&form)?, &node, &label, state, &editor, json).await
        }
        WorkflowCommand::Activate { form, file } => {
            handle_activate(&parse_form(&form)?, file.as_deref(), state, &editor, json).await
        }
        WorkflowCommand::Check { form, file } => {
            handle_check(&parse_form(&form)?, file.as_deref(), state, json).await
        }
    }
}

fn parse_form(raw: &str) -> Result<FormId> {
    raw.parse::<FormId>()
        .with_context(|| format!("'{raw}' is not a valid form UUID"))
}

async fn read_graph_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

/// Graph bytes from `file`, or the latest stored graph when no file is given.
async fn graph_source(form_id: &FormId, file: Option<&Path>, state: &AppState) -> Result<Vec<u8>> {
    match file {
        Some(path) => read_graph_file(path).await,
        None => {
            let latest = state.workflow_service.get(form_id).await?;
            Ok(Graph::from_nodes(latest.nodes).serialize()?)
        }
    }
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

async fn handle_show(form_id: &FormId, active: bool, state: &AppState, json: bool) -> Result<()> {
    let version = if active {
        state.workflow_service.get_active(form_id).await
    } else {
        state.workflow_service.get(form_id).await
    };
    let version = match version {
        Ok(v) => v,
        Err(WorkflowError::NotFound) if active => bail!("Form {form_id} has no active workflow"),
        Err(WorkflowError::NotFound) => bail!("Form {form_id} has no workflow yet"),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&version)?);
        return Ok(());
    }

    print_version_header(&version);
    print_nodes(&version.nodes);
    println!();
    Ok(())
}

async fn handle_history(form_id: &FormId, state: &AppState, json: bool) -> Result<()> {
    let versions = state.workflow_service.history(form_id).await?;

    if json {
        let out: Vec<_> = versions
            .iter()
            .map(|v| {
                serde_json::json!({
                    "id": v.id.to_string(),
                    "version": v.version,
                    "state": v.state(),
                    "nodes": v.nodes.len(),
                    "last_editor": v.last_editor.to_string(),
                    "updated_at": v.updated_at.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if versions.is_empty() {
        println!();
        println!("  No workflow versions for form {form_id}.");
        println!(
            "  Start one with: {}",
            style(format!("formflow workflow add-node {form_id} section")).dim()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Version").fg(Color::Cyan),
            Cell::new("State"),
            Cell::new("Nodes"),
            Cell::new("Last editor"),
            Cell::new("Updated"),
        ]);

    for v in &versions {
        let state_cell = if v.is_active {
            Cell::new("active").fg(Color::Green)
        } else {
            Cell::new("draft").fg(Color::Yellow)
        };
        table.add_row(vec![
            Cell::new(v.version),
            state_cell,
            Cell::new(v.nodes.len()),
            Cell::new(v.last_editor),
            Cell::new(v.updated_at.format("%Y-%m-%d %H:%M:%S")),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

async fn handle_update(
    form_id: &FormId,
    file: &Path,
    state: &AppState,
    editor: &Uuid,
    json: bool,
) -> Result<()> {
    let raw = read_graph_file(file).await?;
    let version = state
        .workflow_service
        .update(form_id, &raw, editor)
        .await
        .map_err(|e| report_rejection(e, json))?;

    print_saved(&version, "Saved", json)
}

async fn handle_add_node(
    form_id: &FormId,
    node_type: NodeType,
    state: &AppState,
    editor: &Uuid,
    json: bool,
) -> Result<()> {
    let created = state
        .workflow_service
        .create_node(form_id, node_type, editor)
        .await
        .map_err(|e| report_saved_with_issues(e, json))?;

    if json {
        let out = serde_json::json!({
            "node_id": created.node_id,
            "version": created.version.version,
            "state": created.version.state(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!();
        println!(
            "  {} Added {node_type} node {}",
            style("*").green().bold(),
            style(&created.node_id).cyan()
        );
        println!("  Version: {} ({})", created.version.version, created.version.state());
        println!();
    }
    Ok(())
}

async fn handle_delete_node(
    form_id: &FormId,
    node_id: &str,
    state: &AppState,
    editor: &Uuid,
    json: bool,
) -> Result<()> {
    let nodes = state
        .workflow_service
        .delete_node(form_id, node_id, editor)
        .await
        .map_err(|e| report_saved_with_issues(e, json))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        println!();
        println!(
            "  {} Deleted node {}",
            style("*").green().bold(),
            style(node_id).cyan()
        );
        print_nodes(&nodes);
        println!();
    }
    Ok(())
}

async fn handle_rename_node(
    form_id: &FormId,
    node_id: &str,
    label: &str,
    state: &AppState,
    editor: &Uuid,
    json: bool,
) -> Result<()> {
    let version = state
        .workflow_service
        .rename_node(form_id, node_id, label, editor)
        .await
        .map_err(|e| report_saved_with_issues(e, json))?;

    print_saved(&version, "Renamed node in", json)
}

// ---------------------------------------------------------------------------
// Activation
// ---------------------------------------------------------------------------

async fn handle_activate(
    form_id: &FormId,
    file: Option<&Path>,
    state: &AppState,
    editor: &Uuid,
    json: bool,
) -> Result<()> {
    let raw = graph_source(form_id, file, state).await?;
    let version = state
        .workflow_service
        .activate(form_id, editor, &raw)
        .await
        .map_err(|e| report_rejection(e, json))?;

    print_saved(&version, "Activated", json)
}

async fn handle_check(form_id: &FormId, file: Option<&Path>, state: &AppState, json: bool) -> Result<()> {
    let raw = graph_source(form_id, file, state).await?;
    let violations = state.workflow_service.validation_info(form_id, &raw).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&violations)?);
        return Ok(());
    }

    println!();
    if violations.is_empty() {
        println!("  {} Ready to activate", style("✓").green());
    } else {
        println!(
            "  {} {} issue(s) block activation",
            style("✗").red(),
            violations.len()
        );
        print_violations(&violations);
    }
    println!();
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

/// Render violations of a rejected (unsaved) edit and turn the error into anyhow.
fn report_rejection(err: WorkflowError, json: bool) -> anyhow::Error {
    if !err.violations().is_empty() {
        emit_violations(err.violations(), json);
    }
    err.into()
}

/// Like [`report_rejection`], for edits that were persisted before validation.
fn report_saved_with_issues(err: WorkflowError, json: bool) -> anyhow::Error {
    match &err {
        WorkflowError::ValidationFailed(violations) => {
            emit_violations(violations, json);
            anyhow::anyhow!(
                "change saved, but the graph has {} validation issue(s)",
                violations.len()
            )
        }
        _ => report_rejection(err, json),
    }
}

fn emit_violations(violations: &[Violation], json: bool) {
    if json {
        match serde_json::to_string_pretty(violations) {
            Ok(out) => println!("{out}"),
            Err(e) => tracing::warn!("failed to encode violations: {e}"),
        }
    } else {
        println!();
        print_violations(violations);
        println!();
    }
}

fn print_violations(violations: &[Violation]) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Rule").fg(Color::Red),
            Cell::new("Node"),
            Cell::new("Problem"),
        ]);
    for v in violations {
        table.add_row(vec![
            Cell::new(v.rule),
            Cell::new(v.node_id.as_deref().unwrap_or("-")),
            Cell::new(&v.message),
        ]);
    }
    println!("{table}");
}

fn print_saved(version: &WorkflowVersion, verb: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(version)?);
    } else {
        println!();
        println!(
            "  {} {verb} version {} of form {}",
            style("*").green().bold(),
            version.version,
            style(version.form_id).cyan()
        );
        println!("  State: {}", version.state());
        println!("  Nodes: {}", version.nodes.len());
        println!();
    }
    Ok(())
}

fn print_version_header(version: &WorkflowVersion) {
    println!();
    println!(
        "  {} Form {} workflow v{} ({})",
        style("*").bold(),
        style(version.form_id).cyan(),
        version.version,
        version.state()
    );
    println!("  Last editor: {}", version.last_editor);
    println!("  Updated: {}", version.updated_at.format("%Y-%m-%d %H:%M:%S"));
}

fn print_nodes(nodes: &[Node]) {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Id").fg(Color::Cyan),
            Cell::new("Type"),
            Cell::new("Label"),
            Cell::new("Next"),
        ]);

    for node in nodes {
        let next = match &node.kind {
            NodeKind::Start { next } | NodeKind::Section { next } => next.clone(),
            NodeKind::Condition {
                next_true,
                next_false,
                rule,
            } => {
                let marker = if rule.as_ref().is_some_and(|r| r.is_complete()) { "" } else { " (no rule)" };
                format!("true: {next_true}, false: {next_false}{marker}")
            }
            NodeKind::End => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&node.id),
            Cell::new(node.node_type()),
            Cell::new(&node.label),
            Cell::new(next),
        ]);
    }
    println!("{table}");
}
