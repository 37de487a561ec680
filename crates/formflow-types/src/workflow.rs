//! Workflow domain types for Formflow.
//!
//! A form's completion path is a directed graph of typed nodes stored as a
//! flat, ordered node list. Edges are node-id lookups, never ownership
//! pointers. This module defines the node sum type and its persisted wire
//! shape, the versioned snapshot that stores a graph, and the violation
//! records produced by workflow validation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::IntoDeserializer;
use serde::de::value::StrDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::form::FormId;

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

/// The closed set of node types a workflow graph may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    Section,
    Condition,
    End,
}

impl NodeType {
    /// Whether nodes of this type may be added on their own (outside a full
    /// graph replace). Only `start -> end` scaffolding is fixed.
    pub fn is_creatable(&self) -> bool {
        matches!(self, NodeType::Section | NodeType::Condition)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Start => write!(f, "start"),
            NodeType::Section => write!(f, "section"),
            NodeType::Condition => write!(f, "condition"),
            NodeType::End => write!(f, "end"),
        }
    }
}

impl FromStr for NodeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(NodeType::Start),
            "section" => Ok(NodeType::Section),
            "condition" => Ok(NodeType::Condition),
            "end" => Ok(NodeType::End),
            other => Err(format!("unknown node type: '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Condition rules
// ---------------------------------------------------------------------------

/// Which kind of answer a condition rule tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConditionSource {
    /// Exact match against a choice identity of a choice-bearing question.
    Choice,
    /// Regular-expression match against a free-form answer.
    NonChoice,
}

impl fmt::Display for ConditionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionSource::Choice => write!(f, "choice"),
            ConditionSource::NonChoice => write!(f, "non-choice"),
        }
    }
}

/// Predicate attached to a `condition` node.
///
/// Every field may be absent or empty while a workflow is a draft; activation
/// requires all of them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRule {
    #[serde(
        default,
        deserialize_with = "blank_source_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub source: Option<ConditionSource>,
    /// Earlier node whose answer is tested.
    #[serde(default)]
    pub node_id: String,
    /// Question identifier within `node_id`.
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub pattern: String,
}

/// An editor leaves `"source": ""` (or `null`) on a rule it has not
/// configured yet; both decode as unset.
fn blank_source_as_none<'de, D>(deserializer: D) -> Result<Option<ConditionSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(tag) => {
            let de: StrDeserializer<'_, D::Error> = tag.into_deserializer();
            ConditionSource::deserialize(de).map(Some)
        }
    }
}

impl ConditionRule {
    /// True when source, node, question and pattern are all set.
    pub fn is_complete(&self) -> bool {
        self.source.is_some()
            && !self.node_id.is_empty()
            && !self.key.is_empty()
            && !self.pattern.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Type-specific part of a node. Edges are node identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Start {
        next: String,
    },
    Section {
        next: String,
    },
    Condition {
        next_true: String,
        next_false: String,
        rule: Option<ConditionRule>,
    },
    End,
}

/// A single vertex of a workflow graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "NodeRecord", into = "NodeRecord")]
pub struct Node {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

impl Node {
    pub fn start(id: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: "Start".to_string(),
            kind: NodeKind::Start { next: next.into() },
        }
    }

    pub fn section(id: impl Into<String>, label: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Section { next: next.into() },
        }
    }

    pub fn condition(
        id: impl Into<String>,
        next_true: impl Into<String>,
        next_false: impl Into<String>,
        rule: Option<ConditionRule>,
    ) -> Self {
        Self {
            id: id.into(),
            label: "Condition".to_string(),
            kind: NodeKind::Condition {
                next_true: next_true.into(),
                next_false: next_false.into(),
                rule,
            },
        }
    }

    pub fn end(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: "End".to_string(),
            kind: NodeKind::End,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self.kind {
            NodeKind::Start { .. } => NodeType::Start,
            NodeKind::Section { .. } => NodeType::Section,
            NodeKind::Condition { .. } => NodeType::Condition,
            NodeKind::End => NodeType::End,
        }
    }

    /// Outgoing edges in field order (`next`, or `nextTrue` then `nextFalse`).
    pub fn successors(&self) -> Vec<&str> {
        match &self.kind {
            NodeKind::Start { next } | NodeKind::Section { next } => vec![next.as_str()],
            NodeKind::Condition {
                next_true,
                next_false,
                ..
            } => vec![next_true.as_str(), next_false.as_str()],
            NodeKind::End => vec![],
        }
    }

    /// Mutable access to every outgoing edge.
    pub fn successors_mut(&mut self) -> Vec<&mut String> {
        match &mut self.kind {
            NodeKind::Start { next } | NodeKind::Section { next } => vec![next],
            NodeKind::Condition {
                next_true,
                next_false,
                ..
            } => vec![next_true, next_false],
            NodeKind::End => vec![],
        }
    }

    pub fn condition_rule(&self) -> Option<&ConditionRule> {
        match &self.kind {
            NodeKind::Condition { rule, .. } => rule.as_ref(),
            _ => None,
        }
    }
}

/// A node record that could not be decoded into a typed node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("node '{node_id}': {reason}")]
pub struct MalformedNode {
    pub node_id: String,
    pub reason: String,
}

/// Persisted wire shape of a node: one flat record whose optional fields
/// depend on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRecord {
    #[serde(default)]
    id: String,
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_true: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    next_false: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    condition_rule: Option<ConditionRule>,
}

impl NodeRecord {
    fn malformed(&self, reason: impl Into<String>) -> MalformedNode {
        MalformedNode {
            node_id: self.id.clone(),
            reason: reason.into(),
        }
    }

    fn required(&self, field: &str, value: &Option<String>) -> Result<String, MalformedNode> {
        match value.as_deref() {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(self.malformed(format!(
                "'{field}' is required on {} nodes",
                self.node_type
            ))),
        }
    }

    fn forbid(&self, field: &str, present: bool) -> Result<(), MalformedNode> {
        if present {
            Err(self.malformed(format!(
                "'{field}' is not allowed on {} nodes",
                self.node_type
            )))
        } else {
            Ok(())
        }
    }
}

impl TryFrom<NodeRecord> for Node {
    type Error = MalformedNode;

    fn try_from(record: NodeRecord) -> Result<Self, Self::Error> {
        if record.id.is_empty() {
            return Err(record.malformed("'id' must not be empty"));
        }
        let node_type: NodeType = record
            .node_type
            .parse()
            .map_err(|e: String| record.malformed(e))?;

        let kind = match node_type {
            NodeType::Start | NodeType::Section => {
                record.forbid("nextTrue", record.next_true.is_some())?;
                record.forbid("nextFalse", record.next_false.is_some())?;
                record.forbid("conditionRule", record.condition_rule.is_some())?;
                let next = record.required("next", &record.next)?;
                if node_type == NodeType::Start {
                    NodeKind::Start { next }
                } else {
                    NodeKind::Section { next }
                }
            }
            NodeType::Condition => {
                record.forbid("next", record.next.is_some())?;
                NodeKind::Condition {
                    next_true: record.required("nextTrue", &record.next_true)?,
                    next_false: record.required("nextFalse", &record.next_false)?,
                    rule: record.condition_rule.clone(),
                }
            }
            NodeType::End => {
                record.forbid("next", record.next.is_some())?;
                record.forbid("nextTrue", record.next_true.is_some())?;
                record.forbid("nextFalse", record.next_false.is_some())?;
                record.forbid("conditionRule", record.condition_rule.is_some())?;
                NodeKind::End
            }
        };

        Ok(Node {
            id: record.id,
            label: record.label,
            kind,
        })
    }
}

impl From<Node> for NodeRecord {
    fn from(node: Node) -> Self {
        let node_type = node.node_type().to_string();
        let mut record = NodeRecord {
            id: node.id,
            node_type,
            label: node.label,
            next: None,
            next_true: None,
            next_false: None,
            condition_rule: None,
        };
        match node.kind {
            NodeKind::Start { next } | NodeKind::Section { next } => record.next = Some(next),
            NodeKind::Condition {
                next_true,
                next_false,
                rule,
            } => {
                record.next_true = Some(next_true);
                record.next_false = Some(next_false);
                record.condition_rule = rule;
            }
            NodeKind::End => {}
        }
        record
    }
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Lifecycle state of a persisted workflow version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Editable under relaxed validation.
    Draft,
    /// Served to people answering the form. Never mutated in place.
    Active,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Draft => write!(f, "draft"),
            WorkflowState::Active => write!(f, "active"),
        }
    }
}

/// One persisted snapshot of a form's workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVersion {
    pub id: Uuid,
    pub form_id: FormId,
    /// Monotonic per-form version number, starting at 1.
    pub version: u32,
    /// The graph as an ordered node list.
    pub nodes: Vec<Node>,
    pub is_active: bool,
    /// User who last wrote this version.
    pub last_editor: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowVersion {
    pub fn state(&self) -> WorkflowState {
        if self.is_active {
            WorkflowState::Active
        } else {
            WorkflowState::Draft
        }
    }
}

// ---------------------------------------------------------------------------
// Validation reporting
// ---------------------------------------------------------------------------

/// The rule a workflow violation breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationRule {
    MissingStart,
    MultipleStart,
    DuplicateNodeId,
    UnknownReference,
    UnreachableNode,
    SelfReference,
    ForwardReference,
    UnconfiguredCondition,
    IncompleteConditionRule,
    QuestionNotFound,
    QuestionInOtherForm,
    QuestionNotInSection,
    SourceMismatch,
    UnknownChoice,
    InvalidPattern,
    NoPathToEnd,
    NodeRepurposed,
    NodeAdded,
    NodeRemoved,
}

impl fmt::Display for ViolationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationRule::MissingStart => "missing_start",
            ViolationRule::MultipleStart => "multiple_start",
            ViolationRule::DuplicateNodeId => "duplicate_node_id",
            ViolationRule::UnknownReference => "unknown_reference",
            ViolationRule::UnreachableNode => "unreachable_node",
            ViolationRule::SelfReference => "self_reference",
            ViolationRule::ForwardReference => "forward_reference",
            ViolationRule::UnconfiguredCondition => "unconfigured_condition",
            ViolationRule::IncompleteConditionRule => "incomplete_condition_rule",
            ViolationRule::QuestionNotFound => "question_not_found",
            ViolationRule::QuestionInOtherForm => "question_in_other_form",
            ViolationRule::QuestionNotInSection => "question_not_in_section",
            ViolationRule::SourceMismatch => "source_mismatch",
            ViolationRule::UnknownChoice => "unknown_choice",
            ViolationRule::InvalidPattern => "invalid_pattern",
            ViolationRule::NoPathToEnd => "no_path_to_end",
            ViolationRule::NodeRepurposed => "node_repurposed",
            ViolationRule::NodeAdded => "node_added",
            ViolationRule::NodeRemoved => "node_removed",
        };
        write!(f, "{s}")
    }
}

/// A single reason a workflow graph was rejected.
///
/// Carries enough structure for an editor UI to highlight the offending node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: ViolationRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub message: String,
}

impl Violation {
    /// A violation about the graph as a whole.
    pub fn graph(rule: ViolationRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            node_id: None,
            message: message.into(),
        }
    }

    /// A violation attributed to one node.
    pub fn node(rule: ViolationRule, node_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            rule,
            node_id: Some(node_id.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.node_id {
            Some(id) => write!(f, "[{}] node '{}': {}", self.rule, id, self.message),
            None => write!(f, "[{}] {}", self.rule, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_type_from_str() {
        assert_eq!("condition".parse::<NodeType>().unwrap(), NodeType::Condition);
        assert!("loop".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_only_section_and_condition_are_creatable() {
        assert!(NodeType::Section.is_creatable());
        assert!(NodeType::Condition.is_creatable());
        assert!(!NodeType::Start.is_creatable());
        assert!(!NodeType::End.is_creatable());
    }

    #[test]
    fn test_decode_section_node() {
        let node: Node =
            serde_json::from_value(json!({"id": "s1", "type": "section", "label": "Intro", "next": "e"}))
                .unwrap();
        assert_eq!(node.node_type(), NodeType::Section);
        assert_eq!(node.successors(), vec!["e"]);
        assert_eq!(node.label, "Intro");
    }

    #[test]
    fn test_blank_rule_source_decodes_as_unset() {
        for source in [json!(""), json!(null), json!("  ")] {
            let node: Node = serde_json::from_value(json!({
                "id": "c1", "type": "condition", "nextTrue": "e", "nextFalse": "e",
                "conditionRule": {"source": source, "nodeId": "s1"}
            }))
            .unwrap();
            let rule = node.condition_rule().unwrap();
            assert!(rule.source.is_none());
            assert_eq!(rule.node_id, "s1");
            assert!(!rule.is_complete());
        }
    }

    #[test]
    fn test_unknown_rule_source_is_malformed() {
        let result = serde_json::from_value::<Node>(json!({
            "id": "c1", "type": "condition", "nextTrue": "e", "nextFalse": "e",
            "conditionRule": {"source": "fuzzy"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_condition_with_rule() {
        let node: Node = serde_json::from_value(json!({
            "id": "c1",
            "type": "condition",
            "label": "Branch",
            "nextTrue": "a",
            "nextFalse": "b",
            "conditionRule": {
                "source": "non-choice",
                "nodeId": "s1",
                "key": "q1",
                "pattern": "^yes$"
            }
        }))
        .unwrap();
        let rule = node.condition_rule().unwrap();
        assert_eq!(rule.source, Some(ConditionSource::NonChoice));
        assert_eq!(rule.node_id, "s1");
        assert!(rule.is_complete());
        assert_eq!(node.successors(), vec!["a", "b"]);
    }

    #[test]
    fn test_section_without_next_is_malformed() {
        let err = serde_json::from_value::<Node>(json!({"id": "s1", "type": "section"}))
            .unwrap_err();
        assert!(err.to_string().contains("'next' is required"), "got: {err}");
    }

    #[test]
    fn test_unknown_type_is_malformed() {
        let err = serde_json::from_value::<Node>(json!({"id": "x", "type": "loop"})).unwrap_err();
        assert!(err.to_string().contains("unknown node type"), "got: {err}");
    }

    #[test]
    fn test_next_on_condition_is_malformed() {
        let err = serde_json::from_value::<Node>(json!({
            "id": "c", "type": "condition", "next": "a", "nextTrue": "a", "nextFalse": "b"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("not allowed"), "got: {err}");
    }

    #[test]
    fn test_end_node_encodes_without_edges() {
        let value = serde_json::to_value(Node::end("e")).unwrap();
        assert_eq!(value, json!({"id": "e", "type": "end", "label": "End"}));
    }

    #[test]
    fn test_partial_rule_is_incomplete() {
        let rule = ConditionRule {
            source: Some(ConditionSource::Choice),
            node_id: "s1".to_string(),
            ..Default::default()
        };
        assert!(!rule.is_complete());
    }

    #[test]
    fn test_violation_display() {
        let v = Violation::node(ViolationRule::SelfReference, "c1", "rule references itself");
        assert_eq!(v.to_string(), "[self_reference] node 'c1': rule references itself");
    }

    #[test]
    fn test_violation_rule_serializes_snake_case() {
        let v = Violation::graph(ViolationRule::MissingStart, "no start");
        let value = serde_json::to_value(&v).unwrap();
        assert_eq!(value, json!({"rule": "missing_start", "message": "no start"}));
    }
}
