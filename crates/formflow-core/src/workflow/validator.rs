//! Workflow graph validation.
//!
//! Two modes share one rule set:
//!
//! - **Relaxed** ([`validate`]): applied on every draft save and after every
//!   single-node edit. Structure and reference integrity only; a `condition`
//!   may still lack its rule.
//! - **Strict** ([`validate_activation`]): the relaxed checks plus
//!   completeness checks required before a graph is served to respondents.
//!
//! Both collect every violation instead of stopping at the first, so an
//! editor can highlight all offending nodes from one save.

use std::collections::{HashMap, HashSet};

use formflow_types::form::FormId;
use formflow_types::question::{AnswerableRef, QuestionCapability};
use formflow_types::workflow::{
    ConditionRule, ConditionSource, Node, NodeKind, NodeType, Violation, ViolationRule,
};
use regex::Regex;
use uuid::Uuid;

use super::graph::Graph;

// ---------------------------------------------------------------------------
// Question catalog
// ---------------------------------------------------------------------------

/// Snapshot of the questions a graph's condition rules may reference.
///
/// Built by the service from the question resolver before strict validation,
/// so validation itself stays synchronous.
#[derive(Debug, Clone, Default)]
pub struct QuestionCatalog {
    questions: HashMap<Uuid, AnswerableRef>,
}

impl QuestionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_refs(refs: impl IntoIterator<Item = AnswerableRef>) -> Self {
        let mut catalog = Self::new();
        for q in refs {
            catalog.insert(q);
        }
        catalog
    }

    pub fn insert(&mut self, question: AnswerableRef) {
        self.questions.insert(question.id, question);
    }

    pub fn get(&self, id: &Uuid) -> Option<&AnswerableRef> {
        self.questions.get(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.questions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Question ids named by condition rules in `graph` (keys that parse as UUIDs).
pub fn rule_question_ids(graph: &Graph) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for node in graph.nodes() {
        if let Some(rule) = node.condition_rule() {
            if let Ok(id) = Uuid::parse_str(&rule.key) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
    }
    ids
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Relaxed (draft) validation.
///
/// Checks:
/// - exactly one `start` node
/// - node ids are unique
/// - every `next` / `nextTrue` / `nextFalse` resolves to a node
/// - every node is reachable from `start`
/// - a present `conditionRule.nodeId` names a node that precedes the
///   condition on some path (no self or forward references)
pub fn validate(graph: &Graph) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_structure(graph, &mut violations);
    finish(violations)
}

/// Strict (activation) validation: every relaxed check, plus
/// - every `condition` carries a complete rule
/// - the rule's question exists, belongs to `form_id`, sits in the rule's
///   node, and its capability matches the rule's `source`
/// - the pattern is a known choice id (`choice`) or a valid regex (`non-choice`)
/// - every reachable node has a path to an `end` node
pub fn validate_activation(
    form_id: &FormId,
    graph: &Graph,
    catalog: &QuestionCatalog,
) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_structure(graph, &mut violations);
    check_completeness(form_id, graph, catalog, &mut violations);
    finish(violations)
}

fn finish(violations: Vec<Violation>) -> Result<(), Vec<Violation>> {
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

// ---------------------------------------------------------------------------
// Relaxed rules
// ---------------------------------------------------------------------------

fn check_structure(graph: &Graph, out: &mut Vec<Violation>) {
    check_start(graph, out);
    check_unique_ids(graph, out);
    check_references(graph, out);
    check_reachability(graph, out);
    check_rule_ordering(graph, out);
}

fn check_start(graph: &Graph, out: &mut Vec<Violation>) {
    let starts = graph.start_nodes();
    match starts.as_slice() {
        [] => out.push(Violation::graph(
            ViolationRule::MissingStart,
            "workflow has no start node",
        )),
        [_] => {}
        [first, rest @ ..] => {
            for extra in rest {
                out.push(Violation::node(
                    ViolationRule::MultipleStart,
                    &extra.id,
                    format!("second start node; '{}' is already the start", first.id),
                ));
            }
        }
    }
}

fn check_unique_ids(graph: &Graph, out: &mut Vec<Violation>) {
    let mut seen = HashSet::new();
    for node in graph.nodes() {
        if !seen.insert(node.id.as_str()) {
            out.push(Violation::node(
                ViolationRule::DuplicateNodeId,
                &node.id,
                format!("node id '{}' is used more than once", node.id),
            ));
        }
    }
}

fn check_references(graph: &Graph, out: &mut Vec<Violation>) {
    for node in graph.nodes() {
        for (field, target) in labeled_edges(node) {
            if !graph.contains(target) {
                out.push(Violation::node(
                    ViolationRule::UnknownReference,
                    &node.id,
                    format!("{field} references unknown node '{target}'"),
                ));
            }
        }
    }
}

fn check_reachability(graph: &Graph, out: &mut Vec<Violation>) {
    // Without a start everything is unreachable; the missing start is the one
    // actionable violation.
    if graph.start_nodes().is_empty() {
        return;
    }
    let reachable = graph.reachable_from_start();
    let mut reported = HashSet::new();
    for node in graph.nodes() {
        if node.node_type() == NodeType::Start {
            continue;
        }
        if !reachable.contains(node.id.as_str()) && reported.insert(node.id.as_str()) {
            out.push(Violation::node(
                ViolationRule::UnreachableNode,
                &node.id,
                "node is not reachable from the start node",
            ));
        }
    }
}

fn check_rule_ordering(graph: &Graph, out: &mut Vec<Violation>) {
    for node in graph.nodes() {
        let Some(rule) = node.condition_rule() else {
            continue;
        };
        if rule.node_id.is_empty() {
            continue;
        }
        if rule.node_id == node.id {
            out.push(Violation::node(
                ViolationRule::SelfReference,
                &node.id,
                "condition rule references the condition itself",
            ));
        } else if !graph.contains(&rule.node_id) {
            out.push(Violation::node(
                ViolationRule::UnknownReference,
                &node.id,
                format!("conditionRule.nodeId references unknown node '{}'", rule.node_id),
            ));
        } else if !graph.ancestors(&node.id).contains(rule.node_id.as_str()) {
            out.push(Violation::node(
                ViolationRule::ForwardReference,
                &node.id,
                format!(
                    "condition rule references '{}', which does not precede this condition",
                    rule.node_id
                ),
            ));
        }
    }
}

fn labeled_edges(node: &Node) -> Vec<(&'static str, &str)> {
    match &node.kind {
        NodeKind::Start { next } | NodeKind::Section { next } => vec![("next", next.as_str())],
        NodeKind::Condition {
            next_true,
            next_false,
            ..
        } => vec![("nextTrue", next_true.as_str()), ("nextFalse", next_false.as_str())],
        NodeKind::End => vec![],
    }
}

// ---------------------------------------------------------------------------
// Strict rules
// ---------------------------------------------------------------------------

fn check_completeness(
    form_id: &FormId,
    graph: &Graph,
    catalog: &QuestionCatalog,
    out: &mut Vec<Violation>,
) {
    for node in graph.nodes() {
        if node.node_type() != NodeType::Condition {
            continue;
        }
        match node.condition_rule() {
            None => out.push(Violation::node(
                ViolationRule::UnconfiguredCondition,
                &node.id,
                "condition has no rule",
            )),
            Some(rule) if !rule.is_complete() => out.push(Violation::node(
                ViolationRule::IncompleteConditionRule,
                &node.id,
                format!("condition rule is missing {}", missing_fields(rule).join(", ")),
            )),
            Some(rule) => check_rule_question(form_id, node, rule, catalog, out),
        }
    }
    check_paths_to_end(graph, out);
}

fn missing_fields(rule: &ConditionRule) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if rule.source.is_none() {
        missing.push("source");
    }
    if rule.node_id.is_empty() {
        missing.push("nodeId");
    }
    if rule.key.is_empty() {
        missing.push("key");
    }
    if rule.pattern.is_empty() {
        missing.push("pattern");
    }
    missing
}

fn check_rule_question(
    form_id: &FormId,
    node: &Node,
    rule: &ConditionRule,
    catalog: &QuestionCatalog,
    out: &mut Vec<Violation>,
) {
    let question = Uuid::parse_str(&rule.key)
        .ok()
        .and_then(|id| catalog.get(&id));
    let Some(question) = question else {
        out.push(Violation::node(
            ViolationRule::QuestionNotFound,
            &node.id,
            format!("question '{}' does not exist", rule.key),
        ));
        return;
    };

    if question.form_id != *form_id {
        out.push(Violation::node(
            ViolationRule::QuestionInOtherForm,
            &node.id,
            format!("question '{}' belongs to another form", rule.key),
        ));
        return;
    }

    if let Some(section) = &question.section_id {
        if *section != rule.node_id {
            out.push(Violation::node(
                ViolationRule::QuestionNotInSection,
                &node.id,
                format!(
                    "question '{}' is in section '{}', not '{}'",
                    rule.key, section, rule.node_id
                ),
            ));
        }
    }

    match (rule.source, question.capability()) {
        (Some(ConditionSource::Choice), QuestionCapability::Choice) => {
            if !question.choice_ids.is_empty() && !question.choice_ids.contains(&rule.pattern) {
                out.push(Violation::node(
                    ViolationRule::UnknownChoice,
                    &node.id,
                    format!(
                        "'{}' is not a choice of question '{}'",
                        rule.pattern, rule.key
                    ),
                ));
            }
        }
        (Some(ConditionSource::NonChoice), QuestionCapability::FreeForm) => {
            if let Err(e) = Regex::new(&rule.pattern) {
                out.push(Violation::node(
                    ViolationRule::InvalidPattern,
                    &node.id,
                    format!("pattern is not a valid regular expression: {e}"),
                ));
            }
        }
        (Some(source), _) => out.push(Violation::node(
            ViolationRule::SourceMismatch,
            &node.id,
            format!(
                "source '{source}' does not fit {} question '{}'",
                question.kind, rule.key
            ),
        )),
        // Incomplete rules are reported before we get here.
        (None, _) => {}
    }
}

fn check_paths_to_end(graph: &Graph, out: &mut Vec<Violation>) {
    let reachable = graph.reachable_from_start();
    let reaching_end = graph.nodes_reaching_end();
    let mut reported = HashSet::new();
    for node in graph.nodes() {
        let id = node.id.as_str();
        if reachable.contains(id) && !reaching_end.contains(id) && reported.insert(id) {
            out.push(Violation::node(
                ViolationRule::NoPathToEnd,
                &node.id,
                "no path from this node leads to an end node",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_types::question::QuestionKind;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Graph {
        Graph::parse(&serde_json::to_vec(&value).unwrap()).unwrap()
    }

    fn rules(result: Result<(), Vec<Violation>>) -> Vec<ViolationRule> {
        result.err().unwrap_or_default().into_iter().map(|v| v.rule).collect()
    }

    fn rule(source: ConditionSource, node_id: &str, key: &str, pattern: &str) -> ConditionRule {
        ConditionRule {
            source: Some(source),
            node_id: node_id.to_string(),
            key: key.to_string(),
            pattern: pattern.to_string(),
        }
    }

    fn question(form_id: FormId, section: &str, kind: QuestionKind) -> AnswerableRef {
        AnswerableRef {
            id: Uuid::now_v7(),
            form_id,
            section_id: Some(section.to_string()),
            kind,
            choice_ids: vec![],
        }
    }

    /// start -> s1 -> c -> (s2 | end), s2 -> end
    fn branching(rule: Option<ConditionRule>) -> Graph {
        Graph::from_nodes(vec![
            Node::start("start", "s1"),
            Node::section("s1", "Profile", "c"),
            Node::condition("c", "s2", "end", rule),
            Node::section("s2", "Details", "end"),
            Node::end("end"),
        ])
    }

    // -----------------------------------------------------------------------
    // End-to-end scenarios
    // -----------------------------------------------------------------------

    #[test]
    fn test_start_to_end_passes_both_modes() {
        let graph = parse(json!([
            {"id": "A", "type": "start", "next": "B"},
            {"id": "B", "type": "end"}
        ]));
        assert!(validate(&graph).is_ok());
        assert!(validate_activation(&FormId::new(), &graph, &QuestionCatalog::new()).is_ok());
    }

    #[test]
    fn test_missing_start_fails() {
        let graph = parse(json!([{"id": "B", "type": "end"}]));
        assert_eq!(rules(validate(&graph)), vec![ViolationRule::MissingStart]);
    }

    #[test]
    fn test_unconfigured_condition_is_draft_only() {
        let graph = parse(json!([
            {"id": "S", "type": "start", "next": "C"},
            {"id": "C", "type": "condition", "nextTrue": "E", "nextFalse": "E"},
            {"id": "E", "type": "end"}
        ]));
        assert!(validate(&graph).is_ok());
        let strict = rules(validate_activation(&FormId::new(), &graph, &QuestionCatalog::new()));
        assert_eq!(strict, vec![ViolationRule::UnconfiguredCondition]);
    }

    // -----------------------------------------------------------------------
    // Relaxed rules
    // -----------------------------------------------------------------------

    #[test]
    fn test_multiple_starts() {
        let graph = Graph::from_nodes(vec![
            Node::start("a", "e"),
            Node::start("b", "e"),
            Node::end("e"),
        ]);
        let violations = validate(&graph).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::MultipleStart);
        assert_eq!(violations[0].node_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_duplicate_ids() {
        let graph = Graph::from_nodes(vec![
            Node::start("s", "x"),
            Node::section("x", "One", "e"),
            Node::section("x", "Two", "e"),
            Node::end("e"),
        ]);
        assert!(rules(validate(&graph)).contains(&ViolationRule::DuplicateNodeId));
    }

    #[test]
    fn test_unknown_edge_reports_field() {
        let graph = Graph::from_nodes(vec![
            Node::start("s", "c"),
            Node::condition("c", "e", "ghost", None),
            Node::end("e"),
        ]);
        let violations = validate(&graph).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::UnknownReference);
        assert!(violations[0].message.contains("nextFalse"));
    }

    #[test]
    fn test_orphan_is_rejected() {
        let graph = Graph::from_nodes(vec![
            Node::start("s", "e"),
            Node::section("orphan", "Lost", "e"),
            Node::end("e"),
        ]);
        let violations = validate(&graph).unwrap_err();
        assert_eq!(violations[0].rule, ViolationRule::UnreachableNode);
        assert_eq!(violations[0].node_id.as_deref(), Some("orphan"));
    }

    #[test]
    fn test_accepted_graph_is_fully_reachable() {
        let graph = branching(None);
        assert!(validate(&graph).is_ok());
        let reachable = graph.reachable_from_start();
        assert!(graph.nodes().iter().all(|n| reachable.contains(n.id.as_str())));
    }

    #[test]
    fn test_self_reference_rejected() {
        let graph = branching(Some(rule(ConditionSource::Choice, "c", "k", "p")));
        assert_eq!(rules(validate(&graph)), vec![ViolationRule::SelfReference]);
    }

    #[test]
    fn test_forward_reference_rejected() {
        let graph = branching(Some(rule(ConditionSource::Choice, "s2", "k", "p")));
        assert_eq!(rules(validate(&graph)), vec![ViolationRule::ForwardReference]);
    }

    #[test]
    fn test_backward_reference_accepted() {
        let graph = branching(Some(rule(ConditionSource::Choice, "s1", "k", "p")));
        assert!(validate(&graph).is_ok());
        let to_start = branching(Some(rule(ConditionSource::Choice, "start", "k", "p")));
        assert!(validate(&to_start).is_ok());
    }

    #[test]
    fn test_rule_to_unknown_node() {
        let graph = branching(Some(rule(ConditionSource::Choice, "ghost", "k", "p")));
        assert_eq!(rules(validate(&graph)), vec![ViolationRule::UnknownReference]);
    }

    #[test]
    fn test_partial_rule_allowed_in_draft() {
        let partial = ConditionRule {
            node_id: "s1".to_string(),
            ..Default::default()
        };
        assert!(validate(&branching(Some(partial))).is_ok());
    }

    #[test]
    fn test_reports_every_violation() {
        let graph = Graph::from_nodes(vec![
            Node::section("a", "A", "ghost"),
            Node::section("a", "A again", "b"),
            Node::end("b"),
        ]);
        let found = rules(validate(&graph));
        assert!(found.contains(&ViolationRule::MissingStart));
        assert!(found.contains(&ViolationRule::DuplicateNodeId));
        assert!(found.contains(&ViolationRule::UnknownReference));
        assert!(found.len() >= 3);
    }

    // -----------------------------------------------------------------------
    // Strict rules
    // -----------------------------------------------------------------------

    #[test]
    fn test_strict_is_superset_of_relaxed() {
        let broken = Graph::from_nodes(vec![
            Node::start("s", "e"),
            Node::section("orphan", "Lost", "e"),
            Node::end("e"),
        ]);
        let relaxed = rules(validate(&broken));
        let strict = rules(validate_activation(&FormId::new(), &broken, &QuestionCatalog::new()));
        for r in relaxed {
            assert!(strict.contains(&r));
        }
    }

    #[test]
    fn test_complete_choice_rule_activates() {
        let form_id = FormId::new();
        let mut q = question(form_id, "s1", QuestionKind::SingleChoice);
        q.choice_ids = vec!["opt-a".to_string(), "opt-b".to_string()];
        let graph = branching(Some(rule(ConditionSource::Choice, "s1", &q.id.to_string(), "opt-b")));
        let catalog = QuestionCatalog::from_refs([q]);
        assert!(validate_activation(&form_id, &graph, &catalog).is_ok());
    }

    #[test]
    fn test_unknown_choice() {
        let form_id = FormId::new();
        let mut q = question(form_id, "s1", QuestionKind::Dropdown);
        q.choice_ids = vec!["opt-a".to_string()];
        let graph = branching(Some(rule(ConditionSource::Choice, "s1", &q.id.to_string(), "opt-z")));
        let catalog = QuestionCatalog::from_refs([q]);
        assert_eq!(
            rules(validate_activation(&form_id, &graph, &catalog)),
            vec![ViolationRule::UnknownChoice]
        );
    }

    #[test]
    fn test_non_choice_rule_needs_valid_regex() {
        let form_id = FormId::new();
        let q = question(form_id, "s1", QuestionKind::ShortText);
        let key = q.id.to_string();
        let catalog = QuestionCatalog::from_refs([q]);

        let ok = branching(Some(rule(ConditionSource::NonChoice, "s1", &key, "^yes$")));
        assert!(validate_activation(&form_id, &ok, &catalog).is_ok());

        let bad = branching(Some(rule(ConditionSource::NonChoice, "s1", &key, "(unclosed")));
        assert_eq!(
            rules(validate_activation(&form_id, &bad, &catalog)),
            vec![ViolationRule::InvalidPattern]
        );
    }

    #[test]
    fn test_source_mismatch() {
        let form_id = FormId::new();
        let q = question(form_id, "s1", QuestionKind::LongText);
        let graph = branching(Some(rule(ConditionSource::Choice, "s1", &q.id.to_string(), "x")));
        let catalog = QuestionCatalog::from_refs([q]);
        assert_eq!(
            rules(validate_activation(&form_id, &graph, &catalog)),
            vec![ViolationRule::SourceMismatch]
        );
    }

    #[test]
    fn test_question_lookup_failures() {
        let form_id = FormId::new();
        let not_uuid = branching(Some(rule(ConditionSource::Choice, "s1", "q-1", "x")));
        assert_eq!(
            rules(validate_activation(&form_id, &not_uuid, &QuestionCatalog::new())),
            vec![ViolationRule::QuestionNotFound]
        );

        let foreign = question(FormId::new(), "s1", QuestionKind::SingleChoice);
        let graph = branching(Some(rule(
            ConditionSource::Choice,
            "s1",
            &foreign.id.to_string(),
            "x",
        )));
        let catalog = QuestionCatalog::from_refs([foreign]);
        assert_eq!(
            rules(validate_activation(&form_id, &graph, &catalog)),
            vec![ViolationRule::QuestionInOtherForm]
        );
    }

    #[test]
    fn test_question_must_live_in_rule_node() {
        let form_id = FormId::new();
        let q = question(form_id, "s2", QuestionKind::ShortText);
        let graph = branching(Some(rule(ConditionSource::NonChoice, "s1", &q.id.to_string(), ".*")));
        let catalog = QuestionCatalog::from_refs([q]);
        assert_eq!(
            rules(validate_activation(&form_id, &graph, &catalog)),
            vec![ViolationRule::QuestionNotInSection]
        );
    }

    #[test]
    fn test_incomplete_rule_lists_missing_fields() {
        let partial = ConditionRule {
            source: Some(ConditionSource::Choice),
            node_id: "s1".to_string(),
            ..Default::default()
        };
        let violations =
            validate_activation(&FormId::new(), &branching(Some(partial)), &QuestionCatalog::new())
                .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::IncompleteConditionRule);
        assert!(violations[0].message.contains("key"));
        assert!(violations[0].message.contains("pattern"));
    }

    #[test]
    fn test_dead_loop_has_no_path_to_end() {
        let graph = Graph::from_nodes(vec![
            Node::start("s", "a"),
            Node::section("a", "A", "b"),
            Node::section("b", "B", "a"),
            Node::end("e"),
        ]);
        let strict = rules(validate_activation(&FormId::new(), &graph, &QuestionCatalog::new()));
        assert!(strict.contains(&ViolationRule::NoPathToEnd));
        // The unreachable end is a relaxed violation too.
        assert!(strict.contains(&ViolationRule::UnreachableNode));
    }

    #[test]
    fn test_rule_question_ids_skips_non_uuid_keys() {
        let id = Uuid::now_v7();
        let graph = Graph::from_nodes(vec![
            Node::start("s", "c1"),
            Node::condition("c1", "c2", "c2", Some(rule(ConditionSource::Choice, "s", &id.to_string(), "x"))),
            Node::condition("c2", "e", "e", Some(rule(ConditionSource::Choice, "s", "nope", "x"))),
            Node::end("e"),
        ]);
        assert_eq!(rule_question_ids(&graph), vec![id]);
    }
}
