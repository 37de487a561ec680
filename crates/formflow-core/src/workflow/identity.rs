//! Node identity checks across edits.
//!
//! Node ids are stable handles: condition rules and recorded answers keep
//! pointing at them after an edit. An id that survives an edit must still
//! denote the same kind of node.

use std::collections::{HashMap, HashSet};

use formflow_types::workflow::{NodeType, Violation, ViolationRule};

use super::graph::Graph;

/// Guard for in-place draft edits.
///
/// Ids may be added (new nodes) or dropped (deleted nodes), but an id present
/// in both graphs must keep its node type.
pub fn validate_update_node_ids(current: &Graph, new: &Graph) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_repurposed(current, new, &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

/// Guard for edits that must leave the node set exactly as it was (e.g.
/// label-only edits): no additions, removals, or repurposed ids.
pub fn validate_node_ids_unchanged(current: &Graph, new: &Graph) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_repurposed(current, new, &mut violations);

    let before = types_by_id(current);
    let after = types_by_id(new);
    for node in new.nodes() {
        if !before.contains_key(node.id.as_str()) {
            violations.push(Violation::node(
                ViolationRule::NodeAdded,
                &node.id,
                "node was added where the node set must stay unchanged",
            ));
        }
    }
    for node in current.nodes() {
        if !after.contains_key(node.id.as_str()) {
            violations.push(Violation::node(
                ViolationRule::NodeRemoved,
                &node.id,
                "node was removed where the node set must stay unchanged",
            ));
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_repurposed(current: &Graph, new: &Graph, out: &mut Vec<Violation>) {
    let before = types_by_id(current);
    let mut seen = HashSet::new();
    for node in new.nodes() {
        if !seen.insert(node.id.as_str()) {
            continue;
        }
        let now = node.node_type();
        if let Some(&was) = before.get(node.id.as_str()) {
            if was != now {
                out.push(Violation::node(
                    ViolationRule::NodeRepurposed,
                    &node.id,
                    format!("node id was a {was} node and cannot become a {now} node"),
                ));
            }
        }
    }
}

fn types_by_id(graph: &Graph) -> HashMap<&str, NodeType> {
    let mut map = HashMap::new();
    for node in graph.nodes() {
        map.entry(node.id.as_str()).or_insert_with(|| node.node_type());
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_types::workflow::Node;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Graph {
        Graph::parse(&serde_json::to_vec(&value).unwrap()).unwrap()
    }

    fn base() -> Graph {
        Graph::from_nodes(vec![
            Node::start("start", "A"),
            Node::section("A", "Section A", "end"),
            Node::end("end"),
        ])
    }

    #[test]
    fn test_section_becoming_condition_is_rejected() {
        let current = parse(json!([
            {"id": "S", "type": "start", "next": "A"},
            {"id": "A", "type": "section", "label": "Questions", "next": "E"},
            {"id": "E", "type": "end"}
        ]));
        let edited = parse(json!([
            {"id": "S", "type": "start", "next": "A"},
            {"id": "A", "type": "condition", "label": "Questions", "nextTrue": "E", "nextFalse": "E"},
            {"id": "E", "type": "end"}
        ]));
        let violations = validate_update_node_ids(&current, &edited).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::NodeRepurposed);
        assert_eq!(violations[0].node_id.as_deref(), Some("A"));
    }

    #[test]
    fn test_update_allows_additions_removals_and_relabels() {
        let edited = Graph::from_nodes(vec![
            Node::start("start", "B"),
            Node::section("B", "Brand new", "end"),
            Node::end("end"),
        ]);
        assert!(validate_update_node_ids(&base(), &edited).is_ok());

        let mut relabeled = base();
        relabeled.rename_node("A", "Renamed").unwrap();
        assert!(validate_update_node_ids(&base(), &relabeled).is_ok());
    }

    #[test]
    fn test_unchanged_accepts_label_edit() {
        let mut relabeled = base();
        relabeled.rename_node("A", "Renamed").unwrap();
        assert!(validate_node_ids_unchanged(&base(), &relabeled).is_ok());
    }

    #[test]
    fn test_unchanged_rejects_added_and_removed() {
        let edited = Graph::from_nodes(vec![
            Node::start("start", "B"),
            Node::section("B", "Brand new", "end"),
            Node::end("end"),
        ]);
        let violations = validate_node_ids_unchanged(&base(), &edited).unwrap_err();
        let found: Vec<_> = violations.iter().map(|v| (v.rule, v.node_id.clone())).collect();
        assert!(found.contains(&(ViolationRule::NodeAdded, Some("B".to_string()))));
        assert!(found.contains(&(ViolationRule::NodeRemoved, Some("A".to_string()))));
    }

    #[test]
    fn test_unchanged_rejects_repurposed() {
        let edited = Graph::from_nodes(vec![
            Node::start("start", "A"),
            Node::condition("A", "end", "end", None),
            Node::end("end"),
        ]);
        let violations = validate_node_ids_unchanged(&base(), &edited).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule, ViolationRule::NodeRepurposed);
    }
}
