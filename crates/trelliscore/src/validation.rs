//! Structural checks run before a workflow or connection is persisted.

use crate::{Connection, NodeId, ValidationError, ValidationErrors, Workflow};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent};
use std::collections::{HashMap, HashSet};

/// Check the whole graph, accumulating every failure.
///
/// In order: exactly one trigger, connection integrity, no orphaned
/// non-trigger nodes, and no cycle reachable from the trigger.
pub fn validate(workflow: &Workflow) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    let triggers: Vec<NodeId> = workflow.trigger_nodes().map(|n| n.id).collect();
    match triggers.len() {
        0 => errors.push(ValidationError::NoTrigger),
        1 => {}
        n => errors.push(ValidationError::MultipleTriggers(n)),
    }

    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(node.id) {
            errors.push(ValidationError::DuplicateNode(node.id));
        }
    }

    check_connections(workflow, &seen, &mut errors);

    let targets: HashSet<NodeId> = workflow.connections.iter().map(|c| c.target).collect();
    for node in &workflow.nodes {
        if !triggers.contains(&node.id) && !targets.contains(&node.id) {
            errors.push(ValidationError::OrphanNode {
                id: node.id,
                name: node.name.clone(),
            });
        }
    }

    if let [trigger] = triggers.as_slice() {
        errors.extend(find_cycles(workflow, *trigger).into_iter().map(ValidationError::Cycle));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

/// Check a connection before it is added to `workflow`.
pub fn validate_connection(workflow: &Workflow, candidate: &Connection) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    for endpoint in [candidate.source, candidate.target] {
        if workflow.find_node(endpoint).is_none() {
            errors.push(ValidationError::MissingEndpoint {
                connection: candidate.id,
                node: endpoint,
            });
        }
    }

    if candidate.source == candidate.target {
        errors.push(ValidationError::SelfLoop(candidate.source));
    }

    let duplicate = workflow
        .connections
        .iter()
        .any(|c| c.source == candidate.source && c.target == candidate.target);
    if duplicate {
        errors.push(ValidationError::DuplicateConnection {
            from: candidate.source,
            to: candidate.target,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

fn check_connections(workflow: &Workflow, nodes: &HashSet<NodeId>, errors: &mut Vec<ValidationError>) {
    let mut pairs = HashSet::new();

    for conn in &workflow.connections {
        for endpoint in [conn.source, conn.target] {
            if !nodes.contains(&endpoint) {
                errors.push(ValidationError::MissingEndpoint {
                    connection: conn.id,
                    node: endpoint,
                });
            }
        }
        if conn.source == conn.target {
            errors.push(ValidationError::SelfLoop(conn.source));
        }
        if !pairs.insert((conn.source, conn.target)) {
            errors.push(ValidationError::DuplicateConnection {
                from: conn.source,
                to: conn.target,
            });
        }
    }
}

/// Targets of back-edges met by a depth-first search from `start`.
fn find_cycles(workflow: &Workflow, start: NodeId) -> Vec<NodeId> {
    let mut graph = DiGraph::<NodeId, ()>::new();
    let mut index: HashMap<NodeId, NodeIndex> = HashMap::new();

    for node in &workflow.nodes {
        index.entry(node.id).or_insert_with(|| graph.add_node(node.id));
    }
    for conn in &workflow.connections {
        if let (Some(&from), Some(&to)) = (index.get(&conn.source), index.get(&conn.target)) {
            graph.add_edge(from, to, ());
        }
    }

    let Some(&root) = index.get(&start) else {
        return Vec::new();
    };

    let mut cycles = Vec::new();
    depth_first_search(&graph, Some(root), |event| {
        if let DfsEvent::BackEdge(_, to) = event {
            let node = graph[to];
            if !cycles.contains(&node) {
                cycles.push(node);
            }
        }
        Control::<()>::Continue
    });
    cycles
}
