//! The validator: structural checks over a workflow definition
//!
//! Every check appends to a shared issue list rather than returning
//! early, so one validation pass reports everything that is wrong.

use crate::{IssueKind, ValidationIssue, ValidationReport};
use limsflow_types::{NodeId, NodeKind, WorkflowDefinition};
use std::collections::{HashMap, HashSet, VecDeque};

/// Node kinds whose outgoing edges may legitimately branch, and which
/// therefore can serve as the exit of a loop.
fn is_branching(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Decision | NodeKind::Approval | NodeKind::Review
    )
}

/// Validate a workflow definition, returning every issue found.
pub fn validate(def: &WorkflowDefinition) -> ValidationReport {
    let mut issues = Vec::new();

    check_start_and_end(def, &mut issues);
    check_unique_node_ids(def, &mut issues);
    check_edge_endpoints(def, &mut issues);
    check_degrees(def, &mut issues);
    check_reachability(def, &mut issues);
    check_branch_labels(def, &mut issues);
    check_decision_shape(def, &mut issues);
    check_node_config(def, &mut issues);
    check_unguarded_loops(def, &mut issues);

    ValidationReport { issues }
}

fn check_start_and_end(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    let starts: Vec<&NodeId> = def
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .map(|n| &n.id)
        .collect();

    match starts.len() {
        0 => issues.push(ValidationIssue::new(
            IssueKind::NoStartNode,
            None,
            "workflow must have exactly one Start node",
        )),
        1 => {}
        _ => {
            for id in &starts[1..] {
                issues.push(ValidationIssue::new(
                    IssueKind::MultipleStartNodes,
                    Some((*id).clone()),
                    "workflow must have exactly one Start node",
                ));
            }
        }
    }

    if !def.nodes.iter().any(|n| n.kind == NodeKind::End) {
        issues.push(ValidationIssue::new(
            IssueKind::NoEndNode,
            None,
            "workflow must have at least one End node",
        ));
    }
}

fn check_unique_node_ids(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    let mut seen = HashSet::new();
    for node in &def.nodes {
        if !seen.insert(&node.id) {
            issues.push(ValidationIssue::new(
                IssueKind::DuplicateNodeId,
                Some(node.id.clone()),
                "node id is used more than once",
            ));
        }
    }
}

fn check_edge_endpoints(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    let node_ids: HashSet<&NodeId> = def.nodes.iter().map(|n| &n.id).collect();
    for edge in &def.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !node_ids.contains(endpoint) {
                issues.push(ValidationIssue::new(
                    IssueKind::UnknownEdgeEndpoint,
                    Some(endpoint.clone()),
                    format!("edge {} references a node that does not exist", edge),
                ));
            }
        }
    }
}

fn check_degrees(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    for node in &def.nodes {
        if node.kind != NodeKind::End && def.outgoing_edges(&node.id).is_empty() {
            issues.push(ValidationIssue::new(
                IssueKind::MissingOutgoingEdge,
                Some(node.id.clone()),
                "non-End node has no outgoing edge",
            ));
        }
        if node.kind != NodeKind::Start && def.incoming_edges(&node.id).is_empty() {
            issues.push(ValidationIssue::new(
                IssueKind::MissingIncomingEdge,
                Some(node.id.clone()),
                "non-Start node has no incoming edge",
            ));
        }
    }
}

/// Forward BFS from Start finds unreachable nodes; reverse BFS from the
/// End set finds nodes that can never finish.
fn check_reachability(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    let Some(start) = def.start_node() else {
        // Reported by check_start_and_end; nothing meaningful to walk.
        return;
    };

    let mut forward: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    let mut reverse: HashMap<&NodeId, Vec<&NodeId>> = HashMap::new();
    for edge in &def.edges {
        forward.entry(&edge.source).or_default().push(&edge.target);
        reverse.entry(&edge.target).or_default().push(&edge.source);
    }

    let reachable = bfs(std::iter::once(&start.id), &forward);
    for node in &def.nodes {
        if !reachable.contains(&node.id) {
            issues.push(ValidationIssue::new(
                IssueKind::UnreachableNode,
                Some(node.id.clone()),
                "node is not reachable from the Start node",
            ));
        }
    }

    let can_finish = bfs(
        def.end_nodes().into_iter().map(|n| &n.id),
        &reverse,
    );
    for node in &def.nodes {
        if node.kind != NodeKind::End && !can_finish.contains(&node.id) {
            issues.push(ValidationIssue::new(
                IssueKind::DeadEndNode,
                Some(node.id.clone()),
                "no path from this node reaches an End node",
            ));
        }
    }
}

fn bfs<'a>(
    roots: impl Iterator<Item = &'a NodeId>,
    adjacency: &HashMap<&'a NodeId, Vec<&'a NodeId>>,
) -> HashSet<&'a NodeId> {
    let mut visited: HashSet<&NodeId> = HashSet::new();
    let mut queue: VecDeque<&NodeId> = VecDeque::new();
    for root in roots {
        if visited.insert(root) {
            queue.push_back(root);
        }
    }
    while let Some(current) = queue.pop_front() {
        if let Some(neighbors) = adjacency.get(current) {
            for next in neighbors {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
    }
    visited
}

fn check_branch_labels(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    for node in &def.nodes {
        let mut seen: HashSet<&str> = HashSet::new();
        for edge in def.outgoing_edges(&node.id) {
            if let Some(label) = &edge.label {
                if !seen.insert(label.as_str()) {
                    issues.push(ValidationIssue::new(
                        IssueKind::DuplicateBranchLabel,
                        Some(node.id.clone()),
                        format!("two outgoing edges carry the label '{}'", label),
                    ));
                }
            }
        }
    }
}

fn check_decision_shape(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    for node in def.nodes.iter().filter(|n| n.kind == NodeKind::Decision) {
        let outgoing = def.outgoing_edges(&node.id);

        if outgoing.len() < 2 {
            issues.push(ValidationIssue::new(
                IssueKind::InsufficientDecisionBranches,
                Some(node.id.clone()),
                format!(
                    "Decision node has {} outgoing edge(s), needs at least 2",
                    outgoing.len()
                ),
            ));
        }

        let mut labels: HashSet<&str> = HashSet::new();
        for edge in &outgoing {
            match &edge.label {
                Some(label) => {
                    labels.insert(label.as_str());
                }
                None => issues.push(ValidationIssue::new(
                    IssueKind::UnlabeledDecisionEdge,
                    Some(node.id.clone()),
                    format!("Decision edge {} has no label", edge),
                )),
            }
        }

        for condition in &node.conditions {
            if !labels.contains(condition.target_label.as_str()) {
                issues.push(ValidationIssue::new(
                    IssueKind::DanglingConditionLabel,
                    Some(node.id.clone()),
                    format!(
                        "condition targets label '{}' but no outgoing edge carries it",
                        condition.target_label
                    ),
                ));
            }
        }
    }
}

fn check_node_config(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    for node in &def.nodes {
        match node.kind {
            NodeKind::Process | NodeKind::Approval | NodeKind::Review => {
                if node.assignees.is_empty() {
                    issues.push(ValidationIssue::new(
                        IssueKind::EmptyAssignees,
                        Some(node.id.clone()),
                        format!("{:?} node has no assignees", node.kind),
                    ));
                }
            }
            NodeKind::Wait => match node.duration_secs {
                None | Some(0) => issues.push(ValidationIssue::new(
                    IssueKind::NonPositiveDuration,
                    Some(node.id.clone()),
                    "Wait node requires a positive duration",
                )),
                Some(_) => {}
            },
            NodeKind::Escalation => {
                if node.escalate_to.is_none() {
                    issues.push(ValidationIssue::new(
                        IssueKind::MissingEscalationTarget,
                        Some(node.id.clone()),
                        "Escalation node names no escalation target",
                    ));
                }
                if let Some(0) = node.escalate_after_secs {
                    issues.push(ValidationIssue::new(
                        IssueKind::NonPositiveDuration,
                        Some(node.id.clone()),
                        "escalation delay must be positive when set",
                    ));
                }
            }
            _ => {}
        }
        if let Some(0) = node.duration_secs {
            if node.kind != NodeKind::Wait {
                issues.push(ValidationIssue::new(
                    IssueKind::NonPositiveDuration,
                    Some(node.id.clone()),
                    "node duration must be positive when set",
                ));
            }
        }
    }
}

/// A cycle is "guarded" when some branching node inside it has an edge
/// leaving the cycle. Cycles with no such exit would loop forever, so
/// they are rejected. Detection runs over strongly connected components.
fn check_unguarded_loops(def: &WorkflowDefinition, issues: &mut Vec<ValidationIssue>) {
    let index_of: HashMap<&NodeId, usize> = def
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (&n.id, i))
        .collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); def.nodes.len()];
    for edge in &def.edges {
        if let (Some(&s), Some(&t)) = (index_of.get(&edge.source), index_of.get(&edge.target)) {
            adjacency[s].push(t);
        }
    }

    for component in strongly_connected_components(&adjacency) {
        let in_cycle = component.len() > 1
            || adjacency[component[0]].contains(&component[0]);
        if !in_cycle {
            continue;
        }

        let members: HashSet<usize> = component.iter().copied().collect();
        let has_guarded_exit = component.iter().any(|&i| {
            is_branching(def.nodes[i].kind)
                && adjacency[i].iter().any(|t| !members.contains(t))
        });

        if !has_guarded_exit {
            // Report against the first member in definition order.
            let anchor = component
                .iter()
                .copied()
                .min()
                .and_then(|i| def.nodes.get(i));
            issues.push(ValidationIssue::new(
                IssueKind::UnguardedLoop,
                anchor.map(|n| n.id.clone()),
                format!(
                    "cycle of {} node(s) has no Decision/Approval/Review exit",
                    component.len()
                ),
            ));
        }
    }
}

/// Iterative Tarjan SCC. Recursion is avoided so pathological graphs
/// cannot blow the stack.
fn strongly_connected_components(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    const UNVISITED: usize = usize::MAX;

    let n = adjacency.len();
    let mut index = vec![UNVISITED; n];
    let mut lowlink = vec![UNVISITED; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for root in 0..n {
        if index[root] != UNVISITED {
            continue;
        }
        // Work stack entries: (node, next child position to visit).
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(top) = work.len().checked_sub(1) {
            let (v, child_pos) = work[top];
            if child_pos == 0 {
                index[v] = next_index;
                lowlink[v] = next_index;
                next_index += 1;
                on_stack[v] = true;
                stack.push(v);
            }

            if let Some(&w) = adjacency[v].get(child_pos) {
                work[top].1 += 1;
                if index[w] == UNVISITED {
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                work.pop();
                if lowlink[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    components.push(component);
                }
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
            }
        }
    }

    components
}

#[cfg(test)]
mod tests {
    use super::*;
    use limsflow_types::{labels, PrincipalRef, WorkflowEdge, WorkflowNode};

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    fn minimal() -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new("Minimal", PrincipalRef::user("author"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(
            WorkflowNode::process("work", "Do the work")
                .with_assignee(PrincipalRef::role("tech")),
        )
        .unwrap();
        def.add_node(WorkflowNode::end("end")).unwrap();
        def.add_edge(WorkflowEdge::new(id("start"), id("work"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("work"), id("end"))).unwrap();
        def
    }

    #[test]
    fn test_valid_minimal() {
        let report = validate(&minimal());
        assert!(report.is_valid(), "issues: {}", report.summary());
        assert!(report.issues.is_empty());
    }

    #[test]
    fn test_no_start_node() {
        let mut def = minimal();
        def.nodes.retain(|n| n.kind != NodeKind::Start);
        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::NoStartNode));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_multiple_start_nodes() {
        let mut def = minimal();
        def.nodes.push(WorkflowNode::start("start2"));
        def.edges.push(WorkflowEdge::new(id("start2"), id("work")));
        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::MultipleStartNodes));
    }

    #[test]
    fn test_no_end_node() {
        let mut def = minimal();
        def.nodes.retain(|n| n.kind != NodeKind::End);
        def.edges.retain(|e| e.target != id("end"));
        let report = validate(&def);
        assert!(report.issues.iter().any(|i| i.kind == IssueKind::NoEndNode));
    }

    #[test]
    fn test_duplicate_node_id() {
        let mut def = minimal();
        def.nodes.push(WorkflowNode::process("work", "Again"));
        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::DuplicateNodeId));
    }

    #[test]
    fn test_unknown_edge_endpoint() {
        let mut def = minimal();
        def.edges.push(WorkflowEdge::new(id("work"), id("ghost")));
        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::UnknownEdgeEndpoint));
    }

    #[test]
    fn test_unreachable_node_blocks() {
        let mut def = minimal();
        def.add_node(
            WorkflowNode::process("island", "Unplugged")
                .with_assignee(PrincipalRef::role("tech")),
        )
        .unwrap();
        def.add_edge(WorkflowEdge::new(id("island"), id("end"))).unwrap();
        let report = validate(&def);
        let issue = report
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::UnreachableNode)
            .unwrap();
        assert_eq!(issue.node_id, Some(id("island")));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_dead_end_node() {
        let mut def = minimal();
        def.add_node(WorkflowNode::process("trap", "No way out"))
            .unwrap();
        def.add_edge(WorkflowEdge::new(id("work"), id("trap"))).unwrap();
        // trap has no outgoing edge: both DeadEndNode and
        // MissingOutgoingEdge fire, and the report stays exhaustive.
        let report = validate(&def);
        assert!(report.issues.iter().any(
            |i| i.kind == IssueKind::DeadEndNode && i.node_id == Some(id("trap"))
        ));
        assert!(report.issues.iter().any(
            |i| i.kind == IssueKind::MissingOutgoingEdge && i.node_id == Some(id("trap"))
        ));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_decision_checks() {
        let mut def = WorkflowDefinition::new("Decisions", PrincipalRef::user("a"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(
            WorkflowNode::decision("route", "Route by status")
                .with_condition("status == pass", "pass")
                .with_condition("status == fail", "retest"),
        )
        .unwrap();
        def.add_node(WorkflowNode::end("end")).unwrap();
        def.add_edge(WorkflowEdge::new(id("start"), id("route"))).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("route"), id("end"), "pass"))
            .unwrap();
        // 'retest' has no matching edge, and this unlabeled edge is
        // illegal on a Decision node.
        def.add_edge(WorkflowEdge::new(id("route"), id("end"))).unwrap();

        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::UnlabeledDecisionEdge));
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::DanglingConditionLabel));
    }

    #[test]
    fn test_insufficient_decision_branches() {
        let mut def = WorkflowDefinition::new("One-way", PrincipalRef::user("a"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(WorkflowNode::decision("d", "Pointless")).unwrap();
        def.add_node(WorkflowNode::end("end")).unwrap();
        def.add_edge(WorkflowEdge::new(id("start"), id("d"))).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("d"), id("end"), "only"))
            .unwrap();

        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::InsufficientDecisionBranches));
    }

    #[test]
    fn test_duplicate_branch_label() {
        let mut def = WorkflowDefinition::new("Dup labels", PrincipalRef::user("a"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(WorkflowNode::decision("d", "Choice")).unwrap();
        def.add_node(WorkflowNode::end("a")).unwrap();
        def.add_node(WorkflowNode::end("b")).unwrap();
        def.add_edge(WorkflowEdge::new(id("start"), id("d"))).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("d"), id("a"), "yes")).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("d"), id("b"), "yes")).unwrap();

        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::DuplicateBranchLabel));
    }

    #[test]
    fn test_node_config_checks() {
        let mut def = minimal();
        def.add_node(WorkflowNode::process("triage", "Triage")).unwrap();
        def.add_node(WorkflowNode::approval("appr", "Sign-off")).unwrap();
        def.add_node(WorkflowNode::wait("pause", 0)).unwrap();
        let mut esc = WorkflowNode::escalation("esc", PrincipalRef::role("supervisor"));
        esc.escalate_to = None;
        def.add_node(esc).unwrap();
        def.add_edge(WorkflowEdge::new(id("work"), id("triage"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("triage"), id("appr"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("appr"), id("pause"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("pause"), id("esc"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("esc"), id("end"))).unwrap();

        let report = validate(&def);
        // Process, Approval and Review all need at least one assignee.
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::EmptyAssignees && i.node_id == Some(id("triage"))));
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::EmptyAssignees && i.node_id == Some(id("appr"))));
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::NonPositiveDuration && i.node_id == Some(id("pause"))));
        assert!(report.issues.iter().any(
            |i| i.kind == IssueKind::MissingEscalationTarget && i.node_id == Some(id("esc"))
        ));
    }

    #[test]
    fn test_rejection_loop_is_guarded() {
        // The canonical revise-until-approved shape must validate: the
        // Approval node's 'approved' edge is the loop's exit.
        let mut def = WorkflowDefinition::new("Revise loop", PrincipalRef::user("a"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(
            WorkflowNode::process("draft", "Prepare document")
                .with_assignee(PrincipalRef::role("author")),
        )
        .unwrap();
        def.add_node(
            WorkflowNode::approval("appr", "QA sign-off")
                .with_assignee(PrincipalRef::role("qa")),
        )
        .unwrap();
        def.add_node(WorkflowNode::end("end")).unwrap();
        def.add_edge(WorkflowEdge::new(id("start"), id("draft"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("draft"), id("appr"))).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("appr"), id("end"), labels::APPROVED))
            .unwrap();
        def.add_edge(WorkflowEdge::labeled(id("appr"), id("draft"), labels::REJECTED))
            .unwrap();

        let report = validate(&def);
        assert!(report.is_valid(), "issues: {}", report.summary());
    }

    #[test]
    fn test_unguarded_loop() {
        let mut def = WorkflowDefinition::new("Forever", PrincipalRef::user("a"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(WorkflowNode::process("a", "A")).unwrap();
        def.add_node(WorkflowNode::process("b", "B")).unwrap();
        def.add_node(WorkflowNode::end("end")).unwrap();
        def.add_edge(WorkflowEdge::new(id("start"), id("a"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("a"), id("b"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("b"), id("a"))).unwrap();
        // An exit exists, but only from a Process node, which follows a
        // single edge and cannot choose to leave the cycle.
        def.add_edge(WorkflowEdge::new(id("b"), id("end"))).unwrap();

        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::UnguardedLoop));
    }

    #[test]
    fn test_self_loop_detected() {
        let mut def = minimal();
        def.edges.push(WorkflowEdge::new(id("work"), id("work")));
        let report = validate(&def);
        assert!(report
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::UnguardedLoop));
    }

    #[test]
    fn test_scc_handles_larger_graph() {
        // Two disjoint cycles, one guarded by a Decision, one not.
        let mut def = WorkflowDefinition::new("Two cycles", PrincipalRef::user("a"));
        def.add_node(WorkflowNode::start("start")).unwrap();
        def.add_node(WorkflowNode::decision("d", "Gate")).unwrap();
        def.add_node(WorkflowNode::process("p1", "P1")).unwrap();
        def.add_node(WorkflowNode::process("q1", "Q1")).unwrap();
        def.add_node(WorkflowNode::process("q2", "Q2")).unwrap();
        def.add_node(WorkflowNode::end("end")).unwrap();
        // Guarded cycle: d -> p1 -> d, d -[done]-> q1.
        def.add_edge(WorkflowEdge::new(id("start"), id("d"))).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("d"), id("p1"), "again")).unwrap();
        def.add_edge(WorkflowEdge::new(id("p1"), id("d"))).unwrap();
        def.add_edge(WorkflowEdge::labeled(id("d"), id("q1"), "done")).unwrap();
        // Unguarded cycle: q1 <-> q2.
        def.add_edge(WorkflowEdge::new(id("q1"), id("q2"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("q2"), id("q1"))).unwrap();
        def.add_edge(WorkflowEdge::new(id("q2"), id("end"))).unwrap();

        let report = validate(&def);
        let loops: Vec<_> = report
            .issues
            .iter()
            .filter(|i| i.kind == IssueKind::UnguardedLoop)
            .collect();
        assert_eq!(loops.len(), 1);
    }
}
