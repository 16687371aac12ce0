// verify.rs — Structural verification of the composed trigger graph
//
// Three phases over the finished graph, each collecting every violation it
// can see before the next phase runs:
//
//   1. Port and reaction cardinality: every pull port answered by exactly
//      one getter, every reaction fed by at most one push port.
//   2. Acyclicity: a three-state depth-first search from every Action node;
//      any back edge is a recursive composition.
//   3. Conflict freedom: bottom-up instance-set computation over the
//      acyclic Action-reachable subgraph, checking at each Activation node
//      that its concurrently triggered children are pairwise compatible.
//
// Phase 3 only runs when phase 2 found no cycles, since instance sets are
// defined over an acyclic graph. Traversal marks and computed sets live in
// verifier-owned tables indexed by `NodeId`, never on the nodes.
//
// Preconditions: `composer` was populated by `instantiate`, `elaborate`,
//   and `bind`.
// Postconditions: an empty diagnostic list means the graph satisfies all
//                 three structural guarantees.
// Failure modes: none (violations become diagnostics, not errors).
// Side effects: none.

use crate::diag::{codes, DiagLevel, Diagnostic};
use crate::graph::{Composer, InstanceSet, NodeId, NodeKind};

/// Outcome of verification: the collected diagnostics plus the per-node
/// instance sets (populated only for Action-reachable nodes of an acyclic
/// graph).
#[derive(Debug)]
pub struct VerifyResult {
    pub diagnostics: Vec<Diagnostic>,
    instance_sets: Vec<Option<InstanceSet>>,
}

impl VerifyResult {
    /// The computed instance set of `node`, if phase 3 reached it.
    pub fn instance_set(&self, node: NodeId) -> Option<&InstanceSet> {
        self.instance_sets[node.0 as usize].as_ref()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.level == DiagLevel::Error)
    }
}

/// Verify the composed graph, returning every structural violation found.
pub fn verify(composer: &Composer) -> VerifyResult {
    let mut diagnostics = Vec::new();

    check_cardinality(composer, &mut diagnostics);
    let traversal = check_acyclic(composer, &mut diagnostics);

    let mut instance_sets = vec![None; composer.node_count()];
    if traversal.cycles.is_empty() {
        check_conflicts(
            composer,
            &traversal.postorder,
            &mut instance_sets,
            &mut diagnostics,
        );
    }

    VerifyResult {
        diagnostics,
        instance_sets,
    }
}

// ── Phase 1: cardinality ────────────────────────────────────────────────────

fn check_cardinality(composer: &Composer, diagnostics: &mut Vec<Diagnostic>) {
    let mut pull_ports: Vec<NodeId> = composer.pull_ports().collect();
    pull_ports.sort();
    for id in pull_ports {
        let node = composer.node(id);
        match node.edges.len() {
            1 => {}
            0 => diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Error,
                    node.span,
                    format!("pull port '{}' has no bound getter", node.name),
                )
                .with_code(codes::E0801)
                .with_hint("add a `bind` statement answering this port"),
            ),
            n => diagnostics.push(
                Diagnostic::new(
                    DiagLevel::Error,
                    node.span,
                    format!("pull port '{}' is bound to {n} getters", node.name),
                )
                .with_code(codes::E0802),
            ),
        }
    }

    for node in composer.nodes() {
        if let NodeKind::Reaction { inbound, .. } = node.kind {
            if inbound > 1 {
                diagnostics.push(
                    Diagnostic::new(
                        DiagLevel::Error,
                        node.span,
                        format!(
                            "reaction '{}' is bound to {inbound} push ports",
                            node.name
                        ),
                    )
                    .with_code(codes::E0803),
                );
            }
        }
    }
}

// ── Phase 2: acyclicity ─────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

struct Traversal {
    /// Action-reachable nodes, every node after all of its successors.
    postorder: Vec<NodeId>,
    cycles: Vec<Vec<NodeId>>,
}

fn check_acyclic(composer: &Composer, diagnostics: &mut Vec<Diagnostic>) -> Traversal {
    let mut traversal = Traversal {
        postorder: Vec::new(),
        cycles: Vec::new(),
    };
    let mut marks = vec![Mark::Unvisited; composer.node_count()];
    let mut path = Vec::new();
    for &action in composer.actions() {
        if marks[action.0 as usize] == Mark::Unvisited {
            dfs(composer, action, &mut marks, &mut path, &mut traversal);
        }
    }
    debug_assert!(path.is_empty());

    for cycle in &traversal.cycles {
        let mut names: Vec<&str> = cycle
            .iter()
            .map(|&id| composer.node(id).name.as_str())
            .collect();
        names.push(names[0]);
        let head = composer.node(cycle[0]);
        let mut diag = Diagnostic::new(
            DiagLevel::Error,
            head.span,
            format!("recursive composition: {}", names.join(" -> ")),
        )
        .with_code(codes::E0804);
        for &id in &cycle[1..] {
            let node = composer.node(id);
            diag = diag.with_related(node.span, format!("cycle passes through '{}'", node.name));
        }
        diagnostics.push(diag);
    }
    traversal
}

fn dfs(
    composer: &Composer,
    node: NodeId,
    marks: &mut [Mark],
    path: &mut Vec<NodeId>,
    traversal: &mut Traversal,
) {
    marks[node.0 as usize] = Mark::InProgress;
    path.push(node);
    for &next in &composer.node(node).edges {
        match marks[next.0 as usize] {
            Mark::Unvisited => dfs(composer, next, marks, path, traversal),
            Mark::InProgress => {
                // Back edge: the cycle is the path suffix from `next`.
                let start = path.iter().position(|&n| n == next).unwrap();
                traversal.cycles.push(path[start..].to_vec());
            }
            Mark::Done => {}
        }
    }
    path.pop();
    marks[node.0 as usize] = Mark::Done;
    traversal.postorder.push(node);
}

// ── Phase 3: conflict freedom ───────────────────────────────────────────────

fn check_conflicts(
    composer: &Composer,
    postorder: &[NodeId],
    instance_sets: &mut [Option<InstanceSet>],
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Postorder guarantees every successor's set exists before its
    // predecessors ask for it, so each set is computed exactly once.
    for &id in postorder {
        let node = composer.node(id);
        let mut set = InstanceSet::new();
        if let Some((instance, level)) = node.kind.self_access() {
            set.insert(instance, level);
        }
        match node.kind {
            NodeKind::Activation { .. } => {
                // Children of an Activation run concurrently: each child's
                // set must be compatible with everything accumulated from
                // its left siblings (and the activation's own access).
                for &child in &node.edges {
                    let child_set = instance_sets[child.0 as usize]
                        .as_ref()
                        .unwrap_or_else(|| unreachable!("postorder violated"));
                    if let Some(conflict) = set.conflict_with(child_set) {
                        let shared = composer.instance(conflict.instance);
                        diagnostics.push(
                            Diagnostic::new(
                                DiagLevel::Error,
                                node.span,
                                format!(
                                    "non-deterministic composition: '{}' is accessed \
                                     {} and {} by concurrently triggered computations \
                                     under '{}'",
                                    shared.path, conflict.left, conflict.right, node.name
                                ),
                            )
                            .with_code(codes::E0805)
                            .with_related(
                                composer.node(child).span,
                                format!("conflicting trigger '{}'", composer.node(child).name),
                            )
                            .with_hint(
                                "make the overlapping accesses read-only or split them \
                                 across activations",
                            ),
                        );
                    }
                    set.union(child_set);
                }
            }
            _ => {
                // Sequential composition: plain union over successors.
                for &child in &node.edges {
                    let child_set = instance_sets[child.0 as usize]
                        .as_ref()
                        .unwrap_or_else(|| unreachable!("postorder violated"));
                    set.union(child_set);
                }
            }
        }
        instance_sets[id.0 as usize] = Some(set);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
