// graph.rs — Instance tree and trigger graph for Relay programs
//
// Data model shared by instantiation, elaboration, binding, and
// verification: the component-instance arena (keyed by address), the
// access lattice, per-node instance-access sets, and the trigger-graph
// node arena owned by the `Composer`.
//
// Preconditions: populated by `instantiate`, `elaborate`, and `bind`.
// Postconditions: after a successful `verify`, port cardinalities hold and
//                 the Action-reachable subgraph is acyclic and conflict-free.
// Failure modes: none (data-only module; structural violations are
//                detected by `verify`).
// Side effects: none.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::ast::Span;
use crate::id::{ActionId, CompId, FieldId, GetterId, ReactionId};

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Index of an instance in the `Composer`'s instance arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

/// Index of a node in the `Composer`'s node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

// ── Access lattice ──────────────────────────────────────────────────────────

/// Maximal effect a computation exerts on a component instance.
/// Ordered: `None < Read < Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AccessLevel {
    #[default]
    None,
    Read,
    Write,
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccessLevel::None => "none",
            AccessLevel::Read => "read",
            AccessLevel::Write => "write",
        };
        write!(f, "{s}")
    }
}

// ── Instance set ────────────────────────────────────────────────────────────

/// A conflict between two instance sets: the shared instance and the two
/// access levels, at least one of which is `Write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conflict {
    pub instance: InstanceId,
    pub left: AccessLevel,
    pub right: AccessLevel,
}

/// Per-node summary mapping component instances to the maximal access level
/// exercised reaching that node. BTreeMap keeps iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceSet {
    entries: BTreeMap<InstanceId, AccessLevel>,
}

impl InstanceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert taking the maximum with any existing entry. A `None` access
    /// is no access: it is never stored, so membership implies `Read` or
    /// `Write` and `conflict_with` sees only real accesses.
    pub fn insert(&mut self, instance: InstanceId, level: AccessLevel) {
        if level == AccessLevel::None {
            return;
        }
        let entry = self.entries.entry(instance).or_default();
        *entry = (*entry).max(level);
    }

    pub fn get(&self, instance: InstanceId) -> AccessLevel {
        self.entries.get(&instance).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (InstanceId, AccessLevel)> + '_ {
        self.entries.iter().map(|(&i, &l)| (i, l))
    }

    /// Max-merge every entry of `other` into `self`.
    pub fn union(&mut self, other: &InstanceSet) {
        for (instance, level) in other.iter() {
            self.insert(instance, level);
        }
    }

    /// Two sets are compatible iff no instance present in one set at level
    /// `Write` is also present (at any level) in the other. Returns the
    /// first offending instance in id order, or `None` if compatible.
    pub fn conflict_with(&self, other: &InstanceSet) -> Option<Conflict> {
        for (instance, left) in self.iter() {
            let right = match other.entries.get(&instance) {
                Some(&l) => l,
                None => continue,
            };
            if left == AccessLevel::Write || right == AccessLevel::Write {
                return Some(Conflict {
                    instance,
                    left,
                    right,
                });
            }
        }
        None
    }
}

// ── Instances ───────────────────────────────────────────────────────────────

/// A component-instantiation record. Immutable after instantiation except
/// for `linked`, which accumulates during elaboration.
#[derive(Debug, Clone)]
pub struct Instance {
    pub id: InstanceId,
    /// Owning parent; `None` for the top-level instance.
    pub parent: Option<InstanceId>,
    pub comp: CompId,
    /// Stable address: the instance's identity.
    pub address: u32,
    /// Display path from the root, e.g. `main.stage[2]`.
    pub path: String,
    /// Instances whose action preconditions read this instance.
    pub linked: BTreeSet<InstanceId>,
}

// ── Graph nodes ─────────────────────────────────────────────────────────────

/// A node in the trigger graph. Edges point at the computations a node
/// triggers or depends on. Traversal state and computed instance sets are
/// owned by the verifier, not the node.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    /// Display name, e.g. `main.stage[2].tick` or `main.out_port`.
    pub name: String,
    pub span: Span,
    pub kind: NodeKind,
    pub edges: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Action {
        instance: InstanceId,
        action: ActionId,
        index: Option<u32>,
        /// Receiver access of the guard expression.
        precondition: AccessLevel,
        /// Receiver access of the non-activated body.
        immutable: AccessLevel,
    },
    Reaction {
        instance: InstanceId,
        reaction: ReactionId,
        index: Option<u32>,
        immutable: AccessLevel,
        /// Number of push ports bound to this reaction; must be ≤ 1.
        inbound: u32,
    },
    Getter {
        instance: InstanceId,
        getter: GetterId,
        immutable: AccessLevel,
    },
    Activation {
        instance: InstanceId,
        /// Receiver access of the mutable-phase body.
        access: AccessLevel,
    },
    PushPort {
        address: u32,
        instance: InstanceId,
        field: FieldId,
    },
    PullPort {
        address: u32,
        instance: InstanceId,
        field: FieldId,
    },
}

impl NodeKind {
    /// The instance a node's own self-access applies to, and that access.
    pub fn self_access(&self) -> Option<(InstanceId, AccessLevel)> {
        match *self {
            NodeKind::Action {
                instance,
                precondition,
                immutable,
                ..
            } => Some((instance, precondition.max(immutable))),
            NodeKind::Reaction {
                instance, immutable, ..
            } => Some((instance, immutable)),
            NodeKind::Getter {
                instance, immutable, ..
            } => Some((instance, immutable)),
            NodeKind::Activation { instance, access } => Some((instance, access)),
            NodeKind::PushPort { .. } | NodeKind::PullPort { .. } => None,
        }
    }
}

// ── Composer ────────────────────────────────────────────────────────────────

/// Owns all instances and graph nodes for the compilation unit.
///
/// Instances and ports are keyed by address; reactions and getters by
/// `(instance, declaration, index)` so that every logical activation has
/// exactly one node regardless of how many sites reference it.
#[derive(Debug, Default)]
pub struct Composer {
    instances: Vec<Instance>,
    by_address: HashMap<u32, InstanceId>,
    nodes: Vec<Node>,
    push_ports: HashMap<u32, NodeId>,
    pull_ports: HashMap<u32, NodeId>,
    reactions: HashMap<(InstanceId, ReactionId, Option<u32>), NodeId>,
    getters: HashMap<(InstanceId, GetterId), NodeId>,
    actions: Vec<NodeId>,
    /// Reference-field slot address → target instance address, wired during
    /// instantiation and consumed by the symbolic evaluator's pointer load.
    pointers: HashMap<u32, u32>,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Instances ────────────────────────────────────────────────────────

    pub fn add_instance(
        &mut self,
        parent: Option<InstanceId>,
        comp: CompId,
        address: u32,
        path: String,
    ) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        self.instances.push(Instance {
            id,
            parent,
            comp,
            address,
            path,
            linked: BTreeSet::new(),
        });
        self.by_address.insert(address, id);
        id
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0 as usize]
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Instance whose record starts at `address`, if any.
    pub fn instance_at(&self, address: u32) -> Option<InstanceId> {
        self.by_address.get(&address).copied()
    }

    /// Record that `reader`'s action precondition reads `target`.
    pub fn link_instances(&mut self, target: InstanceId, reader: InstanceId) {
        self.instances[target.0 as usize].linked.insert(reader);
    }

    // ── Pointers ─────────────────────────────────────────────────────────

    pub fn wire_pointer(&mut self, slot: u32, target: u32) {
        self.pointers.insert(slot, target);
    }

    pub fn pointer_target(&self, slot: u32) -> Option<u32> {
        self.pointers.get(&slot).copied()
    }

    // ── Nodes ────────────────────────────────────────────────────────────

    fn push_node(&mut self, name: String, span: Span, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            name,
            span,
            kind,
            edges: Vec::new(),
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from.0 as usize].edges.push(to);
    }

    /// Register a push-port element at its resolved address.
    pub fn register_push_port(
        &mut self,
        address: u32,
        instance: InstanceId,
        field: FieldId,
        name: String,
        span: Span,
    ) -> NodeId {
        let id = self.push_node(
            name,
            span,
            NodeKind::PushPort {
                address,
                instance,
                field,
            },
        );
        self.push_ports.insert(address, id);
        id
    }

    /// Register a pull-port element at its resolved address.
    pub fn register_pull_port(
        &mut self,
        address: u32,
        instance: InstanceId,
        field: FieldId,
        name: String,
        span: Span,
    ) -> NodeId {
        let id = self.push_node(
            name,
            span,
            NodeKind::PullPort {
                address,
                instance,
                field,
            },
        );
        self.pull_ports.insert(address, id);
        id
    }

    pub fn push_port_at(&self, address: u32) -> Option<NodeId> {
        self.push_ports.get(&address).copied()
    }

    pub fn pull_port_at(&self, address: u32) -> Option<NodeId> {
        self.pull_ports.get(&address).copied()
    }

    pub fn pull_ports(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.pull_ports.values().copied()
    }

    /// Create the Action node for one (instance, action, index) activation.
    pub fn add_action(
        &mut self,
        instance: InstanceId,
        action: ActionId,
        index: Option<u32>,
        precondition: AccessLevel,
        immutable: AccessLevel,
        name: String,
        span: Span,
    ) -> NodeId {
        let id = self.push_node(
            name,
            span,
            NodeKind::Action {
                instance,
                action,
                index,
                precondition,
                immutable,
            },
        );
        self.actions.push(id);
        id
    }

    /// Action nodes in creation order: the only roots of triggering.
    pub fn actions(&self) -> &[NodeId] {
        &self.actions
    }

    /// One node per (instance, reaction, index), created on first use.
    pub fn intern_reaction(
        &mut self,
        instance: InstanceId,
        reaction: ReactionId,
        index: Option<u32>,
        immutable: AccessLevel,
        name: String,
        span: Span,
    ) -> NodeId {
        if let Some(&id) = self.reactions.get(&(instance, reaction, index)) {
            return id;
        }
        let id = self.push_node(
            name,
            span,
            NodeKind::Reaction {
                instance,
                reaction,
                index,
                immutable,
                inbound: 0,
            },
        );
        self.reactions.insert((instance, reaction, index), id);
        id
    }

    /// One node per (instance, getter), created on first use.
    pub fn intern_getter(
        &mut self,
        instance: InstanceId,
        getter: GetterId,
        immutable: AccessLevel,
        name: String,
        span: Span,
    ) -> NodeId {
        if let Some(&id) = self.getters.get(&(instance, getter)) {
            return id;
        }
        let id = self.push_node(
            name,
            span,
            NodeKind::Getter {
                instance,
                getter,
                immutable,
            },
        );
        self.getters.insert((instance, getter), id);
        id
    }

    /// Activation nodes are per-site-per-elaboration, never deduplicated.
    pub fn add_activation(
        &mut self,
        instance: InstanceId,
        access: AccessLevel,
        name: String,
        span: Span,
    ) -> NodeId {
        self.push_node(name, span, NodeKind::Activation { instance, access })
    }

    /// Count a push port binding against a reaction's cardinality budget.
    pub fn bump_reaction_inbound(&mut self, id: NodeId) {
        match &mut self.nodes[id.0 as usize].kind {
            NodeKind::Reaction { inbound, .. } => *inbound += 1,
            other => unreachable!("inbound bump on non-reaction node: {other:?}"),
        }
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for Composer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Composer ({} instances, {} nodes, {} actions)",
            self.instances.len(),
            self.nodes.len(),
            self.actions.len()
        )?;
        for inst in &self.instances {
            writeln!(f, "  instance {:>4}  {}", inst.address, inst.path)?;
        }
        for node in &self.nodes {
            let kind = match &node.kind {
                NodeKind::Action { .. } => "action",
                NodeKind::Reaction { .. } => "reaction",
                NodeKind::Getter { .. } => "getter",
                NodeKind::Activation { .. } => "activation",
                NodeKind::PushPort { .. } => "push-port",
                NodeKind::PullPort { .. } => "pull-port",
            };
            write!(f, "  {:<10} {}", kind, node.name)?;
            if !node.edges.is_empty() {
                let targets: Vec<&str> = node
                    .edges
                    .iter()
                    .map(|&e| self.node(e).name.as_str())
                    .collect();
                write!(f, " -> {}", targets.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_level_order() {
        assert!(AccessLevel::None < AccessLevel::Read);
        assert!(AccessLevel::Read < AccessLevel::Write);
        assert_eq!(AccessLevel::Read.max(AccessLevel::Write), AccessLevel::Write);
    }

    #[test]
    fn instance_set_insert_takes_max() {
        let mut set = InstanceSet::new();
        set.insert(InstanceId(0), AccessLevel::Write);
        set.insert(InstanceId(0), AccessLevel::Read);
        assert_eq!(set.get(InstanceId(0)), AccessLevel::Write);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn none_access_is_not_stored() {
        let mut set = InstanceSet::new();
        set.insert(InstanceId(0), AccessLevel::None);
        assert!(set.is_empty());
        let mut writer = InstanceSet::new();
        writer.insert(InstanceId(0), AccessLevel::Write);
        assert_eq!(set.conflict_with(&writer), None);
    }

    #[test]
    fn read_read_is_compatible() {
        let mut a = InstanceSet::new();
        a.insert(InstanceId(3), AccessLevel::Read);
        let mut b = InstanceSet::new();
        b.insert(InstanceId(3), AccessLevel::Read);
        assert_eq!(a.conflict_with(&b), None);
    }

    #[test]
    fn write_read_conflicts() {
        let mut a = InstanceSet::new();
        a.insert(InstanceId(3), AccessLevel::Write);
        let mut b = InstanceSet::new();
        b.insert(InstanceId(3), AccessLevel::Read);
        let c = a.conflict_with(&b).expect("expected conflict");
        assert_eq!(c.instance, InstanceId(3));
        assert_eq!(c.left, AccessLevel::Write);
        assert_eq!(c.right, AccessLevel::Read);
    }

    #[test]
    fn disjoint_sets_are_compatible() {
        let mut a = InstanceSet::new();
        a.insert(InstanceId(0), AccessLevel::Write);
        let mut b = InstanceSet::new();
        b.insert(InstanceId(1), AccessLevel::Write);
        assert_eq!(a.conflict_with(&b), None);
    }

    #[test]
    fn union_takes_max_per_instance() {
        let mut a = InstanceSet::new();
        a.insert(InstanceId(0), AccessLevel::Read);
        let mut b = InstanceSet::new();
        b.insert(InstanceId(0), AccessLevel::Write);
        b.insert(InstanceId(1), AccessLevel::Read);
        a.union(&b);
        assert_eq!(a.get(InstanceId(0)), AccessLevel::Write);
        assert_eq!(a.get(InstanceId(1)), AccessLevel::Read);
    }

    #[test]
    fn reaction_interning_is_keyed_by_index() {
        use crate::ast::Span;
        let mut composer = Composer::new();
        let inst = composer.add_instance(None, CompId(0), 0, "root".into());
        let a = composer.intern_reaction(
            inst,
            ReactionId(0),
            Some(0),
            AccessLevel::Read,
            "root.r[0]".into(),
            Span::dummy(),
        );
        let b = composer.intern_reaction(
            inst,
            ReactionId(0),
            Some(0),
            AccessLevel::Read,
            "root.r[0]".into(),
            Span::dummy(),
        );
        let c = composer.intern_reaction(
            inst,
            ReactionId(0),
            Some(1),
            AccessLevel::Read,
            "root.r[1]".into(),
            Span::dummy(),
        );
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(composer.node_count(), 2);
    }
}
