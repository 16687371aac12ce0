// id.rs — Stable semantic identifiers for Relay compiler phases
//
// These IDs provide deterministic, span-independent identity for compiler
// artifacts. Declaration ids (`CompId`, `FieldId`, ...) are indices into the
// owning declaration vectors, assigned by the frontend in source order.
// `ExprId` and `SiteId` are allocated across the whole unit so that effect
// inference can key its side tables without touching the tree.

use serde::{Deserialize, Serialize};

/// Index of a component declaration in `Program::components`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompId(pub u32);

/// Index of a field declaration within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub u32);

/// Index of a method declaration within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId(pub u32);

/// Index of an action declaration within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId(pub u32);

/// Index of a reaction declaration within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReactionId(pub u32);

/// Index of a getter declaration within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GetterId(pub u32);

/// Stable identifier for an expression node, unique across the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub u32);

/// Stable identifier for an `activate` statement site, unique across the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub u32);

/// Allocator for unit-wide IDs. Produces monotonically increasing IDs in
/// allocation (source) order, ensuring deterministic assignment.
#[derive(Debug, Default)]
pub struct IdAllocator {
    next_expr: u32,
    next_site: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self) -> ExprId {
        let id = ExprId(self.next_expr);
        self.next_expr += 1;
        id
    }

    pub fn alloc_site(&mut self) -> SiteId {
        let id = SiteId(self.next_site);
        self.next_site += 1;
        id
    }
}
