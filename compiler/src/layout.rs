// layout.rs — Finalized address/offset assignment, consumed from upstream.
//
// The memory-layout pass of the frontend assigns every component a size and
// every field an offset (plus an element stride for dimensioned fields).
// This core never assigns addresses; it only does the arithmetic
// `instance base + field offset [+ index × stride]` when resolving port
// and instance addresses in the symbolic evaluators.
//
// Preconditions: produced by the frontend layout pass; indexed parallel to
//   `Program::components` and each component's `fields`.
// Postconditions: none (data-only module).
// Failure modes: none.
// Side effects: none.

use serde::{Deserialize, Serialize};

use crate::id::{CompId, FieldId};

/// Offset and stride of one field within its component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSlot {
    /// Byte offset from the owning instance's base address.
    pub offset: u32,
    /// Element stride for dimensioned fields (array subs/ports); equals the
    /// field size for scalar fields.
    pub stride: u32,
}

/// Layout of one component type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentLayout {
    pub size: u32,
    /// Indexed by `FieldId`.
    pub fields: Vec<FieldSlot>,
}

/// The unit's finalized layout: per-component field tables plus the base
/// address of the root instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Indexed by `CompId`, parallel to `Program::components`.
    pub components: Vec<ComponentLayout>,
    pub root_address: u32,
}

impl Layout {
    pub fn component(&self, comp: CompId) -> &ComponentLayout {
        &self.components[comp.0 as usize]
    }

    pub fn slot(&self, comp: CompId, field: FieldId) -> FieldSlot {
        self.components[comp.0 as usize].fields[field.0 as usize]
    }

    /// Address of `field` (element `index`, for dimensioned fields) within
    /// an instance of `comp` based at `base`.
    pub fn field_address(&self, base: u32, comp: CompId, field: FieldId, index: Option<u32>) -> u32 {
        let slot = self.slot(comp, field);
        base + slot.offset + index.unwrap_or(0) * slot.stride
    }
}
