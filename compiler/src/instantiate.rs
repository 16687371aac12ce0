// instantiate.rs — Component-instance and port registry construction
//
// Walks the component-type tree top-down from the program root, creating
// one `Instance` per (possibly array-element) component field and one port
// node per push/pull-port element, all at the addresses the layout pass
// assigned. Reference fields are wired in a second pass, once every target
// instance exists.
//
// Preconditions: `program` is type-correct; `layout` covers every component.
// Postconditions: every instance and port element is registered in the
//                 returned `Composer`, keyed by its address; every `Ref`
//                 field's slot maps to its target instance address.
// Failure modes: none on frontend-validated input; a reference path that
//                does not resolve to an instance is a frontend bug and
//                panics.
// Side effects: none.

use crate::ast::*;
use crate::graph::{Composer, InstanceId};
use crate::id::{CompId, FieldId};
use crate::layout::Layout;

/// Build the instance tree and port registries for the unit.
pub fn instantiate(program: &Program, layout: &Layout) -> Composer {
    let mut inst = Instantiator {
        program,
        layout,
        composer: Composer::new(),
        pending_refs: Vec::new(),
    };
    let root_comp = program.root;
    let root_path = program.component(root_comp).name.name.clone();
    inst.build(None, root_comp, layout.root_address, root_path);
    inst.wire_refs();
    inst.composer
}

struct Instantiator<'a> {
    program: &'a Program,
    layout: &'a Layout,
    composer: Composer,
    /// Reference fields deferred until the whole tree exists.
    pending_refs: Vec<(InstanceId, FieldId)>,
}

/// Iterate `None` once for scalar fields, or `Some(0..dim)` for arrays.
fn indices(dim: Option<u32>) -> Vec<Option<u32>> {
    match dim {
        None => vec![None],
        Some(d) => (0..d).map(Some).collect(),
    }
}

fn element_name(path: &str, field: &Ident, index: Option<u32>) -> String {
    match index {
        None => format!("{path}.{}", field.name),
        Some(i) => format!("{path}.{}[{i}]", field.name),
    }
}

impl Instantiator<'_> {
    fn build(
        &mut self,
        parent: Option<InstanceId>,
        comp: CompId,
        address: u32,
        path: String,
    ) -> InstanceId {
        let id = self.composer.add_instance(parent, comp, address, path.clone());
        let decl = self.program.component(comp);
        for (fi, field) in decl.fields.iter().enumerate() {
            let field_id = FieldId(fi as u32);
            match &field.kind {
                FieldKind::Scalar(_) => {}
                FieldKind::Sub { comp: sub, dim } => {
                    for index in indices(*dim) {
                        let addr = self.layout.field_address(address, comp, field_id, index);
                        let sub_path = element_name(&path, &field.name, index);
                        self.build(Some(id), *sub, addr, sub_path);
                    }
                }
                FieldKind::Ref { .. } => {
                    self.pending_refs.push((id, field_id));
                }
                FieldKind::PushPort { dim, .. } => {
                    for index in indices(*dim) {
                        let addr = self.layout.field_address(address, comp, field_id, index);
                        let name = element_name(&path, &field.name, index);
                        self.composer
                            .register_push_port(addr, id, field_id, name, field.span);
                    }
                }
                FieldKind::PullPort { dim, .. } => {
                    for index in indices(*dim) {
                        let addr = self.layout.field_address(address, comp, field_id, index);
                        let name = element_name(&path, &field.name, index);
                        self.composer
                            .register_pull_port(addr, id, field_id, name, field.span);
                    }
                }
            }
        }
        id
    }

    fn wire_refs(&mut self) {
        for &(owner, field_id) in &self.pending_refs {
            let owner_inst = self.composer.instance(owner);
            let owner_comp = owner_inst.comp;
            let owner_addr = owner_inst.address;
            let owner_parent = owner_inst.parent;
            let decl = self.program.component(owner_comp);
            let field = &decl.fields[field_id.0 as usize];
            let FieldKind::Ref { init, .. } = &field.kind else {
                unreachable!("pending ref on non-ref field");
            };

            let slot = self
                .layout
                .field_address(owner_addr, owner_comp, field_id, None);

            let mut cursor = match init.base {
                RefBase::SelfInstance => owner,
                RefBase::Parent => owner_parent
                    .unwrap_or_else(|| panic!("reference path through missing parent in '{}'", field.name.name)),
            };
            for seg in &init.segments {
                let inst = self.composer.instance(cursor);
                let seg_decl = self.program.component(inst.comp);
                let seg_field = &seg_decl.fields[seg.field.0 as usize];
                debug_assert!(
                    matches!(seg_field.kind, FieldKind::Sub { .. }),
                    "reference path segment must select a sub-component"
                );
                let addr = self
                    .layout
                    .field_address(inst.address, inst.comp, seg.field, seg.index);
                cursor = self.composer.instance_at(addr).unwrap_or_else(|| {
                    panic!(
                        "reference path segment '{}' did not resolve to an instance",
                        seg_field.name.name
                    )
                });
            }
            let target_addr = self.composer.instance(cursor).address;
            self.composer.wire_pointer(slot, target_addr);
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
