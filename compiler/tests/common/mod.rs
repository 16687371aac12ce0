// Shared builder for integration tests: constructs typed compilation units
// the way the frontend would hand them over, with a layout computed from
// simple 8-byte slots.

#![allow(dead_code)]

use std::cell::Cell;

use rcc::ast::*;
use rcc::compose::CompilationUnit;
use rcc::id::*;
use rcc::layout::{ComponentLayout, FieldSlot, Layout};

thread_local! {
    static NEXT_EXPR: Cell<u32> = const { Cell::new(0) };
}

pub fn expr(kind: ExprKind, ty: Type) -> Expr {
    let id = NEXT_EXPR.with(|c| {
        let id = c.get();
        c.set(id + 1);
        id
    });
    Expr {
        id: ExprId(id),
        kind,
        ty,
        span: Span::dummy(),
    }
}

pub fn receiver(comp: CompId) -> Expr {
    expr(ExprKind::Receiver, Type::Component(comp))
}

pub fn int_lit(v: i64) -> Expr {
    expr(ExprKind::IntLit(v), Type::Int)
}

pub fn bool_lit(v: bool) -> Expr {
    expr(ExprKind::BoolLit(v), Type::Bool)
}

pub fn field_sel(base: Expr, comp: CompId, field: FieldId, ty: Type) -> Expr {
    expr(
        ExprKind::Field {
            base: Box::new(base),
            comp,
            field,
        },
        ty,
    )
}

pub fn index_sel(base: Expr, index: Expr, ty: Type) -> Expr {
    expr(
        ExprKind::Index {
            base: Box::new(base),
            index: Box::new(index),
        },
        ty,
    )
}

pub fn call(target: CallTarget, base: Option<Expr>, args: Vec<Expr>, ty: Type) -> Expr {
    expr(ExprKind::Call(Box::new(CallExpr { target, base, args })), ty)
}

pub fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: Span::dummy(),
    }
}

pub fn block(stmts: Vec<StmtKind>) -> Block {
    Block {
        stmts: stmts.into_iter().map(stmt).collect(),
        span: Span::dummy(),
    }
}

fn ident(name: &str) -> Ident {
    Ident::new(name, Span::dummy())
}

/// Builds a typed unit declaration by declaration, then derives a layout
/// with sequential 8-byte-granular slots.
#[derive(Default)]
pub struct UnitBuilder {
    comps: Vec<ComponentDecl>,
    next_site: u32,
}

impl UnitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn component(&mut self, name: &str) -> CompId {
        let id = CompId(self.comps.len() as u32);
        self.comps.push(ComponentDecl {
            name: ident(name),
            fields: vec![],
            methods: vec![],
            actions: vec![],
            reactions: vec![],
            getters: vec![],
            binds: vec![],
            span: Span::dummy(),
        });
        id
    }

    fn add_field(&mut self, comp: CompId, name: &str, kind: FieldKind) -> FieldId {
        let fields = &mut self.comps[comp.0 as usize].fields;
        let id = FieldId(fields.len() as u32);
        fields.push(FieldDecl {
            name: ident(name),
            kind,
            span: Span::dummy(),
        });
        id
    }

    pub fn scalar(&mut self, comp: CompId, name: &str, ty: Type) -> FieldId {
        self.add_field(comp, name, FieldKind::Scalar(ty))
    }

    pub fn sub(&mut self, comp: CompId, name: &str, child: CompId, dim: Option<u32>) -> FieldId {
        self.add_field(comp, name, FieldKind::Sub { comp: child, dim })
    }

    pub fn push_port(&mut self, comp: CompId, name: &str, dim: Option<u32>) -> FieldId {
        self.add_field(
            comp,
            name,
            FieldKind::PushPort {
                ty: Type::Int,
                dim,
            },
        )
    }

    pub fn pull_port(&mut self, comp: CompId, name: &str, dim: Option<u32>) -> FieldId {
        self.add_field(
            comp,
            name,
            FieldKind::PullPort {
                ty: Type::Int,
                dim,
            },
        )
    }

    pub fn action(
        &mut self,
        comp: CompId,
        name: &str,
        guard: Expr,
        body: Vec<StmtKind>,
    ) -> ActionId {
        let actions = &mut self.comps[comp.0 as usize].actions;
        let id = ActionId(actions.len() as u32);
        actions.push(ActionDecl {
            name: ident(name),
            dim: None,
            guard,
            body: block(body),
            span: Span::dummy(),
        });
        id
    }

    pub fn reaction(&mut self, comp: CompId, name: &str, body: Vec<StmtKind>) -> ReactionId {
        self.add_reaction(comp, name, None, body)
    }

    /// A dimensioned reaction: one logical element per index.
    pub fn dim_reaction(
        &mut self,
        comp: CompId,
        name: &str,
        dim: u32,
        body: Vec<StmtKind>,
    ) -> ReactionId {
        self.add_reaction(comp, name, Some(dim), body)
    }

    fn add_reaction(
        &mut self,
        comp: CompId,
        name: &str,
        dim: Option<u32>,
        body: Vec<StmtKind>,
    ) -> ReactionId {
        let reactions = &mut self.comps[comp.0 as usize].reactions;
        let id = ReactionId(reactions.len() as u32);
        reactions.push(ReactionDecl {
            name: ident(name),
            dim,
            param: Some(Param {
                name: ident("v"),
                ty: Type::Int,
            }),
            body: block(body),
            span: Span::dummy(),
        });
        id
    }

    pub fn getter(&mut self, comp: CompId, name: &str, body: Vec<StmtKind>) -> GetterId {
        let getters = &mut self.comps[comp.0 as usize].getters;
        let id = GetterId(getters.len() as u32);
        getters.push(GetterDecl {
            name: ident(name),
            ret: Type::Int,
            body: block(body),
            span: Span::dummy(),
        });
        id
    }

    pub fn binds(&mut self, comp: CompId, body: Vec<StmtKind>) {
        self.comps[comp.0 as usize].binds.push(BindDecl {
            body: block(body),
            span: Span::dummy(),
        });
    }

    /// An `activate` statement with a fresh site id.
    pub fn activate(&mut self, body: Vec<StmtKind>) -> StmtKind {
        let site = SiteId(self.next_site);
        self.next_site += 1;
        StmtKind::Activate {
            site,
            body: block(body),
        }
    }

    pub fn finish(self, root: CompId) -> CompilationUnit {
        let mut layouts = Vec::with_capacity(self.comps.len());
        for ci in 0..self.comps.len() {
            layouts.push(self.comp_layout(CompId(ci as u32)));
        }
        CompilationUnit {
            program: Program {
                components: self.comps,
                root,
                span: Span::dummy(),
            },
            layout: Layout {
                components: layouts,
                root_address: 0,
            },
        }
    }

    fn elem_size(&self, kind: &FieldKind) -> u32 {
        match kind {
            FieldKind::Sub { comp, .. } => self.comp_size(*comp),
            _ => 8,
        }
    }

    // Instances are identified by address, so every component reserves an
    // 8-byte header slot; a sub-component can then never alias its owner.
    fn comp_size(&self, comp: CompId) -> u32 {
        8 + self.comps[comp.0 as usize]
            .fields
            .iter()
            .map(|f| self.elem_size(&f.kind) * self.field_count(&f.kind))
            .sum::<u32>()
    }

    fn field_count(&self, kind: &FieldKind) -> u32 {
        match kind {
            FieldKind::Sub { dim, .. }
            | FieldKind::PushPort { dim, .. }
            | FieldKind::PullPort { dim, .. } => dim.unwrap_or(1),
            _ => 1,
        }
    }

    fn comp_layout(&self, comp: CompId) -> ComponentLayout {
        let mut fields = Vec::new();
        let mut offset = 8;
        for field in &self.comps[comp.0 as usize].fields {
            let stride = self.elem_size(&field.kind);
            fields.push(FieldSlot { offset, stride });
            offset += stride * self.field_count(&field.kind);
        }
        ComponentLayout {
            size: offset,
            fields,
        }
    }
}
