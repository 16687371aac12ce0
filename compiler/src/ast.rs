// Typed AST surface for Relay component programs.
//
// This is the shape the type-checking frontend hands to the composition
// core: symbol-resolved, fully typed, with stable ids on expressions and
// activation sites. Every node carries a byte-range `Span` for diagnostics.
// The whole surface derives serde so a frontend can ship units as JSON.
//
// Preconditions: produced by a frontend that has already type-checked the
//   program; call targets are resolved, field accesses carry their component.
// Postconditions: none (data-only module).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::{CompId, ExprId, FieldId, GetterId, MethodId, ReactionId, SiteId};

// ── Span ──

/// Byte-offset source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Zero-width span for synthesized nodes.
    pub fn dummy() -> Self {
        Span { start: 0, end: 0 }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ── Identifier ──

/// An identifier with its source text and span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Ident {
            name: name.into(),
            span,
        }
    }
}

// ── Types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutability {
    Const,
    Mutable,
}

/// A checked Relay type. Pointer types carry the mutability of their
/// dereference, which drives the alias-escape rules in effect inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Void,
    Bool,
    Int,
    Float,
    Pointer {
        pointee: Box<Type>,
        mutability: Mutability,
    },
    Component(CompId),
    Array {
        elem: Box<Type>,
        len: u32,
    },
}

impl Type {
    /// Does this type contain a pointer anywhere (directly, in an array
    /// element, or behind another pointer)?
    pub fn contains_pointer(&self) -> bool {
        match self {
            Type::Pointer { .. } => true,
            Type::Array { elem, .. } => elem.contains_pointer(),
            _ => false,
        }
    }

    /// Dereference mutability of the outermost pointer, if any.
    pub fn pointer_mutability(&self) -> Option<Mutability> {
        match self {
            Type::Pointer { mutability, .. } => Some(*mutability),
            Type::Array { elem, .. } => elem.pointer_mutability(),
            _ => None,
        }
    }

    /// True if a value of this type can carry a mutable alias out of the
    /// callee: it contains a pointer whose dereference is `Mutable`.
    pub fn leaks_mutable_alias(&self) -> bool {
        self.contains_pointer() && self.pointer_mutability() == Some(Mutability::Mutable)
    }
}

// ── Root ──

/// A complete, type-checked Relay compilation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub components: Vec<ComponentDecl>,
    /// The component instantiated at top level.
    pub root: CompId,
    pub span: Span,
}

impl Program {
    pub fn component(&self, id: CompId) -> &ComponentDecl {
        &self.components[id.0 as usize]
    }
}

// ── Component declaration ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: Ident,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub actions: Vec<ActionDecl>,
    pub reactions: Vec<ReactionDecl>,
    pub getters: Vec<GetterDecl>,
    pub binds: Vec<BindDecl>,
    pub span: Span,
}

// ── Fields ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: Ident,
    pub kind: FieldKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A plain data field.
    Scalar(Type),
    /// A nested sub-component, optionally an array of `dim` elements.
    Sub { comp: CompId, dim: Option<u32> },
    /// A reference to another instance, wired at instantiation time.
    Ref {
        comp: CompId,
        mutability: Mutability,
        init: RefPath,
    },
    /// A push port: fires bound reactions, optionally dimensioned.
    PushPort { ty: Type, dim: Option<u32> },
    /// A pull port: answered by exactly one bound getter.
    PullPort { ty: Type, dim: Option<u32> },
}

/// Reference-field initializer: a compile-time path from the owning
/// instance (or its parent) to the target instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefPath {
    pub base: RefBase,
    pub segments: Vec<PathSeg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefBase {
    SelfInstance,
    Parent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathSeg {
    pub field: FieldId,
    pub index: Option<u32>,
}

// ── Callables ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub name: Ident,
    pub receiver: Mutability,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: Block,
    pub span: Span,
}

/// A guarded, possibly-iterated, spontaneously-firing unit of execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDecl {
    pub name: Ident,
    /// Fixed iteration dimension: the action exists once per index.
    pub dim: Option<u32>,
    pub guard: Expr,
    pub body: Block,
    pub span: Span,
}

/// A triggered unit of execution, bound to at most one push port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionDecl {
    pub name: Ident,
    pub dim: Option<u32>,
    /// The pushed value, if the bound port carries one.
    pub param: Option<Param>,
    pub body: Block,
    pub span: Span,
}

/// A pure query bound to exactly one pull port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetterDecl {
    pub name: Ident,
    pub ret: Type,
    pub body: Block,
    pub span: Span,
}

/// A compile-time wiring body, interpreted concretely per instantiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindDecl {
    pub body: Block,
    pub span: Span,
}

// ── Statements ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    Let {
        name: Ident,
        ty: Type,
        value: Expr,
    },
    Assign {
        target: Expr,
        value: Expr,
    },
    IncDec {
        target: Expr,
        op: IncDecOp,
    },
    If {
        cond: Expr,
        then_blk: Block,
        else_blk: Option<Block>,
    },
    While {
        cond: Expr,
        body: Block,
    },
    /// `for var in from..to { body }`; bounds are evaluated concretely
    /// inside bind bodies.
    For {
        var: Ident,
        from: Expr,
        to: Expr,
        body: Block,
    },
    /// Phase transition: port firings inside `body` happen concurrently.
    Activate {
        site: SiteId,
        body: Block,
    },
    Return(Option<Expr>),
    /// `bind port -> reaction` (only inside `BindDecl` bodies).
    BindPush {
        port: Expr,
        reaction: ReactionRef,
    },
    /// `bind port -> getter` (only inside `BindDecl` bodies).
    BindPull {
        port: Expr,
        getter: GetterRef,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncDecOp {
    Incr,
    Decr,
}

/// Right operand of `bind push -> reaction`: a selector through a
/// sub-instance, optionally indexed for dimensioned reactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRef {
    pub base: Expr,
    pub comp: CompId,
    pub reaction: ReactionId,
    pub index: Option<Expr>,
    pub span: Span,
}

/// Right operand of `bind pull -> getter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetterRef {
    pub base: Expr,
    pub comp: CompId,
    pub getter: GetterId,
    pub span: Span,
}

// ── Expressions ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub ty: Type,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// The receiver instance (`self`).
    Receiver,
    /// A let-bound local or parameter, resolved by name within the callable.
    Local(String),
    /// The implicit iteration parameter of a dimensioned action/reaction.
    IterIndex,
    IntLit(i64),
    BoolLit(bool),
    FloatLit(f64),
    /// Field selection; `comp` is the component owning `field`.
    Field {
        base: Box<Expr>,
        comp: CompId,
        field: FieldId,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    /// Pointer load.
    Deref(Box<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call(Box<CallExpr>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub target: CallTarget,
    /// Receiver/selector expression: the method receiver, the instance a
    /// getter is queried on, or the port field being called. `None` only
    /// for builtins.
    pub base: Option<Expr>,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CallTarget {
    Method { comp: CompId, method: MethodId },
    Getter { comp: CompId, getter: GetterId },
    /// Call through a pull-port field selector.
    PullPort,
    /// Firing of a push-port field selector; legal only inside `activate`.
    PushPort,
    /// External builtin (I/O etc.); exerts no effect on any component
    /// instance beyond what its arguments leak.
    Builtin(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}
