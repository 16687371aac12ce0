// interp.rs — Bounded symbolic evaluator for address resolution
//
// A deliberately small sub-interpreter shared by the elaborator and the
// binder. It supports exactly what address resolution needs: address
// arithmetic over the layout, integer arithmetic, pointer loads through the
// instantiation-wired reference table, and boolean conditions. Everything
// else evaluates to `Unknown`, which the elaborator treats as "not address
// relevant" and skips; the binder treats it as an internal fault at the
// point of use.
//
// Preconditions: `layout` covers every (component, field) the evaluated
//   expressions select; reference fields were wired by `instantiate`.
// Postconditions: evaluation is deterministic for a given seed.
// Failure modes: none (unsupported constructs yield `Unknown`).
// Side effects: none.

use std::collections::HashMap;

use crate::ast::*;
use crate::graph::Composer;
use crate::layout::Layout;

/// A symbolic value: concrete integer, boolean, or memory address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Addr(u32),
    Unknown,
}

/// Expression evaluator seeded with one instance's address (and iteration
/// index, for dimensioned callables).
pub struct Evaluator<'a> {
    layout: &'a Layout,
    composer: &'a Composer,
    self_addr: u32,
    index: Option<u32>,
    locals: HashMap<String, Value>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        layout: &'a Layout,
        composer: &'a Composer,
        self_addr: u32,
        index: Option<u32>,
    ) -> Self {
        Evaluator {
            layout,
            composer,
            self_addr,
            index,
            locals: HashMap::new(),
        }
    }

    pub fn bind_local(&mut self, name: &str, value: Value) {
        self.locals.insert(name.to_string(), value);
    }

    pub fn unbind_local(&mut self, name: &str) {
        self.locals.remove(name);
    }

    /// Evaluate to an address, or `None` if not address-resolvable.
    pub fn eval_addr(&mut self, expr: &Expr) -> Option<u32> {
        match self.eval(expr) {
            Value::Addr(a) => Some(a),
            _ => None,
        }
    }

    /// Evaluate to an integer, or `None`.
    pub fn eval_int(&mut self, expr: &Expr) -> Option<i64> {
        match self.eval(expr) {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    /// Evaluate to a boolean, or `None`.
    pub fn eval_bool(&mut self, expr: &Expr) -> Option<bool> {
        match self.eval(expr) {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Value {
        match &expr.kind {
            ExprKind::Receiver => Value::Addr(self.self_addr),
            ExprKind::IterIndex => self
                .index
                .map(|i| Value::Int(i64::from(i)))
                .unwrap_or(Value::Unknown),
            ExprKind::IntLit(v) => Value::Int(*v),
            ExprKind::BoolLit(v) => Value::Bool(*v),
            ExprKind::FloatLit(_) => Value::Unknown,
            ExprKind::Local(name) => self.locals.get(name).copied().unwrap_or(Value::Unknown),
            ExprKind::Field { base, comp, field } => match self.eval(base) {
                Value::Addr(a) => Value::Addr(self.layout.field_address(a, *comp, *field, None)),
                _ => Value::Unknown,
            },
            ExprKind::Index { base, index } => {
                // Indexing needs the element stride, which lives on the
                // selected field; only field selectors are indexable here.
                let ExprKind::Field {
                    base: inner,
                    comp,
                    field,
                } = &base.kind
                else {
                    return Value::Unknown;
                };
                let base_addr = match self.eval(inner) {
                    Value::Addr(a) => a,
                    _ => return Value::Unknown,
                };
                match self.eval(index) {
                    Value::Int(i) if i >= 0 => Value::Addr(self.layout.field_address(
                        base_addr,
                        *comp,
                        *field,
                        Some(i as u32),
                    )),
                    _ => Value::Unknown,
                }
            }
            ExprKind::Deref(inner) => match self.eval(inner) {
                Value::Addr(slot) => self
                    .composer
                    .pointer_target(slot)
                    .map(Value::Addr)
                    .unwrap_or(Value::Unknown),
                _ => Value::Unknown,
            },
            ExprKind::Unary { op, operand } => match (op, self.eval(operand)) {
                (UnaryOp::Neg, Value::Int(v)) => Value::Int(-v),
                (UnaryOp::Not, Value::Bool(v)) => Value::Bool(!v),
                _ => Value::Unknown,
            },
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.eval(lhs);
                let r = self.eval(rhs);
                eval_binary(*op, l, r)
            }
            ExprKind::Call(_) => Value::Unknown,
        }
    }
}

fn eval_binary(op: BinaryOp, l: Value, r: Value) -> Value {
    match (l, r) {
        (Value::Int(a), Value::Int(b)) => match op {
            BinaryOp::Add => Value::Int(a.wrapping_add(b)),
            BinaryOp::Sub => Value::Int(a.wrapping_sub(b)),
            BinaryOp::Mul => Value::Int(a.wrapping_mul(b)),
            BinaryOp::Div if b != 0 => Value::Int(a / b),
            BinaryOp::Rem if b != 0 => Value::Int(a % b),
            BinaryOp::Eq => Value::Bool(a == b),
            BinaryOp::Ne => Value::Bool(a != b),
            BinaryOp::Lt => Value::Bool(a < b),
            BinaryOp::Le => Value::Bool(a <= b),
            BinaryOp::Gt => Value::Bool(a > b),
            BinaryOp::Ge => Value::Bool(a >= b),
            _ => Value::Unknown,
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Value::Bool(a && b),
            BinaryOp::Or => Value::Bool(a || b),
            BinaryOp::Eq => Value::Bool(a == b),
            BinaryOp::Ne => Value::Bool(a != b),
            _ => Value::Unknown,
        },
        _ => Value::Unknown,
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
