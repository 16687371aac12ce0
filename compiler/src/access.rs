// access.rs — Receiver access effect inference
//
// Pure structural pass over callable bodies. For every expression it
// computes the maximal effect (`None`/`Read`/`Write`) the expression exerts
// on the callable's own receiver instance and whether its value derives
// from the receiver, accounting for mutable-pointer escapes. Results land
// in side tables keyed by stable ids; the tree itself is never mutated.
//
// Method summaries are computed first, iterated to a fixpoint over the
// three-point access lattice so method-to-method calls converge; actions,
// reactions, and getters are then summarized in one pass each.
//
// Preconditions: `program` is type-correct and symbol-resolved.
// Postconditions: every expression id appearing in a callable body has an
//                 entry in `EffectTable::exprs`; every `activate` site has
//                 a mutable-phase access in `EffectTable::sites`.
// Failure modes: none (total on type-correct input).
// Side effects: none.

use std::collections::HashMap;

use crate::ast::*;
use crate::graph::AccessLevel;
use crate::id::{ActionId, CompId, ExprId, GetterId, MethodId, ReactionId, SiteId};

// ── Public types ────────────────────────────────────────────────────────────

/// Per-expression inference result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectInfo {
    pub access: AccessLevel,
    pub from_receiver: bool,
}

/// Receiver access of an action, split per the activation phase model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionEffects {
    /// Access of the guard expression.
    pub precondition: AccessLevel,
    /// Access of the non-activated body.
    pub immutable: AccessLevel,
}

/// All effect-inference results for one compilation unit.
#[derive(Debug, Default)]
pub struct EffectTable {
    pub exprs: HashMap<ExprId, EffectInfo>,
    /// Receiver access each method exerts when called.
    pub methods: HashMap<(CompId, MethodId), AccessLevel>,
    pub actions: HashMap<(CompId, ActionId), ActionEffects>,
    pub reactions: HashMap<(CompId, ReactionId), AccessLevel>,
    pub getters: HashMap<(CompId, GetterId), AccessLevel>,
    /// Mutable-phase access per `activate` site. Not folded into the
    /// enclosing summary; consumed by the elaborator.
    pub sites: HashMap<SiteId, AccessLevel>,
}

impl EffectTable {
    pub fn expr(&self, id: ExprId) -> EffectInfo {
        self.exprs.get(&id).copied().unwrap_or_default()
    }

    pub fn site(&self, id: SiteId) -> AccessLevel {
        self.sites.get(&id).copied().unwrap_or_default()
    }
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Infer receiver access effects for every callable in the program.
pub fn infer_effects(program: &Program) -> EffectTable {
    let mut table = EffectTable::default();

    // Phase 1: method summaries to a fixpoint. The lattice is finite and
    // the transfer function monotone, so this terminates.
    for (ci, comp) in program.components.iter().enumerate() {
        for mi in 0..comp.methods.len() {
            table
                .methods
                .insert((CompId(ci as u32), MethodId(mi as u32)), AccessLevel::None);
        }
    }
    loop {
        let mut changed = false;
        for (ci, comp) in program.components.iter().enumerate() {
            let comp_id = CompId(ci as u32);
            for (mi, method) in comp.methods.iter().enumerate() {
                let key = (comp_id, MethodId(mi as u32));
                let access = {
                    let mut walker = BodyWalker::new(program, &mut table);
                    walker.enter_params(&method.params);
                    walker.walk_block(&method.body)
                };
                let entry = table.methods.get_mut(&key).unwrap();
                if *entry != access {
                    debug_assert!(access > *entry, "method summary must only grow");
                    *entry = access;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Phase 2: actions, reactions, getters.
    for (ci, comp) in program.components.iter().enumerate() {
        let comp_id = CompId(ci as u32);
        for (ai, action) in comp.actions.iter().enumerate() {
            let precondition = {
                let mut walker = BodyWalker::new(program, &mut table);
                walker.walk_expr(&action.guard).access
            };
            let immutable = {
                let mut walker = BodyWalker::new(program, &mut table);
                walker.walk_block(&action.body)
            };
            table.actions.insert(
                (comp_id, ActionId(ai as u32)),
                ActionEffects {
                    precondition,
                    immutable,
                },
            );
        }
        for (ri, reaction) in comp.reactions.iter().enumerate() {
            let immutable = {
                let mut walker = BodyWalker::new(program, &mut table);
                if let Some(param) = &reaction.param {
                    walker.enter_params(std::slice::from_ref(param));
                }
                walker.walk_block(&reaction.body)
            };
            table
                .reactions
                .insert((comp_id, ReactionId(ri as u32)), immutable);
        }
        for (gi, getter) in comp.getters.iter().enumerate() {
            let immutable = {
                let mut walker = BodyWalker::new(program, &mut table);
                walker.walk_block(&getter.body)
            };
            table
                .getters
                .insert((comp_id, GetterId(gi as u32)), immutable);
        }
    }

    table
}

// ── Body walker ─────────────────────────────────────────────────────────────

struct BodyWalker<'a, 'b> {
    program: &'a Program,
    table: &'b mut EffectTable,
    /// Lexical scopes mapping local names to receiver-derivation. Locals
    /// bound to receiver-derived values are duplicates of the receiver.
    scopes: Vec<HashMap<String, bool>>,
}

impl<'a, 'b> BodyWalker<'a, 'b> {
    fn new(program: &'a Program, table: &'b mut EffectTable) -> Self {
        BodyWalker {
            program,
            table,
            scopes: vec![HashMap::new()],
        }
    }

    /// Parameters are caller-supplied values: not receiver-derived.
    fn enter_params(&mut self, params: &[Param]) {
        for param in params {
            self.bind_local(&param.name.name, false);
        }
    }

    fn bind_local(&mut self, name: &str, from_receiver: bool) {
        self.scopes
            .last_mut()
            .unwrap()
            .insert(name.to_string(), from_receiver);
    }

    fn local_from_receiver(&self, name: &str) -> bool {
        for scope in self.scopes.iter().rev() {
            if let Some(&fr) = scope.get(name) {
                return fr;
            }
        }
        false
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn walk_block(&mut self, block: &Block) -> AccessLevel {
        self.scopes.push(HashMap::new());
        let mut access = AccessLevel::None;
        for stmt in &block.stmts {
            access = access.max(self.walk_stmt(stmt));
        }
        self.scopes.pop();
        access
    }

    fn walk_stmt(&mut self, stmt: &Stmt) -> AccessLevel {
        match &stmt.kind {
            StmtKind::Expr(expr) => self.walk_expr(expr).access,
            StmtKind::Let { name, value, .. } => {
                let value_info = self.walk_expr(value);
                self.bind_local(&name.name, value_info.from_receiver);
                value_info.access
            }
            StmtKind::Assign { target, value } => {
                let lhs = self.walk_expr(target);
                let rhs = self.walk_expr(value);
                // Rebinding a local tracks whether it now aliases the receiver.
                if let ExprKind::Local(name) = &target.kind {
                    let name = name.clone();
                    self.rebind_local(&name, rhs.from_receiver);
                }
                if lhs.from_receiver {
                    // Storing into the receiver.
                    AccessLevel::Write
                } else if rhs.from_receiver && value.ty.leaks_mutable_alias() {
                    // A mutable alias into the receiver escapes to the left side.
                    AccessLevel::Write
                } else {
                    lhs.access.max(rhs.access)
                }
            }
            StmtKind::IncDec { target, .. } => {
                let info = self.walk_expr(target);
                if info.from_receiver {
                    AccessLevel::Write
                } else {
                    info.access
                }
            }
            StmtKind::If {
                cond,
                then_blk,
                else_blk,
            } => {
                // Not path-sensitive: max over all branches.
                let mut access = self.walk_expr(cond).access;
                access = access.max(self.walk_block(then_blk));
                if let Some(else_blk) = else_blk {
                    access = access.max(self.walk_block(else_blk));
                }
                access
            }
            StmtKind::While { cond, body } => {
                self.walk_expr(cond).access.max(self.walk_block(body))
            }
            StmtKind::For {
                var,
                from,
                to,
                body,
            } => {
                let mut access = self.walk_expr(from).access;
                access = access.max(self.walk_expr(to).access);
                self.scopes.push(HashMap::new());
                self.bind_local(&var.name, false);
                access = access.max(self.walk_block(body));
                self.scopes.pop();
                access
            }
            StmtKind::Activate { site, body } => {
                // The mutable-phase access is recorded for the elaborator and
                // deliberately not folded into the enclosing summary.
                let body_access = self.walk_block(body);
                self.table.sites.insert(*site, body_access);
                AccessLevel::None
            }
            StmtKind::Return(expr) => expr
                .as_ref()
                .map(|e| self.walk_expr(e).access)
                .unwrap_or_default(),
            StmtKind::BindPush { .. } | StmtKind::BindPull { .. } => {
                // Bind bodies are compile-time wiring; they never execute at
                // runtime and exert no receiver effect.
                AccessLevel::None
            }
        }
    }

    fn rebind_local(&mut self, name: &str, from_receiver: bool) {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(entry) = scope.get_mut(name) {
                *entry = from_receiver;
                return;
            }
        }
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn walk_expr(&mut self, expr: &Expr) -> EffectInfo {
        let info = match &expr.kind {
            ExprKind::Receiver => EffectInfo {
                access: AccessLevel::Read,
                from_receiver: true,
            },
            ExprKind::Local(name) => {
                // A local bound to a receiver-derived value is a duplicate of
                // the receiver created when re-entering a scope.
                if self.local_from_receiver(name) {
                    EffectInfo {
                        access: AccessLevel::Read,
                        from_receiver: true,
                    }
                } else {
                    EffectInfo::default()
                }
            }
            ExprKind::IterIndex
            | ExprKind::IntLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::FloatLit(_) => EffectInfo::default(),
            ExprKind::Field { base, .. } => self.walk_expr(base),
            ExprKind::Index { base, index } => {
                let base_info = self.walk_expr(base);
                let index_info = self.walk_expr(index);
                EffectInfo {
                    access: base_info.access.max(index_info.access),
                    from_receiver: base_info.from_receiver,
                }
            }
            ExprKind::Deref(inner) => self.walk_expr(inner),
            ExprKind::Unary { operand, .. } => {
                // Arithmetic produces a fresh value, never an alias.
                let info = self.walk_expr(operand);
                EffectInfo {
                    access: info.access,
                    from_receiver: false,
                }
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                let l = self.walk_expr(lhs);
                let r = self.walk_expr(rhs);
                EffectInfo {
                    access: l.access.max(r.access),
                    from_receiver: false,
                }
            }
            ExprKind::Call(call) => self.walk_call(expr, call),
        };
        self.table.exprs.insert(expr.id, info);
        info
    }

    fn walk_call(&mut self, expr: &Expr, call: &CallExpr) -> EffectInfo {
        let base_info = call.base.as_ref().map(|b| self.walk_expr(b));
        let arg_infos: Vec<EffectInfo> = call.args.iter().map(|a| self.walk_expr(a)).collect();

        let mut access = base_info.map(|b| b.access).unwrap_or_default();
        for info in &arg_infos {
            access = access.max(info.access);
        }
        let any_arg_from_receiver = arg_infos.iter().any(|i| i.from_receiver);
        let base_from_receiver = base_info.map(|b| b.from_receiver).unwrap_or(false);

        match &call.target {
            CallTarget::Method { comp, method } => {
                let base = call.base.as_ref().expect("method call without receiver");
                if base_info.unwrap().from_receiver {
                    if base.ty.pointer_mutability() == Some(Mutability::Mutable) {
                        // Invoked through a receiver-derived mutable pointer:
                        // the callee may mutate whatever it points at.
                        access = AccessLevel::Write;
                    } else {
                        let callee = self
                            .table
                            .methods
                            .get(&(*comp, *method))
                            .copied()
                            .unwrap_or_default();
                        access = access.max(callee);
                    }
                }
                // A receiver-derived argument passed into a pointer-bearing
                // mutable parameter can leak a mutable alias.
                let decl = &self.program.component(*comp).methods[method.0 as usize];
                for (arg_info, param) in arg_infos.iter().zip(&decl.params) {
                    if arg_info.from_receiver && param.ty.leaks_mutable_alias() {
                        access = AccessLevel::Write;
                    }
                }
            }
            CallTarget::Getter { .. } | CallTarget::PullPort => {
                // Pure queries: reading through a receiver-derived selector
                // reads the receiver.
                if base_from_receiver {
                    access = access.max(AccessLevel::Read);
                }
            }
            CallTarget::PushPort => {
                // Port firing itself touches the port, not the receiver
                // record; selector/argument accesses are already folded in.
            }
            CallTarget::Builtin(_) => {
                // Builtin signatures are opaque: fall back to the argument's
                // own type for the mutable-alias leak rule.
                for (arg_info, arg) in arg_infos.iter().zip(&call.args) {
                    if arg_info.from_receiver && arg.ty.leaks_mutable_alias() {
                        access = AccessLevel::Write;
                    }
                }
            }
        }

        // The result aliases the receiver only when the callee can hand a
        // mutable pointer back out of receiver-derived inputs.
        let from_receiver = expr.ty.pointer_mutability() == Some(Mutability::Mutable)
            && (base_from_receiver || any_arg_from_receiver);

        EffectInfo {
            access,
            from_receiver,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
