// elaborate.rs — Trigger-graph elaboration of callable bodies
//
// Symbolically walks every getter, action, and reaction body of every
// instance, resolving port and getter call targets to concrete addresses
// with the bounded evaluator, and records the resulting trigger edges in
// the `Composer`. `activate` blocks become Activation nodes: the one place
// push-port firings may appear, carrying the mutable-phase access computed
// by effect inference. Guard expressions additionally populate the
// instance link sets consumed by scheduling.
//
// Preconditions: `composer` was populated by `instantiate`; `effects` was
//   computed by `infer_effects` over the same program.
// Postconditions: every logical getter, action, and reaction activation has
//                 exactly one node; every call edge in any body appears in
//                 the graph.
// Failure modes: none on frontend-validated input; an unresolvable call
//                target or a port firing outside `activate` is a frontend
//                bug and panics.
// Side effects: mutates `composer` in place.

use crate::access::EffectTable;
use crate::ast::*;
use crate::graph::{Composer, InstanceId, NodeId, NodeKind};
use crate::id::{ActionId, CompId, GetterId, ReactionId};
use crate::interp::Evaluator;
use crate::layout::Layout;

/// Elaborate every callable of every instance into trigger-graph nodes and
/// edges.
pub fn elaborate(
    program: &Program,
    layout: &Layout,
    effects: &EffectTable,
    composer: &mut Composer,
) {
    let instances: Vec<(InstanceId, CompId, u32, String)> = composer
        .instances()
        .map(|i| (i.id, i.comp, i.address, i.path.clone()))
        .collect();

    // Getters first, so action and reaction bodies resolve against
    // already-interned nodes in a stable order.
    for &(id, comp, addr, ref path) in &instances {
        let decl = program.component(comp);
        for (gi, getter) in decl.getters.iter().enumerate() {
            let getter_id = GetterId(gi as u32);
            let access = effects
                .getters
                .get(&(comp, getter_id))
                .copied()
                .unwrap_or_default();
            let name = format!("{path}.{}", getter.name.name);
            let node = composer.intern_getter(id, getter_id, access, name, getter.span);
            let mut ctx = ElabCtx::new(program, layout, effects, composer, id, addr, None, node);
            ctx.walk_block(&getter.body);
        }
    }

    for &(id, comp, addr, ref path) in &instances {
        let decl = program.component(comp);
        for (ai, action) in decl.actions.iter().enumerate() {
            let action_id = ActionId(ai as u32);
            let eff = effects
                .actions
                .get(&(comp, action_id))
                .copied()
                .unwrap_or_default();
            for index in indices(action.dim) {
                let name = element_name(path, &action.name.name, index);
                let node = composer.add_action(
                    id,
                    action_id,
                    index,
                    eff.precondition,
                    eff.immutable,
                    name,
                    action.span,
                );
                let mut ctx =
                    ElabCtx::new(program, layout, effects, composer, id, addr, index, node);
                ctx.in_guard = true;
                ctx.walk_expr(&action.guard);
                ctx.in_guard = false;
                ctx.walk_block(&action.body);
            }
        }
        for (ri, reaction) in decl.reactions.iter().enumerate() {
            let reaction_id = ReactionId(ri as u32);
            let access = effects
                .reactions
                .get(&(comp, reaction_id))
                .copied()
                .unwrap_or_default();
            for index in indices(reaction.dim) {
                let name = element_name(path, &reaction.name.name, index);
                let node =
                    composer.intern_reaction(id, reaction_id, index, access, name, reaction.span);
                let mut ctx =
                    ElabCtx::new(program, layout, effects, composer, id, addr, index, node);
                ctx.walk_block(&reaction.body);
            }
        }
    }
}

fn indices(dim: Option<u32>) -> Vec<Option<u32>> {
    match dim {
        None => vec![None],
        Some(d) => (0..d).map(Some).collect(),
    }
}

fn element_name(path: &str, name: &str, index: Option<u32>) -> String {
    match index {
        None => format!("{path}.{name}"),
        Some(i) => format!("{path}.{name}[{i}]"),
    }
}

// ── Body walker ─────────────────────────────────────────────────────────────

struct ElabCtx<'a> {
    program: &'a Program,
    layout: &'a Layout,
    effects: &'a EffectTable,
    composer: &'a mut Composer,
    instance: InstanceId,
    self_addr: u32,
    index: Option<u32>,
    /// The getter/action/reaction node edges originate from.
    owner: NodeId,
    /// Active Activation node, if the walk is inside `activate`.
    activation: Option<NodeId>,
    /// Inside an action guard: calls also link instances.
    in_guard: bool,
}

impl<'a> ElabCtx<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        program: &'a Program,
        layout: &'a Layout,
        effects: &'a EffectTable,
        composer: &'a mut Composer,
        instance: InstanceId,
        self_addr: u32,
        index: Option<u32>,
        owner: NodeId,
    ) -> Self {
        ElabCtx {
            program,
            layout,
            effects,
            composer,
            instance,
            self_addr,
            index,
            owner,
            activation: None,
            in_guard: false,
        }
    }

    /// Edge source for the current position: the Activation node inside
    /// `activate`, the owner otherwise.
    fn current(&self) -> NodeId {
        self.activation.unwrap_or(self.owner)
    }

    fn resolve_addr(&self, expr: &Expr) -> Option<u32> {
        let mut ev = Evaluator::new(self.layout, self.composer, self.self_addr, self.index);
        ev.eval_addr(expr)
    }

    fn walk_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.walk_stmt(stmt);
        }
    }

    fn walk_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expr(e) => self.walk_expr(e),
            StmtKind::Let { value, .. } => self.walk_expr(value),
            StmtKind::Assign { target, value } => {
                self.walk_expr(target);
                self.walk_expr(value);
            }
            StmtKind::IncDec { target, .. } => self.walk_expr(target),
            StmtKind::If {
                cond,
                then_blk,
                else_blk,
            } => {
                self.walk_expr(cond);
                self.walk_block(then_blk);
                if let Some(blk) = else_blk {
                    self.walk_block(blk);
                }
            }
            StmtKind::While { cond, body } => {
                self.walk_expr(cond);
                self.walk_block(body);
            }
            StmtKind::For { from, to, body, .. } => {
                self.walk_expr(from);
                self.walk_expr(to);
                self.walk_block(body);
            }
            StmtKind::Activate { site, body } => {
                assert!(
                    self.activation.is_none(),
                    "nested activation rejected by the frontend"
                );
                let access = self.effects.site(*site);
                let owner_name = self.composer.node(self.owner).name.clone();
                let name = format!("{owner_name}.activate#{}", site.0);
                let act = self
                    .composer
                    .add_activation(self.instance, access, name, stmt.span);
                self.composer.add_edge(self.owner, act);
                self.activation = Some(act);
                self.walk_block(body);
                self.activation = None;
            }
            StmtKind::Return(value) => {
                if let Some(e) = value {
                    self.walk_expr(e);
                }
            }
            StmtKind::BindPush { .. } | StmtKind::BindPull { .. } => {
                unreachable!("bind statement outside a bind body")
            }
        }
    }

    fn walk_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Receiver
            | ExprKind::Local(_)
            | ExprKind::IterIndex
            | ExprKind::IntLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::FloatLit(_) => {}
            ExprKind::Field { base, .. } => self.walk_expr(base),
            ExprKind::Index { base, index } => {
                self.walk_expr(base);
                self.walk_expr(index);
            }
            ExprKind::Deref(inner) => {
                self.walk_expr(inner);
                // A guard that reads through a reference observes the target
                // instance: record the scheduling link.
                if self.in_guard {
                    if let Some(addr) = self.resolve_addr(expr) {
                        if let Some(target) = self.composer.instance_at(addr) {
                            if target != self.instance {
                                self.composer.link_instances(target, self.instance);
                            }
                        }
                    }
                }
            }
            ExprKind::Unary { operand, .. } => self.walk_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs);
                self.walk_expr(rhs);
            }
            ExprKind::Call(call) => self.walk_call(call),
        }
    }

    fn walk_call(&mut self, call: &CallExpr) {
        if let Some(base) = &call.base {
            self.walk_expr(base);
        }
        for arg in &call.args {
            self.walk_expr(arg);
        }
        match &call.target {
            // Methods are inlined into effect summaries; builtins exert no
            // instance effect. Neither gets a node.
            CallTarget::Method { .. } | CallTarget::Builtin(_) => {}
            CallTarget::Getter { comp, getter } => {
                let base = call.base.as_ref().unwrap_or_else(|| {
                    panic!("getter call without a receiver expression")
                });
                let addr = self.resolve_addr(base).unwrap_or_else(|| {
                    panic!("getter call target did not resolve to an address")
                });
                let target = self.composer.instance_at(addr).unwrap_or_else(|| {
                    panic!("getter call target did not resolve to an instance")
                });
                let decl = &self.program.component(*comp).getters[getter.0 as usize];
                let access = self
                    .effects
                    .getters
                    .get(&(*comp, *getter))
                    .copied()
                    .unwrap_or_default();
                let name = format!(
                    "{}.{}",
                    self.composer.instance(target).path,
                    decl.name.name
                );
                let node = self
                    .composer
                    .intern_getter(target, *getter, access, name, decl.span);
                self.composer.add_edge(self.current(), node);
                if self.in_guard && target != self.instance {
                    self.composer.link_instances(target, self.instance);
                }
            }
            CallTarget::PullPort => {
                let base = call.base.as_ref().unwrap_or_else(|| {
                    panic!("pull-port call without a port selector")
                });
                let addr = self.resolve_addr(base).unwrap_or_else(|| {
                    panic!("pull-port call did not resolve to a port address")
                });
                let node = self.composer.pull_port_at(addr).unwrap_or_else(|| {
                    panic!("no pull port registered at address {addr}")
                });
                self.composer.add_edge(self.current(), node);
                if self.in_guard {
                    let NodeKind::PullPort { instance, .. } = self.composer.node(node).kind
                    else {
                        unreachable!("pull-port registry returned a non-port node")
                    };
                    if instance != self.instance {
                        self.composer.link_instances(instance, self.instance);
                    }
                }
            }
            CallTarget::PushPort => {
                let base = call.base.as_ref().unwrap_or_else(|| {
                    panic!("push-port firing without a port selector")
                });
                let addr = self.resolve_addr(base).unwrap_or_else(|| {
                    panic!("push-port firing did not resolve to a port address")
                });
                let node = self.composer.push_port_at(addr).unwrap_or_else(|| {
                    panic!("no push port registered at address {addr}")
                });
                let act = self.activation.unwrap_or_else(|| {
                    panic!("push-port firing outside an activation body")
                });
                self.composer.add_edge(act, node);
            }
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
