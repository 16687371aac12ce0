// bind.rs — Concrete interpretation of wiring bodies
//
// Bind bodies are compile-time programs: every expression they evaluate
// must reduce to a concrete value. This pass runs each instance's bind
// bodies under the bounded evaluator with real control flow (if/for/while
// over concrete values), and turns every `bind` statement into a graph
// edge: push port → reaction, pull port → getter. Reaction inbound counts
// are bumped here so the verifier can check the one-port-per-reaction rule.
//
// Preconditions: `composer` holds the full instance tree and all getter and
//   reaction nodes are internable; `effects` covers every bound callable.
// Postconditions: every `bind` statement of every instance contributed one
//                 edge.
// Failure modes: none on frontend-validated input; a non-concrete condition,
//                bound, or operand in a bind body is a frontend bug and
//                panics, as is a loop exceeding the iteration cap.
// Side effects: mutates `composer` in place.

use std::collections::HashMap;

use crate::access::EffectTable;
use crate::ast::*;
use crate::graph::Composer;
use crate::id::CompId;
use crate::interp::{Evaluator, Value};
use crate::layout::Layout;

/// Upper bound on `while` iterations inside one bind body.
const MAX_BIND_STEPS: u32 = 1 << 16;

/// Interpret every bind body of every instance, wiring ports to their
/// reactions and getters.
pub fn bind(
    program: &Program,
    layout: &Layout,
    effects: &EffectTable,
    composer: &mut Composer,
) {
    let instances: Vec<(CompId, u32)> = composer
        .instances()
        .map(|i| (i.comp, i.address))
        .collect();

    for &(comp, addr) in &instances {
        let decl = program.component(comp);
        for bind_decl in &decl.binds {
            let mut binder = Binder {
                program,
                layout,
                effects,
                composer,
                self_addr: addr,
                locals: HashMap::new(),
            };
            binder.exec_block(&bind_decl.body);
        }
    }
}

struct Binder<'a> {
    program: &'a Program,
    layout: &'a Layout,
    effects: &'a EffectTable,
    composer: &'a mut Composer,
    self_addr: u32,
    locals: HashMap<String, Value>,
}

impl Binder<'_> {
    fn eval(&self, expr: &Expr) -> Value {
        let mut ev = Evaluator::new(self.layout, self.composer, self.self_addr, None);
        for (name, value) in &self.locals {
            ev.bind_local(name, *value);
        }
        ev.eval(expr)
    }

    fn eval_bool(&self, expr: &Expr) -> bool {
        match self.eval(expr) {
            Value::Bool(v) => v,
            other => panic!("bind condition is not a compile-time boolean: {other:?}"),
        }
    }

    fn eval_int(&self, expr: &Expr) -> i64 {
        match self.eval(expr) {
            Value::Int(v) => v,
            other => panic!("bind bound is not a compile-time integer: {other:?}"),
        }
    }

    fn eval_port(&self, expr: &Expr) -> u32 {
        match self.eval(expr) {
            Value::Addr(a) => a,
            other => panic!("bind port selector is not a port address: {other:?}"),
        }
    }

    fn exec_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.exec_stmt(stmt);
        }
    }

    fn exec_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Let { name, value, .. } => {
                let v = self.eval(value);
                self.locals.insert(name.name.clone(), v);
            }
            StmtKind::If {
                cond,
                then_blk,
                else_blk,
            } => {
                if self.eval_bool(cond) {
                    self.exec_block(then_blk);
                } else if let Some(blk) = else_blk {
                    self.exec_block(blk);
                }
            }
            StmtKind::For {
                var,
                from,
                to,
                body,
            } => {
                let from = self.eval_int(from);
                let to = self.eval_int(to);
                for i in from..to {
                    self.locals.insert(var.name.clone(), Value::Int(i));
                    self.exec_block(body);
                }
                self.locals.remove(&var.name);
            }
            StmtKind::While { cond, body } => {
                let mut steps = 0u32;
                while self.eval_bool(cond) {
                    steps += 1;
                    assert!(
                        steps <= MAX_BIND_STEPS,
                        "bind body exceeded {MAX_BIND_STEPS} loop iterations"
                    );
                    self.exec_block(body);
                }
            }
            StmtKind::BindPush { port, reaction } => self.bind_push(port, reaction),
            StmtKind::BindPull { port, getter } => self.bind_pull(port, getter),
            other => panic!("unsupported statement in bind body: {other:?}"),
        }
    }

    fn bind_push(&mut self, port: &Expr, target: &ReactionRef) {
        let port_addr = self.eval_port(port);
        let port_node = self.composer.push_port_at(port_addr).unwrap_or_else(|| {
            panic!("no push port registered at address {port_addr}")
        });

        let base_addr = self.eval_port(&target.base);
        let instance = self.composer.instance_at(base_addr).unwrap_or_else(|| {
            panic!("bind target did not resolve to an instance at {base_addr}")
        });
        let index = target.index.as_ref().map(|e| {
            let i = self.eval_int(e);
            assert!(i >= 0, "negative reaction index in bind body");
            i as u32
        });
        let decl = &self.program.component(target.comp).reactions[target.reaction.0 as usize];
        let access = self
            .effects
            .reactions
            .get(&(target.comp, target.reaction))
            .copied()
            .unwrap_or_default();
        let name = match index {
            None => format!(
                "{}.{}",
                self.composer.instance(instance).path,
                decl.name.name
            ),
            Some(i) => format!(
                "{}.{}[{i}]",
                self.composer.instance(instance).path,
                decl.name.name
            ),
        };
        let node = self
            .composer
            .intern_reaction(instance, target.reaction, index, access, name, decl.span);
        self.composer.add_edge(port_node, node);
        self.composer.bump_reaction_inbound(node);
    }

    fn bind_pull(&mut self, port: &Expr, target: &GetterRef) {
        let port_addr = self.eval_port(port);
        let port_node = self.composer.pull_port_at(port_addr).unwrap_or_else(|| {
            panic!("no pull port registered at address {port_addr}")
        });

        let base_addr = self.eval_port(&target.base);
        let instance = self.composer.instance_at(base_addr).unwrap_or_else(|| {
            panic!("bind target did not resolve to an instance at {base_addr}")
        });
        let decl = &self.program.component(target.comp).getters[target.getter.0 as usize];
        let access = self
            .effects
            .getters
            .get(&(target.comp, target.getter))
            .copied()
            .unwrap_or_default();
        let name = format!(
            "{}.{}",
            self.composer.instance(instance).path,
            decl.name.name
        );
        let node = self
            .composer
            .intern_getter(instance, target.getter, access, name, decl.span);
        self.composer.add_edge(port_node, node);
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
