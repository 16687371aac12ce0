// End-to-end composition scenarios through the full pipeline: effect
// inference, instantiation, elaboration, binding, verification.

mod common;

use common::*;
use rcc::ast::{CallTarget, ExprKind, GetterRef, ReactionRef, StmtKind, Type};
use rcc::compose::{compose, ComposeResult};
use rcc::graph::{AccessLevel, NodeKind};

fn codes(result: &ComposeResult) -> Vec<&'static str> {
    result
        .diagnostics()
        .iter()
        .filter_map(|d| d.code.map(|c| c.0))
        .collect()
}

/// Two push ports fanned out to two read-only reactions on one shared sink:
/// concurrent reads are compatible.
#[test]
fn read_only_fan_out_verifies() {
    let mut b = UnitBuilder::new();
    let sink = b.component("Sink");
    let val = b.scalar(sink, "val", Type::Int);
    let read_val = || StmtKind::Expr(field_sel(receiver(sink), sink, val, Type::Int));
    let r1 = b.reaction(sink, "observe_a", vec![read_val()]);
    let r2 = b.reaction(sink, "observe_b", vec![read_val()]);

    let main = b.component("Main");
    let port_a = b.push_port(main, "a", None);
    let port_b = b.push_port(main, "b", None);
    let sub = b.sub(main, "sink", sink, None);

    let sink_sel = || field_sel(receiver(main), main, sub, Type::Component(sink));
    b.binds(
        main,
        vec![
            StmtKind::BindPush {
                port: field_sel(receiver(main), main, port_a, Type::Int),
                reaction: ReactionRef {
                    base: sink_sel(),
                    comp: sink,
                    reaction: r1,
                    index: None,
                    span: rcc::ast::Span::dummy(),
                },
            },
            StmtKind::BindPush {
                port: field_sel(receiver(main), main, port_b, Type::Int),
                reaction: ReactionRef {
                    base: sink_sel(),
                    comp: sink,
                    reaction: r2,
                    index: None,
                    span: rcc::ast::Span::dummy(),
                },
            },
        ],
    );

    let fire = |field| {
        StmtKind::Expr(call(
            CallTarget::PushPort,
            Some(field_sel(receiver(main), main, field, Type::Int)),
            vec![int_lit(1)],
            Type::Void,
        ))
    };
    let body = vec![fire(port_a), fire(port_b)];
    let activate = b.activate(body);
    b.action(main, "tick", bool_lit(true), vec![activate]);

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert!(codes(&result).is_empty(), "got {:?}", result.diagnostics());

    // The action's instance set records the shared sink at Read.
    let action = result.composer.actions()[0];
    let set = result.verify.instance_set(action).unwrap();
    let sink_id = result
        .composer
        .instances()
        .find(|i| i.path == "Main.sink")
        .unwrap()
        .id;
    assert_eq!(set.get(sink_id), AccessLevel::Read);
}

/// Same fan-out, but both reactions write the shared sink: exactly one
/// non-determinism diagnostic at the activation.
#[test]
fn concurrent_writes_to_shared_sink_conflict() {
    let mut b = UnitBuilder::new();
    let sink = b.component("Sink");
    let val = b.scalar(sink, "val", Type::Int);
    let write_val = || StmtKind::Assign {
        target: field_sel(receiver(sink), sink, val, Type::Int),
        value: int_lit(1),
    };
    let r1 = b.reaction(sink, "bump_a", vec![write_val()]);
    let r2 = b.reaction(sink, "bump_b", vec![write_val()]);

    let main = b.component("Main");
    let port_a = b.push_port(main, "a", None);
    let port_b = b.push_port(main, "b", None);
    let sub = b.sub(main, "sink", sink, None);

    for (port, reaction) in [(port_a, r1), (port_b, r2)] {
        b.binds(
            main,
            vec![StmtKind::BindPush {
                port: field_sel(receiver(main), main, port, Type::Int),
                reaction: ReactionRef {
                    base: field_sel(receiver(main), main, sub, Type::Component(sink)),
                    comp: sink,
                    reaction,
                    index: None,
                    span: rcc::ast::Span::dummy(),
                },
            }],
        );
    }

    let fire = |field| {
        StmtKind::Expr(call(
            CallTarget::PushPort,
            Some(field_sel(receiver(main), main, field, Type::Int)),
            vec![int_lit(1)],
            Type::Void,
        ))
    };
    let body = vec![fire(port_a), fire(port_b)];
    let activate = b.activate(body);
    b.action(main, "tick", bool_lit(true), vec![activate]);

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert_eq!(codes(&result), vec!["E0805"]);
    let diag = &result.diagnostics()[0];
    assert!(diag.message.contains("Main.sink"), "got: {}", diag.message);
}

/// Binding a push port to one element of a dimensioned reaction lands the
/// edge on exactly the node for that index.
#[test]
fn indexed_bind_targets_one_reaction_element() {
    let mut b = UnitBuilder::new();
    let sink = b.component("Sink");
    let val = b.scalar(sink, "val", Type::Int);
    let r = b.dim_reaction(
        sink,
        "consume",
        2,
        vec![StmtKind::Assign {
            target: field_sel(receiver(sink), sink, val, Type::Int),
            value: int_lit(1),
        }],
    );

    let main = b.component("Main");
    let out = b.push_port(main, "out", None);
    let sub = b.sub(main, "sink", sink, None);
    b.binds(
        main,
        vec![StmtKind::BindPush {
            port: field_sel(receiver(main), main, out, Type::Int),
            reaction: ReactionRef {
                base: field_sel(receiver(main), main, sub, Type::Component(sink)),
                comp: sink,
                reaction: r,
                index: Some(int_lit(1)),
                span: rcc::ast::Span::dummy(),
            },
        }],
    );

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert!(codes(&result).is_empty(), "got {:?}", result.diagnostics());

    // Main's push port sits at the first field slot past the header.
    let port = result.composer.push_port_at(8).unwrap();
    let edges = &result.composer.node(port).edges;
    assert_eq!(edges.len(), 1);
    let target = result.composer.node(edges[0]);
    assert_eq!(target.name, "Main.sink.consume[1]");
    let NodeKind::Reaction { index, inbound, .. } = target.kind else {
        panic!("push port bound to a non-reaction node");
    };
    assert_eq!(index, Some(1));
    assert_eq!(inbound, 1);
}

/// One push port fanned out to two distinct reactions is legal:
/// cardinality bounds the ports per reaction, not the reactions per port.
#[test]
fn push_port_fan_out_to_two_reactions_verifies() {
    let mut b = UnitBuilder::new();
    let sink = b.component("Sink");
    let val = b.scalar(sink, "val", Type::Int);
    let read_val = || StmtKind::Expr(field_sel(receiver(sink), sink, val, Type::Int));
    let r1 = b.reaction(sink, "observe_a", vec![read_val()]);
    let r2 = b.reaction(sink, "observe_b", vec![read_val()]);

    let main = b.component("Main");
    let out = b.push_port(main, "out", None);
    let sub = b.sub(main, "sink", sink, None);
    for reaction in [r1, r2] {
        b.binds(
            main,
            vec![StmtKind::BindPush {
                port: field_sel(receiver(main), main, out, Type::Int),
                reaction: ReactionRef {
                    base: field_sel(receiver(main), main, sub, Type::Component(sink)),
                    comp: sink,
                    reaction,
                    index: None,
                    span: rcc::ast::Span::dummy(),
                },
            }],
        );
    }

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert!(codes(&result).is_empty(), "got {:?}", result.diagnostics());
    let port = result.composer.push_port_at(8).unwrap();
    assert_eq!(result.composer.node(port).edges.len(), 2);
}

/// A reaction fed by two push ports violates cardinality even when no
/// action ever fires the ports.
#[test]
fn multiply_bound_reaction_is_rejected() {
    let mut b = UnitBuilder::new();
    let sink = b.component("Sink");
    let r = b.reaction(sink, "consume", vec![]);

    let main = b.component("Main");
    let port_a = b.push_port(main, "a", None);
    let port_b = b.push_port(main, "b", None);
    let sub = b.sub(main, "sink", sink, None);

    for port in [port_a, port_b] {
        b.binds(
            main,
            vec![StmtKind::BindPush {
                port: field_sel(receiver(main), main, port, Type::Int),
                reaction: ReactionRef {
                    base: field_sel(receiver(main), main, sub, Type::Component(sink)),
                    comp: sink,
                    reaction: r,
                    index: None,
                    span: rcc::ast::Span::dummy(),
                },
            }],
        );
    }

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert_eq!(codes(&result), vec!["E0803"]);
}

/// Pull-port cardinality: zero bindings and two bindings are both errors,
/// independent of whether any action reaches the port.
#[test]
fn unbound_pull_port_is_rejected() {
    let mut b = UnitBuilder::new();
    let main = b.component("Main");
    b.pull_port(main, "inlet", None);

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert_eq!(codes(&result), vec!["E0801"]);
}

#[test]
fn doubly_bound_pull_port_is_rejected() {
    let mut b = UnitBuilder::new();
    let main = b.component("Main");
    let inlet = b.pull_port(main, "inlet", None);
    let g1 = b.getter(main, "level_a", vec![StmtKind::Return(Some(int_lit(1)))]);
    let g2 = b.getter(main, "level_b", vec![StmtKind::Return(Some(int_lit(2)))]);

    for getter in [g1, g2] {
        b.binds(
            main,
            vec![StmtKind::BindPull {
                port: field_sel(receiver(main), main, inlet, Type::Int),
                getter: GetterRef {
                    base: receiver(main),
                    comp: main,
                    getter,
                    span: rcc::ast::Span::dummy(),
                },
            }],
        );
    }

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert_eq!(codes(&result), vec!["E0802"]);
}

/// A reaction that re-fires the port it is bound to closes a trigger loop.
/// The conflict phase stays silent on a cyclic graph.
#[test]
fn self_refiring_reaction_is_recursive() {
    let mut b = UnitBuilder::new();
    let main = b.component("Main");
    let out = b.push_port(main, "out", None);

    let fire = StmtKind::Expr(call(
        CallTarget::PushPort,
        Some(field_sel(receiver(main), main, out, Type::Int)),
        vec![int_lit(1)],
        Type::Void,
    ));
    let echo_activate = b.activate(vec![fire]);
    let echo = b.reaction(main, "echo", vec![echo_activate]);

    b.binds(
        main,
        vec![StmtKind::BindPush {
            port: field_sel(receiver(main), main, out, Type::Int),
            reaction: ReactionRef {
                base: receiver(main),
                comp: main,
                reaction: echo,
                index: None,
                span: rcc::ast::Span::dummy(),
            },
        }],
    );

    let fire = StmtKind::Expr(call(
        CallTarget::PushPort,
        Some(field_sel(receiver(main), main, out, Type::Int)),
        vec![int_lit(1)],
        Type::Void,
    ));
    let tick_activate = b.activate(vec![fire]);
    b.action(main, "tick", bool_lit(true), vec![tick_activate]);

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert_eq!(codes(&result), vec!["E0804"]);
    assert!(result.diagnostics()[0].message.contains("Main.out"));
}

/// An action guard querying a sub-instance's getter links the instances
/// and contributes a Read to the action's set; the pipeline verifies.
#[test]
fn guard_getter_read_links_and_verifies() {
    let mut b = UnitBuilder::new();
    let sink = b.component("Sink");
    let val = b.scalar(sink, "val", Type::Int);
    let level = b.getter(
        sink,
        "level",
        vec![StmtKind::Return(Some(field_sel(
            receiver(sink),
            sink,
            val,
            Type::Int,
        )))],
    );

    let main = b.component("Main");
    let sub = b.sub(main, "sink", sink, None);

    let guard = expr(
        ExprKind::Binary {
            op: rcc::ast::BinaryOp::Gt,
            lhs: Box::new(call(
                CallTarget::Getter {
                    comp: sink,
                    getter: level,
                },
                Some(field_sel(receiver(main), main, sub, Type::Component(sink))),
                vec![],
                Type::Int,
            )),
            rhs: Box::new(int_lit(0)),
        },
        Type::Bool,
    );
    b.action(main, "tick", guard, vec![]);

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert!(codes(&result).is_empty(), "got {:?}", result.diagnostics());

    let main_id = result.composer.instance_at(0).unwrap();
    let sink_inst = result
        .composer
        .instances()
        .find(|i| i.path == "Main.sink")
        .unwrap();
    assert!(sink_inst.linked.contains(&main_id));

    // Guard access lands in the action's instance set: Read on both the
    // receiver (whose field the selector traverses) and the queried sink.
    let action = result.composer.actions()[0];
    let set = result.verify.instance_set(action).unwrap();
    assert_eq!(set.get(main_id), AccessLevel::Read);
    assert_eq!(set.get(sink_inst.id), AccessLevel::Read);
}

/// A pull port answered by a getter, queried from an action body: the
/// trigger chain action → port → getter resolves through the binding.
#[test]
fn pull_chain_resolves_through_binding() {
    let mut b = UnitBuilder::new();
    let main = b.component("Main");
    let val = b.scalar(main, "val", Type::Int);
    let inlet = b.pull_port(main, "inlet", None);
    let level = b.getter(
        main,
        "level",
        vec![StmtKind::Return(Some(field_sel(
            receiver(main),
            main,
            val,
            Type::Int,
        )))],
    );

    b.binds(
        main,
        vec![StmtKind::BindPull {
            port: field_sel(receiver(main), main, inlet, Type::Int),
            getter: GetterRef {
                base: receiver(main),
                comp: main,
                getter: level,
                span: rcc::ast::Span::dummy(),
            },
        }],
    );

    let query = StmtKind::Expr(call(
        CallTarget::PullPort,
        Some(field_sel(receiver(main), main, inlet, Type::Int)),
        vec![],
        Type::Int,
    ));
    b.action(main, "tick", bool_lit(true), vec![query]);

    let unit = b.finish(main);
    let result = compose(&unit, false);
    assert!(codes(&result).is_empty(), "got {:?}", result.diagnostics());

    let action = result.composer.actions()[0];
    let main_id = result.composer.instance_at(0).unwrap();
    let set = result.verify.instance_set(action).unwrap();
    assert_eq!(set.get(main_id), AccessLevel::Read);
}
