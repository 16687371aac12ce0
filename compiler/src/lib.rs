// rcc — Relay Compiler Collection, composition analysis core.
//
// Takes a type-checked, laid-out Relay compilation unit and answers one
// question: is the composed program safe to run? Concretely it infers
// receiver access effects, instantiates the component tree, elaborates
// and binds the trigger graph, and verifies port cardinality, acyclicity,
// and conflict freedom of concurrently triggered computations.
//
// Phase order: `access` → `instantiate` → `elaborate` → `bind` → `verify`,
// driven by `compose`.

pub mod access;
pub mod ast;
pub mod bind;
pub mod compose;
pub mod diag;
pub mod dot;
pub mod elaborate;
pub mod graph;
pub mod id;
pub mod instantiate;
pub mod interp;
pub mod layout;
pub mod verify;
