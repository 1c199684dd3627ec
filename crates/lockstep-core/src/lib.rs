//! Lockstep engine: an in-process control-flow interpreter.
//!
//! Application code composes asynchronous units of work (steps) into linear
//! pipelines (workflows) with conditional branching, iteration, multi-way
//! dispatch, and flow-control signaling. This crate contains the engine:
//! - `path` -- dotted/bracketed path parsing and nested container access
//! - `state` -- the path-addressed shared state container
//! - `condition` -- the (subject, operator, value) evaluation primitive
//! - `callable` -- polymorphic callables (function, nested step, nested workflow)
//! - `step` -- the atomic executable unit and its status state machine
//! - `logic` -- composite logic steps (conditional, switch, loop, flow control)
//! - `workflow` -- the sequential orchestrator with pause/resume
//! - `event` -- the broadcast notification bus
//! - `snapshot` -- lossy text snapshots of steps and workflows for logging

pub mod callable;
pub mod condition;
pub mod event;
pub mod logic;
pub mod path;
pub mod snapshot;
pub mod state;
pub mod step;
pub mod workflow;
