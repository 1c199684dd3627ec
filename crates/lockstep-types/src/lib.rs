//! Shared domain types for Lockstep.
//!
//! This crate contains the vocabulary the engine crate builds on: step and
//! workflow statuses, control signals, retry policy, the notification event
//! type, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, thiserror.

pub mod error;
pub mod event;
pub mod signal;
pub mod step;
pub mod workflow;
