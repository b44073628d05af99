//! Core domain types and shared error handling for the workflow engine.
//!
//! This crate provides the strongly-typed identifiers and the layered
//! `Result` alias used throughout the engine and triggers crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExecutionId, ParseIdError, TriggerFireId, TriggerId, WorkflowId};
