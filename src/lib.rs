//! Backlog Forge: named projects, each driving its own sandbox to plan and
//! build an app, with live agent output streamed to observers.
//!
//! - [`registry`] allocates durable, collision-free project identifiers.
//! - [`orchestrator`] owns one project's state and its sandbox session.
//! - [`sandbox`] is the contract for isolated execution, plus a local adapter.
//! - [`stream`] defines the frames emitted by streamed operations.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod names;
pub mod orchestrator;
pub mod registry;
pub mod sandbox;
pub mod stream;

pub use error::{Error, Result};
