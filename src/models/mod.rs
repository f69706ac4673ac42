//! Domain models for Backlog Forge.
//!
//! # Core Concepts
//!
//! ## Registry Entities
//!
//! - [`ProjectRecord`]: Durable mapping from a unique identifier to the name the
//!   user typed. Identifiers never change once allocated.
//!
//! ## Project State
//!
//! - [`ProjectState`]: The durable document each project orchestrator owns:
//!   display name, skill catalog, agent configuration and the last generated
//!   requirements document and backlog.
//! - [`Story`]: One backlog entry produced by the planning skill.
//!
//! ## Ephemeral
//!
//! - [`ProjectPhase`]: Where a project's orchestrator currently is in its
//!   lifecycle. Derived at runtime, never persisted.

mod project;
mod state;
mod story;

pub use project::*;
pub use state::*;
pub use story::*;
