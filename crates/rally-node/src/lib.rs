//! rally-node library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! Most callers only need [`SessionNodeBuilder`] and [`SessionNode`].

pub mod application;
pub mod infrastructure;

pub use application::session_node::{SessionNode, SessionNodeBuilder};
