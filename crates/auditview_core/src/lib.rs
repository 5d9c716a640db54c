//! auditview core types
//!
//! This crate contains pure types and logic with no I/O: identifiers, audit
//! events, directory tree snapshots and timestamp formatting.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod id;
pub mod time;
pub mod tree;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use event::{Action, Actor, AuditEvent, Subject};
pub use id::{DirId, EventId, SecretId};
pub use time::{TimeFormatter, TimeStyle};
pub use tree::{DirNode, DirTree, SecretNode, TreeSnapshot};
