//! auditview event sources
//!
//! Lazy, finite sequences of audit events. A source yields `Ok(Some(event))`
//! until it is exhausted, then `Ok(None)`; any `Err` is a real failure.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod jsonl;
pub mod paged;
pub mod stream;

pub use jsonl::JsonLinesFetcher;
pub use paged::{PageFetcher, PagedSource};
pub use stream::{EventSource, EventStream, SourceError};
