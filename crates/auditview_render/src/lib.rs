//! auditview rendering
//!
//! Turns a lazy sequence of audit events into terminal output: rows are
//! mapped from events, laid out to the terminal width (or serialized as JSON)
//! and written into an interactive pager.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod format;
pub mod layout;
pub mod pager;
pub mod render;
pub mod table;

pub use format::{ColumnFormatter, FormatError, JsonFormatter, TableFormatter};
pub use layout::{allocate_widths, COLUMN_GAP};
pub use pager::{FallbackPager, PagerCommand, PagerError, PaginatedPager, Pager};
pub use render::{AuditRenderer, OutputFormat, PagerProvider, RenderConfig, RenderError, RenderSummary, StopReason, SystemPagers};
pub use table::{AuditTable, Column, MappingError, Row};
