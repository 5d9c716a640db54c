//! Page-by-page event fetching.
//!
//! Audit logs are served in pages. [`PagedSource`] asks its fetcher for one
//! page at a time and hands the events out individually, so at most one page
//! is held in memory regardless of the length of the log.

use crate::stream::{EventSource, SourceError};
use auditview_core::AuditEvent;
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use tracing::debug;

/// Fetches one page of audit events
pub trait PageFetcher {
    /// Fetch page `page` (0-based) holding at most `per_page` events.
    ///
    /// A page shorter than `per_page` is the last page.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the page cannot be fetched.
    fn fetch_page(&mut self, page: usize, per_page: NonZeroUsize) -> Result<Vec<AuditEvent>, SourceError>;
}

/// Event source that pulls pages on demand
pub struct PagedSource<F> {
    fetcher: F,
    per_page: NonZeroUsize,
    page: usize,
    buffer: VecDeque<AuditEvent>,
    last_page_seen: bool,
}

impl<F: PageFetcher> PagedSource<F> {
    /// Read from `fetcher`, `per_page` events at a time
    pub fn new(fetcher: F, per_page: NonZeroUsize) -> Self {
        Self {
            fetcher,
            per_page,
            page: 0,
            buffer: VecDeque::with_capacity(per_page.get()),
            last_page_seen: false,
        }
    }

    /// Number of pages fetched so far
    pub fn pages_fetched(&self) -> usize {
        self.page
    }
}

impl<F: PageFetcher> EventSource for PagedSource<F> {
    fn next_event(&mut self) -> Result<Option<AuditEvent>, SourceError> {
        if self.buffer.is_empty() && !self.last_page_seen {
            let events = self.fetcher.fetch_page(self.page, self.per_page)?;
            debug!(page = self.page, events = events.len(), "fetched audit page");
            self.page += 1;
            self.last_page_seen = events.len() < self.per_page.get();
            self.buffer.extend(events);
        }
        Ok(self.buffer.pop_front())
    }
}
