//! JSON Lines backed page fetcher.
//!
//! Serves pages from an exported audit log with one JSON event per line.
//! Pages are read sequentially; blank lines are skipped.

use crate::paged::PageFetcher;
use crate::stream::SourceError;
use auditview_core::AuditEvent;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::num::NonZeroUsize;
use std::path::Path;

/// Reads pages of events from a JSON Lines reader
pub struct JsonLinesFetcher<R> {
    reader: R,
    line: usize,
    buf: String,
}

impl JsonLinesFetcher<BufReader<File>> {
    /// Open an exported audit log file.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Io`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesFetcher<R> {
    /// Wrap a buffered reader positioned at the first record
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    fn next_record(&mut self) -> Result<Option<AuditEvent>, SourceError> {
        loop {
            self.buf.clear();
            if self.reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;
            let record = self.buf.trim();
            if record.is_empty() {
                continue;
            }
            return serde_json::from_str(record)
                .map(Some)
                .map_err(|source| SourceError::Decode {
                    line: self.line,
                    source,
                });
        }
    }
}

impl<R: BufRead> PageFetcher for JsonLinesFetcher<R> {
    fn fetch_page(&mut self, _page: usize, per_page: NonZeroUsize) -> Result<Vec<AuditEvent>, SourceError> {
        let mut events = Vec::with_capacity(per_page.get());
        while events.len() < per_page.get() {
            match self.next_record()? {
                Some(event) => events.push(event),
                None => break,
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::PagedSource;
    use crate::stream::EventSource;
    use std::io::{Cursor, Write};

    const LOG: &str = r#"{"actor":{"type":"user","username":"dev1"},"action":"read","subject":{"type":"repo"},"ip_address":"10.0.0.1","logged_at":"2024-03-01T12:00:00Z"}

{"actor":{"type":"service","service_id":"s-abc"},"action":"create","subject":{"type":"secret_key"},"ip_address":"10.0.0.2","logged_at":"2024-03-01T12:05:00Z"}
{"actor":{"type":"user","username":"dev2"},"action":"delete","subject":{"type":"repo"},"ip_address":"10.0.0.3","logged_at":"2024-03-01T12:10:00Z"}
"#;

    fn per_page(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_pages_skip_blank_lines() {
        let mut fetcher = JsonLinesFetcher::new(Cursor::new(LOG));
        let first = fetcher.fetch_page(0, per_page(2)).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].ip_address, "10.0.0.2");
        let second = fetcher.fetch_page(1, per_page(2)).unwrap();
        assert_eq!(second.len(), 1);
        assert!(fetcher.fetch_page(2, per_page(2)).unwrap().is_empty());
    }

    #[test]
    fn test_decode_error_reports_line() {
        let input = format!("{}not json\n", LOG);
        let mut source = PagedSource::new(JsonLinesFetcher::new(Cursor::new(input)), per_page(10));
        match source.next_event() {
            Err(SourceError::Decode { line, .. }) => assert_eq!(line, 5),
            other => panic!("expected decode error, got {:?}", other.map(|e| e.is_some())),
        }
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(LOG.as_bytes()).unwrap();
        file.flush().unwrap();

        let fetcher = JsonLinesFetcher::open(file.path()).unwrap();
        let mut source = PagedSource::new(fetcher, per_page(1));
        let mut count = 0;
        while source.next_event().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = JsonLinesFetcher::open(dir.path().join("missing.jsonl"));
        assert!(matches!(result, Err(SourceError::Io(_))));
    }
}
