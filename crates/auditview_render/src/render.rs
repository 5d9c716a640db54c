//! The render loop.
//!
//! Pulls events from a source one at a time, maps each to a row, formats it
//! and writes it to a pager. The pager is closed on every exit path.

use crate::format::{ColumnFormatter, FormatError, JsonFormatter, TableFormatter};
use crate::pager::{FallbackPager, Pager, PagerError, PaginatedPager, FALLBACK_LINE_COUNT};
use crate::table::{AuditTable, MappingError};
use auditview_log::{EventSource, SourceError};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::{debug, warn};

/// Terminal width used when it cannot be detected
pub const DEFAULT_TERMINAL_WIDTH: usize = 80;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Aligned columns with a header row
    #[default]
    Table,
    /// One JSON object per event
    Json,
}

/// Render configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output format
    pub format: OutputFormat,
    /// Table width; detected from the terminal if `None`
    pub width: Option<usize>,
    /// Width used when detection fails
    pub default_width: usize,
    /// Lines written when no interactive pager is available
    pub fallback_lines: usize,
    /// Environment variable naming the preferred pager
    pub pager_env: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            width: None,
            default_width: DEFAULT_TERMINAL_WIDTH,
            fallback_lines: FALLBACK_LINE_COUNT,
            pager_env: "PAGER".to_string(),
        }
    }
}

impl RenderConfig {
    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Set a fixed table width
    #[must_use]
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    /// Set the fallback line budget
    #[must_use]
    pub fn with_fallback_lines(mut self, lines: usize) -> Self {
        self.fallback_lines = lines;
        self
    }

    /// Table width: the configured width, else the terminal's
    #[must_use]
    pub fn table_width(&self) -> usize {
        self.width
            .unwrap_or_else(|| probe_terminal_width(self.default_width))
    }
}

/// Width of the attached terminal, or `default` if there is none
#[must_use]
pub fn probe_terminal_width(default: usize) -> usize {
    match crossterm::terminal::size() {
        Ok((columns, _)) if columns > 0 => usize::from(columns),
        Ok(_) => default,
        Err(err) => {
            debug!(error = %err, default, "could not detect terminal width");
            default
        }
    }
}

/// Opens the pagers a render run writes to
pub trait PagerProvider {
    /// Open an interactive pager.
    ///
    /// # Errors
    ///
    /// Returns [`PagerError::NotFound`] if none is available.
    fn open_pager(&self, config: &RenderConfig) -> Result<Box<dyn Pager>, PagerError>;

    /// Open the bounded pager used when no interactive pager is available
    fn open_fallback(&self, config: &RenderConfig) -> Box<dyn Pager>;
}

/// Pagers backed by the process environment and standard output
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPagers;

impl PagerProvider for SystemPagers {
    fn open_pager(&self, config: &RenderConfig) -> Result<Box<dyn Pager>, PagerError> {
        Ok(Box::new(PaginatedPager::from_env(&config.pager_env)?))
    }

    fn open_fallback(&self, config: &RenderConfig) -> Box<dyn Pager> {
        Box::new(FallbackPager::with_line_count(
            io::stdout(),
            config.fallback_lines,
        ))
    }
}

/// Render errors
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Reading the next event failed
    #[error("failed to read audit events: {0}")]
    Source(#[from] SourceError),

    /// An event could not be mapped to a row
    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// A row could not be formatted
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The pager could not be opened or written to
    #[error(transparent)]
    Pager(#[from] PagerError),
}

/// Why a render run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The source ran out of events
    Exhausted,
    /// The user quit the pager
    PagerClosed,
    /// The fallback line budget was used up
    Truncated,
}

/// Outcome of a successful render run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSummary {
    /// Event rows written in full, excluding the header
    pub rows: usize,
    /// Why the run stopped
    pub stopped: StopReason,
}

/// Renders audit events into a pager
pub struct AuditRenderer<P = SystemPagers> {
    config: RenderConfig,
    pagers: P,
}

impl AuditRenderer<SystemPagers> {
    /// Create a renderer writing to the system pager
    #[must_use]
    pub fn new(config: RenderConfig) -> Self {
        Self::with_pagers(config, SystemPagers)
    }
}

impl<P: PagerProvider> AuditRenderer<P> {
    /// Create a renderer with a custom pager provider
    #[must_use]
    pub fn with_pagers(config: RenderConfig, pagers: P) -> Self {
        Self { config, pagers }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Render every event of `source` as a row of `table`.
    ///
    /// Stops without error when the source is exhausted, the user quits the
    /// pager or the fallback line budget runs out.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] on the first source, mapping, formatting or
    /// pager failure.
    pub fn render<S: EventSource>(
        &self,
        table: &AuditTable,
        mut source: S,
    ) -> Result<RenderSummary, RenderError> {
        let formatter = self.formatter(table);
        let mut guard = PagerGuard::new(self.acquire_pager()?);

        let summary = render_rows(guard.pager(), formatter.as_ref(), table, &mut source)?;
        guard.release()?;

        debug!(rows = summary.rows, stopped = ?summary.stopped, "render finished");
        Ok(summary)
    }

    fn formatter(&self, table: &AuditTable) -> Box<dyn TableFormatter> {
        match self.config.format {
            OutputFormat::Json => Box::new(JsonFormatter::new(table.header())),
            OutputFormat::Table => {
                let formatter =
                    ColumnFormatter::new(self.config.table_width(), table.columns().to_vec());
                debug!(widths = ?formatter.column_widths(), "computed column widths");
                Box::new(formatter)
            }
        }
    }

    fn acquire_pager(&self) -> Result<Box<dyn Pager>, PagerError> {
        match self.pagers.open_pager(&self.config) {
            Err(PagerError::NotFound) => {
                warn!(
                    lines = self.config.fallback_lines,
                    "{}; output is limited",
                    PagerError::NotFound
                );
                Ok(self.pagers.open_fallback(&self.config))
            }
            other => other,
        }
    }
}

fn render_rows(
    pager: &mut dyn Pager,
    formatter: &dyn TableFormatter,
    table: &AuditTable,
    source: &mut dyn EventSource,
) -> Result<RenderSummary, RenderError> {
    let mut rows = 0;

    if formatter.print_header() {
        let header = formatter.format_row(&table.header())?;
        if let Some((stopped, _)) = write_line(pager, header)? {
            return Ok(RenderSummary { rows, stopped });
        }
    }

    while let Some(event) = source.next_event()? {
        let row = table.row(&event)?;
        let line = formatter.format_row(&row)?;
        if pager.is_closed() {
            debug!(rows, "pager closed, stopping early");
            return Ok(RenderSummary {
                rows,
                stopped: StopReason::PagerClosed,
            });
        }
        match write_line(pager, line)? {
            None => rows += 1,
            Some((stopped, complete)) => {
                return Ok(RenderSummary {
                    rows: rows + usize::from(complete),
                    stopped,
                });
            }
        }
    }
    Ok(RenderSummary {
        rows,
        stopped: StopReason::Exhausted,
    })
}

/// Write one line.
///
/// `Some` means the pager accepts no more output; the flag tells whether the
/// line itself still made it out in full.
fn write_line(
    pager: &mut dyn Pager,
    mut line: String,
) -> Result<Option<(StopReason, bool)>, RenderError> {
    line.push('\n');
    match pager.write(line.as_bytes()) {
        Ok(_) => Ok(None),
        Err(PagerError::Truncated { written }) => {
            debug!(written, len = line.len(), "output truncated");
            Ok(Some((StopReason::Truncated, written == line.len())))
        }
        Err(PagerError::Io(err)) if err.kind() == io::ErrorKind::BrokenPipe => {
            debug!("pager stopped reading");
            Ok(Some((StopReason::PagerClosed, false)))
        }
        Err(err) => Err(err.into()),
    }
}

/// Closes the pager when dropped unless it was released explicitly
struct PagerGuard {
    pager: Box<dyn Pager>,
    released: bool,
}

impl PagerGuard {
    fn new(pager: Box<dyn Pager>) -> Self {
        Self {
            pager,
            released: false,
        }
    }

    fn pager(&mut self) -> &mut dyn Pager {
        self.pager.as_mut()
    }

    fn release(mut self) -> Result<(), PagerError> {
        self.released = true;
        self.pager.close()
    }
}

impl Drop for PagerGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(err) = self.pager.close() {
                warn!(error = %err, "failed to close pager");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditview_core::{Action, Actor, AuditEvent, Subject, TimeFormatter};
    use auditview_log::EventStream;
    use chrono::{TimeZone, Utc};
    use std::cell::RefCell;
    use std::io::Write;
    use std::rc::Rc;

    #[derive(Default)]
    struct Shared {
        out: Vec<u8>,
        writes: usize,
        closes: usize,
        /// `is_closed` turns true after this many writes
        quit_after: Option<usize>,
        /// writes fail with a broken pipe after this many writes
        broken_after: Option<usize>,
    }

    struct MemoryPager(Rc<RefCell<Shared>>);

    impl Pager for MemoryPager {
        fn write(&mut self, data: &[u8]) -> Result<usize, PagerError> {
            let mut shared = self.0.borrow_mut();
            if shared.broken_after.is_some_and(|n| shared.writes >= n) {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe).into());
            }
            shared.writes += 1;
            shared.out.extend_from_slice(data);
            Ok(data.len())
        }

        fn is_closed(&mut self) -> bool {
            let shared = self.0.borrow();
            shared.quit_after.is_some_and(|n| shared.writes >= n)
        }

        fn close(&mut self) -> Result<(), PagerError> {
            self.0.borrow_mut().closes += 1;
            Ok(())
        }
    }

    struct SharedWriter(Rc<RefCell<Shared>>);

    impl Write for SharedWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().out.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    enum Availability {
        Present,
        Missing,
        Broken,
    }

    struct TestPagers {
        shared: Rc<RefCell<Shared>>,
        availability: Availability,
    }

    impl TestPagers {
        fn new(availability: Availability) -> Self {
            Self {
                shared: Rc::default(),
                availability,
            }
        }

        fn output(&self) -> String {
            String::from_utf8(self.shared.borrow().out.clone()).unwrap()
        }
    }

    impl PagerProvider for Rc<TestPagers> {
        fn open_pager(&self, _config: &RenderConfig) -> Result<Box<dyn Pager>, PagerError> {
            match self.availability {
                Availability::Present => Ok(Box::new(MemoryPager(self.shared.clone()))),
                Availability::Missing => Err(PagerError::NotFound),
                Availability::Broken => Err(io::Error::from(io::ErrorKind::PermissionDenied).into()),
            }
        }

        fn open_fallback(&self, config: &RenderConfig) -> Box<dyn Pager> {
            Box::new(FallbackPager::with_line_count(
                SharedWriter(self.shared.clone()),
                config.fallback_lines,
            ))
        }
    }

    struct FailingSource {
        events: EventStream,
    }

    impl EventSource for FailingSource {
        fn next_event(&mut self) -> Result<Option<AuditEvent>, SourceError> {
            match self.events.next_event()? {
                Some(event) => Ok(Some(event)),
                None => Err(SourceError::Fetch("503 Service Unavailable".to_string())),
            }
        }
    }

    fn events(count: usize) -> Vec<AuditEvent> {
        (0..count)
            .map(|i| {
                AuditEvent::new(
                    Actor::User {
                        username: format!("dev{}", i),
                        full_name: None,
                    },
                    Action::Read,
                    Subject::Repo,
                    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, i as u32).unwrap(),
                )
                .with_ip_address("127.0.0.1")
            })
            .collect()
    }

    fn table() -> AuditTable {
        AuditTable::for_secret(TimeFormatter::new(true))
    }

    fn renderer(config: RenderConfig, availability: Availability) -> (AuditRenderer<Rc<TestPagers>>, Rc<TestPagers>) {
        let pagers = Rc::new(TestPagers::new(availability));
        (AuditRenderer::with_pagers(config, pagers.clone()), pagers)
    }

    fn table_config() -> RenderConfig {
        RenderConfig::default().with_width(121)
    }

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.format, OutputFormat::Table);
        assert_eq!(config.default_width, 80);
        assert_eq!(config.fallback_lines, 100);
        assert_eq!(config.pager_env, "PAGER");
        assert_eq!(config.with_width(50).table_width(), 50);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: RenderConfig = serde_json::from_str(r#"{"format":"json"}"#).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.fallback_lines, FALLBACK_LINE_COUNT);
    }

    #[test]
    fn test_renders_header_and_rows() {
        let (renderer, pagers) = renderer(table_config(), Availability::Present);
        let summary = renderer
            .render(&table(), EventStream::new(events(3)))
            .unwrap();

        assert_eq!(summary, RenderSummary { rows: 3, stopped: StopReason::Exhausted });
        let output = pagers.output();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("AUTHOR"));
        assert!(lines[1].starts_with("dev0"));
        assert!(lines[3].contains("2024-03-01T12:00:02Z"));
        // widths [32, 22, 39, 22] plus three gaps
        assert!(lines.iter().all(|line| line.chars().count() == 121));
        assert_eq!(pagers.shared.borrow().closes, 1);
    }

    #[test]
    fn test_json_output_has_no_header() {
        let config = table_config().with_format(OutputFormat::Json);
        let (renderer, pagers) = renderer(config, Availability::Present);
        renderer.render(&table(), EventStream::new(events(2))).unwrap();

        let output = pagers.output();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["AUTHOR"], "dev0");
        assert_eq!(first["EVENT"], "read.repo");
    }

    #[test]
    fn test_empty_source_writes_header_only() {
        let (renderer, pagers) = renderer(table_config(), Availability::Present);
        let summary = renderer.render(&table(), EventStream::new(Vec::new())).unwrap();
        assert_eq!(summary.rows, 0);
        assert_eq!(pagers.output().lines().count(), 1);
    }

    #[test]
    fn test_missing_pager_falls_back_and_truncates() {
        let config = table_config().with_fallback_lines(5);
        let (renderer, pagers) = renderer(config, Availability::Missing);
        let summary = renderer
            .render(&table(), EventStream::new(events(10)))
            .unwrap();

        assert_eq!(summary, RenderSummary { rows: 4, stopped: StopReason::Truncated });
        assert_eq!(pagers.output().lines().count(), 5);
    }

    #[test]
    fn test_partly_written_row_is_not_counted() {
        // width 40 gives [8, 8, 8, 8]: the header wraps to 2 lines, each row to 3
        let config = RenderConfig::default()
            .with_width(40)
            .with_fallback_lines(6);
        let (renderer, pagers) = renderer(config, Availability::Missing);
        let summary = renderer
            .render(&table(), EventStream::new(events(5)))
            .unwrap();

        // header and dev0 in full, then the first line of dev1
        assert_eq!(summary, RenderSummary { rows: 1, stopped: StopReason::Truncated });
        let output = pagers.output();
        assert_eq!(output.lines().count(), 6);
        assert!(output.lines().nth(5).unwrap().starts_with("dev1"));
    }

    #[test]
    fn test_pager_open_failure_propagates() {
        let (renderer, pagers) = renderer(table_config(), Availability::Broken);
        let err = renderer
            .render(&table(), EventStream::new(events(1)))
            .unwrap_err();
        assert!(matches!(err, RenderError::Pager(PagerError::Io(_))));
        assert!(pagers.output().is_empty());
    }

    #[test]
    fn test_user_quit_stops_early() {
        let (renderer, pagers) = renderer(table_config(), Availability::Present);
        // header + two rows, then the pager goes away
        pagers.shared.borrow_mut().quit_after = Some(3);
        let summary = renderer
            .render(&table(), EventStream::new(events(10)))
            .unwrap();

        assert_eq!(summary, RenderSummary { rows: 2, stopped: StopReason::PagerClosed });
        assert_eq!(pagers.shared.borrow().writes, 3);
        assert_eq!(pagers.shared.borrow().closes, 1);
    }

    #[test]
    fn test_broken_pipe_ends_run() {
        let (renderer, pagers) = renderer(table_config(), Availability::Present);
        pagers.shared.borrow_mut().broken_after = Some(2);
        let summary = renderer
            .render(&table(), EventStream::new(events(5)))
            .unwrap();
        assert_eq!(summary, RenderSummary { rows: 1, stopped: StopReason::PagerClosed });
    }

    #[test]
    fn test_source_error_propagates_and_closes_pager() {
        let (renderer, pagers) = renderer(table_config(), Availability::Present);
        let source = FailingSource {
            events: EventStream::new(events(2)),
        };
        let err = renderer.render(&table(), source).unwrap_err();

        assert!(matches!(err, RenderError::Source(SourceError::Fetch(_))));
        assert!(err.to_string().contains("503"));
        // rows written before the failure stay written
        assert_eq!(pagers.output().lines().count(), 3);
        assert_eq!(pagers.shared.borrow().closes, 1);
    }

    #[test]
    fn test_mapping_error_propagates() {
        let (renderer, pagers) = renderer(table_config(), Availability::Present);
        let mut batch = events(3);
        batch[1].actor = Actor::Unknown;
        let err = renderer.render(&table(), EventStream::new(batch)).unwrap_err();

        assert!(matches!(err, RenderError::Mapping(MappingError::UnknownActor { .. })));
        assert_eq!(pagers.output().lines().count(), 2);
        assert_eq!(pagers.shared.borrow().closes, 1);
    }
}
