//! The `audit` command.

use auditview_core::{DirTree, TimeFormatter};
use auditview_log::{JsonLinesFetcher, PagedSource};
use auditview_render::{AuditRenderer, AuditTable, OutputFormat, RenderConfig};
use clap::Args;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Arguments of the `audit` command
#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Exported audit log, one JSON event per line
    #[arg(short, long)]
    pub events: PathBuf,

    /// Directory tree snapshot; adds an EVENT SUBJECT column
    #[arg(short, long)]
    pub tree: Option<PathBuf>,

    /// Output one JSON object per event
    #[arg(long)]
    pub json: bool,

    /// Show RFC3339 timestamps instead of relative times
    #[arg(long)]
    pub timestamps: bool,

    /// Number of events fetched per page
    #[arg(long, default_value_t = 20, allow_negative_numbers = true)]
    pub per_page: i64,

    /// Table width (defaults to the terminal width)
    #[arg(long)]
    pub width: Option<usize>,
}

/// Run the command
pub fn run(args: &AuditArgs) -> Result<()> {
    let per_page = validate_per_page(args.per_page)?;
    let table = build_table(args)?;
    let config = render_config(args);

    let fetcher = JsonLinesFetcher::open(&args.events)
        .wrap_err_with(|| format!("failed to open audit log {}", args.events.display()))?;
    let source = PagedSource::new(fetcher, per_page);

    let summary = AuditRenderer::new(config).render(&table, source)?;
    debug!(rows = summary.rows, stopped = ?summary.stopped, "audit log rendered");
    Ok(())
}

fn validate_per_page(per_page: i64) -> Result<NonZeroUsize> {
    usize::try_from(per_page)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| eyre!("per-page should be positive, got {}", per_page))
}

fn build_table(args: &AuditArgs) -> Result<AuditTable> {
    let time_formatter = TimeFormatter::new(args.timestamps);
    Ok(match &args.tree {
        Some(path) => AuditTable::for_repo(load_tree(path)?, time_formatter),
        None => AuditTable::for_secret(time_formatter),
    })
}

fn load_tree(path: &Path) -> Result<DirTree> {
    let json = fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read directory tree {}", path.display()))?;
    let tree = DirTree::from_json(&json)
        .wrap_err_with(|| format!("invalid directory tree {}", path.display()))?;
    debug!(dirs = tree.dir_count(), secrets = tree.secret_count(), "loaded directory tree");
    Ok(tree)
}

fn render_config(args: &AuditArgs) -> RenderConfig {
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };
    let config = RenderConfig::default().with_format(format);
    match args.width {
        Some(width) => config.with_width(width),
        None => config,
    }
}
