//! tcapgen - Convert business Protocol Buffer schemas into TcaplusDB tables
//!
//! This tool reads a directory of `.proto` files, classifies every message
//! into a storage category and writes the rewritten table schemas, one file
//! per category plus two blob container files.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tcapgen_core::{run, Config, Error, RunReport, SourceFile, StatsWriter, WriterConfig};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Convert business Protocol Buffer schemas into TcaplusDB table definitions
#[derive(Parser, Debug)]
#[command(name = "tcapgen")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory of source .proto files
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for generated .proto files
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "TCAPGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dry run - don't write files, just show what would be generated
    #[arg(long)]
    dry_run: bool,

    /// Overwrite existing files whose content differs
    #[arg(long)]
    force: bool,

    /// Print table, column and enum counts after the run
    #[arg(long)]
    stats: bool,
}

/// Result of writing one destination file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOutcome {
    Written,
    Unchanged,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let report = convert(&cli, &config)?;

    print!("{}", report);

    if !report.is_success() {
        let failed = report.entries().iter().filter(|e| !e.is_success()).count();
        bail!("{} destination file(s) failed to convert", failed);
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            Config::from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))
        }
        None => {
            debug!("No config file given, using defaults");
            Ok(Config::default())
        }
    }
}

/// Run the conversion and write every destination, returning the report
fn convert(cli: &Cli, config: &Config) -> Result<RunReport> {
    let sources = collect_sources(&cli.input, config)?;
    info!("Found {} source files in {}", sources.len(), cli.input.display());

    let output = run(sources, config).context("Conversion aborted")?;
    let mut report = output.report();
    let writer_config = WriterConfig::from_config(config);

    if !cli.dry_run {
        fs::create_dir_all(&cli.output).map_err(|e| Error::directory_create(&cli.output, e))?;
    }

    let mut stats = StatsWriter::default();

    for destination in &output.destinations {
        let Some(document) = &destination.document else {
            continue;
        };
        let content = document.render(&writer_config);
        let output_path = cli.output.join(&destination.file_name);

        if cli.stats {
            document
                .write_with(&mut stats)
                .context("Failed to collect statistics")?;
        }

        if cli.dry_run {
            println!("Would write: {}", output_path.display());
            if cli.verbose > 0 {
                println!("---");
                println!("{}", content);
                println!("---");
            }
            continue;
        }

        match write_schema_file(&output_path, &content, cli.force) {
            Ok(WriteOutcome::Written) => info!("Wrote {}", output_path.display()),
            Ok(WriteOutcome::Unchanged) => info!("Unchanged {}", output_path.display()),
            Err(e) => report.record_failure(&destination.file_name, e),
        }
    }

    if cli.stats {
        println!(
            "Stats: {} files, {} tables, {} columns, {} enums",
            stats.document_count, stats.table_count, stats.field_count, stats.enum_count
        );
    }

    Ok(report)
}

/// Collect `.proto` sources below `root`, sorted by path
fn collect_sources(root: &Path, config: &Config) -> Result<Vec<SourceFile>> {
    if !root.exists() {
        bail!("Input directory does not exist: {}", root.display());
    }
    if !root.is_dir() {
        bail!("Input path is not a directory: {}", root.display());
    }

    let mut sources = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_schema_file(path) {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if config.business.is_ignored_file(name) {
            debug!("Ignoring {}", path.display());
            continue;
        }

        trace!("Reading {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| Error::file_read(path, e))?;
        sources.push(SourceFile::new(name, text));
    }

    Ok(sources)
}

/// Visible `.proto` files only
fn is_schema_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);

    !hidden && path.extension().and_then(|e| e.to_str()) == Some("proto")
}

/// Compute a blake3 digest of file content
fn content_hash(content: &[u8]) -> blake3::Hash {
    blake3::hash(content)
}

/// Write a schema file, skipping the write when the content is unchanged
fn write_schema_file(output_path: &Path, content: &str, force: bool) -> Result<WriteOutcome> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::directory_create(parent, e))?;
    }

    if output_path.exists() {
        let existing = fs::read(output_path).map_err(|e| Error::file_read(output_path, e))?;
        if content_hash(&existing) == content_hash(content.as_bytes()) {
            return Ok(WriteOutcome::Unchanged);
        }
        if !force {
            return Err(Error::destination_exists(output_path).into());
        }
    }

    let mut file = fs::File::create(output_path).map_err(|e| Error::file_write(output_path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| Error::file_write(output_path, e))?;

    Ok(WriteOutcome::Written)
}
