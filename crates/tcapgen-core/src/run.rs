//! Run coordination.
//!
//! A run has two phases that never interleave:
//!
//! 1. parse every source file and classify every message, producing a frozen
//!    [`Classification`]
//! 2. emit every destination file from that frozen state
//!
//! Phase 1 aborts on structural problems (a shared file missing or
//! unparsable). Phase 2 never aborts: each destination carries its own
//! errors and every destination is attempted exactly once.

use crate::classify::Classification;
use crate::config::Config;
use crate::emit::{Destination, Emitter};
use crate::error::{Error, Result};
use crate::schema::{ParsedFile, SchemaStore};
use std::fmt;
use tracing::{info, warn};

/// A source file handed over by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// File name without directories
    pub name: String,
    /// Raw `.proto` text
    pub text: String,
}

impl SourceFile {
    /// Creates a source file
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Result of a complete run
#[derive(Debug)]
pub struct RunOutput {
    /// Every destination, in report order
    pub destinations: Vec<Destination>,
    /// Non-shared sources that failed to parse and were left out
    pub skipped_sources: Vec<Error>,
}

impl RunOutput {
    /// Report of the destination outcomes
    pub fn report(&self) -> RunReport {
        RunReport::from_destinations(&self.destinations)
    }
}

/// Parses sources into the schema store.
///
/// A shared file that fails to parse is fatal; any other file that fails to
/// parse is skipped and returned alongside the store.
pub fn load_store(
    sources: impl IntoIterator<Item = SourceFile>,
    config: &Config,
) -> Result<(SchemaStore, Vec<Error>)> {
    let business = &config.business;
    let mut parsed = Vec::new();
    let mut skipped = Vec::new();

    for source in sources {
        if business.is_ignored_file(&source.name) {
            continue;
        }
        match ParsedFile::parse(&source.name, &source.text, business) {
            Ok(file) => parsed.push(file),
            Err(e) if business.is_shared_file(&source.name) => return Err(e),
            Err(e) => {
                warn!("Skipping {}: {}", source.name, e);
                skipped.push(e);
            }
        }
    }

    let store = SchemaStore::new(parsed, business)?;
    info!("Loaded {} schema files", store.files().len());
    Ok((store, skipped))
}

/// Phase 1: classify every message of the store
pub fn classify_all(store: &SchemaStore, config: &Config) -> Classification {
    Classification::classify_all(store, &config.business)
}

/// Phase 2: emit every destination from the frozen classification
pub fn emit_all(
    classification: &Classification,
    store: &SchemaStore,
    config: &Config,
) -> Vec<Destination> {
    Emitter::new(store, classification, config).emit_all()
}

/// Runs both phases over a set of sources
pub fn run(sources: impl IntoIterator<Item = SourceFile>, config: &Config) -> Result<RunOutput> {
    let (store, skipped_sources) = load_store(sources, config)?;
    let classification = classify_all(&store, config);
    let destinations = emit_all(&classification, &store, config);

    Ok(RunOutput {
        destinations,
        skipped_sources,
    })
}

/// Outcome of one destination file in the run report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEntry {
    /// Destination file name
    pub file_name: String,
    /// Failure reasons; empty on success
    pub failures: Vec<String>,
}

impl ReportEntry {
    /// Whether the file converted without failures
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "{} convert [SUCCESS]", self.file_name)
        } else {
            write!(
                f,
                "{} convert [FAIL][{}]",
                self.file_name,
                self.failures.join(";")
            )
        }
    }
}

/// Per-destination success/failure report, in destination order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    entries: Vec<ReportEntry>,
}

impl RunReport {
    /// Builds the report from emitted destinations
    pub fn from_destinations(destinations: &[Destination]) -> Self {
        let mut report = Self::default();
        for destination in destinations {
            let entry = report.entry_mut(&destination.file_name);
            entry
                .failures
                .extend(destination.errors.iter().map(|e| e.to_string()));
        }
        report
    }

    fn entry_mut(&mut self, file_name: &str) -> &mut ReportEntry {
        let pos = match self.entries.iter().position(|e| e.file_name == file_name) {
            Some(pos) => pos,
            None => {
                self.entries.push(ReportEntry {
                    file_name: file_name.to_string(),
                    failures: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        &mut self.entries[pos]
    }

    /// Records a failure that happened after emission (e.g. while writing)
    pub fn record_failure(&mut self, file_name: &str, reason: impl fmt::Display) {
        self.entry_mut(file_name).failures.push(reason.to_string());
    }

    /// Entries in destination order
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Whether every destination succeeded
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(ReportEntry::is_success)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}
