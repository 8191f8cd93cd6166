//! Destination schema emission.
//!
//! This module turns the frozen [`Classification`] into destination
//! documents, one per destination file, and renders them as `.proto` text.
//!
//! ## Architecture
//!
//! 1. [`Emitter`] rewrites every classified message into a [`Table`] and
//!    groups tables per [`DestinationKind`], collecting per-file errors
//! 2. Each [`SchemaDocument`] is walked through the [`SchemaWriter`] trait;
//!    the default text writer produces the `.proto` source
//!
//! A failure inside one destination never stops the others: it is stored on
//! that [`Destination`] and the remaining tables are still emitted.

mod writer;

use crate::classify::{Category, Classification, ClassifiedMessage, Direction};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::resolve::Resolver;
use crate::rewrite::{FieldRewriter, SECONDARY_ID_FIELD};
use crate::schema::{Enum, Field, SchemaStore, UUID_FIELD};
use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;
use tracing::{debug, warn};

pub use writer::{SchemaWriter, StatsWriter};

/// Configuration for text rendering
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
    /// Namespace of the key options (default: `tcaplusservice`)
    pub option_namespace: String,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            option_namespace: "tcaplusservice".to_string(),
        }
    }
}

impl WriterConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer config matching the store binding
    pub fn from_config(config: &Config) -> Self {
        Self::default().option_namespace(config.store.option_namespace.clone())
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets the option namespace
    pub fn option_namespace(mut self, ns: impl Into<String>) -> Self {
        self.option_namespace = ns.into();
        self
    }
}

/// Key layout of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableKey {
    /// Configured primary key of a base table
    Base(String),
    /// `UUID,UID` primary key with a `UID` index
    Split,
    /// `UUID` primary key
    Pub,
    /// `UID` primary key of a blob container
    Blob,
}

impl TableKey {
    /// Primary key option value
    pub fn primary_key(&self) -> String {
        match self {
            TableKey::Base(pk) => pk.clone(),
            TableKey::Split => format!("{},{}", UUID_FIELD, SECONDARY_ID_FIELD),
            TableKey::Pub => UUID_FIELD.to_string(),
            TableKey::Blob => SECONDARY_ID_FIELD.to_string(),
        }
    }

    /// Secondary index option value, if the layout has one
    pub fn index(&self) -> Option<String> {
        match self {
            TableKey::Split => Some(format!("index_1({})", SECONDARY_ID_FIELD)),
            _ => None,
        }
    }
}

/// One table message of a destination file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Message name
    pub name: String,
    /// Key options
    pub key: TableKey,
    /// Columns in output order
    pub fields: Vec<Field>,
}

/// Leading declarations of every destination file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Syntax version
    pub syntax: String,
    /// Package name
    pub package: String,
    /// Import of the store's option definitions
    pub import: String,
}

impl FileHeader {
    /// Header declared by the store binding
    pub fn from_config(config: &Config) -> Self {
        Self {
            syntax: "proto3".to_string(),
            package: config.store.package_name.clone(),
            import: config.store.import_path.clone(),
        }
    }
}

/// Complete contents of one destination file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDocument {
    /// File header
    pub header: FileHeader,
    /// Tables in emission order
    pub tables: Vec<Table>,
    /// Enumerations, each once, in first-reference order
    pub enums: Vec<Enum>,
}

impl SchemaDocument {
    /// Creates an empty document
    pub fn new(header: FileHeader) -> Self {
        Self {
            header,
            tables: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Adds an enumeration unless one with the same name is already present
    pub fn include_enum(&mut self, e: &Enum) -> bool {
        if self.enums.iter().any(|known| known.name == e.name) {
            return false;
        }
        self.enums.push(e.clone());
        true
    }

    /// Walks the document through a writer in output order
    pub fn write_with(&self, writer: &mut impl SchemaWriter) -> std::fmt::Result {
        writer.write_header(&self.header)?;
        for table in &self.tables {
            writer.begin_table(table)?;
            for field in &table.fields {
                writer.write_field(field)?;
            }
            writer.end_table(table)?;
        }
        for e in &self.enums {
            writer.write_enum(e)?;
        }
        Ok(())
    }

    /// Renders the document as `.proto` source
    pub fn render(&self, config: &WriterConfig) -> String {
        let mut output = String::new();
        let mut writer = TextWriter::new(&mut output, config);
        // Writing into a String cannot fail
        let _ = self.write_with(&mut writer);
        output
    }
}

/// Default `.proto` text implementation of [`SchemaWriter`]
struct TextWriter<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a WriterConfig,
    indent_level: usize,
}

impl<'a, W: FmtWrite> TextWriter<'a, W> {
    fn new(writer: &'a mut W, config: &'a WriterConfig) -> Self {
        Self {
            writer,
            config,
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn writeln(&mut self, s: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "{}", s)
    }

    fn write_option(&mut self, name: &str, value: &str) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(
            self.writer,
            "option({}.{}) = \"{}\";",
            self.config.option_namespace,
            name,
            escape_string(value)
        )
    }
}

impl<W: FmtWrite> SchemaWriter for TextWriter<'_, W> {
    fn write_header(&mut self, header: &FileHeader) -> std::fmt::Result {
        writeln!(self.writer, "syntax = \"{}\";", header.syntax)?;
        writeln!(self.writer)?;

        if !header.package.is_empty() {
            writeln!(self.writer, "package {};", header.package)?;
            writeln!(self.writer)?;
        }

        if !header.import.is_empty() {
            writeln!(self.writer, "import \"{}\";", header.import)?;
            writeln!(self.writer)?;
        }

        Ok(())
    }

    fn begin_table(&mut self, table: &Table) -> std::fmt::Result {
        writeln!(self.writer, "message {} {{", table.name)?;
        self.indent();

        self.write_option("tcaplus_primary_key", &table.key.primary_key())?;
        if let Some(index) = table.key.index() {
            self.write_option("tcaplus_index", &index)?;
        }

        Ok(())
    }

    fn write_field(&mut self, field: &Field) -> std::fmt::Result {
        self.write_indent()?;
        if field.repeated {
            write!(self.writer, "repeated ")?;
        }
        writeln!(
            self.writer,
            "{} {} = {};",
            field.type_name, field.name, field.sequence_id
        )
    }

    fn end_table(&mut self, _table: &Table) -> std::fmt::Result {
        self.dedent();
        self.writeln("}")?;
        writeln!(self.writer)
    }

    fn write_enum(&mut self, enum_type: &Enum) -> std::fmt::Result {
        self.write_indent()?;
        writeln!(self.writer, "enum {} {{", enum_type.name)?;
        self.indent();

        for value in &enum_type.values {
            self.write_indent()?;
            writeln!(self.writer, "{} = {};", value.name, value.value)?;
        }

        self.dedent();
        self.writeln("}")?;
        writeln!(self.writer)
    }
}

/// Escape a string for proto syntax
fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Destination files, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DestinationKind {
    /// Base tables
    Base,
    /// Pub tables
    Pub,
    /// Split tables, both directions
    Split,
    /// Inbound blob container
    BlobIn,
    /// Outbound blob container
    BlobOut,
}

impl DestinationKind {
    /// All destinations in report order
    pub const ALL: [DestinationKind; 5] = [
        DestinationKind::Base,
        DestinationKind::Pub,
        DestinationKind::Split,
        DestinationKind::BlobIn,
        DestinationKind::BlobOut,
    ];

    /// Configured file name of the destination
    pub fn file_name<'c>(&self, config: &'c Config) -> &'c str {
        let business = &config.business;
        match self {
            DestinationKind::Base => business.table_proto_files.base.as_str(),
            DestinationKind::Pub => business.table_proto_files.public.as_str(),
            DestinationKind::Split => business.table_proto_files.split.as_str(),
            DestinationKind::BlobIn => business.blob_proto_files.inbound.as_str(),
            DestinationKind::BlobOut => business.blob_proto_files.outbound.as_str(),
        }
    }
}

/// Outcome of emitting one destination file
#[derive(Debug)]
pub struct Destination {
    /// Which destination this is
    pub kind: DestinationKind,
    /// Configured file name
    pub file_name: String,
    /// Document to write; `None` when there is nothing to write at all
    pub document: Option<SchemaDocument>,
    /// Errors isolated to this destination
    pub errors: Vec<Error>,
}

impl Destination {
    /// Whether the destination was produced without errors
    pub fn is_success(&self) -> bool {
        self.errors.is_empty() && self.document.is_some()
    }

    /// Renders the document, if there is one
    pub fn render(&self, config: &WriterConfig) -> Option<String> {
        self.document.as_ref().map(|doc| doc.render(config))
    }
}

/// Builds destination documents from a frozen classification
#[derive(Debug, Clone, Copy)]
pub struct Emitter<'a> {
    store: &'a SchemaStore,
    classification: &'a Classification,
    config: &'a Config,
}

impl<'a> Emitter<'a> {
    /// Creates an emitter
    pub fn new(
        store: &'a SchemaStore,
        classification: &'a Classification,
        config: &'a Config,
    ) -> Self {
        Self {
            store,
            classification,
            config,
        }
    }

    /// Emits every destination exactly once, in report order
    pub fn emit_all(&self) -> Vec<Destination> {
        DestinationKind::ALL
            .iter()
            .map(|&kind| self.emit(kind))
            .collect()
    }

    /// Emits one destination
    pub fn emit(&self, kind: DestinationKind) -> Destination {
        let destination = match kind {
            DestinationKind::Base => self.emit_tables(kind, self.classification.base()),
            DestinationKind::Pub => self.emit_tables(kind, self.classification.public()),
            DestinationKind::Split => self.emit_tables(kind, self.classification.split()),
            DestinationKind::BlobIn => self.emit_blob(kind, Direction::In),
            DestinationKind::BlobOut => self.emit_blob(kind, Direction::Out),
        };

        for err in &destination.errors {
            warn!("{}: {}", destination.file_name, err);
        }
        destination
    }

    fn rewriter(&self) -> FieldRewriter<'a> {
        let business = &self.config.business;
        let resolver = Resolver::new(self.store, self.classification, &business.entity_package);
        FieldRewriter::new(resolver, &business.account_table, business.title_case_fields)
    }

    fn table_key(&self, classified: &ClassifiedMessage) -> Result<TableKey> {
        let name = &classified.message.name;
        match classified.category {
            Category::Base => self
                .config
                .business
                .base_table_primary_keys
                .get(name)
                .map(|pk| TableKey::Base(pk.clone()))
                .ok_or_else(|| Error::missing_primary_key(name)),
            Category::SplitIn | Category::SplitOut => Ok(TableKey::Split),
            Category::PubIn => Ok(TableKey::Pub),
            Category::BlobIn | Category::BlobOut | Category::Common => Err(Error::internal(
                format!("{} message {} is not a table", classified.category, name),
            )),
        }
    }

    fn emit_tables(&self, kind: DestinationKind, messages: &[ClassifiedMessage]) -> Destination {
        let rewriter = self.rewriter();
        let mut document = SchemaDocument::new(FileHeader::from_config(self.config));
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();

        for classified in messages {
            let message = &classified.message;
            if !seen.insert(message.name.as_str()) {
                warn!(
                    "{} is defined more than once, emitting every definition",
                    message.name
                );
            }

            let key = match self.table_key(classified) {
                Ok(key) => key,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let Some(in_file) = self.store.file(&classified.file) else {
                errors.push(Error::internal(format!(
                    "source file {} of {} is not in the schema store",
                    classified.file, message.name
                )));
                continue;
            };

            let rewritten = rewriter.rewrite(message, classified.category, in_file);
            for e in &rewritten.enums {
                if document.include_enum(e) {
                    debug!("{}: including enum {}", kind.file_name(self.config), e.name);
                }
            }
            document.tables.push(Table {
                name: rewritten.name,
                key,
                fields: rewritten.fields,
            });
        }

        Destination {
            kind,
            file_name: kind.file_name(self.config).to_string(),
            document: Some(document),
            errors,
        }
    }

    fn emit_blob(&self, kind: DestinationKind, direction: Direction) -> Destination {
        let file_name = kind.file_name(self.config).to_string();
        match self
            .classification
            .blobs()
            .container(direction, &self.config.business)
        {
            Ok(table) => {
                let mut document = SchemaDocument::new(FileHeader::from_config(self.config));
                document.tables.push(table);
                Destination {
                    kind,
                    file_name,
                    document: Some(document),
                    errors: Vec::new(),
                }
            }
            Err(e) => Destination {
                kind,
                file_name,
                document: None,
                errors: vec![e],
            },
        }
    }
}
