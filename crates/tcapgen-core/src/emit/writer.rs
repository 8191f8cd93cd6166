//! Extensible schema writing traits.
//!
//! This module provides the [`SchemaWriter`] trait for customizing how a
//! destination document is written out.

use super::{FileHeader, Table};
use crate::schema::{Enum, Field};
use std::fmt::Result;

/// Trait for writing destination document elements.
///
/// [`SchemaDocument::write_with`](super::SchemaDocument::write_with) walks a
/// document and calls these hooks in output order. The default
/// implementation of every hook does nothing.
///
/// # Example
///
/// ```
/// use tcapgen_core::emit::{SchemaWriter, Table};
///
/// #[derive(Default)]
/// struct TableNames(Vec<String>);
///
/// impl SchemaWriter for TableNames {
///     fn begin_table(&mut self, table: &Table) -> std::fmt::Result {
///         self.0.push(table.name.clone());
///         Ok(())
///     }
/// }
/// ```
pub trait SchemaWriter {
    /// Write the file header (syntax, package, import)
    fn write_header(&mut self, header: &FileHeader) -> Result {
        let _ = header;
        Ok(())
    }

    /// Open a table message, including its key options
    fn begin_table(&mut self, table: &Table) -> Result {
        let _ = table;
        Ok(())
    }

    /// Write a column of the currently open table
    fn write_field(&mut self, field: &Field) -> Result {
        let _ = field;
        Ok(())
    }

    /// Close the currently open table
    fn end_table(&mut self, table: &Table) -> Result {
        let _ = table;
        Ok(())
    }

    /// Write a top-level enumeration
    fn write_enum(&mut self, enum_type: &Enum) -> Result {
        let _ = enum_type;
        Ok(())
    }
}

/// A writer that collects statistics about destination documents
#[derive(Debug, Default)]
pub struct StatsWriter {
    /// Number of documents
    pub document_count: usize,
    /// Number of tables
    pub table_count: usize,
    /// Number of columns
    pub field_count: usize,
    /// Number of enumerations
    pub enum_count: usize,
}

impl SchemaWriter for StatsWriter {
    fn write_header(&mut self, _header: &FileHeader) -> Result {
        self.document_count += 1;
        Ok(())
    }

    fn begin_table(&mut self, _table: &Table) -> Result {
        self.table_count += 1;
        Ok(())
    }

    fn write_field(&mut self, _field: &Field) -> Result {
        self.field_count += 1;
        Ok(())
    }

    fn write_enum(&mut self, _enum_type: &Enum) -> Result {
        self.enum_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::emit::{FileHeader, SchemaDocument, TableKey};
    use crate::schema::EnumValue;

    fn table() -> Table {
        Table {
            name: "BaseGUID".to_string(),
            key: TableKey::Base("guid".to_string()),
            fields: vec![],
        }
    }

    #[test]
    fn test_stats_over_document() {
        let mut document = SchemaDocument::new(FileHeader::from_config(&Config::default()));
        let mut guid = table();
        guid.fields.push(Field::new(1, "guid", "uint64"));
        document.tables.push(guid);
        document.include_enum(&Enum {
            name: "Quality".to_string(),
            values: vec![EnumValue { name: "Q_NONE".to_string(), value: 0 }],
        });

        let mut writer = StatsWriter::default();
        document.write_with(&mut writer).unwrap();

        assert_eq!(writer.document_count, 1);
        assert_eq!(writer.table_count, 1);
        assert_eq!(writer.field_count, 1);
        assert_eq!(writer.enum_count, 1);
    }

    #[test]
    fn test_stats_writer() {
        let mut writer = StatsWriter::default();
        writer.begin_table(&table()).unwrap();
        writer.begin_table(&table()).unwrap();
        writer.write_field(&Field::new(1, "guid", "uint64")).unwrap();

        assert_eq!(writer.table_count, 2);
        assert_eq!(writer.field_count, 1);
        assert_eq!(writer.enum_count, 0);
    }
}
