//! Run configuration (`tcapgen.toml`).
//!
//! Two sections: `[business]` carries the classification rules and the
//! destination file names, `[tcaplusdb]` carries the store binding. Every key
//! falls back to a built-in default when absent.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_BASE_TABLES: [(&str, &str); 5] = [
    ("BaseVersion", "version"),
    ("BaseGUID", "guid"),
    ("BaseSelfIncrementIDData", "id"),
    ("BaseAccounts", "token"),
    ("BaseRoles", "role_id"),
];

/// Destination file names for the table categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableFiles {
    /// File receiving `Base` tables
    #[serde(rename = "BASE")]
    pub base: String,
    /// File receiving `SplitIn` and `SplitOut` tables
    #[serde(rename = "SPLIT")]
    pub split: String,
    /// File receiving `PubIn` tables
    #[serde(rename = "PUB")]
    pub public: String,
}

impl Default for TableFiles {
    fn default() -> Self {
        Self {
            base: "base.proto".to_string(),
            split: "table_split_message.proto".to_string(),
            public: "table_pub_message.proto".to_string(),
        }
    }
}

/// Destination file names for the two blob containers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobFiles {
    /// Inbound container file
    #[serde(rename = "IN")]
    pub inbound: String,
    /// Outbound container file
    #[serde(rename = "OUT")]
    pub outbound: String,
}

impl Default for BlobFiles {
    fn default() -> Self {
        Self {
            inbound: "blob_user_data_in.proto".to_string(),
            outbound: "blob_user_data_out.proto".to_string(),
        }
    }
}

/// Business rules: which messages are tables and where they go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusinessConfig {
    /// Message names always classified as base tables
    pub base_tables: Vec<String>,

    /// Base table name to primary key list (comma separated for composite keys)
    pub base_table_primary_keys: BTreeMap<String, String>,

    /// Base table that carries an extra `AddTime` column
    pub account_table: String,

    /// Destination files for base, split and pub tables
    pub table_proto_files: TableFiles,

    /// Destination files for the blob containers
    pub blob_proto_files: BlobFiles,

    /// Name of the inbound blob container message
    pub blob_user_in_msg_name: String,

    /// Name of the outbound blob container message
    pub blob_user_out_msg_name: String,

    /// Import paths dropped while parsing
    pub import_path_ignores: Vec<String>,

    /// Source file names skipped entirely
    pub proto_file_ignores: Vec<String>,

    /// Shared file supplying common messages
    pub common_proto_file: String,

    /// Shared file supplying enumerations
    pub enum_proto_file: String,

    /// Package qualifier stripped from type references (`entity.Foo` -> `Foo`)
    pub entity_package: String,

    /// Upper-case the first letter of every emitted field name
    pub title_case_fields: bool,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            base_tables: DEFAULT_BASE_TABLES
                .iter()
                .map(|(name, _)| name.to_string())
                .collect(),
            base_table_primary_keys: DEFAULT_BASE_TABLES
                .iter()
                .map(|(name, pk)| (name.to_string(), pk.to_string()))
                .collect(),
            account_table: "BaseAccounts".to_string(),
            table_proto_files: TableFiles::default(),
            blob_proto_files: BlobFiles::default(),
            blob_user_in_msg_name: "blob_user_data_in".to_string(),
            blob_user_out_msg_name: "blob_user_data_out".to_string(),
            import_path_ignores: vec![
                "proto/entity/common.proto".to_string(),
                "proto/entity/enumm_entity.proto".to_string(),
            ],
            proto_file_ignores: Vec::new(),
            common_proto_file: "common.proto".to_string(),
            enum_proto_file: "enumm_entity.proto".to_string(),
            entity_package: "entity".to_string(),
            title_case_fields: false,
        }
    }
}

impl BusinessConfig {
    /// Whether `name` is one of the fixed base tables
    pub fn is_base_table(&self, name: &str) -> bool {
        self.base_tables.iter().any(|t| t == name)
    }

    /// Whether a source file is one of the two shared definition files
    pub fn is_shared_file(&self, file_name: &str) -> bool {
        file_name == self.common_proto_file || file_name == self.enum_proto_file
    }

    /// Whether a source file is skipped entirely.
    ///
    /// Shared files are never skipped: they are loaded as lookup tables even
    /// when listed in `proto_file_ignores`.
    pub fn is_ignored_file(&self, file_name: &str) -> bool {
        !self.is_shared_file(file_name) && self.proto_file_ignores.iter().any(|f| f == file_name)
    }

    /// Whether an import path is dropped while parsing
    pub fn is_ignored_import(&self, path: &str) -> bool {
        self.import_path_ignores.iter().any(|p| p == path)
    }
}

/// Store binding: target package, option import and option namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Package declared by every destination file
    pub package_name: String,

    /// Import providing the store's option definitions
    pub import_path: String,

    /// Namespace of the primary-key and index options
    pub option_namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            package_name: "tcaplus_entity".to_string(),
            import_path: "tcaplusservice.optionv1.proto".to_string(),
            option_namespace: "tcaplusservice".to_string(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Business rules
    #[serde(default)]
    pub business: BusinessConfig,

    /// Store binding
    #[serde(default, rename = "tcaplusdb")]
    pub store: StoreConfig,
}

impl Config {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| Error::config_read(path, e))?;
        Self::from_toml(&contents)
    }

    /// Load config from a TOML string
    pub fn from_toml(toml: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        let business = &self.business;

        for (table, pk) in &business.base_table_primary_keys {
            if table.trim().is_empty() || pk.trim().is_empty() {
                return Err(Error::invalid_config(
                    "business.base_table_primary_keys",
                    format!("empty table or key in entry '{}'", table),
                ));
            }
        }

        let file_names = [
            ("business.table_proto_files.BASE", &business.table_proto_files.base),
            ("business.table_proto_files.SPLIT", &business.table_proto_files.split),
            ("business.table_proto_files.PUB", &business.table_proto_files.public),
            ("business.blob_proto_files.IN", &business.blob_proto_files.inbound),
            ("business.blob_proto_files.OUT", &business.blob_proto_files.outbound),
            ("business.common_proto_file", &business.common_proto_file),
            ("business.enum_proto_file", &business.enum_proto_file),
        ];
        for (key, value) in file_names {
            if value.trim().is_empty() {
                return Err(Error::invalid_config(key, "file name must not be empty"));
            }
        }

        if self.store.package_name.trim().is_empty() {
            return Err(Error::invalid_config(
                "tcaplusdb.package_name",
                "package name must not be empty",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.business.base_tables.len(), 5);
        assert_eq!(
            config.business.base_table_primary_keys.get("BaseAccounts"),
            Some(&"token".to_string())
        );
        assert_eq!(config.business.table_proto_files.split, "table_split_message.proto");
        assert_eq!(config.store.package_name, "tcaplus_entity");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [business]
            base_tables = ["BaseGUID"]

            [business.base_table_primary_keys]
            BaseGUID = "guid,uid"

            [business.blob_proto_files]
            IN = "in.proto"

            [tcaplusdb]
            package_name = "my_tables"
            "#,
        )
        .unwrap();

        assert_eq!(config.business.base_tables, vec!["BaseGUID".to_string()]);
        assert_eq!(
            config.business.base_table_primary_keys.get("BaseGUID"),
            Some(&"guid,uid".to_string())
        );
        assert_eq!(config.business.blob_proto_files.inbound, "in.proto");
        assert_eq!(config.business.blob_proto_files.outbound, "blob_user_data_out.proto");
        assert_eq!(config.business.blob_user_in_msg_name, "blob_user_data_in");
        assert_eq!(config.store.package_name, "my_tables");
        assert_eq!(config.store.import_path, "tcaplusservice.optionv1.proto");
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn rejects_empty_file_name() {
        let err = Config::from_toml("[business.table_proto_files]\nBASE = \"\"\n").unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Config::from_toml("[business\nbase_tables = 3").unwrap_err();
        assert!(matches!(err, Error::ConfigParse(_)));
    }

    #[test]
    fn sample_config_file() {
        let config = Config::from_toml(include_str!("../../../config/tcapgen.toml")).unwrap();
        assert_eq!(
            config.business.base_table_primary_keys.get("BaseGUID"),
            Some(&"guid,uid".to_string())
        );
        assert_eq!(config.business.table_proto_files, TableFiles::default());
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tcapgen.toml");
        std::fs::write(&path, "[tcaplusdb]\noption_namespace = \"tcaplus\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.store.option_namespace, "tcaplus");
        assert_eq!(config.business, BusinessConfig::default());
    }

    #[test]
    fn from_file_missing() {
        let err = Config::from_file(Path::new("/nonexistent/tcapgen.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn shared_and_ignored_files() {
        let mut business = BusinessConfig::default();
        business.proto_file_ignores = vec!["legacy.proto".to_string(), "common.proto".to_string()];

        assert!(business.is_shared_file("common.proto"));
        assert!(business.is_shared_file("enumm_entity.proto"));
        assert!(!business.is_shared_file("role.proto"));
        assert!(business.is_ignored_file("legacy.proto"));
        assert!(!business.is_ignored_file("common.proto"));
        assert!(business.is_ignored_import("proto/entity/common.proto"));
    }
}
