//! Error types for the tcapgen-core library.
//!
//! This module provides error handling using the `thiserror` crate, with
//! variants split along the run's failure policy: fatal errors abort the run,
//! everything else is recorded against a single destination file.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tcapgen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all tcapgen operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Failed to read a schema source file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a destination file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to read the configuration file
    #[error("failed to read config '{path}': {source}")]
    ConfigRead {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid TOML for the expected layout
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Configuration parsed but holds an unusable value
    #[error("invalid config key '{key}': {details}")]
    InvalidConfig {
        /// Offending key
        key: String,
        /// What is wrong with it
        details: String,
    },

    /// A schema source file could not be parsed
    #[error("failed to parse schema '{file}': {details}")]
    SchemaParse {
        /// Source file name
        file: String,
        /// Parser diagnostic
        details: String,
    },

    /// One of the shared definition files is absent from the source set
    #[error("shared schema file '{name}' is missing from the source set")]
    MissingSharedFile {
        /// Expected file name
        name: String,
    },

    /// A base table has no configured primary key
    #[error("write {message} message option error, message name not in base table primary keys")]
    MissingPrimaryKey {
        /// Message name
        message: String,
    },

    /// No message was classified into a blob direction
    #[error("no {direction} blob messages")]
    EmptyBlobDirection {
        /// Blob direction (`IN` or `OUT`)
        direction: String,
    },

    /// Destination exists with different content and overwriting was not requested
    #[error("file already exists: '{path}' (use --force to overwrite)")]
    DestinationExists {
        /// Destination path
        path: PathBuf,
    },

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new config read error
    pub fn config_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new invalid config error
    pub fn invalid_config(key: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            details: details.into(),
        }
    }

    /// Creates a new schema parse error
    pub fn schema_parse(file: impl Into<String>, details: impl Into<String>) -> Self {
        Self::SchemaParse {
            file: file.into(),
            details: details.into(),
        }
    }

    /// Creates a new missing shared file error
    pub fn missing_shared_file(name: impl Into<String>) -> Self {
        Self::MissingSharedFile { name: name.into() }
    }

    /// Creates a new missing primary key error
    pub fn missing_primary_key(message: impl Into<String>) -> Self {
        Self::MissingPrimaryKey {
            message: message.into(),
        }
    }

    /// Creates a new empty blob direction error
    pub fn empty_blob_direction(direction: impl Into<String>) -> Self {
        Self::EmptyBlobDirection {
            direction: direction.into(),
        }
    }

    /// Creates a new destination exists error
    pub fn destination_exists(path: impl Into<PathBuf>) -> Self {
        Self::DestinationExists { path: path.into() }
    }

    /// Creates a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this error must abort the whole run
    ///
    /// Everything else is isolated to the destination file it was raised for.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MissingSharedFile { .. }
                | Self::ConfigRead { .. }
                | Self::ConfigParse(_)
                | Self::InvalidConfig { .. }
                | Self::Internal(_)
        )
    }
}
