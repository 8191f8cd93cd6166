//! Parsed-schema store.
//!
//! Holds every parsed source file by name in traversal order. The two shared
//! definition files are pulled out on construction; the store refuses to
//! exist without them.

use super::{Enum, Message, ParsedFile};
use crate::config::BusinessConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Parsed contents of a whole source tree
#[derive(Debug, Clone)]
pub struct SchemaStore {
    /// Non-shared files in traversal order
    files: Vec<ParsedFile>,
    /// File name -> index into `files`
    index: HashMap<String, usize>,
    /// Shared file with common messages
    common: ParsedFile,
    /// Shared file with enumerations
    enums: ParsedFile,
}

impl SchemaStore {
    /// Builds the store, separating out the shared files.
    ///
    /// Fails with [`Error::MissingSharedFile`] if either shared file is absent.
    /// A file whose name was already seen replaces the earlier one.
    pub fn new(parsed: Vec<ParsedFile>, business: &BusinessConfig) -> Result<Self> {
        let mut files: Vec<ParsedFile> = Vec::with_capacity(parsed.len());
        let mut index = HashMap::new();
        let mut common = None;
        let mut enums = None;

        for file in parsed {
            if business.is_ignored_file(&file.name) {
                debug!("Ignoring source file {}", file.name);
                continue;
            }
            if file.name == business.common_proto_file {
                common = Some(file);
                continue;
            }
            if file.name == business.enum_proto_file {
                enums = Some(file);
                continue;
            }

            match index.get(&file.name) {
                Some(&i) => {
                    warn!("Duplicate source file name {}, keeping the later one", file.name);
                    files[i] = file;
                }
                None => {
                    index.insert(file.name.clone(), files.len());
                    files.push(file);
                }
            }
        }

        let common =
            common.ok_or_else(|| Error::missing_shared_file(&business.common_proto_file))?;
        let enums = enums.ok_or_else(|| Error::missing_shared_file(&business.enum_proto_file))?;

        Ok(Self {
            files,
            index,
            common,
            enums,
        })
    }

    /// Non-shared files in traversal order
    pub fn files(&self) -> &[ParsedFile] {
        &self.files
    }

    /// Looks up a non-shared file by name
    pub fn file(&self, name: &str) -> Option<&ParsedFile> {
        self.index.get(name).map(|&i| &self.files[i])
    }

    /// The two shared files, common first
    pub fn shared_files(&self) -> [&ParsedFile; 2] {
        [&self.common, &self.enums]
    }

    /// First enumeration called `name` in either shared file
    pub fn shared_enum(&self, name: &str) -> Option<&Enum> {
        self.shared_files()
            .into_iter()
            .find_map(|file| file.enumeration(name))
    }

    /// First message called `name` in either shared file
    pub fn shared_message(&self, name: &str) -> Option<&Message> {
        self.shared_files()
            .into_iter()
            .find_map(|file| file.message(name))
    }
}
