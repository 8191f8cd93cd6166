//! Shared-definition resolution of field types.
//!
//! Looks a field's type name up, first match wins:
//!
//! 1. enumeration in a shared file or at the top level of the current file
//! 2. message in a shared file, or classified `Common` anywhere
//! 3. message or enumeration nested directly in the current message
//! 4. anything else is left alone
//!
//! Lookups strip a leading `.` and the business package qualifier, so
//! `entity.WORD_POS` and `WORD_POS` resolve the same way.

use crate::classify::Classification;
use crate::schema::{Enum, Message, ParsedFile, SchemaStore};

/// Outcome of resolving a field type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedType<'a> {
    /// Shared (or current-file) enumeration, kept by name and emitted alongside
    Enum(&'a Enum),
    /// Shared or `Common` message, stored as opaque bytes
    Message,
    /// Definition nested in the referencing message, stored as opaque bytes
    Nested,
    /// Store-native scalar or unknown name, emitted verbatim
    Unresolved,
}

/// Resolves field types against the frozen classification state
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    store: &'a SchemaStore,
    classification: &'a Classification,
    entity_package: &'a str,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver
    pub fn new(
        store: &'a SchemaStore,
        classification: &'a Classification,
        entity_package: &'a str,
    ) -> Self {
        Self {
            store,
            classification,
            entity_package,
        }
    }

    /// Strips a leading `.` and the business package qualifier
    pub fn local_name<'n>(&self, type_name: &'n str) -> &'n str {
        let name = type_name.trim_start_matches('.');
        if self.entity_package.is_empty() {
            return name;
        }
        name.strip_prefix(self.entity_package)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(name)
    }

    /// Resolves `type_name` as referenced from `in_message` of `in_file`
    pub fn resolve(
        &self,
        type_name: &str,
        in_message: &Message,
        in_file: &'a ParsedFile,
    ) -> ResolvedType<'a> {
        let name = self.local_name(type_name);

        if let Some(e) = self
            .store
            .shared_enum(name)
            .or_else(|| in_file.enumeration(name))
        {
            return ResolvedType::Enum(e);
        }

        if self.store.shared_message(name).is_some() || self.classification.is_common(name) {
            return ResolvedType::Message;
        }

        if in_message.has_nested(type_name) || in_message.has_nested(name) {
            return ResolvedType::Nested;
        }

        ResolvedType::Unresolved
    }
}
