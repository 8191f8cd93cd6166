//! Parsed schema model.
//!
//! Source `.proto` text is parsed by `protox-parse` into a
//! `FileDescriptorProto` without type resolution, then flattened into the
//! small model the classifier works on: messages with ordered fields, map
//! fields split out, nested definitions kept one level deep per message.
//!
//! Type names are kept exactly as written in the source (minus a leading `.`),
//! so references to definitions the parser never saw survive untouched.

mod store;

use crate::config::BusinessConfig;
use crate::error::{Error, Result};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use tracing::trace;

pub use store::SchemaStore;

/// Field type that marks a message as a stored entity
pub const ENTITY_TYPE: &str = "EntityType";

/// Field name carrying the entity identifier
pub const UUID_FIELD: &str = "UUID";

/// A single field of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Sequence number as declared
    pub sequence_id: i32,
    /// Field name
    pub name: String,
    /// Scalar keyword or type name as written
    pub type_name: String,
    /// `repeated` modifier
    pub repeated: bool,
}

impl Field {
    /// Creates a singular field
    pub fn new(sequence_id: i32, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            sequence_id,
            name: name.into(),
            type_name: type_name.into(),
            repeated: false,
        }
    }

    /// Marks the field as repeated
    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }
}

/// A `map<K, V>` field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapField {
    /// Key type keyword
    pub key_type: String,
    /// Value type, carrying the map's name and sequence number
    pub value_field: Field,
}

/// A single enumeration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Value name
    pub name: String,
    /// Numeric value
    pub value: i32,
}

/// An enumeration definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    /// Enumeration name
    pub name: String,
    /// Values in declaration order
    pub values: Vec<EnumValue>,
}

/// A message definition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Message name
    pub name: String,
    /// Ordinary fields in declaration order, oneof members included
    pub fields: Vec<Field>,
    /// Map fields in declaration order
    pub maps: Vec<MapField>,
    /// Nested messages (synthetic map entries excluded)
    pub nested_messages: Vec<Message>,
    /// Nested enumerations
    pub nested_enums: Vec<Enum>,
}

impl Message {
    /// Creates an empty message
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Appends a field
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Appends a map field
    pub fn with_map(mut self, map: MapField) -> Self {
        self.maps.push(map);
        self
    }

    /// Appends a nested message
    pub fn with_nested_message(mut self, message: Message) -> Self {
        self.nested_messages.push(message);
        self
    }

    /// Appends a nested enumeration
    pub fn with_nested_enum(mut self, e: Enum) -> Self {
        self.nested_enums.push(e);
        self
    }

    /// Whether a message or enumeration called `name` is nested directly in this message
    pub fn has_nested(&self, name: &str) -> bool {
        self.nested_messages.iter().any(|m| m.name == name)
            || self.nested_enums.iter().any(|e| e.name == name)
    }
}

/// Parsed contents of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    /// Source file name (no directory)
    pub name: String,
    /// Declared syntax
    pub syntax: String,
    /// Declared package
    pub package: String,
    /// Imports, ignored paths removed
    pub imports: Vec<String>,
    /// Top-level messages in declaration order
    pub messages: Vec<Message>,
    /// Top-level enumerations in declaration order
    pub enums: Vec<Enum>,
}

impl ParsedFile {
    /// Parses `.proto` source text
    pub fn parse(name: &str, source: &str, business: &BusinessConfig) -> Result<Self> {
        let proto = protox_parse::parse(name, source)
            .map_err(|e| Error::schema_parse(name, e.to_string()))?;
        Ok(Self::from_descriptor(name, &proto, business))
    }

    /// Flattens an unresolved file descriptor into the schema model
    pub fn from_descriptor(
        name: &str,
        proto: &FileDescriptorProto,
        business: &BusinessConfig,
    ) -> Self {
        let syntax = match proto.syntax() {
            "" => "proto2".to_string(),
            s => s.to_string(),
        };

        let imports = proto
            .dependency
            .iter()
            .filter(|dep| {
                let ignored = business.is_ignored_import(dep);
                if ignored {
                    trace!("{}: dropping ignored import {}", name, dep);
                }
                !ignored
            })
            .cloned()
            .collect();

        Self {
            name: name.to_string(),
            syntax,
            package: proto.package().to_string(),
            imports,
            messages: proto.message_type.iter().map(convert_message).collect(),
            enums: proto.enum_type.iter().map(convert_enum).collect(),
        }
    }

    /// First top-level message called `name`
    pub fn message(&self, name: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.name == name)
    }

    /// First top-level enumeration called `name`
    pub fn enumeration(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name == name)
    }
}

fn is_map_entry(message: &DescriptorProto) -> bool {
    message
        .options
        .as_ref()
        .map_or(false, |o| o.map_entry.unwrap_or(false))
}

/// Finds the synthetic entry type backing a map field, if any
fn map_entry<'a>(
    field: &FieldDescriptorProto,
    message: &'a DescriptorProto,
) -> Option<&'a DescriptorProto> {
    if field.label() != Label::Repeated {
        return None;
    }
    let type_name = field.type_name();
    if type_name.is_empty() {
        return None;
    }

    message.nested_type.iter().find(|nested| {
        let expected_name = format!(".{}", nested.name());
        is_map_entry(nested) && (type_name == nested.name() || type_name.ends_with(&expected_name))
    })
}

fn convert_message(message: &DescriptorProto) -> Message {
    let mut out = Message::new(message.name());

    for field in &message.field {
        // Groups have no storable representation
        if field.r#type == Some(Type::Group as i32) {
            continue;
        }

        if let Some(entry) = map_entry(field, message) {
            let key = entry.field.iter().find(|f| f.number() == 1);
            let value = entry.field.iter().find(|f| f.number() == 2);
            if let (Some(key), Some(value)) = (key, value) {
                out.maps.push(MapField {
                    key_type: field_type_name(key),
                    value_field: Field::new(field.number(), field.name(), field_type_name(value)),
                });
                continue;
            }
        }

        out.fields.push(Field {
            sequence_id: field.number(),
            name: field.name().to_string(),
            type_name: field_type_name(field),
            repeated: field.label() == Label::Repeated,
        });
    }

    out.nested_messages = message
        .nested_type
        .iter()
        .filter(|nested| !is_map_entry(nested))
        .map(convert_message)
        .collect();
    out.nested_enums = message.enum_type.iter().map(convert_enum).collect();

    out
}

fn convert_enum(enum_type: &EnumDescriptorProto) -> Enum {
    Enum {
        name: enum_type.name().to_string(),
        values: enum_type
            .value
            .iter()
            .map(|v| EnumValue {
                name: v.name().to_string(),
                value: v.number(),
            })
            .collect(),
    }
}

/// Scalar keyword for scalar fields, the written type name otherwise
fn field_type_name(field: &FieldDescriptorProto) -> String {
    if !field.type_name().is_empty() {
        return field.type_name().trim_start_matches('.').to_string();
    }

    match field.r#type() {
        Type::Double => "double",
        Type::Float => "float",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "fixed64",
        Type::Fixed32 => "fixed32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Sfixed32 => "sfixed32",
        Type::Sfixed64 => "sfixed64",
        Type::Sint32 => "sint32",
        Type::Sint64 => "sint64",
        Type::Group => "group",
        Type::Message | Type::Enum => "",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ParsedFile {
        ParsedFile::parse("test.proto", source, &BusinessConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_header() {
        let file = parse(
            r#"
            syntax = "proto3";
            package entity;
            import "proto/entity/common.proto";
            import "proto/entity/role.proto";
            "#,
        );

        assert_eq!(file.name, "test.proto");
        assert_eq!(file.syntax, "proto3");
        assert_eq!(file.package, "entity");
        assert_eq!(file.imports, vec!["proto/entity/role.proto".to_string()]);
    }

    #[test]
    fn test_parse_fields_keep_unresolved_types() {
        let file = parse(
            r#"
            syntax = "proto3";
            package entity;
            message OUT_ChatSkins {
              EntityType type = 1;
              string UUID = 2;
              repeated entity.SkinInfo skins = 3;
              uint32 skin_id = 4;
            }
            "#,
        );

        let msg = file.message("OUT_ChatSkins").unwrap();
        assert_eq!(
            msg.fields,
            vec![
                Field::new(1, "type", "EntityType"),
                Field::new(2, "UUID", "string"),
                Field::new(3, "skins", "entity.SkinInfo").repeated(),
                Field::new(4, "skin_id", "uint32"),
            ]
        );
    }

    #[test]
    fn test_parse_maps_oneofs_and_nested() {
        let file = parse(
            r#"
            syntax = "proto3";
            message Bag {
              enum Kind { KIND_NONE = 0; KIND_ITEM = 1; }
              message Slot { int32 idx = 1; }
              map<int32, Slot> slots = 1;
              oneof content {
                Kind kind = 2;
                string label = 3;
              }
            }
            enum Color { RED = 0; BLUE = 2; }
            "#,
        );

        let msg = file.message("Bag").unwrap();
        assert_eq!(msg.maps.len(), 1);
        assert_eq!(msg.maps[0].key_type, "int32");
        assert_eq!(msg.maps[0].value_field.name, "slots");
        assert_eq!(msg.maps[0].value_field.sequence_id, 1);

        let names: Vec<_> = msg.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["kind", "label"]);

        assert_eq!(msg.nested_messages.len(), 1);
        assert!(msg.has_nested("Slot"));
        assert!(msg.has_nested("Kind"));
        assert!(!msg.has_nested("SlotsEntry"));

        let color = file.enumeration("Color").unwrap();
        assert_eq!(color.values[1], EnumValue { name: "BLUE".to_string(), value: 2 });
    }

    #[test]
    fn test_parse_error() {
        let err = ParsedFile::parse("bad.proto", "message {", &BusinessConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::SchemaParse { ref file, .. } if file == "bad.proto"));
    }
}
