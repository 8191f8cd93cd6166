//! Field rewriting.
//!
//! Turns a classified message's fields into the field list of a store table:
//! the `EntityType` marker is dropped, identifier columns are injected for
//! entity tables, base tables get trailing timestamp columns, and every type
//! the store cannot hold natively becomes `bytes`.
//!
//! Sequence ids follow a running correction (`seq_delta`) applied to each
//! remaining original id. The numbering is literal: where the rules put two
//! columns on the same id the clash is kept, recorded on the result and
//! logged.

use crate::classify::Category;
use crate::resolve::{ResolvedType, Resolver};
use crate::schema::{Enum, Field, Message, ParsedFile, ENTITY_TYPE, UUID_FIELD};
use std::collections::BTreeMap;
use tracing::{trace, warn};

/// Store type for opaque payloads
pub const BYTES_TYPE: &str = "bytes";

/// Store type of synthesized identifier and timestamp columns
pub const U64_TYPE: &str = "uint64";

/// Synthesized secondary identifier column
pub const SECONDARY_ID_FIELD: &str = "UID";

/// Synthesized last-update timestamp column
pub const UPDATE_TIME_FIELD: &str = "UpdateTime";

/// Synthesized creation timestamp column
pub const ADD_TIME_FIELD: &str = "AddTime";

/// `uint64 UID = seq`
pub fn secondary_id_field(seq: i32) -> Field {
    Field::new(seq, SECONDARY_ID_FIELD, U64_TYPE)
}

/// `uint64 UpdateTime = seq`
pub fn update_time_field(seq: i32) -> Field {
    Field::new(seq, UPDATE_TIME_FIELD, U64_TYPE)
}

/// `uint64 AddTime = seq`
pub fn add_time_field(seq: i32) -> Field {
    Field::new(seq, ADD_TIME_FIELD, U64_TYPE)
}

/// `bytes name = seq`
pub fn bytes_field(seq: i32, name: impl Into<String>) -> Field {
    Field::new(seq, name, BYTES_TYPE)
}

/// What happens to the `UUID` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UuidRule {
    /// Treated like any other field
    Keep,
    /// `UUID = 1`, `UID = 2`, `UpdateTime = 3`, later fields shift by one
    SplitHeader,
    /// `UUID = 1`, `UpdateTime = 2`, later fields keep their ids
    PubHeader,
}

/// Per-category rewrite policy
#[derive(Debug, Clone, Copy)]
struct FieldPolicy {
    /// Removing `EntityType` shifts later fields down by one
    compact_entity_type: bool,
    uuid: UuidRule,
    /// Append timestamp columns anchored on the largest original id
    timestamp_trailer: bool,
}

impl FieldPolicy {
    fn for_category(category: Category) -> Self {
        match category {
            Category::Base => FieldPolicy {
                compact_entity_type: true,
                uuid: UuidRule::Keep,
                timestamp_trailer: true,
            },
            Category::SplitIn | Category::SplitOut => FieldPolicy {
                compact_entity_type: false,
                uuid: UuidRule::SplitHeader,
                timestamp_trailer: false,
            },
            Category::PubIn => FieldPolicy {
                compact_entity_type: false,
                uuid: UuidRule::PubHeader,
                timestamp_trailer: false,
            },
            Category::BlobIn | Category::BlobOut | Category::Common => FieldPolicy {
                compact_entity_type: false,
                uuid: UuidRule::Keep,
                timestamp_trailer: false,
            },
        }
    }
}

/// Two or more emitted columns sharing one sequence id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceCollision {
    /// The shared id
    pub sequence_id: i32,
    /// Names of the columns holding it, in emission order
    pub fields: Vec<String>,
}

/// A message rewritten for the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenMessage {
    /// Message name
    pub name: String,
    /// Category it was rewritten for
    pub category: Category,
    /// Columns: the injected header first, then ascending sequence id
    pub fields: Vec<Field>,
    /// Enumerations referenced by the columns, first reference first
    pub enums: Vec<Enum>,
    /// Sequence ids held by more than one column
    pub collisions: Vec<SequenceCollision>,
}

/// Rewrites messages of one category
#[derive(Debug, Clone, Copy)]
pub struct FieldRewriter<'a> {
    resolver: Resolver<'a>,
    /// Base table receiving `AddTime` as well as `UpdateTime`
    account_table: &'a str,
    title_case: bool,
}

impl<'a> FieldRewriter<'a> {
    /// Creates a rewriter
    pub fn new(resolver: Resolver<'a>, account_table: &'a str, title_case: bool) -> Self {
        Self {
            resolver,
            account_table,
            title_case,
        }
    }

    fn field_name(&self, name: &str) -> String {
        if self.title_case {
            to_title_case(name)
        } else {
            name.to_string()
        }
    }

    /// Computes the store field list of `message` under `category`
    pub fn rewrite(
        &self,
        message: &Message,
        category: Category,
        in_file: &'a ParsedFile,
    ) -> RewrittenMessage {
        let policy = FieldPolicy::for_category(category);
        let mut header = Vec::new();
        let mut fields = Vec::with_capacity(message.fields.len() + message.maps.len() + 2);
        let mut enums: Vec<Enum> = Vec::new();
        let mut seq_delta = 0i32;
        let mut max_seq = 0i32;

        for field in &message.fields {
            max_seq = max_seq.max(field.sequence_id);

            if field.type_name == ENTITY_TYPE {
                if policy.compact_entity_type {
                    seq_delta -= 1;
                }
                trace!("{}: dropping {} {}", message.name, ENTITY_TYPE, field.name);
                continue;
            }

            if field.name == UUID_FIELD {
                match policy.uuid {
                    UuidRule::SplitHeader => {
                        header.push(Field::new(1, self.field_name(&field.name), &field.type_name));
                        header.push(secondary_id_field(2));
                        header.push(update_time_field(3));
                        seq_delta += 1;
                        continue;
                    }
                    UuidRule::PubHeader => {
                        header.push(Field::new(1, self.field_name(&field.name), &field.type_name));
                        header.push(update_time_field(2));
                        continue;
                    }
                    UuidRule::Keep => {}
                }
            }

            let new_id = field.sequence_id + seq_delta;
            let type_name = match self.resolver.resolve(&field.type_name, message, in_file) {
                ResolvedType::Enum(e) => {
                    if !enums.iter().any(|known| known.name == e.name) {
                        enums.push(e.clone());
                    }
                    e.name.clone()
                }
                ResolvedType::Message | ResolvedType::Nested => BYTES_TYPE.to_string(),
                ResolvedType::Unresolved => field.type_name.clone(),
            };
            trace!(
                "{}: {} {} = {} -> {} = {}",
                message.name,
                field.type_name,
                field.name,
                field.sequence_id,
                type_name,
                new_id
            );

            fields.push(Field {
                sequence_id: new_id,
                name: self.field_name(&field.name),
                type_name,
                repeated: field.repeated,
            });
        }

        for map in &message.maps {
            let value = &map.value_field;
            fields.push(bytes_field(
                value.sequence_id + seq_delta,
                self.field_name(&value.name),
            ));
        }

        if policy.timestamp_trailer && max_seq != 0 {
            if message.name == self.account_table {
                fields.push(add_time_field(max_seq));
                fields.push(update_time_field(max_seq + 1));
            } else {
                fields.push(update_time_field(max_seq));
            }
        }

        // The injected header always leads; the rest is stable-sorted so
        // columns sharing an id keep their generation order
        fields.sort_by_key(|f| f.sequence_id);
        header.append(&mut fields);
        let fields = header;

        let collisions = find_collisions(&fields);
        for collision in &collisions {
            warn!(
                "{} ({}): sequence id {} is shared by {}",
                message.name,
                category,
                collision.sequence_id,
                collision.fields.join(", ")
            );
        }

        RewrittenMessage {
            name: message.name.clone(),
            category,
            fields,
            enums,
            collisions,
        }
    }
}

fn find_collisions(fields: &[Field]) -> Vec<SequenceCollision> {
    let mut by_id: BTreeMap<i32, Vec<String>> = BTreeMap::new();
    for field in fields {
        by_id
            .entry(field.sequence_id)
            .or_default()
            .push(field.name.clone());
    }

    by_id
        .into_iter()
        .filter(|(_, names)| names.len() > 1)
        .map(|(sequence_id, fields)| SequenceCollision {
            sequence_id,
            fields,
        })
        .collect()
}

/// Upper-cases the first character: `skin_id` -> `Skin_id`
fn to_title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::config::BusinessConfig;
    use crate::schema::{EnumValue, MapField, SchemaStore};
    use pretty_assertions::assert_eq;

    struct Fixture {
        store: SchemaStore,
        classification: Classification,
        business: BusinessConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let business = BusinessConfig::default();
            let enums = ParsedFile {
                name: "enumm_entity.proto".to_string(),
                enums: vec![Enum {
                    name: "Quality".to_string(),
                    values: vec![EnumValue { name: "Q_NONE".to_string(), value: 0 }],
                }],
                ..ParsedFile::default()
            };
            let common = ParsedFile {
                name: "common.proto".to_string(),
                messages: vec![Message::new("ItemInfo")],
                ..ParsedFile::default()
            };
            let store = SchemaStore::new(
                vec![
                    common,
                    enums,
                    ParsedFile {
                        name: "role.proto".to_string(),
                        ..ParsedFile::default()
                    },
                ],
                &business,
            )
            .unwrap();
            let classification = Classification::classify_all(&store, &business);
            Self {
                store,
                classification,
                business,
            }
        }

        fn rewrite(&self, message: &Message, category: Category) -> RewrittenMessage {
            let resolver = Resolver::new(
                &self.store,
                &self.classification,
                &self.business.entity_package,
            );
            let rewriter = FieldRewriter::new(resolver, &self.business.account_table, false);
            rewriter.rewrite(message, category, self.store.file("role.proto").unwrap())
        }
    }

    #[test]
    fn test_account_table_trailer() {
        let fixture = Fixture::new();
        let msg = Message::new("BaseAccounts").with_field(Field::new(1, "token", "string"));

        let out = fixture.rewrite(&msg, Category::Base);
        assert_eq!(
            out.fields,
            vec![
                Field::new(1, "token", "string"),
                add_time_field(1),
                update_time_field(2),
            ]
        );
        assert_eq!(out.collisions.len(), 1);
        assert_eq!(out.collisions[0].sequence_id, 1);
    }

    #[test]
    fn test_base_compacts_around_entity_type() {
        let fixture = Fixture::new();
        let msg = Message::new("BaseRoles")
            .with_field(Field::new(1, "type", ENTITY_TYPE))
            .with_field(Field::new(2, "role_id", "uint64"))
            .with_field(Field::new(3, "name", "string"));

        let out = fixture.rewrite(&msg, Category::Base);
        assert_eq!(
            out.fields,
            vec![
                Field::new(1, "role_id", "uint64"),
                Field::new(2, "name", "string"),
                update_time_field(3),
            ]
        );
        assert!(out.collisions.is_empty());
    }

    #[test]
    fn test_split_header() {
        let fixture = Fixture::new();
        let msg = Message::new("OUT_ChatSkins")
            .with_field(Field::new(1, "type", ENTITY_TYPE))
            .with_field(Field::new(2, UUID_FIELD, "string"))
            .with_field(Field::new(3, "skin_id", "uint32"));

        let out = fixture.rewrite(&msg, Category::SplitOut);
        assert_eq!(
            out.fields,
            vec![
                Field::new(1, UUID_FIELD, "string"),
                secondary_id_field(2),
                update_time_field(3),
                Field::new(4, "skin_id", "uint32"),
            ]
        );
        assert!(out.collisions.is_empty());
    }

    #[test]
    fn test_split_header_ignores_original_uuid_position() {
        let fixture = Fixture::new();
        let msg = Message::new("IN_Mail")
            .with_field(Field::new(1, "type", ENTITY_TYPE))
            .with_field(Field::new(7, UUID_FIELD, "uint64"));

        let out = fixture.rewrite(&msg, Category::SplitIn);
        let ids: Vec<_> = out.fields.iter().map(|f| f.sequence_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(out.fields[0].type_name, "uint64");
    }

    #[test]
    fn test_split_header_leads_when_ids_tie() {
        let fixture = Fixture::new();
        let msg = Message::new("OUT_X")
            .with_field(Field::new(1, "type", ENTITY_TYPE))
            .with_field(Field::new(2, "a", "int32"))
            .with_field(Field::new(3, UUID_FIELD, "string"))
            .with_field(Field::new(4, "b", "int32"));

        let out = fixture.rewrite(&msg, Category::SplitOut);
        assert_eq!(
            out.fields,
            vec![
                Field::new(1, UUID_FIELD, "string"),
                secondary_id_field(2),
                update_time_field(3),
                Field::new(2, "a", "int32"),
                Field::new(5, "b", "int32"),
            ]
        );
        assert_eq!(
            out.collisions,
            vec![SequenceCollision {
                sequence_id: 2,
                fields: vec!["UID".to_string(), "a".to_string()],
            }]
        );
    }

    #[test]
    fn test_pub_header_keeps_literal_collision() {
        let fixture = Fixture::new();
        let msg = Message::new("PUB_Guild")
            .with_field(Field::new(3, "type", ENTITY_TYPE))
            .with_field(Field::new(1, UUID_FIELD, "string"))
            .with_field(Field::new(2, "level", "int32"));
        assert_eq!(
            crate::classify::classify(&msg, &fixture.business),
            Category::PubIn
        );

        let out = fixture.rewrite(&msg, Category::PubIn);
        assert_eq!(
            out.fields,
            vec![
                Field::new(1, UUID_FIELD, "string"),
                update_time_field(2),
                Field::new(2, "level", "int32"),
            ]
        );
        assert_eq!(
            out.collisions,
            vec![SequenceCollision {
                sequence_id: 2,
                fields: vec!["UpdateTime".to_string(), "level".to_string()],
            }]
        );
    }

    #[test]
    fn test_type_resolution_and_maps() {
        let fixture = Fixture::new();
        let msg = Message::new("OUT_Bag")
            .with_field(Field::new(1, "type", ENTITY_TYPE))
            .with_field(Field::new(2, UUID_FIELD, "string"))
            .with_field(Field::new(3, "quality", "entity.Quality"))
            .with_field(Field::new(4, "items", "ItemInfo").repeated())
            .with_field(Field::new(5, "slot", "Slot"))
            .with_field(Field::new(6, "best", "Quality"))
            .with_field(Field::new(7, "owner", "PlayerRef"))
            .with_map(MapField {
                key_type: "int32".to_string(),
                value_field: Field::new(8, "counts", "ItemInfo"),
            })
            .with_nested_message(Message::new("Slot"));

        let out = fixture.rewrite(&msg, Category::SplitOut);
        assert_eq!(
            out.fields[3..].to_vec(),
            vec![
                Field::new(4, "quality", "Quality"),
                Field::new(5, "items", "bytes").repeated(),
                Field::new(6, "slot", "bytes"),
                Field::new(7, "best", "Quality"),
                Field::new(8, "owner", "PlayerRef"),
                Field::new(9, "counts", "bytes"),
            ]
        );
        assert_eq!(out.enums.len(), 1);
        assert_eq!(out.enums[0].name, "Quality");
    }

    #[test]
    fn test_nested_enum_becomes_bytes() {
        let fixture = Fixture::new();
        let msg = Message::new("OUT_Pet")
            .with_field(Field::new(1, "type", ENTITY_TYPE))
            .with_field(Field::new(2, UUID_FIELD, "string"))
            .with_field(Field::new(3, "mood", "Mood"))
            .with_nested_enum(Enum {
                name: "Mood".to_string(),
                values: vec![EnumValue { name: "M_CALM".to_string(), value: 0 }],
            });

        let out = fixture.rewrite(&msg, Category::SplitOut);
        assert_eq!(out.fields[3], Field::new(4, "mood", "bytes"));
        assert!(out.enums.is_empty());
    }

    #[test]
    fn test_title_case_fields() {
        let fixture = Fixture::new();
        let resolver = Resolver::new(
            &fixture.store,
            &fixture.classification,
            &fixture.business.entity_package,
        );
        let rewriter = FieldRewriter::new(resolver, "BaseAccounts", true);
        let msg = Message::new("BaseGUID").with_field(Field::new(1, "guid", "uint64"));

        let out = rewriter.rewrite(&msg, Category::Base, fixture.store.file("role.proto").unwrap());
        assert_eq!(out.fields[0].name, "Guid");
    }

    #[test]
    fn test_to_title_case() {
        assert_eq!(to_title_case("skin_id"), "Skin_id");
        assert_eq!(to_title_case("UUID"), "UUID");
        assert_eq!(to_title_case(""), "");
    }
}
