//! Message classification.
//!
//! Each top-level message gets exactly one [`Category`], decided from its
//! name prefix and the shape of its fields. The rules live in a single
//! priority-ordered table; the first rule that matches wins.
//!
//! Classifying the whole store is the first of the two run phases. Its
//! result, [`Classification`], is immutable and is the only way into the
//! emission phase.

use crate::blob::BlobAggregator;
use crate::config::BusinessConfig;
use crate::schema::{Message, SchemaStore, ENTITY_TYPE, UUID_FIELD};
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, info};

/// Storage category of a top-level message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Fixed base table with a configured primary key
    Base,
    /// Inbound entity table keyed by `UUID,UID`
    SplitIn,
    /// Outbound entity table keyed by `UUID,UID`
    SplitOut,
    /// Public entity table keyed by `UUID`
    PubIn,
    /// Inbound entity stored inside the inbound blob container
    BlobIn,
    /// Outbound entity stored inside the outbound blob container
    BlobOut,
    /// Referenced definition, never emitted on its own
    Common,
}

impl Category {
    /// All categories
    pub const ALL: [Category; 7] = [
        Category::Base,
        Category::SplitIn,
        Category::SplitOut,
        Category::PubIn,
        Category::BlobIn,
        Category::BlobOut,
        Category::Common,
    ];

    /// Short tag used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Base => "BASE",
            Category::SplitIn => "SPLIT_IN",
            Category::SplitOut => "SPLIT_OUT",
            Category::PubIn => "PUB",
            Category::BlobIn => "BLOB_IN",
            Category::BlobOut => "BLOB_OUT",
            Category::Common => "COMMON",
        }
    }

    /// Blob direction for blob categories
    pub fn blob_direction(&self) -> Option<Direction> {
        match self {
            Category::BlobIn => Some(Direction::In),
            Category::BlobOut => Some(Direction::Out),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of an `IN_`/`OUT_` message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// `IN_` prefix
    In,
    /// `OUT_` prefix
    Out,
}

impl Direction {
    /// Both directions, inbound first
    pub const ALL: [Direction; 2] = [Direction::In, Direction::Out];

    /// Configuration key of the direction
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    /// Direction implied by a message name prefix
    pub fn from_message_name(name: &str) -> Option<Self> {
        if name.starts_with("OUT_") {
            Some(Direction::Out)
        } else if name.starts_with("IN_") {
            Some(Direction::In)
        } else {
            None
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity marker state of a message's field list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityShape {
    /// Neither marker counted
    Plain,
    /// One marker counted: `EntityType` without a following `UUID`, or a lone `UUID`
    Marked,
    /// `EntityType` followed by `UUID`
    Identified,
}

impl EntityShape {
    /// Scans the fields once.
    ///
    /// `EntityType` sets the flag to one, `UUID` adds one and ends the scan,
    /// so fields after `UUID` never influence the shape.
    pub fn of(message: &Message) -> Self {
        let mut flag = 0u8;
        for field in &message.fields {
            if field.type_name == ENTITY_TYPE {
                flag = 1;
                continue;
            }
            if field.name == UUID_FIELD {
                flag += 1;
                break;
            }
        }

        match flag {
            0 => EntityShape::Plain,
            1 => EntityShape::Marked,
            _ => EntityShape::Identified,
        }
    }
}

struct Rule {
    category: Category,
    matches: fn(&Message, EntityShape, &BusinessConfig) -> bool,
}

/// Priority-ordered classification rules; anything unmatched is `Common`
const RULES: [Rule; 6] = [
    Rule {
        category: Category::BlobOut,
        matches: |m, shape, _| {
            Direction::from_message_name(&m.name) == Some(Direction::Out)
                && shape == EntityShape::Marked
        },
    },
    Rule {
        category: Category::BlobIn,
        matches: |m, shape, _| {
            Direction::from_message_name(&m.name) == Some(Direction::In)
                && shape == EntityShape::Marked
        },
    },
    Rule {
        category: Category::SplitOut,
        matches: |m, shape, _| {
            Direction::from_message_name(&m.name) == Some(Direction::Out)
                && shape == EntityShape::Identified
        },
    },
    Rule {
        category: Category::SplitIn,
        matches: |m, shape, _| {
            Direction::from_message_name(&m.name) == Some(Direction::In)
                && shape == EntityShape::Identified
        },
    },
    Rule {
        category: Category::PubIn,
        matches: |m, shape, _| m.name.starts_with("PUB_") && shape == EntityShape::Identified,
    },
    Rule {
        category: Category::Base,
        matches: |m, _, business| business.is_base_table(&m.name),
    },
];

/// Classifies a single top-level message
pub fn classify(message: &Message, business: &BusinessConfig) -> Category {
    let shape = EntityShape::of(message);
    RULES
        .iter()
        .find(|rule| (rule.matches)(message, shape, business))
        .map_or(Category::Common, |rule| rule.category)
}

/// A classified message together with the file it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedMessage {
    /// Source file name
    pub file: String,
    /// Assigned category
    pub category: Category,
    /// The message as parsed
    pub message: Message,
}

/// Frozen result of the classification phase
#[derive(Debug, Clone, Default)]
pub struct Classification {
    base: Vec<ClassifiedMessage>,
    split: Vec<ClassifiedMessage>,
    public: Vec<ClassifiedMessage>,
    common: BTreeSet<String>,
    blobs: BlobAggregator,
}

impl Classification {
    /// Classifies every top-level message of every non-shared file.
    ///
    /// Must complete before any emission: `Common` names found here are what
    /// lets a field in one file resolve against a message in another.
    pub fn classify_all(store: &SchemaStore, business: &BusinessConfig) -> Self {
        let mut out = Self::default();

        for file in store.files() {
            for message in &file.messages {
                let category = classify(message, business);
                debug!("{}: {} -> {}", file.name, message.name, category);

                let classified = || ClassifiedMessage {
                    file: file.name.clone(),
                    category,
                    message: message.clone(),
                };
                match category {
                    Category::Base => out.base.push(classified()),
                    Category::SplitIn | Category::SplitOut => out.split.push(classified()),
                    Category::PubIn => out.public.push(classified()),
                    Category::BlobIn | Category::BlobOut => {
                        out.blobs.accumulate(category, &message.name);
                    }
                    Category::Common => {
                        out.common.insert(message.name.clone());
                    }
                }
            }
        }

        info!(
            "Classified {} base, {} split, {} pub, {} blob, {} common messages",
            out.base.len(),
            out.split.len(),
            out.public.len(),
            out.blobs.len(),
            out.common.len()
        );

        out
    }

    /// Base tables in traversal order
    pub fn base(&self) -> &[ClassifiedMessage] {
        &self.base
    }

    /// Split tables (both directions) in traversal order
    pub fn split(&self) -> &[ClassifiedMessage] {
        &self.split
    }

    /// Pub tables in traversal order
    pub fn public(&self) -> &[ClassifiedMessage] {
        &self.public
    }

    /// Names of every message classified `Common`
    pub fn common(&self) -> &BTreeSet<String> {
        &self.common
    }

    /// Whether `name` was classified `Common` in some file
    pub fn is_common(&self, name: &str) -> bool {
        self.common.contains(name)
    }

    /// Accumulated blob message names
    pub fn blobs(&self) -> &BlobAggregator {
        &self.blobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, ParsedFile};

    fn entity(name: &str) -> Message {
        Message::new(name).with_field(Field::new(1, "type", ENTITY_TYPE))
    }

    fn identified(name: &str) -> Message {
        entity(name).with_field(Field::new(2, UUID_FIELD, "string"))
    }

    #[test]
    fn test_entity_shape() {
        assert_eq!(EntityShape::of(&Message::new("A")), EntityShape::Plain);
        assert_eq!(EntityShape::of(&entity("A")), EntityShape::Marked);
        assert_eq!(EntityShape::of(&identified("A")), EntityShape::Identified);

        // A repeated marker does not count twice
        let twice = entity("A").with_field(Field::new(2, "kind", ENTITY_TYPE));
        assert_eq!(EntityShape::of(&twice), EntityShape::Marked);

        // UUID ends the scan before a later marker is seen
        let uuid_first = Message::new("A")
            .with_field(Field::new(1, UUID_FIELD, "string"))
            .with_field(Field::new(2, "type", ENTITY_TYPE));
        assert_eq!(EntityShape::of(&uuid_first), EntityShape::Marked);
    }

    #[test]
    fn test_classify_decision_table() {
        let business = BusinessConfig::default();

        assert_eq!(classify(&entity("OUT_Bag"), &business), Category::BlobOut);
        assert_eq!(classify(&entity("IN_Loadout"), &business), Category::BlobIn);
        assert_eq!(classify(&identified("OUT_ChatSkins"), &business), Category::SplitOut);
        assert_eq!(classify(&identified("IN_Mail"), &business), Category::SplitIn);
        assert_eq!(classify(&identified("PUB_Guild"), &business), Category::PubIn);
        assert_eq!(classify(&Message::new("BaseRoles"), &business), Category::Base);
        assert_eq!(classify(&Message::new("ItemInfo"), &business), Category::Common);

        // Prefix without the right shape falls through
        assert_eq!(classify(&Message::new("OUT_Plain"), &business), Category::Common);
        assert_eq!(classify(&entity("PUB_Marked"), &business), Category::Common);
    }

    #[test]
    fn test_prefix_rules_outrank_base_tables() {
        let mut business = BusinessConfig::default();
        business.base_tables.push("IN_Loadout".to_string());

        assert_eq!(classify(&entity("IN_Loadout"), &business), Category::BlobIn);
    }

    #[test]
    fn test_classify_all() {
        let business = BusinessConfig::default();
        let mut role = ParsedFile {
            name: "role.proto".to_string(),
            ..ParsedFile::default()
        };
        role.messages = vec![
            Message::new("BaseRoles"),
            identified("OUT_ChatSkins"),
            identified("IN_Mail"),
            entity("IN_Loadout"),
            entity("IN_Loadout"),
            Message::new("SkinInfo"),
        ];
        let shared = |name: &str| ParsedFile {
            name: name.to_string(),
            ..ParsedFile::default()
        };
        let store = SchemaStore::new(
            vec![role, shared("common.proto"), shared("enumm_entity.proto")],
            &business,
        )
        .unwrap();

        let classification = Classification::classify_all(&store, &business);
        assert_eq!(classification.base().len(), 1);
        assert_eq!(classification.split().len(), 2);
        assert_eq!(classification.split()[0].category, Category::SplitOut);
        assert_eq!(classification.split()[1].file, "role.proto");
        assert!(classification.public().is_empty());
        assert!(classification.is_common("SkinInfo"));
        assert_eq!(classification.blobs().names(Direction::In), ["IN_Loadout".to_string()]);
    }
}
