//! Blob container aggregation.
//!
//! Entities classified `BlobIn`/`BlobOut` are not stored as tables of their
//! own. Their names are collected per direction and later become opaque
//! `bytes` columns of one synthesized container message per direction.

use crate::classify::{Category, Direction};
use crate::config::BusinessConfig;
use crate::emit::{Table, TableKey};
use crate::error::{Error, Result};
use crate::rewrite::{bytes_field, secondary_id_field, update_time_field};
use tracing::{debug, trace};

/// First sequence id handed to an accumulated blob column
const FIRST_BLOB_SEQUENCE: i32 = 3;

/// Ordered, duplicate-free blob message names per direction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobAggregator {
    inbound: Vec<String>,
    outbound: Vec<String>,
}

impl BlobAggregator {
    /// Creates an empty aggregator
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a blob message name.
    ///
    /// Non-blob categories and names already recorded are ignored; returns
    /// whether the name was added.
    pub fn accumulate(&mut self, category: Category, message_name: &str) -> bool {
        let Some(direction) = category.blob_direction() else {
            return false;
        };

        let names = self.names_mut(direction);
        if names.iter().any(|n| n == message_name) {
            debug!("Blob message {} already accumulated, skipping", message_name);
            return false;
        }
        trace!("Accumulating {} blob message {}", direction, message_name);
        names.push(message_name.to_string());
        true
    }

    /// Names accumulated for a direction, in accumulation order
    pub fn names(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::In => &self.inbound,
            Direction::Out => &self.outbound,
        }
    }

    fn names_mut(&mut self, direction: Direction) -> &mut Vec<String> {
        match direction {
            Direction::In => &mut self.inbound,
            Direction::Out => &mut self.outbound,
        }
    }

    /// Total number of accumulated names
    pub fn len(&self) -> usize {
        self.inbound.len() + self.outbound.len()
    }

    /// Whether nothing was accumulated in either direction
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Synthesizes the container message for a direction.
    ///
    /// The container holds `UID = 1`, `UpdateTime = 2`, then one `bytes`
    /// column per accumulated name from 3 upward. A direction with nothing
    /// accumulated is an error for its destination file.
    pub fn container(&self, direction: Direction, business: &BusinessConfig) -> Result<Table> {
        let names = self.names(direction);
        if names.is_empty() {
            return Err(Error::empty_blob_direction(direction.as_str()));
        }

        let name = match direction {
            Direction::In => &business.blob_user_in_msg_name,
            Direction::Out => &business.blob_user_out_msg_name,
        };

        let mut fields = vec![secondary_id_field(1), update_time_field(2)];
        fields.extend(
            names
                .iter()
                .zip(FIRST_BLOB_SEQUENCE..)
                .map(|(blob, seq)| bytes_field(seq, blob.clone())),
        );

        Ok(Table {
            name: name.clone(),
            key: TableKey::Blob,
            fields,
        })
    }
}
