//! Wire message types for the authority/mirror channel.
//!
//! Messages are serde types encoded with bincode. The channel itself is
//! assumed ordered and reliable per connection; nothing here retries or
//! deduplicates, but every message is idempotent so replay is harmless.

use crate::errors::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use threshline_core::{ComparisonOp, LogicRelation, ResourceKey};

/// Which per-slot field a point update addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// The slot's threshold value.
    Threshold,
    /// The slot's comparison operator.
    Operator,
    /// The relation joining a slot with its right neighbor.
    Relation,
}

/// Typed payload of a point update; the variant is the field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    /// New threshold.
    Threshold(i64),
    /// New comparison operator.
    Operator(ComparisonOp),
    /// New logic relation.
    Relation(LogicRelation),
}

impl FieldValue {
    /// Field kind this value addresses.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Threshold(_) => FieldKind::Threshold,
            Self::Operator(_) => FieldKind::Operator,
            Self::Relation(_) => FieldKind::Relation,
        }
    }
}

/// Idempotent single-field update, sendable in either direction.
///
/// Carries an explicit index so it can be applied regardless of delivery
/// order relative to a later snapshot. Application is last-write-wins per
/// field with no causality tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointUpdate {
    /// Slot index (threshold/operator) or relation index.
    pub index: u32,
    /// New value; its variant is the field kind.
    pub value: FieldValue,
}

impl PointUpdate {
    /// Threshold update for a slot.
    pub fn threshold(index: u32, value: i64) -> Self {
        Self {
            index,
            value: FieldValue::Threshold(value),
        }
    }

    /// Operator update for a slot.
    pub fn operator(index: u32, op: ComparisonOp) -> Self {
        Self {
            index,
            value: FieldValue::Operator(op),
        }
    }

    /// Relation update for a chain position.
    pub fn relation(index: u32, relation: LogicRelation) -> Self {
        Self {
            index,
            value: FieldValue::Relation(relation),
        }
    }
}

/// Full authority state, sent once when a viewing session opens and
/// re-broadcast after structural changes.
///
/// `configured_count` is computed at send time, and the mirror still
/// re-derives its own count from the applied slots rather than trusting this
/// field; it bounds the threshold payload, nothing more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ordered slot contents, sparse-terminated (ends at the first hole,
    /// keeping the single trailing empty slot visible).
    pub slots: Vec<Option<ResourceKey>>,
    /// Configured count computed when the snapshot was built.
    pub configured_count: u32,
    /// Thresholds for indices `0..configured_count` only, bounding payload
    /// size.
    pub thresholds: Vec<i64>,
    /// Logic relations, in chain order.
    pub relations: Vec<LogicRelation>,
    /// Comparison operators for indices `0..configured_count`.
    pub operators: Vec<ComparisonOp>,
}

/// Messages the authority sends to a mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthorityMessage {
    /// Full state; the mirror applies it atomically before rendering.
    Snapshot(Snapshot),
    /// Canonical value of one field, broadcast after any change.
    Update(PointUpdate),
    /// Rebuild the edit surface on the next render tick even if the derived
    /// count did not move.
    ForceRefresh,
}

/// Messages a mirror sends to the authority: edit intents only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MirrorMessage {
    /// A field edit made on the mirror.
    Update(PointUpdate),
}

/// Encode a message for the wire.
pub fn encode<T: Serialize>(message: &T) -> SyncResult<Vec<u8>> {
    bincode::serialize(message).map_err(SyncError::codec)
}

/// Decode a message from the wire.
pub fn decode<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> SyncResult<T> {
    bincode::deserialize(bytes).map_err(SyncError::codec)
}
