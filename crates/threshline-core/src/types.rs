//! Domain value types shared across the workspace.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identity of a tracked resource.
///
/// The ledger collaborator owns what a key *means*; threshline only compares
/// keys for equality and hands them back to the ledger for lookups. Keys are
/// cheap to clone and hash so they can live in watch sets and caches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Create a key from its canonical string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical string form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Family prefix used by approximate matching: the segment before the
    /// first `:`, or the whole key when there is none.
    pub fn family(&self) -> &str {
        self.0.split(':').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceKey {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceKey {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Per-slot comparison applied between the cached quantity and the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// Met when `quantity >= threshold`.
    #[default]
    GreaterOrEqual,
    /// Met when `quantity < threshold`.
    LessThan,
}

impl ComparisonOp {
    /// Evaluate the comparison for one slot.
    pub fn is_met(self, quantity: i64, threshold: i64) -> bool {
        match self {
            Self::GreaterOrEqual => quantity >= threshold,
            Self::LessThan => quantity < threshold,
        }
    }

    /// Persisted name, mirrored by [`ComparisonOp::parse`].
    pub fn name(self) -> &'static str {
        match self {
            Self::GreaterOrEqual => "GREATER_OR_EQUAL",
            Self::LessThan => "LESS_THAN",
        }
    }

    /// Parse a persisted name. Unknown names yield `None`; loaders default
    /// them rather than failing.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "GREATER_OR_EQUAL" => Some(Self::GreaterOrEqual),
            "LESS_THAN" => Some(Self::LessThan),
            _ => None,
        }
    }
}

/// Binary relation joining the outcomes of two adjacent slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicRelation {
    /// Both sides must hold.
    #[default]
    And,
    /// Either side may hold.
    Or,
}

impl LogicRelation {
    /// Persisted name, mirrored by [`LogicRelation::parse`].
    pub fn name(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    /// Parse a persisted name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

/// Output polarity of the emitted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RedstoneMode {
    /// Emit when the folded result is true.
    #[default]
    HighSignal,
    /// Emit when the folded result is false.
    LowSignal,
}

/// Breadth hint for approximate key matching, interpreted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FuzzyScope {
    /// Aggregate keys sharing the same family prefix.
    #[default]
    Family,
    /// Aggregate every key the ledger knows.
    All,
}

/// An installed capability card altering watch and evaluation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityCard {
    /// Enables approximate key matching.
    Fuzzy,
    /// Switches the emitter to direct crafting-request output.
    Crafting,
}

/// Effective modifier flags derived from the installed cards.
///
/// Crafting takes effect-priority when both cards are present; that
/// precedence lives in [`crate::watch::desired_watch`] and the evaluator's
/// direct-output path, not here; both flags are plain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    /// Approximate matching card installed.
    pub fuzzy: bool,
    /// Crafting card installed.
    pub crafting: bool,
}

impl Modifiers {
    /// Derive flags from an installed card set (0, 1, or 2 cards).
    pub fn from_cards(cards: &[CapabilityCard]) -> Self {
        Self {
            fuzzy: cards.contains(&CapabilityCard::Fuzzy),
            crafting: cards.contains(&CapabilityCard::Crafting),
        }
    }

    /// True when the evaluator must bypass per-slot comparison entirely.
    pub fn direct_output(self) -> bool {
        self.crafting
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_semantics() {
        assert!(ComparisonOp::GreaterOrEqual.is_met(64, 64));
        assert!(!ComparisonOp::GreaterOrEqual.is_met(63, 64));
        assert!(ComparisonOp::LessThan.is_met(63, 64));
        assert!(!ComparisonOp::LessThan.is_met(64, 64));
    }

    #[test]
    fn enum_names_round_trip() {
        for op in [ComparisonOp::GreaterOrEqual, ComparisonOp::LessThan] {
            assert_eq!(ComparisonOp::parse(op.name()), Some(op));
        }
        for rel in [LogicRelation::And, LogicRelation::Or] {
            assert_eq!(LogicRelation::parse(rel.name()), Some(rel));
        }
        assert_eq!(ComparisonOp::parse("NOT_A_MODE"), None);
        assert_eq!(LogicRelation::parse("XOR"), None);
    }

    #[test]
    fn modifiers_from_cards() {
        let both = Modifiers::from_cards(&[CapabilityCard::Fuzzy, CapabilityCard::Crafting]);
        assert!(both.fuzzy && both.crafting && both.direct_output());
        assert_eq!(Modifiers::from_cards(&[]), Modifiers::default());
    }

    #[test]
    fn key_family_prefix() {
        assert_eq!(ResourceKey::new("wood:oak").family(), "wood");
        assert_eq!(ResourceKey::new("iron").family(), "iron");
    }
}
