//! Lenient structured persistence of the authority's state.
//!
//! The document is JSON but the decoder never round-trips through derived
//! `Deserialize`: every field is read tolerantly, field by field, so one
//! damaged entry costs that entry and nothing else. Enum values persist by
//! name and default when unknown; threshold keys are strings and unparseable
//! ones are skipped with a warning. A `configured_count` field is written for
//! inspection but re-derived from the slots on load, never trusted.

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use threshline_core::{
    CapabilityCard, ComparisonOp, FuzzyScope, LogicRelation, RedstoneMode, ResourceKey,
};
use tracing::warn;

/// Decoded persistent image of one emitter unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SavedState {
    /// Ordered slot contents, sparse-terminated.
    pub slots: Vec<Option<ResourceKey>>,
    /// Sparse per-slot thresholds, including pre-set entries past the count.
    pub thresholds: BTreeMap<usize, i64>,
    /// Comparison operators in slot order.
    pub operators: Vec<ComparisonOp>,
    /// Logic relations in chain order.
    pub relations: Vec<LogicRelation>,
    /// Best-effort last-known quantities.
    pub quantities: Vec<i64>,
    /// Installed capability cards.
    pub cards: Vec<CapabilityCard>,
    /// Output polarity setting.
    pub redstone_mode: RedstoneMode,
    /// Approximate-matching breadth setting.
    pub fuzzy_scope: FuzzyScope,
}

impl SavedState {
    /// Encode to the persisted document.
    pub fn encode(&self, configured_count: usize) -> Value {
        let thresholds: Map<String, Value> = self
            .thresholds
            .iter()
            .map(|(slot, value)| (slot.to_string(), json!(value)))
            .collect();
        json!({
            "slots": self
                .slots
                .iter()
                .map(|slot| match slot {
                    Some(key) => json!(key.as_str()),
                    None => Value::Null,
                })
                .collect::<Vec<_>>(),
            "configured_count": configured_count,
            "thresholds": thresholds,
            "operators": self.operators.iter().map(|op| op.name()).collect::<Vec<_>>(),
            "relations": self.relations.iter().map(|rel| rel.name()).collect::<Vec<_>>(),
            "quantities": self.quantities,
            "modifiers": {
                "fuzzy": self.cards.contains(&CapabilityCard::Fuzzy),
                "crafting": self.cards.contains(&CapabilityCard::Crafting),
            },
            "redstone_mode": redstone_name(self.redstone_mode),
            "fuzzy_scope": scope_name(self.fuzzy_scope),
        })
    }

    /// Decode from the persisted document, recovering everything parseable.
    pub fn decode(value: &Value) -> Self {
        let mut state = Self::default();

        if let Some(slots) = value.get("slots").and_then(Value::as_array) {
            for slot in slots {
                match slot {
                    Value::String(key) => state.slots.push(Some(ResourceKey::new(key.clone()))),
                    Value::Null => state.slots.push(None),
                    other => {
                        warn!(?other, "invalid slot entry, treated as empty");
                        state.slots.push(None);
                    }
                }
            }
        }

        if let Some(thresholds) = value.get("thresholds").and_then(Value::as_object) {
            for (key, entry) in thresholds {
                let Ok(slot) = key.parse::<usize>() else {
                    warn!(key, "invalid threshold key skipped");
                    continue;
                };
                match entry.as_i64() {
                    Some(threshold) => {
                        state.thresholds.insert(slot, threshold);
                    }
                    None => warn!(key, "non-numeric threshold skipped"),
                }
            }
        }

        if let Some(operators) = value.get("operators").and_then(Value::as_array) {
            for entry in operators {
                let op = entry
                    .as_str()
                    .and_then(ComparisonOp::parse)
                    .unwrap_or_default();
                state.operators.push(op);
            }
        }

        if let Some(relations) = value.get("relations").and_then(Value::as_array) {
            for entry in relations {
                let rel = entry
                    .as_str()
                    .and_then(LogicRelation::parse)
                    .unwrap_or_default();
                state.relations.push(rel);
            }
        }

        if let Some(quantities) = value.get("quantities").and_then(Value::as_array) {
            for entry in quantities {
                state.quantities.push(entry.as_i64().unwrap_or(0));
            }
        }

        let modifiers = value.get("modifiers");
        if flag(modifiers, "fuzzy") {
            state.cards.push(CapabilityCard::Fuzzy);
        }
        if flag(modifiers, "crafting") {
            state.cards.push(CapabilityCard::Crafting);
        }

        state.redstone_mode = match value.get("redstone_mode").and_then(Value::as_str) {
            Some("LOW_SIGNAL") => RedstoneMode::LowSignal,
            Some("HIGH_SIGNAL") | None => RedstoneMode::HighSignal,
            Some(other) => {
                warn!(other, "unknown redstone mode, defaulted");
                RedstoneMode::HighSignal
            }
        };
        state.fuzzy_scope = match value.get("fuzzy_scope").and_then(Value::as_str) {
            Some("ALL") => FuzzyScope::All,
            Some("FAMILY") | None => FuzzyScope::Family,
            Some(other) => {
                warn!(other, "unknown fuzzy scope, defaulted");
                FuzzyScope::Family
            }
        };

        state
    }
}

fn flag(modifiers: Option<&Value>, name: &str) -> bool {
    modifiers
        .and_then(|m| m.get(name))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn redstone_name(mode: RedstoneMode) -> &'static str {
    match mode {
        RedstoneMode::HighSignal => "HIGH_SIGNAL",
        RedstoneMode::LowSignal => "LOW_SIGNAL",
    }
}

fn scope_name(scope: FuzzyScope) -> &'static str {
    match scope {
        FuzzyScope::Family => "FAMILY",
        FuzzyScope::All => "ALL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SavedState {
        SavedState {
            slots: vec![
                Some(ResourceKey::new("iron")),
                Some(ResourceKey::new("coal")),
                None,
            ],
            thresholds: BTreeMap::from([(0, 64), (1, 32), (5, 99)]),
            operators: vec![ComparisonOp::GreaterOrEqual, ComparisonOp::LessThan],
            relations: vec![LogicRelation::Or],
            quantities: vec![10, 3],
            cards: vec![CapabilityCard::Fuzzy],
            redstone_mode: RedstoneMode::LowSignal,
            fuzzy_scope: FuzzyScope::All,
        }
    }

    #[test]
    fn round_trip_reproduces_state() {
        let state = sample();
        let decoded = SavedState::decode(&state.encode(2));
        assert_eq!(decoded, state);
    }

    #[test]
    fn malformed_entries_are_skipped_not_fatal() {
        let doc = json!({
            "slots": ["iron", 12, "coal"],
            "thresholds": {"0": 64, "not-a-number": 5, "1": "sixty"},
            "operators": ["LESS_THAN", "SIDEWAYS"],
            "relations": ["OR", "XOR"],
            "redstone_mode": "PLAID",
        });
        let state = SavedState::decode(&doc);
        // Invalid slot entry becomes a hole; the count derivation handles it.
        assert_eq!(state.slots[1], None);
        assert_eq!(state.thresholds, BTreeMap::from([(0, 64)]));
        assert_eq!(
            state.operators,
            vec![ComparisonOp::LessThan, ComparisonOp::GreaterOrEqual]
        );
        assert_eq!(state.relations, vec![LogicRelation::Or, LogicRelation::And]);
        assert_eq!(state.redstone_mode, RedstoneMode::HighSignal);
    }

    #[test]
    fn empty_document_decodes_to_defaults() {
        assert_eq!(SavedState::decode(&json!({})), SavedState::default());
    }
}
