//! The AND/OR relation chain joining adjacent slot outcomes.

use crate::errors::{CoreError, CoreResult};
use crate::types::LogicRelation;
use serde::{Deserialize, Serialize};

/// Ordered chain of binary relations.
///
/// `relation[i]` joins the boolean result of slot `i` with slot `i + 1`, so a
/// settled chain has exactly `max(0, count - 1)` entries. Mutation may leave
/// the chain temporarily longer (an edit can land before the slot move that
/// justifies it); [`LogicChain::prune`] restores the invariant.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogicChain {
    relations: Vec<LogicRelation>,
}

impl LogicChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Chain with the given relations, in slot order.
    pub fn from_relations(relations: Vec<LogicRelation>) -> Self {
        Self { relations }
    }

    /// Relations in slot order.
    pub fn relations(&self) -> &[LogicRelation] {
        &self.relations
    }

    /// Number of relations currently held.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Relation at `index`, defaulting to `And` past the stored range.
    pub fn relation(&self, index: usize) -> LogicRelation {
        self.relations.get(index).copied().unwrap_or_default()
    }

    /// Set the relation at `index`, padding intermediate entries with `And`.
    /// Returns whether the stored value changed.
    pub fn set_relation(&mut self, index: usize, relation: LogicRelation) -> bool {
        while self.relations.len() <= index {
            self.relations.push(LogicRelation::And);
        }
        let changed = self.relations[index] != relation;
        self.relations[index] = relation;
        changed
    }

    /// Set the relation at `index`, rejecting indices no slot count within
    /// `capacity` could ever justify.
    pub fn set_relation_bounded(
        &mut self,
        index: usize,
        relation: LogicRelation,
        capacity: usize,
    ) -> CoreResult<bool> {
        if capacity == 0 || index >= capacity - 1 {
            return Err(CoreError::invalid_relation(index, capacity));
        }
        Ok(self.set_relation(index, relation))
    }

    /// Resize to `max(0, count - 1)`: truncate from the tail, pad with `And`.
    pub fn prune(&mut self, count: usize) {
        let expected = count.saturating_sub(1);
        self.relations.resize(expected, LogicRelation::And);
    }

    /// Fold per-slot outcomes strictly left-to-right.
    ///
    /// Empty input is false; a single outcome passes through untouched. There
    /// is deliberately no operator precedence: `a OR b AND c` associates as
    /// `(a OR b) AND c`. Relations past the stored chain default to `And`.
    pub fn fold(&self, results: &[bool]) -> bool {
        let Some((&first, rest)) = results.split_first() else {
            return false;
        };
        let mut acc = first;
        for (i, &next) in rest.iter().enumerate() {
            acc = match self.relation(i) {
                LogicRelation::And => acc && next,
                LogicRelation::Or => acc || next,
            };
        }
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LogicRelation::{And, Or};

    #[test]
    fn fold_edge_lengths() {
        let chain = LogicChain::new();
        assert!(!chain.fold(&[]));
        assert!(chain.fold(&[true]));
        assert!(!chain.fold(&[false]));
    }

    #[test]
    fn fold_defaults_to_and_without_relations() {
        let chain = LogicChain::new();
        assert!(chain.fold(&[true, true, true]));
        assert!(!chain.fold(&[true, false, true]));
    }

    #[test]
    fn fold_is_left_associative() {
        // (true OR false) AND true
        let chain = LogicChain::from_relations(vec![Or, And]);
        assert!(chain.fold(&[true, false, true]));
        // (false OR true) AND false
        assert!(!chain.fold(&[false, true, false]));
    }

    #[test]
    fn relation_order_changes_the_outcome() {
        // Mixed chains are not symmetric: with outcomes [true, true, false],
        // (t AND t) OR f = true but (t OR t) AND f = false.
        let results = [true, true, false];
        let and_or = LogicChain::from_relations(vec![And, Or]);
        let or_and = LogicChain::from_relations(vec![Or, And]);
        assert!(and_or.fold(&results));
        assert!(!or_and.fold(&results));
    }

    #[test]
    fn set_relation_pads_with_and() {
        let mut chain = LogicChain::new();
        assert!(chain.set_relation(2, Or));
        assert_eq!(chain.relations(), &[And, And, Or]);
        // Idempotent second write reports no change.
        assert!(!chain.set_relation(2, Or));
    }

    #[test]
    fn bounded_set_rejects_unreachable_indices() {
        let mut chain = LogicChain::new();
        assert!(chain.set_relation_bounded(2, Or, 8).is_ok());
        assert_eq!(
            chain.set_relation_bounded(7, Or, 8),
            Err(CoreError::invalid_relation(7, 8))
        );
    }

    #[test]
    fn prune_truncates_and_pads() {
        let mut chain = LogicChain::from_relations(vec![Or, Or, Or]);
        chain.prune(2);
        assert_eq!(chain.relations(), &[Or]);
        chain.prune(4);
        assert_eq!(chain.relations(), &[Or, And, And]);
        chain.prune(0);
        assert!(chain.is_empty());
    }
}
