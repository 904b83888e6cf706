//! Cross-population of one target field from several field mappings.

use std::collections::BTreeMap;

use recmap_model::{Composition, Value};

/// Candidate values gathered for one field during a row.
#[derive(Debug, Default)]
pub(crate) struct FieldSlots {
    /// `order` → value; joined in order when any are present.
    ordered: BTreeMap<usize, Value>,
    join: Option<String>,
    compact: Option<bool>,
    /// Sparse rank slots, lowest key wins. A slot's rank is its key plus
    /// `shift`.
    ranked: BTreeMap<i128, Value>,
    /// Unranked values placed so far; each one moves every rank down by one.
    shift: i128,
}

impl FieldSlots {
    pub(crate) fn place(&mut self, composition: &Composition, value: Value) {
        match composition {
            Composition::Ordered {
                order,
                join,
                compact,
            } => {
                self.ordered.insert(order - 1, value);
                if self.join.is_none() {
                    self.join.clone_from(join);
                }
                if compact.is_some() {
                    self.compact = *compact;
                }
            }
            Composition::Ranked { priority } => {
                let rank = i128::try_from(*priority).unwrap_or(i128::MAX);
                self.ranked.insert(rank - self.shift, value);
            }
            Composition::Unranked => {
                self.shift += 1;
                self.ranked.insert(-self.shift, value);
            }
        }
    }

    /// Resolves the field, or `None` when nothing usable was placed.
    pub(crate) fn resolve(self) -> Option<Value> {
        if let Some(max) = self.ordered.keys().next_back().copied() {
            let compact = self.compact.unwrap_or(true);
            let separator = self.join.unwrap_or_default();
            let parts: Vec<String> = if compact {
                self.ordered
                    .values()
                    .filter(|value| value.is_present())
                    .map(Value::to_raw_string)
                    .collect()
            } else {
                (0..=max)
                    .map(|slot| {
                        self.ordered
                            .get(&slot)
                            .map(Value::to_raw_string)
                            .unwrap_or_default()
                    })
                    .collect()
            };
            return Some(Value::Text(parts.join(&separator)));
        }
        self.ranked.into_values().find(Value::is_present)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(order: usize, join: Option<&str>, compact: Option<bool>) -> Composition {
        Composition::Ordered {
            order,
            join: join.map(str::to_string),
            compact,
        }
    }

    #[test]
    fn ordered_slots_join_in_order() {
        let mut slots = FieldSlots::default();
        slots.place(&ordered(2, None, None), Value::from("B"));
        slots.place(&ordered(1, Some(" "), None), Value::from("A"));
        assert_eq!(slots.resolve(), Some(Value::from("A B")));
    }

    #[test]
    fn uncompacted_gaps_render_empty() {
        let mut slots = FieldSlots::default();
        slots.place(&ordered(3, Some("-"), Some(false)), Value::from("C"));
        assert_eq!(slots.resolve(), Some(Value::from("--C")));
    }

    #[test]
    fn lower_priority_index_wins() {
        let mut slots = FieldSlots::default();
        slots.place(&Composition::Ranked { priority: 2 }, Value::from("second"));
        slots.place(&Composition::Ranked { priority: 1 }, Value::from("first"));
        assert_eq!(slots.resolve(), Some(Value::from("first")));
    }

    #[test]
    fn unranked_values_are_prepended() {
        let mut slots = FieldSlots::default();
        slots.place(&Composition::Unranked, Value::from("earlier"));
        slots.place(&Composition::Unranked, Value::from("later"));
        assert_eq!(slots.resolve(), Some(Value::from("later")));
    }

    #[test]
    fn prepends_shift_explicit_ranks() {
        let mut slots = FieldSlots::default();
        slots.place(&Composition::Ranked { priority: 0 }, Value::from("ranked"));
        slots.place(&Composition::Unranked, Value::from("prepended"));
        slots.place(&Composition::Ranked { priority: 1 }, Value::from("replaced"));
        assert_eq!(slots.ranked.len(), 2);
        assert_eq!(slots.resolve(), Some(Value::from("prepended")));
    }

    #[test]
    fn huge_priorities_stay_sparse() {
        let mut slots = FieldSlots::default();
        slots.place(&Composition::Ranked { priority: usize::MAX }, Value::from("last"));
        slots.place(&Composition::Ranked { priority: 4_000_000_000_000 }, Value::from("first"));
        assert_eq!(slots.ranked.len(), 2);
        assert_eq!(slots.resolve(), Some(Value::from("first")));
    }

    #[test]
    fn empty_ranked_slots_resolve_to_none() {
        assert_eq!(FieldSlots::default().resolve(), None);
    }
}
