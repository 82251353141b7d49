//! Item selection: maximum-information adaptive choice, and the
//! authored-order static control mode.

use std::collections::HashSet;

use noesis_irt::{item_information, ItemParams};
use serde::{Deserialize, Serialize};

/// One selectable item from the question bank, reduced to what the
/// selector needs (stem/options/kc live in the repository layer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectableItem {
    pub id: String,
    pub params: ItemParams,
    pub bloom: u8,
    /// Authored display order, used only by the static control mode.
    pub order: u32,
}

/// Inputs to a single selection decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub target_theta: f64,
    pub exclude_ids: HashSet<String>,
    pub bloom_level: Option<u8>,
}

/// Assessment condition: determines the selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    Adaptive,
    Static,
}

fn eligible<'a>(
    bank: &'a [SelectableItem],
    criteria: &'a SelectionCriteria,
) -> impl Iterator<Item = &'a SelectableItem> {
    bank.iter().filter(move |item| {
        !criteria.exclude_ids.contains(&item.id)
            && criteria
                .bloom_level
                .map(|level| level == item.bloom)
                .unwrap_or(true)
    })
}

/// Selects the next item to serve given the bank and criteria, honouring
/// `condition`. Returns `None` when no eligible item remains.
pub fn select_next_question<'a>(
    bank: &'a [SelectableItem],
    criteria: &SelectionCriteria,
    condition: Condition,
) -> Option<&'a SelectableItem> {
    match condition {
        Condition::Adaptive => select_adaptive(bank, criteria),
        Condition::Static => select_static(bank, criteria),
    }
}

/// Maximises information at `criteria.target_theta`. Ties are broken by
/// the smallest `|b - target_theta|`, then lexicographically by id, so the
/// result is fully deterministic given the same bank and criteria.
fn select_adaptive<'a>(
    bank: &'a [SelectableItem],
    criteria: &SelectionCriteria,
) -> Option<&'a SelectableItem> {
    eligible(bank, criteria)
        .map(|item| {
            let info = item_information(criteria.target_theta, item.params).unwrap_or(f64::MIN);
            let distance = (item.params.b - criteria.target_theta).abs();
            (item, info, distance)
        })
        .max_by(|(a_item, a_info, a_dist), (b_item, b_info, b_dist)| {
            a_info
                .partial_cmp(b_info)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b_dist.partial_cmp(a_dist).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| b_item.id.cmp(&a_item.id))
        })
        .map(|(item, _, _)| item)
}

/// Ignores information entirely; returns the eligible item with the
/// smallest authored `order`.
fn select_static<'a>(
    bank: &'a [SelectableItem],
    criteria: &SelectionCriteria,
) -> Option<&'a SelectableItem> {
    eligible(bank, criteria).min_by_key(|item| item.order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, a: f64, b: f64, c: f64, bloom: u8, order: u32) -> SelectableItem {
        SelectableItem {
            id: id.to_string(),
            params: ItemParams::new(a, b, c),
            bloom,
            order,
        }
    }

    fn uk_geography_bank() -> Vec<SelectableItem> {
        vec![
            item("q-001", 1.20, -0.80, 0.25, 1, 1),
            item("q-002", 1.20, -1.50, 0.25, 1, 2),
            item("q-003", 1.20, -0.60, 0.25, 2, 3),
            item("q-004", 1.20, 0.20, 0.25, 2, 4),
            item("q-005", 1.20, 0.50, 0.25, 3, 5),
        ]
    }

    #[test]
    fn adaptive_first_pick_selects_highest_information_item() {
        let bank = uk_geography_bank();
        let criteria = SelectionCriteria {
            target_theta: -0.780,
            exclude_ids: HashSet::new(),
            bloom_level: None,
        };
        let picked = select_next_question(&bank, &criteria, Condition::Adaptive).unwrap();
        assert_eq!(picked.id, "q-002");
    }

    #[test]
    fn static_mode_ignores_information_and_uses_authored_order() {
        let bank = uk_geography_bank();
        let criteria = SelectionCriteria {
            target_theta: -0.780,
            exclude_ids: HashSet::new(),
            bloom_level: None,
        };
        let picked = select_next_question(&bank, &criteria, Condition::Static).unwrap();
        assert_eq!(picked.id, "q-001");
    }

    #[test]
    fn excluded_items_are_never_reselected() {
        let bank = uk_geography_bank();
        let mut exclude_ids = HashSet::new();
        exclude_ids.insert("q-002".to_string());
        let criteria = SelectionCriteria {
            target_theta: -0.780,
            exclude_ids,
            bloom_level: None,
        };
        let picked = select_next_question(&bank, &criteria, Condition::Adaptive).unwrap();
        assert_ne!(picked.id, "q-002");
    }

    #[test]
    fn bloom_filter_restricts_eligibility() {
        let bank = uk_geography_bank();
        let criteria = SelectionCriteria {
            target_theta: -0.780,
            exclude_ids: HashSet::new(),
            bloom_level: Some(3),
        };
        let picked = select_next_question(&bank, &criteria, Condition::Adaptive).unwrap();
        assert_eq!(picked.id, "q-005");
    }

    #[test]
    fn no_eligible_items_returns_none() {
        let bank = uk_geography_bank();
        let criteria = SelectionCriteria {
            target_theta: -0.780,
            exclude_ids: HashSet::new(),
            bloom_level: Some(9),
        };
        assert!(select_next_question(&bank, &criteria, Condition::Adaptive).is_none());
    }

    #[test]
    fn single_candidate_is_always_returned() {
        let bank = vec![item("only", 1.0, 0.0, 0.2, 1, 1)];
        let criteria = SelectionCriteria {
            target_theta: 1.5,
            exclude_ids: HashSet::new(),
            bloom_level: None,
        };
        let picked = select_next_question(&bank, &criteria, Condition::Adaptive).unwrap();
        assert_eq!(picked.id, "only");
    }
}
