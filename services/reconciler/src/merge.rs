//! Merge engine: brand-scoped left join of base items against supplement facts

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use crate::items::NormalizedItem;
use crate::supplement::SupplementFact;

/// Supplement facts indexed by `(brand, canonical key)`.
#[derive(Debug, Clone, Default)]
pub struct SupplementIndex {
    facts: HashMap<(String, String), SupplementFact>,
}

impl SupplementIndex {
    /// Index facts; duplicates for the same brand and key are OR-ed together.
    pub fn new(facts: impl IntoIterator<Item = SupplementFact>) -> Self {
        let mut index: HashMap<(String, String), SupplementFact> = HashMap::new();
        for fact in facts {
            index
                .entry((fact.brand.clone(), fact.key.clone()))
                .and_modify(|existing| {
                    existing.shot_done |= fact.shot_done;
                    existing.registered_done |= fact.registered_done;
                })
                .or_insert(fact);
        }
        Self { facts: index }
    }

    pub fn get(&self, brand: &str, key: &str) -> Option<&SupplementFact> {
        self.facts.get(&(brand.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

/// Merged base rows plus how many distinct styles each brand's facts matched.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub items: Vec<NormalizedItem>,
    matched: BTreeMap<String, usize>,
}

impl Merged {
    /// Distinct base styles of `brand` that found a fact.
    pub fn matched_styles(&self, brand: &str) -> usize {
        self.matched.get(brand).copied().unwrap_or(0)
    }
}

/// Attach done-signals to each base item from the fact with the same brand and
/// canonical key. Row count and order are preserved; unmatched items get no
/// evidence and unmatched facts are dropped.
pub fn merge(base: Vec<NormalizedItem>, index: &SupplementIndex) -> Merged {
    let mut matched_keys: HashSet<(String, String)> = HashSet::new();

    let items: Vec<NormalizedItem> = base
        .into_iter()
        .map(|mut item| {
            let key = item.key();
            match index.get(&item.brand, &key) {
                Some(fact) => {
                    item.shot_done = fact.shot_done;
                    item.registered_done = fact.registered_done;
                    matched_keys.insert((item.brand.clone(), key));
                }
                None => {
                    item.shot_done = false;
                    item.registered_done = false;
                }
            }
            item
        })
        .collect();

    let mut matched: BTreeMap<String, usize> = BTreeMap::new();
    for (brand, _) in &matched_keys {
        *matched.entry(brand.clone()).or_default() += 1;
    }

    debug!(
        rows = items.len(),
        facts = index.len(),
        matched_styles = matched_keys.len(),
        "supplement facts merged"
    );
    Merged { items, matched }
}
