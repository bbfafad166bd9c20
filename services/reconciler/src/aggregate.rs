//! Aggregator: collapse size/color rows into one logical style

use serde::Serialize;
use std::collections::BTreeMap;

use crate::codes::canonical_key;
use crate::items::NormalizedItem;
use crate::status::{derive_milestones, derive_stage, Milestones, Stage, StageFacts};

/// Distinct color names kept per style.
pub const MAX_COLOR_NAMES: usize = 5;

/// One style within one brand and year-season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedItem {
    pub brand: String,
    pub year_season: String,
    /// Canonical style key
    pub style_code: String,
    pub product_name: String,
    pub color_names: Vec<String>,
    pub inbound_qty: u64,
    pub outbound_qty: u64,
    pub stock_qty: u64,
    pub sales_qty: u64,
    pub is_shot: bool,
    pub is_registered: bool,
    pub is_on_sale: bool,
    pub shot_done: bool,
    pub registered_done: bool,
    /// Physical rows folded into this item
    pub rows: usize,
    pub stage: Stage,
    pub milestones: Milestones,
}

impl AggregatedItem {
    fn start(brand: String, year_season: String, style_code: String) -> Self {
        Self {
            brand,
            year_season,
            style_code,
            product_name: String::new(),
            color_names: Vec::new(),
            inbound_qty: 0,
            outbound_qty: 0,
            stock_qty: 0,
            sales_qty: 0,
            is_shot: false,
            is_registered: false,
            is_on_sale: false,
            shot_done: false,
            registered_done: false,
            rows: 0,
            stage: Stage::NotReceived,
            milestones: Milestones::default(),
        }
    }

    fn absorb(&mut self, item: &NormalizedItem) {
        self.rows += 1;
        self.inbound_qty = self.inbound_qty.saturating_add(item.inbound_qty);
        self.outbound_qty = self.outbound_qty.saturating_add(item.outbound_qty);
        self.stock_qty = self.stock_qty.saturating_add(item.stock_qty);
        self.sales_qty = self.sales_qty.saturating_add(item.sales_qty);
        self.is_shot |= item.is_shot;
        self.is_registered |= item.is_registered;
        self.is_on_sale |= item.is_on_sale;
        self.shot_done |= item.shot_done;
        self.registered_done |= item.registered_done;

        self.take_product_name(&item.product_name);
        self.add_color(&item.color_name);
    }

    /// Fold another aggregate of the same group into this one.
    fn absorb_aggregated(&mut self, other: &AggregatedItem) {
        self.rows += other.rows;
        self.inbound_qty = self.inbound_qty.saturating_add(other.inbound_qty);
        self.outbound_qty = self.outbound_qty.saturating_add(other.outbound_qty);
        self.stock_qty = self.stock_qty.saturating_add(other.stock_qty);
        self.sales_qty = self.sales_qty.saturating_add(other.sales_qty);
        self.is_shot |= other.is_shot;
        self.is_registered |= other.is_registered;
        self.is_on_sale |= other.is_on_sale;
        self.shot_done |= other.shot_done;
        self.registered_done |= other.registered_done;

        self.take_product_name(&other.product_name);
        for color in &other.color_names {
            self.add_color(color);
        }
    }

    fn take_product_name(&mut self, name: &str) {
        if self.product_name.is_empty() {
            self.product_name = name.trim().to_string();
        }
    }

    fn add_color(&mut self, color: &str) {
        let color = color.trim();
        if !color.is_empty()
            && self.color_names.len() < MAX_COLOR_NAMES
            && !self.color_names.iter().any(|c| c == color)
        {
            self.color_names.push(color.to_string());
        }
    }

    pub fn stage_facts(&self) -> StageFacts {
        StageFacts {
            inbound_qty: self.inbound_qty,
            outbound_qty: self.outbound_qty,
            sales_qty: self.sales_qty,
            photographed: self.shot_done || self.is_shot,
            registered: self.registered_done || self.is_registered,
            on_sale: self.is_on_sale,
        }
    }

    fn classify(&mut self) {
        let facts = self.stage_facts();
        self.stage = derive_stage(&facts);
        self.milestones = derive_milestones(&facts);
    }

    /// Color names joined for display.
    pub fn color_display(&self) -> String {
        self.color_names.join(", ")
    }
}

type GroupKey = (String, String, String);

fn group_key(brand: &str, year_season: &str, style_code: &str) -> Option<GroupKey> {
    let key = canonical_key(style_code);
    if key.is_empty() {
        return None;
    }
    Some((brand.to_string(), year_season.trim().to_string(), key))
}

fn start_group((brand, year_season, style): &GroupKey) -> AggregatedItem {
    AggregatedItem::start(brand.clone(), year_season.clone(), style.clone())
}

fn finish(groups: BTreeMap<GroupKey, AggregatedItem>) -> Vec<AggregatedItem> {
    groups
        .into_values()
        .map(|mut agg| {
            agg.classify();
            agg
        })
        .collect()
}

/// Group by `(brand, year_season, canonical style key)`, sum quantities,
/// OR flags, then classify. Output is sorted by the group key.
pub fn aggregate(items: &[NormalizedItem]) -> Vec<AggregatedItem> {
    let mut groups: BTreeMap<GroupKey, AggregatedItem> = BTreeMap::new();
    for item in items {
        let Some(key) = group_key(&item.brand, &item.year_season, &item.style_code) else {
            continue;
        };
        groups
            .entry(key)
            .or_insert_with_key(start_group)
            .absorb(item);
    }
    finish(groups)
}

/// Aggregate already-aggregated items again, e.g. when combining results.
/// Applied to the output of `aggregate` it changes nothing.
pub fn reaggregate(items: &[AggregatedItem]) -> Vec<AggregatedItem> {
    let mut groups: BTreeMap<GroupKey, AggregatedItem> = BTreeMap::new();
    for item in items {
        let Some(key) = group_key(&item.brand, &item.year_season, &item.style_code) else {
            continue;
        };
        groups
            .entry(key)
            .or_insert_with_key(start_group)
            .absorb_aggregated(item);
    }
    finish(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(style: &str, color: &str, inbound: u64, outbound: u64) -> NormalizedItem {
        NormalizedItem {
            brand: "스파오".to_string(),
            style_code: style.to_string(),
            year_season: "20261".to_string(),
            color_name: color.to_string(),
            inbound_qty: inbound,
            outbound_qty: outbound,
            ..Default::default()
        }
    }

    fn summary(items: &[AggregatedItem]) -> Vec<(String, u64, u64, bool, bool)> {
        items
            .iter()
            .map(|a| (a.style_code.clone(), a.inbound_qty, a.outbound_qty, a.shot_done, a.registered_done))
            .collect()
    }

    #[test]
    fn test_rows_collapse_per_style() {
        let mut shot = row("SP00001G1", "BLUE", 4, 1);
        shot.shot_done = true;
        let items = vec![
            row("SP00001G1", "BLACK", 6, 4),
            shot,
            row("SP00002G1", "BLACK", 1, 0),
        ];
        let agg = aggregate(&items);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg[0].style_code, "SP00001G1");
        assert_eq!(agg[0].inbound_qty, 10);
        assert_eq!(agg[0].outbound_qty, 5);
        assert!(agg[0].shot_done);
        assert_eq!(agg[0].rows, 2);
        assert_eq!(agg[0].color_names, vec!["BLACK", "BLUE"]);
        assert_eq!(agg[0].stage, Stage::NotRegistered);
        assert_eq!(agg[1].stage, Stage::NotShipped);
    }

    #[test]
    fn test_year_season_separates_groups() {
        let mut other = row("SP00001G1", "BLACK", 1, 1);
        other.year_season = "20262".to_string();
        let agg = aggregate(&[row("SP00001G1", "BLACK", 1, 1), other]);
        assert_eq!(agg.len(), 2);
    }

    #[test]
    fn test_colors_deduplicated_and_capped() {
        let colors = ["BK", "WH", "BK", "NV", "", "GR", "RD", "YL"];
        let items: Vec<NormalizedItem> = colors.iter().map(|c| row("SP00001G1", c, 1, 1)).collect();
        let agg = aggregate(&items);
        assert_eq!(agg[0].color_names, vec!["BK", "WH", "NV", "GR", "RD"]);
        assert_eq!(agg[0].color_display(), "BK, WH, NV, GR, RD");
    }

    #[test]
    fn test_first_non_empty_product_name() {
        let mut a = row("SP00001G1", "BK", 1, 1);
        let mut b = row("SP00001G1", "WH", 1, 1);
        b.product_name = "와이드 데님".to_string();
        a.product_name = "  ".to_string();
        let agg = aggregate(&[a, b]);
        assert_eq!(agg[0].product_name, "와이드 데님");
    }

    #[test]
    fn test_order_independent() {
        let mut items = vec![
            row("SP00001G1", "BK", 3, 1),
            row("SP00002G1", "BK", 2, 2),
            row("sp00001g1 ", "WH", 5, 0),
            row("SP00003G1", "BK", 0, 0),
        ];
        items[1].registered_done = true;
        items[2].shot_done = true;
        let forward = aggregate(&items);
        items.reverse();
        let backward = aggregate(&items);
        items.rotate_left(1);
        let rotated = aggregate(&items);
        assert_eq!(summary(&forward), summary(&backward));
        assert_eq!(summary(&forward), summary(&rotated));
    }

    #[test]
    fn test_reaggregation_is_a_no_op() {
        let mut shot = row("SP00002G1", "BLUE", 4, 1);
        shot.shot_done = true;
        shot.product_name = "셔츠".to_string();
        let items = vec![
            row("SP00001G1", "BLACK", 6, 4),
            shot,
            row("SP00001G1", "WH", 1, 1),
        ];
        let once = aggregate(&items);
        let twice = reaggregate(&once);
        assert_eq!(once, twice);
        assert_eq!(twice[0].color_names, vec!["BLACK", "WH"]);
        assert_eq!(twice[0].rows, 2);
    }

    #[test]
    fn test_reaggregate_combines_partial_results() {
        let first = aggregate(&[row("SP00001G1", "BK", 2, 1), row("SP00001G1", "WH", 1, 0)]);
        let mut shot = row("SP00001G1", "NV", 3, 3);
        shot.shot_done = true;
        let second = aggregate(&[shot, row("SP00001G1", "BK", 1, 1)]);

        let combined = reaggregate(&[first, second].concat());
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].rows, 4);
        assert_eq!(combined[0].inbound_qty, 7);
        assert_eq!(combined[0].outbound_qty, 5);
        assert_eq!(combined[0].color_names, vec!["BK", "WH", "NV"]);
        assert!(combined[0].shot_done);
        assert_eq!(combined[0].stage, Stage::NotRegistered);
    }

    #[test]
    fn test_empty_keys_skipped() {
        assert!(aggregate(&[row("  ", "BK", 1, 1)]).is_empty());
    }
}
