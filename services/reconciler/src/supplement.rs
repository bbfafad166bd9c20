//! Per-brand supplement resolver
//!
//! Each brand keeps its own tracking sheet with photography/retouch and
//! registration dates. A sheet is reduced to one `SupplementFact` per
//! canonical style key; a sheet that cannot be read contributes nothing and
//! never affects other brands.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::codes::{canonical_key, style_code_from_item_code};
use crate::columns::{missing_fields, normalize_sheet, Field};
use crate::signals::{
    column_for_done_signal, column_for_registration, done_series_for_column, REGISTRATION_DONE,
    RETOUCH_DONE,
};
use crate::table::{Sheet, Snapshot};

/// Done-signals of one style within one brand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplementFact {
    pub brand: String,
    pub key: String,
    pub shot_done: bool,
    pub registered_done: bool,
}

/// A brand's tracking sheet as fetched for this run.
#[derive(Debug, Clone)]
pub struct SupplementSource {
    /// Brand name the facts belong to
    pub brand: String,
    /// Source identifier, for reporting
    pub source: String,
    /// Explicit retouch/shot column name override
    pub shot_column: Option<String>,
    /// Explicit registration column name override
    pub register_column: Option<String>,
    pub snapshot: Snapshot,
}

/// Result of resolving one brand sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SupplementOutcome {
    Facts { facts: Vec<SupplementFact> },
    Empty,
    Failed { reason: String },
}

impl SupplementOutcome {
    pub fn facts(&self) -> &[SupplementFact] {
        match self {
            SupplementOutcome::Facts { facts } => facts,
            _ => &[],
        }
    }
}

/// Outcome plus what was observed about the sheet.
#[derive(Debug, Clone)]
pub struct BrandResolution {
    pub brand: String,
    pub source: String,
    pub rows: usize,
    pub missing: Vec<Field>,
    pub outcome: SupplementOutcome,
}

fn style_keys(sheet: &Sheet) -> Option<Vec<String>> {
    if let Some(index) = sheet.column(Field::StyleCode.as_str()) {
        return Some(sheet.column_values(index).into_iter().map(canonical_key).collect());
    }
    let index = sheet.column(Field::ItemCode.as_str())?;
    Some(
        sheet
            .column_values(index)
            .into_iter()
            .map(|code| canonical_key(&style_code_from_item_code(code)))
            .collect(),
    )
}

/// Reduce a normalized brand sheet to one fact per canonical key (logical OR).
pub fn facts_from_sheet(
    brand: &str,
    sheet: &Sheet,
    shot_column: Option<&str>,
    register_column: Option<&str>,
) -> Option<Vec<SupplementFact>> {
    let keys = style_keys(sheet)?;
    let shot_col = column_for_done_signal(sheet.headers(), shot_column);
    let reg_col = column_for_registration(sheet.headers(), register_column);
    debug!(
        brand,
        shot_column = ?shot_col.map(|i| &sheet.headers()[i]),
        register_column = ?reg_col.map(|i| &sheet.headers()[i]),
        "signal columns selected"
    );

    let shot = done_series_for_column(sheet, shot_col, &RETOUCH_DONE);
    let registered = done_series_for_column(sheet, reg_col, &REGISTRATION_DONE);

    // BTreeMap keeps the output order deterministic
    let mut grouped: BTreeMap<String, (bool, bool)> = BTreeMap::new();
    for ((key, shot), registered) in keys.into_iter().zip(shot).zip(registered) {
        if key.is_empty() {
            continue;
        }
        let entry = grouped.entry(key).or_default();
        entry.0 |= shot;
        entry.1 |= registered;
    }

    Some(
        grouped
            .into_iter()
            .map(|(key, (shot_done, registered_done))| SupplementFact {
                brand: brand.to_string(),
                key,
                shot_done,
                registered_done,
            })
            .collect(),
    )
}

/// Resolve one brand's snapshot. Never fails; problems become the outcome.
pub fn resolve_brand(source: &SupplementSource) -> BrandResolution {
    let mut resolution = BrandResolution {
        brand: source.brand.clone(),
        source: source.source.clone(),
        rows: 0,
        missing: Vec::new(),
        outcome: SupplementOutcome::Empty,
    };

    let sheet = match &source.snapshot {
        Snapshot::Unavailable { reason } => {
            warn!(brand = %source.brand, source = %source.source, %reason, "supplement source unavailable");
            resolution.outcome = SupplementOutcome::Failed {
                reason: reason.clone(),
            };
            return resolution;
        }
        Snapshot::Loaded { sheet, .. } => normalize_sheet(sheet.clone()),
    };
    resolution.rows = sheet.len();

    if sheet.is_empty() {
        debug!(brand = %source.brand, "supplement sheet has no rows");
        return resolution;
    }

    let Some(facts) = facts_from_sheet(
        &source.brand,
        &sheet,
        source.shot_column.as_deref(),
        source.register_column.as_deref(),
    ) else {
        resolution.missing = missing_fields(&sheet, &[Field::StyleCode]);
        warn!(brand = %source.brand, source = %source.source, "supplement sheet has no style code column");
        return resolution;
    };

    debug!(brand = %source.brand, rows = resolution.rows, facts = facts.len(), "supplement resolved");
    if !facts.is_empty() {
        resolution.outcome = SupplementOutcome::Facts { facts };
    }
    resolution
}

/// Resolve every brand independently.
pub fn resolve_all(sources: &[SupplementSource]) -> Vec<BrandResolution> {
    sources.iter().map(resolve_brand).collect()
}
