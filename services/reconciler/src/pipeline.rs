//! One reconciliation run, end to end
//!
//! base snapshot -> normalize -> items ─┐
//! brand snapshots -> resolve -> facts ─┴> merge -> aggregate -> classify
//!
//! Pure and synchronous: fetching happens before, rendering after.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::aggregate::{aggregate, AggregatedItem};
use crate::columns::{missing_fields, normalize_sheet, Field};
use crate::items::{items_from_sheet, BASE_FIELDS};
use crate::merge::{merge, SupplementIndex};
use crate::status::{MilestoneCounts, Stage, StageCounts};
use crate::supplement::{resolve_all, BrandResolution, SupplementOutcome, SupplementSource};
use crate::table::Snapshot;

/// The base catalog snapshot.
#[derive(Debug, Clone)]
pub struct BaseSource {
    pub source: String,
    pub snapshot: Snapshot,
}

/// Everything one run consumes.
#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub base: BaseSource,
    pub supplements: Vec<SupplementSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    Loaded,
    Empty,
    Unavailable { reason: String },
}

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    /// `None` for the base catalog
    pub brand: Option<String>,
    #[serde(flatten)]
    pub status: SourceStatus,
    pub fingerprint: Option<String>,
    pub rows: usize,
    pub facts: usize,
    /// Base styles of this brand that found a fact; `None` for the base catalog
    pub matched_styles: Option<usize>,
    pub missing_fields: Vec<&'static str>,
}

/// Output of one run, handed to the consumer.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<AggregatedItem>,
    pub stage_counts: StageCounts,
    pub milestone_counts: MilestoneCounts,
    pub sources: Vec<SourceReport>,
}

impl RunReport {
    /// Items in the selected stage and brand; `None` selects everything.
    pub fn view(&self, stage: Option<Stage>, brand: Option<&str>) -> Vec<&AggregatedItem> {
        self.items
            .iter()
            .filter(|item| stage.map_or(true, |s| item.stage == s))
            .filter(|item| brand.map_or(true, |b| item.brand == b))
            .collect()
    }
}

fn field_names(fields: &[Field]) -> Vec<&'static str> {
    fields.iter().map(|f| f.as_str()).collect()
}

fn supplement_report(resolution: &BrandResolution, fingerprint: Option<&str>) -> SourceReport {
    let status = match &resolution.outcome {
        SupplementOutcome::Facts { .. } => SourceStatus::Loaded,
        SupplementOutcome::Empty => SourceStatus::Empty,
        SupplementOutcome::Failed { reason } => SourceStatus::Unavailable {
            reason: reason.clone(),
        },
    };
    SourceReport {
        source: resolution.source.clone(),
        brand: Some(resolution.brand.clone()),
        status,
        fingerprint: fingerprint.map(str::to_string),
        rows: resolution.rows,
        facts: resolution.outcome.facts().len(),
        matched_styles: Some(0),
        missing_fields: field_names(&resolution.missing),
    }
}

/// Run the reconciliation over one set of snapshots.
pub fn run(input: PipelineInput) -> RunReport {
    let run_id = Uuid::new_v4();
    let mut sources = Vec::with_capacity(input.supplements.len() + 1);

    // Base catalog
    let base_items = match &input.base.snapshot {
        Snapshot::Loaded { sheet, fingerprint } => {
            let sheet = normalize_sheet(sheet.clone());
            let missing = missing_fields(&sheet, BASE_FIELDS);
            if !missing.is_empty() {
                warn!(source = %input.base.source, missing = ?field_names(&missing), "base catalog missing fields, defaulting");
            }
            let items = items_from_sheet(&sheet);
            sources.push(SourceReport {
                source: input.base.source.clone(),
                brand: None,
                status: if items.is_empty() {
                    SourceStatus::Empty
                } else {
                    SourceStatus::Loaded
                },
                fingerprint: fingerprint.clone(),
                rows: sheet.len(),
                facts: 0,
                matched_styles: None,
                missing_fields: field_names(&missing),
            });
            items
        }
        Snapshot::Unavailable { reason } => {
            warn!(source = %input.base.source, %reason, "base catalog unavailable");
            sources.push(SourceReport {
                source: input.base.source.clone(),
                brand: None,
                status: SourceStatus::Unavailable {
                    reason: reason.clone(),
                },
                fingerprint: None,
                rows: 0,
                facts: 0,
                matched_styles: None,
                missing_fields: Vec::new(),
            });
            Vec::new()
        }
    };

    // Brand supplements
    let resolutions = resolve_all(&input.supplements);
    for (resolution, supplement) in resolutions.iter().zip(&input.supplements) {
        sources.push(supplement_report(resolution, supplement.snapshot.fingerprint()));
    }
    let index = SupplementIndex::new(
        resolutions
            .into_iter()
            .flat_map(|r| match r.outcome {
                SupplementOutcome::Facts { facts } => facts,
                _ => Vec::new(),
            }),
    );

    let merged = merge(base_items, &index);
    for report in sources.iter_mut() {
        let Some(brand) = report.brand.as_deref() else {
            continue;
        };
        let matched = merged.matched_styles(brand);
        report.matched_styles = Some(matched);
        if report.facts > 0 && matched == 0 {
            warn!(
                brand,
                source = %report.source,
                facts = report.facts,
                "no base style matched this brand's style codes"
            );
        }
    }

    let items = aggregate(&merged.items);
    let stage_counts = StageCounts::from_stages(items.iter().map(|i| i.stage));
    let milestone_counts = MilestoneCounts::from_milestones(items.iter().map(|i| &i.milestones));

    info!(
        %run_id,
        rows = merged.items.len(),
        styles = items.len(),
        supplement_facts = index.len(),
        "reconciliation run complete"
    );

    RunReport {
        run_id,
        generated_at: Utc::now(),
        items,
        stage_counts,
        milestone_counts,
        sources,
    }
}
