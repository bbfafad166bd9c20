//! Reconciler - merchandise lifecycle status from heterogeneous sheets
//!
//! Responsibilities:
//! - Normalize localized column headers to one schema
//! - Derive brand, year and season from positional style codes
//! - Read "done" signals out of hand-typed date cells
//! - Reduce each brand's tracking sheet to one fact per style
//! - Left-join facts onto the base catalog, scoped by brand
//! - Collapse size/color rows into styles and classify each one
//!
//! Everything here is synchronous and deterministic. Fetching sheets and
//! rendering results live in other services.

pub mod aggregate;
pub mod codes;
pub mod columns;
pub mod items;
pub mod merge;
pub mod pipeline;
pub mod signals;
pub mod status;
pub mod supplement;
pub mod table;

pub use aggregate::{aggregate, reaggregate, AggregatedItem};
pub use codes::{brand_from_code, canonical_key, year_from_code, year_season_from_code};
pub use items::NormalizedItem;
pub use merge::{merge, Merged, SupplementIndex};
pub use pipeline::{run, BaseSource, PipelineInput, RunReport, SourceReport, SourceStatus};
pub use signals::{cell_looks_done, column_for_done_signal};
pub use status::{Milestones, Stage};
pub use supplement::{SupplementFact, SupplementSource};
pub use table::{HeaderRow, Sheet, Snapshot};
