//! Collector - fetches the catalog and brand tracking sheets
//!
//! Responsibilities:
//! - Download sheets as CSV from Google Sheets, or read local CSV/Excel files
//! - Decode Korean encodings and fingerprint every snapshot
//! - Cache snapshots with a TTL to avoid redundant downloads
//! - Fetch brand sheets in parallel, isolating failures per brand
//! - Hand the snapshots to the reconciler

pub mod cache;
pub mod collect;
pub mod config;
pub mod error;
pub mod files;
pub mod http;
pub mod source;

pub use cache::{SheetLoader, SheetRequest};
pub use collect::{collect_input, run_once};
pub use config::{BrandConfig, Settings, SheetConfig, SourceKind, SourcesConfig};
pub use error::SourceError;
pub use source::{SheetBackend, SheetSource};
