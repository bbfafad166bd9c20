//! One collection pass
//!
//! Loads the base catalog and every configured brand sheet, brand sheets in
//! parallel, and hands the snapshots to the reconciler. A brand that fails
//! to load is reported unavailable; it never blocks the others.

use std::sync::Arc;

use reconciler::{BaseSource, PipelineInput, RunReport, Snapshot, SupplementSource};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::cache::SheetLoader;
use crate::config::{BrandConfig, SourcesConfig};
use crate::source::SheetSource;

fn supplement(brand: &BrandConfig, source: String, snapshot: Snapshot) -> SupplementSource {
    SupplementSource {
        brand: brand.brand(),
        source,
        shot_column: brand.shot_column.clone(),
        register_column: brand.register_column.clone(),
        snapshot,
    }
}

/// Fetch every snapshot one run needs. Supplements keep config order.
pub async fn collect_input<S: SheetSource>(
    loader: Arc<SheetLoader<S>>,
    config: &SourcesConfig,
) -> PipelineInput {
    let mut tasks = JoinSet::new();
    let mut pending = Vec::new();

    for brand in &config.brands {
        let Some(request) = brand.request() else {
            info!(code = %brand.code, "no spreadsheet configured, brand skipped");
            continue;
        };
        let position = pending.len();
        pending.push((brand.clone(), request.source_id.clone(), None));

        let loader = Arc::clone(&loader);
        tasks.spawn(async move { (position, loader.load(&request).await) });
    }

    let base_request = config.base.request();
    let base = BaseSource {
        source: base_request.source_id.clone(),
        snapshot: loader.load(&base_request).await,
    };

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((position, snapshot)) => pending[position].2 = Some(snapshot),
            Err(err) => warn!(error = %err, "brand fetch task failed"),
        }
    }

    let supplements = pending
        .into_iter()
        .map(|(brand, source, snapshot)| {
            let snapshot =
                snapshot.unwrap_or_else(|| Snapshot::unavailable("brand fetch task failed"));
            supplement(&brand, source, snapshot)
        })
        .collect();

    PipelineInput { base, supplements }
}

/// Collect, then reconcile.
pub async fn run_once<S: SheetSource>(
    loader: Arc<SheetLoader<S>>,
    config: &SourcesConfig,
) -> RunReport {
    let input = collect_input(loader, config).await;
    let report = reconciler::run(input);
    info!(
        run_id = %report.run_id,
        items = report.items.len(),
        sources = report.sources.len(),
        "run complete"
    );
    report
}
