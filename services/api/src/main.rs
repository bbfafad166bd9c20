//! API Service - merchandise lifecycle status over HTTP
//!
//! Every request runs one reconciliation against the (TTL-cached) sheets, so
//! responses are at most one cache period stale.
//!
//! Endpoints:
//! - GET /health - Health check
//! - GET /items?stage=&brand=&limit= - Styles, optionally filtered
//! - GET /summary - Stage and milestone counts plus per-source status

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use collector::{run_once, Settings, SheetBackend, SheetLoader, SourcesConfig};
use reconciler::codes::{brand_code, BRAND_CODES};
use reconciler::pipeline::SourceReport;
use reconciler::status::MilestoneCounts;
use reconciler::{AggregatedItem, Stage};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ============================================================================
// State
// ============================================================================

struct AppState {
    loader: Arc<SheetLoader<SheetBackend>>,
    sources: SourcesConfig,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
    brands: usize,
}

#[derive(Serialize)]
struct ItemsResponse<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    stage: Option<Stage>,
    brand: Option<String>,
    total: usize,
    items: Vec<&'a AggregatedItem>,
}

#[derive(Serialize)]
struct StageSummary {
    stage: Stage,
    label: &'static str,
    count: usize,
}

#[derive(Serialize)]
struct SummaryResponse<'a> {
    run_id: Uuid,
    generated_at: DateTime<Utc>,
    total: usize,
    stages: Vec<StageSummary>,
    milestones: &'a MilestoneCounts,
    sources: &'a [SourceReport],
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn bad_request(error: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response()
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize, Default)]
struct ItemsQuery {
    stage: Option<String>,
    brand: Option<String>,
    limit: Option<usize>,
}

/// Brand filter as a brand name; two-letter codes are accepted too.
fn resolve_brand(raw: &str) -> String {
    let raw = raw.trim();
    if brand_code(raw).is_some() {
        return raw.to_string();
    }
    let code = raw.to_ascii_lowercase();
    BRAND_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| raw.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        brands: state.sources.active_brands().count(),
    })
}

async fn items_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ItemsQuery>,
) -> Response {
    let stage = match params.stage.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match raw.parse::<Stage>() {
            Ok(stage) => Some(stage),
            Err(e) => return bad_request(e),
        },
        None => None,
    };
    let brand = params
        .brand
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .map(resolve_brand);

    let report = run_once(Arc::clone(&state.loader), &state.sources).await;
    let mut items = report.view(stage, brand.as_deref());
    let total = items.len();
    if let Some(limit) = params.limit {
        items.truncate(limit);
    }

    Json(ItemsResponse {
        run_id: report.run_id,
        generated_at: report.generated_at,
        stage,
        brand,
        total,
        items,
    })
    .into_response()
}

async fn summary_handler(State(state): State<Arc<AppState>>) -> Response {
    let report = run_once(Arc::clone(&state.loader), &state.sources).await;
    let stages = Stage::ALL
        .iter()
        .map(|&stage| StageSummary {
            stage,
            label: stage.label(),
            count: report.stage_counts.get(stage),
        })
        .collect();

    Json(SummaryResponse {
        run_id: report.run_id,
        generated_at: report.generated_at,
        total: report.stage_counts.total(),
        stages,
        milestones: &report.milestone_counts,
        sources: &report.sources,
    })
    .into_response()
}

fn router(state: Arc<AppState>) -> Router {
    // CORS for the dashboard frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/items", get(items_handler))
        .route("/summary", get(summary_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("api=info,collector=info,reconciler=info,tower_http=info")),
        )
        .init();

    let bind = std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let settings = Settings::from_env()?;
    let sources = match std::env::var("SOURCES_CONFIG") {
        Ok(path) => SourcesConfig::load(Path::new(&path)).await?,
        Err(_) => SourcesConfig::from_env()?,
    };

    info!(
        source_kind = ?settings.source_kind,
        cache_ttl_secs = settings.cache_ttl.as_secs(),
        brands = sources.active_brands().count(),
        "sources configured"
    );

    let loader = Arc::new(SheetLoader::new(settings.backend()?, settings.cache_ttl));
    let state = Arc::new(AppState { loader, sources });
    let app = router(state);

    info!("API listening on http://{}", bind);
    println!("\nEndpoints:");
    println!("  GET /health");
    println!("  GET /items?stage=&brand=&limit=");
    println!("  GET /summary");

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use collector::files::FileSheetSource;
    use collector::{BrandConfig, SheetConfig};
    use reconciler::HeaderRow;
    use std::time::Duration;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    fn state(dir: &Path) -> Arc<AppState> {
        write(
            dir,
            "base.csv",
            "스타일코드,상품명,입고수량,출고수량,판매수량\n\
             SP00001G1,와이드 데님,10,5,0\n\
             SP00002G1,셔츠,0,0,0\n\
             CV0000F2,니트,3,2,1\n",
        );
        write(dir, "sp.csv", "품번,리터칭완료\nSP00001G1,2026. 3. 14.\n");

        let sources = SourcesConfig {
            base: SheetConfig {
                spreadsheet_id: "base.csv".to_string(),
                sheet: None,
                header_row: HeaderRow::Auto,
            },
            brands: vec![BrandConfig {
                code: "sp".to_string(),
                spreadsheet_id: Some("sp.csv".to_string()),
                sheet: None,
                header_row: HeaderRow::Auto,
                shot_column: None,
                register_column: None,
            }],
        };
        let backend = SheetBackend::Files(FileSheetSource::new(dir));
        Arc::new(AppState {
            loader: Arc::new(SheetLoader::new(backend, Duration::from_secs(60))),
            sources,
        })
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_resolve_brand_accepts_codes() {
        assert_eq!(resolve_brand("SP"), "스파오");
        assert_eq!(resolve_brand(" 클라비스 "), "클라비스");
        assert_eq!(resolve_brand("unknown"), "unknown");
    }

    #[tokio::test]
    async fn test_items_filtered_by_stage() {
        let dir = tempfile::tempdir().unwrap();
        let query = ItemsQuery {
            stage: Some("미등록".to_string()),
            ..Default::default()
        };
        let response = items_handler(State(state(dir.path())), Query(query)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["stage"], "NOT_REGISTERED");
        assert_eq!(body["total"], 1);
        assert_eq!(body["items"][0]["style_code"], "SP00001G1");
        assert_eq!(body["items"][0]["brand"], "스파오");
    }

    #[tokio::test]
    async fn test_items_brand_code_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let query = ItemsQuery {
            brand: Some("sp".to_string()),
            limit: Some(1),
            ..Default::default()
        };
        let body = body_json(items_handler(State(state(dir.path())), Query(query)).await).await;
        assert_eq!(body["brand"], "스파오");
        assert_eq!(body["total"], 2);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_items_rejects_unknown_stage() {
        let dir = tempfile::tempdir().unwrap();
        let query = ItemsQuery {
            stage: Some("SHIPPED_TWICE".to_string()),
            ..Default::default()
        };
        let response = items_handler(State(state(dir.path())), Query(query)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("SHIPPED_TWICE"));
    }

    #[tokio::test]
    async fn test_summary_counts_and_sources() {
        let dir = tempfile::tempdir().unwrap();
        let body = body_json(summary_handler(State(state(dir.path()))).await).await;
        assert_eq!(body["total"], 3);

        let stages = body["stages"].as_array().unwrap();
        let count = |code: &str| {
            stages
                .iter()
                .find(|s| s["stage"] == code)
                .map(|s| s["count"].as_u64().unwrap())
                .unwrap()
        };
        assert_eq!(count("NOT_RECEIVED"), 1);
        assert_eq!(count("NOT_REGISTERED"), 1);
        assert_eq!(count("NOT_PHOTOGRAPHED"), 1);
        assert_eq!(count("ON_SALE"), 0);
        assert_eq!(body["milestones"]["photographed"], 1);
        assert_eq!(body["sources"].as_array().unwrap().len(), 2);
        assert_eq!(body["sources"][1]["status"], "loaded");
        assert_eq!(body["sources"][1]["matched_styles"], 1);
        assert!(body["sources"][0]["matched_styles"].is_null());
    }
}
