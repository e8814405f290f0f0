use crate::config::AppConfig;
use crate::processing::{self, FilterState};
use crate::types::{FocusArea, FundedStatus, TagCategory, TagValue};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geojson::FeatureCollection;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

pub struct AppState {
    pub features: FeatureCollection,
}

#[derive(Deserialize)]
pub struct FeatureQuery {
    /// Comma-separated focus-area values; absent means all enabled.
    focus_area: Option<String>,
    /// Comma-separated funded-status values; absent means all enabled.
    funded_status: Option<String>,
}

/// Serves the bundled artifact plus a JSON API over the filtered feature
/// collection, for previewing the widget before embedding it.
pub async fn start_server(config: AppConfig, features: FeatureCollection) -> Result<()> {
    let state = Arc::new(AppState { features });

    let port = config.server.port;
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("Starting preview server on http://{}", addr);

    let dist_dir = config
        .bundle
        .output
        .parent()
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let app = Router::new()
        .route("/api/features", get(features_handler))
        .nest_service("/dist", ServeDir::new(dist_dir))
        .nest_service("/", ServeDir::new("."))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn features_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FeatureQuery>,
) -> Json<FeatureCollection> {
    let filter = filter_from_query(&params);
    Json(processing::visible_features(&state.features, &filter))
}

/// Builds a filter state from the query string. A present parameter replaces
/// its category's enabled set; unknown values are logged and ignored.
fn filter_from_query(params: &FeatureQuery) -> FilterState {
    let mut filter = FilterState::all_enabled();

    if let Some(raw) = params.focus_area.as_deref() {
        filter.clear(TagCategory::FocusArea);
        for token in tokens(raw) {
            match FocusArea::parse(token) {
                Some(area) => filter.set_enabled(TagValue::FocusArea(area), true),
                None => tracing::warn!("ignoring unknown focus area '{}' in query", token),
            }
        }
    }
    if let Some(raw) = params.funded_status.as_deref() {
        filter.clear(TagCategory::FundedStatus);
        for token in tokens(raw) {
            match FundedStatus::parse(token) {
                Some(status) => filter.set_enabled(TagValue::FundedStatus(status), true),
                None => tracing::warn!("ignoring unknown funded status '{}' in query", token),
            }
        }
    }

    filter
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|token| !token.is_empty())
}
