//! Handlers HTTP : une action utilisateur par route

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::WebError;
use crate::filter::ClassFilter;
use crate::pipeline::AppContext;
use crate::present::render_message;
use crate::report::{ErrorLevel, LoadReport, LoadStatus};
use crate::store::LoadRecord;

type Result<T> = std::result::Result<T, WebError>;

#[derive(Debug, Default, Deserialize)]
pub struct MapParams {
    pub class: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ExportParams {
    pub class: Option<String>,
    /// Inclure la colonne WKT (défaut : oui)
    #[serde(default = "default_true")]
    pub geometry: bool,
}

fn default_true() -> bool {
    true
}

fn parse_filter(class: Option<&str>) -> ClassFilter {
    ClassFilter::parse(class.unwrap_or(""))
}

/// GET / et GET /map?class=
pub async fn map(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<MapParams>,
) -> Result<Html<String>> {
    let filter = parse_filter(params.class.as_deref());
    debug!(filter = %filter, "Map requested");
    let rendered = ctx.visualize(&filter).await?;
    Ok(Html(rendered.html.clone()))
}

/// POST /load
///
/// Réponse JSON si le client l'accepte, page de résumé sinon. Un chargement
/// refusé (aucune parcelle valide) répond 422.
pub async fn load(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> Result<Response> {
    info!("Load requested");
    let report = ctx.load().await?;

    let wants_json = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    let (status, title, message) = load_outcome(&report);
    if status != StatusCode::OK {
        warn!(source = %report.source, status = status.as_u16(), "Load rejected");
    }

    if wants_json {
        Ok((status, Json(report)).into_response())
    } else {
        Ok((status, Html(render_message(title, &message))).into_response())
    }
}

/// Statut HTTP, titre et message de la page de résultat d'un chargement
fn load_outcome(report: &LoadReport) -> (StatusCode, &'static str, String) {
    match report.status {
        LoadStatus::Success => (
            StatusCode::OK,
            "Load complete",
            format!(
                "Data loaded into PostGIS: {} ({:.2} s)",
                report.summary(),
                report.duration_secs
            ),
        ),
        LoadStatus::PartialSuccess => (
            StatusCode::OK,
            "Load complete with skipped parcels",
            format!(
                "Data loaded into PostGIS with {} invalid parcels skipped: {} ({:.2} s)",
                report.parcels_skipped,
                report.summary(),
                report.duration_secs
            ),
        ),
        LoadStatus::Failed => {
            let reason = report
                .errors
                .iter()
                .rev()
                .find(|e| e.level == ErrorLevel::Fatal)
                .or_else(|| report.errors.last())
                .map(|e| e.message.as_str())
                .unwrap_or("no parcel loaded");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Load failed",
                format!(
                    "Load failed, table left unchanged: {} ({} of {} parcels invalid)",
                    reason, report.parcels_skipped, report.parcels_read
                ),
            )
        }
    }
}

/// POST /cache/clear
pub async fn clear_cache(State(ctx): State<Arc<AppContext>>) -> Redirect {
    let cleared = ctx.clear_cache();
    info!(entries = cleared, "Cache cleared on request");
    Redirect::to("/")
}

/// GET /export.csv?class=&geometry=
pub async fn export_csv(
    State(ctx): State<Arc<AppContext>>,
    Query(params): Query<ExportParams>,
) -> Result<Response> {
    let filter = parse_filter(params.class.as_deref());
    let csv = ctx.export_csv(&filter, params.geometry).await?;

    let disposition = format!(
        "attachment; filename=\"{}_{}.csv\"",
        ctx.config().store.table,
        filename_part(&filter.to_string())
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

/// Partie de nom de fichier sans caractère spécial
fn filename_part(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '-' })
        .collect()
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
    pub cached_maps: usize,
    pub last_load: Option<LoadRecord>,
}

/// GET /health
pub async fn health(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let database_up = ctx.store().ping().await.is_ok();
    let last_load = if database_up {
        ctx.last_load().await.ok().flatten()
    } else {
        None
    };

    let status = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: if database_up { "ok" } else { "degraded" },
            database: if database_up { "up" } else { "down" },
            version: env!("CARGO_PKG_VERSION"),
            cached_maps: ctx.cache().len(),
            last_load,
        }),
    )
}
