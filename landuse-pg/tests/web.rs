//! Routes HTTP sans base de données
//!
//! Le pool pointe vers un port fermé : il est créé sans se connecter, et toute
//! route qui interroge la base répond 503.

use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, Request, StatusCode};
use geo::{polygon, MultiPolygon};
use landuse_pg::config::{AppConfig, MapConfig, SourceConfig, StoreConfig};
use landuse_pg::present::render_map;
use landuse_pg::web::build_router;
use landuse_pg::{create_pool, AppContext, ClassFilter, DatabaseConfig, StoredParcel};
use serde_json::Value;
use tower::ServiceExt;

mod common;

use common::{fixture_dir, write_points};

fn offline_context(shapefile: &Path, skip_invalid: bool) -> Arc<AppContext> {
    let config = AppConfig {
        source: SourceConfig {
            path: shapefile.to_path_buf(),
            class_field: "fclass".into(),
            name_field: Some("name".into()),
            source_srid: None,
        },
        store: StoreConfig {
            skip_invalid,
            ..StoreConfig::default()
        },
        map: MapConfig::default(),
    };
    let db = DatabaseConfig {
        host: "127.0.0.1".into(),
        port: 1,
        ..DatabaseConfig::default()
    };
    let pool = create_pool(&db).unwrap();
    Arc::new(AppContext::new(config, pool).unwrap().with_database(&db))
}

async fn send(
    ctx: &Arc<AppContext>,
    method: &str,
    uri: &str,
    accept: Option<&str>,
) -> (StatusCode, HeaderMap, String) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(accept) = accept {
        request = request.header(header::ACCEPT, accept);
    }

    let response = build_router(Arc::clone(ctx))
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn forest(x: f64) -> StoredParcel {
    StoredParcel {
        class: "forest".into(),
        name: Some("Sierra Norte".into()),
        area_ha: 12.5,
        geometry: MultiPolygon::new(vec![polygon![
            (x: x, y: 37.38),
            (x: x + 0.01, y: 37.38),
            (x: x + 0.01, y: 37.39),
            (x: x, y: 37.39),
            (x: x, y: 37.38),
        ]]),
    }
}

/// Met en cache un rendu comme si la base avait répondu
fn cache_map(ctx: &AppContext, filter: &ClassFilter, parcels: Vec<StoredParcel>) {
    let rendered = render_map(parcels, filter, &ctx.config().map, None).unwrap();
    ctx.cache().insert(rendered, ctx.cache().generation());
}

#[tokio::test]
async fn test_load_without_valid_parcel_is_rejected() {
    let dir = fixture_dir();
    let ctx = offline_context(&write_points(dir.path(), 3), true);

    let (status, headers, body) = send(&ctx, "POST", "/load", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(content_type(&headers).starts_with("text/html"));
    assert!(body.contains("Load failed"), "{}", body);
    assert!(body.contains("table left unchanged"), "{}", body);
    assert!(body.contains("3 of 3"), "{}", body);

    let (status, _, body) = send(&ctx, "POST", "/load", Some("application/json")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let report: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(report["status"], "Failed");
    assert_eq!(report["parcels_loaded"], 0);
    assert_eq!(report["parcels_skipped"], 3);
}

#[tokio::test]
async fn test_load_aborts_on_first_invalid_parcel() {
    let dir = fixture_dir();
    let ctx = offline_context(&write_points(dir.path(), 2), false);

    let (status, _, body) = send(&ctx, "POST", "/load", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body.contains("expected polygon"), "{}", body);
}

#[tokio::test]
async fn test_load_missing_shapefile() {
    let dir = fixture_dir();
    let ctx = offline_context(&dir.path().join("absent.shp"), false);

    let (status, _, body) = send(&ctx, "POST", "/load", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Source file error"), "{}", body);
}

#[tokio::test]
async fn test_export_csv_headers() {
    let dir = fixture_dir();
    let ctx = offline_context(&dir.path().join("landuse.shp"), false);
    let filter = ClassFilter::Class("forest".into());
    cache_map(&ctx, &filter, vec![forest(-6.0), forest(-5.9)]);

    let (status, headers, body) = send(&ctx, "GET", "/export.csv?class=forest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type(&headers), "text/csv; charset=utf-8");
    let disposition = headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap();
    assert_eq!(
        disposition,
        "attachment; filename=\"landuse_parcels_forest.csv\""
    );

    let rows = landuse_pg::present::read_csv(body.as_bytes()).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.class == "forest"));
    assert!(rows[0].geometry.as_deref().unwrap().starts_with("MULTIPOLYGON"));

    let (status, _, body) = send(&ctx, "GET", "/export.csv?class=forest&geometry=false", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = landuse_pg::present::read_csv(body.as_bytes()).unwrap();
    assert!(rows.iter().all(|r| r.geometry.is_none()));
}

#[tokio::test]
async fn test_export_empty_result() {
    let dir = fixture_dir();
    let ctx = offline_context(&dir.path().join("landuse.shp"), false);
    let filter = ClassFilter::Class("glacier".into());
    cache_map(&ctx, &filter, Vec::new());

    let (status, headers, body) = send(&ctx, "GET", "/export.csv?class=glacier", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type(&headers).starts_with("text/html"));
    assert!(body.contains("No data"), "{}", body);
}

#[tokio::test]
async fn test_database_down() {
    let dir = fixture_dir();
    let ctx = offline_context(&dir.path().join("landuse.shp"), false);

    let (status, headers, body) = send(&ctx, "GET", "/export.csv?class=forest", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(content_type(&headers).starts_with("text/html"));
    assert!(body.contains("Database unavailable"), "{}", body);

    let (status, _, _) = send(&ctx, "GET", "/map?class=forest", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _, body) = send(&ctx, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let health: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["database"], "down");
}

#[tokio::test]
async fn test_cached_map_and_clear() {
    let dir = fixture_dir();
    let ctx = offline_context(&dir.path().join("landuse.shp"), false);
    let filter = ClassFilter::Class("forest".into());
    cache_map(&ctx, &filter, vec![forest(-6.0)]);

    let (status, headers, body) = send(&ctx, "GET", "/map?class=forest", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(content_type(&headers).starts_with("text/html"));
    assert!(body.contains("FeatureCollection"));
    assert!(body.contains(r#"<option value="forest" selected>"#));

    let (status, headers, _) = send(&ctx, "POST", "/cache/clear", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers.get(header::LOCATION).unwrap(), "/");
    assert!(ctx.cache().is_empty());

    // Plus de cache : la base est interrogée
    let (status, _, _) = send(&ctx, "GET", "/map?class=forest", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
