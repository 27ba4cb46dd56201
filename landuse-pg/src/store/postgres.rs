//! Requêtes SQL PostGIS
//!
//! Les identifiants (schéma, table) sont validés en amont et interpolés ;
//! toutes les valeurs passent par des paramètres liés.

use futures::TryStreamExt;
use geo::{Geometry, MultiPolygon};
use geozero::wkb::Wkb;
use geozero::ToGeo;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Statement, Transaction};
use tracing::{debug, info};
use wkb::geom_to_wkb;

use super::{ClassSummary, LoadRecord, StoreError, StoredParcel};

/// Table d'historique des chargements, une par schéma
pub const HISTORY_TABLE: &str = "_load_history";

/// Vérifie la présence de PostGIS, l'installe si possible
pub async fn ensure_postgis(tx: &Transaction<'_>) -> Result<(), StoreError> {
    let row = tx
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM pg_extension WHERE extname = 'postgis')",
            &[],
        )
        .await?;
    if row.get::<_, bool>(0) {
        return Ok(());
    }

    tx.batch_execute("CREATE EXTENSION IF NOT EXISTS postgis")
        .await
        .map_err(|e| StoreError::MissingExtension(e.to_string()))?;
    info!("PostGIS extension created");
    Ok(())
}

/// Crée le schéma, la table des parcelles et la table d'historique
pub async fn create_tables(
    tx: &Transaction<'_>,
    schema: &str,
    table: &str,
    srid: u32,
) -> Result<(), StoreError> {
    let sql = format!(
        r#"
        CREATE SCHEMA IF NOT EXISTS {schema};

        CREATE TABLE IF NOT EXISTS {schema}.{table} (
            row_id BIGSERIAL PRIMARY KEY,
            class TEXT NOT NULL,
            name TEXT,
            area_ha DOUBLE PRECISION NOT NULL CHECK (area_ha >= 0),
            geometry geometry(MultiPolygon, {srid}) NOT NULL CHECK (ST_IsValid(geometry))
        );

        CREATE INDEX IF NOT EXISTS idx_{table}_class ON {schema}.{table} (class);
        CREATE INDEX IF NOT EXISTS idx_{table}_geom ON {schema}.{table} USING GIST (geometry);

        CREATE TABLE IF NOT EXISTS {schema}.{history} (
            id BIGSERIAL PRIMARY KEY,
            table_name TEXT NOT NULL,
            source TEXT NOT NULL,
            checksum TEXT NOT NULL,
            parcels BIGINT NOT NULL,
            total_area_ha DOUBLE PRECISION NOT NULL,
            loaded_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        );
        "#,
        history = HISTORY_TABLE,
    );

    tx.batch_execute(&sql).await?;
    debug!(schema, table, srid, "Tables ready");
    Ok(())
}

/// Applique `lock_timeout` à la transaction courante uniquement
pub async fn set_lock_timeout(tx: &Transaction<'_>, timeout_ms: u64) -> Result<(), StoreError> {
    let value = format!("{}ms", timeout_ms);
    tx.query_one("SELECT set_config('lock_timeout', $1, true)", &[&value])
        .await?;
    Ok(())
}

/// Vide la table des parcelles
pub async fn truncate(tx: &Transaction<'_>, schema: &str, table: &str) -> Result<(), StoreError> {
    tx.batch_execute(&format!("TRUNCATE TABLE {}.{} RESTART IDENTITY", schema, table))
        .await?;
    Ok(())
}

/// Prépare l'insertion d'une parcelle (géométrie en EWKB)
pub async fn prepare_insert(
    tx: &Transaction<'_>,
    schema: &str,
    table: &str,
) -> Result<Statement, StoreError> {
    let sql = format!(
        "INSERT INTO {}.{} (class, name, area_ha, geometry) \
         VALUES ($1, $2, $3, ST_Multi(ST_GeomFromEWKB($4::bytea)))",
        schema, table
    );
    Ok(tx.prepare(&sql).await?)
}

/// Enregistre un chargement dans l'historique
pub async fn record_load(
    tx: &Transaction<'_>,
    schema: &str,
    table: &str,
    source: &str,
    checksum: &str,
    parcels: usize,
    total_area_ha: f64,
) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO {}.{} (table_name, source, checksum, parcels, total_area_ha) \
         VALUES ($1, $2, $3, $4, $5)",
        schema, HISTORY_TABLE
    );
    let parcels = parcels as i64;
    tx.execute(&sql, &[&table, &source, &checksum, &parcels, &total_area_ha])
        .await?;
    Ok(())
}

/// Vrai si la relation `schema.name` existe
pub async fn relation_exists(client: &Client, schema: &str, name: &str) -> Result<bool, StoreError> {
    let qualified = format!("{}.{}", schema, name);
    let row = client
        .query_one("SELECT to_regclass($1)::text", &[&qualified])
        .await?;
    Ok(row.get::<_, Option<String>>(0).is_some())
}

/// Parcelles filtrées, géométries transformées vers `display_srid`
pub async fn select_parcels(
    client: &Client,
    schema: &str,
    table: &str,
    display_srid: u32,
    class: Option<&str>,
) -> Result<Vec<StoredParcel>, StoreError> {
    let sql = format!(
        "SELECT class, name, area_ha, ST_AsBinary(ST_Transform(geometry, $1::int)) \
         FROM {}.{} \
         WHERE ($2::text IS NULL OR class = $2) \
         ORDER BY row_id",
        schema, table
    );
    let srid = display_srid as i32;
    let params: [&(dyn ToSql + Sync); 2] = [&srid, &class];

    let rows: Vec<tokio_postgres::Row> = client.query_raw(&sql, params).await?.try_collect().await?;

    rows.iter()
        .map(|row| {
            let wkb: Vec<u8> = row.get(3);
            Ok(StoredParcel {
                class: row.get(0),
                name: row.get(1),
                area_ha: row.get(2),
                geometry: wkb_to_multipolygon(&wkb)?,
            })
        })
        .collect()
}

/// Classes présentes avec nombre de parcelles et surface totale
pub async fn select_classes(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Vec<ClassSummary>, StoreError> {
    let sql = format!(
        "SELECT class, COUNT(*), COALESCE(SUM(area_ha), 0) FROM {}.{} GROUP BY class ORDER BY class",
        schema, table
    );
    let rows = client.query(&sql, &[]).await?;
    Ok(rows
        .iter()
        .map(|row| ClassSummary {
            class: row.get(0),
            count: row.get::<_, i64>(1) as usize,
            area_ha: row.get(2),
        })
        .collect())
}

/// Dernier chargement enregistré pour une table
pub async fn select_last_load(
    client: &Client,
    schema: &str,
    table: &str,
) -> Result<Option<LoadRecord>, StoreError> {
    let sql = format!(
        "SELECT source, checksum, parcels, total_area_ha, loaded_at::text \
         FROM {}.{} WHERE table_name = $1 ORDER BY id DESC LIMIT 1",
        schema, HISTORY_TABLE
    );
    let row = client.query_opt(&sql, &[&table]).await?;
    Ok(row.map(|row| LoadRecord {
        source: row.get(0),
        checksum: row.get(1),
        parcels: row.get::<_, i64>(2) as usize,
        total_area_ha: row.get(3),
        loaded_at: row.get(4),
    }))
}

/// Encode une géométrie en EWKB avec SRID
pub fn multipolygon_to_ewkb(geom: &MultiPolygon, srid: u32) -> Result<Vec<u8>, StoreError> {
    let wkb = geom_to_wkb(&Geometry::MultiPolygon(geom.clone())).map_err(|e| {
        StoreError::MalformedGeometry {
            index: None,
            message: format!("Failed to convert geometry to WKB: {:?}", e),
        }
    })?;
    Ok(add_srid_to_wkb(&wkb, srid))
}

/// Ajoute le SRID au WKB pour créer du EWKB
fn add_srid_to_wkb(wkb: &[u8], srid: u32) -> Vec<u8> {
    if wkb.len() < 5 {
        return wkb.to_vec();
    }

    let mut ewkb = Vec::with_capacity(wkb.len() + 4);
    ewkb.push(wkb[0]);

    // Type avec flag SRID (0x20000000)
    let type_bytes = [wkb[1], wkb[2], wkb[3], wkb[4]];
    if wkb[0] == 1 {
        let geom_type = u32::from_le_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_le_bytes());
        ewkb.extend_from_slice(&srid.to_le_bytes());
    } else {
        let geom_type = u32::from_be_bytes(type_bytes) | 0x2000_0000;
        ewkb.extend_from_slice(&geom_type.to_be_bytes());
        ewkb.extend_from_slice(&srid.to_be_bytes());
    }

    ewkb.extend_from_slice(&wkb[5..]);
    ewkb
}

/// Décode du WKB PostGIS en MultiPolygon
pub fn wkb_to_multipolygon(bytes: &[u8]) -> Result<MultiPolygon, StoreError> {
    let geometry = Wkb(bytes.to_vec())
        .to_geo()
        .map_err(|e| StoreError::Database(format!("Invalid WKB from database: {}", e)))?;

    match geometry {
        Geometry::MultiPolygon(mp) => Ok(mp),
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        other => Err(StoreError::Database(format!(
            "Expected polygonal geometry, got {:?}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square() -> MultiPolygon {
        MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0),
            (x: 10.0, y: 0.0),
            (x: 10.0, y: 10.0),
            (x: 0.0, y: 10.0),
            (x: 0.0, y: 0.0),
        ]])
    }

    #[test]
    fn test_ewkb_srid_flag() {
        let ewkb = multipolygon_to_ewkb(&square(), 25830).unwrap();

        let order = ewkb[0];
        let type_bytes = [ewkb[1], ewkb[2], ewkb[3], ewkb[4]];
        let srid_bytes = [ewkb[5], ewkb[6], ewkb[7], ewkb[8]];
        let (geom_type, srid) = if order == 1 {
            (u32::from_le_bytes(type_bytes), u32::from_le_bytes(srid_bytes))
        } else {
            (u32::from_be_bytes(type_bytes), u32::from_be_bytes(srid_bytes))
        };

        assert_eq!(geom_type & 0x2000_0000, 0x2000_0000);
        assert_eq!(geom_type & 0xff, 6, "MultiPolygon");
        assert_eq!(srid, 25830);
    }

    #[test]
    fn test_wkb_decode() {
        let wkb = geom_to_wkb(&Geometry::MultiPolygon(square())).unwrap();
        assert_eq!(wkb_to_multipolygon(&wkb).unwrap(), square());

        let polygon = geom_to_wkb(&Geometry::Polygon(square().0[0].clone())).unwrap();
        assert_eq!(wkb_to_multipolygon(&polygon).unwrap().0.len(), 1);
    }

    #[test]
    fn test_wkb_decode_rejects_points() {
        let point = geom_to_wkb(&Geometry::Point(geo::Point::new(1.0, 2.0))).unwrap();
        assert!(wkb_to_multipolygon(&point).is_err());
        assert!(wkb_to_multipolygon(&[1, 2, 3]).is_err());
    }
}
