//! Actions utilisateur : charger, visualiser, exporter
//!
//! `AppContext` porte la configuration, le stockage et le cache de rendu ; il
//! est passé explicitement à chaque action (CLI ou handler HTTP).

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use deadpool_postgres::Pool;
use landuse_shp::{ReadOptions, ShapefileSource, ShpError, SourceParcel};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::calculator::{ParcelCalculator, PreparedParcel};
use crate::config::{AppConfig, SourceConfig, StoreConfig};
use crate::error::AppError;
use crate::filter::ClassFilter;
use crate::present::{render_map, write_csv, DatabaseInfo, RenderCache, RenderedMap};
use crate::report::LoadReport;
use crate::store::{ClassSummary, DatabaseConfig, LoadRecord, ParcelStore};

/// Parcelles prêtes à être chargées, avec leur rapport
pub struct PreparedLoad {
    pub parcels: Vec<PreparedParcel>,
    pub report: LoadReport,
}

/// Contexte partagé par toutes les actions
pub struct AppContext {
    config: AppConfig,
    store: ParcelStore,
    cache: RenderCache,
    database: Option<DatabaseInfo>,
    load_lock: Mutex<()>,
}

impl AppContext {
    pub fn new(config: AppConfig, pool: Pool) -> Result<Self, AppError> {
        config
            .validate()
            .map_err(|e| AppError::Config(format!("{:#}", e)))?;
        let store = ParcelStore::new(pool, &config.store)?;
        let cache = RenderCache::with_capacity(config.map.cache_entries);
        Ok(Self {
            config,
            store,
            cache,
            database: None,
            load_lock: Mutex::new(()),
        })
    }

    /// Affiche la base de connexion dans les pages rendues
    pub fn with_database(mut self, db: &DatabaseConfig) -> Self {
        self.database = Some(DatabaseInfo {
            database: db.dbname.clone(),
            table: self.config.qualified_table(),
            host: db.host.clone(),
            port: db.port,
        });
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ParcelStore {
        &self.store
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    /// Charge le shapefile configuré en remplaçant la table
    ///
    /// Les chargements concurrents de ce processus sont sérialisés ; le
    /// `lock_timeout` de la base protège contre les autres processus.
    pub async fn load(&self) -> Result<LoadReport, AppError> {
        let _guard = self.load_lock.lock().await;
        let start = Instant::now();

        let source = self.config.source.clone();
        let store = self.config.store.clone();
        let PreparedLoad {
            parcels,
            mut report,
        } = tokio::task::spawn_blocking(move || read_and_prepare(&source, &store)).await??;

        if parcels.is_empty() && report.parcels_read > 0 {
            report.record_fatal(None, "No valid parcel in source, table left unchanged");
            report.set_duration(start.elapsed());
            report.finalize();
            warn!(source = %report.source, skipped = report.parcels_skipped, "Load aborted");
            return Ok(report);
        }

        let inserted = self
            .store
            .replace_all(&parcels, &report.source, &report.checksum)
            .await?;
        debug_assert_eq!(inserted, report.parcels_loaded);

        report.set_duration(start.elapsed());
        report.finalize();

        let cleared = self.cache.clear();
        info!(
            source = %report.source,
            parcels = inserted,
            skipped = report.parcels_skipped,
            total_area_ha = report.total_area_ha,
            cache_entries_cleared = cleared,
            "Load complete"
        );
        Ok(report)
    }

    /// Carte pour un filtre, depuis le cache si possible
    ///
    /// Un rendu dont la lecture a précédé un chargement terminé entre-temps est
    /// retourné mais pas mis en cache.
    pub async fn visualize(&self, filter: &ClassFilter) -> Result<Arc<RenderedMap>, AppError> {
        if let Some(hit) = self.cache.get(filter) {
            return Ok(hit);
        }

        let generation = self.cache.generation();
        let parcels = self.store.query(filter).await?;
        let rendered = render_map(parcels, filter, &self.config.map, self.database.as_ref())?;
        Ok(self.cache.insert(rendered, generation))
    }

    /// CSV des parcelles affichées pour un filtre
    pub async fn export_csv(
        &self,
        filter: &ClassFilter,
        include_geometry: bool,
    ) -> Result<Vec<u8>, AppError> {
        let rendered = self.visualize(filter).await?;
        if rendered.is_empty() {
            return Err(AppError::EmptyResult {
                filter: filter.clone(),
            });
        }

        let mut buf = Vec::new();
        write_csv(&mut buf, &rendered.parcels, include_geometry)?;
        Ok(buf)
    }

    /// Vide le cache de rendu
    pub fn clear_cache(&self) -> usize {
        self.cache.clear()
    }

    pub async fn classes(&self) -> Result<Vec<ClassSummary>, AppError> {
        Ok(self.store.classes().await?)
    }

    pub async fn last_load(&self) -> Result<Option<LoadRecord>, AppError> {
        Ok(self.store.last_load().await?)
    }
}

/// Lit le shapefile et prépare toutes les parcelles (bloquant)
///
/// Avec `skip_invalid`, une parcelle invalide est consignée dans le rapport et
/// ignorée ; sinon elle interrompt le chargement avant toute écriture.
pub fn read_and_prepare(source: &SourceConfig, store: &StoreConfig) -> Result<PreparedLoad, AppError> {
    let options = ReadOptions {
        class_field: source.class_field.clone(),
        name_field: source.name_field.clone(),
        source_srid: source.source_srid,
    };
    let mut shapefile = ShapefileSource::open(&source.path, options)?;
    let calculator = ParcelCalculator::new(
        shapefile.projection().epsg,
        store.storage_srid,
        store.display_srid,
    )?;

    let checksum = compute_file_checksum(shapefile.path())?;
    let name = shapefile
        .path()
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut report = LoadReport::new(&name, &checksum);
    let capacity = shapefile.len()?;
    let mut parcels = Vec::with_capacity(capacity);
    prepare_parcels(
        &calculator,
        shapefile.parcels(),
        store.skip_invalid,
        &mut report,
        &mut parcels,
    )?;

    info!(
        source = %name,
        read = report.parcels_read,
        prepared = parcels.len(),
        skipped = report.parcels_skipped,
        "Shapefile prepared"
    );
    Ok(PreparedLoad { parcels, report })
}

/// Prépare chaque parcelle lue, en consignant les rejets dans le rapport
///
/// Une erreur de lecture globale (I/O, .dbf) interrompt toujours la boucle.
pub fn prepare_parcels<I>(
    calculator: &ParcelCalculator,
    items: I,
    skip_invalid: bool,
    report: &mut LoadReport,
    parcels: &mut Vec<PreparedParcel>,
) -> Result<(), AppError>
where
    I: IntoIterator<Item = Result<SourceParcel, ShpError>>,
{
    for item in items {
        report.record_read();

        let prepared = match item {
            Ok(parcel) => calculator.prepare(parcel).map_err(AppError::from),
            Err(e) if e.is_record_level() => Err(AppError::from(e)),
            Err(e) => return Err(e.into()),
        };

        match prepared {
            Ok(parcel) => {
                report.record_loaded(&parcel.class, parcel.area_ha);
                parcels.push(parcel);
            }
            Err(e) if skip_invalid => {
                warn!(error = %e, "Skipping invalid parcel");
                report.record_skipped(parcel_index(&e), &e.to_string());
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn parcel_index(e: &AppError) -> Option<usize> {
    match e {
        AppError::Prepare(e) => e.parcel_index(),
        AppError::Source(ShpError::InvalidGeometry { index, .. }) => Some(*index),
        _ => None,
    }
}

/// Calcule le checksum blake3 d'un fichier
pub fn compute_file_checksum(path: &Path) -> Result<String, AppError> {
    use std::fs::File;
    use std::io::Read;

    let mut file = File::open(path).map_err(ShpError::from)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(ShpError::from)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use tempfile::TempDir;

    #[test]
    fn test_checksum_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landuse.shp");
        std::fs::write(&path, b"landuse").unwrap();

        let a = compute_file_checksum(&path).unwrap();
        let b = compute_file_checksum(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(a, blake3::hash(b"landuse").to_hex().to_string());
    }

    fn square(index: usize, class: &str) -> Result<SourceParcel, ShpError> {
        Ok(SourceParcel {
            index,
            class: class.into(),
            name: None,
            geometry: geo::MultiPolygon::new(vec![polygon![
                (x: -6.0, y: 37.38),
                (x: -5.99, y: 37.38),
                (x: -5.99, y: 37.39),
                (x: -6.0, y: 37.39),
                (x: -6.0, y: 37.38),
            ]]),
        })
    }

    fn inputs() -> Vec<Result<SourceParcel, ShpError>> {
        vec![
            square(0, "forest"),
            Err(ShpError::invalid_geometry(1, "null shape")),
            square(2, "nature_reserve"),
            Ok(SourceParcel {
                index: 3,
                class: "forest".into(),
                name: None,
                geometry: geo::MultiPolygon::new(vec![]),
            }),
        ]
    }

    #[test]
    fn test_prepare_skips_invalid() {
        let calculator = ParcelCalculator::new(4326, 25830, 4326).unwrap();
        let mut report = LoadReport::new("landuse.shp", "abc");
        let mut parcels = Vec::new();

        prepare_parcels(&calculator, inputs(), true, &mut report, &mut parcels).unwrap();

        assert_eq!(parcels.len(), 2);
        assert_eq!(report.parcels_read, 4);
        assert_eq!(report.parcels_loaded, 2);
        assert_eq!(report.parcels_skipped, 2);
        assert_eq!(report.errors[0].parcel, Some(1));
        assert_eq!(report.errors[1].parcel, Some(3));
        assert!(parcels.iter().all(|p| p.area_ha > 0.0));
    }

    #[test]
    fn test_prepare_aborts_on_invalid() {
        let calculator = ParcelCalculator::new(4326, 25830, 4326).unwrap();
        let mut report = LoadReport::new("landuse.shp", "abc");
        let mut parcels = Vec::new();

        let err =
            prepare_parcels(&calculator, inputs(), false, &mut report, &mut parcels).unwrap_err();

        assert!(matches!(
            err,
            AppError::Source(ShpError::InvalidGeometry { index: 1, .. })
        ));
        assert_eq!(parcels.len(), 1);
    }

    #[test]
    fn test_missing_source() {
        let dir = TempDir::new().unwrap();
        let source = SourceConfig {
            path: dir.path().join("missing.shp"),
            class_field: "fclass".into(),
            name_field: None,
            source_srid: None,
        };
        let result = read_and_prepare(&source, &StoreConfig::default());
        assert!(matches!(
            result,
            Err(AppError::Source(ShpError::MissingFile(_)))
        ));
    }
}
