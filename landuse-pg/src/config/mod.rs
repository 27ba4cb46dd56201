//! Configuration de l'application

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::filter::ClassFilter;
use crate::store::validate_identifier;

/// Configuration principale
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub map: MapConfig,
}

/// Shapefile à charger
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Chemin du .shp
    pub path: PathBuf,

    /// Colonne portant la classe d'occupation du sol
    #[serde(default = "default_class_field")]
    pub class_field: String,

    /// Colonne portant le nom (optionnelle)
    #[serde(default = "default_name_field")]
    pub name_field: Option<String>,

    /// Force le SRID source au lieu de lire le .prj
    #[serde(default)]
    pub source_srid: Option<u32>,
}

/// Table PostGIS cible
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub schema: String,
    pub table: String,
    /// SRID de stockage, projeté (les surfaces y sont calculées)
    pub storage_srid: u32,
    /// SRID des géométries renvoyées pour l'affichage
    pub display_srid: u32,
    /// `lock_timeout` appliqué à la transaction de chargement
    pub lock_timeout_ms: u64,
    /// Ignorer les parcelles invalides au lieu d'interrompre le chargement
    pub skip_invalid: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            schema: "public".into(),
            table: "landuse_parcels".into(),
            storage_srid: 25830,
            display_srid: 4326,
            lock_timeout_ms: 5000,
            skip_invalid: false,
        }
    }
}

/// Rendu de la carte
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MapConfig {
    pub title: String,
    pub zoom_start: u8,
    pub width: u32,
    pub height: u32,
    /// Nombre de lignes du tableau sous la carte
    pub table_rows: usize,
    /// Couleur des classes absentes de la palette
    pub default_color: String,
    pub palette: BTreeMap<String, String>,
    pub filters: Vec<FilterOption>,
    /// Nombre de filtres gardés en cache de rendu
    pub cache_entries: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: "Land use".into(),
            zoom_start: 7,
            width: 1000,
            height: 600,
            table_rows: 100,
            default_color: "#AAAAAA".into(),
            palette: BTreeMap::from([
                ("forest".to_string(), "darkgreen".to_string()),
                ("nature_reserve".to_string(), "darkblue".to_string()),
            ]),
            filters: vec![
                FilterOption::new("All", None),
                FilterOption::new("Forests", Some("forest")),
                FilterOption::new("Nature reserves", Some("nature_reserve")),
            ],
            cache_entries: crate::present::cache::DEFAULT_CACHE_ENTRIES,
        }
    }
}

/// Option du sélecteur de filtre
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterOption {
    pub label: String,
    /// Classe filtrée, absente pour "toutes"
    #[serde(default)]
    pub class: Option<String>,
}

impl FilterOption {
    pub fn new(label: &str, class: Option<&str>) -> Self {
        Self {
            label: label.to_string(),
            class: class.map(str::to_string),
        }
    }

    pub fn filter(&self) -> ClassFilter {
        match &self.class {
            Some(class) => ClassFilter::Class(class.clone()),
            None => ClassFilter::All,
        }
    }
}

fn default_class_field() -> String {
    "fclass".to_string()
}

fn default_name_field() -> Option<String> {
    Some("name".to_string())
}

impl AppConfig {
    /// Charge une configuration depuis un fichier JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Charge une configuration depuis un preset embarqué
    pub fn from_preset(preset: &str) -> Result<Self> {
        match preset {
            "andalucia" => Self::load_embedded(include_str!("presets/andalucia.json")),
            _ => bail!("Unknown preset: {}. Use: andalucia", preset),
        }
    }

    /// Preset si `name` en est un, fichier JSON sinon
    pub fn resolve(name: &str) -> Result<Self> {
        if Path::new(name).is_file() {
            Self::load(Path::new(name))
        } else {
            Self::from_preset(name)
        }
    }

    fn load_embedded(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Failed to parse embedded config")?;
        config.validate()?;
        Ok(config)
    }

    /// Vérifie la cohérence de la configuration
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.store.schema).context("Invalid store.schema")?;
        validate_identifier(&self.store.table).context("Invalid store.table")?;

        if !crate::calculator::is_projected(self.store.storage_srid) {
            bail!(
                "store.storage_srid must be a projected system, got EPSG:{}",
                self.store.storage_srid
            );
        }
        // Leaflet attend des coordonnées lon/lat WGS84
        if self.store.display_srid != 4326 {
            bail!(
                "store.display_srid must be 4326 for the web map, got EPSG:{}",
                self.store.display_srid
            );
        }
        if self.source.class_field.trim().is_empty() {
            bail!("source.class_field must not be empty");
        }
        if self.map.table_rows == 0 {
            bail!("map.table_rows must be at least 1");
        }
        if self.map.cache_entries == 0 {
            bail!("map.cache_entries must be at least 1");
        }
        Ok(())
    }

    /// Nom qualifié `schema.table`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.store.schema, self.store.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_andalucia_preset() {
        let config = AppConfig::from_preset("andalucia").unwrap();
        assert_eq!(config.store.table, "andalucia_usos_suelo");
        assert_eq!(config.store.storage_srid, 25830);
        assert_eq!(config.store.display_srid, 4326);
        assert_eq!(config.source.class_field, "fclass");
        assert_eq!(config.map.palette["forest"], "darkgreen");
        assert_eq!(config.map.palette["nature_reserve"], "darkblue");
        assert_eq!(config.map.default_color, "#AAAAAA");
        assert_eq!(config.map.filters.len(), 3);
        assert_eq!(config.map.filters[0].filter(), ClassFilter::All);
        assert_eq!(
            config.map.filters[1].filter(),
            ClassFilter::Class("forest".into())
        );
        assert_eq!(config.qualified_table(), "public.andalucia_usos_suelo");
    }

    #[test]
    fn test_unknown_preset() {
        assert!(AppConfig::from_preset("catalunya").is_err());
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"source": {"path": "landuse.shp"}}"#).unwrap();
        config.validate().unwrap();
        assert_eq!(config.source.name_field.as_deref(), Some("name"));
        assert_eq!(config.store.lock_timeout_ms, 5000);
        assert!(!config.store.skip_invalid);
        assert_eq!(config.map.zoom_start, 7);
        assert_eq!(config.map.cache_entries, 64);
    }

    #[test]
    fn test_validation_rejects_bad_identifiers() {
        let mut config = AppConfig::from_preset("andalucia").unwrap();
        config.store.table = "usos; DROP TABLE x".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_geographic_storage() {
        let mut config = AppConfig::from_preset("andalucia").unwrap();
        config.store.storage_srid = 4326;
        assert!(config.validate().is_err());

        config.store.storage_srid = 4230;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_empty_cache() {
        let mut config = AppConfig::from_preset("andalucia").unwrap();
        config.map.cache_entries = 0;
        assert!(config.validate().is_err());
    }
}
