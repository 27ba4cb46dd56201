//! Types de données pour le crate landuse-shp

use geo::MultiPolygon;

/// Une parcelle d'occupation du sol telle que lue dans le shapefile
#[derive(Debug, Clone)]
pub struct SourceParcel {
    /// Position de l'enregistrement dans le fichier (0-based)
    pub index: usize,

    /// Classe d'occupation du sol (ex: "forest", "nature_reserve")
    pub class: String,

    /// Nom de l'entité, si la colonne existe et est renseignée
    pub name: Option<String>,

    /// Géométrie dans le système de coordonnées source
    pub geometry: MultiPolygon,
}

/// Informations de projection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    /// Code EPSG
    pub epsg: u32,
}

impl Default for Projection {
    fn default() -> Self {
        // Les exports OSM (Geofabrik) sont en WGS84
        Self { epsg: 4326 }
    }
}

/// Options de lecture
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Colonne portant la classe d'occupation du sol
    pub class_field: String,

    /// Colonne portant le nom (optionnelle dans le .dbf)
    pub name_field: Option<String>,

    /// Force l'EPSG source (rend le .prj facultatif)
    pub source_srid: Option<u32>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            class_field: "fclass".into(),
            name_field: Some("name".into()),
            source_srid: None,
        }
    }
}
