//! Types d'erreurs pour le crate landuse-shp

use thiserror::Error;

/// Erreurs pouvant survenir lors de la lecture d'un shapefile
#[derive(Debug, Error)]
pub enum ShpError {
    /// Erreur d'I/O lors de la lecture des fichiers
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Fichier (.shp ou fichier compagnon) absent
    #[error("Missing required file: {0}")]
    MissingFile(String),

    /// Erreur remontée par le lecteur shapefile/dbase
    #[error("Shapefile read error: {0}")]
    Read(#[from] shapefile::Error),

    /// Erreur de lecture du .dbf
    #[error("DBF read error: {0}")]
    Dbf(#[from] shapefile::dbase::Error),

    /// Colonne attributaire absente du .dbf
    #[error("Missing attribute field '{field}' in {file}")]
    MissingField { file: String, field: String },

    /// Projection non reconnue dans le .prj
    #[error("Unknown projection: {0}")]
    UnknownProjection(String),

    /// Géométrie absente ou non polygonale
    #[error("Invalid geometry for record #{index}: {reason}")]
    InvalidGeometry { index: usize, reason: String },
}

impl ShpError {
    /// Crée une erreur de géométrie invalide
    pub fn invalid_geometry(index: usize, reason: impl Into<String>) -> Self {
        Self::InvalidGeometry {
            index,
            reason: reason.into(),
        }
    }

    /// Vrai si l'erreur concerne un enregistrement isolé (les suivants restent lisibles)
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::InvalidGeometry { .. })
    }
}
