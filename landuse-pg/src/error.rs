//! Erreurs des actions utilisateur (chargement, visualisation, export)

use landuse_shp::ShpError;
use thiserror::Error;

use crate::calculator::PrepareError;
use crate::filter::ClassFilter;
use crate::present::PresentError;
use crate::store::StoreError;

/// Erreur remontée à la frontière d'une action
#[derive(Error, Debug)]
pub enum AppError {
    /// Shapefile absent, illisible, projection ou colonne inconnue
    #[error("Source error: {0}")]
    Source(#[from] ShpError),

    #[error("{0}")]
    Prepare(#[from] PrepareError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("No parcels match filter '{filter}'")]
    EmptyResult { filter: ClassFilter },

    #[error("Rendering failed: {0}")]
    Present(#[from] PresentError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Vrai si l'erreur vient d'un verrou tenu par une autre session
    pub fn is_lock_conflict(&self) -> bool {
        matches!(self, Self::Store(StoreError::LockConflict(_)))
    }

    /// Vrai si la géométrie d'une parcelle est en cause
    pub fn is_malformed_geometry(&self) -> bool {
        matches!(
            self,
            Self::Store(StoreError::MalformedGeometry { .. })
                | Self::Prepare(PrepareError::MalformedGeometry { .. })
                | Self::Source(ShpError::InvalidGeometry { .. })
        )
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Background task failed: {}", e))
    }
}
