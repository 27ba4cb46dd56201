//! Reprojection intelligente : Rust pur en priorité, PROJ en repli

use super::ReprojectorLite;
use anyhow::Result;
use geo::MultiPolygon;

/// Sélectionne la meilleure reprojection disponible pour un couple d'EPSG
pub enum SmartReprojector {
    /// Pas de reprojection (source == cible)
    Identity,
    /// Reprojection légère (pure Rust)
    Lite(ReprojectorLite),
    /// Reprojection via PROJ (si feature activée)
    #[cfg(feature = "reproject")]
    Proj(super::Reprojector),
}

impl SmartReprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        if source_epsg == target_epsg {
            return Ok(Self::Identity);
        }

        if ReprojectorLite::is_supported(source_epsg, target_epsg) {
            return Ok(Self::Lite(ReprojectorLite::new(source_epsg, target_epsg)?));
        }

        #[cfg(feature = "reproject")]
        {
            let proj = super::Reprojector::new(source_epsg, target_epsg)?;
            return Ok(Self::Proj(proj));
        }

        #[cfg(not(feature = "reproject"))]
        anyhow::bail!(
            "Reprojection EPSG:{} → EPSG:{} not supported without PROJ.\n\
             Pure Rust: 4326, 4258, 3857, 326xx, 327xx, 258xx\n\
             For other systems, build with: cargo build --features reproject",
            source_epsg,
            target_epsg
        )
    }

    /// Transforme un MultiPolygon
    pub fn transform(&self, geom: &MultiPolygon) -> Result<MultiPolygon> {
        match self {
            Self::Identity => Ok(geom.clone()),
            Self::Lite(lite) => lite.transform(geom),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform(geom),
        }
    }

    /// Transforme un point (x, y)
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        match self {
            Self::Identity => Ok((x, y)),
            Self::Lite(lite) => lite.transform_point(x, y),
            #[cfg(feature = "reproject")]
            Self::Proj(proj) => proj.transform_point(x, y),
        }
    }

    /// Retourne une description du reprojector utilisé
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identity => "identity (no reprojection)",
            Self::Lite(_) => "reproject lite (pure Rust)",
            #[cfg(feature = "reproject")]
            Self::Proj(_) => "proj (PROJ library)",
        }
    }
}
