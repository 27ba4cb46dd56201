//! Préparation des parcelles : validation, reprojection, surface
//!
//! Chaque parcelle lue est projetée deux fois :
//! - vers le SRID de stockage (métrique) où la surface plane est calculée
//! - vers le SRID d'affichage (en général WGS84) pour la carte

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Area, Line, LineString, MultiPolygon, Polygon};
use landuse_shp::SourceParcel;
use thiserror::Error;

use crate::reproject::{Crs, SmartReprojector};

/// m² → ha
pub const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Erreurs de préparation d'une parcelle
#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Storage SRID {0} is not a projected (metric) system")]
    GeographicStorage(u32),

    #[error("Unsupported reprojection: {0}")]
    Reprojection(String),

    #[error("Parcel {index}: malformed geometry ({reason})")]
    MalformedGeometry { index: usize, reason: String },

    #[error("Parcel {index}: reprojection failed ({reason})")]
    TransformFailed { index: usize, reason: String },

    #[error("Parcel {index}: area is not a finite non-negative number ({area})")]
    InvalidArea { index: usize, area: f64 },
}

impl PrepareError {
    /// Index de la parcelle concernée, si l'erreur porte sur une parcelle
    pub fn parcel_index(&self) -> Option<usize> {
        match self {
            Self::MalformedGeometry { index, .. }
            | Self::TransformFailed { index, .. }
            | Self::InvalidArea { index, .. } => Some(*index),
            _ => None,
        }
    }
}

/// Parcelle prête à être stockée et affichée
#[derive(Debug, Clone)]
pub struct PreparedParcel {
    pub index: usize,
    pub class: String,
    pub name: Option<String>,
    /// Géométrie dans le SRID de stockage
    pub storage: MultiPolygon,
    /// Géométrie dans le SRID d'affichage
    pub display: MultiPolygon,
    pub area_ha: f64,
}

/// Calcule surfaces et géométries projetées
pub struct ParcelCalculator {
    to_storage: SmartReprojector,
    to_display: SmartReprojector,
    storage_srid: u32,
    display_srid: u32,
}

impl ParcelCalculator {
    /// Crée un calculateur source → stockage / affichage
    ///
    /// Le SRID de stockage doit être projeté : une surface calculée en degrés
    /// n'a pas de sens.
    pub fn new(source_srid: u32, storage_srid: u32, display_srid: u32) -> Result<Self, PrepareError> {
        if !is_projected(storage_srid) {
            return Err(PrepareError::GeographicStorage(storage_srid));
        }

        let to_storage = SmartReprojector::new(source_srid, storage_srid)
            .map_err(|e| PrepareError::Reprojection(e.to_string()))?;
        let to_display = SmartReprojector::new(source_srid, display_srid)
            .map_err(|e| PrepareError::Reprojection(e.to_string()))?;

        tracing::debug!(
            source_srid,
            storage_srid,
            display_srid,
            storage = to_storage.description(),
            display = to_display.description(),
            "Calculator ready"
        );

        Ok(Self {
            to_storage,
            to_display,
            storage_srid,
            display_srid,
        })
    }

    pub fn storage_srid(&self) -> u32 {
        self.storage_srid
    }

    pub fn display_srid(&self) -> u32 {
        self.display_srid
    }

    /// Valide, reprojette et mesure une parcelle
    pub fn prepare(&self, parcel: SourceParcel) -> Result<PreparedParcel, PrepareError> {
        let index = parcel.index;
        check_geometry(&parcel.geometry).map_err(|reason| PrepareError::MalformedGeometry {
            index,
            reason: reason.to_string(),
        })?;

        let storage = self
            .to_storage
            .transform(&parcel.geometry)
            .map_err(|e| PrepareError::TransformFailed {
                index,
                reason: e.to_string(),
            })?;
        let display = self
            .to_display
            .transform(&parcel.geometry)
            .map_err(|e| PrepareError::TransformFailed {
                index,
                reason: e.to_string(),
            })?;

        let area_ha = area_hectares(&storage);
        if !area_ha.is_finite() || area_ha < 0.0 {
            return Err(PrepareError::InvalidArea { index, area: area_ha });
        }

        Ok(PreparedParcel {
            index,
            class: parcel.class,
            name: parcel.name,
            storage,
            display,
            area_ha,
        })
    }
}

/// Surface plane en hectares d'une géométrie métrique
pub fn area_hectares(geom: &MultiPolygon) -> f64 {
    geom.unsigned_area() / SQUARE_METERS_PER_HECTARE
}

/// Vrai si `srid` est un système projeté (coordonnées en mètres)
///
/// Les codes inconnus du reprojecteur Rust sont classés par plage EPSG : la
/// plage 4000-4999 regroupe pour l'essentiel les CRS géographiques 2D, complétée par quelques
/// réalisations récentes hors plage. Tout autre code est supposé projeté.
pub(crate) fn is_projected(srid: u32) -> bool {
    match Crs::from_epsg(srid) {
        Some(crs) => crs.is_projected(),
        None => !is_geographic_code(srid),
    }
}

fn is_geographic_code(srid: u32) -> bool {
    matches!(srid, 4000..=4999 | 6318 | 6668 | 7844)
}

/// Vérifie qu'une géométrie est acceptable pour PostGIS
///
/// Anneaux fermés d'au moins 4 points, coordonnées finies, sans
/// auto-intersection, au moins un polygone. Les croisements entre anneaux
/// d'un même polygone sont laissés à la contrainte `ST_IsValid` de la table.
pub fn check_geometry(geom: &MultiPolygon) -> Result<(), &'static str> {
    fn ring_ok(r: &LineString) -> Result<(), &'static str> {
        if r.0.len() < 4 {
            return Err("ring with fewer than 4 points");
        }
        if r.0.first() != r.0.last() {
            return Err("ring not closed");
        }
        if r.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err("non-finite coordinate");
        }
        if ring_self_intersects(r) {
            return Err("self-intersecting ring");
        }
        Ok(())
    }

    fn polygon_ok(p: &Polygon) -> Result<(), &'static str> {
        ring_ok(p.exterior())?;
        p.interiors().iter().try_for_each(ring_ok)
    }

    if geom.0.is_empty() {
        return Err("empty geometry");
    }
    geom.0.iter().try_for_each(polygon_ok)
}

/// Détecte un anneau qui se recoupe (nœud papillon, pointe repliée)
///
/// Balayage sur x : seuls les segments dont les emprises en x se recouvrent
/// sont comparés. Deux segments consécutifs partagent une extrémité, ce qui
/// n'est une erreur que s'ils se superposent.
fn ring_self_intersects(ring: &LineString) -> bool {
    let segments: Vec<Line> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = segments.len();
    if n < 3 {
        return true;
    }

    let min_x = |l: &Line| l.start.x.min(l.end.x);
    let max_x = |l: &Line| l.start.x.max(l.end.x);
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| min_x(&segments[a]).total_cmp(&min_x(&segments[b])));

    for (pos, &i) in order.iter().enumerate() {
        let a = segments[i];
        let a_max = max_x(&a);
        for &j in &order[pos + 1..] {
            let b = segments[j];
            if min_x(&b) > a_max {
                break;
            }
            let adjacent = i.abs_diff(j) == 1 || i.abs_diff(j) == n - 1;
            match line_intersection(a, b) {
                None => {}
                Some(LineIntersection::Collinear { .. }) => return true,
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { .. }) => return true,
            }
        }
    }
    false
}
