//! Reprojection légère en Rust pur, avec repli sur PROJ
//!
//! Systèmes supportés sans dépendance externe :
//! - WGS84 géographique (EPSG:4326) et ETRS89 géographique (EPSG:4258)
//! - Web Mercator (EPSG:3857)
//! - UTM WGS84 nord/sud (EPSG:326xx / 327xx)
//! - UTM ETRS89 (EPSG:258xx), dont 25830 pour l'Andalousie
//!
//! Le changement de datum ETRS89 ↔ WGS84 est ignoré (écart < 1 m).

mod ellipsoid;
mod mercator;
#[cfg(feature = "reproject")]
mod proj;
mod smart;
mod utm;

pub use ellipsoid::Ellipsoid;
#[cfg(feature = "reproject")]
pub use proj::Reprojector;
pub use smart::SmartReprojector;
pub use utm::UtmZone;

use anyhow::{bail, Result};
use geo::{Coord, MapCoords, MultiPolygon};

/// Point en coordonnées géographiques (radians)
#[derive(Debug, Clone, Copy)]
pub struct Geographic {
    /// Longitude en radians
    pub lon: f64,
    /// Latitude en radians
    pub lat: f64,
}

impl Geographic {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Convertit en degrés
    pub fn to_degrees(self) -> (f64, f64) {
        (self.lon.to_degrees(), self.lat.to_degrees())
    }

    /// Crée depuis des degrés
    pub fn from_degrees(lon_deg: f64, lat_deg: f64) -> Self {
        Self {
            lon: lon_deg.to_radians(),
            lat: lat_deg.to_radians(),
        }
    }
}

/// Système de coordonnées connu de la reprojection légère
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crs {
    /// Longitude/latitude en degrés
    Geographic { epsg: u32 },
    /// Pseudo-Mercator sphérique
    WebMercator,
    /// Transverse Mercator universelle
    Utm { epsg: u32, zone: UtmZone },
}

impl Crs {
    /// Résout un code EPSG, `None` si non supporté en Rust pur
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        let utm = |zone: u32, south: bool, ellipsoid: Ellipsoid| {
            (1..=60).contains(&zone).then_some(Crs::Utm {
                epsg,
                zone: UtmZone {
                    zone,
                    south,
                    ellipsoid,
                },
            })
        };

        match epsg {
            4326 | 4258 => Some(Crs::Geographic { epsg }),
            3857 => Some(Crs::WebMercator),
            32601..=32660 => utm(epsg - 32600, false, Ellipsoid::WGS84),
            32701..=32760 => utm(epsg - 32700, true, Ellipsoid::WGS84),
            25801..=25860 => utm(epsg - 25800, false, Ellipsoid::GRS80),
            _ => None,
        }
    }

    /// Code EPSG
    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Geographic { epsg } | Crs::Utm { epsg, .. } => *epsg,
            Crs::WebMercator => 3857,
        }
    }

    /// Vrai pour un système métrique (surfaces planes calculables)
    pub fn is_projected(&self) -> bool {
        !matches!(self, Crs::Geographic { .. })
    }

    fn to_geographic(&self, x: f64, y: f64) -> Geographic {
        match self {
            Crs::Geographic { .. } => Geographic::from_degrees(x, y),
            Crs::WebMercator => mercator::web_mercator_to_geographic(x, y),
            Crs::Utm { zone, .. } => zone.inverse(x, y),
        }
    }

    fn from_geographic(&self, geo: Geographic) -> (f64, f64) {
        match self {
            Crs::Geographic { .. } => geo.to_degrees(),
            Crs::WebMercator => mercator::geographic_to_web_mercator(geo),
            Crs::Utm { zone, .. } => zone.forward(geo),
        }
    }
}

/// Reprojection en Rust pur entre deux systèmes connus
#[derive(Debug, Clone, Copy)]
pub struct ReprojectorLite {
    source: Crs,
    target: Crs,
}

impl ReprojectorLite {
    /// Crée un nouveau reprojector
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let Some(source) = Crs::from_epsg(source_epsg) else {
            bail!(
                "EPSG:{} not supported. Supported: 4326, 4258, 3857, 326xx, 327xx, 258xx",
                source_epsg
            );
        };
        let Some(target) = Crs::from_epsg(target_epsg) else {
            bail!(
                "EPSG:{} not supported. Supported: 4326, 4258, 3857, 326xx, 327xx, 258xx",
                target_epsg
            );
        };

        Ok(Self { source, target })
    }

    /// Vérifie si la reprojection est supportée
    pub fn is_supported(source: u32, target: u32) -> bool {
        Crs::from_epsg(source).is_some() && Crs::from_epsg(target).is_some()
    }

    /// Transforme un point (x, y) de la source vers la cible
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        let (tx, ty) = self.target.from_geographic(self.source.to_geographic(x, y));
        if !tx.is_finite() || !ty.is_finite() {
            bail!(
                "Non-finite result reprojecting ({}, {}) from EPSG:{} to EPSG:{}",
                x,
                y,
                self.source.epsg(),
                self.target.epsg()
            );
        }
        Ok((tx, ty))
    }

    /// Transforme un MultiPolygon (anneaux extérieurs et intérieurs)
    pub fn transform(&self, geom: &MultiPolygon) -> Result<MultiPolygon> {
        geom.try_map_coords(|c| {
            let (x, y) = self.transform_point(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }
}
