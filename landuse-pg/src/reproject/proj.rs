//! Reprojection de polygones avec PROJ
//!
//! Disponible uniquement avec la feature `reproject`.

use anyhow::{bail, Context, Result};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use proj::Proj;

/// Reprojection entre deux codes EPSG quelconques connus de PROJ
pub struct Reprojector {
    proj: Proj,
    source_epsg: u32,
    target_epsg: u32,
}

impl Reprojector {
    pub fn new(source_epsg: u32, target_epsg: u32) -> Result<Self> {
        let source = format!("EPSG:{}", source_epsg);
        let target = format!("EPSG:{}", target_epsg);

        let proj = Proj::new_known_crs(&source, &target, None).context(format!(
            "Failed to create projection from {} to {}",
            source, target
        ))?;

        Ok(Self {
            proj,
            source_epsg,
            target_epsg,
        })
    }

    pub fn source_epsg(&self) -> u32 {
        self.source_epsg
    }

    pub fn target_epsg(&self) -> u32 {
        self.target_epsg
    }

    /// Transforme un point unique
    pub fn transform_point(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        self.proj
            .convert((x, y))
            .context("Coordinate transformation failed")
    }

    /// Transforme un MultiPolygon anneau par anneau
    pub fn transform(&self, geom: &MultiPolygon) -> Result<MultiPolygon> {
        let polygons: Result<Vec<Polygon>> =
            geom.0.iter().map(|p| self.transform_polygon(p)).collect();
        Ok(MultiPolygon::new(polygons?))
    }

    /// Conversion par lot d'un anneau
    fn transform_ring(&self, ring: &LineString) -> Result<LineString> {
        let mut coords: Vec<(f64, f64)> = ring.0.iter().map(|c| (c.x, c.y)).collect();

        self.proj
            .convert_array(&mut coords)
            .context("Batch coordinate transformation failed")?;

        if coords.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            bail!(
                "Non-finite coordinate reprojecting from EPSG:{} to EPSG:{}",
                self.source_epsg,
                self.target_epsg
            );
        }

        Ok(LineString::new(
            coords.into_iter().map(|(x, y)| Coord { x, y }).collect(),
        ))
    }

    fn transform_polygon(&self, p: &Polygon) -> Result<Polygon> {
        let exterior = self.transform_ring(p.exterior())?;
        let interiors: Result<Vec<LineString>> =
            p.interiors().iter().map(|r| self.transform_ring(r)).collect();
        Ok(Polygon::new(exterior, interiors?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn test_wgs84_to_etrs89_utm30() {
        let reprojector = Reprojector::new(4326, 25830).unwrap();
        let (x, y) = reprojector.transform_point(-5.98, 37.39).unwrap();

        assert!((x - 236_180.0).abs() < 5.0, "x={}", x);
        assert!((y - 4_142_306.0).abs() < 5.0, "y={}", y);
    }

    #[test]
    fn test_polygon_transform() {
        let reprojector = Reprojector::new(25830, 4326).unwrap();
        let square = MultiPolygon::new(vec![polygon![
            (x: 236_000.0, y: 4_142_000.0),
            (x: 236_100.0, y: 4_142_000.0),
            (x: 236_100.0, y: 4_142_100.0),
            (x: 236_000.0, y: 4_142_100.0),
            (x: 236_000.0, y: 4_142_000.0),
        ]]);

        let result = reprojector.transform(&square).unwrap();
        let first = result.0[0].exterior().0[0];
        assert_eq!(result.0[0].exterior().0.len(), 5);
        assert!(first.x > -6.1 && first.x < -5.9, "lon={}", first.x);
        assert!(first.y > 37.3 && first.y < 37.5, "lat={}", first.y);
    }

    #[test]
    fn test_invalid_epsg() {
        assert!(Reprojector::new(99999, 4326).is_err());
    }
}
