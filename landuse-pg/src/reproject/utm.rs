//! Projection UTM (Universal Transverse Mercator)
//!
//! Formules de Snyder (USGS PP 1395), précision sub-métrique dans la zone.
//! Zones typiques :
//! - ETRS89 / UTM 30N (EPSG:25830) - Andalousie, Espagne continentale
//! - WGS84 / UTM 326xx (nord) et 327xx (sud)

use super::ellipsoid::Ellipsoid;
use super::Geographic;

/// Facteur d'échelle sur le méridien central
const K0: f64 = 0.9996;
/// False easting
const X0: f64 = 500_000.0;
/// False northing de l'hémisphère sud
const Y0_SOUTH: f64 = 10_000_000.0;

/// Paramètres d'une zone UTM
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtmZone {
    pub zone: u32,
    pub south: bool,
    pub ellipsoid: Ellipsoid,
}

impl UtmZone {
    /// Longitude du méridien central (radians)
    fn central_meridian(&self) -> f64 {
        ((self.zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians()
    }

    fn false_northing(&self) -> f64 {
        if self.south {
            Y0_SOUTH
        } else {
            0.0
        }
    }

    /// Longueur de l'arc de méridien depuis l'équateur
    fn meridian_arc(&self, phi: f64) -> f64 {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
    }

    /// Coordonnées géographiques → UTM (mètres)
    pub fn forward(&self, geo: Geographic) -> (f64, f64) {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ellipsoid.ep2();

        let phi = geo.lat;
        let (sin_phi, cos_phi, tan_phi) = (phi.sin(), phi.cos(), phi.tan());

        let n = a / (1.0 - e2 * sin_phi.powi(2)).sqrt();
        let t = tan_phi.powi(2);
        let c = ep2 * cos_phi.powi(2);
        let big_a = cos_phi * (geo.lon - self.central_meridian());
        let m = self.meridian_arc(phi);

        let x = K0
            * n
            * (big_a
                + (1.0 - t + c) * big_a.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0)
            + X0;

        let y = K0
            * (m + n
                * tan_phi
                * (big_a.powi(2) / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * big_a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                        / 720.0))
            + self.false_northing();

        (x, y)
    }

    /// UTM (mètres) → coordonnées géographiques
    pub fn inverse(&self, x: f64, y: f64) -> Geographic {
        let a = self.ellipsoid.a;
        let e2 = self.ellipsoid.e2();
        let ep2 = self.ellipsoid.ep2();

        let x = x - X0;
        let y = y - self.false_northing();

        // Latitude de pied (footprint latitude)
        let m = y / K0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2.powi(2) / 64.0 - 5.0 * e2.powi(3) / 256.0));
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1.powi(2) / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1, tan_phi1) = (phi1.sin(), phi1.cos(), phi1.tan());

        let n1 = a / (1.0 - e2 * sin_phi1.powi(2)).sqrt();
        let t1 = tan_phi1.powi(2);
        let c1 = ep2 * cos_phi1.powi(2);
        let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1.powi(2)).powf(1.5);
        let d = x / (n1 * K0);

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d.powi(2) / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1.powi(2) - 9.0 * ep2) * d.powi(4)
                        / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1.powi(2)
                        - 252.0 * ep2
                        - 3.0 * c1.powi(2))
                        * d.powi(6)
                        / 720.0);

        let lon = self.central_meridian()
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1.powi(2) + 8.0 * ep2
                    + 24.0 * t1.powi(2))
                    * d.powi(5)
                    / 120.0)
                / cos_phi1;

        Geographic::new(lon, lat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone_30n() -> UtmZone {
        UtmZone {
            zone: 30,
            south: false,
            ellipsoid: Ellipsoid::GRS80,
        }
    }

    #[test]
    fn test_central_meridian_origin() {
        let (x, y) = zone_30n().forward(Geographic::from_degrees(-3.0, 0.0));
        assert!((x - 500_000.0).abs() < 1e-6, "x={}", x);
        assert!(y.abs() < 1e-6, "y={}", y);
    }

    #[test]
    fn test_seville_forward() {
        // Séville: -5.98°E, 37.39°N → ETRS89 / UTM 30N ≈ (236180, 4142306)
        let (x, y) = zone_30n().forward(Geographic::from_degrees(-5.98, 37.39));
        assert!((x - 236_180.0).abs() < 5.0, "x={}", x);
        assert!((y - 4_142_306.0).abs() < 5.0, "y={}", y);
    }

    #[test]
    fn test_seville_roundtrip() {
        let zone = zone_30n();
        let (x, y) = zone.forward(Geographic::from_degrees(-5.98, 37.39));
        let (lon, lat) = zone.inverse(x, y).to_degrees();

        assert!((lon - (-5.98)).abs() < 1e-6, "lon={}", lon);
        assert!((lat - 37.39).abs() < 1e-6, "lat={}", lat);
    }

    #[test]
    fn test_reunion_south() {
        // Saint-Denis approximativement, UTM Zone 40S: 338000, 7691000
        let zone = UtmZone {
            zone: 40,
            south: true,
            ellipsoid: Ellipsoid::WGS84,
        };
        let (lon, lat) = zone.inverse(338_000.0, 7_691_000.0).to_degrees();

        assert!((lon - 55.45).abs() < 0.2, "lon={}", lon);
        assert!((lat - (-20.88)).abs() < 0.2, "lat={}", lat);
    }
}
