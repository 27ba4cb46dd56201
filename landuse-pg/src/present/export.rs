//! Export CSV des parcelles affichées
//!
//! En-tête `class,area_ha,geometry`, géométrie en WKT (colonne omise sur demande).

use std::io::{Read, Write};

use geo::Geometry;
use geozero::wkt::WktWriter;
use geozero::GeozeroGeometry;
use serde::{Deserialize, Serialize};

use super::PresentError;
use crate::store::StoredParcel;

/// Ligne du CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    pub class: String,
    pub area_ha: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
}

/// Écrit les parcelles en CSV
pub fn write_csv<W: Write>(
    writer: W,
    parcels: &[StoredParcel],
    include_geometry: bool,
) -> Result<(), PresentError> {
    let mut csv = csv::Writer::from_writer(writer);

    if include_geometry {
        csv.write_record(["class", "area_ha", "geometry"])?;
    } else {
        csv.write_record(["class", "area_ha"])?;
    }

    let mut wkt_buf = Vec::new();
    for parcel in parcels {
        let area = parcel.area_ha.to_string();
        if include_geometry {
            wkt_buf.clear();
            {
                let mut writer = WktWriter::new(&mut wkt_buf);
                Geometry::MultiPolygon(parcel.geometry.clone()).process_geom(&mut writer)?;
            }
            let wkt = String::from_utf8_lossy(&wkt_buf);
            csv.write_record([parcel.class.as_str(), area.as_str(), wkt.as_ref()])?;
        } else {
            csv.write_record([parcel.class.as_str(), area.as_str()])?;
        }
    }

    csv.flush()?;
    Ok(())
}

/// Relit un CSV produit par `write_csv`
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<CsvRow>, PresentError> {
    let mut csv = csv::Reader::from_reader(reader);
    let rows = csv.deserialize().collect::<Result<Vec<CsvRow>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};

    fn parcels() -> Vec<StoredParcel> {
        vec![
            StoredParcel {
                class: "forest".into(),
                name: Some("Sierra, Norte".into()),
                area_ha: 98.2745,
                geometry: MultiPolygon::new(vec![polygon![
                    (x: -5.99, y: 37.38),
                    (x: -5.98, y: 37.38),
                    (x: -5.98, y: 37.39),
                    (x: -5.99, y: 37.38),
                ]]),
            },
            StoredParcel {
                class: "nature_reserve".into(),
                name: None,
                area_ha: 0.0123456789,
                geometry: MultiPolygon::new(vec![polygon![
                    (x: 0.0, y: 0.0),
                    (x: 1.0, y: 0.0),
                    (x: 1.0, y: 1.0),
                    (x: 0.0, y: 0.0),
                ]]),
            },
        ]
    }

    #[test]
    fn test_csv_with_geometry() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &parcels(), true).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("class,area_ha,geometry\n"));
        assert!(text.contains("MULTIPOLYGON"));

        let rows = read_csv(buf.as_slice()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].class, "forest");
        assert!((rows[0].area_ha - 98.2745).abs() < 1e-9);
        assert!((rows[1].area_ha - 0.0123456789).abs() < 1e-12);
        assert!(rows[1].geometry.as_deref().unwrap().starts_with("MULTIPOLYGON"));
    }

    #[test]
    fn test_csv_without_geometry() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &parcels(), false).unwrap();

        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("class,area_ha\n"));
        assert!(!text.contains("MULTIPOLYGON"));

        let rows = read_csv(buf.as_slice()).unwrap();
        assert_eq!(rows[1].class, "nature_reserve");
        assert_eq!(rows[1].geometry, None);
    }

    #[test]
    fn test_csv_header_only_when_empty() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &[], true).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "class,area_ha,geometry\n");
    }
}
