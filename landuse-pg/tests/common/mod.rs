//! Shapefiles de test générés à la volée

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};
use tempfile::TempDir;

const WGS84_PRJ: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137,298.257223563]],PRIMEM["Greenwich",0],UNIT["Degree",0.017453292519943295]]"#;

/// Répertoire supprimé à la fin du test
pub fn fixture_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

/// Carré de 0.005° (~24.5 ha à la latitude de Séville)
fn square(x: f64, y: f64) -> Polygon {
    let size = 0.005;
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x, y),
        Point::new(x, y + size),
        Point::new(x + size, y + size),
        Point::new(x + size, y),
        Point::new(x, y),
    ]))
}

/// 100 forêts puis 50 réserves naturelles, en grille autour de Séville
pub fn write_fixture(dir: &Path) -> PathBuf {
    write_parcels(dir, 100, 50)
}

fn landuse_table() -> TableWriterBuilder {
    TableWriterBuilder::new()
        .add_character_field("fclass".try_into().unwrap(), 40)
        .add_character_field("name".try_into().unwrap(), 80)
}

fn class_record(class: &str, name: Option<String>) -> Record {
    let mut record = Record::default();
    record.insert(
        "fclass".to_string(),
        FieldValue::Character(Some(class.to_string())),
    );
    record.insert("name".to_string(), FieldValue::Character(name));
    record
}

/// `forests` forêts puis `reserves` réserves naturelles
pub fn write_parcels(dir: &Path, forests: usize, reserves: usize) -> PathBuf {
    let path = dir.join("gis_osm_landuse_a_free_1.shp");
    let table = landuse_table();

    {
        let mut writer = shapefile::Writer::from_path(&path, table).unwrap();
        for i in 0..forests + reserves {
            let class = if i < forests { "forest" } else { "nature_reserve" };
            let record = class_record(class, (i % 3 == 0).then(|| format!("Parcela {}", i)));
            let x = -6.0 + (i % 15) as f64 * 0.01;
            let y = 37.30 + (i / 15) as f64 * 0.01;
            writer.write_shape_and_record(&square(x, y), &record).unwrap();
        }
    }

    std::fs::write(path.with_extension("prj"), WGS84_PRJ).unwrap();
    path
}

/// Shapefile de points : aucune parcelle polygonale valide
pub fn write_points(dir: &Path, count: usize) -> PathBuf {
    let path = dir.join("landuse_points.shp");
    {
        let mut writer = shapefile::Writer::from_path(&path, landuse_table()).unwrap();
        for i in 0..count {
            let point = Point::new(-6.0 + i as f64 * 0.01, 37.38);
            writer
                .write_shape_and_record(&point, &class_record("forest", None))
                .unwrap();
        }
    }

    std::fs::write(path.with_extension("prj"), WGS84_PRJ).unwrap();
    path
}
