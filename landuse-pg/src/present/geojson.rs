//! GeoJSON des parcelles affichées (geozero pour les géométries)

use std::io::Write;

use geo::Geometry;
use geozero::geojson::GeoJsonWriter;
use geozero::GeozeroGeometry;
use serde_json::json;

use super::palette::Palette;
use super::PresentError;
use crate::store::StoredParcel;

/// Écrit une FeatureCollection, une feature par parcelle
///
/// Les propriétés portent la couleur de remplissage et le contenu HTML de
/// l'infobulle, calculés ici pour que la page n'ait qu'à les appliquer.
pub fn write_feature_collection<W: Write>(
    writer: &mut W,
    parcels: &[StoredParcel],
    palette: &Palette,
    srid: u32,
) -> Result<(), PresentError> {
    write!(
        writer,
        r#"{{"type":"FeatureCollection","crs":{{"type":"name","properties":{{"name":"urn:ogc:def:crs:EPSG::{}"}}}},"features":["#,
        srid
    )?;

    for (i, parcel) in parcels.iter().enumerate() {
        if i > 0 {
            write!(writer, ",")?;
        }
        write_feature(writer, i, parcel, palette)?;
    }

    write!(writer, "]}}")?;
    Ok(())
}

fn write_feature<W: Write>(
    writer: &mut W,
    id: usize,
    parcel: &StoredParcel,
    palette: &Palette,
) -> Result<(), PresentError> {
    write!(writer, r#"{{"type":"Feature","id":{},"geometry":"#, id)?;

    let mut geom_buf = Vec::new();
    let mut geom_writer = GeoJsonWriter::new(&mut geom_buf);
    Geometry::MultiPolygon(parcel.geometry.clone()).process_geom(&mut geom_writer)?;
    writer.write_all(&geom_buf)?;

    let properties = json!({
        "class": parcel.class,
        "name": parcel.name,
        "area_ha": parcel.area_ha,
        "fill_color": palette.color_for(&parcel.class),
        "tooltip": tooltip_html(parcel),
    });
    write!(writer, r#","properties":"#)?;
    serde_json::to_writer(&mut *writer, &properties)?;
    write!(writer, "}}")?;

    Ok(())
}

/// Contenu de l'infobulle : nom, classe, surface
pub fn tooltip_html(parcel: &StoredParcel) -> String {
    format!(
        "<b>Name:</b> {}<br><b>Class:</b> {}<br><b>Area:</b> {:.2} ha",
        escape_html(parcel.name.as_deref().unwrap_or("-")),
        escape_html(&parcel.class),
        parcel.area_ha
    )
}

/// Échappe une chaîne pour HTML
pub fn escape_html(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            c => result.push(c),
        }
    }
    result
}
