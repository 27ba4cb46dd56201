//! Page HTML autonome : carte Leaflet, métriques, tableau

use std::fmt::Write as _;

use geo::Centroid;
use serde::Serialize;

use super::geojson::{escape_html, write_feature_collection};
use super::palette::{Palette, FILL_OPACITY, STROKE_COLOR, STROKE_WEIGHT};
use super::PresentError;
use crate::config::MapConfig;
use crate::filter::ClassFilter;
use crate::store::StoredParcel;

const LEAFLET_CSS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.css";
const LEAFLET_JS: &str = "https://unpkg.com/leaflet@1.9.4/dist/leaflet.js";

/// Métriques affichées au-dessus de la carte
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub total_area_ha: f64,
    pub mean_area_ha: f64,
}

impl Summary {
    pub fn from_parcels(parcels: &[StoredParcel]) -> Self {
        let count = parcels.len();
        let total_area_ha: f64 = parcels.iter().map(|p| p.area_ha).sum();
        let mean_area_ha = if count == 0 {
            0.0
        } else {
            total_area_ha / count as f64
        };
        Self {
            count,
            total_area_ha,
            mean_area_ha,
        }
    }
}

/// Résultat d'un rendu, conservé dans le cache
///
/// Les parcelles affichées sont gardées pour que l'export CSV porte exactement
/// sur les mêmes lignes.
#[derive(Debug, Clone)]
pub struct RenderedMap {
    pub filter: ClassFilter,
    pub html: String,
    pub parcels: Vec<StoredParcel>,
    pub summary: Summary,
}

impl RenderedMap {
    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}

/// Base affichée dans le panneau d'information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseInfo {
    pub database: String,
    pub table: String,
    pub host: String,
    pub port: u16,
}

/// Centre de la carte : moyenne des centroïdes des parcelles (lon, lat)
pub fn map_center(parcels: &[StoredParcel]) -> Option<(f64, f64)> {
    let centroids: Vec<_> = parcels
        .iter()
        .filter_map(|p| p.geometry.centroid())
        .collect();
    if centroids.is_empty() {
        return None;
    }
    let n = centroids.len() as f64;
    let lon = centroids.iter().map(|c| c.x()).sum::<f64>() / n;
    let lat = centroids.iter().map(|c| c.y()).sum::<f64>() / n;
    Some((lon, lat))
}

/// Rend la page pour un filtre
///
/// Les géométries doivent être en EPSG:4326 (coordonnées Leaflet).
pub fn render_map(
    parcels: Vec<StoredParcel>,
    filter: &ClassFilter,
    config: &MapConfig,
    database: Option<&DatabaseInfo>,
) -> Result<RenderedMap, PresentError> {
    let palette = Palette::from_config(config);
    let summary = Summary::from_parcels(&parcels);

    let mut html = String::with_capacity(4096 + parcels.len() * 512);
    write_head(&mut html, &config.title);
    write_controls(&mut html, filter, config);
    if let Some(database) = database {
        write_info(&mut html, database);
    }

    match map_center(&parcels) {
        Some(center) => {
            let mut geojson = Vec::new();
            write_feature_collection(&mut geojson, &parcels, &palette, 4326)?;
            // Le JSON est embarqué dans un <script>
            let geojson = String::from_utf8_lossy(&geojson).replace("</", "<\\/");

            write_summary(&mut html, &summary);
            write_map(&mut html, &geojson, center, config);
            write_legend(&mut html, &palette);
            write_table(&mut html, &parcels, config.table_rows);
        }
        None => {
            let _ = write!(
                html,
                r#"<div class="notice">No parcels to display for filter <b>{}</b>. Load the data or choose another class.</div>"#,
                escape_html(&filter.to_string())
            );
        }
    }

    html.push_str("</body>\n</html>\n");

    Ok(RenderedMap {
        filter: filter.clone(),
        html,
        parcels,
        summary,
    })
}

/// Page d'erreur ou d'information minimale
pub fn render_message(title: &str, message: &str) -> String {
    let mut html = String::new();
    write_head(&mut html, title);
    let _ = write!(
        html,
        r#"<div class="notice">{}</div><p><a href="/">Back to map</a></p></body>
</html>
"#,
        escape_html(message)
    );
    html
}

fn write_head(html: &mut String, title: &str) {
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="{css}">
<style>
body {{ font-family: sans-serif; margin: 1em 2em; }}
.controls form {{ display: inline-block; margin-right: 1em; }}
.metrics {{ display: flex; gap: 2em; margin: 1em 0; }}
.metric b {{ display: block; font-size: 1.4em; }}
.info {{ color: #555; margin: .5em 0; }}
.notice {{ padding: 1em; background: #fff3cd; border: 1px solid #e0c36b; margin: 1em 0; }}
.legend span {{ display: inline-block; width: 1em; height: 1em; margin: 0 .3em 0 1em; vertical-align: middle; }}
table {{ border-collapse: collapse; margin-top: 1em; }}
td, th {{ border: 1px solid #ccc; padding: .2em .6em; }}
td.num {{ text-align: right; }}
#mouse-position {{ background: rgba(255,255,255,.8); padding: 0 .4em; font-size: 11px; }}
</style>
</head>
<body>
<h1>{title}</h1>
"#,
        title = escape_html(title),
        css = LEAFLET_CSS
    );
}

fn write_controls(html: &mut String, filter: &ClassFilter, config: &MapConfig) {
    html.push_str(r#"<div class="controls"><form method="get" action="/map"><label>Land use: <select name="class" onchange="this.form.submit()">"#);
    for option in &config.filters {
        let value = option.filter();
        let selected = if &value == filter { " selected" } else { "" };
        let _ = write!(
            html,
            r#"<option value="{}"{}>{}</option>"#,
            escape_html(&value.to_string()),
            selected,
            escape_html(&option.label)
        );
    }
    // Filtre hors liste (saisi dans l'URL)
    if !config.filters.iter().any(|o| &o.filter() == filter) {
        let _ = write!(
            html,
            r#"<option value="{0}" selected>{0}</option>"#,
            escape_html(&filter.to_string())
        );
    }
    let _ = write!(
        html,
        r#"</select></label> <noscript><button type="submit">Show</button></noscript></form>
<form method="post" action="/load"><button type="submit">Load data into PostGIS</button></form>
<form method="post" action="/cache/clear"><button type="submit">Clear cache</button></form>
<form method="get" action="/export.csv"><input type="hidden" name="class" value="{}"><button type="submit">Download CSV</button></form>
</div>
"#,
        escape_html(&filter.to_string())
    );
}

fn write_info(html: &mut String, database: &DatabaseInfo) {
    let _ = write!(
        html,
        r#"<div class="info">Database <b>{}</b> &middot; Table <b>{}</b> &middot; Host <b>{}:{}</b></div>
"#,
        escape_html(&database.database),
        escape_html(&database.table),
        escape_html(&database.host),
        database.port
    );
}

fn write_summary(html: &mut String, summary: &Summary) {
    let _ = write!(
        html,
        r#"<div class="metrics">
<div class="metric">Total area<b>{:.2} ha</b></div>
<div class="metric">Parcels<b>{}</b></div>
<div class="metric">Mean area<b>{:.2} ha</b></div>
</div>
"#,
        summary.total_area_ha, summary.count, summary.mean_area_ha
    );
}

fn write_map(html: &mut String, geojson: &str, center: (f64, f64), config: &MapConfig) {
    let (lon, lat) = center;
    let _ = write!(
        html,
        r#"<div id="map" style="width: {width}px; height: {height}px;"></div>
<script src="{js}"></script>
<script>
const parcels = {geojson};
const map = L.map('map').setView([{lat}, {lon}], {zoom});
L.tileLayer('https://{{s}}.tile.openstreetmap.org/{{z}}/{{x}}/{{y}}.png', {{
  attribution: '&copy; OpenStreetMap contributors'
}}).addTo(map);
L.geoJSON(parcels, {{
  style: f => ({{
    fillColor: f.properties.fill_color,
    color: '{stroke}',
    weight: {weight},
    fillOpacity: {opacity}
  }}),
  onEachFeature: (f, layer) => layer.bindTooltip(f.properties.tooltip, {{ sticky: true }})
}}).addTo(map);
const MousePosition = L.Control.extend({{
  options: {{ position: 'bottomleft' }},
  onAdd: function () {{
    const div = L.DomUtil.create('div');
    div.id = 'mouse-position';
    map.on('mousemove', e => {{
      div.textContent = e.latlng.lat.toFixed(5) + ', ' + e.latlng.lng.toFixed(5);
    }});
    return div;
  }}
}});
new MousePosition().addTo(map);
</script>
"#,
        width = config.width,
        height = config.height,
        js = LEAFLET_JS,
        geojson = geojson,
        lat = lat,
        lon = lon,
        zoom = config.zoom_start,
        stroke = STROKE_COLOR,
        weight = STROKE_WEIGHT,
        opacity = FILL_OPACITY,
    );
}

fn write_legend(html: &mut String, palette: &Palette) {
    html.push_str(r#"<div class="legend">"#);
    for (class, color) in palette.entries() {
        let _ = write!(
            html,
            r#"<span style="background: {};"></span>{}"#,
            escape_html(color),
            escape_html(class)
        );
    }
    let _ = write!(
        html,
        r#"<span style="background: {};"></span>other</div>
"#,
        escape_html(palette.default_color())
    );
}

fn write_table(html: &mut String, parcels: &[StoredParcel], rows: usize) {
    let _ = write!(
        html,
        "<h2>Parcels (first {} of {})</h2>\n<table>\n<tr><th>Class</th><th>Name</th><th>Area (ha)</th></tr>\n",
        rows.min(parcels.len()),
        parcels.len()
    );
    for parcel in parcels.iter().take(rows) {
        let _ = writeln!(
            html,
            r#"<tr><td>{}</td><td>{}</td><td class="num">{:.4}</td></tr>"#,
            escape_html(&parcel.class),
            escape_html(parcel.name.as_deref().unwrap_or("")),
            parcel.area_ha
        );
    }
    html.push_str("</table>\n");
}
