//! # landuse-shp
//!
//! Lecture de shapefiles d'occupation du sol (exports OSM `gis_osm_landuse_a_*`
//! et équivalents) : polygones, classe et nom.
//!
//! ## Features
//!
//! - Vérification des fichiers compagnons (.shx, .dbf, .prj)
//! - Détection du code EPSG depuis le .prj (WKT ESRI ou OGC)
//! - Itération paresseuse, un enregistrement à la fois
//! - Types `geo` pour l'interopérabilité avec l'écosystème Rust géospatial
//!
//! ## Usage
//!
//! ```rust,ignore
//! use landuse_shp::{ShapefileSource, ReadOptions};
//! use std::path::Path;
//!
//! let mut source = ShapefileSource::open(Path::new("landuse.shp"), ReadOptions::default())?;
//! println!("EPSG: {}", source.projection().epsg);
//!
//! for parcel in source.parcels() {
//!     let parcel = parcel?;
//!     println!("{} {}", parcel.index, parcel.class);
//! }
//! ```

pub mod error;
pub mod prj;
pub mod types;

pub use error::ShpError;
pub use types::{Projection, ReadOptions, SourceParcel};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use geo::{Geometry, MultiPolygon};
use shapefile::dbase::{FieldValue, Record};
use shapefile::Shape;
use tracing::{debug, info};

type ShpReader = shapefile::Reader<BufReader<File>, BufReader<File>>;

/// Shapefile ouvert, prêt à être itéré
pub struct ShapefileSource {
    path: PathBuf,
    reader: ShpReader,
    projection: Projection,
    class_field: String,
    name_field: Option<String>,
}

impl ShapefileSource {
    /// Ouvre un shapefile et vérifie ses fichiers compagnons.
    ///
    /// # Errors
    ///
    /// - `ShpError::MissingFile` si le .shp, .shx, .dbf (ou .prj sans SRID forcé) est absent
    /// - `ShpError::MissingField` si la colonne de classe n'existe pas dans le .dbf
    /// - `ShpError::UnknownProjection` si le .prj n'est pas reconnu
    pub fn open(path: &Path, options: ReadOptions) -> Result<Self, ShpError> {
        let shp = path.with_extension("shp");
        if !shp.is_file() {
            return Err(ShpError::MissingFile(shp.display().to_string()));
        }
        let shx = required_sidecar(&shp, "shx")?;
        let dbf = required_sidecar(&shp, "dbf")?;
        debug!(shp = %shp.display(), shx = %shx.display(), dbf = %dbf.display(), "Shapefile files found");

        let projection = match options.source_srid {
            Some(epsg) => Projection { epsg },
            None => {
                let prj = required_sidecar(&shp, "prj")?;
                prj::parse(&std::fs::read_to_string(&prj)?)?
            }
        };

        let fields = field_names(&dbf)?;
        if !fields.iter().any(|f| f == &options.class_field) {
            return Err(ShpError::MissingField {
                file: dbf.display().to_string(),
                field: options.class_field,
            });
        }
        let name_field = options.name_field.filter(|name| {
            let present = fields.iter().any(|f| f == name);
            if !present {
                debug!(field = %name, "Name field absent, names will be empty");
            }
            present
        });

        let reader = shapefile::Reader::from_path(&shp)?;

        info!(path = %shp.display(), epsg = projection.epsg, "Shapefile opened");

        Ok(Self {
            path: shp,
            reader,
            projection,
            class_field: options.class_field,
            name_field,
        })
    }

    /// Chemin du .shp
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Projection source détectée
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Nombre d'enregistrements annoncé par l'index .shx
    pub fn len(&mut self) -> Result<usize, ShpError> {
        Ok(self.reader.shape_count()?)
    }

    /// Vrai si le fichier ne contient aucun enregistrement
    pub fn is_empty(&mut self) -> Result<bool, ShpError> {
        Ok(self.len()? == 0)
    }

    /// Itère paresseusement les parcelles du fichier
    ///
    /// Une géométrie nulle ou non polygonale produit `ShpError::InvalidGeometry`
    /// pour cet enregistrement seulement ; l'itération peut continuer.
    pub fn parcels(&mut self) -> impl Iterator<Item = Result<SourceParcel, ShpError>> + '_ {
        let class_field = self.class_field.clone();
        let name_field = self.name_field.clone();

        self.reader
            .iter_shapes_and_records()
            .enumerate()
            .map(move |(index, item)| {
                let (shape, record) = item?;
                let geometry = to_multipolygon(index, shape)?;
                Ok(SourceParcel {
                    index,
                    class: text_field(&record, &class_field).unwrap_or_default(),
                    name: name_field
                        .as_deref()
                        .and_then(|field| text_field(&record, field)),
                    geometry,
                })
            })
    }
}

/// Retourne le fichier compagnon s'il existe
fn required_sidecar(shp: &Path, ext: &str) -> Result<PathBuf, ShpError> {
    let lower = shp.with_extension(ext);
    if lower.is_file() {
        return Ok(lower);
    }
    let upper = shp.with_extension(ext.to_ascii_uppercase());
    if upper.is_file() {
        return Ok(upper);
    }
    Err(ShpError::MissingFile(lower.display().to_string()))
}

/// Lit les noms de colonnes du .dbf
fn field_names(dbf: &Path) -> Result<Vec<String>, ShpError> {
    let reader = shapefile::dbase::Reader::from_path(dbf)?;
    Ok(reader
        .fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect())
}

/// Convertit une forme shapefile en MultiPolygon
fn to_multipolygon(index: usize, shape: Shape) -> Result<MultiPolygon, ShpError> {
    match &shape {
        Shape::Polygon(_) | Shape::PolygonM(_) | Shape::PolygonZ(_) => {}
        Shape::NullShape => return Err(ShpError::invalid_geometry(index, "null shape")),
        other => {
            return Err(ShpError::invalid_geometry(
                index,
                format!("expected polygon, got {:?}", other.shapetype()),
            ))
        }
    }

    let geometry = Geometry::<f64>::try_from(shape)
        .map_err(|e| ShpError::invalid_geometry(index, e.to_string()))?;

    match geometry {
        Geometry::Polygon(p) => Ok(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Ok(mp),
        _ => Err(ShpError::invalid_geometry(index, "unexpected geometry type")),
    }
}

/// Valeur texte d'une colonne (vide → None)
fn text_field(record: &Record, field: &str) -> Option<String> {
    let value = match record.get(field)? {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Memo(s) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) => n.to_string(),
        _ => return None,
    };
    (!value.is_empty()).then_some(value)
}
