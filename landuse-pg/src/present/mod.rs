//! Présentation : carte, métriques, tableau, export CSV

pub mod cache;
mod error;
pub mod export;
pub mod geojson;
pub mod map;
pub mod palette;

pub use cache::RenderCache;
pub use error::PresentError;
pub use export::{read_csv, write_csv, CsvRow};
pub use map::{render_map, render_message, DatabaseInfo, RenderedMap, Summary};
pub use palette::Palette;
