//! # landuse-pg
//!
//! Chargement d'un shapefile d'occupation du sol dans PostGIS, puis carte
//! filtrée par classe avec statistiques de surface et export CSV.
//!
//! ## Features
//!
//! - Reprojection Rust pur (WGS84, ETRS89/UTM, Web Mercator), PROJ en repli
//! - Surfaces en hectares calculées dans le SRID de stockage
//! - Remplacement atomique de la table (une transaction)
//! - Carte Leaflet autonome, cache de rendu par filtre
//! - Service web (axum) et CLI
//!
//! ## Usage CLI
//!
//! ```bash
//! # Charger le shapefile du preset
//! landuse-pg load --config andalucia
//!
//! # Rendre la carte des forêts dans un fichier
//! landuse-pg render --class forest --output forest.html
//!
//! # Servir l'application
//! landuse-pg serve --listen 0.0.0.0:8080
//! ```

pub mod calculator;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod present;
pub mod report;
pub mod reproject;
pub mod store;
pub mod web;

pub use calculator::{ParcelCalculator, PreparedParcel};
pub use config::AppConfig;
pub use error::AppError;
pub use filter::ClassFilter;
pub use pipeline::AppContext;
pub use report::{LoadReport, LoadStatus};
pub use store::{create_pool, DatabaseConfig, ParcelStore, StoreError, StoredParcel};
