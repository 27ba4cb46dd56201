//! Définition et implémentation des commandes CLI
//!
//! - `load` : shapefile → PostGIS (remplacement complet)
//! - `query` : classes et parcelles d'un filtre
//! - `render` : carte HTML dans un fichier
//! - `export` : CSV des parcelles d'un filtre
//! - `serve` : service web

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use tracing::{info, warn};

use landuse_pg::{
    create_pool, AppConfig, AppContext, AppError, ClassFilter, DatabaseConfig, LoadStatus,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Load the configured shapefile into PostGIS, replacing the table
    Load {
        /// Override the shapefile path from the config
        #[arg(short, long)]
        path: Option<PathBuf>,

        /// Skip invalid parcels instead of aborting the load
        #[arg(long)]
        skip_invalid: bool,

        /// Write the load report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// List classes, or the parcels matching a class
    Query {
        /// Land-use class (empty or "all" for every class)
        #[arg(short, long)]
        class: Option<String>,

        /// Number of parcels to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Render the filtered map to a standalone HTML file
    Render {
        #[arg(short, long)]
        class: Option<String>,

        #[arg(short, long, default_value = "map.html")]
        output: PathBuf,
    },

    /// Export the filtered parcels as CSV
    Export {
        #[arg(short, long)]
        class: Option<String>,

        #[arg(short, long, default_value = "parcels.csv")]
        output: PathBuf,

        /// Omit the WKT geometry column
        #[arg(long)]
        no_geometry: bool,
    },

    /// Serve the web application
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        listen: SocketAddr,
    },
}

/// Options de connexion communes à toutes les commandes
#[derive(Args, Debug, Default)]
pub struct DatabaseArgs {
    /// PostgreSQL host (défaut : env DB_HOST / PGHOST / localhost)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// PostgreSQL database name (défaut : env POSTGRES_DB / PGDATABASE / gis)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// PostgreSQL user (défaut : env POSTGRES_USER / PGUSER / postgres)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// PostgreSQL password (défaut : env POSTGRES_PASSWORD / PGPASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// PostgreSQL port (défaut : env DB_PORT / PGPORT / 5432)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// SSL mode: disable, prefer, require (défaut : env PGSSLMODE / disable)
    #[arg(long, global = true)]
    pub ssl: Option<String>,
}

/// Charge la configuration et applique les surcharges de `load`
pub fn resolve_config(
    config_name: &str,
    path: Option<PathBuf>,
    skip_invalid: bool,
) -> Result<AppConfig> {
    let mut config = AppConfig::resolve(config_name)
        .with_context(|| format!("Failed to load config '{}'", config_name))?;

    if let Some(path) = path {
        config.source.path = path;
    }
    if skip_invalid {
        config.store.skip_invalid = true;
    }
    Ok(config)
}

/// Construit le contexte : pool et stockage
pub fn build_context(config: AppConfig, db: DatabaseArgs) -> Result<AppContext> {
    let mut db_config = DatabaseConfig::from_env();
    apply_database_overrides(&mut db_config, db)?;
    info!(db = %db_config.target(), ssl = ?db_config.ssl_mode, "Database");

    let pool = create_pool(&db_config)?;
    Ok(AppContext::new(config, pool)?.with_database(&db_config))
}

fn apply_database_overrides(config: &mut DatabaseConfig, args: DatabaseArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.dbname = database;
    }
    if let Some(user) = args.user {
        config.user = user;
    }
    if let Some(password) = args.password {
        config.password = Some(password);
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ssl) = args.ssl {
        config.ssl_mode = ssl.parse().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

fn parse_filter(class: Option<&str>) -> ClassFilter {
    ClassFilter::parse(class.unwrap_or(""))
}

/// Exécute la commande load
pub async fn cmd_load(ctx: AppContext, report_path: Option<&Path>) -> Result<()> {
    let config = ctx.config();
    println!("=== Load {} ===", config.source.path.display());
    println!("Table: {}", config.qualified_table());
    println!("Storage SRID: {}", config.store.storage_srid);
    println!("Skip invalid: {}", config.store.skip_invalid);

    ctx.store().ping().await?;
    info!("Database connection OK");

    let report = match ctx.load().await {
        Ok(report) => report,
        Err(e) => {
            if e.is_lock_conflict() {
                warn!("Another session holds the table lock, retry once it has finished");
            } else if e.is_malformed_geometry() {
                warn!("Rerun with --skip-invalid to load the remaining parcels");
            }
            return Err(e.into());
        }
    };
    report.display();

    if let Some(path) = report_path {
        report.save_to_file(path)?;
        println!("Report saved to {}", path.display());
    }

    if report.status == LoadStatus::Failed {
        anyhow::bail!("Load failed: {}", report.summary());
    }
    Ok(())
}

/// Exécute la commande query
pub async fn cmd_query(ctx: &AppContext, class: Option<&str>, limit: usize) -> Result<()> {
    let classes = ctx.classes().await?;
    if classes.is_empty() {
        println!("No data loaded yet in {}", ctx.config().qualified_table());
        return Ok(());
    }

    println!("{:<30} {:>10} {:>16}", "class", "parcels", "area (ha)");
    for summary in &classes {
        println!(
            "{:<30} {:>10} {:>16.2}",
            summary.class, summary.count, summary.area_ha
        );
    }

    if let Some(last) = ctx.last_load().await? {
        println!(
            "\nLast load: {} ({} parcels, checksum {}) at {}",
            last.source,
            last.parcels,
            &last.checksum[..last.checksum.len().min(12)],
            last.loaded_at
        );
    }

    let filter = parse_filter(class);
    if filter == ClassFilter::All && class.is_none() {
        return Ok(());
    }

    let rendered = ctx.visualize(&filter).await?;
    let summary = rendered.summary;
    println!(
        "\nFilter '{}': {} parcels, {:.2} ha total, {:.2} ha mean",
        filter, summary.count, summary.total_area_ha, summary.mean_area_ha
    );
    for parcel in rendered.parcels.iter().take(limit) {
        println!(
            "  {:<20} {:<30} {:>12.4}",
            parcel.class,
            parcel.name.as_deref().unwrap_or("-"),
            parcel.area_ha
        );
    }
    Ok(())
}

/// Exécute la commande render
pub async fn cmd_render(ctx: &AppContext, class: Option<&str>, output: &Path) -> Result<()> {
    let filter = parse_filter(class);
    let rendered = ctx.visualize(&filter).await?;

    std::fs::write(output, &rendered.html)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Map for '{}' written to {} ({} parcels)",
        filter,
        output.display(),
        rendered.summary.count
    );
    Ok(())
}

/// Exécute la commande export
pub async fn cmd_export(
    ctx: &AppContext,
    class: Option<&str>,
    output: &Path,
    include_geometry: bool,
) -> Result<()> {
    let filter = parse_filter(class);
    match ctx.export_csv(&filter, include_geometry).await {
        Ok(csv) => {
            std::fs::write(output, csv)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("CSV for '{}' written to {}", filter, output.display());
            Ok(())
        }
        Err(AppError::EmptyResult { filter }) => {
            println!("No parcels match filter '{}', nothing exported", filter);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Exécute la commande serve
pub async fn cmd_serve(ctx: AppContext, listen: SocketAddr) -> Result<()> {
    landuse_pg::web::serve(Arc::new(ctx), listen)
        .await
        .context("Web server failed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use landuse_pg::store::SslMode;

    #[test]
    fn test_database_overrides() {
        let mut config = DatabaseConfig::default();
        let args = DatabaseArgs {
            host: Some("db".into()),
            port: Some(5433),
            ssl: Some("require".into()),
            ..DatabaseArgs::default()
        };
        apply_database_overrides(&mut config, args).unwrap();

        assert_eq!(config.host, "db");
        assert_eq!(config.port, 5433);
        assert_eq!(config.ssl_mode, SslMode::Require);
        assert_eq!(config.user, "postgres");
    }

    #[test]
    fn test_invalid_ssl_override() {
        let mut config = DatabaseConfig::default();
        let args = DatabaseArgs {
            ssl: Some("maybe".into()),
            ..DatabaseArgs::default()
        };
        assert!(apply_database_overrides(&mut config, args).is_err());
    }

    #[test]
    fn test_resolve_config_overrides() {
        let config = resolve_config("andalucia", Some(PathBuf::from("/tmp/other.shp")), true)
            .unwrap();
        assert_eq!(config.source.path, PathBuf::from("/tmp/other.shp"));
        assert!(config.store.skip_invalid);

        let config = resolve_config("andalucia", None, false).unwrap();
        assert!(!config.store.skip_invalid);
    }

    #[test]
    fn test_resolve_unknown_preset() {
        assert!(resolve_config("atlantis", None, false).is_err());
    }
}
