//! Connexion PostGIS : paramètres, TLS et pool

use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime, Timeouts};
use tokio_postgres::NoTls;
use tokio_postgres_rustls::MakeRustlsConnect;

/// Nom de session visible dans `pg_stat_activity`
const APPLICATION_NAME: &str = "landuse-pg";

// Variables lues par `from_env`, par ordre de priorité
const ENV_HOST: &[&str] = &["DB_HOST", "PGHOST"];
const ENV_PORT: &[&str] = &["DB_PORT", "PGPORT"];
const ENV_DBNAME: &[&str] = &["POSTGRES_DB", "PGDATABASE"];
const ENV_USER: &[&str] = &["POSTGRES_USER", "PGUSER"];
const ENV_PASSWORD: &[&str] = &["POSTGRES_PASSWORD", "PGPASSWORD"];
const ENV_POOL_SIZE: &[&str] = &["POOL_SIZE"];
const ENV_SSL: &[&str] = &["PGSSLMODE"];
const ENV_CONNECT_TIMEOUT: &[&str] = &["DB_CONNECT_TIMEOUT", "PGCONNECT_TIMEOUT"];

/// Mode SSL pour la connexion PostgreSQL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Pas de SSL (défaut)
    #[default]
    Disable,
    /// SSL si le serveur le propose
    Prefer,
    /// Connexion refusée sans SSL
    Require,
}

impl SslMode {
    fn to_driver(self) -> deadpool_postgres::SslMode {
        match self {
            Self::Disable => deadpool_postgres::SslMode::Disable,
            Self::Prefer => deadpool_postgres::SslMode::Prefer,
            Self::Require => deadpool_postgres::SslMode::Require,
        }
    }
}

impl std::str::FromStr for SslMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disable" | "off" | "false" | "no" => Ok(SslMode::Disable),
            "prefer" => Ok(SslMode::Prefer),
            "require" | "on" | "true" | "yes" => Ok(SslMode::Require),
            _ => Err(format!("Invalid SSL mode: {}. Use: disable, prefer, require", s)),
        }
    }
}

/// Paramètres de connexion à la base PostGIS
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub pool_size: usize,
    pub ssl_mode: SslMode,
    /// Délai d'ouverture d'une connexion
    pub connect_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            dbname: "gis".into(),
            user: "postgres".into(),
            password: None,
            pool_size: 4,
            ssl_mode: SslMode::Disable,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Première variable définie et non vide
fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

fn env_parsed<T: std::str::FromStr>(names: &[&str]) -> Option<T> {
    env_any(names).and_then(|value| value.parse().ok())
}

impl DatabaseConfig {
    /// Charge la configuration depuis les variables d'environnement
    ///
    /// Les noms du déploiement Docker (`DB_HOST`, `POSTGRES_DB`...) priment sur
    /// les variables libpq (`PGHOST`, `PGDATABASE`...).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_any(ENV_HOST).unwrap_or(defaults.host),
            port: env_parsed(ENV_PORT).unwrap_or(defaults.port),
            dbname: env_any(ENV_DBNAME).unwrap_or(defaults.dbname),
            user: env_any(ENV_USER).unwrap_or(defaults.user),
            password: env_any(ENV_PASSWORD),
            pool_size: env_parsed(ENV_POOL_SIZE).unwrap_or(defaults.pool_size),
            ssl_mode: env_parsed(ENV_SSL).unwrap_or_default(),
            connect_timeout: env_parsed(ENV_CONNECT_TIMEOUT)
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
        }
    }

    /// `user@host:port/dbname`, sans mot de passe
    pub fn target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.dbname)
    }

    /// Configuration deadpool équivalente
    fn pool_config(&self) -> Config {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = self.password.clone();
        cfg.application_name = Some(APPLICATION_NAME.into());
        cfg.ssl_mode = Some(self.ssl_mode.to_driver());
        cfg.connect_timeout = Some(self.connect_timeout);

        cfg.pool = Some(PoolConfig {
            max_size: self.pool_size.max(1),
            timeouts: Timeouts {
                wait: Some(Duration::from_secs(30)),
                create: Some(self.connect_timeout),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });
        cfg
    }
}

/// Connecteur rustls avec les racines webpki
fn make_tls_connector() -> MakeRustlsConnect {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    MakeRustlsConnect::new(config)
}

/// Crée le pool de connexions
///
/// Aucune connexion n'est ouverte ici : la première est établie au premier `get`.
pub fn create_pool(config: &DatabaseConfig) -> Result<Pool> {
    let cfg = config.pool_config();
    let target = config.target();

    match config.ssl_mode {
        SslMode::Disable => cfg.create_pool(Some(Runtime::Tokio1), NoTls),
        SslMode::Prefer | SslMode::Require => {
            cfg.create_pool(Some(Runtime::Tokio1), make_tls_connector())
        }
    }
    .with_context(|| format!("Failed to create database pool for {}", target))
}
