//! Stockage PostGIS des parcelles
//!
//! - `pool` : connexions (deadpool, TLS optionnel)
//! - `postgres` : requêtes SQL
//! - `transaction` : remplacement complet atomique

pub mod pool;
pub mod postgres;
pub mod transaction;

pub use pool::{create_pool, DatabaseConfig, SslMode};
pub use transaction::ReplaceLoad;

use std::error::Error as _;
use std::sync::LazyLock;

use deadpool_postgres::{Pool, PoolError};
use geo::MultiPolygon;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio_postgres::error::SqlState;
use tracing::{debug, info};

use crate::calculator::PreparedParcel;
use crate::config::StoreConfig;
use crate::filter::ClassFilter;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_][a-z0-9_]{0,62}$").expect("static regex"));

/// Erreurs du stockage, par catégorie
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database unreachable: {0}")]
    Connection(String),

    #[error("Table locked by another session: {0}")]
    LockConflict(String),

    #[error("Malformed geometry: {message}")]
    MalformedGeometry {
        index: Option<usize>,
        message: String,
    },

    #[error("PostGIS extension unavailable: {0}")]
    MissingExtension(String),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    /// Classe une erreur survenue à l'insertion d'une parcelle
    pub fn from_insert(e: tokio_postgres::Error, index: usize) -> Self {
        let malformed = e.code().is_some_and(|code| {
            *code == SqlState::INVALID_PARAMETER_VALUE
                || *code == SqlState::INTERNAL_ERROR
                || *code == SqlState::INVALID_TEXT_REPRESENTATION
                || *code == SqlState::CHECK_VIOLATION
        });
        if malformed {
            Self::MalformedGeometry {
                index: Some(index),
                message: format!("parcel #{}: {}", index, db_message(&e)),
            }
        } else {
            Self::from(e)
        }
    }

    /// Rattache une erreur de géométrie à une parcelle
    pub fn for_parcel(self, index: usize) -> Self {
        match self {
            Self::MalformedGeometry { message, .. } => Self::MalformedGeometry {
                index: Some(index),
                message: format!("parcel #{}: {}", index, message),
            },
            other => other,
        }
    }
}

fn db_message(e: &tokio_postgres::Error) -> String {
    e.as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| e.to_string())
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.is_closed() {
            return Self::Connection(e.to_string());
        }
        match e.code() {
            Some(code)
                if *code == SqlState::LOCK_NOT_AVAILABLE
                    || *code == SqlState::T_R_DEADLOCK_DETECTED
                    || *code == SqlState::T_R_SERIALIZATION_FAILURE =>
            {
                Self::LockConflict(db_message(&e))
            }
            Some(_) => Self::Database(db_message(&e)),
            None if e.source().is_some_and(|s| s.is::<std::io::Error>()) => {
                Self::Connection(e.to_string())
            }
            None => Self::Database(e.to_string()),
        }
    }
}

impl From<PoolError> for StoreError {
    fn from(e: PoolError) -> Self {
        Self::Connection(e.to_string())
    }
}

/// Vérifie un identifiant SQL (schéma, table) avant interpolation
pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

/// Table cible et paramètres associés
#[derive(Debug, Clone)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
    pub storage_srid: u32,
    pub display_srid: u32,
    pub lock_timeout_ms: u64,
}

impl TableRef {
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        validate_identifier(&config.schema)?;
        validate_identifier(&config.table)?;
        Ok(Self {
            schema: config.schema.clone(),
            table: config.table.clone(),
            storage_srid: config.storage_srid,
            display_srid: config.display_srid,
            lock_timeout_ms: config.lock_timeout_ms,
        })
    }

    /// Nom qualifié `schema.table`
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

/// Parcelle relue depuis la base, géométrie dans le SRID d'affichage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredParcel {
    pub class: String,
    pub name: Option<String>,
    pub area_ha: f64,
    #[serde(skip)]
    pub geometry: MultiPolygon,
}

impl From<PreparedParcel> for StoredParcel {
    fn from(parcel: PreparedParcel) -> Self {
        Self {
            class: parcel.class,
            name: parcel.name,
            area_ha: parcel.area_ha,
            geometry: parcel.display,
        }
    }
}

/// Résumé d'une classe
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSummary {
    pub class: String,
    pub count: usize,
    pub area_ha: f64,
}

/// Ligne de l'historique des chargements
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadRecord {
    pub source: String,
    pub checksum: String,
    pub parcels: usize,
    pub total_area_ha: f64,
    pub loaded_at: String,
}

/// Accès aux parcelles d'une table PostGIS
#[derive(Clone)]
pub struct ParcelStore {
    pool: Pool,
    table: TableRef,
}

impl ParcelStore {
    pub fn new(pool: Pool, config: &StoreConfig) -> Result<Self, StoreError> {
        Ok(Self {
            pool,
            table: TableRef::from_config(config)?,
        })
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Vérifie que la base répond
    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.execute("SELECT 1", &[]).await?;
        Ok(())
    }

    /// Remplace tout le contenu de la table par `parcels`
    ///
    /// Retourne le nombre de parcelles insérées. En cas d'erreur rien n'est
    /// modifié.
    pub async fn replace_all(
        &self,
        parcels: &[PreparedParcel],
        source: &str,
        checksum: &str,
    ) -> Result<usize, StoreError> {
        let mut client = self.pool.get().await?;
        let mut load = ReplaceLoad::begin(&mut client, &self.table).await?;

        for parcel in parcels {
            if let Err(e) = load.insert(parcel).await {
                load.rollback(&e.to_string()).await;
                return Err(e);
            }
        }

        load.commit(source, checksum).await
    }

    /// Parcelles correspondant au filtre, dans le SRID d'affichage
    ///
    /// Une table encore inexistante donne un résultat vide.
    pub async fn query(&self, filter: &ClassFilter) -> Result<Vec<StoredParcel>, StoreError> {
        let client = self.pool.get().await?;
        if !postgres::relation_exists(&client, &self.table.schema, &self.table.table).await? {
            debug!(table = %self.table.qualified(), "Table not loaded yet");
            return Ok(Vec::new());
        }

        let parcels = postgres::select_parcels(
            &client,
            &self.table.schema,
            &self.table.table,
            self.table.display_srid,
            filter.class(),
        )
        .await?;

        info!(filter = %filter, parcels = parcels.len(), "Query done");
        Ok(parcels)
    }

    /// Classes présentes dans la table
    pub async fn classes(&self) -> Result<Vec<ClassSummary>, StoreError> {
        let client = self.pool.get().await?;
        if !postgres::relation_exists(&client, &self.table.schema, &self.table.table).await? {
            return Ok(Vec::new());
        }
        postgres::select_classes(&client, &self.table.schema, &self.table.table).await
    }

    /// Dernier chargement enregistré
    pub async fn last_load(&self) -> Result<Option<LoadRecord>, StoreError> {
        let client = self.pool.get().await?;
        if !postgres::relation_exists(&client, &self.table.schema, postgres::HISTORY_TABLE).await?
        {
            return Ok(None);
        }
        postgres::select_last_load(&client, &self.table.schema, &self.table.table).await
    }
}
