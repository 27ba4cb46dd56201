//! Transaction de remplacement complet
//!
//! Les lecteurs voient soit l'ancienne table, soit la table entièrement
//! remplacée : tout se fait dans une seule transaction, rollback sinon.

use deadpool_postgres::{Object, Transaction};
use tokio_postgres::Statement;
use tracing::{error, info};

use super::postgres;
use super::{StoreError, TableRef};
use crate::calculator::PreparedParcel;

/// Chargement en cours dans une transaction ouverte
pub struct ReplaceLoad<'a> {
    transaction: Transaction<'a>,
    table: &'a TableRef,
    insert: Statement,
    inserted: usize,
    total_area_ha: f64,
}

impl<'a> ReplaceLoad<'a> {
    /// Ouvre la transaction, prépare la table et la vide
    pub async fn begin(client: &'a mut Object, table: &'a TableRef) -> Result<Self, StoreError> {
        let transaction = client.transaction().await?;

        info!(table = %table.qualified(), "Starting replace transaction");

        postgres::set_lock_timeout(&transaction, table.lock_timeout_ms).await?;
        postgres::ensure_postgis(&transaction).await?;
        postgres::create_tables(&transaction, &table.schema, &table.table, table.storage_srid)
            .await?;
        postgres::truncate(&transaction, &table.schema, &table.table).await?;
        let insert = postgres::prepare_insert(&transaction, &table.schema, &table.table).await?;

        Ok(Self {
            transaction,
            table,
            insert,
            inserted: 0,
            total_area_ha: 0.0,
        })
    }

    /// Insère une parcelle
    pub async fn insert(&mut self, parcel: &PreparedParcel) -> Result<(), StoreError> {
        let ewkb = postgres::multipolygon_to_ewkb(&parcel.storage, self.table.storage_srid)
            .map_err(|e| e.for_parcel(parcel.index))?;

        self.transaction
            .execute(
                &self.insert,
                &[&parcel.class, &parcel.name, &parcel.area_ha, &ewkb],
            )
            .await
            .map_err(|e| StoreError::from_insert(e, parcel.index))?;

        self.inserted += 1;
        self.total_area_ha += parcel.area_ha;
        Ok(())
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Enregistre l'historique puis commit
    pub async fn commit(self, source: &str, checksum: &str) -> Result<usize, StoreError> {
        postgres::record_load(
            &self.transaction,
            &self.table.schema,
            &self.table.table,
            source,
            checksum,
            self.inserted,
            self.total_area_ha,
        )
        .await?;

        self.transaction.commit().await?;

        info!(
            table = %self.table.qualified(),
            parcels = self.inserted,
            total_area_ha = self.total_area_ha,
            "Replace transaction committed"
        );
        Ok(self.inserted)
    }

    /// Annule la transaction
    ///
    /// La transaction est également annulée si elle est droppée.
    pub async fn rollback(self, reason: &str) {
        error!(
            table = %self.table.qualified(),
            reason = %reason,
            attempted = self.inserted,
            "Rolling back replace transaction"
        );

        if let Err(e) = self.transaction.rollback().await {
            error!(error = %e, "Explicit rollback failed (will rollback on drop anyway)");
        }
    }
}
