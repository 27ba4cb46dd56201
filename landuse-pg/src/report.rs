//! Rapport de chargement
//!
//! Collecte les compteurs, surfaces par classe et erreurs d'un chargement
//! pour l'affichage console et la réponse JSON du service web.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

/// Statut global du chargement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadStatus {
    /// Toutes les parcelles chargées
    Success,
    /// Chargement commité, parcelles invalides ignorées
    PartialSuccess,
    /// Rien n'a été écrit
    Failed,
}

/// Niveau de sévérité des erreurs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    /// Chargement abandonné
    Fatal,
    /// Parcelle ignorée
    Error,
}

/// Erreur rencontrée pendant un chargement
#[derive(Debug, Clone, Serialize)]
pub struct LoadError {
    pub level: ErrorLevel,
    /// Index de la parcelle dans le shapefile (optionnel)
    pub parcel: Option<usize>,
    pub message: String,
}

/// Statistiques par classe
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClassStats {
    pub count: usize,
    pub area_ha: f64,
}

/// Rapport complet de chargement
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    /// Nom du .shp chargé
    pub source: String,
    /// Empreinte blake3 du .shp
    pub checksum: String,
    pub duration_secs: f64,
    pub status: LoadStatus,

    pub parcels_read: usize,
    pub parcels_loaded: usize,
    pub parcels_skipped: usize,
    pub total_area_ha: f64,

    pub by_class: BTreeMap<String, ClassStats>,
    pub errors: Vec<LoadError>,
}

impl LoadReport {
    pub fn new(source: &str, checksum: &str) -> Self {
        Self {
            source: source.to_string(),
            checksum: checksum.to_string(),
            duration_secs: 0.0,
            status: LoadStatus::Success,
            parcels_read: 0,
            parcels_loaded: 0,
            parcels_skipped: 0,
            total_area_ha: 0.0,
            by_class: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Enregistre une parcelle lue
    pub fn record_read(&mut self) {
        self.parcels_read += 1;
    }

    /// Enregistre une parcelle chargée
    pub fn record_loaded(&mut self, class: &str, area_ha: f64) {
        self.parcels_loaded += 1;
        self.total_area_ha += area_ha;
        let stats = self.by_class.entry(class.to_string()).or_default();
        stats.count += 1;
        stats.area_ha += area_ha;
    }

    /// Enregistre une parcelle ignorée
    pub fn record_skipped(&mut self, parcel: Option<usize>, message: &str) {
        self.parcels_skipped += 1;
        self.errors.push(LoadError {
            level: ErrorLevel::Error,
            parcel,
            message: message.to_string(),
        });
    }

    /// Marque le chargement comme échoué : rien n'est chargé
    pub fn record_fatal(&mut self, parcel: Option<usize>, message: &str) {
        self.errors.push(LoadError {
            level: ErrorLevel::Fatal,
            parcel,
            message: message.to_string(),
        });
        self.parcels_loaded = 0;
        self.total_area_ha = 0.0;
        self.by_class.clear();
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_secs = duration.as_secs_f64();
    }

    /// Détermine le statut final basé sur les erreurs
    pub fn finalize(&mut self) {
        let has_fatal = self.errors.iter().any(|e| e.level == ErrorLevel::Fatal);

        self.status = if has_fatal {
            LoadStatus::Failed
        } else if self.parcels_skipped > 0 && self.parcels_loaded > 0 {
            LoadStatus::PartialSuccess
        } else if self.parcels_skipped > 0 {
            LoadStatus::Failed
        } else {
            LoadStatus::Success
        };
    }

    /// Affiche le rapport sur la console
    pub fn display(&self) {
        println!("\n{}", "=".repeat(60));
        println!("LOAD REPORT - {}", self.source);
        println!("{}", "=".repeat(60));

        println!("\nStatus: {:?}", self.status);
        println!("Duration: {:.2}s", self.duration_secs);
        println!("Checksum: {}", self.checksum);

        println!("\n--- SUMMARY ---");
        println!(
            "Parcels: {} read, {} loaded, {} skipped",
            self.parcels_read, self.parcels_loaded, self.parcels_skipped
        );
        println!("Total area: {:.2} ha", self.total_area_ha);

        if !self.by_class.is_empty() {
            println!("\n--- BY CLASS ---");
            for (class, stats) in &self.by_class {
                println!("  {}: {} parcels, {:.2} ha", class, stats.count, stats.area_ha);
            }
        }

        if !self.errors.is_empty() {
            println!("\n--- ERRORS ({}) ---", self.errors.len());
            for e in self.errors.iter().take(20) {
                let location = e.parcel.map(|i| format!("[#{}]", i)).unwrap_or_default();
                println!("  {:?} {} {}", e.level, location, e.message);
            }
            if self.errors.len() > 20 {
                println!("  ... and {} more", self.errors.len() - 20);
            }
        }

        println!("\n{}", "=".repeat(60));
    }

    /// Sauvegarde le rapport en JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Affichage compact pour le résumé
    pub fn summary(&self) -> String {
        format!(
            "{}: {} loaded, {} skipped, {:.2} ha",
            self.source, self.parcels_loaded, self.parcels_skipped, self.total_area_ha
        )
    }
}
