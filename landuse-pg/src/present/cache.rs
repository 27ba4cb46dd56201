//! Cache des rendus par filtre, invalidé explicitement
//!
//! Chaque vidage incrémente une génération. Un rendu calculé à partir d'une
//! lecture antérieure au vidage n'est pas conservé.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use super::map::RenderedMap;
use crate::filter::ClassFilter;

/// Nombre de filtres conservés par défaut
pub const DEFAULT_CACHE_ENTRIES: usize = 64;

#[derive(Default)]
struct Entries {
    generation: u64,
    maps: HashMap<ClassFilter, Arc<RenderedMap>>,
    /// Ordre d'insertion, pour l'éviction
    order: VecDeque<ClassFilter>,
}

/// Rendus déjà calculés, clés = filtre
pub struct RenderCache {
    entries: RwLock<Entries>,
    capacity: usize,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_ENTRIES)
    }
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache borné à `capacity` filtres (au moins un)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, filter: &ClassFilter) -> Option<Arc<RenderedMap>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .maps
            .get(filter)
            .cloned()
    }

    /// Génération courante, à lire avant la requête qui produit un rendu
    pub fn generation(&self) -> u64 {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    /// Insère un rendu et retourne la version partagée
    ///
    /// Le rendu n'est conservé que si aucun vidage n'a eu lieu depuis
    /// `generation`. Plein, le cache évince le filtre le plus ancien.
    pub fn insert(&self, rendered: RenderedMap, generation: u64) -> Arc<RenderedMap> {
        let rendered = Arc::new(rendered);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);

        if entries.generation != generation {
            debug!(filter = %rendered.filter, "Stale render not cached");
            return rendered;
        }

        let filter = rendered.filter.clone();
        if entries
            .maps
            .insert(filter.clone(), Arc::clone(&rendered))
            .is_none()
        {
            entries.order.push_back(filter);
            while entries.order.len() > self.capacity {
                if let Some(oldest) = entries.order.pop_front() {
                    entries.maps.remove(&oldest);
                    debug!(filter = %oldest, "Render evicted");
                }
            }
        }
        rendered
    }

    /// Vide le cache, retourne le nombre d'entrées supprimées
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let count = entries.maps.len();
        entries.maps.clear();
        entries.order.clear();
        entries.generation += 1;
        debug!(entries = count, generation = entries.generation, "Render cache cleared");
        count
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .maps
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
