//! In-memory species catalog with rarity-tier sampling.
//!
//! Built from the database at startup and reloaded after catalog writes.
//! Sampling draws from an injected seedable random source so tests can pin
//! the sequence of picks.

use std::sync::{Mutex, RwLock};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::errors::AppError;
use crate::models::Species;

/// Read-only(ish) store of species records grouped by rarity tier.
pub struct RarityCatalog {
    species: RwLock<Vec<Species>>,
    rng: Mutex<StdRng>,
}

impl RarityCatalog {
    /// Build a catalog over the given species. A fixed seed makes every
    /// subsequent draw deterministic.
    pub fn new(species: Vec<Species>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            species: RwLock::new(species),
            rng: Mutex::new(rng),
        }
    }

    /// Replace the snapshot after a catalog write.
    pub fn reload(&self, species: Vec<Species>) {
        *self.species.write().expect("catalog lock poisoned") = species;
    }

    pub fn len(&self) -> usize {
        self.species.read().expect("catalog lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Draw one species uniformly from the whole catalog.
    pub fn sample_uniform(&self) -> Result<Species, AppError> {
        let species = self.species.read().expect("catalog lock poisoned");
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        species
            .choose(&mut *rng)
            .cloned()
            .ok_or(AppError::EmptyCatalog)
    }

    /// Draw one species uniformly from those whose rarity equals `tier`.
    ///
    /// Callers define the fallback when the tier is unpopulated.
    pub fn sample_by_rarity(&self, tier: i64) -> Result<Species, AppError> {
        let species = self.species.read().expect("catalog lock poisoned");
        let at_tier: Vec<&Species> = species.iter().filter(|s| s.rarity == tier).collect();
        let mut rng = self.rng.lock().expect("rng lock poisoned");
        at_tier
            .choose(&mut *rng)
            .map(|s| (*s).clone())
            .ok_or(AppError::NoSpeciesAtTier { tier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn species(id: &str, rarity: i64) -> Species {
        Species {
            id: id.to_string(),
            name: format!("Bird {}", id),
            rarity,
            images: vec![format!("{}.jpg", id)],
        }
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = RarityCatalog::new(Vec::new(), Some(1));
        assert!(matches!(
            catalog.sample_uniform(),
            Err(AppError::EmptyCatalog)
        ));
    }

    #[test]
    fn test_sample_by_rarity_restricts_population() {
        let catalog = RarityCatalog::new(
            vec![species("a", 1), species("b", 2), species("c", 2)],
            Some(7),
        );

        for _ in 0..20 {
            let picked = catalog.sample_by_rarity(2).unwrap();
            assert_eq!(picked.rarity, 2);
        }
    }

    #[test]
    fn test_sample_by_rarity_unpopulated_tier() {
        let catalog = RarityCatalog::new(vec![species("a", 1)], Some(1));
        assert!(matches!(
            catalog.sample_by_rarity(3),
            Err(AppError::NoSpeciesAtTier { tier: 3 })
        ));
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let pool = vec![species("a", 1), species("b", 1), species("c", 1)];
        let first = RarityCatalog::new(pool.clone(), Some(42));
        let second = RarityCatalog::new(pool, Some(42));

        for _ in 0..10 {
            assert_eq!(
                first.sample_uniform().unwrap().id,
                second.sample_uniform().unwrap().id
            );
        }
    }

    #[test]
    fn test_reload_replaces_snapshot() {
        let catalog = RarityCatalog::new(vec![species("a", 1)], Some(1));
        catalog.reload(vec![species("b", 1), species("c", 1)]);
        assert_eq!(catalog.len(), 2);
        let picked = catalog.sample_uniform().unwrap();
        assert_ne!(picked.id, "a");
    }
}
