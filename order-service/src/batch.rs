use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::batch::{format_batch_number, parse_prefix, random_suffix, InvalidBatchPrefix};
use std::sync::Mutex;
use tracing::debug;

use crate::store::{Store, StoreResult};

/// Hands out batch numbers that are not yet used by any stored order.
pub struct BatchNumberGenerator {
    prefix: String,
    rng: Mutex<StdRng>,
}

impl BatchNumberGenerator {
    pub fn new(prefix: &str) -> Result<Self, InvalidBatchPrefix> {
        Self::with_rng(prefix, StdRng::from_entropy())
    }

    pub fn with_seed(prefix: &str, seed: u64) -> Result<Self, InvalidBatchPrefix> {
        Self::with_rng(prefix, StdRng::seed_from_u64(seed))
    }

    fn with_rng(prefix: &str, rng: StdRng) -> Result<Self, InvalidBatchPrefix> {
        Ok(Self {
            prefix: parse_prefix(prefix)?,
            rng: Mutex::new(rng),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn candidate(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        format_batch_number(&self.prefix, &random_suffix(&mut *rng))
    }

    /// Draws candidates until one is free. The keyspace is 36^6, so the loop
    /// has no retry limit; the unique index on orders still guards races.
    pub async fn assign(&self, store: &dyn Store) -> StoreResult<String> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let candidate = self.candidate();
            if !store.batch_number_exists(&candidate).await? {
                if attempts > 1 {
                    debug!("Batch number {} assigned after {} attempts", candidate, attempts);
                }
                return Ok(candidate);
            }
            debug!("Batch number {} already taken, drawing again", candidate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use shared::batch::is_well_formed;

    #[tokio::test]
    async fn test_assign_on_empty_store_uses_first_draw() {
        let store = MemoryStore::new();
        let expected = BatchNumberGenerator::with_seed("BATCH", 11).unwrap().candidate();

        let generator = BatchNumberGenerator::with_seed("BATCH", 11).unwrap();
        let assigned = generator.assign(&store).await.unwrap();

        assert_eq!(assigned, expected);
        assert!(is_well_formed(&assigned));
        assert!(assigned.starts_with("BATCH-"));
    }

    #[tokio::test]
    async fn test_lowercase_prefix_is_uppercased() {
        let store = MemoryStore::new();
        let generator = BatchNumberGenerator::with_seed("fd", 3).unwrap();

        let assigned = generator.assign(&store).await.unwrap();

        assert_eq!(generator.prefix(), "FD");
        assert!(assigned.starts_with("FD-"));
        assert!(is_well_formed(&assigned));
    }

    #[test]
    fn test_rejects_unusable_prefix() {
        assert!(BatchNumberGenerator::new("").is_err());
        assert!(BatchNumberGenerator::new("my batch").is_err());
    }
}
