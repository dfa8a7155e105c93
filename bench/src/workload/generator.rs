use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BenchError, Result};
use crate::index::{Key, Payload};

/// Fixed seed when one is configured, entropy otherwise.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Draws keys uniformly, with replacement, from the live prefix of the key array.
pub struct KeySampler {
    rng: StdRng,
}

impl KeySampler {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed),
        }
    }

    /// Sample `n` keys from `keys[..live]`.
    ///
    /// `live` is the number of keys already inserted into the index; keys past
    /// it must never be queried, so asking for a sample with nothing live is
    /// an error.
    pub fn sample(&mut self, keys: &[Key], live: usize, n: usize) -> Result<Vec<Key>> {
        if live == 0 {
            return Err(BenchError::EmptySample);
        }
        if live > keys.len() {
            return Err(BenchError::LivePrefixOutOfRange {
                live,
                available: keys.len(),
            });
        }

        let positions = Uniform::new(0, live);
        Ok((0..n).map(|_| keys[self.rng.sample(positions)]).collect())
    }
}

/// Source of pseudo-random payloads for inserts and updates.
pub struct PayloadGenerator {
    rng: StdRng,
}

impl PayloadGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed),
        }
    }

    /// Next payload, non-negative like C `rand()`.
    pub fn next_payload(&mut self) -> Payload {
        self.rng.gen_range(0..=Payload::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_stays_inside_live_prefix() {
        let keys: Vec<Key> = (100..200).collect();
        let mut sampler = KeySampler::new(Some(1));

        let sample = sampler.sample(&keys, 10, 1_000).unwrap();
        assert_eq!(sample.len(), 1_000);
        assert!(sample.iter().all(|k| (100..110).contains(k)));
    }

    #[test]
    fn test_sample_of_zero_keys_is_empty() {
        let keys: Vec<Key> = vec![5, 6];
        let mut sampler = KeySampler::new(None);
        assert!(sampler.sample(&keys, 2, 0).unwrap().is_empty());
    }

    #[test]
    fn test_sample_with_nothing_live_fails() {
        let keys: Vec<Key> = vec![1, 2, 3];
        let mut sampler = KeySampler::new(None);
        assert!(matches!(
            sampler.sample(&keys, 0, 5),
            Err(BenchError::EmptySample)
        ));
    }

    #[test]
    fn test_sample_past_loaded_keys_fails() {
        let keys: Vec<Key> = vec![1, 2, 3];
        let mut sampler = KeySampler::new(None);
        assert!(matches!(
            sampler.sample(&keys, 4, 1),
            Err(BenchError::LivePrefixOutOfRange {
                live: 4,
                available: 3
            })
        ));
    }

    #[test]
    fn test_single_live_key_is_always_drawn() {
        let keys: Vec<Key> = vec![77, 1, 2];
        let mut sampler = KeySampler::new(None);
        assert_eq!(sampler.sample(&keys, 1, 4).unwrap(), vec![77; 4]);
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let keys: Vec<Key> = (0..1_000).collect();
        let a = KeySampler::new(Some(42)).sample(&keys, 500, 64).unwrap();
        let b = KeySampler::new(Some(42)).sample(&keys, 500, 64).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_payloads_are_non_negative() {
        let mut payloads = PayloadGenerator::new(Some(3));
        assert!((0..1_000).all(|_| payloads.next_payload() >= 0));
    }
}
