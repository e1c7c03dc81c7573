//! Tarpit RNG -- deterministic per-seed randomness for reproducible
//! synthetic output (spec.md section 4.1).
//!
//! Not thread-safe: each consumer (each content source, each FTP
//! directory listing) owns its own instance. There is no internal
//! locking and no attempt to make concurrent access sound -- callers
//! that need per-connection determinism construct one `SeededRng` per
//! connection and keep it there.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

pub struct SeededRng {
    seed: u64,
    rng: StdRng,
}

impl SeededRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from the wall clock. Used when reproducibility across runs
    /// does not matter (e.g. the fallback handler's filler bytes).
    pub fn from_time() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::from_seed(seed)
    }

    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Derive a new instance by folding `salt` into the current seed.
    ///
    /// Used by the FTP directory generator: a listing keyed by
    /// `clientId + CRC64(path)` must reproduce the same entries across
    /// repeated `LIST`s from the same client (spec.md section 4.8), so
    /// the per-path generator is rebuilt from `offset(path_bytes)`
    /// rather than sharing mutable state across requests.
    pub fn offset(&self, salt: &[u8]) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.seed.hash(&mut hasher);
        salt.hash(&mut hasher);
        Self::from_seed(hasher.finish())
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn choice<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..items.len());
        items.get(idx)
    }

    pub fn int_range(&mut self, low: i64, high: i64) -> i64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    pub fn float_range(&mut self, low: f64, high: f64) -> f64 {
        if low >= high {
            return low;
        }
        self.rng.gen_range(low..high)
    }

    pub fn bool(&mut self, probability_true: f64) -> bool {
        self.rng.gen_bool(probability_true.clamp(0.0, 1.0))
    }

    /// Sample a string of `len` characters drawn uniformly from `charset`.
    pub fn string(&mut self, len: usize, charset: &[u8]) -> String {
        if charset.is_empty() {
            return String::new();
        }
        (0..len)
            .map(|_| {
                let idx = self.rng.gen_range(0..charset.len());
                charset[idx] as char
            })
            .collect()
    }

    /// Weighted selection: higher weight is proportionally more likely.
    /// Items with non-positive weight are never selected.
    pub fn weighted<'a, T>(&mut self, items: &'a [(T, f64)]) -> Option<&'a T> {
        let total: f64 = items.iter().map(|(_, w)| w.max(0.0)).sum();
        if total <= 0.0 {
            return None;
        }
        let mut pick = self.rng.gen_range(0.0..total);
        for (item, weight) in items {
            let weight = weight.max(0.0);
            if pick < weight {
                return Some(item);
            }
            pick -= weight;
        }
        items.last().map(|(item, _)| item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_same_sequence() {
        let mut a = SeededRng::from_seed(42);
        let mut b = SeededRng::from_seed(42);
        let items = [1, 2, 3, 4, 5];
        for _ in 0..20 {
            assert_eq!(a.choice(&items), b.choice(&items));
        }
    }

    #[test]
    fn offset_is_deterministic_per_salt() {
        let base = SeededRng::from_seed(7);
        let mut a = base.offset(b"/some/path");
        let mut b = base.offset(b"/some/path");
        let mut c = base.offset(b"/other/path");

        let items = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let seq_a: Vec<_> = (0..10).map(|_| a.choice(&items)).collect();
        let seq_b: Vec<_> = (0..10).map(|_| b.choice(&items)).collect();
        let seq_c: Vec<_> = (0..10).map(|_| c.choice(&items)).collect();

        assert_eq!(seq_a, seq_b);
        assert_ne!(seq_a, seq_c);
    }

    #[test]
    fn weighted_never_returns_zero_weight_items_in_degenerate_set() {
        let mut rng = SeededRng::from_seed(1);
        let items = [("only", 1.0)];
        for _ in 0..10 {
            assert_eq!(rng.weighted(&items), Some(&"only"));
        }
    }

    #[test]
    fn int_range_handles_degenerate_bounds() {
        let mut rng = SeededRng::from_seed(1);
        assert_eq!(rng.int_range(5, 5), 5);
        assert_eq!(rng.int_range(5, 1), 5);
    }
}
