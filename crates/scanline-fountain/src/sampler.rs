//! # Degree Sampling
//!
//! Chooses which source blocks each packet combines. A packet's degree is
//! drawn from a soliton-like distribution: degree 1 carries a fixed weight so
//! the peeling decoder always has seeds, and the remaining mass falls off as
//! `1/d` over `2..=max_degree`. The chosen indices are `d` distinct blocks
//! drawn uniformly without replacement.
//!
//! Everything is a pure function of `(session, packet_id)`: a receiver or a
//! test harness can regenerate any packet's index set exactly.

use std::collections::BTreeSet;

/// Upper bound on a sampled degree. Keeps index lists inside one visual code.
pub const DEFAULT_MAX_DEGREE: usize = 40;

// ─── PRNG ───────────────────────────────────────────────────────────────────

/// xoshiro256** seeded through splitmix64.
///
/// Implemented in-crate so packet index sets stay stable across dependency
/// upgrades; they are effectively part of the wire format.
#[derive(Debug, Clone)]
pub struct Xoshiro256 {
    state: [u64; 4],
}

impl Xoshiro256 {
    pub fn from_seed(seed: u64) -> Self {
        let mut state = [0u64; 4];
        let mut z = seed;
        for slot in &mut state {
            z = z.wrapping_add(0x9e3779b97f4a7c15);
            let mut x = z;
            x = (x ^ (x >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
            x = (x ^ (x >> 27)).wrapping_mul(0x94d049bb133111eb);
            *slot = x ^ (x >> 31);
        }
        Xoshiro256 { state }
    }

    pub fn next_u64(&mut self) -> u64 {
        let s = &mut self.state;
        let result = s[1].wrapping_mul(5).rotate_left(7).wrapping_mul(9);
        let t = s[1] << 17;
        s[2] ^= s[0];
        s[3] ^= s[1];
        s[1] ^= s[2];
        s[0] ^= s[3];
        s[2] ^= t;
        s[3] = s[3].rotate_left(45);
        result
    }

    /// Uniform in `[0, 1)` with 53 bits of precision.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform in `[0, n)`. `n` must be non-zero.
    pub fn below(&mut self, n: u64) -> u64 {
        debug_assert!(n > 0);
        // Reject the short tail so every residue is equally likely.
        let zone = u64::MAX - (u64::MAX % n);
        loop {
            let v = self.next_u64();
            if v < zone {
                return v % n;
            }
        }
    }
}

/// Seed for one packet: session seed in the high word, packet id in the low.
pub fn packet_seed(session_seed: u32, packet_id: u32) -> u64 {
    ((session_seed as u64) << 32) | packet_id as u64
}

// ─── Distribution ───────────────────────────────────────────────────────────

/// Probability of each degree `1..=min(k, max_degree)`; entry `i` is `P(d = i + 1)`.
///
/// Degree 1 gets `degree_one_weight`; degrees `d >= 2` share the rest in
/// proportion to `1/d`. With a single block the whole mass sits on degree 1.
pub fn degree_distribution(k: usize, max_degree: usize, degree_one_weight: f64) -> Vec<f64> {
    let top = k.min(max_degree).max(1);
    if top == 1 {
        return vec![1.0];
    }
    let harmonic: f64 = (2..=top).map(|d| 1.0 / d as f64).sum();
    let rest = 1.0 - degree_one_weight;
    let mut weights = Vec::with_capacity(top);
    weights.push(degree_one_weight);
    weights.extend((2..=top).map(|d| rest * (1.0 / d as f64) / harmonic));
    weights
}

// ─── Sampler ────────────────────────────────────────────────────────────────

/// Per-session sampler. Owns the cumulative table for its `k`.
#[derive(Debug, Clone)]
pub struct DegreeSampler {
    k: usize,
    session_seed: u32,
    cdf: Vec<f64>,
}

impl DegreeSampler {
    pub fn new(k: usize, session_seed: u32, max_degree: usize, degree_one_weight: f64) -> Self {
        assert!(k > 0, "sampler needs at least one block");
        let mut acc = 0.0;
        let mut cdf: Vec<f64> = degree_distribution(k, max_degree, degree_one_weight)
            .into_iter()
            .map(|w| {
                acc += w;
                acc
            })
            .collect();
        // Absorb rounding so the last bucket always catches u close to 1.
        if let Some(last) = cdf.last_mut() {
            *last = 1.0;
        }
        DegreeSampler {
            k,
            session_seed,
            cdf,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    /// Largest degree this sampler can produce.
    pub fn max_degree(&self) -> usize {
        self.cdf.len()
    }

    fn degree(&self, rng: &mut Xoshiro256) -> usize {
        let u = rng.next_f64();
        let idx = self.cdf.partition_point(|&c| c <= u);
        (idx + 1).min(self.cdf.len())
    }

    /// Sorted, distinct block indices for `packet_id`.
    pub fn sample(&self, packet_id: u32) -> Vec<u32> {
        let mut rng = Xoshiro256::from_seed(packet_seed(self.session_seed, packet_id));
        let d = self.degree(&mut rng);
        choose_distinct(&mut rng, self.k, d)
    }
}

/// Floyd's algorithm: `d` distinct values from `[0, k)` in O(d log d).
fn choose_distinct(rng: &mut Xoshiro256, k: usize, d: usize) -> Vec<u32> {
    let mut chosen = BTreeSet::new();
    for j in (k - d)..k {
        let t = rng.below(j as u64 + 1) as usize;
        if !chosen.insert(t) {
            chosen.insert(j);
        }
    }
    chosen.into_iter().map(|i| i as u32).collect()
}
