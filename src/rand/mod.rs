//! L3: PRNG service with pluggable engines (spec §4.5).
//!
//! Engine selection is a compile-time variant (per §9 "PRNG engine
//! polymorphism" — a vtable of function pointers is unnecessary when the
//! engine set is fixed), not a trait object.
mod mersenne;

use log::debug;
pub use mersenne::Mt19937;

/// A minimal stand-in for a libc `rand()`-style generator. Real `rand()`
/// implementations are not specified by any standard and differ bit for
/// bit across platforms (this is exactly why spec §4.5's note singles out
/// Mersenne Twister as the only engine whose sequence is portably
/// reproducible); this engine exists only to give `RandEngine::SysRand` a
/// working, deterministic-within-this-process body.
struct MinStdRand(u64);

impl MinStdRand {
    fn new(seed: u32) -> Self {
        MinStdRand(if seed == 0 { 1 } else { u64::from(seed) })
    }
    fn next(&mut self) -> u32 {
        self.0 = (self.0 * 48271) % 0x7fff_ffff;
        self.0 as u32
    }
}

/// A second non-Mersenne stand-in engine (xorshift32), giving
/// `RandEngine::SysRandom` a distinct `max` from `SysRand`.
struct XorShift32(u32);

impl XorShift32 {
    fn new(seed: u32) -> Self {
        XorShift32(if seed == 0 { 0x9e37_79b9 } else { seed })
    }
    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }
}

enum Engine {
    Mersenne(Mt19937),
    SysRand(MinStdRand),
    SysRandom(XorShift32),
}

/// Which pluggable generator a `RandSt` uses (spec §4.5).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RandEngine {
    /// MT19937, `max = 2^32 - 1`. The only engine with a portably
    /// reproducible sequence (spec §8 PRNG determinism).
    Mersenne,
    SysRand,
    SysRandom,
}

impl Default for RandEngine {
    fn default() -> Self {
        RandEngine::Mersenne
    }
}

/// PRNG state (spec §3 "PRNG state"): engine selector, engine-private
/// state, last seed used, the engine's maximum raw output, a validity
/// flag, and the cached second Gaussian sample.
pub struct RandSt {
    engine: Engine,
    max: u32,
    seed: u32,
    gauss_cache: Option<f64>,
    bit_pool: u32,
    bit_pool_bits: u32,
}

impl RandSt {
    /// Creates and seeds a PRNG (spec `init` + `seed`).
    pub fn new(engine: RandEngine, seed: u32) -> Self {
        let (engine_state, max) = match engine {
            RandEngine::Mersenne => (Engine::Mersenne(Mt19937::new(seed)), Mt19937::MAX),
            RandEngine::SysRand => (Engine::SysRand(MinStdRand::new(seed)), 0x7fff_ffff),
            RandEngine::SysRandom => (Engine::SysRandom(XorShift32::new(seed)), u32::MAX),
        };
        debug!("seeded {:?} engine with {}", engine, seed);
        RandSt { engine: engine_state, max, seed, gauss_cache: None, bit_pool: 0, bit_pool_bits: 0 }
    }

    /// Re-seeds in place; invalidates the Gaussian cache and bit pool
    /// (spec §4.5: "the cached value is invalidated by any reseed").
    pub fn reseed(&mut self, seed: u32) {
        let engine = self.engine_kind();
        *self = RandSt::new(engine, seed);
    }

    /// `seedOrDefault`: seeds from `seed` if `specified`, else from an OS
    /// entropy source.
    pub fn seed_or_default(engine: RandEngine, specified: Option<u32>) -> Self {
        let seed = specified.unwrap_or_else(os_entropy_seed);
        RandSt::new(engine, seed)
    }

    pub fn engine_kind(&self) -> RandEngine {
        match self.engine {
            Engine::Mersenne(_) => RandEngine::Mersenne,
            Engine::SysRand(_) => RandEngine::SysRand,
            Engine::SysRandom(_) => RandEngine::SysRandom,
        }
    }

    pub fn seed_used(&self) -> u32 {
        self.seed
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Raw 32-bit draw, independent of `max` semantics.
    pub fn rand32(&mut self) -> u32 {
        match &mut self.engine {
            Engine::Mersenne(mt) => mt.next_u32(),
            Engine::SysRand(r) => r.next(),
            Engine::SysRandom(r) => r.next(),
        }
    }

    /// A uniform integer in `[0, max]` (spec `rand`).
    pub fn rand(&mut self) -> u32 {
        self.rand32()
    }

    /// A uniform real in `[0, 1)` (spec `drand`): `rand() as f64 / max`.
    pub fn drand(&mut self) -> f64 {
        f64::from(self.rand()) / f64::from(self.max)
    }

    /// A paired standard-Gaussian draw via Box-Muller's classical cos/sin
    /// form (grounded in `original_source/lib/util/rand.c::pm_gaussrand2`,
    /// including clamping `u1` away from zero before taking its log).
    pub fn gauss2(&mut self) -> (f64, f64) {
        let mut u1 = self.drand();
        let u2 = self.drand();
        if u1 < f64::EPSILON {
            u1 = f64::EPSILON;
        }
        let mag = (-2.0 * u1.ln()).sqrt();
        let r1 = mag * (2.0 * std::f64::consts::PI * u2).cos();
        let r2 = mag * (2.0 * std::f64::consts::PI * u2).sin();
        (r1, r2)
    }

    /// A single standard-Gaussian draw; caches the paired second value and
    /// returns it on the next call (spec `gauss`).
    pub fn gauss(&mut self) -> f64 {
        if let Some(cached) = self.gauss_cache.take() {
            cached
        } else {
            let (r1, r2) = self.gauss2();
            self.gauss_cache = Some(r2);
            r1
        }
    }

    /// Shifts `n` bits (`1..=16`) out of a 32-bit pool, refilling via
    /// `rand()` as needed (spec §4.5 "bit-pool helper"). Only valid when
    /// `max` is `2^31 - 1` or `2^32 - 1`, since otherwise the raw draw
    /// isn't uniform over full-width bit patterns.
    pub fn next_bits(&mut self, n: u32) -> Option<u32> {
        if !(self.max == 0x7fff_ffff || self.max == u32::MAX) {
            return None;
        }
        debug_assert!((1..=16).contains(&n));
        if self.bit_pool_bits < n {
            self.bit_pool = self.rand();
            self.bit_pool_bits = 32;
        }
        let mask = (1u32 << n) - 1;
        let value = self.bit_pool & mask;
        self.bit_pool >>= n;
        self.bit_pool_bits -= n;
        Some(value)
    }
}

fn os_entropy_seed() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos()).unwrap_or(0);
    (nanos as u32) ^ (std::process::id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drand_is_within_unit_interval() {
        let mut r = RandSt::new(RandEngine::Mersenne, 1);
        for _ in 0..1000 {
            let d = r.drand();
            assert!((0.0..1.0).contains(&d));
        }
    }

    #[test]
    fn gauss_caches_and_invalidates_on_reseed() {
        let mut r = RandSt::new(RandEngine::Mersenne, 42);
        let first = r.gauss();
        let cached = r.gauss_cache;
        assert!(cached.is_some());
        let second = r.gauss();
        assert_eq!(Some(second), cached);
        assert_ne!(first, second);

        r.gauss();
        assert!(r.gauss_cache.is_some());
        r.reseed(42);
        assert!(r.gauss_cache.is_none());
    }

    #[test]
    fn bit_pool_refills_after_exhaustion() {
        let mut r = RandSt::new(RandEngine::Mersenne, 7);
        let mut total_bits = 0;
        for _ in 0..20 {
            assert!(r.next_bits(3).is_some());
            total_bits += 3;
        }
        assert_eq!(total_bits, 60);
    }

    #[test]
    fn bit_pool_rejects_nonstandard_max() {
        let mut r = RandSt::new(RandEngine::Mersenne, 1);
        assert!(r.next_bits(3).is_some());
        // No built-in engine has a non-standard max, so poke the field
        // directly to exercise the guard spec §4.5 calls for.
        r.max = 100;
        assert!(r.next_bits(3).is_none());
    }
}
