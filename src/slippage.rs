// 14.0 slippage.rs: injected randomness. slippage, funding drift and price jitter all draw from here.
// 14.1 apply_slippage moves a reference price against whoever is taking liquidity.

use crate::types::{Price, Side};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Uniform samples in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_unit(&mut self) -> Decimal;
}

/// Production source backed by `StdRng`.
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_unit(&mut self) -> Decimal {
        let sample: f64 = self.rng.gen();
        // f64 in [0, 1) always converts; the fallback is unreachable in practice
        Decimal::from_f64(sample)
            .map(|d| d.min(Decimal::ONE - Decimal::new(1, 12)))
            .unwrap_or(Decimal::ZERO)
    }
}

/// Always returns the same sample. `0` gives zero slippage, `0.5` gives zero drift and noise.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub Decimal);

impl RandomSource for FixedRandom {
    fn next_unit(&mut self) -> Decimal {
        self.0
    }
}

/// Replays a fixed list of samples, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct SequenceRandom {
    samples: Vec<Decimal>,
    cursor: usize,
}

impl SequenceRandom {
    pub fn new(samples: Vec<Decimal>) -> Self {
        Self { samples, cursor: 0 }
    }
}

impl RandomSource for SequenceRandom {
    fn next_unit(&mut self) -> Decimal {
        if self.samples.is_empty() {
            return Decimal::ZERO;
        }
        let sample = self.samples[self.cursor % self.samples.len()];
        self.cursor += 1;
        sample
    }
}

/// Fill price for a taker on `side`: longs fill above the reference, shorts below.
/// Closing a long is a short-side fill, so callers pass the closing direction.
pub fn apply_slippage(price: Price, side: Side, max_slippage: Decimal, rng: &mut dyn RandomSource) -> Price {
    let slip = price.value() * max_slippage * rng.next_unit();
    let filled = match side {
        Side::Long => price.value() + slip,
        Side::Short => price.value() - slip,
    };
    // max_slippage < 1 keeps a short fill positive
    Price::new(filled).unwrap_or(price)
}
