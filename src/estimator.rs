//! Coprimality estimator.
//!
//! Two integers drawn uniformly at random are coprime with probability
//! `6 / pi^2`, so `pi ~= sqrt(6 * pairs / coprime_pairs)`.

use crate::runtime::progress::{NoProgress, ProgressSink};

/// Elements processed between two progress updates.
pub const PROGRESS_STRIDE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    OddLength { len: usize },
    NoCoprimePairs { pairs: u64 },
}

impl std::fmt::Display for EstimateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EstimateError::OddLength { len } => {
                write!(f, "sample length {len} is odd; numbers must form complete pairs")
            }
            EstimateError::NoCoprimePairs { pairs } => {
                write!(f, "none of the {pairs} pairs is coprime; estimate is undefined")
            }
        }
    }
}

impl std::error::Error for EstimateError {}

/// Greatest common divisor by Euclid's algorithm. `gcd(0, 0)` is 0.
pub fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoprimeTally {
    pub pairs: u64,
    pub coprime: u64,
}

impl CoprimeTally {
    pub fn fraction(&self) -> f64 {
        if self.pairs == 0 {
            return 0.0;
        }
        self.coprime as f64 / self.pairs as f64
    }
}

/// Pairs adjacent elements and counts the coprime ones.
pub fn count_coprime_pairs(
    sample: &[u64],
    progress: &dyn ProgressSink,
) -> Result<CoprimeTally, EstimateError> {
    if sample.len() % 2 != 0 {
        return Err(EstimateError::OddLength { len: sample.len() });
    }

    let total = sample.len() as u64;
    let mut tally = CoprimeTally::default();

    for (index, pair) in sample.chunks_exact(2).enumerate() {
        tally.pairs += 1;
        if gcd(pair[0], pair[1]) == 1 {
            tally.coprime += 1;
        }

        let done = (index + 1) * 2;
        if done % PROGRESS_STRIDE == 0 {
            progress.update(done as u64, total);
        }
    }

    if total >= PROGRESS_STRIDE as u64 {
        progress.finish();
    }

    Ok(tally)
}

/// Estimates pi from `sample`.
pub fn estimate(sample: &[u64]) -> Result<f64, EstimateError> {
    estimate_with_progress(sample, &NoProgress)
}

pub fn estimate_with_progress(
    sample: &[u64],
    progress: &dyn ProgressSink,
) -> Result<f64, EstimateError> {
    let tally = count_coprime_pairs(sample, progress)?;
    tracing::debug!(
        pairs = tally.pairs,
        coprime = tally.coprime,
        fraction = tally.fraction(),
        "coprime pairs counted"
    );

    if tally.coprime == 0 {
        return Err(EstimateError::NoCoprimePairs { pairs: tally.pairs });
    }

    Ok((6.0 * tally.pairs as f64 / tally.coprime as f64).sqrt())
}
