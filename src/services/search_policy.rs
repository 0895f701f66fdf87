//! Candidate generation and interval adaptation for the Fmax search.
//!
//! The search is a non-monotonic bisection: every iteration samples the
//! current `[lo, hi]` window evenly, and the window is then moved and
//! resized from what the batch taught us. A success near the top of the
//! window pushes `hi` up, using the reported slack to extrapolate how far the
//! design could plausibly go; a batch with no improvement pulls `hi` back
//! towards the best known point. Random jitter on the bounds keeps repeated
//! windows from sampling the same periods again.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::debug;

use crate::domain::models::{AdaptationPolicy, BestResult, Candidate, CandidateBatch, SearchState};

const ONE_THOUSAND: f64 = 1000.0;

/// Stateful policy: holds the constants and the jitter RNG.
#[derive(Debug)]
pub struct SearchPolicy {
    policy: AdaptationPolicy,
    max_workers: usize,
    rng: StdRng,
}

impl SearchPolicy {
    pub fn new(policy: AdaptationPolicy, max_workers: usize, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            policy,
            max_workers,
            rng,
        }
    }

    pub const fn policy(&self) -> &AdaptationPolicy {
        &self.policy
    }

    /// Samples taken from the window per iteration.
    pub fn samples_per_batch(&self) -> usize {
        self.max_workers.max(self.policy.min_samples_per_batch).max(2)
    }

    /// Generate the next batch of untried candidates.
    ///
    /// May nudge the bounds of `state` when the window yields too few fresh
    /// periods. An empty batch means the window is saturated with tried
    /// periods and the search cannot make progress.
    pub fn generate(&mut self, state: &mut SearchState) -> CandidateBatch {
        let n = self.samples_per_batch();
        let delta = state.delta();
        let mut retries = 0u32;

        loop {
            let batch = sample_window(state, n);

            let min_required = if retries > self.policy.relax_after_retries {
                n as f64 - (n as f64 / 4.0).max(2.0)
            } else {
                n as f64
            };
            if batch.len() as f64 >= min_required.max(1.0) {
                return batch;
            }
            if retries >= self.policy.max_generation_retries {
                debug!(
                    retries,
                    candidates = batch.len(),
                    "Accepting short candidate batch"
                );
                return batch;
            }

            state.hi_freq += self.rng.gen::<f64>() * delta;
            state.lo_freq += self.policy.lo_jitter_scale * self.rng.gen::<f64>() * delta;
            retries += 1;
        }
    }

    /// Move the window after a harvested batch.
    ///
    /// `improved_idx` is the batch index of the candidate that became the new
    /// best during this iteration, if any.
    pub fn adapt(
        &mut self,
        state: &mut SearchState,
        batch: &CandidateBatch,
        best: Option<&BestResult>,
        improved_idx: Option<usize>,
    ) {
        let delta = state.delta();

        match (best, improved_idx) {
            (Some(best), Some(idx)) => {
                let best_freq = best.frequency;
                state.lo_freq = best_freq + delta + delta * self.rng.gen::<f64>();
                state.consecutive_no_improvement = 0;

                let freqs = batch.frequencies();
                let top = freqs.last().copied().unwrap_or(best_freq);
                let at_edge = idx >= freqs.len() / 2 || top - best_freq <= batch.freq_step;

                state.hi_freq = if at_edge {
                    let lo_choice = if freqs.len() > 4 { freqs[1] } else { freqs[0] };
                    let expansion = (self.max_workers as f64 * self.policy.edge_expansion_per_worker)
                        .min(best_freq - lo_choice);
                    let min_plausible_period =
                        ONE_THOUSAND / best_freq - best.results.wns - self.policy.slack_epsilon_ns;
                    let extrapolated = if min_plausible_period > 0.0 {
                        (ONE_THOUSAND / min_plausible_period).ceil()
                    } else {
                        f64::NEG_INFINITY
                    };
                    (best_freq + expansion).max(extrapolated)
                } else {
                    (state.hi_freq + best_freq + batch.freq_step) / 2.0
                };
                state.hi_freq += self.policy.upper_margin;
            }
            (Some(best), None) => {
                state.hi_freq = (best.frequency + state.hi_freq) / 2.0 + delta;
                state.lo_freq =
                    (state.lo_freq + best.frequency) / 2.0 + delta * self.rng.gen::<f64>();
            }
            (None, _) => {
                let shrink = self.policy.stagnation_shrink_base
                    + f64::from(state.consecutive_no_improvement);
                state.hi_freq = state.lo_freq + state.resolution;
                state.lo_freq /= shrink;
            }
        }

        state.hi_freq = state.hi_freq.ceil();
    }
}

/// `n` evenly spaced samples over the window, canonicalized to whole
/// picosecond periods, minus anything already tried or repeated.
fn sample_window(state: &SearchState, n: usize) -> CandidateBatch {
    let (lo, hi) = (state.lo_freq, state.hi_freq);
    let freq_step = (hi - lo) / (n - 1) as f64;

    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(n);
    for i in 0..n {
        let raw = if i == n - 1 {
            hi
        } else {
            freq_step.mul_add(i as f64, lo)
        };
        if state.was_frequency_tried(raw) {
            continue;
        }
        let candidate = Candidate::from_mhz(raw);
        if state.was_period_tried(candidate.period) || !seen.insert(candidate.period) {
            continue;
        }
        candidates.push(candidate);
    }

    CandidateBatch {
        candidates,
        freq_step,
    }
}
