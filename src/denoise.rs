use log::info;
use rand::prelude::*;
use rand::rngs::StdRng;
use rayon::prelude::*;
use thiserror::Error;

use crate::gibbs::{run_chain, threshold, FrameSink, GibbsSchedule};
use crate::lattice::{ExternalField, IsingLattice};
use crate::topology::Topology;
use crate::utils::grid_accuracy;

#[derive(Debug, Error)]
pub enum DenoiseError {
    #[error("grid has {got} sites, expected {expected} (height * width)")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("noise rate must lie strictly inside (0, 1), got {0}")]
    InvalidNoiseRate(f64),
    #[error("inverse temperature must be non-negative, got {0}")]
    InvalidInverseTemperature(f64),
    #[error("grid value {0} is not a spin (+1 or -1)")]
    InvalidSpin(i8),
}

/// Parameters of one denoising run.
///
/// `noise_rate` is q, the probability an observed site is uncorrupted; it
/// only enters through the per-site field bias 0.5 * ln(q / (1 - q)).
#[derive(Debug, Clone, Copy)]
pub struct DenoiseConfig {
    pub noise_rate: f64,
    pub inv_temp: f64,
    pub topology: Topology,
    pub schedule: GibbsSchedule,
}

impl DenoiseConfig {
    pub fn new(noise_rate: f64, inv_temp: f64, burnin: usize, loops: usize) -> Self {
        Self {
            noise_rate,
            inv_temp,
            topology: Topology::Four,
            schedule: GibbsSchedule::new(burnin, loops),
        }
    }
}

#[derive(Debug)]
pub struct DenoiseOutput {
    /// Thresholded running average, +1/-1 per site.
    pub denoised: Vec<i8>,
    /// Raw posterior-mean estimate per site, in [-1, 1].
    pub average: Vec<f64>,
    /// Per-iteration accuracy against ground truth, when supplied.
    pub accuracy_trace: Option<Vec<f64>>,
}

/// Wires a noisy binary observation into a lattice with the matching
/// log-likelihood-ratio field and drives the chain over it.
#[derive(Debug)]
pub struct DenoiseSession {
    lattice: IsingLattice,
    schedule: GibbsSchedule,
}

impl DenoiseSession {
    /// Validates the observation and builds the warm-started lattice.
    ///
    /// Field per site is 0.5 * ln(q / (1 - q)) * observed spin, the bias a
    /// binary-symmetric noise model contributes to the posterior; spins are
    /// initialized to the noisy grid itself to shorten burn-in.
    pub fn new(
        noisy: &[i8],
        height: usize,
        width: usize,
        config: &DenoiseConfig,
    ) -> Result<Self, DenoiseError> {
        if noisy.len() != height * width {
            return Err(DenoiseError::DimensionMismatch {
                expected: height * width,
                got: noisy.len(),
            });
        }
        if let Some(&bad) = noisy.iter().find(|&&s| s != 1 && s != -1) {
            return Err(DenoiseError::InvalidSpin(bad));
        }
        let q = config.noise_rate;
        if !(q > 0.0 && q < 1.0) {
            return Err(DenoiseError::InvalidNoiseRate(q));
        }
        if !(config.inv_temp >= 0.0) {
            return Err(DenoiseError::InvalidInverseTemperature(config.inv_temp));
        }

        let bias = 0.5 * (q / (1.0 - q)).ln();
        let field: Vec<f64> = noisy.iter().map(|&s| bias * f64::from(s)).collect();

        let mut lattice = IsingLattice::new(
            height,
            width,
            ExternalField::PerSite(field),
            config.inv_temp,
            config.topology,
        );
        lattice.set_spins(noisy);

        Ok(Self {
            lattice,
            schedule: config.schedule,
        })
    }

    /// Runs the chain and thresholds the running average at zero.
    pub fn run<R: Rng + ?Sized>(
        mut self,
        rng: &mut R,
        ground_truth: Option<&[i8]>,
        sink: Option<&mut dyn FrameSink>,
    ) -> Result<DenoiseOutput, DenoiseError> {
        if let Some(truth) = ground_truth {
            if truth.len() != self.lattice.num_sites() {
                return Err(DenoiseError::DimensionMismatch {
                    expected: self.lattice.num_sites(),
                    got: truth.len(),
                });
            }
        }

        let out = run_chain(&mut self.lattice, rng, &self.schedule, ground_truth, sink);

        Ok(DenoiseOutput {
            denoised: threshold(&out.average),
            average: out.average,
            accuracy_trace: out.accuracy_trace,
        })
    }
}

/// Single-call convenience wrapper over session construction and run.
pub fn denoise<R: Rng + ?Sized>(
    noisy: &[i8],
    height: usize,
    width: usize,
    config: &DenoiseConfig,
    rng: &mut R,
    ground_truth: Option<&[i8]>,
) -> Result<DenoiseOutput, DenoiseError> {
    DenoiseSession::new(noisy, height, width, config)?.run(rng, ground_truth, None)
}

/// Runs one independent chain per seed and averages the per-chain posterior
/// means.
///
/// Each chain owns its own lattice copy; there is no shared mutable state,
/// so chains parallelize freely. The ensemble mean has lower Monte Carlo
/// error than any single chain of the same length.
pub fn denoise_ensemble(
    noisy: &[i8],
    height: usize,
    width: usize,
    config: &DenoiseConfig,
    seeds: &[u64],
) -> Result<DenoiseOutput, DenoiseError> {
    assert!(!seeds.is_empty(), "ensemble needs at least one seed");

    // Fail construction once up front rather than inside the worker pool.
    DenoiseSession::new(noisy, height, width, config)?;

    info!(
        "ensemble denoise: {} chains over {}x{} lattice",
        seeds.len(),
        height,
        width
    );

    let averages: Vec<Vec<f64>> = seeds
        .par_iter()
        .map(|&seed| {
            let session = DenoiseSession::new(noisy, height, width, config)
                .expect("validated before dispatch");
            let mut rng = StdRng::seed_from_u64(seed);
            let out = session
                .run(&mut rng, None, None)
                .expect("validated before dispatch");
            out.average
        })
        .collect();

    let n_sites = height * width;
    let mut average = vec![0.0f64; n_sites];
    for chain_avg in &averages {
        for (acc, &v) in average.iter_mut().zip(chain_avg.iter()) {
            *acc += v;
        }
    }
    let scale = 1.0 / seeds.len() as f64;
    for v in &mut average {
        *v *= scale;
    }

    Ok(DenoiseOutput {
        denoised: threshold(&average),
        average,
        accuracy_trace: None,
    })
}

/// Binary-symmetric channel: flips each site independently with probability
/// `flip_prob`. Used to synthesize noisy observations from a clean grid.
pub fn corrupt<R: Rng + ?Sized>(clean: &[i8], flip_prob: f64, rng: &mut R) -> Vec<i8> {
    clean
        .iter()
        .map(|&s| if rng.random::<f64>() < flip_prob { -s } else { s })
        .collect()
}

/// Accuracy of a grid against ground truth; re-exported convenience for
/// before/after comparisons at the call site.
pub fn accuracy(grid: &[i8], truth: &[i8]) -> f64 {
    grid_accuracy(grid, truth)
}
