use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::SolverParams;
use crate::error::SolverError;
use crate::qubo::QuboMatrix;

/// Anything that can (heuristically) minimize `x^T Q x` over binary `x`.
///
/// Returns one 0/1 entry per matrix row. Implementations running several
/// reads pick the best one themselves.
pub trait QuboMinimizer: Send + Sync {
    fn minimize(&self, qubo: &QuboMatrix) -> Result<Vec<u8>, SolverError>;
}

impl<M: QuboMinimizer + ?Sized> QuboMinimizer for Box<M> {
    fn minimize(&self, qubo: &QuboMatrix) -> Result<Vec<u8>, SolverError> {
        (**self).minimize(qubo)
    }
}

/// Exact search over every assignment. Only for small instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExhaustiveMinimizer;

impl ExhaustiveMinimizer {
    pub const MAX_VARIABLES: usize = 20;
}

impl QuboMinimizer for ExhaustiveMinimizer {
    fn minimize(&self, qubo: &QuboMatrix) -> Result<Vec<u8>, SolverError> {
        let n = qubo.size();
        if n > Self::MAX_VARIABLES {
            return Err(SolverError::TooLarge {
                variables: n,
                max: Self::MAX_VARIABLES,
            });
        }
        let bits = |mask: u32| -> Vec<u8> { (0..n).map(|i| ((mask >> i) & 1) as u8).collect() };

        let mut best_mask = 0u32;
        let mut best_energy = 0.0;
        for mask in 1..(1u32 << n) {
            let e = qubo.energy(&bits(mask));
            if e < best_energy {
                best_energy = e;
                best_mask = mask;
            }
        }
        Ok(bits(best_mask))
    }
}

/// Seeded simulated annealing with single flips and swap moves,
/// `num_reads` independent restarts.
#[derive(Debug, Clone, Copy)]
pub struct AnnealingMinimizer {
    params: SolverParams,
}

impl AnnealingMinimizer {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    fn anneal(&self, qubo: &QuboMatrix, read: usize, (beta_hot, beta_cold): (f64, f64)) -> (Vec<u8>, f64) {
        let n = qubo.size();
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed.wrapping_add(read as u64));
        let mut x: Vec<u8> = (0..n).map(|_| rng.gen_range(0..=1)).collect();

        // field[i]: energy change of setting x_i = 1, minus the diagonal.
        let mut field = vec![0.0; n];
        for (i, f) in field.iter_mut().enumerate() {
            *f = (0..n)
                .filter(|&j| j != i && x[j] == 1)
                .map(|j| qubo.get(i, j) + qubo.get(j, i))
                .sum();
        }

        let mut energy = qubo.energy(&x);
        let mut best = (x.clone(), energy);
        let sweeps = self.params.sweeps.max(1);
        for sweep in 0..sweeps {
            let t = if sweeps == 1 {
                1.0
            } else {
                sweep as f64 / (sweeps - 1) as f64
            };
            let beta = beta_hot * (beta_cold / beta_hot).powf(t);
            let accept = |delta: f64, rng: &mut ChaCha8Rng| delta <= 0.0 || rng.gen::<f64>() < (-beta * delta).exp();

            for i in 0..n {
                let delta = flip_delta(qubo, &x, &field, i);
                if accept(delta, &mut rng) {
                    flip(qubo, &mut x, &mut field, i);
                    energy += delta;
                    if energy < best.1 {
                        best = (x.clone(), energy);
                    }
                }
            }

            // Swap moves keep the number of set bits, so a one-hot group can
            // move its bit without crossing the penalty barrier.
            let ones: Vec<usize> = (0..n).filter(|&i| x[i] == 1).collect();
            for i in ones {
                for _ in 0..SWAP_TRIES {
                    let j = rng.gen_range(0..n);
                    if x[i] == 0 || x[j] == 1 {
                        continue;
                    }
                    let delta = flip_delta(qubo, &x, &field, i) + flip_delta(qubo, &x, &field, j)
                        - (qubo.get(i, j) + qubo.get(j, i));
                    if accept(delta, &mut rng) {
                        flip(qubo, &mut x, &mut field, i);
                        flip(qubo, &mut x, &mut field, j);
                        energy += delta;
                        if energy < best.1 {
                            best = (x.clone(), energy);
                        }
                        break;
                    }
                }
            }
        }
        let exact = qubo.energy(&best.0);
        (best.0, exact)
    }
}

const SWAP_TRIES: usize = 4;

fn flip_delta(qubo: &QuboMatrix, x: &[u8], field: &[f64], i: usize) -> f64 {
    let gain = qubo.get(i, i) + field[i];
    if x[i] == 0 {
        gain
    } else {
        -gain
    }
}

fn flip(qubo: &QuboMatrix, x: &mut [u8], field: &mut [f64], i: usize) {
    x[i] ^= 1;
    let sign = if x[i] == 1 { 1.0 } else { -1.0 };
    for (j, f) in field.iter_mut().enumerate() {
        if j != i {
            *f += sign * (qubo.get(j, i) + qubo.get(i, j));
        }
    }
}

/// Inverse temperatures: hot enough that the largest single flip is accepted
/// half the time, cold enough that the smallest one is accepted 1% of the time.
fn beta_range(qubo: &QuboMatrix) -> Option<(f64, f64)> {
    let n = qubo.size();
    let mut max_delta: f64 = 0.0;
    let mut min_delta = f64::INFINITY;
    for i in 0..n {
        let mut row = qubo.get(i, i).abs();
        for j in 0..n {
            let v = qubo.get(i, j);
            if v != 0.0 {
                min_delta = min_delta.min(v.abs());
            }
            if j != i {
                row += (v + qubo.get(j, i)).abs();
            }
        }
        max_delta = max_delta.max(row);
    }
    if max_delta == 0.0 || !min_delta.is_finite() {
        return None;
    }
    Some((2f64.ln() / max_delta, 100f64.ln() / min_delta))
}

impl QuboMinimizer for AnnealingMinimizer {
    fn minimize(&self, qubo: &QuboMatrix) -> Result<Vec<u8>, SolverError> {
        if self.params.num_reads == 0 {
            return Err(SolverError::Failed("num_reads must be positive".into()));
        }
        let n = qubo.size();
        let Some(betas) = beta_range(qubo) else {
            return Ok(vec![0; n]);
        };

        let (best, energy, read) = (0..self.params.num_reads)
            .into_par_iter()
            .map(|read| {
                let (x, e) = self.anneal(qubo, read, betas);
                (x, e, read)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)))
            .ok_or_else(|| SolverError::Failed("no reads completed".into()))?;

        tracing::debug!("annealing: best energy {:.3} from read {} of {}", energy, read, self.params.num_reads);
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3-variable instance: x0 + x1 + x2 - 4 x0x1 - 2 x1x2 + 3 x0x2
    fn small() -> QuboMatrix {
        QuboMatrix::from_rows(&[
            vec![1.0, -2.0, 1.5],
            vec![-2.0, 1.0, -1.0],
            vec![1.5, -1.0, 1.0],
        ])
    }

    fn random_instance(n: usize, seed: u64) -> QuboMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut m = QuboMatrix::zeros(n);
        for i in 0..n {
            m.add(i, i, rng.gen_range(-5.0..5.0));
            for j in (i + 1)..n {
                m.add_pair(i, j, rng.gen_range(-3.0..3.0));
            }
        }
        m
    }

    #[test]
    fn test_exhaustive_finds_optimum() {
        let x = ExhaustiveMinimizer.minimize(&small()).unwrap();
        assert_eq!(x, vec![1, 1, 0]);
        assert_eq!(small().energy(&x), -2.0);
    }

    #[test]
    fn test_exhaustive_size_limit() {
        let err = ExhaustiveMinimizer.minimize(&QuboMatrix::zeros(21)).unwrap_err();
        assert_eq!(err, SolverError::TooLarge { variables: 21, max: 20 });
    }

    #[test]
    fn test_annealing_matches_exact_on_small_instances() {
        let annealer = AnnealingMinimizer::new(SolverParams {
            num_reads: 16,
            sweeps: 1000,
            seed: 7,
        });
        for seed in 0..5 {
            let m = random_instance(10, seed);
            let exact = m.energy(&ExhaustiveMinimizer.minimize(&m).unwrap());
            let found = m.energy(&annealer.minimize(&m).unwrap());
            assert!((found - exact).abs() < 1e-9, "seed {seed}: {found} vs {exact}");
        }
    }

    #[test]
    fn test_annealing_is_reproducible_for_a_seed() {
        let annealer = AnnealingMinimizer::new(SolverParams::default());
        let m = random_instance(16, 3);
        assert_eq!(annealer.minimize(&m).unwrap(), annealer.minimize(&m).unwrap());
    }

    #[test]
    fn test_annealing_zero_matrix_and_bad_reads() {
        let annealer = AnnealingMinimizer::new(SolverParams::default());
        assert_eq!(annealer.minimize(&QuboMatrix::zeros(3)).unwrap(), vec![0, 0, 0]);
        let none = AnnealingMinimizer::new(SolverParams {
            num_reads: 0,
            ..SolverParams::default()
        });
        assert!(matches!(none.minimize(&small()), Err(SolverError::Failed(_))));
    }
}
