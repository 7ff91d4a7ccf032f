use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::config::PenaltyWeights;
use crate::error::ConfigError;
use crate::sampler::CostTable;

/// One binary unknown: "car `car_id` pits on `lap`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Decision {
    pub car_id: u32,
    pub lap: u32,
}

/// Fixed bijection between decisions and matrix indices.
///
/// Ordered car-major: cars ascending, laps ascending within a car.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableIndex {
    decisions: Vec<Decision>,
    positions: HashMap<Decision, usize>,
}

impl VariableIndex {
    /// Cartesian product of the cars and laps present in `q`.
    pub fn from_costs(q: &CostTable) -> Self {
        let laps = q.laps();
        let decisions: Vec<Decision> = q
            .car_ids()
            .into_iter()
            .flat_map(|car_id| laps.iter().map(move |&lap| Decision { car_id, lap }))
            .collect();
        let positions = decisions.iter().enumerate().map(|(k, d)| (*d, k)).collect();
        Self {
            decisions,
            positions,
        }
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn decision(&self, index: usize) -> Option<Decision> {
        self.decisions.get(index).copied()
    }

    pub fn position(&self, car_id: u32, lap: u32) -> Option<usize> {
        self.positions.get(&Decision { car_id, lap }).copied()
    }

    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    /// Indices of one car's variables, in lap order.
    pub fn for_car(&self, car_id: u32) -> Vec<usize> {
        self.indices_where(|d| d.car_id == car_id)
    }

    /// Indices of every car's variable for one lap.
    pub fn for_lap(&self, lap: u32) -> Vec<usize> {
        self.indices_where(|d| d.lap == lap)
    }

    fn indices_where(&self, pred: impl Fn(&Decision) -> bool) -> Vec<usize> {
        self.decisions
            .iter()
            .enumerate()
            .filter(|(_, d)| pred(d))
            .map(|(k, _)| k)
            .collect()
    }
}

/// Dense square QUBO matrix, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct QuboMatrix {
    n: usize,
    data: Vec<f64>,
}

impl QuboMatrix {
    pub fn zeros(n: usize) -> Self {
        Self {
            n,
            data: vec![0.0; n * n],
        }
    }

    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let n = rows.len();
        let mut m = Self::zeros(n);
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().take(n).enumerate() {
                m.data[i * n + j] = *v;
            }
        }
        m
    }

    pub fn size(&self) -> usize {
        self.n
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn add(&mut self, i: usize, j: usize, value: f64) {
        self.data[i * self.n + j] += value;
    }

    /// Add `value` to both `(i, j)` and `(j, i)`.
    pub fn add_pair(&mut self, i: usize, j: usize, value: f64) {
        self.add(i, j, value);
        self.add(j, i, value);
    }

    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| (0..i).all(|j| self.get(i, j) == self.get(j, i)))
    }

    /// `x^T Q x` for a 0/1 vector of matching length.
    pub fn energy(&self, x: &[u8]) -> f64 {
        debug_assert_eq!(x.len(), self.n);
        let ones: Vec<usize> = (0..self.n).filter(|&i| x[i] == 1).collect();
        ones.iter()
            .map(|&i| ones.iter().map(|&j| self.get(i, j)).sum::<f64>())
            .sum()
    }

    /// Non-zero entries keyed by `(row, col)`.
    pub fn nonzero_entries(&self) -> BTreeMap<(usize, usize), f64> {
        let mut out = BTreeMap::new();
        for i in 0..self.n {
            for j in 0..self.n {
                let v = self.get(i, j);
                if v != 0.0 {
                    out.insert((i, j), v);
                }
            }
        }
        out
    }

    /// Largest absolute entry.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0, |m, v| m.max(v.abs()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuboProblem {
    pub matrix: QuboMatrix,
    pub variables: VariableIndex,
}

/// Encode the pit cost table plus both cardinality constraints as one QUBO.
///
/// * `stops` - exact stop count per car; cars absent from the map get no
///   stop-count penalty.
/// * `capacity` - max pitting cars per lap.
/// * `weights` - P1 (stops) and P2 (capacity). They must dominate `|q|` or
///   breaking a constraint becomes profitable.
pub fn build_qubo(
    q: &CostTable,
    stops: &BTreeMap<u32, u32>,
    capacity: u32,
    weights: PenaltyWeights,
) -> Result<QuboProblem, ConfigError> {
    weights.validate()?;
    let variables = VariableIndex::from_costs(q);
    if variables.is_empty() {
        return Err(ConfigError::EmptyVariableSpace);
    }
    let car_ids = q.car_ids();
    if let Some(&unknown) = stops.keys().find(|id| car_ids.binary_search(id).is_err()) {
        return Err(ConfigError::UnknownCar(unknown));
    }

    let (p1, p2) = (weights.stops, weights.capacity);
    let capacity_term = p2 * (1.0 - 2.0 * f64::from(capacity));
    let mut matrix = QuboMatrix::zeros(variables.len());

    for (k, d) in variables.decisions().iter().enumerate() {
        let mut diag = q.get(d.car_id, d.lap).unwrap_or(0.0) + capacity_term;
        if let Some(&s) = stops.get(&d.car_id) {
            diag += p1 * (1.0 - 2.0 * f64::from(s));
        }
        matrix.add(k, k, diag);
    }

    for &car_id in stops.keys() {
        add_all_pairs(&mut matrix, &variables.for_car(car_id), 2.0 * p1);
    }
    for lap in q.laps() {
        add_all_pairs(&mut matrix, &variables.for_lap(lap), 2.0 * p2);
    }

    Ok(QuboProblem { matrix, variables })
}

fn add_all_pairs(matrix: &mut QuboMatrix, indices: &[usize], value: f64) {
    for (a, &i) in indices.iter().enumerate() {
        for &j in &indices[a + 1..] {
            matrix.add_pair(i, j, value);
        }
    }
}
