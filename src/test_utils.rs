// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides some utilities to write tests, the most notable of
//! which are toy definitions of the collaborators a computation needs: a
//! dense conformation space, dense energy matrices, a deterministic energy
//! evaluator and some objective providers.
//!
//! These toys are public so that the integration tests (and your own tests)
//! can use them as well.

use std::sync::atomic::{AtomicUsize, Ordering};

use fxhash::FxHashSet;

use crate::*;

// ----------------------------------------------------------------------------
// --- PSEUDO RANDOM NUMBERS --------------------------------------------------
// ----------------------------------------------------------------------------
/// A tiny xorshift generator. It is plenty enough to generate reproducible
/// toy instances.
#[derive(Debug, Clone)]
pub struct XorShift(u64);
impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1)
    }
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    /// A value uniformly drawn from [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
    /// A value uniformly drawn from [lo, hi)
    pub fn range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
    /// An integer uniformly drawn from [lo, hi]
    pub fn int(&mut self, lo: usize, hi: usize) -> usize {
        lo + (self.next_u64() % (hi - lo + 1) as u64) as usize
    }
}

// ----------------------------------------------------------------------------
// --- TOY SPACE --------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A conformation space given by its number of options per position
#[derive(Debug, Clone, Default)]
pub struct ToySpace {
    options: Vec<usize>,
    pruned: FxHashSet<(usize, usize, usize, usize)>,
}
impl ToySpace {
    pub fn new(options: Vec<usize>) -> Self {
        Self { options, pruned: Default::default() }
    }
    /// Marks the pair `{pos1 = rc1, pos2 = rc2}` as pruned
    pub fn prune_pair(&mut self, pos1: usize, rc1: usize, pos2: usize, rc2: usize) {
        self.pruned.insert((pos1, rc1, pos2, rc2));
        self.pruned.insert((pos2, rc2, pos1, rc1));
    }
    /// Enumerates all the full conformations that do not contain a pruned pair
    pub fn enumerate(&self) -> Vec<Vec<usize>> {
        let mut out = vec![];
        let mut current = vec![0; self.options.len()];
        self.enumerate_from(0, &mut current, &mut out);
        out
    }
    fn enumerate_from(&self, pos: usize, current: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
        if pos == self.options.len() {
            out.push(current.clone());
            return;
        }
        for rc in 0..self.options[pos] {
            let pruned = (0..pos).any(|p| self.is_pruned_pair(p, current[p], pos, rc));
            if !pruned {
                current[pos] = rc;
                self.enumerate_from(pos + 1, current, out);
            }
        }
    }
}
impl ConfSpace for ToySpace {
    fn nb_positions(&self) -> usize {
        self.options.len()
    }
    fn nb_options(&self, pos: usize) -> usize {
        self.options[pos]
    }
    fn is_pruned_pair(&self, pos1: usize, rc1: usize, pos2: usize, rc2: usize) -> bool {
        self.pruned.contains(&(pos1, rc1, pos2, rc2))
    }
}

// ----------------------------------------------------------------------------
// --- TOY MATRIX -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A dense pairwise energy matrix
#[derive(Debug, Clone, Default)]
pub struct ToyMatrix {
    offsets: Vec<usize>,
    size: usize,
    one: Vec<f64>,
    pair: Vec<f64>,
}
impl ToyMatrix {
    /// An all-zero matrix for a space with the given number of options per
    /// position
    pub fn zeros(options: &[usize]) -> Self {
        let mut offsets = Vec::with_capacity(options.len());
        let mut size = 0;
        for n in options {
            offsets.push(size);
            size += n;
        }
        Self { offsets, size, one: vec![0.0; size], pair: vec![0.0; size * size] }
    }
    fn idx(&self, pos: usize, rc: usize) -> usize {
        self.offsets[pos] + rc
    }
    pub fn set_one(&mut self, pos: usize, rc: usize, energy: f64) {
        let i = self.idx(pos, rc);
        self.one[i] = energy;
    }
    pub fn set_pair(&mut self, pos1: usize, rc1: usize, pos2: usize, rc2: usize, energy: f64) {
        let i = self.idx(pos1, rc1);
        let j = self.idx(pos2, rc2);
        self.pair[i * self.size + j] = energy;
        self.pair[j * self.size + i] = energy;
    }
    /// A random matrix: one body terms in [-2, 0) and pairwise terms in
    /// [-1, 0.5)
    pub fn random(options: &[usize], rng: &mut XorShift) -> Self {
        let mut matrix = Self::zeros(options);
        for (pos1, n1) in options.iter().enumerate() {
            for rc1 in 0..*n1 {
                matrix.set_one(pos1, rc1, rng.range(-2.0, 0.0));
                for (pos2, n2) in options.iter().enumerate().take(pos1) {
                    for rc2 in 0..*n2 {
                        matrix.set_pair(pos1, rc1, pos2, rc2, rng.range(-1.0, 0.5));
                    }
                }
            }
        }
        matrix
    }
    /// A copy of this matrix whose pairwise terms are all increased by
    /// `delta`. This is how the toys derive a rigid matrix from a minimized
    /// one.
    pub fn shifted(&self, delta: f64) -> Self {
        let mut matrix = self.clone();
        let nb_positions = self.offsets.len();
        for pos1 in 0..nb_positions {
            for pos2 in 0..nb_positions {
                if pos1 == pos2 {
                    continue;
                }
                for i in self.range_of(pos1) {
                    for j in self.range_of(pos2) {
                        matrix.pair[i * self.size + j] += delta;
                    }
                }
            }
        }
        matrix
    }
    fn range_of(&self, pos: usize) -> std::ops::Range<usize> {
        let end = self.offsets.get(pos + 1).copied().unwrap_or(self.size);
        self.offsets[pos]..end
    }
}
impl EnergyMatrix for ToyMatrix {
    fn one_body(&self, pos: usize, rc: usize) -> f64 {
        self.one[self.idx(pos, rc)]
    }
    fn pairwise(&self, pos1: usize, rc1: usize, pos2: usize, rc2: usize) -> f64 {
        self.pair[self.idx(pos1, rc1) * self.size + self.idx(pos2, rc2)]
    }
}

// ----------------------------------------------------------------------------
// --- TOY EVALUATOR ----------------------------------------------------------
// ----------------------------------------------------------------------------
/// A deterministic evaluator: the true energy of a conformation is its
/// energy in the minimized matrix plus the sum of the triple-body terms it
/// contains. The breakdown spreads each triple term evenly over the three
/// pairs of the triple.
#[derive(Debug, Default)]
pub struct ToyEvaluator {
    matrix: ToyMatrix,
    triples: Vec<(RcTuple, f64)>,
    failing: Vec<Vec<usize>>,
    calls: AtomicUsize,
    tuple_calls: AtomicUsize,
}
impl ToyEvaluator {
    pub fn new(matrix: ToyMatrix) -> Self {
        Self { matrix, ..Default::default() }
    }
    /// Adds a triple-body term
    pub fn with_triple(mut self, tuple: RcTuple, energy: f64) -> Self {
        self.triples.push((tuple, energy));
        self
    }
    /// Makes the evaluation of `conf` fail
    pub fn failing_on(mut self, conf: Vec<usize>) -> Self {
        self.failing.push(conf);
        self
    }
    /// The true energy of a conformation (without counting it as a call)
    pub fn energy_of(&self, conf: &[usize]) -> f64 {
        let assignment: Vec<Option<usize>> = conf.iter().copied().map(Some).collect();
        self.matrix.conf_energy(&assignment) + self.triples.iter()
            .filter(|(t, _)| t.is_contained_in(&assignment))
            .map(|(_, e)| *e)
            .sum::<f64>()
    }
    /// The number of full evaluations performed so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
    /// The number of tuple evaluations performed so far
    pub fn tuple_calls(&self) -> usize {
        self.tuple_calls.load(Ordering::SeqCst)
    }
    /// The exact partition function of the given space
    pub fn exact_z(&self, space: &ToySpace, rt: f64) -> LogZ {
        space.enumerate().iter()
            .map(|conf| LogZ::boltzmann(self.energy_of(conf), rt))
            .sum()
    }
}
impl EnergyEvaluator for ToyEvaluator {
    fn evaluate(&self, conf: &[usize]) -> Result<EvaluatedConf, EvaluationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|f| f == conf) {
            return Err(EvaluationError::Unsupported(conf.to_vec()));
        }
        let assignment: Vec<Option<usize>> = conf.iter().copied().map(Some).collect();
        let n = conf.len();
        let mut breakdown = EnergyBreakdown::new(n);
        for p1 in 0..n {
            breakdown.set_one(p1, self.matrix.one_body(p1, conf[p1]));
            for p2 in 0..p1 {
                breakdown.set_pair(p1, p2, self.matrix.pairwise(p1, conf[p1], p2, conf[p2]));
            }
        }
        for (tuple, energy) in self.triples.iter() {
            if tuple.is_contained_in(&assignment) {
                let positions: Vec<usize> = tuple.positions().collect();
                let nb_pairs = (positions.len() * (positions.len() - 1) / 2).max(1) as f64;
                for (i, p1) in positions.iter().enumerate() {
                    for p2 in positions.iter().take(i) {
                        breakdown.add_pair(*p1, *p2, energy / nb_pairs);
                    }
                }
            }
        }
        Ok(EvaluatedConf { energy: self.energy_of(conf), breakdown: Some(breakdown) })
    }
    fn evaluate_tuple(&self, tuple: &RcTuple) -> Result<f64, EvaluationError> {
        self.tuple_calls.fetch_add(1, Ordering::SeqCst);
        let extra: f64 = self.triples.iter()
            .filter(|(t, _)| t.iter().all(|a| tuple.iter().any(|b| a == b)))
            .map(|(_, e)| *e)
            .sum();
        Ok(self.matrix.internal_energy(tuple) + extra)
    }
}

// ----------------------------------------------------------------------------
// --- TOY INSTANCE -----------------------------------------------------------
// ----------------------------------------------------------------------------
/// Everything needed to run a computation on a toy problem. The rigid matrix
/// is the minimized one shifted by +2 on every pair, which keeps it above the
/// true energies as long as the triple terms of any conformation sum to less
/// than twice its number of pairs.
pub struct ToyInstance {
    pub space: ToySpace,
    pub minimized: ToyMatrix,
    pub rigid: ToyMatrix,
    pub evaluator: ToyEvaluator,
}
impl ToyInstance {
    /// A random instance with `nb_positions` positions having between 1 and
    /// `max_options` options. A few random triple terms in [0.2, 1.0) are
    /// added to the evaluator.
    pub fn random(seed: u64, nb_positions: usize, max_options: usize) -> Self {
        let mut rng = XorShift::new(seed);
        let options: Vec<usize> = (0..nb_positions).map(|_| rng.int(1, max_options)).collect();
        let minimized = ToyMatrix::random(&options, &mut rng);
        let rigid = minimized.shifted(2.0);
        let mut evaluator = ToyEvaluator::new(minimized.clone());
        if nb_positions >= 3 {
            for _ in 0..nb_positions {
                let p1 = rng.int(0, nb_positions - 1);
                let p2 = (p1 + 1) % nb_positions;
                let p3 = (p1 + 2) % nb_positions;
                let tuple = RcTuple::new([
                    Assignment { pos: p1, rc: rng.int(0, options[p1] - 1) },
                    Assignment { pos: p2, rc: rng.int(0, options[p2] - 1) },
                    Assignment { pos: p3, rc: rng.int(0, options[p3] - 1) },
                ]);
                let energy = rng.range(0.2, 1.0);
                evaluator = evaluator.with_triple(tuple, energy);
            }
        }
        Self { space: ToySpace::new(options), minimized, rigid, evaluator }
    }
    /// The exact partition function of the instance
    pub fn exact_z(&self, rt: f64) -> LogZ {
        self.evaluator.exact_z(&self.space, rt)
    }
}

// ----------------------------------------------------------------------------
// --- OBJECTIVES -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A convex quadratic bowl whose minimum value is `base`
#[derive(Debug, Clone)]
pub struct Quadratic {
    pub base: f64,
    pub centers: Vec<f64>,
}
impl ObjectiveFunction for Quadratic {
    fn num_dofs(&self) -> usize {
        self.centers.len()
    }
    fn bounds(&self, _dof: usize) -> (f64, f64) {
        (-1.0, 1.0)
    }
    fn value(&self, x: &[f64]) -> f64 {
        self.base + x.iter().zip(self.centers.iter()).map(|(x, c)| (x - c) * (x - c)).sum::<f64>()
    }
}

/// Builds a quadratic objective for each conformation: its minimum is the
/// true energy of the conformation (as given by the evaluator) and each
/// position owns `dofs_per_position` DOFs whose optimum depends on the
/// option that was chosen.
pub struct QuadraticProvider<'a> {
    pub evaluator: &'a ToyEvaluator,
    pub dofs_per_position: usize,
}
impl <'a> QuadraticProvider<'a> {
    pub fn new(evaluator: &'a ToyEvaluator) -> Self {
        Self { evaluator, dofs_per_position: 2 }
    }
}
impl ObjectiveProvider for QuadraticProvider<'_> {
    fn make_objective(&self, conf: &[usize]) -> Result<ConfObjective, MinimizerError> {
        let mut centers = vec![];
        let mut dof_positions = vec![];
        for (pos, rc) in conf.iter().enumerate() {
            for k in 0..self.dofs_per_position {
                centers.push(((pos * 7 + rc * 3 + k) % 5) as f64 * 0.2 - 0.4);
                dof_positions.push(pos);
            }
        }
        let function = Quadratic { base: self.evaluator.energy_of(conf), centers };
        Ok(ConfObjective { function: Box::new(function), dof_positions })
    }
}

/// A provider that never manages to build an objective
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingProvider;
impl ObjectiveProvider for FailingProvider {
    fn make_objective(&self, conf: &[usize]) -> Result<ConfObjective, MinimizerError> {
        Err(MinimizerError::NoObjective(conf.to_vec()))
    }
}

/// A minimizer that always fails
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingMinimizer;
impl Minimizer for FailingMinimizer {
    fn minimize(&self, _f: &dyn ObjectiveFunction, _start: &[f64]) -> Result<Minimum, MinimizerError> {
        Err(MinimizerError::Failed("this minimizer always fails".to_string()))
    }
}
