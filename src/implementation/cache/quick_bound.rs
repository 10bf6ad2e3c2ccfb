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

//! This module provides the quick-bound cache (a.k.a. partial fix cache). Its
//! purpose is to produce a tight *upper* bound on the minimized energy of a
//! full conformation at a fraction of the cost of a full minimization.
//!
//! Any point of the feasible region of a conformation objective yields an
//! upper bound on its minimum. The cache looks for a good point by walking a
//! branch decomposition of the positions: the DOFs of the blocks (leaves)
//! are minimized, those of the separators only get a few coordinate descent
//! steps. The coordinates found for the non-separator DOFs of a branch are
//! cached, keyed by the options of the branch positions, so that any later
//! conformation agreeing with that branch starts from them instead of
//! redoing the work.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use derive_builder::Builder;
use fxhash::FxBuildHasher;
use log::debug;

use crate::{BranchDecomposition, ConfObjective, ConstrainedMinimizer, CoordinateDescent,
    DecompositionNode, Minimizer, MinimizerError, ObjectiveProvider, RcTuple};

/// The default number of coordinate descent sweeps over separator DOFs
pub const DEFAULT_QUICK_ITERATIONS: usize = 5;
/// The default maximum number of cached entries
pub const DEFAULT_CAPACITY: usize = 100_000;
/// The default maximum number of positions of a decomposition leaf
pub const DEFAULT_MAX_BLOCK: usize = 3;
/// The default number of coordinate descent sweeps over leaf DOFs
pub const DEFAULT_LEAF_ITERATIONS: usize = 30;

/// This is how you configure the quick-bound cache
#[derive(Debug, Clone, Builder)]
pub struct QuickBoundConfig {
    /// The number of coordinate descent sweeps over separator DOFs
    #[builder(default = "DEFAULT_QUICK_ITERATIONS")]
    pub quick_iterations: usize,
    /// The maximum number of entries. Once full, the cache stops learning.
    #[builder(default = "DEFAULT_CAPACITY")]
    pub capacity: usize,
    /// The maximum number of positions of a decomposition leaf
    #[builder(default = "DEFAULT_MAX_BLOCK")]
    pub max_block: usize,
    /// The number of coordinate descent sweeps over leaf DOFs
    #[builder(default = "DEFAULT_LEAF_ITERATIONS")]
    pub leaf_iterations: usize,
}
impl Default for QuickBoundConfig {
    fn default() -> Self {
        Self {
            quick_iterations: DEFAULT_QUICK_ITERATIONS,
            capacity: DEFAULT_CAPACITY,
            max_block: DEFAULT_MAX_BLOCK,
            leaf_iterations: DEFAULT_LEAF_ITERATIONS,
        }
    }
}

/// A snapshot of the usage counters of a quick-bound cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuickBoundStats {
    /// Number of quick upper bounds that were requested
    pub queries: usize,
    /// Number of branches whose coordinates were found in the cache
    pub hits: usize,
    /// Number of branches whose coordinates were not found in the cache
    pub misses: usize,
    /// Number of separator optimizations performed
    pub quick_optimizations: usize,
}

pub struct QuickBoundCache<'a> {
    provider: &'a (dyn ObjectiveProvider + Send + Sync),
    /// The minimizer used on the decomposition leaves
    minimizer: Box<dyn Minimizer + Send + Sync + 'a>,
    /// The minimizer used on the separators
    quick: CoordinateDescent,
    decomposition: BranchDecomposition,
    capacity: usize,
    cache: DashMap<RcTuple, Vec<f64>, FxBuildHasher>,
    queries: AtomicUsize,
    hits: AtomicUsize,
    misses: AtomicUsize,
    quick_optimizations: AtomicUsize,
}
impl <'a> QuickBoundCache<'a> {
    pub fn new(
        provider: &'a (dyn ObjectiveProvider + Send + Sync),
        nb_positions: usize,
        config: QuickBoundConfig,
    ) -> Self {
        let decomposition = BranchDecomposition::new(nb_positions, config.max_block);
        debug!("branch decomposition of {nb_positions} positions: {} leaves, branch width {}",
            decomposition.nb_leaves(), decomposition.branch_width());
        Self {
            provider,
            minimizer: Box::new(CoordinateDescent::new(config.leaf_iterations)),
            quick: CoordinateDescent::new(config.quick_iterations),
            decomposition,
            capacity: config.capacity,
            cache: Default::default(),
            queries: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            quick_optimizations: AtomicUsize::new(0),
        }
    }
    /// Replaces the minimizer used on the decomposition leaves
    pub fn with_minimizer(mut self, minimizer: Box<dyn Minimizer + Send + Sync + 'a>) -> Self {
        self.minimizer = minimizer;
        self
    }
    pub fn decomposition(&self) -> &BranchDecomposition {
        &self.decomposition
    }
    pub fn len(&self) -> usize {
        self.cache.len()
    }
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
    pub fn stats(&self) -> QuickBoundStats {
        QuickBoundStats {
            queries: self.queries.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            quick_optimizations: self.quick_optimizations.load(Ordering::Relaxed),
        }
    }

    /// Computes an upper bound on the minimized energy of `conf`
    pub fn quick_upper(&self, conf: &[usize]) -> Result<f64, MinimizerError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        let objective = self.provider.make_objective(conf)?;
        let nb_dofs = objective.function.num_dofs();
        if objective.dof_positions.len() != nb_dofs {
            return Err(MinimizerError::DimensionMismatch {
                expected: nb_dofs,
                actual: objective.dof_positions.len(),
            });
        }
        let mut x = objective.function.center();
        self.process(self.decomposition.root(), conf, &objective, &mut x);
        let value = objective.function.value(&x);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(MinimizerError::NonFinite)
        }
    }

    fn process(&self, node: &DecompositionNode, conf: &[usize], objective: &ConfObjective, x: &mut Vec<f64>) {
        match node {
            DecompositionNode::Leaf { positions } => {
                let dofs = objective.dofs_of(positions);
                let min = ConstrainedMinimizer::new(&*self.minimizer)
                    .minimize_subset(&*objective.function, &dofs, x);
                *x = min.x;
            }
            DecompositionNode::Branch { positions, separator, left, right } => {
                let key = RcTuple::from_conf(conf, positions);
                let lambda = objective.dofs_of(&node.lambda());

                let cached = self.cache.get(&key).map(|coords| coords.clone());
                if let Some(cached) = cached {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    for (d, v) in lambda.iter().zip(cached.iter()) {
                        x[*d] = *v;
                    }
                } else {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    self.process(left, conf, objective, x);
                    self.process(right, conf, objective, x);
                    if self.cache.len() < self.capacity {
                        let coords = lambda.iter().map(|d| x[*d]).collect();
                        self.cache.entry(key).or_insert(coords);
                    }
                }

                let dofs = objective.dofs_of(separator);
                let min = ConstrainedMinimizer::new(&self.quick)
                    .minimize_subset(&*objective.function, &dofs, x);
                *x = min.x;
                self.quick_optimizations.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[cfg(test)]
mod test_quick_bound_cache {
    use crate::{QuickBoundCache, QuickBoundConfig, QuickBoundConfigBuilder, ObjectiveProvider, ObjectiveFunction, MinimizerError};
    use crate::test_utils::{ToyMatrix, ToyEvaluator, QuadraticProvider, FailingProvider, FailingMinimizer, XorShift};

    fn evaluator(n: usize) -> ToyEvaluator {
        let mut rng = XorShift::new(42);
        ToyEvaluator::new(ToyMatrix::random(&vec![2; n], &mut rng))
    }

    #[test]
    fn the_builder_uses_the_default_values() {
        let config = QuickBoundConfigBuilder::default().build().unwrap();
        assert_eq!(5, config.quick_iterations);
        assert_eq!(100_000, config.capacity);
        assert_eq!(3, config.max_block);
        assert_eq!(30, config.leaf_iterations);
    }
    #[test]
    fn the_quick_bound_is_an_upper_bound() {
        let eval = evaluator(7);
        let provider = QuadraticProvider::new(&eval);
        let cache = QuickBoundCache::new(&provider, 7, QuickBoundConfig::default());
        let conf = vec![0, 1, 1, 0, 1, 0, 0];
        let upper = cache.quick_upper(&conf).unwrap();
        let center_value = {
            let objective = provider.make_objective(&conf).unwrap();
            objective.function.value(&objective.function.center())
        };
        assert!(upper >= eval.energy_of(&conf) - 1e-9);
        assert!(upper <= center_value + 1e-9);
    }
    #[test]
    fn a_single_block_is_fully_minimized() {
        let eval = evaluator(3);
        let provider = QuadraticProvider::new(&eval);
        let cache = QuickBoundCache::new(&provider, 3, QuickBoundConfig::default());
        let conf = vec![1, 0, 1];
        let upper = cache.quick_upper(&conf).unwrap();
        assert!((upper - eval.energy_of(&conf)).abs() < 1e-3);
        assert_eq!(0, cache.stats().quick_optimizations);
    }
    #[test]
    fn a_second_query_hits_the_cache() {
        let eval = evaluator(6);
        let provider = QuadraticProvider::new(&eval);
        let cache = QuickBoundCache::new(&provider, 6, QuickBoundConfig::default());
        let conf = vec![0, 0, 1, 1, 0, 1];
        let first = cache.quick_upper(&conf).unwrap();
        assert_eq!(0, cache.stats().hits);
        assert_eq!(1, cache.stats().misses);
        let second = cache.quick_upper(&conf).unwrap();
        assert_eq!(1, cache.stats().hits);
        assert_eq!(2, cache.stats().queries);
        assert!(second >= eval.energy_of(&conf) - 1e-9);
        assert!(first >= eval.energy_of(&conf) - 1e-9);
    }
    #[test]
    fn the_cache_stops_learning_when_full() {
        let eval = evaluator(6);
        let provider = QuadraticProvider::new(&eval);
        let config = QuickBoundConfigBuilder::default().capacity(1).build().unwrap();
        let cache = QuickBoundCache::new(&provider, 6, config);
        cache.quick_upper(&[0, 0, 0, 0, 0, 0]).unwrap();
        cache.quick_upper(&[1, 1, 1, 1, 1, 1]).unwrap();
        assert_eq!(1, cache.len());
    }
    #[test]
    fn a_failing_provider_is_reported() {
        let cache = QuickBoundCache::new(&FailingProvider, 4, QuickBoundConfig::default());
        assert!(matches!(cache.quick_upper(&[0, 0, 0, 0]), Err(MinimizerError::NoObjective(_))));
    }
    #[test]
    fn a_failing_minimizer_still_yields_an_upper_bound() {
        let eval = evaluator(5);
        let provider = QuadraticProvider::new(&eval);
        let cache = QuickBoundCache::new(&provider, 5, QuickBoundConfig::default())
            .with_minimizer(Box::new(FailingMinimizer));
        let conf = vec![1, 1, 0, 0, 1];
        let upper = cache.quick_upper(&conf).unwrap();
        assert!(upper >= eval.energy_of(&conf) - 1e-9);
    }
}
