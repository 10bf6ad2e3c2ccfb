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

//! This module defines the abstraction of the (expensive) energy evaluator
//! which computes the true minimized energy of full conformations and tuples.

use thiserror::Error;

use crate::{MinimizerError, RcTuple};

/// The reasons why an energy evaluation can fail
#[derive(Debug, Error)]
pub enum EvaluationError {
    /// The evaluator does not know how to handle the given conformation
    #[error("conformation {0:?} cannot be evaluated")]
    Unsupported(Vec<usize>),
    /// The underlying minimization went wrong
    #[error("minimization failed: {0}")]
    Minimization(#[from] MinimizerError),
    /// Any other failure
    #[error("evaluation failed: {0}")]
    Failed(String),
}

/// The energy of a minimized conformation broken down into one body and
/// pairwise terms. This is what correction harvesting compares against the
/// terms of the minimized energy matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyBreakdown {
    nb_positions: usize,
    one_body: Vec<f64>,
    pairwise: Vec<f64>,
}
impl EnergyBreakdown {
    /// Creates an all-zero breakdown for a conformation of `nb_positions`
    pub fn new(nb_positions: usize) -> Self {
        Self {
            nb_positions,
            one_body: vec![0.0; nb_positions],
            pairwise: vec![0.0; nb_positions * nb_positions],
        }
    }
    pub fn nb_positions(&self) -> usize {
        self.nb_positions
    }
    pub fn one(&self, pos: usize) -> f64 {
        self.one_body[pos]
    }
    pub fn pair(&self, pos1: usize, pos2: usize) -> f64 {
        self.pairwise[pos1 * self.nb_positions + pos2]
    }
    pub fn set_one(&mut self, pos: usize, energy: f64) {
        self.one_body[pos] = energy;
    }
    /// Sets the (symmetric) interaction energy between two positions
    pub fn set_pair(&mut self, pos1: usize, pos2: usize, energy: f64) {
        self.pairwise[pos1 * self.nb_positions + pos2] = energy;
        self.pairwise[pos2 * self.nb_positions + pos1] = energy;
    }
    /// Adds `delta` to the interaction energy between two positions
    pub fn add_pair(&mut self, pos1: usize, pos2: usize, delta: f64) {
        let energy = self.pair(pos1, pos2) + delta;
        self.set_pair(pos1, pos2, energy);
    }
    /// The sum of all terms
    pub fn total(&self) -> f64 {
        let n = self.nb_positions;
        let mut total: f64 = self.one_body.iter().sum();
        for p1 in 0..n {
            for p2 in 0..p1 {
                total += self.pair(p1, p2);
            }
        }
        total
    }
}

/// The outcome of a successful full evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedConf {
    /// The minimized energy of the conformation
    pub energy: f64,
    /// The decomposition of that energy (when the evaluator provides it)
    pub breakdown: Option<EnergyBreakdown>,
}

/// The energy evaluator computes true (continuously minimized) energies.
/// Calling it is by far the most expensive thing a computation does.
pub trait EnergyEvaluator {
    /// Minimizes the full conformation `conf` and returns its energy
    fn evaluate(&self, conf: &[usize]) -> Result<EvaluatedConf, EvaluationError>;
    /// Minimizes the tuple seen as a conformation of its own and returns its
    /// internal energy
    fn evaluate_tuple(&self, tuple: &RcTuple) -> Result<f64, EvaluationError>;
}
