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

//! This module defines the abstractions of continuous minimization: an
//! objective function over bounded degrees of freedom (DOFs), a minimizer,
//! and a provider building the objective function of a full conformation.

use thiserror::Error;

/// The reasons why a minimization can fail
#[derive(Debug, Error)]
pub enum MinimizerError {
    /// No objective function can be built for that conformation
    #[error("no objective function for conformation {0:?}")]
    NoObjective(Vec<usize>),
    /// The starting point does not have the expected number of DOFs
    #[error("expected {expected} degrees of freedom, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// The objective evaluated to NaN or to an infinite value
    #[error("the objective value is not finite")]
    NonFinite,
    /// Any other failure
    #[error("minimization failed: {0}")]
    Failed(String),
}

/// A real valued function of a bounded vector of DOFs
pub trait ObjectiveFunction {
    /// The number of DOFs of the function
    fn num_dofs(&self) -> usize;
    /// The (lower, upper) bounds of the given dof
    fn bounds(&self, dof: usize) -> (f64, f64);
    /// The value of the function at point `x`
    fn value(&self, x: &[f64]) -> f64;
    /// The initial step size used to explore the given dof
    fn initial_step(&self, dof: usize) -> f64 {
        let (lo, hi) = self.bounds(dof);
        (hi - lo) / 4.0
    }
    /// The center of the feasible region
    fn center(&self) -> Vec<f64> {
        (0..self.num_dofs())
            .map(|dof| {
                let (lo, hi) = self.bounds(dof);
                (lo + hi) / 2.0
            })
            .collect()
    }
}

/// A local minimum (point and value) found by some minimizer
#[derive(Debug, Clone, PartialEq)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
}

/// A minimizer looks for a local minimum of an objective function, starting
/// from the given point.
pub trait Minimizer {
    fn minimize(&self, f: &dyn ObjectiveFunction, start: &[f64]) -> Result<Minimum, MinimizerError>;
}

/// The objective function of a full conformation along with the position
/// each of its DOFs belongs to.
pub struct ConfObjective {
    pub function: Box<dyn ObjectiveFunction + Send + Sync>,
    /// `dof_positions[d]` is the position of dof `d`
    pub dof_positions: Vec<usize>,
}
impl ConfObjective {
    /// The DOFs belonging to any of the given positions
    pub fn dofs_of(&self, positions: &[usize]) -> Vec<usize> {
        self.dof_positions.iter().enumerate()
            .filter(|(_, pos)| positions.contains(pos))
            .map(|(dof, _)| dof)
            .collect()
    }
}

/// Builds the objective function of full conformations
pub trait ObjectiveProvider {
    fn make_objective(&self, conf: &[usize]) -> Result<ConfObjective, MinimizerError>;
}
