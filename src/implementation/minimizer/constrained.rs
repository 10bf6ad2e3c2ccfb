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

//! This module provides the constrained minimizer: a wrapper which only lets
//! an underlying minimizer move a designated subset of the DOFs of an
//! objective function while all the other DOFs stay fixed.

use std::cell::RefCell;

use crate::{Minimizer, Minimum, ObjectiveFunction};

/// The restriction of an objective function to its free DOFs. The fixed
/// DOFs keep the value they have in `base`.
struct SubspaceObjective<'f> {
    function: &'f dyn ObjectiveFunction,
    free: &'f [usize],
    base: RefCell<Vec<f64>>,
}
impl ObjectiveFunction for SubspaceObjective<'_> {
    fn num_dofs(&self) -> usize {
        self.free.len()
    }
    fn bounds(&self, dof: usize) -> (f64, f64) {
        self.function.bounds(self.free[dof])
    }
    fn value(&self, x: &[f64]) -> f64 {
        let mut full = self.base.borrow_mut();
        for (d, v) in self.free.iter().zip(x.iter()) {
            full[*d] = *v;
        }
        self.function.value(&full)
    }
    fn initial_step(&self, dof: usize) -> f64 {
        self.function.initial_step(self.free[dof])
    }
}

/// Optimizes a subset of the DOFs of an objective function
pub struct ConstrainedMinimizer<'m> {
    minimizer: &'m dyn Minimizer,
}
impl <'m> ConstrainedMinimizer<'m> {
    pub fn new(minimizer: &'m dyn Minimizer) -> Self {
        Self { minimizer }
    }
    /// Minimizes `f` starting from `start` while only moving the DOFs listed
    /// in `free`. This never fails: when the underlying minimizer fails, the
    /// starting point is returned along with its value.
    pub fn minimize_subset(&self, f: &dyn ObjectiveFunction, free: &[usize], start: &[f64]) -> Minimum {
        let unchanged = || Minimum { x: start.to_vec(), value: f.value(start) };
        if free.is_empty() {
            return unchanged();
        }
        if free.len() == f.num_dofs() {
            return match self.minimizer.minimize(f, start) {
                Ok(min) => min,
                Err(e) => {
                    log::debug!("constrained minimization fell back to its start: {e}");
                    unchanged()
                }
            };
        }
        let sub = SubspaceObjective { function: f, free, base: RefCell::new(start.to_vec()) };
        let sub_start: Vec<f64> = free.iter().map(|d| start[*d]).collect();
        match self.minimizer.minimize(&sub, &sub_start) {
            Ok(min) => {
                let mut x = start.to_vec();
                for (d, v) in free.iter().zip(min.x.iter()) {
                    x[*d] = *v;
                }
                Minimum { x, value: min.value }
            }
            Err(e) => {
                log::debug!("constrained minimization fell back to its start: {e}");
                unchanged()
            }
        }
    }
}
