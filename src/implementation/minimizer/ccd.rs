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

//! This module provides a bounded cyclic coordinate descent. It is a plain
//! compass search: each DOF in turn is moved by plus or minus its step size,
//! the move is kept when it lowers the objective, and the step is halved when
//! neither direction helps.

use crate::{Minimizer, MinimizerError, Minimum, ObjectiveFunction};

/// The smallest step size worth trying
const MIN_STEP: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateDescent {
    /// The number of sweeps over all DOFs
    pub max_iterations: usize,
    /// The minimal decrease of the objective for a move to be accepted
    pub tolerance: f64,
}
impl CoordinateDescent {
    pub fn new(max_iterations: usize) -> Self {
        Self { max_iterations, tolerance: 0.0 }
    }
}
impl Default for CoordinateDescent {
    fn default() -> Self {
        Self::new(30)
    }
}
impl Minimizer for CoordinateDescent {
    fn minimize(&self, f: &dyn ObjectiveFunction, start: &[f64]) -> Result<Minimum, MinimizerError> {
        let n = f.num_dofs();
        if start.len() != n {
            return Err(MinimizerError::DimensionMismatch { expected: n, actual: start.len() });
        }
        let mut x: Vec<f64> = start.iter().enumerate()
            .map(|(d, v)| {
                let (lo, hi) = f.bounds(d);
                v.clamp(lo, hi)
            })
            .collect();
        let mut value = f.value(&x);
        if !value.is_finite() {
            return Err(MinimizerError::NonFinite);
        }
        let mut steps: Vec<f64> = (0..n).map(|d| f.initial_step(d)).collect();

        for _ in 0..self.max_iterations {
            if steps.iter().all(|s| *s < MIN_STEP) {
                break;
            }
            for d in 0..n {
                if steps[d] < MIN_STEP {
                    continue;
                }
                let (lo, hi) = f.bounds(d);
                let old = x[d];
                let mut improved = false;
                for direction in [1.0, -1.0] {
                    let candidate = (old + direction * steps[d]).clamp(lo, hi);
                    if candidate == old {
                        continue;
                    }
                    x[d] = candidate;
                    let v = f.value(&x);
                    if v.is_finite() && v < value - self.tolerance {
                        value = v;
                        improved = true;
                        break;
                    }
                    x[d] = old;
                }
                if !improved {
                    steps[d] /= 2.0;
                }
            }
        }
        Ok(Minimum { x, value })
    }
}

#[cfg(test)]
mod test_coordinate_descent {
    use crate::{CoordinateDescent, Minimizer, MinimizerError, ObjectiveFunction};
    use crate::test_utils::Quadratic;

    struct NotANumber;
    impl ObjectiveFunction for NotANumber {
        fn num_dofs(&self) -> usize { 1 }
        fn bounds(&self, _dof: usize) -> (f64, f64) { (-1.0, 1.0) }
        fn value(&self, _x: &[f64]) -> f64 { f64::NAN }
    }

    #[test]
    fn it_finds_the_minimum_of_a_quadratic() {
        let f = Quadratic { base: -3.0, centers: vec![0.4, -0.2, 0.0] };
        let min = CoordinateDescent::new(60).minimize(&f, &f.center()).unwrap();
        assert!((min.value + 3.0).abs() < 1e-6);
        assert!((min.x[0] - 0.4).abs() < 1e-3);
        assert!((min.x[1] + 0.2).abs() < 1e-3);
    }
    #[test]
    fn it_never_worsens_the_starting_point() {
        let f = Quadratic { base: 1.0, centers: vec![0.3, 0.3] };
        let start = vec![0.9, -0.9];
        let before = f.value(&start);
        for iterations in 0..5 {
            let min = CoordinateDescent::new(iterations).minimize(&f, &start).unwrap();
            assert!(min.value <= before);
        }
    }
    #[test]
    fn it_stays_within_the_bounds() {
        let f = Quadratic { base: 0.0, centers: vec![5.0] };
        let min = CoordinateDescent::new(50).minimize(&f, &[0.0]).unwrap();
        assert!(min.x[0] <= 1.0);
        assert!((min.x[0] - 1.0).abs() < 1e-6);
    }
    #[test]
    fn it_rejects_a_start_of_the_wrong_dimension() {
        let f = Quadratic { base: 0.0, centers: vec![0.0, 0.0] };
        let err = CoordinateDescent::new(5).minimize(&f, &[0.0]);
        assert!(matches!(err, Err(MinimizerError::DimensionMismatch { expected: 2, actual: 1 })));
    }
    #[test]
    fn it_reports_non_finite_objectives() {
        let err = CoordinateDescent::new(5).minimize(&NotANumber, &[0.0]);
        assert!(matches!(err, Err(MinimizerError::NonFinite)));
    }
}
