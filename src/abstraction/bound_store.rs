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

//! This module defines the optional persisted store of conformation bounds.

/// What a bound store remembers about a conformation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoredBounds {
    /// The best known lower bound on the energy of the conformation
    pub lower: f64,
    /// The minimized energy of the conformation (when it has been evaluated)
    pub energy: Option<f64>,
}

/// A bound store keeps the bounds of the conformations that have been
/// evaluated so that a later computation can reuse them instead of running
/// the evaluator again.
pub trait ConfBoundStore {
    /// Returns what is known about `conf` (if anything)
    fn lookup(&self, conf: &[usize]) -> Option<StoredBounds>;
    /// Remembers that `conf` had lower bound `lower` and minimized `energy`
    fn record(&self, conf: &[usize], lower: f64, energy: f64);
}
