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

//! This module defines the scoring abstractions used to bound the energy of
//! the conformations lying under a search node.
//!
//! Scorers are allowed to keep some scratch state, this is why they take
//! `&mut self`. The solver keeps one set of scorers per worker.

use crate::{ConfIndex, SearchNode};

/// A g-scorer computes the energy of the assigned prefix of a node
pub trait GScorer {
    /// The score of the assigned part of `index`
    fn calc(&mut self, index: &ConfIndex) -> f64;
    /// The *increase* of the score when the parent described by `parent` is
    /// extended with the assignment `pos = rc`.
    fn calc_differential(&mut self, parent: &ConfIndex, pos: usize, rc: usize) -> f64;
}

/// An h-scorer bounds the energy of the best (or worst) completion of the
/// assigned prefix of a node.
pub trait HScorer {
    /// The completion score of the node described by `index`
    fn calc(&mut self, index: &ConfIndex) -> f64;
    /// The completion score of the child obtained by extending the node
    /// described by `parent` with the assignment `pos = rc`.
    fn calc_differential(&mut self, parent: &ConfIndex, pos: usize, rc: usize) -> f64;
}

/// A position order decides which position gets assigned when a node is
/// expanded. Returns None iff there is no unassigned position left.
pub trait PositionOrder {
    fn next_position(&self, node: &SearchNode, index: &ConfIndex) -> Option<usize>;
}
