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

//! This module defines the abstraction of the discrete conformation space
//! being searched, along with the optional dynamic pruning predicate.

use crate::SearchNode;

/// A conformation space is an ordered list of positions, each of which can
/// take one out of a finite number of options (residue conformations). A full
/// conformation assigns exactly one option to each position.
pub trait ConfSpace {
    /// The number of positions $n$ of the space
    fn nb_positions(&self) -> usize;
    /// The number of options available at the given position
    fn nb_options(&self, pos: usize) -> usize;
    /// Returns true iff the pair `{pos1 = rc1, pos2 = rc2}` has been pruned
    /// beforehand. No conformation comprising a pruned pair is ever visited.
    fn is_pruned_pair(&self, _pos1: usize, _rc1: usize, _pos2: usize, _rc2: usize) -> bool {
        false
    }
    /// The natural logarithm of the number of full conformations
    fn ln_num_confs(&self) -> f64 {
        (0..self.nb_positions())
            .map(|pos| (self.nb_options(pos).max(1) as f64).ln())
            .sum()
    }
}

/// A pruner lets the client rule out some options dynamically, upon the
/// expansion of a node. When `is_pruned` returns true, the child obtained by
/// assigning `rc` to `pos` in `node` is never created.
pub trait Pruner {
    fn is_pruned(&self, node: &SearchNode, pos: usize, rc: usize) -> bool;
}
/// Any closure accepting a node, a position and an option can act as pruner
impl <F: Fn(&SearchNode, usize, usize) -> bool> Pruner for F {
    fn is_pruned(&self, node: &SearchNode, pos: usize, rc: usize) -> bool {
        self(node, pos, rc)
    }
}
