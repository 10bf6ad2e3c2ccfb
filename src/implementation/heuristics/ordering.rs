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

//! This module provides the position orders deciding which position gets
//! assigned when a node is expanded.

use crate::{ConfIndex, ConfSpace, EnergyMatrix, PositionOrder, SearchNode};

/// Assigns the positions in increasing order
#[derive(Debug, Clone, Copy, Default)]
pub struct SequentialOrder;
impl PositionOrder for SequentialOrder {
    fn next_position(&self, _node: &SearchNode, index: &ConfIndex) -> Option<usize> {
        index.undefined.first().copied()
    }
}

/// Assigns first the position whose options are the most discriminated by
/// their lower bounds: the position with the largest spread between the
/// lower bound of its best option and that of its worst option. The spreads
/// are computed once and for all on the minimized matrix.
#[derive(Debug, Clone)]
pub struct StaticBiggestLowerBoundDifference {
    spreads: Vec<f64>,
}
impl StaticBiggestLowerBoundDifference {
    pub fn new(space: &dyn ConfSpace, emat: &dyn EnergyMatrix) -> Self {
        let n = space.nb_positions();
        let mut spreads = vec![0.0; n];
        for (pos, spread) in spreads.iter_mut().enumerate() {
            let mut best = f64::INFINITY;
            let mut worst = f64::NEG_INFINITY;
            for rc in 0..space.nb_options(pos) {
                let mut bound = emat.one_body(pos, rc);
                for other in (0..n).filter(|o| *o != pos) {
                    let min_pair = (0..space.nb_options(other))
                        .map(|rc2| emat.pairwise(pos, rc, other, rc2))
                        .fold(f64::INFINITY, f64::min);
                    if min_pair.is_finite() {
                        bound += min_pair;
                    }
                }
                best = best.min(bound);
                worst = worst.max(bound);
            }
            *spread = if best.is_finite() { worst - best } else { 0.0 };
        }
        Self { spreads }
    }
    pub fn spread(&self, pos: usize) -> f64 {
        self.spreads[pos]
    }
}
impl PositionOrder for StaticBiggestLowerBoundDifference {
    fn next_position(&self, _node: &SearchNode, index: &ConfIndex) -> Option<usize> {
        let mut best: Option<usize> = None;
        for pos in index.undefined.iter().copied() {
            match best {
                Some(b) if self.spreads[b] >= self.spreads[pos] => {}
                _ => best = Some(pos),
            }
        }
        best
    }
}

/// The closed set of position orders a computation can be configured with
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum PositionOrdering {
    /// See `StaticBiggestLowerBoundDifference`
    #[default]
    BiggestLowerBoundDifference,
    /// See `SequentialOrder`
    Sequential,
}
impl PositionOrdering {
    /// Instantiates the order for the given space and minimized matrix
    pub fn build<'a>(self, space: &dyn ConfSpace, emat: &dyn EnergyMatrix) -> Box<dyn PositionOrder + Send + Sync + 'a> {
        match self {
            PositionOrdering::BiggestLowerBoundDifference =>
                Box::new(StaticBiggestLowerBoundDifference::new(space, emat)),
            PositionOrdering::Sequential => Box::new(SequentialOrder),
        }
    }
}
