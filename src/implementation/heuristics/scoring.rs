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

//! This module provides the concrete scorers used to bound the energy of the
//! conformations lying under a node.

use crate::{ConfIndex, ConfSpace, EnergyMatrix, GScorer, HScorer};

/// Scores the assigned prefix of a node with a pairwise energy matrix. This
/// is used on the minimized matrix (g-score) and on the rigid matrix (rigid
/// score) alike.
pub struct PairwiseGScorer<'a> {
    emat: &'a (dyn EnergyMatrix + Send + Sync),
}
impl <'a> PairwiseGScorer<'a> {
    pub fn new(emat: &'a (dyn EnergyMatrix + Send + Sync)) -> Self {
        Self { emat }
    }
}
impl GScorer for PairwiseGScorer<'_> {
    fn calc(&mut self, index: &ConfIndex) -> f64 {
        let mut score = 0.0;
        for (i, a) in index.defined.iter().enumerate() {
            score += self.emat.one_body(a.pos, a.rc);
            for b in index.defined.iter().take(i) {
                score += self.emat.pairwise(a.pos, a.rc, b.pos, b.rc);
            }
        }
        score
    }
    fn calc_differential(&mut self, parent: &ConfIndex, pos: usize, rc: usize) -> f64 {
        let mut delta = self.emat.one_body(pos, rc);
        for a in parent.defined.iter() {
            delta += self.emat.pairwise(pos, rc, a.pos, a.rc);
        }
        delta
    }
}

/// Tells whether a completion scorer bounds the best (lowest) or the worst
/// (highest) completion energy
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sense {
    Lower,
    Upper,
}
impl Sense {
    #[inline]
    fn pick(self, a: f64, b: f64) -> f64 {
        match self {
            Sense::Lower => a.min(b),
            Sense::Upper => a.max(b),
        }
    }
    #[inline]
    fn worst(self) -> f64 {
        match self {
            Sense::Lower => f64::INFINITY,
            Sense::Upper => f64::NEG_INFINITY,
        }
    }
}

/// The traditional pairwise completion bound: each unassigned position
/// independently picks its best option, accounting for its interactions with
/// the assigned positions and (optimistically) with the unassigned positions
/// that come after it.
///
/// With `Sense::Lower` on the minimized matrix, this gives an admissible
/// lower bound on the completion energy. With `Sense::Upper` on the rigid
/// matrix, it gives an upper bound on the energy of any completion.
pub struct TraditionalHScorer<'a> {
    space: &'a (dyn ConfSpace + Send + Sync),
    emat: &'a (dyn EnergyMatrix + Send + Sync),
    sense: Sense,
    scratch: ConfIndex,
}
impl <'a> TraditionalHScorer<'a> {
    pub fn new(space: &'a (dyn ConfSpace + Send + Sync), emat: &'a (dyn EnergyMatrix + Send + Sync), sense: Sense) -> Self {
        Self { space, emat, sense, scratch: ConfIndex::new(space.nb_positions()) }
    }

    fn score(&self, index: &ConfIndex) -> f64 {
        let sense = self.sense;
        let mut score = 0.0;
        for (i, pos) in index.undefined.iter().copied().enumerate() {
            let mut best = sense.worst();
            for rc in 0..self.space.nb_options(pos) {
                let mut energy = self.emat.one_body(pos, rc);
                for a in index.defined.iter() {
                    energy += self.emat.pairwise(pos, rc, a.pos, a.rc);
                }
                for other in index.undefined.iter().skip(i + 1).copied() {
                    let mut best_pair = sense.worst();
                    for rc2 in 0..self.space.nb_options(other) {
                        best_pair = sense.pick(best_pair, self.emat.pairwise(pos, rc, other, rc2));
                    }
                    if best_pair.is_finite() {
                        energy += best_pair;
                    }
                }
                best = sense.pick(best, energy);
            }
            if best.is_finite() {
                score += best;
            }
        }
        score
    }
}
impl HScorer for TraditionalHScorer<'_> {
    fn calc(&mut self, index: &ConfIndex) -> f64 {
        self.score(index)
    }
    fn calc_differential(&mut self, parent: &ConfIndex, pos: usize, rc: usize) -> f64 {
        let mut child = std::mem::take(&mut self.scratch);
        child.index_child(parent, pos, rc);
        let score = self.score(&child);
        self.scratch = child;
        score
    }
}

#[cfg(test)]
mod test_scorers {
    use crate::*;
    use crate::test_utils::{ToySpace, ToyMatrix, XorShift};

    fn instance() -> (ToySpace, ToyMatrix) {
        let options = vec![2, 3, 2, 2];
        let mut rng = XorShift::new(7);
        (ToySpace::new(options.clone()), ToyMatrix::random(&options, &mut rng))
    }

    #[test]
    fn the_differential_g_score_adds_up_to_the_full_score() {
        let (_, emat) = instance();
        let mut scorer = PairwiseGScorer::new(&emat);
        let mut parent = ConfIndex::new(4);
        parent.index(&[Some(1), None, Some(0), None]);
        let mut child = ConfIndex::new(4);
        child.index(&[Some(1), Some(2), Some(0), None]);
        let delta = scorer.calc_differential(&parent, 1, 2);
        assert!((scorer.calc(&parent) + delta - scorer.calc(&child)).abs() < 1e-12);
    }
    #[test]
    fn the_g_score_of_a_full_conformation_is_its_matrix_energy() {
        let (_, emat) = instance();
        let mut scorer = PairwiseGScorer::new(&emat);
        let assignment = [Some(0), Some(1), Some(1), Some(0)];
        let mut index = ConfIndex::new(4);
        index.index(&assignment);
        assert!((scorer.calc(&index) - emat.conf_energy(&assignment)).abs() < 1e-12);
    }
    #[test]
    fn the_lower_h_score_is_admissible() {
        let (space, emat) = instance();
        let mut h = TraditionalHScorer::new(&space, &emat, Sense::Lower);
        let prefix = [Some(1), None, None, None];
        let mut index = ConfIndex::new(4);
        index.index(&prefix);
        let bound = emat.conf_energy(&prefix) + h.calc(&index);
        for conf in space.enumerate().iter().filter(|c| c[0] == 1) {
            let full: Vec<Option<usize>> = conf.iter().copied().map(Some).collect();
            assert!(bound <= emat.conf_energy(&full) + 1e-9);
        }
    }
    #[test]
    fn the_upper_h_score_bounds_every_completion() {
        let (space, emat) = instance();
        let mut h = TraditionalHScorer::new(&space, &emat, Sense::Upper);
        let prefix = [None, Some(2), None, None];
        let mut index = ConfIndex::new(4);
        index.index(&prefix);
        let bound = emat.conf_energy(&prefix) + h.calc(&index);
        for conf in space.enumerate().iter().filter(|c| c[1] == 2) {
            let full: Vec<Option<usize>> = conf.iter().copied().map(Some).collect();
            assert!(bound >= emat.conf_energy(&full) - 1e-9);
        }
    }
    #[test]
    fn the_differential_h_score_matches_the_full_computation() {
        let (space, emat) = instance();
        let mut h = TraditionalHScorer::new(&space, &emat, Sense::Lower);
        let mut parent = ConfIndex::new(4);
        parent.index(&[None, None, Some(1), None]);
        let mut child = ConfIndex::new(4);
        child.index(&[Some(0), None, Some(1), None]);
        let expected = h.calc(&child);
        assert!((h.calc_differential(&parent, 0, 0) - expected).abs() < 1e-12);
    }
    #[test]
    fn a_full_conformation_has_no_completion_score() {
        let (space, emat) = instance();
        let mut h = TraditionalHScorer::new(&space, &emat, Sense::Upper);
        let mut index = ConfIndex::new(4);
        index.index(&[Some(0), Some(0), Some(0), Some(0)]);
        assert_eq!(0.0, h.calc(&index));
    }
}
