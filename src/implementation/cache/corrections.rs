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

//! This module provides the correction store: the memory of the energy
//! corrections that have been learned from the minimization of small tuples.
//! These corrections are what lets an expensive evaluation in one part of
//! the tree tighten the lower bounds of many other nodes.

use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use fxhash::{FxBuildHasher, FxHashSet};
use parking_lot::Mutex;

use crate::{Assignment, EnergyMatrix, RcTuple};

/// A concurrent map from tuples to the difference between their minimized
/// energy and the estimate of the minimized pairwise matrix.
///
/// # Note:
/// Insertions are first-writer-wins: once a correction has been stored for
/// some tuple, any later insertion for that same tuple is ignored. This makes
/// the insertion idempotent, whatever the interleaving of the workers.
#[derive(Debug, Default)]
pub struct CorrectionStore {
    corrections: DashMap<RcTuple, f64, FxBuildHasher>,
    /// The stored tuples indexed by each of their assignments
    by_anchor: DashMap<Assignment, Vec<(RcTuple, f64)>, FxBuildHasher>,
    /// The tuples for which a probe has already been submitted
    claimed: Mutex<FxHashSet<RcTuple>>,
    negatives: AtomicUsize,
}
impl CorrectionStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Stores the `correction` of `tuple` unless one is already known.
    /// Returns true iff the correction was actually stored.
    pub fn insert(&self, tuple: RcTuple, correction: f64) -> bool {
        if tuple.len() < 2 || !correction.is_finite() {
            return false;
        }
        let mut inserted = false;
        self.corrections.entry(tuple.clone()).or_insert_with(|| {
            inserted = true;
            correction
        });
        if inserted {
            if correction < 0.0 {
                self.negatives.fetch_add(1, Ordering::Relaxed);
                log::warn!("negative correction {correction:.4} stored for {tuple}");
            }
            for anchor in tuple.iter() {
                self.by_anchor.entry(anchor).or_default().push((tuple.clone(), correction));
            }
        }
        inserted
    }
    /// The correction stored for that exact tuple
    pub fn get(&self, tuple: &RcTuple) -> Option<f64> {
        self.corrections.get(tuple).as_deref().copied()
    }
    pub fn len(&self) -> usize {
        self.corrections.len()
    }
    pub fn is_empty(&self) -> bool {
        self.corrections.is_empty()
    }
    /// The number of stored corrections that were negative
    pub fn negative_corrections(&self) -> usize {
        self.negatives.load(Ordering::Relaxed)
    }
    /// Returns true the first time it is called for some tuple, false
    /// afterwards. This is how the workers avoid probing a tuple twice.
    pub fn claim(&self, tuple: &RcTuple) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.contains(tuple) {
            false
        } else {
            claimed.insert(tuple.clone());
            true
        }
    }
    /// Returns true iff a correction is stored for `tuple` or for a tuple of
    /// higher order comprising it.
    pub fn has_term_for(&self, tuple: &RcTuple) -> bool {
        let Some(anchor) = tuple.first() else {
            return false;
        };
        match self.by_anchor.get(&anchor) {
            None => false,
            Some(entries) => entries.iter().any(|(stored, _)| {
                stored.len() >= tuple.len() && tuple.iter().all(|a| stored.iter().any(|b| a == b))
            }),
        }
    }
    /// The correction applicable to a (partial) assignment: the sum of the
    /// corrections of stored tuples contained in the assignment. Since the
    /// stored tuples may overlap, they are packed greedily by decreasing
    /// correction so that each position is covered at most once.
    pub fn conf_correction(&self, assignment: &[Option<usize>]) -> f64 {
        if self.corrections.is_empty() {
            return 0.0;
        }
        let mut candidates: Vec<(RcTuple, f64)> = vec![];
        for (pos, rc) in assignment.iter().enumerate() {
            let Some(rc) = rc else { continue };
            let anchor = Assignment { pos, rc: *rc };
            if let Some(entries) = self.by_anchor.get(&anchor) {
                for (tuple, correction) in entries.iter() {
                    if tuple.first() == Some(anchor) && tuple.is_contained_in(assignment) {
                        candidates.push((tuple.clone(), *correction));
                    }
                }
            }
        }
        candidates.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut covered = vec![false; assignment.len()];
        let mut total = 0.0;
        for (tuple, correction) in candidates {
            if tuple.positions().any(|p| covered[p]) {
                continue;
            }
            tuple.positions().for_each(|p| covered[p] = true);
            total += correction;
        }
        total
    }
    /// The energy of the assigned part of `assignment` in `emat` plus the
    /// applicable correction.
    pub fn corrected_energy(&self, emat: &dyn EnergyMatrix, assignment: &[Option<usize>]) -> f64 {
        emat.conf_energy(assignment) + self.conf_correction(assignment)
    }
}

#[cfg(test)]
mod test_correction_store {
    use crate::{CorrectionStore, RcTuple, Assignment};

    fn triple(a: usize, b: usize, c: usize) -> RcTuple {
        RcTuple::new([
            Assignment { pos: 0, rc: a },
            Assignment { pos: 1, rc: b },
            Assignment { pos: 2, rc: c },
        ])
    }

    #[test]
    fn by_default_it_is_empty() {
        let store = CorrectionStore::new();
        assert!(store.is_empty());
        assert_eq!(0.0, store.conf_correction(&[Some(0), Some(0), Some(0)]));
    }
    #[test]
    fn the_first_writer_wins() {
        let store = CorrectionStore::new();
        assert!(store.insert(triple(0, 0, 0), 2.0));
        assert!(!store.insert(triple(0, 0, 0), 7.0));
        assert_eq!(Some(2.0), store.get(&triple(0, 0, 0)));
        assert_eq!(1, store.len());
    }
    #[test]
    fn concurrent_insertions_are_idempotent() {
        let store = CorrectionStore::new();
        std::thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    store.insert(triple(1, 1, 1), i as f64);
                });
            }
        });
        assert_eq!(1, store.len());
        let value = store.get(&triple(1, 1, 1)).unwrap();
        assert_eq!(value, store.conf_correction(&[Some(1), Some(1), Some(1)]));
    }
    #[test]
    fn single_assignments_are_not_stored() {
        let store = CorrectionStore::new();
        assert!(!store.insert(RcTuple::new([Assignment { pos: 0, rc: 0 }]), 1.0));
        assert!(store.is_empty());
    }
    #[test]
    fn negative_corrections_are_stored_and_counted() {
        let store = CorrectionStore::new();
        assert!(store.insert(triple(0, 1, 0), -0.5));
        assert_eq!(1, store.negative_corrections());
        assert_eq!(Some(-0.5), store.get(&triple(0, 1, 0)));
    }
    #[test]
    fn a_tuple_applies_only_when_it_is_contained() {
        let store = CorrectionStore::new();
        store.insert(triple(0, 0, 0), 3.0);
        assert_eq!(3.0, store.conf_correction(&[Some(0), Some(0), Some(0), Some(1)]));
        assert_eq!(0.0, store.conf_correction(&[Some(0), Some(0), None, Some(1)]));
        assert_eq!(0.0, store.conf_correction(&[Some(0), Some(0), Some(1), Some(1)]));
    }
    #[test]
    fn overlapping_tuples_are_packed_greedily() {
        let store = CorrectionStore::new();
        store.insert(RcTuple::new([
            Assignment { pos: 0, rc: 0 }, Assignment { pos: 1, rc: 0 }, Assignment { pos: 2, rc: 0 }]), 1.0);
        store.insert(RcTuple::new([
            Assignment { pos: 2, rc: 0 }, Assignment { pos: 3, rc: 0 }, Assignment { pos: 4, rc: 0 }]), 4.0);
        store.insert(RcTuple::new([
            Assignment { pos: 0, rc: 0 }, Assignment { pos: 1, rc: 0 }, Assignment { pos: 5, rc: 0 }]), 2.0);
        let conf = vec![Some(0); 6];
        // {2,3,4} is taken first, then {0,1,5}; {0,1,2} overlaps both
        assert_eq!(6.0, store.conf_correction(&conf));
    }
    #[test]
    fn corrected_energy_adds_the_correction_to_the_matrix_energy() {
        use crate::test_utils::ToyMatrix;
        let mut emat = ToyMatrix::zeros(&[1, 1, 1]);
        emat.set_one(0, 0, -1.0);
        emat.set_pair(0, 0, 2, 0, 0.5);
        let store = CorrectionStore::new();
        store.insert(triple(0, 0, 0), 1.25);
        let energy = store.corrected_energy(&emat, &[Some(0), Some(0), Some(0)]);
        assert!((energy - 0.75).abs() < 1e-12);
    }
    #[test]
    fn higher_order_terms_are_detected() {
        let store = CorrectionStore::new();
        let quad = RcTuple::new([
            Assignment { pos: 0, rc: 0 }, Assignment { pos: 1, rc: 0 },
            Assignment { pos: 2, rc: 0 }, Assignment { pos: 3, rc: 0 }]);
        store.insert(quad, 1.0);
        assert!(store.has_term_for(&triple(0, 0, 0)));
        assert!(!store.has_term_for(&triple(0, 0, 1)));
        let sub = RcTuple::new([
            Assignment { pos: 1, rc: 0 }, Assignment { pos: 2, rc: 0 }, Assignment { pos: 3, rc: 0 }]);
        assert!(store.has_term_for(&sub));
    }
    #[test]
    fn a_tuple_can_only_be_claimed_once() {
        let store = CorrectionStore::new();
        assert!(store.claim(&triple(0, 0, 0)));
        assert!(!store.claim(&triple(0, 0, 0)));
        assert!(store.claim(&triple(0, 0, 1)));
    }
}
