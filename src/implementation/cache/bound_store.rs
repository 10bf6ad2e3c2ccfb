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

//! This module provides an in-memory implementation of the bound store.

use dashmap::DashMap;
use fxhash::FxBuildHasher;

use crate::{ConfBoundStore, StoredBounds};

/// Simple implementation of a bound store using a concurrent hashmap. When
/// a conformation is recorded twice, the tightest bounds are kept.
#[derive(Debug, Default)]
pub struct InMemoryBoundStore {
    bounds: DashMap<Vec<usize>, StoredBounds, FxBuildHasher>,
}
impl InMemoryBoundStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn len(&self) -> usize {
        self.bounds.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}
impl ConfBoundStore for InMemoryBoundStore {
    fn lookup(&self, conf: &[usize]) -> Option<StoredBounds> {
        self.bounds.get(conf).as_deref().copied()
    }
    fn record(&self, conf: &[usize], lower: f64, energy: f64) {
        self.bounds.entry(conf.to_vec())
            .and_modify(|e| {
                e.lower = e.lower.max(lower);
                e.energy = Some(e.energy.map_or(energy, |old| old.min(energy)));
            })
            .or_insert(StoredBounds { lower, energy: Some(energy) });
    }
}

#[cfg(test)]
mod test_in_memory_bound_store {
    use crate::{InMemoryBoundStore, ConfBoundStore, StoredBounds};

    #[test]
    fn by_default_it_is_empty() {
        let store = InMemoryBoundStore::new();
        assert!(store.is_empty());
        assert_eq!(None, store.lookup(&[0, 1]));
    }
    #[test]
    fn recorded_bounds_can_be_looked_up() {
        let store = InMemoryBoundStore::new();
        store.record(&[0, 1], -3.0, -2.5);
        assert_eq!(Some(StoredBounds { lower: -3.0, energy: Some(-2.5) }), store.lookup(&[0, 1]));
        assert_eq!(None, store.lookup(&[1, 0]));
    }
    #[test]
    fn the_tightest_bounds_are_kept() {
        let store = InMemoryBoundStore::new();
        store.record(&[0], -3.0, -2.0);
        store.record(&[0], -4.0, -2.5);
        assert_eq!(Some(StoredBounds { lower: -3.0, energy: Some(-2.5) }), store.lookup(&[0]));
        assert_eq!(1, store.len());
    }
}
