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

//! This module provides the fringe (priority queue) of the MARK* search: it
//! holds the identifiers of the nodes that still need some work and yields
//! them by decreasing error bound.

use std::cmp::Ordering;

use binary_heap_plus::BinaryHeap;
use compare::Compare;

use crate::{LogZ, NodeId};

/// An item of the fringe: a node along with its error bound at the time it
/// was pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FringeEntry {
    pub id: NodeId,
    pub error_bound: LogZ,
}

/// The MaxErrorBound strategy always selects the node whose subtree
/// contributes the most to the gap between the global bounds. Ties are
/// broken in favor of the oldest node (the one having the smallest id).
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxErrorBound;
impl Compare<FringeEntry> for MaxErrorBound {
    fn compare(&self, l: &FringeEntry, r: &FringeEntry) -> Ordering {
        l.error_bound.partial_cmp(&r.error_bound)
            .unwrap_or(Ordering::Equal)
            .then_with(|| r.id.cmp(&l.id))
    }
}

/// The fringe of the search: a binary heap of node identifiers
pub struct NodeFringe {
    heap: BinaryHeap<FringeEntry, MaxErrorBound>,
}
impl Default for NodeFringe {
    fn default() -> Self {
        Self::new()
    }
}
impl NodeFringe {
    pub fn new() -> Self {
        Self { heap: BinaryHeap::from_vec_cmp(vec![], MaxErrorBound) }
    }
    pub fn push(&mut self, id: NodeId, error_bound: LogZ) {
        self.heap.push(FringeEntry { id, error_bound })
    }
    pub fn pop(&mut self) -> Option<NodeId> {
        self.heap.pop().map(|e| e.id)
    }
    pub fn clear(&mut self) {
        self.heap.clear()
    }
    pub fn len(&self) -> usize {
        self.heap.len()
    }
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
