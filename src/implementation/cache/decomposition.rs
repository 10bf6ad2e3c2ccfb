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

//! This module provides the branch decomposition used by the quick-bound
//! cache. A branch decomposition recursively splits the positions of a
//! conformation in two halves. The positions of a half which interact with
//! the other half form the *separator* of the split. Once the separator DOFs
//! are fixed, both halves can be optimized independently.
//!
//! The interaction graph is assumed to be a chain over the sorted positions:
//! each position interacts with the previous and the next ones.

/// A node of the decomposition tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecompositionNode {
    /// A block of positions small enough to be optimized as a whole
    Leaf { positions: Vec<usize> },
    /// A split of `positions` into two halves
    Branch {
        positions: Vec<usize>,
        /// The positions interacting across the split (the M-set)
        separator: Vec<usize>,
        left: Box<DecompositionNode>,
        right: Box<DecompositionNode>,
    },
}
impl DecompositionNode {
    /// The positions covered by this node
    pub fn positions(&self) -> &[usize] {
        match self {
            DecompositionNode::Leaf { positions } => positions,
            DecompositionNode::Branch { positions, .. } => positions,
        }
    }
    /// The positions of a branch which are not part of its separator (the
    /// L-set). Empty for a leaf.
    pub fn lambda(&self) -> Vec<usize> {
        match self {
            DecompositionNode::Leaf { .. } => vec![],
            DecompositionNode::Branch { positions, separator, .. } =>
                positions.iter().copied().filter(|p| !separator.contains(p)).collect(),
        }
    }
    fn width(&self) -> usize {
        match self {
            DecompositionNode::Leaf { .. } => 0,
            DecompositionNode::Branch { separator, left, right, .. } =>
                separator.len().max(left.width()).max(right.width()),
        }
    }
    fn nb_leaves(&self) -> usize {
        match self {
            DecompositionNode::Leaf { .. } => 1,
            DecompositionNode::Branch { left, right, .. } => left.nb_leaves() + right.nb_leaves(),
        }
    }
}

/// A greedy, balanced branch decomposition of a chain of positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchDecomposition {
    root: DecompositionNode,
}
impl BranchDecomposition {
    /// Decomposes the positions `0..nb_positions` in blocks of at most
    /// `max_block` positions.
    pub fn new(nb_positions: usize, max_block: usize) -> Self {
        let positions: Vec<usize> = (0..nb_positions).collect();
        Self { root: Self::build(positions, max_block.max(2)) }
    }
    fn build(mut positions: Vec<usize>, max_block: usize) -> DecompositionNode {
        positions.sort_unstable();
        if positions.len() <= max_block {
            return DecompositionNode::Leaf { positions };
        }
        let mid = positions.len() / 2;
        let left: Vec<usize> = positions[..mid].to_vec();
        let right: Vec<usize> = positions[mid..].to_vec();
        // on a chain, only the two positions on both sides of the cut interact
        let separator = vec![positions[mid - 1], positions[mid]];
        DecompositionNode::Branch {
            positions,
            separator,
            left: Box::new(Self::build(left, max_block)),
            right: Box::new(Self::build(right, max_block)),
        }
    }
    pub fn root(&self) -> &DecompositionNode {
        &self.root
    }
    /// The size of the largest separator
    pub fn branch_width(&self) -> usize {
        self.root.width()
    }
    pub fn nb_leaves(&self) -> usize {
        self.root.nb_leaves()
    }
}

#[cfg(test)]
mod test_decomposition {
    use crate::{BranchDecomposition, DecompositionNode};

    #[test]
    fn small_spaces_are_a_single_leaf() {
        let d = BranchDecomposition::new(3, 3);
        assert_eq!(&DecompositionNode::Leaf { positions: vec![0, 1, 2] }, d.root());
        assert_eq!(0, d.branch_width());
        assert_eq!(1, d.nb_leaves());
    }
    #[test]
    fn splits_are_balanced() {
        let d = BranchDecomposition::new(6, 3);
        match d.root() {
            DecompositionNode::Branch { left, right, separator, .. } => {
                assert_eq!(&[0, 1, 2], left.positions());
                assert_eq!(&[3, 4, 5], right.positions());
                assert_eq!(&vec![2, 3], separator);
            }
            leaf => panic!("expected a branch, got {leaf:?}"),
        }
        assert_eq!(2, d.nb_leaves());
    }
    #[test]
    fn leaves_never_exceed_the_block_size() {
        fn check(node: &DecompositionNode, max: usize) {
            match node {
                DecompositionNode::Leaf { positions } => assert!(positions.len() <= max),
                DecompositionNode::Branch { left, right, .. } => {
                    check(left, max);
                    check(right, max);
                }
            }
        }
        let d = BranchDecomposition::new(17, 3);
        check(d.root(), 3);
        assert_eq!(2, d.branch_width());
    }
    #[test]
    fn lambda_excludes_the_separator() {
        let d = BranchDecomposition::new(8, 3);
        assert_eq!(vec![0, 1, 2, 5, 6, 7], d.root().lambda());
    }
}
