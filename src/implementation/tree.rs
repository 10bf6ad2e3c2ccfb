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

//! This module provides the search tree of a MARK* computation. The tree is
//! stored as an arena of nodes: a node is identified by its index in the
//! arena, and the children of a node always have larger identifiers than
//! their parent. This is what makes the bottom-up aggregation of the
//! partition function bounds a single reverse sweep over the arena.

use crate::{LogZ, SearchNode};

/// The identifier of a node in the search tree
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub usize);
impl NodeId {
    #[inline]
    pub fn id(self) -> usize {
        self.0
    }
}

/// A search node along with its position in the tree and the bounds on the
/// partition function of the subtree it roots.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub node: SearchNode,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// True iff the children of this node have been generated
    pub expanded: bool,
    /// True iff this node must never be processed again (it could not be
    /// evaluated, or its bounds were deemed tight enough)
    pub closed: bool,
    /// True iff the quick bound of this leaf has already been consulted
    pub quick_checked: bool,
    subtree_lower: LogZ,
    subtree_upper: LogZ,
}
impl TreeNode {
    fn new(node: SearchNode, parent: Option<NodeId>) -> Self {
        Self {
            node,
            parent,
            children: vec![],
            expanded: false,
            closed: false,
            quick_checked: false,
            subtree_lower: LogZ::ZERO,
            subtree_upper: LogZ::INFINITY,
        }
    }
    /// True iff this node still needs to be worked on
    pub fn is_open(&self) -> bool {
        !(self.expanded || self.closed || self.node.minimized)
    }
    /// The (lower, upper) bounds on the partition function of the subtree
    /// rooted in this node as of the last aggregation
    pub fn subtree_bounds(&self) -> (LogZ, LogZ) {
        (self.subtree_lower, self.subtree_upper)
    }
    /// The bounds this node would have if it had no children. The lower bound
    /// accounts for one conformation only: the best conformation under the
    /// node is guaranteed to exist, the others might have been pruned.
    fn own_bounds(&self, rt: f64) -> (LogZ, LogZ) {
        self.node.z_bounds(rt)
    }
}

/// The arena holding all the nodes of the search tree
#[derive(Debug, Clone)]
pub struct SearchTree {
    nodes: Vec<TreeNode>,
    rt: f64,
}
impl SearchTree {
    /// Creates a tree comprising the given root only
    pub fn new(root: SearchNode, rt: f64) -> Self {
        let mut tree = Self { nodes: vec![TreeNode::new(root, None)], rt };
        tree.aggregate();
        tree
    }
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn get(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }
    pub fn get_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }
    /// Appends `node` to the children of `parent`
    pub fn add_child(&mut self, parent: NodeId, node: SearchNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode::new(node, Some(parent)));
        self.nodes[parent.0].children.push(id);
        id
    }
    /// Marks the node as expanded (even if it turns out to have no child)
    pub fn mark_expanded(&mut self, id: NodeId) {
        self.nodes[id.0].expanded = true;
    }
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &TreeNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
    /// The gap between the upper and lower bounds of the subtree rooted in
    /// the given node, as it follows from the node own bounds.
    pub fn error_bound(&self, id: NodeId) -> LogZ {
        let (lower, upper) = self.nodes[id.0].own_bounds(self.rt);
        upper.saturating_sub(lower)
    }

    /// Recomputes the partition function bounds of every subtree (bottom-up)
    /// and returns those of the root.
    ///
    /// # Note:
    /// A node with children never gets looser bounds than its own: this keeps
    /// the global bounds monotone over the course of a computation.
    pub fn aggregate(&mut self) -> (LogZ, LogZ) {
        for i in (0..self.nodes.len()).rev() {
            let own = self.nodes[i].own_bounds(self.rt);
            let bounds = if !self.nodes[i].expanded {
                own
            } else if self.nodes[i].children.is_empty() {
                (LogZ::ZERO, LogZ::ZERO)
            } else {
                let mut lower = LogZ::ZERO;
                let mut upper = LogZ::ZERO;
                for child in self.nodes[i].children.iter() {
                    let (l, u) = self.nodes[child.0].subtree_bounds();
                    lower = lower + l;
                    upper = upper + u;
                }
                (lower.max(own.0), upper.min(own.1))
            };
            self.nodes[i].subtree_lower = bounds.0;
            self.nodes[i].subtree_upper = bounds.1;
        }
        self.nodes[0].subtree_bounds()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_search_tree {
    use crate::{SearchTree, SearchNode, LogZ};

    const RT: f64 = 0.5;

    fn leaf(parent: &SearchNode, pos: usize, rc: usize, lower: f64, upper: f64) -> SearchNode {
        let mut node = parent.assign(pos, rc, 2);
        node.tighten_bounds(lower, upper, 1e-5);
        node
    }

    #[test]
    fn the_root_has_identifier_zero() {
        let tree = SearchTree::new(SearchNode::root(1, 2.0_f64.ln()), RT);
        assert_eq!(0, tree.root().id());
        assert_eq!(1, tree.len());
    }
    #[test]
    fn children_get_increasing_identifiers() {
        let root = SearchNode::root(1, 2.0_f64.ln());
        let mut tree = SearchTree::new(root.clone(), RT);
        let a = tree.add_child(tree.root(), leaf(&root, 0, 0, -2.0, -1.0));
        let b = tree.add_child(tree.root(), leaf(&root, 0, 1, -1.0, 0.0));
        assert!(a.id() < b.id());
        assert_eq!(vec![a, b], tree.get(tree.root()).children);
        assert_eq!(Some(tree.root()), tree.get(b).parent);
    }
    #[test]
    fn an_unexpanded_root_bounds_follow_from_its_conf_bounds() {
        let mut root = SearchNode::root(1, 2.0_f64.ln());
        root.tighten_bounds(-2.0, 0.0, 1e-5);
        let mut tree = SearchTree::new(root, RT);
        let (lower, upper) = tree.aggregate();
        assert_eq!(LogZ::boltzmann(0.0, RT), lower);
        assert!((upper.ln() - (4.0 + 2.0_f64.ln())).abs() < 1e-9);
    }
    #[test]
    fn expanded_nodes_sum_the_bounds_of_their_children() {
        let mut root = SearchNode::root(1, 2.0_f64.ln());
        root.tighten_bounds(-2.0, 0.0, 1e-5);
        let mut tree = SearchTree::new(root.clone(), RT);
        let mut a = leaf(&root, 0, 0, -2.0, -1.0);
        let mut b = leaf(&root, 0, 1, -1.0, 0.0);
        a.set_exact(-2.0);
        b.set_exact(-1.0);
        tree.add_child(tree.root(), a);
        tree.add_child(tree.root(), b);
        tree.mark_expanded(tree.root());
        let (lower, upper) = tree.aggregate();
        let exact = LogZ::boltzmann(-2.0, RT) + LogZ::boltzmann(-1.0, RT);
        assert!((lower.ln() - exact.ln()).abs() < 1e-9);
        assert!((upper.ln() - exact.ln()).abs() < 1e-9);
    }
    #[test]
    fn a_node_without_children_contributes_nothing_once_expanded() {
        let mut root = SearchNode::root(1, 2.0_f64.ln());
        root.tighten_bounds(-2.0, 0.0, 1e-5);
        let mut tree = SearchTree::new(root, RT);
        tree.mark_expanded(tree.root());
        let (lower, upper) = tree.aggregate();
        assert!(lower.is_zero());
        assert!(upper.is_zero());
    }
    #[test]
    fn children_never_loosen_the_bounds_of_their_parent() {
        let mut root = SearchNode::root(1, 2.0_f64.ln());
        root.tighten_bounds(-2.0, 0.0, 1e-5);
        let mut tree = SearchTree::new(root.clone(), RT);
        let (before_lower, before_upper) = tree.aggregate();
        tree.add_child(tree.root(), leaf(&root, 0, 0, -3.0, 1.0));
        tree.add_child(tree.root(), leaf(&root, 0, 1, -3.0, 1.0));
        tree.mark_expanded(tree.root());
        let (lower, upper) = tree.aggregate();
        assert!(lower >= before_lower);
        assert!(upper <= before_upper);
    }
    #[test]
    fn open_nodes_are_neither_expanded_closed_nor_minimized() {
        let root = SearchNode::root(1, 2.0_f64.ln());
        let mut tree = SearchTree::new(root.clone(), RT);
        assert!(tree.get(tree.root()).is_open());
        let a = tree.add_child(tree.root(), leaf(&root, 0, 0, -2.0, -1.0));
        tree.mark_expanded(tree.root());
        assert!(!tree.get(tree.root()).is_open());
        assert!(tree.get(a).is_open());
        tree.get_mut(a).node.set_exact(-1.5);
        assert!(!tree.get(a).is_open());
    }
}
