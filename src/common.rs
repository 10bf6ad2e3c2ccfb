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

//! This module defines the most basic data types that are used throughout all
//! the code of our library (both at the abstraction and implementation levels).
//! These are also the types your client library is likely to work with.

use std::{cmp::Ordering, fmt, iter::Sum, ops::Add, time::Duration};

/// The gas constant (in kcal/mol/K) times room temperature (in K). This is
/// the thermal energy unit used to turn an energy into a Boltzmann weight.
pub const DEFAULT_RT: f64 = 1.9891e-3 * 298.15;

// ----------------------------------------------------------------------------
// --- ASSIGNMENT -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// This denotes the decision of using the residue conformation (option) `rc`
/// at the given position `pos`. Any given `Assignment` should be understood
/// as ```[[ pos = rc ]]```
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Assignment {
    pub pos: usize,
    pub rc : usize,
}

// ----------------------------------------------------------------------------
// --- RC TUPLE ---------------------------------------------------------------
// ----------------------------------------------------------------------------
/// An unordered set of (position, option) pairs, kept sorted by position so
/// that two tuples mentioning the same assignments are always equal (and hash
/// the same). A tuple never mentions the same position twice.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct RcTuple {
    pairs: Vec<Assignment>,
}
impl RcTuple {
    /// Creates a tuple from the given assignments. When a position occurs
    /// more than once, only its first occurrence is kept.
    pub fn new<I: IntoIterator<Item = Assignment>>(pairs: I) -> Self {
        let mut pairs: Vec<Assignment> = pairs.into_iter().collect();
        pairs.sort_by_key(|a| a.pos);
        pairs.dedup_by_key(|a| a.pos);
        Self { pairs }
    }
    /// Creates the tuple `{pos1 = rc1, pos2 = rc2}`
    pub fn pair(pos1: usize, rc1: usize, pos2: usize, rc2: usize) -> Self {
        Self::new([Assignment { pos: pos1, rc: rc1 }, Assignment { pos: pos2, rc: rc2 }])
    }
    /// Creates the tuple which projects the full conformation `conf` onto
    /// the given `positions`.
    ///
    /// # Examples:
    /// ```
    /// # use markstar::*;
    /// let tuple = RcTuple::from_conf(&[4, 5, 6, 7], &[3, 0]);
    /// assert_eq!(tuple.to_string(), "(0=4, 3=7)");
    /// ```
    pub fn from_conf(conf: &[usize], positions: &[usize]) -> Self {
        Self::new(positions.iter().map(|&pos| Assignment { pos, rc: conf[pos] }))
    }
    pub fn len(&self) -> usize {
        self.pairs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = Assignment> + '_ {
        self.pairs.iter().copied()
    }
    /// The assignment bearing on the lowest position of this tuple
    pub fn first(&self) -> Option<Assignment> {
        self.pairs.first().copied()
    }
    pub fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.pairs.iter().map(|a| a.pos)
    }
    pub fn contains_pos(&self, pos: usize) -> bool {
        self.pairs.binary_search_by_key(&pos, |a| a.pos).is_ok()
    }
    /// Returns true iff every assignment of this tuple is part of the given
    /// (possibly partial) `assignment`.
    pub fn is_contained_in(&self, assignment: &[Option<usize>]) -> bool {
        self.pairs.iter().all(|a| assignment.get(a.pos).copied().flatten() == Some(a.rc))
    }
}
impl fmt::Display for RcTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, a) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", a.pos, a.rc)?;
        }
        write!(f, ")")
    }
}

// ----------------------------------------------------------------------------
// --- LOG Z ------------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A non negative (possibly huge) quantity such as a partition function or a
/// Boltzmann weight. It is stored through its natural logarithm, which keeps
/// sums of `exp(-E/RT)` representable even when they span hundreds of orders
/// of magnitude. Zero is represented by `ln == -inf`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LogZ(f64);

impl LogZ {
    pub const ZERO: LogZ = LogZ(f64::NEG_INFINITY);
    pub const ONE: LogZ = LogZ(0.0);
    pub const INFINITY: LogZ = LogZ(f64::INFINITY);

    /// Wraps a value that is already expressed as a natural logarithm
    pub fn from_ln(ln: f64) -> Self {
        Self(ln)
    }
    /// Converts a plain value. Anything non positive maps onto zero.
    pub fn from_value(value: f64) -> Self {
        if value > 0.0 {
            Self(value.ln())
        } else {
            Self::ZERO
        }
    }
    /// The Boltzmann weight `exp(-energy / rt)` of the given energy.
    ///
    /// # Examples:
    /// ```
    /// # use markstar::*;
    /// let w = LogZ::boltzmann(-1.0, 0.5);
    /// assert!((w.ln() - 2.0).abs() < 1e-12);
    /// assert!(LogZ::boltzmann(f64::INFINITY, 0.5).is_zero());
    /// ```
    pub fn boltzmann(energy: f64, rt: f64) -> Self {
        Self(-energy / rt)
    }
    pub fn ln(self) -> f64 {
        self.0
    }
    /// The plain value. This overflows to `+inf` for very large quantities.
    pub fn value(self) -> f64 {
        self.0.exp()
    }
    pub fn is_zero(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
    pub fn is_infinite(self) -> bool {
        self.0 == f64::INFINITY
    }
    /// Multiplies this quantity by `exp(ln_factor)`
    pub fn scale(self, ln_factor: f64) -> Self {
        if self.is_zero() {
            self
        } else {
            Self(self.0 + ln_factor)
        }
    }
    /// Computes `self - other`, clamped to zero when `other >= self`.
    pub fn saturating_sub(self, other: LogZ) -> Self {
        if other.0 >= self.0 {
            Self::ZERO
        } else if other.is_zero() || self.is_infinite() {
            self
        } else {
            Self(self.0 + (-(other.0 - self.0).exp()).ln_1p())
        }
    }
    /// Computes `self / other` as a plain value
    pub fn ratio(self, other: LogZ) -> f64 {
        if self.is_zero() {
            0.0
        } else if self.is_infinite() && other.is_infinite() {
            1.0
        } else {
            (self.0 - other.0).exp()
        }
    }
    pub fn max(self, other: LogZ) -> Self {
        if other.0 > self.0 { other } else { self }
    }
    pub fn min(self, other: LogZ) -> Self {
        if other.0 < self.0 { other } else { self }
    }
}
impl Default for LogZ {
    fn default() -> Self {
        Self::ZERO
    }
}
impl Add for LogZ {
    type Output = LogZ;

    fn add(self, rhs: LogZ) -> LogZ {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (hi, lo) = if self.0 >= rhs.0 { (self.0, rhs.0) } else { (rhs.0, self.0) };
        if hi == f64::INFINITY {
            return Self::INFINITY;
        }
        Self(hi + (lo - hi).exp().ln_1p())
    }
}
impl Sum for LogZ {
    fn sum<I: Iterator<Item = LogZ>>(iter: I) -> Self {
        iter.fold(LogZ::ZERO, |a, b| a + b)
    }
}
impl PartialOrd for LogZ {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.0.partial_cmp(&other.0)
    }
}
impl fmt::Display for LogZ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < 700.0 {
            write!(f, "{:.6e}", self.value())
        } else {
            write!(f, "exp({:.4})", self.0)
        }
    }
}

// ----------------------------------------------------------------------------
// --- CONF INDEX -------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A scratch view of a partial assignment which lists its defined and its
/// undefined positions. Scorers are handed such an index rather than the raw
/// assignment so that the enumeration is done once per node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfIndex {
    /// The (position, option) pairs which are assigned, by increasing position
    pub defined: Vec<Assignment>,
    /// The positions that remain to be assigned, in increasing order
    pub undefined: Vec<usize>,
}
impl ConfIndex {
    pub fn new(nb_positions: usize) -> Self {
        Self {
            defined: Vec::with_capacity(nb_positions),
            undefined: Vec::with_capacity(nb_positions),
        }
    }
    /// Refreshes this index so that it describes the given assignment.
    pub fn index(&mut self, assignment: &[Option<usize>]) {
        self.defined.clear();
        self.undefined.clear();
        for (pos, rc) in assignment.iter().enumerate() {
            match rc {
                Some(rc) => self.defined.push(Assignment { pos, rc: *rc }),
                None => self.undefined.push(pos),
            }
        }
    }
    /// Refreshes this index so that it describes `parent` extended with the
    /// assignment `pos = rc`.
    pub fn index_child(&mut self, parent: &ConfIndex, pos: usize, rc: usize) {
        self.defined.clear();
        self.undefined.clear();
        self.defined.extend(parent.defined.iter().copied());
        self.defined.push(Assignment { pos, rc });
        self.defined.sort_by_key(|a| a.pos);
        self.undefined.extend(parent.undefined.iter().copied().filter(|p| *p != pos));
    }
    pub fn is_defined(&self, pos: usize) -> bool {
        self.defined.binary_search_by_key(&pos, |a| a.pos).is_ok()
    }
}

// ----------------------------------------------------------------------------
// --- SEARCH NODE ------------------------------------------------------------
// ----------------------------------------------------------------------------
/// A node of the search tree: a partial (or full) assignment of options to
/// positions along with the energy bounds on the conformations below it.
///
/// # Note:
/// The bounds of a node are conformation energies (the lower the better).
/// They only ever get tighter: the lower bound is raised and the upper bound
/// is lowered. The partition function bounds of the subtree are derived from
/// them (see `z_bounds`).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchNode {
    /// The option chosen for each position (None when not assigned yet)
    pub assignment: Vec<Option<usize>>,
    /// The number of assigned positions
    pub level: usize,
    /// Minimized matrix energy of the assigned prefix (possibly corrected)
    pub gscore: f64,
    /// Rigid matrix energy of the assigned prefix
    pub rigid_score: f64,
    /// Lower bound on the energy of any conformation below this node
    pub conf_lower_bound: f64,
    /// Upper bound on the energy of the best conformation below this node
    pub conf_upper_bound: f64,
    /// Has this (full) conformation been fully minimized ?
    pub minimized: bool,
    /// Natural log of the number of conformations below this node
    pub ln_num_confs: f64,
}
impl SearchNode {
    /// Creates the synthetic root node where no position is assigned.
    pub fn root(nb_positions: usize, ln_num_confs: f64) -> Self {
        SearchNode {
            assignment: vec![None; nb_positions],
            level: 0,
            gscore: 0.0,
            rigid_score: 0.0,
            conf_lower_bound: f64::NEG_INFINITY,
            conf_upper_bound: f64::INFINITY,
            minimized: false,
            ln_num_confs,
        }
    }
    /// Creates the child obtained by assigning `rc` to `pos`. The child
    /// inherits the scores of its parent but starts with unknown bounds.
    pub fn assign(&self, pos: usize, rc: usize, nb_options_at_pos: usize) -> Self {
        let mut child = self.clone();
        child.assignment[pos] = Some(rc);
        child.level += 1;
        child.minimized = false;
        child.conf_lower_bound = f64::NEG_INFINITY;
        child.conf_upper_bound = f64::INFINITY;
        child.ln_num_confs = if child.level == child.assignment.len() {
            0.0
        } else {
            self.ln_num_confs - (nb_options_at_pos.max(1) as f64).ln()
        };
        child
    }
    /// True iff all positions are assigned
    pub fn is_leaf(&self) -> bool {
        self.level == self.assignment.len()
    }
    /// The full conformation of a leaf node
    pub fn conf(&self) -> Option<Vec<usize>> {
        self.assignment.iter().copied().collect()
    }
    /// The completion part of the lower bound
    pub fn h_score(&self) -> f64 {
        self.conf_lower_bound - self.gscore
    }
    /// Tightens the conformation bounds: the lower bound only goes up and the
    /// upper bound only goes down. When the resulting bounds contradict each
    /// other by more than `tolerance`, they are widened back to the loosest
    /// of the two values and this method returns false.
    pub fn tighten_bounds(&mut self, lower: f64, upper: f64, tolerance: f64) -> bool {
        let lower = self.conf_lower_bound.max(lower);
        let upper = self.conf_upper_bound.min(upper);
        if upper >= lower {
            self.conf_lower_bound = lower;
            self.conf_upper_bound = upper;
            true
        } else if lower - upper <= tolerance {
            self.conf_lower_bound = lower;
            self.conf_upper_bound = lower;
            true
        } else {
            self.conf_lower_bound = upper;
            self.conf_upper_bound = lower;
            false
        }
    }
    /// Marks this conformation as minimized with the given exact energy
    pub fn set_exact(&mut self, energy: f64) {
        self.gscore = energy;
        self.conf_lower_bound = energy;
        self.conf_upper_bound = energy;
        self.minimized = true;
    }
    /// The (lower, upper) bounds on the partition function of the subtree
    /// rooted in this node, as they follow from its conformation bounds.
    /// The lower bound only accounts for the best conformation: the upper
    /// bound on its energy says nothing about the other ones.
    pub fn z_bounds(&self, rt: f64) -> (LogZ, LogZ) {
        let lower = LogZ::boltzmann(self.conf_upper_bound, rt);
        let upper = LogZ::boltzmann(self.conf_lower_bound, rt).scale(self.ln_num_confs);
        (lower, upper)
    }
    /// The gap between the upper and lower partition function bounds of
    /// the subtree rooted in this node.
    pub fn error_bound(&self, rt: f64) -> LogZ {
        let (lower, upper) = self.z_bounds(rt);
        upper.saturating_sub(lower)
    }
}
impl fmt::Display for SearchNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, rc) in self.assignment.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            match rc {
                Some(rc) => write!(f, "{rc}")?,
                None => write!(f, "*")?,
            }
        }
        write!(f, "] g={:.4} rigid={:.4} bounds=[{:.4}, {:.4}]",
            self.gscore, self.rigid_score, self.conf_lower_bound, self.conf_upper_bound)
    }
}

// ----------------------------------------------------------------------------
// --- Results ----------------------------------------------------------------
// ----------------------------------------------------------------------------
/// The status of a partition function computation
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Status {
    /// `init` has not been called yet
    Uninitialized,
    /// The bounds are not tight enough yet
    Estimating,
    /// The bounds are within the target epsilon of one another
    Estimated,
    /// The partition function is provably too small to matter
    Unstable,
}

/// The current bounds on the partition function
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Values {
    /// Lower bound on the partition function
    pub qstar: LogZ,
    /// Upper bound on the partition function
    pub pstar: LogZ,
}
impl Default for Values {
    fn default() -> Self {
        Self { qstar: LogZ::ZERO, pstar: LogZ::INFINITY }
    }
}
impl Values {
    /// The relative gap `(pstar - qstar) / pstar`. It is zero when the upper
    /// bound itself is zero.
    ///
    /// # Examples:
    /// ```
    /// # use markstar::*;
    /// let values = Values { qstar: LogZ::from_value(3.0), pstar: LogZ::from_value(4.0) };
    /// assert!((values.effective_epsilon() - 0.25).abs() < 1e-12);
    /// ```
    pub fn effective_epsilon(&self) -> f64 {
        if self.pstar.is_zero() {
            0.0
        } else {
            (1.0 - self.qstar.ratio(self.pstar)).clamp(0.0, 1.0)
        }
    }
}

/// Counters describing the work performed by a computation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Number of full conformations sent to the energy evaluator
    pub confs_evaluated: usize,
    /// Number of full conformations reached (and scored) by the search
    pub confs_scored: usize,
    /// Number of conformations whose energy was found in a bound store
    pub confs_reused: usize,
    /// Number of full evaluations that failed
    pub evaluation_failures: usize,
    /// Number of internal nodes processed by internal rounds
    pub internal_processed: usize,
    /// Number of tuple probes (partial minimizations) submitted
    pub partial_minimizations: usize,
    /// Number of minimizations, indexed by tuple size minus one
    pub minimizations_by_size: Vec<usize>,
    /// Leaves left unevaluated thanks to a learned correction
    pub correction_skips: usize,
    /// Leaves left unevaluated thanks to a quick upper bound
    pub quick_bound_skips: usize,
    /// Leaves settled because their bounds were already tight enough
    pub materiality_skips: usize,
    /// Number of full minimizations whose energy was above the upper bound
    pub rejected_energies: usize,
}
impl Statistics {
    /// Total amount of work, every kind of processing counting for one unit.
    pub fn work_done(&self) -> usize {
        self.internal_processed + self.confs_evaluated + self.confs_scored + self.partial_minimizations
    }
    pub(crate) fn record_minimization(&mut self, tuple_size: usize) {
        let slot = tuple_size.max(1) - 1;
        if self.minimizations_by_size.len() <= slot {
            self.minimizations_by_size.resize(slot + 1, 0);
        }
        self.minimizations_by_size[slot] += 1;
    }
}

/// How much each mechanism contributed to the tightening of the partition
/// function bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reductions {
    /// Lower bound improvement due to full minimizations
    pub lower_full_min: LogZ,
    /// Lower bound improvement due to quick upper bounds
    pub lower_quick_bound: LogZ,
    /// Lower bound improvement due to tighter conformation upper bounds
    pub lower_conf_upper: LogZ,
    /// Upper bound improvement due to full minimizations
    pub upper_full_min: LogZ,
    /// Upper bound improvement due to learned corrections
    pub upper_partial_min: LogZ,
    /// Upper bound improvement due to tighter conformation lower bounds
    pub upper_conf_lower: LogZ,
}
impl Reductions {
    /// Accounts for the minimization of a conformation whose bounds were
    /// `[lower, upper]` and whose energy turned out to be `energy`.
    pub fn record_minimization(&mut self, lower: f64, upper: f64, energy: f64, rt: f64) {
        let lower_w = LogZ::boltzmann(lower, rt);
        let upper_w = LogZ::boltzmann(upper, rt);
        let energy_w = LogZ::boltzmann(energy, rt);
        self.upper_full_min = self.upper_full_min + lower_w.saturating_sub(energy_w);
        self.lower_full_min = self.lower_full_min + energy_w.saturating_sub(upper_w);
    }
    /// Accounts for a lower bound raised from `lower` by `correction`
    pub fn record_correction(&mut self, lower: f64, correction: f64, rt: f64) {
        let before = LogZ::boltzmann(lower, rt);
        let after = LogZ::boltzmann(lower + correction, rt);
        self.upper_partial_min = self.upper_partial_min + before.saturating_sub(after);
    }
    /// Accounts for an upper bound lowered from `before` to `after`
    pub fn record_quick_bound(&mut self, before: f64, after: f64, rt: f64) {
        let before = LogZ::boltzmann(before, rt);
        let after = LogZ::boltzmann(after, rt);
        self.lower_quick_bound = self.lower_quick_bound + after.saturating_sub(before);
    }
}

/// An immutable snapshot of a partition function computation
#[derive(Debug, Clone, PartialEq)]
pub struct PfuncResult {
    pub status: Status,
    pub values: Values,
    /// The bounds right before the first round
    pub start_values: Values,
    pub num_confs_evaluated: usize,
    pub statistics: Statistics,
    pub reductions: Reductions,
    /// Number of learned corrections which lowered a pairwise estimate
    pub negative_corrections: usize,
    /// Average wall-clock time of a full evaluation (None before the first one)
    pub average_evaluation: Option<Duration>,
}
impl PfuncResult {
    /// The average tightening brought by one minimization. Full evaluations
    /// and partial (tuple) minimizations both count, and so do the
    /// reductions they brought: directly for the former, through the learned
    /// corrections for the latter.
    pub fn average_reduction_per_minimization(&self) -> LogZ {
        let minimizations = self.num_confs_evaluated + self.statistics.partial_minimizations;
        if minimizations == 0 {
            LogZ::ZERO
        } else {
            let r = &self.reductions;
            let total = r.lower_full_min + r.upper_full_min + r.upper_partial_min;
            total.scale(-(minimizations as f64).ln())
        }
    }
}


// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_logz {
    use crate::LogZ;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn zero_is_the_neutral_element_of_addition() {
        let x = LogZ::from_value(42.0);
        assert_eq!(x, x + LogZ::ZERO);
        assert_eq!(x, LogZ::ZERO + x);
    }
    #[test]
    fn addition_matches_plain_arithmetic() {
        let x = LogZ::from_value(3.0) + LogZ::from_value(4.0);
        assert!(close(7.0, x.value()));
    }
    #[test]
    fn addition_does_not_overflow_on_huge_values() {
        let huge = LogZ::from_ln(10_000.0);
        let sum = huge + huge;
        assert!(close(10_000.0 + 2.0_f64.ln(), sum.ln()));
    }
    #[test]
    fn saturating_sub_clamps_to_zero() {
        let small = LogZ::from_value(1.0);
        let big = LogZ::from_value(2.0);
        assert!(small.saturating_sub(big).is_zero());
        assert!(big.saturating_sub(big).is_zero());
        assert!(close(1.0, big.saturating_sub(small).value()));
    }
    #[test]
    fn subtracting_zero_is_a_noop() {
        let x = LogZ::from_value(5.0);
        assert_eq!(x, x.saturating_sub(LogZ::ZERO));
    }
    #[test]
    fn infinity_minus_a_finite_value_stays_infinite() {
        let x = LogZ::INFINITY.saturating_sub(LogZ::from_value(5.0));
        assert!(x.is_infinite());
    }
    #[test]
    fn ratio_of_zero_is_zero() {
        assert_eq!(0.0, LogZ::ZERO.ratio(LogZ::from_value(3.0)));
        assert_eq!(0.0, LogZ::ZERO.ratio(LogZ::ZERO));
    }
    #[test]
    fn ratio_of_infinities_is_one() {
        assert_eq!(1.0, LogZ::INFINITY.ratio(LogZ::INFINITY));
    }
    #[test]
    fn from_value_maps_non_positive_values_onto_zero() {
        assert!(LogZ::from_value(0.0).is_zero());
        assert!(LogZ::from_value(-3.0).is_zero());
    }
    #[test]
    fn sum_of_an_empty_iterator_is_zero() {
        let total: LogZ = std::iter::empty().sum();
        assert!(total.is_zero());
    }
    #[test]
    fn ordering_follows_the_plain_values() {
        assert!(LogZ::ZERO < LogZ::ONE);
        assert!(LogZ::from_value(2.0) > LogZ::ONE);
        assert!(LogZ::INFINITY > LogZ::from_ln(1e300));
    }
}

#[cfg(test)]
mod test_rc_tuple {
    use crate::{Assignment, RcTuple};

    #[test]
    fn tuples_are_order_insensitive() {
        let a = RcTuple::pair(0, 1, 3, 2);
        let b = RcTuple::pair(3, 2, 0, 1);
        assert_eq!(a, b);
    }
    #[test]
    fn duplicate_positions_are_dropped() {
        let t = RcTuple::new([
            Assignment { pos: 1, rc: 0 },
            Assignment { pos: 1, rc: 4 },
            Assignment { pos: 0, rc: 2 },
        ]);
        assert_eq!(2, t.len());
    }
    #[test]
    fn containment_requires_every_assignment() {
        let t = RcTuple::pair(0, 1, 2, 0);
        assert!(t.is_contained_in(&[Some(1), None, Some(0)]));
        assert!(!t.is_contained_in(&[Some(1), None, None]));
        assert!(!t.is_contained_in(&[Some(1), None, Some(1)]));
    }
    #[test]
    fn first_is_the_lowest_position() {
        let t = RcTuple::pair(5, 1, 2, 0);
        assert_eq!(Some(Assignment { pos: 2, rc: 0 }), t.first());
        assert!(t.contains_pos(5));
        assert!(!t.contains_pos(3));
    }
}

#[cfg(test)]
mod test_search_node {
    use crate::{SearchNode, LogZ, ConfIndex, Values};

    #[test]
    fn by_default_the_root_has_infinite_bounds() {
        let root = SearchNode::root(3, 8.0_f64.ln());
        assert_eq!(f64::NEG_INFINITY, root.conf_lower_bound);
        assert_eq!(f64::INFINITY, root.conf_upper_bound);
        assert!(!root.is_leaf());
    }
    #[test]
    fn assigning_every_position_yields_a_leaf() {
        let root = SearchNode::root(2, 4.0_f64.ln());
        let child = root.assign(1, 0, 2);
        let leaf = child.assign(0, 1, 2);
        assert!(!child.is_leaf());
        assert!(leaf.is_leaf());
        assert_eq!(Some(vec![1, 0]), leaf.conf());
        assert_eq!(0.0, leaf.ln_num_confs);
        assert!((child.ln_num_confs - 2.0_f64.ln()).abs() < 1e-12);
    }
    #[test]
    fn bounds_only_get_tighter() {
        let mut node = SearchNode::root(1, 0.0);
        assert!(node.tighten_bounds(-5.0, 5.0, 1e-5));
        assert!(node.tighten_bounds(-6.0, 6.0, 1e-5));
        assert_eq!(-5.0, node.conf_lower_bound);
        assert_eq!(5.0, node.conf_upper_bound);
        assert!(node.tighten_bounds(-4.0, 4.0, 1e-5));
        assert_eq!(-4.0, node.conf_lower_bound);
        assert_eq!(4.0, node.conf_upper_bound);
    }
    #[test]
    fn contradicting_bounds_are_widened_and_reported() {
        let mut node = SearchNode::root(1, 0.0);
        node.tighten_bounds(-1.0, 1.0, 1e-5);
        assert!(!node.tighten_bounds(2.0, 1.0, 1e-5));
        assert!(node.conf_lower_bound <= node.conf_upper_bound);
    }
    #[test]
    fn tiny_contradictions_are_absorbed() {
        let mut node = SearchNode::root(1, 0.0);
        assert!(node.tighten_bounds(1.0 + 1e-7, 1.0, 1e-5));
        assert_eq!(node.conf_lower_bound, node.conf_upper_bound);
    }
    #[test]
    fn z_bounds_of_a_leaf_are_boltzmann_weights() {
        let mut leaf = SearchNode::root(0, 0.0);
        leaf.set_exact(-1.0);
        let (lower, upper) = leaf.z_bounds(0.5);
        assert_eq!(lower, upper);
        assert_eq!(LogZ::boltzmann(-1.0, 0.5), lower);
        assert!(leaf.error_bound(0.5).is_zero());
    }
    #[test]
    fn z_lower_bound_of_an_internal_node_counts_the_best_conformation_only() {
        // two conformations below the node, their true energies are 0 and 100
        let mut node = SearchNode::root(1, 2.0_f64.ln());
        assert!(node.tighten_bounds(-1.0, 0.0, 1e-5));
        let exact = LogZ::boltzmann(0.0, 0.5) + LogZ::boltzmann(100.0, 0.5);

        let (lower, upper) = node.z_bounds(0.5);
        assert_eq!(LogZ::boltzmann(0.0, 0.5), lower);
        assert!(lower.ln() <= exact.ln() + 1e-9);
        assert!(upper.ln() >= exact.ln() - 1e-9);
        assert!((node.error_bound(0.5).ln() - (2.0 * 2.0_f64.exp() - 1.0).ln()).abs() < 1e-9);
    }
    #[test]
    fn index_child_moves_the_position_to_the_defined_side() {
        let mut parent = ConfIndex::new(3);
        parent.index(&[None, Some(1), None]);
        let mut child = ConfIndex::new(3);
        child.index_child(&parent, 0, 2);
        assert!(child.is_defined(0));
        assert!(child.is_defined(1));
        assert_eq!(vec![2], child.undefined);
    }
    #[test]
    fn epsilon_is_zero_when_the_upper_bound_is_zero() {
        let values = Values { qstar: LogZ::ZERO, pstar: LogZ::ZERO };
        assert_eq!(0.0, values.effective_epsilon());
    }
    #[test]
    fn by_default_epsilon_is_one() {
        assert_eq!(1.0, Values::default().effective_epsilon());
    }
}

#[cfg(test)]
mod test_pfunc_result {
    use crate::*;

    fn result(num_confs_evaluated: usize, partial_minimizations: usize, reductions: Reductions) -> PfuncResult {
        PfuncResult {
            status: Status::Estimated,
            values: Values::default(),
            start_values: Values::default(),
            num_confs_evaluated,
            statistics: Statistics { confs_evaluated: num_confs_evaluated, partial_minimizations, ..Default::default() },
            reductions,
            negative_corrections: 0,
            average_evaluation: None,
        }
    }

    #[test]
    fn without_minimization_there_is_no_average_reduction() {
        let reductions = Reductions { upper_full_min: LogZ::from_value(3.0), ..Default::default() };
        assert!(result(0, 0, reductions).average_reduction_per_minimization().is_zero());
    }
    #[test]
    fn partial_minimizations_count_in_the_average_reduction() {
        let reductions = Reductions {
            lower_full_min: LogZ::from_value(1.0),
            upper_full_min: LogZ::from_value(3.0),
            upper_partial_min: LogZ::from_value(2.0),
            ..Default::default()
        };
        let average = result(1, 2, reductions).average_reduction_per_minimization();
        assert!((average.value() - 2.0).abs() < 1e-9);
    }
    #[test]
    fn work_done_sums_every_kind_of_work() {
        let stats = Statistics {
            internal_processed: 1,
            confs_evaluated: 2,
            confs_scored: 3,
            partial_minimizations: 4,
            confs_reused: 100,
            ..Default::default()
        };
        assert_eq!(10, stats.work_done());
    }
}
