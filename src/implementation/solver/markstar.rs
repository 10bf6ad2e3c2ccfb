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

//! This module provides the MARK* engine: an anytime branch-and-bound search
//! which maintains provable lower and upper bounds on the partition function
//! of a conformation space, and tightens them round after round until their
//! relative gap drops below a target epsilon.
//!
//! The search tree is refined in rounds. At the beginning of each round, the
//! orchestrator drains the fringe into two buckets (internal nodes and
//! leaves) and decides which of them weighs the most in the current gap.
//! The chosen bucket is then processed by a pool of worker threads: internal
//! nodes get expanded (or drilled down to a leaf), leaves get their energy
//! fully evaluated. Whatever the workers produce is merged into the fringe
//! once the round is over, and the global bounds get recomputed from the
//! root.
use std::{collections::VecDeque, sync::Arc, time::{Duration, Instant}};

use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::{ConfBoundStore, ConfIndex, ConfSpace, CorrectionStore, EnergyEvaluator, EnergyMatrix,
    EvaluatedConf, EvaluationTimer, GScorer, HScorer, LogZ, MarkStarConfig, NodeFringe, NodeId,
    ObjectPool, ObjectiveProvider, PairwiseGScorer, PfuncResult, PositionOrder, Pruner,
    QuickBoundCache, QuickBoundConfig, QuickBoundStats, RcTuple, Reductions, SearchNode,
    SearchTree, Sense, Statistics, Status, TraditionalHScorer, TreeNode, Values};

/// The errors a MARK* computation may report to its caller
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum MarkStarError {
    #[error("the computation must be initialized before it is run")]
    NotInitialized,
    #[error("the target epsilon must lie in [0, 1), got {0}")]
    InvalidEpsilon(f64),
}

/// A unit of work to be carried out by one of the workers of a round
#[derive(Debug, Clone, PartialEq)]
enum Task {
    /// Generate the children of an internal node
    Expand(NodeId),
    /// Dive from an internal node down to its most promising leaf
    Drill(NodeId),
    /// Evaluate (or otherwise settle) a leaf
    Resolve(NodeId),
    /// Minimize a tuple and store the resulting correction
    Probe(RcTuple),
}

/// The shared data that may only be manipulated within critical sections
struct Critical {
    /// The search tree. Workers read the nodes they are given and append
    /// the children they create.
    tree: SearchTree,
    /// The tasks of the current round which have not been picked up yet
    tasks: VecDeque<Task>,
    /// This is the number of tasks that are currently being processed.
    ///
    /// # Note
    /// This is what distinguishes a temporary starvation (a worker may still
    /// submit probes) from the completion of the round.
    ongoing: usize,
    /// The nodes which need to go (back) to the fringe once the round is over
    produced: Vec<NodeId>,
    stats: Statistics,
    reductions: Reductions,
    timer: EvaluationTimer,
}

/// The workload a thread can get from the shared state
enum WorkLoad {
    /// There is no work left in this round: you can safely terminate
    Complete,
    /// There is nothing you can do right now. Check again when you wake up
    Starvation,
    /// The item to process
    WorkItem { task: Task },
}

/// The scratch a worker needs to score the children of a node
struct ScoreContext<'a> {
    index: ConfIndex,
    gscorer: Box<dyn GScorer + Send + 'a>,
    rigid_scorer: Box<dyn GScorer + Send + 'a>,
    lower_h: Box<dyn HScorer + Send + 'a>,
    upper_h: Box<dyn HScorer + Send + 'a>,
}
impl <'a> ScoreContext<'a> {
    /// Pairwise g-scores on both matrices, traditional completion bounds:
    /// optimistic on the minimized matrix, pessimistic on the rigid one.
    fn traditional(
        space: &'a (dyn ConfSpace + Send + Sync),
        minimized: &'a (dyn EnergyMatrix + Send + Sync),
        rigid: &'a (dyn EnergyMatrix + Send + Sync),
    ) -> Self {
        Self {
            index: ConfIndex::new(space.nb_positions()),
            gscorer: Box::new(PairwiseGScorer::new(minimized)),
            rigid_scorer: Box::new(PairwiseGScorer::new(rigid)),
            lower_h: Box::new(TraditionalHScorer::new(space, minimized, Sense::Lower)),
            upper_h: Box::new(TraditionalHScorer::new(space, rigid, Sense::Upper)),
        }
    }
}

/// The state which is shared among the many running threads: it provides an
/// access to the collaborators, to the critical data (protected by a mutex)
/// as well as a monitor (condvar) to park threads in case of starvation.
struct Shared<'a> {
    space: &'a (dyn ConfSpace + Send + Sync),
    minimized: &'a (dyn EnergyMatrix + Send + Sync),
    rigid: &'a (dyn EnergyMatrix + Send + Sync),
    evaluator: &'a (dyn EnergyEvaluator + Send + Sync),
    quick: Option<QuickBoundCache<'a>>,
    bound_store: Option<&'a (dyn ConfBoundStore + Send + Sync)>,
    pruner: Option<&'a (dyn Pruner + Send + Sync)>,
    corrections: Arc<CorrectionStore>,
    order: Box<dyn PositionOrder + Send + Sync + 'a>,
    contexts: ObjectPool<'a, ScoreContext<'a>>,
    config: MarkStarConfig,

    critical: Mutex<Critical>,
    /// This is the monitor on which workers wait when no task is available.
    /// Whoever completes a task or submits new ones must wake them up.
    monitor: Condvar,
}

/// The MARK* partition function bounding engine.
///
/// # Example
/// ```
/// # use markstar::*;
/// # use markstar::test_utils::*;
/// let instance = ToyInstance::random(42, 4, 3);
/// let config = MarkStarConfigBuilder::default().nb_threads(2).build().unwrap();
/// let mut markstar = MarkStar::new(
///     &instance.space,
///     &instance.minimized,
///     &instance.rigid,
///     &instance.evaluator,
///     config);
///
/// markstar.init(0.01);
/// let status = markstar.compute().unwrap();
/// assert_eq!(Status::Estimated, status);
/// assert!(markstar.values().effective_epsilon() <= 0.01);
/// ```
pub struct MarkStar<'a> {
    shared: Shared<'a>,
    /// The nodes that still need some work, largest error bound first. Only
    /// the orchestrator touches it, between two rounds.
    fringe: NodeFringe,
    status: Status,
    target_epsilon: f64,
    stability_threshold: Option<LogZ>,
    values: Values,
    start_values: Values,
    bootstrapped: bool,
    /// The maximum number of leaves resolved in one leaf round
    max_leaves: usize,
}

impl <'a> MarkStar<'a> {
    pub fn new(
        space: &'a (dyn ConfSpace + Send + Sync),
        minimized: &'a (dyn EnergyMatrix + Send + Sync),
        rigid: &'a (dyn EnergyMatrix + Send + Sync),
        evaluator: &'a (dyn EnergyEvaluator + Send + Sync),
        config: MarkStarConfig,
    ) -> Self {
        let root = SearchNode::root(space.nb_positions(), space.ln_num_confs());
        let contexts = ObjectPool::new(move || ScoreContext::traditional(space, minimized, rigid));
        contexts.allocate(config.nb_threads.max(1));
        MarkStar {
            shared: Shared {
                space,
                minimized,
                rigid,
                evaluator,
                quick: None,
                bound_store: None,
                pruner: None,
                corrections: Arc::new(CorrectionStore::new()),
                order: config.ordering.build(space, minimized),
                contexts,
                //
                critical: Mutex::new(Critical {
                    tree: SearchTree::new(root, config.rt),
                    tasks: VecDeque::new(),
                    ongoing: 0,
                    produced: vec![],
                    stats: Statistics::default(),
                    reductions: Reductions::default(),
                    timer: EvaluationTimer::default(),
                }),
                monitor: Condvar::new(),
                config,
            },
            fringe: NodeFringe::new(),
            status: Status::Uninitialized,
            target_epsilon: 0.0,
            stability_threshold: None,
            values: Values::default(),
            start_values: Values::default(),
            bootstrapped: false,
            max_leaves: 1,
        }
    }
    /// Enables the quick upper bounds computed from the objectives of the
    /// given provider
    pub fn with_quick_bounds(self, provider: &'a (dyn ObjectiveProvider + Send + Sync), config: QuickBoundConfig) -> Self {
        let cache = QuickBoundCache::new(provider, self.shared.space.nb_positions(), config);
        self.with_quick_bound_cache(cache)
    }
    /// Uses the given quick-bound cache
    pub fn with_quick_bound_cache(mut self, cache: QuickBoundCache<'a>) -> Self {
        self.shared.quick = Some(cache);
        self
    }
    /// Reuses (and feeds) the energies remembered by the given store
    pub fn with_bound_store(mut self, store: &'a (dyn ConfBoundStore + Send + Sync)) -> Self {
        self.shared.bound_store = Some(store);
        self
    }
    /// Rules out the children rejected by the given pruner
    pub fn with_pruner(mut self, pruner: &'a (dyn Pruner + Send + Sync)) -> Self {
        self.shared.pruner = Some(pruner);
        self
    }
    /// Shares a correction store with other computations
    pub fn with_corrections(mut self, corrections: Arc<CorrectionStore>) -> Self {
        self.shared.corrections = corrections;
        self
    }

    /// Prepares a computation targeting the given epsilon. Any previous
    /// search is discarded, but the learned corrections and the quick-bound
    /// cache are kept.
    pub fn init(&mut self, target_epsilon: f64) {
        self.target_epsilon = target_epsilon;
        self.stability_threshold = None;
        self.reset();
    }
    /// Same as `init`, except that the computation stops as `Unstable` as
    /// soon as the upper bound on the partition function falls below the
    /// given threshold.
    pub fn init_with_stability(&mut self, target_epsilon: f64, threshold: LogZ) {
        self.target_epsilon = target_epsilon;
        self.stability_threshold = Some(threshold);
        self.reset();
    }

    /// Tightens the bounds until the target epsilon is reached, or stability
    /// is lost, or there is nothing left to do
    pub fn compute(&mut self) -> Result<Status, MarkStarError> {
        self.compute_bounded(usize::MAX)
    }
    /// Same as `compute` except that no more than `max_evaluations` full
    /// evaluations are performed by this call.
    pub fn compute_bounded(&mut self, max_evaluations: usize) -> Result<Status, MarkStarError> {
        if self.status == Status::Uninitialized {
            return Err(MarkStarError::NotInitialized);
        }
        if !(0.0..1.0).contains(&self.target_epsilon) {
            return Err(MarkStarError::InvalidEpsilon(self.target_epsilon));
        }
        if self.status != Status::Estimating {
            return Ok(self.status);
        }

        let start = self.shared.critical.get_mut().stats.confs_evaluated;
        if !self.bootstrapped {
            self.bootstrap();
        }

        let mut epsilon = self.values.effective_epsilon();
        loop {
            let done = self.shared.critical.get_mut().stats.confs_evaluated - start;
            if epsilon <= self.target_epsilon || done >= max_evaluations || !self.is_stable() {
                break;
            }
            if !self.tighten_round(max_evaluations - done) {
                debug!("nothing left to refine");
                break;
            }
            let previous = epsilon;
            epsilon = self.values.effective_epsilon();
            if epsilon > previous + self.shared.config.epsilon_slack {
                warn!("epsilon grew from {previous:.6} to {epsilon:.6}");
            }
        }

        if !self.is_stable() {
            self.status = Status::Unstable;
        } else if epsilon <= self.target_epsilon {
            self.status = if self.values.qstar.is_zero() { Status::Unstable } else { Status::Estimated };
        }

        let stats = &self.shared.critical.get_mut().stats;
        info!("{:?}: Z in [{}, {}] (epsilon {:.6}) after {} evaluations, {} confs scored, {} internal nodes ({} units of work)",
            self.status, self.values.qstar, self.values.pstar, epsilon,
            stats.confs_evaluated, stats.confs_scored, stats.internal_processed, stats.work_done());
        Ok(self.status)
    }

    pub fn status(&self) -> Status {
        self.status
    }
    pub fn values(&self) -> Values {
        self.values
    }
    pub fn num_confs_evaluated(&self) -> usize {
        self.shared.critical.lock().stats.confs_evaluated
    }
    pub fn num_confs_scored(&self) -> usize {
        self.shared.critical.lock().stats.confs_scored
    }
    pub fn stats(&self) -> Statistics {
        self.shared.critical.lock().stats.clone()
    }
    /// The average wall-clock time of a full evaluation since the last `init`
    pub fn average_evaluation(&self) -> Option<Duration> {
        self.shared.critical.lock().timer.average_evaluation()
    }
    pub fn negative_corrections(&self) -> usize {
        self.shared.corrections.negative_corrections()
    }
    /// The correction store used by this computation
    pub fn corrections(&self) -> Arc<CorrectionStore> {
        Arc::clone(&self.shared.corrections)
    }
    pub fn quick_bound_stats(&self) -> Option<QuickBoundStats> {
        self.shared.quick.as_ref().map(|q| q.stats())
    }
    /// The number of nodes in the search tree
    pub fn tree_size(&self) -> usize {
        self.shared.critical.lock().tree.len()
    }
    /// Visits every node of the search tree
    pub fn for_each_node<F: FnMut(NodeId, &TreeNode)>(&self, mut f: F) {
        let critical = self.shared.critical.lock();
        for (id, node) in critical.tree.iter() {
            f(id, node);
        }
    }

    /// Takes a snapshot of the computation
    pub fn make_result(&self) -> PfuncResult {
        let critical = self.shared.critical.lock();
        let start = self.start_values;
        let now = self.values;
        let mut reductions = critical.reductions;
        reductions.lower_conf_upper = now.qstar
            .saturating_sub(start.qstar)
            .saturating_sub(reductions.lower_full_min)
            .saturating_sub(reductions.lower_quick_bound);
        reductions.upper_conf_lower = start.pstar
            .saturating_sub(now.pstar)
            .saturating_sub(reductions.upper_full_min)
            .saturating_sub(reductions.upper_partial_min);

        PfuncResult {
            status: self.status,
            values: now,
            start_values: start,
            num_confs_evaluated: critical.stats.confs_evaluated,
            statistics: critical.stats.clone(),
            reductions,
            negative_corrections: self.shared.corrections.negative_corrections(),
            average_evaluation: critical.timer.average_evaluation(),
        }
    }

    // ------------------------------------------------------------------------
    // --- ORCHESTRATION ------------------------------------------------------
    // ------------------------------------------------------------------------

    fn reset(&mut self) {
        let shared = &self.shared;
        let tolerance = shared.config.tolerance;
        let mut root = SearchNode::root(shared.space.nb_positions(), shared.space.ln_num_confs());
        shared.contexts.with(|ctx| {
            ctx.index.index(&root.assignment);
            root.gscore = ctx.gscorer.calc(&ctx.index);
            root.rigid_score = ctx.rigid_scorer.calc(&ctx.index);
            let lower = root.gscore + ctx.lower_h.calc(&ctx.index);
            let upper = root.rigid_score + ctx.upper_h.calc(&ctx.index);
            if !root.tighten_bounds(lower, upper, tolerance) {
                warn!("inconsistent root bounds: {lower} > {upper}");
            }
        });

        let critical = self.shared.critical.get_mut();
        critical.tree = SearchTree::new(root, self.shared.config.rt);
        critical.tasks.clear();
        critical.ongoing = 0;
        critical.produced.clear();
        critical.stats = Statistics::default();
        critical.reductions = Reductions::default();
        critical.timer.reset();

        self.fringe.clear();
        self.bootstrapped = false;
        self.max_leaves = 1;
        self.status = Status::Estimating;
        self.update_bounds();
        self.start_values = self.values;
    }

    /// Dives from the root to a first leaf so that the lower bound gets a
    /// meaningful value right away
    fn bootstrap(&mut self) {
        let root = self.shared.critical.get_mut().tree.root();
        self.shared.drill(root);
        self.bootstrapped = true;
        self.merge(vec![]);
        self.update_bounds();
    }

    /// After at least one evaluation, the upper bound must remain above the
    /// stability threshold (if any)
    fn is_stable(&mut self) -> bool {
        let evaluated = self.shared.critical.get_mut().stats.confs_evaluated;
        match self.stability_threshold {
            Some(threshold) if evaluated > 0 => self.values.pstar >= threshold,
            _ => true,
        }
    }

    /// Performs one round. Returns false when there was nothing left to do.
    fn tighten_round(&mut self, remaining: usize) -> bool {
        let Drained { internal, leaves, leftovers, internal_z, leaf_z } = self.drain(remaining);
        if internal.is_empty() && leaves.is_empty() {
            let stalled = leftovers.is_empty();
            self.merge(leftovers);
            self.update_bounds();
            return !stalled;
        }

        let leaf_round = internal.is_empty() || (internal_z < leaf_z && !leaves.is_empty());
        let start = Instant::now();
        if leaf_round {
            debug!("leaf round: {} leaves (internal gap {}, leaf gap {})", leaves.len(), internal_z, leaf_z);
            self.run_tasks(leaves.into_iter().map(Task::Resolve).collect());
            self.shared.critical.get_mut().timer.record_leaf_round(start.elapsed());
            self.max_leaves = (self.max_leaves + 1).min(self.shared.config.nb_threads.max(1));
            self.merge(leftovers.into_iter().chain(internal).collect());
        } else {
            debug!("internal round: {} nodes (internal gap {}, leaf gap {})", internal.len(), internal_z, leaf_z);
            let tasks = self.internal_tasks(&internal);
            let nb_nodes = tasks.len();
            self.run_tasks(tasks);
            let critical = self.shared.critical.get_mut();
            critical.timer.record_internal_round(start.elapsed(), nb_nodes);
            critical.stats.internal_processed += nb_nodes;
            self.merge(leftovers.into_iter().chain(leaves).collect());
        }
        self.update_bounds();
        true
    }

    /// Nodes holding a tiny lower bound but a large share of the upper bound
    /// are drilled down to a leaf; the others are expanded one level.
    fn internal_tasks(&mut self, internal: &[NodeId]) -> Vec<Task> {
        let threshold = 1.0 - self.target_epsilon;
        let tree = &self.shared.critical.get_mut().tree;
        let (_, root_upper) = tree.get(tree.root()).subtree_bounds();
        internal.iter().copied()
            .map(|id| {
                let (lower, upper) = tree.get(id).subtree_bounds();
                if lower <= LogZ::ONE && upper.ratio(root_upper) > threshold {
                    Task::Drill(id)
                } else {
                    Task::Expand(id)
                }
            })
            .collect()
    }

    /// Pops the fringe into buckets. Learned corrections and quick bounds are
    /// applied on the fly: a node whose bounds moved this way is kept aside
    /// (in the leftovers) for a later round.
    fn drain(&mut self, remaining: usize) -> Drained {
        let config = &self.shared.config;
        let rt = config.rt;
        let tolerance = config.tolerance;
        let corrections = &self.shared.corrections;
        let minimized = self.shared.minimized;
        let quick = self.shared.quick.as_ref();
        let critical = self.shared.critical.get_mut();

        let max_internal = critical.timer.drain_cap(config.max_internal_per_round);
        let max_leaves = self.max_leaves.min(remaining);
        let mut drained = Drained::default();

        while let Some(id) = self.fringe.pop() {
            let tn = critical.tree.get_mut(id);
            if !tn.is_open() {
                continue;
            }
            let corrected = corrections.corrected_energy(minimized, &tn.node.assignment);
            if apply_correction(tn, corrected, &mut critical.reductions, rt, tolerance) {
                if tn.node.is_leaf() && !tn.quick_checked {
                    if let Some(quick) = quick {
                        consult_quick_bound(quick, tn, &mut critical.reductions, rt, tolerance);
                    }
                }
                drained.leftovers.push(id);
                continue;
            }

            let error_bound = critical.tree.error_bound(id);
            let tn = critical.tree.get_mut(id);
            if !tn.node.is_leaf() {
                drained.internal.push(id);
                drained.internal_z = drained.internal_z + error_bound;
                if drained.internal.len() >= max_internal {
                    break;
                }
            } else if drained.leaves.len() < max_leaves {
                drained.leaves.push(id);
                drained.leaf_z = drained.leaf_z + error_bound;
            } else {
                if !tn.quick_checked {
                    if let Some(quick) = quick {
                        consult_quick_bound(quick, tn, &mut critical.reductions, rt, tolerance);
                    }
                }
                drained.leftovers.push(id);
            }
        }
        trace!("drained {} internal nodes, {} leaves, {} leftovers",
            drained.internal.len(), drained.leaves.len(), drained.leftovers.len());
        drained
    }

    /// Pushes the nodes produced during the round (plus the given ones) back
    /// onto the fringe, provided they still need work
    fn merge(&mut self, extra: Vec<NodeId>) {
        let critical = self.shared.critical.get_mut();
        let produced = std::mem::take(&mut critical.produced);
        for id in produced.into_iter().chain(extra) {
            if critical.tree.get(id).is_open() {
                self.fringe.push(id, critical.tree.error_bound(id));
            }
        }
    }

    fn update_bounds(&mut self) {
        let (qstar, pstar) = self.shared.critical.get_mut().tree.aggregate();
        self.values = Values { qstar, pstar };
    }

    /// Spawns the workers of a round and waits for all of them to finish
    fn run_tasks(&mut self, tasks: Vec<Task>) {
        self.shared.critical.get_mut().tasks.extend(tasks);
        let shared = &self.shared;
        std::thread::scope(|s| {
            for _ in 0..shared.config.nb_threads.max(1) {
                s.spawn(move || {
                    loop {
                        match shared.get_workload() {
                            WorkLoad::Complete => break,
                            WorkLoad::Starvation => continue,
                            WorkLoad::WorkItem { task } => {
                                shared.process(task);
                                shared.notify_task_finished();
                            }
                        }
                    }
                });
            }
        });
    }
}

/// The buckets of a round
#[derive(Default)]
struct Drained {
    internal: Vec<NodeId>,
    leaves: Vec<NodeId>,
    leftovers: Vec<NodeId>,
    internal_z: LogZ,
    leaf_z: LogZ,
}

/// Raises the bounds of a node whose corrected g-score is `corrected`.
/// Returns true iff the node lower bound moved by more than the tolerance.
fn apply_correction(tn: &mut TreeNode, corrected: f64, reductions: &mut Reductions, rt: f64, tolerance: f64) -> bool {
    let node = &mut tn.node;
    if node.minimized {
        return false;
    }
    let gscore = corrected.min(node.rigid_score);
    let raised = (gscore + node.h_score()).min(node.conf_upper_bound);
    if raised - node.conf_lower_bound <= tolerance {
        return false;
    }
    if corrected > node.rigid_score + tolerance {
        warn!("overcorrected node {node}: corrected g-score {corrected}");
    }
    trace!("correction raises {node} to {raised}");
    reductions.record_correction(node.conf_lower_bound, raised - node.conf_lower_bound, rt);
    node.gscore = node.gscore.max(gscore);
    node.tighten_bounds(raised, f64::INFINITY, tolerance);
    true
}

/// Lowers the upper bound of a leaf to its quick upper bound (once per leaf)
fn consult_quick_bound(quick: &QuickBoundCache, tn: &mut TreeNode, reductions: &mut Reductions, rt: f64, tolerance: f64) -> bool {
    tn.quick_checked = true;
    let Some(conf) = tn.node.conf() else { return false };
    match quick.quick_upper(&conf) {
        Ok(upper) => apply_quick_bound(tn, upper, reductions, rt, tolerance),
        Err(e) => {
            debug!("no quick bound for {}: {e}", tn.node);
            false
        }
    }
}

/// Returns true iff `upper` tightens the upper bound of the leaf by more than
/// the tolerance
fn apply_quick_bound(tn: &mut TreeNode, upper: f64, reductions: &mut Reductions, rt: f64, tolerance: f64) -> bool {
    let node = &mut tn.node;
    if upper >= node.conf_upper_bound - tolerance {
        return false;
    }
    if upper < node.conf_lower_bound - tolerance {
        warn!("quick upper bound {upper} below the lower bound of {node}");
    }
    let upper = upper.max(node.conf_lower_bound);
    reductions.record_quick_bound(node.conf_upper_bound, upper, rt);
    node.tighten_bounds(f64::NEG_INFINITY, upper, tolerance);
    true
}

// ----------------------------------------------------------------------------
// --- WORKERS ----------------------------------------------------------------
// ----------------------------------------------------------------------------
impl Shared<'_> {
    /// Consults the shared state to fetch a workload. Depending on the current
    /// state, the workload can either be:
    ///
    ///   + Complete, when the round is over and the thread should stop
    ///   + Starvation, when there is no task available for processing at the
    ///     time being (but some are still being processed and might submit
    ///     new tasks).
    ///   + WorkItem, when the thread successfully obtained a task to process.
    fn get_workload(&self) -> WorkLoad {
        let mut critical = self.critical.lock();
        if critical.ongoing == 0 && critical.tasks.is_empty() {
            return WorkLoad::Complete;
        }
        match critical.tasks.pop_front() {
            Some(task) => {
                critical.ongoing += 1;
                WorkLoad::WorkItem { task }
            }
            None => {
                self.monitor.wait(&mut critical);
                WorkLoad::Starvation
            }
        }
    }
    /// Acknowledges that a thread finished processing its task
    fn notify_task_finished(&self) {
        let mut critical = self.critical.lock();
        critical.ongoing -= 1;
        self.monitor.notify_all();
    }

    fn process(&self, task: Task) {
        match task {
            Task::Expand(id) => { self.expand(id, false); }
            Task::Drill(id) => self.drill(id),
            Task::Resolve(id) => self.resolve_leaf(id),
            Task::Probe(tuple) => self.probe(tuple),
        }
    }

    /// Repeatedly expands the most promising child (lowest conformation
    /// lower bound) until a leaf is reached. The siblings met along the way
    /// are sent to the fringe, and so is the leaf.
    fn drill(&self, id: NodeId) {
        let mut current = id;
        loop {
            let is_leaf = self.critical.lock().tree.get(current).node.is_leaf();
            if is_leaf {
                self.critical.lock().produced.push(current);
                return;
            }
            match self.expand(current, true) {
                Some(best) => current = best,
                None => return,
            }
        }
    }

    /// Generates the children of a node. When `keep_best` is set, the child
    /// with the lowest lower bound is returned instead of being sent to the
    /// fringe.
    fn expand(&self, id: NodeId, keep_best: bool) -> Option<NodeId> {
        let node = self.critical.lock().tree.get(id).node.clone();
        let children = self.contexts.with(|ctx| self.score_children(ctx, &node));

        let mut critical = self.critical.lock();
        critical.tree.mark_expanded(id);
        critical.stats.confs_scored += children.iter().filter(|c| c.is_leaf()).count();

        let mut best: Option<(NodeId, f64)> = None;
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let lower = child.conf_lower_bound;
            let child_id = critical.tree.add_child(id, child);
            ids.push(child_id);
            match best {
                Some((_, b)) if b <= lower => {}
                _ => best = Some((child_id, lower)),
            }
        }
        trace!("expanded {node} into {} children", ids.len());

        let kept = if keep_best { best.map(|(b, _)| b) } else { None };
        critical.produced.extend(ids.into_iter().filter(|c| Some(*c) != kept));
        kept
    }

    /// Scores every child of `node` which has not been pruned
    fn score_children(&self, ctx: &mut ScoreContext, node: &SearchNode) -> Vec<SearchNode> {
        let tolerance = self.config.tolerance;
        ctx.index.index(&node.assignment);
        let Some(pos) = self.order.next_position(node, &ctx.index) else {
            return vec![];
        };

        let nb_options = self.space.nb_options(pos);
        let mut children = Vec::with_capacity(nb_options);
        for rc in 0..nb_options {
            if ctx.index.defined.iter().any(|a| self.space.is_pruned_pair(a.pos, a.rc, pos, rc)) {
                continue;
            }
            if self.pruner.map_or(false, |p| p.is_pruned(node, pos, rc)) {
                continue;
            }

            let mut child = node.assign(pos, rc, nb_options);
            child.gscore = node.gscore + ctx.gscorer.calc_differential(&ctx.index, pos, rc);
            child.rigid_score = node.rigid_score + ctx.rigid_scorer.calc_differential(&ctx.index, pos, rc);

            let corrected = self.corrections.corrected_energy(self.minimized, &child.assignment);
            if corrected - child.gscore > tolerance {
                child.gscore = corrected;
            }
            if child.gscore > child.rigid_score + tolerance {
                warn!("overcorrected child {child}");
            }
            child.gscore = child.gscore.min(child.rigid_score);

            let (lower, upper) = if child.is_leaf() {
                (child.gscore, child.rigid_score)
            } else {
                (child.gscore + ctx.lower_h.calc_differential(&ctx.index, pos, rc),
                 child.rigid_score + ctx.upper_h.calc_differential(&ctx.index, pos, rc))
            };
            if !child.tighten_bounds(lower, upper, tolerance) {
                warn!("upper bound {upper} below lower bound {lower} for {child}");
            }
            children.push(child);
        }
        children
    }

    /// Settles a leaf: either one of its cheap bounds shows that its bounds
    /// are stale, or it gets fully evaluated.
    fn resolve_leaf(&self, id: NodeId) {
        let config = &self.config;
        let tolerance = config.tolerance;
        let (node, quick_checked) = {
            let critical = self.critical.lock();
            let tn = critical.tree.get(id);
            (tn.node.clone(), tn.quick_checked)
        };
        if node.minimized {
            return;
        }
        let Some(conf) = node.conf() else { return };

        // 1. a learned correction moved the lower bound
        let corrected = self.corrections.corrected_energy(self.minimized, &node.assignment);
        if corrected > node.conf_lower_bound + tolerance || corrected > node.gscore + tolerance {
            let mut critical = self.critical.lock();
            let critical = &mut *critical;
            let tn = critical.tree.get_mut(id);
            if apply_correction(tn, corrected, &mut critical.reductions, config.rt, tolerance) {
                critical.stats.correction_skips += 1;
                critical.produced.push(id);
                trace!("correction skip of {}", critical.tree.get(id).node);
                return;
            }
        }

        // 2. a quick bound moved the upper bound
        let quick_upper = match (&self.quick, quick_checked) {
            (Some(quick), false) => match quick.quick_upper(&conf) {
                Ok(upper) => Some(upper),
                Err(e) => {
                    debug!("no quick bound for {node}: {e}");
                    None
                }
            },
            _ => None,
        };
        if let Some(upper) = quick_upper {
            let mut critical = self.critical.lock();
            let critical = &mut *critical;
            let tn = critical.tree.get_mut(id);
            tn.quick_checked = true;
            if apply_quick_bound(tn, upper, &mut critical.reductions, config.rt, tolerance) {
                critical.stats.quick_bound_skips += 1;
                critical.produced.push(id);
                return;
            }
        }

        // 3. the bounds are already tight enough
        if let Some(threshold) = config.materiality_threshold {
            let upper = quick_upper.map_or(node.conf_upper_bound, |q| q.min(node.conf_upper_bound));
            let gap = upper - corrected.max(node.conf_lower_bound);
            if (0.0..threshold).contains(&gap) {
                let mut critical = self.critical.lock();
                let tn = critical.tree.get_mut(id);
                tn.node.tighten_bounds(corrected, upper, tolerance);
                tn.closed = true;
                critical.stats.materiality_skips += 1;
                return;
            }
        }

        self.evaluate_leaf(id, &conf);
    }

    fn evaluate_leaf(&self, id: NodeId, conf: &[usize]) {
        let tolerance = self.config.tolerance;
        let start = Instant::now();
        let stored = self.bound_store.and_then(|s| s.lookup(conf)).and_then(|b| b.energy);
        let reused = stored.is_some();
        let outcome = match stored {
            Some(energy) => Ok(EvaluatedConf { energy, breakdown: None }),
            None => self.evaluator.evaluate(conf),
        };

        let evaluated = match outcome {
            Ok(evaluated) => evaluated,
            Err(e) => {
                warn!("could not evaluate {conf:?}: {e}");
                let mut critical = self.critical.lock();
                critical.tree.get_mut(id).closed = true;
                critical.stats.evaluation_failures += 1;
                return;
            }
        };

        let energy = evaluated.energy;
        let old_lower = {
            let mut critical = self.critical.lock();
            let critical = &mut *critical;
            if !reused {
                critical.timer.record_evaluation(start.elapsed());
            }
            let node = &mut critical.tree.get_mut(id).node;
            let (old_lower, old_upper) = (node.conf_lower_bound, node.conf_upper_bound);
            if energy < old_lower - tolerance {
                warn!("minimized energy {energy} below the lower bound of {node}");
            }
            let exact = if energy > old_upper {
                if energy > old_upper + tolerance {
                    warn!("rejected minimized energy {energy} above the upper bound of {node}");
                    critical.stats.rejected_energies += 1;
                }
                old_upper
            } else {
                energy
            };
            node.set_exact(exact);
            trace!("evaluated {node}");

            if reused {
                critical.stats.confs_reused += 1;
            } else {
                critical.stats.confs_evaluated += 1;
                critical.stats.record_minimization(conf.len());
            }
            critical.reductions.record_minimization(old_lower, old_upper, exact, self.config.rt);
            old_lower
        };

        if !reused {
            if let Some(store) = self.bound_store {
                store.record(conf, old_lower, energy);
            }
            self.harvest(conf, &evaluated);
        }
    }

    /// Looks for the triples of `conf` whose true energy is likely to differ
    /// the most from their pairwise estimate, and submits a probe for each
    /// of them.
    fn harvest(&self, conf: &[usize], evaluated: &EvaluatedConf) {
        let n = conf.len();
        let Some(breakdown) = evaluated.breakdown.as_ref() else { return };
        if n < 3 || breakdown.nb_positions() != n {
            return;
        }
        let emat = self.minimized;
        let mut diffs = Vec::with_capacity(n * (n - 1) / 2);
        for p1 in 0..n {
            for p2 in p1 + 1..n {
                let truth = breakdown.one(p1) + breakdown.pair(p1, p2) + breakdown.one(p2);
                let estimate = emat.one_body(p1, conf[p1])
                    + emat.pairwise(p1, conf[p1], p2, conf[p2])
                    + emat.one_body(p2, conf[p2]);
                diffs.push((p1, p2, truth - estimate));
            }
        }
        diffs.sort_unstable_by(|a, b| b.2.total_cmp(&a.2));

        let max_diff = diffs[0].2;
        let mut probes = vec![];
        for (p1, p2, diff) in diffs {
            if diff < self.config.pair_floor && max_diff - diff > self.config.pair_window {
                break;
            }
            for p3 in (0..n).filter(|p| *p != p1 && *p != p2) {
                let tuple = RcTuple::from_conf(conf, &[p1, p2, p3]);
                let spread = self.rigid.internal_energy(&tuple) - emat.internal_energy(&tuple);
                if spread < self.config.triple_threshold {
                    continue;
                }
                if !self.corrections.claim(&tuple) || self.corrections.has_term_for(&tuple) {
                    continue;
                }
                probes.push(Task::Probe(tuple));
            }
        }

        if !probes.is_empty() {
            let mut critical = self.critical.lock();
            critical.stats.partial_minimizations += probes.len();
            critical.tasks.extend(probes);
            self.monitor.notify_all();
        }
    }

    /// Minimizes a tuple and learns how far its pairwise estimate is from
    /// the truth
    fn probe(&self, tuple: RcTuple) {
        match self.evaluator.evaluate_tuple(&tuple) {
            Ok(energy) => {
                let correction = energy - self.minimized.internal_energy(&tuple);
                self.critical.lock().stats.record_minimization(tuple.len());
                self.corrections.insert(tuple, correction);
            }
            Err(e) => warn!("could not minimize {tuple}: {e}"),
        }
    }
}
