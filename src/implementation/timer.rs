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

//! This module keeps track of the time spent in the different kinds of rounds
//! so that the orchestrator can balance the work it drains from the fringe.

use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct EvaluationTimer {
    /// Duration of the latest leaf round
    leaf_round: Option<Duration>,
    /// Average time spent on an internal node during the latest internal round
    internal_per_node: Option<Duration>,
    evaluation_time: Duration,
    evaluations: usize,
}
impl EvaluationTimer {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
    pub fn record_leaf_round(&mut self, elapsed: Duration) {
        self.leaf_round = Some(elapsed);
    }
    pub fn record_internal_round(&mut self, elapsed: Duration, nodes: usize) {
        if nodes > 0 {
            self.internal_per_node = Some(elapsed / nodes as u32);
        }
    }
    pub fn record_evaluation(&mut self, elapsed: Duration) {
        self.evaluation_time += elapsed;
        self.evaluations += 1;
    }
    pub fn average_evaluation(&self) -> Option<Duration> {
        if self.evaluations == 0 {
            None
        } else {
            Some(self.evaluation_time / self.evaluations as u32)
        }
    }
    /// The maximum number of internal nodes to drain in one round: at least
    /// `base`, more when a leaf round takes far longer than processing an
    /// internal node.
    pub fn drain_cap(&self, base: usize) -> usize {
        match (self.leaf_round, self.internal_per_node) {
            (Some(leaf), Some(internal)) if !internal.is_zero() => {
                let ratio = 0.1 * leaf.as_secs_f64() / internal.as_secs_f64();
                base.max(ratio.floor() as usize)
            }
            _ => base,
        }
    }
}
