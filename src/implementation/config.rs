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

//! This module defines the knobs of a bounding computation.

use derive_builder::Builder;

use crate::{PositionOrdering, DEFAULT_RT};

/// The default numerical tolerance used when comparing energies
pub const DEFAULT_TOLERANCE: f64 = 1e-5;
/// The default base number of internal nodes drained in one round
pub const DEFAULT_MAX_INTERNAL_PER_ROUND: usize = 1000;
/// Pairs whose energy differs from its lower bound by at least this much are
/// worth probing
pub const DEFAULT_PAIR_FLOOR: f64 = 0.9;
/// Pairs whose energy difference is within this distance of the largest one
/// are worth probing
pub const DEFAULT_PAIR_WINDOW: f64 = 0.1;
/// Triples whose rigid/minimized spread is below this are not worth probing
pub const DEFAULT_TRIPLE_THRESHOLD: f64 = 0.3;
/// The growth of epsilon between two rounds tolerated before a warning
pub const DEFAULT_EPSILON_SLACK: f64 = 0.01;

/// This is how you configure a MARK* computation
#[derive(Debug, Clone, Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct MarkStarConfig {
    /// The number of worker threads used in a round
    #[builder(default = "num_cpus::get()")]
    pub nb_threads: usize,
    /// The gas constant times the temperature (kcal/mol)
    #[builder(default = "DEFAULT_RT")]
    pub rt: f64,
    /// Two energies closer than this are considered equal
    #[builder(default = "DEFAULT_TOLERANCE")]
    pub tolerance: f64,
    /// The base number of internal nodes drained in one round
    #[builder(default = "DEFAULT_MAX_INTERNAL_PER_ROUND")]
    pub max_internal_per_round: usize,
    /// When set, a leaf whose quick upper bound lies within this distance of
    /// its corrected lower bound is settled without a full evaluation
    #[builder(default, setter(strip_option))]
    pub materiality_threshold: Option<f64>,
    #[builder(default = "DEFAULT_PAIR_WINDOW")]
    pub pair_window: f64,
    #[builder(default = "DEFAULT_PAIR_FLOOR")]
    pub pair_floor: f64,
    #[builder(default = "DEFAULT_TRIPLE_THRESHOLD")]
    pub triple_threshold: f64,
    #[builder(default = "DEFAULT_EPSILON_SLACK")]
    pub epsilon_slack: f64,
    /// The order in which positions get assigned
    #[builder(default)]
    pub ordering: PositionOrdering,
}
impl MarkStarConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(0) = self.nb_threads {
            return Err("nb_threads must be positive".to_string());
        }
        if let Some(rt) = self.rt {
            if !(rt > 0.0 && rt.is_finite()) {
                return Err(format!("rt must be a positive number, got {rt}"));
            }
        }
        if let Some(tolerance) = self.tolerance {
            if !(tolerance >= 0.0) {
                return Err(format!("tolerance must be non negative, got {tolerance}"));
            }
        }
        if let Some(Some(threshold)) = self.materiality_threshold {
            if !(threshold > 0.0) {
                return Err(format!("materiality threshold must be positive, got {threshold}"));
            }
        }
        Ok(())
    }
}
impl Default for MarkStarConfig {
    fn default() -> Self {
        Self {
            nb_threads: num_cpus::get(),
            rt: DEFAULT_RT,
            tolerance: DEFAULT_TOLERANCE,
            max_internal_per_round: DEFAULT_MAX_INTERNAL_PER_ROUND,
            materiality_threshold: None,
            pair_window: DEFAULT_PAIR_WINDOW,
            pair_floor: DEFAULT_PAIR_FLOOR,
            triple_threshold: DEFAULT_TRIPLE_THRESHOLD,
            epsilon_slack: DEFAULT_EPSILON_SLACK,
            ordering: PositionOrdering::default(),
        }
    }
}

#[cfg(test)]
mod test_config {
    use crate::*;

    #[test]
    fn the_builder_defaults_match_the_default_config() {
        let built = MarkStarConfigBuilder::default().build().unwrap();
        let default = MarkStarConfig::default();
        assert_eq!(default.nb_threads, built.nb_threads);
        assert_eq!(default.rt, built.rt);
        assert_eq!(default.tolerance, built.tolerance);
        assert_eq!(1000, built.max_internal_per_round);
        assert_eq!(None, built.materiality_threshold);
        assert_eq!(0.1, built.pair_window);
        assert_eq!(0.9, built.pair_floor);
        assert_eq!(0.3, built.triple_threshold);
        assert_eq!(0.01, built.epsilon_slack);
        assert_eq!(PositionOrdering::BiggestLowerBoundDifference, built.ordering);
    }
    #[test]
    fn the_materiality_threshold_can_be_set() {
        let built = MarkStarConfigBuilder::default()
            .materiality_threshold(0.5)
            .build().unwrap();
        assert_eq!(Some(0.5), built.materiality_threshold);
    }
    #[test]
    fn zero_threads_are_rejected() {
        assert!(MarkStarConfigBuilder::default().nb_threads(0).build().is_err());
    }
    #[test]
    fn a_non_positive_rt_is_rejected() {
        assert!(MarkStarConfigBuilder::default().rt(0.0).build().is_err());
        assert!(MarkStarConfigBuilder::default().rt(f64::NAN).build().is_err());
    }
}
