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

//! These tests check that the bounds computed on random toy instances are
//! always valid, whatever the collaborators and the number of threads.

use markstar::*;
use markstar::test_utils::*;

const SEEDS: std::ops::Range<u64> = 0..8;

fn config(nb_threads: usize) -> MarkStarConfig {
    MarkStarConfigBuilder::default()
        .nb_threads(nb_threads)
        .build()
        .unwrap()
}

fn assert_valid(values: Values, exact: LogZ) {
    assert!(values.qstar.ln() <= exact.ln() + 1e-9, "{} > {}", values.qstar, exact);
    assert!(values.pstar.ln() >= exact.ln() - 1e-9, "{} < {}", values.pstar, exact);
}

fn assert_consistent_nodes(markstar: &MarkStar) {
    markstar.for_each_node(|_, n| {
        assert!(n.node.conf_lower_bound <= n.node.conf_upper_bound + 1e-5, "{}", n.node);
    });
}

#[test_log::test]
fn the_bounds_are_valid_and_monotone_at_every_step() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 5, 3);
        let exact = instance.exact_z(DEFAULT_RT);
        let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2));
        markstar.init(0.0);

        let mut previous = markstar.values();
        let mut steps = 0;
        while markstar.compute_bounded(1).unwrap() == Status::Estimating {
            let values = markstar.values();
            assert_valid(values, exact);
            assert!(values.qstar.ln() >= previous.qstar.ln() - 1e-9);
            assert!(values.pstar.ln() <= previous.pstar.ln() + 1e-9);
            assert_consistent_nodes(&markstar);
            previous = values;

            steps += 1;
            assert!(steps <= 1000, "no termination for seed {seed}");
        }
        assert_eq!(Status::Estimated, markstar.status());
        assert_valid(markstar.values(), exact);
        assert!(markstar.num_confs_evaluated() <= instance.space.enumerate().len());
    }
}

#[test_log::test]
fn the_target_epsilon_is_reached() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 6, 3);
        let exact = instance.exact_z(DEFAULT_RT);
        let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(4));
        markstar.init(0.1);

        assert_eq!(Ok(Status::Estimated), markstar.compute());
        assert!(markstar.values().effective_epsilon() <= 0.1);
        assert_valid(markstar.values(), exact);
    }
}

#[test_log::test]
fn the_number_of_threads_does_not_change_the_final_bounds() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 5, 3);
        let mut bounds = vec![];
        for nb_threads in [1, 4] {
            let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(nb_threads));
            markstar.init(0.0);
            assert_eq!(Ok(Status::Estimated), markstar.compute());
            bounds.push(markstar.values());
        }
        assert!((bounds[0].qstar.ln() - bounds[1].qstar.ln()).abs() <= 1e-9);
        assert!((bounds[0].pstar.ln() - bounds[1].pstar.ln()).abs() <= 1e-9);
    }
}

#[test_log::test]
fn quick_bounds_keep_the_bounds_valid() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 6, 3);
        let exact = instance.exact_z(DEFAULT_RT);
        let provider = QuadraticProvider::new(&instance.evaluator);
        let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2))
            .with_quick_bounds(&provider, QuickBoundConfig::default());
        markstar.init(0.0);

        let mut steps = 0;
        while markstar.compute_bounded(1).unwrap() == Status::Estimating {
            assert_valid(markstar.values(), exact);
            assert_consistent_nodes(&markstar);
            steps += 1;
            assert!(steps <= 1000, "no termination for seed {seed}");
        }
        assert_eq!(Status::Estimated, markstar.status());
        assert!(markstar.quick_bound_stats().unwrap().queries > 0);
    }
}

/// The bounds reached on the instance without any quick bound
fn plain_bounds(instance: &ToyInstance) -> Values {
    let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2));
    markstar.init(0.0);
    assert_eq!(Ok(Status::Estimated), markstar.compute());
    markstar.values()
}

fn assert_same_bounds(expected: Values, actual: Values) {
    assert!((expected.qstar.ln() - actual.qstar.ln()).abs() <= 1e-9, "{} != {}", expected.qstar, actual.qstar);
    assert!((expected.pstar.ln() - actual.pstar.ln()).abs() <= 1e-9, "{} != {}", expected.pstar, actual.pstar);
}

#[test_log::test]
fn a_failing_objective_provider_is_harmless() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 5, 3);
        let exact = instance.exact_z(DEFAULT_RT);
        let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2))
            .with_quick_bounds(&FailingProvider, QuickBoundConfig::default());
        markstar.init(0.0);

        assert_eq!(Ok(Status::Estimated), markstar.compute());
        assert_valid(markstar.values(), exact);
        assert_eq!(0, markstar.stats().quick_bound_skips);
        assert_same_bounds(plain_bounds(&instance), markstar.values());
    }
}

#[test_log::test]
fn a_failing_minimizer_is_harmless() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 6, 3);
        let exact = instance.exact_z(DEFAULT_RT);
        let provider = QuadraticProvider::new(&instance.evaluator);
        let cache = QuickBoundCache::new(&provider, 6, QuickBoundConfig::default())
            .with_minimizer(Box::new(FailingMinimizer));
        let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2))
            .with_quick_bound_cache(cache);
        markstar.init(0.0);

        assert_eq!(Ok(Status::Estimated), markstar.compute());
        assert_valid(markstar.values(), exact);
        assert_same_bounds(plain_bounds(&instance), markstar.values());
    }
}

#[test_log::test]
fn learned_corrections_never_overshoot() {
    for seed in SEEDS {
        let instance = ToyInstance::random(seed, 6, 2);
        let mut markstar = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2));
        markstar.init(0.0);
        assert_eq!(Ok(Status::Estimated), markstar.compute());

        let corrections = markstar.corrections();
        for conf in instance.space.enumerate() {
            let assignment: Vec<Option<usize>> = conf.iter().copied().map(Some).collect();
            let corrected = corrections.corrected_energy(&instance.minimized, &assignment);
            assert!(corrected <= instance.evaluator.energy_of(&conf) + 1e-9);
        }
        assert_eq!(0, markstar.negative_corrections());
    }
}

#[test_log::test]
fn a_shared_correction_store_is_reused_by_a_second_computation() {
    let instance = ToyInstance::random(21, 6, 2);
    let exact = instance.exact_z(DEFAULT_RT);
    let mut first = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2));
    first.init(0.0);
    first.compute().unwrap();
    let learned = first.corrections();

    let mut second = MarkStar::new(&instance.space, &instance.minimized, &instance.rigid, &instance.evaluator, config(2))
        .with_corrections(learned.clone());
    second.init(0.0);
    assert_eq!(Ok(Status::Estimated), second.compute());
    assert_valid(second.values(), exact);
    assert!(second.num_confs_evaluated() <= first.num_confs_evaluated());
    assert!(second.stats().partial_minimizations <= first.stats().partial_minimizations);
}
