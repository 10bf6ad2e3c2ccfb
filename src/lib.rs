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

//! # MARK*
//! This crate computes provable bounds on the partition function of a
//! discrete conformation space. A conformation assigns one option (residue
//! conformation) to each position of the space, and its energy can only be
//! known exactly by running an expensive continuous minimization. The
//! partition function is the sum of the Boltzmann weights `exp(-E / RT)` of
//! all conformations.
//!
//! Rather than evaluating every conformation, the engine runs an anytime
//! branch-and-bound search over partial assignments. Each node of the search
//! tree carries a lower and an upper bound on the energies of the
//! conformations below it; these translate into an upper and a lower bound
//! on the partition function of the subtree. Rounds after rounds, the engine
//! refines the nodes which contribute the most to the gap between the global
//! bounds, until their relative gap (epsilon) falls below a target.
//!
//! ## Side benefit
//! As a side benefit, the engine learns how wrong the pairwise energy
//! estimates are on small tuples of positions (corrections), which tightens
//! the bounds of every conformation comprising those tuples without
//! evaluating them. Those corrections can be shared among computations.
//!
//! ## Quick Example
//! The following example bounds the partition function of a small toy
//! instance (see `test_utils`) up to a relative gap of 1%. Your own
//! conformation space, energy matrices and evaluator only need to implement
//! the `ConfSpace`, `EnergyMatrix` and `EnergyEvaluator` traits.
//! ```
//! use markstar::*;
//! use markstar::test_utils::ToyInstance;
//!
//! let instance = ToyInstance::random(7, 5, 3);
//! let config = MarkStarConfigBuilder::default()
//!     .nb_threads(2)
//!     .build()
//!     .unwrap();
//!
//! let mut markstar = MarkStar::new(
//!     &instance.space,
//!     &instance.minimized,
//!     &instance.rigid,
//!     &instance.evaluator,
//!     config);
//!
//! markstar.init(0.01);
//! let status = markstar.compute().unwrap();
//! let values = markstar.values();
//!
//! let exact = instance.exact_z(DEFAULT_RT);
//! assert_eq!(Status::Estimated, status);
//! assert!(values.qstar.ln() <= exact.ln() + 1e-9);
//! assert!(exact.ln() <= values.pstar.ln() + 1e-9);
//! assert!(values.effective_epsilon() <= 0.01);
//! ```

mod common;
mod abstraction;
mod implementation;

pub mod test_utils;

pub use common::*;
pub use abstraction::*;
pub use implementation::*;
