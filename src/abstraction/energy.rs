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

//! This module defines the abstraction of a pairwise energy matrix.

use crate::RcTuple;

/// A pairwise energy matrix approximates the energy of a conformation as the
/// sum of one-body terms and pairwise interaction terms.
///
/// A computation always uses two such matrices: the *minimized* one whose
/// terms are computed with flexibility (hence lower bounds of the true
/// energies), and the *rigid* one whose terms are computed without it (hence
/// upper bounds of the true energies).
pub trait EnergyMatrix {
    /// The energy of option `rc` at position `pos`
    fn one_body(&self, pos: usize, rc: usize) -> f64;
    /// The interaction energy between `pos1 = rc1` and `pos2 = rc2`
    fn pairwise(&self, pos1: usize, rc1: usize, pos2: usize, rc2: usize) -> f64;

    /// The energy of the assigned part of a (partial) conformation
    fn conf_energy(&self, assignment: &[Option<usize>]) -> f64 {
        let mut energy = 0.0;
        for (pos1, rc1) in assignment.iter().enumerate() {
            if let Some(rc1) = rc1 {
                energy += self.one_body(pos1, *rc1);
                for (pos2, rc2) in assignment.iter().enumerate().take(pos1) {
                    if let Some(rc2) = rc2 {
                        energy += self.pairwise(pos1, *rc1, pos2, *rc2);
                    }
                }
            }
        }
        energy
    }
    /// The energy of the tuple seen as a conformation of its own
    fn internal_energy(&self, tuple: &RcTuple) -> f64 {
        let mut energy = 0.0;
        for (i, a) in tuple.iter().enumerate() {
            energy += self.one_body(a.pos, a.rc);
            for b in tuple.iter().take(i) {
                energy += self.pairwise(a.pos, a.rc, b.pos, b.rc);
            }
        }
        energy
    }
}
