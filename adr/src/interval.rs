// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 Joe Pearson
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Sets of half-open intervals with boolean algebra.

use std::cmp::Ordering;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Scalar usable as an interval bound.
pub trait IntervalBound: Copy + Ord + fmt::Display {
    const MIN_BOUND: Self;
    const MAX_BOUND: Self;
}

impl IntervalBound for i32 {
    const MIN_BOUND: Self = i32::MIN;
    const MAX_BOUND: Self = i32::MAX;
}

impl IntervalBound for u64 {
    const MIN_BOUND: Self = u64::MIN;
    const MAX_BOUND: Self = u64::MAX;
}

/// A half-open interval `[lower, upper)`, empty iff `lower >= upper`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Interval<T> {
    pub lower: T,
    pub upper: T,
}

impl<T: IntervalBound> Interval<T> {
    pub fn new(lower: T, upper: T) -> Self {
        Self { lower, upper }
    }

    pub fn is_empty(&self) -> bool {
        self.lower >= self.upper
    }

    pub fn contains(&self, v: T) -> bool {
        self.lower <= v && v < self.upper
    }
}

impl<T: IntervalBound> fmt::Display for Interval<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lower, self.upper)
    }
}

/// An ordered set of disjoint, non-adjacent half-open intervals.
///
/// Supports the usual boolean algebra; comparison is lexicographic over
/// the normalised interval list, giving the total order the DCT tables
/// rely on.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IntervalSet<T> {
    ivals: Vec<Interval<T>>,
}

impl<T: IntervalBound> IntervalSet<T> {
    pub fn empty() -> Self {
        Self { ivals: Vec::new() }
    }

    pub fn full() -> Self {
        Self::from_interval(Interval::new(T::MIN_BOUND, T::MAX_BOUND))
    }

    pub fn from_interval(iv: Interval<T>) -> Self {
        let mut s = Self::empty();
        if !iv.is_empty() {
            s.ivals.push(iv);
        }
        s
    }

    /// Normalises an arbitrary interval list: drops empties, sorts, merges
    /// overlapping and adjacent intervals.
    pub fn from_intervals(mut ivals: Vec<Interval<T>>) -> Self {
        ivals.retain(|iv| !iv.is_empty());
        ivals.sort();
        let mut out: Vec<Interval<T>> = Vec::with_capacity(ivals.len());
        for iv in ivals {
            match out.last_mut() {
                Some(last) if iv.lower <= last.upper => {
                    if iv.upper > last.upper {
                        last.upper = iv.upper;
                    }
                }
                _ => out.push(iv),
            }
        }
        Self { ivals: out }
    }

    pub fn is_empty(&self) -> bool {
        self.ivals.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ivals.len() == 1
            && self.ivals[0].lower == T::MIN_BOUND
            && self.ivals[0].upper == T::MAX_BOUND
    }

    pub fn contains(&self, v: T) -> bool {
        self.ivals.iter().any(|iv| iv.contains(v))
    }

    pub fn intervals(&self) -> &[Interval<T>] {
        &self.ivals
    }

    /// Lowest contained value, if any.
    pub fn lower_bound(&self) -> Option<T> {
        self.ivals.first().map(|iv| iv.lower)
    }

    pub fn union_with(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        let mut all = std::mem::take(&mut self.ivals);
        all.extend(other.ivals.iter().copied());
        *self = Self::from_intervals(all);
    }

    pub fn intersect_with(&mut self, other: &Self) {
        let mut out = Vec::new();
        let mut i = 0;
        let mut j = 0;
        while i < self.ivals.len() && j < other.ivals.len() {
            let a = self.ivals[i];
            let b = other.ivals[j];
            let lower = a.lower.max(b.lower);
            let upper = a.upper.min(b.upper);
            if lower < upper {
                out.push(Interval::new(lower, upper));
            }
            if a.upper <= b.upper {
                i += 1;
            } else {
                j += 1;
            }
        }
        self.ivals = out;
    }

    pub fn invert(&mut self) {
        let mut out = Vec::with_capacity(self.ivals.len() + 1);
        let mut lower = T::MIN_BOUND;
        for iv in &self.ivals {
            if lower < iv.lower {
                out.push(Interval::new(lower, iv.lower));
            }
            lower = iv.upper;
        }
        if lower < T::MAX_BOUND {
            out.push(Interval::new(lower, T::MAX_BOUND));
        }
        self.ivals = out;
    }

    pub fn subtract_with(&mut self, other: &Self) {
        let mut inv = other.clone();
        inv.invert();
        self.intersect_with(&inv);
    }

    pub fn xor_with(&mut self, other: &Self) {
        let mut only_self = self.clone();
        only_self.subtract_with(other);
        let mut only_other = other.clone();
        only_other.subtract_with(self);
        only_self.union_with(&only_other);
        *self = only_self;
    }

    /// Lexicographic comparison over the normalised interval list.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.ivals.cmp(&other.ivals)
    }
}

impl<T: IntervalBound> PartialOrd for IntervalSet<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl<T: IntervalBound> Ord for IntervalSet<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl<T: IntervalBound> fmt::Display for IntervalSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "empty");
        }
        for (i, iv) in self.ivals.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            iv.fmt(f)?;
        }
        Ok(())
    }
}

impl<T: IntervalBound> std::ops::BitAndAssign<&IntervalSet<T>> for IntervalSet<T> {
    fn bitand_assign(&mut self, rhs: &IntervalSet<T>) {
        self.intersect_with(rhs);
    }
}

impl<T: IntervalBound> std::ops::BitOrAssign<&IntervalSet<T>> for IntervalSet<T> {
    fn bitor_assign(&mut self, rhs: &IntervalSet<T>) {
        self.union_with(rhs);
    }
}

impl<T: IntervalBound> std::ops::SubAssign<&IntervalSet<T>> for IntervalSet<T> {
    fn sub_assign(&mut self, rhs: &IntervalSet<T>) {
        self.subtract_with(rhs);
    }
}

impl<T: IntervalBound> std::ops::BitXorAssign<&IntervalSet<T>> for IntervalSet<T> {
    fn bitxor_assign(&mut self, rhs: &IntervalSet<T>) {
        self.xor_with(rhs);
    }
}

impl crate::archive::Hibernate for IntervalSet<i32> {
    fn hibernate<A: crate::archive::Archive>(&mut self, ar: &mut A) -> crate::error::Result<()> {
        let mut n = self.ivals.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            let mut ivals = Vec::with_capacity(n as usize);
            for _ in 0..n {
                let mut lower = 0i32;
                let mut upper = 0i32;
                ar.io_i32(&mut lower)?;
                ar.io_i32(&mut upper)?;
                ivals.push(Interval::new(lower, upper));
            }
            *self = Self::from_intervals(ivals);
        } else {
            for iv in &mut self.ivals {
                ar.io_i32(&mut iv.lower)?;
                ar.io_i32(&mut iv.upper)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ivals: &[(i32, i32)]) -> IntervalSet<i32> {
        IntervalSet::from_intervals(
            ivals.iter().map(|&(l, u)| Interval::new(l, u)).collect(),
        )
    }

    #[test]
    fn normalisation_merges_adjacent() {
        let s = set(&[(0, 10), (10, 20), (30, 40), (35, 50)]);
        assert_eq!(s.intervals(), &[Interval::new(0, 20), Interval::new(30, 50)]);
    }

    #[test]
    fn intersect() {
        let mut a = set(&[(0, 100), (200, 300)]);
        a &= &set(&[(50, 250)]);
        assert_eq!(a, set(&[(50, 100), (200, 250)]));
    }

    #[test]
    fn invert_twice_is_identity() {
        let a = set(&[(0, 100), (200, 300)]);
        let mut b = a.clone();
        b.invert();
        assert!(!b.contains(50));
        assert!(b.contains(150));
        assert!(b.contains(i32::MIN));
        b.invert();
        assert_eq!(a, b);
    }

    #[test]
    fn subtract() {
        let mut a = set(&[(0, 100)]);
        a -= &set(&[(25, 50)]);
        assert_eq!(a, set(&[(0, 25), (50, 100)]));
    }

    #[test]
    fn xor() {
        let mut a = set(&[(0, 100)]);
        a ^= &set(&[(50, 150)]);
        assert_eq!(a, set(&[(0, 50), (100, 150)]));
    }

    #[test]
    fn full_and_empty() {
        assert!(IntervalSet::<i32>::full().is_full());
        assert!(IntervalSet::<i32>::empty().is_empty());
        let mut f = IntervalSet::<i32>::full();
        f.invert();
        assert!(f.is_empty());
    }

    #[test]
    fn total_order() {
        let a = set(&[(0, 100)]);
        let b = set(&[(0, 200)]);
        let c = set(&[(10, 20)]);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.compare(&a), std::cmp::Ordering::Equal);
    }
}
