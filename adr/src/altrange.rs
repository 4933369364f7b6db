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

//! Vertical limits.

use std::cmp::Ordering;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::interval::{Interval, IntervalSet};

/// Reference datum of a vertical limit.
///
/// `Qnh` and `Std` are absolute altitudes, `Height` is above ground.
/// `Floor` and `Ceiling` constrain relative to an airspace vertical limit
/// and additionally to the given altitude.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum AltMode {
    Qnh = 0,
    Std = 1,
    Height = 2,
    Floor = 3,
    Ceiling = 4,
    #[default]
    Invalid = 5,
}

impl AltMode {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Qnh,
            1 => Self::Std,
            2 => Self::Height,
            3 => Self::Floor,
            4 => Self::Ceiling,
            _ => Self::Invalid,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::Invalid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qnh => "ALT",
            Self::Std => "STD",
            Self::Height => "HGT",
            Self::Floor => "FLR",
            Self::Ceiling => "CEI",
            Self::Invalid => "INV",
        }
    }
}

impl fmt::Display for AltMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vertical band `[lower, upper]` in feet, each bound with its own mode.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AltRange {
    lower: i32,
    upper: i32,
    lower_mode: AltMode,
    upper_mode: AltMode,
}

impl Default for AltRange {
    fn default() -> Self {
        Self {
            lower: 0,
            upper: i32::MAX,
            lower_mode: AltMode::Invalid,
            upper_mode: AltMode::Invalid,
        }
    }
}

impl AltRange {
    pub fn new(lower: i32, lower_mode: AltMode, upper: i32, upper_mode: AltMode) -> Self {
        Self {
            lower,
            upper,
            lower_mode,
            upper_mode,
        }
    }

    /// A band between two standard altitudes.
    pub fn std(lower: i32, upper: i32) -> Self {
        Self::new(lower, AltMode::Std, upper, AltMode::Std)
    }

    pub fn lower(&self) -> i32 {
        self.lower
    }

    pub fn upper(&self) -> i32 {
        self.upper
    }

    pub fn lower_mode(&self) -> AltMode {
        self.lower_mode
    }

    pub fn upper_mode(&self) -> AltMode {
        self.upper_mode
    }

    pub fn set_lower(&mut self, alt: i32, mode: AltMode) {
        self.lower = alt;
        self.lower_mode = mode;
    }

    pub fn set_upper(&mut self, alt: i32, mode: AltMode) {
        self.upper = alt;
        self.upper_mode = mode;
    }

    pub fn is_lower_valid(&self) -> bool {
        self.lower_mode.is_valid()
    }

    pub fn is_upper_valid(&self) -> bool {
        self.upper_mode.is_valid()
    }

    pub fn is_valid(&self) -> bool {
        self.is_lower_valid() || self.is_upper_valid()
    }

    /// Lower bound, treating an invalid bound as unbounded below.
    pub fn lower_or_min(&self) -> i32 {
        if self.is_lower_valid() {
            self.lower
        } else {
            i32::MIN
        }
    }

    /// Upper bound, treating an invalid bound as unbounded above.
    pub fn upper_or_max(&self) -> i32 {
        if self.is_upper_valid() {
            self.upper
        } else {
            i32::MAX
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower_or_min() > self.upper_or_max()
    }

    pub fn is_inside(&self, alt: i32) -> bool {
        self.lower_or_min() <= alt && alt <= self.upper_or_max()
    }

    pub fn is_overlap(&self, alt0: i32, alt1: i32) -> bool {
        alt0 <= self.upper_or_max() && alt1 >= self.lower_or_min()
    }

    /// Narrows this band to the intersection with `other`.
    pub fn intersect(&mut self, other: &AltRange) {
        if other.is_lower_valid()
            && (!self.is_lower_valid() || other.lower > self.lower)
        {
            self.lower = other.lower;
            self.lower_mode = other.lower_mode;
        }
        if other.is_upper_valid()
            && (!self.is_upper_valid() || other.upper < self.upper)
        {
            self.upper = other.upper;
            self.upper_mode = other.upper_mode;
        }
    }

    /// Widens this band to cover `other`.
    pub fn merge(&mut self, other: &AltRange) {
        if other.lower_or_min() < self.lower_or_min() {
            self.lower = other.lower;
            self.lower_mode = other.lower_mode;
        }
        if other.upper_or_max() > self.upper_or_max() {
            self.upper = other.upper;
            self.upper_mode = other.upper_mode;
        }
    }

    /// Interval view `[lower, upper + 1)`. When neither bound is valid the
    /// result is empty unless `invalid_is_full`.
    pub fn interval(&self, invalid_is_full: bool) -> IntervalSet<i32> {
        if !self.is_valid() {
            return if invalid_is_full {
                IntervalSet::full()
            } else {
                IntervalSet::empty()
            };
        }
        let upper = self.upper_or_max();
        IntervalSet::from_interval(Interval::new(
            self.lower_or_min(),
            if upper == i32::MAX { upper } else { upper + 1 },
        ))
    }

    pub(crate) fn mode_byte(&self) -> u8 {
        (self.lower_mode as u8) | ((self.upper_mode as u8) << 4)
    }

    pub(crate) fn set_mode_byte(&mut self, v: u8) {
        self.lower_mode = AltMode::from_byte(v & 0x0f);
        self.upper_mode = AltMode::from_byte(v >> 4);
    }
}

impl crate::archive::Hibernate for AltRange {
    fn hibernate<A: crate::archive::Archive>(&mut self, ar: &mut A) -> crate::error::Result<()> {
        ar.io_i32(&mut self.lower)?;
        ar.io_i32(&mut self.upper)?;
        let mut mode = self.mode_byte();
        ar.io_u8(&mut mode)?;
        self.set_mode_byte(mode);
        Ok(())
    }
}

impl fmt::Display for AltRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})..{}({})",
            self.lower, self.lower_mode, self.upper, self.upper_mode
        )
    }
}

/// Altitude availability per direction: index 0 forward, 1 backward.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BidirAltRange {
    set: [IntervalSet<i32>; 2],
}

impl BidirAltRange {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            set: [IntervalSet::full(), IntervalSet::full()],
        }
    }

    pub fn from_sets(forward: IntervalSet<i32>, backward: IntervalSet<i32>) -> Self {
        Self {
            set: [forward, backward],
        }
    }

    /// Both directions set to the same interval `[alt0, alt1)`.
    pub fn from_interval(alt0: i32, alt1: i32) -> Self {
        let s = IntervalSet::from_interval(Interval::new(alt0, alt1));
        Self {
            set: [s.clone(), s],
        }
    }

    /// Both directions set to the band of an [`AltRange`].
    pub fn from_altrange(ar: &AltRange) -> Self {
        let s = ar.interval(false);
        Self {
            set: [s.clone(), s],
        }
    }

    pub fn dir(&self, index: usize) -> &IntervalSet<i32> {
        &self.set[usize::from(index != 0)]
    }

    pub fn dir_mut(&mut self, index: usize) -> &mut IntervalSet<i32> {
        &mut self.set[usize::from(index != 0)]
    }

    pub fn is_empty(&self) -> bool {
        self.set[0].is_empty() && self.set[1].is_empty()
    }

    pub fn is_inside(&self, index: usize, alt: i32) -> bool {
        self.dir(index).contains(alt)
    }

    pub fn set_empty(&mut self) {
        self.set = [IntervalSet::empty(), IntervalSet::empty()];
    }

    pub fn set_full(&mut self) {
        self.set = [IntervalSet::full(), IntervalSet::full()];
    }

    pub fn invert(&mut self) {
        self.set[0].invert();
        self.set[1].invert();
    }

    pub fn swap_dir(&mut self) {
        self.set.swap(0, 1);
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        self.set[0]
            .compare(&other.set[0])
            .then_with(|| self.set[1].compare(&other.set[1]))
    }
}

impl std::ops::BitAndAssign<&BidirAltRange> for BidirAltRange {
    fn bitand_assign(&mut self, rhs: &BidirAltRange) {
        self.set[0] &= &rhs.set[0];
        self.set[1] &= &rhs.set[1];
    }
}

impl std::ops::BitOrAssign<&BidirAltRange> for BidirAltRange {
    fn bitor_assign(&mut self, rhs: &BidirAltRange) {
        self.set[0] |= &rhs.set[0];
        self.set[1] |= &rhs.set[1];
    }
}

impl std::ops::BitXorAssign<&BidirAltRange> for BidirAltRange {
    fn bitxor_assign(&mut self, rhs: &BidirAltRange) {
        self.set[0] ^= &rhs.set[0];
        self.set[1] ^= &rhs.set[1];
    }
}

impl std::ops::SubAssign<&BidirAltRange> for BidirAltRange {
    fn sub_assign(&mut self, rhs: &BidirAltRange) {
        self.set[0] -= &rhs.set[0];
        self.set[1] -= &rhs.set[1];
    }
}

impl crate::archive::Hibernate for BidirAltRange {
    fn hibernate<A: crate::archive::Archive>(&mut self, ar: &mut A) -> crate::error::Result<()> {
        self.set[0].hibernate(ar)?;
        self.set[1].hibernate(ar)
    }
}

impl PartialOrd for BidirAltRange {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for BidirAltRange {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for BidirAltRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.set[0], self.set[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded_but_invalid() {
        let ar = AltRange::default();
        assert!(!ar.is_valid());
        assert!(ar.is_inside(0));
        assert!(ar.is_inside(66000));
        assert!(ar.interval(false).is_empty());
        assert!(ar.interval(true).is_full());
    }

    #[test]
    fn intersect_narrows() {
        let mut a = AltRange::std(6000, 24500);
        a.intersect(&AltRange::std(10000, 66000));
        assert_eq!(a.lower(), 10000);
        assert_eq!(a.upper(), 24500);
    }

    #[test]
    fn mode_byte_round_trip() {
        let ar = AltRange::new(500, AltMode::Height, 19500, AltMode::Std);
        let mut back = AltRange::default();
        back.set_mode_byte(ar.mode_byte());
        assert_eq!(back.lower_mode(), AltMode::Height);
        assert_eq!(back.upper_mode(), AltMode::Std);
    }

    #[test]
    fn bidir_ops() {
        let mut a = BidirAltRange::full();
        let forbid = BidirAltRange::from_interval(0, 10000);
        let mut allowed = forbid.clone();
        allowed.invert();
        a &= &allowed;
        assert!(!a.is_inside(0, 5000));
        assert!(a.is_inside(0, 15000));
        assert!(a.is_inside(1, 15000));
        a.swap_dir();
        assert!(a.is_inside(0, 15000));
    }

    #[test]
    fn bidir_total_order() {
        let a = BidirAltRange::from_interval(0, 10000);
        let b = BidirAltRange::from_interval(0, 20000);
        assert!(a < b);
        assert_eq!(a.compare(&a), Ordering::Equal);
    }
}
