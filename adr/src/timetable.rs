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

//! Applicability time tables.
//!
//! A [`TimeTable`] is a disjunction of entries; each entry is the
//! conjunction of a validity interval, a weekday pattern and a daily
//! time-of-day window. The distinguished timestamps `0` and `u64::MAX`
//! mean unbounded in the past and future.

use std::collections::BTreeSet;
use std::fmt;

use crate::geom::Coord;

/// Monotonic epoch seconds.
pub type Timestamp = u64;

pub const UNBOUNDED_PAST: Timestamp = 0;
pub const UNBOUNDED_FUTURE: Timestamp = u64::MAX;

const SECONDS_PER_DAY: u64 = 86_400;
const ALL_WEEKDAYS: u8 = 0x7f;

/// True iff the half-open intervals `[a0, a1)` and `[b0, b1)` overlap.
pub fn is_overlap(a0: Timestamp, a1: Timestamp, b0: Timestamp, b1: Timestamp) -> bool {
    a0 < a1 && b0 < b1 && b1 > a0 && b0 < a1
}

/// Weekday index of a timestamp, `0` = Monday .. `6` = Sunday.
fn weekday(t: Timestamp) -> u8 {
    ((t / SECONDS_PER_DAY + 3) % 7) as u8
}

/// Evaluation context for a time table: an instant plus the coordinate the
/// rule is anchored at (kept for interface parity with location-dependent
/// tables such as sunrise/sunset, which external collaborators resolve).
#[derive(Copy, Clone, Debug)]
pub struct TimeTableEval {
    time: Timestamp,
    coord: Coord,
}

impl TimeTableEval {
    pub fn new(time: Timestamp, coord: Coord) -> Self {
        Self { time, coord }
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }
}

impl fmt::Display for TimeTableEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", super::format_time(self.time), self.coord)
    }
}

/// One conjunction of interval, weekday pattern and daily window.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct TimeTableEntry {
    start: Timestamp,
    end: Timestamp,
    weekdays: u8,
    /// Seconds of day `[begin, end)`; `None` is the whole day.
    daytime: Option<(u32, u32)>,
}

impl TimeTableEntry {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end,
            weekdays: ALL_WEEKDAYS,
            daytime: None,
        }
    }

    pub fn with_weekdays(mut self, weekdays: u8) -> Self {
        self.weekdays = weekdays & ALL_WEEKDAYS;
        self
    }

    pub fn with_daytime(mut self, begin: u32, end: u32) -> Self {
        self.daytime = Some((begin, end.min(SECONDS_PER_DAY as u32)));
        self
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn weekdays(&self) -> u8 {
        self.weekdays
    }

    pub fn daytime(&self) -> Option<(u32, u32)> {
        self.daytime
    }

    /// An entry restricted by neither weekday nor daily window.
    pub fn is_plain(&self) -> bool {
        self.weekdays == ALL_WEEKDAYS && self.daytime.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
            || self.weekdays == 0
            || self.daytime.is_some_and(|(b, e)| b >= e)
    }

    pub fn is_inside(&self, t: Timestamp) -> bool {
        if t < self.start || t >= self.end {
            return false;
        }
        if self.weekdays & (1 << weekday(t)) == 0 {
            return false;
        }
        match self.daytime {
            None => true,
            Some((b, e)) => {
                let sod = (t % SECONDS_PER_DAY) as u32;
                b <= sod && sod < e
            }
        }
    }

    /// Conjunction with another entry, `None` when disjoint.
    fn intersect(&self, other: &TimeTableEntry) -> Option<TimeTableEntry> {
        let e = TimeTableEntry {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
            weekdays: self.weekdays & other.weekdays,
            daytime: match (self.daytime, other.daytime) {
                (None, d) | (d, None) => d,
                (Some((b0, e0)), Some((b1, e1))) => Some((b0.max(b1), e0.min(e1))),
            },
        };
        if e.is_empty() {
            None
        } else {
            Some(e)
        }
    }

    /// Complement as a disjunction of entries.
    fn complement(&self) -> Vec<TimeTableEntry> {
        if self.is_empty() {
            return vec![TimeTableEntry::new(UNBOUNDED_PAST, UNBOUNDED_FUTURE)];
        }
        let mut out = Vec::new();
        if self.start > UNBOUNDED_PAST {
            out.push(TimeTableEntry::new(UNBOUNDED_PAST, self.start));
        }
        if self.end < UNBOUNDED_FUTURE {
            out.push(TimeTableEntry::new(self.end, UNBOUNDED_FUTURE));
        }
        let inv_weekdays = !self.weekdays & ALL_WEEKDAYS;
        if inv_weekdays != 0 {
            out.push(TimeTableEntry::new(self.start, self.end).with_weekdays(inv_weekdays));
        }
        if let Some((b, e)) = self.daytime {
            if b > 0 {
                out.push(
                    TimeTableEntry::new(self.start, self.end)
                        .with_weekdays(self.weekdays)
                        .with_daytime(0, b),
                );
            }
            if u64::from(e) < SECONDS_PER_DAY {
                out.push(
                    TimeTableEntry::new(self.start, self.end)
                        .with_weekdays(self.weekdays)
                        .with_daytime(e, SECONDS_PER_DAY as u32),
                );
            }
        }
        out
    }
}

/// A disjunction of [`TimeTableEntry`] values.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct TimeTable {
    entries: Vec<TimeTableEntry>,
}

impl TimeTable {
    /// The table that applies at every instant.
    pub fn always() -> Self {
        Self {
            entries: vec![TimeTableEntry::new(UNBOUNDED_PAST, UNBOUNDED_FUTURE)],
        }
    }

    /// The table that never applies.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: Vec<TimeTableEntry>) -> Self {
        let mut tt = Self { entries };
        tt.simplify();
        tt
    }

    pub fn entries(&self) -> &[TimeTableEntry] {
        &self.entries
    }

    pub fn push(&mut self, entry: TimeTableEntry) {
        self.entries.push(entry);
    }

    pub fn is_never(&self) -> bool {
        self.entries.iter().all(TimeTableEntry::is_empty)
    }

    pub fn is_always(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.is_plain() && e.start == UNBOUNDED_PAST && e.end == UNBOUNDED_FUTURE)
    }

    pub fn is_inside(&self, tte: &TimeTableEval) -> bool {
        self.entries.iter().any(|e| e.is_inside(tte.time()))
    }

    /// True iff every instant of `[t0, t1)` is covered by plain entries.
    pub fn covers(&self, t0: Timestamp, t1: Timestamp) -> bool {
        if t0 >= t1 {
            return true;
        }
        let mut plain: Vec<(Timestamp, Timestamp)> = self
            .entries
            .iter()
            .filter(|e| e.is_plain() && !e.is_empty())
            .map(|e| (e.start, e.end))
            .collect();
        plain.sort_unstable();
        let mut at = t0;
        for (s, e) in plain {
            if s > at {
                break;
            }
            at = at.max(e);
            if at >= t1 {
                return true;
            }
        }
        false
    }

    /// Switch points of the table.
    pub fn discontinuities(&self) -> BTreeSet<Timestamp> {
        let mut r = BTreeSet::new();
        for e in &self.entries {
            if e.is_empty() {
                continue;
            }
            r.insert(e.start);
            r.insert(e.end);
        }
        r
    }

    /// Restricts the table to `[t0, t1)`.
    pub fn limit(&mut self, t0: Timestamp, t1: Timestamp) {
        for e in &mut self.entries {
            e.start = e.start.max(t0);
            e.end = e.end.min(t1);
        }
        self.entries.retain(|e| !e.is_empty());
    }

    pub fn intersect_with(&mut self, other: &TimeTable) {
        let mut out = Vec::new();
        for a in &self.entries {
            for b in &other.entries {
                if let Some(e) = a.intersect(b) {
                    out.push(e);
                }
            }
        }
        self.entries = out;
        self.simplify();
    }

    /// Complement over the time axis.
    pub fn invert(&mut self) {
        let live: Vec<&TimeTableEntry> =
            self.entries.iter().filter(|e| !e.is_empty()).collect();
        if live.is_empty() {
            *self = Self::always();
            return;
        }
        let mut acc = TimeTable {
            entries: live[0].complement(),
        };
        for e in &live[1..] {
            let c = TimeTable {
                entries: e.complement(),
            };
            acc.intersect_with(&c);
        }
        acc.simplify();
        *self = acc;
    }

    /// Splits entries at the given instants so no entry spans one.
    pub fn split(&mut self, times: &BTreeSet<Timestamp>) {
        let mut out = Vec::with_capacity(self.entries.len());
        for e in &self.entries {
            let mut start = e.start;
            for &t in times.range((
                std::ops::Bound::Excluded(e.start),
                std::ops::Bound::Excluded(e.end),
            )) {
                let mut head = e.clone();
                head.start = start;
                head.end = t;
                out.push(head);
                start = t;
            }
            let mut tail = e.clone();
            tail.start = start;
            out.push(tail);
        }
        self.entries = out;
        self.entries.retain(|e| !e.is_empty());
    }

    /// Drops empty entries and merges overlapping plain ones.
    pub fn simplify(&mut self) {
        self.entries.retain(|e| !e.is_empty());
        let (mut plain, other): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(TimeTableEntry::is_plain);
        plain.sort_by_key(|e| (e.start, e.end));
        let mut merged: Vec<TimeTableEntry> = Vec::with_capacity(plain.len());
        for e in plain {
            match merged.last_mut() {
                Some(last) if e.start <= last.end => {
                    last.end = last.end.max(e.end);
                }
                _ => merged.push(e),
            }
        }
        merged.extend(other);
        self.entries = merged;
    }
}

impl crate::archive::Hibernate for TimeTableEntry {
    fn hibernate<A: crate::archive::Archive>(&mut self, ar: &mut A) -> crate::error::Result<()> {
        ar.io_u64(&mut self.start)?;
        ar.io_u64(&mut self.end)?;
        ar.io_u8(&mut self.weekdays)?;
        let mut has_daytime = self.daytime.is_some();
        ar.io_bool(&mut has_daytime)?;
        if ar.is_load() {
            self.daytime = if has_daytime {
                let mut begin = 0u32;
                let mut end = 0u32;
                ar.io_u32(&mut begin)?;
                ar.io_u32(&mut end)?;
                Some((begin, end))
            } else {
                None
            };
        } else if let Some((begin, end)) = &mut self.daytime {
            ar.io_u32(begin)?;
            ar.io_u32(end)?;
        }
        Ok(())
    }
}

impl crate::archive::Hibernate for TimeTable {
    fn hibernate<A: crate::archive::Archive>(&mut self, ar: &mut A) -> crate::error::Result<()> {
        let mut n = self.entries.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.entries.clear();
            self.entries.resize(n as usize, TimeTableEntry::default());
        }
        for e in &mut self.entries {
            e.hibernate(ar)?;
        }
        Ok(())
    }
}

impl fmt::Display for TimeTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            return write!(f, "never");
        }
        if self.is_always() {
            return write!(f, "always");
        }
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(
                f,
                "{}-{}",
                super::format_time(e.start),
                super::format_time(e.end)
            )?;
            if e.weekdays != ALL_WEEKDAYS {
                write!(f, " wd{:07b}", e.weekdays)?;
            }
            if let Some((b, en)) = e.daytime {
                write!(f, " {:02}:{:02}-{:02}:{:02}", b / 3600, b / 60 % 60, en / 3600, en / 60 % 60)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2014-01-06 00:00:00 UTC was a Monday
    const MONDAY: Timestamp = 1_388_966_400;

    #[test]
    fn weekday_of_epoch() {
        // 1970-01-01 was a Thursday
        assert_eq!(weekday(0), 3);
        assert_eq!(weekday(MONDAY), 0);
    }

    #[test]
    fn always_and_never() {
        let tte = TimeTableEval::new(MONDAY, Coord::INVALID);
        assert!(TimeTable::always().is_inside(&tte));
        assert!(!TimeTable::never().is_inside(&tte));
        assert!(TimeTable::always().is_always());
        assert!(TimeTable::never().is_never());
    }

    #[test]
    fn weekday_pattern() {
        // Monday through Friday
        let tt = TimeTable::from_entries(vec![TimeTableEntry::new(
            UNBOUNDED_PAST,
            UNBOUNDED_FUTURE,
        )
        .with_weekdays(0b0011111)]);
        assert!(tt.is_inside(&TimeTableEval::new(MONDAY, Coord::INVALID)));
        let saturday = MONDAY + 5 * SECONDS_PER_DAY;
        assert!(!tt.is_inside(&TimeTableEval::new(saturday, Coord::INVALID)));
    }

    #[test]
    fn daytime_window() {
        let tt = TimeTable::from_entries(vec![TimeTableEntry::new(
            UNBOUNDED_PAST,
            UNBOUNDED_FUTURE,
        )
        .with_daytime(6 * 3600, 18 * 3600)]);
        assert!(tt.is_inside(&TimeTableEval::new(MONDAY + 12 * 3600, Coord::INVALID)));
        assert!(!tt.is_inside(&TimeTableEval::new(MONDAY + 20 * 3600, Coord::INVALID)));
    }

    #[test]
    fn invert_plain() {
        let mut tt = TimeTable::from_entries(vec![TimeTableEntry::new(1000, 2000)]);
        tt.invert();
        assert!(tt.is_inside(&TimeTableEval::new(500, Coord::INVALID)));
        assert!(!tt.is_inside(&TimeTableEval::new(1500, Coord::INVALID)));
        assert!(tt.is_inside(&TimeTableEval::new(2500, Coord::INVALID)));
        tt.invert();
        assert!(tt.is_inside(&TimeTableEval::new(1500, Coord::INVALID)));
        assert!(!tt.is_inside(&TimeTableEval::new(2500, Coord::INVALID)));
    }

    #[test]
    fn invert_pattern_is_complement() {
        let tt = TimeTable::from_entries(vec![TimeTableEntry::new(
            MONDAY,
            MONDAY + 14 * SECONDS_PER_DAY,
        )
        .with_weekdays(0b0011111)
        .with_daytime(6 * 3600, 18 * 3600)]);
        let mut inv = tt.clone();
        inv.invert();
        for probe in (0..21).map(|d| MONDAY - 3 * SECONDS_PER_DAY + d * SECONDS_PER_DAY + 7 * 3600)
        {
            let tte = TimeTableEval::new(probe, Coord::INVALID);
            assert_ne!(tt.is_inside(&tte), inv.is_inside(&tte), "at {probe}");
        }
        let night = TimeTableEval::new(MONDAY + 2 * 3600, Coord::INVALID);
        assert_ne!(tt.is_inside(&night), inv.is_inside(&night));
    }

    #[test]
    fn covers_needs_plain_entries() {
        let tt = TimeTable::from_entries(vec![
            TimeTableEntry::new(0, 1000),
            TimeTableEntry::new(900, 2500),
        ]);
        assert!(tt.covers(100, 2000));
        assert!(!tt.covers(100, 3000));
        let patterned = TimeTable::from_entries(vec![
            TimeTableEntry::new(0, 5000).with_weekdays(0b1),
        ]);
        assert!(!patterned.covers(100, 200));
    }

    #[test]
    fn split_at_discontinuities() {
        let mut tt = TimeTable::from_entries(vec![TimeTableEntry::new(0, 3000)]);
        let cuts: BTreeSet<Timestamp> = [1000u64, 2000, 5000].into_iter().collect();
        tt.split(&cuts);
        let bounds: Vec<(Timestamp, Timestamp)> =
            tt.entries().iter().map(|e| (e.start(), e.end())).collect();
        assert_eq!(bounds, vec![(0, 1000), (1000, 2000), (2000, 3000)]);
    }

    #[test]
    fn limit_clamps() {
        let mut tt = TimeTable::always();
        tt.limit(1000, 2000);
        assert!(!tt.is_inside(&TimeTableEval::new(500, Coord::INVALID)));
        assert!(tt.is_inside(&TimeTableEval::new(1500, Coord::INVALID)));
        assert_eq!(
            tt.discontinuities().into_iter().collect::<Vec<_>>(),
            vec![1000, 2000]
        );
    }
}
