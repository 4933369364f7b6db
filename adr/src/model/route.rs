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

//! ATS routes, their segments and the ICAO standard cruising level
//! scheme.

use crate::altrange::AltRange;
use crate::archive::{Archive, Hibernate};
use crate::error::Result;
use crate::geom::Rect;
use crate::id::Link;
use crate::model::INVALID_ELEV;
use crate::timetable::{TimeTable, Timestamp};

/// An identified ATS route; its geometry lives in the segments that
/// reference it.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct RouteSlice {
    pub ident: String,
}

impl Hibernate for RouteSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)
    }
}

/// Shared shape of everything that connects two points along a path:
/// airway segments and SID/STAR legs.
#[derive(Clone, PartialEq, Debug)]
pub struct SegmentCore {
    pub start: Link,
    pub end: Link,
    /// The route (or procedure) this segment belongs to.
    pub route: Link,
    pub altrange: AltRange,
    /// Highest terrain under the segment, feet; invalid when not computed.
    pub terrain_elev: i32,
    /// Highest terrain within the 5 nm corridor, feet.
    pub corridor_elev: i32,
}

impl Default for SegmentCore {
    fn default() -> Self {
        Self {
            start: Link::default(),
            end: Link::default(),
            route: Link::default(),
            altrange: AltRange::default(),
            terrain_elev: INVALID_ELEV,
            corridor_elev: INVALID_ELEV,
        }
    }
}

impl SegmentCore {
    pub fn is_terrain_valid(&self) -> bool {
        self.terrain_elev != INVALID_ELEV
    }

    /// Bounding box over the resolved endpoints at `t`.
    pub fn bbox(&self, t: Timestamp) -> Rect {
        let mut bbox = Rect::INVALID;
        for link in [&self.start, &self.end] {
            if let Some(obj) = link.obj() {
                if let Some(coord) = obj.slice_at(t).and_then(|ts| ts.payload().coord()) {
                    bbox = bbox.extend(coord);
                }
            }
        }
        bbox
    }
}

impl Hibernate for SegmentCore {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_link(&mut self.start)?;
        ar.io_link(&mut self.end)?;
        ar.io_link(&mut self.route)?;
        self.altrange.hibernate(ar)?;
        ar.io_i32(&mut self.terrain_elev)?;
        ar.io_i32(&mut self.corridor_elev)
    }
}

/// Whether an availability entry opens or closes its band.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum AvailabilityStatus {
    Closed = 0,
    Open = 1,
    /// Open subject to conditional availability (AUP activation).
    Conditional = 2,
    #[default]
    Invalid = 3,
}

impl AvailabilityStatus {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Closed,
            1 => Self::Open,
            2 => Self::Conditional,
            _ => Self::Invalid,
        }
    }
}

/// One availability entry of a route segment: an altitude band usable in
/// one direction, within a time table, optionally tied to a standard
/// level column.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SegmentAvailability {
    pub altrange: AltRange,
    pub status: AvailabilityStatus,
    /// False is along the segment (start to end), true against it.
    pub backward: bool,
    pub timetable: TimeTable,
    pub levels: Link,
}

impl SegmentAvailability {
    pub fn is_usable(&self) -> bool {
        matches!(
            self.status,
            AvailabilityStatus::Open | AvailabilityStatus::Conditional
        )
    }
}

impl Hibernate for SegmentAvailability {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.altrange.hibernate(ar)?;
        let mut st = self.status as u8;
        ar.io_u8(&mut st)?;
        self.status = AvailabilityStatus::from_byte(st);
        ar.io_bool(&mut self.backward)?;
        self.timetable.hibernate(ar)?;
        ar.io_link(&mut self.levels)
    }
}

/// A cruising level entry of a route segment.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SegmentLevel {
    pub altrange: AltRange,
}

impl Hibernate for SegmentLevel {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.altrange.hibernate(ar)
    }
}

/// State of an airway segment over one validity interval.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct RouteSegmentSlice {
    pub core: SegmentCore,
    pub availability: Vec<SegmentAvailability>,
    pub levels: Vec<SegmentLevel>,
}

impl RouteSegmentSlice {
    pub fn is_forward(&self) -> bool {
        self.availability
            .iter()
            .any(|a| !a.backward && a.is_usable())
    }

    pub fn is_backward(&self) -> bool {
        self.availability
            .iter()
            .any(|a| a.backward && a.is_usable())
    }

    /// Usable altitude band per direction at instant `t`.
    pub fn altitudes(&self, t: Timestamp) -> crate::altrange::BidirAltRange {
        use crate::timetable::TimeTableEval;

        let mut r = crate::altrange::BidirAltRange::empty();
        let tte = TimeTableEval::new(t, crate::geom::Coord::INVALID);
        for a in &self.availability {
            if !a.is_usable() {
                continue;
            }
            if !a.timetable.is_never() && !a.timetable.is_inside(&tte) {
                continue;
            }
            let band = a.altrange.interval(false);
            *r.dir_mut(usize::from(a.backward)) |= &band;
        }
        r
    }
}

impl Hibernate for RouteSegmentSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.core.hibernate(ar)?;
        let mut n = self.availability.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.availability.clear();
            self.availability
                .resize(n as usize, SegmentAvailability::default());
        }
        for a in &mut self.availability {
            a.hibernate(ar)?;
        }
        let mut n = self.levels.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.levels.clear();
            self.levels.resize(n as usize, SegmentLevel::default());
        }
        for l in &mut self.levels {
            l.hibernate(ar)?;
        }
        Ok(())
    }
}

/// Direction series of a standard level column.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum LevelSeries {
    Even = 0,
    Odd = 1,
    Unidirectional = 2,
    #[default]
    Invalid = 3,
}

impl LevelSeries {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Even,
            1 => Self::Odd,
            2 => Self::Unidirectional,
            _ => Self::Invalid,
        }
    }
}

/// One column of the ICAO standard cruising level scheme.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StandardLevelColumnSlice {
    pub series: LevelSeries,
    /// Levels in feet, ascending.
    pub levels: Vec<i32>,
}

impl Hibernate for StandardLevelColumnSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        let mut s = self.series as u8;
        ar.io_u8(&mut s)?;
        self.series = LevelSeries::from_byte(s);
        let mut n = self.levels.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.levels.clear();
            self.levels.resize(n as usize, 0);
        }
        for l in &mut self.levels {
            ar.io_i32(l)?;
        }
        Ok(())
    }
}

/// The table grouping the level columns of one scheme.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StandardLevelTableSlice {
    pub ident: String,
    pub columns: crate::id::LinkSet,
}

impl Hibernate for StandardLevelTableSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        ar.io_link_set(&mut self.columns)
    }
}
