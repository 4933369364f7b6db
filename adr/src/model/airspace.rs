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

//! Airspace volumes.

use geo::{Contains, Intersects};

use crate::altrange::AltRange;
use crate::archive::{Archive, Hibernate};
use crate::error::Result;
use crate::geom::{Coord, Rect};
use crate::interval::IntervalSet;
use crate::timetable::{TimeTable, TimeTableEval};

/// State of an airspace volume over one validity interval.
///
/// The horizontal extent is one or more simple polygons; the vertical
/// extent is an [`AltRange`]. The time table gates applicability of the
/// volume itself (conditional activation comes from the AUP feed, not
/// from here).
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AirspaceSlice {
    pub ident: String,
    pub name: String,
    /// Exterior rings; holes are not modelled.
    pub polygons: Vec<Vec<Coord>>,
    pub altrange: AltRange,
    pub timetable: TimeTable,
}

impl AirspaceSlice {
    pub fn bbox(&self) -> Rect {
        let mut bbox = Rect::INVALID;
        for ring in &self.polygons {
            for &pt in ring {
                bbox = bbox.extend(pt);
            }
        }
        bbox
    }

    fn geo_polygons(&self) -> impl Iterator<Item = geo::Polygon<f64>> + '_ {
        self.polygons.iter().map(|ring| {
            geo::Polygon::new(
                geo::LineString::from(
                    ring.iter()
                        .map(|c| geo::Coord {
                            x: c.lon_deg(),
                            y: c.lat_deg(),
                        })
                        .collect::<Vec<_>>(),
                ),
                vec![],
            )
        })
    }

    fn contains_coord(&self, pt: Coord) -> bool {
        if pt.is_invalid() {
            return false;
        }
        let p = geo::Point::from(pt);
        self.geo_polygons().any(|poly| poly.contains(&p))
    }

    fn crosses_segment(&self, p0: Coord, p1: Coord) -> bool {
        if p0.is_invalid() || p1.is_invalid() {
            return false;
        }
        let line = geo::Line::new(
            geo::Coord {
                x: p0.lon_deg(),
                y: p0.lat_deg(),
            },
            geo::Coord {
                x: p1.lon_deg(),
                y: p1.lat_deg(),
            },
        );
        self.geo_polygons().any(|poly| poly.intersects(&line))
    }

    /// True iff the point lies inside the volume at the evaluation instant
    /// with `alt` inside both the volume's band and `constraint`.
    pub fn is_inside(&self, tte: &TimeTableEval, alt: i32, constraint: &AltRange) -> bool {
        if !self.timetable.is_never() && !self.timetable.is_inside(tte) {
            return false;
        }
        if alt != crate::model::ALT_IGNORE
            && (!self.altrange.is_inside(alt) || !constraint.is_inside(alt))
        {
            return false;
        }
        self.contains_coord(tte.coord())
    }

    /// True iff the leg from the evaluation point to `to` enters or
    /// overlaps the volume with `alt` admissible.
    pub fn is_intersect(
        &self,
        tte: &TimeTableEval,
        to: Coord,
        alt: i32,
        constraint: &AltRange,
    ) -> bool {
        if !self.timetable.is_never() && !self.timetable.is_inside(tte) {
            return false;
        }
        if alt != crate::model::ALT_IGNORE
            && (!self.altrange.is_inside(alt) || !constraint.is_inside(alt))
        {
            return false;
        }
        self.crosses_segment(tte.coord(), to)
    }

    /// Altitudes at which the evaluation point is inside the volume,
    /// narrowed by `constraint`.
    pub fn point_altitudes(&self, tte: &TimeTableEval, constraint: &AltRange) -> IntervalSet<i32> {
        if !self.timetable.is_never() && !self.timetable.is_inside(tte) {
            return IntervalSet::empty();
        }
        if !self.contains_coord(tte.coord()) {
            return IntervalSet::empty();
        }
        let mut band = self.altrange.interval(true);
        band &= &constraint.interval(true);
        band
    }

    /// Altitudes at which the leg from the evaluation point to `to`
    /// touches the volume, narrowed by `constraint`.
    pub fn point_intersect_altitudes(
        &self,
        tte: &TimeTableEval,
        to: Coord,
        constraint: &AltRange,
    ) -> IntervalSet<i32> {
        if !self.timetable.is_never() && !self.timetable.is_inside(tte) {
            return IntervalSet::empty();
        }
        if !self.crosses_segment(tte.coord(), to) {
            return IntervalSet::empty();
        }
        let mut band = self.altrange.interval(true);
        band &= &constraint.interval(true);
        band
    }
}

impl Hibernate for AirspaceSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        ar.io_string(&mut self.name)?;
        let mut rings = self.polygons.len() as u32;
        ar.io_uleb32(&mut rings)?;
        if ar.is_load() {
            self.polygons.clear();
            self.polygons.resize(rings as usize, Vec::new());
        }
        for ring in &mut self.polygons {
            let mut n = ring.len() as u32;
            ar.io_uleb32(&mut n)?;
            if ar.is_load() {
                ring.clear();
                ring.resize(n as usize, Coord::INVALID);
            }
            for pt in ring.iter_mut() {
                ar.io_coord(pt)?;
            }
        }
        self.altrange.hibernate(ar)?;
        self.timetable.hibernate(ar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altrange::AltMode;

    fn square() -> AirspaceSlice {
        AirspaceSlice {
            ident: "LSAG".into(),
            name: "GENEVA TMA".into(),
            polygons: vec![vec![
                Coord::from_deg(46.0, 6.0),
                Coord::from_deg(46.0, 7.0),
                Coord::from_deg(47.0, 7.0),
                Coord::from_deg(47.0, 6.0),
                Coord::from_deg(46.0, 6.0),
            ]],
            altrange: AltRange::new(2000, AltMode::Std, 19500, AltMode::Std),
            timetable: TimeTable::always(),
        }
    }

    #[test]
    fn containment() {
        let aspc = square();
        let inside = TimeTableEval::new(0, Coord::from_deg(46.5, 6.5));
        let outside = TimeTableEval::new(0, Coord::from_deg(45.0, 6.5));
        assert!(aspc.is_inside(&inside, 10000, &AltRange::default()));
        assert!(!aspc.is_inside(&inside, 30000, &AltRange::default()));
        assert!(!aspc.is_inside(&outside, 10000, &AltRange::default()));
    }

    #[test]
    fn crossing_leg() {
        let aspc = square();
        // leg passing straight through the volume
        let tte = TimeTableEval::new(0, Coord::from_deg(46.5, 5.0));
        assert!(aspc.is_intersect(&tte, Coord::from_deg(46.5, 8.0), 10000, &AltRange::default()));
        // leg passing south of it
        let tte = TimeTableEval::new(0, Coord::from_deg(45.0, 5.0));
        assert!(!aspc.is_intersect(&tte, Coord::from_deg(45.0, 8.0), 10000, &AltRange::default()));
    }

    #[test]
    fn point_altitudes_band() {
        let aspc = square();
        let tte = TimeTableEval::new(0, Coord::from_deg(46.5, 6.5));
        let band = aspc.point_altitudes(&tte, &AltRange::default());
        assert!(band.contains(2000));
        assert!(band.contains(19500));
        assert!(!band.contains(30000));
    }
}
