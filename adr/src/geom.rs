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

//! Fixed-point geography.
//!
//! Coordinates are scaled 32-bit integers with `1 << 31 == 180°`. The
//! integer form is the on-disk contract (archive blobs, SQL bounding box
//! columns, snapshot directory entries); longitudes wrap at ±2³¹ so east
//! of the anti-meridian is reachable by adding 2³². Geodesic math converts
//! to [`geo::Point`] degrees at the boundary.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use geo::{Distance, Geodesic};

/// Degrees per coordinate unit.
const COORD_TO_DEG: f64 = 90.0 / (0x4000_0000u32 as f64);
const DEG_TO_COORD: f64 = (0x4000_0000u32 as f64) / 90.0;

/// Nautical miles per metre.
const M_TO_NM: f64 = 1.0 / 1852.0;

/// A fixed-point coordinate.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coord {
    lat: i32,
    lon: i32,
}

impl Coord {
    /// Sentinel for a missing coordinate.
    pub const INVALID: Coord = Coord {
        lat: i32::MIN,
        lon: i32::MIN,
    };

    pub fn new(lat: i32, lon: i32) -> Self {
        Self { lat, lon }
    }

    pub fn from_deg(lat: f64, lon: f64) -> Self {
        Self {
            lat: (lat * DEG_TO_COORD).round() as i32,
            lon: (lon * DEG_TO_COORD).round() as i32,
        }
    }

    pub fn lat(&self) -> i32 {
        self.lat
    }

    pub fn lon(&self) -> i32 {
        self.lon
    }

    pub fn lat_deg(&self) -> f64 {
        f64::from(self.lat) * COORD_TO_DEG
    }

    pub fn lon_deg(&self) -> f64 {
        f64::from(self.lon) * COORD_TO_DEG
    }

    pub fn is_invalid(&self) -> bool {
        *self == Self::INVALID
    }

    /// Geodesic distance in nautical miles on the WGS84 ellipsoid.
    pub fn dist_nm(&self, other: &Coord) -> f64 {
        Geodesic.distance(geo::Point::from(*self), geo::Point::from(*other)) * M_TO_NM
    }
}

impl From<Coord> for geo::Point<f64> {
    fn from(c: Coord) -> Self {
        geo::Point::new(c.lon_deg(), c.lat_deg())
    }
}

impl From<geo::Point<f64>> for Coord {
    fn from(p: geo::Point<f64>) -> Self {
        Coord::from_deg(p.y(), p.x())
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            return write!(f, "(invalid)");
        }
        write!(f, "({:.5}, {:.5})", self.lat_deg(), self.lon_deg())
    }
}

/// A bounding box between a southwest and a northeast corner.
///
/// The box may span the anti-meridian; in that case `ne.lon < sw.lon` and
/// [`Rect::east_unwrapped`] reports the eastern edge shifted by 2³².
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rect {
    sw: Coord,
    ne: Coord,
}

impl Default for Rect {
    fn default() -> Self {
        Self::INVALID
    }
}

impl Rect {
    pub const INVALID: Rect = Rect {
        sw: Coord::INVALID,
        ne: Coord::INVALID,
    };

    pub fn new(sw: Coord, ne: Coord) -> Self {
        Self { sw, ne }
    }

    /// Degenerate box around a single point.
    pub fn from_point(pt: Coord) -> Self {
        Self { sw: pt, ne: pt }
    }

    pub fn southwest(&self) -> Coord {
        self.sw
    }

    pub fn northeast(&self) -> Coord {
        self.ne
    }

    pub fn south(&self) -> i32 {
        self.sw.lat
    }

    pub fn north(&self) -> i32 {
        self.ne.lat
    }

    pub fn west(&self) -> i32 {
        self.sw.lon
    }

    pub fn east(&self) -> i32 {
        self.ne.lon
    }

    /// Eastern edge as an i64 that is never west of the western edge.
    pub fn east_unwrapped(&self) -> i64 {
        let mut e = i64::from(self.ne.lon);
        if e < i64::from(self.sw.lon) {
            e += 1i64 << 32;
        }
        e
    }

    pub fn is_invalid(&self) -> bool {
        self.sw.is_invalid() || self.ne.is_invalid()
    }

    /// Longitude offset of `lon` east of the western edge, in wrapped space.
    fn lon_offset(&self, lon: i32) -> i64 {
        (i64::from(lon) - i64::from(self.sw.lon)).rem_euclid(1i64 << 32)
    }

    pub fn is_inside(&self, pt: Coord) -> bool {
        if self.is_invalid() || pt.is_invalid() {
            return false;
        }
        pt.lat >= self.sw.lat
            && pt.lat <= self.ne.lat
            && self.lon_offset(pt.lon) <= self.east_unwrapped() - i64::from(self.sw.lon)
    }

    pub fn is_intersect(&self, other: &Rect) -> bool {
        if self.is_invalid() || other.is_invalid() {
            return false;
        }
        if self.sw.lat > other.ne.lat || other.sw.lat > self.ne.lat {
            return false;
        }
        let width = self.east_unwrapped() - i64::from(self.sw.lon);
        let other_width = other.east_unwrapped() - i64::from(other.sw.lon);
        let offs = self.lon_offset(other.sw.lon);
        offs <= width || offs + other_width >= 1i64 << 32
    }

    /// Intersection test against the segment's bounding box.
    pub fn is_intersect_segment(&self, p0: Coord, p1: Coord) -> bool {
        let mut bbox = Rect::from_point(p0);
        bbox = bbox.extend(p1);
        self.is_intersect(&bbox)
    }

    /// Grows the box to contain `pt`, extending across whichever edge is
    /// nearer in wrapped longitude space.
    pub fn extend(&self, pt: Coord) -> Rect {
        if pt.is_invalid() {
            return *self;
        }
        if self.is_invalid() {
            return Rect::from_point(pt);
        }
        let mut r = *self;
        r.sw.lat = r.sw.lat.min(pt.lat);
        r.ne.lat = r.ne.lat.max(pt.lat);
        let width = self.east_unwrapped() - i64::from(self.sw.lon);
        let offs = self.lon_offset(pt.lon);
        if offs > width {
            // outside; extend east or west, whichever is closer
            let east_gap = offs - width;
            let west_gap = (1i64 << 32) - offs;
            if east_gap <= west_gap {
                r.ne.lon = pt.lon;
            } else {
                r.sw.lon = pt.lon;
            }
        }
        r
    }

    /// Merges two boxes.
    pub fn union(&self, other: &Rect) -> Rect {
        if other.is_invalid() {
            return *self;
        }
        if self.is_invalid() {
            return *other;
        }
        self.extend(other.sw).extend(other.ne)
    }

    /// Expands each edge outward by approximately `nm` nautical miles.
    pub fn oversize_nm(&self, nm: f64) -> Rect {
        if self.is_invalid() {
            return *self;
        }
        // 1 minute of latitude is one nautical mile
        let dlat = (nm / 60.0 * DEG_TO_COORD).round() as i64;
        let midlat = (f64::from(self.sw.lat) + f64::from(self.ne.lat)) * 0.5 * COORD_TO_DEG;
        let coslat = midlat.to_radians().cos().max(0.01);
        let dlon = (nm / 60.0 / coslat * DEG_TO_COORD).round() as i64;
        Rect {
            sw: Coord {
                lat: (i64::from(self.sw.lat) - dlat).clamp(i64::from(i32::MIN + 1), i64::from(i32::MAX)) as i32,
                lon: (i64::from(self.sw.lon) - dlon) as i32,
            },
            ne: Coord {
                lat: (i64::from(self.ne.lat) + dlat).clamp(i64::from(i32::MIN + 1), i64::from(i32::MAX)) as i32,
                lon: (i64::from(self.ne.lon) + dlon) as i32,
            },
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} .. {}]", self.sw, self.ne)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_deg_round_trip() {
        let c = Coord::from_deg(46.2381, 6.1089);
        assert!((c.lat_deg() - 46.2381).abs() < 1e-6);
        assert!((c.lon_deg() - 6.1089).abs() < 1e-6);
    }

    #[test]
    fn dist_lsgg_diton() {
        // Geneva to DITON is a bit under 30 NM
        let lsgg = Coord::from_deg(46.2381, 6.1089);
        let diton = Coord::from_deg(46.3081, 6.8094);
        let d = lsgg.dist_nm(&diton);
        assert!((25.0..35.0).contains(&d), "distance {d} out of range");
    }

    #[test]
    fn rect_inside_plain() {
        let r = Rect::new(Coord::from_deg(-1.0, -1.0), Coord::from_deg(1.0, 1.0));
        assert!(r.is_inside(Coord::from_deg(0.0, 0.0)));
        assert!(!r.is_inside(Coord::from_deg(2.0, 0.0)));
        assert!(!r.is_inside(Coord::from_deg(0.0, 2.0)));
    }

    #[test]
    fn rect_wraps_antimeridian() {
        //  178°E .. -178° (= 182°E) crossing the date line
        let r = Rect::new(Coord::from_deg(-1.0, 178.0), Coord::from_deg(1.0, -178.0));
        assert!(r.is_inside(Coord::from_deg(0.0, 179.0)));
        assert!(r.is_inside(Coord::from_deg(0.0, -179.0)));
        assert!(!r.is_inside(Coord::from_deg(0.0, 0.0)));
        assert!(r.east_unwrapped() > i64::from(r.west()));
    }

    #[test]
    fn rect_intersect_over_antimeridian() {
        let wrapping = Rect::new(Coord::from_deg(-1.0, 178.0), Coord::from_deg(1.0, -178.0));
        let east = Rect::new(Coord::from_deg(-0.5, 179.0), Coord::from_deg(0.5, 179.5));
        let west = Rect::new(Coord::from_deg(-0.5, -179.5), Coord::from_deg(0.5, -179.0));
        let away = Rect::new(Coord::from_deg(-0.5, 10.0), Coord::from_deg(0.5, 11.0));
        assert!(wrapping.is_intersect(&east));
        assert!(wrapping.is_intersect(&west));
        assert!(!wrapping.is_intersect(&away));
        assert!(east.is_intersect(&wrapping));
        assert!(west.is_intersect(&wrapping));
    }

    #[test]
    fn extend_prefers_near_edge() {
        let r = Rect::from_point(Coord::from_deg(0.0, 179.0));
        let r = r.extend(Coord::from_deg(0.0, -179.0));
        // extending east across the anti-meridian keeps the box narrow
        let width = r.east_unwrapped() - i64::from(r.west());
        assert!(width < 1i64 << 30, "box should stay narrow, width {width}");
        assert!(r.is_inside(Coord::from_deg(0.0, 179.5)));
    }

    #[test]
    fn oversize_grows_box() {
        let r = Rect::from_point(Coord::from_deg(46.0, 6.0)).oversize_nm(10.0);
        assert!(r.is_inside(Coord::from_deg(46.1, 6.0)));
        assert!(r.is_inside(Coord::from_deg(46.0, 6.2)));
        assert!(!r.is_inside(Coord::from_deg(47.0, 6.0)));
    }
}
