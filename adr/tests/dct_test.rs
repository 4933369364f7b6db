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

use std::sync::Arc;

use adr::altrange::{AltMode, AltRange};
use adr::dct::{AirportDctLimit, DctParameters, TerrainOracle};
use adr::geom::Coord;
use adr::id::Link;
use adr::interval::{Interval, IntervalSet};
use adr::model::{
    AirportFlags, AirportSlice, DesignatedPointSlice, DesignatedPointType, NavaidSlice,
    NavaidType, Object, ObjectKind, RouteSlice, SlicePayload, TimeSlice,
};
use adr::restriction::{Condition, DctConnPoints};

const CUTOFF: u64 = 1_400_000_000;
const FUTURE: u64 = 1_400_600_000;

fn params() -> DctParameters {
    let mut p = DctParameters::new(0, CUTOFF, FUTURE, 50.0, 0);
    p.set_all(true);
    p
}

fn designated_point(uuid: &str, ident: &str, lat: f64, lon: f64) -> Arc<Object> {
    let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::DesignatedPoint);
    obj.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::DesignatedPoint(DesignatedPointSlice {
            ident: ident.into(),
            coord: Coord::from_deg(lat, lon),
            point_type: DesignatedPointType::Icao,
            ..Default::default()
        }),
    ))
    .unwrap();
    Arc::new(obj)
}

fn navaid(uuid: &str, ident: &str, lat: f64, lon: f64) -> Arc<Object> {
    let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::Navaid);
    obj.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::Navaid(NavaidSlice {
            ident: ident.into(),
            coord: Coord::from_deg(lat, lon),
            elev: 1500,
            navaid_type: NavaidType::VorDme,
            ..Default::default()
        }),
    ))
    .unwrap();
    Arc::new(obj)
}

fn airport(uuid: &str, ident: &str, lat: f64, lon: f64) -> Arc<Object> {
    let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::Airport);
    obj.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::Airport(AirportSlice {
            ident: ident.into(),
            name: ident.into(),
            coord: Coord::from_deg(lat, lon),
            elev: 1411,
            flags: AirportFlags::DEP_IFR | AirportFlags::ARR_IFR,
            ..Default::default()
        }),
    ))
    .unwrap();
    Arc::new(obj)
}

/// The airway-crossing condition of a direct-rule forbids exactly its
/// altitude band in the matching direction.
#[test]
fn airway_crossing_band_is_directional() {
    // LSGG sorts before DITON so the leg keeps this orientation
    let lsgg = designated_point("10000000-0000-0000-0000-000000000001", "LSGG", 46.2381, 6.1089);
    let diton = designated_point("20000000-0000-0000-0000-000000000002", "DITON", 46.3081, 6.8094);
    let mut awy = Object::new(
        "30000000-0000-0000-0000-000000000003".parse().unwrap(),
        ObjectKind::Route,
    );
    awy.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::Route(RouteSlice {
            ident: "UR150".into(),
        }),
    ))
    .unwrap();
    let awy = Arc::new(awy);

    let cond = Condition::CrossingAirway {
        childnum: 0,
        alt: AltRange::new(6000, AltMode::Std, 24500, AltMode::Std),
        wpt: [Link::resolved(lsgg.clone()), Link::resolved(diton.clone())],
        airway: Link::resolved(awy),
        refloc: false,
    };
    let p = params();
    let mut calc = p.calc(&lsgg, &diton);
    calc.set_window(CUTOFF, CUTOFF + 3600);

    let band = cond.evaluate_dct(&calc);
    assert!(band.dir(0).contains(6000), "FL60 forward");
    assert!(band.dir(0).contains(24500), "FL245 forward");
    assert!(!band.dir(0).contains(25000));
    assert!(band.dir(1).is_empty(), "backward must stay empty");
}

#[test]
fn leg_beyond_every_radius_is_empty() {
    // roughly 120 nm apart, far beyond the 50 nm limit
    let a = navaid("10000000-0000-0000-0000-000000000001", "AAA", 46.0, 6.0);
    let b = navaid("20000000-0000-0000-0000-000000000002", "BBB", 48.0, 6.0);
    let p = params();
    let mut calc = p.calc(&a, &b);
    calc.run();
    assert!(calc.leg().is_empty());
}

#[test]
fn unconstrained_pair_gets_the_full_window() {
    let a = navaid("10000000-0000-0000-0000-000000000001", "AAA", 46.0, 6.0);
    let b = navaid("20000000-0000-0000-0000-000000000002", "BBB", 46.3, 6.3);
    let p = params();
    let mut calc = p.calc(&a, &b);
    calc.run();
    let alt = calc.leg().altitudes_at(CUTOFF + 10);
    assert!(alt.is_inside(0, 0));
    assert!(alt.is_inside(0, 30000));
    assert!(alt.is_inside(1, 30000));
    assert!(!alt.is_inside(0, 66500));
}

#[test]
fn direction_of_enumeration_does_not_matter() {
    let a = navaid("10000000-0000-0000-0000-000000000001", "AAA", 46.0, 6.0);
    let b = navaid("20000000-0000-0000-0000-000000000002", "BBB", 46.3, 6.3);
    let p = params();
    let mut fwd = p.calc(&a, &b);
    fwd.run();
    let mut rev = p.calc(&b, &a);
    rev.run();
    assert_eq!(fwd.leg().uuid(0), rev.leg().uuid(0));
    assert_eq!(fwd.leg().alts(), rev.leg().alts());
}

struct FlatTerrain {
    corridor: i32,
}

impl TerrainOracle for FlatTerrain {
    fn corridor_elevation(&self, _p0: Coord, _p1: Coord) -> Option<(i32, i32)> {
        Some((self.corridor - 300, self.corridor))
    }
}

#[test]
fn terrain_floor_clears_the_corridor() {
    let a = navaid("10000000-0000-0000-0000-000000000001", "AAA", 46.0, 6.0);
    let b = navaid("20000000-0000-0000-0000-000000000002", "BBB", 46.3, 6.3);
    let p = params();
    let mut calc = p.calc(&a, &b);
    calc.run();
    calc.run_topo(&FlatTerrain { corridor: 5800 });
    let alt = calc.leg().altitudes_at(CUTOFF + 10);
    // 5800 ft corridor is above 5000 ft, so the floor is 5800 + 2000
    assert!(!alt.is_inside(0, 7000));
    assert!(!alt.is_inside(1, 7000));
    assert!(alt.is_inside(0, 8000), "FL080 must stay available");
    assert!(alt.is_inside(1, 8000));
}

#[test]
fn sid_limit_gates_the_airport_direction() {
    // the airport sorts first so forward is airport -> navaid
    let arpt = airport("10000000-0000-0000-0000-000000000001", "LSGG", 46.2381, 6.1089);
    let navpt = navaid("20000000-0000-0000-0000-000000000002", "PAS", 46.1634, 6.7097);
    let mut p = params();
    let mut connpt = DctConnPoints::default();
    connpt.insert(
        Link::resolved(navpt.clone()),
        IntervalSet::from_interval(Interval::new(0, 24501)),
    );
    p.add_sid_limit(AirportDctLimit {
        arpt: Link::resolved(arpt.clone()),
        start: 0,
        end: u64::MAX,
        limit_nm: 0.0,
        connpt,
    });
    let mut calc = p.calc(&arpt, &navpt);
    calc.run();
    let alt = calc.leg().altitudes_at(CUTOFF + 10);
    assert!(alt.is_inside(0, 10000), "SID band must be open outbound");
    assert!(alt.is_inside(0, 24500));
    assert!(!alt.is_inside(0, 30000), "above the SID band");
    assert!(alt.dir(1).is_empty(), "no STAR limit, backward empty");
}

#[test]
fn airport_without_any_limit_gets_nothing() {
    let arpt = airport("10000000-0000-0000-0000-000000000001", "LSGG", 46.2381, 6.1089);
    let navpt = navaid("20000000-0000-0000-0000-000000000002", "PAS", 46.1634, 6.7097);
    let p = params();
    let mut calc = p.calc(&arpt, &navpt);
    calc.run();
    assert!(calc.leg().is_empty());
}
