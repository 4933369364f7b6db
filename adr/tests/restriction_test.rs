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

use adr::altrange::AltRange;
use adr::db::Store;
use adr::eval::{FlightPlan, PathCode, RestrictionEval, Waypoint};
use adr::geom::Coord;
use adr::id::Link;
use adr::model::{
    AirspaceSlice, DesignatedPointSlice, DesignatedPointType, Object, ObjectKind, SlicePayload,
    TimeSlice,
};
use adr::restriction::{
    CondChild, Condition, FlightRestriction, FlightRestrictionSlice, ProcInd, RestrictionElement,
    RestrictionSequence, RestrictionType, Restrictions,
};
use adr::timetable::TimeTable;

const DEPARTURE: u64 = 1_400_000_000;

fn point(uuid: &str, ident: &str, lat: f64, lon: f64) -> Arc<Object> {
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

fn airspace(uuid: &str, ident: &str, corners: [(f64, f64); 4]) -> Arc<Object> {
    let mut ring: Vec<Coord> = corners
        .iter()
        .map(|&(lat, lon)| Coord::from_deg(lat, lon))
        .collect();
    ring.push(ring[0]);
    let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::Airspace);
    obj.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::Airspace(AirspaceSlice {
            ident: ident.into(),
            polygons: vec![ring],
            altrange: AltRange::default(),
            timetable: TimeTable::always(),
            ..Default::default()
        }),
    ))
    .unwrap();
    Arc::new(obj)
}

fn rule(
    uuid: &str,
    ident: &str,
    rtype: RestrictionType,
    condition: Option<Condition>,
    restrictions: Restrictions,
) -> FlightRestriction {
    let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::FlightRestriction);
    obj.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::FlightRestriction(Box::new(FlightRestrictionSlice {
            ident: ident.into(),
            timetable: TimeTable::always(),
            restrictions,
            condition,
            restriction_type: rtype,
            procind: ProcInd::Tfr,
            enabled: true,
            ..Default::default()
        })),
    ))
    .unwrap();
    FlightRestriction::from_object(Arc::new(obj)).unwrap()
}

/// An all-IFR direct plan over the given points.
fn plan(points: &[&Arc<Object>]) -> FlightPlan {
    let mut fplan = FlightPlan {
        departure_time: DEPARTURE,
        flight_type: 'S',
        ..Default::default()
    };
    for (i, pt) in points.iter().enumerate() {
        let coord = pt.coord_at(DEPARTURE).unwrap();
        let last = i + 1 == points.len();
        fplan.waypoints.push(Waypoint::new(
            pt.ident_at(DEPARTURE).unwrap(),
            coord,
            DEPARTURE + i as u64 * 600,
            15_000,
            true,
            if last { PathCode::None } else { PathCode::DirectTo },
            Link::resolved(Arc::clone(pt)),
            Link::default(),
        ));
    }
    fplan
}

fn eval_with_rules(
    fplan: FlightPlan,
    rules: &[FlightRestriction],
    objects: &[&Arc<Object>],
) -> RestrictionEval {
    // loading through a store keeps the rule objects cache-backed like in
    // production; an in-memory store is enough
    let mut store = Store::open_in_memory().unwrap();
    for obj in objects {
        store.save(obj).unwrap();
    }
    for r in rules {
        store.save(r.object()).unwrap();
    }
    let mut ev = RestrictionEval::new();
    ev.set_fplan(fplan);
    ev.load_rules(&store).unwrap();
    ev
}

fn triangle() -> (Arc<Object>, Arc<Object>, Arc<Object>) {
    (
        point("11111111-0000-0000-0000-000000000001", "AAA", 46.0, 6.0),
        point("11111111-0000-0000-0000-000000000002", "BBB", 46.3, 6.5),
        point("11111111-0000-0000-0000-000000000003", "CCC", 46.6, 7.0),
    )
}

#[test]
fn identity_rule_always_accepts() {
    let (a, b, c) = triangle();
    let identity = rule(
        "22222222-0000-0000-0000-000000000001",
        "IDENT1",
        RestrictionType::Mandatory,
        Some(Condition::constant(0, true)),
        Restrictions::default(),
    );
    let mut ev = eval_with_rules(plan(&[&a, &b, &c]), &[identity], &[]);
    assert!(ev.check_fplan(), "{:?}", ev.results());
    assert!(ev.results().is_ok());
}

#[test]
fn forbidden_rule_collects_all_witnesses() {
    let (a, b, c) = triangle();
    let aspc = airspace(
        "22222222-0000-0000-0000-000000000002",
        "LSAG",
        [(45.0, 5.0), (45.0, 8.0), (48.0, 8.0), (48.0, 5.0)],
    );
    let forbidden = rule(
        "22222222-0000-0000-0000-000000000003",
        "FORBID1",
        RestrictionType::Forbidden,
        Some(Condition::constant(0, true)),
        Restrictions {
            sequences: vec![RestrictionSequence {
                elements: vec![RestrictionElement::Airspace {
                    alt: AltRange::default(),
                    airspace: Link::resolved(aspc.clone()),
                }],
            }],
        },
    );
    let mut ev = eval_with_rules(plan(&[&a, &b, &c]), &[forbidden], &[&aspc]);
    assert!(!ev.check_fplan());
    let results = ev.results();
    assert_eq!(results.0.len(), 1);
    let witness: Vec<usize> = results.0[0].sequences[0]
        .vertexset
        .iter()
        .copied()
        .collect();
    assert_eq!(witness, vec![0, 1, 2]);
    assert_eq!(results.0[0].rule_ident(), "FORBID1");
    // the rendered verdict carries ident, type char and witnesses
    let text = results.0[0].to_string();
    assert!(text.contains("FORBID1"));
    assert!(text.contains('F'));
}

#[test]
fn disabled_rule_does_not_affect_the_verdict() {
    let aspc = airspace(
        "22222222-0000-0000-0000-000000000004",
        "LSAG",
        [(45.0, 5.0), (45.0, 8.0), (48.0, 8.0), (48.0, 5.0)],
    );
    let closed = rule(
        "22222222-0000-0000-0000-000000000005",
        "CLOSED1",
        RestrictionType::Closed,
        Some(Condition::CrossingAirspace1 {
            childnum: 0,
            alt: AltRange::default(),
            airspace: Link::resolved(aspc.clone()),
            refloc: false,
        }),
        Restrictions::default(),
    );
    // four waypoints so the airspace crossing scan sees an inner leg
    let d = point("11111111-0000-0000-0000-000000000004", "DDD", 46.9, 7.5);
    let (aa, bb, cc) = triangle();
    let fplan = plan(&[&aa, &bb, &cc, &d]);
    let mut ev = eval_with_rules(fplan.clone(), &[closed.clone()], &[&aspc]);
    assert!(!ev.check_fplan(), "closed rule should reject the plan");

    let mut ev = eval_with_rules(fplan, &[closed], &[&aspc]);
    assert!(ev.disable_rule("CLOSED1"));
    assert!(ev.check_fplan(), "disabled rule must not reject");
}

#[test]
fn simplify_preserves_the_verdict() {
    let (a, b, c) = triangle();
    let aspc = airspace(
        "22222222-0000-0000-0000-000000000006",
        "LSAG",
        [(45.0, 5.0), (45.0, 8.0), (48.0, 8.0), (48.0, 5.0)],
    );
    let cond = Condition::And {
        childnum: 0,
        inv: false,
        children: vec![
            CondChild {
                cond: Condition::constant(1, true),
                inv: false,
            },
            CondChild {
                cond: Condition::CrossingAirspace1 {
                    childnum: 2,
                    alt: AltRange::default(),
                    airspace: Link::resolved(aspc.clone()),
                    refloc: false,
                },
                inv: false,
            },
        ],
    };
    let r = rule(
        "22222222-0000-0000-0000-000000000007",
        "SIMPL1",
        RestrictionType::Closed,
        Some(cond),
        Restrictions::default(),
    );
    let simplified = r.simplify().expect("the constant child should fold");
    let d = point("11111111-0000-0000-0000-000000000004", "DDD", 46.9, 7.5);
    let fplan = plan(&[&a, &b, &c, &d]);

    let mut ev = eval_with_rules(fplan.clone(), std::slice::from_ref(&r), &[&aspc]);
    let before = ev.check_fplan();
    let mut ev = eval_with_rules(fplan, &[simplified], &[&aspc]);
    let after = ev.check_fplan();
    assert_eq!(before, after);
}

#[test]
fn crossingpoint_rewrite_is_equivalent() {
    let (a, b, c) = triangle();
    // forbidden unless the plan crosses X or Y, with X and Y being the
    // middle and last points of the triangle
    let cond = Condition::And {
        childnum: 0,
        inv: true,
        children: vec![
            CondChild {
                cond: Condition::CrossingPoint {
                    childnum: 1,
                    alt: AltRange::default(),
                    wpt: Link::resolved(b.clone()),
                    refloc: false,
                },
                inv: true,
            },
            CondChild {
                cond: Condition::CrossingPoint {
                    childnum: 2,
                    alt: AltRange::default(),
                    wpt: Link::resolved(c.clone()),
                    refloc: false,
                },
                inv: true,
            },
        ],
    };
    let restrictions = Restrictions {
        sequences: vec![
            RestrictionSequence {
                elements: vec![RestrictionElement::Point {
                    alt: AltRange::default(),
                    point: Link::resolved(b.clone()),
                }],
            },
            RestrictionSequence {
                elements: vec![RestrictionElement::Point {
                    alt: AltRange::default(),
                    point: Link::resolved(c.clone()),
                }],
            },
        ],
    };
    let r = rule(
        "22222222-0000-0000-0000-000000000008",
        "REWRITE1",
        RestrictionType::Forbidden,
        Some(cond),
        restrictions,
    );
    let rewritten = r
        .simplify_complexity_crossingpoints()
        .expect("the crossing points should extract");
    let slice = rewritten.slice_at(DEPARTURE).unwrap();
    assert_eq!(
        slice.condition.as_ref().and_then(Condition::const_value),
        Some(true),
        "the condition should fold to constant true"
    );
    assert_eq!(slice.restrictions.sequences.len(), 2);

    // the crossing plan fails both before and after the rewrite
    let fplan = plan(&[&a, &b, &c]);
    let mut ev = eval_with_rules(fplan, std::slice::from_ref(&r), &[&a, &b, &c]);
    let before = ev.check_fplan();
    let fplan = plan(&[&a, &b, &c]);
    let mut ev = eval_with_rules(fplan, std::slice::from_ref(&rewritten), &[&a, &b, &c]);
    let after = ev.check_fplan();
    assert_eq!(before, after);
    assert!(!after, "a plan over the forbidden points must fail");

    // a plan avoiding both points passes both forms
    let d = point("11111111-0000-0000-0000-000000000005", "EEE", 45.0, 5.0);
    let e = point("11111111-0000-0000-0000-000000000006", "FFF", 45.2, 5.4);
    let fplan = plan(&[&a, &d, &e]);
    let mut ev = eval_with_rules(fplan, std::slice::from_ref(&r), &[&a, &b, &c, &d, &e]);
    let before = ev.check_fplan();
    let fplan = plan(&[&a, &d, &e]);
    let mut ev = eval_with_rules(fplan, &[rewritten], &[&a, &b, &c, &d, &e]);
    let after = ev.check_fplan();
    assert_eq!(before, after);
    assert!(after, "a plan avoiding the points must pass");
}

#[test]
fn dct_limit_witnesses_are_edges() {
    let (a, b, c) = triangle();
    let limit = rule(
        "22222222-0000-0000-0000-000000000009",
        "DCTLIM1",
        RestrictionType::Forbidden,
        Some(Condition::And {
            childnum: 0,
            inv: false,
            children: vec![CondChild {
                cond: Condition::DctLimit {
                    childnum: 1,
                    limit_nm: 1.0,
                },
                inv: false,
            }],
        }),
        Restrictions {
            sequences: vec![RestrictionSequence {
                elements: vec![RestrictionElement::Point {
                    alt: AltRange::default(),
                    point: Link::resolved(a.clone()),
                }],
            }],
        },
    );
    // legs are tens of miles, far beyond the 1 nm limit
    let mut ev = eval_with_rules(plan(&[&a, &b, &c]), &[limit], &[&a]);
    assert!(!ev.check_fplan());
    let result = &ev.results().0[0];
    assert!(
        !result.edgeset.is_empty(),
        "DCT limit failures should name edges: {result:?}"
    );
}
