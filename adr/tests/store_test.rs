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

use adr::db::{Filter, IdentComparison, LoadMode, Store};
use adr::geom::{Coord, Rect};
use adr::id::{Link, Uuid};
use adr::model::{
    AirportFlags, AirportSlice, DesignatedPointSlice, DesignatedPointType, Object, ObjectKind,
    RouteSegmentSlice, RouteSlice, SegmentCore, SlicePayload, TimeSlice,
};

const LSGG_UUID: &str = "00112233-0011-2233-4455-66778899aabb";

fn lsgg() -> Arc<Object> {
    let mut obj = Object::new(LSGG_UUID.parse().unwrap(), ObjectKind::Airport);
    obj.set_modified(1_400_000_000);
    obj.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::Airport(AirportSlice {
            ident: "LSGG".into(),
            name: "GENEVE".into(),
            iata: "GVA".into(),
            coord: Coord::from_deg(46.2381, 6.1089),
            elev: 1411,
            flags: AirportFlags::DEP_IFR | AirportFlags::ARR_IFR,
            cities: vec!["GENEVA".into()],
        }),
    ))
    .unwrap();
    Arc::new(obj)
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

#[test]
fn airport_round_trip() {
    let mut store = Store::open_in_memory().unwrap();
    let arpt = lsgg();
    store.save(&arpt).unwrap();

    // load through the cache: same identity
    let loaded = store.load(arpt.uuid()).unwrap().unwrap();
    assert!(Arc::ptr_eq(&loaded, &arpt));

    // load cold: same value
    store.clear_cache();
    let loaded = store.load(arpt.uuid()).unwrap().unwrap();
    assert_eq!(*loaded, *arpt);
    let slice = loaded.slice_at(1_000_000).unwrap();
    let airport = slice.payload().as_airport().unwrap();
    assert_eq!(airport.ident, "LSGG");
    assert_eq!(airport.elev, 1411);
    assert!(airport.is_civ());

    // type byte carries the IFR flags on top of the airport base
    assert_eq!(loaded.type_byte(), 0x40 | 0x0c);

    // reverse name lookup
    let found = store
        .find_by_ident("LSGG", IdentComparison::Exact, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(*found[0].uuid(), LSGG_UUID.parse::<Uuid>().unwrap());
}

#[test]
fn ident_comparison_modes() {
    let mut store = Store::open_in_memory().unwrap();
    store.save(&lsgg()).unwrap();
    store
        .save(&designated_point(
            "10000000-0000-0000-0000-000000000001",
            "LSZH",
            47.46,
            8.55,
        ))
        .unwrap();

    let starts = store
        .find_by_ident("LS", IdentComparison::StartsWith, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(starts.len(), 2);

    // case-insensitive exact
    let exact = store
        .find_by_ident("lsgg", IdentComparison::Exact, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(exact.len(), 1);
    let exact_cs = store
        .find_by_ident(
            "lsgg",
            IdentComparison::ExactCaseSensitive,
            LoadMode::UuidOnly,
            &Filter::default(),
        )
        .unwrap();
    assert!(exact_cs.is_empty());

    // contains must quote LIKE metacharacters
    let contains = store
        .find_by_ident("SG", IdentComparison::Contains, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(contains.len(), 1);
    let quoted = store
        .find_by_ident("%", IdentComparison::Contains, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert!(quoted.is_empty());
}

#[test]
fn antimeridian_bbox_query() {
    let mut store = Store::open_in_memory().unwrap();
    let pt = designated_point("20000000-0000-0000-0000-000000000002", "DATEL", 0.0, 179.0);
    store.save(&pt).unwrap();

    // a box from 178°E across the anti-meridian to 178°W
    let bbox = Rect::new(Coord::from_deg(-1.0, 178.0), Coord::from_deg(1.0, -178.0));
    let found = store
        .find_by_bbox(&bbox, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uuid(), pt.uuid());

    // a box away from the point finds nothing
    let away = Rect::new(Coord::from_deg(-1.0, 0.0), Coord::from_deg(1.0, 1.0));
    assert!(store
        .find_by_bbox(&away, LoadMode::UuidOnly, &Filter::default())
        .unwrap()
        .is_empty());
}

#[test]
fn dependencies_are_indexed() {
    let mut store = Store::open_in_memory().unwrap();
    let p0 = designated_point("30000000-0000-0000-0000-000000000003", "AAA", 46.0, 6.0);
    let p1 = designated_point("30000000-0000-0000-0000-000000000004", "BBB", 46.5, 6.5);
    store.save(&p0).unwrap();
    store.save(&p1).unwrap();

    let mut awy = Object::new(
        "30000000-0000-0000-0000-000000000005".parse().unwrap(),
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
    store.save(&awy).unwrap();

    let mut seg = Object::new(
        "30000000-0000-0000-0000-000000000006".parse().unwrap(),
        ObjectKind::RouteSegment,
    );
    seg.add_slice(TimeSlice::new(
        0,
        u64::MAX,
        SlicePayload::RouteSegment(RouteSegmentSlice {
            core: SegmentCore {
                start: Link::new(*p0.uuid()),
                end: Link::new(*p1.uuid()),
                route: Link::new(*awy.uuid()),
                ..Default::default()
            },
            ..Default::default()
        }),
    ))
    .unwrap();
    let seg = Arc::new(seg);
    store.save(&seg).unwrap();

    // every referenced object reports the segment as a dependant
    for dep in [&p0, &p1, &awy] {
        let found = store
            .find_dependson(dep.uuid(), LoadMode::UuidOnly, &Filter::default())
            .unwrap();
        assert!(
            found.iter().any(|l| l.uuid() == seg.uuid()),
            "{} should be depended on by the segment",
            dep.uuid()
        );
    }
    let deps = store
        .find_dependencies(seg.uuid(), LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(deps.len(), 3);

    // link resolution replaces UUIDs with handles
    let linked = store.load_linked(seg.uuid(), u32::MAX).unwrap().unwrap();
    let core = linked
        .slice_at(1000)
        .unwrap()
        .payload()
        .segment_core()
        .unwrap();
    assert!(core.start.obj().is_some());
    assert!(core.end.obj().is_some());
    assert!(core.route.obj().is_some());
}

#[test]
fn type_and_time_filters() {
    let mut store = Store::open_in_memory().unwrap();
    store.save(&lsgg()).unwrap();
    let mut pt = Object::new(
        "40000000-0000-0000-0000-000000000007".parse().unwrap(),
        ObjectKind::DesignatedPoint,
    );
    pt.add_slice(TimeSlice::new(
        1000,
        2000,
        SlicePayload::DesignatedPoint(DesignatedPointSlice {
            ident: "SHORT".into(),
            coord: Coord::from_deg(1.0, 1.0),
            point_type: DesignatedPointType::Icao,
            ..Default::default()
        }),
    ))
    .unwrap();
    store.save(&Arc::new(pt)).unwrap();

    let only_points = store
        .find_all(
            LoadMode::UuidOnly,
            &Filter::default().types(
                ObjectKind::DesignatedPoint.base_byte(),
                ObjectKind::DesignatedPoint.base_byte(),
            ),
        )
        .unwrap();
    assert_eq!(only_points.len(), 1);

    let early = store
        .find_all(LoadMode::UuidOnly, &Filter::default().time(0, 500))
        .unwrap();
    // the airport is unbounded, the short-lived point is not yet valid
    assert_eq!(early.len(), 1);
}

#[test]
fn snapshot_preferred_when_fresh() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = Store::open(dir.path(), false).unwrap();
        store.save(&lsgg()).unwrap();
        store
            .save(&designated_point(
                "50000000-0000-0000-0000-000000000008",
                "DITON",
                46.3081,
                6.8094,
            ))
            .unwrap();
        store.write_snapshot(dir.path().join("adr.bin")).unwrap();
    }
    let store = Store::open(dir.path(), true).unwrap();
    assert!(store.has_snapshot());

    let arpt = store
        .load(&LSGG_UUID.parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(arpt.ident_at(1000), Some("LSGG"));
    assert_eq!(arpt.modified(), 1_400_000_000);

    // snapshot serves the scans too
    let all = store
        .find_all(LoadMode::Object, &Filter::default())
        .unwrap();
    assert_eq!(all.len(), 2);
    let bbox = Rect::new(Coord::from_deg(46.0, 6.0), Coord::from_deg(46.5, 6.5));
    let found = store
        .find_by_bbox(&bbox, LoadMode::UuidOnly, &Filter::default())
        .unwrap();
    assert_eq!(found.len(), 2);
}

#[test]
fn stale_snapshot_ignored() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut store = Store::open(dir.path(), false).unwrap();
        store.save(&lsgg()).unwrap();
        store.write_snapshot(dir.path().join("adr.bin")).unwrap();
    }
    // age the snapshot behind the database
    let old = std::time::SystemTime::now() - std::time::Duration::from_secs(3600);
    let bin = std::fs::File::options()
        .write(true)
        .open(dir.path().join("adr.bin"))
        .unwrap();
    bin.set_times(std::fs::FileTimes::new().set_modified(old))
        .unwrap();
    let store = Store::open(dir.path(), true).unwrap();
    assert!(!store.has_snapshot());
    // data still served from SQL
    assert!(store
        .load(&LSGG_UUID.parse().unwrap())
        .unwrap()
        .is_some());
}

#[test]
fn corrupt_blob_reports_offset_and_dump() {
    let obj = lsgg();
    let blob = obj.encode().unwrap();
    let err = Object::decode(*obj.uuid(), &blob[..blob.len() - 1]).unwrap_err();
    let text = err.to_string();
    assert!(text.contains("blob"), "error should carry a hex dump: {text}");
    assert!(
        text.contains(&obj.uuid().to_string()),
        "error should name the object: {text}"
    );
}
