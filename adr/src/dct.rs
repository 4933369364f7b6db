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

//! Direct-segment precomputation.
//!
//! For every pair of significant points within reach of a direct-route
//! rule, the pipeline folds every applicable rule's altitude/time effect
//! into a per-direction availability table over a rolling time window and
//! persists the result into the `dct` relation.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use log::{debug, info, warn};

use crate::altrange::BidirAltRange;
use crate::archive::{Archive, ArchiveReader, ArchiveWriter, Hibernate};
use crate::db::{Filter, LoadMode, Store};
use crate::error::Result;
use crate::eval::ConditionalAvailability;
use crate::geom::{Coord, Rect};
use crate::graph::RouteGraph;
use crate::id::{Link, Uuid};
use crate::interval::IntervalSet;
use crate::model::{self, Object, ObjectKind};
use crate::restriction::{
    DctConnPoints, DepArrDct, EnrouteDct, FlightRestriction, Message, MessageType,
};
use crate::timetable::{TimeTable, TimeTableEval, Timestamp, UNBOUNDED_FUTURE};

/// A direct leg is dropped when a routing-network path is at most this
/// factor longer.
const AIRWAY_PREFERRED_FACTOR: f64 = 1.02;

/// Default altitude window of the analysis, feet.
const DEFAULT_ALT_CEILING: i32 = 66_500;

/// Back-pressure limit of the worker result queue.
const RESULT_QUEUE_LIMIT: usize = 1024;

/// Rows per write transaction.
const COMMIT_BATCH: usize = 1024;

/// Provides terrain elevation along a leg; implementations may block on
/// their own storage.
pub trait TerrainOracle {
    /// `(terrain, corridor)` maximum elevations in feet along the leg,
    /// `None` when no data is available.
    fn corridor_elevation(&self, p0: Coord, p1: Coord) -> Option<(i32, i32)>;
}

/// Set of unordered point pairs named by direct rules.
#[derive(Clone, Debug, Default)]
pub struct DctSegments {
    pairs: BTreeSet<(Uuid, Uuid)>,
}

impl DctSegments {
    fn key(a: &Uuid, b: &Uuid) -> (Uuid, Uuid) {
        if a <= b {
            (*a, *b)
        } else {
            (*b, *a)
        }
    }

    pub fn add(&mut self, p0: std::sync::Arc<Object>, p1: std::sync::Arc<Object>) {
        self.pairs.insert(Self::key(p0.uuid(), p1.uuid()));
    }

    pub fn contains(&self, a: &Uuid, b: &Uuid) -> bool {
        self.pairs.contains(&Self::key(a, b))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Uuid, Uuid)> {
        self.pairs.iter()
    }
}

/// One availability entry of a direct leg: an altitude table valid within
/// a time table.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DctAlt {
    pub alt: BidirAltRange,
    pub timetable: TimeTable,
}

impl Hibernate for DctAlt {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.alt.hibernate(ar)?;
        self.timetable.hibernate(ar)
    }
}

/// The precomputed availability of one point pair.
#[derive(Clone, Debug, Default)]
pub struct DctLeg {
    point: [Link; 2],
    alts: Vec<DctAlt>,
}

impl DctLeg {
    pub fn new(p0: Link, p1: Link) -> Self {
        Self {
            point: [p0, p1],
            alts: Vec::new(),
        }
    }

    pub fn uuid(&self, index: usize) -> &Uuid {
        self.point[usize::from(index != 0)].uuid()
    }

    pub fn point(&self, index: usize) -> &Link {
        &self.point[usize::from(index != 0)]
    }

    pub fn alts(&self) -> &[DctAlt] {
        &self.alts
    }

    pub fn is_empty(&self) -> bool {
        self.alts.iter().all(|a| a.alt.is_empty())
    }

    /// The availability per direction at an instant.
    pub fn altitudes_at(&self, t: Timestamp) -> BidirAltRange {
        let tte = TimeTableEval::new(t, Coord::INVALID);
        let mut r = BidirAltRange::empty();
        for a in &self.alts {
            if a.timetable.is_inside(&tte) {
                r |= &a.alt;
            }
        }
        r
    }

    /// Merges an entry, folding it into an existing one with the same
    /// altitude table.
    pub fn add(&mut self, alt: DctAlt) {
        if alt.timetable.is_never() {
            return;
        }
        for existing in &mut self.alts {
            if existing.alt == alt.alt {
                let mut tt = existing.timetable.clone();
                for e in alt.timetable.entries() {
                    tt.push(e.clone());
                }
                tt.simplify();
                existing.timetable = tt;
                return;
            }
        }
        self.alts.push(alt);
    }

    pub fn clear_empty(&mut self) {
        self.alts
            .retain(|a| !a.alt.is_empty() && !a.timetable.is_never());
    }

    pub fn simplify(&mut self) {
        for a in &mut self.alts {
            a.timetable.simplify();
        }
        self.clear_empty();
    }

    /// Swaps the leg ends and every entry's direction tables.
    pub fn swapdir(&mut self) {
        self.point.swap(0, 1);
        for a in &mut self.alts {
            a.alt.swap_dir();
        }
    }

    /// Smallest and largest geodesic distance over the points' slices.
    pub fn dist_nm(&self) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let coords = |link: &Link| -> Vec<Coord> {
            link.obj()
                .map(|obj| {
                    obj.slices()
                        .iter()
                        .filter_map(|ts| ts.payload().coord())
                        .filter(|c| !c.is_invalid())
                        .collect()
                })
                .unwrap_or_default()
        };
        for c0 in coords(&self.point[0]) {
            for c1 in coords(&self.point[1]) {
                let d = c0.dist_nm(&c1);
                min = min.min(d);
                max = max.max(d);
            }
        }
        if min.is_infinite() {
            (f64::NAN, f64::NAN)
        } else {
            (min, max)
        }
    }

    /// Bounding box over the endpoints.
    pub fn bbox(&self) -> Rect {
        let mut bbox = Rect::INVALID;
        for link in &self.point {
            if let Some(obj) = link.obj() {
                for ts in obj.slices() {
                    if let Some(coord) = ts.payload().coord() {
                        bbox = bbox.extend(coord);
                    }
                }
            }
        }
        bbox
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut ar = ArchiveWriter::new();
        let mut leg = self.clone();
        leg.hibernate_alts(&mut ar)?;
        Ok(ar.into_vec())
    }

    pub fn decode(p0: Link, p1: Link, blob: &[u8]) -> Result<DctLeg> {
        let mut leg = DctLeg::new(p0, p1);
        let mut ar = ArchiveReader::new(blob);
        leg.hibernate_alts(&mut ar)
            .and_then(|()| ar.expect_end())
            .map_err(|e| e.with_decode_context(None, blob))?;
        Ok(leg)
    }

    fn hibernate_alts<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        let mut n = self.alts.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.alts.clear();
            self.alts.resize(n as usize, DctAlt::default());
        }
        for a in &mut self.alts {
            a.hibernate(ar)?;
        }
        Ok(())
    }
}

/// A per-airport DCT limit contributed by a departure or arrival rule.
///
/// Ordered lexicographically by `(airport, starttime, endtime)`.
#[derive(Clone, Debug)]
pub struct AirportDctLimit {
    pub arpt: Link,
    pub start: Timestamp,
    pub end: Timestamp,
    pub limit_nm: f64,
    pub connpt: DctConnPoints,
}

impl AirportDctLimit {
    pub fn is_inside(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }

    /// The altitudes the limit grants toward `pt` at `t`.
    pub fn alt_interval(&self, pt: &Link, t: Timestamp) -> IntervalSet<i32> {
        if !self.is_inside(t) {
            return IntervalSet::empty();
        }
        if let Some(iv) = self.connpt.get(pt) {
            return iv.clone();
        }
        let arpt_coord = self.arpt.obj().and_then(|o| o.coord_at(t));
        let pt_coord = pt.obj().and_then(|o| o.coord_at(t));
        let (Some(c0), Some(c1)) = (arpt_coord, pt_coord) else {
            return IntervalSet::empty();
        };
        if c0.is_invalid() || c1.is_invalid() || c0.dist_nm(&c1) > self.limit_nm {
            return IntervalSet::empty();
        }
        IntervalSet::from_interval(crate::interval::Interval::new(0, i32::MAX))
    }

    fn sort_key(&self) -> (Uuid, Timestamp, Timestamp) {
        (*self.arpt.uuid(), self.start, self.end)
    }
}

/// Per-pair evaluation context handed to the condition algebra.
pub struct DctCalc<'a> {
    params: &'a DctParameters,
    leg: DctLeg,
    tdisc: BTreeSet<Timestamp>,
    tm: Timestamp,
    tm_end: Timestamp,
    dist_nm: f64,
    default_alt: BidirAltRange,
    messages: Vec<Message>,
}

impl<'a> DctCalc<'a> {
    fn new(params: &'a DctParameters, p0: &std::sync::Arc<Object>, p1: &std::sync::Arc<Object>, tdisc: BTreeSet<Timestamp>) -> Self {
        let mut leg = DctLeg::new(Link::resolved(p0.clone()), Link::resolved(p1.clone()));
        if leg.uuid(0) > leg.uuid(1) {
            leg.swapdir();
        }
        Self {
            params,
            leg,
            tdisc,
            tm: 0,
            tm_end: UNBOUNDED_FUTURE,
            dist_nm: f64::NAN,
            default_alt: BidirAltRange::from_interval(0, DEFAULT_ALT_CEILING),
            messages: Vec::new(),
        }
    }

    pub fn point(&self, index: usize) -> &std::sync::Arc<Object> {
        // legs are only built from resolved points
        self.leg.point(index).obj().expect("resolved point")
    }

    pub fn coord(&self, index: usize) -> Coord {
        self.point(index)
            .coord_at(self.tm)
            .unwrap_or(Coord::INVALID)
    }

    pub fn ident(&self, index: usize) -> String {
        self.point(index)
            .ident_at(self.tm)
            .unwrap_or_default()
            .to_string()
    }

    pub fn tte(&self, index: usize) -> TimeTableEval {
        TimeTableEval::new(self.tm, self.coord(index))
    }

    pub fn is_airport_at(&self, index: usize) -> bool {
        self.point(index).kind() == ObjectKind::Airport
    }

    pub fn is_airport(&self) -> bool {
        self.is_airport_at(0) || self.is_airport_at(1)
    }

    pub fn time(&self) -> Timestamp {
        self.tm
    }

    pub fn endtime(&self) -> Timestamp {
        self.tm_end
    }

    pub fn dist_nm(&self) -> f64 {
        self.dist_nm
    }

    /// The full analysis window both directions start from.
    pub fn default_alt(&self) -> &BidirAltRange {
        &self.default_alt
    }

    pub fn leg(&self) -> &DctLeg {
        &self.leg
    }

    fn message(&mut self, text: String, mtype: MessageType) {
        self.messages.push(Message::new(text, mtype, self.tm));
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Pins the evaluation window, for callers probing a single interval.
    pub fn set_window(&mut self, tm: Timestamp, tm_end: Timestamp) {
        self.tm = tm;
        self.tm_end = tm_end;
        let c0 = self.coord(0);
        let c1 = self.coord(1);
        if !c0.is_invalid() && !c1.is_invalid() {
            self.dist_nm = c0.dist_nm(&c1);
        }
    }

    /// Folds every applicable rule over every time window of the pair.
    pub fn run(&mut self) {
        let xarpt = [self.is_airport_at(0), self.is_airport_at(1)];
        let windows: Vec<Timestamp> = self.tdisc.iter().copied().collect();
        for w in windows.windows(2) {
            if self.params.is_cancelled() {
                break;
            }
            self.tm = w[0];
            self.tm_end = w[1];
            if self.tm >= self.params.tm_future_cutoff {
                break;
            }
            if self.tm_end <= self.params.tm_cutoff {
                continue;
            }
            self.tm_end = self.tm_end.min(self.params.tm_future_cutoff);
            let mut dir = [
                IntervalSet::from_interval(crate::interval::Interval::new(0, i32::MAX)),
                IntervalSet::from_interval(crate::interval::Interval::new(0, i32::MAX)),
            ];
            for j in 0..2 {
                if !xarpt[j] {
                    continue;
                }
                dir = [IntervalSet::empty(), IntervalSet::empty()];
                let far = self.leg.point(1 - j).clone();
                let arpt = self.leg.uuid(j);
                for lim in self.params.limits_for(&self.params.sid_limits, arpt) {
                    let band = lim.alt_interval(&far, self.tm);
                    dir[j] |= &band;
                }
                for lim in self.params.limits_for(&self.params.star_limits, arpt) {
                    let band = lim.alt_interval(&far, self.tm);
                    dir[1 - j] |= &band;
                }
            }
            if dir[0].is_empty() && dir[1].is_empty() && (xarpt[0] || xarpt[1]) {
                continue;
            }
            let altset = self.run_dct_time();
            for mut a in altset {
                *a.alt.dir_mut(0) &= &dir[0];
                *a.alt.dir_mut(1) &= &dir[1];
                self.leg.add(a);
            }
        }
        self.leg.simplify();
    }

    /// Candidate gating plus the per-rule fold for the current window.
    fn run_dct_time(&mut self) -> Vec<DctAlt> {
        let mut coords = [Coord::INVALID; 2];
        let mut arpt = false;
        for i in 0..2 {
            let Some(ts) = self.point(i).slice_at(self.tm) else {
                return Vec::new();
            };
            let Some(ident) = ts.payload().ident() else {
                return Vec::new();
            };
            if ident.len() < 2 || ident.bytes().all(|b| b.is_ascii_digit()) {
                return Vec::new();
            }
            let Some(coord) = ts.payload().coord() else {
                return Vec::new();
            };
            if coord.is_invalid() {
                return Vec::new();
            }
            coords[i] = coord;
            if let Some(nav) = ts.payload().as_navaid() {
                let t = nav.navaid_type;
                if !(t.is_vor() || t.is_dme() || t.is_tacan() || t.is_ndb() || t.is_mkr()) {
                    return Vec::new();
                }
            }
            if let Some(dp) = ts.payload().as_designated_point() {
                if dp.point_type != crate::model::DesignatedPointType::Icao {
                    return Vec::new();
                }
            }
            if ts.payload().as_airport().is_some() {
                arpt = true;
            }
        }
        self.dist_nm = coords[0].dist_nm(&coords[1]);
        let isdctseg = self
            .params
            .seg
            .contains(self.point(0).uuid(), self.point(1).uuid());
        if self.dist_nm > self.params.max_dist_nm && !isdctseg {
            return Vec::new();
        }
        if !self.params.all && !arpt {
            // modified-only runs recompute just what a changed rule touches
            let mut hit = false;
            for rule in &self.params.rules {
                if rule.0.modified() < self.params.tm_modified {
                    continue;
                }
                let Some(ts) = rule.slice_at(self.tm) else {
                    continue;
                };
                if !ts.enabled || !ts.is_dct() {
                    continue;
                }
                let bbox = rule.0.bbox();
                if bbox.is_intersect_segment(coords[0], coords[1]) {
                    hit = true;
                    break;
                }
            }
            if !hit {
                return Vec::new();
            }
        }
        let mut bbox = Rect::from_point(coords[0]);
        bbox = bbox.extend(coords[1]);
        let mut altset = Vec::new();
        {
            let mut tt = TimeTable::always();
            tt.limit(self.tm, self.tm_end);
            altset.push(DctAlt {
                alt: self.default_alt.clone(),
                timetable: tt,
            });
        }
        let rules: Vec<FlightRestriction> = self.params.rules.clone();
        for rule in &rules {
            let Some(ts) = rule.slice_at(self.tm) else {
                continue;
            };
            if !ts.enabled || !ts.is_dct() {
                continue;
            }
            let rule_bbox = rule.0.bbox();
            if !rule_bbox.is_invalid() && !bbox.is_intersect(&rule_bbox) {
                continue;
            }
            let rdct = ts.evaluate_dct(self);
            let mut ttdct = ts.timetable.clone();
            if ttdct.is_never() {
                ttdct = TimeTable::always();
            }
            self.update_altset(&mut altset, &rdct, ttdct);
            if altset.is_empty() {
                break;
            }
        }
        altset.retain(|a| !a.alt.is_empty() && !a.timetable.is_never());
        if altset.is_empty() {
            return altset;
        }
        if !isdctseg && !arpt {
            altset = self.elide_airway_preferred(altset, bbox);
        }
        altset
    }

    /// Splits the availability table by the rule's time table and folds
    /// the rule's verdict into the covered part.
    fn update_altset(&mut self, altset: &mut Vec<DctAlt>, rdct: &BidirAltRange, mut ttdct: TimeTable) {
        if *rdct == self.default_alt {
            return;
        }
        ttdct.limit(self.tm, self.tm_end);
        let mut ttdct_inv = ttdct.clone();
        ttdct_inv.invert();
        let mut out = Vec::with_capacity(altset.len());
        for entry in altset.drain(..) {
            let mut restricted = entry.alt.clone();
            restricted &= rdct;
            if restricted == entry.alt {
                out.push(entry);
                continue;
            }
            let mut tt_restricted = entry.timetable.clone();
            tt_restricted.intersect_with(&ttdct);
            let mut tt_unchanged = entry.timetable.clone();
            tt_unchanged.intersect_with(&ttdct_inv);
            if !tt_unchanged.is_never() && !entry.alt.is_empty() {
                out.push(DctAlt {
                    alt: entry.alt.clone(),
                    timetable: tt_unchanged,
                });
            }
            if !tt_restricted.is_never() && !restricted.is_empty() {
                out.push(DctAlt {
                    alt: restricted,
                    timetable: tt_restricted,
                });
            }
        }
        *altset = out;
    }

    /// Trims the direct band by the altitudes available along a routing
    /// network path that is not meaningfully longer.
    fn elide_airway_preferred(&mut self, altset: Vec<DctAlt>, bbox: Rect) -> Vec<DctAlt> {
        let graph = &self.params.graph;
        let vd = [
            graph.find_vertex(self.point(0).uuid()),
            graph.find_vertex(self.point(1).uuid()),
        ];
        let (Some(v0), Some(v1)) = (vd[0], vd[1]) else {
            return altset;
        };
        let vd = [v0, v1];
        let bbox = bbox.oversize_nm(10.0);
        let mut out = Vec::with_capacity(altset.len());
        for mut entry in altset {
            entry.timetable.simplify();
            entry.timetable.split(&self.params.route_tdisc);
            for tte in entry.timetable.entries().to_vec() {
                let t = tte.start();
                let mut ar = entry.alt.clone();
                for d in 0..2 {
                    loop {
                        let band = ar.dir(d).clone();
                        if band.is_empty() {
                            break;
                        }
                        let Some((dist, path)) =
                            graph.shortest_path(vd[d], vd[1 - d], &band, &bbox, t)
                        else {
                            break;
                        };
                        if dist > AIRWAY_PREFERRED_FACTOR * self.dist_nm {
                            break;
                        }
                        let mut rtear = IntervalSet::full();
                        for hop in path.windows(2) {
                            rtear &= &graph.band_between(hop[0], hop[1], t);
                            if rtear.is_empty() {
                                break;
                            }
                        }
                        let mut arx = ar.dir(d).clone();
                        arx -= &rtear;
                        if arx == *ar.dir(d) {
                            break;
                        }
                        *ar.dir_mut(d) = arx;
                    }
                }
                let mut tt = TimeTable::never();
                tt.push(tte.clone());
                if !ar.is_empty() {
                    out.push(DctAlt {
                        alt: ar,
                        timetable: tt,
                    });
                }
            }
        }
        out
    }

    /// Intersects the availability with the terrain floor: 1000 ft above
    /// the corridor maximum, 2000 ft above it above 5000 ft.
    pub fn run_topo(&mut self, oracle: &dyn TerrainOracle) {
        if self.leg.alts.is_empty() {
            return;
        }
        let c0 = self.coord(0);
        let c1 = self.coord(1);
        if c0.is_invalid() || c1.is_invalid() {
            return;
        }
        let Some((_terrain, corridor)) = oracle.corridor_elevation(c0, c1) else {
            return;
        };
        let mut minalt = corridor;
        if minalt >= 5000 {
            minalt += 1000;
        }
        minalt += 1000;
        let floor = IntervalSet::from_interval(crate::interval::Interval::new(minalt, i32::MAX));
        for a in &mut self.leg.alts {
            *a.alt.dir_mut(0) &= &floor;
            *a.alt.dir_mut(1) &= &floor;
        }
        self.leg.clear_empty();
    }
}

/// Accumulated non-fatal pipeline diagnostics.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineCounters {
    pub pairs: usize,
    pub legs: usize,
    pub warnings: usize,
    pub errors: usize,
}

/// Configuration and state of one pipeline run.
pub struct DctParameters {
    rules: Vec<FlightRestriction>,
    sid_limits: Vec<AirportDctLimit>,
    star_limits: Vec<AirportDctLimit>,
    points: Vec<std::sync::Arc<Object>>,
    radius_nm: Vec<f64>,
    graph: RouteGraph,
    seg: DctSegments,
    rule_tdisc: BTreeSet<Timestamp>,
    route_tdisc: BTreeSet<Timestamp>,
    condavail: ConditionalAvailability,
    ecac_bbox: Rect,
    tm_modified: Timestamp,
    tm_cutoff: Timestamp,
    tm_future_cutoff: Timestamp,
    max_dist_nm: f64,
    workers: usize,
    all: bool,
    cancelled: AtomicBool,
}

impl DctParameters {
    pub fn new(
        tm_modified: Timestamp,
        tm_cutoff: Timestamp,
        tm_future_cutoff: Timestamp,
        max_dist_nm: f64,
        workers: usize,
    ) -> Self {
        // crude approximation of the ECAC region
        let ecac_bbox = Rect::new(Coord::from_deg(17.0, -40.0), Coord::from_deg(82.0, 48.0));
        Self {
            rules: Vec::new(),
            sid_limits: Vec::new(),
            star_limits: Vec::new(),
            points: Vec::new(),
            radius_nm: Vec::new(),
            graph: RouteGraph::new(tm_cutoff),
            seg: DctSegments::default(),
            rule_tdisc: BTreeSet::new(),
            route_tdisc: BTreeSet::new(),
            condavail: ConditionalAvailability::default(),
            ecac_bbox,
            tm_modified,
            tm_cutoff,
            tm_future_cutoff,
            max_dist_nm,
            workers,
            all: false,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Requests cooperative cancellation; honoured between candidate
    /// pairs and between sub-intervals, an in-flight rule fold runs to
    /// completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn set_all(&mut self, all: bool) {
        self.all = all;
    }

    pub fn set_condavail(&mut self, condavail: ConditionalAvailability) {
        self.condavail = condavail;
    }

    /// Registers a departure limit; normally collected by
    /// [`load_rules`](Self::load_rules), exposed for collaborators
    /// feeding externally computed limits.
    pub fn add_sid_limit(&mut self, lim: AirportDctLimit) {
        self.sid_limits.push(lim);
        self.sid_limits.sort_by_key(AirportDctLimit::sort_key);
    }

    /// Registers an arrival limit.
    pub fn add_star_limit(&mut self, lim: AirportDctLimit) {
        self.star_limits.push(lim);
        self.star_limits.sort_by_key(AirportDctLimit::sort_key);
    }

    /// Registers a rule directly, bypassing the store.
    pub fn add_rule(&mut self, rule: FlightRestriction) {
        for ts in rule.0.slices() {
            let mut disc = std::collections::BTreeSet::new();
            ts.discontinuities(&mut disc);
            self.rule_tdisc.extend(disc);
        }
        self.rule_tdisc.insert(0);
        self.rule_tdisc.insert(UNBOUNDED_FUTURE);
        self.rules.push(rule);
    }

    /// The evaluation context for one candidate pair.
    pub fn calc<'a>(
        &'a self,
        p0: &std::sync::Arc<Object>,
        p1: &std::sync::Arc<Object>,
    ) -> DctCalc<'a> {
        DctCalc::new(self, p0, p1, self.pair_tdisc(p0, p1))
    }

    pub fn rules(&self) -> &[FlightRestriction] {
        &self.rules
    }

    pub fn points(&self) -> &[std::sync::Arc<Object>] {
        &self.points
    }

    pub fn segments(&self) -> &DctSegments {
        &self.seg
    }

    fn limits_for<'a>(
        &self,
        limits: &'a [AirportDctLimit],
        arpt: &Uuid,
    ) -> impl Iterator<Item = &'a AirportDctLimit> {
        let arpt = *arpt;
        limits
            .iter()
            .filter(move |lim| *lim.arpt.uuid() == arpt)
    }

    /// Loads the DCT rule set: collects airport limits, simplifies each
    /// rule for the pipeline, keeps only direct rules, and builds the
    /// routing graph used for the airway-preferred check.
    pub fn load_rules(&mut self, store: &Store) -> Result<PipelineCounters> {
        let mut counters = PipelineCounters::default();
        self.rules.clear();
        self.sid_limits.clear();
        self.star_limits.clear();
        self.seg = DctSegments::default();
        self.rule_tdisc = BTreeSet::new();
        self.rule_tdisc.insert(0);
        self.rule_tdisc.insert(UNBOUNDED_FUTURE);
        store.clear_cache();
        let filter = Filter::default().types(
            ObjectKind::FlightRestriction.base_byte(),
            ObjectKind::FlightRestriction.base_byte(),
        );
        let found = store.find_all(LoadMode::ObjectLinked, &filter)?;
        let mut rule_bbox = Rect::INVALID;
        for link in found {
            let Some(obj) = link.obj() else { continue };
            let Some(rule) = FlightRestriction::from_object(obj.clone()) else {
                continue;
            };
            // airport limits come from the unsimplified slices
            for ts in rule.0.slices() {
                if ts.start() >= self.tm_future_cutoff || ts.end() <= self.tm_cutoff {
                    continue;
                }
                let Some(fr) = ts.payload().as_flight_restriction() else {
                    continue;
                };
                let mut acc = DepArrDct::default();
                let mut connpt = DctConnPoints::default();
                if !fr.is_deparr_dct(&mut acc, &mut connpt) {
                    continue;
                }
                if acc.civmil == crate::restriction::CivMil::Mil {
                    continue;
                }
                let limit_nm = acc.dist_nm.unwrap_or(0.0);
                if limit_nm <= 0.0 && connpt.is_empty() {
                    continue;
                }
                let lim = AirportDctLimit {
                    arpt: acc.arpt.clone(),
                    start: ts.start(),
                    end: ts.end(),
                    limit_nm,
                    connpt,
                };
                let limits = if acc.arr {
                    &mut self.star_limits
                } else {
                    &mut self.sid_limits
                };
                limits.push(lim);
            }
            let mut rule = rule;
            if let Some(simplified) = rule.simplify() {
                rule = simplified;
            }
            if let Some(simplified) = rule.simplify_mil(false) {
                rule = simplified;
            }
            let mut dct = false;
            let mut bbox1 = Rect::INVALID;
            for ts in rule.0.slices() {
                if ts.start() >= self.tm_future_cutoff || ts.end() <= self.tm_cutoff {
                    continue;
                }
                let Some(fr) = ts.payload().as_flight_restriction() else {
                    continue;
                };
                fr.collect_dct_segments(&mut self.seg);
                let is_dct = fr.is_dct();
                if fr.procind.is_dct() != is_dct {
                    warn!(
                        "rule {} is {} but {} considered DCT",
                        fr.ident,
                        fr.procind,
                        if is_dct { "" } else { "not" }
                    );
                    counters.warnings += 1;
                }
                if !is_dct {
                    continue;
                }
                dct = true;
                let mut disc = BTreeSet::new();
                ts.discontinuities(&mut disc);
                self.rule_tdisc.extend(disc);
                for dep in rule.0.dependencies().iter() {
                    if let Some(obj) = dep.obj() {
                        self.rule_tdisc.extend(obj.discontinuities());
                    }
                }
                let mut acc = EnrouteDct::default();
                if fr.is_enroute_dct(&mut acc)
                    && acc.civmil != crate::restriction::CivMil::Mil
                {
                    bbox1 = bbox1.union(&rule.0.bbox());
                }
            }
            if !dct {
                continue;
            }
            rule_bbox = rule_bbox.union(&bbox1);
            self.rules.push(rule);
        }
        self.sid_limits.sort_by_key(AirportDctLimit::sort_key);
        self.star_limits.sort_by_key(AirportDctLimit::sort_key);
        self.rule_tdisc.extend(self.condavail.discontinuities());
        info!(
            "{} DCT rule(s), {}/{} airport limits",
            self.rules.len(),
            self.sid_limits.len(),
            self.star_limits.len()
        );
        // the routing graph for the airway-preferred check
        self.graph = RouteGraph::new(self.tm_cutoff);
        self.route_tdisc = BTreeSet::new();
        if !rule_bbox.is_invalid() {
            let filter = Filter::default().types(
                ObjectKind::RouteSegment.base_byte(),
                ObjectKind::RouteSegment.base_byte(),
            );
            let found = store.find_by_bbox(&rule_bbox, LoadMode::ObjectLinked, &filter)?;
            for link in found {
                let Some(obj) = link.obj() else { continue };
                if !obj.bbox().is_intersect(&self.ecac_bbox) {
                    continue;
                }
                self.route_tdisc.extend(obj.discontinuities());
                for dep in obj.dependencies().iter() {
                    if let Some(d) = dep.obj() {
                        self.route_tdisc.extend(d.discontinuities());
                    }
                }
                self.graph.add(obj.clone());
            }
        }
        debug!(
            "airway graph: {} vertices, {} edges",
            self.graph.vertex_count(),
            self.graph.edge_count()
        );
        Ok(counters)
    }

    /// Loads the candidate point set: every navaid or designated point
    /// within reach of an enroute rule, every airport with a limit, and
    /// every endpoint of an explicitly named direct.
    pub fn load_points(&mut self, store: &Store) -> Result<()> {
        self.points.clear();
        self.radius_nm.clear();
        let filter = Filter::default().types(
            ObjectKind::Navaid.base_byte(),
            ObjectKind::DesignatedPoint.base_byte(),
        );
        let mut found = store.find_all(LoadMode::ObjectLinked, &filter)?;
        {
            let mut arpts = BTreeSet::new();
            for lim in self.sid_limits.iter().chain(&self.star_limits) {
                arpts.insert(lim.arpt.clone());
            }
            for arpt in arpts {
                if let Some(obj) = store.load_linked(arpt.uuid(), u32::MAX)? {
                    found.push(Link::resolved(obj));
                }
            }
        }
        let mut pts: std::collections::BTreeMap<Uuid, (std::sync::Arc<Object>, f64)> =
            std::collections::BTreeMap::new();
        for link in &found {
            let Some(obj) = link.obj() else { continue };
            let is_arpt = obj.kind() == ObjectKind::Airport;
            if is_arpt {
                let has_limit = self
                    .sid_limits
                    .iter()
                    .chain(&self.star_limits)
                    .any(|lim| lim.arpt.uuid() == obj.uuid());
                if !has_limit {
                    continue;
                }
                pts.insert(*obj.uuid(), (obj.clone(), 0.0));
                continue;
            }
            let in_ecac = obj
                .slices()
                .iter()
                .filter_map(|ts| ts.payload().coord())
                .any(|c| self.ecac_bbox.is_inside(c));
            if !in_ecac {
                continue;
            }
            let mut radius = 0.0f64;
            let mut covered = false;
            for rule in &self.rules {
                for ts in rule.0.slices() {
                    let Some(fr) = ts.payload().as_flight_restriction() else {
                        continue;
                    };
                    if !fr.enabled {
                        continue;
                    }
                    let mut acc = EnrouteDct::default();
                    if !fr.is_enroute_dct(&mut acc) {
                        continue;
                    }
                    let dist = acc
                        .dist_nm
                        .unwrap_or(self.max_dist_nm)
                        .min(self.max_dist_nm);
                    let Some(aspc) = acc.airspace.obj() else {
                        continue;
                    };
                    let inside = obj.slices().iter().any(|pts_slice| {
                        let Some(coord) = pts_slice.payload().coord() else {
                            return false;
                        };
                        aspc.slices().iter().any(|aspc_slice| {
                            let Some(a) = aspc_slice.payload().as_airspace() else {
                                return false;
                            };
                            let tte = TimeTableEval::new(pts_slice.start(), coord);
                            a.is_inside(&tte, model::ALT_IGNORE, &acc.alt)
                        })
                    });
                    if inside {
                        radius = radius.max(dist);
                        covered = true;
                    }
                }
            }
            if covered {
                pts.insert(*obj.uuid(), (obj.clone(), radius));
            }
        }
        // endpoints of explicitly named directs get at least their length
        for rule in &self.rules {
            for ts in rule.0.slices() {
                let Some(fr) = ts.payload().as_flight_restriction() else {
                    continue;
                };
                if !fr.enabled
                    || ts.start() >= self.tm_future_cutoff
                    || ts.end() <= self.tm_cutoff
                {
                    continue;
                }
                let mut segs = DctSegments::default();
                fr.collect_dct_segments(&mut segs);
                for (a, b) in segs.iter() {
                    let (Some(pa), Some(pb)) = (
                        store.load_linked(a, u32::MAX)?,
                        store.load_linked(b, u32::MAX)?,
                    ) else {
                        continue;
                    };
                    let leg = DctLeg::new(Link::resolved(pa.clone()), Link::resolved(pb.clone()));
                    let (dmin, dmax) = leg.dist_nm();
                    if dmin.is_nan() || dmin > dmax {
                        continue;
                    }
                    for p in [pa, pb] {
                        pts.entry(*p.uuid())
                            .and_modify(|(_, r)| *r = r.max(dmax))
                            .or_insert((p, dmax));
                    }
                }
            }
        }
        for (_, (obj, radius)) in pts {
            self.points.push(obj);
            self.radius_nm.push(radius);
        }
        info!("{} candidate point(s)", self.points.len());
        Ok(())
    }

    fn pair_tdisc(&self, p0: &std::sync::Arc<Object>, p1: &std::sync::Arc<Object>) -> BTreeSet<Timestamp> {
        let mut tdisc = self.rule_tdisc.clone();
        tdisc.extend(p0.discontinuities());
        tdisc.extend(p1.discontinuities());
        for p in [p0, p1] {
            if p.kind() != ObjectKind::Airport {
                continue;
            }
            for lim in self
                .sid_limits
                .iter()
                .chain(&self.star_limits)
                .filter(|lim| lim.arpt.uuid() == p.uuid())
            {
                tdisc.insert(lim.start);
                tdisc.insert(lim.end);
            }
        }
        tdisc
    }

    /// Whether the pair is worth computing at all.
    fn pair_candidate(&self, i0: usize, i1: usize) -> Option<DctCalc<'_>> {
        let p0 = &self.points[i0];
        let p1 = &self.points[i1];
        let arpt0 = p0.kind() == ObjectKind::Airport;
        let arpt1 = p1.kind() == ObjectKind::Airport;
        if arpt0 && arpt1 {
            return None;
        }
        let tdisc = self.pair_tdisc(p0, p1);
        let calc = DctCalc::new(self, p0, p1, tdisc);
        if !arpt0 && !arpt1 {
            let (dmin, _) = calc.leg.dist_nm();
            let radius = self.radius_nm[i0].min(self.radius_nm[i1]);
            if !(dmin <= radius + 1.0) {
                return None;
            }
        }
        (!calc.leg.uuid(0).is_nil() && !calc.leg.uuid(1).is_nil()).then_some(calc)
    }

    /// Runs the pipeline: `workers` computation threads striping the
    /// outer point index, one aggregator committing to the store in
    /// batches. With zero workers everything runs on the caller's
    /// thread.
    ///
    /// `make_oracle` is invoked once per worker so every thread holds its
    /// own terrain handle.
    pub fn run<F>(&self, store: &mut Store, make_oracle: F) -> Result<PipelineCounters>
    where
        F: Fn() -> Option<Box<dyn TerrainOracle + Send>> + Sync,
    {
        let mut counters = PipelineCounters::default();
        store.drop_dct_indices()?;
        let save_empty = store.count_dct()? != 0;
        let n = self.points.len();
        info!(
            "{} points, {} pair(s), {} worker(s)",
            n,
            n.saturating_sub(1) * n / 2,
            self.workers
        );
        if self.workers == 0 {
            let oracle = make_oracle();
            let mut batch = 0usize;
            store.begin_dct_batch()?;
            'outer: for i0 in 0..n {
                for i1 in (i0 + 1)..n {
                    if self.is_cancelled() {
                        break 'outer;
                    }
                    counters.pairs += 1;
                    let Some(mut calc) = self.pair_candidate(i0, i1) else {
                        continue;
                    };
                    calc.run();
                    if let Some(oracle) = oracle.as_deref() {
                        calc.run_topo(oracle);
                    }
                    counters.warnings += calc
                        .messages
                        .iter()
                        .filter(|m| m.mtype == MessageType::Warning)
                        .count();
                    if save_empty || !calc.leg.is_empty() {
                        store.save_dct(&calc.leg)?;
                    }
                    if !calc.leg.is_empty() {
                        counters.legs += 1;
                        batch += 1;
                        if batch % COMMIT_BATCH == 0 {
                            store.commit_dct_batch()?;
                            store.begin_dct_batch()?;
                        }
                    }
                }
            }
            store.commit_dct_batch()?;
            store.create_dct_indices()?;
            return Ok(counters);
        }
        let queue = ResultQueue::new(self.workers);
        std::thread::scope(|scope| -> Result<()> {
            for w in 0..self.workers {
                let queue = &queue;
                let params = &*self;
                let oracle = make_oracle();
                scope.spawn(move || {
                    let mut i0 = w;
                    'outer: while i0 < n {
                        for i1 in (i0 + 1)..n {
                            if params.is_cancelled() {
                                break 'outer;
                            }
                            if let Some(mut calc) = params.pair_candidate(i0, i1) {
                                calc.run();
                                if let Some(oracle) = oracle.as_deref() {
                                    calc.run_topo(oracle);
                                }
                                queue.push(WorkItem {
                                    leg: calc.leg,
                                    messages: calc.messages,
                                });
                            }
                        }
                        i0 += params.workers;
                    }
                    queue.finish();
                });
            }
            let mut aggregate = |counters: &mut PipelineCounters| -> Result<()> {
                let mut batch = 0usize;
                store.begin_dct_batch()?;
                while let Some(item) = queue.pop() {
                    counters.pairs += 1;
                    counters.warnings += item
                        .messages
                        .iter()
                        .filter(|m| m.mtype == MessageType::Warning)
                        .count();
                    if save_empty || !item.leg.is_empty() {
                        store.save_dct(&item.leg)?;
                    }
                    if !item.leg.is_empty() {
                        counters.legs += 1;
                        batch += 1;
                        if batch % COMMIT_BATCH == 0 {
                            store.commit_dct_batch()?;
                            store.begin_dct_batch()?;
                        }
                    }
                }
                store.commit_dct_batch()
            };
            let result = aggregate(&mut counters);
            if result.is_err() {
                // unblock workers waiting on the full queue, then let the
                // scope join them
                self.cancel();
                while queue.pop().is_some() {}
            }
            result
        })?;
        store.create_dct_indices()?;
        Ok(counters)
    }
}

struct WorkItem {
    leg: DctLeg,
    messages: Vec<Message>,
}

/// Bounded multi-producer queue between the workers and the aggregator.
struct ResultQueue {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct QueueState {
    items: VecDeque<WorkItem>,
    finished: usize,
    workers: usize,
}

impl ResultQueue {
    fn new(workers: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                finished: 0,
                workers,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    fn push(&self, item: WorkItem) {
        let mut state = self.state.lock().expect("queue poisoned");
        while state.items.len() >= RESULT_QUEUE_LIMIT {
            state = self.not_full.wait(state).expect("queue poisoned");
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
    }

    fn finish(&self) {
        let mut state = self.state.lock().expect("queue poisoned");
        state.finished += 1;
        drop(state);
        self.not_empty.notify_all();
    }

    fn pop(&self) -> Option<WorkItem> {
        let mut state = self.state.lock().expect("queue poisoned");
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }
            if state.finished >= state.workers {
                return None;
            }
            state = self.not_empty.wait(state).expect("queue poisoned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dct_leg_blob_round_trip() {
        let mut leg = DctLeg::new(
            Link::new("11111111-1111-1111-1111-111111111111".parse().unwrap()),
            Link::new("22222222-2222-2222-2222-222222222222".parse().unwrap()),
        );
        let mut tt = TimeTable::always();
        tt.limit(1000, 2000);
        leg.add(DctAlt {
            alt: BidirAltRange::from_interval(6000, 24500),
            timetable: tt,
        });
        let blob = leg.encode().unwrap();
        let back = DctLeg::decode(leg.point(0).clone(), leg.point(1).clone(), &blob).unwrap();
        assert_eq!(back.alts(), leg.alts());
    }

    #[test]
    fn leg_add_merges_same_band() {
        let mut leg = DctLeg::new(Link::default(), Link::default());
        let band = BidirAltRange::from_interval(0, 10000);
        let mut tt0 = TimeTable::always();
        tt0.limit(0, 100);
        let mut tt1 = TimeTable::always();
        tt1.limit(100, 200);
        leg.add(DctAlt {
            alt: band.clone(),
            timetable: tt0,
        });
        leg.add(DctAlt {
            alt: band,
            timetable: tt1,
        });
        assert_eq!(leg.alts().len(), 1);
        assert!(leg.alts()[0]
            .timetable
            .covers(0, 200));
    }

    #[test]
    fn airport_limit_connpt_band() {
        let arpt = Link::new("11111111-1111-1111-1111-111111111111".parse().unwrap());
        let pt = Link::new("22222222-2222-2222-2222-222222222222".parse().unwrap());
        let mut connpt = DctConnPoints::default();
        connpt.insert(
            pt.clone(),
            IntervalSet::from_interval(crate::interval::Interval::new(0, 24500)),
        );
        let lim = AirportDctLimit {
            arpt,
            start: 0,
            end: 1000,
            limit_nm: 0.0,
            connpt,
        };
        assert!(lim.alt_interval(&pt, 500).contains(10000));
        assert!(lim.alt_interval(&pt, 1500).is_empty());
        let other = Link::new("33333333-3333-3333-3333-333333333333".parse().unwrap());
        // unresolved links cannot be measured, so no band is granted
        assert!(lim.alt_interval(&other, 500).is_empty());
    }

    #[test]
    fn result_queue_round_trip() {
        let queue = ResultQueue::new(1);
        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..10 {
                    queue.push(WorkItem {
                        leg: DctLeg::default(),
                        messages: Vec::new(),
                    });
                }
                queue.finish();
            });
            let mut count = 0;
            while queue.pop().is_some() {
                count += 1;
            }
            assert_eq!(count, 10);
        });
    }
}
