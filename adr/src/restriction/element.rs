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

//! The restriction side of a rule: what the plan must (or must not)
//! contain when the rule's condition holds.

use std::collections::BTreeMap;

use crate::altrange::{AltRange, BidirAltRange};
use crate::archive::{Archive, Hibernate};
use crate::dct::{DctCalc, DctSegments};
use crate::error::{Error, Result};
use crate::eval::{PathCode, RestrictionEval};
use crate::geom::Rect;
use crate::id::{Link, Uuid};
use crate::interval::IntervalSet;
use crate::restriction::result::{CondResult, RuleSegment, RuleSegmentType, RuleSequence};
use crate::timetable::Timestamp;

/// Altitude sets a departure or arrival DCT rule grants per connection
/// point.
pub type DctConnPoints = BTreeMap<Link, IntervalSet<i32>>;

const ELEMENT_INVALID: u8 = 0;
const ELEMENT_ROUTE: u8 = 1;
const ELEMENT_POINT: u8 = 2;
const ELEMENT_SIDSTAR: u8 = 3;
const ELEMENT_AIRSPACE: u8 = 4;

/// One element of a restriction sequence.
#[derive(Clone, PartialEq, Debug)]
pub enum RestrictionElement {
    /// A leg between two points: along an identified route, or a direct
    /// when the route link is nil.
    Route {
        alt: AltRange,
        point: [Link; 2],
        route: Link,
    },
    Point {
        alt: AltRange,
        point: Link,
    },
    SidStar {
        alt: AltRange,
        proc: Link,
        star: bool,
    },
    Airspace {
        alt: AltRange,
        airspace: Link,
    },
}

impl RestrictionElement {
    pub fn altrange(&self) -> &AltRange {
        match self {
            Self::Route { alt, .. }
            | Self::Point { alt, .. }
            | Self::SidStar { alt, .. }
            | Self::Airspace { alt, .. } => alt,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Self::Route { .. } => ELEMENT_ROUTE,
            Self::Point { .. } => ELEMENT_POINT,
            Self::SidStar { .. } => ELEMENT_SIDSTAR,
            Self::Airspace { .. } => ELEMENT_AIRSPACE,
        }
    }

    fn body<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        match self {
            Self::Route { alt, point, route } => {
                alt.hibernate(ar)?;
                ar.io_link(&mut point[0])?;
                ar.io_link(&mut point[1])?;
                ar.io_link(route)
            }
            Self::Point { alt, point } => {
                alt.hibernate(ar)?;
                ar.io_link(point)
            }
            Self::SidStar { alt, proc, star } => {
                alt.hibernate(ar)?;
                ar.io_link(proc)?;
                ar.io_bool(star)
            }
            Self::Airspace { alt, airspace } => {
                alt.hibernate(ar)?;
                ar.io_link(airspace)
            }
        }
    }

    /// Polymorphic IO: a discriminant byte precedes the body; the invalid
    /// discriminant encodes an absent element.
    pub fn io_opt<A: Archive>(slot: &mut Option<RestrictionElement>, ar: &mut A) -> Result<()> {
        if ar.is_load() {
            let mut disc = 0u8;
            ar.io_u8(&mut disc)?;
            let mut elem = match disc {
                ELEMENT_INVALID => {
                    *slot = None;
                    return Ok(());
                }
                ELEMENT_ROUTE => Self::Route {
                    alt: AltRange::default(),
                    point: [Link::default(), Link::default()],
                    route: Link::default(),
                },
                ELEMENT_POINT => Self::Point {
                    alt: AltRange::default(),
                    point: Link::default(),
                },
                ELEMENT_SIDSTAR => Self::SidStar {
                    alt: AltRange::default(),
                    proc: Link::default(),
                    star: false,
                },
                ELEMENT_AIRSPACE => Self::Airspace {
                    alt: AltRange::default(),
                    airspace: Link::default(),
                },
                _ => {
                    return Err(Error::Decode {
                        uuid: None,
                        source: adr_archive::DecodeError::UnknownDiscriminant {
                            offset: 0,
                            what: "restriction element",
                            value: disc,
                        },
                        blob: String::new(),
                    })
                }
            };
            elem.body(ar)?;
            *slot = Some(elem);
            return Ok(());
        }
        let mut disc = slot.as_ref().map_or(ELEMENT_INVALID, |e| e.discriminant());
        ar.io_u8(&mut disc)?;
        if let Some(elem) = slot {
            elem.body(ar)?;
        }
        Ok(())
    }

    /// True iff the element can constrain a direct leg.
    pub fn is_valid_dct(&self) -> bool {
        match self {
            Self::Route { route, .. } => route.is_nil(),
            Self::Point { .. } => true,
            _ => false,
        }
    }

    /// Scans the waypoint sequence for the element's pattern.
    pub fn evaluate(&self, ev: &RestrictionEval) -> CondResult {
        match self {
            Self::Route { alt, point, route } => {
                if self.is_valid_dct() {
                    self.evaluate_dct_leg(ev, alt, point)
                } else {
                    self.evaluate_route_leg(ev, alt, point, route)
                }
            }
            Self::Point { alt, point } => {
                let mut r = CondResult::new(false);
                let wpts = ev.waypoints();
                for (nr, wpt) in wpts.iter().enumerate() {
                    if !wpt.is_ifr() && (nr == 0 || !wpts[nr - 1].is_ifr()) {
                        continue;
                    }
                    if !alt.is_inside(wpt.altitude()) || wpt.point_uuid() != Some(*point.uuid()) {
                        continue;
                    }
                    r.set_result(Some(true));
                    r.vertexset_mut().insert(nr);
                }
                r
            }
            Self::SidStar { alt, proc, star } => {
                let wpts = ev.waypoints();
                if wpts.len() < 2 {
                    return CondResult::new(false);
                }
                let (vidx, eidx) = if *star {
                    (wpts.len() - 1, wpts.len() - 2)
                } else {
                    (0usize, 0usize)
                };
                let wpt = &wpts[vidx];
                if !wpt.is_ifr()
                    || !alt.is_inside(wpt.altitude())
                    || !wpts[eidx].is_path_match(proc.uuid())
                {
                    return CondResult::new(false);
                }
                let mut r = CondResult::new(true);
                r.vertexset_mut().insert(vidx);
                r.edgeset_mut().insert(eidx);
                r
            }
            Self::Airspace { alt, airspace } => {
                let mut r = CondResult::new(false);
                let Some(aspc) = airspace.obj() else {
                    return CondResult::indeterminate();
                };
                let wpts = ev.waypoints();
                for (nr, wpt) in wpts.iter().enumerate() {
                    if !wpt.is_ifr() && (nr == 0 || !wpts[nr - 1].is_ifr()) {
                        continue;
                    }
                    let Some(slice) = aspc
                        .slice_at(wpt.time())
                        .and_then(|ts| ts.payload().as_airspace())
                    else {
                        continue;
                    };
                    let tte = crate::timetable::TimeTableEval::new(wpt.time(), wpt.coord());
                    if slice.is_inside(&tte, wpt.altitude(), alt) {
                        r.set_result(Some(true));
                        r.vertexset_mut().insert(nr);
                    }
                }
                r
            }
        }
    }

    fn evaluate_dct_leg(
        &self,
        ev: &RestrictionEval,
        alt: &AltRange,
        point: &[Link; 2],
    ) -> CondResult {
        let mut r = CondResult::new(false);
        let wpts = ev.waypoints();
        for nr in 1..wpts.len() {
            let wpt0 = &wpts[nr - 1];
            let wpt1 = &wpts[nr];
            if !wpt0.is_ifr() || !alt.is_inside(wpt0.altitude()) {
                continue;
            }
            let plain_leg = wpt0.pathcode() == PathCode::None
                && !(nr > 1 && nr + 1 < wpts.len());
            if wpt0.pathcode() != PathCode::DirectTo && !wpt0.is_stay() && !plain_leg {
                continue;
            }
            if wpt0.point_uuid() == Some(*point[0].uuid())
                && wpt1.point_uuid() == Some(*point[1].uuid())
            {
                r.set_result(Some(true));
                r.edgeset_mut().insert(nr - 1);
            }
        }
        r
    }

    fn evaluate_route_leg(
        &self,
        ev: &RestrictionEval,
        alt: &AltRange,
        point: &[Link; 2],
        route: &Link,
    ) -> CondResult {
        let mut r = CondResult::new(false);
        let wpts = ev.waypoints();
        for nr in 1..wpts.len() {
            let wpt0 = &wpts[nr - 1];
            if !wpt0.is_ifr() || !alt.is_inside(wpt0.altitude()) {
                continue;
            }
            if wpt0.point_uuid() != Some(*point[0].uuid()) {
                continue;
            }
            // thread along the airway until the end point shows up
            let mut edges = Vec::new();
            let mut matched = false;
            for nre in nr..wpts.len() {
                let wpt = &wpts[nre - 1];
                let wpte = &wpts[nre];
                if !wpt.is_ifr() || !wpt.is_path_match(route.uuid()) {
                    break;
                }
                edges.push(nre - 1);
                if wpte.point_uuid() == Some(*point[1].uuid()) {
                    matched = true;
                    break;
                }
            }
            if matched {
                r.set_result(Some(true));
                r.edgeset_mut().extend(edges);
            }
        }
        r
    }

    /// The altitudes this element grants to the candidate direct leg, per
    /// direction.
    pub fn evaluate_dct(&self, dct: &DctCalc<'_>) -> BidirAltRange {
        match self {
            Self::Route { alt, point, .. } => {
                let mut x = BidirAltRange::from_altrange(alt);
                if !self.is_valid_dct() {
                    x.set_empty();
                    return x;
                }
                for i in 0..2 {
                    if *point[i].uuid() != *dct.point(0).uuid()
                        || *point[1 - i].uuid() != *dct.point(1).uuid()
                    {
                        *x.dir_mut(i) = IntervalSet::empty();
                    }
                }
                x
            }
            Self::Point { alt, point } => {
                let mut x = BidirAltRange::empty();
                for i in 0..2 {
                    if *point.uuid() == *dct.point(i).uuid() {
                        x = BidirAltRange::from_altrange(alt);
                        break;
                    }
                }
                x
            }
            _ => BidirAltRange::empty(),
        }
    }

    /// Canonical segment form.
    pub fn get_rule(&self) -> RuleSegment {
        match self {
            Self::Route { alt, point, route } => {
                let st = if route.is_nil() {
                    RuleSegmentType::Dct
                } else {
                    RuleSegmentType::Airway
                };
                RuleSegment::new(st, *alt)
                    .with_wpt0(point[0].obj().cloned())
                    .with_wpt1(point[1].obj().cloned())
                    .with_airway(route.obj().cloned())
            }
            Self::Point { alt, point } => {
                RuleSegment::new(RuleSegmentType::Point, *alt).with_wpt0(point.obj().cloned())
            }
            Self::SidStar { alt, proc, star } => {
                let st = if *star {
                    RuleSegmentType::Star
                } else {
                    RuleSegmentType::Sid
                };
                RuleSegment::new(st, *alt).with_wpt0(proc.obj().cloned())
            }
            Self::Airspace { alt, airspace } => {
                RuleSegment::new(RuleSegmentType::Airspace, *alt)
                    .with_wpt0(airspace.obj().cloned())
            }
        }
    }

    /// Extends `bbox` by the element's geographic extent within the
    /// slice's validity.
    pub fn add_bbox(&self, bbox: &mut Rect, t0: Timestamp, t1: Timestamp) {
        let links: &[&Link] = match self {
            Self::Route { point, .. } => &[&point[0], &point[1]],
            Self::Point { point, .. } => &[point],
            Self::SidStar { proc, .. } => &[proc],
            Self::Airspace { airspace, .. } => &[airspace],
        };
        for link in links {
            let Some(obj) = link.obj() else { continue };
            for ts in obj.slices() {
                if !ts.is_overlap(t0, t1) {
                    continue;
                }
                if let Some(b) = ts.bbox() {
                    *bbox = bbox.union(&b);
                }
            }
        }
    }

    /// True iff the element's extent touches `bbox` within `[t0, t1)`.
    pub fn is_bbox(&self, bbox: &Rect, t0: Timestamp, t1: Timestamp) -> bool {
        let mut own = Rect::INVALID;
        self.add_bbox(&mut own, t0, t1);
        if own.is_invalid() {
            // unresolved links keep the element
            return true;
        }
        bbox.is_intersect(&own)
    }

    /// True iff the element's band touches `[minalt, maxalt]`.
    pub fn is_altrange(&self, minalt: i32, maxalt: i32) -> bool {
        self.altrange().is_overlap(minalt, maxalt)
    }

    pub fn collect_dct_segments(&self, segs: &mut DctSegments) {
        let Self::Route { point, .. } = self else {
            return;
        };
        if !self.is_valid_dct() {
            return;
        }
        if let (Some(p0), Some(p1)) = (point[0].obj(), point[1].obj()) {
            segs.add(p0.clone(), p1.clone());
        }
    }

    /// Departure/arrival DCT view: the element must be a direct touching
    /// the airport; the far end contributes a connection point band.
    pub fn is_deparr_dct(&self, arpt: &Link, arr: bool, connpt: &mut DctConnPoints) -> bool {
        let Self::Route { alt, point, .. } = self else {
            return false;
        };
        if !self.is_valid_dct() {
            return false;
        }
        if point[usize::from(arr)] != *arpt {
            return false;
        }
        let band = alt.interval(true);
        if band.is_empty() {
            return true;
        }
        let far = point[usize::from(!arr)].clone();
        connpt
            .entry(far)
            .and_modify(|iv| iv.union_with(&band))
            .or_insert(band);
        true
    }

    /// Specialised copies for each matching crossing point.
    pub fn clone_crossingpoints(&self, pts: &[RuleSegment]) -> Vec<RestrictionElement> {
        let Self::Point { alt, point } = self else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for seg in pts {
            if !seg.is_point() || *point.uuid() != seg.uuid0() {
                continue;
            }
            let mut ar = *alt;
            ar.intersect(&seg.alt);
            out.push(Self::Point {
                alt: ar,
                point: point.clone(),
            });
        }
        out
    }

    /// Specialised copies for each matching crossing segment.
    pub fn clone_crossingsegments(&self, segs: &[RuleSegment]) -> Vec<RestrictionElement> {
        let Self::Route { alt, point, route } = self else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for seg in segs {
            if *point[0].uuid() != seg.uuid0() || *point[1].uuid() != seg.uuid1() {
                continue;
            }
            if seg.is_dct() {
                if !self.is_valid_dct() {
                    continue;
                }
            } else if seg.is_airway() {
                if self.is_valid_dct() || *route.uuid() != seg.airway_uuid() {
                    continue;
                }
            } else {
                continue;
            }
            let mut ar = *alt;
            ar.intersect(&seg.alt);
            out.push(Self::Route {
                alt: ar,
                point: point.clone(),
                route: route.clone(),
            });
        }
        out
    }

    fn matches_mandatory_point(&self, pt: &RuleSegment, own: &AltRange) -> bool {
        if pt.alt.is_lower_valid() && (!own.is_lower_valid() || pt.alt.lower() > own.lower()) {
            return false;
        }
        if pt.alt.is_upper_valid() && (!own.is_upper_valid() || pt.alt.upper() < own.upper()) {
            return false;
        }
        true
    }

    /// True iff the element ends at one of the mandatory crossing points.
    pub fn is_mandatory_inbound(&self, _t0: Timestamp, _t1: Timestamp, pts: &[RuleSegment]) -> bool {
        match self {
            Self::Route { alt, point, .. } => pts.iter().any(|pt| {
                pt.is_point()
                    && *point[1].uuid() == pt.uuid0()
                    && self.matches_mandatory_point(pt, alt)
            }),
            Self::SidStar { alt, proc, star } if *star => pts.iter().any(|pt| {
                pt.is_point()
                    && proc_airport_is(proc, pt.uuid0())
                    && self.matches_mandatory_point(pt, alt)
            }),
            _ => false,
        }
    }

    /// True iff the element starts at one of the mandatory crossing
    /// points.
    pub fn is_mandatory_outbound(
        &self,
        _t0: Timestamp,
        _t1: Timestamp,
        pts: &[RuleSegment],
    ) -> bool {
        match self {
            Self::Route { alt, point, .. } => pts.iter().any(|pt| {
                pt.is_point()
                    && *point[0].uuid() == pt.uuid0()
                    && self.matches_mandatory_point(pt, alt)
            }),
            Self::SidStar { alt, proc, star } if !*star => pts.iter().any(|pt| {
                pt.is_point()
                    && proc_airport_is(proc, pt.uuid0())
                    && self.matches_mandatory_point(pt, alt)
            }),
            _ => false,
        }
    }

    pub fn to_shortstr(&self, tm: Timestamp) -> String {
        self.get_rule().to_shortstr(tm)
    }
}

fn proc_airport_is(proc: &Link, airport: Uuid) -> bool {
    let Some(obj) = proc.obj() else {
        return false;
    };
    let mut matched = false;
    for ts in obj.slices() {
        let arpt = match ts.payload() {
            crate::model::SlicePayload::Sid(s) => &s.proc.airport,
            crate::model::SlicePayload::Star(s) => &s.proc.airport,
            _ => continue,
        };
        if *arpt.uuid() == airport {
            matched = true;
        } else {
            return false;
        }
    }
    matched
}

/// A conjunction of elements that must match at non-decreasing waypoint
/// positions.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct RestrictionSequence {
    pub elements: Vec<RestrictionElement>,
}

impl RestrictionSequence {
    pub fn evaluate(&self, ev: &RestrictionEval) -> CondResult {
        let mut r = CondResult::new(true);
        let mut first = true;
        for elem in &self.elements {
            if first {
                r = elem.evaluate(ev);
                first = false;
            } else {
                let r1 = elem.evaluate(ev);
                if r.last() > r1.first() {
                    r = CondResult::new(false);
                }
                r.and_assign(&r1);
            }
        }
        r
    }

    pub fn evaluate_dct(&self, dct: &DctCalc<'_>) -> BidirAltRange {
        let mut x = BidirAltRange::full();
        for elem in &self.elements {
            x &= &elem.evaluate_dct(dct);
            if x.is_empty() {
                break;
            }
        }
        x
    }

    pub fn get_rule(&self) -> RuleSequence {
        RuleSequence(
            self.elements
                .iter()
                .map(RestrictionElement::get_rule)
                .filter(|seg| seg.segment_type != RuleSegmentType::Invalid)
                .collect(),
        )
    }

    pub fn is_valid_dct(&self) -> bool {
        self.elements.iter().all(RestrictionElement::is_valid_dct)
    }

    pub fn add_bbox(&self, bbox: &mut Rect, t0: Timestamp, t1: Timestamp) {
        for elem in &self.elements {
            elem.add_bbox(bbox, t0, t1);
        }
    }

    pub fn is_bbox(&self, bbox: &Rect, t0: Timestamp, t1: Timestamp) -> bool {
        self.elements.iter().all(|e| e.is_bbox(bbox, t0, t1))
    }

    pub fn is_altrange(&self, minalt: i32, maxalt: i32) -> bool {
        self.elements.iter().all(|e| e.is_altrange(minalt, maxalt))
    }

    pub fn collect_dct_segments(&self, segs: &mut DctSegments) {
        for elem in &self.elements {
            elem.collect_dct_segments(segs);
        }
    }

    /// A dep/arr DCT sequence is a single direct element at the airport.
    pub fn is_deparr_dct(&self, arpt: &Link, arr: bool, connpt: &mut DctConnPoints) -> bool {
        match self.elements.as_slice() {
            [single] => single.is_deparr_dct(arpt, arr, connpt),
            _ => false,
        }
    }

    pub fn clone_crossingpoints(
        &self,
        out: &mut Vec<RestrictionSequence>,
        pts: &[RuleSegment],
    ) -> bool {
        let mut expanded = false;
        for elem in &self.elements {
            let specialised = elem.clone_crossingpoints(pts);
            if specialised.is_empty() || expanded {
                return false;
            }
            expanded = true;
            for e in specialised {
                out.push(RestrictionSequence { elements: vec![e] });
            }
        }
        true
    }

    pub fn clone_crossingsegments(
        &self,
        out: &mut Vec<RestrictionSequence>,
        segs: &[RuleSegment],
    ) -> bool {
        let mut expanded = false;
        for elem in &self.elements {
            let specialised = elem.clone_crossingsegments(segs);
            if specialised.is_empty() || expanded {
                return false;
            }
            expanded = true;
            for e in specialised {
                out.push(RestrictionSequence { elements: vec![e] });
            }
        }
        true
    }

    pub fn is_mandatory_inbound(&self, t0: Timestamp, t1: Timestamp, pts: &[RuleSegment]) -> bool {
        self.elements
            .last()
            .is_some_and(|e| e.is_mandatory_inbound(t0, t1, pts))
    }

    pub fn is_mandatory_outbound(&self, t0: Timestamp, t1: Timestamp, pts: &[RuleSegment]) -> bool {
        self.elements
            .last()
            .is_some_and(|e| e.is_mandatory_outbound(t0, t1, pts))
    }

    pub fn to_shortstr(&self, tm: Timestamp) -> String {
        self.elements
            .iter()
            .map(|e| e.to_shortstr(tm))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Hibernate for RestrictionSequence {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        let mut n = self.elements.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.elements.clear();
            for _ in 0..n {
                let mut slot = None;
                RestrictionElement::io_opt(&mut slot, ar)?;
                if let Some(elem) = slot {
                    self.elements.push(elem);
                }
            }
        } else {
            for elem in &mut self.elements {
                let mut slot = Some(std::mem::replace(
                    elem,
                    RestrictionElement::Point {
                        alt: AltRange::default(),
                        point: Link::default(),
                    },
                ));
                RestrictionElement::io_opt(&mut slot, ar)?;
                if let Some(e) = slot {
                    *elem = e;
                }
            }
        }
        Ok(())
    }
}

/// The restriction set of a rule: alternatives of sequences.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Restrictions {
    pub sequences: Vec<RestrictionSequence>,
}

impl Restrictions {
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Evaluates all sequences, filling per-sequence results.
    ///
    /// For a forbidden rule the set passes iff no sequence matches; for a
    /// mandatory one iff at least one does. An empty set is vacuously
    /// satisfied either way.
    pub fn evaluate(
        &self,
        ev: &RestrictionEval,
        results: &mut Vec<crate::restriction::result::RestrictionSequenceResult>,
        forbidden: bool,
    ) -> bool {
        let mut ruleok = forbidden || self.sequences.is_empty();
        for seq in &self.sequences {
            let r = seq.evaluate(ev);
            results.push(crate::restriction::result::RestrictionSequenceResult {
                sequence: seq.get_rule(),
                vertexset: r.vertexset().clone(),
                edgeset: r.edgeset().clone(),
            });
            if forbidden {
                ruleok = ruleok && !r.is_true();
            } else {
                ruleok = ruleok || r.is_true();
            }
        }
        ruleok
    }

    /// The altitudes the set grants (or, for a forbidden rule, leaves) to
    /// the candidate direct leg.
    pub fn evaluate_dct(&self, dct: &DctCalc<'_>, forbidden: bool) -> BidirAltRange {
        let mut x = BidirAltRange::empty();
        if forbidden {
            x.set_full();
        }
        for seq in &self.sequences {
            let mut x1 = seq.evaluate_dct(dct);
            if forbidden {
                x1.invert();
                x &= &x1;
            } else {
                x |= &x1;
            }
        }
        x
    }

    pub fn is_valid_dct(&self) -> bool {
        self.sequences.iter().all(RestrictionSequence::is_valid_dct)
    }

    pub fn add_bbox(&self, bbox: &mut Rect, t0: Timestamp, t1: Timestamp) {
        for seq in &self.sequences {
            seq.add_bbox(bbox, t0, t1);
        }
    }

    /// Drops sequences outside `bbox`; true iff anything changed.
    pub fn simplify_bbox(&mut self, bbox: &Rect, t0: Timestamp, t1: Timestamp) -> bool {
        let before = self.sequences.len();
        self.sequences.retain(|seq| seq.is_bbox(bbox, t0, t1));
        before != self.sequences.len()
    }

    /// Drops sequences outside the altitude band; true iff anything
    /// changed.
    pub fn simplify_altrange(&mut self, minalt: i32, maxalt: i32) -> bool {
        let before = self.sequences.len();
        self.sequences.retain(|seq| seq.is_altrange(minalt, maxalt));
        before != self.sequences.len()
    }

    pub fn collect_dct_segments(&self, segs: &mut DctSegments) {
        for seq in &self.sequences {
            seq.collect_dct_segments(segs);
        }
    }

    pub fn is_deparr_dct(&self, arpt: &Link, arr: bool, connpt: &mut DctConnPoints) -> bool {
        !self.sequences.is_empty()
            && self
                .sequences
                .iter()
                .all(|seq| seq.is_deparr_dct(arpt, arr, connpt))
    }

    pub fn clone_crossingpoints(&self, out: &mut Restrictions, pts: &[RuleSegment]) -> bool {
        self.sequences
            .iter()
            .all(|seq| seq.clone_crossingpoints(&mut out.sequences, pts))
    }

    pub fn clone_crossingsegments(&self, out: &mut Restrictions, segs: &[RuleSegment]) -> bool {
        self.sequences
            .iter()
            .all(|seq| seq.clone_crossingsegments(&mut out.sequences, segs))
    }

    pub fn is_mandatory_inbound(&self, t0: Timestamp, t1: Timestamp, pts: &[RuleSegment]) -> bool {
        !self.sequences.is_empty()
            && self
                .sequences
                .iter()
                .all(|seq| seq.is_mandatory_inbound(t0, t1, pts))
    }

    pub fn is_mandatory_outbound(&self, t0: Timestamp, t1: Timestamp, pts: &[RuleSegment]) -> bool {
        !self.sequences.is_empty()
            && self
                .sequences
                .iter()
                .all(|seq| seq.is_mandatory_outbound(t0, t1, pts))
    }

    pub fn get_rules(&self) -> Vec<RuleSequence> {
        self.sequences
            .iter()
            .map(RestrictionSequence::get_rule)
            .collect()
    }

    pub fn to_shortstr(&self, tm: Timestamp) -> String {
        self.sequences
            .iter()
            .map(|s| s.to_shortstr(tm))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl Hibernate for Restrictions {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        let mut n = self.sequences.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            self.sequences.clear();
            self.sequences
                .resize(n as usize, RestrictionSequence::default());
        }
        for seq in &mut self.sequences {
            seq.hibernate(ar)?;
        }
        Ok(())
    }
}
