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

//! Flight plan evaluation against a rule set.
//!
//! [`RestrictionEval`] carries the filed plan as a waypoint sequence,
//! the loaded rules, the route graph and the conditional-availability
//! view, and executes every rule in order: there is no short-circuit
//! across rules, the caller gets the whole set of failures.

use std::collections::{BTreeSet, HashMap};

use log::{debug, warn};

use crate::error::Result;
use crate::geom::{Coord, Rect};
use crate::graph::RouteGraph;
use crate::id::{Link, Uuid};
use crate::model::{self, ObjectKind};
use crate::restriction::{
    AircraftCategory, CivMil, EngineClass, FlightRestriction, Message, MessageType,
    RestrictionResults,
};
use crate::timetable::Timestamp;

/// How a leg leaves its starting waypoint.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum PathCode {
    #[default]
    None,
    Airway,
    Sid,
    Star,
    DirectTo,
}

/// One waypoint of the filed plan.
#[derive(Clone, Debug)]
pub struct Waypoint {
    ident: String,
    coord: Coord,
    time: Timestamp,
    altitude: i32,
    ifr: bool,
    stay: bool,
    pathcode: PathCode,
    point: Link,
    path: Link,
}

impl Waypoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ident: impl Into<String>,
        coord: Coord,
        time: Timestamp,
        altitude: i32,
        ifr: bool,
        pathcode: PathCode,
        point: Link,
        path: Link,
    ) -> Self {
        Self {
            ident: ident.into(),
            coord,
            time,
            altitude,
            ifr,
            stay: false,
            pathcode,
            point,
            path,
        }
    }

    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn coord(&self) -> Coord {
        self.coord
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn altitude(&self) -> i32 {
        self.altitude
    }

    pub fn is_ifr(&self) -> bool {
        self.ifr
    }

    /// A STAY leg holds at the waypoint; treated like a direct.
    pub fn is_stay(&self) -> bool {
        self.stay
    }

    pub fn set_stay(&mut self, stay: bool) {
        self.stay = stay;
    }

    pub fn pathcode(&self) -> PathCode {
        self.pathcode
    }

    pub fn set_pathcode(&mut self, pc: PathCode) {
        self.pathcode = pc;
    }

    pub fn point(&self) -> &Link {
        &self.point
    }

    pub fn point_uuid(&self) -> Option<Uuid> {
        if self.point.is_nil() {
            None
        } else {
            Some(*self.point.uuid())
        }
    }

    pub fn path(&self) -> &Link {
        &self.path
    }

    /// True iff the leg starting here follows the identified path object.
    pub fn is_path_match(&self, uuid: &Uuid) -> bool {
        matches!(
            self.pathcode,
            PathCode::Airway | PathCode::Sid | PathCode::Star
        ) && *self.path.uuid() == *uuid
    }
}

/// Filed aircraft properties a rule may test.
#[derive(Clone, Debug, Default)]
pub struct Aircraft {
    pub icao_type: String,
    pub category: AircraftCategory,
    pub engines: u8,
    pub engine: EngineClass,
    /// RNAV 1 PBN capability.
    pub rnav1: bool,
    /// RVSM approval.
    pub rvsm: bool,
}

/// The filed plan.
#[derive(Clone, Debug, Default)]
pub struct FlightPlan {
    pub aircraft: Aircraft,
    pub flight_type: char,
    pub civmil: CivMil,
    pub departure_time: Timestamp,
    pub waypoints: Vec<Waypoint>,
}

/// Conditional availability (AUP) view: activation windows per object.
///
/// Keyed by airspace UUID for area activations and by route segment UUID
/// for conditional route openings.
#[derive(Clone, Debug, Default)]
pub struct ConditionalAvailability {
    windows: HashMap<Uuid, Vec<(Timestamp, Timestamp, bool)>>,
}

impl ConditionalAvailability {
    pub fn clear(&mut self) {
        self.windows.clear();
    }

    pub fn insert(&mut self, uuid: Uuid, start: Timestamp, end: Timestamp, active: bool) {
        self.windows.entry(uuid).or_default().push((start, end, active));
    }

    /// Activation state at an instant; inactive when nothing is known.
    pub fn is_active(&self, uuid: &Uuid, t: Timestamp) -> bool {
        self.windows
            .get(uuid)
            .into_iter()
            .flatten()
            .any(|&(s, e, active)| active && s <= t && t < e)
    }

    /// Constant activation state over a window, `None` when it switches.
    pub fn activation_over(&self, uuid: &Uuid, t0: Timestamp, t1: Timestamp) -> Option<bool> {
        let mut cuts: BTreeSet<Timestamp> = BTreeSet::new();
        cuts.insert(t0);
        for &(s, e, _) in self.windows.get(uuid).into_iter().flatten() {
            if s > t0 && s < t1 {
                cuts.insert(s);
            }
            if e > t0 && e < t1 {
                cuts.insert(e);
            }
        }
        let mut state = None;
        for &t in &cuts {
            let active = self.is_active(uuid, t);
            match state {
                None => state = Some(active),
                Some(prev) if prev != active => return None,
                _ => {}
            }
        }
        state
    }

    /// All switch points, for the pipeline's interval subdivision.
    pub fn discontinuities(&self) -> BTreeSet<Timestamp> {
        let mut out = BTreeSet::new();
        for windows in self.windows.values() {
            for &(s, e, _) in windows {
                out.insert(s);
                out.insert(e);
            }
        }
        out
    }
}

/// Evaluates a filed plan against the loaded rules.
#[derive(Default)]
pub struct RestrictionEval {
    all_rules: Vec<FlightRestriction>,
    rules: Vec<FlightRestriction>,
    fplan: FlightPlan,
    waypoints: Vec<Waypoint>,
    graph: Option<RouteGraph>,
    condavail: ConditionalAvailability,
    messages: Vec<Message>,
    results: RestrictionResults,
    traced: BTreeSet<Uuid>,
    disabled: BTreeSet<Uuid>,
}

impl RestrictionEval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fplan(&mut self, fplan: FlightPlan) {
        self.waypoints = fplan.waypoints.clone();
        self.fplan = FlightPlan {
            waypoints: Vec::new(),
            ..fplan
        };
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn aircraft(&self) -> &Aircraft {
        &self.fplan.aircraft
    }

    pub fn civmil(&self) -> CivMil {
        self.fplan.civmil
    }

    pub fn flight_type(&self) -> char {
        self.fplan.flight_type
    }

    pub fn departure_time(&self) -> Timestamp {
        self.fplan.departure_time
    }

    pub fn condavail(&self) -> &ConditionalAvailability {
        &self.condavail
    }

    pub fn condavail_mut(&mut self) -> &mut ConditionalAvailability {
        &mut self.condavail
    }

    pub fn graph(&self) -> Option<&RouteGraph> {
        self.graph.as_ref()
    }

    pub fn set_graph(&mut self, graph: RouteGraph) {
        self.graph = Some(graph);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn results(&self) -> &RestrictionResults {
        &self.results
    }

    pub fn rules(&self) -> &[FlightRestriction] {
        &self.rules
    }

    pub fn count_rules(&self) -> usize {
        self.all_rules.len()
    }

    fn message(&mut self, msg: Message) {
        self.messages.push(msg);
    }

    /// Loads every rule valid at the departure time (or all rules when no
    /// plan is set), resolving their links.
    pub fn load_rules(&mut self, store: &crate::db::Store) -> Result<()> {
        self.all_rules.clear();
        self.rules.clear();
        store.clear_cache();
        let filter = if self.waypoints.is_empty() {
            crate::db::Filter::default()
        } else {
            crate::db::Filter::default()
                .time(self.departure_time(), self.departure_time() + 1)
        };
        let filter = filter.types(
            ObjectKind::FlightRestriction.base_byte(),
            ObjectKind::FlightRestriction.base_byte(),
        );
        let found = store.find_all(crate::db::LoadMode::ObjectLinked, &filter)?;
        for link in found {
            let Some(obj) = link.obj() else { continue };
            if let Some(rule) = FlightRestriction::from_object(obj.clone()) {
                self.all_rules.push(rule);
            }
        }
        self.rules = self.all_rules.clone();
        debug!("loaded {} rule(s)", self.all_rules.len());
        Ok(())
    }

    /// Builds the route graph from everything near the plan.
    pub fn build_graph(&mut self, store: &crate::db::Store) -> Result<()> {
        let mut bbox = Rect::INVALID;
        for wpt in &self.waypoints {
            bbox = bbox.extend(wpt.coord());
        }
        if bbox.is_invalid() {
            return Ok(());
        }
        let bbox = bbox.oversize_nm(100.0);
        let t = self.departure_time();
        let filter = crate::db::Filter::default()
            .time(t, t + 1)
            .types(model::TYPE_POINT_START, model::TYPE_LINE_END);
        let found = store.find_by_bbox(&bbox, crate::db::LoadMode::ObjectLinked, &filter)?;
        let mut graph = RouteGraph::new(t);
        for link in &found {
            if let Some(obj) = link.obj() {
                graph.add(obj.clone());
            }
        }
        debug!(
            "route graph: {} vertices, {} edges",
            graph.vertex_count(),
            graph.edge_count()
        );
        self.graph = Some(graph);
        Ok(())
    }

    pub fn reset_rules(&mut self) {
        self.rules = self.all_rules.clone();
        self.disabled.clear();
    }

    /// Disables the identified rule; true iff it was found.
    pub fn disable_rule(&mut self, ident: &str) -> bool {
        let mut found = false;
        for rule in &self.rules {
            if rule
                .0
                .slices()
                .iter()
                .any(|ts| ts.payload().ident() == Some(ident))
            {
                self.disabled.insert(*rule.uuid());
                found = true;
            }
        }
        found
    }

    /// Marks the identified rule for tracing; true iff it was found.
    pub fn trace_rule(&mut self, ident: &str) -> bool {
        let mut found = false;
        for rule in &self.rules {
            if rule
                .0
                .slices()
                .iter()
                .any(|ts| ts.payload().ident() == Some(ident))
            {
                self.traced.insert(*rule.uuid());
                found = true;
            }
        }
        found
    }

    fn retain_rewritten<F>(&mut self, f: F)
    where
        F: Fn(&FlightRestriction) -> Option<FlightRestriction>,
    {
        let mut out = Vec::with_capacity(self.rules.len());
        for rule in self.rules.drain(..) {
            let rule = f(&rule).unwrap_or(rule);
            if rule.is_keep() {
                out.push(rule);
            }
        }
        self.rules = out;
    }

    /// Constant folding and the complexity decompositions.
    pub fn simplify_rules(&mut self) {
        self.retain_rewritten(|rule| {
            let mut cur = rule.clone();
            let mut modified = false;
            for pass in [
                FlightRestriction::simplify,
                FlightRestriction::simplify_complexity_crossingpoints,
                FlightRestriction::simplify_complexity_crossingsegments,
                FlightRestriction::simplify_complexity_closedairspace,
            ] {
                if let Some(next) = pass(&cur) {
                    cur = next;
                    modified = true;
                }
            }
            modified.then_some(cur)
        });
    }

    pub fn simplify_rules_time(&mut self, t0: Timestamp, t1: Timestamp) {
        self.retain_rewritten(|rule| rule.simplify_time(t0, t1));
    }

    pub fn simplify_rules_bbox(&mut self, bbox: &Rect) {
        self.retain_rewritten(|rule| rule.simplify_bbox(bbox));
    }

    pub fn simplify_rules_altrange(&mut self, minalt: i32, maxalt: i32) {
        self.retain_rewritten(|rule| rule.simplify_altrange(minalt, maxalt));
    }

    pub fn simplify_rules_aircrafttype(&mut self, acfttype: &str) {
        self.retain_rewritten(|rule| rule.simplify_aircrafttype(acfttype));
    }

    pub fn simplify_rules_aircraftclass(&mut self, acftclass: &str) {
        self.retain_rewritten(|rule| rule.simplify_aircraftclass(acftclass));
    }

    pub fn simplify_rules_equipment(&mut self, rnav1: bool, rvsm: bool) {
        self.retain_rewritten(|rule| rule.simplify_equipment(rnav1, rvsm));
    }

    pub fn simplify_rules_typeofflight(&mut self, type_of_flight: char) {
        self.retain_rewritten(|rule| rule.simplify_typeofflight(type_of_flight));
    }

    pub fn simplify_rules_mil(&mut self, mil: bool) {
        self.retain_rewritten(|rule| rule.simplify_mil(mil));
    }

    pub fn simplify_rules_dep(&mut self, arpt: &Uuid) {
        self.retain_rewritten(|rule| rule.simplify_dep(arpt));
    }

    pub fn simplify_rules_dest(&mut self, arpt: &Uuid) {
        self.retain_rewritten(|rule| rule.simplify_dest(arpt));
    }

    pub fn simplify_rules_conditionalavailability(&mut self, t0: Timestamp, t1: Timestamp) {
        let condavail = self.condavail.clone();
        self.retain_rewritten(|rule| rule.simplify_conditionalavailability(&condavail, t0, t1));
    }

    /// Checks the filed plan: integrity first, then every enabled rule.
    ///
    /// Returns true iff the plan passes. Failures and diagnostics are
    /// left in [`results`](Self::results) and [`messages`](Self::messages).
    pub fn check_fplan(&mut self) -> bool {
        self.messages.clear();
        self.results.0.clear();
        if !self.check_integrity() {
            return false;
        }
        let plan_bbox = {
            let mut bbox = Rect::INVALID;
            for wpt in &self.waypoints {
                bbox = bbox.extend(wpt.coord());
            }
            bbox
        };
        let index = RuleIndex::new(self.rules.iter(), self.departure_time());
        let candidates = index.candidates(&plan_bbox);
        debug!(
            "checking {} of {} rule(s) against the plan",
            candidates.len(),
            self.rules.len()
        );
        let mut failures = Vec::new();
        let mut msgs = Vec::new();
        for idx in candidates {
            let rule = &self.rules[idx];
            if self.disabled.contains(rule.uuid()) {
                msgs.push(
                    Message::new("rule disabled", MessageType::Info, self.departure_time())
                        .with_rule(Some(rule.0.clone())),
                );
                continue;
            }
            let verdict = rule.evaluate(self);
            if verdict.indeterminate {
                msgs.push(
                    Message::new(
                        "cannot evaluate condition",
                        MessageType::Warning,
                        self.departure_time(),
                    )
                    .with_rule(Some(rule.0.clone())),
                );
            }
            if let Some(result) = verdict.result {
                if !verdict.ok {
                    failures.push(result);
                }
            }
            if !verdict.ok && self.traced.contains(rule.uuid()) {
                msgs.push(
                    Message::new("rule failed", MessageType::Trace, self.departure_time())
                        .with_rule(Some(rule.0.clone())),
                );
            }
        }
        self.messages.extend(msgs);
        self.results.0 = failures;
        self.results.is_ok()
    }

    fn check_integrity(&mut self) -> bool {
        if self.waypoints.len() < 2 {
            self.message(Message::new(
                "degenerate flight plan",
                MessageType::Error,
                self.departure_time(),
            ));
            return false;
        }
        let t = self.departure_time();
        let mut ok = true;
        let mut msgs = Vec::new();
        for (i, wpt) in self.waypoints.iter().enumerate() {
            let Some(obj) = wpt.point().obj() else {
                if wpt.is_ifr() || (i > 0 && self.waypoints[i - 1].is_ifr()) {
                    let mut m = Message::new(
                        format!("IFR leg but unknown point {}", wpt.ident()),
                        MessageType::Error,
                        t,
                    );
                    m.vertexset.insert(i);
                    msgs.push(m);
                    ok = false;
                }
                continue;
            };
            let Some(slice) = obj.slice_at(wpt.time()) else {
                let mut m = Message::new(
                    format!("point {} not valid at overflight time", wpt.ident()),
                    MessageType::Error,
                    t,
                );
                m.vertexset.insert(i);
                msgs.push(m);
                ok = false;
                continue;
            };
            if let Some(coord) = slice.payload().coord() {
                if coord != wpt.coord() {
                    let mut m = Message::new(
                        format!(
                            "point {} coordinate mismatch: {} != {}",
                            wpt.ident(),
                            wpt.coord(),
                            coord
                        ),
                        MessageType::Error,
                        t,
                    );
                    m.vertexset.insert(i);
                    msgs.push(m);
                    ok = false;
                }
            }
            if let Some(ident) = slice.payload().ident() {
                if ident != wpt.ident() {
                    let mut m = Message::new(
                        format!("ident mismatch: {} != {}", wpt.ident(), ident),
                        MessageType::Error,
                        t,
                    );
                    m.vertexset.insert(i);
                    msgs.push(m);
                    ok = false;
                }
            }
        }
        if let Some(last) = self.waypoints.last() {
            if last.pathcode() != PathCode::None {
                let mut m =
                    Message::new("invalid destination pathcode", MessageType::Error, t);
                m.edgeset.insert(self.waypoints.len() - 1);
                msgs.push(m);
                ok = false;
            }
        }
        for m in msgs {
            self.message(m);
        }
        if !ok {
            warn!("flight plan integrity check failed");
        }
        ok
    }
}

/// Spatial prefilter over rule bounding boxes.
///
/// Stores the rule bbox per slice in an R-tree so a plan only evaluates
/// rules whose extent it touches; rules without a bbox always pass the
/// filter.
struct RuleIndex {
    tree: rstar::RTree<rstar::primitives::GeomWithData<rstar::primitives::Rectangle<[f64; 2]>, usize>>,
    unbounded: Vec<usize>,
}

impl RuleIndex {
    fn new<'a>(rules: impl Iterator<Item = &'a FlightRestriction>, _t: Timestamp) -> Self {
        let mut entries = Vec::new();
        let mut unbounded = Vec::new();
        for (idx, rule) in rules.enumerate() {
            let bbox = rule.0.bbox();
            if bbox.is_invalid() {
                unbounded.push(idx);
                continue;
            }
            let aabb = rstar::AABB::from_corners(
                [bbox.southwest().lon_deg(), bbox.southwest().lat_deg()],
                [
                    bbox.southwest().lon_deg()
                        + (bbox.east_unwrapped() - i64::from(bbox.west())) as f64
                            * (90.0 / f64::from(0x4000_0000u32)),
                    bbox.northeast().lat_deg(),
                ],
            );
            entries.push(rstar::primitives::GeomWithData::new(
                rstar::primitives::Rectangle::from_aabb(aabb),
                idx,
            ));
        }
        Self {
            tree: rstar::RTree::bulk_load(entries),
            unbounded,
        }
    }

    /// Indices of rules whose bbox intersects `bbox`, plus the unbounded
    /// ones, in rule order.
    fn candidates(&self, bbox: &Rect) -> Vec<usize> {
        let mut out = self.unbounded.clone();
        if bbox.is_invalid() {
            out.extend(self.tree.iter().map(|e| e.data));
        } else {
            let query = rstar::AABB::from_corners(
                [bbox.southwest().lon_deg(), bbox.southwest().lat_deg()],
                [
                    bbox.southwest().lon_deg()
                        + (bbox.east_unwrapped() - i64::from(bbox.west())) as f64
                            * (90.0 / f64::from(0x4000_0000u32)),
                    bbox.northeast().lat_deg(),
                ],
            );
            out.extend(
                self.tree
                    .locate_in_envelope_intersecting(&query)
                    .map(|e| e.data),
            );
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condavail_windows() {
        let uuid: Uuid = "b5a42733-da94-4b7f-8282-e013a2fe6466".parse().unwrap();
        let mut ca = ConditionalAvailability::default();
        ca.insert(uuid, 1000, 2000, true);
        assert!(ca.is_active(&uuid, 1500));
        assert!(!ca.is_active(&uuid, 2500));
        assert_eq!(ca.activation_over(&uuid, 1100, 1900), Some(true));
        assert_eq!(ca.activation_over(&uuid, 2100, 2900), Some(false));
        assert_eq!(ca.activation_over(&uuid, 1500, 2500), None);
    }

    #[test]
    fn degenerate_plan_rejected() {
        let mut ev = RestrictionEval::new();
        ev.set_fplan(FlightPlan::default());
        assert!(!ev.check_fplan());
        assert!(ev
            .messages()
            .iter()
            .any(|m| m.mtype == MessageType::Error));
    }
}
