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

//! Flight restrictions: rule slices, their evaluation semantics and the
//! rewrites that specialise a rule set for a particular flight or for the
//! precomputation pipeline.

use std::fmt;
use std::sync::Arc;

mod condition;
mod element;
mod result;

pub use condition::{
    AircraftCategory, CivMil, CondChild, Condition, DepArrDct, EngineClass, EnrouteDct,
    FlightPurpose, RouteStatic,
};
pub use element::{DctConnPoints, RestrictionElement, RestrictionSequence, Restrictions};
pub use result::{
    CondResult, Message, MessageType, RestrictionResult, RestrictionResults,
    RestrictionSequenceResult, RuleSegment, RuleSegmentType, RuleSequence, WitnessSet,
};

use crate::archive::{Archive, Hibernate};
use crate::dct::{DctCalc, DctSegments};
use crate::error::Result;
use crate::eval::RestrictionEval;
use crate::geom::Rect;
use crate::id::Uuid;
use crate::model::{Object, ObjectKind, SlicePayload};
use crate::timetable::{TimeTable, TimeTableEval, Timestamp};

/// Effect of a rule on the flight plan.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum RestrictionType {
    /// Non-restrictive; consumed by the DCT analysis.
    Allowed = 0,
    /// The plan is rejected outright when the condition holds.
    Closed = 1,
    /// At least one restriction sequence must match.
    Mandatory = 2,
    /// No restriction sequence may match.
    Forbidden = 3,
    #[default]
    Invalid = 4,
}

impl RestrictionType {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Allowed,
            1 => Self::Closed,
            2 => Self::Mandatory,
            3 => Self::Forbidden,
            _ => Self::Invalid,
        }
    }

    pub fn type_char(&self) -> char {
        match self {
            Self::Mandatory => 'M',
            Self::Allowed => 'A',
            Self::Forbidden => 'F',
            Self::Closed => 'C',
            Self::Invalid => '-',
        }
    }
}

impl fmt::Display for RestrictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allowed => "allowed",
            Self::Closed => "closed",
            Self::Mandatory => "mandatory",
            Self::Forbidden => "forbidden",
            Self::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Procedural categorisation of a rule.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum ProcInd {
    Tfr = 0,
    RadDct = 1,
    FraDct = 2,
    Fpr = 3,
    AdCp = 4,
    AdFltRule = 5,
    FltProp = 6,
    #[default]
    Invalid = 7,
}

impl ProcInd {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Tfr,
            1 => Self::RadDct,
            2 => Self::FraDct,
            3 => Self::Fpr,
            4 => Self::AdCp,
            5 => Self::AdFltRule,
            6 => Self::FltProp,
            _ => Self::Invalid,
        }
    }

    /// True iff the category names a direct-route rule.
    pub fn is_dct(&self) -> bool {
        matches!(self, Self::RadDct | Self::FraDct)
    }
}

impl fmt::Display for ProcInd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tfr => "TFR",
            Self::RadDct => "RAD_DCT",
            Self::FraDct => "FRA_DCT",
            Self::Fpr => "FPR",
            Self::AdCp => "AD_CP",
            Self::AdFltRule => "AD_FLT_RULE",
            Self::FltProp => "FLT_PROP",
            Self::Invalid => "-",
        };
        f.write_str(s)
    }
}

/// Outcome of one rule against the plan.
#[derive(Debug, Default)]
pub struct RuleVerdict {
    /// True iff the plan passes this rule.
    pub ok: bool,
    /// The condition could not be decided; surfaced as a warning.
    pub indeterminate: bool,
    /// Filled when the condition fired.
    pub result: Option<RestrictionResult>,
}

impl RuleVerdict {
    fn pass() -> Self {
        Self {
            ok: true,
            indeterminate: false,
            result: None,
        }
    }
}

/// State of a flight restriction over one validity interval.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct FlightRestrictionSlice {
    pub ident: String,
    pub timetable: TimeTable,
    pub bbox: Rect,
    pub restrictions: Restrictions,
    pub condition: Option<Condition>,
    pub instruction: String,
    pub restriction_type: RestrictionType,
    pub procind: ProcInd,
    pub enabled: bool,
    /// Diagnostic tracing; never persisted.
    pub trace: bool,
}

impl FlightRestrictionSlice {
    /// Evaluates the rule against the plan.
    pub fn evaluate(
        &self,
        ev: &RestrictionEval,
        rule: &Arc<Object>,
        start: Timestamp,
    ) -> RuleVerdict {
        let r = match &self.condition {
            Some(cond) => cond.evaluate(ev),
            None => CondResult::new(false),
        };
        if r.is_indeterminate() {
            return RuleVerdict {
                ok: true,
                indeterminate: true,
                result: None,
            };
        }
        if !r.is_true() {
            return RuleVerdict::pass();
        }
        if let Some(refloc) = r.refloc() {
            if let Some(wpt) = ev.waypoints().get(refloc) {
                let tte = TimeTableEval::new(wpt.time(), wpt.coord());
                if !self.timetable.is_never() && !self.timetable.is_inside(&tte) {
                    return RuleVerdict::pass();
                }
            }
        }
        let tm = {
            let t = ev.departure_time();
            if start <= t {
                t
            } else {
                start
            }
        };
        let mut result = RestrictionResult {
            rule: rule.clone(),
            time: tm,
            vertexset: r.vertexset().clone(),
            edgeset: r.edgeset().clone(),
            refloc: r.refloc(),
            sequences: Vec::new(),
        };
        if self.restriction_type == RestrictionType::Closed {
            return RuleVerdict {
                ok: !self.enabled,
                indeterminate: false,
                result: Some(result),
            };
        }
        let ok = self.restrictions.evaluate(
            ev,
            &mut result.sequences,
            self.restriction_type == RestrictionType::Forbidden,
        );
        RuleVerdict {
            ok: ok || !self.enabled,
            indeterminate: false,
            result: Some(result),
        }
    }

    /// The altitudes this rule leaves to a candidate direct leg.
    pub fn evaluate_dct(&self, dct: &DctCalc<'_>) -> crate::altrange::BidirAltRange {
        use crate::altrange::BidirAltRange;

        if !self.enabled {
            return dct.default_alt().clone();
        }
        let mut r = match &self.condition {
            Some(cond) => cond.evaluate_dct(dct),
            None => BidirAltRange::empty(),
        };
        r.invert();
        match self.restriction_type {
            RestrictionType::Closed => {}
            RestrictionType::Allowed
            | RestrictionType::Forbidden
            | RestrictionType::Mandatory => {
                let ar = self.restrictions.evaluate_dct(
                    dct,
                    self.restriction_type == RestrictionType::Forbidden,
                );
                r |= &ar;
            }
            RestrictionType::Invalid => r.set_full(),
        }
        r &= dct.default_alt();
        r
    }

    /// True iff the rule can ever fire after simplification.
    pub fn is_keep(&self) -> bool {
        match &self.condition {
            Some(cond) => cond.const_value() != Some(false),
            None => false,
        }
    }

    pub fn is_unconditional(&self) -> bool {
        let Some(cond) = &self.condition else {
            return false;
        };
        if cond.const_value() == Some(true) {
            return true;
        }
        self.is_unconditional_airspace()
    }

    /// An airspace-crossing rule forbidding the very airspace its
    /// condition tests is effectively unconditional.
    fn is_unconditional_airspace(&self) -> bool {
        let [seq] = self.restrictions.sequences.as_slice() else {
            return false;
        };
        let [RestrictionElement::Airspace { airspace, .. }] = seq.elements.as_slice() else {
            return false;
        };
        let Some(Condition::CrossingAirspace1 {
            alt,
            airspace: cond_aspc,
            ..
        }) = &self.condition
        else {
            return false;
        };
        if alt.is_lower_valid() || alt.is_upper_valid() {
            return false;
        }
        cond_aspc.uuid() == airspace.uuid()
    }

    pub fn is_dct(&self) -> bool {
        let mut civmil = CivMil::Invalid;
        self.is_dct_civmil(&mut civmil)
    }

    pub fn is_dct_civmil(&self, civmil: &mut CivMil) -> bool {
        let Some(cond) = &self.condition else {
            return false;
        };
        cond.is_valid_dct(false, civmil) && self.restrictions.is_valid_dct()
    }

    pub fn is_strict_dct(&self) -> bool {
        let mut civmil = CivMil::Invalid;
        match &self.condition {
            Some(cond) => {
                cond.is_dct()
                    && cond.is_valid_dct(false, &mut civmil)
                    && self.restrictions.is_valid_dct()
            }
            None => false,
        }
    }

    pub fn is_routestatic(&self) -> bool {
        self.condition
            .as_ref()
            .is_some_and(Condition::is_routestatic)
    }

    /// Departure/arrival DCT-limit shape: condition pins an airport and a
    /// distance, restrictions contribute the connection point bands.
    pub fn is_deparr_dct(&self, acc: &mut DepArrDct, connpt: &mut DctConnPoints) -> bool {
        let Some(cond) = &self.condition else {
            return false;
        };
        if !cond.is_deparr_dct(acc) || acc.arpt.is_nil() {
            return false;
        }
        if !self.restrictions.is_empty()
            && !self
                .restrictions
                .is_deparr_dct(&acc.arpt, acc.arr, connpt)
        {
            return false;
        }
        true
    }

    /// Enroute DCT shape: condition pins an airspace and a distance.
    pub fn is_enroute_dct(&self, acc: &mut EnrouteDct) -> bool {
        let Some(cond) = &self.condition else {
            return false;
        };
        cond.is_enroute_dct(acc) && !acc.airspace.is_nil()
    }

    pub fn collect_dct_segments(&self, segs: &mut DctSegments) {
        self.restrictions.collect_dct_segments(segs);
    }

    /// Mandatory sequences for routing clients.
    pub fn get_mandatory(&self) -> Vec<RuleSequence> {
        if self.restriction_type != RestrictionType::Mandatory {
            return Vec::new();
        }
        self.restrictions.get_rules()
    }

    /// Canonical forbidden segments of a route-static forbidden rule.
    pub fn get_forbidden_segments(&self) -> Vec<RuleSegment> {
        if self.restriction_type != RestrictionType::Forbidden || !self.is_routestatic() {
            return Vec::new();
        }
        self.restrictions
            .get_rules()
            .into_iter()
            .flat_map(|seq| seq.0)
            .collect()
    }

    pub fn is_mandatory_inbound(&self, start: Timestamp, end: Timestamp) -> bool {
        if self.restriction_type != RestrictionType::Mandatory {
            return false;
        }
        let Some(cond) = &self.condition else {
            return false;
        };
        let mut pts = Vec::new();
        let rewritten = cond.extract_crossingpoints(&mut pts);
        if pts.is_empty() {
            return false;
        }
        if let Some(c) = rewritten {
            if !c.is_routestatic() {
                return false;
            }
        }
        self.restrictions.is_mandatory_inbound(start, end, &pts)
    }

    pub fn is_mandatory_outbound(&self, start: Timestamp, end: Timestamp) -> bool {
        if self.restriction_type != RestrictionType::Mandatory {
            return false;
        }
        let Some(cond) = &self.condition else {
            return false;
        };
        let mut pts = Vec::new();
        let rewritten = cond.extract_crossingpoints(&mut pts);
        if pts.is_empty() {
            return false;
        }
        if let Some(c) = rewritten {
            if !c.is_routestatic() {
                return false;
            }
        }
        self.restrictions.is_mandatory_outbound(start, end, &pts)
    }
}

impl Hibernate for FlightRestrictionSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        self.timetable.hibernate(ar)?;
        ar.io_rect(&mut self.bbox)?;
        self.restrictions.hibernate(ar)?;
        Condition::io_opt(&mut self.condition, ar)?;
        ar.io_string(&mut self.instruction)?;
        let mut t = self.restriction_type as u8;
        ar.io_u8(&mut t)?;
        self.restriction_type = RestrictionType::from_byte(t);
        let mut p = self.procind as u8;
        ar.io_u8(&mut p)?;
        self.procind = ProcInd::from_byte(p);
        ar.io_bool(&mut self.enabled)
    }
}

/// A rule object with the slice-rewriting operations.
///
/// Rewrites clone the underlying object; the stored rule stays untouched
/// in the cache.
#[derive(Clone, Debug)]
pub struct FlightRestriction(pub Arc<Object>);

impl FlightRestriction {
    /// Wraps a rule object; `None` for any other kind.
    pub fn from_object(obj: Arc<Object>) -> Option<FlightRestriction> {
        (obj.kind() == ObjectKind::FlightRestriction).then_some(FlightRestriction(obj))
    }

    pub fn uuid(&self) -> &Uuid {
        self.0.uuid()
    }

    pub fn object(&self) -> &Arc<Object> {
        &self.0
    }

    pub fn slice_at(&self, t: Timestamp) -> Option<&FlightRestrictionSlice> {
        self.0
            .slice_at(t)
            .and_then(|ts| ts.payload().as_flight_restriction())
    }

    /// Evaluates the slice valid at departure time.
    pub fn evaluate(&self, ev: &RestrictionEval) -> RuleVerdict {
        let t = ev.departure_time();
        let Some(ts) = self.0.slice_at(t) else {
            return RuleVerdict::pass();
        };
        let start = ts.start();
        let Some(fr) = ts.payload().as_flight_restriction() else {
            return RuleVerdict::pass();
        };
        fr.evaluate(ev, &self.0, start)
    }

    /// True iff some slice is still meaningful.
    pub fn is_keep(&self) -> bool {
        self.0
            .slices()
            .iter()
            .filter_map(|ts| ts.payload().as_flight_restriction())
            .any(FlightRestrictionSlice::is_keep)
    }

    /// Applies `f` to every rule slice of a clone; `None` when nothing
    /// changed.
    fn rewrite_slices<F>(&self, mut f: F) -> Option<FlightRestriction>
    where
        F: FnMut(&mut FlightRestrictionSlice, Timestamp, Timestamp) -> bool,
    {
        let mut obj = (*self.0).clone();
        let mut modified = false;
        for ts in obj.slices_mut() {
            let (start, end) = (ts.start(), ts.end());
            if let SlicePayload::FlightRestriction(fr) = ts.payload_mut() {
                modified |= f(fr, start, end);
            }
        }
        modified.then(|| FlightRestriction(Arc::new(obj)))
    }

    fn rewrite_condition<F>(&self, f: F) -> Option<FlightRestriction>
    where
        F: Fn(&Condition, Timestamp, Timestamp) -> Condition,
    {
        self.rewrite_slices(|fr, start, end| {
            let Some(cond) = &fr.condition else {
                return false;
            };
            let rewritten = f(cond, start, end);
            if rewritten == *cond {
                return false;
            }
            fr.condition = Some(rewritten);
            true
        })
    }

    /// Constant folding over all slices.
    pub fn simplify(&self) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify())
    }

    /// Drops condition branches and restriction sequences outside `bbox`.
    pub fn simplify_bbox(&self, bbox: &Rect) -> Option<FlightRestriction> {
        self.rewrite_slices(|fr, start, end| {
            let mut modified = false;
            if let Some(cond) = &fr.condition {
                let rewritten = cond.simplify_bbox(bbox, start, end);
                if rewritten != *cond {
                    fr.condition = Some(rewritten);
                    modified = true;
                }
            }
            modified | fr.restrictions.simplify_bbox(bbox, start, end)
        })
    }

    /// Drops branches and sequences outside the altitude band.
    pub fn simplify_altrange(&self, minalt: i32, maxalt: i32) -> Option<FlightRestriction> {
        self.rewrite_slices(|fr, _, _| {
            let mut modified = false;
            if let Some(cond) = &fr.condition {
                let rewritten = cond.simplify_altrange(minalt, maxalt);
                if rewritten != *cond {
                    fr.condition = Some(rewritten);
                    modified = true;
                }
            }
            modified | fr.restrictions.simplify_altrange(minalt, maxalt)
        })
    }

    pub fn simplify_aircrafttype(&self, acfttype: &str) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_aircrafttype(acfttype))
    }

    pub fn simplify_aircraftclass(&self, acftclass: &str) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_aircraftclass(acftclass))
    }

    pub fn simplify_equipment(&self, rnav1: bool, rvsm: bool) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_equipment(rnav1, rvsm))
    }

    pub fn simplify_typeofflight(&self, type_of_flight: char) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_typeofflight(type_of_flight))
    }

    pub fn simplify_mil(&self, mil: bool) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_mil(mil))
    }

    pub fn simplify_dep(&self, arpt: &Uuid) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_dep(arpt))
    }

    pub fn simplify_dest(&self, arpt: &Uuid) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| cond.simplify_dest(arpt))
    }

    pub fn simplify_conditionalavailability(
        &self,
        condavail: &crate::eval::ConditionalAvailability,
        t0: Timestamp,
        t1: Timestamp,
    ) -> Option<FlightRestriction> {
        self.rewrite_condition(|cond, _, _| {
            cond.simplify_conditionalavailability(condavail, t0, t1)
        })
    }

    /// Restricts the rule to the slices overlapping `[t0, t1)`.
    pub fn simplify_time(&self, t0: Timestamp, t1: Timestamp) -> Option<FlightRestriction> {
        self.0
            .simplify_time(t0, t1)
            .map(|obj| FlightRestriction(Arc::new(obj)))
    }

    /// All complexity decompositions in sequence.
    pub fn simplify_complexity(&self) -> Option<FlightRestriction> {
        let mut cur = self.clone();
        let mut modified = false;
        for pass in [
            Self::simplify_complexity_crossingpoints,
            Self::simplify_complexity_crossingsegments,
            Self::simplify_complexity_closedairspace,
        ] {
            if let Some(next) = pass(&cur) {
                cur = next;
                modified = true;
            }
        }
        modified.then_some(cur)
    }

    /// Rewrites a forbidden rule whose condition excludes crossing
    /// points into the canonical forbidden-point enumeration.
    pub fn simplify_complexity_crossingpoints(&self) -> Option<FlightRestriction> {
        self.rewrite_slices(|fr, _, _| {
            if fr.restriction_type != RestrictionType::Forbidden {
                return false;
            }
            let Some(cond) = &fr.condition else {
                return false;
            };
            let mut pts = Vec::new();
            let Some(rewritten) = cond.extract_crossingpoints(&mut pts) else {
                return false;
            };
            if pts.is_empty() || !rewritten.is_routestatic() {
                return false;
            }
            let mut res = Restrictions::default();
            if !fr.restrictions.clone_crossingpoints(&mut res, &pts) {
                return false;
            }
            fr.condition = Some(rewritten);
            fr.restrictions = res;
            true
        })
    }

    /// Rewrites a forbidden rule whose condition excludes crossing
    /// segments into the canonical forbidden-segment enumeration.
    pub fn simplify_complexity_crossingsegments(&self) -> Option<FlightRestriction> {
        self.rewrite_slices(|fr, _, _| {
            if fr.restriction_type != RestrictionType::Forbidden {
                return false;
            }
            let Some(cond) = &fr.condition else {
                return false;
            };
            let mut segs = Vec::new();
            let Some(rewritten) = cond.extract_crossingsegments(&mut segs) else {
                return false;
            };
            if segs.is_empty() || !rewritten.is_routestatic() {
                return false;
            }
            let mut res = Restrictions::default();
            if !fr.restrictions.clone_crossingsegments(&mut res, &segs) {
                return false;
            }
            fr.condition = Some(rewritten);
            fr.restrictions = res;
            true
        })
    }

    /// Converts a closed rule over airspace crossings into an equivalent
    /// forbidden rule enumerating the airspaces.
    pub fn simplify_complexity_closedairspace(&self) -> Option<FlightRestriction> {
        self.rewrite_slices(|fr, _, _| {
            if fr.restriction_type != RestrictionType::Closed
                || !fr.restrictions.is_empty()
            {
                return false;
            }
            let Some(cond) = &fr.condition else {
                return false;
            };
            let mut aspcs = Vec::new();
            let Some(rewritten) = cond.extract_crossingairspaces(&mut aspcs) else {
                return false;
            };
            if aspcs.is_empty() || !rewritten.is_routestatic() {
                return false;
            }
            let mut res = Restrictions::default();
            for seg in &aspcs {
                let Some(aspc) = &seg.wpt[0] else {
                    return false;
                };
                res.sequences.push(RestrictionSequence {
                    elements: vec![RestrictionElement::Airspace {
                        alt: seg.alt,
                        airspace: crate::id::Link::resolved(aspc.clone()),
                    }],
                });
            }
            fr.restriction_type = RestrictionType::Forbidden;
            fr.condition = Some(rewritten);
            fr.restrictions = res;
            true
        })
    }
}
