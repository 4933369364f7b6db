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

//! Evaluation verdicts and their positional witnesses.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::altrange::AltRange;
use crate::model::Object;
use crate::timetable::Timestamp;

/// Witness index set over waypoints (vertices) or legs (edges).
pub type WitnessSet = BTreeSet<usize>;

/// Severity of an evaluation message.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum MessageType {
    Error,
    Warning,
    Info,
    TraceCondition,
    TraceElement,
    Trace,
}

impl MessageType {
    pub fn type_char(&self) -> char {
        match self {
            Self::Error => 'E',
            Self::Warning => 'W',
            Self::Info => 'I',
            Self::TraceCondition => 'C',
            Self::TraceElement => 'T',
            Self::Trace => 'D',
        }
    }
}

/// A diagnostic emitted during evaluation, attributed to a rule and a set
/// of waypoint positions.
#[derive(Clone, Debug)]
pub struct Message {
    pub text: String,
    pub mtype: MessageType,
    pub time: Timestamp,
    pub rule: Option<Arc<Object>>,
    pub vertexset: WitnessSet,
    pub edgeset: WitnessSet,
}

impl Message {
    pub fn new(text: impl Into<String>, mtype: MessageType, time: Timestamp) -> Self {
        Self {
            text: text.into(),
            mtype,
            time,
            rule: None,
            vertexset: WitnessSet::new(),
            edgeset: WitnessSet::new(),
        }
    }

    pub fn with_rule(mut self, rule: Option<Arc<Object>>) -> Self {
        self.rule = rule;
        self
    }

    pub fn rule_ident(&self) -> &str {
        self.rule
            .as_deref()
            .and_then(|r| r.ident_at(self.time))
            .unwrap_or("")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.mtype.type_char())?;
        let ident = self.rule_ident();
        if !ident.is_empty() {
            write!(f, " R:{ident}")?;
        }
        write!(f, " {}", self.text)
    }
}

/// Tri-state result of a condition, with witnesses.
///
/// `None` is the indeterminate state. The `xngedgeset` carries the
/// crossing edges needed to combine DCT-limit conditions; its `inv` flag
/// records a complement so the combination rules can honour it pairwise.
#[derive(Clone, Debug)]
pub struct CondResult {
    result: Option<bool>,
    vertexset: WitnessSet,
    edgeset: WitnessSet,
    xngedgeset: WitnessSet,
    xngedgeinv: bool,
    refloc: Option<usize>,
}

impl CondResult {
    pub fn new(result: bool) -> Self {
        Self {
            result: Some(result),
            vertexset: WitnessSet::new(),
            edgeset: WitnessSet::new(),
            xngedgeset: WitnessSet::new(),
            xngedgeinv: false,
            refloc: None,
        }
    }

    pub fn new_inv(result: bool, xngedgeinv: bool) -> Self {
        Self {
            xngedgeinv,
            ..Self::new(result)
        }
    }

    pub fn indeterminate() -> Self {
        Self {
            result: None,
            vertexset: WitnessSet::new(),
            edgeset: WitnessSet::new(),
            xngedgeset: WitnessSet::new(),
            xngedgeinv: false,
            refloc: None,
        }
    }

    pub fn result(&self) -> Option<bool> {
        self.result
    }

    pub fn is_true(&self) -> bool {
        self.result == Some(true)
    }

    pub fn is_false(&self) -> bool {
        self.result == Some(false)
    }

    pub fn is_indeterminate(&self) -> bool {
        self.result.is_none()
    }

    pub fn set_result(&mut self, result: Option<bool>) {
        self.result = result;
    }

    pub fn vertexset(&self) -> &WitnessSet {
        &self.vertexset
    }

    pub fn vertexset_mut(&mut self) -> &mut WitnessSet {
        &mut self.vertexset
    }

    pub fn edgeset(&self) -> &WitnessSet {
        &self.edgeset
    }

    pub fn edgeset_mut(&mut self) -> &mut WitnessSet {
        &mut self.edgeset
    }

    pub fn xngedgeset(&self) -> &WitnessSet {
        &self.xngedgeset
    }

    pub fn xngedgeset_mut(&mut self) -> &mut WitnessSet {
        &mut self.xngedgeset
    }

    pub fn is_xngedgeinv(&self) -> bool {
        self.xngedgeinv
    }

    pub fn refloc(&self) -> Option<usize> {
        self.refloc
    }

    /// Keeps the earliest reference location.
    pub fn set_refloc(&mut self, rl: usize) {
        match self.refloc {
            Some(cur) if cur <= rl => {}
            _ => self.refloc = Some(rl),
        }
    }

    pub fn clear_refloc(&mut self) {
        self.refloc = None;
    }

    /// First witness position.
    pub fn first(&self) -> usize {
        match (self.vertexset.first(), self.edgeset.first()) {
            (None, None) => 0,
            (None, Some(&e)) => e,
            (Some(&v), None) => v,
            (Some(&v), Some(&e)) => v.min(e),
        }
    }

    /// Last witness position; edges count as the position past their end.
    pub fn last(&self) -> usize {
        match (self.vertexset.last(), self.edgeset.last()) {
            (None, None) => usize::MAX,
            (None, Some(&e)) => e + 1,
            (Some(&v), None) => v,
            (Some(&v), Some(&e)) => v.min(e + 1),
        }
    }

    /// Sequence-order key of the earliest witness strictly after `min`:
    /// vertex `n` maps to `2n+1`, edge `n` to `2n+2`; `0` when none.
    pub fn seqorder(&self, min: usize) -> usize {
        let v = self
            .vertexset
            .iter()
            .map(|&v| 2 * v + 1)
            .find(|&key| key > min);
        let e = self
            .edgeset
            .iter()
            .map(|&e| 2 * e + 2)
            .find(|&key| key > min);
        match (v, e) {
            (None, None) => 0,
            (None, Some(e)) => e,
            (Some(v), None) => v,
            (Some(v), Some(e)) => v.min(e),
        }
    }

    /// Tri-state AND: witness sets union when still true, clear when
    /// false; the crossing-edge sets intersect honouring their invert
    /// flags; the earlier reference location wins.
    pub fn and_assign(&mut self, x: &CondResult) {
        let xng = match (self.xngedgeinv, x.xngedgeinv) {
            (true, false) => {
                self.xngedgeinv = false;
                x.xngedgeset.difference(&self.xngedgeset).copied().collect()
            }
            (false, true) => self.xngedgeset.difference(&x.xngedgeset).copied().collect(),
            _ => self
                .xngedgeset
                .intersection(&x.xngedgeset)
                .copied()
                .collect(),
        };
        self.xngedgeset = xng;
        self.result = tri_and(self.result, x.result);
        if self.result == Some(false) {
            self.vertexset.clear();
            self.edgeset.clear();
            self.clear_refloc();
        } else {
            self.vertexset.extend(x.vertexset.iter().copied());
            self.edgeset.extend(x.edgeset.iter().copied());
            if let Some(rl) = x.refloc {
                self.set_refloc(rl);
            }
        }
    }

    /// Tri-state OR: the smaller witness set wins so explanations stay
    /// small; the crossing-edge sets union.
    ///
    /// The witness merge branches on "definitely false" versus
    /// "not definitely false", so an indeterminate operand still
    /// contributes its witnesses.
    pub fn or_assign(&mut self, x: &CondResult) {
        match (self.xngedgeinv, x.xngedgeinv) {
            (true, false) => {
                self.xngedgeset = x.xngedgeset.clone();
                self.xngedgeinv = false;
            }
            (false, true) => {}
            _ => self.xngedgeset.extend(x.xngedgeset.iter().copied()),
        }
        if self.result == Some(false) {
            if x.result == Some(false) {
                self.vertexset.clear();
                self.edgeset.clear();
                self.clear_refloc();
            } else {
                self.vertexset = x.vertexset.clone();
                self.edgeset = x.edgeset.clone();
                self.clear_refloc();
                if let Some(rl) = x.refloc {
                    self.set_refloc(rl);
                }
            }
        } else if x.result == Some(false) {
            // keep
        } else {
            if x.vertexset.len() < self.vertexset.len() {
                self.vertexset = x.vertexset.clone();
            }
            if x.edgeset.len() < self.edgeset.len() {
                self.edgeset = x.edgeset.clone();
            }
            if let Some(rl) = x.refloc {
                self.set_refloc(rl);
            }
        }
        self.result = tri_or(self.result, x.result);
    }

    /// Tri-state NOT; drops the witnesses and flips the crossing-edge
    /// invert flag.
    pub fn not(&self) -> CondResult {
        let mut r = match self.result {
            Some(v) => CondResult::new(!v),
            None => CondResult::indeterminate(),
        };
        r.xngedgeinv = !r.xngedgeinv;
        r
    }
}

fn tri_and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn tri_or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

/// The canonical segment form a restriction element or crossing condition
/// reduces to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum RuleSegmentType {
    Airway,
    Dct,
    Point,
    Sid,
    Star,
    Airspace,
    #[default]
    Invalid,
}

/// One segment of a rule in canonical form.
#[derive(Clone, Debug)]
pub struct RuleSegment {
    pub segment_type: RuleSegmentType,
    pub alt: AltRange,
    pub wpt: [Option<Arc<Object>>; 2],
    pub airway: Option<Arc<Object>>,
}

impl RuleSegment {
    pub fn new(segment_type: RuleSegmentType, alt: AltRange) -> Self {
        Self {
            segment_type,
            alt,
            wpt: [None, None],
            airway: None,
        }
    }

    pub fn with_wpt0(mut self, obj: Option<Arc<Object>>) -> Self {
        self.wpt[0] = obj;
        self
    }

    pub fn with_wpt1(mut self, obj: Option<Arc<Object>>) -> Self {
        self.wpt[1] = obj;
        self
    }

    pub fn with_airway(mut self, obj: Option<Arc<Object>>) -> Self {
        self.airway = obj;
        self
    }

    pub fn uuid0(&self) -> crate::id::Uuid {
        self.wpt[0]
            .as_deref()
            .map(|o| *o.uuid())
            .unwrap_or(crate::id::Uuid::NIL)
    }

    pub fn uuid1(&self) -> crate::id::Uuid {
        self.wpt[1]
            .as_deref()
            .map(|o| *o.uuid())
            .unwrap_or(crate::id::Uuid::NIL)
    }

    pub fn airway_uuid(&self) -> crate::id::Uuid {
        self.airway
            .as_deref()
            .map(|o| *o.uuid())
            .unwrap_or(crate::id::Uuid::NIL)
    }

    pub fn is_point(&self) -> bool {
        self.segment_type == RuleSegmentType::Point
    }

    pub fn is_dct(&self) -> bool {
        self.segment_type == RuleSegmentType::Dct
    }

    pub fn is_airway(&self) -> bool {
        self.segment_type == RuleSegmentType::Airway
    }

    pub fn is_airspace(&self) -> bool {
        self.segment_type == RuleSegmentType::Airspace
    }

    pub fn to_shortstr(&self, tm: Timestamp) -> String {
        let name = |o: &Option<Arc<Object>>| {
            o.as_deref()
                .and_then(|o| o.ident_at(tm))
                .unwrap_or("??")
                .to_string()
        };
        match self.segment_type {
            RuleSegmentType::Airway => format!(
                "AWY {} {} {}",
                name(&self.airway),
                name(&self.wpt[0]),
                name(&self.wpt[1])
            ),
            RuleSegmentType::Dct => {
                format!("DCT {} {}", name(&self.wpt[0]), name(&self.wpt[1]))
            }
            RuleSegmentType::Point => format!("PT {}", name(&self.wpt[0])),
            RuleSegmentType::Sid => format!("SID {}", name(&self.wpt[0])),
            RuleSegmentType::Star => format!("STAR {}", name(&self.wpt[0])),
            RuleSegmentType::Airspace => format!("ASPC {}", name(&self.wpt[0])),
            RuleSegmentType::Invalid => "?".to_string(),
        }
    }
}

/// A conjunction of rule segments.
#[derive(Clone, Debug, Default)]
pub struct RuleSequence(pub Vec<RuleSegment>);

impl RuleSequence {
    pub fn to_shortstr(&self, tm: Timestamp) -> String {
        self.0
            .iter()
            .map(|s| s.to_shortstr(tm))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Outcome of one restriction sequence against the plan.
#[derive(Clone, Debug)]
pub struct RestrictionSequenceResult {
    pub sequence: RuleSequence,
    pub vertexset: WitnessSet,
    pub edgeset: WitnessSet,
}

/// Outcome of one rule against the plan.
#[derive(Clone, Debug)]
pub struct RestrictionResult {
    pub rule: Arc<Object>,
    pub time: Timestamp,
    pub vertexset: WitnessSet,
    pub edgeset: WitnessSet,
    pub refloc: Option<usize>,
    pub sequences: Vec<RestrictionSequenceResult>,
}

impl RestrictionResult {
    pub fn rule_ident(&self) -> &str {
        self.rule.ident_at(self.time).unwrap_or("")
    }

    fn type_char(&self) -> char {
        self.rule
            .slice_at(self.time)
            .or_else(|| self.rule.slices().first())
            .and_then(|ts| ts.payload().as_flight_restriction())
            .map(|fr| fr.restriction_type.type_char())
            .unwrap_or('-')
    }
}

impl fmt::Display for RestrictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R:{} {}", self.rule_ident(), self.type_char())?;
        if !self.vertexset.is_empty() {
            write!(f, " V:")?;
            for (i, v) in self.vertexset.iter().enumerate() {
                write!(f, "{}{v}", if i > 0 { "," } else { "" })?;
            }
        }
        if !self.edgeset.is_empty() {
            write!(f, " E:")?;
            for (i, e) in self.edgeset.iter().enumerate() {
                write!(f, "{}{e}", if i > 0 { "," } else { "" })?;
            }
        }
        for seq in &self.sequences {
            write!(f, " [{}]", seq.sequence.to_shortstr(self.time))?;
        }
        Ok(())
    }
}

/// All rule failures of one evaluation.
#[derive(Clone, Debug, Default)]
pub struct RestrictionResults(pub Vec<RestrictionResult>);

impl RestrictionResults {
    pub fn is_ok(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn witness(result: bool, vertices: &[usize]) -> CondResult {
        let mut r = CondResult::new(result);
        r.vertexset_mut().extend(vertices.iter().copied());
        r
    }

    #[test]
    fn and_unions_witnesses_when_true() {
        let mut a = witness(true, &[1, 2]);
        a.and_assign(&witness(true, &[5]));
        assert!(a.is_true());
        assert_eq!(a.vertexset().iter().copied().collect::<Vec<_>>(), [1, 2, 5]);
    }

    #[test]
    fn and_clears_witnesses_when_false() {
        let mut a = witness(true, &[1, 2]);
        a.and_assign(&witness(false, &[]));
        assert!(a.is_false());
        assert!(a.vertexset().is_empty());
    }

    #[test]
    fn or_prefers_smaller_witness_set() {
        let mut a = witness(true, &[1, 2, 3]);
        a.or_assign(&witness(true, &[7]));
        assert!(a.is_true());
        assert_eq!(a.vertexset().iter().copied().collect::<Vec<_>>(), [7]);
    }

    #[test]
    fn tri_state_indeterminate() {
        let mut a = witness(true, &[1]);
        a.and_assign(&CondResult::indeterminate());
        assert!(a.is_indeterminate());
        let mut b = CondResult::indeterminate();
        b.or_assign(&witness(true, &[2]));
        assert!(b.is_true());
        let mut c = CondResult::indeterminate();
        c.and_assign(&witness(false, &[]));
        assert!(c.is_false());
    }

    #[test]
    fn or_false_with_indeterminate_adopts_witnesses() {
        let mut a = witness(false, &[]);
        let mut x = CondResult::indeterminate();
        x.vertexset_mut().extend([4, 5]);
        x.set_refloc(4);
        a.or_assign(&x);
        assert!(a.is_indeterminate());
        assert_eq!(a.vertexset().iter().copied().collect::<Vec<_>>(), [4, 5]);
        assert_eq!(a.refloc(), Some(4));
    }

    #[test]
    fn or_of_indeterminates_keeps_smaller_witness_set() {
        let mut a = CondResult::indeterminate();
        a.vertexset_mut().extend([1, 2, 3]);
        let mut x = CondResult::indeterminate();
        x.vertexset_mut().insert(9);
        a.or_assign(&x);
        assert!(a.is_indeterminate());
        assert_eq!(a.vertexset().iter().copied().collect::<Vec<_>>(), [9]);
    }

    #[test]
    fn not_flips_xngedge_invert() {
        let a = witness(true, &[1]);
        let n = a.not();
        assert!(n.is_false());
        assert!(n.is_xngedgeinv());
        assert!(n.vertexset().is_empty());
    }

    #[test]
    fn refloc_prefers_earlier() {
        let mut a = CondResult::new(true);
        a.set_refloc(5);
        let mut b = CondResult::new(true);
        b.set_refloc(3);
        a.and_assign(&b);
        assert_eq!(a.refloc(), Some(3));
        a.set_refloc(7);
        assert_eq!(a.refloc(), Some(3));
    }

    #[test]
    fn seqorder_keys() {
        let mut a = CondResult::new(true);
        a.vertexset_mut().insert(1);
        a.edgeset_mut().insert(1);
        // vertex 1 -> 3, edge 1 -> 4
        assert_eq!(a.seqorder(0), 3);
        assert_eq!(a.seqorder(3), 4);
        assert_eq!(a.seqorder(4), 0);
    }
}
