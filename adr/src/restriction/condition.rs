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

//! The condition algebra.
//!
//! A condition is a tagged tree: leaves test individual properties of a
//! waypoint sequence, inner nodes combine them. Beyond evaluation against
//! a plan or a direct-leg candidate, conditions support the
//! simplification and extraction transforms the precomputation pipeline
//! uses to specialise rule sets.

use crate::altrange::{AltRange, BidirAltRange};
use crate::archive::{Archive, Hibernate};
use crate::dct::DctCalc;
use crate::error::{Error, Result};
use crate::eval::{PathCode, RestrictionEval};
use crate::geom::Rect;
use crate::id::{Link, Uuid};
use crate::interval::IntervalSet;
use crate::restriction::result::{CondResult, RuleSegment, RuleSegmentType};
use crate::timetable::{TimeTableEval, Timestamp};

const COND_INVALID: u8 = 0;
const COND_AND: u8 = 1;
const COND_SEQ: u8 = 2;
const COND_CONSTANT: u8 = 3;
const COND_XNG_AIRSPACE1: u8 = 4;
const COND_XNG_AIRSPACE2: u8 = 5;
const COND_XNG_DCT: u8 = 6;
const COND_XNG_AIRWAY: u8 = 7;
const COND_XNG_POINT: u8 = 8;
const COND_DEPARR: u8 = 9;
const COND_DEPARR_AIRSPACE: u8 = 10;
const COND_SIDSTAR: u8 = 11;
const COND_AIRSPACE_ACTIVE: u8 = 12;
const COND_AIRWAY_AVAILABLE: u8 = 13;
const COND_DCT_LIMIT: u8 = 14;
const COND_AIRCRAFT: u8 = 15;
const COND_FLIGHT: u8 = 16;

/// Civil/military applicability.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum CivMil {
    Civ,
    Mil,
    #[default]
    Invalid,
}

impl CivMil {
    pub fn from_byte(v: u8) -> Self {
        match v {
            b'C' => Self::Civ,
            b'M' => Self::Mil,
            _ => Self::Invalid,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Civ => b'C',
            Self::Mil => b'M',
            Self::Invalid => 0,
        }
    }

    fn inverted(self) -> Self {
        match self {
            Self::Civ => Self::Mil,
            Self::Mil => Self::Civ,
            Self::Invalid => Self::Invalid,
        }
    }

    /// Folds a child's applicability into the accumulator; false on a
    /// civ/mil contradiction.
    fn fold(acc: &mut CivMil, child: CivMil) -> bool {
        if *acc == CivMil::Invalid {
            *acc = child;
            return true;
        }
        child == CivMil::Invalid || *acc == child
    }
}

/// Aircraft category letter of an aircraft condition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum AircraftCategory {
    Landplane,
    Seaplane,
    Amphibian,
    Helicopter,
    Gyrocopter,
    Tiltwing,
    #[default]
    Invalid,
}

impl AircraftCategory {
    pub fn from_byte(v: u8) -> Self {
        match v {
            b'L' => Self::Landplane,
            b'S' => Self::Seaplane,
            b'A' => Self::Amphibian,
            b'H' => Self::Helicopter,
            b'G' => Self::Gyrocopter,
            b'T' => Self::Tiltwing,
            _ => Self::Invalid,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Landplane => b'L',
            Self::Seaplane => b'S',
            Self::Amphibian => b'A',
            Self::Helicopter => b'H',
            Self::Gyrocopter => b'G',
            Self::Tiltwing => b'T',
            Self::Invalid => 0,
        }
    }
}

/// Engine class letter of an aircraft condition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum EngineClass {
    Piston,
    Turboprop,
    Jet,
    #[default]
    Invalid,
}

impl EngineClass {
    pub fn from_byte(v: u8) -> Self {
        match v {
            b'P' => Self::Piston,
            b'T' => Self::Turboprop,
            b'J' => Self::Jet,
            _ => Self::Invalid,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::Piston => b'P',
            Self::Turboprop => b'T',
            Self::Jet => b'J',
            Self::Invalid => 0,
        }
    }
}

/// Flight purpose letter of a flight condition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum FlightPurpose {
    All,
    Scheduled,
    NonScheduled,
    Private,
    Participant,
    AirTraining,
    AirWork,
    #[default]
    Invalid,
}

impl FlightPurpose {
    pub fn from_byte(v: u8) -> Self {
        match v {
            b'A' => Self::All,
            b'S' => Self::Scheduled,
            b'N' => Self::NonScheduled,
            b'G' => Self::Private,
            b'P' => Self::Participant,
            b'T' => Self::AirTraining,
            b'W' => Self::AirWork,
            _ => Self::Invalid,
        }
    }

    pub fn byte(&self) -> u8 {
        match self {
            Self::All => b'A',
            Self::Scheduled => b'S',
            Self::NonScheduled => b'N',
            Self::Private => b'G',
            Self::Participant => b'P',
            Self::AirTraining => b'T',
            Self::AirWork => b'W',
            Self::Invalid => 0,
        }
    }
}

/// Route-static classification of a condition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum RouteStatic {
    StaticFalse,
    StaticTrue,
    StaticUnknown,
    NonStatic,
}

/// Departure/arrival DCT extraction accumulator.
#[derive(Clone, Debug, Default)]
pub struct DepArrDct {
    pub arpt: Link,
    pub arr: bool,
    pub dist_nm: Option<f64>,
    pub civmil: CivMil,
}

/// Enroute DCT extraction accumulator.
#[derive(Clone, Debug, Default)]
pub struct EnrouteDct {
    pub airspace: Link,
    pub alt: AltRange,
    pub dist_nm: Option<f64>,
    pub civmil: CivMil,
}

/// A child of an AND node with its invert flag.
#[derive(Clone, PartialEq, Debug)]
pub struct CondChild {
    pub cond: Condition,
    pub inv: bool,
}

/// The condition tree.
#[derive(Clone, PartialEq, Debug)]
pub enum Condition {
    /// Conjunction of children, each with an invert flag; with the outer
    /// `inv` flag set the node behaves as an OR instead.
    And {
        childnum: u32,
        inv: bool,
        children: Vec<CondChild>,
    },
    /// Children must match at strictly increasing waypoint positions.
    Seq {
        childnum: u32,
        children: Vec<Condition>,
    },
    Constant {
        childnum: u32,
        value: bool,
    },
    CrossingAirspace1 {
        childnum: u32,
        alt: AltRange,
        airspace: Link,
        refloc: bool,
    },
    CrossingAirspace2 {
        childnum: u32,
        alt: AltRange,
        airspace: [Link; 2],
        refloc: bool,
    },
    CrossingDct {
        childnum: u32,
        alt: AltRange,
        wpt: [Link; 2],
        refloc: bool,
    },
    CrossingAirway {
        childnum: u32,
        alt: AltRange,
        wpt: [Link; 2],
        airway: Link,
        refloc: bool,
    },
    CrossingPoint {
        childnum: u32,
        alt: AltRange,
        wpt: Link,
        refloc: bool,
    },
    DepArr {
        childnum: u32,
        airport: Link,
        arr: bool,
        refloc: bool,
    },
    DepArrAirspace {
        childnum: u32,
        airspace: Link,
        arr: bool,
        refloc: bool,
    },
    SidStar {
        childnum: u32,
        proc: Link,
        star: bool,
        refloc: bool,
    },
    CrossingAirspaceActive {
        childnum: u32,
        airspace: Link,
    },
    CrossingAirwayAvailable {
        childnum: u32,
        alt: AltRange,
        wpt: [Link; 2],
        airway: Link,
    },
    DctLimit {
        childnum: u32,
        limit_nm: f64,
    },
    Aircraft {
        childnum: u32,
        icaotype: String,
        engines: u8,
        category: AircraftCategory,
        engine: EngineClass,
        rnav1: bool,
        rvsm: bool,
    },
    Flight {
        childnum: u32,
        civmil: CivMil,
        purpose: FlightPurpose,
    },
}

impl Condition {
    pub fn constant(childnum: u32, value: bool) -> Condition {
        Condition::Constant { childnum, value }
    }

    pub fn childnum(&self) -> u32 {
        match self {
            Self::And { childnum, .. }
            | Self::Seq { childnum, .. }
            | Self::Constant { childnum, .. }
            | Self::CrossingAirspace1 { childnum, .. }
            | Self::CrossingAirspace2 { childnum, .. }
            | Self::CrossingDct { childnum, .. }
            | Self::CrossingAirway { childnum, .. }
            | Self::CrossingPoint { childnum, .. }
            | Self::DepArr { childnum, .. }
            | Self::DepArrAirspace { childnum, .. }
            | Self::SidStar { childnum, .. }
            | Self::CrossingAirspaceActive { childnum, .. }
            | Self::CrossingAirwayAvailable { childnum, .. }
            | Self::DctLimit { childnum, .. }
            | Self::Aircraft { childnum, .. }
            | Self::Flight { childnum, .. } => *childnum,
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Self::Constant { .. })
    }

    pub fn const_value(&self) -> Option<bool> {
        match self {
            Self::Constant { value, .. } => Some(*value),
            _ => None,
        }
    }

    pub fn is_refloc(&self) -> bool {
        match self {
            Self::And { children, .. } => children.iter().any(|c| c.cond.is_refloc()),
            Self::Seq { children, .. } => children.iter().any(Condition::is_refloc),
            Self::CrossingAirspace1 { refloc, .. }
            | Self::CrossingAirspace2 { refloc, .. }
            | Self::CrossingDct { refloc, .. }
            | Self::CrossingAirway { refloc, .. }
            | Self::CrossingPoint { refloc, .. }
            | Self::DepArr { refloc, .. }
            | Self::DepArrAirspace { refloc, .. }
            | Self::SidStar { refloc, .. } => *refloc,
            _ => false,
        }
    }

    /// True iff this node tests a DCT property.
    pub fn is_dct(&self) -> bool {
        match self {
            Self::And { children, .. } => children.iter().any(|c| c.cond.is_dct()),
            Self::DctLimit { .. } => true,
            _ => false,
        }
    }

    fn discriminant(&self) -> u8 {
        match self {
            Self::And { .. } => COND_AND,
            Self::Seq { .. } => COND_SEQ,
            Self::Constant { .. } => COND_CONSTANT,
            Self::CrossingAirspace1 { .. } => COND_XNG_AIRSPACE1,
            Self::CrossingAirspace2 { .. } => COND_XNG_AIRSPACE2,
            Self::CrossingDct { .. } => COND_XNG_DCT,
            Self::CrossingAirway { .. } => COND_XNG_AIRWAY,
            Self::CrossingPoint { .. } => COND_XNG_POINT,
            Self::DepArr { .. } => COND_DEPARR,
            Self::DepArrAirspace { .. } => COND_DEPARR_AIRSPACE,
            Self::SidStar { .. } => COND_SIDSTAR,
            Self::CrossingAirspaceActive { .. } => COND_AIRSPACE_ACTIVE,
            Self::CrossingAirwayAvailable { .. } => COND_AIRWAY_AVAILABLE,
            Self::DctLimit { .. } => COND_DCT_LIMIT,
            Self::Aircraft { .. } => COND_AIRCRAFT,
            Self::Flight { .. } => COND_FLIGHT,
        }
    }

    fn default_for(disc: u8) -> Option<Condition> {
        Some(match disc {
            COND_AND => Self::And {
                childnum: 0,
                inv: false,
                children: Vec::new(),
            },
            COND_SEQ => Self::Seq {
                childnum: 0,
                children: Vec::new(),
            },
            COND_CONSTANT => Self::Constant {
                childnum: 0,
                value: false,
            },
            COND_XNG_AIRSPACE1 => Self::CrossingAirspace1 {
                childnum: 0,
                alt: AltRange::default(),
                airspace: Link::default(),
                refloc: false,
            },
            COND_XNG_AIRSPACE2 => Self::CrossingAirspace2 {
                childnum: 0,
                alt: AltRange::default(),
                airspace: [Link::default(), Link::default()],
                refloc: false,
            },
            COND_XNG_DCT => Self::CrossingDct {
                childnum: 0,
                alt: AltRange::default(),
                wpt: [Link::default(), Link::default()],
                refloc: false,
            },
            COND_XNG_AIRWAY => Self::CrossingAirway {
                childnum: 0,
                alt: AltRange::default(),
                wpt: [Link::default(), Link::default()],
                airway: Link::default(),
                refloc: false,
            },
            COND_XNG_POINT => Self::CrossingPoint {
                childnum: 0,
                alt: AltRange::default(),
                wpt: Link::default(),
                refloc: false,
            },
            COND_DEPARR => Self::DepArr {
                childnum: 0,
                airport: Link::default(),
                arr: false,
                refloc: false,
            },
            COND_DEPARR_AIRSPACE => Self::DepArrAirspace {
                childnum: 0,
                airspace: Link::default(),
                arr: false,
                refloc: false,
            },
            COND_SIDSTAR => Self::SidStar {
                childnum: 0,
                proc: Link::default(),
                star: false,
                refloc: false,
            },
            COND_AIRSPACE_ACTIVE => Self::CrossingAirspaceActive {
                childnum: 0,
                airspace: Link::default(),
            },
            COND_AIRWAY_AVAILABLE => Self::CrossingAirwayAvailable {
                childnum: 0,
                alt: AltRange::default(),
                wpt: [Link::default(), Link::default()],
                airway: Link::default(),
            },
            COND_DCT_LIMIT => Self::DctLimit {
                childnum: 0,
                limit_nm: 0.0,
            },
            COND_AIRCRAFT => Self::Aircraft {
                childnum: 0,
                icaotype: String::new(),
                engines: 0,
                category: AircraftCategory::Invalid,
                engine: EngineClass::Invalid,
                rnav1: false,
                rvsm: false,
            },
            COND_FLIGHT => Self::Flight {
                childnum: 0,
                civmil: CivMil::Invalid,
                purpose: FlightPurpose::Invalid,
            },
            _ => return None,
        })
    }

    fn body<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        match self {
            Self::And {
                childnum,
                inv,
                children,
            } => {
                ar.io_uleb32(childnum)?;
                ar.io_bool(inv)?;
                let mut n = children.len() as u32;
                ar.io_uleb32(&mut n)?;
                if ar.is_load() {
                    children.clear();
                    for _ in 0..n {
                        let mut slot = None;
                        Condition::io_opt(&mut slot, ar)?;
                        let mut inv = false;
                        ar.io_bool(&mut inv)?;
                        if let Some(cond) = slot {
                            children.push(CondChild { cond, inv });
                        }
                    }
                } else {
                    for child in children.iter_mut() {
                        let mut slot = Some(std::mem::replace(
                            &mut child.cond,
                            Condition::constant(0, false),
                        ));
                        Condition::io_opt(&mut slot, ar)?;
                        if let Some(cond) = slot {
                            child.cond = cond;
                        }
                        ar.io_bool(&mut child.inv)?;
                    }
                }
                Ok(())
            }
            Self::Seq { childnum, children } => {
                ar.io_uleb32(childnum)?;
                let mut n = children.len() as u32;
                ar.io_uleb32(&mut n)?;
                if ar.is_load() {
                    children.clear();
                    for _ in 0..n {
                        let mut slot = None;
                        Condition::io_opt(&mut slot, ar)?;
                        if let Some(cond) = slot {
                            children.push(cond);
                        }
                    }
                } else {
                    for child in children.iter_mut() {
                        let mut slot =
                            Some(std::mem::replace(child, Condition::constant(0, false)));
                        Condition::io_opt(&mut slot, ar)?;
                        if let Some(cond) = slot {
                            *child = cond;
                        }
                    }
                }
                Ok(())
            }
            Self::Constant { childnum, value } => {
                ar.io_uleb32(childnum)?;
                ar.io_bool(value)
            }
            Self::CrossingAirspace1 {
                childnum,
                alt,
                airspace,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                alt.hibernate(ar)?;
                ar.io_link(airspace)?;
                ar.io_bool(refloc)
            }
            Self::CrossingAirspace2 {
                childnum,
                alt,
                airspace,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                alt.hibernate(ar)?;
                ar.io_link(&mut airspace[0])?;
                ar.io_link(&mut airspace[1])?;
                ar.io_bool(refloc)
            }
            Self::CrossingDct {
                childnum,
                alt,
                wpt,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                alt.hibernate(ar)?;
                ar.io_link(&mut wpt[0])?;
                ar.io_link(&mut wpt[1])?;
                ar.io_bool(refloc)
            }
            Self::CrossingAirway {
                childnum,
                alt,
                wpt,
                airway,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                alt.hibernate(ar)?;
                ar.io_link(&mut wpt[0])?;
                ar.io_link(&mut wpt[1])?;
                ar.io_bool(refloc)?;
                ar.io_link(airway)
            }
            Self::CrossingPoint {
                childnum,
                alt,
                wpt,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                alt.hibernate(ar)?;
                ar.io_link(wpt)?;
                ar.io_bool(refloc)
            }
            Self::DepArr {
                childnum,
                airport,
                arr,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                ar.io_link(airport)?;
                ar.io_bool(arr)?;
                ar.io_bool(refloc)
            }
            Self::DepArrAirspace {
                childnum,
                airspace,
                arr,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                ar.io_link(airspace)?;
                ar.io_bool(arr)?;
                ar.io_bool(refloc)
            }
            Self::SidStar {
                childnum,
                proc,
                star,
                refloc,
            } => {
                ar.io_uleb32(childnum)?;
                ar.io_link(proc)?;
                ar.io_bool(star)?;
                ar.io_bool(refloc)
            }
            Self::CrossingAirspaceActive { childnum, airspace } => {
                ar.io_uleb32(childnum)?;
                ar.io_link(airspace)
            }
            Self::CrossingAirwayAvailable {
                childnum,
                alt,
                wpt,
                airway,
            } => {
                ar.io_uleb32(childnum)?;
                alt.hibernate(ar)?;
                ar.io_link(&mut wpt[0])?;
                ar.io_link(&mut wpt[1])?;
                ar.io_link(airway)
            }
            Self::DctLimit { childnum, limit_nm } => {
                ar.io_uleb32(childnum)?;
                // 16.16 fixed point keeps the framing integer-only
                let mut fixed = (*limit_nm * 65536.0) as u32;
                ar.io_u32(&mut fixed)?;
                if ar.is_load() {
                    *limit_nm = f64::from(fixed) / 65536.0;
                }
                Ok(())
            }
            Self::Aircraft {
                childnum,
                icaotype,
                engines,
                category,
                engine,
                rnav1,
                rvsm,
            } => {
                ar.io_uleb32(childnum)?;
                ar.io_string(icaotype)?;
                ar.io_u8(engines)?;
                let mut cat = category.byte();
                ar.io_u8(&mut cat)?;
                *category = AircraftCategory::from_byte(cat);
                let mut eng = engine.byte();
                ar.io_u8(&mut eng)?;
                *engine = EngineClass::from_byte(eng);
                ar.io_bool(rnav1)?;
                ar.io_bool(rvsm)
            }
            Self::Flight {
                childnum,
                civmil,
                purpose,
            } => {
                ar.io_uleb32(childnum)?;
                let mut cm = civmil.byte();
                ar.io_u8(&mut cm)?;
                *civmil = CivMil::from_byte(cm);
                let mut p = purpose.byte();
                ar.io_u8(&mut p)?;
                *purpose = FlightPurpose::from_byte(p);
                Ok(())
            }
        }
    }

    /// Polymorphic IO: a discriminant byte precedes the body; the invalid
    /// discriminant encodes an absent condition.
    pub fn io_opt<A: Archive>(slot: &mut Option<Condition>, ar: &mut A) -> Result<()> {
        if ar.is_load() {
            let mut disc = 0u8;
            ar.io_u8(&mut disc)?;
            if disc == COND_INVALID {
                *slot = None;
                return Ok(());
            }
            let mut cond = Condition::default_for(disc).ok_or_else(|| Error::Decode {
                uuid: None,
                source: adr_archive::DecodeError::UnknownDiscriminant {
                    offset: 0,
                    what: "condition",
                    value: disc,
                },
                blob: String::new(),
            })?;
            cond.body(ar)?;
            *slot = Some(cond);
            return Ok(());
        }
        let mut disc = slot.as_ref().map_or(COND_INVALID, |c| c.discriminant());
        ar.io_u8(&mut disc)?;
        if let Some(cond) = slot {
            cond.body(ar)?;
        }
        Ok(())
    }

    /////////////////////////////////////////////////////////////////////
    // Evaluation against a waypoint sequence
    /////////////////////////////////////////////////////////////////////

    pub fn evaluate(&self, ev: &RestrictionEval) -> CondResult {
        match self {
            Self::And { inv, children, .. } => self.evaluate_and(ev, *inv, children),
            Self::Seq { children, .. } => self.evaluate_seq(ev, children),
            Self::Constant { value, .. } => CondResult::new(*value),
            Self::CrossingAirspace1 {
                alt,
                airspace,
                refloc,
                ..
            } => evaluate_crossing_airspace1(ev, alt, airspace, *refloc),
            Self::CrossingAirspace2 {
                alt,
                airspace,
                refloc,
                ..
            } => evaluate_crossing_airspace2(ev, alt, airspace, *refloc),
            Self::CrossingDct {
                alt, wpt, refloc, ..
            } => evaluate_crossing_dct(ev, alt, wpt, *refloc),
            Self::CrossingAirway {
                alt,
                wpt,
                airway,
                refloc,
                ..
            } => evaluate_crossing_airway(ev, alt, wpt, airway, *refloc),
            Self::CrossingPoint {
                alt, wpt, refloc, ..
            } => evaluate_crossing_point(ev, alt, wpt, *refloc),
            Self::DepArr {
                airport,
                arr,
                refloc,
                ..
            } => evaluate_deparr(ev, airport, *arr, *refloc),
            Self::DepArrAirspace {
                airspace,
                arr,
                refloc,
                ..
            } => evaluate_deparr_airspace(ev, airspace, *arr, *refloc),
            Self::SidStar {
                proc, star, refloc, ..
            } => evaluate_sidstar(ev, proc, *star, *refloc),
            Self::CrossingAirspaceActive { airspace, .. } => {
                let active = ev
                    .condavail()
                    .is_active(airspace.uuid(), ev.departure_time());
                CondResult::new(active)
            }
            Self::CrossingAirwayAvailable {
                alt, wpt, airway, ..
            } => evaluate_airway_available(ev, alt, wpt, airway),
            Self::DctLimit { limit_nm, .. } => {
                let mut r = CondResult::new(false);
                let wpts = ev.waypoints();
                for nr in 1..wpts.len() {
                    let wpt0 = &wpts[nr - 1];
                    if !wpt0.is_ifr()
                        || (wpt0.pathcode() != PathCode::DirectTo && !wpt0.is_stay())
                    {
                        continue;
                    }
                    let wpt1 = &wpts[nr];
                    if wpt0.coord().dist_nm(&wpt1.coord()) <= *limit_nm {
                        continue;
                    }
                    r.set_result(Some(true));
                    r.edgeset_mut().insert(nr - 1);
                    r.xngedgeset_mut().insert(nr - 1);
                }
                r
            }
            Self::Aircraft {
                icaotype,
                engines,
                category,
                engine,
                rnav1,
                rvsm,
                ..
            } => {
                let acft = ev.aircraft();
                let mut ok = true;
                if !icaotype.is_empty() {
                    ok &= acft.icao_type == *icaotype;
                }
                if *engines != 0 {
                    ok &= acft.engines == *engines;
                }
                if *category != AircraftCategory::Invalid {
                    ok &= acft.category == *category;
                }
                if *engine != EngineClass::Invalid {
                    ok &= acft.engine == *engine;
                }
                if *rnav1 {
                    ok &= acft.rnav1;
                }
                if *rvsm {
                    ok &= acft.rvsm;
                }
                CondResult::new(ok)
            }
            Self::Flight {
                civmil, purpose, ..
            } => {
                let mut ok = true;
                if *civmil != CivMil::Invalid {
                    ok &= ev.civmil() == *civmil;
                }
                match purpose {
                    FlightPurpose::All | FlightPurpose::Invalid => {}
                    p => ok &= ev.flight_type() == p.byte() as char,
                }
                CondResult::new(ok)
            }
        }
    }

    fn evaluate_and(&self, ev: &RestrictionEval, inv: bool, children: &[CondChild]) -> CondResult {
        let mut hasdctlim = false;
        let mut r = CondResult::new_inv(!inv, !inv);
        if inv {
            // OR
            for child in children {
                hasdctlim |= matches!(child.cond, Self::DctLimit { .. });
                let mut r1 = child.cond.evaluate(ev);
                if !child.inv && !r1.is_indeterminate() {
                    r1 = r1.not();
                }
                r.or_assign(&r1);
            }
        } else {
            for child in children {
                hasdctlim |= matches!(child.cond, Self::DctLimit { .. });
                let mut r1 = child.cond.evaluate(ev);
                if child.inv && !r1.is_indeterminate() {
                    r1 = r1.not();
                }
                r.and_assign(&r1);
                if r.is_false() {
                    return CondResult::new(false);
                }
            }
        }
        if hasdctlim {
            // a DCT-limit child reduces the witnesses to the crossing edges
            r.vertexset_mut().clear();
            if r.xngedgeset().is_empty() {
                r.set_result(Some(false));
                r.edgeset_mut().clear();
            } else {
                *r.edgeset_mut() = r.xngedgeset().clone();
            }
        }
        r
    }

    fn evaluate_seq(&self, ev: &RestrictionEval, children: &[Condition]) -> CondResult {
        let mut r = CondResult::new(true);
        let mut first = true;
        let mut seq = 0usize;
        for child in children {
            if first {
                r = child.evaluate(ev);
                first = false;
                seq = r.seqorder(0);
            } else {
                let r1 = child.evaluate(ev);
                let seq1 = r1.seqorder(seq);
                if seq1 <= seq {
                    return CondResult::new(false);
                }
                r.and_assign(&r1);
                seq = seq1;
            }
            if r.is_false() {
                return CondResult::new(false);
            }
        }
        r.xngedgeset_mut().clear();
        r
    }

    /////////////////////////////////////////////////////////////////////
    // Evaluation against a direct-leg candidate
    /////////////////////////////////////////////////////////////////////

    /// The altitudes per direction at which the condition holds for the
    /// candidate direct leg.
    pub fn evaluate_dct(&self, dct: &DctCalc<'_>) -> BidirAltRange {
        match self {
            Self::And { inv, children, .. } => {
                if *inv {
                    // OR
                    let mut r = BidirAltRange::empty();
                    for child in children {
                        if matches!(child.cond, Self::Flight { .. }) {
                            continue;
                        }
                        let mut r1 = child.cond.evaluate_dct(dct);
                        if !child.inv {
                            r1.invert();
                        }
                        r |= &r1;
                    }
                    r
                } else {
                    let mut r = dct.default_alt().clone();
                    for child in children {
                        if matches!(child.cond, Self::Flight { .. }) {
                            continue;
                        }
                        let mut r1 = child.cond.evaluate_dct(dct);
                        if child.inv {
                            r1.invert();
                        }
                        r &= &r1;
                        if r.is_empty() {
                            break;
                        }
                    }
                    r
                }
            }
            Self::Constant { value, .. } => {
                if *value {
                    dct.default_alt().clone()
                } else {
                    BidirAltRange::empty()
                }
            }
            Self::CrossingAirspace1 { alt, airspace, .. } => {
                let mut r = IntervalSet::empty();
                if !dct.is_airport() {
                    if let Some(aspc) = airspace.obj() {
                        if let Some(slice) = aspc
                            .slice_at(dct.time())
                            .and_then(|ts| ts.payload().as_airspace())
                        {
                            r = slice.point_intersect_altitudes(
                                &dct.tte(0),
                                dct.coord(1),
                                alt,
                            );
                        }
                    }
                }
                BidirAltRange::from_sets(r.clone(), r)
            }
            Self::CrossingAirspace2 { alt, airspace, .. } => {
                evaluate_dct_airspace2(dct, alt, airspace)
            }
            Self::CrossingDct { alt, wpt, .. } | Self::CrossingAirway { alt, wpt, .. } => {
                let mut r = BidirAltRange::empty();
                for i in 0..2 {
                    if *wpt[0].uuid() == *dct.point(i).uuid()
                        && *wpt[1].uuid() == *dct.point(1 - i).uuid()
                    {
                        *r.dir_mut(i) = alt.interval(false);
                    }
                }
                r
            }
            Self::CrossingPoint { alt, wpt, .. } => {
                let mut r = BidirAltRange::empty();
                for i in 0..2 {
                    if *wpt.uuid() == *dct.point(i).uuid() {
                        r = BidirAltRange::from_altrange(alt);
                        break;
                    }
                }
                r
            }
            Self::DctLimit { limit_nm, .. } => {
                let mut r = dct.default_alt().clone();
                if dct.dist_nm() <= *limit_nm {
                    r.set_empty();
                }
                r
            }
            // time, traffic and procedure tests do not constrain a direct
            _ => BidirAltRange::empty(),
        }
    }

    /////////////////////////////////////////////////////////////////////
    // Simplification
    /////////////////////////////////////////////////////////////////////

    /// Constant folding over the tree.
    pub fn simplify(&self) -> Condition {
        self.rewrite(&|leaf| leaf.clone())
    }

    /// Rewrites leaves via `f`, folding constants in AND/SEQ nodes.
    fn rewrite(&self, f: &dyn Fn(&Condition) -> Condition) -> Condition {
        match self {
            Self::And {
                childnum,
                inv,
                children,
            } => {
                let rewritten: Vec<CondChild> = children
                    .iter()
                    .map(|c| CondChild {
                        cond: c.cond.rewrite(f),
                        inv: c.inv,
                    })
                    .collect();
                fold_and(*childnum, *inv, rewritten)
            }
            Self::Seq { childnum, children } => {
                let rewritten: Vec<Condition> =
                    children.iter().map(|c| c.rewrite(f)).collect();
                fold_seq(*childnum, rewritten)
            }
            leaf => f(leaf),
        }
    }

    /// Replaces children whose geographic extent misses `bbox` with
    /// constant false.
    pub fn simplify_bbox(&self, bbox: &Rect, t0: Timestamp, t1: Timestamp) -> Condition {
        self.rewrite(&|leaf| {
            let mut own = Rect::INVALID;
            leaf.add_bbox(&mut own, t0, t1);
            if own.is_invalid() || bbox.is_intersect(&own) {
                leaf.clone()
            } else {
                Condition::constant(leaf.childnum(), false)
            }
        })
    }

    /// Replaces altitude-banded children disjoint from `[minalt, maxalt]`
    /// with constant false.
    pub fn simplify_altrange(&self, minalt: i32, maxalt: i32) -> Condition {
        self.rewrite(&|leaf| match leaf.altrange() {
            Some(ar) if !ar.is_overlap(minalt, maxalt) => {
                Condition::constant(leaf.childnum(), false)
            }
            _ => leaf.clone(),
        })
    }

    /// Resolves ICAO-type tests against the filed type.
    pub fn simplify_aircrafttype(&self, acfttype: &str) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::Aircraft {
                childnum,
                icaotype,
                engines,
                category,
                engine,
                rnav1,
                rvsm,
            } if !icaotype.is_empty() => {
                if icaotype != acfttype {
                    return Condition::constant(*childnum, false);
                }
                let rest = Self::Aircraft {
                    childnum: *childnum,
                    icaotype: String::new(),
                    engines: *engines,
                    category: *category,
                    engine: *engine,
                    rnav1: *rnav1,
                    rvsm: *rvsm,
                };
                if rest.is_vacuous_aircraft() {
                    Condition::constant(*childnum, true)
                } else {
                    rest
                }
            }
            other => other.clone(),
        })
    }

    /// Resolves category/engine tests against the filed aircraft class
    /// (e.g. `L2J`).
    pub fn simplify_aircraftclass(&self, acftclass: &str) -> Condition {
        let mut chars = acftclass.chars();
        let category = AircraftCategory::from_byte(chars.next().unwrap_or('\0') as u8);
        let engines = chars
            .next()
            .and_then(|c| c.to_digit(10))
            .unwrap_or(0) as u8;
        let engine = EngineClass::from_byte(chars.next().unwrap_or('\0') as u8);
        self.rewrite(&|leaf| match leaf {
            Self::Aircraft {
                childnum,
                icaotype,
                engines: e,
                category: c,
                engine: eng,
                rnav1,
                rvsm,
            } if icaotype.is_empty()
                && (*c != AircraftCategory::Invalid
                    || *e != 0
                    || *eng != EngineClass::Invalid) =>
            {
                if (*c != AircraftCategory::Invalid && *c != category)
                    || (*e != 0 && *e != engines)
                    || (*eng != EngineClass::Invalid && *eng != engine)
                {
                    return Condition::constant(*childnum, false);
                }
                let rest = Self::Aircraft {
                    childnum: *childnum,
                    icaotype: String::new(),
                    engines: 0,
                    category: AircraftCategory::Invalid,
                    engine: EngineClass::Invalid,
                    rnav1: *rnav1,
                    rvsm: *rvsm,
                };
                if rest.is_vacuous_aircraft() {
                    Condition::constant(*childnum, true)
                } else {
                    rest
                }
            }
            other => other.clone(),
        })
    }

    /// Resolves equipment and PBN capability tests.
    pub fn simplify_equipment(&self, rnav1: bool, rvsm: bool) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::Aircraft {
                childnum,
                icaotype,
                engines,
                category,
                engine,
                rnav1: need_rnav1,
                rvsm: need_rvsm,
            } if icaotype.is_empty()
                && *engines == 0
                && *category == AircraftCategory::Invalid
                && *engine == EngineClass::Invalid
                && (*need_rnav1 || *need_rvsm) =>
            {
                let ok = (!*need_rnav1 || rnav1) && (!*need_rvsm || rvsm);
                Condition::constant(*childnum, ok)
            }
            other => other.clone(),
        })
    }

    /// Resolves flight-purpose tests against the filed type of flight.
    pub fn simplify_typeofflight(&self, type_of_flight: char) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::Flight {
                childnum,
                civmil,
                purpose,
            } if !matches!(purpose, FlightPurpose::All | FlightPurpose::Invalid) => {
                let ok = purpose.byte() as char == type_of_flight;
                if !ok {
                    Condition::constant(*childnum, false)
                } else if *civmil == CivMil::Invalid {
                    Condition::constant(*childnum, true)
                } else {
                    Self::Flight {
                        childnum: *childnum,
                        civmil: *civmil,
                        purpose: FlightPurpose::All,
                    }
                }
            }
            other => other.clone(),
        })
    }

    /// Resolves civil/military tests.
    pub fn simplify_mil(&self, mil: bool) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::Flight {
                childnum,
                civmil,
                purpose,
            } if *civmil != CivMil::Invalid => {
                let ok = (*civmil == CivMil::Mil) == mil;
                if !ok {
                    Condition::constant(*childnum, false)
                } else if matches!(purpose, FlightPurpose::All | FlightPurpose::Invalid) {
                    Condition::constant(*childnum, true)
                } else {
                    Self::Flight {
                        childnum: *childnum,
                        civmil: CivMil::Invalid,
                        purpose: *purpose,
                    }
                }
            }
            other => other.clone(),
        })
    }

    /// Resolves departure tests against the filed departure airport.
    pub fn simplify_dep(&self, arpt: &Uuid) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::DepArr {
                childnum,
                airport,
                arr: false,
                refloc,
            } => {
                let matches = *airport.uuid() == *arpt;
                if matches && *refloc {
                    leaf.clone()
                } else {
                    Condition::constant(*childnum, matches)
                }
            }
            other => other.clone(),
        })
    }

    /// Resolves destination tests against the filed destination airport.
    pub fn simplify_dest(&self, arpt: &Uuid) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::DepArr {
                childnum,
                airport,
                arr: true,
                refloc,
            } => {
                let matches = *airport.uuid() == *arpt;
                if matches && *refloc {
                    leaf.clone()
                } else {
                    Condition::constant(*childnum, matches)
                }
            }
            other => other.clone(),
        })
    }

    /// Resolves airspace-activation tests against the conditional
    /// availability view over `[t0, t1)`.
    pub fn simplify_conditionalavailability(
        &self,
        condavail: &crate::eval::ConditionalAvailability,
        t0: Timestamp,
        t1: Timestamp,
    ) -> Condition {
        self.rewrite(&|leaf| match leaf {
            Self::CrossingAirspaceActive { childnum, airspace } => {
                match condavail.activation_over(airspace.uuid(), t0, t1) {
                    Some(active) => Condition::constant(*childnum, active),
                    None => leaf.clone(),
                }
            }
            other => other.clone(),
        })
    }

    fn is_vacuous_aircraft(&self) -> bool {
        matches!(
            self,
            Self::Aircraft {
                icaotype,
                engines: 0,
                category: AircraftCategory::Invalid,
                engine: EngineClass::Invalid,
                rnav1: false,
                rvsm: false,
                ..
            } if icaotype.is_empty()
        )
    }

    fn altrange(&self) -> Option<&AltRange> {
        match self {
            Self::CrossingAirspace1 { alt, .. }
            | Self::CrossingAirspace2 { alt, .. }
            | Self::CrossingDct { alt, .. }
            | Self::CrossingAirway { alt, .. }
            | Self::CrossingPoint { alt, .. }
            | Self::CrossingAirwayAvailable { alt, .. } => Some(alt),
            _ => None,
        }
    }

    /////////////////////////////////////////////////////////////////////
    // Route-static analysis and extraction
    /////////////////////////////////////////////////////////////////////

    /// True iff the truth value depends only on the filed path.
    pub fn is_routestatic(&self) -> bool {
        match self {
            Self::And { children, .. } => children.iter().all(|c| c.cond.is_routestatic()),
            Self::Seq { children, .. } => children.iter().all(Condition::is_routestatic),
            Self::Constant { .. } | Self::DepArr { .. } => true,
            _ => false,
        }
    }

    /// Route-static value against a candidate segment, narrowing the
    /// segment's altitude band on the way.
    pub fn routestatic_against(&self, seg: &mut RuleSegment) -> RouteStatic {
        match self {
            Self::And { inv, children, .. } => {
                let mut ret = if *inv {
                    RouteStatic::StaticFalse
                } else {
                    RouteStatic::StaticTrue
                };
                for child in children {
                    let mut rs = child.cond.routestatic_against(seg);
                    if child.inv {
                        rs = match rs {
                            RouteStatic::StaticFalse => RouteStatic::StaticTrue,
                            RouteStatic::StaticTrue => RouteStatic::StaticFalse,
                            other => other,
                        };
                    }
                    match rs {
                        RouteStatic::StaticFalse => {
                            return if *inv {
                                RouteStatic::StaticTrue
                            } else {
                                RouteStatic::StaticFalse
                            };
                        }
                        RouteStatic::NonStatic => ret = RouteStatic::NonStatic,
                        RouteStatic::StaticUnknown if ret != RouteStatic::NonStatic => {
                            ret = RouteStatic::StaticUnknown;
                        }
                        _ => {}
                    }
                }
                ret
            }
            Self::Constant { value, .. } => {
                if *value {
                    RouteStatic::StaticTrue
                } else {
                    RouteStatic::StaticFalse
                }
            }
            Self::CrossingPoint { alt, wpt, .. } => {
                let hit = match seg.segment_type {
                    RuleSegmentType::Point => *wpt.uuid() == seg.uuid0(),
                    RuleSegmentType::Dct | RuleSegmentType::Airway => {
                        *wpt.uuid() == seg.uuid0() || *wpt.uuid() == seg.uuid1()
                    }
                    _ => false,
                };
                if !hit {
                    return RouteStatic::NonStatic;
                }
                narrow_static(seg, alt)
            }
            Self::CrossingDct { alt, wpt, .. } => {
                if seg.segment_type != RuleSegmentType::Dct
                    || *wpt[0].uuid() != seg.uuid0()
                    || *wpt[1].uuid() != seg.uuid1()
                {
                    return RouteStatic::NonStatic;
                }
                narrow_static(seg, alt)
            }
            Self::CrossingAirway {
                alt, wpt, airway, ..
            } => {
                if seg.segment_type != RuleSegmentType::Airway
                    || *wpt[0].uuid() != seg.uuid0()
                    || *wpt[1].uuid() != seg.uuid1()
                    || *airway.uuid() != seg.airway_uuid()
                {
                    return RouteStatic::NonStatic;
                }
                narrow_static(seg, alt)
            }
            Self::CrossingAirspace1 { alt, airspace, .. } => {
                if seg.segment_type != RuleSegmentType::Airspace
                    || seg.uuid0() != *airspace.uuid()
                {
                    return RouteStatic::NonStatic;
                }
                narrow_static(seg, alt)
            }
            other => {
                if other.is_routestatic() {
                    RouteStatic::StaticUnknown
                } else {
                    RouteStatic::NonStatic
                }
            }
        }
    }

    /// DCT applicability of the condition; accumulates the civ/mil
    /// specialisation.
    pub fn is_valid_dct(&self, allowarrdep: bool, civmil: &mut CivMil) -> bool {
        match self {
            Self::And { inv, children, .. } => {
                for child in children {
                    if let Self::Flight {
                        civmil: cm,
                        purpose,
                        ..
                    } = &child.cond
                    {
                        if !matches!(purpose, FlightPurpose::All | FlightPurpose::Invalid) {
                            return false;
                        }
                        let cm1 = if child.inv { cm.inverted() } else { *cm };
                        if !CivMil::fold(civmil, cm1) {
                            return false;
                        }
                        continue;
                    }
                    if *inv != child.inv {
                        return false;
                    }
                    let mut cm1 = CivMil::Invalid;
                    if !child.cond.is_valid_dct(allowarrdep, &mut cm1) {
                        return false;
                    }
                    if child.inv {
                        cm1 = cm1.inverted();
                    }
                    if !CivMil::fold(civmil, cm1) {
                        return false;
                    }
                }
                true
            }
            Self::Constant { .. }
            | Self::CrossingAirspace1 { .. }
            | Self::CrossingAirspace2 { .. }
            | Self::CrossingDct { .. }
            | Self::CrossingPoint { .. }
            | Self::DctLimit { .. } => true,
            Self::DepArr { .. } => allowarrdep,
            _ => false,
        }
    }

    /// Departure or destination airports this condition pins down.
    pub fn is_deparr(
        &self,
        dep: &mut std::collections::BTreeSet<Link>,
        dest: &mut std::collections::BTreeSet<Link>,
    ) -> bool {
        match self {
            Self::And { inv, children, .. } => {
                if *inv {
                    return false;
                }
                let mut any = false;
                for child in children {
                    if child.inv {
                        continue;
                    }
                    any |= child.cond.is_deparr(dep, dest);
                }
                any
            }
            Self::DepArr { airport, arr, .. } => {
                if *arr {
                    dest.insert(airport.clone());
                } else {
                    dep.insert(airport.clone());
                }
                true
            }
            _ => false,
        }
    }

    /// Departure/arrival DCT-limit shape of the condition.
    pub fn is_deparr_dct(&self, acc: &mut DepArrDct) -> bool {
        match self {
            Self::And { inv, children, .. } => {
                if *inv {
                    return false;
                }
                for child in children {
                    let mut acc1 = DepArrDct::default();
                    if !child.cond.is_deparr_dct(&mut acc1) {
                        return false;
                    }
                    if child.inv {
                        if !acc1.arpt.is_nil() || acc1.dist_nm.is_some() {
                            return false;
                        }
                        acc1.civmil = acc1.civmil.inverted();
                    }
                    if acc.arpt.is_nil() {
                        acc.arpt = acc1.arpt;
                        acc.arr = acc1.arr;
                    } else if !acc1.arpt.is_nil()
                        && (acc.arpt != acc1.arpt || acc.arr != acc1.arr)
                    {
                        return false;
                    }
                    acc.dist_nm = match (acc.dist_nm, acc1.dist_nm) {
                        (None, d) | (d, None) => d,
                        (Some(a), Some(b)) => Some(a.min(b)),
                    };
                    if !CivMil::fold(&mut acc.civmil, acc1.civmil) {
                        return false;
                    }
                }
                true
            }
            Self::DepArr { airport, arr, .. } => {
                acc.arpt = airport.clone();
                acc.arr = *arr;
                true
            }
            Self::DctLimit { limit_nm, .. } => {
                acc.dist_nm = Some(*limit_nm);
                true
            }
            Self::Flight {
                civmil, purpose, ..
            } => {
                if !matches!(purpose, FlightPurpose::All | FlightPurpose::Invalid) {
                    return false;
                }
                acc.civmil = *civmil;
                true
            }
            _ => false,
        }
    }

    /// Enroute DCT-limit shape of the condition.
    pub fn is_enroute_dct(&self, acc: &mut EnrouteDct) -> bool {
        match self {
            Self::And { inv, children, .. } => {
                if *inv {
                    return false;
                }
                for child in children {
                    let mut acc1 = EnrouteDct::default();
                    if !child.cond.is_enroute_dct(&mut acc1) {
                        return false;
                    }
                    if child.inv {
                        if !acc1.airspace.is_nil() || acc1.dist_nm.is_some() {
                            return false;
                        }
                        acc1.civmil = acc1.civmil.inverted();
                    }
                    if acc.airspace.is_nil() {
                        acc.airspace = acc1.airspace;
                        acc.alt = acc1.alt;
                    } else if !acc1.airspace.is_nil() {
                        if acc.airspace != acc1.airspace {
                            return false;
                        }
                        acc.alt.intersect(&acc1.alt);
                    }
                    acc.dist_nm = match (acc.dist_nm, acc1.dist_nm) {
                        (None, d) | (d, None) => d,
                        (Some(a), Some(b)) => Some(a.min(b)),
                    };
                    if !CivMil::fold(&mut acc.civmil, acc1.civmil) {
                        return false;
                    }
                }
                true
            }
            Self::CrossingAirspace1 { alt, airspace, .. } => {
                acc.airspace = airspace.clone();
                acc.alt = *alt;
                true
            }
            Self::DctLimit { limit_nm, .. } => {
                acc.dist_nm = Some(*limit_nm);
                true
            }
            Self::Flight {
                civmil, purpose, ..
            } => {
                if !matches!(purpose, FlightPurpose::All | FlightPurpose::Invalid) {
                    return false;
                }
                acc.civmil = *civmil;
                true
            }
            _ => false,
        }
    }

    /// Extracts inverted crossing-point tests under an OR node into
    /// `pts`, replacing them with constant true; `None` when the shape
    /// does not allow it. The conjunction form handles the
    /// airspace-qualified case: the point bands are narrowed by the
    /// airspace's vertical limits.
    pub fn extract_crossingpoints(&self, pts: &mut Vec<RuleSegment>) -> Option<Condition> {
        match self {
            Self::And {
                childnum,
                inv: true,
                children,
            } => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    let cond = if child.inv {
                        child
                            .cond
                            .extract_crossingpoints(pts)
                            .unwrap_or_else(|| child.cond.clone())
                    } else {
                        child.cond.clone()
                    };
                    out.push(CondChild {
                        cond,
                        inv: child.inv,
                    });
                }
                Some(fold_and(*childnum, true, out))
            }
            Self::And {
                childnum,
                inv: false,
                children,
            } if children.len() == 2 => {
                self.extract_within_airspace(*childnum, children, pts, false)
            }
            Self::Seq { childnum, children } => {
                let mut out = Vec::with_capacity(children.len());
                let mut first = true;
                for child in children {
                    if first {
                        let mut pts1 = Vec::new();
                        let cond = child.extract_crossingpoints(&mut pts1);
                        first = pts1.is_empty();
                        if first && !child.is_routestatic() {
                            return None;
                        }
                        pts.extend(pts1);
                        out.push(cond.unwrap_or_else(|| child.clone()));
                    } else {
                        if !child.is_routestatic() {
                            return None;
                        }
                        out.push(child.clone());
                    }
                }
                Some(fold_seq(*childnum, out))
            }
            Self::CrossingPoint {
                childnum, alt, wpt, ..
            } => {
                wpt.obj()?;
                pts.push(
                    RuleSegment::new(RuleSegmentType::Point, *alt).with_wpt0(wpt.obj().cloned()),
                );
                Some(Condition::constant(*childnum, true))
            }
            Self::DepArr {
                childnum, airport, ..
            } => {
                airport.obj()?;
                pts.push(
                    RuleSegment::new(RuleSegmentType::Point, AltRange::default())
                        .with_wpt0(airport.obj().cloned()),
                );
                Some(Condition::constant(*childnum, true))
            }
            _ => None,
        }
    }

    /// The `airspace-crossing AND something` form: one child names a
    /// single airspace, the points of the other are narrowed by its
    /// vertical band.
    fn extract_within_airspace(
        &self,
        childnum: u32,
        children: &[CondChild],
        out_segs: &mut Vec<RuleSegment>,
        segments: bool,
    ) -> Option<Condition> {
        if children[0].inv || children[1].inv {
            return None;
        }
        for i in 0..2 {
            let mut aspcs = Vec::new();
            let aspc_cond = children[i].cond.extract_crossingairspaces(&mut aspcs);
            let [aspc_seg] = aspcs.as_slice() else {
                continue;
            };
            if !aspc_seg.is_airspace() || aspc_seg.wpt[0].is_none() {
                continue;
            }
            let mut extracted = Vec::new();
            let other = if segments {
                children[1 - i].cond.extract_crossingsegments(&mut extracted)?
            } else {
                children[1 - i].cond.extract_crossingpoints(&mut extracted)?
            };
            if extracted.is_empty() {
                return None;
            }
            for seg in &mut extracted {
                seg.alt.intersect(&aspc_seg.alt);
            }
            out_segs.extend(extracted);
            let rewritten = vec![
                CondChild {
                    cond: aspc_cond.unwrap_or_else(|| children[i].cond.clone()),
                    inv: false,
                },
                CondChild {
                    cond: other,
                    inv: false,
                },
            ];
            let rewritten = if i == 0 {
                rewritten
            } else {
                rewritten.into_iter().rev().collect()
            };
            return Some(fold_and(childnum, false, rewritten));
        }
        None
    }

    /// Extracts inverted crossing-segment tests into `segs`.
    pub fn extract_crossingsegments(&self, segs: &mut Vec<RuleSegment>) -> Option<Condition> {
        match self {
            Self::And {
                childnum,
                inv: true,
                children,
            } => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    let cond = if child.inv {
                        child
                            .cond
                            .extract_crossingsegments(segs)
                            .unwrap_or_else(|| child.cond.clone())
                    } else {
                        child.cond.clone()
                    };
                    out.push(CondChild {
                        cond,
                        inv: child.inv,
                    });
                }
                Some(fold_and(*childnum, true, out))
            }
            Self::And {
                childnum,
                inv: false,
                children,
            } if children.len() == 2 => {
                self.extract_within_airspace(*childnum, children, segs, true)
            }
            Self::Seq { childnum, children } => {
                let mut out = Vec::with_capacity(children.len());
                let mut first = true;
                for child in children {
                    if first {
                        let mut segs1 = Vec::new();
                        let cond = child.extract_crossingsegments(&mut segs1);
                        first = segs1.is_empty();
                        if first && !child.is_routestatic() {
                            return None;
                        }
                        segs.extend(segs1);
                        out.push(cond.unwrap_or_else(|| child.clone()));
                    } else {
                        if !child.is_routestatic() {
                            return None;
                        }
                        out.push(child.clone());
                    }
                }
                Some(fold_seq(*childnum, out))
            }
            Self::CrossingDct {
                childnum, alt, wpt, ..
            } => {
                wpt[0].obj()?;
                wpt[1].obj()?;
                segs.push(
                    RuleSegment::new(RuleSegmentType::Dct, *alt)
                        .with_wpt0(wpt[0].obj().cloned())
                        .with_wpt1(wpt[1].obj().cloned()),
                );
                Some(Condition::constant(*childnum, true))
            }
            Self::CrossingAirway {
                childnum,
                alt,
                wpt,
                airway,
                ..
            } => {
                wpt[0].obj()?;
                wpt[1].obj()?;
                airway.obj()?;
                segs.push(
                    RuleSegment::new(RuleSegmentType::Airway, *alt)
                        .with_wpt0(wpt[0].obj().cloned())
                        .with_wpt1(wpt[1].obj().cloned())
                        .with_airway(airway.obj().cloned()),
                );
                Some(Condition::constant(*childnum, true))
            }
            _ => None,
        }
    }

    /// Extracts airspace-crossing tests (under an OR) into `aspcs`.
    pub fn extract_crossingairspaces(&self, aspcs: &mut Vec<RuleSegment>) -> Option<Condition> {
        match self {
            Self::And {
                childnum,
                inv: true,
                children,
            } => {
                let mut out = Vec::with_capacity(children.len());
                for child in children {
                    let cond = if child.inv {
                        child
                            .cond
                            .extract_crossingairspaces(aspcs)
                            .unwrap_or_else(|| child.cond.clone())
                    } else {
                        child.cond.clone()
                    };
                    out.push(CondChild {
                        cond,
                        inv: child.inv,
                    });
                }
                Some(fold_and(*childnum, true, out))
            }
            Self::CrossingAirspace1 {
                childnum,
                alt,
                airspace,
                ..
            } => {
                airspace.obj()?;
                aspcs.push(
                    RuleSegment::new(RuleSegmentType::Airspace, *alt)
                        .with_wpt0(airspace.obj().cloned()),
                );
                Some(Condition::constant(*childnum, true))
            }
            _ => None,
        }
    }

    /// Extends `bbox` by the geographic extent within `[t0, t1)`.
    pub fn add_bbox(&self, bbox: &mut Rect, t0: Timestamp, t1: Timestamp) {
        let mut add_link = |link: &Link| {
            let Some(obj) = link.obj() else { return };
            for ts in obj.slices() {
                if !ts.is_overlap(t0, t1) {
                    continue;
                }
                if let Some(b) = ts.bbox() {
                    *bbox = bbox.union(&b);
                }
            }
        };
        match self {
            Self::And { children, .. } => {
                for child in children {
                    child.cond.add_bbox(bbox, t0, t1);
                }
            }
            Self::Seq { children, .. } => {
                for child in children {
                    child.add_bbox(bbox, t0, t1);
                }
            }
            Self::CrossingAirspace1 { airspace, .. } => add_link(airspace),
            Self::CrossingAirspace2 { airspace, .. } => {
                add_link(&airspace[0]);
                add_link(&airspace[1]);
            }
            Self::CrossingDct { wpt, .. } | Self::CrossingAirwayAvailable { wpt, .. } => {
                add_link(&wpt[0]);
                add_link(&wpt[1]);
            }
            Self::CrossingAirway { wpt, .. } => {
                add_link(&wpt[0]);
                add_link(&wpt[1]);
            }
            Self::CrossingPoint { wpt, .. } => add_link(wpt),
            Self::DepArr { airport, .. } => add_link(airport),
            Self::DepArrAirspace { airspace, .. } => add_link(airspace),
            Self::SidStar { proc, .. } => add_link(proc),
            _ => {}
        }
    }

    /// Short rendering for diagnostics.
    pub fn to_shortstr(&self, tm: Timestamp) -> String {
        let name = |l: &Link| {
            l.obj()
                .and_then(|o| o.ident_at(tm))
                .unwrap_or("??")
                .to_string()
        };
        match self {
            Self::And { inv, children, .. } => {
                let op = if *inv { " | " } else { " & " };
                let parts: Vec<String> = children
                    .iter()
                    .map(|c| {
                        let s = c.cond.to_shortstr(tm);
                        if c.inv {
                            format!("!{s}")
                        } else {
                            s
                        }
                    })
                    .collect();
                format!("({})", parts.join(op))
            }
            Self::Seq { children, .. } => {
                let parts: Vec<String> = children.iter().map(|c| c.to_shortstr(tm)).collect();
                format!("[{}]", parts.join(" -> "))
            }
            Self::Constant { value, .. } => (if *value { "true" } else { "false" }).to_string(),
            Self::CrossingAirspace1 { airspace, .. } => format!("XngAspc({})", name(airspace)),
            Self::CrossingAirspace2 { airspace, .. } => {
                format!("XngAspc2({},{})", name(&airspace[0]), name(&airspace[1]))
            }
            Self::CrossingDct { wpt, .. } => {
                format!("XngDct({},{})", name(&wpt[0]), name(&wpt[1]))
            }
            Self::CrossingAirway { wpt, airway, .. } => format!(
                "XngAwy({},{},{})",
                name(&wpt[0]),
                name(&wpt[1]),
                name(airway)
            ),
            Self::CrossingPoint { wpt, .. } => format!("XngPoint({})", name(wpt)),
            Self::DepArr { airport, arr, .. } => {
                format!("{}({})", if *arr { "Dest" } else { "Dep" }, name(airport))
            }
            Self::DepArrAirspace { airspace, arr, .. } => format!(
                "{}Aspc({})",
                if *arr { "Dest" } else { "Dep" },
                name(airspace)
            ),
            Self::SidStar { proc, star, .. } => {
                format!("{}({})", if *star { "Star" } else { "Sid" }, name(proc))
            }
            Self::CrossingAirspaceActive { airspace, .. } => {
                format!("AspcActive({})", name(airspace))
            }
            Self::CrossingAirwayAvailable { wpt, airway, .. } => format!(
                "AwyAvail({},{},{})",
                name(&wpt[0]),
                name(&wpt[1]),
                name(airway)
            ),
            Self::DctLimit { limit_nm, .. } => format!("DctLimit({limit_nm:.1})"),
            Self::Aircraft { .. } => "Aircraft".to_string(),
            Self::Flight { .. } => "Flight".to_string(),
        }
    }
}

fn narrow_static(seg: &mut RuleSegment, alt: &AltRange) -> RouteStatic {
    let mut ar = seg.alt;
    ar.intersect(alt);
    seg.alt = ar;
    if ar.is_empty() {
        RouteStatic::StaticFalse
    } else {
        RouteStatic::StaticTrue
    }
}

/// Constant folding of an AND/OR node.
///
/// In OR mode a child contributes its value when its invert flag is set
/// and the complement otherwise, mirroring the evaluation rule.
fn fold_and(childnum: u32, inv: bool, children: Vec<CondChild>) -> Condition {
    let mut out = Vec::with_capacity(children.len());
    for child in children {
        if let Some(v) = child.cond.const_value() {
            let eff = if inv {
                if child.inv {
                    v
                } else {
                    !v
                }
            } else if child.inv {
                !v
            } else {
                v
            };
            if inv {
                // OR: a true child decides, false children vanish
                if eff {
                    return Condition::constant(childnum, true);
                }
            } else {
                // AND: a false child decides, true children vanish
                if !eff {
                    return Condition::constant(childnum, false);
                }
            }
            continue;
        }
        out.push(child);
    }
    match out.len() {
        0 => Condition::constant(childnum, !inv),
        1 if !inv && !out[0].inv => out.into_iter().next().map(|c| c.cond).unwrap(),
        _ => Condition::And {
            childnum,
            inv,
            children: out,
        },
    }
}

/// Constant folding of a sequence node.
fn fold_seq(childnum: u32, children: Vec<Condition>) -> Condition {
    if children.iter().any(|c| c.const_value() == Some(false)) {
        return Condition::constant(childnum, false);
    }
    if children.iter().all(|c| c.const_value() == Some(true)) {
        return Condition::constant(childnum, true);
    }
    if children.len() == 1 {
        return children.into_iter().next().unwrap();
    }
    Condition::Seq { childnum, children }
}

/////////////////////////////////////////////////////////////////////////
// Leaf evaluation against the waypoint sequence
/////////////////////////////////////////////////////////////////////////

fn airspace_slice_at(
    link: &Link,
    t: Timestamp,
) -> Option<&crate::model::AirspaceSlice> {
    link.obj()?
        .slice_at(t)
        .and_then(|ts| ts.payload().as_airspace())
}

fn evaluate_crossing_airspace1(
    ev: &RestrictionEval,
    alt: &AltRange,
    airspace: &Link,
    refloc: bool,
) -> CondResult {
    // the first leg is excluded so a procedure departure does not trip
    // enroute airspace rules; kept from the reference data even though it
    // can miss a crossing on very short plans
    let mut r = CondResult::new(false);
    let wpts = ev.waypoints();
    if airspace.obj().is_none() {
        return CondResult::indeterminate();
    }
    let n = wpts.len();
    let mut wptnr = 2usize;
    while wptnr + 1 < n {
        let wpt0 = &wpts[wptnr - 1];
        let wpt1 = &wpts[wptnr];
        wptnr += 1;
        if !wpt0.is_ifr() {
            continue;
        }
        let Some(slice) = airspace_slice_at(airspace, wpt0.time()) else {
            continue;
        };
        let cur = wptnr - 1;
        {
            let tte = TimeTableEval::new(wpt0.time(), wpt0.coord());
            if slice.is_inside(&tte, wpt0.altitude(), alt) {
                r.set_result(Some(true));
                r.vertexset_mut().insert(cur - 1);
                if cur >= 2 {
                    r.xngedgeset_mut().insert(cur - 2);
                }
                r.xngedgeset_mut().insert(cur - 1);
                if refloc {
                    r.set_refloc(cur - 1);
                }
                continue;
            }
        }
        {
            let tte = TimeTableEval::new(wpt1.time(), wpt1.coord());
            if slice.is_inside(&tte, wpt1.altitude(), alt) {
                r.set_result(Some(true));
                r.vertexset_mut().insert(cur);
                r.xngedgeset_mut().insert(cur - 1);
                if cur + 2 < n {
                    r.xngedgeset_mut().insert(cur);
                }
                if refloc {
                    r.set_refloc(cur);
                }
                continue;
            }
        }
        {
            let tte = TimeTableEval::new(wpt0.time(), wpt0.coord());
            let midalt = wpt0.altitude() + (wpt1.altitude() - wpt0.altitude()) / 2;
            if slice.is_intersect(&tte, wpt1.coord(), midalt, alt) {
                r.set_result(Some(true));
                r.edgeset_mut().insert(cur - 1);
                r.xngedgeset_mut().insert(cur - 1);
                if refloc {
                    r.set_refloc(cur);
                }
            }
        }
    }
    r
}

fn evaluate_crossing_airspace2(
    ev: &RestrictionEval,
    alt: &AltRange,
    airspace: &[Link; 2],
    refloc: bool,
) -> CondResult {
    let mut r = CondResult::new(false);
    if airspace[0].obj().is_none() || airspace[1].obj().is_none() {
        return CondResult::indeterminate();
    }
    let wpts = ev.waypoints();
    for nr in 1..wpts.len() {
        let wpt0 = &wpts[nr - 1];
        let wpt1 = &wpts[nr];
        if !wpt0.is_ifr() {
            continue;
        }
        let Some(s0) = airspace_slice_at(&airspace[0], wpt0.time()) else {
            continue;
        };
        let Some(s1) = airspace_slice_at(&airspace[1], wpt1.time()) else {
            continue;
        };
        let tte0 = TimeTableEval::new(wpt0.time(), wpt0.coord());
        let tte1 = TimeTableEval::new(wpt1.time(), wpt1.coord());
        if s0.is_inside(&tte0, wpt0.altitude(), alt) && s1.is_inside(&tte1, wpt1.altitude(), alt) {
            r.set_result(Some(true));
            r.edgeset_mut().insert(nr - 1);
            r.xngedgeset_mut().insert(nr - 1);
            if refloc {
                r.set_refloc(nr - 1);
            }
        }
    }
    r
}

fn evaluate_crossing_dct(
    ev: &RestrictionEval,
    alt: &AltRange,
    wpt: &[Link; 2],
    refloc: bool,
) -> CondResult {
    let mut r = CondResult::new(false);
    let wpts = ev.waypoints();
    for nr in 1..wpts.len() {
        let wpt0 = &wpts[nr - 1];
        let wpt1 = &wpts[nr];
        if !wpt0.is_ifr() || !alt.is_inside(wpt0.altitude()) {
            continue;
        }
        if wpt0.pathcode() != PathCode::DirectTo && !wpt0.is_stay() {
            continue;
        }
        if wpt0.point_uuid() != Some(*wpt[0].uuid()) || wpt1.point_uuid() != Some(*wpt[1].uuid()) {
            continue;
        }
        r.set_result(Some(true));
        r.edgeset_mut().insert(nr - 1);
        r.xngedgeset_mut().insert(nr - 1);
        if refloc {
            r.set_refloc(nr - 1);
        }
    }
    r
}

fn evaluate_crossing_airway(
    ev: &RestrictionEval,
    alt: &AltRange,
    wpt: &[Link; 2],
    airway: &Link,
    refloc: bool,
) -> CondResult {
    let mut r = CondResult::new(false);
    let wpts = ev.waypoints();
    for nr in 1..wpts.len() {
        let wpt0 = &wpts[nr - 1];
        if !wpt0.is_ifr() || !alt.is_inside(wpt0.altitude()) {
            continue;
        }
        if wpt0.point_uuid() != Some(*wpt[0].uuid()) {
            continue;
        }
        // thread along the airway until the exit point
        let mut r1 = CondResult::new(true);
        let mut matched = false;
        for nre in nr..wpts.len() {
            let w = &wpts[nre - 1];
            let we = &wpts[nre];
            if !w.is_ifr() || !w.is_path_match(airway.uuid()) {
                r1.set_result(Some(false));
                break;
            }
            r1.edgeset_mut().insert(nre - 1);
            r1.xngedgeset_mut().insert(nre - 1);
            if refloc {
                r1.set_refloc(nre - 1);
            }
            if we.point_uuid() == Some(*wpt[1].uuid()) {
                matched = true;
                break;
            }
        }
        if r1.is_true() && matched {
            r.set_result(Some(true));
            r.edgeset_mut().extend(r1.edgeset().iter().copied());
            r.xngedgeset_mut().extend(r1.xngedgeset().iter().copied());
            if let Some(rl) = r1.refloc() {
                r.set_refloc(rl);
            }
        }
    }
    r
}

fn evaluate_crossing_point(
    ev: &RestrictionEval,
    alt: &AltRange,
    wpt: &Link,
    refloc: bool,
) -> CondResult {
    let mut r = CondResult::new(false);
    let wpts = ev.waypoints();
    for (nr, w) in wpts.iter().enumerate() {
        if !w.is_ifr() && (nr == 0 || !wpts[nr - 1].is_ifr()) {
            continue;
        }
        if !alt.is_inside(w.altitude()) || w.point_uuid() != Some(*wpt.uuid()) {
            continue;
        }
        if refloc && !w.is_ifr() {
            continue;
        }
        r.set_result(Some(true));
        r.vertexset_mut().insert(nr);
        if nr > 0 {
            r.xngedgeset_mut().insert(nr - 1);
        }
        r.xngedgeset_mut().insert(nr);
        if refloc {
            r.set_refloc(nr);
        }
    }
    r
}

fn evaluate_deparr(ev: &RestrictionEval, airport: &Link, arr: bool, refloc: bool) -> CondResult {
    let wpts = ev.waypoints();
    if wpts.is_empty() {
        return CondResult::new(false);
    }
    let idx = if arr { wpts.len() - 1 } else { 0 };
    let wpt = &wpts[idx];
    if refloc && !wpt.is_ifr() {
        return CondResult::new(false);
    }
    if wpt.point_uuid() == Some(*airport.uuid()) {
        let mut r = CondResult::new(true);
        r.vertexset_mut().insert(idx);
        if refloc {
            r.set_refloc(idx);
        }
        return r;
    }
    CondResult::new(false)
}

fn evaluate_deparr_airspace(
    ev: &RestrictionEval,
    airspace: &Link,
    arr: bool,
    refloc: bool,
) -> CondResult {
    let wpts = ev.waypoints();
    if wpts.is_empty() {
        return CondResult::new(false);
    }
    let idx = if arr { wpts.len() - 1 } else { 0 };
    let wpt = &wpts[idx];
    if refloc && !wpt.is_ifr() {
        return CondResult::new(false);
    }
    let Some(slice) = airspace_slice_at(airspace, wpt.time()) else {
        return CondResult::indeterminate();
    };
    let tte = TimeTableEval::new(wpt.time(), wpt.coord());
    if slice.is_inside(&tte, crate::model::ALT_IGNORE, &AltRange::default()) {
        let mut r = CondResult::new(true);
        r.vertexset_mut().insert(idx);
        if refloc {
            r.set_refloc(idx);
        }
        return r;
    }
    CondResult::new(false)
}

fn evaluate_sidstar(ev: &RestrictionEval, proc: &Link, star: bool, refloc: bool) -> CondResult {
    let wpts = ev.waypoints();
    if wpts.len() < 2 {
        return CondResult::new(false);
    }
    let (idx, mut idxe) = if star {
        (wpts.len() - 1, wpts.len() - 2)
    } else {
        (0usize, 0usize)
    };
    let wpt = &wpts[idx];
    if !wpt.is_ifr() || !wpts[idxe].is_path_match(proc.uuid()) {
        return CondResult::new(false);
    }
    let mut r = CondResult::new(true);
    if star {
        r.vertexset_mut().insert(idx);
        r.vertexset_mut().insert(idxe);
        r.edgeset_mut().insert(idxe);
        r.xngedgeset_mut().insert(idxe);
        if refloc {
            r.set_refloc(idxe);
        }
        while idxe > 0 {
            idxe -= 1;
            if !wpts[idxe].is_path_match(proc.uuid()) {
                break;
            }
            r.vertexset_mut().insert(idxe);
            r.edgeset_mut().insert(idxe);
            r.xngedgeset_mut().insert(idxe);
            if refloc {
                r.set_refloc(idxe);
            }
        }
    } else {
        r.vertexset_mut().insert(idxe);
        r.vertexset_mut().insert(idxe + 1);
        r.edgeset_mut().insert(idxe);
        r.xngedgeset_mut().insert(idxe);
        if refloc {
            r.set_refloc(idxe);
        }
        loop {
            idxe += 1;
            if idxe + 1 >= wpts.len() || !wpts[idxe].is_path_match(proc.uuid()) {
                break;
            }
            r.vertexset_mut().insert(idxe + 1);
            r.edgeset_mut().insert(idxe);
            r.xngedgeset_mut().insert(idxe);
        }
    }
    r
}

fn evaluate_airway_available(
    ev: &RestrictionEval,
    alt: &AltRange,
    wpt: &[Link; 2],
    airway: &Link,
) -> CondResult {
    let Some(graph) = ev.graph() else {
        return CondResult::new(false);
    };
    let t = ev.departure_time();
    let Some(band) =
        graph.airway_band(wpt[0].uuid(), wpt[1].uuid(), airway.uuid(), t, ev.condavail())
    else {
        return CondResult::new(false);
    };
    let requested = alt.interval(false);
    let mut got = band.clone();
    got &= &requested;
    CondResult::new(got == requested)
}

fn evaluate_dct_airspace2(
    dct: &DctCalc<'_>,
    alt: &AltRange,
    airspace: &[Link; 2],
) -> BidirAltRange {
    let mut r = BidirAltRange::empty();
    if dct.is_airport() {
        return r;
    }
    let (Some(a0), Some(a1)) = (airspace[0].obj(), airspace[1].obj()) else {
        return r;
    };
    let s0 = a0
        .slice_at(dct.time())
        .and_then(|ts| ts.payload().as_airspace());
    let s1 = a1
        .slice_at(dct.time())
        .and_then(|ts| ts.payload().as_airspace());
    let (Some(s0), Some(s1)) = (s0, s1) else {
        return r;
    };
    for i in 0..2 {
        let inside0 = s0.point_altitudes(&dct.tte(i), alt);
        let inside1 = s1.point_altitudes(&dct.tte(1 - i), alt);
        if inside0.is_empty() && inside1.is_empty() {
            continue;
        }
        let intersect0 = s0.point_intersect_altitudes(&dct.tte(1 - i), dct.coord(i), alt);
        let intersect1 = s1.point_intersect_altitudes(&dct.tte(i), dct.coord(1 - i), alt);
        let mut both = inside0.clone();
        both &= &inside1;
        let mut enter1 = inside0;
        enter1 &= &intersect1;
        let mut enter0 = intersect0;
        enter0 &= &inside1;
        both |= &enter1;
        both |= &enter0;
        *r.dir_mut(i) = both;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_and_drops_true_children() {
        let cond = fold_and(
            0,
            false,
            vec![
                CondChild {
                    cond: Condition::constant(1, true),
                    inv: false,
                },
                CondChild {
                    cond: Condition::DctLimit {
                        childnum: 2,
                        limit_nm: 50.0,
                    },
                    inv: false,
                },
            ],
        );
        assert!(matches!(cond, Condition::DctLimit { .. }));
    }

    #[test]
    fn fold_and_false_dominates() {
        let cond = fold_and(
            0,
            false,
            vec![
                CondChild {
                    cond: Condition::constant(1, false),
                    inv: false,
                },
                CondChild {
                    cond: Condition::DctLimit {
                        childnum: 2,
                        limit_nm: 50.0,
                    },
                    inv: false,
                },
            ],
        );
        assert_eq!(cond.const_value(), Some(false));
    }

    #[test]
    fn fold_or_true_dominates() {
        // in OR mode a child contributes its value when marked inverted
        let cond = fold_and(
            0,
            true,
            vec![
                CondChild {
                    cond: Condition::constant(1, true),
                    inv: true,
                },
                CondChild {
                    cond: Condition::DctLimit {
                        childnum: 2,
                        limit_nm: 50.0,
                    },
                    inv: false,
                },
            ],
        );
        assert_eq!(cond.const_value(), Some(true));
        // a contributing false vanishes, leaving the other child
        let cond = fold_and(
            0,
            true,
            vec![
                CondChild {
                    cond: Condition::constant(1, false),
                    inv: true,
                },
                CondChild {
                    cond: Condition::DctLimit {
                        childnum: 2,
                        limit_nm: 50.0,
                    },
                    inv: true,
                },
            ],
        );
        assert!(matches!(cond, Condition::And { inv: true, .. }));
    }

    #[test]
    fn empty_and_is_true_empty_or_is_false() {
        assert_eq!(fold_and(0, false, Vec::new()).const_value(), Some(true));
        assert_eq!(fold_and(0, true, Vec::new()).const_value(), Some(false));
    }

    #[test]
    fn condition_io_round_trip() {
        let cond = Condition::And {
            childnum: 0,
            inv: true,
            children: vec![
                CondChild {
                    cond: Condition::CrossingPoint {
                        childnum: 1,
                        alt: AltRange::std(6000, 24500),
                        wpt: Link::new(
                            "b5a42733-da94-4b7f-8282-e013a2fe6466".parse().unwrap(),
                        ),
                        refloc: true,
                    },
                    inv: true,
                },
                CondChild {
                    cond: Condition::Flight {
                        childnum: 2,
                        civmil: CivMil::Civ,
                        purpose: FlightPurpose::Scheduled,
                    },
                    inv: false,
                },
            ],
        };
        let mut wr = crate::archive::ArchiveWriter::new();
        let mut slot = Some(cond.clone());
        Condition::io_opt(&mut slot, &mut wr).unwrap();
        let blob = wr.into_vec();
        let mut rd = crate::archive::ArchiveReader::new(&blob);
        let mut back = None;
        Condition::io_opt(&mut back, &mut rd).unwrap();
        assert_eq!(back, Some(cond));
    }

    #[test]
    fn absent_condition_is_one_invalid_byte() {
        let mut wr = crate::archive::ArchiveWriter::new();
        let mut slot: Option<Condition> = None;
        Condition::io_opt(&mut slot, &mut wr).unwrap();
        assert_eq!(wr.into_vec(), vec![COND_INVALID]);
    }

    #[test]
    fn extract_crossingpoints_rewrites_to_constant() {
        // Not (CrossingPoint(X) Or CrossingPoint(Y)) written as an OR node
        // with inverted children; extraction must surface both points
        let mut x = Link::new("11111111-1111-1111-1111-111111111111".parse().unwrap());
        let mut y = Link::new("22222222-2222-2222-2222-222222222222".parse().unwrap());
        let xo = std::sync::Arc::new(crate::model::Object::new(
            *x.uuid(),
            crate::model::ObjectKind::DesignatedPoint,
        ));
        let yo = std::sync::Arc::new(crate::model::Object::new(
            *y.uuid(),
            crate::model::ObjectKind::DesignatedPoint,
        ));
        x.set_obj(Some(xo));
        y.set_obj(Some(yo));
        let cond = Condition::And {
            childnum: 0,
            inv: true,
            children: vec![
                CondChild {
                    cond: Condition::CrossingPoint {
                        childnum: 1,
                        alt: AltRange::default(),
                        wpt: x,
                        refloc: false,
                    },
                    inv: true,
                },
                CondChild {
                    cond: Condition::CrossingPoint {
                        childnum: 2,
                        alt: AltRange::default(),
                        wpt: y,
                        refloc: false,
                    },
                    inv: true,
                },
            ],
        };
        let mut pts = Vec::new();
        let rewritten = cond.extract_crossingpoints(&mut pts).unwrap();
        assert_eq!(pts.len(), 2);
        assert!(rewritten.is_routestatic());
        // both children reduced to constants, so the whole node folds
        assert!(rewritten.const_value().is_some());
    }
}
