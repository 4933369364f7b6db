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

//! The ATS object model.
//!
//! Every entity is an [`Object`]: a UUID, a modification stamp and an
//! ordered sequence of [`TimeSlice`]s carrying the entity's state over
//! disjoint validity intervals. The slice payload is a tagged enumeration
//! with one variant per entity kind; the discriminant byte leads the
//! archived blob and, for airports, mixes the capability flags into its
//! low nibble.

use std::collections::BTreeSet;
use std::fmt;

mod airport;
mod airspace;
mod point;
mod route;
mod sidstar;

pub use airport::{AirportCollocationSlice, AirportFlags, AirportSlice};
pub use airspace::AirspaceSlice;
pub use point::{
    AngleIndicationSlice, DesignatedPointSlice, DesignatedPointType, DistanceIndicationSlice,
    NavaidSlice, NavaidType,
};
pub use route::{
    AvailabilityStatus, LevelSeries, RouteSegmentSlice, RouteSlice, SegmentAvailability,
    SegmentCore, SegmentLevel, StandardLevelColumnSlice, StandardLevelTableSlice,
};
pub use sidstar::{
    ArrivalLegSlice, DepartureLegSlice, ProcedureSlice, ProcedureStatus, SidSlice, StarSlice,
};

use crate::archive::{Archive, ArchiveReader, ArchiveWriter, DepScanner, Hibernate};
use crate::error::{Error, Result};
use crate::geom::Rect;
use crate::id::{LinkSet, Uuid};
use crate::restriction::FlightRestrictionSlice;
use crate::timetable::{self, Timestamp};

/// Sentinel for a missing elevation.
pub const INVALID_ELEV: i32 = i32::MIN;

/// Altitude argument meaning "do not check the altitude".
pub const ALT_IGNORE: i32 = i32::MIN + 1;

/// Entity kind, without the airport flag nibble.
///
/// The byte values are the archive and SQL `type` column contract. The
/// byte ranges partition the kinds by geometry: non-geographic objects,
/// points, lines and areas.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ObjectKind {
    AirportCollocation,
    AngleIndication,
    DistanceIndication,
    Sid,
    Star,
    Route,
    StandardLevelColumn,
    StandardLevelTable,
    FlightRestriction,
    Airport,
    Navaid,
    DesignatedPoint,
    DepartureLeg,
    ArrivalLeg,
    RouteSegment,
    Airspace,
}

/// First type byte of the whole range.
pub const TYPE_FIRST: u8 = 0x00;
/// Last type byte of the whole range.
pub const TYPE_LAST: u8 = 0xff;
/// First type byte of the point kinds.
pub const TYPE_POINT_START: u8 = 0x40;
/// Last type byte of the point kinds.
pub const TYPE_POINT_END: u8 = 0x7f;
/// Last type byte of the line kinds.
pub const TYPE_LINE_END: u8 = 0xbf;

impl ObjectKind {
    /// Base discriminant byte; airports carry their flags on top of this.
    pub fn base_byte(&self) -> u8 {
        match self {
            Self::AirportCollocation => 0x00,
            Self::AngleIndication => 0x05,
            Self::DistanceIndication => 0x06,
            Self::Sid => 0x07,
            Self::Star => 0x08,
            Self::Route => 0x09,
            Self::StandardLevelColumn => 0x0a,
            Self::StandardLevelTable => 0x0b,
            Self::FlightRestriction => 0x0c,
            Self::Airport => 0x40,
            Self::Navaid => 0x50,
            Self::DesignatedPoint => 0x51,
            Self::DepartureLeg => 0x80,
            Self::ArrivalLeg => 0x81,
            Self::RouteSegment => 0x82,
            Self::Airspace => 0xc0,
        }
    }

    pub fn from_byte(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::AirportCollocation,
            0x05 => Self::AngleIndication,
            0x06 => Self::DistanceIndication,
            0x07 => Self::Sid,
            0x08 => Self::Star,
            0x09 => Self::Route,
            0x0a => Self::StandardLevelColumn,
            0x0b => Self::StandardLevelTable,
            0x0c => Self::FlightRestriction,
            0x40..=0x4f => Self::Airport,
            0x50 => Self::Navaid,
            0x51 => Self::DesignatedPoint,
            0x80 => Self::DepartureLeg,
            0x81 => Self::ArrivalLeg,
            0x82 => Self::RouteSegment,
            0xc0 => Self::Airspace,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::AirportCollocation => "airportcollocation",
            Self::AngleIndication => "angleindication",
            Self::DistanceIndication => "distanceindication",
            Self::Sid => "sid",
            Self::Star => "star",
            Self::Route => "route",
            Self::StandardLevelColumn => "standardlevelcolumn",
            Self::StandardLevelTable => "standardleveltable",
            Self::FlightRestriction => "flightrestriction",
            Self::Airport => "airport",
            Self::Navaid => "navaid",
            Self::DesignatedPoint => "designatedpoint",
            Self::DepartureLeg => "departureleg",
            Self::ArrivalLeg => "arrivalleg",
            Self::RouteSegment => "routesegment",
            Self::Airspace => "airspace",
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Airport | Self::Navaid | Self::DesignatedPoint)
    }

    fn default_payload(&self) -> SlicePayload {
        match self {
            Self::AirportCollocation => {
                SlicePayload::AirportCollocation(AirportCollocationSlice::default())
            }
            Self::AngleIndication => SlicePayload::AngleIndication(AngleIndicationSlice::default()),
            Self::DistanceIndication => {
                SlicePayload::DistanceIndication(DistanceIndicationSlice::default())
            }
            Self::Sid => SlicePayload::Sid(SidSlice::default()),
            Self::Star => SlicePayload::Star(StarSlice::default()),
            Self::Route => SlicePayload::Route(RouteSlice::default()),
            Self::StandardLevelColumn => {
                SlicePayload::StandardLevelColumn(StandardLevelColumnSlice::default())
            }
            Self::StandardLevelTable => {
                SlicePayload::StandardLevelTable(StandardLevelTableSlice::default())
            }
            Self::FlightRestriction => {
                SlicePayload::FlightRestriction(Box::default())
            }
            Self::Airport => SlicePayload::Airport(AirportSlice::default()),
            Self::Navaid => SlicePayload::Navaid(NavaidSlice::default()),
            Self::DesignatedPoint => {
                SlicePayload::DesignatedPoint(DesignatedPointSlice::default())
            }
            Self::DepartureLeg => SlicePayload::DepartureLeg(DepartureLegSlice::default()),
            Self::ArrivalLeg => SlicePayload::ArrivalLeg(ArrivalLegSlice::default()),
            Self::RouteSegment => SlicePayload::RouteSegment(RouteSegmentSlice::default()),
            Self::Airspace => SlicePayload::Airspace(AirspaceSlice::default()),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The variant state carried by a time slice.
#[derive(Clone, PartialEq, Debug)]
pub enum SlicePayload {
    AirportCollocation(AirportCollocationSlice),
    AngleIndication(AngleIndicationSlice),
    DistanceIndication(DistanceIndicationSlice),
    Sid(SidSlice),
    Star(StarSlice),
    Route(RouteSlice),
    StandardLevelColumn(StandardLevelColumnSlice),
    StandardLevelTable(StandardLevelTableSlice),
    FlightRestriction(Box<FlightRestrictionSlice>),
    Airport(AirportSlice),
    Navaid(NavaidSlice),
    DesignatedPoint(DesignatedPointSlice),
    DepartureLeg(DepartureLegSlice),
    ArrivalLeg(ArrivalLegSlice),
    RouteSegment(RouteSegmentSlice),
    Airspace(AirspaceSlice),
}

impl SlicePayload {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::AirportCollocation(_) => ObjectKind::AirportCollocation,
            Self::AngleIndication(_) => ObjectKind::AngleIndication,
            Self::DistanceIndication(_) => ObjectKind::DistanceIndication,
            Self::Sid(_) => ObjectKind::Sid,
            Self::Star(_) => ObjectKind::Star,
            Self::Route(_) => ObjectKind::Route,
            Self::StandardLevelColumn(_) => ObjectKind::StandardLevelColumn,
            Self::StandardLevelTable(_) => ObjectKind::StandardLevelTable,
            Self::FlightRestriction(_) => ObjectKind::FlightRestriction,
            Self::Airport(_) => ObjectKind::Airport,
            Self::Navaid(_) => ObjectKind::Navaid,
            Self::DesignatedPoint(_) => ObjectKind::DesignatedPoint,
            Self::DepartureLeg(_) => ObjectKind::DepartureLeg,
            Self::ArrivalLeg(_) => ObjectKind::ArrivalLeg,
            Self::RouteSegment(_) => ObjectKind::RouteSegment,
            Self::Airspace(_) => ObjectKind::Airspace,
        }
    }

    pub fn ident(&self) -> Option<&str> {
        match self {
            Self::Airport(s) => Some(&s.ident),
            Self::Navaid(s) => Some(&s.ident),
            Self::DesignatedPoint(s) => Some(&s.ident),
            Self::Route(s) => Some(&s.ident),
            Self::Sid(s) => Some(&s.proc.ident),
            Self::Star(s) => Some(&s.proc.ident),
            Self::StandardLevelTable(s) => Some(&s.ident),
            Self::Airspace(s) => Some(&s.ident),
            Self::FlightRestriction(s) => Some(&s.ident),
            _ => None,
        }
    }

    pub fn coord(&self) -> Option<crate::geom::Coord> {
        match self {
            Self::Airport(s) => Some(s.coord),
            Self::Navaid(s) => Some(s.coord),
            Self::DesignatedPoint(s) => Some(s.coord),
            _ => None,
        }
    }

    pub fn elev(&self) -> Option<i32> {
        match self {
            Self::Airport(s) if s.is_elev_valid() => Some(s.elev),
            Self::Navaid(s) if s.elev != INVALID_ELEV => Some(s.elev),
            _ => None,
        }
    }

    pub fn as_airport(&self) -> Option<&AirportSlice> {
        match self {
            Self::Airport(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_navaid(&self) -> Option<&NavaidSlice> {
        match self {
            Self::Navaid(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_designated_point(&self) -> Option<&DesignatedPointSlice> {
        match self {
            Self::DesignatedPoint(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_route(&self) -> Option<&RouteSlice> {
        match self {
            Self::Route(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_route_segment(&self) -> Option<&RouteSegmentSlice> {
        match self {
            Self::RouteSegment(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_airspace(&self) -> Option<&AirspaceSlice> {
        match self {
            Self::Airspace(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sid(&self) -> Option<&SidSlice> {
        match self {
            Self::Sid(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_star(&self) -> Option<&StarSlice> {
        match self {
            Self::Star(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flight_restriction(&self) -> Option<&FlightRestrictionSlice> {
        match self {
            Self::FlightRestriction(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flight_restriction_mut(&mut self) -> Option<&mut FlightRestrictionSlice> {
        match self {
            Self::FlightRestriction(s) => Some(s),
            _ => None,
        }
    }

    /// Segment view shared by airway segments and procedure legs.
    pub fn segment_core(&self) -> Option<&SegmentCore> {
        match self {
            Self::RouteSegment(s) => Some(&s.core),
            Self::DepartureLeg(s) => Some(&s.core),
            Self::ArrivalLeg(s) => Some(&s.core),
            _ => None,
        }
    }
}

impl Hibernate for SlicePayload {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        match self {
            Self::AirportCollocation(s) => s.hibernate(ar),
            Self::AngleIndication(s) => s.hibernate(ar),
            Self::DistanceIndication(s) => s.hibernate(ar),
            Self::Sid(s) => s.hibernate(ar),
            Self::Star(s) => s.hibernate(ar),
            Self::Route(s) => s.hibernate(ar),
            Self::StandardLevelColumn(s) => s.hibernate(ar),
            Self::StandardLevelTable(s) => s.hibernate(ar),
            Self::FlightRestriction(s) => s.hibernate(ar),
            Self::Airport(s) => s.hibernate(ar),
            Self::Navaid(s) => s.hibernate(ar),
            Self::DesignatedPoint(s) => s.hibernate(ar),
            Self::DepartureLeg(s) => s.hibernate(ar),
            Self::ArrivalLeg(s) => s.hibernate(ar),
            Self::RouteSegment(s) => s.hibernate(ar),
            Self::Airspace(s) => s.hibernate(ar),
        }
    }
}

/// One validity interval of an object's state.
#[derive(Clone, PartialEq, Debug)]
pub struct TimeSlice {
    start: Timestamp,
    end: Timestamp,
    payload: SlicePayload,
}

impl TimeSlice {
    pub fn new(start: Timestamp, end: Timestamp, payload: SlicePayload) -> Self {
        Self {
            start,
            end,
            payload,
        }
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }

    pub fn payload(&self) -> &SlicePayload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut SlicePayload {
        &mut self.payload
    }

    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    pub fn is_inside(&self, t: Timestamp) -> bool {
        self.start <= t && t < self.end
    }

    pub fn is_overlap(&self, t0: Timestamp, t1: Timestamp) -> bool {
        timetable::is_overlap(self.start, self.end, t0, t1)
    }

    /// Length of the overlap with `[t0, t1)`.
    pub fn overlap(&self, t0: Timestamp, t1: Timestamp) -> u64 {
        if !self.is_overlap(t0, t1) {
            return 0;
        }
        self.end.min(t1) - self.start.max(t0)
    }

    /// Bounding box of the slice, where the kind has one.
    pub fn bbox(&self) -> Option<Rect> {
        match &self.payload {
            SlicePayload::Airport(_)
            | SlicePayload::Navaid(_)
            | SlicePayload::DesignatedPoint(_) => {
                let coord = self.payload.coord()?;
                if coord.is_invalid() {
                    None
                } else {
                    Some(Rect::from_point(coord))
                }
            }
            SlicePayload::RouteSegment(_)
            | SlicePayload::DepartureLeg(_)
            | SlicePayload::ArrivalLeg(_) => {
                let bbox = self.payload.segment_core()?.bbox(self.start);
                if bbox.is_invalid() {
                    None
                } else {
                    Some(bbox)
                }
            }
            SlicePayload::Airspace(s) => {
                let bbox = s.bbox();
                if bbox.is_invalid() {
                    None
                } else {
                    Some(bbox)
                }
            }
            SlicePayload::FlightRestriction(s) => {
                if s.bbox.is_invalid() {
                    None
                } else {
                    Some(s.bbox)
                }
            }
            _ => None,
        }
    }

    /// Time discontinuities contributed by embedded time tables.
    pub fn discontinuities(&self, out: &mut BTreeSet<Timestamp>) {
        out.insert(self.start);
        out.insert(self.end);
        match &self.payload {
            SlicePayload::FlightRestriction(s) => {
                out.extend(s.timetable.discontinuities());
            }
            SlicePayload::RouteSegment(s) => {
                for a in &s.availability {
                    out.extend(a.timetable.discontinuities());
                }
            }
            SlicePayload::Sid(s) => {
                out.extend(s.proc.timetable.discontinuities());
            }
            SlicePayload::Star(s) => {
                out.extend(s.proc.timetable.discontinuities());
            }
            SlicePayload::Airspace(s) => {
                out.extend(s.timetable.discontinuities());
            }
            _ => {}
        }
    }
}

impl Hibernate for TimeSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_u64(&mut self.start)?;
        ar.io_u64(&mut self.end)?;
        self.payload.hibernate(ar)
    }
}

/// A persisted entity: identity, modification stamp and its time slices.
#[derive(Clone, PartialEq, Debug)]
pub struct Object {
    uuid: Uuid,
    kind: ObjectKind,
    modified: Timestamp,
    slices: Vec<TimeSlice>,
}

impl Object {
    pub fn new(uuid: Uuid, kind: ObjectKind) -> Self {
        Self {
            uuid,
            kind,
            modified: 0,
            slices: Vec::new(),
        }
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn modified(&self) -> Timestamp {
        self.modified
    }

    pub fn set_modified(&mut self, t: Timestamp) {
        self.modified = t;
    }

    pub fn slices(&self) -> &[TimeSlice] {
        &self.slices
    }

    pub fn slices_mut(&mut self) -> &mut [TimeSlice] {
        &mut self.slices
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Appends a slice, keeping the sequence ordered by start time.
    ///
    /// The payload kind must match the object kind.
    pub fn add_slice(&mut self, slice: TimeSlice) -> Result<()> {
        if slice.payload().kind() != self.kind {
            return Err(Error::SliceKindMismatch { uuid: self.uuid });
        }
        let at = self
            .slices
            .partition_point(|ts| ts.start() <= slice.start());
        self.slices.insert(at, slice);
        Ok(())
    }

    /// The slice containing instant `t`.
    pub fn slice_at(&self, t: Timestamp) -> Option<&TimeSlice> {
        self.slices.iter().find(|ts| ts.is_valid() && ts.is_inside(t))
    }

    /// The slice with the largest overlap with `[t0, t1)`.
    pub fn best_slice(&self, t0: Timestamp, t1: Timestamp) -> Option<&TimeSlice> {
        self.slices
            .iter()
            .filter(|ts| ts.is_valid())
            .max_by_key(|ts| ts.overlap(t0, t1))
            .filter(|ts| ts.overlap(t0, t1) > 0)
    }

    /// Ident valid at `t`, falling back to the first slice carrying one.
    pub fn ident_at(&self, t: Timestamp) -> Option<&str> {
        self.slice_at(t)
            .and_then(|ts| ts.payload().ident())
            .or_else(|| self.slices.iter().find_map(|ts| ts.payload().ident()))
    }

    pub fn coord_at(&self, t: Timestamp) -> Option<crate::geom::Coord> {
        self.slice_at(t).and_then(|ts| ts.payload().coord())
    }

    /// `[min start, max end)` over all valid slices.
    pub fn timebounds(&self) -> (Timestamp, Timestamp) {
        let mut min = Timestamp::MAX;
        let mut max = Timestamp::MIN;
        for ts in &self.slices {
            if !ts.is_valid() {
                continue;
            }
            min = min.min(ts.start());
            max = max.max(ts.end());
        }
        if min > max {
            (0, 0)
        } else {
            (min, max)
        }
    }

    pub fn has_overlap(&self, t0: Timestamp, t1: Timestamp) -> bool {
        self.slices.iter().any(|ts| ts.is_overlap(t0, t1))
    }

    /// Union of the slice bounding boxes.
    pub fn bbox(&self) -> Rect {
        let mut bbox = Rect::INVALID;
        for ts in &self.slices {
            if let Some(b) = ts.bbox() {
                bbox = bbox.union(&b);
            }
        }
        bbox
    }

    /// Slice boundaries plus embedded time table switch points.
    pub fn discontinuities(&self) -> BTreeSet<Timestamp> {
        let mut out = BTreeSet::new();
        for ts in &self.slices {
            if ts.is_valid() {
                ts.discontinuities(&mut out);
            }
        }
        out
    }

    /// Type byte: the kind discriminant, with airport flags mixed into the
    /// low nibble.
    pub fn type_byte(&self) -> u8 {
        let base = self.kind.base_byte();
        if self.kind != ObjectKind::Airport {
            return base;
        }
        let mut flags = AirportFlags::default();
        for ts in &self.slices {
            if let SlicePayload::Airport(s) = ts.payload() {
                flags |= s.flags;
            }
        }
        base | flags.bits()
    }

    /// UUIDs this object references.
    pub fn dependencies(&self) -> LinkSet {
        let mut scan = DepScanner::new();
        let mut obj = self.clone();
        // scanning never fails
        let _ = obj.hibernate_slices(&mut scan);
        scan.into_deps()
    }

    /// True iff some link of this object has no resolved handle.
    pub fn is_unlinked(&self) -> bool {
        self.dependencies().has_unresolved()
    }

    fn hibernate_slices<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        let mut n = self.slices.len() as u32;
        ar.io_uleb32(&mut n)?;
        if ar.is_load() {
            let kind = self.kind;
            self.slices = (0..n)
                .map(|_| TimeSlice::new(0, 0, kind.default_payload()))
                .collect();
        }
        for ts in &mut self.slices {
            ts.hibernate(ar)?;
        }
        Ok(())
    }

    /// Encodes the object into its archive blob.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut ar = ArchiveWriter::new();
        let mut tb = self.type_byte();
        ar.io_u8(&mut tb)?;
        let mut obj = self.clone();
        obj.hibernate_slices(&mut ar)?;
        Ok(ar.into_vec())
    }

    /// Decodes an object from its archive blob.
    pub fn decode(uuid: Uuid, blob: &[u8]) -> Result<Object> {
        let mut ar = ArchiveReader::new(blob);
        let mut tb = 0u8;
        ar.io_u8(&mut tb)
            .map_err(|e| e.with_decode_context(Some(uuid), blob))?;
        let kind = ObjectKind::from_byte(tb).ok_or_else(|| {
            Error::decode(
                Some(uuid),
                adr_archive::DecodeError::UnknownDiscriminant {
                    offset: 0,
                    what: "object type",
                    value: tb,
                },
                blob,
            )
        })?;
        let mut obj = Object::new(uuid, kind);
        obj.hibernate_slices(&mut ar)
            .and_then(|()| ar.expect_end())
            .map_err(|e| e.with_decode_context(Some(uuid), blob))?;
        Ok(obj)
    }

    /// Walks the object with an arbitrary archive mode (ScanDeps or
    /// ResolveLinks); Save and Load use [`encode`](Self::encode) and
    /// [`decode`](Self::decode).
    pub fn visit<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.hibernate_slices(ar)
    }

    /// A copy restricted to the slices overlapping `[t0, t1)`, or `None`
    /// when nothing would change.
    pub fn simplify_time(&self, t0: Timestamp, t1: Timestamp) -> Option<Object> {
        if self.slices.iter().all(|ts| ts.is_overlap(t0, t1)) {
            return None;
        }
        let mut obj = self.clone();
        obj.slices.retain(|ts| ts.is_overlap(t0, t1));
        Some(obj)
    }

    /// Drops slices that ended before `cutoff`.
    pub fn clean_slices(&mut self, cutoff: Timestamp) {
        self.slices.retain(|ts| ts.end() > cutoff);
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.uuid)?;
        if let Some(ident) = self.slices.iter().find_map(|ts| ts.payload().ident()) {
            write!(f, " ({ident})")?;
        }
        Ok(())
    }
}

impl Error {
    pub(crate) fn with_decode_context(self, uuid: Option<Uuid>, blob: &[u8]) -> Self {
        match self {
            Self::Decode { source, .. } => Error::decode(uuid, source, blob),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Coord;

    fn airport(uuid: &str, ident: &str, flags: AirportFlags) -> Object {
        let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::Airport);
        obj.add_slice(TimeSlice::new(
            1_000_000,
            Timestamp::MAX,
            SlicePayload::Airport(AirportSlice {
                ident: ident.into(),
                name: format!("{ident} airport"),
                iata: String::new(),
                coord: Coord::from_deg(46.2381, 6.1089),
                elev: 1411,
                flags,
                cities: vec!["GENEVA".into()],
            }),
        ))
        .unwrap();
        obj
    }

    #[test]
    fn airport_type_byte_carries_flags() {
        let obj = airport(
            "00112233-4455-6677-8899-aabbccddeeff",
            "LSGG",
            AirportFlags::DEP_IFR | AirportFlags::ARR_IFR,
        );
        assert_eq!(obj.type_byte(), 0x40 | 0x0c);
    }

    #[test]
    fn blob_round_trip() {
        let obj = airport(
            "00112233-4455-6677-8899-aabbccddeeff",
            "LSGG",
            AirportFlags::DEP_IFR | AirportFlags::ARR_IFR,
        );
        let blob = obj.encode().unwrap();
        let back = Object::decode(*obj.uuid(), &blob).unwrap();
        assert_eq!(obj, back);
        assert_eq!(blob, back.encode().unwrap());
    }

    #[test]
    fn truncated_blob_fails() {
        let obj = airport(
            "00112233-4455-6677-8899-aabbccddeeff",
            "LSGG",
            AirportFlags::default(),
        );
        let blob = obj.encode().unwrap();
        for cut in 0..blob.len() {
            assert!(
                Object::decode(*obj.uuid(), &blob[..cut]).is_err(),
                "truncation to {cut} bytes must fail"
            );
        }
    }

    #[test]
    fn unknown_discriminant_fails() {
        let err = Object::decode(Uuid::NIL, &[0x3f, 0x00]).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn slice_lookup() {
        let mut obj = Object::new(Uuid::NIL, ObjectKind::DesignatedPoint);
        for (start, end, ident) in [(0u64, 100u64, "OLD"), (100, 200, "NEW")] {
            obj.add_slice(TimeSlice::new(
                start,
                end,
                SlicePayload::DesignatedPoint(DesignatedPointSlice {
                    ident: ident.into(),
                    ..Default::default()
                }),
            ))
            .unwrap();
        }
        assert_eq!(obj.slice_at(50).unwrap().payload().ident(), Some("OLD"));
        assert_eq!(obj.slice_at(150).unwrap().payload().ident(), Some("NEW"));
        assert!(obj.slice_at(250).is_none());
        assert_eq!(obj.best_slice(90, 210).unwrap().payload().ident(), Some("NEW"));
        assert_eq!(obj.timebounds(), (0, 200));
    }

    #[test]
    fn slice_kind_enforced() {
        let mut obj = Object::new(Uuid::NIL, ObjectKind::Airport);
        let err = obj
            .add_slice(TimeSlice::new(
                0,
                100,
                SlicePayload::Route(RouteSlice::default()),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::SliceKindMismatch { .. }));
    }
}
