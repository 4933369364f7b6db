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

//! Standard instrument departures and arrivals.

use crate::archive::{Archive, Hibernate};
use crate::error::Result;
use crate::id::{Link, LinkSet};
use crate::model::route::SegmentCore;
use crate::timetable::TimeTable;

/// Operational status of a procedure.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
#[repr(u8)]
pub enum ProcedureStatus {
    Usable = 0,
    Suspended = 1,
    #[default]
    Invalid = 2,
}

impl ProcedureStatus {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Usable,
            1 => Self::Suspended,
            _ => Self::Invalid,
        }
    }
}

/// Shared state of a SID or STAR over one validity interval.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ProcedureSlice {
    pub ident: String,
    pub status: ProcedureStatus,
    pub airport: Link,
    /// Points where the procedure joins the enroute network.
    pub connpoints: LinkSet,
    pub timetable: TimeTable,
    pub instruction: String,
}

impl Hibernate for ProcedureSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        let mut st = self.status as u8;
        ar.io_u8(&mut st)?;
        self.status = ProcedureStatus::from_byte(st);
        ar.io_link(&mut self.airport)?;
        ar.io_link_set(&mut self.connpoints)?;
        self.timetable.hibernate(ar)?;
        ar.io_string(&mut self.instruction)
    }
}

/// State of a standard instrument departure.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct SidSlice {
    pub proc: ProcedureSlice,
}

impl Hibernate for SidSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.proc.hibernate(ar)
    }
}

/// State of a standard instrument arrival.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct StarSlice {
    pub proc: ProcedureSlice,
    /// Initial approach fixes.
    pub iaf: LinkSet,
}

impl Hibernate for StarSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.proc.hibernate(ar)?;
        ar.io_link_set(&mut self.iaf)
    }
}

/// A leg inside a SID; the core's route link names the procedure.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DepartureLegSlice {
    pub core: SegmentCore,
}

impl Hibernate for DepartureLegSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.core.hibernate(ar)
    }
}

/// A leg inside a STAR; the core's route link names the procedure.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct ArrivalLegSlice {
    pub core: SegmentCore,
}

impl Hibernate for ArrivalLegSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        self.core.hibernate(ar)
    }
}
