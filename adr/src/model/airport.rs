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

use crate::archive::{Archive, Hibernate};
use crate::error::Result;
use crate::geom::Coord;
use crate::id::Link;
use crate::model::INVALID_ELEV;

/// Airport capability flags.
///
/// Civil is the absence of [`AirportFlags::MIL`]. The low nibble of the
/// flags is mixed into the object's type byte, so the values are part of
/// the on-disk contract.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub struct AirportFlags(u8);

impl AirportFlags {
    pub const MIL: AirportFlags = AirportFlags(0x01);
    pub const DEP_IFR: AirportFlags = AirportFlags(0x04);
    pub const ARR_IFR: AirportFlags = AirportFlags(0x08);

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    pub fn contains(&self, other: AirportFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AirportFlags {
    type Output = AirportFlags;

    fn bitor(self, rhs: AirportFlags) -> AirportFlags {
        AirportFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for AirportFlags {
    fn bitor_assign(&mut self, rhs: AirportFlags) {
        self.0 |= rhs.0;
    }
}

/// State of an airport over one validity interval.
#[derive(Clone, PartialEq, Debug)]
pub struct AirportSlice {
    pub ident: String,
    pub name: String,
    pub iata: String,
    pub coord: Coord,
    pub elev: i32,
    pub flags: AirportFlags,
    /// Cities served, as named by the source dataset.
    pub cities: Vec<String>,
}

impl Default for AirportSlice {
    fn default() -> Self {
        Self {
            ident: String::new(),
            name: String::new(),
            iata: String::new(),
            coord: Coord::INVALID,
            elev: INVALID_ELEV,
            flags: AirportFlags::default(),
            cities: Vec::new(),
        }
    }
}

impl AirportSlice {
    pub fn is_civ(&self) -> bool {
        !self.is_mil()
    }

    pub fn is_mil(&self) -> bool {
        self.flags.contains(AirportFlags::MIL)
    }

    pub fn is_dep_ifr(&self) -> bool {
        self.flags.contains(AirportFlags::DEP_IFR)
    }

    pub fn is_arr_ifr(&self) -> bool {
        self.flags.contains(AirportFlags::ARR_IFR)
    }

    pub fn is_elev_valid(&self) -> bool {
        self.elev != INVALID_ELEV
    }
}

impl Hibernate for AirportSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        ar.io_string(&mut self.name)?;
        ar.io_string(&mut self.iata)?;
        ar.io_coord(&mut self.coord)?;
        ar.io_i32(&mut self.elev)?;
        let mut flags = self.flags.bits();
        ar.io_u8(&mut flags)?;
        self.flags = AirportFlags::from_bits(flags);
        ar.io_string_vec(&mut self.cities)
    }
}

/// Collocation of a host airport with a dependent one.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AirportCollocationSlice {
    pub host: Link,
    pub dep: Link,
}

impl Hibernate for AirportCollocationSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_link(&mut self.host)?;
        ar.io_link(&mut self.dep)
    }
}
