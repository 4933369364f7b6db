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

//! Navaids, designated points and the angle/distance indications that
//! reference them.

use crate::archive::{Archive, Hibernate};
use crate::error::Result;
use crate::geom::Coord;
use crate::id::Link;
use crate::model::INVALID_ELEV;

/// Radio navigation aid type.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(u8)]
pub enum NavaidType {
    Vor = 0,
    VorDme = 1,
    Vortac = 2,
    Tacan = 3,
    Ils = 4,
    IlsDme = 5,
    Loc = 6,
    LocDme = 7,
    Dme = 8,
    Ndb = 9,
    NdbDme = 10,
    NdbMkr = 11,
    Mkr = 12,
    #[default]
    Invalid = 13,
}

impl NavaidType {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Vor,
            1 => Self::VorDme,
            2 => Self::Vortac,
            3 => Self::Tacan,
            4 => Self::Ils,
            5 => Self::IlsDme,
            6 => Self::Loc,
            7 => Self::LocDme,
            8 => Self::Dme,
            9 => Self::Ndb,
            10 => Self::NdbDme,
            11 => Self::NdbMkr,
            12 => Self::Mkr,
            _ => Self::Invalid,
        }
    }

    pub fn is_vor(&self) -> bool {
        matches!(self, Self::Vor | Self::VorDme | Self::Vortac)
    }

    pub fn is_dme(&self) -> bool {
        matches!(
            self,
            Self::VorDme | Self::IlsDme | Self::LocDme | Self::Dme | Self::NdbDme
        )
    }

    pub fn is_tacan(&self) -> bool {
        matches!(self, Self::Vortac | Self::Tacan)
    }

    pub fn is_ils(&self) -> bool {
        matches!(self, Self::Ils | Self::IlsDme | Self::Loc | Self::LocDme)
    }

    pub fn is_loc(&self) -> bool {
        self.is_ils()
    }

    pub fn is_ndb(&self) -> bool {
        matches!(self, Self::Ndb | Self::NdbDme | Self::NdbMkr)
    }

    pub fn is_mkr(&self) -> bool {
        matches!(self, Self::NdbMkr | Self::Mkr)
    }
}

/// State of a navaid over one validity interval.
#[derive(Clone, PartialEq, Debug)]
pub struct NavaidSlice {
    pub ident: String,
    pub name: String,
    pub coord: Coord,
    pub elev: i32,
    pub navaid_type: NavaidType,
}

impl Default for NavaidSlice {
    fn default() -> Self {
        Self {
            ident: String::new(),
            name: String::new(),
            coord: Coord::INVALID,
            elev: INVALID_ELEV,
            navaid_type: NavaidType::Invalid,
        }
    }
}

impl Hibernate for NavaidSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        ar.io_string(&mut self.name)?;
        ar.io_coord(&mut self.coord)?;
        ar.io_i32(&mut self.elev)?;
        let mut t = self.navaid_type as u8;
        ar.io_u8(&mut t)?;
        self.navaid_type = NavaidType::from_byte(t);
        Ok(())
    }
}

/// Designated point category.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[repr(u8)]
pub enum DesignatedPointType {
    Icao = 0,
    Terminal = 1,
    Coord = 2,
    Boundary = 3,
    Reference = 4,
    #[default]
    Invalid = 5,
}

impl DesignatedPointType {
    pub fn from_byte(v: u8) -> Self {
        match v {
            0 => Self::Icao,
            1 => Self::Terminal,
            2 => Self::Coord,
            3 => Self::Boundary,
            4 => Self::Reference,
            _ => Self::Invalid,
        }
    }
}

/// State of a designated point over one validity interval.
#[derive(Clone, PartialEq, Debug)]
pub struct DesignatedPointSlice {
    pub ident: String,
    pub name: String,
    pub coord: Coord,
    pub point_type: DesignatedPointType,
}

impl Default for DesignatedPointSlice {
    fn default() -> Self {
        Self {
            ident: String::new(),
            name: String::new(),
            coord: Coord::INVALID,
            point_type: DesignatedPointType::Invalid,
        }
    }
}

impl Hibernate for DesignatedPointSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_string(&mut self.ident)?;
        ar.io_string(&mut self.name)?;
        ar.io_coord(&mut self.coord)?;
        let mut t = self.point_type as u8;
        ar.io_u8(&mut t)?;
        self.point_type = DesignatedPointType::from_byte(t);
        Ok(())
    }
}

/// A magnetic bearing from a navaid to a fix.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct AngleIndicationSlice {
    pub fix: Link,
    pub navaid: Link,
    pub angle_deg: f64,
}

impl Hibernate for AngleIndicationSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_link(&mut self.fix)?;
        ar.io_link(&mut self.navaid)?;
        ar.io_f64(&mut self.angle_deg)
    }
}

/// A DME distance from a navaid to a fix.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DistanceIndicationSlice {
    pub fix: Link,
    pub navaid: Link,
    pub dist_nm: f64,
}

impl Hibernate for DistanceIndicationSlice {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()> {
        ar.io_link(&mut self.fix)?;
        ar.io_link(&mut self.navaid)?;
        ar.io_f64(&mut self.dist_nm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navaid_type_groups() {
        assert!(NavaidType::Vortac.is_vor());
        assert!(NavaidType::Vortac.is_tacan());
        assert!(!NavaidType::Vortac.is_dme());
        assert!(NavaidType::NdbDme.is_ndb());
        assert!(NavaidType::NdbDme.is_dme());
        assert!(NavaidType::IlsDme.is_ils());
        assert!(!NavaidType::Invalid.is_vor());
    }
}
