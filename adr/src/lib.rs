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

//! Aeronautical data repository.
//!
//! The crate persists a temporally versioned, cross-referenced graph of
//! ATS objects (airports, navaids, designated points, route segments,
//! procedures, airspaces and flight restrictions) and executes three
//! operations against it:
//!
//! - store and query with spatial, temporal and dependency indexing
//!   ([`db::Store`], [`snapshot`]),
//! - evaluate a filed flight plan against the loaded rule set
//!   ([`eval::RestrictionEval`]),
//! - precompute the permissible direct segments between every pair of
//!   significant points ([`dct::DctParameters`]).
//!
//! # Examples
//!
//! ```no_run
//! use adr::db::{IdentComparison, LoadMode, Store};
//!
//! # fn main() -> adr::Result<()> {
//! let store = Store::open("/var/lib/adr", true)?;
//! for link in store.find_by_ident(
//!     "LSGG",
//!     IdentComparison::Exact,
//!     LoadMode::Object,
//!     &adr::db::Filter::default(),
//! )? {
//!     println!("{}", link.uuid());
//! }
//! # Ok(())
//! # }
//! ```

pub mod altrange;
pub mod archive;
pub mod db;
pub mod dct;
pub mod error;
pub mod eval;
pub mod geom;
pub mod graph;
pub mod id;
pub mod interval;
pub mod model;
pub mod restriction;
pub mod snapshot;
pub mod timetable;

pub use error::{Error, Result};

use chrono::{TimeZone, Utc};
use timetable::{Timestamp, UNBOUNDED_FUTURE, UNBOUNDED_PAST};

/// Renders an epoch timestamp for diagnostics; the unbounded sentinels
/// read as words.
pub fn format_time(t: Timestamp) -> String {
    if t == UNBOUNDED_PAST {
        return "past".to_string();
    }
    if t == UNBOUNDED_FUTURE {
        return "future".to_string();
    }
    match Utc.timestamp_opt(t.min(i64::MAX as u64) as i64, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        _ => t.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_rendering() {
        assert_eq!(format_time(0), "past");
        assert_eq!(format_time(u64::MAX), "future");
        assert_eq!(format_time(1_400_000_000), "2014-05-13T16:53:20Z");
    }
}
