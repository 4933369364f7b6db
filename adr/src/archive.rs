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

//! Bi-directional traversal over the object graph.
//!
//! Every composite type defines a single
//! [`hibernate`](Hibernate::hibernate) routine that is reused for all four
//! archive modes: [`ArchiveWriter`] and [`ArchiveReader`] perform the
//! symmetric byte operations of the blob framing, [`DepScanner`] records
//! referenced UUIDs while ignoring data fields, and [`LinkResolver`]
//! replaces UUIDs with strong handles by consulting the store.

use std::collections::HashMap;
use std::sync::Arc;

use adr_archive::{ByteReader, ByteWriter, DecodeError};

use crate::db::Store;
use crate::error::{Error, Result};
use crate::geom::{Coord, Rect};
use crate::id::{Link, LinkSet, Uuid};
use crate::model::Object;

/// Uniform IO over all archive modes.
///
/// The byte modes implement the primitives against the blob; the scanning
/// modes leave data fields untouched and only act on links. Container and
/// composite helpers are provided in terms of the primitives so they
/// behave correctly in every mode.
pub trait Archive {
    fn is_save(&self) -> bool {
        false
    }

    fn is_load(&self) -> bool {
        false
    }

    fn io_u8(&mut self, v: &mut u8) -> Result<()>;
    fn io_u32(&mut self, v: &mut u32) -> Result<()>;
    fn io_i32(&mut self, v: &mut i32) -> Result<()>;
    fn io_u64(&mut self, v: &mut u64) -> Result<()>;
    fn io_f64(&mut self, v: &mut f64) -> Result<()>;
    fn io_bool(&mut self, v: &mut bool) -> Result<()>;
    fn io_string(&mut self, v: &mut String) -> Result<()>;
    /// Container and discriminant lengths.
    fn io_uleb32(&mut self, v: &mut u32) -> Result<()>;
    fn io_uuid(&mut self, v: &mut Uuid) -> Result<()>;
    fn io_link(&mut self, v: &mut Link) -> Result<()>;

    fn io_coord(&mut self, v: &mut Coord) -> Result<()> {
        let mut lat = v.lat();
        let mut lon = v.lon();
        self.io_i32(&mut lat)?;
        self.io_i32(&mut lon)?;
        *v = Coord::new(lat, lon);
        Ok(())
    }

    fn io_rect(&mut self, v: &mut Rect) -> Result<()> {
        let mut sw = v.southwest();
        let mut ne = v.northeast();
        self.io_coord(&mut sw)?;
        self.io_coord(&mut ne)?;
        *v = Rect::new(sw, ne);
        Ok(())
    }

    fn io_string_vec(&mut self, v: &mut Vec<String>) -> Result<()> {
        let mut n = v.len() as u32;
        self.io_uleb32(&mut n)?;
        if self.is_load() {
            v.clear();
            v.resize(n as usize, String::new());
        }
        for s in v.iter_mut() {
            self.io_string(s)?;
        }
        Ok(())
    }

    fn io_link_set(&mut self, v: &mut LinkSet) -> Result<()> {
        let mut n = v.len() as u32;
        self.io_uleb32(&mut n)?;
        if self.is_load() {
            let mut set = LinkSet::new();
            for _ in 0..n {
                let mut link = Link::default();
                self.io_link(&mut link)?;
                set.insert(link);
            }
            *v = set;
        } else {
            // ordering is stable, so rebuilding the set preserves it
            let mut set = LinkSet::new();
            for mut link in std::mem::take(v).into_iter() {
                self.io_link(&mut link)?;
                set.insert(link);
            }
            *v = set;
        }
        Ok(())
    }
}

/// Types traversable by an [`Archive`].
pub trait Hibernate {
    fn hibernate<A: Archive>(&mut self, ar: &mut A) -> Result<()>;
}

/// Save mode: encodes into the little-endian framing.
#[derive(Default)]
pub struct ArchiveWriter {
    w: ByteWriter,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.w.into_vec()
    }
}

impl Archive for ArchiveWriter {
    fn is_save(&self) -> bool {
        true
    }

    fn io_u8(&mut self, v: &mut u8) -> Result<()> {
        self.w.write_u8(*v);
        Ok(())
    }

    fn io_u32(&mut self, v: &mut u32) -> Result<()> {
        self.w.write_u32(*v);
        Ok(())
    }

    fn io_i32(&mut self, v: &mut i32) -> Result<()> {
        self.w.write_i32(*v);
        Ok(())
    }

    fn io_u64(&mut self, v: &mut u64) -> Result<()> {
        self.w.write_u64(*v);
        Ok(())
    }

    fn io_f64(&mut self, v: &mut f64) -> Result<()> {
        self.w.write_f64(*v);
        Ok(())
    }

    fn io_bool(&mut self, v: &mut bool) -> Result<()> {
        self.w.write_bool(*v);
        Ok(())
    }

    fn io_string(&mut self, v: &mut String) -> Result<()> {
        self.w.write_string(v);
        Ok(())
    }

    fn io_uleb32(&mut self, v: &mut u32) -> Result<()> {
        self.w.write_uleb32(*v);
        Ok(())
    }

    fn io_uuid(&mut self, v: &mut Uuid) -> Result<()> {
        self.w.write_bytes(v.as_bytes());
        Ok(())
    }

    fn io_link(&mut self, v: &mut Link) -> Result<()> {
        self.w.write_bytes(v.uuid().as_bytes());
        Ok(())
    }
}

/// Load mode: decodes from a blob, reporting the byte offset on failure.
pub struct ArchiveReader<'a> {
    r: ByteReader<'a>,
}

impl<'a> ArchiveReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            r: ByteReader::new(data),
        }
    }

    pub fn position(&self) -> usize {
        self.r.position()
    }

    pub fn expect_end(&self) -> Result<()> {
        self.r.expect_end().map_err(wrap)
    }
}

fn wrap(e: DecodeError) -> Error {
    Error::Decode {
        uuid: None,
        source: e,
        blob: String::new(),
    }
}

impl Archive for ArchiveReader<'_> {
    fn is_load(&self) -> bool {
        true
    }

    fn io_u8(&mut self, v: &mut u8) -> Result<()> {
        *v = self.r.read_u8().map_err(wrap)?;
        Ok(())
    }

    fn io_u32(&mut self, v: &mut u32) -> Result<()> {
        *v = self.r.read_u32().map_err(wrap)?;
        Ok(())
    }

    fn io_i32(&mut self, v: &mut i32) -> Result<()> {
        *v = self.r.read_i32().map_err(wrap)?;
        Ok(())
    }

    fn io_u64(&mut self, v: &mut u64) -> Result<()> {
        *v = self.r.read_u64().map_err(wrap)?;
        Ok(())
    }

    fn io_f64(&mut self, v: &mut f64) -> Result<()> {
        *v = self.r.read_f64().map_err(wrap)?;
        Ok(())
    }

    fn io_bool(&mut self, v: &mut bool) -> Result<()> {
        *v = self.r.read_bool().map_err(wrap)?;
        Ok(())
    }

    fn io_string(&mut self, v: &mut String) -> Result<()> {
        *v = self.r.read_string().map_err(wrap)?;
        Ok(())
    }

    fn io_uleb32(&mut self, v: &mut u32) -> Result<()> {
        *v = self.r.read_uleb32().map_err(wrap)?;
        Ok(())
    }

    fn io_uuid(&mut self, v: &mut Uuid) -> Result<()> {
        let bytes = self.r.read_bytes(16).map_err(wrap)?;
        let mut b = [0u8; 16];
        b.copy_from_slice(bytes);
        *v = Uuid::from_bytes(b);
        Ok(())
    }

    fn io_link(&mut self, v: &mut Link) -> Result<()> {
        let mut uuid = Uuid::NIL;
        self.io_uuid(&mut uuid)?;
        *v = Link::new(uuid);
        Ok(())
    }
}

/// ScanDeps mode: records referenced UUIDs, ignores data fields.
#[derive(Default)]
pub struct DepScanner {
    deps: LinkSet,
}

impl DepScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_deps(self) -> LinkSet {
        self.deps
    }
}

impl Archive for DepScanner {
    fn io_u8(&mut self, _v: &mut u8) -> Result<()> {
        Ok(())
    }

    fn io_u32(&mut self, _v: &mut u32) -> Result<()> {
        Ok(())
    }

    fn io_i32(&mut self, _v: &mut i32) -> Result<()> {
        Ok(())
    }

    fn io_u64(&mut self, _v: &mut u64) -> Result<()> {
        Ok(())
    }

    fn io_f64(&mut self, _v: &mut f64) -> Result<()> {
        Ok(())
    }

    fn io_bool(&mut self, _v: &mut bool) -> Result<()> {
        Ok(())
    }

    fn io_string(&mut self, _v: &mut String) -> Result<()> {
        Ok(())
    }

    fn io_uleb32(&mut self, _v: &mut u32) -> Result<()> {
        Ok(())
    }

    fn io_uuid(&mut self, _v: &mut Uuid) -> Result<()> {
        Ok(())
    }

    fn io_link(&mut self, v: &mut Link) -> Result<()> {
        if !v.is_nil() {
            self.deps.insert(v.clone());
        }
        Ok(())
    }
}

/// ResolveLinks mode: replaces UUIDs with strong handles.
///
/// The resolver consults the store cache and a per-resolution `seen` map,
/// so reference cycles terminate: an object is entered into the map before
/// its own links are walked, and a cycle member rediscovered through the
/// map is handed out in whatever resolution state it has.
pub struct LinkResolver<'a, 'b> {
    store: &'a Store,
    depth: u32,
    seen: &'b mut HashMap<Uuid, Arc<Object>>,
    unresolved: bool,
}

impl<'a, 'b> LinkResolver<'a, 'b> {
    pub(crate) fn new(
        store: &'a Store,
        depth: u32,
        seen: &'b mut HashMap<Uuid, Arc<Object>>,
    ) -> Self {
        Self {
            store,
            depth,
            seen,
            unresolved: false,
        }
    }

    /// True iff some link named an object the store does not hold.
    pub fn has_unresolved(&self) -> bool {
        self.unresolved
    }
}

impl Archive for LinkResolver<'_, '_> {
    fn io_u8(&mut self, _v: &mut u8) -> Result<()> {
        Ok(())
    }

    fn io_u32(&mut self, _v: &mut u32) -> Result<()> {
        Ok(())
    }

    fn io_i32(&mut self, _v: &mut i32) -> Result<()> {
        Ok(())
    }

    fn io_u64(&mut self, _v: &mut u64) -> Result<()> {
        Ok(())
    }

    fn io_f64(&mut self, _v: &mut f64) -> Result<()> {
        Ok(())
    }

    fn io_bool(&mut self, _v: &mut bool) -> Result<()> {
        Ok(())
    }

    fn io_string(&mut self, _v: &mut String) -> Result<()> {
        Ok(())
    }

    fn io_uleb32(&mut self, _v: &mut u32) -> Result<()> {
        Ok(())
    }

    fn io_uuid(&mut self, _v: &mut Uuid) -> Result<()> {
        Ok(())
    }

    fn io_link(&mut self, v: &mut Link) -> Result<()> {
        if v.is_nil() {
            return Ok(());
        }
        match self
            .store
            .load_linked_seen(v.uuid(), self.depth, self.seen)?
        {
            Some(p) => v.set_obj(Some(p)),
            None => self.unresolved = true,
        }
        Ok(())
    }
}

/// Walks a value's links without resolving, applying `f` to each.
///
/// Used by the graph builder and the pipeline to iterate references of
/// already-resolved objects.
pub struct LinkVisitor<'a> {
    f: &'a mut dyn FnMut(&mut Link),
}

impl<'a> LinkVisitor<'a> {
    pub fn new(f: &'a mut dyn FnMut(&mut Link)) -> Self {
        Self { f }
    }
}

impl Archive for LinkVisitor<'_> {
    fn io_u8(&mut self, _v: &mut u8) -> Result<()> {
        Ok(())
    }

    fn io_u32(&mut self, _v: &mut u32) -> Result<()> {
        Ok(())
    }

    fn io_i32(&mut self, _v: &mut i32) -> Result<()> {
        Ok(())
    }

    fn io_u64(&mut self, _v: &mut u64) -> Result<()> {
        Ok(())
    }

    fn io_f64(&mut self, _v: &mut f64) -> Result<()> {
        Ok(())
    }

    fn io_bool(&mut self, _v: &mut bool) -> Result<()> {
        Ok(())
    }

    fn io_string(&mut self, _v: &mut String) -> Result<()> {
        Ok(())
    }

    fn io_uleb32(&mut self, _v: &mut u32) -> Result<()> {
        Ok(())
    }

    fn io_uuid(&mut self, _v: &mut Uuid) -> Result<()> {
        Ok(())
    }

    fn io_link(&mut self, v: &mut Link) -> Result<()> {
        (self.f)(v);
        Ok(())
    }
}
