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

//! The binary snapshot file.
//!
//! A read-only, memory-mapped mirror of the `obj` relation:
//!
//! - a 64-byte header carrying the signature, the directory offset
//!   (u64) and the directory entry count (u32);
//! - a directory of fixed 64-byte entries sorted by UUID: UUID (16),
//!   bbox as four i32, mintime/maxtime/modified as three u64, data
//!   offset (u32), data size (u24), type byte;
//! - the object bodies, each byte-identical to the SQL `DATA` column.
//!
//! Everything is little-endian with one-byte alignment. The signature
//! string is the version tag; any change to the layout breaks it.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use log::trace;
use memmap2::Mmap;
use rusqlite::Connection;

use crate::error::{Error, Result};
use crate::geom::{Coord, Rect};
use crate::id::{Link, Uuid};
use crate::model::Object;
use crate::timetable::Timestamp;

pub(crate) const SIGNATURE: &[u8] = b"vfrnav ADR objects V1\n\0";
pub(crate) const HEADER_SIZE: usize = 64;
pub(crate) const ENTRY_SIZE: usize = 64;

/// The body offset field is 32 bits wide, so object bodies past 4 GiB
/// are not representable; the writer refuses to produce such a file.
const MAX_BODY_OFFSET: u64 = u32::MAX as u64;

fn read_u24(data: &[u8], at: usize) -> u32 {
    u32::from(data[at]) | u32::from(data[at + 1]) << 8 | u32::from(data[at + 2]) << 16
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    u64::from_le_bytes([
        data[at],
        data[at + 1],
        data[at + 2],
        data[at + 3],
        data[at + 4],
        data[at + 5],
        data[at + 6],
        data[at + 7],
    ])
}

fn read_i32(data: &[u8], at: usize) -> i32 {
    read_u32(data, at) as i32
}

/// One 64-byte directory entry, borrowed from the map.
#[derive(Copy, Clone)]
pub(crate) struct DirEntry<'a> {
    data: &'a [u8],
}

impl<'a> DirEntry<'a> {
    fn uuid(&self) -> Uuid {
        let mut b = [0u8; 16];
        b.copy_from_slice(&self.data[0..16]);
        Uuid::from_bytes(b)
    }

    fn bbox(&self) -> Rect {
        Rect::new(
            Coord::new(read_i32(self.data, 20), read_i32(self.data, 16)),
            Coord::new(read_i32(self.data, 28), read_i32(self.data, 24)),
        )
    }

    fn mintime(&self) -> Timestamp {
        read_u64(self.data, 32)
    }

    fn maxtime(&self) -> Timestamp {
        read_u64(self.data, 40)
    }

    fn modified(&self) -> Timestamp {
        read_u64(self.data, 48)
    }

    fn dataoffs(&self) -> u64 {
        u64::from(read_u32(self.data, 56))
    }

    fn datasize(&self) -> usize {
        read_u24(self.data, 60) as usize
    }

    fn type_byte(&self) -> u8 {
        self.data[63]
    }
}

/// The mapped snapshot.
pub struct Snapshot {
    map: Mmap,
    dir_offset: usize,
    entries: usize,
}

impl Snapshot {
    /// Maps the file and checks the signature and directory bounds.
    pub fn open(path: &Path) -> Result<Snapshot> {
        let file = File::open(path)?;
        // read-only private mapping of a file nobody rewrites in place
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };
        if map.len() < HEADER_SIZE || &map[0..SIGNATURE.len()] != SIGNATURE {
            return Err(Error::SnapshotSignature);
        }
        let dir_offset64 = read_u64(&map, 32);
        let entries = read_u32(&map, 40) as usize;
        let dir_offset = usize::try_from(dir_offset64).map_err(|_| Error::SnapshotBounds {
            offset: dir_offset64,
            len: 0,
            filesize: map.len() as u64,
        })?;
        let dir_end = dir_offset
            .checked_add(entries.checked_mul(ENTRY_SIZE).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        if dir_end > map.len() {
            return Err(Error::SnapshotBounds {
                offset: dir_offset64,
                len: (entries * ENTRY_SIZE) as u64,
                filesize: map.len() as u64,
            });
        }
        Ok(Snapshot {
            map,
            dir_offset,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    fn entry(&self, idx: usize) -> DirEntry<'_> {
        let at = self.dir_offset + idx * ENTRY_SIZE;
        DirEntry {
            data: &self.map[at..at + ENTRY_SIZE],
        }
    }

    fn decode_entry(&self, entry: DirEntry<'_>) -> Result<Option<Object>> {
        if entry.datasize() == 0 {
            return Ok(None);
        }
        let offs = entry.dataoffs() as usize;
        let end = offs + entry.datasize();
        if end > self.map.len() {
            return Err(Error::SnapshotBounds {
                offset: entry.dataoffs(),
                len: entry.datasize() as u64,
                filesize: self.map.len() as u64,
            });
        }
        let mut obj = Object::decode(entry.uuid(), &self.map[offs..end])?;
        obj.set_modified(entry.modified());
        Ok(Some(obj))
    }

    /// Binary search over the UUID-sorted directory.
    pub fn load(&self, uuid: &Uuid) -> Result<Option<Object>> {
        let mut lo = 0usize;
        let mut hi = self.entries;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.entry(mid);
            match entry.uuid().cmp(uuid) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return self.decode_entry(entry),
            }
        }
        trace!("snapshot: {uuid} not present");
        Ok(None)
    }

    pub(crate) fn find_all(
        &self,
        store: &crate::db::Store,
        loadmode: crate::db::LoadMode,
        filter: &crate::db::Filter,
    ) -> Result<Vec<Link>> {
        self.scan(store, loadmode, filter, |_| true)
    }

    pub(crate) fn find_by_bbox(
        &self,
        store: &crate::db::Store,
        bbox: &Rect,
        loadmode: crate::db::LoadMode,
        filter: &crate::db::Filter,
    ) -> Result<Vec<Link>> {
        self.scan(store, loadmode, filter, |entry| {
            bbox.is_intersect(&entry.bbox())
        })
    }

    fn scan<F>(
        &self,
        store: &crate::db::Store,
        loadmode: crate::db::LoadMode,
        filter: &crate::db::Filter,
        pred: F,
    ) -> Result<Vec<Link>>
    where
        F: Fn(&DirEntry<'_>) -> bool,
    {
        let mut out = Vec::new();
        for idx in 0..self.entries {
            let entry = self.entry(idx);
            if !filter.matches(entry.mintime(), entry.maxtime(), entry.type_byte()) {
                continue;
            }
            if !pred(&entry) {
                continue;
            }
            let uuid = entry.uuid();
            let mut link = Link::new(uuid);
            match loadmode {
                crate::db::LoadMode::UuidOnly => {}
                crate::db::LoadMode::Object => {
                    if let Some(obj) = self.decode_entry(entry)? {
                        let obj = Arc::new(obj);
                        store.cache_put(obj.clone());
                        link.set_obj(Some(obj));
                    }
                }
                crate::db::LoadMode::ObjectLinked => {
                    if let Some(obj) = self.decode_entry(entry)? {
                        let obj = Arc::new(obj);
                        store.cache_put(obj.clone());
                        link.set_obj(store.load_linked(&uuid, u32::MAX)?);
                    }
                }
            }
            out.push(link);
            if filter.limit > 0 && out.len() >= filter.limit {
                break;
            }
        }
        Ok(out)
    }
}

struct EntryRecord {
    uuid: Uuid,
    bbox: Rect,
    mintime: Timestamp,
    maxtime: Timestamp,
    modified: Timestamp,
    dataoffs: u64,
    datasize: usize,
    type_byte: u8,
}

/// Writes the snapshot mirror of the `obj` relation.
pub(crate) fn write_snapshot(conn: &Connection, path: &Path) -> Result<()> {
    let mut records = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT UUID0,UUID1,UUID2,UUID3,TYPE,SWLAT,NELAT,SWLON,NELON,\
             MINTIME,MAXTIME,MODIFIED,DATA FROM obj",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let uuid = Uuid::from_words(
                row.get::<_, i64>(0)? as u32,
                row.get::<_, i64>(1)? as u32,
                row.get::<_, i64>(2)? as u32,
                row.get::<_, i64>(3)? as u32,
            );
            let bbox = Rect::new(
                Coord::new(row.get::<_, i64>(5)? as i32, row.get::<_, i64>(7)? as i32),
                Coord::new(row.get::<_, i64>(6)? as i32, row.get::<_, i64>(8)? as i32),
            );
            let blob: Vec<u8> = row.get(12)?;
            records.push((
                EntryRecord {
                    uuid,
                    bbox,
                    mintime: row.get::<_, i64>(9)? as u64,
                    maxtime: row.get::<_, i64>(10)? as u64,
                    modified: row.get::<_, i64>(11)? as u64,
                    dataoffs: 0,
                    datasize: blob.len(),
                    type_byte: row.get::<_, i64>(4)? as u8,
                },
                blob,
            ));
        }
    }
    // the directory must be sorted for the binary search
    records.sort_by_key(|(r, _)| r.uuid);
    let mut offset = (HEADER_SIZE + records.len() * ENTRY_SIZE) as u64;
    for (record, blob) in &mut records {
        record.dataoffs = offset;
        offset += blob.len() as u64;
        if offset > MAX_BODY_OFFSET {
            return Err(Error::SnapshotBounds {
                offset,
                len: blob.len() as u64,
                filesize: MAX_BODY_OFFSET,
            });
        }
    }
    let mut file = File::create(path)?;
    let mut header = [0u8; HEADER_SIZE];
    header[0..SIGNATURE.len()].copy_from_slice(SIGNATURE);
    header[32..40].copy_from_slice(&(HEADER_SIZE as u64).to_le_bytes());
    header[40..44].copy_from_slice(&(records.len() as u32).to_le_bytes());
    file.write_all(&header)?;
    for (record, _) in &records {
        let mut entry = [0u8; ENTRY_SIZE];
        entry[0..16].copy_from_slice(record.uuid.as_bytes());
        entry[16..20].copy_from_slice(&record.bbox.west().to_le_bytes());
        entry[20..24].copy_from_slice(&record.bbox.south().to_le_bytes());
        entry[24..28].copy_from_slice(&record.bbox.east().to_le_bytes());
        entry[28..32].copy_from_slice(&record.bbox.north().to_le_bytes());
        entry[32..40].copy_from_slice(&record.mintime.to_le_bytes());
        entry[40..48].copy_from_slice(&record.maxtime.to_le_bytes());
        entry[48..56].copy_from_slice(&record.modified.to_le_bytes());
        entry[56..60].copy_from_slice(&(record.dataoffs as u32).to_le_bytes());
        entry[60..63].copy_from_slice(&(record.datasize as u32).to_le_bytes()[0..3]);
        entry[63] = record.type_byte;
        file.write_all(&entry)?;
    }
    for (record, blob) in &records {
        file.seek(SeekFrom::Start(record.dataoffs))?;
        file.write_all(blob)?;
    }
    file.flush()?;
    Ok(())
}
