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

//! The indexed temporal object store.
//!
//! Objects live in four SQLite relations: `obj` (blob plus bbox and time
//! bounds), `dep` (dependency edges), `ident` (reverse name lookup) and
//! `dct` (precomputed directs). Reads go through a per-store cache that
//! is the single authority for object identity, and through the binary
//! snapshot file when one is present and at least as new as the
//! database.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::archive::LinkResolver;
use crate::dct::DctLeg;
use crate::error::{Error, Result};
use crate::geom::Rect;
use crate::id::{Link, Uuid};
use crate::model::Object;
use crate::snapshot::Snapshot;
use crate::timetable::Timestamp;

/// What a query materialises per row.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LoadMode {
    /// Only the UUID.
    UuidOnly,
    /// The decoded object.
    Object,
    /// The decoded object with all links resolved to unlimited depth.
    ObjectLinked,
}

/// Ident comparison modes of [`Store::find_by_ident`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum IdentComparison {
    StartsWith,
    Exact,
    ExactCaseSensitive,
    Contains,
    Like,
}

/// Time/type/row-count filter shared by all queries.
#[derive(Copy, Clone, Debug)]
pub struct Filter {
    pub tmin: Timestamp,
    pub tmax: Timestamp,
    pub type_min: u8,
    pub type_max: u8,
    pub limit: usize,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            tmin: 0,
            tmax: Timestamp::MAX,
            type_min: crate::model::TYPE_FIRST,
            type_max: crate::model::TYPE_LAST,
            limit: 0,
        }
    }
}

impl Filter {
    pub fn time(mut self, tmin: Timestamp, tmax: Timestamp) -> Self {
        self.tmin = tmin;
        self.tmax = tmax;
        self
    }

    pub fn types(mut self, type_min: u8, type_max: u8) -> Self {
        self.type_min = type_min;
        self.type_max = type_max;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn is_restricted(&self) -> bool {
        self.tmin != 0
            || self.tmax != Timestamp::MAX
            || self.type_min != crate::model::TYPE_FIRST
            || self.type_max != crate::model::TYPE_LAST
    }

    /// True iff a snapshot directory entry passes the filter.
    pub(crate) fn matches(&self, mintime: u64, maxtime: u64, type_byte: u8) -> bool {
        maxtime >= self.tmin
            && mintime <= self.tmax
            && type_byte >= self.type_min
            && type_byte <= self.type_max
    }
}

struct CacheEntry {
    obj: Arc<Object>,
    last_access: Instant,
}

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS obj (UUID0 INTEGER NOT NULL, \
UUID1 INTEGER NOT NULL, UUID2 INTEGER NOT NULL, UUID3 INTEGER NOT NULL, \
TYPE INTEGER NOT NULL, \
SWLAT INTEGER NOT NULL, SWLON INTEGER NOT NULL, \
NELAT INTEGER NOT NULL, NELON INTEGER NOT NULL, \
MINTIME INTEGER NOT NULL, MAXTIME INTEGER NOT NULL, \
MODIFIED INTEGER NOT NULL, DATA BLOB NOT NULL, \
UNIQUE (UUID0,UUID1,UUID2,UUID3) ON CONFLICT REPLACE);
CREATE TABLE IF NOT EXISTS dep (UUID0 INTEGER NOT NULL, \
UUID1 INTEGER NOT NULL, UUID2 INTEGER NOT NULL, UUID3 INTEGER NOT NULL, \
UUIDD0 INTEGER NOT NULL, UUIDD1 INTEGER NOT NULL, \
UUIDD2 INTEGER NOT NULL, UUIDD3 INTEGER NOT NULL);
CREATE TABLE IF NOT EXISTS ident (UUID0 INTEGER NOT NULL, \
UUID1 INTEGER NOT NULL, UUID2 INTEGER NOT NULL, UUID3 INTEGER NOT NULL, \
IDENT TEXT COLLATE NOCASE);
CREATE TABLE IF NOT EXISTS dct (UUIDA0 INTEGER NOT NULL, \
UUIDA1 INTEGER NOT NULL, UUIDA2 INTEGER NOT NULL, UUIDA3 INTEGER NOT NULL, \
UUIDB0 INTEGER NOT NULL, UUIDB1 INTEGER NOT NULL, \
UUIDB2 INTEGER NOT NULL, UUIDB3 INTEGER NOT NULL, \
SWLAT INTEGER NOT NULL, SWLON INTEGER NOT NULL, \
NELAT INTEGER NOT NULL, NELON INTEGER NOT NULL, \
DATA BLOB NOT NULL, \
UNIQUE (UUIDA0,UUIDA1,UUIDA2,UUIDA3,UUIDB0,UUIDB1,UUIDB2,UUIDB3) ON CONFLICT REPLACE);
CREATE INDEX IF NOT EXISTS obj_bbox ON obj(SWLAT,NELAT,SWLON,NELON);
CREATE INDEX IF NOT EXISTS dep_uuid ON dep(UUID0,UUID1,UUID2,UUID3);
CREATE INDEX IF NOT EXISTS dep_uuidd ON dep(UUIDD0,UUIDD1,UUIDD2,UUIDD3);
CREATE INDEX IF NOT EXISTS ident_uuid ON ident(UUID0,UUID1,UUID2,UUID3);
CREATE INDEX IF NOT EXISTS ident_ident ON ident(IDENT COLLATE NOCASE);
CREATE INDEX IF NOT EXISTS dct_uuida ON dct(UUIDA0,UUIDA1,UUIDA2,UUIDA3);
CREATE INDEX IF NOT EXISTS dct_uuidb ON dct(UUIDB0,UUIDB1,UUIDB2,UUIDB3);
";

const TEMP_SCHEMA: &str = "\
CREATE TEMP TABLE IF NOT EXISTS tmpobj (UUID0 INTEGER NOT NULL, \
UUID1 INTEGER NOT NULL, UUID2 INTEGER NOT NULL, UUID3 INTEGER NOT NULL, \
MODIFIED INTEGER NOT NULL, DATA BLOB NOT NULL, \
UNIQUE (UUID0,UUID1,UUID2,UUID3) ON CONFLICT REPLACE);
CREATE TEMP TABLE IF NOT EXISTS tmpdep (UUID0 INTEGER NOT NULL, \
UUID1 INTEGER NOT NULL, UUID2 INTEGER NOT NULL, UUID3 INTEGER NOT NULL, \
UUIDD0 INTEGER NOT NULL, UUIDD1 INTEGER NOT NULL, \
UUIDD2 INTEGER NOT NULL, UUIDD3 INTEGER NOT NULL);
CREATE INDEX IF NOT EXISTS tmpdep_uuid ON tmpdep(UUID0,UUID1,UUID2,UUID3);
CREATE INDEX IF NOT EXISTS tmpdep_uuidd ON tmpdep(UUIDD0,UUIDD1,UUIDD2,UUIDD3);
";

/// The store.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
    cache: RefCell<HashMap<Uuid, CacheEntry>>,
    snapshot: Option<Snapshot>,
    temp_tables: bool,
}

fn clamp_time(t: u64) -> i64 {
    t.min(i64::MAX as u64) as i64
}

fn uuid_words(uuid: &Uuid) -> [i64; 4] {
    [
        i64::from(uuid.word(0)),
        i64::from(uuid.word(1)),
        i64::from(uuid.word(2)),
        i64::from(uuid.word(3)),
    ]
}

fn row_uuid(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Uuid> {
    Ok(Uuid::from_words(
        row.get::<_, i64>(base)? as u32,
        row.get::<_, i64>(base + 1)? as u32,
        row.get::<_, i64>(base + 2)? as u32,
        row.get::<_, i64>(base + 3)? as u32,
    ))
}

impl Store {
    /// Opens (creating as needed) the store in `dir`; the database file
    /// is `adr.db`, the optional snapshot `adr.bin`.
    pub fn open(dir: impl AsRef<Path>, enable_snapshot: bool) -> Result<Store> {
        let dir = dir.as_ref();
        let db_path = dir.join("adr.db");
        let conn = Connection::open(&db_path)?;
        let mut store = Self::init(conn)?;
        store.path = Some(dir.to_path_buf());
        if enable_snapshot {
            store.open_snapshot();
        }
        Ok(store)
    }

    /// An in-memory store without a snapshot.
    pub fn open_in_memory() -> Result<Store> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Store> {
        conn.create_scalar_function(
            "upperbound",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                // incrementing the last byte makes a half-open prefix
                // range; this works on raw bytes, not codepoints, and
                // wraps on 0xff
                let mut bytes = ctx.get::<String>(0)?.into_bytes();
                if let Some(last) = bytes.last_mut() {
                    *last = last.wrapping_add(1);
                }
                Ok(bytes)
            },
        )
        .map_err(Error::Schema)?;
        conn.execute_batch(SCHEMA).map_err(Error::Schema)?;
        Ok(Store {
            conn,
            path: None,
            cache: RefCell::new(HashMap::new()),
            snapshot: None,
            temp_tables: false,
        })
    }

    fn open_snapshot(&mut self) {
        let Some(dir) = &self.path else { return };
        let db_path = dir.join("adr.db");
        let bin_path = dir.join("adr.bin");
        let db_mtime = std::fs::metadata(&db_path).and_then(|m| m.modified()).ok();
        let bin_mtime = std::fs::metadata(&bin_path).and_then(|m| m.modified()).ok();
        match (db_mtime, bin_mtime) {
            (Some(db), Some(bin)) if bin >= db => {}
            (_, Some(_)) => {
                info!("snapshot {} is older than the database, ignored", bin_path.display());
                return;
            }
            _ => return,
        }
        match Snapshot::open(&bin_path) {
            Ok(snapshot) => {
                info!(
                    "using snapshot {}: {} object(s)",
                    bin_path.display(),
                    snapshot.len()
                );
                self.snapshot = Some(snapshot);
            }
            Err(e) => warn!("cannot open snapshot {}: {e}", bin_path.display()),
        }
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /////////////////////////////////////////////////////////////////////
    // Cache
    /////////////////////////////////////////////////////////////////////

    fn cache_get(&self, uuid: &Uuid) -> Option<Arc<Object>> {
        let mut cache = self.cache.borrow_mut();
        let entry = cache.get_mut(uuid)?;
        entry.last_access = Instant::now();
        Some(entry.obj.clone())
    }

    pub(crate) fn cache_put(&self, obj: Arc<Object>) {
        if obj.uuid().is_nil() {
            return;
        }
        self.cache.borrow_mut().insert(
            *obj.uuid(),
            CacheEntry {
                obj,
                last_access: Instant::now(),
            },
        );
    }

    /// Drops entries last accessed before `older_than` and referenced by
    /// nobody else. Returns the number of dropped entries.
    pub fn flush_cache(&self, older_than: Instant) -> usize {
        let mut cache = self.cache.borrow_mut();
        let before = cache.len();
        loop {
            let dead: Vec<Uuid> = cache
                .iter()
                .filter(|(_, e)| e.last_access < older_than && Arc::strong_count(&e.obj) == 1)
                .map(|(uuid, _)| *uuid)
                .collect();
            if dead.is_empty() {
                break;
            }
            for uuid in dead {
                cache.remove(&uuid);
            }
        }
        before - cache.len()
    }

    /// Drops every cache entry. Returns the number dropped.
    pub fn clear_cache(&self) -> usize {
        let mut cache = self.cache.borrow_mut();
        let n = cache.len();
        cache.clear();
        n
    }

    /////////////////////////////////////////////////////////////////////
    // Save and load
    /////////////////////////////////////////////////////////////////////

    /// Persists an object: upserts the blob row, then refreshes the
    /// dependency and ident rows, all in one transaction.
    pub fn save(&mut self, obj: &Arc<Object>) -> Result<()> {
        let blob = obj.encode()?;
        let words = uuid_words(obj.uuid());
        let bbox = obj.bbox();
        let (tmin, tmax) = obj.timebounds();
        let deps = obj.dependencies();
        let idents: std::collections::BTreeSet<String> = obj
            .slices()
            .iter()
            .filter(|ts| ts.is_valid())
            .filter_map(|ts| ts.payload().ident())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO obj \
             (UUID0,UUID1,UUID2,UUID3,TYPE,SWLAT,NELAT,SWLON,NELON,MINTIME,MAXTIME,MODIFIED,DATA) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            rusqlite::params![
                words[0],
                words[1],
                words[2],
                words[3],
                i64::from(obj.type_byte()),
                i64::from(bbox.south()),
                i64::from(bbox.north()),
                i64::from(bbox.west()),
                bbox.east_unwrapped(),
                clamp_time(tmin),
                clamp_time(tmax),
                clamp_time(obj.modified()),
                blob,
            ],
        )?;
        tx.execute(
            "DELETE FROM dep WHERE UUID0=?1 AND UUID1=?2 AND UUID2=?3 AND UUID3=?4",
            rusqlite::params![words[0], words[1], words[2], words[3]],
        )?;
        for dep in deps.iter() {
            if dep.is_nil() {
                continue;
            }
            let dw = uuid_words(dep.uuid());
            tx.execute(
                "INSERT INTO dep (UUID0,UUID1,UUID2,UUID3,UUIDD0,UUIDD1,UUIDD2,UUIDD3) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                rusqlite::params![
                    words[0], words[1], words[2], words[3], dw[0], dw[1], dw[2], dw[3]
                ],
            )?;
        }
        tx.execute(
            "DELETE FROM ident WHERE UUID0=?1 AND UUID1=?2 AND UUID2=?3 AND UUID3=?4",
            rusqlite::params![words[0], words[1], words[2], words[3]],
        )?;
        for ident in idents {
            tx.execute(
                "INSERT INTO ident (UUID0,UUID1,UUID2,UUID3,IDENT) VALUES (?1,?2,?3,?4,?5)",
                rusqlite::params![words[0], words[1], words[2], words[3], ident],
            )?;
        }
        tx.commit()?;
        self.cache_put(obj.clone());
        Ok(())
    }

    /// Loads an object by UUID: cache, snapshot, then SQL.
    pub fn load(&self, uuid: &Uuid) -> Result<Option<Arc<Object>>> {
        if uuid.is_nil() {
            return Ok(None);
        }
        if let Some(obj) = self.cache_get(uuid) {
            return Ok(Some(obj));
        }
        if let Some(snapshot) = &self.snapshot {
            if let Some(obj) = snapshot.load(uuid)? {
                let obj = Arc::new(obj);
                self.cache_put(obj.clone());
                return Ok(Some(obj));
            }
        }
        let words = uuid_words(uuid);
        let mut stmt = self.conn.prepare_cached(
            "SELECT DATA,MODIFIED FROM obj WHERE UUID0=?1 AND UUID1=?2 AND UUID2=?3 AND UUID3=?4",
        )?;
        let mut rows = stmt.query(rusqlite::params![words[0], words[1], words[2], words[3]])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let blob: Vec<u8> = row.get(0)?;
        let modified: i64 = row.get(1)?;
        let mut obj = Object::decode(*uuid, &blob)?;
        obj.set_modified(modified as u64);
        let obj = Arc::new(obj);
        self.cache_put(obj.clone());
        Ok(Some(obj))
    }

    /// Loads an object and resolves its links down to `depth`.
    pub fn load_linked(&self, uuid: &Uuid, depth: u32) -> Result<Option<Arc<Object>>> {
        let mut seen = HashMap::new();
        self.load_linked_seen(uuid, depth, &mut seen)
    }

    /// The recursion of [`load_linked`](Self::load_linked): the `seen`
    /// map breaks reference cycles by handing out the object in whatever
    /// resolution state it has.
    pub(crate) fn load_linked_seen(
        &self,
        uuid: &Uuid,
        depth: u32,
        seen: &mut HashMap<Uuid, Arc<Object>>,
    ) -> Result<Option<Arc<Object>>> {
        if let Some(obj) = seen.get(uuid) {
            return Ok(Some(obj.clone()));
        }
        let Some(obj) = self.load(uuid)? else {
            return Ok(None);
        };
        if depth == 0 || !obj.is_unlinked() {
            return Ok(Some(obj));
        }
        seen.insert(*uuid, obj.clone());
        let mut resolved = (*obj).clone();
        let child_depth = if depth == u32::MAX { depth } else { depth - 1 };
        {
            let mut resolver = LinkResolver::new(self, child_depth, seen);
            resolved.visit(&mut resolver)?;
        }
        let resolved = Arc::new(resolved);
        seen.insert(*uuid, resolved.clone());
        self.cache_put(resolved.clone());
        Ok(Some(resolved))
    }

    /// Resolves a link in place, failing when the store has no object.
    pub fn resolve(&self, link: &mut Link) -> Result<()> {
        match self.load_linked(link.uuid(), u32::MAX)? {
            Some(obj) => {
                link.set_obj(Some(obj));
                Ok(())
            }
            None => Err(Error::LinkUnresolved(*link.uuid())),
        }
    }

    /////////////////////////////////////////////////////////////////////
    // Queries
    /////////////////////////////////////////////////////////////////////

    fn finish_row(
        &self,
        uuid: Uuid,
        blob: Option<Vec<u8>>,
        modified: Option<i64>,
        loadmode: LoadMode,
    ) -> Result<Link> {
        let mut link = Link::new(uuid);
        if loadmode == LoadMode::UuidOnly {
            return Ok(link);
        }
        if let Some(obj) = self.cache_get(&uuid) {
            link.set_obj(Some(obj));
        } else if let Some(blob) = blob {
            let mut obj = Object::decode(uuid, &blob)?;
            if let Some(modified) = modified {
                obj.set_modified(modified as u64);
            }
            let obj = Arc::new(obj);
            self.cache_put(obj.clone());
            link.set_obj(Some(obj));
        }
        if loadmode == LoadMode::ObjectLinked {
            if let Some(obj) = link.obj().cloned() {
                if let Some(resolved) = self.load_linked(obj.uuid(), u32::MAX)? {
                    link.set_obj(Some(resolved));
                }
            }
        }
        Ok(link)
    }

    fn run_find(
        &self,
        sql: &str,
        params: Vec<rusqlite::types::Value>,
        loadmode: LoadMode,
    ) -> Result<Vec<Link>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid = row_uuid(row, 0)?;
            let (blob, modified) = if loadmode == LoadMode::UuidOnly {
                (None, None)
            } else {
                (row.get::<_, Option<Vec<u8>>>(4)?, row.get::<_, Option<i64>>(5)?)
            };
            pending.push((uuid, blob, modified));
        }
        drop(rows);
        drop(stmt);
        let mut out = Vec::with_capacity(pending.len());
        for (uuid, blob, modified) in pending {
            out.push(self.finish_row(uuid, blob, modified, loadmode)?);
        }
        Ok(out)
    }

    fn push_filter(
        sql: &mut String,
        params: &mut Vec<rusqlite::types::Value>,
        filter: &Filter,
        lead: &str,
    ) {
        if !filter.is_restricted() {
            return;
        }
        let base = params.len();
        sql.push_str(&format!(
            " {lead} (MINTIME <= ?{}) AND (MAXTIME >= ?{}) AND (TYPE >= ?{}) AND (TYPE <= ?{})",
            base + 1,
            base + 2,
            base + 3,
            base + 4
        ));
        params.push(clamp_time(filter.tmax).into());
        params.push(clamp_time(filter.tmin).into());
        params.push(i64::from(filter.type_min).into());
        params.push(i64::from(filter.type_max).into());
    }

    fn push_limit(sql: &mut String, params: &mut Vec<rusqlite::types::Value>, filter: &Filter) {
        if filter.limit > 0 {
            sql.push_str(&format!(" LIMIT ?{}", params.len() + 1));
            params.push((filter.limit as i64).into());
        }
    }

    /// Every object passing the filter.
    pub fn find_all(&self, loadmode: LoadMode, filter: &Filter) -> Result<Vec<Link>> {
        if let Some(snapshot) = &self.snapshot {
            return snapshot.find_all(self, loadmode, filter);
        }
        let mut sql = String::from("SELECT UUID0,UUID1,UUID2,UUID3");
        if loadmode != LoadMode::UuidOnly {
            sql.push_str(",DATA,MODIFIED");
        }
        sql.push_str(" FROM obj");
        let mut params = Vec::new();
        Self::push_filter(&mut sql, &mut params, filter, "WHERE");
        Self::push_limit(&mut sql, &mut params, filter);
        self.run_find(&sql, params, loadmode)
    }

    /// Reverse name lookup.
    pub fn find_by_ident(
        &self,
        ident: &str,
        comp: IdentComparison,
        loadmode: LoadMode,
        filter: &Filter,
    ) -> Result<Vec<Link>> {
        let mut sql = String::from("SELECT UUID0,UUID1,UUID2,UUID3");
        if loadmode != LoadMode::UuidOnly {
            sql.push_str(",DATA,MODIFIED");
        }
        sql.push_str(" FROM ident");
        if loadmode != LoadMode::UuidOnly || filter.is_restricted() {
            sql.push_str(" INNER JOIN obj USING (UUID0,UUID1,UUID2,UUID3)");
        }
        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        match comp {
            IdentComparison::StartsWith => {
                // upperbound returns raw bytes; the CAST keeps the
                // comparison text-typed even when the incremented byte
                // is no longer valid UTF-8
                sql.push_str(
                    " WHERE (IDENT>=?1 COLLATE NOCASE) AND \
                     (IDENT<CAST(upperbound(?1) AS TEXT) COLLATE NOCASE)",
                );
                params.push(ident.to_string().into());
            }
            IdentComparison::Exact => {
                sql.push_str(" WHERE (IDENT=?1 COLLATE NOCASE)");
                params.push(ident.to_string().into());
            }
            IdentComparison::ExactCaseSensitive => {
                sql.push_str(" WHERE (IDENT=?1 COLLATE BINARY)");
                params.push(ident.to_string().into());
            }
            IdentComparison::Contains => {
                sql.push_str(" WHERE (IDENT LIKE ?1 ESCAPE ?2)");
                params.push(format!("%{}%", escape_like(ident, '!')).into());
                params.push("!".to_string().into());
            }
            IdentComparison::Like => {
                sql.push_str(" WHERE (IDENT LIKE ?1)");
                params.push(ident.to_string().into());
            }
        }
        Self::push_filter(&mut sql, &mut params, filter, "AND");
        Self::push_limit(&mut sql, &mut params, filter);
        self.run_find(&sql, params, loadmode)
    }

    /// Objects whose bounding box intersects `bbox`, wrap-aware.
    pub fn find_by_bbox(
        &self,
        bbox: &Rect,
        loadmode: LoadMode,
        filter: &Filter,
    ) -> Result<Vec<Link>> {
        if let Some(snapshot) = &self.snapshot {
            return snapshot.find_by_bbox(self, bbox, loadmode, filter);
        }
        let mut sql = String::from("SELECT UUID0,UUID1,UUID2,UUID3");
        if loadmode != LoadMode::UuidOnly {
            sql.push_str(",DATA,MODIFIED");
        }
        sql.push_str(" FROM obj WHERE (NELAT >= ?2 AND SWLAT <= ?4)");
        // three disjuncts shifted by ±2^32 cover the anti-meridian wrap
        sql.push_str(
            " AND ((SWLON <= ?3-4294967296 AND NELON >= ?1-4294967296) OR \
             (SWLON <= ?3 AND NELON >= ?1) OR \
             (SWLON <= ?3+4294967296 AND NELON >= ?1+4294967296))",
        );
        let mut params: Vec<rusqlite::types::Value> = vec![
            i64::from(bbox.west()).into(),
            i64::from(bbox.south()).into(),
            bbox.east_unwrapped().into(),
            i64::from(bbox.north()).into(),
        ];
        Self::push_filter(&mut sql, &mut params, filter, "AND");
        Self::push_limit(&mut sql, &mut params, filter);
        self.run_find(&sql, params, loadmode)
    }

    /// Objects depending on `uuid`.
    pub fn find_dependson(
        &self,
        uuid: &Uuid,
        loadmode: LoadMode,
        filter: &Filter,
    ) -> Result<Vec<Link>> {
        let mut sql = String::from("SELECT dep.UUID0,dep.UUID1,dep.UUID2,dep.UUID3");
        if loadmode != LoadMode::UuidOnly {
            sql.push_str(",obj.DATA,obj.MODIFIED");
        }
        sql.push_str(" FROM dep");
        if loadmode != LoadMode::UuidOnly || filter.is_restricted() {
            sql.push_str(" INNER JOIN obj USING (UUID0,UUID1,UUID2,UUID3)");
        }
        sql.push_str(" WHERE dep.UUIDD0=?1 AND dep.UUIDD1=?2 AND dep.UUIDD2=?3 AND dep.UUIDD3=?4");
        let words = uuid_words(uuid);
        let mut params: Vec<rusqlite::types::Value> = words.iter().map(|&w| w.into()).collect();
        Self::push_filter(&mut sql, &mut params, filter, "AND");
        Self::push_limit(&mut sql, &mut params, filter);
        self.run_find(&sql, params, loadmode)
    }

    /// Objects `uuid` depends on.
    pub fn find_dependencies(
        &self,
        uuid: &Uuid,
        loadmode: LoadMode,
        filter: &Filter,
    ) -> Result<Vec<Link>> {
        let mut sql = String::from("SELECT dep.UUIDD0,dep.UUIDD1,dep.UUIDD2,dep.UUIDD3");
        if loadmode != LoadMode::UuidOnly {
            sql.push_str(",obj.DATA,obj.MODIFIED");
        }
        sql.push_str(" FROM dep");
        if loadmode != LoadMode::UuidOnly || filter.is_restricted() {
            sql.push_str(
                " INNER JOIN obj ON dep.UUIDD0 = obj.UUID0 AND dep.UUIDD1 = obj.UUID1 \
                 AND dep.UUIDD2 = obj.UUID2 AND dep.UUIDD3 = obj.UUID3",
            );
        }
        sql.push_str(" WHERE dep.UUID0=?1 AND dep.UUID1=?2 AND dep.UUID2=?3 AND dep.UUID3=?4");
        let words = uuid_words(uuid);
        let mut params: Vec<rusqlite::types::Value> = words.iter().map(|&w| w.into()).collect();
        Self::push_filter(&mut sql, &mut params, filter, "AND");
        Self::push_limit(&mut sql, &mut params, filter);
        self.run_find(&sql, params, loadmode)
    }

    /// Dependency pairs whose target changed at or after `tmod`.
    pub fn find_modifiedafter(&self, tmod: Timestamp) -> Result<Vec<(Uuid, Uuid)>> {
        let mut stmt = self.conn.prepare(
            "SELECT dep.UUID0,dep.UUID1,dep.UUID2,dep.UUID3,\
             dep.UUIDD0,dep.UUIDD1,dep.UUIDD2,dep.UUIDD3 \
             FROM dep INNER JOIN obj ON \
             dep.UUIDD0 = obj.UUID0 AND dep.UUIDD1 = obj.UUID1 AND \
             dep.UUIDD2 = obj.UUID2 AND dep.UUIDD3 = obj.UUID3 \
             WHERE obj.MODIFIED >= ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![clamp_time(tmod)])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push((row_uuid(row, 0)?, row_uuid(row, 4)?));
        }
        Ok(out)
    }

    /////////////////////////////////////////////////////////////////////
    // Temporary mirror tables
    /////////////////////////////////////////////////////////////////////

    fn open_temp(&mut self) -> Result<()> {
        if self.temp_tables {
            return Ok(());
        }
        self.conn.execute_batch(TEMP_SCHEMA).map_err(Error::Schema)?;
        self.temp_tables = true;
        Ok(())
    }

    /// Persists into the scratch tables; the cache is not touched.
    pub fn save_temp(&mut self, obj: &Arc<Object>) -> Result<()> {
        self.open_temp()?;
        let blob = obj.encode()?;
        let words = uuid_words(obj.uuid());
        let deps = obj.dependencies();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO tmpobj (UUID0,UUID1,UUID2,UUID3,MODIFIED,DATA) \
             VALUES (?1,?2,?3,?4,?5,?6)",
            rusqlite::params![
                words[0],
                words[1],
                words[2],
                words[3],
                clamp_time(obj.modified()),
                blob
            ],
        )?;
        tx.execute(
            "DELETE FROM tmpdep WHERE UUID0=?1 AND UUID1=?2 AND UUID2=?3 AND UUID3=?4",
            rusqlite::params![words[0], words[1], words[2], words[3]],
        )?;
        for dep in deps.iter() {
            if dep.is_nil() {
                continue;
            }
            let dw = uuid_words(dep.uuid());
            tx.execute(
                "INSERT INTO tmpdep (UUID0,UUID1,UUID2,UUID3,UUIDD0,UUIDD1,UUIDD2,UUIDD3) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
                rusqlite::params![
                    words[0], words[1], words[2], words[3], dw[0], dw[1], dw[2], dw[3]
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_temp(&self, uuid: &Uuid) -> Result<Option<Object>> {
        if !self.temp_tables {
            return Ok(None);
        }
        let words = uuid_words(uuid);
        let mut stmt = self.conn.prepare(
            "SELECT DATA,MODIFIED FROM tmpobj WHERE UUID0=?1 AND UUID1=?2 AND UUID2=?3 AND UUID3=?4",
        )?;
        let mut rows = stmt.query(rusqlite::params![words[0], words[1], words[2], words[3]])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let blob: Vec<u8> = row.get(0)?;
        let modified: i64 = row.get(1)?;
        let mut obj = Object::decode(*uuid, &blob)?;
        obj.set_modified(modified as u64);
        Ok(Some(obj))
    }

    pub fn find_all_temp(&self) -> Result<Vec<Uuid>> {
        if !self.temp_tables {
            return Ok(Vec::new());
        }
        let mut stmt = self
            .conn
            .prepare("SELECT UUID0,UUID1,UUID2,UUID3 FROM tmpobj")?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_uuid(row, 0)?);
        }
        Ok(out)
    }

    /////////////////////////////////////////////////////////////////////
    // Maintenance
    /////////////////////////////////////////////////////////////////////

    pub fn analyze(&self) -> Result<()> {
        self.conn.execute_batch("ANALYZE;")?;
        Ok(())
    }

    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }

    pub fn sync_off(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA synchronous = OFF;")?;
        Ok(())
    }

    pub fn set_wal(&self, wal: bool) -> Result<()> {
        self.conn.execute_batch(if wal {
            "PRAGMA journal_mode=WAL;"
        } else {
            "PRAGMA journal_mode=DELETE;"
        })?;
        Ok(())
    }

    pub fn set_exclusive(&self, excl: bool) -> Result<()> {
        self.conn.execute_batch(if excl {
            "PRAGMA locking_mode=EXCLUSIVE;"
        } else {
            "PRAGMA locking_mode=NORMAL;"
        })?;
        Ok(())
    }

    /// Materialises the transitive closure of `dep` into `deptc` by
    /// fixed-point iteration.
    pub fn create_transitive_closure(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "DROP INDEX IF EXISTS deptc_uuid;\
             DROP INDEX IF EXISTS deptc_uuidd;\
             DROP TABLE IF EXISTS deptc;\
             CREATE TABLE deptc (UUID0 INTEGER NOT NULL, UUID1 INTEGER NOT NULL,\
             UUID2 INTEGER NOT NULL, UUID3 INTEGER NOT NULL,\
             UUIDD0 INTEGER NOT NULL, UUIDD1 INTEGER NOT NULL,\
             UUIDD2 INTEGER NOT NULL, UUIDD3 INTEGER NOT NULL,\
             UNIQUE(UUID0,UUID1,UUID2,UUID3,UUIDD0,UUIDD1,UUIDD2,UUIDD3));\
             CREATE INDEX deptc_uuid ON deptc(UUID0,UUID1,UUID2,UUID3);\
             CREATE INDEX deptc_uuidd ON deptc(UUIDD0,UUIDD1,UUIDD2,UUIDD3);\
             INSERT OR IGNORE INTO deptc SELECT * FROM dep;",
        )?;
        let mut count: i64 = tx.query_row("SELECT COUNT(*) FROM deptc", [], |r| r.get(0))?;
        loop {
            tx.execute(
                "INSERT OR IGNORE INTO deptc (UUID0,UUID1,UUID2,UUID3,UUIDD0,UUIDD1,UUIDD2,UUIDD3) \
                 SELECT P.UUID0,P.UUID1,P.UUID2,P.UUID3,C.UUIDD0,C.UUIDD1,C.UUIDD2,C.UUIDD3 \
                 FROM deptc AS P JOIN deptc AS C \
                 ON P.UUIDD0=C.UUID0 AND P.UUIDD1=C.UUID1 AND P.UUIDD2=C.UUID2 AND P.UUIDD3=C.UUID3",
                [],
            )?;
            let count1: i64 = tx.query_row("SELECT COUNT(*) FROM deptc", [], |r| r.get(0))?;
            if count1 == count {
                break;
            }
            count = count1;
        }
        tx.commit()?;
        debug!("transitive closure: {count} row(s)");
        Ok(())
    }

    pub fn delete_transitive_closure(&mut self) -> Result<()> {
        self.conn.execute_batch(
            "DROP INDEX IF EXISTS deptc_uuid;\
             DROP INDEX IF EXISTS deptc_uuidd;\
             DROP TABLE IF EXISTS deptc;",
        )?;
        Ok(())
    }

    /////////////////////////////////////////////////////////////////////
    // Precomputed directs
    /////////////////////////////////////////////////////////////////////

    pub fn count_dct(&self) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM dct", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn drop_dct_indices(&self) -> Result<()> {
        self.conn
            .execute_batch("DROP INDEX IF EXISTS dct_uuida; DROP INDEX IF EXISTS dct_uuidb;")?;
        Ok(())
    }

    pub fn create_dct_indices(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS dct_uuida ON dct(UUIDA0,UUIDA1,UUIDA2,UUIDA3);\
             CREATE INDEX IF NOT EXISTS dct_uuidb ON dct(UUIDB0,UUIDB1,UUIDB2,UUIDB3);",
        )?;
        Ok(())
    }

    pub(crate) fn begin_dct_batch(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    pub(crate) fn commit_dct_batch(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    /// Upserts a direct leg. An empty leg deletes the stale row instead
    /// of writing a fresh one.
    pub fn save_dct(&self, leg: &DctLeg) -> Result<()> {
        if leg.uuid(0).is_nil() || leg.uuid(1).is_nil() {
            return Ok(());
        }
        let wa = uuid_words(leg.uuid(0));
        let wb = uuid_words(leg.uuid(1));
        self.conn.execute(
            "DELETE FROM dct WHERE UUIDA0=?1 AND UUIDA1=?2 AND UUIDA2=?3 AND UUIDA3=?4 \
             AND UUIDB0=?5 AND UUIDB1=?6 AND UUIDB2=?7 AND UUIDB3=?8",
            rusqlite::params![wa[0], wa[1], wa[2], wa[3], wb[0], wb[1], wb[2], wb[3]],
        )?;
        if leg.is_empty() {
            return Ok(());
        }
        let blob = leg.encode()?;
        let bbox = leg.bbox();
        self.conn.execute(
            "INSERT OR REPLACE INTO dct \
             (UUIDA0,UUIDA1,UUIDA2,UUIDA3,UUIDB0,UUIDB1,UUIDB2,UUIDB3,\
             SWLAT,NELAT,SWLON,NELON,DATA) \
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
            rusqlite::params![
                wa[0],
                wa[1],
                wa[2],
                wa[3],
                wb[0],
                wb[1],
                wb[2],
                wb[3],
                i64::from(bbox.south()),
                i64::from(bbox.north()),
                i64::from(bbox.west()),
                bbox.east_unwrapped(),
                blob,
            ],
        )?;
        Ok(())
    }

    fn dct_rows(&self, sql: &str, params: Vec<rusqlite::types::Value>) -> Result<Vec<DctLeg>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params))?;
        let mut pending = Vec::new();
        while let Some(row) = rows.next()? {
            let a = row_uuid(row, 0)?;
            let b = row_uuid(row, 4)?;
            let blob: Vec<u8> = row.get(8)?;
            pending.push((a, b, blob));
        }
        drop(rows);
        drop(stmt);
        let mut out = Vec::with_capacity(pending.len());
        for (a, b, blob) in pending {
            let mut pa = Link::new(a);
            let mut pb = Link::new(b);
            if let Some(obj) = self.load(&a)? {
                pa.set_obj(Some(obj));
            }
            if let Some(obj) = self.load(&b)? {
                pb.set_obj(Some(obj));
            }
            out.push(DctLeg::decode(pa, pb, &blob)?);
        }
        Ok(out)
    }

    /// Precomputed legs touching the identified point.
    pub fn find_dct_by_uuid(&self, uuid: &Uuid) -> Result<Vec<DctLeg>> {
        let words = uuid_words(uuid);
        let params: Vec<rusqlite::types::Value> =
            words.iter().map(|&w| rusqlite::types::Value::from(w)).collect();
        self.dct_rows(
            "SELECT UUIDA0,UUIDA1,UUIDA2,UUIDA3,UUIDB0,UUIDB1,UUIDB2,UUIDB3,DATA FROM dct \
             WHERE (UUIDA0=?1 AND UUIDA1=?2 AND UUIDA2=?3 AND UUIDA3=?4) OR \
             (UUIDB0=?1 AND UUIDB1=?2 AND UUIDB2=?3 AND UUIDB3=?4)",
            params,
        )
    }

    /// Precomputed legs whose bounding box intersects `bbox`.
    pub fn find_dct_by_bbox(&self, bbox: &Rect) -> Result<Vec<DctLeg>> {
        let params: Vec<rusqlite::types::Value> = vec![
            i64::from(bbox.west()).into(),
            i64::from(bbox.south()).into(),
            bbox.east_unwrapped().into(),
            i64::from(bbox.north()).into(),
        ];
        self.dct_rows(
            "SELECT UUIDA0,UUIDA1,UUIDA2,UUIDA3,UUIDB0,UUIDB1,UUIDB2,UUIDB3,DATA FROM dct \
             WHERE (NELAT >= ?2 AND SWLAT <= ?4) \
             AND ((SWLON <= ?3-4294967296 AND NELON >= ?1-4294967296) OR \
             (SWLON <= ?3 AND NELON >= ?1) OR \
             (SWLON <= ?3+4294967296 AND NELON >= ?1+4294967296))",
            params,
        )
    }

    /// Deletes directs whose endpoints no longer exist.
    pub fn erase_unref_dct(&self) -> Result<usize> {
        let n = self.conn.execute(
            "DELETE FROM dct WHERE NOT EXISTS \
             (SELECT 1 FROM obj AS A WHERE A.UUID0=dct.UUIDA0 AND A.UUID1=dct.UUIDA1 \
             AND A.UUID2=dct.UUIDA2 AND A.UUID3=dct.UUIDA3) \
             OR NOT EXISTS \
             (SELECT 1 FROM obj AS B WHERE B.UUID0=dct.UUIDB0 AND B.UUID1=dct.UUIDB1 \
             AND B.UUID2=dct.UUIDB2 AND B.UUID3=dct.UUIDB3)",
            [],
        )?;
        Ok(n)
    }

    /////////////////////////////////////////////////////////////////////
    // Snapshot
    /////////////////////////////////////////////////////////////////////

    /// Writes the read-only snapshot mirror of `obj` to `path`.
    pub fn write_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        crate::snapshot::write_snapshot(&self.conn, path.as_ref())
    }
}

/// Escapes `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(s: &str, escape: char) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '%' || c == '_' || c == escape {
            out.push(escape);
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_quotes_metacharacters() {
        assert_eq!(escape_like("A_B%C!D", '!'), "A!_B!%C!!D");
        assert_eq!(escape_like("LSGG", '!'), "LSGG");
    }
}
