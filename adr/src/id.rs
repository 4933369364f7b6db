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

//! Object identifiers and symbolic references.
//!
//! Objects reference each other by UUID only, so the link graph may
//! legitimately contain cycles. A [`Link`] optionally carries a strong
//! handle to the referenced object once resolved; the handle is a lookup
//! shortcut, never a lifetime claim, and the store cache remains the
//! single authority for object identity.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::model::Object;

/// A 128-bit object identifier.
///
/// Compared byte-lexicographically; exposed to the SQL schema as four
/// little-endian 32-bit words.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Uuid([u8; 16]);

impl Uuid {
    pub const NIL: Uuid = Uuid([0; 16]);

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Builds the identifier from its four little-endian 32-bit words.
    pub fn from_words(w0: u32, w1: u32, w2: u32, w3: u32) -> Self {
        let mut b = [0u8; 16];
        b[0..4].copy_from_slice(&w0.to_le_bytes());
        b[4..8].copy_from_slice(&w1.to_le_bytes());
        b[8..12].copy_from_slice(&w2.to_le_bytes());
        b[12..16].copy_from_slice(&w3.to_le_bytes());
        Self(b)
    }

    /// Deterministic identifier derived from a namespace and a name.
    ///
    /// Importers use this for entities whose source dataset does not carry
    /// a UUID (country borders, synthetic points).
    pub fn from_name(namespace: &Uuid, name: &str) -> Self {
        let ns = uuid::Uuid::from_bytes(namespace.0);
        Self(*uuid::Uuid::new_v5(&ns, name.as_bytes()).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// The `nr`-th little-endian 32-bit word, `nr < 4`.
    pub fn word(&self, nr: usize) -> u32 {
        let i = nr * 4;
        u32::from_le_bytes([self.0[i], self.0[i + 1], self.0[i + 2], self.0[i + 3]])
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }
}

impl FromStr for Uuid {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(*uuid::Uuid::parse_str(s)?.as_bytes()))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        uuid::Uuid::from_bytes(self.0).fmt(f)
    }
}

/// A symbolic reference: UUID plus an optional resolved handle.
///
/// Ordering, equality and hashing consider the UUID only, so resolving a
/// link never changes its position in a set.
#[derive(Clone, Debug, Default)]
pub struct Link {
    uuid: Uuid,
    obj: Option<Arc<Object>>,
}

impl Link {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid, obj: None }
    }

    pub fn resolved(obj: Arc<Object>) -> Self {
        Self {
            uuid: *obj.uuid(),
            obj: Some(obj),
        }
    }

    pub fn uuid(&self) -> &Uuid {
        &self.uuid
    }

    pub fn obj(&self) -> Option<&Arc<Object>> {
        self.obj.as_ref()
    }

    pub fn set_obj(&mut self, obj: Option<Arc<Object>>) {
        self.obj = obj;
    }

    pub fn is_nil(&self) -> bool {
        self.uuid.is_nil()
    }

    /// True iff the link names an object but the handle is not set.
    pub fn is_unresolved(&self) -> bool {
        !self.uuid.is_nil() && self.obj.is_none()
    }
}

impl From<Uuid> for Link {
    fn from(uuid: Uuid) -> Self {
        Self::new(uuid)
    }
}

impl PartialEq for Link {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Link {}

impl PartialOrd for Link {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Link {
    fn cmp(&self, other: &Self) -> Ordering {
        self.uuid.cmp(&other.uuid)
    }
}

impl std::hash::Hash for Link {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.uuid.fmt(f)
    }
}

/// An ordered set of links that remembers whether any member is still
/// unresolved.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct LinkSet {
    links: BTreeSet<Link>,
    unresolved: bool,
}

impl LinkSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, link: Link) -> bool {
        self.unresolved |= link.is_unresolved();
        self.links.insert(link)
    }

    pub fn has_unresolved(&self) -> bool {
        self.unresolved
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.links.contains(&Link::new(*uuid))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Link> {
        self.links.iter()
    }
}

impl IntoIterator for LinkSet {
    type Item = Link;
    type IntoIter = std::collections::btree_set::IntoIter<Link>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_little_endian() {
        let uuid: Uuid = "00112233-4455-6677-8899-aabbccddeeff".parse().unwrap();
        assert_eq!(uuid.word(0), 0x33221100);
        assert_eq!(uuid.word(1), 0x77665544);
        assert_eq!(uuid.word(2), 0xbbaa9988);
        assert_eq!(uuid.word(3), 0xffeeddcc);
        assert_eq!(
            Uuid::from_words(uuid.word(0), uuid.word(1), uuid.word(2), uuid.word(3)),
            uuid
        );
    }

    #[test]
    fn display_round_trip() {
        let s = "b5a42733-da94-4b7f-8282-e013a2fe6466";
        let uuid: Uuid = s.parse().unwrap();
        assert_eq!(uuid.to_string(), s);
    }

    #[test]
    fn name_derivation_is_stable() {
        let ns = Uuid::NIL;
        let a = Uuid::from_name(&ns, "LSGG");
        let b = Uuid::from_name(&ns, "LSGG");
        let c = Uuid::from_name(&ns, "LSZH");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn linkset_tracks_unresolved() {
        let mut set = LinkSet::new();
        set.insert(Link::new("b5a42733-da94-4b7f-8282-e013a2fe6466".parse().unwrap()));
        assert!(set.has_unresolved());
    }
}
