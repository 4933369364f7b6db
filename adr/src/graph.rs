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

//! The route graph.
//!
//! Built for a single instant: one vertex per point object, one directed
//! edge per usable direction of every airway segment or procedure leg
//! valid at that instant. Edges carry the available altitude band and the
//! geodesic length, which is also the weight of the shortest-path
//! queries.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::{EdgeFiltered, EdgeRef};

use crate::eval::{ConditionalAvailability, PathCode};
use crate::geom::{Coord, Rect};
use crate::id::Uuid;
use crate::interval::IntervalSet;
use crate::model::{Object, ObjectKind, SlicePayload};
use crate::timetable::{TimeTable, TimeTableEval, Timestamp};

/// A point object in the graph.
#[derive(Clone, Debug)]
pub struct GraphVertex {
    pub object: Arc<Object>,
    pub ident: String,
    pub coord: Coord,
}

/// One usable direction of a segment.
#[derive(Clone, Debug)]
pub struct GraphEdge {
    pub object: Arc<Object>,
    /// The route, SID or STAR the segment belongs to.
    pub path: Uuid,
    pub pathcode: PathCode,
    pub dist_nm: f64,
    pub band: IntervalSet<i32>,
    /// True for the direction against the segment.
    pub backward: bool,
    pub timetable: TimeTable,
}

/// Directed multigraph of points and airway/SID/STAR edges valid at one
/// instant.
pub struct RouteGraph {
    time: Timestamp,
    graph: DiGraph<GraphVertex, GraphEdge>,
    by_uuid: HashMap<Uuid, NodeIndex>,
}

impl RouteGraph {
    pub fn new(time: Timestamp) -> Self {
        Self {
            time,
            graph: DiGraph::new(),
            by_uuid: HashMap::new(),
        }
    }

    pub fn time(&self) -> Timestamp {
        self.time
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertex(&self, idx: NodeIndex) -> &GraphVertex {
        &self.graph[idx]
    }

    pub fn find_vertex(&self, uuid: &Uuid) -> Option<NodeIndex> {
        self.by_uuid.get(uuid).copied()
    }

    /// The edge from `u` to `v` belonging to the identified path.
    pub fn find_edge(&self, u: NodeIndex, v: NodeIndex, path: &Uuid) -> Option<EdgeIndex> {
        self.graph
            .edges_connecting(u, v)
            .find(|e| e.weight().path == *path)
            .map(|e| e.id())
    }

    fn ensure_vertex(&mut self, obj: &Arc<Object>) -> Option<NodeIndex> {
        if let Some(&idx) = self.by_uuid.get(obj.uuid()) {
            return Some(idx);
        }
        let slice = obj.slice_at(self.time)?;
        let coord = slice.payload().coord()?;
        if coord.is_invalid() {
            return None;
        }
        let ident = slice.payload().ident().unwrap_or_default().to_string();
        let idx = self.graph.add_node(GraphVertex {
            object: obj.clone(),
            ident,
            coord,
        });
        self.by_uuid.insert(*obj.uuid(), idx);
        Some(idx)
    }

    /// Adds an object to the graph: points become vertices, segments and
    /// legs become one edge per usable direction. Returns the number of
    /// edges added.
    pub fn add(&mut self, obj: Arc<Object>) -> usize {
        match obj.kind() {
            ObjectKind::Airport | ObjectKind::Navaid | ObjectKind::DesignatedPoint => {
                self.ensure_vertex(&obj);
                0
            }
            ObjectKind::RouteSegment | ObjectKind::DepartureLeg | ObjectKind::ArrivalLeg => {
                self.add_segment(obj)
            }
            _ => 0,
        }
    }

    fn add_segment(&mut self, obj: Arc<Object>) -> usize {
        let Some(slice) = obj.slice_at(self.time) else {
            return 0;
        };
        let Some(core) = slice.payload().segment_core() else {
            return 0;
        };
        let (Some(start), Some(end)) = (core.start.obj().cloned(), core.end.obj().cloned())
        else {
            trace!("segment {} has unresolved endpoints", obj.uuid());
            return 0;
        };
        let (Some(u), Some(v)) = (self.ensure_vertex(&start), self.ensure_vertex(&end)) else {
            return 0;
        };
        let path = *core.route.uuid();
        let pathcode = match obj.kind() {
            ObjectKind::DepartureLeg => PathCode::Sid,
            ObjectKind::ArrivalLeg => PathCode::Star,
            _ => PathCode::Airway,
        };
        let dist_nm = self.graph[u].coord.dist_nm(&self.graph[v].coord);
        let mut added = 0;
        match slice.payload() {
            SlicePayload::RouteSegment(seg) => {
                for avail in &seg.availability {
                    if !avail.is_usable() {
                        continue;
                    }
                    let band = avail.altrange.interval(true);
                    if band.is_empty() {
                        continue;
                    }
                    let (from, to) = if avail.backward { (v, u) } else { (u, v) };
                    self.graph.add_edge(
                        from,
                        to,
                        GraphEdge {
                            object: obj.clone(),
                            path,
                            pathcode,
                            dist_nm,
                            band,
                            backward: avail.backward,
                            timetable: avail.timetable.clone(),
                        },
                    );
                    added += 1;
                }
            }
            _ => {
                // procedure legs are one-way along the leg
                let band = core.altrange.interval(true);
                self.graph.add_edge(
                    u,
                    v,
                    GraphEdge {
                        object: obj.clone(),
                        path,
                        pathcode,
                        dist_nm,
                        band,
                        backward: false,
                        timetable: TimeTable::always(),
                    },
                );
                added += 1;
            }
        }
        added
    }

    fn edge_active(&self, edge: &GraphEdge, t: Timestamp) -> bool {
        edge.timetable.is_never()
            || edge
                .timetable
                .is_inside(&TimeTableEval::new(t, Coord::INVALID))
    }

    /// Shortest path by geodesic distance through edges whose band
    /// touches `band`, active at `t`, inside `bbox`.
    ///
    /// Returns the total distance and the vertex path.
    pub fn shortest_path(
        &self,
        from: NodeIndex,
        to: NodeIndex,
        band: &IntervalSet<i32>,
        bbox: &Rect,
        t: Timestamp,
    ) -> Option<(f64, Vec<NodeIndex>)> {
        let filter = |e: petgraph::graph::EdgeReference<'_, GraphEdge>| {
            let w = e.weight();
            if !self.edge_active(w, t) {
                return false;
            }
            {
                let mut b = w.band.clone();
                b &= band;
                if b.is_empty() {
                    return false;
                }
            }
            if !bbox.is_invalid() {
                let src = self.graph[e.source()].coord;
                let dst = self.graph[e.target()].coord;
                if !bbox.is_inside(src) || !bbox.is_inside(dst) {
                    return false;
                }
            }
            true
        };
        let fg = EdgeFiltered::from_fn(&self.graph, filter);
        petgraph::algo::astar(&fg, from, |n| n == to, |e| e.weight().dist_nm, |_| 0.0)
    }

    /// Union of the altitude bands of all usable edges from `u` to `v`.
    pub fn band_between(&self, u: NodeIndex, v: NodeIndex, t: Timestamp) -> IntervalSet<i32> {
        let mut band = IntervalSet::empty();
        for e in self.graph.edges_connecting(u, v) {
            if self.edge_active(e.weight(), t) {
                band |= &e.weight().band;
            }
        }
        band
    }

    /// The altitude band actually available along the identified airway
    /// between two points, honouring conditional route activation.
    pub fn airway_band(
        &self,
        from: &Uuid,
        to: &Uuid,
        airway: &Uuid,
        t: Timestamp,
        condavail: &ConditionalAvailability,
    ) -> Option<IntervalSet<i32>> {
        let from = self.find_vertex(from)?;
        let to = self.find_vertex(to)?;
        let filter = |e: petgraph::graph::EdgeReference<'_, GraphEdge>| {
            e.weight().path == *airway && self.edge_active(e.weight(), t)
        };
        let fg = EdgeFiltered::from_fn(&self.graph, filter);
        let (_, path) =
            petgraph::algo::astar(&fg, from, |n| n == to, |e| e.weight().dist_nm, |_| 0.0)?;
        let mut band = IntervalSet::full();
        for hop in path.windows(2) {
            let mut hop_band = IntervalSet::empty();
            for e in self.graph.edges_connecting(hop[0], hop[1]) {
                let w = e.weight();
                if w.path != *airway || !self.edge_active(w, t) {
                    continue;
                }
                // a conditionally open segment needs an activation window
                let usable = match segment_conditional(&w.object, self.time, w.backward) {
                    Some(true) => condavail.is_active(w.object.uuid(), t),
                    _ => true,
                };
                if usable {
                    hop_band |= &w.band;
                }
            }
            band &= &hop_band;
            if band.is_empty() {
                return Some(band);
            }
        }
        Some(band)
    }
}

/// Whether the segment's usable availability in the given direction is
/// conditional (AUP-activated).
fn segment_conditional(obj: &Arc<Object>, t: Timestamp, backward: bool) -> Option<bool> {
    let seg = obj.slice_at(t)?.payload().as_route_segment()?;
    let mut conditional = false;
    for avail in &seg.availability {
        if avail.backward != backward || !avail.is_usable() {
            continue;
        }
        conditional |= matches!(
            avail.status,
            crate::model::AvailabilityStatus::Conditional
        );
    }
    Some(conditional)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::altrange::{AltMode, AltRange};
    use crate::id::Link;
    use crate::model::{
        AvailabilityStatus, DesignatedPointSlice, RouteSegmentSlice, RouteSlice,
        SegmentAvailability, TimeSlice,
    };

    fn point(uuid: &str, ident: &str, lat: f64, lon: f64) -> Arc<Object> {
        let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::DesignatedPoint);
        obj.add_slice(TimeSlice::new(
            0,
            u64::MAX,
            SlicePayload::DesignatedPoint(DesignatedPointSlice {
                ident: ident.into(),
                coord: Coord::from_deg(lat, lon),
                point_type: crate::model::DesignatedPointType::Icao,
                ..Default::default()
            }),
        ))
        .unwrap();
        Arc::new(obj)
    }

    fn route(uuid: &str, ident: &str) -> Arc<Object> {
        let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::Route);
        obj.add_slice(TimeSlice::new(
            0,
            u64::MAX,
            SlicePayload::Route(RouteSlice {
                ident: ident.into(),
            }),
        ))
        .unwrap();
        Arc::new(obj)
    }

    fn segment(
        uuid: &str,
        start: &Arc<Object>,
        end: &Arc<Object>,
        awy: &Arc<Object>,
        forward: Option<(i32, i32)>,
        backward: Option<(i32, i32)>,
    ) -> Arc<Object> {
        let mut avail = Vec::new();
        for (dir, range) in [(false, forward), (true, backward)] {
            if let Some((lo, hi)) = range {
                avail.push(SegmentAvailability {
                    altrange: AltRange::new(lo, AltMode::Std, hi, AltMode::Std),
                    status: AvailabilityStatus::Open,
                    backward: dir,
                    timetable: TimeTable::always(),
                    levels: Link::default(),
                });
            }
        }
        let mut obj = Object::new(uuid.parse().unwrap(), ObjectKind::RouteSegment);
        obj.add_slice(TimeSlice::new(
            0,
            u64::MAX,
            SlicePayload::RouteSegment(RouteSegmentSlice {
                core: crate::model::SegmentCore {
                    start: Link::resolved(start.clone()),
                    end: Link::resolved(end.clone()),
                    route: Link::resolved(awy.clone()),
                    ..Default::default()
                },
                availability: avail,
                levels: Vec::new(),
            }),
        ))
        .unwrap();
        Arc::new(obj)
    }

    #[test]
    fn graph_builds_directed_edges() {
        let a = point("11111111-1111-1111-1111-111111111111", "AAA", 46.0, 6.0);
        let b = point("22222222-2222-2222-2222-222222222222", "BBB", 46.5, 6.5);
        let awy = route("33333333-3333-3333-3333-333333333333", "UR150");
        let seg = segment(
            "44444444-4444-4444-4444-444444444444",
            &a,
            &b,
            &awy,
            Some((6000, 24500)),
            None,
        );
        let mut g = RouteGraph::new(1000);
        g.add(seg);
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.edge_count(), 1);
        let u = g.find_vertex(a.uuid()).unwrap();
        let v = g.find_vertex(b.uuid()).unwrap();
        assert!(g.find_edge(u, v, awy.uuid()).is_some());
        assert!(g.find_edge(v, u, awy.uuid()).is_none());
    }

    #[test]
    fn shortest_path_respects_band() {
        let a = point("11111111-1111-1111-1111-111111111111", "AAA", 46.0, 6.0);
        let b = point("22222222-2222-2222-2222-222222222222", "BBB", 46.5, 6.5);
        let c = point("55555555-5555-5555-5555-555555555555", "CCC", 47.0, 7.0);
        let awy = route("33333333-3333-3333-3333-333333333333", "UR150");
        let mut g = RouteGraph::new(1000);
        g.add(segment(
            "44444444-4444-4444-4444-444444444444",
            &a,
            &b,
            &awy,
            Some((6000, 24500)),
            None,
        ));
        g.add(segment(
            "66666666-6666-6666-6666-666666666666",
            &b,
            &c,
            &awy,
            Some((10000, 24500)),
            None,
        ));
        let u = g.find_vertex(a.uuid()).unwrap();
        let w = g.find_vertex(c.uuid()).unwrap();
        let low = IntervalSet::from_interval(crate::interval::Interval::new(6000, 9000));
        assert!(g
            .shortest_path(u, w, &low, &Rect::INVALID, 1000)
            .is_none());
        let high = IntervalSet::from_interval(crate::interval::Interval::new(11000, 12000));
        let (dist, path) = g
            .shortest_path(u, w, &high, &Rect::INVALID, 1000)
            .unwrap();
        assert_eq!(path.len(), 3);
        assert!(dist > 0.0);
    }

    #[test]
    fn airway_band_intersects_hops() {
        let a = point("11111111-1111-1111-1111-111111111111", "AAA", 46.0, 6.0);
        let b = point("22222222-2222-2222-2222-222222222222", "BBB", 46.5, 6.5);
        let c = point("55555555-5555-5555-5555-555555555555", "CCC", 47.0, 7.0);
        let awy = route("33333333-3333-3333-3333-333333333333", "UR150");
        let mut g = RouteGraph::new(1000);
        g.add(segment(
            "44444444-4444-4444-4444-444444444444",
            &a,
            &b,
            &awy,
            Some((6000, 24500)),
            None,
        ));
        g.add(segment(
            "66666666-6666-6666-6666-666666666666",
            &b,
            &c,
            &awy,
            Some((10000, 30000)),
            None,
        ));
        let band = g
            .airway_band(
                a.uuid(),
                c.uuid(),
                awy.uuid(),
                1000,
                &ConditionalAvailability::default(),
            )
            .unwrap();
        assert!(band.contains(12000));
        assert!(!band.contains(7000));
        assert!(!band.contains(26000));
    }
}
