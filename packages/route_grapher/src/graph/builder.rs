//! Builds a directed petgraph graph from one or more segmented routes. Node
//! identity is derived from coordinates, so routes which pass through the
//! same point share a node and the graphs merge without any extra work.

use geo::{Distance, Haversine, Point};
use log::{info, warn};
use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction, Graph};
use rustc_hash::FxHashMap;

use crate::common::config::SegmentDefaults;
use crate::common::error::EngineResult;
use crate::common::geometry::Coordinate;
use crate::common::graph_data::{RouteNode, Segment, WayTags};
use crate::processing::route::SegmentedRoute;

/// A directed graph of route nodes, with a lookup from node id to the index
/// of the node in the graph. Edges are kept in the order they were first
/// inserted.
#[derive(Debug, Clone, Default)]
pub struct RouteGraph {
    pub(crate) graph: Graph<RouteNode, Segment, Directed, u32>,
    index: FxHashMap<String, NodeIndex>,
}

impl RouteGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node(&self, id: &str) -> Option<&RouteNode> {
        self.index.get(id).map(|inx| &self.graph[*inx])
    }

    pub(crate) fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Retrieve the segment running from source to destination, if any
    pub fn segment(
        &self,
        source: &str,
        destination: &str,
    ) -> Option<&Segment> {
        let src = self.node_index(source)?;
        let dst = self.node_index(destination)?;
        self.graph
            .find_edge(src, dst)
            .map(|edge| &self.graph[edge])
    }

    /// Set the congestion level of every edge leaving a node. Returns the
    /// number of edges updated.
    pub(crate) fn set_outgoing_congestion(
        &mut self,
        id: &str,
        level: u8,
    ) -> usize {
        let inx = match self.node_index(id) {
            Some(inx) => inx,
            None => return 0,
        };

        let edges: Vec<EdgeIndex> = self
            .graph
            .edges_directed(inx, Direction::Outgoing)
            .map(|eref| eref.id())
            .collect();

        for edge in edges.iter() {
            self.graph[*edge].congestion = Some(level);
        }

        edges.len()
    }

    /// All nodes, in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &RouteNode> {
        self.graph.node_weights()
    }

    /// All edges as (source id, destination id, segment), in insertion order
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &Segment)> {
        self.graph.edge_references().map(|eref| {
            (
                self.graph[eref.source()].id.as_str(),
                self.graph[eref.target()].id.as_str(),
                eref.weight(),
            )
        })
    }

    /// The edge into `node` which was inserted first, if it has any
    pub(crate) fn first_incoming(&self, node: NodeIndex) -> Option<EdgeIndex> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|eref| eref.id())
            .min()
    }

    /// The edge out of `node` which was inserted first, if it has any
    pub(crate) fn first_outgoing(&self, node: NodeIndex) -> Option<EdgeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|eref| eref.id())
            .min()
    }

    /// Find the node closest to the provided coordinate, provided it lies
    /// within `max_distance` metres
    pub fn nearest_node(
        &self,
        coord: &Coordinate,
        max_distance: f64,
    ) -> Option<&RouteNode> {
        let target: Point = (*coord).into();

        let mut smallest_dist = f64::MAX;
        let mut closest: Option<&RouteNode> = None;

        for node in self.graph.node_weights() {
            let node_coords: Point = (node.lon, node.lat).into();
            let dist = Haversine::distance(target, node_coords);

            if dist < smallest_dist {
                smallest_dist = dist;
                closest = Some(node);
            }
        }

        match smallest_dist <= max_distance {
            true => closest,
            false => None,
        }
    }
}

/// Assigns node ids and accumulates routes into a single RouteGraph. One
/// builder corresponds to one graph-building session; ids are not stable
/// across builders.
#[derive(Debug, Clone)]
pub struct RouteGraphBuilder {
    graph: RouteGraph,
    node_ids: FxHashMap<String, String>,
    next_id: u64,
    defaults: SegmentDefaults,
}

impl RouteGraphBuilder {
    pub fn new(defaults: SegmentDefaults) -> Self {
        RouteGraphBuilder {
            graph: RouteGraph::default(),
            node_ids: FxHashMap::default(),
            next_id: 0,
            defaults,
        }
    }

    /// Return the id for a coordinate, assigning the next sequential id the
    /// first time the coordinate is seen
    pub fn node_id(&mut self, coord: &Coordinate) -> String {
        let key = coord.key();
        if let Some(id) = self.node_ids.get(&key) {
            return id.clone();
        }

        let id = self.next_id.to_string();
        self.next_id += 1;
        self.node_ids.insert(key, id.clone());
        id
    }

    /// Return the id previously assigned to a coordinate, without assigning
    /// a new one
    pub fn resolve(&self, coord: &Coordinate) -> Option<&str> {
        self.node_ids.get(&coord.key()).map(|id| id.as_str())
    }

    /// Add a node to the graph. If a node with the same id already exists
    /// it is kept as it is.
    pub fn add_node(&mut self, node: RouteNode) {
        if self.graph.index.contains_key(&node.id) {
            return;
        }
        let id = node.id.clone();
        let inx = self.graph.graph.add_node(node);
        self.graph.index.insert(id, inx);
    }

    /// Add an edge between two existing nodes, replacing the segment if the
    /// edge is already present. Returns false if either node is missing.
    pub fn add_edge(
        &mut self,
        source: &str,
        destination: &str,
        segment: Segment,
    ) -> bool {
        let maybe_src = self.graph.node_index(source);
        let src_inx = match maybe_src {
            Some(src_inx) => src_inx,
            None => return false,
        };

        let maybe_dst = self.graph.node_index(destination);
        let dst_inx = match maybe_dst {
            Some(dst_inx) => dst_inx,
            None => return false,
        };

        self.graph.graph.update_edge(src_inx, dst_inx, segment);
        true
    }

    /// Build the segment for one stretch of a route, with any tags which
    /// were not retrieved set to their sentinel
    fn build_segment(
        &self,
        distance: f64,
        slope: f64,
        max_speed: f64,
        tags: Option<&WayTags>,
    ) -> Segment {
        let mut segment =
            Segment::with_defaults(distance, slope, &self.defaults);
        segment.max_speed = max_speed;

        if let Some(tags) = tags {
            if let Some(lanes) = tags.lanes {
                segment.lanes = lanes;
            }
            if let Some(highway) = &tags.highway {
                segment.highway = highway.clone();
            }
            if let Some(name) = &tags.name {
                segment.name = name.clone();
            }
            if let Some(surface) = &tags.surface {
                segment.surface = surface.clone();
            }
            if let Some(way_id) = &tags.way_id {
                segment.way_id = way_id.clone();
            }
        }

        segment
    }

    /// Add every stretch of a segmented route to the graph. Returns the
    /// number of edges written, or an error without touching the graph if
    /// the route's series are misaligned.
    pub fn ingest_route(
        &mut self,
        route: &SegmentedRoute,
    ) -> EngineResult<usize> {
        route.check_aligned()?;
        let mut written = 0;

        for (inx, pair) in route.segments.windows(2).enumerate() {
            let src_id = self.node_id(&pair[0]);
            let dst_id = self.node_id(&pair[1]);

            self.add_node(RouteNode {
                id: src_id.clone(),
                lat: pair[0].lat,
                lon: pair[0].lon,
                height: route.heights[inx],
            });
            self.add_node(RouteNode {
                id: dst_id.clone(),
                lat: pair[1].lat,
                lon: pair[1].lon,
                height: route.heights[inx + 1],
            });

            if src_id == dst_id {
                warn!("Skipping self-loop at node {}", src_id);
                continue;
            }

            let segment = self.build_segment(
                route.distances[inx],
                route.slopes[inx],
                route.max_speed[inx],
                route.way_tags.get(inx),
            );

            if self.add_edge(&src_id, &dst_id, segment) {
                written += 1;
            }
        }

        info!(
            "Ingested route with {} edges, graph now has {} nodes and {} edges",
            written,
            self.graph.node_count(),
            self.graph.edge_count()
        );

        Ok(written)
    }

    pub fn graph(&self) -> &RouteGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RouteGraph {
        &mut self.graph
    }

    pub fn into_graph(self) -> RouteGraph {
        self.graph
    }
}
