//! Fills in segment attributes which could not be retrieved for every stretch
//! of road. Categorical attributes (speed limit, lanes, highway, name,
//! surface) are carried forwards from the previous edge, while missing
//! congestion levels are inferred from the edges either side.
//!
//! Edges are visited in the order they were first inserted. For a single
//! route this is the order of travel; when several routes have been merged,
//! each route's edges are visited in turn, in the order the routes were
//! ingested.

use log::{debug, info};
use petgraph::graph::EdgeIndex;

use crate::common::config::SegmentDefaults;
use crate::common::error::{EngineError, EngineResult};
use crate::graph::builder::RouteGraph;

/// Counts of the changes made while enriching a graph
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentSummary {
    /// Edges updated by the initial forward search
    pub bootstrapped_edges: usize,
    /// Categorical attributes filled from the previous edge
    pub filled_fields: usize,
    /// Edges which received a congestion level from their neighbours
    pub congestion_filled: usize,
}

/// Combine the congestion levels either side of an edge
pub fn combine_congestion(
    predecessor: Option<u8>,
    successor: Option<u8>,
) -> Option<u8> {
    match (predecessor, successor) {
        // Floor of the mean
        (Some(pred), Some(succ)) => {
            Some(((pred as u16 + succ as u16) / 2) as u8)
        }
        (Some(pred), None) => Some(pred),
        (None, Some(succ)) => Some(succ),
        (None, None) => None,
    }
}

pub struct GraphEnricher<'a> {
    defaults: &'a SegmentDefaults,
}

impl<'a> GraphEnricher<'a> {
    pub fn new(defaults: &'a SegmentDefaults) -> Self {
        GraphEnricher { defaults }
    }

    /// Run every enrichment step over the graph: the initial forward search,
    /// categorical gap filling, then congestion merging
    pub fn enrich(
        &self,
        graph: &mut RouteGraph,
    ) -> EngineResult<EnrichmentSummary> {
        let bootstrapped_edges = self.bootstrap_first_edge(graph)?;
        let filled_fields = self.fill_defaults(graph);
        let congestion_filled = self.merge_congestion(graph);

        let summary = EnrichmentSummary {
            bootstrapped_edges,
            filled_fields,
            congestion_filled,
        };
        info!("Graph enrichment complete: {:?}", summary);

        Ok(summary)
    }

    /// The first edge has no previous edge to take values from. If it has
    /// no retrieved data at all, walk forwards through first successors
    /// until an edge which does is found, and copy that edge's categorical
    /// attributes onto every edge passed on the way. Returns the number of
    /// edges updated.
    pub fn bootstrap_first_edge(
        &self,
        graph: &mut RouteGraph,
    ) -> EngineResult<usize> {
        let first = match graph.graph.edge_indices().next() {
            Some(first) => first,
            None => return Ok(0),
        };

        if !graph.graph[first].is_all_default(self.defaults) {
            return Ok(0);
        }

        // Every edge can be visited at most once without looping
        let max_steps = graph.edge_count();
        let mut passed: Vec<EdgeIndex> = vec![first];
        let mut current = first;

        let found = loop {
            if passed.len() > max_steps {
                break None;
            }

            let next = graph
                .graph
                .edge_endpoints(current)
                .and_then(|(_, target)| graph.first_outgoing(target));

            match next {
                Some(next)
                    if !graph.graph[next].is_all_default(self.defaults) =>
                {
                    break Some(next);
                }
                Some(next) => {
                    passed.push(next);
                    current = next;
                }
                None => break None,
            }
        };

        let source = match found {
            Some(source) => source,
            None => {
                return Err(EngineError::GapFillExhausted {
                    edge: describe_edge(graph, first),
                    steps: passed.len() - 1,
                });
            }
        };

        let source_segment = graph.graph[source].clone();
        for edge in passed.iter() {
            graph.graph[*edge].copy_categorical(&source_segment);
        }

        debug!(
            "Initial search copied attributes from {} onto {} edges",
            describe_edge(graph, source),
            passed.len()
        );

        Ok(passed.len())
    }

    /// Fill sentinel-valued categorical attributes from the previous edge
    /// in iteration order. Distance, slope, way id and congestion are never
    /// touched. Returns the number of attributes filled.
    pub fn fill_defaults(&self, graph: &mut RouteGraph) -> usize {
        let mut filled = 0;
        let mut previous: Option<EdgeIndex> = None;

        for edge in graph.graph.edge_indices() {
            if let Some(prev) = previous {
                let prev_segment = graph.graph[prev].clone();
                filled += graph.graph[edge]
                    .fill_defaults_from(&prev_segment, self.defaults);
            }
            previous = Some(edge);
        }

        filled
    }

    /// Give every edge without a congestion level one inferred from the
    /// first edge into its source and the first edge out of its target.
    /// Edges are updated in place, so inferred levels carry forwards along
    /// a route. Returns the number of edges updated.
    pub fn merge_congestion(&self, graph: &mut RouteGraph) -> usize {
        let mut filled = 0;

        for edge in graph.graph.edge_indices() {
            if graph.graph[edge].congestion.is_some() {
                continue;
            }

            let (source, target) = match graph.graph.edge_endpoints(edge) {
                Some(endpoints) => endpoints,
                None => continue,
            };

            let predecessor = graph
                .first_incoming(source)
                .and_then(|pred| graph.graph[pred].congestion);
            let successor = graph
                .first_outgoing(target)
                .and_then(|succ| graph.graph[succ].congestion);

            if let Some(level) = combine_congestion(predecessor, successor) {
                graph.graph[edge].congestion = Some(level);
                filled += 1;
            }
        }

        filled
    }
}

fn describe_edge(graph: &RouteGraph, edge: EdgeIndex) -> String {
    match graph.graph.edge_endpoints(edge) {
        Some((src, dst)) => {
            format!("{}->{}", graph.graph[src].id, graph.graph[dst].id)
        }
        None => format!("{:?}", edge),
    }
}
