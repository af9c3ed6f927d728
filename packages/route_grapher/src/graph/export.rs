//! Hands the finished graph over to whatever persists it. Node ids act as the
//! upsert key, so writing the same graph twice is harmless.

use serde::Serialize;
use std::convert::Infallible;

use crate::common::graph_data::{RouteNode, Segment};
use crate::graph::builder::RouteGraph;

/// Destination for a finished graph, e.g. a graph database
pub trait GraphSink {
    type Error;

    fn upsert_node(&mut self, node: &RouteNode) -> Result<(), Self::Error>;

    fn upsert_edge(
        &mut self,
        source: &str,
        destination: &str,
        segment: &Segment,
    ) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeExport {
    pub source: String,
    pub destination: String,
    #[serde(flatten)]
    pub segment: Segment,
}

/// In-memory sink, which can be serialised once populated
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<RouteNode>,
    pub edges: Vec<EdgeExport>,
}

impl GraphSink for GraphExport {
    type Error = Infallible;

    fn upsert_node(&mut self, node: &RouteNode) -> Result<(), Self::Error> {
        match self.nodes.iter_mut().find(|existing| existing.id == node.id) {
            Some(existing) => *existing = node.clone(),
            None => self.nodes.push(node.clone()),
        }
        Ok(())
    }

    fn upsert_edge(
        &mut self,
        source: &str,
        destination: &str,
        segment: &Segment,
    ) -> Result<(), Self::Error> {
        let existing = self.edges.iter_mut().find(|edge| {
            edge.source == source && edge.destination == destination
        });
        match existing {
            Some(edge) => edge.segment = segment.clone(),
            None => self.edges.push(EdgeExport {
                source: source.to_string(),
                destination: destination.to_string(),
                segment: segment.clone(),
            }),
        }
        Ok(())
    }
}

impl RouteGraph {
    /// Write every node, then every edge, to the sink in insertion order.
    /// Stops at the first error the sink reports.
    pub fn export<S: GraphSink>(&self, sink: &mut S) -> Result<(), S::Error> {
        for node in self.nodes() {
            sink.upsert_node(node)?;
        }
        for (source, destination, segment) in self.edges() {
            sink.upsert_edge(source, destination, segment)?;
        }
        Ok(())
    }
}
