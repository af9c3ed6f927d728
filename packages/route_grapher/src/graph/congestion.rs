//! Overlays externally sourced congestion data onto the route graph. The
//! dataset arrives as one record per road, with the road's geometry encoded
//! as an R-style `list(c(lon1, lon2, ..., lat1, lat2, ...), ...)` string.
//! Records which can't be understood are skipped, they never stop a run.
//!
//! Requests for that dataset are built here too: congestion is queried
//! around a spread of centre nodes rather than every node in the graph.

use geo::{Distance, Haversine, Point};
use log::{debug, warn};
use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::str::FromStr;

use crate::common::geometry::Coordinate;
use crate::common::graph_data::RouteNode;
use crate::graph::builder::{RouteGraph, RouteGraphBuilder};

/// Traffic congestion, from free flowing to standstill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CongestionLevel {
    Low,
    Moderate,
    Heavy,
    Severe,
}

impl CongestionLevel {
    /// Numeric level stored against graph edges
    pub fn value(&self) -> u8 {
        match self {
            CongestionLevel::Low => 0,
            CongestionLevel::Moderate => 1,
            CongestionLevel::Heavy => 2,
            CongestionLevel::Severe => 3,
        }
    }
}

impl FromStr for CongestionLevel {
    type Err = ();

    fn from_str(input: &str) -> Result<CongestionLevel, Self::Err> {
        match input.trim() {
            "low" => Ok(CongestionLevel::Low),
            "moderate" => Ok(CongestionLevel::Moderate),
            "heavy" => Ok(CongestionLevel::Heavy),
            "severe" => Ok(CongestionLevel::Severe),
            _ => Err(()),
        }
    }
}

impl RouteGraph {
    /// Pick the nodes to request congestion data around. Nodes are visited
    /// in insertion order, each one claiming every node not yet covered
    /// within `radius` metres, and any node which claims something becomes
    /// a centre.
    pub fn congestion_centre_nodes(&self, radius: f64) -> Vec<&RouteNode> {
        let nodes: Vec<&RouteNode> = self.nodes().collect();
        let points: Vec<Point> = nodes
            .iter()
            .map(|node| Point::new(node.lon, node.lat))
            .collect();

        let mut covered = vec![false; nodes.len()];
        let mut centres = Vec::new();

        for (inx, centre) in points.iter().enumerate() {
            let mut claimed = 0;
            for (other, point) in points.iter().enumerate() {
                if !covered[other]
                    && Haversine::distance(*centre, *point) <= radius
                {
                    covered[other] = true;
                    claimed += 1;
                }
            }
            if claimed > 0 {
                centres.push(nodes[inx]);
            }
        }

        debug!(
            "Selected {} congestion centres from {} nodes",
            centres.len(),
            nodes.len()
        );
        centres
    }
}

/// Format centre nodes as the `lat,lon;lat,lon` string the congestion
/// acquisition script expects
pub fn congestion_request(centres: &[&RouteNode]) -> String {
    centres
        .iter()
        .map(|node| format!("{},{}", node.lat, node.lon))
        .collect::<Vec<String>>()
        .join(";")
}

/// A congestion record exactly as produced by the acquisition script
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CongestionRecord {
    #[serde(rename = "class")]
    pub road_class: String,
    pub congestion: String,
    pub geometry: String,
}

/// Congestion for a single run of coordinates along a road
#[derive(Debug, Clone, PartialEq)]
pub struct CongestionRow {
    pub road_class: String,
    pub level: CongestionLevel,
    pub nodes: Vec<Coordinate>,
}

/// Parse a single `c(...)` group. The first half of the values are
/// longitudes and the second half the matching latitudes.
fn parse_group(group: &str) -> Option<Vec<Coordinate>> {
    let values: Vec<f64> = group
        .split(',')
        .map(|value| value.parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;

    if values.is_empty() || values.len() % 2 != 0 {
        return None;
    }

    let (lons, lats) = values.split_at(values.len() / 2);
    Some(
        lons.iter()
            .zip(lats.iter())
            .map(|(lon, lat)| Coordinate::new(*lat, *lon))
            .collect(),
    )
}

/// Parse a geometry string into one list of coordinates per `c(...)` group.
/// Returns None if any part of the string is malformed.
pub fn parse_geometry(geometry: &str) -> Option<Vec<Vec<Coordinate>>> {
    let compact: String =
        geometry.chars().filter(|c| !c.is_whitespace()).collect();

    let inner = match compact.strip_prefix("list(") {
        Some(rest) => rest.strip_suffix(')')?,
        None => compact.as_str(),
    };

    let mut groups = Vec::new();
    let mut rest = inner;
    while !rest.is_empty() {
        let body = rest.strip_prefix("c(")?;
        let end = body.find(')')?;
        groups.push(parse_group(&body[..end])?);

        rest = &body[end + 1..];
        rest = rest.strip_prefix(',').unwrap_or(rest);
    }

    match groups.is_empty() {
        true => None,
        false => Some(groups),
    }
}

impl CongestionRecord {
    /// Convert the raw record into congestion rows, one per geometry group.
    /// Returns None, with a warning, if the record can't be understood.
    pub fn parse(&self) -> Option<Vec<CongestionRow>> {
        let level = match CongestionLevel::from_str(&self.congestion) {
            Ok(level) => level,
            Err(_) => {
                warn!(
                    "Skipping {} congestion record, unknown level '{}'",
                    self.road_class, self.congestion
                );
                return None;
            }
        };

        let groups = match parse_geometry(&self.geometry) {
            Some(groups) => groups,
            None => {
                warn!(
                    "Skipping {} congestion record, unparseable geometry",
                    self.road_class
                );
                return None;
            }
        };

        Some(
            groups
                .into_iter()
                .map(|nodes| CongestionRow {
                    road_class: self.road_class.clone(),
                    level,
                    nodes,
                })
                .collect(),
        )
    }
}

/// Parse every record, dropping any which are malformed
pub fn parse_records(records: &[CongestionRecord]) -> Vec<CongestionRow> {
    records
        .iter()
        .filter_map(|record| record.parse())
        .flatten()
        .collect()
}

/// Write each row's congestion level onto every edge leaving the nodes it
/// covers. Coordinates are matched to the ids the builder assigned, falling
/// back to the nearest node within `snap_distance` metres. Returns the
/// number of edge updates made.
pub fn apply_congestion(
    builder: &mut RouteGraphBuilder,
    rows: &[CongestionRow],
    snap_distance: f64,
) -> usize {
    let mut seen = FxHashSet::<(String, CongestionLevel)>::default();
    let mut targets: Vec<(String, CongestionLevel)> = Vec::new();

    for row in rows.iter() {
        for coord in row.nodes.iter() {
            let maybe_id = match builder.resolve(coord) {
                Some(id) => Some(id.to_string()),
                None => builder
                    .graph()
                    .nearest_node(coord, snap_distance)
                    .map(|node| node.id.clone()),
            };

            let id = match maybe_id {
                Some(id) => id,
                None => {
                    warn!("No route node at ({}, {})", coord.lat, coord.lon);
                    continue;
                }
            };

            if seen.insert((id.clone(), row.level)) {
                targets.push((id, row.level));
            }
        }
    }

    let graph = builder.graph_mut();
    let updated = targets
        .iter()
        .map(|(id, level)| graph.set_outgoing_congestion(id, level.value()))
        .sum();

    debug!(
        "Congestion applied to {} nodes, {} edge updates",
        targets.len(),
        updated
    );

    updated
}
