//! Converts routes from a routing service into a road graph. Each route is
//! densified, given elevation and slope data, and split wherever the slope
//! or speed limit changes. The resulting segments are merged into a
//! directed graph whose missing attributes are inferred from neighbouring
//! edges.

pub mod common;
pub mod graph;
pub mod processing;
pub mod session;

pub use common::config::{EngineConfig, SegmentDefaults};
pub use common::error::{EngineError, EngineResult};
pub use common::geometry::Coordinate;
pub use graph::builder::{RouteGraph, RouteGraphBuilder};
pub use graph::export::{GraphExport, GraphSink};
pub use session::{Collaborators, RouteSession, SessionSummary};
