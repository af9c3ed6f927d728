//! End to end orchestration of a single graph-building session. Routes are
//! fetched from the provider, processed and ingested in the order the
//! provider returns them, congestion is overlaid, the graph is enriched and
//! finally handed to a sink.

use log::{info, warn};

use crate::common::config::EngineConfig;
use crate::common::error::{EngineError, EngineResult, LookupError};
use crate::common::geometry::Coordinate;
use crate::graph::builder::{RouteGraph, RouteGraphBuilder};
use crate::graph::congestion::{
    CongestionRecord, apply_congestion, congestion_request, parse_records,
};
use crate::graph::enrich::{EnrichmentSummary, GraphEnricher};
use crate::graph::export::GraphSink;
use crate::processing::lookups::{ElevationLookup, RouteProvider, TagLookup};
use crate::processing::route::RouteProcessor;

/// The external services a session pulls its data from
pub struct Collaborators<'a> {
    pub routes: &'a mut dyn RouteProvider,
    pub elevation: &'a mut dyn ElevationLookup,
    pub tags: &'a mut dyn TagLookup,
}

/// Running totals for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    /// Routes ingested into the graph
    pub routes: usize,
    pub nodes: usize,
    pub edges: usize,
    /// Edge updates made by the congestion overlay
    pub congestion_edges: usize,
    /// Categorical attributes filled in from neighbouring edges
    pub filled_fields: usize,
}

/// Owns the graph being built for the duration of one session
pub struct RouteSession {
    config: EngineConfig,
    builder: RouteGraphBuilder,
    summary: SessionSummary,
}

impl RouteSession {
    /// Start an empty session, provided the settings are usable
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let builder = RouteGraphBuilder::new(config.defaults.clone());
        Ok(RouteSession {
            config,
            builder,
            summary: SessionSummary::default(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn graph(&self) -> &RouteGraph {
        self.builder.graph()
    }

    /// Totals so far, with node and edge counts taken from the graph
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            nodes: self.builder.graph().node_count(),
            edges: self.builder.graph().edge_count(),
            ..self.summary
        }
    }

    /// Fetch every route between the waypoints, then process and ingest
    /// each of them. Returns the number of routes ingested.
    pub fn add_routes(
        &mut self,
        waypoints: &[Coordinate],
        lookups: &mut Collaborators<'_>,
    ) -> EngineResult<usize> {
        for waypoint in waypoints.iter() {
            waypoint.validate()?;
        }

        let routes = lookups
            .routes
            .fetch_routes(waypoints)
            .map_err(EngineError::Lookup)?;
        if routes.is_empty() {
            warn!("Route provider returned no routes");
        }

        let processor = RouteProcessor::new(&self.config);
        for coords in routes.iter() {
            let route = processor.process(
                coords,
                &mut *lookups.elevation,
                &mut *lookups.tags,
            )?;
            self.builder.ingest_route(&route)?;
            self.summary.routes += 1;
        }

        Ok(routes.len())
    }

    /// The `lat,lon;lat,lon` centres to fetch congestion data around, so
    /// that the ingested nodes are covered
    pub fn congestion_request(&self) -> String {
        let centres = self
            .graph()
            .congestion_centre_nodes(self.config.congestion_centre_distance);
        congestion_request(&centres)
    }

    /// Overlay a congestion dataset onto the nodes ingested so far. Returns
    /// the number of edge updates made.
    pub fn add_congestion(&mut self, records: &[CongestionRecord]) -> usize {
        let rows = parse_records(records);
        let updated = apply_congestion(
            &mut self.builder,
            &rows,
            self.config.congestion_snap_distance,
        );
        info!(
            "Congestion overlay: {} of {} records usable, {} edge updates",
            rows.len(),
            records.len(),
            updated
        );

        self.summary.congestion_edges += updated;
        updated
    }

    /// Fill the gaps in the graph's attributes
    pub fn enrich(&mut self) -> EngineResult<EnrichmentSummary> {
        let enricher = GraphEnricher::new(&self.config.defaults);
        let enrichment = enricher.enrich(self.builder.graph_mut())?;

        self.summary.filled_fields += enrichment.filled_fields;
        Ok(enrichment)
    }

    /// Hand the graph to a sink, returning the final totals
    pub fn export<S>(&self, sink: &mut S) -> EngineResult<SessionSummary>
    where
        S: GraphSink,
        S::Error: Into<LookupError>,
    {
        self.builder
            .graph()
            .export(sink)
            .map_err(|err| EngineError::Sink(err.into()))?;

        let summary = self.summary();
        info!("Session exported: {:?}", summary);
        Ok(summary)
    }

    /// Run every step of the session in order. Congestion is only overlaid
    /// when records are provided.
    ///
    /// Enrichment needs at least one edge with retrieved attributes to
    /// start from. When no way tags are found and every edge keeps the
    /// default max speed and highway (e.g. a flat route with no tag
    /// samples), the run fails with [`EngineError::GapFillExhausted`] and
    /// nothing reaches the sink.
    pub fn run<S>(
        mut self,
        waypoints: &[Coordinate],
        lookups: &mut Collaborators<'_>,
        congestion: &[CongestionRecord],
        sink: &mut S,
    ) -> EngineResult<SessionSummary>
    where
        S: GraphSink,
        S::Error: Into<LookupError>,
    {
        self.add_routes(waypoints, lookups)?;
        if !congestion.is_empty() {
            self.add_congestion(congestion);
        }
        self.enrich()?;
        self.export(sink)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::geometry::distance_meters;
    use crate::common::graph_data::{RouteNode, Segment, WayTags};
    use crate::graph::export::GraphExport;
    use crate::processing::lookups::{
        ElevationSample, FixedRoutes, SampledElevations, SampledTags,
        TagSample,
    };
    use approx::assert_relative_eq;

    fn get_test_coords() -> Vec<Coordinate> {
        vec![
            Coordinate::new(39.468, -6.389),
            Coordinate::new(39.468, -6.383),
            Coordinate::new(39.463, -6.379),
        ]
    }

    fn get_test_session() -> RouteSession {
        RouteSession::new(EngineConfig::default()).unwrap()
    }

    /// Every point along the route sits at the same height
    fn get_flat_elevations() -> SampledElevations {
        let samples = get_test_coords()
            .iter()
            .map(|coord| ElevationSample {
                lat: coord.lat,
                lon: coord.lon,
                elevation: 400.0,
            })
            .collect();
        SampledElevations::new(samples, 10_000.0)
    }

    /// Every point along the route is on the same primary road
    fn get_primary_tags() -> SampledTags {
        let start = get_test_coords()[0];
        SampledTags::new(
            vec![TagSample {
                lat: start.lat,
                lon: start.lon,
                tags: WayTags {
                    max_speed: Some(50),
                    highway: Some("primary".to_string()),
                    ..WayTags::default()
                },
            }],
            10_000.0,
        )
    }

    /// Sink which refuses every write
    struct ClosedSink;

    impl GraphSink for ClosedSink {
        type Error = String;

        fn upsert_node(
            &mut self,
            _node: &RouteNode,
        ) -> Result<(), String> {
            Err("sink closed".to_string())
        }

        fn upsert_edge(
            &mut self,
            _source: &str,
            _destination: &str,
            _segment: &Segment,
        ) -> Result<(), String> {
            Err("sink closed".to_string())
        }
    }

    /// A flat route at a constant speed limit collapses into a single edge
    /// covering the whole distance
    #[test]
    fn test_flat_route_single_edge() {
        let coords = get_test_coords();
        let mut routes = FixedRoutes::new(vec![coords.clone()]);
        let mut elevation = get_flat_elevations();
        let mut tags = SampledTags::new(Vec::new(), 0.0);
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let mut session = get_test_session();

        let added = session.add_routes(&[], &mut lookups).unwrap();

        let graph = session.graph();
        assert_eq!(added, 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);

        let (src, dst, segment) = graph.edges().next().unwrap();
        assert_eq!(graph.node(src).unwrap().lat, coords[0].lat);
        assert_eq!(graph.node(dst).unwrap().lon, coords[2].lon);

        let target = distance_meters(&coords[0], &coords[1]).unwrap()
            + distance_meters(&coords[1], &coords[2]).unwrap();
        assert_relative_eq!(segment.distance, target, epsilon = 1e-6);
        assert_eq!(segment.slope, 0.0);
        assert_eq!(segment.max_speed, 50.0);
    }

    /// Without any retrieved attributes enrichment has nothing to start
    /// from, which is reported rather than looping
    #[test]
    fn test_enrich_without_tags() {
        let mut routes = FixedRoutes::new(vec![get_test_coords()]);
        let mut elevation = get_flat_elevations();
        let mut tags = SampledTags::new(Vec::new(), 0.0);
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let mut sink = GraphExport::default();

        let result =
            get_test_session().run(&[], &mut lookups, &[], &mut sink);

        assert!(matches!(result, Err(EngineError::GapFillExhausted { .. })));
        assert!(sink.nodes.is_empty());
    }

    #[test]
    fn test_full_run() {
        let mut routes = FixedRoutes::new(vec![get_test_coords()]);
        let mut elevation = get_flat_elevations();
        let mut tags = get_primary_tags();
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let congestion = vec![CongestionRecord {
            road_class: "primary".to_string(),
            congestion: "heavy".to_string(),
            geometry: "list(c(-6.389, 39.468))".to_string(),
        }];
        let mut sink = GraphExport::default();

        let result = get_test_session()
            .run(&[], &mut lookups, &congestion, &mut sink)
            .unwrap();

        let target = SessionSummary {
            routes: 1,
            nodes: 2,
            edges: 1,
            congestion_edges: 1,
            filled_fields: 0,
        };
        assert_eq!(result, target);
        assert_eq!(sink.nodes.len(), 2);
        assert_eq!(sink.edges[0].segment.highway, "primary");
        assert_eq!(sink.edges[0].segment.congestion, Some(2));
    }

    /// Routes ingested before a failure still count towards the totals
    #[test]
    fn test_partial_add_routes() {
        let short = vec![Coordinate::new(39.468, -6.389)];
        let mut routes = FixedRoutes::new(vec![get_test_coords(), short]);
        let mut elevation = get_flat_elevations();
        let mut tags = get_primary_tags();
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let mut session = get_test_session();

        let result = session.add_routes(&[], &mut lookups);

        assert!(matches!(result, Err(EngineError::RouteTooShort(1))));
        assert_eq!(session.summary().routes, 1);
        assert_eq!(session.summary().edges, 1);
    }

    #[test]
    fn test_congestion_request() {
        let mut routes = FixedRoutes::new(vec![get_test_coords()]);
        let mut elevation = get_flat_elevations();
        let mut tags = get_primary_tags();
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let mut session = get_test_session();
        session.add_routes(&[], &mut lookups).unwrap();

        let request = session.congestion_request();

        assert_eq!(request, "39.468,-6.389;39.463,-6.379");
    }

    #[test]
    fn test_invalid_config() {
        let config = EngineConfig {
            max_spacing: 0.0,
            ..EngineConfig::default()
        };

        let result = RouteSession::new(config);

        assert!(matches!(
            result,
            Err(EngineError::Config {
                key: "max_spacing",
                ..
            })
        ));
    }

    #[test]
    fn test_invalid_waypoint() {
        let mut routes = FixedRoutes::new(vec![get_test_coords()]);
        let mut elevation = get_flat_elevations();
        let mut tags = get_primary_tags();
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let mut session = get_test_session();

        let result =
            session.add_routes(&[Coordinate::new(91.0, 0.0)], &mut lookups);

        assert!(matches!(
            result,
            Err(EngineError::InvalidCoordinate { .. })
        ));
        assert_eq!(session.summary(), SessionSummary::default());
    }

    #[test]
    fn test_export_sink_error() {
        let mut routes = FixedRoutes::new(vec![get_test_coords()]);
        let mut elevation = get_flat_elevations();
        let mut tags = get_primary_tags();
        let mut lookups = Collaborators {
            routes: &mut routes,
            elevation: &mut elevation,
            tags: &mut tags,
        };
        let mut session = get_test_session();
        session.add_routes(&[], &mut lookups).unwrap();

        let result = session.export(&mut ClosedSink);

        match result {
            Err(EngineError::Sink(err)) => {
                assert_eq!(err.to_string(), "sink closed")
            }
            other => panic!("Expected Sink error, got {:?}", other),
        }
    }
}
