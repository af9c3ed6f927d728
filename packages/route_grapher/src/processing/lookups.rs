//! Interfaces for the external services the engine depends on. The engine
//! never talks to the network itself; callers provide implementations of
//! these traits which hand back data that has already been fetched.
//!
//! The `Sampled*` and `FixedRoutes` implementations answer from data held
//! in memory, which is enough for offline processing and for tests.

use geo::{Distance, Haversine, Point};
use serde::Deserialize;

use crate::common::error::LookupError;
use crate::common::geometry::Coordinate;
use crate::common::graph_data::WayTags;

/// Sentinel for an elevation the lookup was unable to provide
pub const UNKNOWN_ELEVATION: f64 = -1.0;

/// A routing service (OSRM, GraphHopper, ORS...), with provider specific
/// decoding already applied
pub trait RouteProvider {
    /// Fetch every route the provider suggests between the waypoints
    fn fetch_routes(
        &mut self,
        waypoints: &[Coordinate],
    ) -> Result<Vec<Vec<Coordinate>>, LookupError>;
}

/// An elevation service. Results must be aligned with the request, any
/// missing trailing entries are treated as unknown.
pub trait ElevationLookup {
    fn elevations(
        &mut self,
        coords: &[Coordinate],
    ) -> Result<Vec<f64>, LookupError>;
}

/// A way tag service, reporting the attributes of the road at a point
pub trait TagLookup {
    fn way_tags(
        &mut self,
        coord: &Coordinate,
    ) -> Result<Option<WayTags>, LookupError>;
}

/// Find the item whose coordinate is closest to the target
fn nearest<'a, T>(
    items: &'a [T],
    target: &Coordinate,
    coord_of: impl Fn(&T) -> Coordinate,
) -> Option<(&'a T, f64)> {
    let target: Point = (*target).into();
    let mut closest: Option<(&T, f64)> = None;

    for item in items.iter() {
        let candidate: Point = coord_of(item).into();
        let dist = Haversine::distance(target, candidate);
        match closest {
            Some((_, best)) if best <= dist => (),
            _ => closest = Some((item, dist)),
        }
    }

    closest
}

/// A single elevation measurement
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ElevationSample {
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
}

/// Answers elevation requests with the nearest known sample, provided it is
/// within `max_distance` metres
#[derive(Debug, Clone)]
pub struct SampledElevations {
    samples: Vec<ElevationSample>,
    max_distance: f64,
}

impl SampledElevations {
    pub fn new(samples: Vec<ElevationSample>, max_distance: f64) -> Self {
        SampledElevations {
            samples,
            max_distance,
        }
    }
}

impl ElevationLookup for SampledElevations {
    fn elevations(
        &mut self,
        coords: &[Coordinate],
    ) -> Result<Vec<f64>, LookupError> {
        let heights = coords
            .iter()
            .map(|coord| {
                match nearest(&self.samples, coord, |s| {
                    Coordinate::new(s.lat, s.lon)
                }) {
                    Some((sample, dist)) if dist <= self.max_distance => {
                        sample.elevation
                    }
                    _ => UNKNOWN_ELEVATION,
                }
            })
            .collect();
        Ok(heights)
    }
}

/// Way tags recorded at a single point
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TagSample {
    pub lat: f64,
    pub lon: f64,
    pub tags: WayTags,
}

/// Answers tag requests with the nearest known sample, provided it is
/// within `max_distance` metres
#[derive(Debug, Clone)]
pub struct SampledTags {
    samples: Vec<TagSample>,
    max_distance: f64,
}

impl SampledTags {
    pub fn new(samples: Vec<TagSample>, max_distance: f64) -> Self {
        SampledTags {
            samples,
            max_distance,
        }
    }
}

impl TagLookup for SampledTags {
    fn way_tags(
        &mut self,
        coord: &Coordinate,
    ) -> Result<Option<WayTags>, LookupError> {
        let found = match nearest(&self.samples, coord, |s| {
            Coordinate::new(s.lat, s.lon)
        }) {
            Some((sample, dist)) if dist <= self.max_distance => {
                Some(sample.tags.clone())
            }
            _ => None,
        };
        Ok(found)
    }
}

/// Hands back a fixed set of already decoded routes, whatever the waypoints
#[derive(Debug, Clone, Default)]
pub struct FixedRoutes {
    routes: Vec<Vec<Coordinate>>,
}

impl FixedRoutes {
    pub fn new(routes: Vec<Vec<Coordinate>>) -> Self {
        FixedRoutes { routes }
    }
}

impl RouteProvider for FixedRoutes {
    fn fetch_routes(
        &mut self,
        _waypoints: &[Coordinate],
    ) -> Result<Vec<Vec<Coordinate>>, LookupError> {
        Ok(self.routes.clone())
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn get_test_elevations() -> SampledElevations {
        SampledElevations::new(
            vec![
                ElevationSample {
                    lat: 39.468,
                    lon: -6.389,
                    elevation: 410.0,
                },
                ElevationSample {
                    lat: 39.463,
                    lon: -6.379,
                    elevation: 395.0,
                },
            ],
            250.0,
        )
    }

    /// Each coordinate should take the height of its closest sample
    #[test]
    fn test_sampled_elevations_nearest() {
        let mut lookup = get_test_elevations();
        let coords = [
            Coordinate::new(39.4681, -6.3891),
            Coordinate::new(39.4629, -6.3789),
        ];

        let result = lookup.elevations(&coords).unwrap();

        assert_eq!(result, vec![410.0, 395.0]);
    }

    /// Points too far from every sample are reported as unknown
    #[test]
    fn test_sampled_elevations_out_of_range() {
        let mut lookup = get_test_elevations();
        let coords = [Coordinate::new(40.0, -6.0)];

        let result = lookup.elevations(&coords).unwrap();

        assert_eq!(result, vec![UNKNOWN_ELEVATION]);
    }

    /// Tag samples behave the same way, with None for unknown points
    #[test]
    fn test_sampled_tags() {
        let tags = WayTags {
            max_speed: Some(80),
            highway: Some("secondary".to_string()),
            ..WayTags::default()
        };
        let mut lookup = SampledTags::new(
            vec![TagSample {
                lat: 39.468,
                lon: -6.389,
                tags: tags.clone(),
            }],
            50.0,
        );

        let near = lookup.way_tags(&Coordinate::new(39.468, -6.3891)).unwrap();
        let far = lookup.way_tags(&Coordinate::new(39.5, -6.3)).unwrap();

        assert_eq!(near, Some(tags));
        assert_eq!(far, None);
    }

    /// An empty sample set finds nothing
    #[test]
    fn test_nearest_empty() {
        let samples: Vec<ElevationSample> = Vec::new();

        let result = nearest(&samples, &Coordinate::new(0.0, 0.0), |s| {
            Coordinate::new(s.lat, s.lon)
        });

        assert!(result.is_none());
    }
}
