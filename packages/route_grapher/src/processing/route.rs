//! Converts the raw coordinates of a route into a segmented route: the route
//! is densified, annotated with elevation, slope and way tags, and then
//! collapsed down to the points at which its character changes.

use log::{debug, warn};
use serde::Serialize;

use crate::common::config::EngineConfig;
use crate::common::error::{EngineError, EngineResult};
use crate::common::geometry::{Coordinate, distance_meters, interpolate};
use crate::common::graph_data::WayTags;
use crate::processing::lookups::{ElevationLookup, TagLookup, UNKNOWN_ELEVATION};
use crate::processing::segmenter::segment;
use crate::processing::slopes::{SlopeSettings, calculate_slopes};

/// A route reduced to its breakpoints. `segments` and `heights` hold one
/// entry per breakpoint, every other series holds one entry per stretch
/// between consecutive breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentedRoute {
    pub segments: Vec<Coordinate>,
    pub heights: Vec<f64>,
    pub max_speed: Vec<f64>,
    pub distances: Vec<f64>,
    pub slopes: Vec<f64>,
    pub way_tags: Vec<WayTags>,
}

impl SegmentedRoute {
    /// Number of stretches (graph edges) in the route
    pub fn edge_count(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    /// Total distance covered, in metres
    pub fn total_distance(&self) -> f64 {
        self.distances.iter().sum()
    }

    /// Check that every series lines up with the breakpoints. Way tags may
    /// be left empty when none were retrieved.
    pub fn check_aligned(&self) -> EngineResult<()> {
        let edges = self.edge_count();
        let series = [
            ("route heights", self.segments.len(), self.heights.len()),
            ("route max speeds", edges, self.max_speed.len()),
            ("route distances", edges, self.distances.len()),
            ("route slopes", edges, self.slopes.len()),
        ];

        for (context, expected, found) in series {
            if expected != found {
                return Err(EngineError::MisalignedInput {
                    context,
                    expected,
                    found,
                });
            }
        }

        if !self.way_tags.is_empty() && self.way_tags.len() != edges {
            return Err(EngineError::MisalignedInput {
                context: "route way tags",
                expected: edges,
                found: self.way_tags.len(),
            });
        }

        Ok(())
    }
}

/// A route after densification, with the distance between each pair of
/// consecutive points
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedRoute {
    pub coords: Vec<Coordinate>,
    pub distances: Vec<f64>,
}

/// Insert interpolated points wherever consecutive coordinates are too far
/// apart, recording the distance covered by every resulting pair
pub fn extend_route(
    coords: &[Coordinate],
    config: &EngineConfig,
) -> EngineResult<ExtendedRoute> {
    config.validate()?;
    if coords.len() < 2 {
        return Err(EngineError::RouteTooShort(coords.len()));
    }

    let spacing = config.spacing();
    let mut extended = Vec::with_capacity(coords.len());
    let mut distances = Vec::with_capacity(coords.len());

    for pair in coords.windows(2) {
        let (source, destination) = (&pair[0], &pair[1]);
        let distance = distance_meters(source, destination)?;

        extended.push(*source);

        let (intermediate, num_segments) =
            interpolate(source, destination, distance, &spacing);
        extended.extend(intermediate);

        // Interpolated points are evenly spaced
        let step = distance / num_segments as f64;
        distances.extend(std::iter::repeat_n(step, num_segments));
    }

    // Windows never hand back the final destination as a source
    if let Some(last) = coords.last() {
        extended.push(*last);
    }

    Ok(ExtendedRoute {
        coords: extended,
        distances,
    })
}

/// Fill in speed limits which the tag lookup couldn't retrieve, carrying the
/// last known value forwards. Gaps at the very start of the route take the
/// default.
pub fn fill_max_speeds(raw: &[Option<u32>], default: f64) -> Vec<f64> {
    let mut last_known: Option<f64> = None;
    raw.iter()
        .map(|speed| {
            if let Some(speed) = speed {
                last_known = Some(*speed as f64);
            }
            last_known.unwrap_or(default)
        })
        .collect()
}

/// Collapse a per-pair series down to one value per stretch between
/// consecutive breakpoints
fn aggregate_runs(
    values: &[f64],
    breakpoints: &[usize],
    agg: impl Fn(&[f64]) -> f64,
) -> Vec<f64> {
    breakpoints
        .windows(2)
        .map(|bounds| agg(&values[bounds[0]..bounds[1]]))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    match values.len() {
        0 => 0.0,
        n => values.iter().sum::<f64>() / n as f64,
    }
}

/// Orchestrates the processing of a single route. Elevation and tag data
/// are pulled from the provided lookups, everything else is calculated
/// locally.
pub struct RouteProcessor<'a> {
    config: &'a EngineConfig,
}

impl<'a> RouteProcessor<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        RouteProcessor { config }
    }

    /// Fetch elevations for every point in batches, keeping the results
    /// aligned with the input. Short responses are padded as unknown.
    fn retrieve_heights(
        &self,
        coords: &[Coordinate],
        elevation: &mut dyn ElevationLookup,
    ) -> EngineResult<Vec<f64>> {
        let batch_size = self.config.elevation_batch_size.max(1);
        let mut heights = Vec::with_capacity(coords.len());

        for batch in coords.chunks(batch_size) {
            let mut batch_heights =
                elevation.elevations(batch).map_err(EngineError::Lookup)?;

            if batch_heights.len() > batch.len() {
                return Err(EngineError::MisalignedInput {
                    context: "elevation response",
                    expected: batch.len(),
                    found: batch_heights.len(),
                });
            }
            if batch_heights.len() < batch.len() {
                warn!(
                    "Elevation lookup returned {} of {} heights, padding",
                    batch_heights.len(),
                    batch.len()
                );
                batch_heights.resize(batch.len(), UNKNOWN_ELEVATION);
            }

            heights.extend(batch_heights);
        }

        Ok(heights)
    }

    /// Fetch the way tags for every point, splitting out the speed limit
    fn retrieve_tags(
        &self,
        coords: &[Coordinate],
        tags: &mut dyn TagLookup,
    ) -> EngineResult<(Vec<f64>, Vec<WayTags>)> {
        let mut raw_speeds = Vec::with_capacity(coords.len());
        let mut way_tags = Vec::with_capacity(coords.len());

        for coord in coords.iter() {
            let found = tags
                .way_tags(coord)
                .map_err(EngineError::Lookup)?
                .unwrap_or_default();
            raw_speeds.push(found.max_speed);
            way_tags.push(found);
        }

        let max_speeds =
            fill_max_speeds(&raw_speeds, self.config.defaults.max_speed);

        Ok((max_speeds, way_tags))
    }

    /// Process the raw coordinates of a route into a segmented route
    pub fn process(
        &self,
        coords: &[Coordinate],
        elevation: &mut dyn ElevationLookup,
        tags: &mut dyn TagLookup,
    ) -> EngineResult<SegmentedRoute> {
        let extended = extend_route(coords, self.config)?;
        debug!(
            "Densified {} coordinates into {}",
            coords.len(),
            extended.coords.len()
        );

        let heights = self.retrieve_heights(&extended.coords, elevation)?;

        let settings = SlopeSettings {
            window: self.config.smoothing_window,
            threshold: self.config.slope_threshold,
        };
        let slopes =
            calculate_slopes(&extended.distances, &heights, &settings)?;

        let (max_speeds, way_tags) =
            self.retrieve_tags(&extended.coords, tags)?;

        let mut breakpoints =
            segment(&max_speeds, &slopes, self.config.slope_tolerance)?;
        // Close off the final stretch
        breakpoints.push(extended.coords.len() - 1);
        debug!("Selected {} breakpoints", breakpoints.len());

        Ok(reduce(
            &extended,
            &heights,
            &max_speeds,
            &slopes,
            &way_tags,
            &breakpoints,
        ))
    }
}

/// Sample the per-point series at each breakpoint, and aggregate the
/// per-pair series over each stretch between breakpoints. The last
/// breakpoint must be the final point of the route.
fn reduce(
    extended: &ExtendedRoute,
    heights: &[f64],
    max_speeds: &[f64],
    slopes: &[f64],
    way_tags: &[WayTags],
    breakpoints: &[usize],
) -> SegmentedRoute {
    // Stretch attributes are taken from the point each stretch starts at
    let starts = &breakpoints[..breakpoints.len() - 1];

    SegmentedRoute {
        segments: breakpoints.iter().map(|&i| extended.coords[i]).collect(),
        heights: breakpoints.iter().map(|&i| heights[i]).collect(),
        max_speed: starts.iter().map(|&i| max_speeds[i]).collect(),
        distances: aggregate_runs(&extended.distances, breakpoints, |run| {
            run.iter().sum()
        }),
        slopes: aggregate_runs(slopes, breakpoints, mean),
        way_tags: starts.iter().map(|&i| way_tags[i].clone()).collect(),
    }
}
