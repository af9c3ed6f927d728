//! Geometric helpers used while densifying a route. Distances are
//! great-circle (Haversine) distances in metres, while interpolation is
//! linear in latitude/longitude, which is accurate enough over the short
//! gaps between consecutive points of a driving route.

use geo::{Distance, Haversine, Point};
use serde::{Deserialize, Serialize};

use crate::common::error::{EngineError, EngineResult};

/// A single latitude/longitude pair, as returned by the routing provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coordinate { lat, lon }
    }

    /// Make sure the coordinate can be placed on the globe, NaN or out of
    /// range values are rejected rather than coerced
    pub fn validate(&self) -> EngineResult<()> {
        let lat_ok = self.lat.is_finite() && self.lat.abs() <= 90.0;
        let lon_ok = self.lon.is_finite() && self.lon.abs() <= 180.0;
        match lat_ok && lon_ok {
            true => Ok(()),
            false => Err(EngineError::InvalidCoordinate {
                lat: self.lat,
                lon: self.lon,
            }),
        }
    }

    /// Key used to give identical coordinates the same node identity. The
    /// `+ 0.0` folds negative zero into zero so both render identically.
    pub fn key(&self) -> String {
        format!("{};{}", self.lat + 0.0, self.lon + 0.0)
    }
}

impl From<Coordinate> for Point {
    fn from(coord: Coordinate) -> Point {
        Point::new(coord.lon, coord.lat)
    }
}

/// Great-circle distance between two coordinates, in metres
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> EngineResult<f64> {
    a.validate()?;
    b.validate()?;

    let pa: Point = (*a).into();
    let pb: Point = (*b).into();

    Ok(Haversine::distance(pa, pb))
}

/// Spacing settings for route densification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    /// Pairs further apart than this are densified
    pub max_spacing: f64,
    /// Target spacing between the points of a densified pair
    pub new_node_spacing: f64,
}

/// Generate evenly spaced coordinates between source and destination. When
/// the two are no more than `max_spacing` apart nothing is generated and a
/// single segment is reported. Otherwise the pair is split into
/// `ceil(distance / new_node_spacing)` equal segments, and the interior
/// points of that split are returned along with the segment count.
pub fn interpolate(
    source: &Coordinate,
    destination: &Coordinate,
    distance: f64,
    spacing: &Spacing,
) -> (Vec<Coordinate>, usize) {
    if distance <= spacing.max_spacing {
        return (Vec::new(), 1);
    }

    let num_segments = (distance / spacing.new_node_spacing).ceil() as usize;

    let delta_t = 1.0 / num_segments as f64;
    let step_lat = (destination.lat - source.lat) * delta_t;
    let step_lon = (destination.lon - source.lon) * delta_t;

    let intermediate: Vec<Coordinate> = (1..num_segments)
        .map(|step| {
            let step = step as f64;
            Coordinate::new(
                source.lat + step_lat * step,
                source.lon + step_lon * step,
            )
        })
        .collect();

    (intermediate, num_segments)
}

#[cfg(test)]
mod tests {

    use approx::{assert_abs_diff_eq, assert_relative_eq};

    use super::*;

    fn get_test_spacing() -> Spacing {
        Spacing {
            max_spacing: 150.0,
            new_node_spacing: 50.0,
        }
    }

    /// Distance should not depend on the direction of travel
    #[test]
    fn test_distance_symmetry() {
        let pairs = [
            (Coordinate::new(39.468, -6.389), Coordinate::new(39.463, -6.379)),
            (
                Coordinate::new(51.0012, -1.3387),
                Coordinate::new(50.9553, -1.4243),
            ),
            (Coordinate::new(-33.86, 151.21), Coordinate::new(35.68, 139.69)),
        ];

        for (a, b) in pairs.iter() {
            let there = distance_meters(a, b).unwrap();
            let back = distance_meters(b, a).unwrap();
            assert_relative_eq!(there, back, epsilon = 1e-9);
        }
    }

    /// One degree of latitude should come out at roughly 111km
    #[test]
    fn test_distance_one_degree() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);

        let result = distance_meters(&a, &b).unwrap();

        assert_abs_diff_eq!(result, 111_195.0, epsilon = 10.0);
    }

    /// Malformed coordinates must be rejected
    #[test]
    fn test_distance_invalid() {
        let good = Coordinate::new(0.0, 0.0);
        let bad = [
            Coordinate::new(f64::NAN, 0.0),
            Coordinate::new(0.0, f64::INFINITY),
            Coordinate::new(91.0, 0.0),
            Coordinate::new(0.0, -180.5),
        ];

        for coord in bad.iter() {
            match distance_meters(&good, coord) {
                Err(EngineError::InvalidCoordinate { .. }) => (),
                other => panic!("Expected InvalidCoordinate, got {:?}", other),
            }
        }
    }

    /// Pairs below the threshold are left alone
    #[test]
    fn test_interpolate_below_threshold() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0005, 0.0);

        let (points, segments) =
            interpolate(&a, &b, 100.0, &get_test_spacing());

        assert!(points.is_empty());
        assert_eq!(segments, 1);
    }

    /// The threshold itself is exclusive, a pair exactly max_spacing apart
    /// is not densified
    #[test]
    fn test_interpolate_at_threshold() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.001, 0.0);

        let (points, segments) =
            interpolate(&a, &b, 150.0, &get_test_spacing());

        assert!(points.is_empty());
        assert_eq!(segments, 1);
    }

    /// A 200m pair with 50m spacing is split into 4 segments, giving 3
    /// evenly spaced interior points
    #[test]
    fn test_interpolate_even_spacing() {
        let a = Coordinate::new(10.0, 20.0);
        let b = Coordinate::new(10.4, 20.8);

        let (points, segments) =
            interpolate(&a, &b, 200.0, &get_test_spacing());

        assert_eq!(segments, 4);
        assert_eq!(points.len(), 3);

        let targets = [(10.1, 20.2), (10.2, 20.4), (10.3, 20.6)];
        for (point, (lat, lon)) in points.iter().zip(targets.iter()) {
            assert_relative_eq!(point.lat, *lat, epsilon = 1e-9);
            assert_relative_eq!(point.lon, *lon, epsilon = 1e-9);
        }
    }

    /// Partial spacing rounds up to an extra segment
    #[test]
    fn test_interpolate_rounds_up() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.0, 0.01);

        let (points, segments) =
            interpolate(&a, &b, 151.0, &get_test_spacing());

        assert_eq!(segments, 4);
        assert_eq!(points.len(), 3);
    }

    /// Negative zero and zero describe the same place
    #[test]
    fn test_key_negative_zero() {
        let a = Coordinate::new(-0.0, 1.5);
        let b = Coordinate::new(0.0, 1.5);

        assert_eq!(a.key(), b.key());
        assert_eq!(a.key(), "0;1.5");
    }
}
