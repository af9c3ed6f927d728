use serde::{Deserialize, Serialize};

use crate::common::config::SegmentDefaults;

/// Sets the data which will be stored as node weights in the route graph.
/// The id is assigned by the graph builder from the node's coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteNode {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
}

/// Container for the attributes of a single stretch of road, stored as the
/// edge weight between two route nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub distance: f64,
    pub slope: f64,
    pub max_speed: f64,
    pub lanes: u32,
    pub highway: String,
    pub name: String,
    pub surface: String,
    pub way_id: String,
    pub congestion: Option<u8>,
}

impl Segment {
    /// Create a segment with every categorical attribute set to its
    /// sentinel, no way id and no congestion
    pub fn with_defaults(
        distance: f64,
        slope: f64,
        defaults: &SegmentDefaults,
    ) -> Segment {
        Segment {
            distance,
            slope,
            max_speed: defaults.max_speed,
            lanes: defaults.lanes,
            highway: defaults.highway.clone(),
            name: defaults.name.clone(),
            surface: defaults.surface.clone(),
            way_id: String::new(),
            congestion: None,
        }
    }

    /// True when none of slope, max speed, lanes, highway, name or surface
    /// carry retrieved data
    pub fn is_all_default(&self, defaults: &SegmentDefaults) -> bool {
        self.slope == defaults.slope && self.categorical_defaults(defaults) == 5
    }

    /// Number of categorical attributes still holding their sentinel
    pub fn categorical_defaults(&self, defaults: &SegmentDefaults) -> usize {
        [
            self.max_speed == defaults.max_speed,
            self.lanes == defaults.lanes,
            self.highway == defaults.highway,
            self.name == defaults.name,
            self.surface == defaults.surface,
        ]
        .into_iter()
        .filter(|is_default| *is_default)
        .count()
    }

    /// Overwrite every categorical attribute with the values from `other`.
    /// Distance, slope, way id and congestion are left untouched.
    pub fn copy_categorical(&mut self, other: &Segment) {
        self.max_speed = other.max_speed;
        self.lanes = other.lanes;
        self.highway = other.highway.clone();
        self.name = other.name.clone();
        self.surface = other.surface.clone();
    }

    /// Replace each categorical attribute which still holds its sentinel
    /// with the value from `previous`, provided `previous` has real data for
    /// it. Returns the number of attributes which were filled.
    pub fn fill_defaults_from(
        &mut self,
        previous: &Segment,
        defaults: &SegmentDefaults,
    ) -> usize {
        let mut filled = 0;

        if self.max_speed == defaults.max_speed
            && previous.max_speed != defaults.max_speed
        {
            self.max_speed = previous.max_speed;
            filled += 1;
        }
        if self.lanes == defaults.lanes && previous.lanes != defaults.lanes {
            self.lanes = previous.lanes;
            filled += 1;
        }
        if self.highway == defaults.highway
            && previous.highway != defaults.highway
        {
            self.highway = previous.highway.clone();
            filled += 1;
        }
        if self.name == defaults.name && previous.name != defaults.name {
            self.name = previous.name.clone();
            filled += 1;
        }
        if self.surface == defaults.surface
            && previous.surface != defaults.surface
        {
            self.surface = previous.surface.clone();
            filled += 1;
        }

        filled
    }
}

/// Way attributes reported by the tag lookup for a single point. Anything
/// the lookup could not retrieve is left as None.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WayTags {
    pub max_speed: Option<u32>,
    pub lanes: Option<u32>,
    pub highway: Option<String>,
    pub name: Option<String>,
    pub surface: Option<String>,
    pub way_id: Option<String>,
}

#[cfg(test)]
mod tests {

    use super::*;

    fn get_test_segment() -> Segment {
        Segment {
            distance: 120.0,
            slope: 2.5,
            max_speed: 90.0,
            lanes: 2,
            highway: "primary".to_string(),
            name: "EX-100".to_string(),
            surface: "asphalt".to_string(),
            way_id: "4567".to_string(),
            congestion: Some(1),
        }
    }

    /// Freshly created segments should be recognised as all-default
    #[test]
    fn test_with_defaults_is_all_default() {
        let defaults = SegmentDefaults::default();

        let result = Segment::with_defaults(10.0, 0.0, &defaults);

        assert!(result.is_all_default(&defaults));
        assert_eq!(result.categorical_defaults(&defaults), 5);
    }

    /// A non-zero slope alone is enough to break the all-default state
    #[test]
    fn test_slope_breaks_all_default() {
        let defaults = SegmentDefaults::default();

        let result = Segment::with_defaults(10.0, 1.5, &defaults);

        assert!(!result.is_all_default(&defaults));
    }

    /// Only sentinel-valued attributes are filled, protected ones are kept
    #[test]
    fn test_fill_defaults_from() {
        let defaults = SegmentDefaults::default();
        let previous = get_test_segment();

        let mut current = Segment::with_defaults(30.0, -1.0, &defaults);
        current.name = "Avenida de Elvas".to_string();
        current.way_id = "99".to_string();

        let filled = current.fill_defaults_from(&previous, &defaults);

        assert_eq!(filled, 4);
        assert_eq!(current.max_speed, 90.0);
        assert_eq!(current.lanes, 2);
        assert_eq!(current.highway, "primary");
        assert_eq!(current.name, "Avenida de Elvas");
        assert_eq!(current.surface, "asphalt");
        assert_eq!(current.distance, 30.0);
        assert_eq!(current.slope, -1.0);
        assert_eq!(current.way_id, "99");
        assert_eq!(current.congestion, None);
    }

    /// A default-valued previous segment has nothing to give
    #[test]
    fn test_fill_defaults_from_default_previous() {
        let defaults = SegmentDefaults::default();
        let previous = Segment::with_defaults(5.0, 0.0, &defaults);
        let mut current = Segment::with_defaults(6.0, 0.0, &defaults);

        let filled = current.fill_defaults_from(&previous, &defaults);

        assert_eq!(filled, 0);
        assert_eq!(current, Segment::with_defaults(6.0, 0.0, &defaults));
    }
}
