//! This module contains the structs which control how routes are densified,
//! smoothed, segmented and enriched. The EngineConfig struct is passed to
//! every stage of the pipeline, there is no process-wide configuration.

use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::common::error::{EngineError, EngineResult};
use crate::common::geometry::Spacing;

/// Placeholder values for segment attributes which could not be retrieved.
/// A segment attribute equal to its sentinel is treated as "no data" and is
/// eligible for gap filling.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentDefaults {
    pub slope: f64,
    pub max_speed: f64,
    pub lanes: u32,
    pub highway: String,
    pub name: String,
    pub surface: String,
}

impl Default for SegmentDefaults {
    fn default() -> Self {
        SegmentDefaults {
            slope: 0.0,
            max_speed: 50.0,
            lanes: 1,
            highway: String::new(),
            name: String::new(),
            surface: String::new(),
        }
    }
}

/// Settings for every stage of route processing and graph enrichment
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Consecutive points further apart than this (m) are densified
    pub max_spacing: f64,
    /// Target spacing (m) between points of a densified pair
    pub new_node_spacing: f64,
    /// Number of points in the centred height moving average
    pub smoothing_window: usize,
    /// Slopes are clipped to +/- this value (%)
    pub slope_threshold: f64,
    /// Slope change (%) between neighbours which starts a new segment
    pub slope_tolerance: f64,
    /// Maximum number of points per elevation request
    pub elevation_batch_size: usize,
    /// Radius (m) used to snap congestion coordinates onto graph nodes
    pub congestion_snap_distance: f64,
    /// Radius (m) covered by each node congestion data is requested around
    pub congestion_centre_distance: f64,
    pub defaults: SegmentDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_spacing: 150.0,
            new_node_spacing: 50.0,
            smoothing_window: 20,
            slope_threshold: 12.0,
            slope_tolerance: 1.0,
            elevation_batch_size: 1001,
            congestion_snap_distance: 1.0,
            congestion_centre_distance: 500.0,
            defaults: SegmentDefaults::default(),
        }
    }
}

/// Read an optional override from the environment, falling back to the
/// current value when the variable is not set
fn env_override<T: FromStr>(key: &'static str, current: T) -> EngineResult<T> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| EngineError::Config { key, value }),
        Err(_) => Ok(current),
    }
}

fn invalid(key: &'static str, value: impl ToString) -> EngineError {
    EngineError::Config {
        key,
        value: value.to_string(),
    }
}

impl EngineConfig {
    /// Start from the default settings and apply any RG_* overrides which
    /// have been set in the environment
    pub fn from_env() -> EngineResult<EngineConfig> {
        let base = EngineConfig::default();

        let config = EngineConfig {
            max_spacing: env_override("RG_MAX_SPACING", base.max_spacing)?,
            new_node_spacing: env_override(
                "RG_NEW_NODE_SPACING",
                base.new_node_spacing,
            )?,
            smoothing_window: env_override(
                "RG_SMOOTHING_WINDOW",
                base.smoothing_window,
            )?,
            slope_threshold: env_override(
                "RG_SLOPE_THRESHOLD",
                base.slope_threshold,
            )?,
            slope_tolerance: env_override(
                "RG_SLOPE_TOLERANCE",
                base.slope_tolerance,
            )?,
            elevation_batch_size: env_override(
                "RG_ELEVATION_BATCH_SIZE",
                base.elevation_batch_size,
            )?,
            congestion_snap_distance: env_override(
                "RG_CONGESTION_SNAP_DISTANCE",
                base.congestion_snap_distance,
            )?,
            congestion_centre_distance: env_override(
                "RG_CONGESTION_CENTRE_DISTANCE",
                base.congestion_centre_distance,
            )?,
            defaults: base.defaults,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings which would stall or break processing: spacings and
    /// radii must be positive and finite, batches must hold at least one
    /// point and the slope limits can't be negative
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("max_spacing", self.max_spacing),
            ("new_node_spacing", self.new_node_spacing),
            ("congestion_centre_distance", self.congestion_centre_distance),
        ];
        let non_negative = [
            ("slope_threshold", self.slope_threshold),
            ("slope_tolerance", self.slope_tolerance),
            ("congestion_snap_distance", self.congestion_snap_distance),
        ];

        for (key, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(key, value));
            }
        }
        for (key, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(key, value));
            }
        }
        if self.elevation_batch_size == 0 {
            return Err(invalid("elevation_batch_size", 0));
        }

        Ok(())
    }

    pub fn spacing(&self) -> Spacing {
        Spacing {
            max_spacing: self.max_spacing,
            new_node_spacing: self.new_node_spacing,
        }
    }
}
