//! Turns the raw elevation profile of a densified route into a smoothed
//! slope series. Elevation data is noisy, so heights are first averaged over
//! a centred window before slopes are taken against distance travelled.

use crate::common::error::{EngineError, EngineResult};

/// Settings for slope smoothing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeSettings {
    pub window: usize,
    pub threshold: f64,
}

/// Centred moving average over `window` points. The window for index `i`
/// covers `i - window / 2 .. i - window / 2 + window`; any index whose window
/// does not fit inside the series, or holds a non-finite value, has no value.
pub fn centred_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let half = window / 2;

    (0..values.len())
        .map(|inx| {
            if window == 0 || inx < half {
                return None;
            }
            let start = inx - half;
            let run = values.get(start..start + window)?;
            match run.iter().all(|value| value.is_finite()) {
                true => Some(run.iter().sum::<f64>() / window as f64),
                false => None,
            }
        })
        .collect()
}

/// Distance travelled at each point, accumulated with the trapezoidal rule
/// over neighbouring pair distances
pub fn distance_travelled(distances: &[f64]) -> Vec<f64> {
    let mut travelled = Vec::with_capacity(distances.len());
    for (inx, dist) in distances.iter().enumerate() {
        match inx {
            0 => travelled.push(0.0),
            _ => {
                let prev = travelled[inx - 1];
                travelled.push(prev + 0.5 * (dist + distances[inx - 1]));
            }
        }
    }
    travelled
}

/// Calculate a slope (%) for every pair of consecutive points along a route.
/// `distances` holds the pair distances and `heights` the elevation at each
/// point; only the first `distances.len()` heights contribute. Slopes with no
/// smoothed height on either side are reported as 0, and every slope is
/// clipped to the configured threshold.
pub fn calculate_slopes(
    distances: &[f64],
    heights: &[f64],
    settings: &SlopeSettings,
) -> EngineResult<Vec<f64>> {
    let n = distances.len();
    if heights.len() < n {
        return Err(EngineError::MisalignedInput {
            context: "slope heights",
            expected: n,
            found: heights.len(),
        });
    }

    let mean_heights = centred_mean(&heights[..n], settings.window);
    let travelled = distance_travelled(distances);

    let mut slopes = Vec::with_capacity(n);
    for inx in 0..n {
        let slope = match inx {
            0 => 0.0,
            _ => match (mean_heights[inx], mean_heights[inx - 1]) {
                (Some(cur), Some(prev)) => {
                    let dist_delta = travelled[inx] - travelled[inx - 1];
                    match dist_delta != 0.0 {
                        true => (cur - prev) / dist_delta * 100.0,
                        false => 0.0,
                    }
                }
                _ => 0.0,
            },
        };
        let slope = match slope.is_finite() {
            true => slope,
            false => 0.0,
        };
        slopes.push(slope.clamp(-settings.threshold, settings.threshold));
    }

    Ok(slopes)
}
