//! Selects the points at which a route stops being homogeneous, i.e. where
//! either the speed limit changes or the slope shifts by more than the
//! configured tolerance.

use crate::common::error::{EngineError, EngineResult};

/// Return the indices at which a new segment starts, always beginning with
/// 0. `max_speeds` holds one value per point and `slopes` one value per pair
/// of points, so `max_speeds` must be exactly one longer. The speed of the
/// final point is never compared.
pub fn segment(
    max_speeds: &[f64],
    slopes: &[f64],
    slope_tolerance: f64,
) -> EngineResult<Vec<usize>> {
    if max_speeds.len() != slopes.len() + 1 {
        return Err(EngineError::MisalignedInput {
            context: "segmenter max speeds",
            expected: slopes.len() + 1,
            found: max_speeds.len(),
        });
    }

    let mut indices = vec![0];

    for inx in 1..slopes.len() {
        let speed_changed = max_speeds[inx] != max_speeds[inx - 1];
        let slope_changed =
            (slopes[inx] - slopes[inx - 1]).abs() > slope_tolerance;
        if speed_changed || slope_changed {
            indices.push(inx);
        }
    }

    Ok(indices)
}
