//! This module turns the raw coordinates of a single route into a segmented
//! route, with elevation and road attributes pulled from the lookups.

pub mod lookups;
pub mod route;
pub mod segmenter;
pub mod slopes;
