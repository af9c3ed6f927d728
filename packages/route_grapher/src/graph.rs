//! This module merges segmented routes into a single directed graph, fills
//! the gaps in its attributes and hands it over for persistence.

pub mod builder;
pub mod congestion;
pub mod enrich;
pub mod export;
