//! Types and settings shared by every stage of the pipeline

pub mod config;
pub mod error;
pub mod geometry;
pub mod graph_data;
