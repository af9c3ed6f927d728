//! Error type shared by every stage of the route processing pipeline

use thiserror::Error;

/// Errors raised by the external collaborators (elevation, tag and routing
/// lookups). The engine only ever propagates these.
pub type LookupError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid coordinate ({lat}, {lon})")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("misaligned {context}: expected {expected}, found {found}")]
    MisalignedInput {
        context: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("a route needs at least two coordinates, received {0}")]
    RouteTooShort(usize),

    #[error(
        "no edge with retrieved attributes reachable from edge {edge} \
         after {steps} steps"
    )]
    GapFillExhausted { edge: String, steps: usize },

    #[error("lookup failed: {0}")]
    Lookup(#[source] LookupError),

    #[error("graph sink failed: {0}")]
    Sink(#[source] LookupError),

    #[error("unable to parse {key}={value}")]
    Config { key: &'static str, value: String },
}

pub type EngineResult<T> = Result<T, EngineError>;
