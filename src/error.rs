//! Engine error types.
//!
//! Every variant here is fatal for the caller's frame loop. There is no retry
//! tier below this: a device failure is reported, never masked.

use std::collections::TryReserveError;

use thiserror::Error;

use crate::backend::DeviceError;
use crate::scene::EntityId;

/// Errors surfaced by the frame pipeline.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to allocate {elements} elements for {region} region")]
    ResourceExhaustion {
        region: &'static str,
        elements: usize,
        #[source]
        source: TryReserveError,
    },
    #[error("Submission failed: {0}")]
    Submission(#[from] DeviceError),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Unknown or removed entity {0:?}")]
    UnknownEntity(EntityId),
}

pub type EngineResult<T> = Result<T, EngineError>;
