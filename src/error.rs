use crate::physics::{BodyHandle, SensorHandle};

/// Errors raised by the physics backend.
#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("body handle {0} is stale or unknown")]
    StaleBody(BodyHandle),

    #[error("sensor handle {0} is stale or unknown")]
    StaleSensor(SensorHandle),

    #[error("triangle mesh has no triangles")]
    EmptyMesh,

    #[error("triangle index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },

    #[error("invalid shape: {0}")]
    InvalidShape(&'static str),

    #[error("out of memory while allocating physics resources")]
    OutOfMemory,
}

/// Errors raised while building or chaining track segments.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    #[error("invalid segment parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("sample count `{name}` must be at least 1, got {value}")]
    InvalidSampleCount { name: &'static str, value: u32 },

    #[error("segment {index} does not meet the exit of the previous segment")]
    Discontinuity { index: usize },

    #[error(transparent)]
    Physics(#[from] PhysicsError),
}

impl TrackError {
    /// Reject anything that is not a finite, strictly positive dimension.
    pub(crate) fn require_positive(name: &'static str, value: f32) -> Result<(), TrackError> {
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(TrackError::InvalidParameter { name, value })
        }
    }

    pub(crate) fn require_finite(name: &'static str, value: f32) -> Result<(), TrackError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(TrackError::InvalidParameter { name, value })
        }
    }

    pub(crate) fn require_samples(name: &'static str, value: u32) -> Result<(), TrackError> {
        if value >= 1 {
            Ok(())
        } else {
            Err(TrackError::InvalidSampleCount { name, value })
        }
    }
}
