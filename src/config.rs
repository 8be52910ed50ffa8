//! Pipeline configuration

use glam::Vec4;

use crate::error::{EngineError, EngineResult};

/// Configuration for building a [`FrameOrchestrator`](crate::FrameOrchestrator).
///
/// The pipeline depth is fixed for the lifetime of the engine.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Debug name used in log lines
    pub label: String,
    /// Number of frames that may be in flight (N)
    pub frames_in_flight: usize,
    /// Byte stride that uniform region elements are rounded up to
    pub constant_alignment: usize,
    /// Back buffer clear color
    pub clear_color: Vec4,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            label: "frame-pipeline".to_string(),
            frames_in_flight: 3,
            constant_alignment: 256,
            clear_color: Vec4::new(0.690, 0.769, 0.871, 1.0),
        }
    }
}

impl PipelineConfig {
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight,
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn with_constant_alignment(mut self, alignment: usize) -> Self {
        self.constant_alignment = alignment;
        self
    }

    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear_color = color;
        self
    }

    /// Reject configurations the ring cannot be built from.
    pub fn validate(&self) -> EngineResult<()> {
        if self.frames_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "frames_in_flight must be at least 1".into(),
            ));
        }
        if !self.constant_alignment.is_power_of_two() {
            return Err(EngineError::InvalidConfig(format!(
                "constant_alignment must be a power of two, got {}",
                self.constant_alignment
            )));
        }
        Ok(())
    }
}
