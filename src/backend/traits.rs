//! Device capability interface
//!
//! The frame pipeline never talks to a concrete graphics API. It hands a
//! closed command list and the slot's upload regions to a [`Device`], tagged
//! with the fence token the device must signal on its timeline once the work
//! has retired.

use std::sync::Arc;

use thiserror::Error;

use crate::fence::{FenceTimeline, FenceToken};
use crate::frame::{CommandList, FrameSlot};

/// Device error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to initialize device: {0}")]
    InitializationFailed(String),
    #[error("Submission rejected: {0}")]
    Rejected(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Work for one frame, borrowed from the slot it was recorded into.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub token: FenceToken,
    pub slot: &'a FrameSlot,
}

impl<'a> Submission<'a> {
    pub fn new(slot: &'a FrameSlot, token: FenceToken) -> Self {
        Self { token, slot }
    }

    pub fn slot_index(&self) -> usize {
        self.slot.index()
    }

    pub fn commands(&self) -> &'a CommandList {
        self.slot.commands()
    }

    /// Bytes the device reads from the slot for this frame.
    pub fn upload_size(&self) -> usize {
        self.slot.pass_region().as_bytes().len()
            + self.slot.object_region().as_bytes().len()
            + self.slot.material_region().as_bytes().len()
            + self.slot.dynamic_vertex_region().as_bytes().len()
    }
}

/// Asynchronous executor of recorded frames.
pub trait Device {
    /// Human readable backend name for logs
    fn name(&self) -> &'static str;

    /// Completion counter this device signals as submissions retire.
    fn timeline(&self) -> Arc<dyn FenceTimeline>;

    /// Queue a frame. The device may read the slot's regions until it signals
    /// `submission.token` on its timeline.
    fn submit(&mut self, submission: Submission<'_>) -> DeviceResult<()>;
}
