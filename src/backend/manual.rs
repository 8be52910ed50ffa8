//! Headless device driven by the caller.
//!
//! Submissions are captured instead of executed and retire only when the
//! owner of a [`DeviceController`] says so. Used by tests and tools that need
//! to reason about exactly which frames are in flight.
//!
//! Only the most recent [`ManualDevice::DEFAULT_CAPTURE_LIMIT`] submissions
//! are kept unless a different limit is configured.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Device, DeviceError, DeviceResult, Submission};
use crate::fence::{CpuTimeline, FenceTimeline, FenceToken};
use crate::frame::Command;
use crate::resources::{MaterialConstants, ObjectConstants, PassConstants};

/// Copy of what the device saw for one submission.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub token: FenceToken,
    pub slot: usize,
    pub commands: Vec<Command>,
    pub pass: PassConstants,
    pub objects: Vec<ObjectConstants>,
    pub materials: Vec<MaterialConstants>,
    pub dynamic_vertex_count: usize,
}

#[derive(Debug, Default)]
struct ManualState {
    pending: VecDeque<FenceToken>,
    captured: VecDeque<CapturedFrame>,
    capture_limit: usize,
    reject_next: Option<String>,
}

/// Shared handle that retires work submitted to a [`ManualDevice`].
#[derive(Debug, Clone)]
pub struct DeviceController {
    timeline: Arc<CpuTimeline>,
    state: Arc<Mutex<ManualState>>,
}

impl DeviceController {
    /// Retire the oldest pending submission.
    pub fn retire_next(&self) -> Option<FenceToken> {
        let token = self.state.lock().pending.pop_front()?;
        self.timeline.signal(token);
        Some(token)
    }

    /// Retire every pending submission up to and including `token`.
    pub fn retire_through(&self, token: FenceToken) {
        let mut state = self.state.lock();
        while state.pending.front().is_some_and(|&pending| pending <= token) {
            state.pending.pop_front();
        }
        self.timeline.signal(token);
    }

    pub fn retire_all(&self) {
        let last = {
            let mut state = self.state.lock();
            let last = state.pending.back().copied();
            state.pending.clear();
            last
        };
        if let Some(token) = last {
            self.timeline.signal(token);
        }
    }

    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn completed(&self) -> FenceToken {
        self.timeline.completed()
    }

    /// Make the next submission fail with [`DeviceError::Rejected`].
    pub fn reject_next_submission(&self, reason: &str) {
        self.state.lock().reject_next = Some(reason.to_string());
    }

    /// Frames submitted so far, oldest first.
    /// Retained submissions, oldest first.
    pub fn captured(&self) -> Vec<CapturedFrame> {
        self.state.lock().captured.iter().cloned().collect()
    }

    pub fn last_captured(&self) -> Option<CapturedFrame> {
        self.state.lock().captured.back().cloned()
    }

    /// Forget every retained submission.
    pub fn clear_captured(&self) {
        self.state.lock().captured.clear();
    }
}

/// Device whose queue only advances on request.
#[derive(Debug)]
pub struct ManualDevice {
    controller: DeviceController,
    auto_retire: bool,
}

impl ManualDevice {
    /// Submissions retained for inspection by default
    pub const DEFAULT_CAPTURE_LIMIT: usize = 64;

    pub fn new() -> Self {
        let state = ManualState {
            capture_limit: Self::DEFAULT_CAPTURE_LIMIT,
            ..ManualState::default()
        };
        Self {
            controller: DeviceController {
                timeline: Arc::new(CpuTimeline::new()),
                state: Arc::new(Mutex::new(state)),
            },
            auto_retire: false,
        }
    }

    /// Retire every submission as soon as it is made.
    pub fn with_auto_retire(mut self, auto_retire: bool) -> Self {
        self.auto_retire = auto_retire;
        self
    }

    /// Keep at most `limit` submissions; older ones are dropped first.
    /// A limit of 0 disables capturing.
    pub fn with_capture_limit(self, limit: usize) -> Self {
        self.controller.state.lock().capture_limit = limit;
        self
    }

    pub fn controller(&self) -> DeviceController {
        self.controller.clone()
    }
}

impl Default for ManualDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for ManualDevice {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn timeline(&self) -> Arc<dyn FenceTimeline> {
        self.controller.timeline.clone()
    }

    fn submit(&mut self, submission: Submission<'_>) -> DeviceResult<()> {
        let slot = submission.slot;
        let commands = submission.commands();
        if !commands.is_closed() {
            return Err(DeviceError::Rejected(format!(
                "command list of slot {} is not closed",
                slot.index()
            )));
        }

        {
            let mut state = self.controller.state.lock();
            if let Some(reason) = state.reject_next.take() {
                return Err(DeviceError::Rejected(reason));
            }

            if state.capture_limit > 0 {
                while state.captured.len() >= state.capture_limit {
                    state.captured.pop_front();
                }
                let objects = slot.object_region();
                let materials = slot.material_region();
                state.captured.push_back(CapturedFrame {
                    token: submission.token,
                    slot: slot.index(),
                    commands: commands.commands().to_vec(),
                    pass: slot.pass_region().element(0),
                    objects: (0..objects.len()).map(|i| objects.element(i)).collect(),
                    materials: (0..materials.len()).map(|i| materials.element(i)).collect(),
                    dynamic_vertex_count: slot.dynamic_vertex_region().len(),
                });
            }
            state.pending.push_back(submission.token);
        }

        log::trace!(
            "Manual device captured slot {} as {}",
            slot.index(),
            submission.token
        );

        if self.auto_retire {
            self.controller.retire_through(submission.token);
        }
        Ok(())
    }
}
