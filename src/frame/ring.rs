//! Ring of per-frame resource slots.
//!
//! ```text
//! N = 3
//!
//! CPU:    [rec 0][rec 1][rec 2]  wait(0) [rec 0] wait(1) [rec 1]
//! Device:        [exec 0      ][exec 1      ][exec 2      ]
//! ```
//!
//! The CPU may run at most N-1 frames ahead of the device. Reusing a slot waits
//! on the fence token of that slot's previous submission, and only if the token
//! has not yet retired.

use std::time::{Duration, Instant};

use crate::error::EngineResult;
use crate::fence::{FenceSynchronizer, FenceToken};
use crate::resources::{MaterialConstants, ObjectConstants, PassConstants, UploadRegion, Vertex};
use crate::simulation::{GridExtent, SimVertex};

use super::CommandList;

/// One pipeline position: uniform replicas, dynamic geometry and a command
/// list, plus the token of its last submission.
#[derive(Debug)]
pub struct FrameSlot {
    index: usize,
    last_submitted: FenceToken,
    commands: CommandList,
    pass: UploadRegion<PassConstants>,
    objects: UploadRegion<ObjectConstants>,
    materials: UploadRegion<MaterialConstants>,
    dynamic_vertices: UploadRegion<Vertex>,
}

impl FrameSlot {
    fn new(index: usize, alignment: usize) -> EngineResult<Self> {
        let mut pass = UploadRegion::constant("pass", alignment);
        pass.resize(1)?;
        Ok(Self {
            index,
            last_submitted: FenceToken::NONE,
            commands: CommandList::new(),
            pass,
            objects: UploadRegion::constant("object", alignment),
            materials: UploadRegion::constant("material", alignment),
            dynamic_vertices: UploadRegion::vertex("dynamic vertex"),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Token of the last submission that read this slot, or
    /// [`FenceToken::NONE`] if it was never submitted.
    pub fn last_submitted(&self) -> FenceToken {
        self.last_submitted
    }

    /// Record that the device was handed this slot's contents under `token`.
    ///
    /// # Panics
    ///
    /// Panics if `token` is not newer than the previous one.
    pub fn mark_submitted(&mut self, token: FenceToken) {
        assert!(
            token > self.last_submitted,
            "slot {} resubmitted with non-increasing token {} (last {})",
            self.index,
            token,
            self.last_submitted
        );
        self.last_submitted = token;
    }

    pub fn commands(&self) -> &CommandList {
        &self.commands
    }

    /// Reset the command list and start recording into it.
    pub fn begin_recording(&mut self) -> &mut CommandList {
        self.commands.begin();
        &mut self.commands
    }

    pub fn pass_region(&self) -> &UploadRegion<PassConstants> {
        &self.pass
    }

    pub fn object_region(&self) -> &UploadRegion<ObjectConstants> {
        &self.objects
    }

    pub fn material_region(&self) -> &UploadRegion<MaterialConstants> {
        &self.materials
    }

    pub fn dynamic_vertex_region(&self) -> &UploadRegion<Vertex> {
        &self.dynamic_vertices
    }

    pub fn write_object_replica(&mut self, object_index: usize, value: &ObjectConstants) {
        self.objects.copy_data(object_index, value);
    }

    pub fn write_material_replica(&mut self, material_index: usize, value: &MaterialConstants) {
        self.materials.copy_data(material_index, value);
    }

    pub fn write_pass_constants(&mut self, value: &PassConstants) {
        self.pass.copy_data(0, value);
    }

    /// Rewrite the whole dynamic vertex region from a simulation snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot length differs from the region length.
    pub fn write_dynamic_geometry(&mut self, snapshot: &[SimVertex], extent: GridExtent) {
        assert_eq!(
            snapshot.len(),
            self.dynamic_vertices.len(),
            "simulation snapshot does not match dynamic vertex region of slot {}",
            self.index
        );
        for (i, sim) in snapshot.iter().enumerate() {
            self.dynamic_vertices.copy_data(i, &extent.vertex(sim));
        }
    }
}

/// N frame slots cycled round-robin
#[derive(Debug)]
pub struct FrameResourceRing {
    slots: Vec<FrameSlot>,
    object_capacity: usize,
    material_capacity: usize,
    dynamic_capacity: usize,
}

impl FrameResourceRing {
    /// Create `frames_in_flight` empty slots. Constant regions pad each
    /// element to `alignment` bytes.
    pub fn new(frames_in_flight: usize, alignment: usize) -> EngineResult<Self> {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");

        let slots = (0..frames_in_flight)
            .map(|index| FrameSlot::new(index, alignment))
            .collect::<EngineResult<Vec<_>>>()?;

        log::debug!("Created frame ring with {} slots", frames_in_flight);

        Ok(Self {
            slots,
            object_capacity: 0,
            material_capacity: 0,
            dynamic_capacity: 0,
        })
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn object_capacity(&self) -> usize {
        self.object_capacity
    }

    pub fn material_capacity(&self) -> usize {
        self.material_capacity
    }

    pub fn dynamic_vertex_capacity(&self) -> usize {
        self.dynamic_capacity
    }

    /// Hand out the slot at `cursor`, first waiting for its previous
    /// submission to retire if it has not already.
    ///
    /// # Panics
    ///
    /// Panics if `cursor` is out of range.
    pub fn acquire_slot(&mut self, cursor: usize, fence: &FenceSynchronizer) -> &mut FrameSlot {
        assert!(
            cursor < self.slots.len(),
            "cursor {} out of range ({} slots)",
            cursor,
            self.slots.len()
        );

        let slot = &mut self.slots[cursor];
        if fence.wait_until_retired(slot.last_submitted) {
            log::debug!(
                "Slot {} waited for fence {}",
                cursor,
                slot.last_submitted
            );
        }
        slot
    }

    /// Whether the slot at `index` can be acquired without waiting.
    pub fn is_slot_ready(&self, index: usize, fence: &FenceSynchronizer) -> bool {
        fence.is_retired(self.slots[index].last_submitted)
    }

    /// Size every slot's uniform regions for the given entity counts.
    ///
    /// Waits for all in-flight work first; replicas below the new counts keep
    /// their contents.
    pub fn resize_for(
        &mut self,
        object_count: usize,
        material_count: usize,
        fence: &FenceSynchronizer,
    ) -> EngineResult<()> {
        self.drain(fence);
        for slot in &mut self.slots {
            slot.objects.resize(object_count)?;
            slot.materials.resize(material_count)?;
        }
        self.object_capacity = object_count;
        self.material_capacity = material_count;

        log::debug!(
            "Resized {} slots for {} objects, {} materials",
            self.slots.len(),
            object_count,
            material_count
        );
        Ok(())
    }

    /// Size every slot's dynamic vertex region. Waits for in-flight work first.
    pub fn resize_dynamic_geometry(
        &mut self,
        vertex_count: usize,
        fence: &FenceSynchronizer,
    ) -> EngineResult<()> {
        self.drain(fence);
        for slot in &mut self.slots {
            slot.dynamic_vertices.resize(vertex_count)?;
        }
        self.dynamic_capacity = vertex_count;
        Ok(())
    }

    pub fn write_object_replica(
        &mut self,
        slot: usize,
        object_index: usize,
        value: &ObjectConstants,
    ) {
        self.slots[slot].write_object_replica(object_index, value);
    }

    pub fn write_material_replica(
        &mut self,
        slot: usize,
        material_index: usize,
        value: &MaterialConstants,
    ) {
        self.slots[slot].write_material_replica(material_index, value);
    }

    /// Wait for the last submission of every slot.
    pub fn drain(&self, fence: &FenceSynchronizer) {
        for slot in &self.slots {
            fence.wait_until_retired(slot.last_submitted);
        }
    }

    /// Like [`drain`](Self::drain) with an overall deadline. Returns `false` if
    /// it expired first.
    pub fn drain_timeout(&self, fence: &FenceSynchronizer, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        for slot in &self.slots {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !fence.wait_until_retired_timeout(slot.last_submitted, remaining) {
                return false;
            }
        }
        true
    }

    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: usize) -> &mut FrameSlot {
        &mut self.slots[index]
    }

    pub fn slots(&self) -> impl Iterator<Item = &FrameSlot> {
        self.slots.iter()
    }

    /// Highest token any slot was submitted with.
    pub fn last_submitted(&self) -> FenceToken {
        self.slots
            .iter()
            .map(|slot| slot.last_submitted)
            .max()
            .unwrap_or(FenceToken::NONE)
    }
}
