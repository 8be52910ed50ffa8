//! Per-frame state machine.
//!
//! [`FrameOrchestrator::advance_frame`] drives one frame through every state,
//! in order:
//!
//! ```text
//! Idle ─► SlotAcquired ─► Mutated ─► Propagated ─► Recorded ─► Submitted ─► Idle
//!   │          │              │           │            │            │
//!   │          │              │           │            │            └ token stored in slot
//!   │          │              │           │            └ commands recorded against the slot
//!   │          │              │           └ stale replicas + dynamic geometry + pass written
//!   │          │              └ mutators and simulation step run
//!   │          └ cursor advanced, slot's previous submission waited on
//!   └ previous frame finished
//! ```
//!
//! A frame that fails part way (a mutator error, a rejected submission) leaves
//! the orchestrator outside `Idle`; the frame loop is over and the caller
//! decides what to do with the error.
//!
//! # Shutdown
//!
//! Dropping the orchestrator drains every slot first, so the device never
//! reads a region after it has been freed. Call
//! [`wait_idle_timeout`](FrameOrchestrator::wait_idle_timeout) beforehand to
//! detect a stalled device without hanging.

use std::time::Duration;

use crate::animation::{FrameTime, MutationContext, SceneMutator};
use crate::backend::{Device, Submission};
use crate::config::PipelineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fence::{FenceSynchronizer, FenceToken};
use crate::frame::{FrameRecorder, FrameResourceRing, FrameSlot, PipelineCursor};
use crate::resources::PassConstants;
use crate::scene::{EntityId, MaterialId, MaterialParams, ObjectTransform, RenderItemId, Scene};
use crate::simulation::Simulation;
use crate::tracker::{DirtyPropagationTracker, PropagationStats};

/// Stage of the frame currently being built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    SlotAcquired,
    Mutated,
    Propagated,
    Recorded,
    Submitted,
}

impl FrameState {
    fn successor(self) -> FrameState {
        match self {
            FrameState::Idle => FrameState::SlotAcquired,
            FrameState::SlotAcquired => FrameState::Mutated,
            FrameState::Mutated => FrameState::Propagated,
            FrameState::Propagated => FrameState::Recorded,
            FrameState::Recorded => FrameState::Submitted,
            FrameState::Submitted => FrameState::Idle,
        }
    }
}

fn enter(state: &mut FrameState, next: FrameState) {
    debug_assert_eq!(
        state.successor(),
        next,
        "illegal frame transition {:?} -> {:?}",
        state,
        next
    );
    *state = next;
}

/// What happened during one [`FrameOrchestrator::advance_frame`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// 1-based frame number
    pub frame: u64,
    pub slot: usize,
    pub token: FenceToken,
    /// Whether acquiring the slot had to wait for the device
    pub stalled: bool,
    pub propagated: PropagationStats,
    pub draws: usize,
}

/// Drives the scene, the slot ring and the device one frame at a time.
pub struct FrameOrchestrator<D: Device> {
    config: PipelineConfig,
    device: D,
    fence: FenceSynchronizer,
    ring: FrameResourceRing,
    tracker: DirtyPropagationTracker,
    scene: Scene,
    cursor: PipelineCursor,
    state: FrameState,
    current_slot: Option<usize>,
    simulation: Option<Box<dyn Simulation>>,
    mutators: Vec<Box<dyn SceneMutator>>,
    recorder: Box<dyn FrameRecorder>,
    pass: PassConstants,
    time: FrameTime,
    frame_count: u64,
}

impl<D: Device> FrameOrchestrator<D> {
    /// Size the ring for `scene` and take ownership of everything.
    ///
    /// The scene must have been built for `config.frames_in_flight`.
    pub fn new(
        config: PipelineConfig,
        device: D,
        scene: Scene,
        recorder: impl FrameRecorder + 'static,
    ) -> EngineResult<Self> {
        config.validate()?;
        if scene.frames_in_flight() != config.frames_in_flight {
            return Err(EngineError::InvalidConfig(format!(
                "scene built for {} frames in flight, pipeline configured for {}",
                scene.frames_in_flight(),
                config.frames_in_flight
            )));
        }

        let n = config.frames_in_flight;
        let fence = FenceSynchronizer::new(device.timeline());
        let mut ring = FrameResourceRing::new(n, config.constant_alignment)?;
        ring.resize_for(scene.render_item_count(), scene.material_count(), &fence)?;

        log::info!(
            "{}: {} frames in flight on '{}' device ({} objects, {} materials)",
            config.label,
            n,
            device.name(),
            scene.render_item_count(),
            scene.material_count()
        );

        Ok(Self {
            device,
            fence,
            ring,
            tracker: DirtyPropagationTracker::new(n),
            scene,
            cursor: PipelineCursor::new(n),
            state: FrameState::Idle,
            current_slot: None,
            simulation: None,
            mutators: Vec::new(),
            recorder: Box::new(recorder),
            pass: PassConstants::default(),
            time: FrameTime::default(),
            frame_count: 0,
            config,
        })
    }

    /// Attach the simulation whose snapshot feeds the dynamic vertex regions.
    pub fn with_simulation(mut self, simulation: impl Simulation + 'static) -> EngineResult<Self> {
        self.ring
            .resize_dynamic_geometry(simulation.vertex_count(), &self.fence)?;
        self.simulation = Some(Box::new(simulation));
        Ok(self)
    }

    pub fn add_mutator(&mut self, mutator: impl SceneMutator + 'static) {
        self.mutators.push(Box::new(mutator));
    }

    /// Pass constants written into every frame. Time fields are overwritten
    /// by the frame clock.
    pub fn set_pass_constants(&mut self, pass: PassConstants) {
        self.pass = pass;
    }

    /// Run one frame through the whole state machine.
    ///
    /// May block in slot acquisition while the device is N-1 frames behind.
    ///
    /// # Panics
    ///
    /// Panics if a previous frame failed part way.
    pub fn advance_frame(&mut self, delta_time: f32) -> EngineResult<FrameReport> {
        assert_eq!(
            self.state,
            FrameState::Idle,
            "advance_frame called after a failed frame"
        );

        if self.scene.render_item_count() > self.ring.object_capacity()
            || self.scene.material_count() > self.ring.material_capacity()
        {
            self.resize_scene_regions()?;
        }

        self.time.tick(delta_time);
        self.frame_count += 1;

        // Idle -> SlotAcquired
        let slot_index = self.cursor.advance();
        let stalls = self.fence.stall_count();
        let slot = self.ring.acquire_slot(slot_index, &self.fence);
        let stalled = self.fence.stall_count() > stalls;
        self.current_slot = Some(slot_index);
        enter(&mut self.state, FrameState::SlotAcquired);

        // SlotAcquired -> Mutated
        let mut context = MutationContext::new(&mut self.scene, &self.tracker);
        for mutator in &mut self.mutators {
            mutator.mutate(&self.time, &mut context)?;
        }
        if let Some(simulation) = &mut self.simulation {
            simulation.step_simulation(self.time.delta_time);
        }
        enter(&mut self.state, FrameState::Mutated);

        // Mutated -> Propagated
        let propagated = self.tracker.propagate(&mut self.scene, slot);
        if let Some(simulation) = &self.simulation {
            slot.write_dynamic_geometry(simulation.current_snapshot(), simulation.extent());
        }
        let mut pass = self.pass;
        pass.total_time = self.time.total_time;
        pass.delta_time = self.time.delta_time;
        slot.write_pass_constants(&pass);
        enter(&mut self.state, FrameState::Propagated);

        // Propagated -> Recorded
        let commands = slot.begin_recording();
        self.recorder.record(&self.scene, slot_index, commands);
        commands.close();
        let draws = commands.draw_count();
        enter(&mut self.state, FrameState::Recorded);

        // Recorded -> Submitted
        let token = self.fence.submit();
        self.device.submit(Submission::new(slot, token))?;
        slot.mark_submitted(token);
        enter(&mut self.state, FrameState::Submitted);

        log::trace!(
            "Frame {} submitted from slot {} as {} ({} draws, {} replicas)",
            self.frame_count,
            slot_index,
            token,
            draws,
            propagated.total()
        );

        enter(&mut self.state, FrameState::Idle);

        Ok(FrameReport {
            frame: self.frame_count,
            slot: slot_index,
            token,
            stalled,
            propagated,
            draws,
        })
    }

    /// Flag an entity whose value changed outside [`update_material`] /
    /// [`update_render_item`].
    ///
    /// [`update_material`]: Self::update_material
    /// [`update_render_item`]: Self::update_render_item
    pub fn on_entity_mutated(&mut self, id: impl Into<EntityId>) -> EngineResult<()> {
        self.scene.mark_dirty(id.into(), &self.tracker)
    }

    pub fn update_material(
        &mut self,
        id: MaterialId,
        update: impl FnOnce(&mut MaterialParams),
    ) -> EngineResult<()> {
        self.scene.update_material(id, &self.tracker, update)
    }

    pub fn update_render_item(
        &mut self,
        id: RenderItemId,
        update: impl FnOnce(&mut ObjectTransform),
    ) -> EngineResult<()> {
        self.scene.update_render_item(id, &self.tracker, update)
    }

    /// Grow every slot's uniform regions to the scene's entity counts.
    ///
    /// Drains in-flight work first. Replicas and stale counts of existing
    /// entities are kept; new entities start stale in every slot.
    pub fn resize_scene_regions(&mut self) -> EngineResult<()> {
        log::debug!(
            "Resizing slot regions for {} objects, {} materials",
            self.scene.render_item_count(),
            self.scene.material_count()
        );
        self.ring.resize_for(
            self.scene.render_item_count(),
            self.scene.material_count(),
            &self.fence,
        )
    }

    /// Slot of the most recent frame.
    pub fn current_frame(&self) -> Option<&FrameSlot> {
        self.current_slot.map(|index| self.ring.slot(index))
    }

    pub fn current_slot(&self) -> Option<usize> {
        self.current_slot
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Frames started so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn time(&self) -> FrameTime {
        self.time
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Scene access for adding entities. Values of existing entities can only
    /// change through [`update_material`](Self::update_material) and
    /// [`update_render_item`](Self::update_render_item).
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    pub fn ring(&self) -> &FrameResourceRing {
        &self.ring
    }

    pub fn fence(&self) -> &FenceSynchronizer {
        &self.fence
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Wait for all in-flight device work.
    pub fn wait_idle(&self) {
        log::debug!("Waiting for {} to go idle", self.config.label);
        self.ring.drain(&self.fence);
    }

    /// Like [`wait_idle`](Self::wait_idle), returning `false` if `timeout`
    /// elapses first.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        self.ring.drain_timeout(&self.fence, timeout)
    }
}

impl<D: Device> Drop for FrameOrchestrator<D> {
    fn drop(&mut self) {
        let in_flight = self.ring.last_submitted();
        if !self.fence.is_retired(in_flight) {
            log::warn!(
                "{} dropped with work in flight (last {}, completed {}); draining",
                self.config.label,
                in_flight,
                self.fence.completed_token()
            );
        }
        self.wait_idle();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ManualDevice;
    use crate::frame::LayeredRecorder;
    use crate::scene::{HandleRegistry, MaterialDesc, RenderItemDesc};
    use glam::Vec4;

    fn orchestrator(n: usize) -> (FrameOrchestrator<ManualDevice>, MaterialId) {
        let mut scene = Scene::new(n);
        let material = scene.add_material(MaterialDesc::default());
        scene
            .add_render_item(RenderItemDesc::dynamic(material))
            .unwrap();

        let mut pipelines = HandleRegistry::new();
        let recorder = LayeredRecorder::from_registry(&mut pipelines, Vec4::ONE);
        let device = ManualDevice::new().with_auto_retire(true);
        let orchestrator =
            FrameOrchestrator::new(PipelineConfig::new(n), device, scene, recorder).unwrap();
        (orchestrator, material)
    }

    #[test]
    fn test_frames_cycle_slots_and_return_to_idle() {
        let (mut orchestrator, _) = orchestrator(3);
        assert_eq!(orchestrator.state(), FrameState::Idle);
        assert!(orchestrator.current_frame().is_none());

        let slots: Vec<usize> = (0..7)
            .map(|_| orchestrator.advance_frame(0.016).unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(orchestrator.state(), FrameState::Idle);
        assert_eq!(orchestrator.frame_count(), 7);
        assert_eq!(orchestrator.current_frame().unwrap().index(), 0);
    }

    #[test]
    fn test_tokens_strictly_increase() {
        let (mut orchestrator, _) = orchestrator(2);
        let mut previous = FenceToken::NONE;
        for _ in 0..5 {
            let report = orchestrator.advance_frame(0.016).unwrap();
            assert!(report.token > previous);
            assert_eq!(orchestrator.current_frame().unwrap().last_submitted(), report.token);
            previous = report.token;
        }
    }

    #[test]
    fn test_pass_constants_carry_frame_time() {
        let (mut orchestrator, _) = orchestrator(2);
        orchestrator.advance_frame(0.5).unwrap();
        orchestrator.advance_frame(0.25).unwrap();

        let pass = orchestrator.current_frame().unwrap().pass_region().element(0);
        assert_eq!(pass.delta_time, 0.25);
        assert_eq!(pass.total_time, 0.75);
        assert_eq!(pass.ambient_light, Vec4::new(0.15, 0.15, 0.25, 1.0));
    }

    #[test]
    fn test_mismatched_depth_is_rejected() {
        let scene = Scene::new(2);
        let mut pipelines = HandleRegistry::new();
        let recorder = LayeredRecorder::from_registry(&mut pipelines, Vec4::ONE);
        let result =
            FrameOrchestrator::new(PipelineConfig::new(3), ManualDevice::new(), scene, recorder);
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn test_on_entity_mutated_resets_countdown() {
        let (mut orchestrator, material) = orchestrator(3);
        for _ in 0..3 {
            orchestrator.advance_frame(0.016).unwrap();
        }
        assert_eq!(orchestrator.scene().stale_replicas(material.into()), Some(0));

        orchestrator.on_entity_mutated(material).unwrap();
        assert_eq!(orchestrator.scene().stale_replicas(material.into()), Some(3));
    }

    #[test]
    fn test_successor_chain_returns_to_idle() {
        let mut state = FrameState::Idle;
        for _ in 0..6 {
            state = state.successor();
        }
        assert_eq!(state, FrameState::Idle);
    }
}
