//! Shared fixtures for frame pipeline integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Vec3};
use parking_lot::Mutex;

use frame_pipeline::{
    Device, DeviceResult, DrawArgs, FenceTimeline, FenceToken, FrameOrchestrator, GeometryHandle,
    GridExtent, HandleRegistry, LayeredRecorder, ManualDevice, MaterialDesc, MaterialId,
    PipelineConfig, RenderItemDesc, RenderItemId, Scene, SimVertex, Simulation, Submission,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Scene with `objects` static render items sharing one material.
pub struct TestScene {
    pub scene: Scene,
    pub material: MaterialId,
    pub items: Vec<RenderItemId>,
    pub geometry: GeometryHandle,
}

pub fn build_scene(frames_in_flight: usize, objects: usize) -> TestScene {
    let mut geometries = HandleRegistry::<GeometryHandle>::new();
    let geometry = geometries.register("boxGeo");

    let mut scene = Scene::new(frames_in_flight);
    let material = scene.add_material(MaterialDesc::new("stone"));
    let items = (0..objects)
        .map(|i| {
            scene
                .add_render_item(
                    RenderItemDesc::new(material, geometry, DrawArgs::new(36))
                        .with_world(translation(i as f32)),
                )
                .unwrap()
        })
        .collect();

    TestScene {
        scene,
        material,
        items,
        geometry,
    }
}

pub fn translation(x: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(x, 0.0, 0.0))
}

pub fn orchestrator<D: Device>(
    frames_in_flight: usize,
    device: D,
    scene: Scene,
) -> FrameOrchestrator<D> {
    init_logging();
    let config = PipelineConfig::new(frames_in_flight).with_label("test");
    let mut pipelines = HandleRegistry::new();
    let recorder = LayeredRecorder::from_registry(&mut pipelines, config.clear_color);
    FrameOrchestrator::new(config, device, scene, recorder).unwrap()
}

pub fn manual_orchestrator(
    frames_in_flight: usize,
    scene: Scene,
) -> FrameOrchestrator<ManualDevice> {
    orchestrator(
        frames_in_flight,
        ManualDevice::new().with_auto_retire(true),
        scene,
    )
}

// ============================================================================
// Fake device
// ============================================================================

/// Timeline that never advances and records wait calls instead of blocking.
#[derive(Debug, Default)]
pub struct FrozenTimeline {
    waits: Mutex<Vec<FenceToken>>,
}

impl FrozenTimeline {
    pub fn waits(&self) -> Vec<FenceToken> {
        self.waits.lock().clone()
    }
}

impl FenceTimeline for FrozenTimeline {
    fn completed(&self) -> FenceToken {
        FenceToken::NONE
    }

    fn wait_until(&self, token: FenceToken) {
        self.waits.lock().push(token);
    }

    fn wait_until_timeout(&self, token: FenceToken, _timeout: Duration) -> bool {
        self.waits.lock().push(token);
        false
    }
}

/// Device that accepts every submission and never retires any of them.
#[derive(Debug, Default)]
pub struct StalledDevice {
    pub timeline: Arc<FrozenTimeline>,
    pub submitted: Vec<FenceToken>,
}

impl Device for StalledDevice {
    fn name(&self) -> &'static str {
        "stalled"
    }

    fn timeline(&self) -> Arc<dyn FenceTimeline> {
        self.timeline.clone()
    }

    fn submit(&mut self, submission: Submission<'_>) -> DeviceResult<()> {
        self.submitted.push(submission.token);
        Ok(())
    }
}

// ============================================================================
// Simulation
// ============================================================================

/// Flat `size` x `size` grid whose height equals the accumulated time.
pub struct RisingGrid {
    vertices: Vec<SimVertex>,
    extent: GridExtent,
    height: f32,
}

impl RisingGrid {
    pub fn new(size: usize, spacing: f32) -> Self {
        let half = (size - 1) as f32 * spacing * 0.5;
        let vertices = (0..size * size)
            .map(|i| SimVertex {
                position: Vec3::new(
                    (i % size) as f32 * spacing - half,
                    0.0,
                    half - (i / size) as f32 * spacing,
                ),
                normal: Vec3::Y,
            })
            .collect();
        let width = (size - 1) as f32 * spacing;
        Self {
            vertices,
            extent: GridExtent::new(width, width),
            height: 0.0,
        }
    }
}

impl Simulation for RisingGrid {
    fn step_simulation(&mut self, dt: f32) {
        self.height += dt;
        for vertex in &mut self.vertices {
            vertex.position.y = self.height;
        }
    }

    fn current_snapshot(&self) -> &[SimVertex] {
        &self.vertices
    }

    fn extent(&self) -> GridExtent {
        self.extent
    }
}
