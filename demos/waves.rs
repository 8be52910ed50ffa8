//! Headless water scene driven through the frame pipeline.
//!
//! Builds a land/water/crate/tree scene, animates a height-field and scrolls the
//! water texture, and submits every frame to a simulated device with a fixed
//! execution latency. Prints how often the CPU had to wait for the device.
//!
//! ```text
//! cargo run --example waves -- --frames 600 --frames-in-flight 2 --latency-ms 20
//! ```

use std::time::{Duration, Instant};

use clap::Parser;
use glam::{Mat4, Vec3};

use frame_pipeline::{
    DrawArgs, FrameOrchestrator, GeometryHandle, GridExtent, HandleRegistry, LayeredRecorder,
    Light, MaterialDesc, MaterialScroller, PassConstants, PipelineConfig, RenderItemDesc,
    RenderLayer, Scene, SimVertex, SimulatedDevice, Simulation, TextureHandle,
};

#[derive(Parser, Debug)]
#[command(about = "Frame pipelining demo on a simulated device")]
struct Args {
    /// Number of frames to render
    #[arg(long, default_value_t = 300)]
    frames: u64,

    /// Frames allowed in flight
    #[arg(long, default_value_t = 3)]
    frames_in_flight: usize,

    /// Simulated device execution time per frame
    #[arg(long, default_value_t = 8)]
    latency_ms: u64,

    /// Water grid resolution per side
    #[arg(long, default_value_t = 128)]
    grid: usize,

    /// Fixed time step in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f32,
}

/// Sum-of-sines height field.
struct SineWaves {
    size: usize,
    spacing: f32,
    time: f32,
    vertices: Vec<SimVertex>,
}

impl SineWaves {
    fn new(size: usize, spacing: f32) -> Self {
        let mut waves = Self {
            size,
            spacing,
            time: 0.0,
            vertices: vec![SimVertex::default(); size * size],
        };
        waves.evaluate();
        waves
    }

    fn half_width(&self) -> f32 {
        (self.size - 1) as f32 * self.spacing * 0.5
    }

    fn evaluate(&mut self) {
        let half = self.half_width();
        let t = self.time;
        for row in 0..self.size {
            for col in 0..self.size {
                let x = col as f32 * self.spacing - half;
                let z = half - row as f32 * self.spacing;

                let height = 0.4 * (0.3 * x + 2.0 * t).sin() + 0.3 * (0.5 * z + t).cos();
                let dx = 0.12 * (0.3 * x + 2.0 * t).cos();
                let dz = -0.15 * (0.5 * z + t).sin();

                self.vertices[row * self.size + col] = SimVertex {
                    position: Vec3::new(x, height, z),
                    normal: Vec3::new(-dx, 1.0, -dz).normalize(),
                };
            }
        }
    }
}

impl Simulation for SineWaves {
    fn step_simulation(&mut self, dt: f32) {
        self.time += dt;
        self.evaluate();
    }

    fn current_snapshot(&self) -> &[SimVertex] {
        &self.vertices
    }

    fn extent(&self) -> GridExtent {
        let width = 2.0 * self.half_width();
        GridExtent::new(width, width)
    }
}

fn build_scene(frames_in_flight: usize, water_indices: u32) -> (Scene, frame_pipeline::MaterialId) {
    let mut textures = HandleRegistry::<TextureHandle>::new();
    let mut geometries = HandleRegistry::<GeometryHandle>::new();

    let mut scene = Scene::new(frames_in_flight);
    let grass = scene.add_material(MaterialDesc::grass(textures.register("grassTex")));
    let water = scene.add_material(MaterialDesc::water(textures.register("waterTex")));
    let wire_fence = scene.add_material(MaterialDesc::wire_fence(textures.register("fenceTex")));
    let tree = scene.add_material(
        MaterialDesc::new("treeSprites").with_texture(textures.register("treeArrayTex")),
    );

    let items = [
        RenderItemDesc::dynamic(water)
            .with_tex_transform(Mat4::from_scale(Vec3::new(5.0, 5.0, 1.0)))
            .with_args(DrawArgs::new(water_indices)),
        RenderItemDesc::new(grass, geometries.register("landGeo"), DrawArgs::new(6 * 159 * 159))
            .with_tex_transform(Mat4::from_scale(Vec3::new(5.0, 5.0, 1.0))),
        RenderItemDesc::new(wire_fence, geometries.register("boxGeo"), DrawArgs::new(36))
            .with_world(Mat4::from_translation(Vec3::new(3.0, 2.0, -9.0)))
            .with_layer(RenderLayer::AlphaTested),
        RenderItemDesc::new(tree, geometries.register("treeSpritesGeo"), DrawArgs::new(16))
            .with_layer(RenderLayer::AlphaTestedTreeSprites),
    ];
    for desc in items {
        if let Err(e) = scene.add_render_item(desc) {
            log::error!("Failed to add render item: {}", e);
        }
    }

    (scene, water)
}

fn pass_constants() -> PassConstants {
    let eye = Vec3::new(0.0, 30.0, -80.0);
    let view = Mat4::look_at_lh(eye, Vec3::ZERO, Vec3::Y);
    let proj = Mat4::perspective_lh(0.25 * std::f32::consts::PI, 16.0 / 9.0, 1.0, 1000.0);

    PassConstants::default()
        .with_camera(view, proj, eye)
        .with_render_target(1280, 720)
        .with_light(
            0,
            Light::directional(Vec3::new(0.57735, -0.57735, 0.57735), Vec3::splat(0.6)),
        )
        .with_light(
            1,
            Light::directional(Vec3::new(-0.57735, -0.57735, 0.57735), Vec3::splat(0.3)),
        )
        .with_light(
            2,
            Light::directional(Vec3::new(0.0, -0.707, -0.707), Vec3::splat(0.15)),
        )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    frame_pipeline::init();

    let args = Args::parse();
    let config = PipelineConfig::new(args.frames_in_flight).with_label("waves");
    config.validate()?;

    let waves = SineWaves::new(args.grid.max(2), 1.0);
    let water_indices = (6 * (waves.size - 1) * (waves.size - 1)) as u32;
    let (scene, water) = build_scene(config.frames_in_flight, water_indices);

    let device = SimulatedDevice::new(Duration::from_millis(args.latency_ms))?;
    let stats = device.stats();

    let mut pipelines = HandleRegistry::new();
    let recorder = LayeredRecorder::from_registry(&mut pipelines, config.clear_color);
    let mut frames =
        FrameOrchestrator::new(config, device, scene, recorder)?.with_simulation(waves)?;
    frames.add_mutator(MaterialScroller::new(water));
    frames.set_pass_constants(pass_constants());

    let start = Instant::now();
    let mut stalled_frames = 0u64;
    for _ in 0..args.frames {
        let report = frames.advance_frame(args.dt)?;
        if report.stalled {
            stalled_frames += 1;
        }
        if report.frame % 100 == 0 {
            log::info!(
                "Frame {}: slot {}, {} draws, completed {}",
                report.frame,
                report.slot,
                report.draws,
                frames.fence().completed_token()
            );
        }
    }
    let cpu_time = start.elapsed();

    if !frames.wait_idle_timeout(Duration::from_secs(5)) {
        log::warn!("Device did not go idle within 5s");
    }

    let frame_count = frames.frame_count().max(1);
    log::info!(
        "{} frames in {:.2?} ({:.2?}/frame), {} stalled, {} executed, {:.1} MiB uploaded",
        frame_count,
        cpu_time,
        cpu_time / frame_count as u32,
        stalled_frames,
        stats.executed(),
        stats.bytes_read() as f64 / (1024.0 * 1024.0)
    );

    Ok(())
}
