//! # Frame Pipeline
//!
//! N-deep pipelining of per-frame resources between a CPU frame loop and an
//! asynchronous device.
//!
//! ## Overview
//!
//! Every frame-varying piece of data (object and material constants, pass
//! constants, simulated vertices) lives in one of N frame slots. While the
//! device reads slot `k`, the CPU writes slot `k+1`. Mutated entities are
//! replicated lazily: a change resets the entity's stale-replica countdown to
//! N, and each frame copies it into the slot being built until every slot has
//! it.
//!
//! This crate provides:
//! - [`FenceSynchronizer`] - Fence tokens and blocking waits on retirement
//! - [`FrameResourceRing`] - The N slots and their upload regions
//! - [`DirtyPropagationTracker`] - Stale-replica countdowns
//! - [`FrameOrchestrator`] - The per-frame state machine tying them together
//! - [`backend`] - Device implementations: manual, simulated, and wgpu
//!   (feature `wgpu-backend`)
//!
//! ## Example
//!
//! ```ignore
//! use frame_pipeline::*;
//!
//! let mut scene = Scene::new(3);
//! let water = scene.add_material(MaterialDesc::water(water_texture));
//! scene.add_render_item(RenderItemDesc::dynamic(water))?;
//!
//! let recorder = LayeredRecorder::from_registry(&mut pipelines, clear_color);
//! let mut frames = FrameOrchestrator::new(PipelineConfig::new(3), device, scene, recorder)?
//!     .with_simulation(waves)?;
//! frames.add_mutator(MaterialScroller::new(water));
//!
//! loop {
//!     frames.advance_frame(dt)?; // may block while the device is 2 frames behind
//! }
//! ```

pub mod animation;
pub mod backend;
pub mod config;
pub mod error;
pub mod fence;
pub mod frame;
pub mod orchestrator;
pub mod resources;
pub mod scene;
pub mod simulation;
pub mod tracker;

// Re-export main types for convenience
pub use animation::{FrameTime, MaterialScroller, MutationContext, SceneMutator};
pub use backend::{Device, DeviceError, DeviceResult, ManualDevice, SimulatedDevice, Submission};
pub use config::PipelineConfig;
pub use error::{EngineError, EngineResult};
pub use fence::{CpuTimeline, FenceSynchronizer, FenceTimeline, FenceToken};
pub use frame::{
    Command, CommandList, DrawCommand, FrameRecorder, FrameResourceRing, FrameSlot,
    LayeredRecorder, PipelineCursor,
};
pub use orchestrator::{FrameOrchestrator, FrameReport, FrameState};
pub use resources::{
    Light, MaterialConstants, ObjectConstants, PassConstants, UploadRegion, Vertex,
};
pub use scene::{
    DrawArgs, EntityId, GeometryHandle, HandleRegistry, MaterialDesc, MaterialId, PipelineHandle,
    RenderItemDesc, RenderItemId, RenderLayer, Scene, TextureHandle,
};
pub use simulation::{GridExtent, SimVertex, Simulation};
pub use tracker::{DirtyPropagationTracker, MutableEntity, PropagationStats, StaleReplicas};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once after installing a logger.
pub fn init() {
    log::info!("Frame Pipeline v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
