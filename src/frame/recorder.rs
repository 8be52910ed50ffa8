//! Command recording for one frame.

use glam::Vec4;

use super::{Command, CommandList, DrawCommand, ResourceState, VertexSource};
use crate::scene::{GeometrySource, HandleRegistry, PipelineHandle, RenderLayer, Scene};
use crate::tracker::MutableEntity;

/// Records the commands of one frame into a slot's command list.
///
/// Implementations must only reference the regions of `slot`.
pub trait FrameRecorder {
    fn record(&mut self, scene: &Scene, slot: usize, commands: &mut CommandList);
}

/// Draws every layer in [`RenderLayer::ALL`] order, each with its own
/// pipeline.
///
/// ```text
/// Transition(Present -> RenderTarget)
/// Clear
/// BindPass(slot)
/// SetPipeline(opaque)        Draw ...
/// SetPipeline(alpha tested)  Draw ...
/// SetPipeline(tree sprites)  Draw ...
/// SetPipeline(transparent)   Draw ...
/// Transition(RenderTarget -> Present)
/// ```
#[derive(Debug, Clone)]
pub struct LayeredRecorder {
    pipelines: [PipelineHandle; RenderLayer::COUNT],
    clear_color: Vec4,
}

impl LayeredRecorder {
    pub fn new(pipelines: [PipelineHandle; RenderLayer::COUNT], clear_color: Vec4) -> Self {
        Self {
            pipelines,
            clear_color,
        }
    }

    /// Register one pipeline per layer and build a recorder over them.
    pub fn from_registry(registry: &mut HandleRegistry<PipelineHandle>, clear_color: Vec4) -> Self {
        let pipelines = [
            registry.register("opaque"),
            registry.register("alphaTested"),
            registry.register("treeSprites"),
            registry.register("transparent"),
        ];
        Self::new(pipelines, clear_color)
    }

    pub fn pipeline(&self, layer: RenderLayer) -> PipelineHandle {
        self.pipelines[layer.index()]
    }
}

impl FrameRecorder for LayeredRecorder {
    fn record(&mut self, scene: &Scene, slot: usize, commands: &mut CommandList) {
        commands.push(Command::Transition {
            before: ResourceState::Present,
            after: ResourceState::RenderTarget,
        });
        commands.push(Command::Clear(self.clear_color));
        commands.push(Command::BindPass { slot });

        for layer in RenderLayer::ALL {
            commands.push(Command::SetPipeline(self.pipeline(layer)));

            for item in scene.layer(layer) {
                let Some(material) = scene.material(item.material()) else {
                    log::warn!("Skipping render item with a removed material");
                    continue;
                };
                let vertices = match item.geometry() {
                    GeometrySource::Static(handle) => VertexSource::Static(handle),
                    GeometrySource::Dynamic => VertexSource::Dynamic { slot },
                };
                commands.push(Command::Draw(DrawCommand {
                    object_index: item.uniform_index(),
                    material_index: material.uniform_index(),
                    texture: material.diffuse_texture(),
                    vertices,
                    args: item.args(),
                }));
            }
        }

        commands.push(Command::Transition {
            before: ResourceState::RenderTarget,
            after: ResourceState::Present,
        });
    }
}
