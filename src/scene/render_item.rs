//! Drawable scene objects

use glam::Mat4;

use super::{GeometryHandle, MaterialId};
use crate::resources::ObjectConstants;
use crate::tracker::{sealed, MutableEntity, StaleReplicas};

/// Draw order bucket. Each layer is drawn with its own pipeline, in the
/// order of [`RenderLayer::ALL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderLayer {
    Opaque,
    AlphaTested,
    AlphaTestedTreeSprites,
    Transparent,
}

impl RenderLayer {
    pub const COUNT: usize = 4;

    pub const ALL: [RenderLayer; Self::COUNT] = [
        RenderLayer::Opaque,
        RenderLayer::AlphaTested,
        RenderLayer::AlphaTestedTreeSprites,
        RenderLayer::Transparent,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Where an item's vertices come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    Static(GeometryHandle),
    /// Per-slot vertex region rewritten from the simulation every frame
    Dynamic,
}

/// Indexed draw parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrawArgs {
    pub index_count: u32,
    pub start_index: u32,
    pub base_vertex: i32,
}

impl DrawArgs {
    pub fn new(index_count: u32) -> Self {
        Self {
            index_count,
            ..Default::default()
        }
    }
}

/// Mutable value of a render item, handed to update closures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectTransform {
    pub world: Mat4,
    pub tex_transform: Mat4,
}

impl Default for ObjectTransform {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
        }
    }
}

/// Render item description used when building a scene
#[derive(Debug, Clone, Copy)]
pub struct RenderItemDesc {
    pub transform: ObjectTransform,
    pub material: MaterialId,
    pub geometry: GeometrySource,
    pub args: DrawArgs,
    pub layer: RenderLayer,
}

impl RenderItemDesc {
    pub fn new(material: MaterialId, geometry: GeometryHandle, args: DrawArgs) -> Self {
        Self {
            transform: ObjectTransform::default(),
            material,
            geometry: GeometrySource::Static(geometry),
            args,
            layer: RenderLayer::Opaque,
        }
    }

    /// Item drawing the simulation's vertices
    pub fn dynamic(material: MaterialId) -> Self {
        Self {
            transform: ObjectTransform::default(),
            material,
            geometry: GeometrySource::Dynamic,
            args: DrawArgs::default(),
            layer: RenderLayer::Transparent,
        }
    }

    pub fn with_world(mut self, world: Mat4) -> Self {
        self.transform.world = world;
        self
    }

    pub fn with_tex_transform(mut self, tex_transform: Mat4) -> Self {
        self.transform.tex_transform = tex_transform;
        self
    }

    pub fn with_args(mut self, args: DrawArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_layer(mut self, layer: RenderLayer) -> Self {
        self.layer = layer;
        self
    }
}

/// Render item stored in a [`Scene`](super::Scene)
#[derive(Debug, Clone)]
pub struct RenderItem {
    transform: ObjectTransform,
    material: MaterialId,
    geometry: GeometrySource,
    args: DrawArgs,
    layer: RenderLayer,
    uniform_index: usize,
    stale: StaleReplicas,
}

impl RenderItem {
    pub(crate) fn new(desc: RenderItemDesc, uniform_index: usize, depth: usize) -> Self {
        Self {
            transform: desc.transform,
            material: desc.material,
            geometry: desc.geometry,
            args: desc.args,
            layer: desc.layer,
            uniform_index,
            stale: StaleReplicas::new(depth),
        }
    }

    pub fn transform(&self) -> &ObjectTransform {
        &self.transform
    }

    pub fn material(&self) -> MaterialId {
        self.material
    }

    pub fn geometry(&self) -> GeometrySource {
        self.geometry
    }

    pub fn args(&self) -> DrawArgs {
        self.args
    }

    pub fn layer(&self) -> RenderLayer {
        self.layer
    }

    pub(crate) fn transform_mut(&mut self) -> &mut ObjectTransform {
        &mut self.transform
    }
}

impl sealed::Sealed for RenderItem {}

impl MutableEntity for RenderItem {
    type Replica = ObjectConstants;

    fn uniform_index(&self) -> usize {
        self.uniform_index
    }

    fn replica(&self) -> ObjectConstants {
        ObjectConstants {
            world: self.transform.world,
            tex_transform: self.transform.tex_transform,
        }
    }

    fn stale_replicas(&self) -> StaleReplicas {
        self.stale
    }

    fn stale_replicas_mut(&mut self) -> &mut StaleReplicas {
        &mut self.stale
    }
}
