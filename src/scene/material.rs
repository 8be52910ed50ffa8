//! Surface materials

use glam::{Mat4, Vec3, Vec4};

use super::TextureHandle;
use crate::resources::MaterialConstants;
use crate::tracker::{sealed, MutableEntity, StaleReplicas};

/// Mutable value of a material, handed to update closures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialParams {
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    /// Texture-space transform; translation scrolls the texture
    pub mat_transform: Mat4,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.25,
            mat_transform: Mat4::IDENTITY,
        }
    }
}

/// Material description used when building a scene
#[derive(Debug, Clone, Default)]
pub struct MaterialDesc {
    pub name: String,
    pub params: MaterialParams,
    pub diffuse_texture: Option<TextureHandle>,
}

impl MaterialDesc {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_diffuse_albedo(mut self, albedo: Vec4) -> Self {
        self.params.diffuse_albedo = albedo;
        self
    }

    pub fn with_fresnel_r0(mut self, fresnel_r0: Vec3) -> Self {
        self.params.fresnel_r0 = fresnel_r0;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.params.roughness = roughness;
        self
    }

    pub fn with_texture(mut self, texture: TextureHandle) -> Self {
        self.diffuse_texture = Some(texture);
        self
    }

    // Preset materials

    pub fn grass(texture: TextureHandle) -> Self {
        Self::new("grass")
            .with_fresnel_r0(Vec3::splat(0.01))
            .with_roughness(0.125)
            .with_texture(texture)
    }

    pub fn water(texture: TextureHandle) -> Self {
        Self::new("water")
            .with_diffuse_albedo(Vec4::new(1.0, 1.0, 1.0, 0.5))
            .with_fresnel_r0(Vec3::splat(0.1))
            .with_roughness(0.0)
            .with_texture(texture)
    }

    pub fn wire_fence(texture: TextureHandle) -> Self {
        Self::new("wirefence")
            .with_fresnel_r0(Vec3::splat(0.02))
            .with_roughness(0.25)
            .with_texture(texture)
    }
}

/// Material stored in a [`Scene`](super::Scene)
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    params: MaterialParams,
    diffuse_texture: Option<TextureHandle>,
    uniform_index: usize,
    stale: StaleReplicas,
}

impl Material {
    pub(crate) fn new(desc: MaterialDesc, uniform_index: usize, depth: usize) -> Self {
        Self {
            name: desc.name,
            params: desc.params,
            diffuse_texture: desc.diffuse_texture,
            uniform_index,
            stale: StaleReplicas::new(depth),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &MaterialParams {
        &self.params
    }

    pub fn diffuse_texture(&self) -> Option<TextureHandle> {
        self.diffuse_texture
    }

    pub(crate) fn params_mut(&mut self) -> &mut MaterialParams {
        &mut self.params
    }
}

impl sealed::Sealed for Material {}

impl MutableEntity for Material {
    type Replica = MaterialConstants;

    fn uniform_index(&self) -> usize {
        self.uniform_index
    }

    fn replica(&self) -> MaterialConstants {
        MaterialConstants {
            diffuse_albedo: self.params.diffuse_albedo,
            fresnel_r0: self.params.fresnel_r0,
            roughness: self.params.roughness,
            mat_transform: self.params.mat_transform,
        }
    }

    fn stale_replicas(&self) -> StaleReplicas {
        self.stale
    }

    fn stale_replicas_mut(&mut self) -> &mut StaleReplicas {
        &mut self.stale
    }
}
