//! Fixed-size records replicated into frame slots.
//!
//! All records are plain `#[repr(C)]` data so a replica write is a flat byte
//! copy of [`bytemuck::bytes_of`].

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Number of light entries in [`PassConstants`].
pub const MAX_LIGHTS: usize = 16;

/// Per-object uniform data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectConstants {
    pub world: Mat4,
    pub tex_transform: Mat4,
}

impl Default for ObjectConstants {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            tex_transform: Mat4::IDENTITY,
        }
    }
}

/// Per-material uniform data
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialConstants {
    pub diffuse_albedo: Vec4,
    pub fresnel_r0: Vec3,
    pub roughness: f32,
    pub mat_transform: Mat4,
}

impl Default for MaterialConstants {
    fn default() -> Self {
        Self {
            diffuse_albedo: Vec4::ONE,
            fresnel_r0: Vec3::splat(0.01),
            roughness: 0.25,
            mat_transform: Mat4::IDENTITY,
        }
    }
}

/// Light entry. Point, spot and directional lights share the layout;
/// unused fields are ignored by the shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Light {
    pub strength: Vec3,
    pub falloff_start: f32,
    pub direction: Vec3,
    pub falloff_end: f32,
    pub position: Vec3,
    pub spot_power: f32,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            strength: Vec3::splat(0.5),
            falloff_start: 1.0,
            direction: Vec3::new(0.0, -1.0, 0.0),
            falloff_end: 10.0,
            position: Vec3::ZERO,
            spot_power: 64.0,
        }
    }
}

impl Light {
    pub fn directional(direction: Vec3, strength: Vec3) -> Self {
        Self {
            direction,
            strength,
            ..Default::default()
        }
    }

    pub fn point(position: Vec3, strength: Vec3) -> Self {
        Self {
            position,
            strength,
            ..Default::default()
        }
    }

    pub fn spot(position: Vec3, direction: Vec3, strength: Vec3) -> Self {
        Self {
            position,
            direction,
            strength,
            ..Default::default()
        }
    }
}

/// Per-pass uniform data, rewritten into the current slot every frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PassConstants {
    pub view: Mat4,
    pub inv_view: Mat4,
    pub proj: Mat4,
    pub inv_proj: Mat4,
    pub view_proj: Mat4,
    pub inv_view_proj: Mat4,
    pub eye_pos: Vec3,
    pub _pad0: f32,
    pub render_target_size: Vec2,
    pub inv_render_target_size: Vec2,
    pub near_z: f32,
    pub far_z: f32,
    pub total_time: f32,
    pub delta_time: f32,
    pub ambient_light: Vec4,
    pub fog_color: Vec4,
    pub fog_start: f32,
    pub fog_range: f32,
    pub _pad1: [f32; 2],
    pub lights: [Light; MAX_LIGHTS],
}

impl Default for PassConstants {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            inv_view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            inv_proj: Mat4::IDENTITY,
            view_proj: Mat4::IDENTITY,
            inv_view_proj: Mat4::IDENTITY,
            eye_pos: Vec3::ZERO,
            _pad0: 0.0,
            render_target_size: Vec2::ZERO,
            inv_render_target_size: Vec2::ZERO,
            near_z: 1.0,
            far_z: 1000.0,
            total_time: 0.0,
            delta_time: 0.0,
            ambient_light: Vec4::new(0.15, 0.15, 0.25, 1.0),
            fog_color: Vec4::new(0.7, 0.7, 0.7, 1.0),
            fog_start: 5.0,
            fog_range: 150.0,
            _pad1: [0.0; 2],
            lights: [Light::default(); MAX_LIGHTS],
        }
    }
}

impl PassConstants {
    /// Fill the camera block from a view and projection matrix.
    pub fn with_camera(mut self, view: Mat4, proj: Mat4, eye_pos: Vec3) -> Self {
        let view_proj = proj * view;
        self.view = view;
        self.inv_view = view.inverse();
        self.proj = proj;
        self.inv_proj = proj.inverse();
        self.view_proj = view_proj;
        self.inv_view_proj = view_proj.inverse();
        self.eye_pos = eye_pos;
        self
    }

    pub fn with_render_target(mut self, width: u32, height: u32) -> Self {
        self.render_target_size = Vec2::new(width as f32, height as f32);
        self.inv_render_target_size =
            Vec2::new(1.0 / width.max(1) as f32, 1.0 / height.max(1) as f32);
        self
    }

    pub fn with_light(mut self, index: usize, light: Light) -> Self {
        self.lights[index] = light;
        self
    }
}

/// Vertex of geometry that is rebuilt every frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coord: Vec2,
}

const _: () = assert!(std::mem::size_of::<ObjectConstants>() == 128);
const _: () = assert!(std::mem::size_of::<MaterialConstants>() == 96);
const _: () = assert!(std::mem::size_of::<Light>() == 48);
const _: () = assert!(std::mem::size_of::<PassConstants>() == 480 + 48 * MAX_LIGHTS);
const _: () = assert!(std::mem::size_of::<Vertex>() == 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_camera_inverses() {
        let view = Mat4::look_at_lh(Vec3::new(0.0, 5.0, -10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_lh(0.25 * std::f32::consts::PI, 16.0 / 9.0, 1.0, 1000.0);
        let pass = PassConstants::default().with_camera(view, proj, Vec3::new(0.0, 5.0, -10.0));

        assert!((pass.view * pass.inv_view).abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert!((pass.view_proj * pass.inv_view_proj).abs_diff_eq(Mat4::IDENTITY, 1e-3));
        assert_eq!(pass.eye_pos, Vec3::new(0.0, 5.0, -10.0));
    }

    #[test]
    fn test_render_target_size() {
        let pass = PassConstants::default().with_render_target(800, 600);
        assert_eq!(pass.render_target_size, Vec2::new(800.0, 600.0));
        assert_eq!(pass.inv_render_target_size, Vec2::new(1.0 / 800.0, 1.0 / 600.0));
    }

    #[test]
    fn test_records_are_flat_bytes() {
        let object = ObjectConstants {
            world: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            tex_transform: Mat4::IDENTITY,
        };
        let bytes = bytemuck::bytes_of(&object);
        assert_eq!(bytes.len(), 128);

        let back: ObjectConstants = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back, object);
    }
}
