//! Simulation collaborator interface.
//!
//! A simulation (for example a height-field wave stepper) is advanced while the
//! frame is in state `Mutated` and its latest snapshot is copied into the
//! current slot's dynamic vertex region while the frame is in state
//! `Propagated`.

use glam::{Vec2, Vec3};

use crate::resources::Vertex;

/// Vertex as produced by a simulation step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimVertex {
    pub position: Vec3,
    pub normal: Vec3,
}

/// Horizontal size of the simulated grid, used to derive texture coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridExtent {
    pub width: f32,
    pub depth: f32,
}

impl GridExtent {
    pub fn new(width: f32, depth: f32) -> Self {
        Self { width, depth }
    }

    /// Map a position on a grid centred at the origin to [0, 1] texture space.
    pub fn tex_coord(&self, position: Vec3) -> Vec2 {
        Vec2::new(
            0.5 + position.x / self.width,
            0.5 - position.z / self.depth,
        )
    }

    /// Full render vertex for a simulated one.
    pub fn vertex(&self, sim: &SimVertex) -> Vertex {
        Vertex {
            position: sim.position,
            normal: sim.normal,
            tex_coord: self.tex_coord(sim.position),
        }
    }
}

pub trait Simulation {
    /// Advance by `dt` seconds.
    fn step_simulation(&mut self, dt: f32);

    /// Vertices after the most recent step. The length never changes.
    fn current_snapshot(&self) -> &[SimVertex];

    fn extent(&self) -> GridExtent;

    fn vertex_count(&self) -> usize {
        self.current_snapshot().len()
    }
}
