//! Time-driven scene mutation.

use glam::Vec2;

use crate::error::EngineResult;
use crate::scene::{MaterialId, MaterialParams, ObjectTransform, RenderItemId, Scene};
use crate::tracker::DirtyPropagationTracker;

/// Frame clock
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    pub total_time: f32,
    pub delta_time: f32,
}

impl FrameTime {
    pub fn tick(&mut self, delta_time: f32) {
        self.delta_time = delta_time;
        self.total_time += delta_time;
    }
}

/// Mutable access to scene entities during state `Mutated`.
///
/// Every update marks the entity dirty, so no change can bypass propagation.
pub struct MutationContext<'a> {
    scene: &'a mut Scene,
    tracker: &'a DirtyPropagationTracker,
    updated: usize,
}

impl<'a> MutationContext<'a> {
    pub(crate) fn new(scene: &'a mut Scene, tracker: &'a DirtyPropagationTracker) -> Self {
        Self {
            scene,
            tracker,
            updated: 0,
        }
    }

    pub fn scene(&self) -> &Scene {
        self.scene
    }

    pub fn update_material(
        &mut self,
        id: MaterialId,
        update: impl FnOnce(&mut MaterialParams),
    ) -> EngineResult<()> {
        self.scene.update_material(id, self.tracker, update)?;
        self.updated += 1;
        Ok(())
    }

    pub fn update_render_item(
        &mut self,
        id: RenderItemId,
        update: impl FnOnce(&mut ObjectTransform),
    ) -> EngineResult<()> {
        self.scene.update_render_item(id, self.tracker, update)?;
        self.updated += 1;
        Ok(())
    }

    /// Entities updated through this context so far.
    pub fn updated(&self) -> usize {
        self.updated
    }
}

/// Collaborator that changes the scene once per frame.
pub trait SceneMutator {
    fn mutate(&mut self, time: &FrameTime, scene: &mut MutationContext<'_>) -> EngineResult<()>;
}

/// Scrolls a material's texture by translating its material transform.
#[derive(Debug, Clone, Copy)]
pub struct MaterialScroller {
    material: MaterialId,
    velocity: Vec2,
}

impl MaterialScroller {
    /// Texture-space units per second
    pub const DEFAULT_VELOCITY: Vec2 = Vec2::new(0.1, 0.02);

    pub fn new(material: MaterialId) -> Self {
        Self {
            material,
            velocity: Self::DEFAULT_VELOCITY,
        }
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }
}

fn wrap_unit(value: f32) -> f32 {
    if value >= 1.0 {
        value - 1.0
    } else {
        value
    }
}

impl SceneMutator for MaterialScroller {
    fn mutate(&mut self, time: &FrameTime, scene: &mut MutationContext<'_>) -> EngineResult<()> {
        let step = self.velocity * time.delta_time;
        scene.update_material(self.material, |params| {
            let offset = &mut params.mat_transform.w_axis;
            offset.x = wrap_unit(offset.x + step.x);
            offset.y = wrap_unit(offset.y + step.y);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::scene::MaterialDesc;

    #[test]
    fn test_frame_time_accumulates() {
        let mut time = FrameTime::default();
        time.tick(0.25);
        time.tick(0.5);
        assert_eq!(time.delta_time, 0.5);
        assert_eq!(time.total_time, 0.75);
    }

    #[test]
    fn test_scroller_moves_and_marks_dirty() {
        let mut scene = Scene::new(3);
        let water = scene.add_material(MaterialDesc::new("water"));
        let tracker = DirtyPropagationTracker::new(3);
        let mut scroller = MaterialScroller::new(water);

        let time = FrameTime {
            total_time: 1.0,
            delta_time: 1.0,
        };
        let mut ctx = MutationContext::new(&mut scene, &tracker);
        scroller.mutate(&time, &mut ctx).unwrap();
        assert_eq!(ctx.updated(), 1);

        let offset = scene.material(water).unwrap().params().mat_transform.w_axis;
        assert!((offset.x - 0.1).abs() < 1e-6);
        assert!((offset.y - 0.02).abs() < 1e-6);
        assert_eq!(scene.stale_replicas(water.into()), Some(3));
    }

    #[test]
    fn test_scroller_wraps_into_unit_range() {
        let mut scene = Scene::new(1);
        let water = scene.add_material(MaterialDesc::new("water"));
        let tracker = DirtyPropagationTracker::new(1);
        let mut scroller = MaterialScroller::new(water).with_velocity(Vec2::new(0.75, 0.5));

        let time = FrameTime {
            total_time: 0.0,
            delta_time: 1.0,
        };
        for _ in 0..2 {
            let mut ctx = MutationContext::new(&mut scene, &tracker);
            scroller.mutate(&time, &mut ctx).unwrap();
        }

        let offset = scene.material(water).unwrap().params().mat_transform.w_axis;
        assert!((offset.x - 0.5).abs() < 1e-6);
        assert!(offset.y.abs() < 1e-6);
    }

    #[test]
    fn test_unknown_material_is_an_error() {
        let mut other = Scene::new(1);
        let foreign = other.add_material(MaterialDesc::default());
        let mut scene = Scene::new(1);
        let tracker = DirtyPropagationTracker::new(1);

        let mut ctx = MutationContext::new(&mut scene, &tracker);
        let err = MaterialScroller::new(foreign)
            .mutate(&FrameTime::default(), &mut ctx)
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownEntity(_)));
    }
}
