//! Dirty-replica bookkeeping.
//!
//! Every mutable entity carries a countdown of frame slots whose copy of it is
//! out of date. Marking an entity dirty resets the countdown to the pipeline
//! depth; each propagation into a slot writes the entity's current value and
//! decrements it. After N consecutive frames every slot holds the new value.
//!
//! ```text
//! N = 3, entity changed during frame 0
//!
//! frame   slot   stale before   write?   stale after
//!   0      0          3           yes         2
//!   1      1          2           yes         1
//!   2      2          1           yes         0
//!   3      0          0           no          0
//! ```

use bytemuck::Pod;

use crate::frame::FrameSlot;
use crate::resources::{MaterialConstants, ObjectConstants};
use crate::scene::Scene;

pub(crate) mod sealed {
    pub trait Sealed {}
}

/// Number of frame slots still holding an outdated replica of an entity.
///
/// Only [`DirtyPropagationTracker::mark_dirty`] and
/// [`DirtyPropagationTracker::propagate`] change the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaleReplicas {
    remaining: usize,
}

impl StaleReplicas {
    /// Counter for a freshly inserted entity: no slot has a replica yet.
    pub(crate) fn new(depth: usize) -> Self {
        Self { remaining: depth }
    }

    pub fn remaining(self) -> usize {
        self.remaining
    }

    pub fn is_stale(self) -> bool {
        self.remaining > 0
    }

    fn reset(&mut self, depth: usize) {
        self.remaining = depth;
    }

    fn consume(&mut self) {
        debug_assert!(self.remaining > 0, "stale replica count underflow");
        self.remaining = self.remaining.saturating_sub(1);
    }
}

/// Scene entity whose uniform record is replicated into every frame slot.
///
/// Implemented by [`RenderItem`](crate::scene::RenderItem) and
/// [`Material`](crate::scene::Material) only.
pub trait MutableEntity: sealed::Sealed {
    type Replica: Pod;

    /// Element index of this entity inside each slot's uniform region.
    fn uniform_index(&self) -> usize;

    /// Current value, as it should appear in a slot.
    fn replica(&self) -> Self::Replica;

    fn stale_replicas(&self) -> StaleReplicas;

    #[doc(hidden)]
    fn stale_replicas_mut(&mut self) -> &mut StaleReplicas;
}

/// Entities written by one [`DirtyPropagationTracker::propagate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropagationStats {
    pub objects: usize,
    pub materials: usize,
}

impl PropagationStats {
    pub fn total(&self) -> usize {
        self.objects + self.materials
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DirtyPropagationTracker {
    depth: usize,
}

impl DirtyPropagationTracker {
    /// # Panics
    ///
    /// Panics if `depth` is 0.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "frames_in_flight must be at least 1");
        Self { depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Flag every slot's replica of `entity` as outdated.
    ///
    /// Marking twice before the next propagation leaves the count at N.
    pub fn mark_dirty<E: MutableEntity>(&self, entity: &mut E) {
        entity.stale_replicas_mut().reset(self.depth);
    }

    /// Write every stale entity into `slot` and decrement its count.
    pub fn propagate(&self, scene: &mut Scene, slot: &mut FrameSlot) -> PropagationStats {
        let objects = replicate(scene.render_items_mut(), |index, value: &ObjectConstants| {
            slot.write_object_replica(index, value)
        });
        let materials = replicate(scene.materials_mut(), |index, value: &MaterialConstants| {
            slot.write_material_replica(index, value)
        });

        let stats = PropagationStats { objects, materials };
        if stats.total() > 0 {
            log::trace!(
                "Propagated {} objects, {} materials into slot {}",
                stats.objects,
                stats.materials,
                slot.index()
            );
        }
        stats
    }
}

fn replicate<'a, E, I, F>(entities: I, mut write: F) -> usize
where
    E: MutableEntity + 'a,
    I: Iterator<Item = &'a mut E>,
    F: FnMut(usize, &E::Replica),
{
    let mut written = 0;
    for entity in entities {
        if !entity.stale_replicas().is_stale() {
            continue;
        }
        write(entity.uniform_index(), &entity.replica());
        entity.stale_replicas_mut().consume();
        written += 1;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fence::{CpuTimeline, FenceSynchronizer};
    use crate::frame::FrameResourceRing;
    use crate::scene::{MaterialDesc, MaterialId, RenderItemDesc, RenderItemId};
    use glam::{Mat4, Vec3, Vec4};
    use std::sync::Arc;

    fn ring_for(depth: usize, objects: usize, materials: usize) -> FrameResourceRing {
        let fence = FenceSynchronizer::new(Arc::new(CpuTimeline::new()));
        let mut ring = FrameResourceRing::new(depth, 256).unwrap();
        ring.resize_for(objects, materials, &fence).unwrap();
        ring
    }

    fn scene_with_one_item(depth: usize) -> (Scene, RenderItemId, MaterialId) {
        let mut scene = Scene::new(depth);
        let material = scene.add_material(MaterialDesc::default());
        let item = scene
            .add_render_item(RenderItemDesc::dynamic(material))
            .unwrap();
        (scene, item, material)
    }

    #[test]
    fn test_new_entities_start_fully_stale() {
        let (scene, item, material) = scene_with_one_item(3);
        assert_eq!(scene.render_item(item).unwrap().stale_replicas().remaining(), 3);
        assert_eq!(scene.material(material).unwrap().stale_replicas().remaining(), 3);
    }

    #[test]
    fn test_mark_dirty_is_idempotent() {
        let (mut scene, item, _) = scene_with_one_item(3);
        let tracker = DirtyPropagationTracker::new(3);
        let mut ring = ring_for(3, 1, 1);

        tracker.propagate(&mut scene, ring.slot_mut(0));
        assert_eq!(scene.stale_replicas(item.into()), Some(2));

        scene.mark_dirty(item.into(), &tracker).unwrap();
        scene.mark_dirty(item.into(), &tracker).unwrap();
        assert_eq!(scene.stale_replicas(item.into()), Some(3));
    }

    #[test]
    fn test_propagate_writes_and_counts_down() {
        let (mut scene, item, material) = scene_with_one_item(2);
        let tracker = DirtyPropagationTracker::new(2);
        let mut ring = ring_for(2, 1, 1);

        let world = Mat4::from_translation(Vec3::new(3.0, 0.0, 0.0));
        scene
            .update_render_item(item, &tracker, |t| t.world = world)
            .unwrap();
        scene
            .update_material(material, &tracker, |p| {
                p.diffuse_albedo = Vec4::new(0.0, 0.2, 0.6, 1.0)
            })
            .unwrap();

        let stats = tracker.propagate(&mut scene, ring.slot_mut(0));
        assert_eq!(stats, PropagationStats { objects: 1, materials: 1 });
        assert_eq!(ring.slot(0).object_region().element(0).world, world);
        assert_eq!(
            ring.slot(0).material_region().element(0).diffuse_albedo,
            Vec4::new(0.0, 0.2, 0.6, 1.0)
        );
        // The other slot is untouched until it is propagated into
        assert_ne!(ring.slot(1).object_region().element(0).world, world);

        let stats = tracker.propagate(&mut scene, ring.slot_mut(1));
        assert_eq!(stats.total(), 2);
        assert_eq!(ring.slot(1).object_region().element(0).world, world);

        // Clean entities are skipped
        let stats = tracker.propagate(&mut scene, ring.slot_mut(0));
        assert_eq!(stats.total(), 0);
        assert!(!scene.render_item(item).unwrap().stale_replicas().is_stale());
    }

    #[test]
    fn test_stale_count_never_exceeds_depth() {
        let (mut scene, item, _) = scene_with_one_item(4);
        let tracker = DirtyPropagationTracker::new(4);
        for _ in 0..10 {
            scene.update_render_item(item, &tracker, |_| {}).unwrap();
            let remaining = scene.render_item(item).unwrap().stale_replicas().remaining();
            assert!(remaining <= 4);
        }
    }
}
