//! Scene management
//!
//! The scene owns render items and materials in generational arenas. Ids stay
//! valid while the arena grows; an id from another scene is rejected rather
//! than aliasing a live entity.

mod material;
mod registry;
mod render_item;

pub use material::*;
pub use registry::*;
pub use render_item::*;

use slotmap::SlotMap;

use crate::error::{EngineError, EngineResult};
use crate::tracker::{DirtyPropagationTracker, MutableEntity};

slotmap::new_key_type! {
    /// Id of a [`RenderItem`] (index + generation)
    pub struct RenderItemId;
    /// Id of a [`Material`] (index + generation)
    pub struct MaterialId;
}

/// Any entity with replicated uniform state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    RenderItem(RenderItemId),
    Material(MaterialId),
}

impl From<RenderItemId> for EntityId {
    fn from(id: RenderItemId) -> Self {
        EntityId::RenderItem(id)
    }
}

impl From<MaterialId> for EntityId {
    fn from(id: MaterialId) -> Self {
        EntityId::Material(id)
    }
}

/// The scene containing all replicated entities
#[derive(Debug)]
pub struct Scene {
    depth: usize,
    render_items: SlotMap<RenderItemId, RenderItem>,
    materials: SlotMap<MaterialId, Material>,
    layers: [Vec<RenderItemId>; RenderLayer::COUNT],
}

impl Scene {
    /// Empty scene for a pipeline `frames_in_flight` deep.
    pub fn new(frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "frames_in_flight must be at least 1");
        Self {
            depth: frames_in_flight,
            render_items: SlotMap::with_key(),
            materials: SlotMap::with_key(),
            layers: Default::default(),
        }
    }

    pub fn frames_in_flight(&self) -> usize {
        self.depth
    }

    /// Add a material. Its replicas start stale in every slot.
    pub fn add_material(&mut self, desc: MaterialDesc) -> MaterialId {
        let index = self.materials.len();
        log::trace!("Adding material '{}' at uniform index {}", desc.name, index);
        self.materials.insert(Material::new(desc, index, self.depth))
    }

    /// Add a render item. Its replicas start stale in every slot.
    pub fn add_render_item(&mut self, desc: RenderItemDesc) -> EngineResult<RenderItemId> {
        if !self.materials.contains_key(desc.material) {
            return Err(EngineError::UnknownEntity(desc.material.into()));
        }

        let index = self.render_items.len();
        let layer = desc.layer;
        let id = self.render_items.insert(RenderItem::new(desc, index, self.depth));
        self.layers[layer.index()].push(id);
        Ok(id)
    }

    pub fn render_item(&self, id: RenderItemId) -> Option<&RenderItem> {
        self.render_items.get(id)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id)
    }

    pub fn render_items(&self) -> impl Iterator<Item = (RenderItemId, &RenderItem)> {
        self.render_items.iter()
    }

    pub fn materials(&self) -> impl Iterator<Item = (MaterialId, &Material)> {
        self.materials.iter()
    }

    /// Items of one layer, in insertion order.
    pub fn layer(&self, layer: RenderLayer) -> impl Iterator<Item = &RenderItem> {
        self.layers[layer.index()]
            .iter()
            .filter_map(|&id| self.render_items.get(id))
    }

    pub fn render_item_count(&self) -> usize {
        self.render_items.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn has_dynamic_geometry(&self) -> bool {
        self.render_items
            .values()
            .any(|item| item.geometry() == GeometrySource::Dynamic)
    }

    /// Number of slots still holding an outdated copy of `id`.
    pub fn stale_replicas(&self, id: EntityId) -> Option<usize> {
        match id {
            EntityId::RenderItem(id) => self
                .render_item(id)
                .map(|e| e.stale_replicas().remaining()),
            EntityId::Material(id) => self.material(id).map(|e| e.stale_replicas().remaining()),
        }
    }

    pub(crate) fn render_items_mut(&mut self) -> impl Iterator<Item = &mut RenderItem> {
        self.render_items.values_mut()
    }

    pub(crate) fn materials_mut(&mut self) -> impl Iterator<Item = &mut Material> {
        self.materials.values_mut()
    }

    /// Mark `id` dirty without changing its value.
    pub(crate) fn mark_dirty(
        &mut self,
        id: EntityId,
        tracker: &DirtyPropagationTracker,
    ) -> EngineResult<()> {
        match id {
            EntityId::RenderItem(item) => {
                let entity = self
                    .render_items
                    .get_mut(item)
                    .ok_or(EngineError::UnknownEntity(id))?;
                tracker.mark_dirty(entity);
            }
            EntityId::Material(material) => {
                let entity = self
                    .materials
                    .get_mut(material)
                    .ok_or(EngineError::UnknownEntity(id))?;
                tracker.mark_dirty(entity);
            }
        }
        Ok(())
    }

    pub(crate) fn update_render_item(
        &mut self,
        id: RenderItemId,
        tracker: &DirtyPropagationTracker,
        update: impl FnOnce(&mut ObjectTransform),
    ) -> EngineResult<()> {
        let item = self
            .render_items
            .get_mut(id)
            .ok_or(EngineError::UnknownEntity(id.into()))?;
        update(item.transform_mut());
        tracker.mark_dirty(item);
        Ok(())
    }

    pub(crate) fn update_material(
        &mut self,
        id: MaterialId,
        tracker: &DirtyPropagationTracker,
        update: impl FnOnce(&mut MaterialParams),
    ) -> EngineResult<()> {
        let material = self
            .materials
            .get_mut(id)
            .ok_or(EngineError::UnknownEntity(id.into()))?;
        update(material.params_mut());
        tracker.mark_dirty(material);
        Ok(())
    }
}
