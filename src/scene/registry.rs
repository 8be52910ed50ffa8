//! Build-time name resolution.
//!
//! Geometries, pipelines and textures are looked up by name exactly once, while
//! the scene is being built. Everything downstream of the build step holds the
//! integer handles returned here and never sees a string.

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Handle to uploaded geometry (vertex + index buffers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryHandle(pub(crate) u32);

/// Handle to a compiled pipeline state object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineHandle(pub(crate) u32);

/// Handle to a texture view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub(crate) u32);

macro_rules! impl_handle {
    ($($name:ident),*) => {
        $(
            impl From<u32> for $name {
                fn from(index: u32) -> Self {
                    Self(index)
                }
            }

            impl $name {
                pub fn index(self) -> u32 {
                    self.0
                }
            }
        )*
    };
}

impl_handle!(GeometryHandle, PipelineHandle, TextureHandle);

/// Name → handle table, filled while building a scene.
pub struct HandleRegistry<H> {
    names: HashMap<String, u32>,
    _marker: PhantomData<H>,
}

impl<H: From<u32> + Copy> HandleRegistry<H> {
    pub fn new() -> Self {
        Self {
            names: HashMap::new(),
            _marker: PhantomData,
        }
    }

    /// Register `name`, returning its handle. Registering a name twice returns
    /// the handle from the first registration.
    pub fn register(&mut self, name: &str) -> H {
        let next = self.names.len() as u32;
        H::from(*self.names.entry(name.to_string()).or_insert(next))
    }

    pub fn resolve(&self, name: &str) -> Option<H> {
        self.names.get(name).map(|&index| H::from(index))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<H: From<u32> + Copy> Default for HandleRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for HandleRegistry<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("len", &self.names.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_resolve() {
        let mut geometries = HandleRegistry::<GeometryHandle>::new();
        let land = geometries.register("landGeo");
        let water = geometries.register("waterGeo");

        assert_ne!(land, water);
        assert_eq!(geometries.resolve("landGeo"), Some(land));
        assert_eq!(geometries.resolve("waterGeo"), Some(water));
        assert_eq!(geometries.resolve("boxGeo"), None);
        assert_eq!(geometries.len(), 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut pipelines = HandleRegistry::<PipelineHandle>::new();
        let first = pipelines.register("opaque");
        let second = pipelines.register("opaque");
        assert_eq!(first, second);
        assert_eq!(pipelines.len(), 1);
    }
}
