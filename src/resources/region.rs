//! Device-visible upload regions owned by a frame slot.
//!
//! An [`UploadRegion`] is a flat array of fixed-size records. Constant regions
//! pad every element to the constant-buffer alignment (256 bytes on most
//! devices) so each element can be bound on its own; vertex regions are packed.
//!
//! ```text
//! constant region, stride 256:
//! | ObjectConstants (128) | pad (128) | ObjectConstants (128) | pad (128) | ...
//!
//! vertex region, stride 32:
//! | Vertex | Vertex | Vertex | ...
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::mem::size_of;

use bytemuck::Pod;

use crate::error::{EngineError, EngineResult};

/// Round `size` up to the next multiple of `alignment` (a power of two).
pub fn align_up(size: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (size + alignment - 1) & !(alignment - 1)
}

/// Fixed-stride region of `T` records.
pub struct UploadRegion<T: Pod> {
    label: &'static str,
    bytes: Vec<u8>,
    stride: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> UploadRegion<T> {
    /// Empty region whose elements are padded to `alignment` bytes.
    pub fn constant(label: &'static str, alignment: usize) -> Self {
        Self::with_stride(label, align_up(size_of::<T>(), alignment))
    }

    /// Empty, tightly packed region.
    pub fn vertex(label: &'static str) -> Self {
        Self::with_stride(label, size_of::<T>())
    }

    fn with_stride(label: &'static str, stride: usize) -> Self {
        Self {
            label,
            bytes: Vec::new(),
            stride,
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes between consecutive elements.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Byte offset of element `index`, as a device would bind it.
    pub fn offset_of(&self, index: usize) -> usize {
        index * self.stride
    }

    /// Raw contents, as the device reads them.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Reallocate to hold `len` elements.
    ///
    /// Existing elements below `len` keep their contents; new elements are
    /// zeroed. Allocation failure is reported as
    /// [`EngineError::ResourceExhaustion`].
    pub fn resize(&mut self, len: usize) -> EngineResult<()> {
        let total = len.checked_mul(self.stride).unwrap_or(usize::MAX);
        if total > self.bytes.len() {
            self.bytes
                .try_reserve_exact(total - self.bytes.len())
                .map_err(|source| EngineError::ResourceExhaustion {
                    region: self.label,
                    elements: len,
                    source,
                })?;
        }
        self.bytes.resize(total, 0);
        self.len = len;
        Ok(())
    }

    /// Copy one whole record into element `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn copy_data(&mut self, index: usize, value: &T) {
        assert!(
            index < self.len,
            "{} region index {} out of range ({} elements)",
            self.label,
            index,
            self.len
        );
        let offset = self.offset_of(index);
        let data = bytemuck::bytes_of(value);
        self.bytes[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Read element `index` back.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn element(&self, index: usize) -> T {
        assert!(
            index < self.len,
            "{} region index {} out of range ({} elements)",
            self.label,
            index,
            self.len
        );
        let offset = self.offset_of(index);
        bytemuck::pod_read_unaligned(&self.bytes[offset..offset + size_of::<T>()])
    }
}

impl<T: Pod> fmt::Debug for UploadRegion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRegion")
            .field("label", &self.label)
            .field("len", &self.len)
            .field("stride", &self.stride)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{ObjectConstants, Vertex};
    use bytemuck::Zeroable;
    use glam::{Mat4, Vec3};

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 256), 0);
        assert_eq!(align_up(1, 256), 256);
        assert_eq!(align_up(128, 256), 256);
        assert_eq!(align_up(256, 256), 256);
        assert_eq!(align_up(257, 256), 512);
    }

    #[test]
    fn test_constant_stride_is_padded() {
        let region = UploadRegion::<ObjectConstants>::constant("object", 256);
        assert_eq!(region.stride(), 256);

        let region = UploadRegion::<Vertex>::vertex("waves");
        assert_eq!(region.stride(), 32);
    }

    #[test]
    fn test_copy_and_read_element() {
        let mut region = UploadRegion::<ObjectConstants>::constant("object", 256);
        region.resize(3).unwrap();
        assert_eq!(region.as_bytes().len(), 3 * 256);

        let value = ObjectConstants {
            world: Mat4::from_translation(Vec3::X),
            tex_transform: Mat4::IDENTITY,
        };
        region.copy_data(1, &value);

        assert_eq!(region.element(1), value);
        // Neighbours untouched
        assert_eq!(region.element(0), ObjectConstants::zeroed());
        assert_eq!(region.element(2), ObjectConstants::zeroed());
    }

    #[test]
    fn test_grow_preserves_prefix() {
        let mut region = UploadRegion::<ObjectConstants>::constant("object", 256);
        region.resize(2).unwrap();
        let value = ObjectConstants {
            world: Mat4::from_scale(Vec3::splat(2.0)),
            tex_transform: Mat4::IDENTITY,
        };
        region.copy_data(1, &value);

        region.resize(5).unwrap();
        assert_eq!(region.len(), 5);
        assert_eq!(region.element(1), value);
        assert_eq!(region.element(4), ObjectConstants::zeroed());

        region.resize(1).unwrap();
        assert_eq!(region.len(), 1);
        assert_eq!(region.as_bytes().len(), 256);
    }

    #[test]
    fn test_impossible_allocation_is_resource_exhaustion() {
        let mut region = UploadRegion::<ObjectConstants>::constant("object", 256);
        let err = region.resize(usize::MAX / 2).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ResourceExhaustion {
                region: "object",
                ..
            }
        ));
        assert!(region.is_empty());
    }

    #[test]
    #[should_panic(expected = "object region index 2 out of range")]
    fn test_out_of_range_write_panics() {
        let mut region = UploadRegion::<ObjectConstants>::constant("object", 256);
        region.resize(2).unwrap();
        region.copy_data(2, &ObjectConstants::default());
    }
}
