//! # Typed Data Buffers
//!
//! A [`Data`] buffer wraps raw memory together with an element type and
//! per-dimension extents and byte strides, so scene objects can bind
//! vertex arrays, index arrays, voxel grids, and transfer-function control
//! points without forcing a copy.
//!
//! Two ownership modes exist, made explicit in the type:
//!
//! * **shared** — the buffer holds an `Arc` reference into caller-owned
//!   bytes (for example a `.vol` file read into memory, sampled in place
//!   past its header). The `Arc` expresses the lifetime contract: the
//!   memory outlives every buffer viewing it. Mutating shared memory after
//!   commit yields stale or mixed samples, not a crash.
//! * **owned** — the buffer allocates and owns its storage, copied in from
//!   a slice or zero-initialized.
//!
//! Element type and extents are immutable after creation; cloning a buffer
//! clones the reference, never the bytes.

use std::fmt;
use std::sync::Arc;

use bytemuck::NoUninit;
use cgmath::{Vector2, Vector3, Vector4};

use crate::error::{Error, Result};

/// Element type of a [`Data`] buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// 8-bit unsigned scalar.
    UChar,
    /// 32-bit signed scalar.
    Int,
    /// 32-bit unsigned scalar.
    UInt,
    /// 32-bit float scalar.
    Float,
    /// Two 32-bit floats.
    Vec2f,
    /// Three 32-bit floats.
    Vec3f,
    /// Four 32-bit floats.
    Vec4f,
    /// Three 32-bit unsigned integers (triangle indices).
    Vec3ui,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            DataType::UChar => 1,
            DataType::Int | DataType::UInt | DataType::Float => 4,
            DataType::Vec2f => 8,
            DataType::Vec3f | DataType::Vec3ui => 12,
            DataType::Vec4f => 16,
        }
    }

    pub fn component_count(self) -> usize {
        match self {
            DataType::UChar | DataType::Int | DataType::UInt | DataType::Float => 1,
            DataType::Vec2f => 2,
            DataType::Vec3f | DataType::Vec3ui => 3,
            DataType::Vec4f => 4,
        }
    }

    /// Single-component numeric types, usable as volume samples.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            DataType::UChar | DataType::Int | DataType::UInt | DataType::Float
        )
    }

    fn name(self) -> &'static str {
        match self {
            DataType::UChar => "uchar",
            DataType::Int => "int",
            DataType::UInt => "uint",
            DataType::Float => "float",
            DataType::Vec2f => "vec2f",
            DataType::Vec3f => "vec3f",
            DataType::Vec4f => "vec4f",
            DataType::Vec3ui => "vec3ui",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone)]
enum DataSource {
    /// View into caller-owned bytes starting at `offset`.
    Shared { bytes: Arc<[u8]>, offset: usize },
    /// Storage allocated by the buffer. The `Arc` keeps clones cheap;
    /// nothing outside this buffer and its clones references it.
    Owned(Arc<[u8]>),
}

/// An N-dimensional typed array view, shared or owned. See the module docs.
#[derive(Clone)]
pub struct Data {
    ty: DataType,
    extents: [usize; 3],
    /// Byte distance between neighbouring elements, per dimension.
    strides: [usize; 3],
    source: DataSource,
}

fn natural_strides(ty: DataType, extents: [usize; 3]) -> [usize; 3] {
    let s0 = ty.byte_size();
    [s0, s0 * extents[0], s0 * extents[0] * extents[1]]
}

impl Data {
    /// Zero-copy view into caller-owned bytes with natural (tightly packed)
    /// strides.
    pub fn shared(
        bytes: Arc<[u8]>,
        byte_offset: usize,
        ty: DataType,
        extents: [usize; 3],
    ) -> Result<Data> {
        let strides = natural_strides(ty, extents);
        Self::shared_strided(bytes, byte_offset, ty, extents, strides)
    }

    /// One-dimensional zero-copy view.
    pub fn shared_1d(
        bytes: Arc<[u8]>,
        byte_offset: usize,
        ty: DataType,
        count: usize,
    ) -> Result<Data> {
        Self::shared(bytes, byte_offset, ty, [count, 1, 1])
    }

    /// Zero-copy view with explicit per-dimension byte strides, for data
    /// with padding between rows or slices.
    pub fn shared_strided(
        bytes: Arc<[u8]>,
        byte_offset: usize,
        ty: DataType,
        extents: [usize; 3],
        strides: [usize; 3],
    ) -> Result<Data> {
        let span = Self::required_span(byte_offset, ty, extents, strides)?;
        if span > bytes.len() {
            return Err(Error::InvalidBufferShape {
                expected: span,
                actual: bytes.len(),
            });
        }
        Ok(Data {
            ty,
            extents,
            strides,
            source: DataSource::Shared {
                bytes,
                offset: byte_offset,
            },
        })
    }

    /// Owned one-dimensional buffer copied in from a slice. The element
    /// count is inferred from the slice's byte length.
    pub fn from_slice<T: NoUninit>(ty: DataType, values: &[T]) -> Result<Data> {
        let raw: &[u8] = bytemuck::cast_slice(values);
        if raw.len() % ty.byte_size() != 0 {
            return Err(Error::InvalidBufferShape {
                expected: raw.len().next_multiple_of(ty.byte_size()),
                actual: raw.len(),
            });
        }
        let count = raw.len() / ty.byte_size();
        Ok(Data {
            ty,
            extents: [count, 1, 1],
            strides: natural_strides(ty, [count, 1, 1]),
            source: DataSource::Owned(Arc::from(raw)),
        })
    }

    /// Owned three-dimensional buffer copied in from a slice.
    pub fn from_slice_3d<T: NoUninit>(
        ty: DataType,
        extents: [usize; 3],
        values: &[T],
    ) -> Result<Data> {
        let raw: &[u8] = bytemuck::cast_slice(values);
        let strides = natural_strides(ty, extents);
        let span = Self::required_span(0, ty, extents, strides)?;
        if span != raw.len() {
            return Err(Error::InvalidBufferShape {
                expected: span,
                actual: raw.len(),
            });
        }
        Ok(Data {
            ty,
            extents,
            strides,
            source: DataSource::Owned(Arc::from(raw)),
        })
    }

    /// Owned zero-initialized buffer.
    pub fn zeroed(ty: DataType, extents: [usize; 3]) -> Result<Data> {
        let strides = natural_strides(ty, extents);
        let span = Self::required_span(0, ty, extents, strides)?;
        Ok(Data {
            ty,
            extents,
            strides,
            source: DataSource::Owned(Arc::from(vec![0u8; span])),
        })
    }

    /// Byte span needed to address the last element, with overflow reported
    /// rather than truncated.
    fn required_span(
        offset: usize,
        ty: DataType,
        extents: [usize; 3],
        strides: [usize; 3],
    ) -> Result<usize> {
        if extents.iter().any(|&e| e == 0) {
            return Err(Error::InvalidBufferShape {
                expected: ty.byte_size(),
                actual: 0,
            });
        }
        let mut span = offset;
        for dim in 0..3 {
            let reach = (extents[dim] - 1)
                .checked_mul(strides[dim])
                .ok_or(Error::ResourceExhausted { bytes: usize::MAX })?;
            span = span
                .checked_add(reach)
                .ok_or(Error::ResourceExhausted { bytes: usize::MAX })?;
        }
        span.checked_add(ty.byte_size())
            .ok_or(Error::ResourceExhausted { bytes: usize::MAX })
    }

    pub fn data_type(&self) -> DataType {
        self.ty
    }

    pub fn extents(&self) -> [usize; 3] {
        self.extents
    }

    pub fn element_count(&self) -> usize {
        self.extents[0] * self.extents[1] * self.extents[2]
    }

    /// True for buffers viewing caller-owned memory.
    pub fn is_shared(&self) -> bool {
        matches!(self.source, DataSource::Shared { .. })
    }

    fn base(&self) -> (&[u8], usize) {
        match &self.source {
            DataSource::Shared { bytes, offset } => (bytes, *offset),
            DataSource::Owned(bytes) => (bytes, 0),
        }
    }

    fn element_bytes(&self, byte_index: usize, len: usize) -> &[u8] {
        let (bytes, offset) = self.base();
        &bytes[offset + byte_index..offset + byte_index + len]
    }

    fn byte_index_1d(&self, i: usize) -> usize {
        debug_assert!(i < self.element_count());
        i * self.strides[0]
    }

    fn byte_index_3d(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.extents[0] && y < self.extents[1] && z < self.extents[2]);
        x * self.strides[0] + y * self.strides[1] + z * self.strides[2]
    }

    fn read_f32(&self, byte_index: usize) -> f32 {
        bytemuck::pod_read_unaligned(self.element_bytes(byte_index, 4))
    }

    fn read_u32(&self, byte_index: usize) -> u32 {
        bytemuck::pod_read_unaligned(self.element_bytes(byte_index, 4))
    }

    /// Scalar element widened to `f32`. Only valid for scalar types.
    pub fn scalar_at(&self, i: usize) -> f32 {
        self.scalar_from_byte_index(self.byte_index_1d(i))
    }

    /// Stride-aware three-dimensional scalar access (volume sampling).
    pub fn scalar_at_3d(&self, x: usize, y: usize, z: usize) -> f32 {
        self.scalar_from_byte_index(self.byte_index_3d(x, y, z))
    }

    fn scalar_from_byte_index(&self, byte_index: usize) -> f32 {
        debug_assert!(self.ty.is_scalar());
        match self.ty {
            DataType::UChar => self.element_bytes(byte_index, 1)[0] as f32,
            DataType::Float => self.read_f32(byte_index),
            DataType::UInt => self.read_u32(byte_index) as f32,
            DataType::Int => {
                bytemuck::pod_read_unaligned::<i32>(self.element_bytes(byte_index, 4)) as f32
            }
            _ => 0.0,
        }
    }

    /// Contiguous typed view of the whole buffer. `None` when the strides
    /// are not tightly packed, or when `T` does not fit the bytes.
    pub fn as_slice<T: bytemuck::Pod>(&self) -> Option<&[T]> {
        if self.strides != natural_strides(self.ty, self.extents) {
            return None;
        }
        let span = self.element_count() * self.ty.byte_size();
        let (bytes, offset) = self.base();
        bytemuck::try_cast_slice(&bytes[offset..offset + span]).ok()
    }

    pub fn vec2f_at(&self, i: usize) -> Vector2<f32> {
        debug_assert_eq!(self.ty, DataType::Vec2f);
        let base = self.byte_index_1d(i);
        Vector2::new(self.read_f32(base), self.read_f32(base + 4))
    }

    pub fn vec3f_at(&self, i: usize) -> Vector3<f32> {
        debug_assert_eq!(self.ty, DataType::Vec3f);
        let base = self.byte_index_1d(i);
        Vector3::new(
            self.read_f32(base),
            self.read_f32(base + 4),
            self.read_f32(base + 8),
        )
    }

    pub fn vec4f_at(&self, i: usize) -> Vector4<f32> {
        debug_assert_eq!(self.ty, DataType::Vec4f);
        let base = self.byte_index_1d(i);
        Vector4::new(
            self.read_f32(base),
            self.read_f32(base + 4),
            self.read_f32(base + 8),
            self.read_f32(base + 12),
        )
    }

    pub fn vec3u_at(&self, i: usize) -> [u32; 3] {
        debug_assert_eq!(self.ty, DataType::Vec3ui);
        let base = self.byte_index_1d(i);
        [
            self.read_u32(base),
            self.read_u32(base + 4),
            self.read_u32(base + 8),
        ]
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Data")
            .field("ty", &self.ty)
            .field("extents", &self.extents)
            .field("shared", &self.is_shared())
            .finish()
    }
}
