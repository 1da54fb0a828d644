//! GPU buffers with map / write / unmap access
//!
//! The CPU-side backing store stands in for the device allocation. Mapping
//! hands out a guard that unmaps on drop; `WriteDiscard` replaces the backing
//! store instead of preserving previous contents.

use crate::core::{EngineError, EngineResult};
use bitflags::bitflags;
use bytemuck::{AnyBitPattern, NoUninit};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

bitflags! {
    /// Who may read or write a buffer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessHint: u8 {
        /// Read by shaders
        const GPU_READ = 1 << 0;
        /// Written by the GPU (stream out, render target)
        const GPU_WRITE = 1 << 1;
        /// Mapped for reading on the CPU
        const CPU_READ = 1 << 2;
        /// Mapped for writing on the CPU
        const CPU_WRITE = 1 << 3;
    }
}

/// Binding role of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Vertex stream
    Vertex,
    /// Index stream
    Index,
    /// Shader constants
    Constant,
}

/// Map access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapAccess {
    /// Read previous contents
    ReadOnly,
    /// Overwrite parts of the previous contents
    WriteOnly,
    /// Read and write previous contents
    ReadWrite,
    /// Previous contents are discarded; a fresh zeroed store is mapped
    WriteDiscard,
}

impl MapAccess {
    fn reads(self) -> bool {
        matches!(self, MapAccess::ReadOnly | MapAccess::ReadWrite)
    }

    fn writes(self) -> bool {
        !matches!(self, MapAccess::ReadOnly)
    }
}

/// Vertex, index or constant buffer
#[derive(Debug)]
pub struct GraphicsBuffer {
    id: u64,
    kind: BufferKind,
    hint: AccessHint,
    size: usize,
    data: Mutex<Vec<u8>>,
    discards: AtomicU64,
}

impl GraphicsBuffer {
    /// Create a buffer of `size` bytes
    ///
    /// A buffer that nobody may write after creation must be given its
    /// initial contents.
    pub fn new(id: u64, kind: BufferKind, hint: AccessHint, size: usize, initial: Option<&[u8]>) -> EngineResult<Self> {
        let writable = hint.intersects(AccessHint::CPU_WRITE | AccessHint::GPU_WRITE);
        let data = match initial {
            Some(bytes) if bytes.len() != size => {
                return Err(EngineError::invalid_params(format!(
                    "initial data is {} bytes, buffer is {size}",
                    bytes.len()
                )));
            }
            Some(bytes) => bytes.to_vec(),
            None if !writable => {
                return Err(EngineError::invalid_params(
                    "immutable buffer created without initial data",
                ));
            }
            None => vec![0; size],
        };

        Ok(Self {
            id,
            kind,
            hint,
            size,
            data: Mutex::new(data),
            discards: AtomicU64::new(0),
        })
    }

    /// Factory-assigned id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Binding role
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Access hint given at creation
    pub fn access_hint(&self) -> AccessHint {
        self.hint
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// How many times the store was replaced by a discard map
    pub fn discard_count(&self) -> u64 {
        self.discards.load(Ordering::Relaxed)
    }

    /// Map the buffer; the returned guard unmaps when dropped
    ///
    /// Fails with `ERR_INVALID_STATE` when the access is not allowed by the
    /// buffer's hint or the buffer is already mapped.
    pub fn map(&self, access: MapAccess) -> EngineResult<BufferMapping<'_>> {
        if access.reads() && !self.hint.contains(AccessHint::CPU_READ) {
            return Err(EngineError::invalid_state(format!("buffer {} is not CPU readable", self.id)));
        }
        if access.writes() && !self.hint.contains(AccessHint::CPU_WRITE) {
            return Err(EngineError::invalid_state(format!("buffer {} is not CPU writable", self.id)));
        }

        let mut guard = match self.data.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(EngineError::invalid_state(format!("buffer {} is already mapped", self.id)));
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if access == MapAccess::WriteDiscard {
            *guard = vec![0; self.size];
            self.discards.fetch_add(1, Ordering::Relaxed);
        }
        Ok(BufferMapping { guard, access, buffer_id: self.id })
    }
}

/// A mapped buffer region
pub struct BufferMapping<'a> {
    guard: MutexGuard<'a, Vec<u8>>,
    access: MapAccess,
    buffer_id: u64,
}

impl BufferMapping<'_> {
    /// Access mode used to map
    pub fn access(&self) -> MapAccess {
        self.access
    }

    /// Mapped bytes
    pub fn bytes(&self) -> &[u8] {
        &self.guard
    }

    /// Copy `values` into the mapping at `offset` bytes
    pub fn write<T: NoUninit>(&mut self, offset: usize, values: &[T]) -> EngineResult<()> {
        if !self.access.writes() {
            return Err(EngineError::invalid_state(format!("buffer {} is mapped read-only", self.buffer_id)));
        }
        let bytes: &[u8] = bytemuck::cast_slice(values);
        let end = offset + bytes.len();
        let target = self.guard.get_mut(offset..end).ok_or_else(|| {
            EngineError::invalid_params(format!("write of {} bytes at {offset} overflows buffer", bytes.len()))
        })?;
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Read `count` values starting at `offset` bytes
    pub fn read<T: AnyBitPattern>(&self, offset: usize, count: usize) -> EngineResult<Vec<T>> {
        let stride = std::mem::size_of::<T>();
        let end = offset + stride * count;
        let source = self.guard.get(offset..end).ok_or_else(|| {
            EngineError::invalid_params(format!("read of {count} values at {offset} overflows buffer"))
        })?;
        Ok(source.chunks_exact(stride).map(bytemuck::pod_read_unaligned).collect())
    }

    /// Unmap explicitly
    pub fn unmap(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_buffer(size: usize) -> GraphicsBuffer {
        GraphicsBuffer::new(
            1,
            BufferKind::Vertex,
            AccessHint::GPU_READ | AccessHint::CPU_WRITE | AccessHint::CPU_READ,
            size,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_write_then_read_back() {
        let buffer = dynamic_buffer(16);
        {
            let mut mapping = buffer.map(MapAccess::WriteOnly).unwrap();
            mapping.write(4, &[1.5f32, -2.0]).unwrap();
        }
        let mapping = buffer.map(MapAccess::ReadOnly).unwrap();
        assert_eq!(mapping.read::<f32>(4, 2).unwrap(), vec![1.5, -2.0]);
    }

    #[test]
    fn test_write_discard_replaces_contents() {
        let buffer = dynamic_buffer(8);
        buffer.map(MapAccess::WriteOnly).unwrap().write(0, &[7u32, 9]).unwrap();

        let mapping = buffer.map(MapAccess::WriteDiscard).unwrap();
        assert_eq!(mapping.bytes(), &[0u8; 8]);
        mapping.unmap();
        assert_eq!(buffer.discard_count(), 1);
    }

    #[test]
    fn test_double_map_is_invalid_state() {
        let buffer = dynamic_buffer(8);
        let _mapping = buffer.map(MapAccess::WriteDiscard).unwrap();
        let error = buffer.map(MapAccess::WriteOnly).err().unwrap();
        assert_eq!(error.code(), crate::core::ErrorCode::InvalidState);
    }

    #[test]
    fn test_access_hint_is_enforced() {
        let buffer = GraphicsBuffer::new(2, BufferKind::Index, AccessHint::GPU_READ, 4, Some(&[0, 1, 2, 3])).unwrap();
        assert!(buffer.map(MapAccess::ReadOnly).is_err());
        assert!(buffer.map(MapAccess::WriteDiscard).is_err());

        let error = GraphicsBuffer::new(3, BufferKind::Index, AccessHint::GPU_READ, 4, None).unwrap_err();
        assert_eq!(error.code(), crate::core::ErrorCode::InvalidParams);
    }

    #[test]
    fn test_out_of_range_write() {
        let buffer = dynamic_buffer(4);
        let mut mapping = buffer.map(MapAccess::WriteOnly).unwrap();
        assert!(mapping.write(2, &[1u32]).is_err());
    }
}
