//! GPU compute devices.
//!
//! Energy fields produced by GPU ray tracing live in device memory. A [`ComputeDevice`] owns
//! that memory; host code only sees it after an explicit, synchronous device → host copy.

use std::sync::Arc;

pub mod software;
pub use software::SoftwareDevice;

slotmap::new_key_type! {
    /// Handle to a buffer allocated on a [`ComputeDevice`].
    pub struct BufferId;
}

/// A device able to hold float buffers outside of host memory.
pub trait ComputeDevice: Send + Sync + std::fmt::Debug {
    /// Allocates a zero-initialized buffer of `len` floats.
    fn allocate(&self, len: usize) -> Result<BufferId, DeviceError>;

    /// Writes `data` into `buffer`, starting at float `offset`.
    fn write(&self, buffer: BufferId, offset: usize, data: &[f32]) -> Result<(), DeviceError>;

    /// Copies the first `out.len()` floats of `buffer` into `out`. Blocks until the copy completes.
    fn read(&self, buffer: BufferId, out: &mut [f32]) -> Result<(), DeviceError>;

    /// Fills `buffer` with zeros.
    fn clear(&self, buffer: BufferId) -> Result<(), DeviceError>;

    /// Frees `buffer`. Releasing an unknown buffer is a no-op.
    fn release(&self, buffer: BufferId);
}

/// A buffer in device memory. The buffer is released when dropped.
#[derive(Debug)]
pub struct DeviceBuffer {
    device: Arc<dyn ComputeDevice>,
    id: BufferId,
    len: usize,
}

impl DeviceBuffer {
    /// Allocates a zero-initialized buffer of `len` floats on `device`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError`] if the device cannot allocate the buffer.
    pub fn try_new(device: &Arc<dyn ComputeDevice>, len: usize) -> Result<Self, DeviceError> {
        let id = device.allocate(len)?;

        Ok(Self {
            device: Arc::clone(device),
            id,
            len,
        })
    }

    /// Returns the number of floats in the buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn device(&self) -> &Arc<dyn ComputeDevice> {
        &self.device
    }

    /// Writes `data` into the buffer, starting at float `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::OutOfBounds`] if the write does not fit in the buffer.
    pub fn write(&self, offset: usize, data: &[f32]) -> Result<(), DeviceError> {
        if offset + data.len() > self.len {
            return Err(DeviceError::OutOfBounds {
                end: offset + data.len(),
                len: self.len,
            });
        }

        self.device.write(self.id, offset, data)
    }

    /// Copies the buffer into `out`, which must not be longer than the buffer.
    pub fn read(&self, out: &mut [f32]) -> Result<(), DeviceError> {
        if out.len() > self.len {
            return Err(DeviceError::OutOfBounds {
                end: out.len(),
                len: self.len,
            });
        }

        self.device.read(self.id, out)
    }

    pub fn clear(&self) -> Result<(), DeviceError> {
        self.device.clear(self.id)
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.device.release(self.id);
    }
}

/// [`ComputeDevice`] errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not allocate a buffer of the requested size.
    #[error("device out of memory (requested {requested} floats)")]
    OutOfMemory { requested: usize },

    /// The buffer does not exist on the device.
    #[error("unknown device buffer")]
    UnknownBuffer,

    /// An access went past the end of a buffer.
    #[error("device access out of bounds (end: {end}, len: {len})")]
    OutOfBounds { end: usize, len: usize },
}
