//! A compute device emulated in host memory.

use super::{BufferId, ComputeDevice, DeviceError};
use slotmap::SlotMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A [`ComputeDevice`] whose "device memory" is a set of host allocations.
///
/// Useful where no GPU is available, and for exercising the device synchronization path of a bake.
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    buffers: Mutex<SlotMap<BufferId, Vec<f32>>>,
    capacity: Option<usize>,
    num_reads: AtomicUsize,
    num_clears: AtomicUsize,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a device that refuses allocations once `capacity` floats are in use.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    /// Returns the number of live buffers.
    pub fn num_buffers(&self) -> usize {
        self.lock().len()
    }

    /// Returns the number of device → host copies performed so far.
    pub fn num_reads(&self) -> usize {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of buffer clears performed so far.
    pub fn num_clears(&self) -> usize {
        self.num_clears.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SlotMap<BufferId, Vec<f32>>> {
        self.buffers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl ComputeDevice for SoftwareDevice {
    fn allocate(&self, len: usize) -> Result<BufferId, DeviceError> {
        let mut buffers = self.lock();

        if let Some(capacity) = self.capacity {
            let in_use: usize = buffers.values().map(Vec::len).sum();
            if in_use + len > capacity {
                return Err(DeviceError::OutOfMemory { requested: len });
            }
        }

        Ok(buffers.insert(vec![0.0; len]))
    }

    fn write(&self, buffer: BufferId, offset: usize, data: &[f32]) -> Result<(), DeviceError> {
        let mut buffers = self.lock();
        let memory = buffers.get_mut(buffer).ok_or(DeviceError::UnknownBuffer)?;

        let end = offset + data.len();
        let len = memory.len();
        memory
            .get_mut(offset..end)
            .ok_or(DeviceError::OutOfBounds { end, len })?
            .copy_from_slice(data);

        Ok(())
    }

    fn read(&self, buffer: BufferId, out: &mut [f32]) -> Result<(), DeviceError> {
        let buffers = self.lock();
        let memory = buffers.get(buffer).ok_or(DeviceError::UnknownBuffer)?;

        let len = memory.len();
        let source = memory.get(..out.len()).ok_or(DeviceError::OutOfBounds {
            end: out.len(),
            len,
        })?;
        out.copy_from_slice(source);
        self.num_reads.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    fn clear(&self, buffer: BufferId) -> Result<(), DeviceError> {
        let mut buffers = self.lock();
        let memory = buffers.get_mut(buffer).ok_or(DeviceError::UnknownBuffer)?;
        memory.fill(0.0);
        self.num_clears.fetch_add(1, Ordering::Relaxed);

        Ok(())
    }

    fn release(&self, buffer: BufferId) {
        self.lock().remove(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceBuffer;
    use std::sync::Arc;

    #[test]
    fn test_write_then_read() {
        let device: Arc<dyn ComputeDevice> = Arc::new(SoftwareDevice::new());
        let buffer = DeviceBuffer::try_new(&device, 4).unwrap();

        buffer.write(1, &[1.0, 2.0]).unwrap();

        let mut host = [0.0; 4];
        buffer.read(&mut host).unwrap();
        assert_eq!(host, [0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_clear() {
        let software_device = Arc::new(SoftwareDevice::new());
        let device: Arc<dyn ComputeDevice> = software_device.clone();
        let buffer = DeviceBuffer::try_new(&device, 3).unwrap();
        buffer.write(0, &[1.0, 2.0, 3.0]).unwrap();

        buffer.clear().unwrap();

        let mut host = [1.0; 3];
        buffer.read(&mut host).unwrap();
        assert_eq!(host, [0.0; 3]);
        assert_eq!(software_device.num_clears(), 1);
    }

    #[test]
    fn test_clear_released_buffer() {
        let device = SoftwareDevice::new();
        let buffer = device.allocate(3).unwrap();
        device.release(buffer);

        assert_eq!(device.clear(buffer), Err(DeviceError::UnknownBuffer));
        assert_eq!(device.num_clears(), 0);
    }

    #[test]
    fn test_write_out_of_bounds() {
        let device: Arc<dyn ComputeDevice> = Arc::new(SoftwareDevice::new());
        let buffer = DeviceBuffer::try_new(&device, 2).unwrap();

        assert_eq!(
            buffer.write(1, &[1.0, 2.0]),
            Err(DeviceError::OutOfBounds { end: 3, len: 2 })
        );
    }

    #[test]
    fn test_release_on_drop() {
        let device = Arc::new(SoftwareDevice::new());
        let dyn_device: Arc<dyn ComputeDevice> = device.clone();

        let buffer = DeviceBuffer::try_new(&dyn_device, 8).unwrap();
        assert_eq!(device.num_buffers(), 1);

        drop(buffer);
        assert_eq!(device.num_buffers(), 0);
    }

    #[test]
    fn test_capacity() {
        let device = SoftwareDevice::with_capacity(10);

        assert!(device.allocate(6).is_ok());
        assert_eq!(
            device.allocate(6),
            Err(DeviceError::OutOfMemory { requested: 6 })
        );
    }
}
