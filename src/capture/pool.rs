//! Fixed ring of mapped streaming buffers.

use std::io;

use crate::capture::traits::{BufferMemory, DeviceIo};
use crate::error::CaptureError;

/// Who currently owns one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BufferState {
    /// Owned by the capture pipeline, waiting to be filled.
    Queued,
    /// Owned by the application; readable until queued again.
    Held,
}

#[derive(Debug)]
struct Buffer<M> {
    memory: M,
    state: BufferState,
}

/// Fixed set of mapped capture buffers and their exchange discipline.
///
/// Every index handed out by [`BufferPool::dequeue_ready`] must go back
/// through [`BufferPool::queue`] before it can fill again; a ring that is
/// never requeued starves after `count` captures. Mappings are released
/// when the pool drops.
#[derive(Debug)]
pub struct BufferPool<M> {
    buffers: Vec<Buffer<M>>,
}

impl<M: BufferMemory> BufferPool<M> {
    /// Requests `count` buffers from the device and maps each one. All
    /// buffers start held by the application.
    ///
    /// The driver must grant exactly `count`; a smaller ring would change
    /// the latency the rest of the engine is tuned for. On failure every
    /// mapping made so far is dropped.
    pub fn map<Io>(io: &mut Io, count: u32) -> Result<Self, CaptureError>
    where
        Io: DeviceIo<Mapping = M>,
    {
        let granted = io.request_buffers(count)?;
        if granted != count {
            return Err(CaptureError::Setup(format!(
                "driver granted {granted} buffers instead of {count}"
            )));
        }
        let mut buffers = Vec::with_capacity(count as usize);
        for index in 0..count {
            let geometry = io.buffer_geometry(index)?;
            let memory = io.map_buffer(index, geometry)?;
            buffers.push(Buffer {
                memory,
                state: BufferState::Held,
            });
        }
        Ok(Self { buffers })
    }

    /// Hands a held buffer to the capture pipeline.
    pub fn queue<Io>(&mut self, io: &mut Io, index: usize) -> Result<(), CaptureError>
    where
        Io: DeviceIo<Mapping = M>,
    {
        let buffer = self.buffers.get_mut(index).ok_or_else(|| {
            CaptureError::Device(io::Error::other(format!(
                "queue of unknown buffer index {index}"
            )))
        })?;
        if buffer.state != BufferState::Held {
            return Err(CaptureError::Device(io::Error::other(format!(
                "queue of buffer {index} which is already queued"
            ))));
        }
        io.enqueue(index as u32)?;
        buffer.state = BufferState::Queued;
        Ok(())
    }

    /// Takes one filled buffer from the pipeline and returns its index and
    /// bytes. The buffer stays held until queued again.
    ///
    /// Indices reported by the driver are checked against the ring before
    /// any memory is touched.
    pub fn dequeue_ready<Io>(&mut self, io: &mut Io) -> Result<(usize, &[u8]), CaptureError>
    where
        Io: DeviceIo<Mapping = M>,
    {
        let index = io.dequeue()? as usize;
        let buffer = self.buffers.get_mut(index).ok_or_else(|| {
            CaptureError::Device(io::Error::other(format!(
                "driver returned out-of-range buffer index {index}"
            )))
        })?;
        if buffer.state != BufferState::Queued {
            return Err(CaptureError::Device(io::Error::other(format!(
                "driver returned buffer {index} which was not queued"
            ))));
        }
        buffer.state = BufferState::Held;
        Ok((index, buffer.memory.as_slice()))
    }

    /// Unmaps every buffer. This also happens when the pool drops; calling
    /// it again is a no-op.
    pub fn release(&mut self) {
        self.buffers.clear();
    }

    /// Number of buffers in the ring.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the ring holds no buffers.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
