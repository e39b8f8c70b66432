//! Capture engine: device contract, raw V4L2 backend, buffer ring, and the
//! camera state machine that ties them together.

mod device;
mod pool;
mod settings;
mod traits;
mod v4l2;

#[cfg(test)]
pub(crate) mod mock;

pub use device::{Camera, V4l2Camera};
pub use pool::BufferPool;
pub use settings::{Setting, SettingState};
pub use traits::{
    BufferGeometry, BufferMemory, ControlRange, DeviceCapabilities, DeviceIo, SettingId,
};
pub use v4l2::{MappedRegion, V4l2Io};

/// Number of streaming buffers requested from every device.
pub const BUFFER_COUNT: u32 = 4;
