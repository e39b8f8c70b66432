//! Device-contract traits and the types they exchange.
//!
//! [`DeviceIo`] abstracts the host's video-capture facility so the camera
//! state machine and buffer ring run identically against real hardware and
//! the in-memory mock used by unit tests.

use crate::error::CaptureError;

/// Read access to one capture buffer's memory.
///
/// The production mapping points at kernel-shared pages; the mock hands out
/// plain heap memory. Either way the pool only reads between a dequeue and
/// the following requeue.
pub trait BufferMemory {
    /// The buffer's bytes.
    fn as_slice(&self) -> &[u8];
}

impl BufferMemory for Vec<u8> {
    fn as_slice(&self) -> &[u8] {
        self
    }
}

/// Identity and capability flags reported by a device.
#[derive(Debug, Clone)]
pub struct DeviceCapabilities {
    /// Driver name.
    pub driver: String,
    /// Card or sensor name.
    pub card: String,
    /// Bus location.
    pub bus_info: String,
    /// Whether the device can capture video.
    pub can_capture: bool,
    /// Whether the device supports streaming I/O.
    pub can_stream: bool,
}

/// Length and mapping offset of one kernel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferGeometry {
    /// Buffer length in bytes.
    pub length: u32,
    /// Offset handed to the mapping call.
    pub offset: u32,
}

/// Range metadata reported for an available device control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRange {
    /// Smallest accepted value.
    pub min: i32,
    /// Largest accepted value.
    pub max: i32,
    /// Driver default.
    pub default: i32,
}

/// User-adjustable picture controls managed by the capture engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SettingId {
    /// Picture brightness.
    Brightness,
    /// Picture contrast.
    Contrast,
    /// Color saturation.
    Saturation,
    /// Hue adjustment.
    Hue,
    /// Automatic hue control.
    HueAuto,
    /// Edge sharpness.
    Sharpness,
}

impl SettingId {
    /// Every managed control, in query order.
    pub const ALL: [Self; 6] = [
        Self::Brightness,
        Self::Contrast,
        Self::Saturation,
        Self::Hue,
        Self::HueAuto,
        Self::Sharpness,
    ];
}

/// Contract over the host's video-capture facility.
///
/// Method order mirrors the initialization sequence: capability query,
/// format negotiation, buffer setup, then the streaming enqueue/dequeue
/// cycle and control access.
pub trait DeviceIo {
    /// Mapped buffer memory handed out by [`Self::map_buffer`].
    type Mapping: BufferMemory;

    /// Queries driver identity and capability flags.
    fn capabilities(&mut self) -> Result<DeviceCapabilities, CaptureError>;

    /// Resets any crop window to the device default. Callers treat a
    /// failure as advisory.
    fn reset_crop(&mut self) -> Result<(), CaptureError>;

    /// Negotiates packed YUYV at exactly `width x height`.
    fn set_format(&mut self, width: u32, height: u32) -> Result<(), CaptureError>;

    /// Sets the capture interval to `1 / fps` seconds per frame.
    fn set_frame_rate(&mut self, fps: u32) -> Result<(), CaptureError>;

    /// Asks the driver for `count` streaming buffers; returns how many
    /// were granted.
    fn request_buffers(&mut self, count: u32) -> Result<u32, CaptureError>;

    /// Queries the length and mapping offset of buffer `index`.
    fn buffer_geometry(&mut self, index: u32) -> Result<BufferGeometry, CaptureError>;

    /// Maps buffer `index` into process memory.
    fn map_buffer(
        &mut self,
        index: u32,
        geometry: BufferGeometry,
    ) -> Result<Self::Mapping, CaptureError>;

    /// Hands buffer `index` to the capture pipeline.
    fn enqueue(&mut self, index: u32) -> Result<(), CaptureError>;

    /// Takes one completed buffer back, returning its index.
    /// [`CaptureError::NotReady`] when no capture has finished yet.
    fn dequeue(&mut self) -> Result<u32, CaptureError>;

    /// Starts streaming.
    fn stream_on(&mut self) -> Result<(), CaptureError>;

    /// Stops streaming.
    fn stream_off(&mut self) -> Result<(), CaptureError>;

    /// Queries a control's range. Disabled or unsupported controls report
    /// [`CaptureError::SettingUnavailable`].
    fn query_control(&mut self, id: SettingId) -> Result<ControlRange, CaptureError>;

    /// Writes a control value.
    fn set_control(&mut self, id: SettingId, value: i32) -> Result<(), CaptureError>;
}
