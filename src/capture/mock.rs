//! In-memory device backend for exercising the capture state machine
//! without hardware.

use std::collections::{BTreeMap, VecDeque};
use std::io;

use crate::capture::traits::{
    BufferGeometry, ControlRange, DeviceCapabilities, DeviceIo, SettingId,
};
use crate::error::CaptureError;

/// Stage at which the mock injects a device failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailPoint {
    Capabilities,
    ResetCrop,
    Format,
    FrameRate,
    RequestBuffers,
    Geometry { index: u32 },
    Map { index: u32 },
    Enqueue,
    Dequeue,
    StreamOn,
    StreamOff,
    QueryControl(SettingId),
    SetControl(SettingId),
}

/// Scriptable stand-in for a capture device.
///
/// Records every contract call in `calls`, keeps a FIFO of queued buffer
/// indices, and fills each mapping with `index + 1` so tests can tell
/// buffers apart by content.
pub(crate) struct MockIo {
    pub(crate) calls: Vec<String>,
    pub(crate) fail: Option<FailPoint>,
    pub(crate) granted_buffers: Option<u32>,
    pub(crate) buffer_len: u32,
    pub(crate) negotiated: Option<(u32, u32)>,
    pub(crate) queued: VecDeque<u32>,
    pub(crate) not_ready_budget: u32,
    pub(crate) controls: BTreeMap<SettingId, ControlRange>,
    pub(crate) written_controls: Vec<(SettingId, i32)>,
    pub(crate) streaming: bool,
    pub(crate) can_capture: bool,
    pub(crate) can_stream: bool,
}

impl MockIo {
    pub(crate) fn new() -> Self {
        let mut controls = BTreeMap::new();
        for id in SettingId::ALL {
            controls.insert(
                id,
                ControlRange {
                    min: -128,
                    max: 127,
                    default: 0,
                },
            );
        }
        Self {
            calls: Vec::new(),
            fail: None,
            granted_buffers: None,
            buffer_len: 0,
            negotiated: None,
            queued: VecDeque::new(),
            not_ready_budget: 0,
            controls,
            written_controls: Vec::new(),
            streaming: false,
            can_capture: true,
            can_stream: true,
        }
    }

    fn trip(&self, point: FailPoint) -> Result<(), CaptureError> {
        if self.fail == Some(point) {
            return Err(CaptureError::Device(io::Error::other("injected failure")));
        }
        Ok(())
    }

    fn effective_len(&self) -> u32 {
        if self.buffer_len != 0 {
            self.buffer_len
        } else if let Some((width, height)) = self.negotiated {
            width * height * 2
        } else {
            64
        }
    }
}

impl DeviceIo for MockIo {
    type Mapping = Vec<u8>;

    fn capabilities(&mut self) -> Result<DeviceCapabilities, CaptureError> {
        self.calls.push("capabilities".into());
        self.trip(FailPoint::Capabilities)?;
        Ok(DeviceCapabilities {
            driver: "mock".into(),
            card: "Mock Camera".into(),
            bus_info: "platform:mock".into(),
            can_capture: self.can_capture,
            can_stream: self.can_stream,
        })
    }

    fn reset_crop(&mut self) -> Result<(), CaptureError> {
        self.calls.push("reset_crop".into());
        self.trip(FailPoint::ResetCrop)
    }

    fn set_format(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        self.calls.push(format!("set_format {width}x{height}"));
        self.trip(FailPoint::Format)?;
        self.negotiated = Some((width, height));
        Ok(())
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<(), CaptureError> {
        self.calls.push(format!("set_frame_rate {fps}"));
        self.trip(FailPoint::FrameRate)
    }

    fn request_buffers(&mut self, count: u32) -> Result<u32, CaptureError> {
        self.calls.push(format!("request_buffers {count}"));
        self.trip(FailPoint::RequestBuffers)?;
        Ok(self.granted_buffers.unwrap_or(count))
    }

    fn buffer_geometry(&mut self, index: u32) -> Result<BufferGeometry, CaptureError> {
        self.calls.push(format!("geometry {index}"));
        self.trip(FailPoint::Geometry { index })?;
        Ok(BufferGeometry {
            length: self.effective_len(),
            offset: index * 0x1000,
        })
    }

    fn map_buffer(
        &mut self,
        index: u32,
        geometry: BufferGeometry,
    ) -> Result<Self::Mapping, CaptureError> {
        self.calls.push(format!("map {index}"));
        self.trip(FailPoint::Map { index })?;
        Ok(vec![index as u8 + 1; geometry.length as usize])
    }

    fn enqueue(&mut self, index: u32) -> Result<(), CaptureError> {
        self.calls.push(format!("enqueue {index}"));
        self.trip(FailPoint::Enqueue)?;
        self.queued.push_back(index);
        Ok(())
    }

    fn dequeue(&mut self) -> Result<u32, CaptureError> {
        self.calls.push("dequeue".into());
        self.trip(FailPoint::Dequeue)?;
        if self.not_ready_budget > 0 {
            self.not_ready_budget -= 1;
            return Err(CaptureError::NotReady);
        }
        self.queued.pop_front().ok_or(CaptureError::NotReady)
    }

    fn stream_on(&mut self) -> Result<(), CaptureError> {
        self.calls.push("stream_on".into());
        self.trip(FailPoint::StreamOn)?;
        self.streaming = true;
        Ok(())
    }

    fn stream_off(&mut self) -> Result<(), CaptureError> {
        self.calls.push("stream_off".into());
        self.trip(FailPoint::StreamOff)?;
        self.streaming = false;
        Ok(())
    }

    fn query_control(&mut self, id: SettingId) -> Result<ControlRange, CaptureError> {
        self.calls.push(format!("query_control {id:?}"));
        self.trip(FailPoint::QueryControl(id))?;
        self.controls
            .get(&id)
            .copied()
            .ok_or(CaptureError::SettingUnavailable(id))
    }

    fn set_control(&mut self, id: SettingId, value: i32) -> Result<(), CaptureError> {
        self.calls.push(format!("set_control {id:?}={value}"));
        self.trip(FailPoint::SetControl(id))?;
        self.written_controls.push((id, value));
        Ok(())
    }
}
