//! Camera state machine over the device contract.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::capture::pool::BufferPool;
use crate::capture::settings::{Setting, SettingState, SettingTable};
use crate::capture::traits::{DeviceIo, SettingId};
use crate::capture::v4l2::V4l2Io;
use crate::capture::BUFFER_COUNT;
use crate::error::CaptureError;
use crate::frame::RawFrame;
use crate::tables;

/// Everything a running camera owns. Dropping it unmaps the ring and
/// closes the handle.
struct Active<Io: DeviceIo> {
    io: Io,
    pool: BufferPool<Io::Mapping>,
    frame: RawFrame,
    settings: SettingTable,
}

/// Capture state machine, generic over the device backend.
///
/// Starts unbound. [`Camera::initialize_with`] takes the device through
/// capability checks, format negotiation, buffer mapping, and stream start
/// in one step; a failure at any stage rolls the whole attempt back and
/// leaves the camera unbound and reusable.
pub struct Camera<Io: DeviceIo> {
    state: Option<Active<Io>>,
}

/// Camera bound to the real V4L2 backend.
pub type V4l2Camera = Camera<V4l2Io>;

impl<Io: DeviceIo> Camera<Io> {
    /// New unbound camera.
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Whether the camera currently owns a device.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Brings an already-opened device fully up at `width x height` and
    /// `fps` frames per second. Width must be even and both dimensions
    /// nonzero; packed YUYV carries two pixels per macropixel.
    pub fn initialize_with(
        &mut self,
        io: Io,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(), CaptureError> {
        self.ensure_unbound()?;
        if width == 0 || height == 0 || width % 2 != 0 {
            return Err(CaptureError::Setup(format!(
                "unsupported frame size {width}x{height}: width must be even and both dimensions nonzero"
            )));
        }
        // Build the conversion tables now so the first frame does not pay
        // for them.
        tables::tables();
        self.state = Some(bring_up(io, width, height, fps)?);
        Ok(())
    }

    /// Captures one frame into the staging buffer and requeues the ring
    /// buffer it arrived in.
    ///
    /// [`CaptureError::NotReady`] means no capture has completed yet;
    /// callers poll again after a short pause.
    pub fn capture(&mut self) -> Result<(), CaptureError> {
        let active = self.state.as_mut().ok_or(CaptureError::NotInitialized)?;
        let (index, bytes) = active.pool.dequeue_ready(&mut active.io)?;
        active.frame.fill_from(bytes);
        active.pool.queue(&mut active.io, index)
    }

    /// Most recently captured staging frame, when bound.
    pub fn frame(&self) -> Option<&RawFrame> {
        self.state.as_ref().map(|active| &active.frame)
    }

    /// Cached descriptor for `id`. An unbound camera reports every setting
    /// unavailable.
    pub fn get_setting(&self, id: SettingId) -> Setting {
        match &self.state {
            Some(active) => active.settings.get(id),
            None => Setting {
                id,
                state: SettingState::Unavailable,
            },
        }
    }

    /// Writes a control value. Unavailable settings and values outside the
    /// advertised range are rejected before anything reaches the device.
    pub fn set_setting(&mut self, id: SettingId, value: i32) -> Result<(), CaptureError> {
        let active = self.state.as_mut().ok_or(CaptureError::NotInitialized)?;
        active.settings.check(id, value)?;
        active.io.set_control(id, value)
    }

    /// Stops streaming and releases every device resource. Safe on an
    /// unbound or already-shut-down camera, which makes a later
    /// re-initialization valid. Also runs on drop.
    pub fn shutdown(&mut self) {
        if let Some(mut active) = self.state.take() {
            // A stream that refuses to stop must not block the release of
            // the mappings and the handle.
            if let Err(err) = active.io.stream_off() {
                warn!("stream did not stop cleanly: {err}");
            }
            active.pool.release();
        }
    }

    fn ensure_unbound(&self) -> Result<(), CaptureError> {
        if self.state.is_some() {
            return Err(CaptureError::Setup("device is already initialized".into()));
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn io_mut(&mut self) -> Option<&mut Io> {
        self.state.as_mut().map(|active| &mut active.io)
    }
}

impl<Io: DeviceIo> Default for Camera<Io> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Io: DeviceIo> Drop for Camera<Io> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Camera<V4l2Io> {
    /// Opens the device at `path` and brings it fully up.
    pub fn initialize(
        &mut self,
        path: &Path,
        width: u32,
        height: u32,
        fps: u32,
    ) -> Result<(), CaptureError> {
        self.ensure_unbound()?;
        info!(
            device = %path.display(),
            "initializing capture at {width}x{height}, {fps} fps"
        );
        let io = V4l2Io::open(path)?;
        self.initialize_with(io, width, height, fps)
    }
}

fn bring_up<Io: DeviceIo>(
    mut io: Io,
    width: u32,
    height: u32,
    fps: u32,
) -> Result<Active<Io>, CaptureError> {
    let caps = io.capabilities().map_err(stage("capability query"))?;
    if !caps.can_capture {
        return Err(CaptureError::Setup(format!(
            "{} cannot capture video",
            caps.card
        )));
    }
    if !caps.can_stream {
        return Err(CaptureError::Setup(format!(
            "{} does not support streaming i/o",
            caps.card
        )));
    }
    debug!(driver = %caps.driver, bus = %caps.bus_info, "bound {}", caps.card);

    // Not every driver implements cropping; a refusal changes nothing.
    if let Err(err) = io.reset_crop() {
        debug!("crop reset not taken: {err}");
    }

    io.set_format(width, height)
        .map_err(stage("format negotiation"))?;
    io.set_frame_rate(fps)
        .map_err(stage("frame rate selection"))?;

    // Discovery never fails bring-up; an unanswerable control is simply
    // unavailable for the session.
    let settings = SettingTable::query(&mut io);
    let available = settings
        .iter()
        .filter(|setting| matches!(setting.state, SettingState::Available { .. }))
        .count();
    debug!("discovered {available} adjustable controls");

    let mut pool = BufferPool::map(&mut io, BUFFER_COUNT).map_err(stage("buffer mapping"))?;
    for index in 0..pool.len() {
        pool.queue(&mut io, index).map_err(stage("buffer queuing"))?;
    }
    io.stream_on().map_err(stage("stream start"))?;

    Ok(Active {
        io,
        pool,
        frame: RawFrame::new(width as usize, height as usize),
        settings,
    })
}

/// Folds a stage failure into the setup error class, keeping the stage
/// name in front of the device detail.
fn stage(context: &'static str) -> impl Fn(CaptureError) -> CaptureError {
    move |err| {
        let detail = match err {
            CaptureError::Setup(detail) => format!("{context}: {detail}"),
            CaptureError::Device(io_err) => format!("{context}: {io_err}"),
            other => format!("{context}: {other}"),
        };
        CaptureError::Setup(detail)
    }
}
