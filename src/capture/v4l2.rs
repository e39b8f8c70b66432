//! Raw V4L2 backend for the device contract.
//!
//! Drives the kernel through the `v4l` crate's low-level ioctl and mmap
//! wrappers rather than its high-level streams: the capture engine owns the
//! queue/dequeue ring explicitly, keeps the descriptor non-blocking, and
//! manages each buffer mapping's lifetime itself.

use std::fs::{self, OpenOptions};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::Path;
use std::ptr::{self, NonNull};
use std::slice;

use tracing::warn;
use v4l::v4l2;
use v4l::v4l_sys::{
    v4l2_buffer, v4l2_capability, v4l2_control, v4l2_crop, v4l2_cropcap, v4l2_format,
    v4l2_queryctrl, v4l2_requestbuffers, v4l2_streamparm,
};

use crate::capture::traits::{
    BufferGeometry, BufferMemory, ControlRange, DeviceCapabilities, DeviceIo, SettingId,
};
use crate::error::CaptureError;

const BUF_TYPE: u32 = v4l::buffer::Type::VideoCapture as u32;
const MEMORY_MMAP: u32 = v4l::memory::Memory::Mmap as u32;

const PIXEL_FORMAT_YUYV: u32 = u32::from_le_bytes(*b"YUYV");

// UAPI values the `v4l` crate does not re-export.
const CAP_VIDEO_CAPTURE: u32 = 0x0000_0001;
const CAP_STREAMING: u32 = 0x0400_0000;
const FIELD_INTERLACED: u32 = 4;
const CTRL_FLAG_DISABLED: u32 = 0x0001;

const CID_BRIGHTNESS: u32 = 0x0098_0900;
const CID_CONTRAST: u32 = 0x0098_0901;
const CID_SATURATION: u32 = 0x0098_0902;
const CID_HUE: u32 = 0x0098_0903;
const CID_HUE_AUTO: u32 = 0x0098_0919;
const CID_SHARPNESS: u32 = 0x0098_091b;

const fn control_id(id: SettingId) -> u32 {
    match id {
        SettingId::Brightness => CID_BRIGHTNESS,
        SettingId::Contrast => CID_CONTRAST,
        SettingId::Saturation => CID_SATURATION,
        SettingId::Hue => CID_HUE,
        SettingId::HueAuto => CID_HUE_AUTO,
        SettingId::Sharpness => CID_SHARPNESS,
    }
}

/// Repeats `op` until it completes without being interrupted by a signal.
fn retry_eintr<T, F>(mut op: F) -> io::Result<T>
where
    F: FnMut() -> io::Result<T>,
{
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
            other => return other,
        }
    }
}

/// Reads a NUL-terminated driver string out of a fixed C array.
fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// One kernel buffer mapped into process memory; unmapped on drop.
pub struct MappedRegion {
    ptr: NonNull<u8>,
    len: usize,
}

impl BufferMemory for MappedRegion {
    fn as_slice(&self) -> &[u8] {
        // Valid for the life of the mapping; len never changes after mmap.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        if let Err(err) = unsafe { v4l2::munmap(self.ptr.as_ptr().cast(), self.len) } {
            warn!("failed to unmap capture buffer: {err}");
        }
    }
}

/// Production device backend over raw V4L2 ioctls.
pub struct V4l2Io {
    fd: OwnedFd,
}

impl V4l2Io {
    /// Opens the character device at `path` in non-blocking read/write
    /// mode.
    pub fn open(path: &Path) -> Result<Self, CaptureError> {
        let meta = fs::metadata(path).map_err(|err| {
            CaptureError::Setup(format!("cannot identify {}: {err}", path.display()))
        })?;
        if !meta.file_type().is_char_device() {
            return Err(CaptureError::Setup(format!(
                "{} is not a character device",
                path.display()
            )));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|err| {
                CaptureError::Setup(format!("cannot open {}: {err}", path.display()))
            })?;
        Ok(Self { fd: file.into() })
    }
}

impl DeviceIo for V4l2Io {
    type Mapping = MappedRegion;

    fn capabilities(&mut self) -> Result<DeviceCapabilities, CaptureError> {
        let mut caps: v4l2_capability = unsafe { mem::zeroed() };
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_QUERYCAP,
                ptr::addr_of_mut!(caps).cast(),
            )
        })
        .map_err(CaptureError::Device)?;
        Ok(DeviceCapabilities {
            driver: c_string(&caps.driver),
            card: c_string(&caps.card),
            bus_info: c_string(&caps.bus_info),
            can_capture: caps.capabilities & CAP_VIDEO_CAPTURE != 0,
            can_stream: caps.capabilities & CAP_STREAMING != 0,
        })
    }

    fn reset_crop(&mut self) -> Result<(), CaptureError> {
        let mut cropcap: v4l2_cropcap = unsafe { mem::zeroed() };
        cropcap.type_ = BUF_TYPE;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_CROPCAP,
                ptr::addr_of_mut!(cropcap).cast(),
            )
        })
        .map_err(CaptureError::Device)?;

        let mut crop: v4l2_crop = unsafe { mem::zeroed() };
        crop.type_ = BUF_TYPE;
        crop.c = cropcap.defrect;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_S_CROP,
                ptr::addr_of_mut!(crop).cast(),
            )
        })
        .map_err(CaptureError::Device)
    }

    fn set_format(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        let mut fmt: v4l2_format = unsafe { mem::zeroed() };
        fmt.type_ = BUF_TYPE;
        unsafe {
            fmt.fmt.pix.width = width;
            fmt.fmt.pix.height = height;
            fmt.fmt.pix.pixelformat = PIXEL_FORMAT_YUYV;
            fmt.fmt.pix.field = FIELD_INTERLACED;
        }
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_S_FMT,
                ptr::addr_of_mut!(fmt).cast(),
            )
        })
        .map_err(CaptureError::Device)?;

        // The driver may quietly substitute the nearest size it supports.
        let (granted_w, granted_h) = unsafe { (fmt.fmt.pix.width, fmt.fmt.pix.height) };
        if granted_w != width || granted_h != height {
            return Err(CaptureError::Setup(format!(
                "driver adjusted frame size from {width}x{height} to {granted_w}x{granted_h}"
            )));
        }
        Ok(())
    }

    fn set_frame_rate(&mut self, fps: u32) -> Result<(), CaptureError> {
        let mut parm: v4l2_streamparm = unsafe { mem::zeroed() };
        parm.type_ = BUF_TYPE;
        unsafe {
            parm.parm.capture.timeperframe.numerator = 1;
            parm.parm.capture.timeperframe.denominator = fps;
        }
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_S_PARM,
                ptr::addr_of_mut!(parm).cast(),
            )
        })
        .map_err(CaptureError::Device)
    }

    fn request_buffers(&mut self, count: u32) -> Result<u32, CaptureError> {
        let mut req: v4l2_requestbuffers = unsafe { mem::zeroed() };
        req.count = count;
        req.type_ = BUF_TYPE;
        req.memory = MEMORY_MMAP;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_REQBUFS,
                ptr::addr_of_mut!(req).cast(),
            )
        })
        .map_err(CaptureError::Device)?;
        Ok(req.count)
    }

    fn buffer_geometry(&mut self, index: u32) -> Result<BufferGeometry, CaptureError> {
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = BUF_TYPE;
        buf.memory = MEMORY_MMAP;
        buf.index = index;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_QUERYBUF,
                ptr::addr_of_mut!(buf).cast(),
            )
        })
        .map_err(CaptureError::Device)?;
        Ok(BufferGeometry {
            length: buf.length,
            offset: unsafe { buf.m.offset },
        })
    }

    fn map_buffer(
        &mut self,
        _index: u32,
        geometry: BufferGeometry,
    ) -> Result<Self::Mapping, CaptureError> {
        let length = geometry.length as usize;
        let start = unsafe {
            v4l2::mmap(
                ptr::null_mut(),
                length,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd.as_raw_fd(),
                libc::off_t::from(geometry.offset),
            )
        }
        .map_err(CaptureError::Device)?;
        let ptr = NonNull::new(start.cast::<u8>()).ok_or_else(|| {
            CaptureError::Device(io::Error::other("buffer mapping returned a null address"))
        })?;
        Ok(MappedRegion { ptr, len: length })
    }

    fn enqueue(&mut self, index: u32) -> Result<(), CaptureError> {
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = BUF_TYPE;
        buf.memory = MEMORY_MMAP;
        buf.index = index;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_QBUF,
                ptr::addr_of_mut!(buf).cast(),
            )
        })
        .map_err(CaptureError::Device)
    }

    fn dequeue(&mut self) -> Result<u32, CaptureError> {
        let mut buf: v4l2_buffer = unsafe { mem::zeroed() };
        buf.type_ = BUF_TYPE;
        buf.memory = MEMORY_MMAP;
        match retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_DQBUF,
                ptr::addr_of_mut!(buf).cast(),
            )
        }) {
            Ok(()) => Ok(buf.index),
            // Non-blocking descriptor: EAGAIN means no frame has finished.
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Err(CaptureError::NotReady),
            Err(err) => Err(CaptureError::Device(err)),
        }
    }

    fn stream_on(&mut self) -> Result<(), CaptureError> {
        let mut kind: u32 = BUF_TYPE;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_STREAMON,
                ptr::addr_of_mut!(kind).cast(),
            )
        })
        .map_err(CaptureError::Device)
    }

    fn stream_off(&mut self) -> Result<(), CaptureError> {
        let mut kind: u32 = BUF_TYPE;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_STREAMOFF,
                ptr::addr_of_mut!(kind).cast(),
            )
        })
        .map_err(CaptureError::Device)
    }

    fn query_control(&mut self, id: SettingId) -> Result<ControlRange, CaptureError> {
        let mut query: v4l2_queryctrl = unsafe { mem::zeroed() };
        query.id = control_id(id);
        match retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_QUERYCTRL,
                ptr::addr_of_mut!(query).cast(),
            )
        }) {
            Ok(()) => {}
            // EINVAL is how drivers report a control they do not implement;
            // ENOTTY comes from drivers with no control handler at all.
            Err(err) if matches!(err.raw_os_error(), Some(libc::EINVAL | libc::ENOTTY)) => {
                return Err(CaptureError::SettingUnavailable(id));
            }
            Err(err) => return Err(CaptureError::Device(err)),
        }
        if query.flags & CTRL_FLAG_DISABLED != 0 {
            return Err(CaptureError::SettingUnavailable(id));
        }
        Ok(ControlRange {
            min: query.minimum,
            max: query.maximum,
            default: query.default_value,
        })
    }

    fn set_control(&mut self, id: SettingId, value: i32) -> Result<(), CaptureError> {
        let mut control: v4l2_control = unsafe { mem::zeroed() };
        control.id = control_id(id);
        control.value = value;
        retry_eintr(|| unsafe {
            v4l2::ioctl(
                self.fd.as_raw_fd(),
                v4l2::vidioc::VIDIOC_S_CTRL,
                ptr::addr_of_mut!(control).cast(),
            )
        })
        .map_err(CaptureError::Device)
    }
}
