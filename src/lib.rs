//! visiond: a V4L2 frame-capture service library
//!
//! Pairs a memory-mapped capture engine (device binding, a fixed ring of
//! kernel buffers, YUYV-to-RGB and grayscale conversion) with a
//! single-client session protocol over a Unix-domain socket. Everything is
//! synchronous and blocking; the capture state machine runs against a
//! device trait so it can be exercised without hardware.

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod frame;
pub mod proto;
pub mod server;
pub mod service;

mod tables;

pub use capture::{Camera, DeviceIo, SettingId, V4l2Camera};
pub use client::Client;
pub use config::{Config, ConfigError};
pub use error::{CaptureError, ClientError, ServerError};
pub use frame::RawFrame;
pub use proto::{Command, Request, Response};
pub use server::Server;
