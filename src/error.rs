//! Error types for the capture and session subsystems.
//!
//! Each component exposes a small closed set of error kinds with a
//! human-readable detail string. Recoverable conditions (`NotReady`,
//! client disconnects) are modeled explicitly so callers can distinguish
//! them from fatal failures without matching on message text.

use std::io;

use thiserror::Error;

use crate::capture::SettingId;

/// Errors reported by the capture engine.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// A stage of multi-step device initialization failed. The device is
    /// rolled back fully before this is returned.
    #[error("device setup failed: {0}")]
    Setup(String),

    /// No buffer holds a completed frame yet. Expected under non-blocking
    /// polling; retry after a short sleep.
    #[error("no frame ready")]
    NotReady,

    /// The operation requires an initialized device.
    #[error("device not initialized")]
    NotInitialized,

    /// The control was never successfully queried or is disabled. Sticky
    /// until the device is reinitialized.
    #[error("setting {0:?} is unavailable on this device")]
    SettingUnavailable(SettingId),

    /// The requested value lies outside the control's reported range. The
    /// device write is never issued.
    #[error("value {value} for setting {id:?} is outside [{min}, {max}]")]
    SettingOutOfRange {
        /// Setting the write was aimed at.
        id: SettingId,
        /// Rejected value.
        value: i32,
        /// Lower bound reported by the device.
        min: i32,
        /// Upper bound reported by the device.
        max: i32,
    },

    /// A runtime device operation failed; the underlying error is surfaced
    /// verbatim.
    #[error("device i/o failed: {0}")]
    Device(io::Error),
}

/// Errors reported by the session server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Creating, binding, or listening on the endpoint failed.
    #[error("server setup failed: {0}")]
    Setup(String),

    /// The exchange has no transport under it: a receive before
    /// `initialize`, or a send with no accepted client.
    #[error("endpoint not connected")]
    NotConnected,

    /// Writing a response failed. The client connection has been torn down;
    /// the exchange is over.
    #[error("send failed: {0}")]
    Send(io::Error),

    /// The listening endpoint itself failed while accepting. Not
    /// recoverable by re-listening.
    #[error("accept failed: {0}")]
    Accept(io::Error),
}

/// Errors reported by the session client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connecting to the server socket failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// An exchange was attempted on a shut-down client.
    #[error("not connected")]
    NotConnected,

    /// A send or receive failed.
    #[error("client i/o failed: {0}")]
    Io(io::Error),
}
