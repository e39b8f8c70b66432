//! Blocking session client, the counterpart to [`crate::server::Server`].

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use crate::error::ClientError;
use crate::proto::{Request, Response};

/// Connects to the session endpoint and exchanges fixed-size records.
///
/// No reconnection on this side: any I/O failure surfaces and the caller
/// decides whether to connect again.
#[derive(Debug)]
pub struct Client {
    stream: Option<UnixStream>,
}

impl Client {
    /// Connects to the session endpoint at `path`.
    pub fn connect(path: &Path) -> Result<Self, ClientError> {
        let stream = UnixStream::connect(path).map_err(|err| {
            ClientError::Connect(format!("cannot reach {}: {err}", path.display()))
        })?;
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Sends one request record.
    pub fn send_request(&mut self, request: Request) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        stream
            .write_all(&request.to_bytes())
            .map_err(ClientError::Io)
    }

    /// Receives one response record.
    pub fn get_response(&mut self) -> Result<Response, ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let mut bytes = [0_u8; Response::SIZE];
        stream.read_exact(&mut bytes).map_err(ClientError::Io)?;
        Ok(Response::from_bytes(bytes))
    }

    /// Closes the connection. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.stream = None;
    }
}
