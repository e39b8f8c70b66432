//! Session server: one Unix-domain listener, at most one client at a time.

use std::fs;
use std::io::{self, Read, Write};
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::ptr;

use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::proto::{Request, Response};

/// Creates a bound, listening Unix-domain socket with a backlog of one.
///
/// `UnixListener::bind` always asks for a large backlog; the session
/// contract wants the kernel holding at most one waiting client while
/// another is being served.
fn listen_with_backlog(path: &Path) -> io::Result<UnixListener> {
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }
    // Owns the descriptor from here on; any early return closes it.
    let socket = unsafe { OwnedFd::from_raw_fd(fd) };

    let mut addr: libc::sockaddr_un = unsafe { mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;
    let bytes = path.as_os_str().as_bytes();
    if bytes.len() >= addr.sun_path.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket path does not fit in sun_path",
        ));
    }
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    let len = mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
    if unsafe { libc::bind(socket.as_raw_fd(), ptr::addr_of!(addr).cast(), len) } != 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::listen(socket.as_raw_fd(), 1) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(UnixListener::from(socket))
}

/// Session endpoint over a Unix-domain socket.
///
/// Clients come and go; the server absorbs every receive-side connection
/// loss by accepting the next client, and only a failure of the listening
/// endpoint itself surfaces. Send failures tear the client connection
/// down and are reported, never retried.
pub struct Server {
    path: Option<PathBuf>,
    listener: Option<UnixListener>,
    client: Option<UnixStream>,
}

impl Server {
    /// New server, not yet listening.
    pub fn new() -> Self {
        Self {
            path: None,
            listener: None,
            client: None,
        }
    }

    /// Whether the server is listening.
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Binds and listens at `path`, replacing any stale socket file a
    /// previous run left behind.
    pub fn initialize(&mut self, path: &Path) -> Result<(), ServerError> {
        if self.listener.is_some() {
            return Err(ServerError::Setup("server is already listening".into()));
        }
        match fs::remove_file(path) {
            Ok(()) => debug!(socket = %path.display(), "removed stale socket file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(ServerError::Setup(format!(
                    "cannot clear stale socket {}: {err}",
                    path.display()
                )));
            }
        }
        let listener = match listen_with_backlog(path) {
            Ok(listener) => listener,
            Err(err) => {
                // bind may have created the inode before a later step
                // failed; a failed setup leaves nothing at the path.
                let _ = fs::remove_file(path);
                return Err(ServerError::Setup(format!(
                    "cannot listen on {}: {err}",
                    path.display()
                )));
            }
        };
        info!(socket = %path.display(), "session endpoint ready");
        self.path = Some(path.to_path_buf());
        self.listener = Some(listener);
        Ok(())
    }

    /// Receives the next complete request, accepting or re-accepting a
    /// client as needed.
    ///
    /// A client lost mid-record costs nothing: the partial bytes die with
    /// the connection and accumulation restarts from zero with the next
    /// client. Only a listening-endpoint failure surfaces.
    pub fn get_request(&mut self) -> Result<Request, ServerError> {
        loop {
            let mut stream = match self.client.take() {
                Some(stream) => stream,
                None => self.accept_client()?,
            };
            let mut bytes = [0_u8; Request::SIZE];
            match stream.read_exact(&mut bytes) {
                Ok(()) => {
                    self.client = Some(stream);
                    return Ok(Request::from_bytes(bytes));
                }
                Err(err) => {
                    // The stream drops here, closing the connection.
                    debug!("client lost mid-request: {err}");
                }
            }
        }
    }

    /// Sends one response to the connected client.
    ///
    /// A failed send closes the connection and surfaces; the next
    /// `get_request` accepts a fresh client.
    pub fn send_response(&mut self, response: Response) -> Result<(), ServerError> {
        let stream = self.client.as_mut().ok_or(ServerError::NotConnected)?;
        if let Err(err) = stream.write_all(&response.to_bytes()) {
            self.client = None;
            return Err(ServerError::Send(err));
        }
        Ok(())
    }

    /// Disconnects any client, stops listening, and removes the socket
    /// path. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.client = None;
        self.listener = None;
        if let Some(path) = self.path.take() {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(socket = %path.display(), "socket file not removed: {err}"),
            }
        }
    }

    fn accept_client(&self) -> Result<UnixStream, ServerError> {
        let listener = self.listener.as_ref().ok_or(ServerError::NotConnected)?;
        loop {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    return Ok(stream);
                }
                // A signal landing mid-accept is not an endpoint failure.
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(ServerError::Accept(err)),
            }
        }
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}
