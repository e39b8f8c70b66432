//! Per-command service policy and the bounded capture retry.

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::capture::{Camera, DeviceIo};
use crate::error::CaptureError;
use crate::proto::{Command, Request, Response};

/// What the service loop does with one received request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Send this response and keep serving.
    Reply(Response),
    /// Refresh every camera, then answer with the running request count.
    Snapshot,
    /// Stop serving.
    Exit,
    /// Unknown command: say nothing, keep serving.
    Ignore,
}

/// Maps one request to the action the service loop takes.
pub fn dispatch(request: &Request) -> Action {
    match request.command() {
        Some(Command::Ping) => Action::Reply(Response::reply(request, 0)),
        Some(Command::GetMap) => Action::Snapshot,
        Some(Command::Exit) => Action::Exit,
        None => {
            warn!(
                cmd = request.cmd,
                trx_id = request.trx_id,
                "ignoring unknown command"
            );
            Action::Ignore
        }
    }
}

/// Polls [`Camera::capture`] until a frame lands or the attempt budget is
/// spent, sleeping `delay` between polls.
///
/// Only the transient not-ready condition consumes attempts; any real
/// failure aborts immediately. At least one attempt is always made, and
/// exhaustion surfaces the last not-ready error to the caller.
pub fn capture_with_retry<Io: DeviceIo>(
    camera: &mut Camera<Io>,
    attempts: u32,
    delay: Duration,
) -> Result<(), CaptureError> {
    let mut remaining = attempts.max(1);
    loop {
        match camera.capture() {
            Err(CaptureError::NotReady) if remaining > 1 => {
                remaining -= 1;
                thread::sleep(delay);
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{capture_with_retry, dispatch, Action};
    use crate::capture::mock::{FailPoint, MockIo};
    use crate::capture::Camera;
    use crate::error::CaptureError;
    use crate::proto::{Command, Request, Response};
    use std::time::Duration;

    fn ready_camera() -> Camera<MockIo> {
        let mut camera = Camera::new();
        camera
            .initialize_with(MockIo::new(), 8, 2, 15)
            .expect("initialize_with should succeed");
        camera
    }

    fn polls(camera: &mut Camera<MockIo>) -> usize {
        camera
            .io_mut()
            .expect("camera should be bound")
            .calls
            .iter()
            .filter(|call| call.as_str() == "dequeue")
            .count()
    }

    #[test]
    fn ping_echoes_with_zero_data() {
        let request = Request::new(7, Command::Ping);
        assert_eq!(
            dispatch(&request),
            Action::Reply(Response::reply(&request, 0))
        );
    }

    #[test]
    fn get_map_requests_a_snapshot() {
        assert_eq!(dispatch(&Request::new(1, Command::GetMap)), Action::Snapshot);
    }

    #[test]
    fn exit_stops_the_loop() {
        assert_eq!(dispatch(&Request::new(2, Command::Exit)), Action::Exit);
    }

    #[test]
    fn unknown_commands_are_ignored_without_a_reply() {
        assert_eq!(dispatch(&Request { trx_id: 3, cmd: 0x7F }), Action::Ignore);
        assert_eq!(dispatch(&Request { trx_id: 4, cmd: 0 }), Action::Ignore);
    }

    #[test]
    fn retry_polls_until_a_frame_lands() {
        let mut camera = ready_camera();
        camera
            .io_mut()
            .expect("camera should be bound")
            .not_ready_budget = 3;
        capture_with_retry(&mut camera, 5, Duration::ZERO).expect("retry should succeed");
        assert_eq!(polls(&mut camera), 4);
    }

    #[test]
    fn retry_exhaustion_surfaces_not_ready() {
        let mut camera = ready_camera();
        camera
            .io_mut()
            .expect("camera should be bound")
            .not_ready_budget = 10;
        let err =
            capture_with_retry(&mut camera, 3, Duration::ZERO).expect_err("retry should fail");
        assert!(matches!(err, CaptureError::NotReady), "got {err:?}");
        assert_eq!(polls(&mut camera), 3);
    }

    #[test]
    fn a_device_failure_aborts_the_retry_loop_at_once() {
        let mut camera = ready_camera();
        camera.io_mut().expect("camera should be bound").fail = Some(FailPoint::Dequeue);
        let err =
            capture_with_retry(&mut camera, 50, Duration::ZERO).expect_err("retry should fail");
        assert!(matches!(err, CaptureError::Device(_)), "got {err:?}");
        assert_eq!(polls(&mut camera), 1);
    }

    #[test]
    fn an_unbound_camera_fails_fast() {
        let mut camera: Camera<MockIo> = Camera::new();
        let err =
            capture_with_retry(&mut camera, 50, Duration::ZERO).expect_err("retry should fail");
        assert!(matches!(err, CaptureError::NotInitialized), "got {err:?}");
    }

    #[test]
    fn a_zero_budget_still_makes_one_attempt() {
        let mut camera = ready_camera();
        capture_with_retry(&mut camera, 0, Duration::ZERO).expect("single attempt should succeed");
        assert_eq!(polls(&mut camera), 1);
    }
}
