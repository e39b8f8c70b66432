//! Capture-path tests against the vivid virtual camera.
//!
//! These tests require:
//! - The `integration` feature flag: `cargo test --features integration`
//! - The vivid kernel module loaded: `modprobe vivid`
//! - Access to /dev/video* devices (sudo or video group membership)
//!
//! vivid generates frames continuously, so a handful of polls is always
//! enough to land a capture.

#![cfg(feature = "integration")]

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use serial_test::serial;
use visiond::capture::SettingState;
use visiond::{CaptureError, SettingId, V4l2Camera};

/// Find the first vivid capture device.
///
/// Uses sysfs to check the device name before opening, avoiding
/// unnecessary opens on real cameras. vivid exposes several device nodes
/// per instance; only the `vid-cap` one captures.
fn find_vivid_capture() -> Option<PathBuf> {
    let video4linux = Path::new("/sys/class/video4linux");
    if !video4linux.exists() {
        return None;
    }
    for index in 0..16 {
        let name_path = video4linux.join(format!("video{index}")).join("name");
        let Ok(name) = fs::read_to_string(&name_path) else {
            continue;
        };
        if name.to_lowercase().contains("vivid") && name.contains("vid-cap") {
            return Some(PathBuf::from(format!("/dev/video{index}")));
        }
    }
    None
}

/// Fail the test if vivid is not available.
///
/// Integration tests must have vivid loaded - they should fail, not
/// silently skip, so CI catches a missing module.
macro_rules! require_vivid {
    () => {
        match find_vivid_capture() {
            Some(path) => path,
            None => {
                panic!(
                    "vivid virtual camera not available.\n\
                     Load it with: modprobe vivid\n\
                     Or run unit tests only: cargo test --lib"
                );
            }
        }
    };
}

fn capture_one(camera: &mut V4l2Camera) {
    for _ in 0..500 {
        match camera.capture() {
            Ok(()) => return,
            Err(CaptureError::NotReady) => thread::sleep(Duration::from_millis(2)),
            Err(err) => panic!("capture failed: {err}"),
        }
    }
    panic!("no frame arrived from vivid");
}

#[test]
#[serial]
fn initializes_and_captures_frames() {
    let device = require_vivid!();
    let mut camera = V4l2Camera::new();
    camera
        .initialize(&device, 640, 480, 15)
        .expect("Failed to initialize vivid device");

    capture_one(&mut camera);
    let frame = camera.frame().expect("Failed to get captured frame");
    assert_eq!((frame.width(), frame.height()), (640, 480));

    let mut rgb = vec![0_u8; 640 * 480 * 3];
    frame.to_rgb(&mut rgb, 640 * 3);
    let mut gray = vec![0_u8; 640 * 480];
    frame.to_gray(&mut gray, 640);

    // Successive captures keep the ring cycling.
    capture_one(&mut camera);
    capture_one(&mut camera);
    camera.shutdown();
}

#[test]
#[serial]
fn rejects_double_initialization() {
    let device = require_vivid!();
    let mut camera = V4l2Camera::new();
    camera
        .initialize(&device, 320, 240, 15)
        .expect("Failed to initialize vivid device");
    assert!(camera.initialize(&device, 320, 240, 15).is_err());
    // The original binding still captures.
    capture_one(&mut camera);
    camera.shutdown();
}

#[test]
#[serial]
fn reports_control_ranges_and_enforces_bounds() {
    let device = require_vivid!();
    let mut camera = V4l2Camera::new();
    camera
        .initialize(&device, 320, 240, 15)
        .expect("Failed to initialize vivid device");

    // vivid implements the standard picture controls.
    let setting = camera.get_setting(SettingId::Brightness);
    let SettingState::Available { min, max, .. } = setting.state else {
        panic!("vivid should expose brightness, got {setting:?}");
    };
    camera
        .set_setting(SettingId::Brightness, min)
        .expect("Failed to set brightness to its minimum");
    camera
        .set_setting(SettingId::Brightness, max)
        .expect("Failed to set brightness to its maximum");
    if max < i32::MAX {
        let err = camera
            .set_setting(SettingId::Brightness, max + 1)
            .expect_err("an out-of-range write should be rejected");
        assert!(matches!(err, CaptureError::SettingOutOfRange { .. }));
    }
    camera.shutdown();
}

#[test]
#[serial]
fn shutdown_releases_the_device_for_rebinding() {
    let device = require_vivid!();
    let mut camera = V4l2Camera::new();
    camera
        .initialize(&device, 320, 240, 15)
        .expect("Failed to initialize vivid device");
    camera.shutdown();
    camera.shutdown();
    camera
        .initialize(&device, 320, 240, 15)
        .expect("Failed to re-initialize after shutdown");
    capture_one(&mut camera);
    camera.shutdown();
}
