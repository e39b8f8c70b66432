//! visiond: capture daemon serving frames to one local client.

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use visiond::proto::Response;
use visiond::service::{self, Action};
use visiond::{Config, Server, V4l2Camera};

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = match env::args_os().nth(1) {
        Some(arg) => {
            let path = PathBuf::from(arg);
            Config::load(&path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::default(),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("visiond starting");

    let mut cameras = Vec::new();
    for device in &config.devices {
        let mut camera = V4l2Camera::new();
        camera
            .initialize(device, config.width, config.height, config.fps)
            .with_context(|| format!("initializing {}", device.display()))?;
        cameras.push(camera);
    }

    let mut server = Server::new();
    server
        .initialize(&config.socket_path)
        .context("starting session endpoint")?;

    let result = serve(&mut server, &mut cameras, &config);

    // Devices and the endpoint are released no matter how the loop ended.
    for camera in &mut cameras {
        camera.shutdown();
    }
    server.shutdown();
    info!("visiond stopped");
    result
}

/// Drives the request loop until an exit command, a fatal endpoint
/// failure, or an exhausted capture budget.
fn serve(
    server: &mut Server,
    cameras: &mut [V4l2Camera],
    config: &Config,
) -> anyhow::Result<()> {
    // One RGB image per camera, refreshed on every snapshot. Stands in for
    // the shared map a consumer would read.
    let image_bytes = (config.width * config.height * 3) as usize;
    let mut images = vec![vec![0_u8; image_bytes]; cameras.len()];
    // Counts every serviced request; snapshot responses report it until
    // real map data replaces the placeholder.
    let mut iterations: u64 = 0;

    loop {
        let request = server.get_request().context("receiving request")?;
        iterations += 1;
        match service::dispatch(&request) {
            Action::Reply(response) => {
                if let Err(err) = server.send_response(response) {
                    warn!("response not delivered: {err}");
                }
            }
            Action::Snapshot => {
                for (camera, image) in cameras.iter_mut().zip(images.iter_mut()) {
                    service::capture_with_retry(
                        camera,
                        config.capture_attempts,
                        config.capture_retry_delay(),
                    )
                    .context("capturing frame")?;
                    if let Some(frame) = camera.frame() {
                        frame.to_rgb(image, (config.width * 3) as usize);
                    }
                }
                if let Err(err) = server.send_response(Response::reply(&request, iterations)) {
                    warn!("response not delivered: {err}");
                }
            }
            Action::Exit => {
                info!("exit requested");
                return Ok(());
            }
            Action::Ignore => {}
        }
    }
}
