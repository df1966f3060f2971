//! cloudview - a lidar point cloud viewer.
//!
//! Starting the viewer while another instance of the same session is running
//! hands the requested files to that instance and exits.

mod host;

use anyhow::Result;
use clap::Parser;
use cloudview_core::{AppConfig, InstanceCoordinator, LoaderConfig, Role, StartupOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "cloudview", version)]
#[command(about = "cloudview - A lidar point cloud viewer")]
struct Args {
    /// Point cloud files to open
    files: Vec<PathBuf>,

    /// Maximum number of points to load at a time
    #[arg(long, default_value_t = LoaderConfig::DEFAULT_MAX_POINTS)]
    maxpoints: u64,

    /// Don't attempt to open files in existing window
    #[arg(long)]
    noserver: bool,

    /// Name of cloudview instance to message on startup
    #[arg(long, value_name = "NAME")]
    server: Option<String>,

    /// Delete files once they have been loaded
    #[arg(long)]
    rmtemp: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    fn startup_options(&self) -> StartupOptions {
        StartupOptions {
            files: self.files.clone(),
            max_points_per_file: self.maxpoints,
            remove_after_load: self.rmtemp,
            use_server: !self.noserver,
            instance_name: self.server.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let options = args.startup_options();
    let cwd = std::env::current_dir()?;

    let (files_tx, mut files_rx) = mpsc::unbounded_channel();
    let bridge = Arc::new(host::OpenFilesBridge::new(files_tx));

    let role = InstanceCoordinator::from_options(&options)
        .start(&options.files, &cwd, bridge)
        .await;
    // Keep the listener alive for the life of the process
    let _server = match role {
        Role::Forwarded(_) => return Ok(()),
        Role::Primary(server) => server,
    };

    info!("Starting {}", AppConfig::APP_NAME);

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut viewer = host::Viewer::new(options.max_points_per_file, events_tx);
    viewer.open_files(options.load_request())?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!(
                    "Shutdown signal received, exiting with {} dataset(s) open",
                    viewer.geometries().len()
                );
                if viewer.active_batches() > 0 {
                    info!("Abandoning {} unfinished load batch(es)", viewer.active_batches());
                }
                break;
            }
            Some(paths) = files_rx.recv() => {
                let request = viewer.remote_request(paths);
                if let Err(e) = viewer.open_files(request) {
                    error!("Could not start loading requested files: {}", e);
                }
            }
            Some((batch, event)) = events_rx.recv() => {
                viewer.handle_event(batch, event);
            }
        }
    }

    Ok(())
}
