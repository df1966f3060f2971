//! cloudview core - loading and instance coordination for a point cloud viewer.
//!
//! Two subsystems live here:
//!
//! - **Batch loading** ([`loader`]): streams a list of geometry files into
//!   memory on a worker thread, relaying progress and tolerating per-file
//!   failure, with an ordered event stream back to the host.
//! - **Single-instance coordination** ([`ipc`], [`instance`]): a starting
//!   process probes its session endpoint and either hands its files to the
//!   running viewer or becomes the viewer and listens for later launches.
//!
//! # Example
//!
//! ```rust,ignore
//! use cloudview_core::{BatchLoader, InstanceCoordinator, Role, StartupOptions, XyzSource};
//!
//! let options = StartupOptions { files: vec!["scan.xyz".into()], ..Default::default() };
//! let cwd = std::env::current_dir()?;
//! match InstanceCoordinator::from_options(&options).start(&options.files, &cwd, handler).await {
//!     Role::Forwarded(_) => return Ok(()),
//!     Role::Primary(_server) => {
//!         let batch = BatchLoader::new(Arc::new(XyzSource), options.load_request()).spawn()?;
//!         batch.drain(&mut viewer).await;
//!     }
//! }
//! ```

pub mod config;
pub mod error;
pub mod instance;
pub mod ipc;
pub mod loader;
pub mod platform;

// Re-export commonly used types
pub use config::{AppConfig, IpcConfig, LoaderConfig};
pub use error::{CloudviewError, Result};
pub use instance::{InstanceCoordinator, Role, StartupOptions};
pub use ipc::{
    Command, CommandHandler, InstanceClient, InstanceServer, InstanceServerHandle, ProbeOutcome,
    SessionEndpoint,
};
pub use loader::{
    BatchHandle, BatchLoader, BatchSummary, FileLoadRequest, GeometrySource, LoadError,
    LoadEvent, LoadObserver, LoadProgress, PointCloud, XyzSource,
};
