//! Startup role decision: forward to a running instance, or become it.
//!
//! The decision is made once per process. With the server enabled, the
//! coordinator first probes the session endpoint; a live instance receives
//! our file list and this process should exit. Otherwise this process is the
//! primary and claims the endpoint for later arrivals. Every failure on the
//! way degrades to "primary without a listener" rather than aborting.

use crate::config::LoaderConfig;
use crate::ipc::{
    Command, CommandHandler, InstanceClient, InstanceServer, InstanceServerHandle, ProbeOutcome,
    SessionEndpoint,
};
use crate::loader::FileLoadRequest;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Structured result of command-line parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupOptions {
    pub files: Vec<PathBuf>,
    pub max_points_per_file: u64,
    pub remove_after_load: bool,
    /// Try to reuse an existing window, and listen for later launches.
    pub use_server: bool,
    /// Named session to join instead of the default one.
    pub instance_name: Option<String>,
}

impl Default for StartupOptions {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            max_points_per_file: LoaderConfig::DEFAULT_MAX_POINTS,
            remove_after_load: false,
            use_server: true,
            instance_name: None,
        }
    }
}

impl StartupOptions {
    /// The initial batch for a primary instance.
    pub fn load_request(&self) -> FileLoadRequest {
        FileLoadRequest::new(self.files.clone())
            .with_max_points(self.max_points_per_file)
            .with_remove_after_load(self.remove_after_load)
    }

    pub fn endpoint(&self) -> SessionEndpoint {
        SessionEndpoint::for_session(self.instance_name.as_deref())
    }
}

/// Role this process plays for the rest of its life.
#[derive(Debug)]
pub enum Role {
    /// An existing instance took our command; exit without a window.
    Forwarded(Command),
    /// This process is the viewer. Holds the listener when one is running.
    Primary(Option<InstanceServerHandle>),
}

impl Role {
    pub fn is_primary(&self) -> bool {
        matches!(self, Role::Primary(_))
    }
}

/// Chooses between the client probe and the server listener.
#[derive(Debug, Clone)]
pub struct InstanceCoordinator {
    endpoint: SessionEndpoint,
    use_server: bool,
    client: InstanceClient,
}

impl InstanceCoordinator {
    pub fn new(endpoint: SessionEndpoint, use_server: bool) -> Self {
        Self {
            endpoint,
            use_server,
            client: InstanceClient::new(),
        }
    }

    pub fn from_options(options: &StartupOptions) -> Self {
        Self::new(options.endpoint(), options.use_server)
    }

    pub fn with_client(mut self, client: InstanceClient) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &SessionEndpoint {
        &self.endpoint
    }

    /// Decide this process's role.
    ///
    /// `files` are the startup files, resolved against `cwd` before being
    /// forwarded. `handler` receives file lists from later launches if this
    /// process ends up listening.
    pub async fn start<H: CommandHandler>(
        &self,
        files: &[PathBuf],
        cwd: &Path,
        handler: Arc<H>,
    ) -> Role {
        if !self.use_server {
            info!("Single-instance server disabled");
            return Role::Primary(None);
        }

        let command = Command::from_startup_files(files, cwd);
        match self.client.probe(&self.endpoint, command).await {
            Ok(ProbeOutcome::Forwarded(command)) => {
                match &command {
                    Command::Empty => warn!(
                        "Existing window found, but no remote command specified - exiting"
                    ),
                    Command::OpenFiles(paths) => info!(
                        "Opening {} file(s) in existing instance {}",
                        paths.len(),
                        self.endpoint
                    ),
                }
                return Role::Forwarded(command);
            }
            Ok(ProbeOutcome::NoInstance) => {
                info!("No running instance found at {}", self.endpoint);
            }
            Err(e) => {
                warn!(
                    "Could not hand files to existing instance ({}); starting a new one",
                    e
                );
            }
        }

        match InstanceServer::start(&self.endpoint, handler).await {
            Ok(handle) => Role::Primary(Some(handle)),
            Err(e) => {
                warn!("Running without instance server: {}", e);
                Role::Primary(None)
            }
        }
    }
}
