//! Local IPC for single-instance coordination.
//!
//! A freshly launched viewer probes its session endpoint. If another
//! instance is listening, the new process forwards its file list and exits;
//! otherwise it becomes the listener itself.
//!
//! # Architecture
//!
//! - **Endpoint**: session naming and exclusive ownership (lock file)
//! - **Client**: bounded connect, one frame, bounded goodbye
//! - **Server**: accepts connections, decodes one command each, hands
//!   `OpenFiles` to the host's [`CommandHandler`]
//! - **Protocol**: length-prefixed framing and command payloads shared by both

pub mod client;
pub mod endpoint;
pub mod protocol;
pub mod server;

pub use client::{InstanceClient, ProbeOutcome};
pub use endpoint::{SessionEndpoint, SessionLock};
pub use protocol::{read_frame, write_frame, Command};
pub use server::{CommandHandler, InstanceServer, InstanceServerHandle};
