//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live in this module:
//! - `paths` - runtime directory and user scoping for session endpoints
//! - `local_socket` - name-addressed local transport (Unix domain sockets or
//!   Windows named pipes)

pub mod local_socket;
pub mod paths;

pub use local_socket::{connect, AcceptedStream, LocalListener, LocalStream};
pub use paths::{current_user, runtime_dir};
