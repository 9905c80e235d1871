//! Server supervision: detached sessions, process inspection, port probing
//! and the lifecycle controller built on top of them.

pub mod command;
mod error;
pub mod lifecycle;
pub mod port;
pub mod process;
pub mod session;
pub mod status;

#[cfg(any(test, feature = "test-utils"))]
pub mod fakes;

pub use error::SupervisorError;
pub use lifecycle::{launch_command, ServerController};
pub use port::{read_configured_port, write_configured_port, PortProber, SocketTablePorts};
pub use process::{ProcessInspector, Signal, SystemProcesses};
pub use session::{ScreenSessions, SessionProbe};
pub use status::{RunState, ServerRuntimeStatus, StopOutcome};
