//! settle-exec: Command execution and command-backed probes
//!
//! Runs shell commands through the [`CommandExecutor`] abstraction and adapts
//! their output into state observations for the settle waiter.

pub mod error;
pub mod local;
pub mod probe;
pub mod result;
pub mod traits;

pub use error::ExecError;
pub use local::LocalExecutor;
pub use probe::{CommandProbe, ProbeOutput};
pub use result::CommandResult;
pub use traits::CommandExecutor;
