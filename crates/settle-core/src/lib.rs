//! settle-core: Convergence waiter for asynchronous resources
//!
//! Control-plane calls that create, update or delete a resource return before
//! the work is done. The waiter polls a caller-supplied [`Probe`] with bounded
//! exponential backoff, classifies each observed state against pending and
//! target sets, and returns once the resource has stably reached a target
//! state, disappeared, failed, or run out of time.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use settle_core::{Observation, ProbeError, WaitConfig, probe_fn, wait_for_state};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WaitConfig::new(["CREATING"], ["ACTIVE"], Duration::from_secs(300))
//!     .with_min_timeout(Duration::from_secs(5));
//!
//! let probe = probe_fn(|| async { Ok::<_, ProbeError>(Observation::found("cluster", "ACTIVE")) });
//!
//! let payload = wait_for_state(config, &probe).await?;
//! # let _ = payload;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod probe;
pub mod waiter;

pub use backoff::Backoff;
pub use config::WaitConfig;
pub use error::{ConfigError, ProbeError, WaitError, WaitErrorKind};
pub use probe::{FnProbe, Observation, Probe, probe_fn};
pub use waiter::{Waiter, wait_for_state, wait_for_state_with_cancel};

pub use tokio_util::sync::CancellationToken;
