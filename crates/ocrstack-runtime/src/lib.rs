//! Process supervision runtime for the OCR serving stack.
//!
//! The pieces, bottom up: [`shutdown`] terminates processes, [`pidfile`]
//! records them, [`ports`] reclaims their listen ports, [`service`] owns
//! a launched subprocess, [`probe`] waits for it to answer, and
//! [`supervisor`] drives both services through one run. [`signals`] maps
//! SIGINT/SIGTERM onto the cancellation token the supervisor watches.

pub mod pidfile;
pub mod ports;
pub mod probe;
pub mod service;
pub mod shutdown;
pub mod signals;
pub mod supervisor;

pub use ports::{PortReclaim, is_port_available, reclaim_port};
pub use probe::{ProbeConfig, ReadinessResult, wait_until_ready};
pub use service::{ManagedService, ServiceState};
pub use signals::spawn_signal_listener;
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorPhase};

// Re-exported so callers can hand the supervisor a shutdown token
// without depending on tokio-util themselves.
pub use tokio_util::sync::CancellationToken;
