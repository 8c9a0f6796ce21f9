//! Convergence engine for docktail.
//!
//! Everything between "a container carries labels" and "the Tailscale daemon
//! advertises a service" lives here: the label parser with its smart-defaults
//! matrix, networking-mode-aware destination resolution, the diff-and-apply
//! service and funnel reconcilers, the conservative control-plane sync, and
//! the loop driver that schedules exactly one cycle at a time.
//!
//! The engine is stateless by design: every cycle recomputes the desired set
//! from the container runtime and re-reads the daemon's observed state, so
//! truth never lives in this process.

pub mod config;
pub mod driver;
pub mod engine;
pub mod error;
pub mod funnel;
pub mod labels;
pub mod model;
pub mod reconciler;
pub mod resolve;
pub mod sync;

pub use config::ReconcilerConfig;
pub use driver::Driver;
pub use engine::{CycleSummary, Engine};
pub use error::CoreError;
pub use model::{
    BackendProtocol, EndpointSpec, FunnelEndpoint, FunnelProtocol, FunnelSpec, ListenProtocol,
    ServiceEndpoint,
};
