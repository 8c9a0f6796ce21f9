//! Tailscale surface for docktail.
//!
//! Two distinct interfaces live here, mirroring the two truths Tailscale
//! keeps about a service:
//!
//! - **Advertisement** ([`ServeCli`]) -- what this node is serving right now,
//!   driven exclusively through the `tailscale` command-line tool and read
//!   back from `serve status --json` / `funnel status --json`.
//! - **Definition** ([`ControlPlaneClient`]) -- what the control plane knows
//!   about a service (tags, allowed ports), driven through the HTTP API with
//!   bearer auth.
//!
//! The convergence engine in `docktail-core` composes both; this crate only
//! translates requests into invocations and classifies what comes back.

pub mod cli;
pub mod control_plane;
pub mod error;
pub mod status;

pub use cli::{FunnelFlag, ServeCli, ServeFlag};
pub use control_plane::{ControlPlaneClient, ServiceDefinition};
pub use error::Error;
pub use status::{
    is_managed, FunnelStatus, ObservedEndpoint, ServeStatus, WireProtocol, MANAGED_PREFIX,
};
