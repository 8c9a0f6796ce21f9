//! Docker runtime access for docktail.
//!
//! This crate is the container-runtime boundary: it knows how to talk to the
//! Docker daemon through [`bollard`] and nothing about Tailscale. It exposes
//! three operations the convergence engine needs:
//!
//! - list the currently running containers that opted in via label,
//! - snapshot a container's networking facts ([`ContainerRecord`]),
//! - stream container lifecycle events ([`DockerHandle::events`]).
//!
//! All label interpretation happens upstream in `docktail-core`; this crate
//! only carries the raw label map along with each snapshot.

pub mod client;
pub mod container;
pub mod error;

pub use client::{ContainerEvent, DockerHandle};
pub use container::{ContainerRecord, NetworkMode};
pub use error::Error;
