//! Read-only view of the Kubernetes objects needed to verify a release.
//!
//! [`ClusterClient`] is the seam the verifier talks to. [`KubeClusterClient`]
//! backs it with a live API server, [`InMemoryCluster`] with a fixed set of
//! objects and scripted pod snapshots.

mod client;
mod error;
mod memory;
pub mod objects;
mod phase;

pub use client::{ClusterClient, KubeClusterClient};
pub use error::K8sError;
pub use memory::InMemoryCluster;
pub use phase::PodPhase;
