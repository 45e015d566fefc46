//! Docker CLI access for container inspection and local image retagging.

pub mod client;
pub mod error;

pub use client::DockerClient;
pub use error::DockerError;
