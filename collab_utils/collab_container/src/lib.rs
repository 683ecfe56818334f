//! Container manager.

use thiserror::Error;

pub mod docker;

/// Operations the driver applies to the container running the fuzzer.
pub trait ManageContainer: Send {
    fn name(&self) -> &str;
    fn pause(&mut self) -> Result<(), ContainerError>;
    fn unpause(&mut self) -> Result<(), ContainerError>;
    fn kill(&mut self) -> Result<(), ContainerError>;
    /// Relative cpu weight of the container.
    fn set_cpu_shares(&mut self, shares: u64) -> Result<(), ContainerError>;
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("spawn: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("'{cmd}' failed with {status}: {stderr}")]
    Command {
        cmd: String,
        status: String,
        stderr: String,
    },
    #[error("container not found: {0}")]
    NotFound(String),
}
