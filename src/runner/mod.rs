pub mod netconf;
pub mod ssh;

#[cfg(test)]
pub mod fixture;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Platform;

/// Result of one command: the raw reply, or why it could not be executed
pub type CommandOutput = std::result::Result<String, String>;

/// Executes a batch of commands against one device.
///
/// Replies come back in request order and the returned Vec has the same
/// length as `commands`. An Err means the whole batch failed (connect,
/// auth, session); per-command failures are reported inside the Vec.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, commands: &[String]) -> Result<Vec<CommandOutput>>;
}

/// Connection parameters for a single device
#[derive(Debug, Clone)]
pub struct DeviceTarget {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
    /// Lines of a rejected command's output kept in its error message
    pub max_error_lines: usize,
}

/// Pick the transport a platform's commands are written for
pub fn for_platform(platform: Platform, target: DeviceTarget) -> Box<dyn CommandRunner> {
    match platform {
        Platform::Iosxr => Box::new(ssh::SshCliRunner::new(target)),
        Platform::Junos => Box::new(netconf::NetconfRunner::new(target)),
    }
}
