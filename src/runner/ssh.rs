use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{CommandOutput, CommandRunner, DeviceTarget};
use crate::facts::iosxr::is_timestamp_line;
use crate::utils::truncate_lines;

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// Returns the authenticated Session. Uses the ssh2 crate (libssh2).
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(target: &DeviceTarget) -> Result<ssh2::Session, String> {
    let addr = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|e| format!("Invalid address {}:{}: {}", target.host, target.port, e))?
        .next()
        .ok_or_else(|| format!("No address found for {}", target.host))?;

    let timeout = Duration::from_secs(target.timeout_secs);
    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("TCP connection failed: {}", e))?;

    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| format!("Failed to create SSH session: {}", e))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(target.timeout_secs as u32 * 1000);
    session.handshake()
        .map_err(|e| format!("SSH handshake failed: {}", e))?;

    // Try password auth first
    match session.userauth_password(&target.username, &target.password) {
        Ok(_) if session.authenticated() => return Ok(session),
        _ => {}
    }

    // Try keyboard-interactive auth
    let mut prompter = PasswordPrompt { password: target.password.clone() };
    let _ = session.userauth_keyboard_interactive(&target.username, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err("SSH authentication failed: all methods exhausted".to_string())
    }
}

/// Execute a command on an existing SSH session, one channel per command
fn ssh_exec_on_session(session: &ssh2::Session, cmd: &str, max_error_lines: usize) -> CommandOutput {
    let mut channel = session.channel_session()
        .map_err(|e| format!("Failed to open channel: {}", e))?;

    if let Err(e) = channel.exec(cmd) {
        let _ = channel.wait_close();
        return Err(format!("Failed to execute command: {}", e));
    }

    let mut output = String::new();
    channel.read_to_string(&mut output)
        .map_err(|e| format!("Failed to read output: {}", e))?;
    let _ = channel.wait_close();

    if let Some(error) = rejected_output(&output, max_error_lines) {
        return Err(error);
    }

    Ok(output)
}

/// IOS-XR reports rejected commands in-band: the first line after the
/// optional exec timestamp starts with '%', or the parser marks the input
fn rejected_output(output: &str, max_error_lines: usize) -> Option<String> {
    let body: Vec<&str> = output
        .lines()
        .skip_while(|line| line.trim().is_empty() || is_timestamp_line(line))
        .collect();
    let first = body.first()?.trim_start();
    if first.starts_with('%') || output.contains("Invalid input detected") {
        return Some(truncate_lines(body.join("\n").trim(), max_error_lines));
    }
    None
}

/// Runs CLI commands over SSH exec channels on a single session (IOS-XR)
pub struct SshCliRunner {
    target: DeviceTarget,
}

impl SshCliRunner {
    pub fn new(target: DeviceTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CommandRunner for SshCliRunner {
    async fn run(&self, commands: &[String]) -> Result<Vec<CommandOutput>> {
        let target = self.target.clone();
        let commands = commands.to_vec();

        tokio::task::spawn_blocking(move || -> Result<Vec<CommandOutput>, String> {
            let session = ssh_connect(&target)?;
            tracing::debug!("SSH session established to {}", target.host);

            let outputs = commands
                .iter()
                .map(|cmd| {
                    let output = ssh_exec_on_session(&session, cmd, target.max_error_lines);
                    if let Err(e) = &output {
                        tracing::warn!("Command '{}' failed on {}: {}", cmd, target.host, e);
                    }
                    output
                })
                .collect();

            let _ = session.disconnect(None, "facts gathered", None);
            Ok(outputs)
        })
        .await
        .map_err(|e| anyhow!("Task join error: {}", e))?
        .map_err(|e| anyhow!(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_output_after_timestamp() {
        let plain = rejected_output("% LLDP is not enabled\n", 3);
        let stamped = rejected_output("\nThu Mar  2 10:14:42.154 MET\n% LLDP is not enabled\n", 3);
        assert_eq!(plain.as_deref(), Some("% LLDP is not enabled"));
        assert_eq!(stamped, plain);
    }

    #[test]
    fn test_rejected_output_invalid_input() {
        let output = "Thu Mar  2 10:14:42.154 MET\n show bogus\n      ^\n% Invalid input detected at '^' marker.\n";
        let error = rejected_output(output, 2).unwrap();
        assert!(error.starts_with("show bogus"));
        assert!(error.contains("(1 more lines)"));
    }

    #[test]
    fn test_regular_output_is_accepted() {
        let output = "Thu Mar  2 10:14:42.154 MET\nGigabitEthernet0/0/0/0 is up, line protocol is up\n  100% utilization\n";
        assert_eq!(rejected_output(output, 3), None);
        assert_eq!(rejected_output("", 3), None);
    }
}
