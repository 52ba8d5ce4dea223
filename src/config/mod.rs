use std::env;

use crate::models::Platform;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub ssh_port: u16,
    pub netconf_port: u16,
    pub ssh_timeout_secs: u64,
    pub default_ssh_user: String,
    pub default_ssh_pass: String,
    pub max_output_lines: usize,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            ssh_port: get_env("SSH_PORT", "22").parse().unwrap_or(22),
            netconf_port: get_env("NETCONF_PORT", "830").parse().unwrap_or(830),
            ssh_timeout_secs: get_env("SSH_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            default_ssh_user: get_env("DEFAULT_SSH_USER", "admin"),
            default_ssh_pass: get_env("DEFAULT_SSH_PASS", ""),
            max_output_lines: get_env("MAX_OUTPUT_LINES", "3").parse().unwrap_or(3),
        }
    }

    /// Port used when a request does not name one: plain SSH for IOS-XR,
    /// the NETCONF port for Junos
    pub fn default_port(&self, platform: Platform) -> u16 {
        match platform {
            Platform::Iosxr => self.ssh_port,
            Platform::Junos => self.netconf_port,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            ssh_port: 22,
            netconf_port: 830,
            ssh_timeout_secs: 30,
            default_ssh_user: "admin".to_string(),
            default_ssh_pass: String::new(),
            max_output_lines: 3,
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
