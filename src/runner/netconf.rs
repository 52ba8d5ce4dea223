use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::io::{Read, Write};

use super::ssh::ssh_connect;
use super::{CommandOutput, CommandRunner, DeviceTarget};
use crate::xml::Element;

/// NETCONF 1.0 end-of-message marker
const DELIMITER: &str = "]]>]]>";
const BASE_NS: &str = "urn:ietf:params:xml:ns:netconf:base:1.0";
const BASE_CAPABILITY: &str = "urn:ietf:params:netconf:base:1.0";
const MAX_REPLY_BYTES: usize = 64 * 1024 * 1024;

fn hello() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><hello xmlns="{}"><capabilities><capability>{}</capability></capabilities></hello>{}"#,
        BASE_NS, BASE_CAPABILITY, DELIMITER
    )
}

/// Wrap an RPC body in an <rpc> envelope with the message-id
pub fn rpc_envelope(message_id: usize, body: &str) -> String {
    format!(
        r#"<rpc message-id="{}" xmlns="{}">{}</rpc>{}"#,
        message_id, BASE_NS, body, DELIMITER
    )
}

/// Read until one full framed message has arrived.
///
/// Bytes past the delimiter stay in `pending` for the next call. The
/// message is decoded only once it is complete, so multi-byte characters
/// split across reads survive.
fn read_message<R: Read>(reader: &mut R, pending: &mut Vec<u8>) -> Result<String, String> {
    let delimiter = DELIMITER.as_bytes();
    let mut buf = [0u8; 8192];
    let mut scanned = 0;
    loop {
        if let Some(pos) = pending[scanned..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)
            .map(|p| p + scanned)
        {
            let message = String::from_utf8_lossy(&pending[..pos]).into_owned();
            pending.drain(..pos + delimiter.len());
            return Ok(message);
        }
        scanned = pending.len().saturating_sub(delimiter.len() - 1);
        if pending.len() > MAX_REPLY_BYTES {
            return Err("NETCONF reply exceeds size limit".to_string());
        }
        let n = reader
            .read(&mut buf)
            .map_err(|e| format!("Failed to read NETCONF reply: {}", e))?;
        if n == 0 {
            return Err("NETCONF session closed by device".to_string());
        }
        pending.extend_from_slice(&buf[..n]);
    }
}

fn send<W: Write>(writer: &mut W, message: &str) -> Result<(), String> {
    writer
        .write_all(message.as_bytes())
        .and_then(|_| writer.flush())
        .map_err(|e| format!("Failed to send NETCONF message: {}", e))
}

/// Send each RPC and collect its reply in order.
///
/// Once the stream fails (timeout, short read, oversized reply) the
/// framing can no longer be trusted, so the remaining RPCs are not sent
/// and are reported as failed.
fn exchange<S: Read + Write>(
    stream: &mut S,
    pending: &mut Vec<u8>,
    commands: &[String],
) -> (Vec<CommandOutput>, bool) {
    let mut outputs = Vec::with_capacity(commands.len());
    let mut broken: Option<String> = None;

    for (idx, body) in commands.iter().enumerate() {
        if let Some(reason) = &broken {
            outputs.push(Err(format!("not sent, session aborted: {}", reason)));
            continue;
        }
        let reply = send(stream, &rpc_envelope(idx + 1, body))
            .and_then(|_| read_message(stream, pending));
        match reply {
            Ok(reply) => outputs.push(check_rpc_reply(&reply)),
            Err(e) => {
                outputs.push(Err(e.clone()));
                broken = Some(e);
            }
        }
    }
    (outputs, broken.is_none())
}

/// Turn an <rpc-reply> carrying <rpc-error> into a command failure
pub fn check_rpc_reply(reply: &str) -> CommandOutput {
    let root = Element::parse(reply).map_err(|e| format!("Malformed rpc-reply: {}", e))?;
    let errors: Vec<_> = root
        .iter("rpc-error")
        .into_iter()
        .filter(|e| e.child_text("error-severity").as_deref() != Some("warning"))
        .collect();
    if let Some(error) = errors.first() {
        let message = error
            .child_text("error-message")
            .unwrap_or_else(|| "unspecified rpc-error".to_string());
        return Err(message);
    }
    Ok(reply.to_string())
}

/// Runs RPC bodies over the NETCONF SSH subsystem (Junos)
pub struct NetconfRunner {
    target: DeviceTarget,
}

impl NetconfRunner {
    pub fn new(target: DeviceTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CommandRunner for NetconfRunner {
    async fn run(&self, commands: &[String]) -> Result<Vec<CommandOutput>> {
        let target = self.target.clone();
        let commands = commands.to_vec();

        tokio::task::spawn_blocking(move || -> Result<Vec<CommandOutput>, String> {
            let session = ssh_connect(&target)?;
            let mut channel = session
                .channel_session()
                .map_err(|e| format!("Failed to open channel: {}", e))?;
            channel
                .subsystem("netconf")
                .map_err(|e| format!("NETCONF subsystem unavailable: {}", e))?;

            let mut pending = Vec::new();
            let _server_hello = read_message(&mut channel, &mut pending)?;
            send(&mut channel, &hello())?;
            tracing::debug!("NETCONF session established to {}", target.host);

            let (outputs, healthy) = exchange(&mut channel, &mut pending, &commands);
            for (body, output) in commands.iter().zip(&outputs) {
                if let Err(e) = output {
                    tracing::warn!("RPC {} failed on {}: {}", body, target.host, e);
                }
            }

            if healthy {
                let close_id = commands.len() + 1;
                if send(&mut channel, &rpc_envelope(close_id, "<close-session/>")).is_ok() {
                    let _ = read_message(&mut channel, &mut pending);
                }
            }
            let _ = channel.close();
            let _ = channel.wait_close();
            Ok(outputs)
        })
        .await
        .map_err(|e| anyhow!("Task join error: {}", e))?
        .map_err(|e| anyhow!(e))
    }
}
