//! Relay credentials fetched by running an operator supplied shell command.
//!
//! The command lives in a file (`.command` by default) so short-lived TURN
//! credentials can come from any provider without the server knowing about it.

use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;

use crate::domain::{CredentialError, IceServerProvider};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CommandIceServerProvider {
    command_file: PathBuf,
    timeout: Duration,
}

impl CommandIceServerProvider {
    pub fn new(command_file: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command_file: command_file.into(),
            timeout,
        }
    }

    async fn read_command(&self) -> Result<String, CredentialError> {
        let raw = tokio::fs::read_to_string(&self.command_file)
            .await
            .map_err(CredentialError::ReadCommand)?;
        let command = raw.trim();
        if command.is_empty() {
            return Err(CredentialError::EmptyCommand);
        }
        Ok(command.to_string())
    }
}

#[async_trait]
impl IceServerProvider for CommandIceServerProvider {
    async fn ice_servers(&self) -> Result<Vec<Value>, CredentialError> {
        let command = self.read_command().await?;
        tracing::debug!("Running credential command from {:?}", self.command_file);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CredentialError::Spawn)?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| CredentialError::Timeout(self.timeout))?
            .map_err(CredentialError::Spawn)?;

        if !output.status.success() {
            return Err(CredentialError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_ice_servers(&output.stdout)
    }
}

/// Extract the ICE server list from the command's stdout.
///
/// A bare array is taken as is, an object contributes its `iceServers` array,
/// and any other valid JSON yields an empty list.
pub fn parse_ice_servers(stdout: &[u8]) -> Result<Vec<Value>, CredentialError> {
    let parsed: Value = serde_json::from_slice(stdout)?;
    let servers = match parsed {
        Value::Array(servers) => servers,
        Value::Object(mut object) => match object.remove("iceServers") {
            Some(Value::Array(servers)) => servers,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    Ok(servers)
}
