//! The psql subprocess port.
//!
//! Server-side `\copy` is a client-side psql meta-command, so extraction and
//! load scripts cannot go through the driver; they are piped to `psql` on
//! stdin with credentials in the environment. The trait exists so tests can
//! capture scripts instead of spawning processes.

use crate::config::Endpoint;
use crate::error::SyncError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Executes one script against one endpoint and reports success through the
/// exit status.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run_script(&self, endpoint: &Endpoint, script: &str) -> Result<()>;
}

/// The real runner: `psql -h .. -p .. -d .. -U .. -v ON_ERROR_STOP=1` with
/// the script on stdin and stdout/stderr passed through untouched.
pub struct Psql;

#[async_trait]
impl ScriptRunner for Psql {
    async fn run_script(&self, endpoint: &Endpoint, script: &str) -> Result<()> {
        debug!("running psql script against {endpoint}:\n{script}");

        let mut command = Command::new("psql");
        command
            .arg("-h")
            .arg(&endpoint.host)
            .arg("-p")
            .arg(endpoint.port.to_string())
            .arg("-d")
            .arg(&endpoint.db_name)
            .arg("-U")
            .arg(&endpoint.username)
            .arg("-v")
            .arg("ON_ERROR_STOP=1")
            .env("PGPASSWORD", &endpoint.password)
            .stdin(Stdio::piped());
        if endpoint.ssl_enabled {
            command.env("PGSSLMODE", "require");
        }

        let mut child = command
            .spawn()
            .context("failed to spawn psql; is it on PATH?")?;

        let mut stdin = child
            .stdin
            .take()
            .context("failed to open stdin of the psql child process")?;
        stdin
            .write_all(script.as_bytes())
            .await
            .context("failed to write script to psql stdin")?;
        drop(stdin);

        let status = child
            .wait()
            .await
            .context("failed to wait for the psql child process")?;
        if !status.success() {
            // A signal-terminated child has no code; report plain failure.
            return Err(SyncError::Psql {
                code: status.code().unwrap_or(1),
            }
            .into());
        }
        Ok(())
    }
}
