//! Restart actions invoked by the connection watchdog.

use crate::error::{HubError, Result};
use async_trait::async_trait;
use log::{error, info, warn};
use tokio::process::Command;

/// Something that restarts the installation.
///
/// A restart may be abrupt: nothing in flight is drained first.
#[async_trait]
pub trait Restart: Send + Sync {
    async fn restart(&self) -> Result<()>;
}

/// Runs a shell command (for example `sudo systemctl reboot`), or exits the
/// process so its supervisor starts it again when no command is configured.
#[derive(Debug, Clone, Default)]
pub struct CommandRestart {
    command: Option<String>,
}

impl CommandRestart {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }
}

#[async_trait]
impl Restart for CommandRestart {
    async fn restart(&self) -> Result<()> {
        let Some(command) = &self.command else {
            error!("[Restart] No restart command configured, exiting");
            std::process::exit(2);
        };

        info!("[Restart] Running: {}", command);
        let status = Command::new("sh").arg("-c").arg(command).status().await?;
        if status.success() {
            Ok(())
        } else {
            warn!("[Restart] Command exited with {}", status);
            Err(HubError::Restart(format!("`{command}` exited with {status}")))
        }
    }
}
