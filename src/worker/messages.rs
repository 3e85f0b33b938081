//! Messages exchanged between the controller and open clients.

use serde::{Deserialize, Serialize};

pub const INSTALLED_MESSAGE: &str = "App installed successfully!";
pub const INSTALL_FAILED_MESSAGE: &str = "App installation failed. Please try again.";
pub const ACTIVATED_MESSAGE: &str = "New version available! Refresh to get the latest updates.";

/// Broadcast from the controller to every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
  #[serde(rename = "PWA_INSTALLED")]
  Installed { message: String },
  #[serde(rename = "PWA_INSTALL_FAILED")]
  InstallFailed { message: String },
  #[serde(rename = "NEW_VERSION_ACTIVATED")]
  Activated { version: String, message: String },
}

impl WorkerMessage {
  pub fn installed() -> Self {
    WorkerMessage::Installed {
      message: INSTALLED_MESSAGE.to_string(),
    }
  }

  pub fn install_failed() -> Self {
    WorkerMessage::InstallFailed {
      message: INSTALL_FAILED_MESSAGE.to_string(),
    }
  }

  pub fn activated(version: &str) -> Self {
    WorkerMessage::Activated {
      version: version.to_string(),
      message: ACTIVATED_MESSAGE.to_string(),
    }
  }
}

/// Command sent by a client to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
  #[serde(rename = "LAUNCH_APP")]
  LaunchApp {
    #[serde(default)]
    url: Option<String>,
  },
}
