//! Surfaces of the host chat application that a generation run depends on.
//!
//! The core never touches a browser directly. The runtime implements these
//! traits over a live page; tests implement them with scripted fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::extract::ContentSnapshot;
use crate::types::HarvestError;

/// One read of the host's message list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseProbe {
    /// Number of message elements currently rendered.
    pub message_count: usize,
    /// Content of the latest message's response text element, if it has one.
    pub response: Option<ContentSnapshot>,
}

/// Failures reported by a host implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// A required element is not on the page.
    #[error("{0} not found")]
    Missing(String),

    /// The page could not be queried (script failure, detached target, ...).
    #[error("script error: {0}")]
    Script(String),
}

impl From<HostError> for HarvestError {
    fn from(e: HostError) -> Self {
        match e {
            HostError::Missing(what) => HarvestError::InterfaceMissing(what),
            HostError::Script(detail) => HarvestError::Host(detail),
        }
    }
}

/// Read-only access to the response region. The only thing the convergence
/// detector needs.
#[async_trait]
pub trait ResponseSource: Send + Sync {
    async fn probe(&self) -> Result<ResponseProbe, HostError>;
}

/// Full host surface used by the orchestrator.
#[async_trait]
pub trait HostSurface: ResponseSource {
    /// Number of message elements currently rendered.
    async fn message_count(&self) -> Result<usize, HostError>;

    /// Write `prompt` into the input surface and signal it as changed.
    ///
    /// Fails with [`HostError::Missing`] when either the input surface or the
    /// submit control is absent; nothing is written in that case.
    async fn write_prompt(&self, prompt: &str) -> Result<(), HostError>;

    /// Whether the submit control currently accepts clicks.
    async fn submit_enabled(&self) -> Result<bool, HostError>;

    /// Activate the submit control.
    async fn click_submit(&self) -> Result<(), HostError>;
}

/// The user-facing trigger: shows busy/rest state and surfaces failures.
///
/// Methods are synchronous so that cleanup can run from a drop guard.
pub trait TriggerControl: Send + Sync {
    /// Disable the trigger and show the busy indicator.
    fn set_busy(&self);
    /// Re-enable the trigger and restore its resting label.
    fn restore(&self);
    /// Show an error message to the user.
    fn alert(&self, message: &str);
}

/// A trigger with no visible surface. Failures go to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadlessTrigger;

impl TriggerControl for HeadlessTrigger {
    fn set_busy(&self) {}

    fn restore(&self) {}

    fn alert(&self, message: &str) {
        tracing::error!(%message, "generation failed");
    }
}
