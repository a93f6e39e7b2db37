//! Core data types for generation sessions and extracted flashcards.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// A front/back pair recovered from response text.
///
/// Both fields are non-empty and contain no `"` characters; records are only
/// ever built by the parser from a `"front";"back"` match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardRecord {
    pub front: String,
    pub back: String,
}

impl FlashcardRecord {
    /// The record in its exported line shape, identical to the matched source text.
    pub fn to_line(&self) -> String {
        format!("\"{}\";\"{}\"", self.front, self.back)
    }
}

/// Lifecycle of a single generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Submitting,
    Polling,
    Parsing,
    Exporting,
    Failed,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Submitting => write!(f, "submitting"),
            Self::Polling => write!(f, "polling"),
            Self::Parsing => write!(f, "parsing"),
            Self::Exporting => write!(f, "exporting"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Ephemeral state owned by the orchestrator for one run. Never persisted.
#[derive(Debug, Clone)]
pub struct GenerationSession {
    pub id: Uuid,
    /// Message count captured just before submission; zero until then.
    pub watermark: usize,
    pub status: SessionStatus,
    pub started_at: Instant,
    pub deadline: Instant,
}

impl GenerationSession {
    /// Start a session whose deadline is `timeout` from now.
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            watermark: 0,
            status: SessionStatus::Submitting,
            started_at: now,
            deadline: now + timeout,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// The record pattern matched nothing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("No flashcards found for export ({scanned_chars} characters scanned). Please check the AI output format.")]
pub struct ParseError {
    pub scanned_chars: usize,
}

/// Errors that end a generation session.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("Could not find the {0}. The interface may have changed again.")]
    InterfaceMissing(String),

    #[error("Submit control is still disabled after {attempts} attempts.")]
    SubmitBlocked { attempts: u32 },

    #[error("Response generation timed out after {}.", format_duration(.timeout))]
    Timeout { timeout: Duration },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Host page error: {0}")]
    Host(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HarvestError {
    /// Short machine-friendly label used in events and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InterfaceMissing(_) => "interface_missing",
            Self::SubmitBlocked { .. } => "submit_blocked",
            Self::Timeout { .. } => "timeout",
            Self::Parse(_) => "parse_error",
            Self::Host(_) => "host",
            Self::Export(_) | Self::Io(_) => "export",
            Self::Config(_) => "config",
        }
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

fn format_duration(d: &Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{mins} minute{}", if mins == 1 { "" } else { "s" })
    } else if d.subsec_millis() == 0 {
        format!("{secs} seconds")
    } else {
        format!("{} ms", d.as_millis())
    }
}
