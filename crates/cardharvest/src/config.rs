//! Tunable parameters for a generation run.
//!
//! Every field has a default, so a partial JSON file (or none at all) yields
//! a working configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{HarvestError, HarvestResult};

/// Fixed export filename expected by the flashcard import target.
pub const DEFAULT_EXPORT_FILENAME: &str = "anki-import.txt";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub detector: DetectorConfig,
    pub submit: SubmitConfig,
    pub selectors: HostSelectors,
    pub export: ExportConfig,
}

impl HarvestConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(raw: &str) -> HarvestResult<Self> {
        let config: Self =
            serde_json::from_str(raw).map_err(|e| HarvestError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a run meaningless.
    pub fn validate(&self) -> HarvestResult<()> {
        if self.detector.poll_interval_ms == 0 {
            return Err(HarvestError::Config(
                "detector.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.detector.stable_samples == 0 {
            return Err(HarvestError::Config(
                "detector.stable_samples must be at least 1".into(),
            ));
        }
        if self.detector.timeout_ms < self.detector.poll_interval_ms {
            return Err(HarvestError::Config(format!(
                "detector.timeout_ms ({}) is shorter than one poll interval ({})",
                self.detector.timeout_ms, self.detector.poll_interval_ms
            )));
        }
        if self.export.filename.trim().is_empty() {
            return Err(HarvestError::Config("export.filename must not be empty".into()));
        }
        Ok(())
    }
}

/// Convergence detector parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub poll_interval_ms: u64,
    /// Consecutive identical non-empty samples that count as "finished".
    pub stable_samples: u32,
    pub timeout_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            stable_samples: 5,
            timeout_ms: 600_000,
        }
    }
}

impl DetectorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Bounded wait for the submit control to become enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmitConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_ms: 200,
        }
    }
}

/// CSS selectors locating the host's surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSelectors {
    pub message: String,
    pub from_user: String,
    pub to_user: String,
    pub text_content: String,
    pub prompt_input: String,
    pub submit_button: String,
}

impl Default for HostSelectors {
    fn default() -> Self {
        Self {
            message: "chat-message".into(),
            from_user: ".from-user-container".into(),
            to_user: ".to-user-container".into(),
            text_content: ".message-text-content".into(),
            prompt_input: r#"textarea.query-box-input[aria-label="Query box"]"#.into(),
            submit_button: r#"button.submit-button[aria-label="Submit"]"#.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub filename: String,
    /// Target directory for file exports. `None` means the user's download
    /// directory.
    pub directory: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            filename: DEFAULT_EXPORT_FILENAME.into(),
            directory: None,
        }
    }
}
