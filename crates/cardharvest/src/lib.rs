//! Cardharvest turns a chat application's streamed answer into an
//! importable flashcard file.
//!
//! The pipeline: submit a fixed prompt, wait for the response text to stop
//! changing, pull `"front";"back"` records out of it, export them one per line.

pub mod config;
pub mod convergence;
pub mod events;
pub mod export;
pub mod extract;
pub mod host;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod types;

pub use config::{DetectorConfig, ExportConfig, HarvestConfig, HostSelectors, SubmitConfig};
pub use convergence::{ConvergenceDetector, StabilityTracker};
pub use events::{EventReceiver, EventSender, HarvestEvent};
pub use export::{serialize_records, ExportPayload, ExportReceipt, ExportSink, FileSink, EXPORT_MIME};
pub use extract::{extract_text, ContentSnapshot};
pub use host::{HeadlessTrigger, HostError, HostSurface, ResponseProbe, ResponseSource, TriggerControl};
pub use orchestrator::{Orchestrator, TriggerOutcome};
pub use parser::{parse_records, ParseReport};
pub use prompt::FLASHCARD_PROMPT;
pub use types::*;
