//! `cardharvest parse`: turn saved model output into an import file offline.

use std::path::Path;

use anyhow::{Context, Result};
use cardharvest::{
    extract_text, parse_records, serialize_records, ContentSnapshot, ExportPayload, ExportSink,
    FileSink, HarvestConfig, ParseReport,
};

use crate::cli::output::{self, Styled};

/// Text that would have been sampled from the page.
pub fn load_text(raw: &str, html: bool, selector: &str) -> String {
    if html {
        extract_text(&ContentSnapshot::from_html(raw, selector))
    } else {
        raw.trim().to_string()
    }
}

pub fn parse_text(raw: &str, html: bool, selector: &str) -> Result<ParseReport> {
    let text = load_text(raw, html, selector);
    Ok(parse_records(&text)?)
}

pub async fn run(
    config: HarvestConfig,
    file: &Path,
    html: bool,
    selector: Option<&str>,
    stdout: bool,
) -> Result<()> {
    let raw = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let selector = selector.unwrap_or(config.selectors.text_content.as_str());
    let report = parse_text(&raw, html, selector)?;
    tracing::debug!(records = report.len(), discarded = report.discarded, "parsed saved output");

    if stdout {
        println!("{}", serialize_records(&report.records));
        return Ok(());
    }

    let payload = ExportPayload::new(config.export.filename.clone(), &report.records);
    let receipt = FileSink::from_config(&config.export).export(&payload).await?;

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "records": receipt.records,
            "discarded": report.discarded,
            "bytes": receipt.bytes,
            "location": receipt.location,
        }));
    } else if !output::is_quiet() {
        let s = Styled::new();
        eprintln!(
            "  {} {} flashcards written to {} {}",
            s.ok_sym(),
            receipt.records,
            receipt.location,
            s.dim(&format!("({} non-card segments skipped)", report.discarded))
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECTOR: &str = ".message-text-content";

    #[test]
    fn test_plain_text() {
        let report = parse_text("Sure!\n\"Q1\";\"A1\"\n\"Q2\";\"A2\"\n", false, SELECTOR).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.discarded, 1);
    }

    #[test]
    fn test_html_with_formatted_children() {
        let html = r#"<div class="to-user-container"><div class="message-text-content">
            <p><span>"Capital of France?";"Paris"</span></p>
            <p><span>  </span></p>
            <p><span>"2+2?";"4"</span></p>
        </div></div>"#;
        assert_eq!(
            load_text(html, true, SELECTOR),
            "\"Capital of France?\";\"Paris\"\n\"2+2?\";\"4\""
        );
        let report = parse_text(html, true, SELECTOR).unwrap();
        assert_eq!(report.records[1].front, "2+2?");
    }

    #[test]
    fn test_html_without_cards_fails() {
        let html = r#"<div class="message-text-content">I can't help with that.</div>"#;
        let err = parse_text(html, true, SELECTOR).unwrap_err();
        assert!(err.to_string().starts_with("No flashcards found for export"));
    }

    #[tokio::test]
    async fn test_run_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("answer.txt");
        std::fs::write(&input, "\"Q\";\"A\"").unwrap();

        let mut config = HarvestConfig::default();
        config.export.directory = Some(dir.path().join("out"));
        std::env::set_var(output::QUIET_ENV, "1");
        run(config, &input, false, None, false).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("out/anki-import.txt")).unwrap();
        assert_eq!(written, "\"Q\";\"A\"");
    }
}
