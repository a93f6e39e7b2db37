//! Flashcard record extraction from free-form response text.
//!
//! A record is any substring of the exact shape `"front";"back"`, where both
//! fields are one or more characters other than `"`. Matches are collected
//! left to right without overlap; everything between them is noise and is
//! dropped. A field that itself contains `"` cannot match; quotes are not
//! escaped.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::{FlashcardRecord, ParseError};

/// Records recovered from one text, plus how much noise was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseReport {
    pub records: Vec<FlashcardRecord>,
    /// Non-blank stretches of text outside any match.
    pub discarded: usize,
}

impl ParseReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn record_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#""([^"]+)";"([^"]+)""#).expect("record regex is valid"))
}

/// Extract every `"front";"back"` record from `text`, in order of appearance.
///
/// Returns [`ParseError`] when nothing matches; an empty success never occurs.
pub fn parse_records(text: &str) -> Result<ParseReport, ParseError> {
    let mut records = Vec::new();
    let mut discarded = 0;
    let mut cursor = 0;

    for caps in record_pattern().captures_iter(text) {
        let (Some(whole), Some(front), Some(back)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if !text[cursor..whole.start()].trim().is_empty() {
            discarded += 1;
        }
        cursor = whole.end();
        records.push(FlashcardRecord {
            front: front.as_str().to_string(),
            back: back.as_str().to_string(),
        });
    }
    if !text[cursor..].trim().is_empty() {
        discarded += 1;
    }

    if records.is_empty() {
        tracing::debug!(chars = text.len(), "no flashcard records matched");
        return Err(ParseError {
            scanned_chars: text.chars().count(),
        });
    }

    tracing::debug!(records = records.len(), discarded, "parsed flashcard records");
    Ok(ParseReport { records, discarded })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::serialize_records;

    #[test]
    fn test_records_with_noise() {
        let report = parse_records(r#"foo "Q1";"A1" bar "Q2";"A2""#).unwrap();
        assert_eq!(
            report.records,
            vec![
                FlashcardRecord {
                    front: "Q1".into(),
                    back: "A1".into()
                },
                FlashcardRecord {
                    front: "Q2".into(),
                    back: "A2".into()
                },
            ]
        );
        assert_eq!(report.discarded, 2);
    }

    #[test]
    fn test_no_match_is_error() {
        let err = parse_records("Here are your flashcards: none today.").unwrap_err();
        assert_eq!(err.scanned_chars, 37);
        assert!(parse_records("").is_err());
        assert!(parse_records(r#""only one field""#).is_err());
    }

    #[test]
    fn test_empty_fields_do_not_match() {
        assert!(parse_records(r#""";"back""#).is_err());
        assert!(parse_records(r#""front";"""#).is_err());
    }

    #[test]
    fn test_spaced_separator_does_not_match() {
        assert!(parse_records(r#""Q"; "A""#).is_err());
        assert!(parse_records(r#""Q","A""#).is_err());
    }

    #[test]
    fn test_embedded_quote_breaks_record() {
        // Only the tail after the last inner quote has the record shape.
        let report = parse_records(r#""Say "hi" now";"hola""#).unwrap();
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].front, " now");
        assert_eq!(report.records[0].back, "hola");
        assert_eq!(report.discarded, 1);

        assert!(parse_records(r#""Say "hi"";"hola""#).is_err());
    }

    #[test]
    fn test_multiline_response_with_header() {
        let text = "Flashcards:\n\"The Eiffel Tower is located in {{c1::Paris}}.\";\"Located in Paris.\"\n\"Q: In which city is the Eiffel Tower located?\";\"A: Paris.\"\n";
        let report = parse_records(text).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.discarded, 1);
        assert_eq!(report.records[0].back, "Located in Paris.");
        assert_eq!(
            report.records[1].front,
            "Q: In which city is the Eiffel Tower located?"
        );
    }

    #[test]
    fn test_cards_on_one_line_are_split() {
        let report = parse_records(r#""a";"b""c";"d""#).unwrap();
        assert_eq!(report.len(), 2);
        assert_eq!(report.discarded, 0);
    }

    #[test]
    fn test_reparse_of_export_is_identical() {
        let text = "intro\n\"Q1\";\"A1\" noise \"Q2\";\"A2\"\n\"Q3\";\"A3\" outro";
        let first = parse_records(text).unwrap();
        let exported = serialize_records(&first.records);
        let second = parse_records(&exported).unwrap();
        assert_eq!(first.records, second.records);
        assert_eq!(second.discarded, 0);
    }
}
