//! The instruction sent to the host model. It fixes the `"Front";"Back"`
//! response shape that [`crate::parser`] depends on, so it is not configurable.

pub const FLASHCARD_PROMPT: &str = r#"You are an expert flashcard engineer. Transform the provided source content into high-quality, one-fact-per-card flashcards for efficient learning.

Instructions:
- Output ONLY the flashcards, one per line, in the format: "Front";"Back"
- Each card MUST be on its own line.
- Do NOT combine cards on one line. Do NOT separate cards with spaces.
- Do NOT add any headers, intro texts, explanations, or closing statements.
- Do NOT include anything except the flashcards.
- Do NOT wrap the output in Markdown, tables, or any other format.
- Do NOT add numbering, timestamps, or any extra notes.

Examples:
"The Eiffel Tower is located in {{c1::Paris}}.";"Located in Paris."
"Q: In which city is the Eiffel Tower located?";"A: Paris."
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_records;

    #[test]
    fn test_prompt_examples_match_record_shape() {
        // The format line and both examples are themselves valid records.
        let report = parse_records(FLASHCARD_PROMPT).unwrap();
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].front, "Front");
        assert_eq!(report.records[2].back, "A: Paris.");
    }
}
