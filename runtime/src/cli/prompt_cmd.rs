//! `cardharvest prompt`: print the instruction prompt, e.g. to paste by hand.

use anyhow::Result;
use cardharvest::FLASHCARD_PROMPT;

use crate::cli::output;

pub async fn run() -> Result<()> {
    if output::is_json() {
        output::print_json(&serde_json::json!({ "prompt": FLASHCARD_PROMPT }));
    } else {
        println!("{FLASHCARD_PROMPT}");
    }
    Ok(())
}
