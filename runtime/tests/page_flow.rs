//! A full generation through the page host and the in-page download sink,
//! against a simulated chat page that answers the injected scripts.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use cardharvest::{HarvestConfig, HeadlessTrigger, Orchestrator, TriggerOutcome};
use cardharvest_runtime::page_host::PageHost;
use cardharvest_runtime::page_sink::PageDownloadSink;
use cardharvest_runtime::renderer::{NavigationResult, RenderContext};
use serde_json::{json, Value};

#[derive(Default)]
struct PageState {
    messages: usize,
    prompt: Option<String>,
    answer: String,
    disabled_checks: u32,
    downloads: Vec<String>,
}

/// Recognises each script by a distinctive fragment and answers like the
/// real page would.
struct ChatPage {
    state: Mutex<PageState>,
}

impl ChatPage {
    fn new(messages: usize, answer: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PageState {
                messages,
                answer: answer.to_string(),
                ..PageState::default()
            }),
        })
    }
}

#[async_trait]
impl RenderContext for ChatPage {
    async fn navigate(&mut self, url: &str, _timeout_ms: u64) -> Result<NavigationResult> {
        Ok(NavigationResult {
            final_url: url.to_string(),
            load_time_ms: 1,
        })
    }

    async fn execute_js(&self, script: &str) -> Result<Value> {
        let mut s = self.state.lock().unwrap();
        let value = if script.contains("message_count:") {
            let answered = s.prompt.is_some() && s.messages > 0;
            if answered {
                json!({
                    "message_count": s.messages,
                    "response": { "text": s.answer, "children": [] }
                })
            } else {
                json!({ "message_count": s.messages, "response": null })
            }
        } else if script.contains("input.value =") {
            s.prompt = Some(script.to_string());
            json!(true)
        } else if script.contains("!submit.disabled") {
            if s.disabled_checks > 0 {
                s.disabled_checks -= 1;
                json!(false)
            } else {
                json!(true)
            }
        } else if script.contains("submit.click()") {
            // User message plus the assistant's reply.
            s.messages += 2;
            json!(true)
        } else if script.contains("new Blob(") {
            s.downloads.push(script.to_string());
            json!(s.answer.len())
        } else if script.ends_with(".length") {
            json!(s.messages)
        } else {
            Value::Null
        };
        Ok(value)
    }

    async fn get_url(&self) -> Result<String> {
        Ok("https://chat.example/".into())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

fn orchestrator(page: &Arc<ChatPage>) -> Orchestrator {
    let config = HarvestConfig::default();
    let host = Arc::new(PageHost::new(page.clone(), config.selectors.clone()));
    let sink = Arc::new(PageDownloadSink::new(page.clone()));
    Orchestrator::new(host, sink, config).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_generation_downloads_cards_from_page() {
    let page = ChatPage::new(4, "Here you go:\n\"Capital of France?\";\"Paris\"\n\"2+2?\";\"4\"");
    page.state.lock().unwrap().disabled_checks = 2;
    let orchestrator = orchestrator(&page);

    let start = tokio::time::Instant::now();
    let outcome = orchestrator.trigger(&HeadlessTrigger).await;

    let receipt = match outcome {
        TriggerOutcome::Exported(r) => r,
        other => panic!("expected export, got {other:?}"),
    };
    assert_eq!(receipt.records, 2);
    assert_eq!(receipt.location, "browser downloads/anki-import.txt");

    // Two backoffs before submit, then five samples.
    assert_eq!(start.elapsed(), Duration::from_millis(2 * 200 + 5 * 500));

    let state = page.state.lock().unwrap();
    let prompt = state.prompt.as_deref().unwrap();
    assert!(prompt.contains("You are an expert flashcard engineer."));
    assert_eq!(state.downloads.len(), 1);
    assert!(state.downloads[0]
        .contains(r#"new Blob(["\"Capital of France?\";\"Paris\"\n\"2+2?\";\"4\""]"#));
}

#[tokio::test(start_paused = true)]
async fn test_answer_without_cards_downloads_nothing() {
    let page = ChatPage::new(0, "Sorry, I can only chat about the uploaded sources.");
    let orchestrator = orchestrator(&page);

    let outcome = orchestrator.trigger(&HeadlessTrigger).await;

    match outcome {
        TriggerOutcome::Failed(e) => assert_eq!(e.kind(), "parse_error"),
        other => panic!("expected parse failure, got {other:?}"),
    }
    assert!(page.state.lock().unwrap().downloads.is_empty());
    assert!(!orchestrator.is_busy());
}
