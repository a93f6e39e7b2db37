//! `HostSurface` over a live chat page.
//!
//! Every query is a small script evaluated in the page. Selectors and the
//! prompt are spliced in as JSON string literals so quoting in either can't
//! break the script.

use std::sync::Arc;

use async_trait::async_trait;
use cardharvest::{HostError, HostSelectors, HostSurface, ResponseProbe, ResponseSource};
use serde_json::Value;

use crate::renderer::RenderContext;

const INPUT_OR_SUBMIT: &str = "prompt input or send button";
const SUBMIT: &str = "send button";

/// JSON string literal for splicing into a script.
pub(crate) fn lit(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

pub struct PageHost {
    ctx: Arc<dyn RenderContext>,
    selectors: HostSelectors,
}

impl PageHost {
    pub fn new(ctx: Arc<dyn RenderContext>, selectors: HostSelectors) -> Self {
        Self { ctx, selectors }
    }

    pub fn selectors(&self) -> &HostSelectors {
        &self.selectors
    }

    /// Whether the prompt input is rendered yet (false while logged out or loading).
    pub async fn input_present(&self) -> Result<bool, HostError> {
        let script = format!(
            "document.querySelector({}) !== null",
            lit(&self.selectors.prompt_input)
        );
        Ok(self.eval(&script).await?.as_bool().unwrap_or(false))
    }

    async fn eval(&self, script: &str) -> Result<Value, HostError> {
        self.ctx
            .execute_js(script)
            .await
            .map_err(|e| HostError::Script(format!("{e:#}")))
    }

    fn probe_script(&self) -> String {
        format!(
            r#"(() => {{
  const messages = document.querySelectorAll({message});
  const count = messages.length;
  if (!count) return {{ message_count: 0, response: null }};
  const container = messages[count - 1].querySelector({to_user});
  if (!container) return {{ message_count: count, response: null }};
  const el = container.querySelector({text});
  if (!el) return {{ message_count: count, response: null }};
  const children = Array.from(el.querySelectorAll("span, div")).map((c) => c.innerText || "");
  return {{ message_count: count, response: {{ text: el.innerText || "", children }} }};
}})()"#,
            message = lit(&self.selectors.message),
            to_user = lit(&self.selectors.to_user),
            text = lit(&self.selectors.text_content),
        )
    }

    fn count_script(&self) -> String {
        format!(
            "document.querySelectorAll({}).length",
            lit(&self.selectors.message)
        )
    }

    fn write_script(&self, prompt: &str) -> String {
        format!(
            r#"(() => {{
  const input = document.querySelector({input});
  const submit = document.querySelector({submit});
  if (!input || !submit) return false;
  input.value = {prompt};
  input.dispatchEvent(new Event("input", {{ bubbles: true }}));
  input.dispatchEvent(new Event("change", {{ bubbles: true }}));
  return true;
}})()"#,
            input = lit(&self.selectors.prompt_input),
            submit = lit(&self.selectors.submit_button),
            prompt = lit(prompt),
        )
    }

    fn enabled_script(&self) -> String {
        format!(
            r#"(() => {{
  const submit = document.querySelector({submit});
  return submit ? !submit.disabled : null;
}})()"#,
            submit = lit(&self.selectors.submit_button),
        )
    }

    fn click_script(&self) -> String {
        format!(
            r#"(() => {{
  const submit = document.querySelector({submit});
  if (!submit) return false;
  submit.click();
  return true;
}})()"#,
            submit = lit(&self.selectors.submit_button),
        )
    }
}

#[async_trait]
impl ResponseSource for PageHost {
    async fn probe(&self) -> Result<ResponseProbe, HostError> {
        let value = self.eval(&self.probe_script()).await?;
        serde_json::from_value(value)
            .map_err(|e| HostError::Script(format!("unexpected probe result: {e}")))
    }
}

#[async_trait]
impl HostSurface for PageHost {
    async fn message_count(&self) -> Result<usize, HostError> {
        let value = self.eval(&self.count_script()).await?;
        value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| HostError::Script(format!("unexpected message count: {value}")))
    }

    async fn write_prompt(&self, prompt: &str) -> Result<(), HostError> {
        match self.eval(&self.write_script(prompt)).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(HostError::Missing(INPUT_OR_SUBMIT.into())),
        }
    }

    async fn submit_enabled(&self) -> Result<bool, HostError> {
        match self.eval(&self.enabled_script()).await? {
            Value::Bool(enabled) => Ok(enabled),
            _ => Err(HostError::Missing(SUBMIT.into())),
        }
    }

    async fn click_submit(&self) -> Result<(), HostError> {
        match self.eval(&self.click_script()).await? {
            Value::Bool(true) => {
                tracing::debug!("send button clicked");
                Ok(())
            }
            _ => Err(HostError::Missing(SUBMIT.into())),
        }
    }
}
