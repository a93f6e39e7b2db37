//! Export through the page: the browser saves the file into its own
//! download directory, exactly as if the user had clicked a download link.

use std::sync::Arc;

use async_trait::async_trait;
use cardharvest::{ExportPayload, ExportReceipt, ExportSink, HarvestError, HarvestResult};
use crate::page_host::lit;
use crate::renderer::RenderContext;

pub struct PageDownloadSink {
    ctx: Arc<dyn RenderContext>,
}

impl PageDownloadSink {
    pub fn new(ctx: Arc<dyn RenderContext>) -> Self {
        Self { ctx }
    }

    fn download_script(payload: &ExportPayload) -> String {
        format!(
            r#"(() => {{
  const blob = new Blob([{body}], {{ type: {mime} }});
  const url = URL.createObjectURL(blob);
  const a = document.createElement("a");
  a.href = url;
  a.download = {filename};
  a.style.display = "none";
  document.body.appendChild(a);
  a.click();
  document.body.removeChild(a);
  URL.revokeObjectURL(url);
  return blob.size;
}})()"#,
            body = lit(&payload.body),
            mime = lit(payload.mime),
            filename = lit(&payload.filename),
        )
    }
}

#[async_trait]
impl ExportSink for PageDownloadSink {
    async fn export(&self, payload: &ExportPayload) -> HarvestResult<ExportReceipt> {
        if payload.is_empty() {
            return Err(HarvestError::Export("refusing to download an empty export".into()));
        }

        let size = self
            .ctx
            .execute_js(&Self::download_script(payload))
            .await
            .map_err(|e| HarvestError::Export(format!("download failed: {e:#}")))?;

        // Blob size counts UTF-8 bytes, same as the body length.
        let bytes = size
            .as_u64()
            .map(|n| n as usize)
            .unwrap_or_else(|| payload.len());
        tracing::info!(filename = %payload.filename, records = payload.records, bytes, "download handed to browser");
        Ok(ExportReceipt {
            location: format!("browser downloads/{}", payload.filename),
            records: payload.records,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_host::tests::ScriptedContext;
    use cardharvest::FlashcardRecord;
    use serde_json::json;

    fn payload() -> ExportPayload {
        ExportPayload::new(
            "anki-import.txt",
            &[
                FlashcardRecord {
                    front: "Café?".into(),
                    back: "Coffee".into(),
                },
                FlashcardRecord {
                    front: "Q2".into(),
                    back: "A2".into(),
                },
            ],
        )
    }

    #[tokio::test]
    async fn test_download_script_shape() {
        let p = payload();
        let ctx = ScriptedContext::answering(vec![json!(p.len())]);
        let receipt = PageDownloadSink::new(ctx.clone()).export(&p).await.unwrap();

        assert_eq!(receipt.records, 2);
        assert_eq!(receipt.bytes, p.len());
        assert_eq!(receipt.location, "browser downloads/anki-import.txt");

        let script = ctx.last_script();
        assert!(script.contains(r#"type: "text/plain;charset=utf-8""#));
        assert!(script.contains(r#"a.download = "anki-import.txt";"#));
        assert!(script.contains(r#"new Blob(["\"Café?\";\"Coffee\"\n\"Q2\";\"A2\""]"#));
        assert!(script.contains("URL.revokeObjectURL(url)"));
    }

    #[tokio::test]
    async fn test_quoted_filename_stays_a_literal() {
        let mut p = payload();
        p.filename = r#"deck "v2".txt"#.into();
        let ctx = ScriptedContext::answering(vec![json!(p.len())]);
        PageDownloadSink::new(ctx.clone()).export(&p).await.unwrap();

        let script = ctx.last_script();
        assert!(script.contains(&format!("a.download = {};", lit(&p.filename))));
        assert!(script.contains(r#"a.download = "deck \"v2\".txt";"#));
    }

    #[tokio::test]
    async fn test_empty_payload_never_reaches_page() {
        let ctx = ScriptedContext::answering(vec![]);
        let empty = ExportPayload::new("anki-import.txt", &[]);
        let err = PageDownloadSink::new(ctx.clone())
            .export(&empty)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "export");
        assert!(ctx.scripts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_script_failure_is_export_error() {
        let ctx = Arc::new(ScriptedContext::default());
        ctx.answers
            .lock()
            .unwrap()
            .push_back(Err("page crashed".into()));
        let err = PageDownloadSink::new(ctx.clone())
            .export(&payload())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("page crashed"));
    }
}
