use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};

const DEFAULT_MAX_CHARS: usize = 50_000;

pub struct WebFetchTool;

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str {
        "web_fetch"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its body. JSON responses are pretty-printed. \
         Output is capped at max_chars characters."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch (http or https)"
                },
                "max_chars": {
                    "type": "integer",
                    "description": "Maximum characters to return (default 50000)"
                }
            },
            "required": ["url"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Network
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let url = match call.args.get("url").and_then(|v| v.as_str()) {
            Some(u) => u.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'url'"),
        };
        let max_chars = call
            .args
            .get("max_chars")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_CHARS as u64) as usize;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return ToolOutput::err(&call.id, "only http and https URLs are supported");
        }

        debug!(url = %url, "web_fetch tool");

        match fetch_url(&url, max_chars).await {
            Ok((status, content_type, body, truncated)) => ToolOutput::ok(
                &call.id,
                json!({
                    "url": url,
                    "status": status,
                    "contentType": content_type,
                    "body": body,
                    "truncated": truncated,
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("fetch error: {e}")),
        }
    }
}

async fn fetch_url(
    url: &str,
    max_chars: usize,
) -> Result<(u16, String, String, bool), reqwest::Error> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent("harbor-agent/0.4")
        .build()?;

    let response = client.get(url).send().await?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();

    let body = response.text().await?;

    let content = if content_type.contains("json") {
        match serde_json::from_str::<Value>(&body) {
            Ok(v) => serde_json::to_string_pretty(&v).unwrap_or(body),
            Err(_) => body,
        }
    } else {
        body
    };

    if content.len() > max_chars {
        let mut end = max_chars;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        Ok((status, content_type, content[..end].to_string(), true))
    } else {
        Ok((status, content_type, content, false))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
