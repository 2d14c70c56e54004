//! Web search tool backed by the DuckDuckGo HTML edition — no API key,
//! just a polite scrape of the no-JS results page.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use burrow_core::ToolResult;

use crate::tools::AgentTool;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/100.0.0.0 Safari/537.36";

static RESULT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a class="result__url" href="([^"]+)".*?<a class="result__snippet[^>]+>(.*?)</a>"#)
        .expect("static regex")
});
static TAG_REMOVER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("static regex"));

/// Unwrap DuckDuckGo's redirect links to the real destination URL.
fn unwrap_redirect(link: &str) -> String {
    if link.starts_with("//duckduckgo.com/l/?uddg=") {
        if let Ok(parsed) = url::Url::parse(&format!("https:{link}")) {
            if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
    }
    link.to_string()
}

/// Extract the top results from the HTML page. `None` when nothing matched.
fn parse_results(body: &str) -> Option<String> {
    let mut out = String::from("Web Search Results:\n");
    let mut count = 0;
    for caps in RESULT_REGEX.captures_iter(body).take(5) {
        let link = unwrap_redirect(&caps[1]);
        let snippet = TAG_REMOVER.replace_all(&caps[2], "");
        count += 1;
        out.push_str(&format!(
            "{count}. URL: {link}\n   Snippet: {}\n\n",
            snippet.trim()
        ));
    }
    (count > 0).then_some(out)
}

pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web using DuckDuckGo HTML edition"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "The search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        args: &serde_json::Map<String, Value>,
    ) -> ToolResult {
        let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
        if query.is_empty() {
            return ToolResult::error("Error: query is required");
        }

        let request = self
            .client
            .get("https://html.duckduckgo.com/html/")
            .query(&[("q", query)])
            .header("User-Agent", USER_AGENT);

        let resp = tokio::select! {
            _ = cancel.cancelled() => return ToolResult::error("Search cancelled."),
            resp = request.send() => match resp {
                Ok(r) => r,
                Err(e) => return ToolResult::error(format!("Error fetching search results: {e}")),
            },
        };

        if resp.status() != reqwest::StatusCode::OK {
            return ToolResult::error(format!(
                "Failed to fetch results, HTTP status: {}",
                resp.status().as_u16()
            ));
        }

        let body = tokio::select! {
            _ = cancel.cancelled() => return ToolResult::error("Search cancelled."),
            body = resp.text() => match body {
                Ok(b) => b,
                Err(e) => return ToolResult::error(format!("Error reading response: {e}")),
            },
        };

        match parse_results(&body) {
            Some(results) => ToolResult::ok(results),
            // Markup drift is not the model's problem; report it as a
            // non-error empty result.
            None => ToolResult::ok("No results found or parser failed."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r##"
        <div class="result">
          <a class="result__url" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage&amp;rut=abc123">example.com</a>
          <a class="result__snippet" href="#">An <b>example</b> snippet.</a>
        </div>
        <div class="result">
          <a class="result__url" href="https://plain.example.org/">plain.example.org</a>
          <a class="result__snippet" href="#">  Second snippet  </a>
        </div>
    "##;

    #[test]
    fn parses_results_and_strips_tags() {
        let out = parse_results(FIXTURE).unwrap();
        assert!(out.starts_with("Web Search Results:\n"));
        assert!(out.contains("1. URL: https://example.com/page\n"));
        assert!(out.contains("Snippet: An example snippet."));
        assert!(out.contains("2. URL: https://plain.example.org/\n"));
        assert!(out.contains("Snippet: Second snippet"));
    }

    #[test]
    fn redirect_links_are_unwrapped() {
        let link = unwrap_redirect("//duckduckgo.com/l/?uddg=https%3A%2F%2Frust-lang.org%2F&rut=zzz");
        assert_eq!(link, "https://rust-lang.org/");
    }

    #[test]
    fn plain_links_pass_through() {
        assert_eq!(unwrap_redirect("https://a.example/"), "https://a.example/");
    }

    #[test]
    fn no_matches_yields_none() {
        assert!(parse_results("<html><body>nothing here</body></html>").is_none());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let tool = WebSearchTool::new();
        let result = tool
            .execute(&CancellationToken::new(), &serde_json::Map::new())
            .await;
        assert!(result.is_error);
        assert_eq!(result.content, "Error: query is required");
    }
}
