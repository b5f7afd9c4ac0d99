use crate::config::AppConfig;
use crate::llm::{ChatRequest, LlmClient};
use crate::prompts;
use crate::types::{PostsmithError, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const MAX_PAGE_CHARS: usize = 12_000;

/// Background gathering for the composer: links referenced in the
/// instructions get fetched and summarized, and when a search key is
/// configured the topic is researched through the search endpoint. Without a
/// key the research prompt runs on model-internal knowledge and the output is
/// flagged accordingly.
pub struct Researcher<'a> {
    config: &'a AppConfig,
    llm: &'a dyn LlmClient,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default, alias = "content")]
    snippet: String,
    #[serde(default)]
    url: String,
}

impl<'a> Researcher<'a> {
    pub fn new(config: &'a AppConfig, llm: &'a dyn LlmClient) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { config, llm, http })
    }

    /// Full research pass over an instruction. Returns `None` when there is
    /// nothing to add (no links and nothing researchable).
    pub async fn gather_context(&self, instruction: &str) -> Result<Option<String>> {
        let links = detect_links(instruction);
        let link_context = if links.is_empty() {
            None
        } else {
            self.analyze_links(&links).await
        };

        let search_results = self.web_search(instruction).await;
        if search_results.is_none() {
            warn!("No search results available; research falls back to model-internal knowledge");
        }

        let request = ChatRequest {
            model: self.config.research_model.clone(),
            system: prompts::RESEARCH_SYSTEM.to_string(),
            prompt: prompts::research(
                instruction,
                link_context.as_deref().unwrap_or(""),
                search_results.as_deref(),
            ),
            temperature: self.config.analysis_temperature,
            max_tokens: self.config.max_tokens,
        };

        let mut context = self.llm.complete(&request).await?;
        if context.trim().is_empty() {
            return Ok(None);
        }
        if search_results.is_none() {
            context.push_str(
                "\n\nNOTE: findings above come from model-internal knowledge, not live search; verify facts before publishing.",
            );
        }
        Ok(Some(context))
    }

    /// Fetch and summarize each linked page. A page that cannot be fetched or
    /// summarized is logged and skipped; one bad link never sinks the rest.
    async fn analyze_links(&self, links: &[String]) -> Option<String> {
        let mut summaries = Vec::new();

        for link in links {
            match self.summarize_link(link).await {
                Ok(summary) => {
                    info!("Summarized {}", link);
                    summaries.push(format!("LINK: {}\n{}", link, summary));
                }
                Err(e) => warn!("Skipping link {}: {}", link, e),
            }
        }

        if summaries.is_empty() {
            None
        } else {
            Some(summaries.join("\n\n"))
        }
    }

    async fn summarize_link(&self, link: &str) -> Result<String> {
        let response = self.http.get(link).send().await?;
        if !response.status().is_success() {
            return Err(PostsmithError::ExternalService(format!(
                "{} returned {}",
                link,
                response.status()
            )));
        }
        let body = response.text().await?;
        let page_text: String = body.chars().take(MAX_PAGE_CHARS).collect();

        let request = ChatRequest {
            model: self.config.research_model.clone(),
            system: prompts::RESEARCH_SYSTEM.to_string(),
            prompt: prompts::link_summary(link, &page_text),
            temperature: self.config.analysis_temperature,
            max_tokens: self.config.max_tokens,
        };
        self.llm.complete(&request).await
    }

    /// Query the search endpoint when a key is configured. Any failure is
    /// logged and treated as "no results" so composition can proceed.
    async fn web_search(&self, query: &str) -> Option<String> {
        let api_key = self.config.search_api_key.as_ref()?;

        let payload = serde_json::json!({
            "api_key": api_key,
            "query": query,
            "max_results": 5,
        });

        let response = match self
            .http
            .post(&self.config.search_api_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Search request failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!("Search endpoint returned {}", response.status());
            return None;
        }

        let parsed: SearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Search response did not parse: {}", e);
                return None;
            }
        };
        if parsed.results.is_empty() {
            debug!("Search returned no results for query");
            return None;
        }

        let rendered = parsed
            .results
            .iter()
            .map(|hit| format!("- {} ({})\n  {}", hit.title, hit.url, hit.snippet))
            .collect::<Vec<_>>()
            .join("\n");
        Some(rendered)
    }
}

/// Find URLs in free-form instructions. Bare `www.` hosts get a protocol
/// prefixed; trailing sentence punctuation is stripped; order is preserved
/// and duplicates removed.
pub fn detect_links(text: &str) -> Vec<String> {
    let url_re = Regex::new(r#"(?:https?://|www\.)[^\s<>"]+"#).expect("valid URL regex");

    let mut links = Vec::new();
    for m in url_re.find_iter(text) {
        let raw = m
            .as_str()
            .trim_end_matches(&['.', ',', ';', ':', ')', ']', '!', '?'][..]);
        if raw.is_empty() {
            continue;
        }
        let link = if raw.starts_with("www.") {
            format!("https://{}", raw)
        } else {
            raw.to_string()
        };
        if Url::parse(&link).is_err() {
            debug!("Ignoring unparseable URL candidate: {}", link);
            continue;
        }
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}
