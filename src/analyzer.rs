use crate::config::AppConfig;
use crate::llm::{ChatRequest, LlmClient};
use crate::prompts;
use crate::types::{AnalysisBatch, BatchFinding, Post, PostsmithError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Outcome of one analyzer run: findings for the batches that succeeded, plus
/// the indices of batches that exhausted their retries. Failed batches are
/// surfaced, never silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub findings: Vec<BatchFinding>,
    pub failed_batches: Vec<usize>,
    pub total_batches: usize,
}

pub struct StyleAnalyzer<'a> {
    config: &'a AppConfig,
    llm: &'a dyn LlmClient,
}

impl<'a> StyleAnalyzer<'a> {
    pub fn new(config: &'a AppConfig, llm: &'a dyn LlmClient) -> Self {
        Self { config, llm }
    }

    /// Partition the corpus and run the three analysis prompts over each
    /// batch, serially, to respect external rate limits.
    pub async fn analyze_corpus(&self, posts: &[Post]) -> Result<AnalysisRun> {
        if posts.is_empty() {
            return Err(PostsmithError::InsufficientData(
                "no posts to analyze".to_string(),
            ));
        }

        let batches = partition_batches(posts, self.config.batch_size, self.config.prompt_token_budget);
        let total_batches = batches.len();
        info!(
            "Analyzing {} posts in {} batches (batch size {}, token budget {})",
            posts.len(),
            total_batches,
            self.config.batch_size,
            self.config.prompt_token_budget
        );

        let mut findings = Vec::new();
        let mut failed_batches = Vec::new();

        for batch in &batches {
            match self.analyze_batch(batch).await {
                Ok(finding) => {
                    info!("Completed analysis for batch {}", batch.batch_index);
                    findings.push(finding);
                }
                Err(e) => {
                    warn!("Batch {} failed after retries: {}", batch.batch_index, e);
                    failed_batches.push(batch.batch_index);
                }
            }
        }

        if findings.is_empty() {
            return Err(PostsmithError::ExternalService(format!(
                "all {} analysis batches failed",
                total_batches
            )));
        }

        Ok(AnalysisRun {
            findings,
            failed_batches,
            total_batches,
        })
    }

    async fn analyze_batch(&self, batch: &AnalysisBatch) -> Result<BatchFinding> {
        let batch_text = render_batch(batch);

        let structure_notes = self.run_analysis(prompts::structural_analysis(&batch_text)).await?;
        let tone_notes = self.run_analysis(prompts::tone_analysis(&batch_text)).await?;
        let engagement_notes = self.run_analysis(prompts::engagement_analysis(&batch_text)).await?;

        Ok(BatchFinding {
            batch_index: batch.batch_index,
            tone_notes,
            structure_notes,
            engagement_notes,
            truncated: batch.truncated,
        })
    }

    async fn run_analysis(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.config.batch_model.clone(),
            system: prompts::ANALYST_SYSTEM.to_string(),
            prompt,
            temperature: self.config.analysis_temperature,
            max_tokens: self.config.max_tokens,
        };
        self.llm.complete(&request).await
    }
}

/// Rough token estimate; the endpoint counts real tokens, we only need a
/// conservative budget check.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4 + 1
}

/// Partition posts into order-preserving batches of at most `batch_size`
/// posts. A batch whose serialized text would blow the token budget is halved
/// until it fits; a single post that alone exceeds the budget is truncated in
/// place and its batch flagged.
pub fn partition_batches(
    posts: &[Post],
    batch_size: usize,
    token_budget: usize,
) -> Vec<AnalysisBatch> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();

    for chunk in posts.chunks(batch_size) {
        fit_into_batches(chunk, token_budget, &mut batches);
    }

    for (index, batch) in batches.iter_mut().enumerate() {
        batch.batch_index = index;
    }
    batches
}

fn fit_into_batches(posts: &[Post], token_budget: usize, out: &mut Vec<AnalysisBatch>) {
    let serialized: usize = posts.iter().map(|p| estimate_tokens(&p.text)).sum();

    if serialized <= token_budget {
        out.push(AnalysisBatch {
            posts: posts.to_vec(),
            batch_index: 0,
            truncated: false,
        });
        return;
    }

    if posts.len() == 1 {
        // One post alone is over budget: truncate and flag, never drop.
        let mut post = posts[0].clone();
        post.text = truncate_to_tokens(&post.text, token_budget);
        warn!(
            "Post exceeds token budget; truncated to ~{} tokens",
            token_budget
        );
        out.push(AnalysisBatch {
            posts: vec![post],
            batch_index: 0,
            truncated: true,
        });
        return;
    }

    let mid = posts.len() / 2;
    fit_into_batches(&posts[..mid], token_budget, out);
    fit_into_batches(&posts[mid..], token_budget, out);
}

fn truncate_to_tokens(text: &str, token_budget: usize) -> String {
    let max_chars = token_budget.saturating_mul(4).saturating_sub(4).max(1);
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

fn render_batch(batch: &AnalysisBatch) -> String {
    let mut text = String::new();
    for (i, post) in batch.posts.iter().enumerate() {
        text.push_str(&format!("POST {}:\n{}\n\n", i + 1, post.text));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posts(texts: &[&str]) -> Vec<Post> {
        texts.iter().map(|t| Post::from_text(*t)).collect()
    }

    #[test]
    fn partitioning_preserves_count_and_order() {
        let corpus = posts(&["one", "two", "three", "four", "five"]);
        let batches = partition_batches(&corpus, 2, 10_000);

        assert_eq!(batches.len(), 3);
        let rejoined: Vec<&str> = batches
            .iter()
            .flat_map(|b| b.posts.iter().map(|p| p.text.as_str()))
            .collect();
        assert_eq!(rejoined, vec!["one", "two", "three", "four", "five"]);
    }

    #[test]
    fn batch_indices_are_sequential() {
        let corpus = posts(&["a", "b", "c"]);
        let batches = partition_batches(&corpus, 1, 10_000);
        let indices: Vec<usize> = batches.iter().map(|b| b.batch_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn over_budget_batch_is_halved() {
        // Each post is ~25 tokens; two together exceed a 30-token budget.
        let long = "x".repeat(100);
        let corpus = posts(&[&long, &long]);
        let batches = partition_batches(&corpus, 2, 30);

        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.posts.len() == 1));
        assert!(batches.iter().all(|b| !b.truncated));
    }

    #[test]
    fn oversize_single_post_is_truncated_and_flagged() {
        let huge = "y".repeat(1000);
        let corpus = posts(&[&huge]);
        let batches = partition_batches(&corpus, 5, 50);

        assert_eq!(batches.len(), 1);
        assert!(batches[0].truncated);
        assert_eq!(batches[0].posts.len(), 1);
        assert!(estimate_tokens(&batches[0].posts[0].text) <= 50);
    }

    #[test]
    fn token_estimate_scales_with_length() {
        assert!(estimate_tokens("short") < estimate_tokens(&"long ".repeat(100)));
    }
}
