use crate::config::AppConfig;
use crate::llm::{ChatRequest, LlmClient};
use crate::prompts;
use crate::types::{CritiqueReport, CritiqueScores, Draft, PostMetrics, PostsmithError, Result, StyleGuide};
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// How to handle a critique reply whose scores fall outside [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreTolerance {
    /// Reject the reply as malformed.
    Strict,
    /// Keep the recommendations but drop the scores.
    Lenient,
}

pub struct CritiqueAgent<'a> {
    config: &'a AppConfig,
    llm: &'a dyn LlmClient,
    tolerance: ScoreTolerance,
}

impl<'a> CritiqueAgent<'a> {
    pub fn new(config: &'a AppConfig, llm: &'a dyn LlmClient, tolerance: ScoreTolerance) -> Self {
        Self {
            config,
            llm,
            tolerance,
        }
    }

    /// Score a draft against the instruction and style guide. Metrics are
    /// computed locally and never depend on the model reply.
    pub async fn critique(
        &self,
        draft: &Draft,
        instruction: &str,
        guide: &StyleGuide,
    ) -> Result<CritiqueReport> {
        let request = ChatRequest {
            model: self.config.critique_model.clone(),
            system: prompts::CRITIC_SYSTEM.to_string(),
            prompt: prompts::critique(&draft.text, instruction, guide),
            temperature: self.config.critique_temperature,
            max_tokens: self.config.max_tokens,
        };
        let reply = self.llm.complete(&request).await?;
        let metrics = post_metrics(&draft.text);

        let value = parse_critique_reply(&reply)?;
        let recommendations = extract_recommendations(&value);

        // Recommendations survive a bad score payload; only the numbers are
        // subject to the tolerance.
        let scores = match extract_scores(&value) {
            Ok(scores) => Some(scores),
            Err(e) => match self.tolerance {
                ScoreTolerance::Strict => return Err(e),
                ScoreTolerance::Lenient => {
                    warn!("Discarding unusable critique scores: {}", e);
                    None
                }
            },
        };

        Ok(CritiqueReport {
            scores,
            recommendations,
            metrics,
        })
    }
}

/// Pull the first JSON object out of the reply; models wrap the payload in
/// prose and code fences more often than not.
fn parse_critique_reply(reply: &str) -> Result<Value> {
    let object_re = Regex::new(r"(?s)\{.*\}").expect("valid critique regex");
    let json = object_re
        .find(reply)
        .map(|m| m.as_str())
        .ok_or_else(|| {
            PostsmithError::MalformedResponse("critique reply contains no JSON object".to_string())
        })?;

    serde_json::from_str(json).map_err(|e| {
        PostsmithError::MalformedResponse(format!("critique JSON did not parse: {}", e))
    })
}

/// Score fields are extracted individually so a missing or non-numeric field
/// is the same failure as an out-of-range number and hits the same tolerance.
fn extract_scores(value: &Value) -> Result<CritiqueScores> {
    Ok(CritiqueScores {
        alignment_score: score_field(value, "alignment_score")?,
        style_score: score_field(value, "style_score")?,
        readability_score: score_field(value, "readability_score")?,
    })
}

fn score_field(value: &Value, name: &str) -> Result<f64> {
    let score = value.get(name).and_then(Value::as_f64).ok_or_else(|| {
        PostsmithError::MalformedResponse(format!("{} is missing or not a number", name))
    })?;
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(PostsmithError::MalformedResponse(format!(
            "{} out of range: {}",
            name, score
        )));
    }
    Ok(score)
}

fn extract_recommendations(value: &Value) -> Vec<String> {
    value
        .get("recommendations")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Surface statistics computed directly from the draft text.
pub fn post_metrics(text: &str) -> PostMetrics {
    let word_count = text.split_whitespace().count();
    let paragraph_count = text
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .count();
    PostMetrics {
        character_count: text.chars().count(),
        word_count,
        paragraph_count,
        reading_time_minutes: (word_count as u64 / 200).max(1),
    }
}

/// Human-readable rendering of a critique report for the text artifact.
pub fn render_report(report: &CritiqueReport) -> String {
    let mut out = String::from("DRAFT CRITIQUE\n==============\n\n");

    match &report.scores {
        Some(scores) => {
            out.push_str(&format!("Alignment:   {:.1}\n", scores.alignment_score));
            out.push_str(&format!("Style:       {:.1}\n", scores.style_score));
            out.push_str(&format!("Readability: {:.1}\n", scores.readability_score));
            out.push_str(&format!(
                "Overall:     {:.1} ({})\n\n",
                scores.overall(),
                scores.grade()
            ));
        }
        None => out.push_str("Scores unavailable (reply was out of range).\n\n"),
    }

    if !report.recommendations.is_empty() {
        out.push_str("RECOMMENDATIONS\n");
        for (i, rec) in report.recommendations.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", i + 1, rec));
        }
        out.push('\n');
    }

    out.push_str("METRICS\n");
    out.push_str(&format!("Characters:   {}\n", report.metrics.character_count));
    out.push_str(&format!("Words:        {}\n", report.metrics.word_count));
    out.push_str(&format!("Paragraphs:   {}\n", report.metrics.paragraph_count));
    out.push_str(&format!(
        "Reading time: ~{} min\n",
        report.metrics.reading_time_minutes
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn draft() -> Draft {
        Draft {
            text: "First paragraph of the draft.\n\nSecond paragraph with more words.".to_string(),
            round_number: 1,
        }
    }

    fn guide() -> StyleGuide {
        StyleGuide {
            text: "short and direct".to_string(),
        }
    }

    const GOOD_REPLY: &str = r#"Here is the assessment:
{"alignment_score": 88.0, "style_score": 91.5, "readability_score": 75.0,
 "recommendations": ["tighten the hook", "drop one hashtag"]}"#;

    #[tokio::test]
    async fn valid_reply_produces_scores_and_recommendations() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new(GOOD_REPLY);
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Strict);

        let report = agent.critique(&draft(), "announce", &guide()).await.unwrap();
        let scores = report.scores.unwrap();
        assert_eq!(scores.style_score, 91.5);
        assert_eq!(report.recommendations.len(), 2);
        assert_eq!(report.metrics.paragraph_count, 2);
    }

    #[tokio::test]
    async fn strict_mode_rejects_out_of_range_scores() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new(
            r#"{"alignment_score": 140.0, "style_score": 50.0, "readability_score": 50.0}"#,
        );
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Strict);

        let err = agent.critique(&draft(), "announce", &guide()).await.unwrap_err();
        assert!(matches!(err, PostsmithError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn lenient_mode_keeps_recommendations_without_scores() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new(
            r#"{"alignment_score": -5.0, "style_score": 50.0, "readability_score": 50.0,
               "recommendations": ["rewrite the opener"]}"#,
        );
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Lenient);

        let report = agent.critique(&draft(), "announce", &guide()).await.unwrap();
        assert!(report.scores.is_none());
        assert_eq!(report.recommendations, vec!["rewrite the opener"]);
    }

    #[tokio::test]
    async fn lenient_mode_degrades_on_non_numeric_scores() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new(
            r#"{"alignment_score": "excellent", "style_score": 50.0, "readability_score": 50.0,
               "recommendations": ["tighten the hook"]}"#,
        );
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Lenient);

        let report = agent.critique(&draft(), "announce", &guide()).await.unwrap();
        assert!(report.scores.is_none());
        assert_eq!(report.recommendations, vec!["tighten the hook"]);
    }

    #[tokio::test]
    async fn lenient_mode_degrades_on_missing_score_field() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new(
            r#"{"style_score": 50.0, "readability_score": 50.0,
               "recommendations": ["add a call to action"]}"#,
        );
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Lenient);

        let report = agent.critique(&draft(), "announce", &guide()).await.unwrap();
        assert!(report.scores.is_none());
        assert_eq!(report.recommendations, vec!["add a call to action"]);
    }

    #[tokio::test]
    async fn strict_mode_rejects_non_numeric_scores() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new(
            r#"{"alignment_score": "excellent", "style_score": 50.0, "readability_score": 50.0}"#,
        );
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Strict);

        let err = agent.critique(&draft(), "announce", &guide()).await.unwrap_err();
        assert!(matches!(err, PostsmithError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn reply_without_json_is_malformed() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("I cannot help with that.");
        let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Lenient);

        let err = agent.critique(&draft(), "announce", &guide()).await.unwrap_err();
        assert!(matches!(err, PostsmithError::MalformedResponse(_)));
    }

    #[test]
    fn metrics_count_paragraphs_and_floor_reading_time() {
        let metrics = post_metrics("one\n\ntwo\n\n  \n\nthree");
        assert_eq!(metrics.paragraph_count, 3);
        assert_eq!(metrics.word_count, 3);
        assert_eq!(metrics.reading_time_minutes, 1);
    }
}
