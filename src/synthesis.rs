use crate::config::AppConfig;
use crate::llm::{ChatRequest, LlmClient};
use crate::prompts;
use crate::types::{BatchFinding, PostsmithError, Result, StyleGuide};
use tracing::{info, warn};

/// Merge per-batch findings into a single writing style guide. When the
/// synthesis model is unavailable or returns nothing usable, a guide is
/// assembled locally from the raw findings so the pipeline still produces
/// output.
pub async fn synthesize_style_guide(
    config: &AppConfig,
    llm: &dyn LlmClient,
    findings: &[BatchFinding],
) -> Result<StyleGuide> {
    if findings.is_empty() {
        return Err(PostsmithError::InsufficientData(
            "no batch findings to synthesize".to_string(),
        ));
    }

    let request = ChatRequest {
        model: config.synthesis_model.clone(),
        system: prompts::SYNTHESIS_SYSTEM.to_string(),
        prompt: prompts::style_synthesis(findings),
        temperature: config.analysis_temperature,
        max_tokens: config.max_tokens,
    };

    match llm.complete(&request).await {
        Ok(text) if !text.trim().is_empty() => {
            info!("Synthesized style guide from {} batch findings", findings.len());
            Ok(StyleGuide { text })
        }
        Ok(_) => {
            warn!("Synthesis model returned an empty guide; assembling fallback");
            Ok(fallback_guide(findings))
        }
        Err(e) => {
            warn!("Style synthesis failed ({}); assembling fallback guide", e);
            Ok(fallback_guide(findings))
        }
    }
}

/// Local guide built by concatenating the strongest raw observations. Cruder
/// than the synthesized version but always available.
fn fallback_guide(findings: &[BatchFinding]) -> StyleGuide {
    let mut text = String::from("WRITING STYLE GUIDE:\n\n");

    text.push_str("1. STRUCTURE\n");
    for finding in findings {
        text.push_str(finding.structure_notes.trim());
        text.push_str("\n\n");
    }

    text.push_str("2. TONE AND VOICE\n");
    for finding in findings {
        text.push_str(finding.tone_notes.trim());
        text.push_str("\n\n");
    }

    text.push_str("3. ENGAGEMENT TECHNIQUES\n");
    for finding in findings {
        text.push_str(finding.engagement_notes.trim());
        text.push_str("\n\n");
    }

    StyleGuide {
        text: text.trim_end().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    fn finding(index: usize) -> BatchFinding {
        BatchFinding {
            batch_index: index,
            tone_notes: format!("tone {}", index),
            structure_notes: format!("structure {}", index),
            engagement_notes: format!("engagement {}", index),
            truncated: false,
        }
    }

    #[tokio::test]
    async fn empty_findings_fail_before_any_call() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("unused");

        let err = synthesize_style_guide(&config, &llm, &[]).await.unwrap_err();
        assert!(matches!(err, PostsmithError::InsufficientData(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn successful_synthesis_uses_model_reply() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("GUIDE: write tightly");

        let guide = synthesize_style_guide(&config, &llm, &[finding(0)]).await.unwrap();
        assert_eq!(guide.text, "GUIDE: write tightly");
    }

    #[tokio::test]
    async fn empty_reply_falls_back_to_local_guide() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("   ");

        let guide = synthesize_style_guide(&config, &llm, &[finding(0), finding(1)])
            .await
            .unwrap();
        assert!(guide.text.starts_with("WRITING STYLE GUIDE:"));
        assert!(guide.text.contains("tone 0"));
        assert!(guide.text.contains("engagement 1"));
    }
}
