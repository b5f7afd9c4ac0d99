use crate::config::AppConfig;
use crate::llm::{ChatRequest, LlmClient};
use crate::prompts;
use crate::types::{Draft, Post, PostsmithError, Result, StyleGuide};
use rand::seq::SliceRandom;
use tracing::info;

/// Extra material handed to the composer alongside the instruction: research
/// gathered from links and search, plus few-shot example posts.
#[derive(Debug, Default, Clone)]
pub struct ComposeContext {
    pub research: Option<String>,
    pub examples: Vec<String>,
}

pub struct PostComposer<'a> {
    config: &'a AppConfig,
    llm: &'a dyn LlmClient,
}

impl<'a> PostComposer<'a> {
    pub fn new(config: &'a AppConfig, llm: &'a dyn LlmClient) -> Self {
        Self { config, llm }
    }

    /// Draft a new post from scratch. Round numbering starts at 1.
    pub async fn compose(
        &self,
        instruction: &str,
        guide: &StyleGuide,
        context: &ComposeContext,
    ) -> Result<Draft> {
        if instruction.trim().is_empty() {
            return Err(PostsmithError::InsufficientData(
                "instructions are empty".to_string(),
            ));
        }

        let prompt = prompts::compose(
            instruction,
            guide,
            &context.examples,
            context.research.as_deref(),
            self.config.max_post_chars,
            self.config.max_hashtags,
        );
        let text = self.run_composition(prompt).await?;
        info!("Composed draft round 1 ({} chars)", text.chars().count());

        Ok(Draft {
            text,
            round_number: 1,
        })
    }

    /// Rework an existing draft against feedback. The prior text is replaced
    /// wholesale and the round counter advances.
    pub async fn refine(
        &self,
        prior: &Draft,
        feedback: &str,
        instruction: &str,
        guide: &StyleGuide,
    ) -> Result<Draft> {
        if feedback.trim().is_empty() {
            return Err(PostsmithError::InsufficientData(
                "refinement feedback is empty".to_string(),
            ));
        }

        let prompt = prompts::refine(prior, feedback, instruction, guide);
        let text = self.run_composition(prompt).await?;
        let round_number = prior.round_number + 1;
        info!("Refined draft to round {} ({} chars)", round_number, text.chars().count());

        Ok(Draft { text, round_number })
    }

    async fn run_composition(&self, prompt: String) -> Result<String> {
        let request = ChatRequest {
            model: self.config.compose_model.clone(),
            system: prompts::COMPOSER_SYSTEM.to_string(),
            prompt,
            temperature: self.config.compose_temperature,
            max_tokens: self.config.max_tokens,
        };
        let text = self.llm.complete(&request).await?;
        if text.trim().is_empty() {
            return Err(PostsmithError::MalformedResponse(
                "composer returned an empty draft".to_string(),
            ));
        }
        Ok(text.trim().to_string())
    }
}

/// Pick a few posts from the corpus as few-shot examples, 3 to 4 when
/// available, without repetition.
pub fn select_examples(posts: &[Post], rng: &mut impl rand::Rng) -> Vec<String> {
    if posts.is_empty() {
        return Vec::new();
    }
    let count = if posts.len() >= 4 {
        rng.gen_range(3..=4)
    } else {
        posts.len()
    };
    posts
        .choose_multiple(rng, count)
        .map(|p| p.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use rand::SeedableRng;

    fn guide() -> StyleGuide {
        StyleGuide {
            text: "keep it short".to_string(),
        }
    }

    #[tokio::test]
    async fn compose_starts_at_round_one() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("A fresh draft #launch");
        let composer = PostComposer::new(&config, &llm);

        let draft = composer
            .compose("announce the launch", &guide(), &ComposeContext::default())
            .await
            .unwrap();
        assert_eq!(draft.round_number, 1);
        assert_eq!(draft.text, "A fresh draft #launch");
    }

    #[tokio::test]
    async fn refine_advances_round_and_replaces_text() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("A tighter draft");
        let composer = PostComposer::new(&config, &llm);

        let prior = Draft {
            text: "A rambling draft".to_string(),
            round_number: 2,
        };
        let draft = composer
            .refine(&prior, "cut the filler", "announce the launch", &guide())
            .await
            .unwrap();
        assert_eq!(draft.round_number, 3);
        assert_eq!(draft.text, "A tighter draft");
    }

    #[tokio::test]
    async fn empty_instruction_is_rejected_without_calls() {
        let config = AppConfig::for_testing();
        let llm = MockLlmClient::new("unused");
        let composer = PostComposer::new(&config, &llm);

        let err = composer
            .compose("  ", &guide(), &ComposeContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PostsmithError::InsufficientData(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[test]
    fn example_selection_is_bounded_and_distinct() {
        let posts: Vec<Post> = (0..10)
            .map(|i| Post::from_text(format!("post {}", i)))
            .collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let examples = select_examples(&posts, &mut rng);
        assert!(examples.len() == 3 || examples.len() == 4);

        let mut sorted = examples.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), examples.len());
    }

    #[test]
    fn small_corpus_uses_every_post() {
        let posts: Vec<Post> = (0..2)
            .map(|i| Post::from_text(format!("post {}", i)))
            .collect();
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        assert_eq!(select_examples(&posts, &mut rng).len(), 2);
    }
}
