pub mod analyzer;
pub mod composer;
pub mod config;
pub mod corpus;
pub mod critique;
pub mod export;
pub mod llm;
pub mod prompts;
pub mod research;
pub mod synthesis;
pub mod types;

pub use analyzer::{partition_batches, AnalysisRun, StyleAnalyzer};
pub use composer::{select_examples, ComposeContext, PostComposer};
pub use config::AppConfig;
pub use corpus::load_posts;
pub use critique::{post_metrics, render_report, CritiqueAgent, ScoreTolerance};
pub use export::{ingest_export, IngestReport};
pub use llm::{ChatRequest, LlmClient, MockLlmClient, OpenAiClient};
pub use research::{detect_links, Researcher};
pub use synthesis::synthesize_style_guide;
pub use types::{
    AnalysisBatch, BatchFinding, CritiqueReport, CritiqueScores, Draft, Engagement, Post,
    PostMetrics, PostsmithError, Result, StyleGuide,
};
