use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single social post, normalized from an export archive or a plain text file.
/// Immutable once ingested; everything downstream reads it as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub text: String,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub engagement: Option<Engagement>,
    pub source_url: Option<String>,
}

impl Post {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_timestamp: None,
            engagement: None,
            source_url: None,
        }
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Engagement {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
}

/// A bounded group of posts analyzed together in one round of model calls.
/// Every corpus post lands in exactly one batch, in original order.
#[derive(Debug, Clone)]
pub struct AnalysisBatch {
    pub posts: Vec<Post>,
    pub batch_index: usize,
    /// Set when a single over-budget post had to be cut down to fit the
    /// prompt token budget.
    pub truncated: bool,
}

/// Unstructured per-batch findings, held only until synthesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFinding {
    pub batch_index: usize,
    pub tone_notes: String,
    pub structure_notes: String,
    pub engagement_notes: String,
    pub truncated: bool,
}

/// The synthesized style guide text. Regenerated wholesale on each analyzer
/// run; callers persist it themselves if they need a stable copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleGuide {
    pub text: String,
}

impl StyleGuide {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One versioned iteration of a generated post. Refinement replaces the text
/// and bumps the round; nothing is merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub text: String,
    pub round_number: u32,
}

/// Numeric rubric scores, each validated into [0, 100] before a report is
/// returned to the caller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CritiqueScores {
    pub alignment_score: f64,
    pub style_score: f64,
    pub readability_score: f64,
}

impl CritiqueScores {
    pub fn overall(&self) -> f64 {
        (self.alignment_score + self.style_score + self.readability_score) / 3.0
    }

    pub fn grade(&self) -> &'static str {
        match self.overall() {
            s if s >= 90.0 => "A",
            s if s >= 80.0 => "B+",
            s if s >= 70.0 => "B",
            s if s >= 60.0 => "C+",
            s if s >= 50.0 => "C",
            _ => "D",
        }
    }
}

/// Locally computed draft metrics; no model call involved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMetrics {
    pub character_count: usize,
    pub word_count: usize,
    pub paragraph_count: usize,
    pub reading_time_minutes: u64,
}

/// Terminal critique artifact. `scores` is `None` only when the caller opted
/// into lenient parsing and the model reply had no usable numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CritiqueReport {
    pub scores: Option<CritiqueScores>,
    pub recommendations: Vec<String>,
    pub metrics: PostMetrics,
}

#[derive(Debug, thiserror::Error)]
pub enum PostsmithError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unrecognized export format: {0}")]
    Format(String),

    #[error("external service error: {0}")]
    ExternalService(String),

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("rate limited, retry after {seconds}s")]
    RateLimited { seconds: u64 },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PostsmithError>;
