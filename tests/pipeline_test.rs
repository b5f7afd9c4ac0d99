use postsmith::{
    composer::ComposeContext, critique::ScoreTolerance, ingest_export, load_posts,
    synthesize_style_guide, AppConfig, CritiqueAgent, MockLlmClient, PostComposer, PostsmithError,
    StyleAnalyzer,
};
use std::fs;
use tempfile::TempDir;

fn write_corpus(dir: &TempDir, texts: &[&str]) {
    for (i, text) in texts.iter().enumerate() {
        fs::write(
            dir.path().join(format!("{:03}-post.txt", i)),
            format!("CONTENT:\n--------\n{}\n", text),
        )
        .unwrap();
    }
}

const POST_A: &str = "Shipping beats perfecting. We launched our beta today after six weeks of focused work, and the feedback is already reshaping the roadmap.";
const POST_B: &str = "Hiring lesson from this quarter: the best candidates asked us harder questions than we asked them. Curiosity is the signal.";
const POST_C: &str = "Three things I wish I knew before my first product launch: talk to users earlier, cut scope sooner, and write the announcement last.";

#[test]
fn ingest_reads_csv_export_and_skips_empty_rows() {
    let archive = TempDir::new().unwrap();
    let posts = TempDir::new().unwrap();
    fs::write(
        archive.path().join("Shares.csv"),
        "Date,ShareCommentary,ShareLink\n\
         2024-03-01,\"First post body with plenty of words in it\",https://example.com/1\n\
         2024-03-02,\"\",https://example.com/2\n\
         2024-03-03,\"Second post body also with enough words\",\n",
    )
    .unwrap();

    let report = ingest_export(archive.path(), posts.path()).unwrap();
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 1);

    let files: Vec<_> = fs::read_dir(posts.path()).unwrap().collect();
    assert_eq!(files.len(), 2);
}

#[test]
fn ingest_reads_json_export() {
    let archive = TempDir::new().unwrap();
    let posts = TempDir::new().unwrap();
    fs::write(
        archive.path().join("posts.json"),
        r#"{"posts": [
            {"commentary": "A post exported as JSON with a body", "date": "2024-05-01"},
            {"commentary": "Another exported post with a body", "date": "2024-05-02"}
        ]}"#,
    )
    .unwrap();

    let report = ingest_export(archive.path(), posts.path()).unwrap();
    assert_eq!(report.imported, 2);
    assert_eq!(report.skipped, 0);
}

#[test]
fn ingest_rejects_unrecognizable_archive() {
    let archive = TempDir::new().unwrap();
    let posts = TempDir::new().unwrap();
    fs::write(archive.path().join("readme.md"), "not an export").unwrap();

    let err = ingest_export(archive.path(), posts.path()).unwrap_err();
    assert!(matches!(err, PostsmithError::Format(_)));
}

#[test]
fn corpus_loader_skips_short_posts() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[POST_A, "too short"]);

    let posts = load_posts(dir.path()).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, POST_A);
}

#[tokio::test]
async fn analyze_and_synthesize_end_to_end() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[POST_A, POST_B, POST_C]);

    let mut config = AppConfig::for_testing();
    config.batch_size = 2;
    let llm = MockLlmClient::new("batch observation");

    let posts = load_posts(dir.path()).unwrap();
    assert_eq!(posts.len(), 3);

    let run = StyleAnalyzer::new(&config, &llm)
        .analyze_corpus(&posts)
        .await
        .unwrap();
    // 3 posts at batch size 2 -> 2 batches, 3 prompts each.
    assert_eq!(run.total_batches, 2);
    assert_eq!(run.findings.len(), 2);
    assert!(run.failed_batches.is_empty());
    assert_eq!(llm.call_count(), 6);

    let guide = synthesize_style_guide(&config, &llm, &run.findings)
        .await
        .unwrap();
    assert!(!guide.text.trim().is_empty());
}

#[tokio::test]
async fn failed_batch_is_reported_not_dropped() {
    let dir = TempDir::new().unwrap();
    write_corpus(&dir, &[POST_A, POST_B, POST_C]);

    let mut config = AppConfig::for_testing();
    config.batch_size = 2;
    // First call of the first batch fails; the second batch still completes.
    let llm = MockLlmClient::new("batch observation").failing_first(1);

    let posts = load_posts(dir.path()).unwrap();
    let run = StyleAnalyzer::new(&config, &llm)
        .analyze_corpus(&posts)
        .await
        .unwrap();

    assert_eq!(run.total_batches, 2);
    assert_eq!(run.findings.len(), 1);
    assert_eq!(run.failed_batches, vec![0]);
}

#[tokio::test]
async fn compose_then_refine_advances_rounds() {
    let config = AppConfig::for_testing();
    let llm = MockLlmClient::new("ignored").with_replies([
        "Draft one: we shipped the beta. #launch",
        "Draft two: tighter and shorter. #launch",
    ]);
    let composer = PostComposer::new(&config, &llm);
    let guide = postsmith::StyleGuide {
        text: "short sentences, one hashtag".to_string(),
    };

    let draft = composer
        .compose(
            "announce the beta launch",
            &guide,
            &ComposeContext {
                research: None,
                examples: vec![POST_A.to_string()],
            },
        )
        .await
        .unwrap();
    assert_eq!(draft.round_number, 1);
    assert!(draft.text.contains("#launch"));
    assert!(draft.text.chars().count() <= config.max_post_chars);

    let refined = composer
        .refine(&draft, "make it shorter", "announce the beta launch", &guide)
        .await
        .unwrap();
    assert_eq!(refined.round_number, 2);
    assert_ne!(refined.text, draft.text);
}

#[tokio::test]
async fn critique_round_trips_scores_through_report() {
    let config = AppConfig::for_testing();
    let llm = MockLlmClient::new(
        r#"{"alignment_score": 82.0, "style_score": 74.0, "readability_score": 90.0,
            "recommendations": ["open with the result"]}"#,
    );
    let agent = CritiqueAgent::new(&config, &llm, ScoreTolerance::Strict);
    let draft = postsmith::Draft {
        text: "We shipped.\n\nDetails below.".to_string(),
        round_number: 1,
    };
    let guide = postsmith::StyleGuide {
        text: "direct".to_string(),
    };

    let report = agent
        .critique(&draft, "announce the launch", &guide)
        .await
        .unwrap();
    let scores = report.scores.unwrap();
    assert_eq!(scores.grade(), "B+");
    assert_eq!(report.recommendations, vec!["open with the result"]);
    assert_eq!(report.metrics.paragraph_count, 2);
}
