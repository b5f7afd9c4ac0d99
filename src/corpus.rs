use crate::types::{Post, PostsmithError, Result};
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Posts shorter than this are noise (empty exports, extraction errors) and
/// are dropped from the corpus.
const MIN_POST_CHARS: usize = 50;

/// Load the post corpus from a directory of one-post-per-file text files, in
/// sorted filename order. Unreadable files are skipped with a warning; a
/// missing directory is fatal.
pub fn load_posts(posts_dir: &Path) -> Result<Vec<Post>> {
    if !posts_dir.is_dir() {
        return Err(PostsmithError::InsufficientData(format!(
            "posts directory not found: {}",
            posts_dir.display()
        )));
    }

    let mut files: Vec<_> = fs::read_dir(posts_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("txt"))
        .collect();
    files.sort();

    let content_block = Regex::new(r"(?s)CONTENT:\s*\n-+\s*\n(.*?)(?:\n\nRAW DATA|\z)")
        .expect("content block regex");

    let mut posts = Vec::new();
    for path in files {
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping unreadable post file {}: {}", path.display(), e);
                continue;
            }
        };

        let text = extract_post_text(&raw, &content_block);
        if text.chars().count() < MIN_POST_CHARS {
            debug!("Skipping short post file {}", path.display());
            continue;
        }

        debug!(
            "Loaded post {} ({} words)",
            path.display(),
            text.split_whitespace().count()
        );
        posts.push(Post::from_text(text));
    }

    info!("Loaded {} posts from {}", posts.len(), posts_dir.display());
    Ok(posts)
}

/// Posts written by the ingestor carry a structured CONTENT block; plain
/// hand-authored files are used whole after light cleanup.
fn extract_post_text(raw: &str, content_block: &Regex) -> String {
    if let Some(captures) = content_block.captures(raw) {
        return captures[1].trim().to_string();
    }

    collapse_blank_lines(raw.trim())
}

fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out.trim_end().to_string()
}
