use crate::types::{Engagement, Post, PostsmithError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Column/key names that mark a record's post text across the export layouts
/// we have seen in the wild.
const TEXT_KEYS: &[&str] = &["sharecommentary", "commentary", "text", "content"];
const DATE_KEYS: &[&str] = &["date", "created_at", "timestamp", "createdat"];
const URL_KEYS: &[&str] = &["sharelink", "sharedurl", "url", "link"];

/// Keys under which a JSON export may nest its post list.
const JSON_LIST_KEYS: &[&str] = &["posts", "shares", "elements"];

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Walk an extracted export archive, find the posts file, and materialize one
/// text file per post. Malformed records are skipped and counted, never fatal;
/// an archive with no recognizable posts file is a format error.
pub fn ingest_export(archive_dir: &Path, posts_dir: &Path) -> Result<IngestReport> {
    if !archive_dir.is_dir() {
        return Err(PostsmithError::Format(format!(
            "export directory not found: {}",
            archive_dir.display()
        )));
    }

    info!("Scanning export archive: {}", archive_dir.display());

    let mut parsed: Option<(Vec<Post>, usize)> = None;
    for candidate in candidate_files(archive_dir)? {
        let result = match candidate.extension().and_then(|e| e.to_str()) {
            Some("csv") => parse_csv_export(&candidate),
            Some("json") => parse_json_export(&candidate),
            _ => continue,
        };

        match result {
            Ok((posts, skipped)) if !posts.is_empty() || skipped > 0 => {
                info!(
                    "Recognized posts file: {} ({} posts, {} skipped)",
                    candidate.display(),
                    posts.len(),
                    skipped
                );
                parsed = Some((posts, skipped));
                break;
            }
            Ok(_) => debug!("No posts in {}", candidate.display()),
            Err(e) => debug!("Not a posts file ({}): {}", candidate.display(), e),
        }
    }

    let (posts, skipped) = parsed.ok_or_else(|| {
        PostsmithError::Format(format!(
            "no recognizable posts file in {}",
            archive_dir.display()
        ))
    })?;

    fs::create_dir_all(posts_dir)?;
    let mut imported = 0;
    for post in &posts {
        write_post_file(posts_dir, post)?;
        imported += 1;
    }

    info!(
        "Ingest complete: {} posts written to {}, {} malformed records skipped",
        imported,
        posts_dir.display(),
        skipped
    );

    Ok(IngestReport { imported, skipped })
}

fn candidate_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    // Deterministic scan order so the same archive always resolves the same way.
    files.sort();
    Ok(files)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// CSV layout: header row names the columns; the text column is mandatory,
/// everything else is best-effort.
fn parse_csv_export(path: &Path) -> Result<(Vec<Post>, usize)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| PostsmithError::Format(format!("{}: {}", path.display(), e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PostsmithError::Format(format!("{}: {}", path.display(), e)))?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let text_col = find_column(&headers, TEXT_KEYS).ok_or_else(|| {
        PostsmithError::Format(format!("{}: no post text column in header", path.display()))
    })?;
    let date_col = find_column(&headers, DATE_KEYS);
    let url_col = find_column(&headers, URL_KEYS);
    let likes_col = find_column(&headers, &["likescount", "likes"]);
    let comments_col = find_column(&headers, &["commentscount", "comments"]);
    let shares_col = find_column(&headers, &["sharescount", "shares", "reposts"]);

    let mut posts = Vec::new();
    let mut skipped = 0;

    for (row, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping malformed CSV record {} in {}: {}", row + 1, path.display(), e);
                skipped += 1;
                continue;
            }
        };

        let text = record.get(text_col).map(str::trim).unwrap_or_default();
        if text.is_empty() {
            warn!("Skipping record {} in {}: empty post text", row + 1, path.display());
            skipped += 1;
            continue;
        }

        let engagement = match (likes_col, comments_col, shares_col) {
            (None, None, None) => None,
            _ => Some(Engagement {
                likes: parse_count(likes_col.and_then(|c| record.get(c))),
                comments: parse_count(comments_col.and_then(|c| record.get(c))),
                shares: parse_count(shares_col.and_then(|c| record.get(c))),
            }),
        };

        posts.push(Post {
            text: text.to_string(),
            source_timestamp: date_col
                .and_then(|c| record.get(c))
                .and_then(parse_timestamp),
            engagement,
            source_url: url_col
                .and_then(|c| record.get(c))
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from),
        });
    }

    Ok((posts, skipped))
}

/// JSON layout: a post list at the top level or nested under a known key.
fn parse_json_export(path: &Path) -> Result<(Vec<Post>, usize)> {
    let raw = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|e| PostsmithError::Format(format!("{}: {}", path.display(), e)))?;

    let list = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => JSON_LIST_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                PostsmithError::Format(format!("{}: no posts list found", path.display()))
            })?,
        _ => {
            return Err(PostsmithError::Format(format!(
                "{}: not a posts document",
                path.display()
            )))
        }
    };

    let mut posts = Vec::new();
    let mut skipped = 0;

    for (i, item) in list.iter().enumerate() {
        match json_record_to_post(item) {
            Some(post) => posts.push(post),
            None => {
                warn!("Skipping malformed JSON record {} in {}", i, path.display());
                skipped += 1;
            }
        }
    }

    Ok((posts, skipped))
}

fn json_record_to_post(item: &Value) -> Option<Post> {
    let object = item.as_object()?;

    let text = object
        .iter()
        .find(|(k, _)| TEXT_KEYS.contains(&k.to_lowercase().as_str()))
        .and_then(|(_, v)| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())?;

    let source_timestamp = object
        .iter()
        .find(|(k, _)| DATE_KEYS.contains(&k.to_lowercase().as_str()))
        .and_then(|(_, v)| v.as_str())
        .and_then(parse_timestamp);

    let source_url = object
        .iter()
        .find(|(k, _)| URL_KEYS.contains(&k.to_lowercase().as_str()))
        .and_then(|(_, v)| v.as_str())
        .map(String::from);

    let engagement = object
        .get("engagement")
        .and_then(Value::as_object)
        .map(|e| Engagement {
            likes: e.get("likes").and_then(Value::as_u64).unwrap_or(0),
            comments: e.get("comments").and_then(Value::as_u64).unwrap_or(0),
            shares: e.get("shares").and_then(Value::as_u64).unwrap_or(0),
        });

    Some(Post {
        text: text.to_string(),
        source_timestamp,
        engagement,
        source_url,
    })
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.contains(&h.as_str()))
}

fn parse_count(raw: Option<&str>) -> u64 {
    raw.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Exports disagree on date formats; accept the common ones and give up quietly.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

/// Replace path-unsafe characters so a post-derived name is always a plain
/// file name. Idempotent: sanitizing a sanitized name is a no-op.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("__") {
        sanitized = sanitized.replace("__", "_");
    }
    sanitized = sanitized.trim_matches('_').to_string();
    sanitized.truncate(80);
    // Re-trim in case truncation cut mid-run and left a trailing underscore.
    let sanitized = sanitized.trim_matches('_').to_string();

    if sanitized.is_empty() {
        "post".to_string()
    } else {
        sanitized
    }
}

fn write_post_file(posts_dir: &Path, post: &Post) -> Result<()> {
    let date_prefix = post
        .source_timestamp
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let slug: String = post
        .text
        .split_whitespace()
        .take(6)
        .collect::<Vec<_>>()
        .join("-");

    let base = sanitize_filename(&format!("{}-{}", date_prefix, slug));

    // Never overwrite an existing post; disambiguate with a numeric suffix.
    let mut path = posts_dir.join(format!("{}.txt", base));
    let mut suffix = 2;
    while path.exists() {
        path = posts_dir.join(format!("{}-{}.txt", base, suffix));
        suffix += 1;
    }

    let mut body = String::new();
    body.push_str("CONTENT:\n");
    body.push_str("--------\n");
    body.push_str(&post.text);
    body.push('\n');

    if post.source_timestamp.is_some() || post.source_url.is_some() || post.engagement.is_some() {
        body.push_str("\nRAW DATA:\n");
        if let Some(ts) = post.source_timestamp {
            body.push_str(&format!("timestamp: {}\n", ts.to_rfc3339()));
        }
        if let Some(url) = &post.source_url {
            body.push_str(&format!("url: {}\n", url));
        }
        if let Some(engagement) = &post.engagement {
            body.push_str(&format!(
                "engagement: likes={} comments={} shares={}\n",
                engagement.likes, engagement.comments, engagement.shares
            ));
        }
    }

    fs::write(&path, body)?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("a/b\\c: d?.txt"), "a_b_c_d_.txt");
        assert_eq!(sanitize_filename("  spaced  out  "), "spaced_out");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["hello world!", "2024-01-01: big news?", "___", "déjà vu"] {
            let once = sanitize_filename(raw);
            assert_eq!(sanitize_filename(&once), once);
        }
    }

    #[test]
    fn sanitize_never_returns_empty() {
        assert_eq!(sanitize_filename(""), "post");
        assert_eq!(sanitize_filename("???"), "post");
    }

    #[test]
    fn timestamp_parsing_accepts_common_formats() {
        assert!(parse_timestamp("2024-03-01T10:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-01 10:00:00").is_some());
        assert!(parse_timestamp("2024-03-01").is_some());
        assert!(parse_timestamp("last tuesday").is_none());
    }
}
