//! Candidate extraction from raw chat events.
//!
//! A single message can carry several submissions: every distinct URL in the
//! text and every image attachment is a separate candidate.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::error::EngineError;
use crate::fingerprint::normalize_url;
use crate::types::{event::SourceEvent, submission::SubmissionContent};

lazy_static! {
    static ref URL_PATTERN: Regex = Regex::new(r#"https?://[^\s<>"']+"#).expect("valid URL regex");
}

const SCREENSHOT_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// Characters that commonly trail a pasted link in prose.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '>', '"', '\''];

/// Platform tag for content we cannot attribute.
pub const UNKNOWN_PLATFORM: &str = "unknown";

/// One submission candidate extracted from an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub source_event_id: String,
    pub ambassador_id: String,
    pub content: SubmissionContent,
    pub platform: String,
    pub post_type: String,
    pub submitted_at: DateTime<Utc>,
}

/// Everything extracted from one event.
#[derive(Debug, Default)]
pub struct Classified {
    pub candidates: Vec<Candidate>,
    pub malformed: Vec<EngineError>,
}

impl Classified {
    /// The event carried nothing that looks like a submission.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty() && self.malformed.is_empty()
    }
}

/// Split an event into URL and screenshot candidates.
pub fn classify_event(event: &SourceEvent) -> Classified {
    let mut classified = Classified::default();
    let urls = extract_urls(&event.content);
    let screenshots: Vec<_> = event
        .attachments
        .iter()
        .filter(|a| is_screenshot(&a.filename))
        .collect();

    if urls.is_empty() && screenshots.is_empty() {
        return classified;
    }

    let ambassador_id = event.author_id.trim();
    if ambassador_id.is_empty() {
        classified.malformed.push(malformed(event, "event has no author"));
        return classified;
    }

    let mut seen_urls: Vec<String> = Vec::new();
    for raw in urls {
        let Some(url) = normalize_url(raw) else {
            classified
                .malformed
                .push(malformed(event, &format!("unparseable URL: {raw}")));
            continue;
        };
        if seen_urls.contains(&url) {
            continue;
        }
        let (platform, post_type) = detect_platform(&url);
        seen_urls.push(url.clone());
        classified.candidates.push(Candidate {
            source_event_id: event.id.clone(),
            ambassador_id: ambassador_id.to_string(),
            content: SubmissionContent::Url { url },
            platform: platform.to_string(),
            post_type: post_type.to_string(),
            submitted_at: event.created_at,
        });
    }

    for attachment in screenshots {
        if attachment.byte_size == 0 {
            classified.malformed.push(malformed(
                event,
                &format!("empty screenshot: {}", attachment.filename),
            ));
            continue;
        }
        classified.candidates.push(Candidate {
            source_event_id: event.id.clone(),
            ambassador_id: ambassador_id.to_string(),
            content: SubmissionContent::Screenshot {
                filename: attachment.filename.trim().to_string(),
                byte_size: attachment.byte_size,
            },
            platform: UNKNOWN_PLATFORM.to_string(),
            post_type: "screenshot".to_string(),
            submitted_at: event.created_at,
        });
    }

    classified
}

/// Find http(s) links in message text, trimming trailing punctuation.
pub fn extract_urls(text: &str) -> Vec<&str> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .filter(|url| !url.is_empty())
        .collect()
}

/// Whether an attachment looks like a screenshot.
///
/// A bare extension such as `.png` has no name and does not count.
pub fn is_screenshot(filename: &str) -> bool {
    let lower = filename.trim().to_lowercase();
    SCREENSHOT_EXTENSIONS
        .iter()
        .any(|ext| lower.len() > ext.len() && lower.ends_with(ext))
}

/// Map a normalized URL (`host/path?query`) to (platform, post_type).
pub fn detect_platform(normalized_url: &str) -> (&'static str, &'static str) {
    let host_end = normalized_url
        .find(|c| c == '/' || c == '?' || c == ':')
        .unwrap_or(normalized_url.len());
    let host = &normalized_url[..host_end];
    let path = &normalized_url[host_end..];
    let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if on("youtube.com") || on("youtu.be") {
        ("youtube", "video")
    } else if on("tiktok.com") {
        ("tiktok", "video")
    } else if on("instagram.com") {
        if path.contains("/reel/") {
            ("instagram", "reel")
        } else if path.contains("/stories/") {
            ("instagram", "story")
        } else {
            ("instagram", "post")
        }
    } else if on("facebook.com") || on("fb.com") {
        if path.contains("/stories/") {
            ("facebook", "story")
        } else {
            ("facebook", "group_post")
        }
    } else if on("twitter.com") || on("x.com") {
        ("twitter", "tweet")
    } else if on("threads.net") {
        ("threads", "thread")
    } else if on("reddit.com") {
        ("reddit", "answer")
    } else if on("quora.com") {
        ("quora", "answer")
    } else if on("linkedin.com") {
        ("linkedin", "post")
    } else {
        (UNKNOWN_PLATFORM, "link")
    }
}

fn malformed(event: &SourceEvent, reason: &str) -> EngineError {
    EngineError::MalformedCandidate {
        event_id: event.id.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::event::Attachment;
    use chrono::TimeZone;

    fn event(content: &str) -> SourceEvent {
        SourceEvent::new(
            "m1",
            "u1",
            Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
            content,
        )
    }

    #[test]
    fn test_extract_urls_trims_punctuation() {
        let urls = extract_urls("New video (https://youtu.be/abc). Also https://x.com/me/status/1!");
        assert_eq!(urls, vec!["https://youtu.be/abc", "https://x.com/me/status/1"]);
    }

    #[test]
    fn test_event_without_submissions_is_empty() {
        let classified = classify_event(&event("hey team, posting later"));
        assert!(classified.is_empty());
    }

    #[test]
    fn test_one_event_many_candidates() {
        let e = event("https://youtu.be/abc and https://www.reddit.com/r/x/comments/1")
            .with_attachment(Attachment::new("proof.PNG", 1024))
            .with_attachment(Attachment::new("notes.txt", 10));

        let classified = classify_event(&e);
        assert!(classified.malformed.is_empty());
        assert_eq!(classified.candidates.len(), 3);

        let kinds: Vec<_> = classified
            .candidates
            .iter()
            .map(|c| (c.platform.as_str(), c.post_type.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![("youtube", "video"), ("reddit", "answer"), ("unknown", "screenshot")]
        );
    }

    #[test]
    fn test_repeated_url_in_one_message_counts_once() {
        let classified = classify_event(&event("https://youtu.be/abc https://youtu.be/abc/"));
        assert_eq!(classified.candidates.len(), 1);
    }

    #[test]
    fn test_missing_author_is_malformed() {
        let mut e = event("https://youtu.be/abc");
        e.author_id = "  ".into();
        let classified = classify_event(&e);
        assert!(classified.candidates.is_empty());
        assert!(matches!(
            classified.malformed.as_slice(),
            [EngineError::MalformedCandidate { .. }]
        ));
    }

    #[test]
    fn test_zero_byte_screenshot_is_malformed() {
        let e = event("").with_attachment(Attachment::new("shot.png", 0));
        let classified = classify_event(&e);
        assert!(classified.candidates.is_empty());
        assert_eq!(classified.malformed.len(), 1);
    }

    #[test]
    fn test_is_screenshot() {
        assert!(is_screenshot("Screen Shot.JPEG"));
        assert!(is_screenshot("a.webp"));
        assert!(!is_screenshot(".png"));
        assert!(!is_screenshot("video.mp4"));
    }

    #[test]
    fn test_detect_platform() {
        assert_eq!(detect_platform("youtube.com/watch?v=1"), ("youtube", "video"));
        assert_eq!(detect_platform("m.youtube.com/watch?v=1"), ("youtube", "video"));
        assert_eq!(detect_platform("instagram.com/reel/abc"), ("instagram", "reel"));
        assert_eq!(detect_platform("instagram.com/p/abc"), ("instagram", "post"));
        assert_eq!(detect_platform("instagram.com/stories/me/1"), ("instagram", "story"));
        assert_eq!(detect_platform("x.com/me/status/1"), ("twitter", "tweet"));
        assert_eq!(detect_platform("threads.net/@me/post/1"), ("threads", "thread"));
        assert_eq!(detect_platform("box.com/file"), ("unknown", "link"));
        assert_eq!(detect_platform("example.com:8080/x.com"), ("unknown", "link"));
    }
}
