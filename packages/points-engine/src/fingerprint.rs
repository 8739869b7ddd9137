//! Content fingerprints for duplicate detection.
//!
//! A fingerprint is SHA256 over the submission kind, the ambassador ID and the
//! normalized content. Nothing about the carrying message (event ID, post
//! time, sequence number) can reach the hash: [`Fingerprint::of`] only takes
//! the ambassador and the content payload.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use url::{form_urlencoded, Url};

use crate::types::submission::SubmissionContent;

/// Field separator for hash input. Cannot appear in a normalized URL.
const SEP: char = '\u{1f}';

/// Query parameters that vary between shares of the same post.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "igshid", "si", "feature", "ref", "s"];

/// Fixed-width (64 hex chars) identity key for one logical contribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a submission's content for one ambassador.
    pub fn of(ambassador_id: &str, content: &SubmissionContent) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.kind().as_str().as_bytes());
        hasher.update([SEP as u8]);
        hasher.update(ambassador_id.as_bytes());
        hasher.update([SEP as u8]);
        match content {
            SubmissionContent::Url { url } => hasher.update(url.as_bytes()),
            SubmissionContent::Screenshot {
                filename,
                byte_size,
            } => {
                hasher.update(filename.trim().to_lowercase().as_bytes());
                hasher.update([SEP as u8]);
                hasher.update(byte_size.to_string().as_bytes());
            }
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an already-computed key read back from storage.
    pub fn from_stored(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalize a shared URL so re-shares of the same post compare equal.
///
/// Normalization rules:
/// - scheme is dropped (`http` and `https` shares are the same post)
/// - host is lowercased and a leading `www.` removed
/// - default ports and fragments are dropped
/// - tracking parameters (`utm_*`, `fbclid`, ...) are removed and the rest
///   sorted and re-encoded
/// - a trailing `/` is trimmed
///
/// Returns `None` for anything that is not an absolute http(s) URL with a host.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        return None;
    }

    let mut normalized = host.to_string();
    if let Some(port) = parsed.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.sort();

    if !pairs.is_empty() {
        // Re-encode, so a decoded `&` or `=` cannot split or merge parameters
        let mut query = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &pairs {
            if value.is_empty() {
                query.append_key_only(key);
            } else {
                query.append_pair(key, value);
            }
        }
        normalized.push('?');
        normalized.push_str(&query.finish());
    }

    Some(normalized)
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn url(raw: &str) -> SubmissionContent {
        SubmissionContent::Url {
            url: normalize_url(raw).unwrap(),
        }
    }

    #[test]
    fn test_same_ambassador_same_url_is_stable() {
        let a = Fingerprint::of("A", &url("http://x"));
        let b = Fingerprint::of("A", &url("http://x"));
        assert_eq!(a, b);
        assert_eq!(a.as_str().as_bytes(), b.as_str().as_bytes());
    }

    #[test]
    fn test_ambassador_is_part_of_key() {
        let a = Fingerprint::of("A", &url("http://x"));
        let b = Fingerprint::of("B", &url("http://x"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_hash_format() {
        let fp = Fingerprint::of("A", &url("https://youtu.be/abc"));
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_url_and_screenshot_never_collide() {
        let link = SubmissionContent::Url {
            url: "shot.png".into(),
        };
        let shot = SubmissionContent::Screenshot {
            filename: "shot.png".into(),
            byte_size: 0,
        };
        assert_ne!(Fingerprint::of("A", &link), Fingerprint::of("A", &shot));
    }

    #[test]
    fn test_screenshot_filename_case_insensitive() {
        let a = SubmissionContent::Screenshot {
            filename: "Proof.PNG".into(),
            byte_size: 2048,
        };
        let b = SubmissionContent::Screenshot {
            filename: "proof.png".into(),
            byte_size: 2048,
        };
        let c = SubmissionContent::Screenshot {
            filename: "proof.png".into(),
            byte_size: 2049,
        };
        assert_eq!(Fingerprint::of("A", &a), Fingerprint::of("A", &b));
        assert_ne!(Fingerprint::of("A", &b), Fingerprint::of("A", &c));
    }

    #[test]
    fn test_normalize_drops_scheme_www_and_fragment() {
        assert_eq!(
            normalize_url("https://www.YouTube.com/watch?v=abc#t=10").as_deref(),
            Some("youtube.com/watch?v=abc")
        );
        assert_eq!(
            normalize_url("http://youtube.com/watch?v=abc").as_deref(),
            Some("youtube.com/watch?v=abc")
        );
    }

    #[test]
    fn test_normalize_strips_tracking_and_sorts_query() {
        assert_eq!(
            normalize_url("https://example.com/post/?b=2&utm_source=x&a=1&fbclid=zz").as_deref(),
            Some("example.com/post?a=1&b=2")
        );
    }

    #[test]
    fn test_normalize_keeps_encoded_separators_apart() {
        let one_param = normalize_url("https://example.com/p?a=1%26b%3D2").unwrap();
        let two_params = normalize_url("https://example.com/p?a=1&b=2").unwrap();
        assert_eq!(two_params, "example.com/p?a=1&b=2");
        assert_eq!(one_param, "example.com/p?a=1%26b%3D2");
        assert_ne!(
            Fingerprint::of("A", &SubmissionContent::Url { url: one_param }),
            Fingerprint::of("A", &SubmissionContent::Url { url: two_params })
        );
    }

    #[test]
    fn test_normalize_encodes_hash_separator() {
        let normalized = normalize_url("https://example.com/p?a=%1F").unwrap();
        assert!(!normalized.contains(SEP));
        assert_eq!(normalized, "example.com/p?a=%1F");
    }

    #[test]
    fn test_normalize_keeps_bare_keys() {
        assert_eq!(
            normalize_url("https://example.com/p?b&a=1").as_deref(),
            Some("example.com/p?a=1&b")
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_port_drops_default() {
        assert_eq!(
            normalize_url("https://example.com:443/p").as_deref(),
            Some("example.com/p")
        );
        assert_eq!(
            normalize_url("http://example.com:8080/p").as_deref(),
            Some("example.com:8080/p")
        );
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert!(normalize_url("ftp://example.com/file").is_none());
        assert!(normalize_url("not a url").is_none());
        assert!(normalize_url("mailto:someone@example.com").is_none());
    }

    #[test]
    fn test_root_path_trimmed() {
        assert_eq!(normalize_url("http://x/").as_deref(), Some("x"));
        assert_eq!(normalize_url("http://x").as_deref(), Some("x"));
    }

    proptest! {
        #[test]
        fn prop_fingerprint_deterministic(ambassador in "[a-z0-9]{1,12}", path in "[a-z0-9/]{0,24}") {
            let content = SubmissionContent::Url { url: format!("example.com/{path}") };
            prop_assert_eq!(Fingerprint::of(&ambassador, &content), Fingerprint::of(&ambassador, &content));
        }

        #[test]
        fn prop_distinct_ambassadors_distinct_keys(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assume!(a != b);
            let content = SubmissionContent::Url { url: "example.com/p".into() };
            prop_assert_ne!(Fingerprint::of(&a, &content), Fingerprint::of(&b, &content));
        }
    }
}
