// Security Service
// Rate limiting, input sanitization and file validation
//
// Every violation is reported under the `security` tracing target, which the
// logging setup routes into the rotating security log.

use super::config_store::SecurityConfig;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

pub const SECURITY_TARGET: &str = "security";

const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SecurityError {
    #[error("Rate limit exceeded: {limit} requests per minute (retry in {retry_after_secs}s)")]
    RateLimited { limit: u32, retry_after_secs: u64 },
    #[error("Input rejected by content policy ({rule})")]
    BlockedContent { rule: &'static str },
    #[error("Text too long: {len} characters (maximum {max})")]
    TextTooLong { len: usize, max: usize },
    #[error("File too large: {size} bytes (maximum {max})")]
    FileTooLarge { size: u64, max: u64 },
    #[error("File type not allowed: {0}")]
    DisallowedFileType(String),
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("Not a regular file: {0}")]
    NotAFile(String),
}

// ============ Rate Limiter ============

#[derive(Debug)]
struct Window {
    started: Option<Instant>,
    count: u32,
}

/// Fixed-window counter: `limit` requests per 60 seconds
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            window: Mutex::new(Window { started: None, count: 0 }),
        }
    }

    pub fn check(&self) -> Result<(), SecurityError> {
        self.check_at(Instant::now())
    }

    pub fn check_at(&self, now: Instant) -> Result<(), SecurityError> {
        // Counter state stays consistent across a poisoned lock
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());

        let started = match window.started {
            Some(started) if now.saturating_duration_since(started) < RATE_WINDOW => started,
            _ => {
                window.started = Some(now);
                window.count = 0;
                now
            }
        };

        if window.count >= self.limit {
            let elapsed = now.saturating_duration_since(started);
            let retry_after_secs = RATE_WINDOW.saturating_sub(elapsed).as_secs().max(1);
            warn!(
                target: SECURITY_TARGET,
                limit = self.limit,
                retry_after_secs,
                "rate_limit.exceeded"
            );
            return Err(SecurityError::RateLimited {
                limit: self.limit,
                retry_after_secs,
            });
        }

        window.count += 1;
        Ok(())
    }
}

// ============ Input Sanitizer ============

fn denylist() -> &'static [(&'static str, Regex)] {
    static RULES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        [
            ("script_tag", r"(?i)</?\s*script\b"),
            ("javascript_url", r"(?i)javascript\s*:"),
            ("vbscript_url", r"(?i)vbscript\s*:"),
            ("html_data_url", r"(?i)data\s*:\s*text/html"),
            ("event_handler", r"(?i)\bon[a-z]+\s*="),
            ("embedded_frame", r"(?i)<\s*(iframe|object|embed|link|meta)\b"),
        ]
        .into_iter()
        .map(|(name, pattern)| (name, Regex::new(pattern).expect("denylist regex")))
        .collect()
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct InputSanitizer;

impl InputSanitizer {
    /// Reject denylisted markup and strip control characters
    pub fn sanitize(&self, text: &str) -> Result<String, SecurityError> {
        if let Some((rule, _)) = denylist().iter().find(|(_, re)| re.is_match(text)) {
            let preview: String = text.chars().take(80).collect();
            warn!(
                target: SECURITY_TARGET,
                rule = *rule,
                len = text.len(),
                preview = %escape_html(&preview),
                "input.blocked"
            );
            return Err(SecurityError::BlockedContent { rule: *rule });
        }

        Ok(text
            .chars()
            .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
            .collect())
    }

    pub fn check_length(&self, text: &str, max: usize) -> Result<(), SecurityError> {
        let len = text.chars().count();
        if len > max {
            warn!(target: SECURITY_TARGET, len, max, "input.too_long");
            return Err(SecurityError::TextTooLong { len, max });
        }
        Ok(())
    }
}

/// Escape text for display inside HTML or rich-text surfaces
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

// ============ File Validation ============

/// Check existence, type, extension and size before a file is read
pub fn validate_file(path: &Path, security: &SecurityConfig) -> Result<u64, SecurityError> {
    let shown = path.display().to_string();

    let metadata = fs::metadata(path).map_err(|_| {
        warn!(target: SECURITY_TARGET, path = %shown, "file.missing");
        SecurityError::NotFound(shown.clone())
    })?;
    if !metadata.is_file() {
        warn!(target: SECURITY_TARGET, path = %shown, "file.not_regular");
        return Err(SecurityError::NotAFile(shown));
    }

    if !security.allows_extension(path) {
        warn!(target: SECURITY_TARGET, path = %shown, "file.type_not_allowed");
        return Err(SecurityError::DisallowedFileType(shown));
    }

    let size = metadata.len();
    if size > security.max_file_size {
        warn!(target: SECURITY_TARGET, path = %shown, size, max = security.max_file_size, "file.too_large");
        return Err(SecurityError::FileTooLarge {
            size,
            max: security.max_file_size,
        });
    }

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_blocks_after_limit() {
        let limiter = RateLimiter::new(3);
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(limiter.check_at(t0).is_ok());
        }
        match limiter.check_at(t0 + Duration::from_secs(10)) {
            Err(SecurityError::RateLimited { limit, retry_after_secs }) => {
                assert_eq!(limit, 3);
                assert_eq!(retry_after_secs, 50);
            }
            other => panic!("expected rate limit, got {:?}", other),
        }
    }

    #[test]
    fn test_rate_limiter_resets_after_window() {
        let limiter = RateLimiter::new(1);
        let t0 = Instant::now();
        assert!(limiter.check_at(t0).is_ok());
        assert!(limiter.check_at(t0 + Duration::from_secs(59)).is_err());
        assert!(limiter.check_at(t0 + Duration::from_secs(60)).is_ok());
        assert!(limiter.check_at(t0 + Duration::from_secs(61)).is_err());
    }

    #[test]
    fn test_sanitizer_blocks_markup() {
        let s = InputSanitizer;
        for input in [
            "hello <script>alert(1)</script>",
            "click javascript:alert(1)",
            "<img src=x onerror=alert(1)>",
            "<IFRAME src='x'>",
            "data:text/html;base64,AAAA",
            "button onclick=steal()",
            "ONMOUSEOVER = run",
        ] {
            assert!(
                matches!(s.sanitize(input), Err(SecurityError::BlockedContent { .. })),
                "not blocked: {}",
                input
            );
        }
    }

    #[test]
    fn test_sanitizer_allows_prose_and_strips_controls() {
        let s = InputSanitizer;
        let cleaned = s.sanitize("Plain text\u{0007} with a tab\tand\nnewline; 3 < 4 is true").unwrap();
        assert_eq!(cleaned, "Plain text with a tab\tand\nnewline; 3 < 4 is true");
    }

    #[test]
    fn test_check_length() {
        let s = InputSanitizer;
        assert!(s.check_length("abc", 3).is_ok());
        assert_eq!(
            s.check_length("abcd", 3),
            Err(SecurityError::TextTooLong { len: 4, max: 3 })
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_validate_file() {
        let dir = tempfile::tempdir().unwrap();
        let ok = dir.path().join("ok.txt");
        let big = dir.path().join("big.txt");
        let wrong = dir.path().join("doc.exe");
        std::fs::write(&ok, "hello").unwrap();
        std::fs::write(&big, vec![b'a'; 64]).unwrap();
        std::fs::write(&wrong, "x").unwrap();

        let security = SecurityConfig {
            max_file_size: 32,
            ..SecurityConfig::default()
        };

        assert_eq!(validate_file(&ok, &security), Ok(5));
        assert!(matches!(validate_file(&big, &security), Err(SecurityError::FileTooLarge { size: 64, max: 32 })));
        assert!(matches!(validate_file(&wrong, &security), Err(SecurityError::DisallowedFileType(_))));
        assert!(matches!(validate_file(dir.path(), &security), Err(SecurityError::NotAFile(_))));
        assert!(matches!(
            validate_file(&dir.path().join("missing.txt"), &security),
            Err(SecurityError::NotFound(_))
        ));
    }
}
